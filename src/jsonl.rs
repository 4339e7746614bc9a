// JSONL snapshot file operations

use crate::record::{Record, RecordId};
use eyre::{Context, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Sidecar whose exclusive lock serializes writers of `path`
pub(crate) fn lock_path(path: &Path) -> PathBuf {
    sibling(path, ".lock")
}

/// Replace `path` with the bytes produced by `write`
///
/// Writers hold an exclusive lock on the `.lock` sidecar (opened without
/// truncation) from creating the temporary sibling until it is renamed over
/// `path`. Readers never observe a half-written file.
pub(crate) fn replace_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
{
    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path(path))
        .context("Failed to open lock file")?;
    lock_file.lock_exclusive().context("Failed to acquire file lock")?;

    let tmp_path = sibling(path, ".tmp");
    {
        let file = File::create(&tmp_path).context("Failed to create temporary file")?;
        let mut writer = BufWriter::new(&file);
        write(&mut writer)?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path).context("Failed to move file into place")?;
    FileExt::unlock(&lock_file).context("Failed to release file lock")?;
    Ok(())
}

/// Replace a JSONL file with the given records, one per line
pub fn write_jsonl(path: &Path, records: &[Record]) -> Result<()> {
    replace_file(path, |writer| {
        for record in records {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    })
    .context("Failed to write JSONL snapshot")?;

    info!(file = ?path, count = records.len(), "Wrote JSONL snapshot");
    Ok(())
}

/// Read all records from a JSONL file, one entry per ID
///
/// Records keep the order in which their ID first appears. When an ID occurs
/// on several lines, the last line wins. Unreadable or malformed lines are
/// skipped with a warning.
pub fn read_jsonl_latest(path: &Path) -> Result<Vec<Record>> {
    if !path.exists() {
        // File doesn't exist yet, return empty list
        return Ok(Vec::new());
    }

    let file = File::open(path).context("Failed to open JSONL file")?;
    let reader = BufReader::new(file);
    let mut records: Vec<Record> = Vec::new();
    let mut positions: HashMap<RecordId, usize> = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to read line, skipping"
                );
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let record: Record = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to parse JSON, skipping"
                );
                continue;
            }
        };

        match positions.get(&record.id) {
            Some(&pos) => records[pos] = record,
            None => {
                positions.insert(record.id, records.len());
                records.push(record);
            }
        }
    }

    info!(
        file = ?path,
        count = records.len(),
        "Loaded latest records from JSONL"
    );

    Ok(records)
}
