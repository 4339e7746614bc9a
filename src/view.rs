// Text pages for the list and detail routes

use crate::favorites::FavoritesSet;
use crate::filter::ListView;
use crate::record::Record;
use crate::site::DetailPage;
use std::fmt;

pub const BACK_LINK: &str = "Return to Post List";

/// How a line should be emphasized by the terminal front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Heading,
    Error,
    Muted,
    Highlight,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub style: Style,
    pub text: String,
}

impl Line {
    fn new(style: Style, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Everything the list route displays
pub struct ListPage<'a> {
    pub view: &'a ListView,
    pub favorites: &'a FavoritesSet,
    /// Failure from loading the collection, shown as a banner
    pub load_error: Option<&'a str>,
    pub announcement: &'a str,
}

pub fn favorites_summary(count: usize) -> Option<String> {
    match count {
        0 => None,
        1 => Some("You have 1 favorite post".to_string()),
        n => Some(format!("You have {} favorite posts", n)),
    }
}

pub fn empty_state(favorites_only: bool) -> &'static str {
    if favorites_only {
        "No favorites match your filter."
    } else {
        "No posts match your filter."
    }
}

fn list_row(record: &Record, favorite: bool) -> Line {
    let marker = if favorite { "★" } else { "☆" };
    let style = if favorite { Style::Highlight } else { Style::Plain };
    Line::new(style, format!("{} {}: {}", marker, record.id, record.title))
}

impl ListPage<'_> {
    pub fn lines(&self) -> Vec<Line> {
        if let Some(error) = self.load_error {
            return vec![
                Line::new(Style::Error, "Error fetching posts"),
                Line::new(Style::Error, error),
            ];
        }

        if self.view.collection().is_empty() {
            return vec![Line::new(Style::Muted, "No posts found or failed to load.")];
        }

        let mut lines = Vec::new();
        if !self.announcement.is_empty() {
            lines.push(Line::new(Style::Highlight, self.announcement));
        }

        let heading = if self.view.favorites_only() {
            "Favorite posts"
        } else {
            "All posts"
        };
        lines.push(Line::new(Style::Heading, heading));

        if !self.view.query().is_empty() {
            lines.push(Line::new(Style::Muted, format!("Filter: \"{}\"", self.view.query())));
        }
        if let Some(summary) = favorites_summary(self.favorites.len()) {
            lines.push(Line::new(Style::Highlight, summary));
        }

        let visible = self.view.visible();
        lines.push(Line::new(Style::Muted, format!("{} posts displayed", visible.len())));

        if visible.is_empty() {
            lines.push(Line::new(Style::Muted, empty_state(self.view.favorites_only())));
        } else {
            lines.extend(
                visible
                    .iter()
                    .map(|record| list_row(record, self.favorites.contains(record.id))),
            );
        }
        lines
    }
}

fn error_lines(title: &str, message: String, requested_id: &str) -> Vec<Line> {
    let mut lines = vec![Line::new(Style::Error, title), Line::new(Style::Plain, message)];
    if !requested_id.is_empty() {
        lines.push(Line::new(Style::Muted, format!("Requested ID: {}", requested_id)));
    }
    lines.push(Line::new(Style::Muted, BACK_LINK));
    lines
}

pub fn detail_lines(page: &DetailPage) -> Vec<Line> {
    match page {
        DetailPage::Post(record) => vec![
            Line::new(Style::Heading, record.title.as_str()),
            Line::new(Style::Plain, record.body.as_str()),
            Line::new(
                Style::Muted,
                format!("Post ID: {} | User ID: {}", record.id, record.owner_id),
            ),
            Line::new(Style::Muted, BACK_LINK),
        ],
        DetailPage::ResolutionFailed(error) => {
            error_lines(error.kind.title(), error.message.clone(), &error.requested_id)
        }
        DetailPage::ClientRejected(error) => error_lines(error.title(), error.to_string(), error.requested_id()),
    }
}
