use serde::{Deserialize, Serialize};

/// A single work entry parsed from the day's free-text buffer.
///
/// Line items are recreated on every parse and never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Zero-based line number in the source buffer
    pub line_index: usize,
    /// Project tag (without the leading `#`)
    pub project_tag: String,
    /// Item text
    pub content: String,
    pub is_completed: bool,
    pub progress: u8,
}

impl LineItem {
    pub fn new(line_index: usize, project_tag: String, content: String) -> Self {
        LineItem {
            line_index,
            project_tag,
            content,
            is_completed: false,
            progress: 0,
        }
    }

    /// Key used to look up staged carry-over metadata (`project:content`)
    pub fn carry_key(&self) -> String {
        carry_key(&self.project_tag, &self.content)
    }
}

/// Build the `project:content` key shared by line items and staged carry-overs
pub fn carry_key(project: &str, content: &str) -> String {
    format!("{}:{}", project, content)
}
