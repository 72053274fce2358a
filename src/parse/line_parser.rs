use std::sync::LazyLock;

use regex::Regex;

use crate::model::line_item::LineItem;

/// `#Tag with spaces/ content`: the tag ends at the first `/`
static SLASH_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(.+?)/\s*(.+)$").expect("valid slash-form regex"));

/// `#Tag content`: legacy form, tag has no spaces
static SPACE_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(\S+)\s+(.+)$").expect("valid space-form regex"));

/// Parse a day's free-text buffer into line items.
///
/// Blank lines and lines matching neither grammar are skipped. The result
/// depends only on `text`, so re-parsing unchanged text yields identical items.
pub fn parse_lines(text: &str) -> Vec<LineItem> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| parse_line(idx, line))
        .collect()
}

/// Parse a single line. Returns `None` for blank or inert lines.
pub fn parse_line(line_index: usize, line: &str) -> Option<LineItem> {
    if line.trim().is_empty() {
        return None;
    }

    let caps = SLASH_FORM
        .captures(line)
        .or_else(|| SPACE_FORM.captures(line))?;

    let tag = caps.get(1)?.as_str().trim();
    let content = caps.get(2)?.as_str().trim();
    if tag.is_empty() || content.is_empty() {
        return None;
    }

    Some(LineItem::new(
        line_index,
        tag.to_string(),
        content.to_string(),
    ))
}
