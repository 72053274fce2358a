use crate::model::record::WorkItemRecord;
use crate::ops::carry_over::UNTAGGED_PROJECT;

/// Render one buffer line. Always uses the slash form so tags containing
/// spaces survive a re-parse.
pub fn render_line(project_tag: &str, content: &str) -> String {
    format!("#{}/ {}", project_tag, content)
}

/// Render a day's records back into buffer text, one line per record.
/// Untagged records are written under the fallback project.
pub fn render_buffer(records: &[WorkItemRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let tag = match record.project_tag() {
            "" => UNTAGGED_PROJECT,
            tag => tag,
        };
        out.push_str(&render_line(tag, &record.content));
        out.push('\n');
    }
    out
}

/// Remove the line at `line_index`, leaving every other line untouched.
/// Out-of-range indices leave the text unchanged.
pub fn remove_line(text: &str, line_index: usize) -> String {
    let had_trailing_newline = text.ends_with('\n');
    let lines: Vec<&str> = text.lines().collect();
    if line_index >= lines.len() {
        return text.to_string();
    }

    let kept: Vec<&str> = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != line_index)
        .map(|(_, l)| *l)
        .collect();

    let mut out = kept.join("\n");
    if had_trailing_newline && !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Append a line, separated from existing text by exactly one newline
pub fn append_line(text: &str, line: &str) -> String {
    let mut out = text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(line);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_lines;
    use pretty_assertions::assert_eq;

    #[test]
    fn rendered_line_parses_back() {
        let line = render_line("Side Project", "ship it");
        let items = parse_lines(&line);
        assert_eq!(items[0].project_tag, "Side Project");
        assert_eq!(items[0].content, "ship it");
    }

    #[test]
    fn remove_line_keeps_other_lines() {
        let text = "#A/ one\nprose\n#B/ two\n";
        assert_eq!(remove_line(text, 1), "#A/ one\n#B/ two\n");
        assert_eq!(remove_line(text, 0), "prose\n#B/ two\n");
    }

    #[test]
    fn remove_line_out_of_range_is_noop() {
        let text = "#A/ one";
        assert_eq!(remove_line(text, 4), text);
    }

    #[test]
    fn remove_last_remaining_line() {
        assert_eq!(remove_line("#A/ one\n", 0), "");
    }

    #[test]
    fn append_line_adds_separator_once() {
        assert_eq!(append_line("", "#A/ x"), "#A/ x\n");
        assert_eq!(append_line("#A/ one", "#A/ x"), "#A/ one\n#A/ x\n");
        assert_eq!(append_line("#A/ one\n", "#A/ x"), "#A/ one\n#A/ x\n");
    }
}
