use crate::config::CleanupOptions;
use std::collections::BTreeSet;

const TAB_WIDTH: usize = 4;

/// Apply the enabled cleanup passes; applying the result again changes nothing
#[must_use]
pub fn apply_cleanup(text: &str, options: &CleanupOptions) -> String {
    apply_cleanup_preserving(text, options, &BTreeSet::new())
}

/// Apply the enabled cleanup passes to every line except the 1-indexed lines in
/// `preserved`, which pass through untouched and break blank runs.
#[must_use]
pub fn apply_cleanup_preserving(
    text: &str,
    options: &CleanupOptions,
    preserved: &BTreeSet<usize>,
) -> String {
    if !options.is_enabled() {
        return text.to_string();
    }

    let mut lines: Vec<(bool, String)> = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (preserved.contains(&(idx + 1)), line.to_string()))
        .collect();

    for (keep, line) in &mut lines {
        if *keep {
            continue;
        }
        if options.normalize_indentation {
            *line = expand_leading_tabs(line);
        }
        if options.remove_trailing_whitespace {
            let trimmed = line.trim_end().len();
            line.truncate(trimmed);
        }
    }

    if options.remove_empty_lines {
        lines = collapse_blank_runs(lines, options.max_empty_lines);
    }

    let mut cleaned = lines
        .into_iter()
        .map(|(_, line)| line)
        .collect::<Vec<_>>()
        .join("\n");
    if text.ends_with('\n') {
        cleaned.push('\n');
    }
    cleaned
}

fn expand_leading_tabs(line: &str) -> String {
    let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
    let (indent, rest) = line.split_at(indent_len);
    if !indent.contains('\t') {
        return line.to_string();
    }

    let mut expanded = String::with_capacity(line.len() + TAB_WIDTH);
    let mut column = 0;
    for ch in indent.chars() {
        if ch == '\t' {
            let width = TAB_WIDTH - column % TAB_WIDTH;
            expanded.extend(std::iter::repeat(' ').take(width));
            column += width;
        } else {
            expanded.push(ch);
            column += 1;
        }
    }
    expanded.push_str(rest);
    expanded
}

fn collapse_blank_runs(lines: Vec<(bool, String)>, max_run: usize) -> Vec<(bool, String)> {
    let mut kept = Vec::with_capacity(lines.len());
    let mut run = 0;
    for (preserved, line) in lines {
        if !preserved && line.trim().is_empty() {
            run += 1;
            if run > max_run {
                continue;
            }
        } else {
            run = 0;
        }
        kept.push((preserved, line));
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_disabled_is_identity() {
        let text = "a  \n\n\n\n\tb\n";
        assert_eq!(apply_cleanup(text, &CleanupOptions::default()), text);
    }

    #[test]
    fn test_collapse_blank_runs() {
        let options = CleanupOptions {
            remove_empty_lines: true,
            max_empty_lines: 1,
            ..CleanupOptions::default()
        };
        assert_eq!(apply_cleanup("a\n\n\n\nb\n\nc\n", &options), "a\n\nb\n\nc\n");
    }

    #[test]
    fn test_trailing_whitespace_and_tabs() {
        let options = CleanupOptions {
            remove_trailing_whitespace: true,
            normalize_indentation: true,
            ..CleanupOptions::default()
        };
        assert_eq!(
            apply_cleanup("def f():\t\n\treturn 1  \n  \tx = '\t'\n", &options),
            "def f():\n    return 1\n    x = '\t'\n"
        );
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let options = CleanupOptions::compact();
        let text = "class A:  \n\n\n\n\tdef f(self):\n\t\treturn 1\t\n\n\n";
        let once = apply_cleanup(text, &options);
        assert_eq!(apply_cleanup(&once, &options), once);
    }

    #[test]
    fn test_preserved_lines_pass_through() {
        let options = CleanupOptions::compact();
        let text = "doc = \"\"\"a  \n\n\n\n\tb\n\"\"\"\n\n\n\nx = 1  \n";
        let preserved: BTreeSet<usize> = (1..=6).collect();
        assert_eq!(
            apply_cleanup_preserving(text, &options, &preserved),
            "doc = \"\"\"a  \n\n\n\n\tb\n\"\"\"\n\nx = 1\n"
        );
    }
}
