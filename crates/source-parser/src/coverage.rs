use crate::error::{ParserError, Result};
use crate::types::LineSpan;

/// Lines that must belong to some unit
#[must_use]
pub fn is_significant(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

/// Assert that `spans` are disjoint and cover every significant line
pub fn check_coverage(lines: &[&str], spans: &[LineSpan]) -> Result<()> {
    let mut sorted = spans.to_vec();
    sorted.sort();

    for pair in sorted.windows(2) {
        if pair[0].overlaps(&pair[1]) {
            return Err(ParserError::coverage(
                format!(
                    "units at lines {}-{} and {}-{} overlap",
                    pair[0].start, pair[0].end, pair[1].start, pair[1].end
                ),
                vec![pair[1].start],
            ));
        }
    }

    let uncovered: Vec<usize> = lines
        .iter()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .filter(|(_, line)| is_significant(line))
        .filter(|(number, _)| !sorted.iter().any(|span| span.contains(*number)))
        .map(|(number, _)| number)
        .collect();

    if let Some(first) = uncovered.first() {
        return Err(ParserError::coverage(
            format!(
                "{} top-level line(s) not covered by any unit, first at line {first}",
                uncovered.len()
            ),
            uncovered,
        ));
    }

    Ok(())
}
