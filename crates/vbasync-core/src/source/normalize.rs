//! Comparison-only canonical form of module text

/// Canonicalize module text for comparison
///
/// Right-trims every line and drops fully blank lines at the start and end.
/// Lines are rejoined with `\n`, so CRLF input compares equal to LF input.
#[must_use]
pub fn normalize(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();

    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());

    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].join("\n"),
        _ => String::new(),
    }
}
