//! `'@Folder("A.B")` comments recording a module's logical folder

use std::sync::LazyLock;

use regex::Regex;

static FOLDER_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*'\s*@Folder\s*\(\s*"([^"]*)"\s*\)"#).expect("valid @Folder pattern")
});

static OPTION_EXPLICIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*Option\s+Explicit\b").expect("valid Option pattern"));

static ATTRIBUTE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*Attribute\s").expect("valid Attribute pattern"));

/// Convert a slash-joined folder path into annotation form (`A/B` -> `A.B`)
#[must_use]
pub fn path_to_annotation(path: &str) -> String {
    path.split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Convert an annotation value into a slash-joined folder path (`A.B` -> `A/B`)
#[must_use]
pub fn annotation_to_path(annotation: &str) -> String {
    annotation
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read the folder annotation from module text as a slash-joined path
#[must_use]
pub fn extract_folder_annotation(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        FOLDER_ANNOTATION
            .captures(line)
            .map(|caps| annotation_to_path(&caps[1]))
            .filter(|path| !path.is_empty())
    })
}

fn annotation_line(annotation: &str) -> String {
    format!("'@Folder(\"{annotation}\")")
}

/// Insert or replace the folder annotation comment
///
/// An existing annotation is replaced in place. Otherwise the comment goes
/// right after the leading `Attribute` lines, or before the first
/// `Option Explicit` when that comes later.
#[must_use]
pub fn ensure_annotation(text: &str, annotation: &str) -> String {
    let mut lines: Vec<String> = text.lines().map(ToString::to_string).collect();
    let new_line = annotation_line(annotation);

    if let Some(idx) = lines.iter().position(|l| FOLDER_ANNOTATION.is_match(l)) {
        lines[idx] = new_line;
        return lines.join("\n");
    }

    let after_attributes = lines
        .iter()
        .rposition(|l| ATTRIBUTE_LINE.is_match(l))
        .map_or(0, |idx| idx + 1);
    let insert_at = lines
        .iter()
        .position(|l| OPTION_EXPLICIT.is_match(l))
        .filter(|&idx| idx >= after_attributes)
        .unwrap_or(after_attributes);

    lines.insert(insert_at, new_line);
    lines.join("\n")
}
