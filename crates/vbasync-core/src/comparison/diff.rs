//! Diff generation with color-coded output

use std::fmt::Write;

use similar::{ChangeTag, TextDiff};

/// Labels for the two sides of a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffLabels {
    /// Side being replaced
    pub old: &'static str,
    /// Side that wins on overwrite
    pub new: &'static str,
}

impl DiffLabels {
    /// Host content replaces the local file
    pub const HOST_TO_DISK: Self = Self {
        old: "Disk",
        new: "Visio",
    };

    /// Local file replaces the host module
    pub const DISK_TO_HOST: Self = Self {
        old: "Visio",
        new: "Disk",
    };
}

/// Diff generator for creating visual diffs
pub struct DiffGenerator;

impl DiffGenerator {
    const DIFF_CONTEXT_LINES: usize = 3;

    /// Generate a color-coded unified diff between two texts
    #[must_use]
    pub fn generate(old: &str, new: &str, labels: DiffLabels) -> String {
        let diff = TextDiff::from_lines(old, new);
        let mut output = String::new();

        writeln!(output, "\x1b[1m--- {}\x1b[0m", labels.old)
            .expect("Writing to String should never fail");
        writeln!(output, "\x1b[1m+++ {}\x1b[0m", labels.new)
            .expect("Writing to String should never fail");

        for (idx, group) in diff.grouped_ops(Self::DIFF_CONTEXT_LINES).iter().enumerate() {
            if idx > 0 {
                output.push_str("...\n");
            }

            for op in group {
                for change in diff.iter_changes(op) {
                    let (sign, color) = match change.tag() {
                        ChangeTag::Delete => ("-", "\x1b[31m"),
                        ChangeTag::Insert => ("+", "\x1b[32m"),
                        ChangeTag::Equal => (" ", "\x1b[0m"),
                    };

                    let newline = if change.value().ends_with('\n') {
                        ""
                    } else {
                        "\n"
                    };

                    write!(output, "{color}{sign}{}{newline}\x1b[0m", change.value())
                        .expect("Writing to String should never fail");
                }
            }
        }

        output
    }

    /// Generate a plain unified diff (no colors), empty when texts are equal
    #[must_use]
    pub fn generate_plain(old: &str, new: &str, labels: DiffLabels) -> String {
        TextDiff::from_lines(old, new)
            .unified_diff()
            .context_radius(Self::DIFF_CONTEXT_LINES)
            .header(labels.old, labels.new)
            .to_string()
    }

    /// Count added and removed lines
    #[must_use]
    pub fn count_changes(old: &str, new: &str) -> (usize, usize) {
        let diff = TextDiff::from_lines(old, new);

        let mut added = 0;
        let mut removed = 0;

        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => added += 1,
                ChangeTag::Delete => removed += 1,
                ChangeTag::Equal => {}
            }
        }

        (added, removed)
    }
}
