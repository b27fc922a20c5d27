//! Removal and re-insertion of IDE-managed header boilerplate
//!
//! The host regenerates `VERSION`, `BEGIN ... End` designer blocks,
//! `MultiUse` markers and `Attribute` lines whenever a module is read, so
//! they have to go before anything is compared or persisted.

use std::sync::LazyLock;

use regex::Regex;

/// Attribute key carrying the module name
pub const MODULE_NAME_ATTRIBUTE: &str = "VB_Name";

static VERSION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^VERSION\s+\d").expect("valid VERSION pattern"));

// Prefix match on purpose: also covers `Begin {GUID} ControlName`.
static BLOCK_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^BEGIN(\s|$)").expect("valid BEGIN pattern"));

static BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^END(\s+BEGIN)?$").expect("valid END pattern"));

static CODE_TERMINATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^END\s+(SUB|FUNCTION|PROPERTY|IF|WITH|SELECT|TYPE|ENUM)\b")
        .expect("valid terminator pattern")
});

static MULTI_USE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^MultiUse\b").expect("valid MultiUse pattern"));

static ATTRIBUTE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Attribute\s").expect("valid Attribute pattern"));

static NAME_ATTRIBUTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^Attribute\s+VB_Name\b").expect("valid VB_Name pattern")
});

static NAME_ATTRIBUTE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^Attribute\s+VB_Name\s*=\s*"([^"]+)""#).expect("valid VB_Name value pattern")
});

/// Output of a header strip together with its nesting diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedSource {
    /// Remaining module text, lines joined with `\n`
    pub text: String,
    /// `BEGIN` blocks still open at end of input (non-zero means malformed)
    pub unclosed_blocks: usize,
}

impl StrippedSource {
    /// Whether all `BEGIN` blocks were closed
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.unclosed_blocks == 0
    }
}

/// Strip header boilerplate and report unbalanced `BEGIN` nesting
///
/// With `keep_module_name` the `Attribute VB_Name = ...` line survives
/// verbatim; every other attribute line is dropped. Lines outside the header
/// are kept untouched and in order.
#[must_use]
pub fn strip_header_checked(text: &str, keep_module_name: bool) -> StrippedSource {
    let mut kept = Vec::new();
    let mut depth = 0usize;

    for line in text.lines() {
        let s = line.trim();

        if depth > 0 {
            if BLOCK_START.is_match(s) {
                depth += 1;
            } else if !CODE_TERMINATOR.is_match(s) && BLOCK_END.is_match(s) {
                depth -= 1;
            }
            continue;
        }

        if VERSION_LINE.is_match(s) {
            continue;
        }
        if BLOCK_START.is_match(s) {
            depth += 1;
            continue;
        }
        if MULTI_USE.is_match(s) {
            continue;
        }
        if ATTRIBUTE_LINE.is_match(s) {
            if keep_module_name && line.contains(MODULE_NAME_ATTRIBUTE) {
                kept.push(line);
            }
            continue;
        }

        kept.push(line);
    }

    StrippedSource {
        text: kept.join("\n"),
        unclosed_blocks: depth,
    }
}

/// Strip header boilerplate from module text
///
/// Unbalanced `BEGIN` nesting is logged as a warning and the best-effort
/// result is returned anyway.
#[must_use]
pub fn strip_header(text: &str, keep_module_name: bool) -> String {
    let stripped = strip_header_checked(text, keep_module_name);
    if !stripped.is_balanced() {
        tracing::warn!(
            unclosed = stripped.unclosed_blocks,
            "Unbalanced BEGIN/End nesting in module header"
        );
    }
    stripped.text
}

/// Whether the text already carries an `Attribute VB_Name` line
#[must_use]
pub fn has_module_name_attribute(text: &str) -> bool {
    text.lines().any(|l| NAME_ATTRIBUTE_LINE.is_match(l.trim()))
}

/// Module name declared by the first `Attribute VB_Name` line
#[must_use]
pub fn module_name_attribute(text: &str) -> Option<String> {
    text.lines()
        .find_map(|l| NAME_ATTRIBUTE_VALUE.captures(l.trim()))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Prepend the module-name attribute if the text lacks one
///
/// The host import path uses this attribute to name the new component.
#[must_use]
pub fn ensure_header(text: &str, module_name: &str) -> String {
    if has_module_name_attribute(text) {
        return text.to_string();
    }
    format!("Attribute {MODULE_NAME_ATTRIBUTE} = \"{module_name}\"\n{text}")
}
