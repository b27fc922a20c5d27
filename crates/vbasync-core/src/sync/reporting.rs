//! Sync outcomes and summary reporting

use std::fmt::{self, Write};

/// Kind of a single sync outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Local file written from the host
    Written,
    /// Nothing to do, both sides already match
    Unchanged,
    /// Conflict left untouched by choice
    Skipped,
    /// Operation refused (code-behind module without force)
    Refused,
    /// Local file deleted
    Deleted,
    /// Orphaned local file kept
    Kept,
    /// Module pushed into the host
    Imported,
    /// Module removed from the host
    Removed,
    /// No owning document for a file
    Unmapped,
    /// Remaining work for a document cancelled
    Cancelled,
    /// Non-fatal problem worth showing
    Warning,
    /// Per-item failure
    Failed,
}

impl EventKind {
    /// Short marker used when printing events
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Written | Self::Imported => "✓",
            Self::Unchanged => "=",
            Self::Skipped | Self::Kept => "⊘",
            Self::Refused | Self::Unmapped | Self::Cancelled | Self::Warning => "⚠",
            Self::Deleted | Self::Removed => "✗",
            Self::Failed => "✗✗",
        }
    }
}

/// A single sync outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    /// What happened
    pub kind: EventKind,
    /// File or module concerned
    pub subject: String,
    /// Extra information (reason, error)
    pub detail: Option<String>,
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            EventKind::Written => "Exported",
            EventKind::Unchanged => "Unchanged",
            EventKind::Skipped => "Skipped",
            EventKind::Refused => "Refused",
            EventKind::Deleted => "Deleted",
            EventKind::Kept => "Kept",
            EventKind::Imported => "Imported",
            EventKind::Removed => "Removed from host",
            EventKind::Unmapped => "No owning document",
            EventKind::Cancelled => "Cancelled",
            EventKind::Warning => "Warning",
            EventKind::Failed => "Failed",
        };
        write!(f, "{} {label}: {}", self.kind.marker(), self.subject)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// Outcomes of an export, import, or watcher cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Every outcome in processing order
    pub events: Vec<SyncEvent>,
}

impl SyncReport {
    /// Record an outcome
    pub fn record(&mut self, kind: EventKind, subject: impl Into<String>, detail: Option<String>) {
        let event = SyncEvent {
            kind,
            subject: subject.into(),
            detail,
        };
        match kind {
            EventKind::Failed => tracing::error!(subject = %event.subject, detail = ?event.detail, "Sync item failed"),
            EventKind::Warning | EventKind::Unmapped | EventKind::Refused => {
                tracing::warn!(subject = %event.subject, detail = ?event.detail, "Sync item not applied");
            }
            _ => tracing::debug!(?kind, subject = %event.subject, "Sync item"),
        }
        self.events.push(event);
    }

    /// Number of outcomes of a kind
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Outcomes of a kind
    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &SyncEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Append another report's outcomes
    pub fn extend(&mut self, other: Self) {
        self.events.extend(other.events);
    }

    /// Whether nothing failed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.count(EventKind::Failed) == 0
    }

    /// Whether anything was written on either side
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.events.iter().any(|e| {
            matches!(
                e.kind,
                EventKind::Written | EventKind::Imported | EventKind::Deleted | EventKind::Removed
            )
        })
    }
}

/// Sync summary renderer
pub struct SyncReporter;

impl SyncReporter {
    /// Generate a summary report
    #[must_use]
    pub fn generate_summary(report: &SyncReport) -> String {
        let mut output = String::new();

        output.push_str("\n=== Sync Summary ===\n");
        for (label, kind) in [
            ("Exported: ", EventKind::Written),
            ("Imported: ", EventKind::Imported),
            ("Unchanged:", EventKind::Unchanged),
            ("Skipped:  ", EventKind::Skipped),
            ("Refused:  ", EventKind::Refused),
            ("Deleted:  ", EventKind::Deleted),
            ("Removed:  ", EventKind::Removed),
            ("Kept:     ", EventKind::Kept),
        ] {
            let count = report.count(kind);
            if count > 0 || matches!(kind, EventKind::Written | EventKind::Imported) {
                writeln!(output, "{label} {count}").expect("Writing to String should never fail");
            }
        }

        let unmapped = report.count(EventKind::Unmapped);
        if unmapped > 0 {
            writeln!(output, "Unmapped:  {unmapped}").expect("Writing to String should never fail");
        }

        let cancelled: Vec<&SyncEvent> = report.of_kind(EventKind::Cancelled).collect();
        if !cancelled.is_empty() {
            writeln!(output, "\nCancelled ({}):", cancelled.len())
                .expect("Writing to String should never fail");
            for event in cancelled {
                writeln!(output, "  - {}", event.subject)
                    .expect("Writing to String should never fail");
            }
        }

        let warnings: Vec<&SyncEvent> = report.of_kind(EventKind::Warning).collect();
        if !warnings.is_empty() {
            writeln!(output, "\nWarnings ({}):", warnings.len())
                .expect("Writing to String should never fail");
            for event in warnings {
                writeln!(output, "  - {}: {}", event.subject, event.detail.as_deref().unwrap_or(""))
                    .expect("Writing to String should never fail");
            }
        }

        let failures: Vec<&SyncEvent> = report.of_kind(EventKind::Failed).collect();
        if !failures.is_empty() {
            writeln!(output, "\nErrors ({}):", failures.len())
                .expect("Writing to String should never fail");
            for event in failures {
                writeln!(output, "  - {}: {}", event.subject, event.detail.as_deref().unwrap_or(""))
                    .expect("Writing to String should never fail");
            }
        }

        if report.is_success() {
            output.push_str("Status: ✓ Success\n");
        } else {
            output.push_str("Status: ✗ Completed with errors\n");
        }

        output
    }
}
