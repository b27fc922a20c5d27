//! Conflict resolution between host modules and local files
//!
//! A conflict exists only when both sides have the module and their
//! comparable bodies differ. The [`ConflictPolicy`] answers per conflict;
//! [`ConflictResolver`] turns the answers into resolutions and keeps the
//! batch-wide decisions ("all", "skip all", "cancel").

use std::path::PathBuf;

use crate::comparison::{DiffGenerator, DiffLabels};
use crate::config::ConflictStrategy;
use crate::error::Result;
use crate::source::comparable_body;

/// Which side would be overwritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDirection {
    /// The host module replaces the local file (export)
    HostToDisk,
    /// The local file replaces the host module (import)
    DiskToHost,
}

impl ConflictDirection {
    /// Diff labels, replaced side first
    #[must_use]
    pub const fn labels(self) -> DiffLabels {
        match self {
            Self::HostToDisk => DiffLabels::HOST_TO_DISK,
            Self::DiskToHost => DiffLabels::DISK_TO_HOST,
        }
    }
}

/// A module whose host and local bodies differ
#[derive(Debug, Clone)]
pub struct ModuleConflict {
    /// Display name of the owning document
    pub document: String,
    /// Module name
    pub module: String,
    /// Local file path
    pub path: PathBuf,
    /// Which side would be overwritten
    pub direction: ConflictDirection,
    /// Host module text
    pub host_text: String,
    /// Local file text
    pub local_text: String,
}

impl ModuleConflict {
    fn sides(&self) -> (String, String) {
        let host = comparable_body(&self.host_text);
        let local = comparable_body(&self.local_text);
        match self.direction {
            ConflictDirection::HostToDisk => (local, host),
            ConflictDirection::DiskToHost => (host, local),
        }
    }

    /// Plain unified diff of the comparable bodies, replaced side first
    #[must_use]
    pub fn unified_diff(&self) -> String {
        let (old, new) = self.sides();
        DiffGenerator::generate_plain(&old, &new, self.direction.labels())
    }

    /// Color-coded diff for terminals
    #[must_use]
    pub fn colored_diff(&self) -> String {
        let (old, new) = self.sides();
        DiffGenerator::generate(&old, &new, self.direction.labels())
    }
}

/// Local files whose modules no longer exist in the host
#[derive(Debug, Clone)]
pub struct OrphanSet {
    /// Display name of the owning document
    pub document: String,
    /// Document folder name
    pub folder: String,
    /// Orphaned local files
    pub files: Vec<PathBuf>,
}

/// Answer to a single conflict prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Overwrite this one
    Yes,
    /// Leave this one alone
    No,
    /// Overwrite this and every later conflict in the batch
    All,
    /// Leave this and every later conflict alone
    SkipAll,
    /// Stop processing the current document
    Cancel,
}

/// What happens to orphaned local files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanAction {
    /// Delete the local files
    Delete,
    /// Push the files into the host
    Import,
    /// Leave them in place
    #[default]
    Keep,
}

/// Outcome for one conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Replace the target side
    Overwrite,
    /// Leave the target side untouched
    Skip,
    /// Abort the remaining work for the document
    Cancel,
}

/// Source of conflict decisions (interactive prompt or fixed rule)
pub trait ConflictPolicy {
    /// Decide a single conflict
    ///
    /// # Errors
    ///
    /// Returns an error if the decision cannot be obtained (e.g. the
    /// terminal is gone).
    fn decide(&mut self, conflict: &ModuleConflict) -> Result<Choice>;

    /// Decide what to do with orphaned local files
    ///
    /// # Errors
    ///
    /// Returns an error if the decision cannot be obtained.
    fn orphans(&mut self, _orphans: &OrphanSet) -> Result<OrphanAction> {
        Ok(OrphanAction::Keep)
    }
}

/// Non-interactive policy answering every conflict the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPolicy {
    resolution: Resolution,
    orphans: OrphanAction,
}

impl FixedPolicy {
    /// Always overwrite, keep orphans
    #[must_use]
    pub const fn overwrite() -> Self {
        Self::new(Resolution::Overwrite)
    }

    /// Never overwrite, keep orphans
    #[must_use]
    pub const fn skip() -> Self {
        Self::new(Resolution::Skip)
    }

    /// Cancel the document on the first conflict
    #[must_use]
    pub const fn cancel() -> Self {
        Self::new(Resolution::Cancel)
    }

    /// Policy for a resolution
    #[must_use]
    pub const fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            orphans: OrphanAction::Keep,
        }
    }

    /// Use the given orphan action instead of keeping
    #[must_use]
    pub const fn with_orphans(mut self, action: OrphanAction) -> Self {
        self.orphans = action;
        self
    }

    /// Policy for a configured strategy; `None` means ask interactively
    #[must_use]
    pub const fn from_strategy(strategy: ConflictStrategy) -> Option<Self> {
        match strategy {
            ConflictStrategy::Prompt => None,
            ConflictStrategy::Overwrite => Some(Self::overwrite()),
            ConflictStrategy::Skip => Some(Self::skip()),
            ConflictStrategy::Cancel => Some(Self::cancel()),
        }
    }
}

impl ConflictPolicy for FixedPolicy {
    fn decide(&mut self, _conflict: &ModuleConflict) -> Result<Choice> {
        Ok(match self.resolution {
            Resolution::Overwrite => Choice::All,
            Resolution::Skip => Choice::SkipAll,
            Resolution::Cancel => Choice::Cancel,
        })
    }

    fn orphans(&mut self, _orphans: &OrphanSet) -> Result<OrphanAction> {
        Ok(self.orphans)
    }
}

/// Live-edit policy: the user saved the file on purpose, so it always wins
#[derive(Debug, Clone, Copy, Default)]
pub struct EditModePolicy;

impl ConflictPolicy for EditModePolicy {
    fn decide(&mut self, conflict: &ModuleConflict) -> Result<Choice> {
        tracing::debug!(module = %conflict.module, "Edit mode overwrite");
        Ok(Choice::Yes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    AskEach,
    OverwriteAll,
    SkipAll,
    Cancelled,
}

/// Applies a policy across a batch of conflicts
pub struct ConflictResolver<'a> {
    policy: &'a mut dyn ConflictPolicy,
    state: BatchState,
}

impl<'a> ConflictResolver<'a> {
    /// Wrap a policy
    pub fn new(policy: &'a mut dyn ConflictPolicy) -> Self {
        Self {
            policy,
            state: BatchState::AskEach,
        }
    }

    /// Start work on another document
    ///
    /// A cancel only covers the document it was chosen for; "all" and
    /// "skip all" stay in force for the whole batch.
    pub fn begin_document(&mut self) {
        if self.state == BatchState::Cancelled {
            self.state = BatchState::AskEach;
        }
    }

    /// Whether the current document was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state == BatchState::Cancelled
    }

    /// Resolve one conflict
    ///
    /// # Errors
    ///
    /// Returns an error if the policy fails to decide.
    pub fn resolve(&mut self, conflict: &ModuleConflict) -> Result<Resolution> {
        let resolution = match self.state {
            BatchState::OverwriteAll => Resolution::Overwrite,
            BatchState::SkipAll => Resolution::Skip,
            BatchState::Cancelled => Resolution::Cancel,
            BatchState::AskEach => match self.policy.decide(conflict)? {
                Choice::Yes => Resolution::Overwrite,
                Choice::No => Resolution::Skip,
                Choice::All => {
                    self.state = BatchState::OverwriteAll;
                    Resolution::Overwrite
                }
                Choice::SkipAll => {
                    self.state = BatchState::SkipAll;
                    Resolution::Skip
                }
                Choice::Cancel => {
                    self.state = BatchState::Cancelled;
                    Resolution::Cancel
                }
            },
        };

        tracing::debug!(
            module = %conflict.module,
            ?resolution,
            "Conflict resolved"
        );
        Ok(resolution)
    }

    /// Decide what to do with orphaned files
    ///
    /// # Errors
    ///
    /// Returns an error if the policy fails to decide.
    pub fn orphans(&mut self, orphans: &OrphanSet) -> Result<OrphanAction> {
        self.policy.orphans(orphans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(Vec<Choice>);

    impl ConflictPolicy for Scripted {
        fn decide(&mut self, _conflict: &ModuleConflict) -> Result<Choice> {
            Ok(self.0.remove(0))
        }
    }

    fn conflict(direction: ConflictDirection) -> ModuleConflict {
        ModuleConflict {
            document: "Drawing.vsdm".to_string(),
            module: "Module1".to_string(),
            path: PathBuf::from("drawing/Module1.bas"),
            direction,
            host_text: "Sub A()\n  x = 1\nEnd Sub".to_string(),
            local_text: "Attribute VB_Name = \"Module1\"\nSub A()\n  x = 2\nEnd Sub\n".to_string(),
        }
    }

    #[test]
    fn test_all_applies_to_rest_of_batch() {
        let mut policy = Scripted(vec![Choice::No, Choice::All]);
        let mut resolver = ConflictResolver::new(&mut policy);
        let c = conflict(ConflictDirection::HostToDisk);

        assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Skip);
        assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Overwrite);
        // The script is exhausted, so these cannot reach the policy
        assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Overwrite);
        assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Overwrite);
    }

    #[test]
    fn test_cancel_is_scoped_to_document() {
        let mut policy = Scripted(vec![Choice::Cancel, Choice::Yes]);
        let mut resolver = ConflictResolver::new(&mut policy);
        let c = conflict(ConflictDirection::HostToDisk);

        assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Cancel);
        assert!(resolver.is_cancelled());
        assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Cancel);

        resolver.begin_document();
        assert!(!resolver.is_cancelled());
        assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Overwrite);
    }

    #[test]
    fn test_skip_all_survives_next_document() {
        let mut policy = Scripted(vec![Choice::SkipAll]);
        let mut resolver = ConflictResolver::new(&mut policy);
        let c = conflict(ConflictDirection::DiskToHost);

        assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Skip);
        resolver.begin_document();
        assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Skip);
    }

    #[test]
    fn test_fixed_policy_from_strategy() {
        assert!(FixedPolicy::from_strategy(ConflictStrategy::Prompt).is_none());

        let mut policy = FixedPolicy::from_strategy(ConflictStrategy::Skip).unwrap();
        let mut resolver = ConflictResolver::new(&mut policy);
        let c = conflict(ConflictDirection::HostToDisk);
        assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Skip);
    }

    #[test]
    fn test_edit_mode_always_overwrites() {
        let mut policy = EditModePolicy;
        let mut resolver = ConflictResolver::new(&mut policy);
        let c = conflict(ConflictDirection::DiskToHost);
        for _ in 0..3 {
            assert_eq!(resolver.resolve(&c).unwrap(), Resolution::Overwrite);
        }
    }

    #[test]
    fn test_diff_labels_follow_direction() {
        let export = conflict(ConflictDirection::HostToDisk).unified_diff();
        assert!(export.starts_with("--- Disk\n+++ Visio\n"));
        assert!(export.contains("-  x = 2"));
        assert!(export.contains("+  x = 1"));
        assert!(!export.contains("Attribute"));

        let import = conflict(ConflictDirection::DiskToHost).unified_diff();
        assert!(import.starts_with("--- Visio\n+++ Disk\n"));
        assert!(import.contains("+  x = 2"));
    }

    #[test]
    fn test_orphans_default_to_keep() {
        let mut policy = EditModePolicy;
        let mut resolver = ConflictResolver::new(&mut policy);
        let set = OrphanSet {
            document: "Drawing.vsdm".to_string(),
            folder: "drawing".to_string(),
            files: vec![PathBuf::from("drawing/Old.bas")],
        };
        assert_eq!(resolver.orphans(&set).unwrap(), OrphanAction::Keep);
    }
}
