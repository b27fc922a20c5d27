//! Interactive conflict prompts

use anyhow::{Context, Result};
use dialoguer::Input;
use vbasync_core::sync::{
    Choice, ConflictDirection, ConflictPolicy, ModuleConflict, OrphanAction, OrphanSet,
};

/// User's answer at the conflict prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserChoice {
    /// Overwrite this module
    Yes,
    /// Leave this module alone
    No,
    /// Overwrite this and all remaining conflicts
    All,
    /// Leave this and all remaining conflicts alone
    SkipAll,
    /// Show diff and re-prompt
    Diff,
    /// Stop working on this document
    Quit,
}

impl UserChoice {
    /// Parse a typed answer; empty input means "no"
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(Self::Yes),
            "n" | "no" | "" => Some(Self::No),
            "a" | "all" => Some(Self::All),
            "s" | "skip-all" => Some(Self::SkipAll),
            "d" | "diff" => Some(Self::Diff),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

fn parse_orphan_action(input: &str) -> Option<OrphanAction> {
    match input.trim().to_ascii_lowercase().as_str() {
        "d" | "delete" => Some(OrphanAction::Delete),
        "i" | "import" => Some(OrphanAction::Import),
        "k" | "keep" | "" => Some(OrphanAction::Keep),
        _ => None,
    }
}

/// Conflict policy asking on the terminal
///
/// Batch-wide answers ("all", "skip all") are tracked by the resolver, so
/// the prompter itself is stateless apart from a preset orphan action.
pub struct InteractivePrompter {
    orphans: Option<OrphanAction>,
}

impl InteractivePrompter {
    /// Create a prompter; `orphans` answers the orphan question up front
    #[must_use]
    pub const fn new(orphans: Option<OrphanAction>) -> Self {
        Self { orphans }
    }

    /// Conflict description followed by its diff, shown before each prompt
    fn describe(conflict: &ModuleConflict) -> String {
        let direction = match conflict.direction {
            ConflictDirection::HostToDisk => "Document version differs from local file",
            ConflictDirection::DiskToHost => "Local file differs from document version",
        };
        format!(
            "⚠️  {direction}:\n  Module:   {}\n  Document: {}\n  File:     {}\n\n{}",
            conflict.module,
            conflict.document,
            conflict.path.display(),
            conflict.colored_diff()
        )
    }

    fn show_prompt() -> Result<UserChoice> {
        loop {
            let answer: String = Input::new()
                .with_prompt("Overwrite? [y/n/a/s/d/q] (yes/no/all/skip-all/diff/quit)")
                .allow_empty(true)
                .interact_text()
                .context("Failed to read user input")?;

            match UserChoice::parse(&answer) {
                Some(choice) => return Ok(choice),
                None => println!("Invalid answer. Type y/n/a/s/d/q"),
            }
        }
    }
}

impl ConflictPolicy for InteractivePrompter {
    fn decide(&mut self, conflict: &ModuleConflict) -> Result<Choice> {
        println!("\n{}", Self::describe(conflict));

        loop {
            match Self::show_prompt()? {
                UserChoice::Yes => return Ok(Choice::Yes),
                UserChoice::No => return Ok(Choice::No),
                UserChoice::All => return Ok(Choice::All),
                UserChoice::SkipAll => return Ok(Choice::SkipAll),
                UserChoice::Diff => println!("\n{}", conflict.colored_diff()),
                UserChoice::Quit => return Ok(Choice::Cancel),
            }
        }
    }

    fn orphans(&mut self, orphans: &OrphanSet) -> Result<OrphanAction> {
        if let Some(action) = self.orphans {
            return Ok(action);
        }

        println!(
            "\n⚠️  {} local file(s) in '{}' have no module in {}:",
            orphans.files.len(),
            orphans.folder,
            orphans.document
        );
        for file in &orphans.files {
            println!("  - {}", file.display());
        }

        loop {
            let answer: String = Input::new()
                .with_prompt("[d]elete locally / [i]mport into document / [K]eep")
                .allow_empty(true)
                .interact_text()
                .context("Failed to read user input")?;

            match parse_orphan_action(&answer) {
                Some(action) => return Ok(action),
                None => println!("Invalid answer. Type d/i/k"),
            }
        }
    }
}
