use std::path::Path;
use vbasync_core::host::HostAutomation;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use vbasync_core::sync::{RemovalOutcome, SyncReport};
use vbasync_core::watch::{ChangeWatcher, WatchEvent, WatchOptions};

use crate::cli::SyncArgs;
use crate::commands::CommandOptions;
use crate::commands::common::{conflict_policy, print_events, print_report, resolve_dir};

/// Watcher flags of the edit command
pub struct EditArgs<'a> {
    pub output: Option<&'a Path>,
    pub sync_delete: bool,
    pub no_bidirectional: bool,
    pub poll_interval: Option<u64>,
}

pub struct Edit;

impl Edit {
    pub fn execute(
        sync: &SyncArgs,
        args: &EditArgs,
        options: &CommandOptions,
        stop: &Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        let mut layer = sync.config_layer();
        layer.sync_delete = args.sync_delete.then_some(true);
        layer.bidirectional = args.no_bidirectional.then_some(false);
        layer.poll_interval_secs = args.poll_interval;
        let settings = options.settings(layer)?;

        let root = resolve_dir(args.output)?;
        let mut session = options.open_session(sync, &root, &settings)?;
        println!("📂 Document: {}", sync.file.display());
        println!("📁 Export directory: {}", root.display());

        println!("\n=== Exporting VBA modules ===");
        {
            let _attachment = session.host().attach_thread()?;
            let mut policy = conflict_policy(settings.conflict, sync.orphans);
            let outcome = session.export(policy.as_mut())?;
            print_report(&outcome.report);
        }

        println!("=== Live sync started (Ctrl+C to stop) ===");
        if !settings.bidirectional {
            println!("Document polling is off, only local edits are pushed");
        }

        let watcher = ChangeWatcher::new(session, WatchOptions::from_settings(&settings));
        watcher.run(stop, print_watch_event)?;

        println!("Live sync stopped");
        Ok(())
    }
}

fn print_watch_event(event: &WatchEvent) {
    match event {
        WatchEvent::Imported { path, outcome } => {
            let mut report = SyncReport::default();
            outcome.record(&mut report, path.display().to_string());
            print_events(&report);
        }
        WatchEvent::Removed { path, outcome } => match outcome {
            RemovalOutcome::Removed { module } => {
                println!("✗ Removed from host: {module} ({})", path.display());
            }
            RemovalOutcome::Protected { module } => {
                println!("⚠ Not removed: {module} is the document module");
            }
            RemovalOutcome::Empty { .. } | RemovalOutcome::NotFound | RemovalOutcome::Unmapped => {
                tracing::debug!(file = %path.display(), ?outcome, "Deletion not applied");
            }
        },
        WatchEvent::Exported(report) => print_events(report),
        WatchEvent::Failed { context, error } => eprintln!("✗✗ Failed: {context} ({error})"),
    }
}
