use std::path::Path;
use vbasync_core::host::HostAutomation;

use crate::cli::SyncArgs;
use crate::commands::CommandOptions;
use crate::commands::common::{conflict_policy, print_report, resolve_dir};

pub struct Export;

impl Export {
    pub fn execute(
        sync: &SyncArgs,
        output: Option<&Path>,
        options: &CommandOptions,
    ) -> anyhow::Result<()> {
        let settings = options.settings(sync.config_layer())?;
        let root = resolve_dir(output)?;
        tracing::debug!(?settings, root = %root.display(), "Exporting");

        let mut session = options.open_session(sync, &root, &settings)?;
        println!("📂 Document: {}", sync.file.display());
        println!("📁 Export directory: {}", root.display());
        print!("{}", session.documents()?.summary());

        let _attachment = session.host().attach_thread()?;
        let mut policy = conflict_policy(settings.conflict, sync.orphans);
        let outcome = session.export(policy.as_mut())?;

        print_report(&outcome.report);
        Ok(())
    }
}
