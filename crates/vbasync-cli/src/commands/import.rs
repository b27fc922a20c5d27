use std::path::Path;
use vbasync_core::host::HostAutomation;

use crate::cli::SyncArgs;
use crate::commands::CommandOptions;
use crate::commands::common::{conflict_policy, print_report, resolve_dir};

pub struct Import;

impl Import {
    pub fn execute(
        sync: &SyncArgs,
        input: Option<&Path>,
        options: &CommandOptions,
    ) -> anyhow::Result<()> {
        let settings = options.settings(sync.config_layer())?;
        let root = resolve_dir(input)?;
        if !root.is_dir() {
            anyhow::bail!("Import directory not found: {}", root.display());
        }
        tracing::debug!(?settings, root = %root.display(), "Importing");

        let mut session = options.open_session(sync, &root, &settings)?;
        println!("📂 Document: {}", sync.file.display());
        println!("📁 Import directory: {}", root.display());

        let _attachment = session.host().attach_thread()?;
        let mut policy = conflict_policy(settings.conflict, sync.orphans);
        let report = session.import_batch(policy.as_mut())?;

        print_report(&report);
        Ok(())
    }
}
