use std::fmt::Write;

use vbasync_core::config::{ConfigDiscovery, Settings};

use crate::commands::CommandOptions;

pub struct Config;

impl Config {
    pub fn execute(options: &CommandOptions) -> anyhow::Result<()> {
        let mut output = String::from("=== Configuration ===\n");

        if options.no_config {
            output.push_str("Config files: ignored (--no-config)\n");
        } else {
            let files = ConfigDiscovery::discover(options.config_path)?;
            let found = files.found();
            if found.is_empty() {
                output.push_str("Config files: none found\n");
            } else {
                output.push_str("Config files (highest precedence first):\n");
                for (label, path) in found {
                    writeln!(output, "  {label}: {}", path.display())
                        .expect("Writing to String should never fail");
                }
            }
        }

        let settings = options.load_config()?.settings();
        output.push_str("\nEffective settings:\n");
        Self::render_settings(&mut output, &settings);

        match options.host_state {
            Some(path) => writeln!(output, "\nHost state: {}", path.display()),
            None => writeln!(output, "\nHost state: not set"),
        }
        .expect("Writing to String should never fail");

        print!("{output}");
        Ok(())
    }

    fn render_settings(output: &mut String, settings: &Settings) {
        let codepage = settings.codepage.as_deref().unwrap_or("auto");
        for (key, value) in [
            ("codepage", codepage.to_string()),
            ("hierarchical", settings.hierarchical.to_string()),
            ("force_document", settings.force_document.to_string()),
            ("conflict", format!("{:?}", settings.conflict).to_lowercase()),
            ("sync_delete", settings.sync_delete.to_string()),
            ("bidirectional", settings.bidirectional.to_string()),
            ("poll_interval_secs", settings.poll_interval_secs.to_string()),
            ("debounce_ms", settings.debounce_ms.to_string()),
        ] {
            writeln!(output, "  {key}: {value}").expect("Writing to String should never fail");
        }
    }
}
