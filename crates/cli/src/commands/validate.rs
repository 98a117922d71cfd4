use std::path::Path;

use attrsync_core::config::AttrSyncConfig;
use attrsync_core::error::AttrSyncError;

/// Run the `validate` command: load the configuration and report every
/// violation found, not just the first.
pub async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = AttrSyncConfig::load(Path::new(config_path))?;

    match config.validate() {
        Ok(()) => {
            if config.group_sync.enabled {
                println!("Configuration is valid.");
                println!("  Managed groups: {}", config.group_sync.managed_groups.len());
                println!("  Mapping rules:  {}", config.group_sync.rules.len());
            } else {
                println!("Configuration parsed. Group sync is disabled.");
            }
            Ok(())
        }
        Err(AttrSyncError::Config(violations)) => {
            eprintln!("Configuration is invalid:");
            for violation in &violations {
                eprintln!("  - {violation}");
            }
            anyhow::bail!("{} violation(s) found", violations.len());
        }
        Err(e) => Err(e.into()),
    }
}
