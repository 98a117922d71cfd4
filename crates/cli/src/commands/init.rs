use std::path::Path;

use attrsync_core::config::AttrSyncConfig;
use tracing::info;

/// Run the `init` command: create the target directory and write a default
/// configuration file for editing.
pub async fn run(dir: &str) -> anyhow::Result<()> {
    let dir_path = Path::new(dir);

    if !dir_path.exists() {
        std::fs::create_dir_all(dir_path)?;
        info!("Created directory: {}", dir);
    }

    let config_path = dir_path.join("attrsync.toml");
    if config_path.exists() {
        anyhow::bail!(
            "Configuration already exists at {}. Remove it first to re-initialize.",
            config_path.display()
        );
    }

    let config = AttrSyncConfig::generate_default();
    let toml_str = toml::to_string_pretty(&config)?;
    std::fs::write(&config_path, &toml_str)?;
    info!("Wrote configuration to {}", config_path.display());

    println!("AttrSync initialized!");
    println!("  Configuration: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Edit {} with your directory customer ID and mapping rules",
        config_path.display()
    );
    println!("  2. Set the API token in the config or the ATTRSYNC_DIRECTORY_TOKEN environment variable");
    println!("  3. Set group_sync.enabled = true");
    println!("  4. Run `attrsync validate` to check the configuration");
    println!("  5. Run `attrsync sync --dry-run` to preview the first reconciliation");

    Ok(())
}
