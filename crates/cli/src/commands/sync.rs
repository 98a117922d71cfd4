use std::path::Path;
use std::sync::Arc;

use attrsync_core::cache::LocalDirCache;
use attrsync_core::config::AttrSyncConfig;
use attrsync_sync::audit::ObjectCacheAuditSink;
use attrsync_sync::client::DirectoryClient;
use attrsync_sync::notify::{Notifier, NullNotifier, WebhookNotifier};
use attrsync_sync::sync::GroupSyncEngine;
use tracing::info;

const TOKEN_ENV_VAR: &str = "ATTRSYNC_DIRECTORY_TOKEN";

/// Run the `sync` command: one reconciliation pass against the directory.
pub async fn run(config_path: &str, dry_run: bool) -> anyhow::Result<()> {
    let config = AttrSyncConfig::load(Path::new(config_path))?;
    config.validate()?;

    if !config.group_sync.enabled {
        anyhow::bail!("Group sync is not enabled in configuration. Set group_sync.enabled = true.");
    }

    let auth_token = match config.directory.auth_token.clone() {
        Some(token) => token,
        None => std::env::var(TOKEN_ENV_VAR).map_err(|_| {
            anyhow::anyhow!(
                "directory.auth_token not configured and {TOKEN_ENV_VAR} is not set"
            )
        })?,
    };

    let mut client = DirectoryClient::new(&auth_token, &config.directory.customer_id);
    if let Some(ref base_url) = config.directory.base_url {
        client = client.with_base_url(base_url);
    }

    let cache = Arc::new(LocalDirCache::new(config.cache.dir.clone()));
    let audit = Arc::new(ObjectCacheAuditSink::new(cache.clone(), "audit"));
    let notifier: Arc<dyn Notifier> = match config.notifications.webhook_url {
        Some(ref url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => Arc::new(NullNotifier),
    };

    info!(dry_run, "Starting attribute group sync");

    let engine = GroupSyncEngine::new(client, cache, audit, notifier, config.group_sync.clone());
    let result = engine.perform_sync(dry_run).await;

    println!(
        "Group sync {}!",
        if dry_run { "preview" } else { "completed" }
    );
    println!("  Users evaluated:   {}", result.users_evaluated);
    println!("  Groups processed:  {}", result.groups_processed);
    println!("  Users added:       {}", result.users_added);
    println!("  Users removed:     {}", result.users_removed);
    println!(
        "  Manual detected:   {}",
        result.manual_assignments_detected
    );
    println!(
        "  Manual removed:    {}",
        result.manual_assignments_removed
    );
    if dry_run {
        println!();
        println!("This was a dry run. No changes were made to the directory.");
        println!("Run `attrsync sync` without --dry-run to apply changes.");
    }

    if !result.success {
        eprintln!();
        eprintln!("Completed with {} error(s):", result.error_count());
        for error in &result.errors {
            eprintln!("  - {error}");
        }
        anyhow::bail!("sync finished with {} error(s)", result.error_count());
    }

    Ok(())
}
