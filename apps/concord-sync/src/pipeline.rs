//! Wires the adapters into the two convergence passes.

use std::sync::Arc;

use tracing::info;

use concord_core::record::field;
use concord_core::{
    converge, AbsencePolicy, AdapterError, AdapterResult, PassSummary, ReconcileOptions,
    SnapshotSource,
};
use concord_directory::DirectorySource;
use concord_helpdesk::{
    HelpdeskAssetSink, HelpdeskAssetSource, HelpdeskStore, HelpdeskUserSink, HelpdeskUserSource,
};
use concord_inventory::{
    InventoryClient, InventoryUserSink, InventoryUserSource,
};

use crate::config::AppConfig;

/// Converge the helpdesk asset register on the inventory.
///
/// Assets that left the inventory are deleted from the register, so
/// an empty-looking inventory refuses to run without `allow_teardown`.
pub async fn sync_assets(
    config: &AppConfig,
    dry_run: bool,
    allow_teardown: bool,
) -> AdapterResult<PassSummary> {
    let client = Arc::new(InventoryClient::new(config.inventory.clone())?);
    let store = Arc::new(HelpdeskStore::connect(config.helpdesk.clone()).await?);

    let assets = client
        .fetch_assets()
        .await
        .map_err(|e| AdapterError::source_fetch("inventory", e))?;

    let options = ReconcileOptions::new(AbsencePolicy::Remove).allow_teardown(allow_teardown);
    converge(
        &assets,
        &HelpdeskAssetSource::new(Arc::clone(&store)),
        &HelpdeskAssetSink::new(store),
        &options,
        dry_run,
    )
    .await
}

/// Converge both user targets on the directory.
///
/// The directory snapshot is fetched once and reused; users missing
/// from it are disabled, never deleted. Each target diffs only the
/// fields it stores, minus its exclusions:
/// - the helpdesk keeps no split given/family name and must not flap
///   on them,
/// - the inventory derives classification-adjacent values from the
///   department, handled by the year-or-type reverse mapping.
pub async fn sync_users(
    config: &AppConfig,
    dry_run: bool,
    allow_teardown: bool,
) -> AdapterResult<Vec<PassSummary>> {
    let directory = DirectorySource::new(config.directory.clone())?;
    let users = directory
        .fetch_all()
        .await
        .map_err(|e| AdapterError::source_fetch("directory", e))?;
    info!(users = users.len(), "directory snapshot ready for both targets");

    let mut summaries = Vec::with_capacity(2);

    let store = Arc::new(HelpdeskStore::connect(config.helpdesk.clone()).await?);
    let helpdesk_options = ReconcileOptions::new(AbsencePolicy::Disable)
        .exclude(&[
            field::GIVEN_NAME,
            field::FAMILY_NAME,
            field::CLASSIFICATION,
        ])
        .allow_teardown(allow_teardown);
    summaries.push(
        converge(
            &users,
            &HelpdeskUserSource::new(Arc::clone(&store)),
            &HelpdeskUserSink::new(store),
            &helpdesk_options,
            dry_run,
        )
        .await?,
    );

    let client = Arc::new(InventoryClient::new(config.inventory.clone())?);
    let departments = client.fetch_departments().await?;
    let inventory_options = ReconcileOptions::new(AbsencePolicy::Disable)
        .exclude(&[field::CLASSIFICATION, field::DN, field::DISPLAY_LABEL])
        .allow_teardown(allow_teardown);
    summaries.push(
        converge(
            &users,
            &InventoryUserSource::new(Arc::clone(&client)),
            &InventoryUserSink::new(client, departments),
            &inventory_options,
            dry_run,
        )
        .await?,
    );

    Ok(summaries)
}
