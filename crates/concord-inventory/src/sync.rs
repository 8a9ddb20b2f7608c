//! Source and sink adapters over [`InventoryClient`].
//!
//! The inventory plays both roles: authoritative source for assets and
//! convergence target for users. The user sink never deletes accounts,
//! it only disables them, so a removal request is an error.

use std::sync::Arc;

use async_trait::async_trait;

use concord_core::{
    Action, ActionSink, AdapterError, AdapterResult, AssetRecord, Snapshot, SnapshotSource,
    TargetEntry, UserRecord,
};

use crate::client::{DepartmentIndex, InventoryClient, InventoryUserId};

/// Authoritative asset source.
pub struct InventoryAssetSource {
    client: Arc<InventoryClient>,
}

impl InventoryAssetSource {
    pub fn new(client: Arc<InventoryClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotSource for InventoryAssetSource {
    type Record = AssetRecord;

    fn system(&self) -> &'static str {
        "inventory"
    }

    async fn fetch_all(&self) -> AdapterResult<Snapshot<AssetRecord>> {
        self.client.fetch_assets().await
    }
}

/// Target-side view of inventory user accounts.
pub struct InventoryUserSource {
    client: Arc<InventoryClient>,
}

impl InventoryUserSource {
    pub fn new(client: Arc<InventoryClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotSource for InventoryUserSource {
    type Record = TargetEntry<InventoryUserId>;

    fn system(&self) -> &'static str {
        "inventory"
    }

    async fn fetch_all(&self) -> AdapterResult<Snapshot<TargetEntry<InventoryUserId>>> {
        self.client.fetch_users().await
    }
}

/// Applies user actions against the inventory API.
pub struct InventoryUserSink {
    client: Arc<InventoryClient>,
    departments: DepartmentIndex,
}

impl InventoryUserSink {
    /// The department index is fetched once per pass and passed in so
    /// every write resolves names without extra requests.
    pub fn new(client: Arc<InventoryClient>, departments: DepartmentIndex) -> Self {
        Self {
            client,
            departments,
        }
    }
}

#[async_trait]
impl ActionSink<UserRecord, InventoryUserId> for InventoryUserSink {
    fn system(&self) -> &'static str {
        "inventory"
    }

    async fn apply(&self, action: &Action<UserRecord, InventoryUserId>) -> AdapterResult<()> {
        match action {
            Action::Create { record } => self.client.create_user(record, &self.departments).await,
            Action::Update {
                linkage, record, ..
            } => {
                self.client
                    .update_user(*linkage, record, &self.departments)
                    .await
            }
            Action::Disable { linkage, .. } => {
                self.client.disable_user(*linkage, &self.departments).await
            }
            Action::Remove { .. } => Err(AdapterError::UnsupportedAction {
                system: "inventory",
                operation: "remove",
            }),
        }
    }
}
