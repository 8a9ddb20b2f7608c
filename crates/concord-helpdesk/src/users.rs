//! Synchronized users in the helpdesk.
//!
//! One user spans four tables: `ost_user` (core row), `ost_user_email`
//! (addresses, one of which is the default), `ost_user_account` (login
//! account and status) and a contact-form entry whose values hold the
//! custom attributes under numeric field ids. Writes touching several
//! tables run in one transaction; users that leave the directory are
//! disabled, never deleted, so ticket history stays attached.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;
use tracing::{info, warn};

use concord_core::fields::FieldTable;
use concord_core::record::field;
use concord_core::{
    Action, ActionSink, AdapterError, AdapterResult, Snapshot, SnapshotSource, TargetEntry,
    UserRecord,
};

use crate::store::{now_str, HelpdeskStore};

/// Login-account status values used by the helpdesk.
const ACCOUNT_STATUS_ACTIVE: i32 = 9;
const ACCOUNT_STATUS_DISABLED: i32 = 11;

/// Extra blob written onto created accounts.
const ACCOUNT_EXTRA: &str = r#"{"browser_lang":"en_GB"}"#;

/// Row ids needed to address one helpdesk user again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpdeskUserLinkage {
    pub user_id: u64,
    pub email_id: Option<u64>,
    pub account_id: Option<u64>,
    pub entry_id: Option<u64>,
}

/// One joined row of the user query, before form values are attached.
struct UserRow {
    user_id: u64,
    name: String,
    email_id: Option<u64>,
    email: Option<String>,
    account_id: Option<u64>,
    username: Option<String>,
    account_status: Option<i32>,
    entry_id: Option<u64>,
}

/// Assemble a target entry from a user row and its form values.
///
/// A user without an employee id in the contact form cannot be matched
/// against the directory and is rejected.
fn build_entry(
    row: &UserRow,
    values: &BTreeMap<u32, String>,
    table: &FieldTable,
) -> AdapterResult<TargetEntry<HelpdeskUserLinkage>> {
    let form_value = |name: &str| -> AdapterResult<String> {
        Ok(values.get(&table.id(name)?).cloned().unwrap_or_default())
    };

    let employee_id = form_value(field::EMPLOYEE_ID)?;
    if employee_id.is_empty() {
        return Err(AdapterError::MissingField {
            key: row.name.clone(),
            field: field::EMPLOYEE_ID,
        });
    }

    let linkage = HelpdeskUserLinkage {
        user_id: row.user_id,
        email_id: row.email_id,
        account_id: row.account_id,
        entry_id: row.entry_id,
    };

    let mut entry = TargetEntry::new(employee_id.to_lowercase(), linkage)
        .with_field(field::DISPLAY_LABEL, row.name.clone())
        .with_field(field::EMAIL, row.email.clone().unwrap_or_default())
        .with_field(
            field::ACCOUNT_NAME,
            row.username.clone().unwrap_or_default(),
        )
        .with_field(field::EMPLOYEE_ID, employee_id)
        .with_field(field::DN, form_value(field::DN)?)
        .with_field(field::YEAR_OR_TYPE, form_value(field::YEAR_OR_TYPE)?)
        .with_field(field::TITLE, form_value(field::TITLE)?);

    if row.account_status != Some(ACCOUNT_STATUS_ACTIVE) {
        entry = entry.inactive();
    }
    Ok(entry)
}

impl HelpdeskStore {
    /// Fetch every synchronized user as a target snapshot.
    ///
    /// Two plain queries merged in memory: the joined user row and the
    /// form values. Packing values into the first query would mean
    /// string-aggregating JSON in SQL, which breaks on values that
    /// contain quotes.
    pub async fn fetch_users(
        &self,
    ) -> AdapterResult<Snapshot<TargetEntry<HelpdeskUserLinkage>>> {
        let user_rows = sqlx::query(
            "SELECT u.id AS user_id, u.name, e.id AS email_id, e.address AS email, \
                    a.id AS account_id, a.username, a.status AS account_status, \
                    f.id AS entry_id \
             FROM ost_user u \
             LEFT JOIN ost_user_email e ON e.id = u.default_email_id \
             LEFT JOIN ost_user_account a ON a.user_id = u.id \
             LEFT JOIN ost_form_entry f ON f.object_id = u.id \
                  AND f.object_type = 'U' AND f.form_id = ? \
             WHERE u.org_id = ?",
        )
        .bind(self.config.contact_form_id)
        .bind(self.config.org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AdapterError::database("fetching helpdesk users", e))?;

        let value_rows = sqlx::query(
            "SELECT f.object_id AS user_id, v.field_id, v.value \
             FROM ost_form_entry f \
             JOIN ost_form_entry_values v ON v.entry_id = f.id \
             WHERE f.object_type = 'U' AND f.form_id = ?",
        )
        .bind(self.config.contact_form_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AdapterError::database("fetching helpdesk form values", e))?;

        let mut values_by_user: BTreeMap<u64, BTreeMap<u32, String>> = BTreeMap::new();
        for row in &value_rows {
            let user_id: u64 = row
                .try_get("user_id")
                .map_err(|e| AdapterError::database("decoding form value row", e))?;
            let field_id: u32 = row
                .try_get("field_id")
                .map_err(|e| AdapterError::database("decoding form value row", e))?;
            let value: Option<String> = row
                .try_get("value")
                .map_err(|e| AdapterError::database("decoding form value row", e))?;
            values_by_user
                .entry(user_id)
                .or_default()
                .insert(field_id, value.unwrap_or_default());
        }

        let empty = BTreeMap::new();
        let mut snapshot = Snapshot::new();
        let mut skipped = 0usize;

        for row in &user_rows {
            let user = UserRow {
                user_id: row
                    .try_get("user_id")
                    .map_err(|e| AdapterError::database("decoding user row", e))?,
                name: row
                    .try_get("name")
                    .map_err(|e| AdapterError::database("decoding user row", e))?,
                email_id: row
                    .try_get("email_id")
                    .map_err(|e| AdapterError::database("decoding user row", e))?,
                email: row
                    .try_get("email")
                    .map_err(|e| AdapterError::database("decoding user row", e))?,
                account_id: row
                    .try_get("account_id")
                    .map_err(|e| AdapterError::database("decoding user row", e))?,
                username: row
                    .try_get("username")
                    .map_err(|e| AdapterError::database("decoding user row", e))?,
                account_status: row
                    .try_get("account_status")
                    .map_err(|e| AdapterError::database("decoding user row", e))?,
                entry_id: row
                    .try_get("entry_id")
                    .map_err(|e| AdapterError::database("decoding user row", e))?,
            };

            let values = values_by_user.get(&user.user_id).unwrap_or(&empty);
            match build_entry(&user, values, &self.config.user_fields) {
                Ok(entry) => {
                    let key = entry.key.clone();
                    if snapshot.insert(entry).is_some() {
                        warn!(key = %key, "duplicate employee id in helpdesk, keeping last row");
                    }
                }
                Err(e) => {
                    warn!(user_id = user.user_id, error = %e, "rejecting helpdesk user row");
                    skipped += 1;
                }
            }
        }

        info!(
            users = snapshot.len(),
            skipped, "helpdesk user snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Create a user with email, login account and contact-form entry
    /// in one transaction.
    pub async fn create_user(&self, user: &UserRecord) -> AdapterResult<()> {
        let now = now_str();
        let mut tx = self.pool.begin().await.map_err(|e| {
            AdapterError::database(format!("starting create for {}", user.employee_id), e)
        })?;

        let wrap = |e: sqlx::Error| {
            AdapterError::database(format!("creating helpdesk user {}", user.employee_id), e)
        };

        let user_id = sqlx::query(
            "INSERT INTO ost_user (org_id, default_email_id, status, name, created, updated) \
             VALUES (?, 0, 0, ?, ?, ?)",
        )
        .bind(self.config.org_id)
        .bind(&user.display_label)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(wrap)?
        .last_insert_id();

        let email_id = sqlx::query(
            "INSERT INTO ost_user_email (user_id, flags, address) VALUES (?, 0, ?)",
        )
        .bind(user_id)
        .bind(&user.email)
        .execute(&mut *tx)
        .await
        .map_err(wrap)?
        .last_insert_id();

        sqlx::query("UPDATE ost_user SET default_email_id = ? WHERE id = ?")
            .bind(email_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(wrap)?;

        sqlx::query(
            "INSERT INTO ost_user_account \
             (user_id, status, timezone, username, backend, extra, registered) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(ACCOUNT_STATUS_ACTIVE)
        .bind(&self.config.timezone)
        .bind(&user.account_name)
        .bind(&self.config.auth_backend)
        .bind(ACCOUNT_EXTRA)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(wrap)?;

        let entry_id = sqlx::query(
            "INSERT INTO ost_form_entry (form_id, object_id, object_type, sort, created, updated) \
             VALUES (?, ?, 'U', 1, ?, ?)",
        )
        .bind(self.config.contact_form_id)
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(wrap)?
        .last_insert_id();

        for (name, value) in form_values(user) {
            sqlx::query(
                "INSERT INTO ost_form_entry_values (entry_id, field_id, value) VALUES (?, ?, ?)",
            )
            .bind(entry_id)
            .bind(self.config.user_fields.id(name)?)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(wrap)?;
        }

        self.write_search_row(&mut tx, user_id, user).await?;

        tx.commit().await.map_err(wrap)?;
        Ok(())
    }

    /// Rewrite a user from the authoritative record, reactivating the
    /// account if it was disabled. Missing email, account or form rows
    /// are recreated so a partially provisioned user self-heals.
    pub async fn update_user(
        &self,
        linkage: &HelpdeskUserLinkage,
        user: &UserRecord,
    ) -> AdapterResult<()> {
        let now = now_str();
        let mut tx = self.pool.begin().await.map_err(|e| {
            AdapterError::database(format!("starting update for {}", user.employee_id), e)
        })?;

        let wrap = |e: sqlx::Error| {
            AdapterError::database(format!("updating helpdesk user {}", user.employee_id), e)
        };

        sqlx::query("UPDATE ost_user SET name = ?, updated = ? WHERE id = ?")
            .bind(&user.display_label)
            .bind(&now)
            .bind(linkage.user_id)
            .execute(&mut *tx)
            .await
            .map_err(wrap)?;

        match linkage.email_id {
            Some(email_id) => {
                sqlx::query("UPDATE ost_user_email SET address = ? WHERE id = ?")
                    .bind(&user.email)
                    .bind(email_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(wrap)?;
            }
            None => {
                let email_id = sqlx::query(
                    "INSERT INTO ost_user_email (user_id, flags, address) VALUES (?, 0, ?)",
                )
                .bind(linkage.user_id)
                .bind(&user.email)
                .execute(&mut *tx)
                .await
                .map_err(wrap)?
                .last_insert_id();
                sqlx::query("UPDATE ost_user SET default_email_id = ? WHERE id = ?")
                    .bind(email_id)
                    .bind(linkage.user_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(wrap)?;
            }
        }

        match linkage.account_id {
            Some(account_id) => {
                sqlx::query("UPDATE ost_user_account SET username = ?, status = ? WHERE id = ?")
                    .bind(&user.account_name)
                    .bind(ACCOUNT_STATUS_ACTIVE)
                    .bind(account_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(wrap)?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO ost_user_account \
                     (user_id, status, timezone, username, backend, extra, registered) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(linkage.user_id)
                .bind(ACCOUNT_STATUS_ACTIVE)
                .bind(&self.config.timezone)
                .bind(&user.account_name)
                .bind(&self.config.auth_backend)
                .bind(ACCOUNT_EXTRA)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(wrap)?;
            }
        }

        let entry_id = match linkage.entry_id {
            Some(entry_id) => {
                sqlx::query("UPDATE ost_form_entry SET updated = ? WHERE id = ?")
                    .bind(&now)
                    .bind(entry_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(wrap)?;
                entry_id
            }
            None => sqlx::query(
                "INSERT INTO ost_form_entry \
                 (form_id, object_id, object_type, sort, created, updated) \
                 VALUES (?, ?, 'U', 1, ?, ?)",
            )
            .bind(self.config.contact_form_id)
            .bind(linkage.user_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(wrap)?
            .last_insert_id(),
        };

        for (name, value) in form_values(user) {
            let field_id = self.config.user_fields.id(name)?;
            // Probe first: an UPDATE that writes the same value back
            // reports zero affected rows, indistinguishable from a
            // missing row.
            let existing = sqlx::query(
                "SELECT value FROM ost_form_entry_values WHERE entry_id = ? AND field_id = ?",
            )
            .bind(entry_id)
            .bind(field_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(wrap)?;

            match existing {
                Some(row) => {
                    let current: Option<String> = row.try_get("value").map_err(wrap)?;
                    if current.as_deref() != Some(value.as_str()) {
                        sqlx::query(
                            "UPDATE ost_form_entry_values SET value = ? \
                             WHERE entry_id = ? AND field_id = ?",
                        )
                        .bind(&value)
                        .bind(entry_id)
                        .bind(field_id)
                        .execute(&mut *tx)
                        .await
                        .map_err(wrap)?;
                    }
                }
                None => {
                    sqlx::query(
                        "INSERT INTO ost_form_entry_values (entry_id, field_id, value) \
                         VALUES (?, ?, ?)",
                    )
                    .bind(entry_id)
                    .bind(field_id)
                    .bind(&value)
                    .execute(&mut *tx)
                    .await
                    .map_err(wrap)?;
                }
            }
        }

        self.write_search_row(&mut tx, linkage.user_id, user).await?;

        tx.commit().await.map_err(wrap)?;
        Ok(())
    }

    /// Disable a user's login account. The user row and its tickets
    /// are kept.
    pub async fn disable_user(&self, linkage: &HelpdeskUserLinkage) -> AdapterResult<()> {
        let Some(account_id) = linkage.account_id else {
            warn!(
                user_id = linkage.user_id,
                "user has no login account, nothing to disable"
            );
            return Ok(());
        };

        sqlx::query("UPDATE ost_user_account SET status = ? WHERE id = ?")
            .bind(ACCOUNT_STATUS_DISABLED)
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AdapterError::database(format!("disabling helpdesk user {}", linkage.user_id), e)
            })?;
        Ok(())
    }

    /// Keep the helpdesk's search index in step with the user tables.
    async fn write_search_row(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
        user_id: u64,
        user: &UserRecord,
    ) -> AdapterResult<()> {
        sqlx::query(
            "REPLACE INTO ost__search (object_type, object_id, title, content) \
             VALUES ('U', ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&user.display_label)
        .bind(format!(
            "{} {} {}",
            user.email, user.account_name, user.employee_id
        ))
        .execute(&mut **tx)
        .await
        .map_err(|e| AdapterError::database(format!("updating search row for {user_id}"), e))?;
        Ok(())
    }
}

/// Canonical fields written into the contact form.
fn form_values(user: &UserRecord) -> [(&'static str, String); 4] {
    [
        (field::DN, user.dn.clone()),
        (field::EMPLOYEE_ID, user.employee_id.clone()),
        (field::YEAR_OR_TYPE, user.year_or_type.clone()),
        (field::TITLE, user.title.clone()),
    ]
}

/// Target-side view of helpdesk users.
pub struct HelpdeskUserSource {
    store: Arc<HelpdeskStore>,
}

impl HelpdeskUserSource {
    pub fn new(store: Arc<HelpdeskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SnapshotSource for HelpdeskUserSource {
    type Record = TargetEntry<HelpdeskUserLinkage>;

    fn system(&self) -> &'static str {
        "helpdesk"
    }

    async fn fetch_all(&self) -> AdapterResult<Snapshot<TargetEntry<HelpdeskUserLinkage>>> {
        self.store.fetch_users().await
    }
}

/// Applies user actions against the helpdesk. Users are never removed.
pub struct HelpdeskUserSink {
    store: Arc<HelpdeskStore>,
}

impl HelpdeskUserSink {
    pub fn new(store: Arc<HelpdeskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActionSink<UserRecord, HelpdeskUserLinkage> for HelpdeskUserSink {
    fn system(&self) -> &'static str {
        "helpdesk"
    }

    async fn apply(&self, action: &Action<UserRecord, HelpdeskUserLinkage>) -> AdapterResult<()> {
        match action {
            Action::Create { record } => self.store.create_user(record).await,
            Action::Update {
                linkage, record, ..
            } => self.store.update_user(linkage, record).await,
            Action::Disable { linkage, .. } => self.store.disable_user(linkage).await,
            Action::Remove { .. } => Err(AdapterError::UnsupportedAction {
                system: "helpdesk",
                operation: "remove (users are disabled, not deleted)",
            }),
        }
    }
}
