//! Directory snapshot source.
//!
//! One subtree search per pass, mapped into canonical [`UserRecord`]s.
//! Entries without an employee id cannot be matched in any downstream
//! system, so they are rejected here with a warning and counted.

use std::collections::HashMap;

use async_trait::async_trait;
use ldap3::{LdapConnAsync, Scope, SearchEntry};
use tracing::{debug, info, warn};

use concord_core::record::field;
use concord_core::{mapper, AdapterError, AdapterResult, Keyed, Snapshot, SnapshotSource, UserRecord};

use crate::config::DirectoryConfig;

/// Attributes requested from the directory for every entry.
pub const DIRECTORY_ATTRS: &[&str] = &[
    "givenName",
    "sn",
    "sAMAccountName",
    "mail",
    "extensionAttribute1",
    "employeeType",
    "employeeID",
    "title",
    "distinguishedName",
    "cn",
];

/// LDAP result code for invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Source adapter for the directory service.
pub struct DirectorySource {
    config: DirectoryConfig,
}

impl DirectorySource {
    pub fn new(config: DirectoryConfig) -> AdapterResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    async fn connect(&self) -> AdapterResult<ldap3::Ldap> {
        debug!(url = %self.config.url, "connecting to directory");
        let (conn, mut ldap) = LdapConnAsync::new(&self.config.url)
            .await
            .map_err(|e| AdapterError::directory(format!("connect to {}", self.config.url), e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "directory connection driver error");
            }
        });

        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(|e| AdapterError::directory(format!("bind as {}", self.config.bind_dn), e))?;

        if result.rc == RC_INVALID_CREDENTIALS {
            return Err(AdapterError::AuthenticationFailed);
        }
        if result.rc != 0 {
            return Err(AdapterError::Directory {
                message: format!("bind failed with code {}: {}", result.rc, result.text),
                source: None,
            });
        }

        Ok(ldap)
    }
}

#[async_trait]
impl SnapshotSource for DirectorySource {
    type Record = UserRecord;

    fn system(&self) -> &'static str {
        "directory"
    }

    async fn fetch_all(&self) -> AdapterResult<Snapshot<UserRecord>> {
        let mut ldap = self.connect().await?;

        let (entries, _result) = ldap
            .search(
                &self.config.search_base,
                Scope::Subtree,
                &self.config.search_filter,
                DIRECTORY_ATTRS.to_vec(),
            )
            .await
            .map_err(|e| AdapterError::directory("user search", e))?
            .success()
            .map_err(|e| AdapterError::directory("user search result", e))?;

        let mut snapshot = Snapshot::new();
        let mut rejected = 0usize;

        for entry in entries {
            let entry = SearchEntry::construct(entry);
            match map_entry(&entry.attrs) {
                Ok(user) => {
                    let key = user.business_key();
                    if snapshot.insert(user).is_some() {
                        warn!(key = %key, "duplicate employee id in directory, keeping last entry");
                    }
                }
                Err(e) => {
                    warn!(dn = %entry.dn, error = %e, "rejecting directory entry");
                    rejected += 1;
                }
            }
        }

        let _ = ldap.unbind().await;

        info!(
            users = snapshot.len(),
            rejected,
            "directory snapshot loaded"
        );
        Ok(snapshot)
    }
}

/// Map one directory entry's attributes into a canonical user record.
///
/// Normalization: names are title-cased, the account name lowercased,
/// and the year-or-type / display-label composites are derived here so
/// every downstream comparison sees the same values.
pub fn map_entry(attrs: &HashMap<String, Vec<String>>) -> AdapterResult<UserRecord> {
    let first = |name: &str| -> &str {
        attrs
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or("")
    };

    let employee_id = first("employeeID");
    if employee_id.is_empty() {
        return Err(AdapterError::MissingField {
            key: first("distinguishedName").to_string(),
            field: field::EMPLOYEE_ID,
        });
    }

    let classification = first("employeeType");
    let year_or_type = mapper::year_or_type(classification, first("extensionAttribute1"));
    let display_label = mapper::display_label(first("cn"), &year_or_type);

    Ok(UserRecord {
        given_name: mapper::title_case(first("givenName")),
        family_name: mapper::title_case(first("sn")),
        account_name: first("sAMAccountName").to_lowercase(),
        email: first("mail").to_string(),
        employee_id: employee_id.to_string(),
        classification: classification.to_string(),
        year_or_type,
        title: first("title").to_string(),
        dn: first("distinguishedName").to_string(),
        display_label,
    })
}
