//! HTTP client for the asset-inventory API.
//!
//! List endpoints are paginated; every page costs one read token and
//! every mutation one write token. The API escapes text fields with
//! HTML entities in its JSON payloads and reports some failures inside
//! a `200` body, so both are handled here and nowhere else.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use concord_core::record::field;
use concord_core::{mapper, AdapterError, AdapterResult, AssetRecord, Snapshot, TargetEntry, UserRecord};

use crate::config::InventoryConfig;
use crate::rate_limit::RateLimiter;

/// Path prefix of every API endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// Department that disabled users are moved into.
pub const INACTIVE_DEPARTMENT: &str = "Inactive Users";

/// Job title written on disable.
const INACTIVE_TITLE: &str = "Inactive User";

/// Department name prefix for student year groups.
const STUDENT_DEPARTMENT_PREFIX: &str = "Students - Year ";

/// Placeholder password: accounts authenticate against the directory,
/// the local credential is never used.
const PLACEHOLDER_PASSWORD: &str = "directory-managed-no-local-login";

/// Linkage for an inventory user: its numeric account id.
pub type InventoryUserId = u64;

#[derive(Debug, Deserialize)]
struct Page<T> {
    total: u64,
    rows: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct AssetRow {
    id: u64,
    #[serde(default)]
    asset_tag: Option<String>,
    #[serde(default)]
    serial: Option<String>,
    #[serde(default)]
    model: Option<Named>,
    #[serde(default)]
    manufacturer: Option<Named>,
    #[serde(default)]
    status_label: Option<Named>,
    #[serde(default)]
    category: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: u64,
    #[serde(default)]
    employee_num: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    jobtitle: Option<String>,
    #[serde(default)]
    department: Option<Named>,
    #[serde(default)]
    activated: bool,
}

#[derive(Debug, Deserialize)]
struct DepartmentRow {
    id: u64,
    name: String,
}

/// Department names mapped to their inventory ids, resolved once per
/// pass so user writes never trigger extra lookups.
#[derive(Debug, Default, Clone)]
pub struct DepartmentIndex {
    by_name: BTreeMap<String, u64>,
}

impl DepartmentIndex {
    pub fn resolve(&self, name: &str) -> Option<u64> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// The department a user belongs in, derived from the authoritative
/// record: students go into their year group, everyone else into a
/// department named after their classification.
pub fn department_name(user: &UserRecord) -> String {
    if user.classification == mapper::STUDENT_CLASSIFICATION {
        format!("{STUDENT_DEPARTMENT_PREFIX}{}", user.year_or_type)
    } else {
        mapper::title_case(&user.classification)
    }
}

/// Inverse of the department naming rule, used when reading users back
/// so year changes surface as field diffs.
fn year_or_type_from_department(name: &str) -> String {
    name.strip_prefix(STUDENT_DEPARTMENT_PREFIX)
        .unwrap_or(name)
        .to_string()
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Client for the inventory API, throttled per its read/write quotas.
pub struct InventoryClient {
    config: InventoryConfig,
    client: Client,
    read_limiter: RateLimiter,
    write_limiter: RateLimiter,
}

impl InventoryClient {
    pub fn new(config: InventoryConfig) -> AdapterResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AdapterError::invalid_configuration(format!("failed to build HTTP client: {e}"))
            })?;

        let read_limiter = RateLimiter::new(config.read_limit);
        let write_limiter = RateLimiter::new(config.write_limit);

        Ok(Self {
            config,
            client,
            read_limiter,
            write_limiter,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{API_PREFIX}{path}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Read the body and surface API errors. The server reports some
    /// failures inside a `200` response with `"status": "error"`.
    async fn check_response(&self, response: Response, context: String) -> AdapterResult<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::http(format!("{context}: reading body"), e))?;

        if !status.is_success() {
            return Err(AdapterError::HttpStatus {
                status: status.as_u16(),
                body,
                context,
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|_| AdapterError::HttpStatus {
            status: status.as_u16(),
            body: body.clone(),
            context: context.clone(),
        })?;

        if value.get("status").and_then(Value::as_str) == Some("error") {
            return Err(AdapterError::HttpStatus {
                status: status.as_u16(),
                body,
                context,
            });
        }

        Ok(value)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        offset: u64,
        extra: &[(&str, &str)],
    ) -> AdapterResult<Page<T>> {
        self.read_limiter.acquire().await;
        let context = format!("GET {API_PREFIX}{path} offset={offset}");
        debug!(%context, "inventory request");

        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.config.token)
            .query(&[
                ("limit", u64::from(self.config.page_size)),
                ("offset", offset),
            ])
            .query(extra)
            .send()
            .await
            .map_err(|e| AdapterError::http(context.clone(), e))?;

        let value = self.check_response(response, context.clone()).await?;
        serde_json::from_value(value).map_err(|e| AdapterError::Serialization {
            message: format!("{context}: {e}"),
        })
    }

    /// Walk a paginated list endpoint to exhaustion.
    ///
    /// A listing that ends before the server's own `total` is a failed
    /// fetch, not a smaller snapshot: treating it as complete would
    /// read as records having disappeared upstream.
    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> AdapterResult<Vec<T>> {
        let mut rows: Vec<T> = Vec::new();
        loop {
            let page: Page<T> = self.get_page(path, rows.len() as u64, extra).await?;
            let got = page.rows.len();
            rows.extend(page.rows);
            if rows.len() as u64 >= page.total {
                return Ok(rows);
            }
            if got == 0 {
                return Err(AdapterError::SourceFetch {
                    system: "inventory",
                    message: format!(
                        "{API_PREFIX}{path}: server reported {} rows but the listing \
                         ended after {}",
                        page.total,
                        rows.len()
                    ),
                    source: None,
                });
            }
        }
    }

    /// Fetch the authoritative asset snapshot.
    pub async fn fetch_assets(&self) -> AdapterResult<Snapshot<AssetRecord>> {
        let rows: Vec<AssetRow> = self.fetch_rows("/hardware", &[]).await?;

        let named = |n: &Option<Named>| -> String {
            n.as_ref()
                .map(|n| mapper::unescape_html(&n.name))
                .unwrap_or_default()
        };

        let mut snapshot = Snapshot::new();
        for row in &rows {
            let record = AssetRecord {
                inventory_id: row.id,
                manufacturer: named(&row.manufacturer),
                model: named(&row.model),
                status: named(&row.status_label),
                serial_number: mapper::unescape_html(row.serial.as_deref().unwrap_or("")),
                asset_tag: mapper::unescape_html(row.asset_tag.as_deref().unwrap_or("")),
                item_type: named(&row.category),
            };
            snapshot.insert(record);
        }

        info!(assets = snapshot.len(), "inventory asset snapshot loaded");
        Ok(snapshot)
    }

    /// Fetch the inventory's view of synchronized users as a target
    /// snapshot. Local service accounts and rows without an employee
    /// number are not synchronized and are skipped.
    pub async fn fetch_users(&self) -> AdapterResult<Snapshot<TargetEntry<InventoryUserId>>> {
        // A stable sort keeps offset pagination consistent while rows
        // are being inserted or removed between pages.
        let rows: Vec<UserRow> = self
            .fetch_rows(
                "/users",
                &[("sort", "last_name"), ("order", "asc"), ("all", "true")],
            )
            .await?;

        let mut snapshot = Snapshot::new();
        let mut skipped = 0usize;

        for row in &rows {
            let username = row.username.as_deref().unwrap_or("");
            if self
                .config
                .ignored_usernames
                .iter()
                .any(|ignored| ignored.eq_ignore_ascii_case(username))
            {
                debug!(username, "skipping ignored inventory account");
                skipped += 1;
                continue;
            }

            let employee_num = row.employee_num.as_deref().unwrap_or("");
            if employee_num.is_empty() {
                warn!(
                    username,
                    id = row.id,
                    "inventory user has no employee number, skipping"
                );
                skipped += 1;
                continue;
            }

            let text = |v: &Option<String>| mapper::unescape_html(v.as_deref().unwrap_or(""));
            let department = row
                .department
                .as_ref()
                .map(|d| mapper::unescape_html(&d.name))
                .unwrap_or_default();

            let mut entry = TargetEntry::new(employee_num.to_lowercase(), row.id)
                .with_field(field::GIVEN_NAME, text(&row.first_name))
                .with_field(field::FAMILY_NAME, text(&row.last_name))
                .with_field(field::ACCOUNT_NAME, mapper::unescape_html(username))
                .with_field(field::EMAIL, text(&row.email))
                .with_field(field::EMPLOYEE_ID, employee_num)
                .with_field(field::TITLE, text(&row.jobtitle))
                .with_field(
                    field::YEAR_OR_TYPE,
                    year_or_type_from_department(&department),
                );
            if !row.activated {
                entry = entry.inactive();
            }

            let key = entry.key.clone();
            if snapshot.insert(entry).is_some() {
                warn!(key = %key, "duplicate employee number in inventory, keeping last row");
            }
        }

        info!(
            users = snapshot.len(),
            skipped, "inventory user snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Fetch the department table once per pass.
    pub async fn fetch_departments(&self) -> AdapterResult<DepartmentIndex> {
        let rows: Vec<DepartmentRow> = self.fetch_rows("/departments", &[]).await?;
        let by_name = rows
            .into_iter()
            .map(|row| (mapper::unescape_html(&row.name).to_lowercase(), row.id))
            .collect();
        let index = DepartmentIndex { by_name };
        info!(departments = index.len(), "inventory departments loaded");
        Ok(index)
    }

    async fn send_write(
        &self,
        request: reqwest::RequestBuilder,
        context: String,
    ) -> AdapterResult<()> {
        self.write_limiter.acquire().await;
        debug!(%context, "inventory write");
        let response = request
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| AdapterError::http(context.clone(), e))?;
        self.check_response(response, context).await?;
        Ok(())
    }

    fn user_payload(
        &self,
        user: &UserRecord,
        departments: &DepartmentIndex,
    ) -> AdapterResult<Value> {
        let department = department_name(user);
        let department_id = departments.resolve(&department).ok_or_else(|| {
            AdapterError::invalid_record(format!(
                "user {}: department '{department}' does not exist in the inventory",
                user.employee_id
            ))
        })?;

        Ok(json!({
            "first_name": user.given_name,
            "last_name": user.family_name,
            "username": user.account_name,
            "email": user.email,
            "employee_num": user.employee_id,
            "jobtitle": user.title,
            "department_id": department_id,
            "activated": true,
            "ldap_import": true,
        }))
    }

    pub async fn create_user(
        &self,
        user: &UserRecord,
        departments: &DepartmentIndex,
    ) -> AdapterResult<()> {
        let mut payload = self.user_payload(user, departments)?;
        payload["password"] = json!(PLACEHOLDER_PASSWORD);
        payload["password_confirmation"] = json!(PLACEHOLDER_PASSWORD);
        payload["notes"] = json!(format!("User created: {}", timestamp()));

        self.send_write(
            self.client.post(self.url("/users")).json(&payload),
            format!("POST {API_PREFIX}/users ({})", user.employee_id),
        )
        .await
    }

    pub async fn update_user(
        &self,
        id: InventoryUserId,
        user: &UserRecord,
        departments: &DepartmentIndex,
    ) -> AdapterResult<()> {
        let mut payload = self.user_payload(user, departments)?;
        payload["notes"] = json!(format!("User updated: {}", timestamp()));

        self.send_write(
            self.client
                .patch(self.url(&format!("/users/{id}")))
                .json(&payload),
            format!("PATCH {API_PREFIX}/users/{id} ({})", user.employee_id),
        )
        .await
    }

    pub async fn disable_user(
        &self,
        id: InventoryUserId,
        departments: &DepartmentIndex,
    ) -> AdapterResult<()> {
        let mut payload = json!({
            "activated": false,
            "jobtitle": INACTIVE_TITLE,
            "notes": format!("User disabled: {}", timestamp()),
        });
        match departments.resolve(INACTIVE_DEPARTMENT) {
            Some(dept_id) => payload["department_id"] = json!(dept_id),
            None => warn!(
                department = INACTIVE_DEPARTMENT,
                "inactive department missing in inventory, disabling without a move"
            ),
        }

        self.send_write(
            self.client
                .patch(self.url(&format!("/users/{id}")))
                .json(&payload),
            format!("PATCH {API_PREFIX}/users/{id} (disable)"),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(classification: &str, year_or_type: &str) -> UserRecord {
        UserRecord {
            given_name: "Jane".into(),
            family_name: "Doe".into(),
            account_name: "jdoe".into(),
            email: "jdoe@example.edu".into(),
            employee_id: "E1".into(),
            classification: classification.into(),
            year_or_type: year_or_type.into(),
            title: "Engineer".into(),
            dn: "CN=Jane".into(),
            display_label: "Jane Doe (STAFF)".into(),
        }
    }

    #[test]
    fn students_go_into_year_departments() {
        let user = staff("STUDENT", "07");
        assert_eq!(department_name(&user), "Students - Year 07");
    }

    #[test]
    fn staff_department_is_title_cased_classification() {
        assert_eq!(department_name(&staff("STAFF", "STAFF")), "Staff");
        assert_eq!(department_name(&staff("CONTRACTOR", "CONTRACTOR")), "Contractor");
    }

    #[test]
    fn department_reverse_mapping() {
        assert_eq!(year_or_type_from_department("Students - Year 07"), "07");
        // Case-insensitive diffing makes "Staff" equal to "STAFF".
        assert_eq!(year_or_type_from_department("Staff"), "Staff");
    }

    #[test]
    fn department_index_is_case_insensitive() {
        let index = DepartmentIndex {
            by_name: BTreeMap::from([("students - year 07".to_string(), 3u64)]),
        };
        assert_eq!(index.resolve("Students - Year 07"), Some(3));
        assert_eq!(index.resolve("Students - Year 08"), None);
    }
}
