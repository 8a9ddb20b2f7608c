//! Inventory client tests against a mock HTTP server.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use concord_core::record::field;
use concord_core::{Action, ActionSink, SnapshotSource, UserRecord};
use concord_inventory::{
    DepartmentIndex, InventoryAssetSource, InventoryClient, InventoryConfig, InventoryUserSink,
    InventoryUserSource,
};

fn config(server: &MockServer) -> InventoryConfig {
    InventoryConfig::new(server.uri(), "test-token")
}

fn client(server: &MockServer) -> Arc<InventoryClient> {
    Arc::new(InventoryClient::new(config(server)).unwrap())
}

fn asset_row(id: u64, model: &str, tag: &str) -> serde_json::Value {
    json!({
        "id": id,
        "asset_tag": tag,
        "serial": format!("SER{id}"),
        "model": {"name": model},
        "manufacturer": {"name": "Dell"},
        "status_label": {"name": "Deployed"},
        "category": {"name": "Laptop"},
    })
}

#[tokio::test]
async fn assets_are_fetched_across_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/hardware"))
        .and(query_param("offset", "0"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3,
            "rows": [asset_row(1, "Latitude 5420", "T-001"), asset_row(2, "XPS 13", "T-002")],
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/hardware"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3,
            "rows": [asset_row(3, "Latitude 7420", "T-003")],
        })))
        .mount(&server)
        .await;

    let source = InventoryAssetSource::new(client(&server));
    let snapshot = source.fetch_all().await.unwrap();

    assert_eq!(snapshot.len(), 3);
    let first = snapshot.get("1").unwrap();
    assert_eq!(first.model, "Latitude 5420");
    assert_eq!(first.manufacturer, "Dell");
    assert_eq!(first.serial_number, "SER1");
}

#[tokio::test]
async fn asset_text_fields_are_html_unescaped() {
    let server = MockServer::start().await;

    let mut row = asset_row(9, "Latitude", "T-009");
    row["manufacturer"] = json!({"name": "Fran&#231;ois &amp; Co"});

    Mock::given(method("GET"))
        .and(path("/api/v1/hardware"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"total": 1, "rows": [row]})),
        )
        .mount(&server)
        .await;

    let snapshot = client(&server).fetch_assets().await.unwrap();
    assert_eq!(snapshot.get("9").unwrap().manufacturer, "Fran\u{e7}ois & Co");
}

#[tokio::test]
async fn user_fetch_skips_service_accounts_and_keyless_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 4,
            "rows": [
                {
                    "id": 10, "employee_num": "E1", "username": "jdoe",
                    "first_name": "Jane", "last_name": "Doe",
                    "email": "jdoe@example.edu", "jobtitle": "Engineer",
                    "department": {"name": "Staff"}, "activated": true,
                },
                {"id": 11, "employee_num": "", "username": "ghost", "activated": true},
                {"id": 12, "employee_num": "E2", "username": "Administrator", "activated": true},
                {
                    "id": 13, "employee_num": "E3", "username": "former",
                    "department": {"name": "Inactive Users"}, "activated": false,
                },
            ],
        })))
        .mount(&server)
        .await;

    let source = InventoryUserSource::new(client(&server));
    let snapshot = source.fetch_all().await.unwrap();

    assert_eq!(snapshot.len(), 2);
    let jane = snapshot.get("e1").unwrap();
    assert!(jane.active);
    assert_eq!(jane.linkage, 10);
    assert_eq!(jane.fields.get(field::TITLE).unwrap(), "Engineer");
    assert_eq!(jane.fields.get(field::YEAR_OR_TYPE).unwrap(), "Staff");
    assert!(!snapshot.get("e3").unwrap().active);
}

#[tokio::test]
async fn user_listing_requests_a_stable_sort() {
    let server = MockServer::start().await;

    // Offset pagination is only coherent under a fixed ordering; the
    // mock only answers requests that pin one down.
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(query_param("sort", "last_name"))
        .and(query_param("order", "asc"))
        .and(query_param("all", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "rows": [{"id": 1, "employee_num": "E1", "username": "jdoe", "activated": true}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = client(&server).fetch_users().await.unwrap();
    assert_eq!(snapshot.len(), 1);
}

#[tokio::test]
async fn listing_shorter_than_total_is_a_fatal_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/hardware"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 3,
            "rows": [asset_row(1, "Latitude 5420", "T-001"), asset_row(2, "XPS 13", "T-002")],
        })))
        .mount(&server)
        .await;

    // The server claims three rows but the next page is empty; the
    // snapshot must not pass off two rows as the whole inventory.
    Mock::given(method("GET"))
        .and(path("/api/v1/hardware"))
        .and(query_param("offset", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"total": 3, "rows": []})),
        )
        .mount(&server)
        .await;

    let err = client(&server).fetch_assets().await.unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("3"));
}

#[tokio::test]
async fn student_department_is_mapped_back_to_year() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "rows": [{
                "id": 20, "employee_num": "S7", "username": "student7",
                "department": {"name": "Students - Year 07"}, "activated": true,
            }],
        })))
        .mount(&server)
        .await;

    let snapshot = client(&server).fetch_users().await.unwrap();
    assert_eq!(
        snapshot.get("s7").unwrap().fields.get(field::YEAR_OR_TYPE).unwrap(),
        "07"
    );
}

#[tokio::test]
async fn error_status_in_success_body_fails_the_write() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/departments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "rows": [{"id": 4, "name": "Staff"}],
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "messages": {"username": ["The username has already been taken."]},
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let departments = client.fetch_departments().await.unwrap();
    let user = UserRecord {
        given_name: "Jane".into(),
        family_name: "Doe".into(),
        account_name: "jdoe".into(),
        email: "jdoe@example.edu".into(),
        employee_id: "E1".into(),
        classification: "STAFF".into(),
        year_or_type: "STAFF".into(),
        title: "Engineer".into(),
        dn: "CN=Jane".into(),
        display_label: "Jane Doe (STAFF)".into(),
    };

    let err = client.create_user(&user, &departments).await.unwrap_err();
    assert!(err.to_string().contains("already been taken"));
}

#[tokio::test]
async fn sink_disable_patches_the_account() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/departments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "rows": [{"id": 8, "name": "Inactive Users"}],
        })))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/api/v1/users/55"))
        .and(body_partial_json(json!({
            "activated": false,
            "jobtitle": "Inactive User",
            "department_id": 8,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let departments = client.fetch_departments().await.unwrap();
    let sink = InventoryUserSink::new(client, departments);

    sink.apply(&Action::<UserRecord, u64>::Disable {
        key: "e9".into(),
        linkage: 55,
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn create_without_matching_department_is_rejected() {
    let server = MockServer::start().await;

    let client = client(&server);
    let user = UserRecord {
        given_name: "Sam".into(),
        family_name: "Lee".into(),
        account_name: "slee".into(),
        email: "slee@example.edu".into(),
        employee_id: "E5".into(),
        classification: "STUDENT".into(),
        year_or_type: "09".into(),
        title: "Student".into(),
        dn: "CN=Sam".into(),
        display_label: "Sam Lee (09)".into(),
    };

    let err = client
        .create_user(&user, &DepartmentIndex::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Students - Year 09"));
}
