use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::json;

use opsdesk_api::app::{self, AppServices};
use opsdesk_core::ClientId;
use opsdesk_infra::{
    ClientRecord, InMemoryAuditStore, InMemoryClientStore, InMemoryReminderStore,
    InMemoryScheduleStore, LedgerEngine, SideEffects,
};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(services: AppServices) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// In-memory wiring with one pre-registered client.
fn seeded_services() -> (AppServices, ClientId) {
    let schedules = Arc::new(InMemoryScheduleStore::new());
    let clients = Arc::new(InMemoryClientStore::new());
    let client_id = ClientId::new();
    clients.insert(ClientRecord {
        id: client_id,
        name: Some("Blue Harbor Music School".to_string()),
        payment_status: None,
    });
    let side_effects = SideEffects::new(
        Arc::new(InMemoryReminderStore::new()),
        Arc::new(InMemoryAuditStore::new()),
    );
    let engine = LedgerEngine::new(schedules, clients, side_effects);
    (AppServices::new(engine), client_id)
}

#[tokio::test]
async fn health_endpoint_is_open() {
    let (services, _) = seeded_services();
    let srv = TestServer::spawn(services).await;

    let res = reqwest::get(format!("{}/healthz", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn schedule_then_sweep_flow() {
    let (services, client_id) = seeded_services();
    let srv = TestServer::spawn(services).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/clients/{}/schedules", srv.base_url, client_id))
        .json(&json!({
            "items": [
                { "amount": "3000", "due_date": (Utc::now() - Duration::days(10)).to_rfc3339() },
                { "amount": "2000", "due_date": (Utc::now() + Duration::days(20)).to_rfc3339() },
            ],
            "source": "enrollment",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["items"][0]["installment_number"], 1);
    assert_eq!(body["items"][1]["installment_number"], 2);
    assert_eq!(body["items"][0]["status"], "pending");

    let res = client
        .post(format!("{}/clients/{}/collections", srv.base_url, client_id))
        .json(&json!({ "amount": "4000", "method": "transfer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["updated_schedule_ids"].as_array().unwrap().len(), 2);
    assert_eq!(body["summary"]["remaining"], "1000");
    assert_eq!(body["summary"]["status"], "deposit");

    let res = client
        .get(format!(
            "{}/clients/{}/payment-summary",
            srv.base_url, client_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total_paid"], "4000");
    assert_eq!(body["remaining"], "1000");

    let res = client
        .get(format!("{}/reports/outstanding", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["client_name"], "Blue Harbor Music School");
    assert_eq!(items[0]["remaining"], "1000");
    assert_eq!(items[0]["overdue_count"], 0);
}

#[tokio::test]
async fn over_collection_is_unprocessable() {
    let (services, client_id) = seeded_services();
    let srv = TestServer::spawn(services).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/clients/{}/schedules", srv.base_url, client_id))
        .json(&json!({
            "items": [{ "amount": "500", "due_date": Utc::now().to_rfc3339() }],
        }))
        .send()
        .await
        .unwrap();

    let res = client
        .post(format!("{}/clients/{}/collections", srv.base_url, client_id))
        .json(&json!({ "amount": "500.01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invariant_violation");
}

#[tokio::test]
async fn unknown_client_is_not_found() {
    let (services, _) = seeded_services();
    let srv = TestServer::spawn(services).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/clients/{}/payment-summary",
            srv.base_url,
            ClientId::new()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_client_id_is_bad_request() {
    let (services, _) = seeded_services();
    let srv = TestServer::spawn(services).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/clients/not-a-uuid/payment-summary",
            srv.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn status_refresh_reports_the_cached_value() {
    let (services, client_id) = seeded_services();
    let srv = TestServer::spawn(services).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/clients/{}/schedules", srv.base_url, client_id))
        .json(&json!({
            "items": [{ "amount": "100", "due_date": Utc::now().to_rfc3339() }],
        }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/clients/{}/collections", srv.base_url, client_id))
        .json(&json!({ "amount": "100" }))
        .send()
        .await
        .unwrap();

    let res = client
        .post(format!(
            "{}/clients/{}/payment-status/refresh",
            srv.base_url, client_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["payment_status"], "paid");
}
