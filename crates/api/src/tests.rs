use std::sync::Arc;

use actix_web::{body::to_bytes, http::StatusCode, test, App};
use async_trait::async_trait;
use fleetd_domain::services::{
    account::AccountStore,
    sdk::Sha3AccountSdk,
    telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard},
};
use fleetd_domain::{Network, ServiceKind};
use fleetd_storage::SeaOrmStorage;
use fleetd_supervisor::{
    Fleet, LaunchContext, ManagedService, ServiceBackend, ServiceStatus, SupervisorResult,
};
use serde_json::json;
use tempfile::TempDir;

use crate::application::routes;
use crate::handlers::account::{AccountResponse, PhraseResponse};
use crate::handlers::node::{ConfigResponse, InfoResponse};
use crate::state::{AppState, NodeInfo};

/// Backend that pretends to spawn instantly.
struct IdleBackend;

#[async_trait]
impl ServiceBackend for IdleBackend {
    async fn launch(&mut self, _ctx: &LaunchContext<'_>) -> SupervisorResult<()> {
        Ok(())
    }

    async fn halt(&mut self) -> SupervisorResult<()> {
        Ok(())
    }
}

fn telemetry() -> TelemetryGuard {
    let config = TelemetryConfig::from_env("API_TEST").expect("telemetry config");
    init_telemetry(&config).expect("telemetry inits")
}

async fn build_state(data_dir: &TempDir) -> AppState {
    let storage = SeaOrmStorage::in_memory()
        .await
        .expect("storage inits");
    let accounts = Arc::new(AccountStore::new(
        storage.clone(),
        Sha3AccountSdk,
        data_dir.path(),
    ));
    let fleet = Fleet::new(
        ManagedService::new(ServiceKind::Ledger, IdleBackend),
        ManagedService::new(ServiceKind::Recorder, IdleBackend),
        ManagedService::new(ServiceKind::PeerMap, IdleBackend),
    );
    fleet
        .initialise_all(data_dir.path())
        .await
        .expect("fleet initialises");

    AppState::new(
        storage,
        accounts,
        Arc::new(fleet),
        telemetry(),
        NodeInfo {
            version: "0.0.0-test".into(),
            public_ip: Some("203.0.113.7".into()),
            registrar_address: None,
        },
    )
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(actix_web::web::Data::new($state))
                .configure(routes),
        )
        .await
    };
}

#[actix_web::test]
async fn config_round_trip_and_rejects_unknown_network() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(build_state(&dir).await);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/config").to_request())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: ConfigResponse = test::read_body_json(resp).await;
    assert_eq!(body.network, None);

    let req = test::TestRequest::post()
        .uri("/api/config")
        .set_json(json!({ "network": "mainnet" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/config")
        .set_json(json!({ "network": "testing" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/config").to_request())
        .await;
    let body: ConfigResponse = test::read_body_json(resp).await;
    assert_eq!(body.network, Some(Network::Testing));
}

#[actix_web::test]
async fn account_lifecycle_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(build_state(&dir).await);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/account").to_request())
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/config")
        .set_json(json!({ "network": "bitmark" }))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/account").to_request())
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp =
        test::call_service(&app, test::TestRequest::post().uri("/api/account").to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: AccountResponse = test::read_body_json(resp).await;
    assert_eq!(created.network, Network::Bitmark);
    assert!(dir.path().join("bitmarkd/bitmark/proof.sign").exists());

    let resp =
        test::call_service(&app, test::TestRequest::post().uri("/api/account").to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/account").to_request())
        .await;
    let fetched: AccountResponse = test::read_body_json(resp).await;
    assert_eq!(fetched.account_number, created.account_number);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/account/phrase").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let phrase: PhraseResponse = test::read_body_json(resp).await;
    assert_eq!(phrase.phrase.split_whitespace().count(), 24);

    let req = test::TestRequest::post()
        .uri("/api/account/phrase")
        .set_json(json!({ "phrase": phrase.phrase }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let recovered: AccountResponse = test::read_body_json(resp).await;
    assert_eq!(recovered.account_number, created.account_number);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/api/account/save").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn malformed_phrase_is_a_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(build_state(&dir).await);
    let req = test::TestRequest::post()
        .uri("/api/config")
        .set_json(json!({ "network": "testing" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/account/phrase")
        .set_json(json!({ "phrase": "not a real phrase" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn service_start_stop_and_misuse() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(build_state(&dir).await);

    let start = || {
        test::TestRequest::post()
            .uri("/api/mapd")
            .set_json(json!({ "option": "start" }))
            .to_request()
    };

    let resp = test::call_service(&app, start()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/config")
        .set_json(json!({ "network": "testing" }))
        .to_request();
    test::call_service(&app, req).await;

    let resp = test::call_service(&app, start()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let status: ServiceStatus = test::read_body_json(resp).await;
    assert!(status.running);
    assert_eq!(status.service, ServiceKind::PeerMap);

    let resp = test::call_service(&app, start()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/peermap")
        .set_json(json!({ "option": "stop" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status: ServiceStatus = test::read_body_json(resp).await;
    assert!(!status.running);

    let req = test::TestRequest::post()
        .uri("/api/nginx")
        .set_json(json!({ "option": "status" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/bitmarkd")
        .set_json(json!({ "option": "restart" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_web::test]
async fn network_switch_leaves_services_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(build_state(&dir).await);

    let set_network = |network: &str| {
        test::TestRequest::post()
            .uri("/api/config")
            .set_json(json!({ "network": network }))
            .to_request()
    };
    test::call_service(&app, set_network("bitmark")).await;
    for service in ["bitmarkd", "recorderd"] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/{service}"))
            .set_json(json!({ "option": "start" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    test::call_service(&app, set_network("testing")).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/info").to_request())
        .await;
    let info: InfoResponse = test::read_body_json(resp).await;
    assert_eq!(info.network, Some(Network::Testing));
    assert_eq!(info.public_ip.as_deref(), Some("203.0.113.7"));
    assert_eq!(info.services.len(), 3);
    for status in info.services {
        assert!(!status.running, "{} still running", status.service);
        assert_eq!(status.network, Some(Network::Testing));
    }
}

#[actix_web::test]
async fn metrics_endpoint_renders_prometheus_text() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(build_state(&dir).await);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body()).await.unwrap();
    assert!(std::str::from_utf8(&body).is_ok());
}
