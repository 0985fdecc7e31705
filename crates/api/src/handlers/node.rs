use actix_web::{web, HttpResponse};
use fleetd_domain::storage::NodeConfigStore;
use fleetd_domain::Network;
use fleetd_supervisor::ServiceStatus;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub version: String,
    pub network: Option<Network>,
    pub public_ip: Option<String>,
    pub registrar: Option<String>,
    pub services: Vec<ServiceStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub network: Option<Network>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateConfigRequest {
    pub network: String,
}

pub async fn info_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let network = state.storage().current_network().await?;
    let info = state.info();
    Ok(HttpResponse::Ok().json(InfoResponse {
        version: info.version.clone(),
        network,
        public_ip: info.public_ip.clone(),
        registrar: info.registrar_address.clone(),
        services: state.fleet().statuses().await,
    }))
}

pub async fn get_config_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let network = state.storage().current_network().await?;
    Ok(HttpResponse::Ok().json(ConfigResponse { network }))
}

pub async fn update_config_handler(
    state: web::Data<AppState>,
    payload: web::Json<UpdateConfigRequest>,
) -> Result<HttpResponse, ApiError> {
    let network = Network::parse(&payload.network)?;
    state.storage().set_network(network).await?;
    state.fleet().apply_network(network).await?;
    info!(%network, "network updated through control api");
    Ok(HttpResponse::Ok().json(ConfigResponse {
        network: Some(network),
    }))
}

pub async fn metrics_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.telemetry().render_metrics())
}
