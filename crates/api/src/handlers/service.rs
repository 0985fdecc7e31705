use actix_web::{web, HttpResponse};
use fleetd_domain::ServiceKind;
use fleetd_supervisor::Supervised;
use metrics::counter;
use serde::{Deserialize, Serialize};
use strum_macros::AsRefStr;

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceOption {
    Start,
    Stop,
    Status,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub option: ServiceOption,
}

pub async fn service_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ServiceRequest>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let kind = ServiceKind::lookup(&name).ok_or(ApiError::UnknownService(name))?;
    let service = state.fleet().get(kind);
    counter!(
        "api_service_requests_total",
        "service" => kind.to_string(),
        "option" => payload.option.as_ref().to_owned()
    )
    .increment(1);

    match payload.option {
        ServiceOption::Start => service.start().await?,
        ServiceOption::Stop => service.stop().await?,
        ServiceOption::Status => {}
    }

    Ok(HttpResponse::Ok().json(service.status().await))
}
