pub mod account;
pub mod node;
pub mod service;

pub use account::{
    create_account_handler, get_account_handler, get_phrase_handler, recover_account_handler,
    save_account_handler,
};
pub use node::{get_config_handler, info_handler, metrics_handler, update_config_handler};
pub use service::service_handler;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use fleetd_domain::services::{account::AccountError, sdk::SdkError};
use fleetd_domain::storage::{NodeConfigStore, StorageError};
use fleetd_domain::{Network, UnknownNetwork};
use fleetd_supervisor::SupervisorError;

use crate::state::AppState;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    UnknownNetwork(#[from] UnknownNetwork),
    #[error("unknown service `{0}`")]
    UnknownService(String),
    #[error("no network configured")]
    NetworkNotSet,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Supervisor(err) if err.is_misuse() => StatusCode::CONFLICT,
            ApiError::Supervisor(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Account(err) => match err {
                AccountError::NotFound(_) => StatusCode::NOT_FOUND,
                AccountError::AlreadyExists(_) => StatusCode::CONFLICT,
                AccountError::Mismatch | AccountError::Sdk(SdkError::InvalidPhrase(_)) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::UnknownNetwork(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownService(_) => StatusCode::NOT_FOUND,
            ApiError::NetworkNotSet => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub(crate) async fn current_network(state: &AppState) -> Result<Network, ApiError> {
    state
        .storage()
        .current_network()
        .await?
        .ok_or(ApiError::NetworkNotSet)
}
