use actix_web::{web, HttpResponse};
use fleetd_domain::{Account, Network};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

use super::{current_network, ApiError};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub account_number: String,
    pub network: Network,
}

impl AccountResponse {
    fn new(account: Account, network: Network) -> Self {
        Self {
            account_number: account.account_number,
            network,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhraseResponse {
    pub phrase: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecoverRequest {
    pub phrase: String,
}

pub async fn get_account_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let network = current_network(&state).await?;
    let account = state.accounts().resolve(network).await?;
    Ok(HttpResponse::Ok().json(AccountResponse::new(account, network)))
}

pub async fn create_account_handler(
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let network = current_network(&state).await?;
    let account = state.accounts().create(network).await?;
    Ok(HttpResponse::Created().json(AccountResponse::new(account, network)))
}

pub async fn save_account_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let network = current_network(&state).await?;
    let account = state.accounts().save(network).await?;
    Ok(HttpResponse::Ok().json(AccountResponse::new(account, network)))
}

pub async fn get_phrase_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let network = current_network(&state).await?;
    let phrase = state.accounts().recovery_phrase(network).await?;
    Ok(HttpResponse::Ok().json(PhraseResponse { phrase }))
}

pub async fn recover_account_handler(
    state: web::Data<AppState>,
    payload: web::Json<RecoverRequest>,
) -> Result<HttpResponse, ApiError> {
    let network = current_network(&state).await?;
    let account = state.accounts().recover(&payload.phrase, network).await?;
    Ok(HttpResponse::Ok().json(AccountResponse::new(account, network)))
}
