use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::worker::ReporterError;

mod types;

pub use types::{BlockCounts, DetailsReply, PeerReply};

#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn details(&self) -> Result<DetailsReply, ReporterError>;
    async fn peers(&self) -> Result<Vec<PeerReply>, ReporterError>;
}

pub struct HttpLedgerApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLedgerApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ReporterError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // self-signed certificate on loopback
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T>(&self, endpoint: &'static str) -> Result<T, ReporterError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ReporterError::Status {
                endpoint: url,
                status: status.as_u16(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|err| ReporterError::Decode(err.to_string()))
    }
}

#[async_trait]
impl LedgerApi for HttpLedgerApi {
    async fn details(&self) -> Result<DetailsReply, ReporterError> {
        self.get_json("details").await
    }

    async fn peers(&self) -> Result<Vec<PeerReply>, ReporterError> {
        self.get_json("peers").await
    }
}
