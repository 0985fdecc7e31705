use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::PeerObservation;
use crate::worker::ReporterError;

#[async_trait]
pub trait Registrar: Send + Sync {
    async fn register(&self, observation: &PeerObservation) -> Result<(), ReporterError>;
}

// lat, lng and timediff are filled in by the registrar.
#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    #[serde(rename = "publicKey")]
    public_key: &'a str,
    ip: &'a str,
    height: u64,
    lat: f64,
    lng: f64,
    timestamp: DateTime<Utc>,
    timediff: &'a str,
}

impl<'a> From<&'a PeerObservation> for RegisterRequest<'a> {
    fn from(observation: &'a PeerObservation) -> Self {
        Self {
            public_key: &observation.public_key,
            ip: &observation.ip,
            height: observation.height,
            lat: 0.0,
            lng: 0.0,
            timestamp: observation.timestamp,
            timediff: "",
        }
    }
}

pub struct HttpRegistrar {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpRegistrar {
    pub fn new(address: Option<&str>, timeout: Duration) -> Result<Self, ReporterError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: address.map(|addr| format!("http://{}/register", addr.trim())),
        })
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

#[async_trait]
impl Registrar for HttpRegistrar {
    async fn register(&self, observation: &PeerObservation) -> Result<(), ReporterError> {
        let endpoint = self.endpoint.as_deref().ok_or(ReporterError::NoRegistrar)?;
        let response = self
            .client
            .post(endpoint)
            .json(&RegisterRequest::from(observation))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReporterError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
