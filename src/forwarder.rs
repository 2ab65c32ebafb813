use crate::models::WeatherObservation;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to serialize weather observation: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("backend returned status: {0}")]
    Status(u16),
}

/// Hands a decoded observation to the downstream logging backend.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn send(&self, observation: &WeatherObservation) -> Result<(), ForwardError>;
}

/// Posts observations as JSON to the backend URL.
///
/// An unreachable backend is not an error: the failure is logged and `send`
/// returns `Ok(())`, so `Ok` does not mean the observation was stored. Only a
/// response with status >= 400 is reported as [`ForwardError::Status`].
pub struct HttpForwarder {
    client: Client,
    api_url: String,
}

impl HttpForwarder {
    pub fn new(api_url: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self { client, api_url })
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn send(&self, observation: &WeatherObservation) -> Result<(), ForwardError> {
        let body = serde_json::to_vec(observation)?;
        debug!(
            "Sending to {}: {}",
            self.api_url,
            String::from_utf8_lossy(&body)
        );

        let response = match self
            .client
            .post(&self.api_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "Backend at {} unreachable, dropping observation: {}",
                    self.api_url, e
                );
                return Ok(());
            }
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(ForwardError::Status(status.as_u16()));
        }

        Ok(())
    }
}
