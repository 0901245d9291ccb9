use async_trait::async_trait;
use ragchat_core::{AskRequest, AskResponse, Exchange, ExchangeError};
use reqwest::{Client, Response};
use tracing::{debug, info};

/// Exchange over the backend's HTTP API (`POST /ask`, `GET /health`).
pub struct HttpExchange {
    client: Client,
    base_url: String,
}

impl HttpExchange {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Creating HttpExchange for {base_url}");
        Self {
            client: Client::new(),
            base_url,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the backend is up and reports `{"status": "ok"}`.
    pub async fn health(&self) -> Result<(), ExchangeError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(transport)?;

        let body: serde_json::Value = parse(read_success(response).await?)?;
        match body["status"].as_str() {
            Some("ok") => Ok(()),
            other => Err(ExchangeError::Malformed(format!(
                "unexpected health status: {other:?}"
            ))),
        }
    }

    /// Helper method to send a single request
    async fn try_send(&self, request: &AskRequest) -> Result<AskResponse, ExchangeError> {
        let response = self
            .client
            .post(format!("{}/ask", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(transport)?;

        parse(read_success(response).await?)
    }
}

#[async_trait]
impl Exchange for HttpExchange {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ExchangeError> {
        debug!("Sending request to {}/ask", self.base_url);
        let response = self.try_send(request).await?;
        info!("Received response from backend");
        Ok(response)
    }
}

fn transport(err: reqwest::Error) -> ExchangeError {
    ExchangeError::Transport(err.to_string())
}

/// Read the body of a 2xx response, or turn anything else into a status error.
async fn read_success(response: Response) -> Result<String, ExchangeError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ExchangeError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response.text().await.map_err(transport)
}

fn parse<T: serde::de::DeserializeOwned>(body: String) -> Result<T, ExchangeError> {
    serde_json::from_str(&body).map_err(|e| ExchangeError::Malformed(e.to_string()))
}
