use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use shared_config::ClientConfig;

use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Standard `{ok, data, message}` envelope every collaborator endpoint wraps
/// its payload in. A response with `ok = false` is a server-side rejection.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub ok: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<T, ApiError> {
        if !self.ok {
            return Err(ApiError::Server(
                self.message.unwrap_or_else(|| "request rejected".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| ApiError::Decode("response envelope carried no data".to_string()))
    }
}

pub struct BackendClient {
    client: Client,
    base_url: String,
    auth_token: String,
}

impl BackendClient {
    pub fn new(config: &ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.backend_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        }
    }

    async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut req = self
            .client
            .request(method, &url)
            .bearer_auth(&self.auth_token)
            .query(query);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);
            return Err(ApiError::Server(format!("{}: {}", status, error_text)));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// GET an enveloped payload, failing on `ok = false` or a missing body.
    pub async fn get_data<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        self.request::<T>(Method::GET, path, query, None)
            .await?
            .into_data()
    }

    /// POST a JSON body and decode the enveloped payload.
    pub async fn post_data<T>(&self, path: &str, body: Value) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        self.request::<T>(Method::POST, path, &[], Some(body))
            .await?
            .into_data()
    }

    /// POST a JSON body where only the `ok` acknowledgement matters.
    pub async fn post_ack(&self, path: &str, body: Value) -> Result<(), ApiError> {
        let envelope = self
            .request::<Value>(Method::POST, path, &[], Some(body))
            .await?;
        if !envelope.ok {
            return Err(ApiError::Server(
                envelope
                    .message
                    .unwrap_or_else(|| "request rejected".to_string()),
            ));
        }
        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
