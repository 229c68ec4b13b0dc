//! Shared HTTP plumbing for registry calls.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::config::RegistryConfig;
use crate::registry::error::{HttpStatusError, RegistryError, RegistryResult};

pub const LOGIN_PATH: &str = "/v1/auth/login";
pub const CONFIG_PATH: &str = "/v1/cs/configs";
pub const LISTENER_PATH: &str = "/v1/cs/configs/listener";
pub const INSTANCE_PATH: &str = "/v1/ns/instance";
pub const BEAT_PATH: &str = "/v1/ns/instance/beat";

/// Pooled HTTP client bound to one registry address.
#[derive(Clone, Debug)]
pub struct RegistryHttp {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryHttp {
    pub fn new(config: &RegistryConfig) -> RegistryResult<Self> {
        let base = url::Url::parse(&config.server_addr)
            .map_err(|_| RegistryError::Address(config.server_addr.clone()))?;

        let mut base_url = base.as_str().trim_end_matches('/').to_string();
        let context = config.context_path.trim_matches('/');
        if !context.is_empty() {
            base_url.push('/');
            base_url.push_str(context);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Absolute URL of an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read the response body, mapping any non-success status to a typed error.
    pub async fn read_body(response: reqwest::Response) -> RegistryResult<String> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(HttpStatusError::from_status(status.as_u16(), body).into())
        }
    }
}
