//! HTTP validator client
//!
//! This module is feature-gated behind the `http` feature.

use std::time::Duration;

use log::debug;
use ruletree::{ValidationResponse, WireNode};
use serde::{Deserialize, Serialize};

use crate::validator::{ValidationFuture, Validator, ValidatorError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpValidatorConfig {
    /// URL the serialized tree is POSTed to
    pub endpoint: String,
    #[serde(default = "default_timeout", rename = "timeout_ms", with = "crate::session::millis")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

impl HttpValidatorConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: default_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Posts the tree as JSON and reads back a [`ValidationResponse`]
pub struct HttpValidator {
    client: reqwest::Client,
    config: HttpValidatorConfig,
}

impl HttpValidator {
    pub fn new(config: HttpValidatorConfig) -> Result<Self, ValidatorError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpValidatorConfig {
        &self.config
    }
}

impl Validator for HttpValidator {
    fn validate(&self, tree: WireNode) -> ValidationFuture {
        let request = self.client.post(&self.config.endpoint).json(&tree);
        let endpoint = self.config.endpoint.clone();
        Box::pin(async move {
            let resp = request.send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ValidatorError::Status(status.as_u16()));
            }
            debug!("Validator at {} answered {}", endpoint, status);
            resp.json::<ValidationResponse>()
                .await
                .map_err(|e| ValidatorError::BadResponse(e.to_string()))
        })
    }
}
