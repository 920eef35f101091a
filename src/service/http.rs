//! HTTP reference client for the external processing service.
//!
//! POSTs each record as JSON to a configured endpoint and classifies the
//! response: server-side and transport problems are recoverable,
//! client-side rejections are not.

use async_trait::async_trait;
use reqwest::StatusCode;
use snafu::prelude::*;
use std::time::Duration;

use crate::error::{HttpClientSnafu, IngestError, ProcessError};
use crate::record::Record;
use crate::service::{ExternalService, Processed};

/// External service reached over HTTP.
pub struct HttpService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpService {
    pub fn new(
        endpoint: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context(HttpClientSnafu)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn classify_status(status: StatusCode, body: &str) -> ProcessError {
        let message = format!("{status}: {body}");
        if status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            ProcessError::Recoverable { message }
        } else {
            ProcessError::NonRecoverable { message }
        }
    }
}

#[async_trait]
impl ExternalService for HttpService {
    async fn invoke(&self, record: &Record) -> Result<Processed, ProcessError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() || error.is_connect() {
                    ProcessError::Recoverable {
                        message: error.to_string(),
                    }
                } else {
                    ProcessError::NonRecoverable {
                        message: error.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(Processed {
                record: record.clone(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::classify_status(status, &body))
    }
}
