//! Webhook delivery of completion events

use async_trait::async_trait;
use datapush_core::CompletionCallbackSink;
use datapush_domain::{CompletionEvent, Result};
use reqwest::Method;
use tracing::{info, instrument};

use super::error::ClientError;
use crate::http::HttpClient;

const SERVICE: &str = "completion callback";

/// POSTs each [`CompletionEvent`] as JSON to a fixed URL. Any 2xx is an ack.
pub struct CallbackClient {
    http: HttpClient,
    url: String,
}

impl CallbackClient {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }
}

#[async_trait]
impl CompletionCallbackSink for CallbackClient {
    #[instrument(level = "debug", skip(self, event), fields(job_id = %event.job_id))]
    async fn notify_completed(&self, event: &CompletionEvent) -> Result<()> {
        let response =
            self.http.send(self.http.request(Method::POST, &self.url).json(event)).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { service: SERVICE, status: status.as_u16(), body }.into());
        }

        info!(tenant_id = %event.tenant_id, "completion event delivered");
        Ok(())
    }
}
