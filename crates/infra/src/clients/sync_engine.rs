//! REST client for the sync-execution engine
//!
//! Every call answers with the `{code, msg, data}` envelope. A non-zero code
//! becomes [`DataPushError::SyncEngine`] carrying that code, which the
//! lifecycle turns into an operator-facing fault.

use async_trait::async_trait;
use datapush_core::SyncEngine;
use datapush_domain::{ExecutionHistory, HistoryPage, ProcessingModel, Result, WorkflowSpec};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use tracing::{debug, instrument};

use super::envelope::{read_ack, read_envelope};
use crate::http::HttpClient;

const SERVICE: &str = "sync engine";

#[derive(Debug, Serialize)]
struct OnlineRequest {
    enabled: bool,
}

/// HTTP adapter for [`SyncEngine`].
pub struct SyncEngineClient {
    http: HttpClient,
    base_url: String,
}

impl SyncEngineClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn ack(&self, builder: RequestBuilder) -> Result<()> {
        let response = self.http.send(builder).await?;
        read_ack(SERVICE, response).await.map_err(|e| e.into_engine_error())
    }
}

#[async_trait]
impl SyncEngine for SyncEngineClient {
    #[instrument(level = "debug", skip(self, model), fields(job_id = %model.job_id))]
    async fn create_processing_model(&self, model: &ProcessingModel) -> Result<()> {
        self.ack(self.http.request(Method::POST, self.url("/models")).json(model)).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn run(&self, job_id: &str) -> Result<()> {
        self.ack(self.http.request(Method::POST, self.url(&format!("/models/{job_id}/run"))))
            .await
    }

    #[instrument(level = "debug", skip(self, spec), fields(job_id = %spec.job_id))]
    async fn create_workflow(&self, spec: &WorkflowSpec) -> Result<()> {
        self.ack(self.http.request(Method::POST, self.url("/workflows")).json(spec)).await
    }

    #[instrument(level = "debug", skip(self, spec), fields(job_id = %spec.job_id))]
    async fn update_workflow(&self, spec: &WorkflowSpec) -> Result<()> {
        let url = self.url(&format!("/workflows/{}", spec.job_id));
        self.ack(self.http.request(Method::PUT, url).json(spec)).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn update_workflow_online(&self, job_id: &str, enabled: bool) -> Result<()> {
        let url = self.url(&format!("/workflows/{job_id}/online"));
        self.ack(self.http.request(Method::PUT, url).json(&OnlineRequest { enabled })).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete_workflow(&self, job_id: &str) -> Result<()> {
        let url = self.url(&format!("/workflows/{job_id}"));
        self.ack(self.http.request(Method::DELETE, url)).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn query_execution_history(
        &self,
        job_id: &str,
        page: HistoryPage,
    ) -> Result<ExecutionHistory> {
        let builder = self
            .http
            .request(Method::GET, self.url(&format!("/workflows/{job_id}/history")))
            .query(&[("page", page.page), ("size", page.size)]);
        let response = self.http.send(builder).await?;

        let history = read_envelope::<ExecutionHistory>(SERVICE, response)
            .await
            .map_err(|e| e.into_engine_error())?
            .unwrap_or_default();
        debug!(entries = history.entries.len(), total = history.total, "execution history fetched");
        Ok(history)
    }
}
