//! REST client for the audit/workflow service

use async_trait::async_trait;
use datapush_core::AuditService;
use datapush_domain::{AuditApply, AuditProcess, Result};
use reqwest::Method;
use tracing::{debug, instrument};

use super::envelope::{read_ack, read_envelope};
use crate::http::HttpClient;

const SERVICE: &str = "audit service";

/// HTTP adapter for [`AuditService`].
pub struct AuditClient {
    http: HttpClient,
    base_url: String,
}

impl AuditClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl AuditService for AuditClient {
    /// `data: null` means no approval process is bound to the audit type.
    async fn bound_process(&self, audit_type: &str) -> Result<Option<AuditProcess>> {
        let builder = self
            .http
            .request(Method::GET, format!("{}/processes/bound", self.base_url))
            .query(&[("auditType", audit_type)]);
        let response = self.http.send(builder).await?;

        let process = read_envelope::<AuditProcess>(SERVICE, response).await?;
        debug!(audit_type, bound = process.is_some(), "audit binding looked up");
        Ok(process)
    }

    #[instrument(level = "debug", skip(self, apply), fields(apply_id = %apply.apply_id, job_id = %apply.job_id))]
    async fn submit_apply(&self, apply: &AuditApply) -> Result<()> {
        let builder =
            self.http.request(Method::POST, format!("{}/applies", self.base_url)).json(apply);
        let response = self.http.send(builder).await?;
        Ok(read_ack(SERVICE, response).await?)
    }

    #[instrument(level = "debug", skip(self))]
    async fn revoke_apply(&self, apply_id: &str) -> Result<()> {
        let url = format!("{}/applies/{apply_id}/revoke", self.base_url);
        let response = self.http.send(self.http.request(Method::POST, url)).await?;
        Ok(read_ack(SERVICE, response).await?)
    }
}
