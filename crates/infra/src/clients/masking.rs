//! REST client for the masking-rule service

use async_trait::async_trait;
use datapush_core::MaskingRuleService;
use datapush_domain::{DesensitizationRule, Result};
use reqwest::Method;
use serde::Serialize;

use super::envelope::read_envelope;
use crate::http::HttpClient;

const SERVICE: &str = "masking rule service";

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    ids: &'a [String],
}

/// HTTP adapter for [`MaskingRuleService`].
pub struct MaskingRuleClient {
    http: HttpClient,
    base_url: String,
}

impl MaskingRuleClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl MaskingRuleService for MaskingRuleClient {
    async fn fetch_rules(&self, ids: &[String]) -> Result<Vec<DesensitizationRule>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let builder = self
            .http
            .request(Method::POST, format!("{}/rules/batch", self.base_url))
            .json(&BatchRequest { ids });
        let response = self.http.send(builder).await?;

        Ok(read_envelope(SERVICE, response).await?.unwrap_or_default())
    }
}
