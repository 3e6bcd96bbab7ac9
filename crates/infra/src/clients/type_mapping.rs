//! REST client for the type-mapping / catalog service

use std::collections::HashMap;

use async_trait::async_trait;
use datapush_core::TypeMappingService;
use datapush_domain::{Dialect, ResolvedColumnType, Result, SourceColumnType};
use reqwest::Method;
use serde::Serialize;

use super::envelope::read_envelope;
use crate::http::HttpClient;

const SERVICE: &str = "type mapping service";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MapTypesRequest<'a> {
    source_dialect: &'a str,
    target_dialect: &'a str,
    columns: &'a [SourceColumnType],
}

/// HTTP adapter for [`TypeMappingService`].
pub struct TypeMappingClient {
    http: HttpClient,
    base_url: String,
}

impl TypeMappingClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl TypeMappingService for TypeMappingClient {
    async fn map_types(
        &self,
        source: &Dialect,
        target: &Dialect,
        columns: &[SourceColumnType],
    ) -> Result<Vec<ResolvedColumnType>> {
        let body = MapTypesRequest {
            source_dialect: source.name(),
            target_dialect: target.name(),
            columns,
        };
        let builder =
            self.http.request(Method::POST, format!("{}/type-mappings", self.base_url)).json(&body);
        let response = self.http.send(builder).await?;

        Ok(read_envelope(SERVICE, response).await?.unwrap_or_default())
    }

    async fn connector_dictionary(
        &self,
        source: &Dialect,
        target: &Dialect,
    ) -> Result<HashMap<String, String>> {
        let url = format!("{}/connectors/{}/type-dictionary", self.base_url, source.name());
        let builder = self.http.request(Method::GET, url).query(&[("target", target.name())]);
        let response = self.http.send(builder).await?;

        Ok(read_envelope(SERVICE, response).await?.unwrap_or_default())
    }
}
