//! `{code, msg, data}` response envelope shared by the downstream services

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::error::ClientError;

/// Longest response body kept in an error message.
const MAX_BODY_IN_ERROR: usize = 512;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

/// Read an enveloped response. `Ok(None)` means success without data.
pub(crate) async fn read_envelope<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> Result<Option<T>, ClientError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ClientError::Decode { service, message: e.to_string() })?;

    if !status.is_success() {
        if let Ok(envelope) = serde_json::from_str::<Envelope<serde_json::Value>>(&body) {
            if envelope.code != 0 {
                return Err(ClientError::Rejected { service, code: envelope.code, message: envelope.msg });
            }
        }
        return Err(ClientError::Status { service, status: status.as_u16(), body: truncate(body) });
    }

    if body.trim().is_empty() {
        return Ok(None);
    }

    let envelope: Envelope<T> = serde_json::from_str(&body)
        .map_err(|e| ClientError::Decode { service, message: e.to_string() })?;
    if envelope.code != 0 {
        return Err(ClientError::Rejected { service, code: envelope.code, message: envelope.msg });
    }
    Ok(envelope.data)
}

/// Like [`read_envelope`] but the payload must be present.
pub(crate) async fn read_data<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> Result<T, ClientError> {
    read_envelope(service, response)
        .await?
        .ok_or_else(|| ClientError::Decode { service, message: "missing data".into() })
}

/// Accept any 2xx response and discard the body.
pub(crate) async fn read_ack(service: &'static str, response: Response) -> Result<(), ClientError> {
    read_envelope::<serde_json::Value>(service, response).await.map(|_| ())
}

fn truncate(body: String) -> String {
    if body.chars().count() <= MAX_BODY_IN_ERROR {
        return body;
    }
    body.chars().take(MAX_BODY_IN_ERROR).collect()
}
