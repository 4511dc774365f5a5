use super::{BeatRequest, BodyEncoding, HttpTransport};
use crate::error::{DispatchError, Result};
use std::time::Duration;

/// Default request timeout. The sink runs on the capture thread, so a hanging
/// server would otherwise stall beat detection.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Blocking reqwest client
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post(&self, request: &BeatRequest<'_>) -> Result<u16> {
        let builder = self
            .client
            .post(request.url)
            .header("x-api-key", request.api_key);

        let builder = match request.encoding {
            BodyEncoding::Form => builder.form(&[("bpm", request.bpm)]),
            BodyEncoding::Json => builder.json(&serde_json::json!({ "bpm": request.bpm })),
        };

        let resp = builder
            .send()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(resp.status().as_u16())
    }
}
