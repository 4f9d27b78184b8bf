// Contract with the external latent model, plus the two bridges we ship:
// an HTTP client for a model service, and an offline stand-in that always
// reports the model as missing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::pattern::{Corners, Pattern};
use crate::error::BlendError;

/// Opaque per-corner latent vectors. Only meaningful for the corner set
/// they were encoded from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatentBundle {
    #[serde(rename = "A")]
    pub a: Vec<f32>,
    #[serde(rename = "B")]
    pub b: Vec<f32>,
    #[serde(rename = "C")]
    pub c: Vec<f32>,
    #[serde(rename = "D")]
    pub d: Vec<f32>,
}

impl LatentBundle {
    pub fn is_well_formed(&self) -> bool {
        let n = self.a.len();
        n > 0
            && self.b.len() == n
            && self.c.len() == n
            && self.d.len() == n
            && [&self.a, &self.b, &self.c, &self.d]
                .iter()
                .all(|v| v.iter().all(|f| f.is_finite()))
    }
}

/// Calls may be slow; they only ever run on the latent worker thread.
/// Implementations keep no state between encode/decode calls.
pub trait LatentBridge: Send {
    fn prepare(&mut self) -> Result<(), BlendError>;
    fn encode(&self, corners: &Corners) -> Result<LatentBundle, BlendError>;
    fn decode(&self, latents: &LatentBundle, x: f32, y: f32, temperature: f32) -> Result<Pattern, BlendError>;
}

pub struct OfflineBridge;

impl LatentBridge for OfflineBridge {
    fn prepare(&mut self) -> Result<(), BlendError> {
        Err(BlendError::ModelUnavailable("no latent endpoint configured".into()))
    }

    fn encode(&self, _corners: &Corners) -> Result<LatentBundle, BlendError> {
        Err(BlendError::ModelUnavailable("offline".into()))
    }

    fn decode(&self, _latents: &LatentBundle, _x: f32, _y: f32, _t: f32) -> Result<Pattern, BlendError> {
        Err(BlendError::ModelUnavailable("offline".into()))
    }
}

#[derive(Serialize)]
struct EncodeRequest<'a> {
    corners: &'a Corners,
}

#[derive(Deserialize)]
struct EncodeResponse {
    latents: LatentBundle,
}

#[derive(Serialize)]
struct DecodeRequest<'a> {
    latents: &'a LatentBundle,
    x: f32,
    y: f32,
    temperature: f32,
}

#[derive(Deserialize)]
struct DecodeResponse {
    pattern: Pattern,
}

/// JSON-over-HTTP model service:
///   GET  {endpoint}/health
///   POST {endpoint}/encode  {"corners": {..}}                 -> {"latents": {..}}
///   POST {endpoint}/decode  {"latents", "x", "y", "temperature"} -> {"pattern": {..}}
pub struct HttpLatentBridge {
    endpoint: String,
    timeout: Duration,
    client: Option<reqwest::blocking::Client>,
}

impl HttpLatentBridge {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
            client: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, BlendError> {
        self.client
            .as_ref()
            .ok_or_else(|| BlendError::ModelUnavailable("bridge used before prepare".into()))
    }
}

impl LatentBridge for HttpLatentBridge {
    fn prepare(&mut self) -> Result<(), BlendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| BlendError::ModelUnavailable(e.to_string()))?;
        client
            .get(self.url("health"))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| BlendError::ModelUnavailable(e.to_string()))?;
        log::info!("latent service ready at {}", self.endpoint);
        self.client = Some(client);
        Ok(())
    }

    fn encode(&self, corners: &Corners) -> Result<LatentBundle, BlendError> {
        let resp: EncodeResponse = self
            .client()?
            .post(self.url("encode"))
            .json(&EncodeRequest { corners })
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| BlendError::EncodeFailure(e.to_string()))?;
        if !resp.latents.is_well_formed() {
            return Err(BlendError::EncodeFailure("malformed latent bundle".into()));
        }
        Ok(resp.latents)
    }

    fn decode(&self, latents: &LatentBundle, x: f32, y: f32, temperature: f32) -> Result<Pattern, BlendError> {
        // a wrong-length track fails deserialization, which lands here as a decode failure
        let resp: DecodeResponse = self
            .client()
            .map_err(|e| BlendError::DecodeFailure(e.to_string()))?
            .post(self.url("decode"))
            .json(&DecodeRequest { latents, x, y, temperature })
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| BlendError::DecodeFailure(e.to_string()))?;
        Ok(resp.pattern)
    }
}

pub fn bridge_from_endpoint(endpoint: Option<&str>, timeout: Duration) -> Box<dyn LatentBridge> {
    match endpoint {
        Some(url) if !url.trim().is_empty() => Box::new(HttpLatentBridge::new(url, timeout)),
        _ => Box::new(OfflineBridge),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_bridge_never_prepares() {
        let mut bridge = OfflineBridge;
        assert!(matches!(bridge.prepare(), Err(BlendError::ModelUnavailable(_))));
    }

    #[test]
    fn http_bridge_refuses_work_before_prepare() {
        let bridge = HttpLatentBridge::new("http://127.0.0.1:9/", Duration::from_millis(50));
        assert_eq!(bridge.url("encode"), "http://127.0.0.1:9/encode");
        let err = bridge.encode(&Corners::default()).unwrap_err();
        assert!(matches!(err, BlendError::ModelUnavailable(_)));
        let bundle = LatentBundle { a: vec![0.0], b: vec![0.0], c: vec![0.0], d: vec![0.0] };
        assert!(matches!(bridge.decode(&bundle, 0.5, 0.5, 0.85), Err(BlendError::DecodeFailure(_))));
    }

    #[test]
    fn bundle_shape_check() {
        let good = LatentBundle { a: vec![0.1, 0.2], b: vec![0.0, 1.0], c: vec![2.0, 3.0], d: vec![4.0, 5.0] };
        assert!(good.is_well_formed());
        let ragged = LatentBundle { d: vec![1.0], ..good.clone() };
        assert!(!ragged.is_well_formed());
        let nan = LatentBundle { a: vec![f32::NAN, 0.0], ..good };
        assert!(!nan.is_well_formed());
    }

    #[test]
    fn empty_endpoint_means_offline() {
        let mut bridge = bridge_from_endpoint(Some("  "), Duration::from_secs(1));
        assert!(bridge.prepare().is_err());
    }
}
