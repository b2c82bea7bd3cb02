use async_trait::async_trait;

use crate::value::Value;

use super::{CapabilityError, CapabilityResult, HttpClient, HttpResponse};

/// reqwest-backed HTTP capability. The options record mirrors the wire
/// contract: `method` (default GET), `headers` (string map), `body`
/// (string, or any value serialized as JSON).
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn fetch(&self, url: &str, options: &Value) -> CapabilityResult<HttpResponse> {
        let method_name = options.get("method").and_then(Value::as_str).unwrap_or("GET");
        let method = reqwest::Method::from_bytes(method_name.to_uppercase().as_bytes())
            .map_err(|_| CapabilityError::Failed(format!("invalid method: {method_name}")))?;

        let mut request = self.client.request(method, url);
        if let Some(Value::Map(headers)) = options.get("headers") {
            for (name, value) in headers {
                request = request.header(name.as_str(), value.to_string());
            }
        }
        if let Some(body) = options.get("body") {
            request = match body {
                Value::String(text) => request.body(text.clone()),
                other => request.body(
                    serde_json::to_string(&other.to_json())
                        .map_err(|e| CapabilityError::Failed(e.to_string()))?,
                ),
            };
        }

        let response = request
            .send()
            .await
            .map_err(|e| CapabilityError::Failed(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| CapabilityError::Failed(e.to_string()))?
            .to_vec();
        Ok(HttpResponse { status, body })
    }
}
