//! JSON-RPC 2.0 wire types and the HTTP transport that sends them.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    pub fn into_result(self) -> Result<Value, RpcError> {
        if let Some(err) = self.error {
            return Err(RpcError::JsonRpc {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| RpcError::Deserialize("response had neither result nor error".into()))
    }
}

/// The abstraction every RPC endpoint exposes to the pool. Object-safe so
/// it can be stored as `Arc<dyn RpcEndpoint>`.
#[async_trait]
pub trait RpcEndpoint: Send + Sync + 'static {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError>;
    fn url(&self) -> &str;
}

/// Plain JSON-RPC-over-HTTP transport. Reliability (retry, circuit
/// breaking, failover) lives one layer up in [`crate::pool::ProviderPool`]
/// — this type only knows how to perform one request.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            url: url.into(),
            http,
        }
    }
}

#[async_trait]
impl RpcEndpoint for HttpTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| RpcError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RpcError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| RpcError::Deserialize(e.to_string()))
    }

    fn url(&self) -> &str {
        &self.url
    }
}
