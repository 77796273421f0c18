use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpTransport};

#[derive(Serialize, Debug)]
pub struct JsonRpcRequest<'a, P> {
    pub jsonrpc: &'static str,
    pub id: &'static str,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P> JsonRpcRequest<'a, P> {
    pub fn new(method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id: "dontcare",
            method,
            params,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct JsonRpcResponse<R> {
    pub result: Option<R>,
    pub error: Option<JsonRpcError>,
}

/// Error object. NEAR nodes add `name`/`cause`/`data` on top of the
/// standard `code`/`message`.
#[derive(Deserialize, Debug, Clone)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub cause: Option<serde_json::Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message.as_deref().unwrap_or("unknown error"))?;
        if let Some(code) = self.code {
            write!(f, " (code {code})")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        } else if let Some(data) = &self.data {
            write!(f, ": {data}")?;
        }
        Ok(())
    }
}

/// POST one JSON-RPC call. `Ok(None)` means the server answered with a
/// `null` result.
pub fn call<T, P, R>(
    transport: &T,
    url: &str,
    method: &str,
    params: P,
    timeout: Duration,
) -> Result<Option<R>>
where
    T: HttpTransport + ?Sized,
    P: Serialize,
    R: DeserializeOwned,
{
    let request = JsonRpcRequest::new(method, params);
    let body = serde_json::to_vec(&request)?;
    debug!(url, method, body = %String::from_utf8_lossy(&body), "JSON-RPC request");

    let body = transport
        .send(HttpRequest::post_json(url, body).timeout(timeout))?
        .into_ok_body()?;

    let response: JsonRpcResponse<R> = serde_json::from_slice(&body).map_err(|e| {
        Error::Rpc(format!(
            "Failed to parse {method} response: {e}. Body: {}",
            String::from_utf8_lossy(&body).chars().take(1000).collect::<String>()
        ))
    })?;

    if let Some(error) = response.error {
        return Err(Error::Rpc(format!("{method}: {error}")));
    }

    Ok(response.result)
}
