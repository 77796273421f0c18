//! Blocking HTTP transport.
//!
//! The worker runs either natively (`native` feature, reqwest) or as a WASI
//! component (`wasi` feature, wasi-http-client). Clients are generic over
//! [`HttpTransport`] so both backends, and test doubles, plug in the same way.

use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    /// JSON body; sent with `Content-Type: application/json`.
    pub body: Option<Vec<u8>>,
    pub bearer_token: Option<&'a str>,
    pub timeout: Duration,
}

impl<'a> HttpRequest<'a> {
    pub fn get(url: &'a str) -> Self {
        Self {
            method: Method::Get,
            url,
            body: None,
            bearer_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn post_json(url: &'a str, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            url,
            body: Some(body),
            bearer_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn bearer_token(mut self, token: Option<&'a str>) -> Self {
        self.bearer_token = token;
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// The body, or [`Error::HttpStatus`] for any non-2xx status.
    pub fn into_ok_body(self) -> Result<Vec<u8>> {
        if (200..300).contains(&self.status) {
            Ok(self.body)
        } else {
            Err(Error::HttpStatus {
                status: self.status,
                body: String::from_utf8_lossy(&self.body)
                    .chars()
                    .take(500)
                    .collect(),
            })
        }
    }
}

pub trait HttpTransport {
    fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse> {
        (**self).send(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for std::sync::Arc<T> {
    fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse> {
        (**self).send(request)
    }
}

#[cfg(feature = "native")]
pub use native::ReqwestTransport;

#[cfg(feature = "native")]
mod native {
    use super::{HttpRequest, HttpResponse, HttpTransport, Method};
    use crate::error::{Error, Result};

    /// reqwest blocking client. Cheap to clone; clones share one pool.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestTransport {
        client: reqwest::blocking::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl HttpTransport for ReqwestTransport {
        fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse> {
            let mut builder = match request.method {
                Method::Get => self.client.get(request.url),
                Method::Post => self.client.post(request.url),
            }
            .timeout(request.timeout);

            if let Some(token) = request.bearer_token {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = request.body {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body);
            }

            let response = builder
                .send()
                .map_err(|e| Error::Transport(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .bytes()
                .map_err(|e| Error::Transport(format!("Failed to read response body: {e}")))?
                .to_vec();

            Ok(HttpResponse { status, body })
        }
    }
}

#[cfg(all(feature = "wasi", not(feature = "native")))]
pub use wasi::WasiTransport;

#[cfg(all(feature = "wasi", not(feature = "native")))]
mod wasi {
    use super::{HttpRequest, HttpResponse, HttpTransport, Method};
    use crate::error::{Error, Result};
    use wasi_http_client::Client;

    /// Outbound HTTP through the WASI host.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct WasiTransport;

    impl HttpTransport for WasiTransport {
        fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse> {
            let authorization = request.bearer_token.map(|token| format!("Bearer {token}"));
            let client = Client::new();
            let mut builder = match request.method {
                Method::Get => client.get(request.url),
                Method::Post => client.post(request.url),
            }
            .connect_timeout(request.timeout);

            if let Some(authorization) = &authorization {
                builder = builder.header("Authorization", authorization);
            }
            if let Some(body) = &request.body {
                builder = builder
                    .header("Content-Type", "application/json")
                    .body(body);
            }

            let response = builder
                .send()
                .map_err(|e| Error::Transport(e.to_string()))?;
            let status = response.status();
            let body = response
                .body()
                .map_err(|e| Error::Transport(format!("Failed to read response body: {e}")))?;

            Ok(HttpResponse { status, body })
        }
    }
}

/// Scripted transport for unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::{HttpRequest, HttpResponse, HttpTransport, Method};
    use crate::error::{Error, Result};

    #[derive(Debug, Clone)]
    pub(crate) struct Recorded {
        pub method: Method,
        pub url: String,
        pub body: Option<serde_json::Value>,
        pub bearer_token: Option<String>,
    }

    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        responses: RefCell<VecDeque<Result<HttpResponse>>>,
        pub requests: RefCell<Vec<Recorded>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn push_json(&self, value: serde_json::Value) -> &Self {
            self.push_status(200, value.to_string())
        }

        pub(crate) fn push_status(&self, status: u16, body: impl Into<String>) -> &Self {
            self.responses.borrow_mut().push_back(Ok(HttpResponse {
                status,
                body: body.into().into_bytes(),
            }));
            self
        }

        pub(crate) fn push_error(&self, message: &str) -> &Self {
            self.responses
                .borrow_mut()
                .push_back(Err(Error::Transport(message.to_string())));
            self
        }

        pub(crate) fn request(&self, index: usize) -> Recorded {
            self.requests.borrow()[index].clone()
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn send(&self, request: HttpRequest<'_>) -> Result<HttpResponse> {
            self.requests.borrow_mut().push(Recorded {
                method: request.method,
                url: request.url.to_string(),
                body: request
                    .body
                    .as_deref()
                    .map(|b| serde_json::from_slice(b).expect("request body is JSON")),
                bearer_token: request.bearer_token.map(str::to_string),
            });
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Transport("no scripted response".to_string())))
        }
    }
}
