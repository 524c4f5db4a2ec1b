use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::core::types::CancelSignal;

/// Outcome of a single HTTP attempt that reached the wire. Status handling
/// belongs to the caller: discovery needs to see 404s, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level failure, with timeout separated from everything else so
/// adapters can surface it distinctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    Timeout { timeout_ms: u64 },
    Cancelled,
    Failed { message: String },
}

enum RequestBody {
    Empty,
    Json(Vec<u8>),
    Multipart(Form),
}

/// Thin wrapper over a shared `reqwest::Client`. One attempt per call; every
/// attempt carries its own deadline, and an optional external cancellation
/// signal replaces the deadline for caller-managed lifetimes.
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        timeout_ms: u64,
    ) -> Result<HttpReply, TransportFailure> {
        bounded(timeout_ms, async {
            let response = self.send(Method::GET, url, headers, RequestBody::Empty).await?;
            read_reply(response).await
        })
        .await
    }

    pub async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &Value,
        timeout_ms: u64,
        cancel: Option<&CancelSignal>,
    ) -> Result<HttpReply, TransportFailure> {
        let payload = encode_json_body(body)?;
        let flow = async {
            let response = self
                .send(Method::POST, url, headers, RequestBody::Json(payload))
                .await?;
            read_reply(response).await
        };

        match cancel {
            Some(signal) => cancellable(signal, flow).await,
            None => bounded(timeout_ms, flow).await,
        }
    }

    /// Sends a JSON POST and hands back the response without buffering the
    /// body, so streaming consumers own the connection. The deadline (or the
    /// cancellation signal) covers connection establishment only; the body
    /// outlives both.
    pub async fn post_json_streaming(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &Value,
        timeout_ms: u64,
        cancel: Option<&CancelSignal>,
    ) -> Result<reqwest::Response, TransportFailure> {
        let payload = encode_json_body(body)?;
        let flow = self.send(Method::POST, url, headers, RequestBody::Json(payload));

        match cancel {
            Some(signal) => cancellable(signal, flow).await,
            None => bounded(timeout_ms, flow).await,
        }
    }

    pub async fn post_multipart(
        &self,
        url: &str,
        headers: HeaderMap,
        file_name: &str,
        content: Vec<u8>,
        timeout_ms: u64,
    ) -> Result<HttpReply, TransportFailure> {
        let part = Part::bytes(content).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        bounded(timeout_ms, async {
            let response = self
                .send(Method::POST, url, headers, RequestBody::Multipart(form))
                .await?;
            read_reply(response).await
        })
        .await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: RequestBody,
    ) -> Result<reqwest::Response, TransportFailure> {
        let mut request_builder = self.client.request(method, url).headers(headers);

        match body {
            RequestBody::Empty => {}
            RequestBody::Json(payload) => {
                request_builder = request_builder
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                    .body(payload);
            }
            // No explicit content type on multipart: the client supplies
            // multipart/form-data with the boundary.
            RequestBody::Multipart(form) => {
                request_builder = request_builder.multipart(form);
            }
        }

        request_builder
            .send()
            .await
            .map_err(|error| TransportFailure::Failed {
                message: error.to_string(),
            })
    }
}

fn encode_json_body(body: &Value) -> Result<Vec<u8>, TransportFailure> {
    serde_json::to_vec(body).map_err(|error| TransportFailure::Failed {
        message: format!("failed to encode request body: {error}"),
    })
}

async fn read_reply(response: reqwest::Response) -> Result<HttpReply, TransportFailure> {
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|error| TransportFailure::Failed {
            message: error.to_string(),
        })?
        .to_vec();

    Ok(HttpReply { status, body })
}

async fn bounded<T>(
    timeout_ms: u64,
    flow: impl Future<Output = Result<T, TransportFailure>>,
) -> Result<T, TransportFailure> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), flow).await {
        Ok(result) => result,
        Err(_) => Err(TransportFailure::Timeout { timeout_ms }),
    }
}

async fn cancellable<T>(
    signal: &CancelSignal,
    flow: impl Future<Output = Result<T, TransportFailure>>,
) -> Result<T, TransportFailure> {
    tokio::select! {
        _ = signal.cancelled() => Err(TransportFailure::Cancelled),
        result = flow => result,
    }
}
