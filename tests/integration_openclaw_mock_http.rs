use std::collections::{BTreeMap, VecDeque};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use agent_runtime::core::error::RuntimeError;
use agent_runtime::core::traits::AgentRuntime;
use agent_runtime::core::types::{ChatOptions, RequestOptions, cancel_pair};
use agent_runtime::runtimes::openclaw::{OpenClawConfig, OpenClawRuntime};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct MockResponse {
    status_code: u16,
    body: String,
    delay: Option<Duration>,
}

impl MockResponse {
    fn new(status_code: u16, body: &str) -> Self {
        Self {
            status_code,
            body: body.to_string(),
            delay: None,
        }
    }

    fn not_found() -> Self {
        Self::new(404, r#"{"error":"not found"}"#)
    }

    fn delayed(status_code: u16, body: &str, delay: Duration) -> Self {
        Self {
            status_code,
            body: body.to_string(),
            delay: Some(delay),
        }
    }
}

struct MockServer {
    addr: std::net::SocketAddr,
    captured_requests: Arc<Mutex<Vec<String>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockServer {
    fn start(responses: Vec<MockResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        listener
            .set_nonblocking(false)
            .expect("configure blocking listener");
        let addr = listener.local_addr().expect("listener addr");

        let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
        let captured_requests = Arc::new(Mutex::new(Vec::new()));

        let queue_clone = Arc::clone(&queue);
        let captured_clone = Arc::clone(&captured_requests);

        let handle = thread::spawn(move || {
            loop {
                let next_response = {
                    let mut queue = queue_clone.lock().expect("queue lock");
                    queue.pop_front()
                };

                let Some(response) = next_response else {
                    break;
                };

                let (mut stream, _) = listener.accept().expect("accept connection");
                stream
                    .set_read_timeout(Some(Duration::from_secs(3)))
                    .expect("set stream timeout");

                let request = read_http_request_with_body(&mut stream);
                captured_clone.lock().expect("capture lock").push(request);

                if let Some(delay) = response.delay {
                    thread::sleep(delay);
                }

                let response_text = build_http_response(response.status_code, &response.body);
                // The client may already have timed out or cancelled.
                let _ = stream.write_all(response_text.as_bytes());
                let _ = stream.flush();
            }
        });

        Self {
            addr,
            captured_requests,
            handle: Some(handle),
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn captured_requests(&self) -> Vec<String> {
        self.captured_requests
            .lock()
            .expect("capture lock")
            .clone()
    }

    fn captured_request_paths(&self) -> Vec<String> {
        self.captured_requests()
            .iter()
            .map(|raw_request| {
                let request_line = raw_request.lines().next().unwrap_or_default();
                request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    fn captured_headers(&self) -> Vec<BTreeMap<String, String>> {
        self.captured_requests()
            .iter()
            .map(|raw_request| parse_request_headers(raw_request))
            .collect()
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("join mock server");
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn runtime_with_bases(api_base_url: &str, control_plane_base_urls: Vec<String>) -> OpenClawRuntime {
    let mut config = OpenClawConfig::new(api_base_url, "integration-key");
    config.control_plane_base_urls = control_plane_base_urls;
    OpenClawRuntime::new(config).expect("valid integration config")
}

fn chat_payload() -> Value {
    json!({
        "model": "claw-1",
        "messages": [{"role": "user", "content": "ping"}],
    })
}

const CHAT_ENVELOPE: &str = r#"{"id":"chatcmpl-1","object":"chat.completion","choices":[{"index":0,"message":{"role":"assistant","content":"pong"},"finish_reason":"stop"}]}"#;

#[tokio::test]
async fn test_discovery_order_is_catalog_paths_times_configured_bases() {
    // Path 1 missing everywhere; path 2 present on base 1. Base 2 must not
    // be consulted for path 2.
    let mut primary = MockServer::start(vec![
        MockResponse::not_found(),
        MockResponse::new(200, r#"{"object":"list","data":[{"id":"agent-1"}]}"#),
    ]);
    let mut secondary = MockServer::start(vec![MockResponse::not_found()]);

    let runtime = runtime_with_bases(
        &primary.url(),
        vec![primary.url(), secondary.url()],
    );

    let listing = runtime
        .list_control_resource("agents", &RequestOptions::default())
        .await
        .expect("path 2 on base 1 should answer");
    assert_eq!(listing["data"][0]["id"], json!("agent-1"));

    primary.shutdown();
    secondary.shutdown();

    assert_eq!(
        primary.captured_request_paths(),
        ["/v1/agents", "/agents"],
        "base 1 sees each candidate path in catalog order"
    );
    assert_eq!(
        secondary.captured_request_paths(),
        ["/v1/agents"],
        "base 2 is consulted for path 1 only; path 2 short-circuits on base 1"
    );
}

#[tokio::test]
async fn test_discovery_exhaustion_quotes_last_failure() {
    let mut server = MockServer::start(vec![
        MockResponse::not_found(),
        MockResponse::not_found(),
        MockResponse::not_found(),
        MockResponse::new(500, "backend exploded"),
    ]);

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);

    let error = runtime
        .list_control_resource("agents", &RequestOptions::default())
        .await
        .expect_err("every combination fails");

    server.shutdown();
    assert_eq!(
        server.captured_request_paths(),
        ["/v1/agents", "/agents", "/api/agents", "/api/v1/agents"]
    );

    match error {
        RuntimeError::DiscoveryExhausted {
            resource,
            attempts,
            last_error,
        } => {
            assert_eq!(resource, "agents");
            assert_eq!(attempts, 4);
            let last_error = last_error.expect("a failure was recorded");
            assert!(last_error.contains("http status 500"), "{last_error}");
            assert!(last_error.contains("/api/v1/agents"), "{last_error}");
            assert!(last_error.contains("backend exploded"), "{last_error}");
        }
        other => panic!("expected DiscoveryExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_discovery_continues_past_definitive_failure_to_next_path() {
    // A non-404 failure answers for the current path but the search moves on.
    let mut server = MockServer::start(vec![
        MockResponse::new(500, "flaky route"),
        MockResponse::new(200, r#"{"object":"list","data":[]}"#),
    ]);

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);

    let listing = runtime
        .list_control_resource("sessions", &RequestOptions::default())
        .await
        .expect("second candidate path answers");
    assert_eq!(listing["object"], json!("list"));

    server.shutdown();
    assert_eq!(
        server.captured_request_paths(),
        ["/v1/sessions", "/sessions"]
    );
}

#[tokio::test]
async fn test_unknown_resource_fails_without_network_attempts() {
    let mut server = MockServer::start(Vec::new());
    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);

    let error = runtime
        .list_control_resource("workflows", &RequestOptions::default())
        .await
        .expect_err("resource is not in the catalog");
    assert_eq!(
        error,
        RuntimeError::UnknownResource {
            resource: "workflows".to_string(),
        }
    );

    server.shutdown();
    assert!(server.captured_request_paths().is_empty());
}

#[tokio::test]
async fn test_chat_completions_posts_payload_with_agent_header() {
    let mut server = MockServer::start(vec![MockResponse::new(200, CHAT_ENVELOPE)]);

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);
    let response = runtime
        .chat_completions(
            &chat_payload(),
            &ChatOptions {
                agent_id: Some("agent-7".to_string()),
                ..ChatOptions::default()
            },
        )
        .await
        .expect("chat should succeed");

    assert_eq!(
        response["choices"][0]["message"]["content"],
        json!("pong")
    );

    server.shutdown();
    assert_eq!(
        server.captured_request_paths(),
        ["/v1/chat/completions"]
    );

    let headers = server.captured_headers();
    let first = &headers[0];
    assert_eq!(
        first.get("authorization"),
        Some(&"Bearer integration-key".to_string())
    );
    assert_eq!(
        first.get("x-openclaw-agent-id"),
        Some(&"agent-7".to_string())
    );
    assert_eq!(
        first.get("content-type"),
        Some(&"application/json".to_string())
    );

    let raw = &server.captured_requests()[0];
    let body = raw.split("\r\n\r\n").nth(1).unwrap_or_default();
    let sent: Value = serde_json::from_str(body).expect("captured request body");
    assert_eq!(sent, chat_payload());
}

#[tokio::test]
async fn test_chat_timeout_is_distinguished_from_other_failures() {
    let mut server = MockServer::start(vec![MockResponse::delayed(
        200,
        CHAT_ENVELOPE,
        Duration::from_millis(400),
    )]);

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);
    let error = runtime
        .chat_completions(
            &chat_payload(),
            &ChatOptions {
                timeout_ms: Some(50),
                ..ChatOptions::default()
            },
        )
        .await
        .expect_err("backend is slower than the timeout");

    assert_eq!(error, RuntimeError::Timeout { timeout_ms: 50 });

    server.shutdown();
}

#[tokio::test]
async fn test_chat_cancellation_signal_aborts_the_request() {
    let mut server = MockServer::start(vec![MockResponse::delayed(
        200,
        CHAT_ENVELOPE,
        Duration::from_millis(400),
    )]);

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);
    let error = runtime
        .chat_completions(
            &chat_payload(),
            &ChatOptions {
                cancel: Some(signal),
                ..ChatOptions::default()
            },
        )
        .await
        .expect_err("signal fires before the backend responds");

    assert_eq!(error, RuntimeError::Cancelled);

    server.shutdown();
}

#[tokio::test]
async fn test_chat_rejection_surfaces_status_error() {
    let mut server = MockServer::start(vec![MockResponse::new(503, "draining")]);

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);
    let error = runtime
        .chat_completions(&chat_payload(), &ChatOptions::default())
        .await
        .expect_err("backend rejected the request");

    match error {
        RuntimeError::Status {
            status_code,
            message,
            ..
        } => {
            assert_eq!(status_code, 503);
            assert_eq!(message, "draining");
        }
        other => panic!("expected Status, got {other:?}"),
    }

    server.shutdown();
}

#[tokio::test]
async fn test_chat_stream_hands_back_the_response_body() {
    let body = "data: {\"delta\":\"po\"}\n\ndata: {\"delta\":\"ng\"}\n\n";
    let mut server = MockServer::start(vec![MockResponse::new(200, body)]);

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);
    let mut stream = runtime
        .chat_completions_stream(&chat_payload(), &ChatOptions::default())
        .await
        .expect("connection should establish");

    let mut collected = Vec::new();
    while let Some(chunk) = stream.next_chunk().await.expect("chunk") {
        collected.extend_from_slice(&chunk);
    }
    assert_eq!(String::from_utf8_lossy(&collected), body);

    server.shutdown();
}

#[tokio::test]
async fn test_health_check_success_and_failure_shapes() {
    let mut server = MockServer::start(vec![
        MockResponse::new(200, r#"{"status":"ok"}"#),
        MockResponse::new(500, "overloaded"),
    ]);

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);

    let healthy = runtime
        .health_check(&RequestOptions::default())
        .await
        .expect("first probe succeeds");
    assert!(healthy.healthy);
    assert_eq!(healthy.detail, json!({"status": "ok"}));

    let error = runtime
        .health_check(&RequestOptions::default())
        .await
        .expect_err("second probe fails");
    match error {
        RuntimeError::HealthCheckFailed { url, message } => {
            assert!(url.ends_with("/v1/health"), "{url}");
            assert!(message.contains("http status 500"), "{message}");
        }
        other => panic!("expected HealthCheckFailed, got {other:?}"),
    }

    server.shutdown();
    assert_eq!(
        server.captured_request_paths(),
        ["/v1/health", "/v1/health"]
    );
}

#[tokio::test]
async fn test_health_check_wraps_transport_failures_uniformly() {
    // Port reserved then released, so nothing is listening.
    let unused_addr = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr")
    };

    let runtime = runtime_with_bases(
        &format!("http://{unused_addr}"),
        vec![format!("http://{unused_addr}")],
    );

    let error = runtime
        .health_check(&RequestOptions::default())
        .await
        .expect_err("nothing is listening");
    assert!(matches!(error, RuntimeError::HealthCheckFailed { .. }));
}

#[tokio::test]
async fn test_control_plane_status_captures_failures_inline() {
    // agents answers on the first candidate path; every other resource 404s
    // across all four candidates.
    let mut responses = vec![MockResponse::new(
        200,
        r#"{"object":"list","data":[]}"#,
    )];
    responses.extend((0..16).map(|_| MockResponse::not_found()));
    let mut server = MockServer::start(responses);

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);
    let status = runtime.control_plane_status(&RequestOptions::default()).await;

    assert!(status.available, "one available resource makes the OR true");
    assert!(status.resources["agents"].available);
    for resource in ["sessions", "channels", "plugins", "files"] {
        let entry = &status.resources[resource];
        assert!(!entry.available, "resource {resource}");
        assert!(
            entry
                .error
                .as_deref()
                .is_some_and(|message| message.contains("discovery exhausted")),
            "resource {resource}: {:?}",
            entry.error
        );
    }

    server.shutdown();
}

#[tokio::test]
async fn test_fetch_workspace_file_appends_name_to_candidate_paths() {
    let mut server = MockServer::start(vec![
        MockResponse::not_found(),
        MockResponse::new(200, "file payload"),
    ]);

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);
    let content = runtime
        .fetch_workspace_file("notes.txt", &RequestOptions::default())
        .await
        .expect("second candidate answers");

    assert_eq!(content, b"file payload".to_vec());

    server.shutdown();
    assert_eq!(
        server.captured_request_paths(),
        ["/v1/files/notes.txt", "/files/notes.txt"]
    );
}

#[tokio::test]
async fn test_upload_falls_back_on_404_and_keeps_multipart_content_type() {
    let mut server = MockServer::start(vec![
        MockResponse::not_found(),
        MockResponse::new(200, r#"{"uploaded":"notes.txt"}"#),
    ]);

    let runtime = runtime_with_bases(&server.url(), vec![server.url()]);
    let receipt = runtime
        .upload_workspace_file("notes.txt", b"hello".to_vec(), &RequestOptions::default())
        .await
        .expect("second candidate accepts the upload");

    assert_eq!(receipt["uploaded"], json!("notes.txt"));

    server.shutdown();
    assert_eq!(server.captured_request_paths(), ["/v1/files", "/files"]);

    for headers in server.captured_headers() {
        let content_type = headers.get("content-type").expect("content type");
        assert!(
            content_type.starts_with("multipart/form-data; boundary="),
            "unexpected content type: {content_type}"
        );
    }
}

fn read_http_request_with_body(stream: &mut std::net::TcpStream) -> String {
    let mut request = Vec::new();
    let mut chunk = [0_u8; 1024];
    let mut body_expected: Option<usize> = None;
    let mut header_end: Option<usize> = None;

    loop {
        if let (Some(header_end), Some(body_expected)) = (header_end, body_expected) {
            if request.len() >= header_end + body_expected {
                break;
            }
        }

        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(bytes_read) => {
                request.extend_from_slice(&chunk[..bytes_read]);

                if header_end.is_none() {
                    if let Some(position) = request
                        .windows(4)
                        .position(|window| window == b"\r\n\r\n")
                    {
                        header_end = Some(position + 4);
                        let rendered_headers =
                            String::from_utf8_lossy(&request[..position]).to_string();
                        body_expected = Some(parse_content_length(&rendered_headers));
                    }
                }
            }
            Err(error)
                if error.kind() == std::io::ErrorKind::WouldBlock
                    || error.kind() == std::io::ErrorKind::TimedOut =>
            {
                break;
            }
            Err(error) => panic!("failed reading request: {error}"),
        }
    }

    String::from_utf8_lossy(&request).to_string()
}

fn parse_content_length(rendered_headers: &str) -> usize {
    rendered_headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

fn parse_request_headers(raw_request: &str) -> BTreeMap<String, String> {
    raw_request
        .split("\r\n")
        .skip(1)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

fn build_http_response(status_code: u16, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_reason(status_code),
        body.len(),
        body,
    )
}

fn status_reason(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
