//! One HTTP call against the remote server, with the bounded
//! retry-on-transport-failure policy shared by every endpoint.

use crate::schedule::PollPacer;
use crate::transport::{DynBlockingTransport, TransportRequest, TransportResponse};
use crate::urls;
use crate::util::redact::{redact_text, truncate_utf8};
use crate::{Auth, Error};
use http::{HeaderMap, Method, header};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

const BODY_SNIPPET_MAX_BYTES: usize = 4096;

/// Outcome of one successful HTTP exchange.
///
/// `body` is the parsed JSON object, or `None` when the raw body was empty or
/// not JSON-shaped; some remote versions answer certain endpoints with an
/// empty or plain-text body and that is not an error.
#[derive(Clone, Debug)]
pub struct ConnectionResponse {
    headers: HeaderMap,
    body: Option<Value>,
}

impl ConnectionResponse {
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// The `Location` header, if the response carried one.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }
}

/// Executes HTTP calls for one orchestration run.
///
/// Transport-level failures are retried up to the connection retry limit,
/// sleeping one poll interval between attempts; every other outcome (any
/// status code with a readable body) is returned to the caller.
pub struct HttpInvoker {
    transport: DynBlockingTransport,
    pacer: PollPacer,
    auth: Option<Auth>,
    retry_limit: u32,
}

impl HttpInvoker {
    #[must_use]
    pub fn new(
        transport: DynBlockingTransport,
        pacer: PollPacer,
        auth: Option<Auth>,
        retry_limit: u32,
    ) -> Self {
        Self {
            transport,
            pacer,
            auth,
            retry_limit,
        }
    }

    /// Issue `method` against `url` and classify the body.
    pub fn invoke(&self, url: &Url, method: Method) -> Result<ConnectionResponse, Error> {
        let response = self.send_with_retries(url, method)?;
        let text = String::from_utf8_lossy(&response.body);
        let body = self.classify_body(&text)?;
        Ok(ConnectionResponse {
            headers: response.headers,
            body,
        })
    }

    /// Fetch the full console output of a remote build. Same retry contract
    /// as [`invoke`](Self::invoke), raw text instead of parsed JSON.
    pub fn fetch_console_text(&self, build_url: &str) -> Result<String, Error> {
        let url = urls::parse_url(&urls::console_text_url(build_url))?;
        let response = self.send_with_retries(&url, Method::GET)?;
        Ok(String::from_utf8_lossy(&response.body).into_owned())
    }

    fn send_with_retries(&self, url: &Url, method: Method) -> Result<TransportResponse, Error> {
        let max_attempts = self.retry_limit.max(1);
        let mut attempt = 1u32;

        loop {
            match self.attempt(url, method.clone()) {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transport() => {
                    if attempt >= max_attempts {
                        return Err(Error::RetryLimitExceeded {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    warn!(
                        error = %err,
                        wait_secs = self.pacer.interval().as_secs(),
                        "connection to remote server failed, waiting until next attempt"
                    );
                    self.pacer.pause()?;
                    attempt += 1;
                    debug!(attempt, limit = max_attempts, "retrying connection");
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn attempt(&self, url: &Url, method: Method) -> Result<TransportResponse, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            http::HeaderValue::from_static("application/json"),
        );
        if let Some(auth) = self.auth.as_ref().filter(|auth| !auth.is_empty()) {
            headers.insert(header::AUTHORIZATION, auth.header_value()?);
        }

        self.transport.send(TransportRequest {
            method,
            url: url.clone(),
            headers,
        })
    }

    fn classify_body(&self, text: &str) -> Result<Option<Value>, Error> {
        if !looks_like_json(text) {
            return Ok(None);
        }
        if text.trim() == "null" {
            return Ok(None);
        }
        let parsed: Value =
            serde_json::from_str(text).map_err(|err| self.format_error(text, &err.to_string()))?;
        if parsed.is_object() {
            Ok(Some(parsed))
        } else {
            Err(self.format_error(text, "expected a JSON object"))
        }
    }

    fn format_error(&self, body: &str, reason: &str) -> Error {
        let snippet = redact_text(
            truncate_utf8(body, BODY_SNIPPET_MAX_BYTES).to_owned(),
            self.auth.as_ref(),
        );
        Error::UnexpectedRemoteFormat {
            detail: format!("{reason}; body: {snippet}"),
        }
    }
}

/// Heuristic from the wire protocol: a body is JSON-shaped when it is the
/// `null` literal or is bracketed like an object or array.
fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed == "null"
        || (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{CancelToken, PollPacer, ThreadScheduler};
    use crate::transport::BlockingTransport;
    use http::StatusCode;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    };
    use std::time::Duration;

    fn pacer() -> PollPacer {
        PollPacer::new(Arc::new(ThreadScheduler), CancelToken::new(), Duration::ZERO)
    }

    fn response(body: &str) -> TransportResponse {
        TransportResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn transport_error() -> Error {
        Error::Transport {
            method: Method::GET,
            path: "/".into(),
            kind: crate::TransportErrorKind::Connect,
            source: "connection refused".into(),
        }
    }

    /// Fails the first `failures` sends, then replays `body` forever.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
        body: String,
    }

    impl BlockingTransport for FlakyTransport {
        fn send(&self, _req: TransportRequest) -> Result<TransportResponse, Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(transport_error())
            } else {
                Ok(response(&self.body))
            }
        }
    }

    struct RecordingTransport {
        seen: Mutex<Vec<TransportRequest>>,
        body: String,
    }

    impl BlockingTransport for RecordingTransport {
        fn send(&self, req: TransportRequest) -> Result<TransportResponse, Error> {
            self.seen.lock().unwrap().push(req);
            Ok(response(&self.body))
        }
    }

    fn invoker_with(transport: Arc<dyn BlockingTransport>, retry_limit: u32) -> HttpInvoker {
        HttpInvoker::new(transport, pacer(), None, retry_limit)
    }

    #[test]
    fn retry_limit_bounds_total_attempts_strictly() {
        // Five failures with limit 5: the sixth attempt, which would have
        // succeeded, must never happen.
        let transport = Arc::new(FlakyTransport {
            failures: 5,
            calls: AtomicU32::new(0),
            body: "{}".into(),
        });
        let invoker = invoker_with(transport.clone(), 5);

        let err = invoker
            .invoke(&Url::parse("http://ci.example.com/x").unwrap(), Method::GET)
            .unwrap_err();

        assert!(matches!(err, Error::RetryLimitExceeded { attempts: 5, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn recovers_when_a_retry_succeeds_within_the_limit() {
        let transport = Arc::new(FlakyTransport {
            failures: 2,
            calls: AtomicU32::new(0),
            body: r#"{"ok":true}"#.into(),
        });
        let invoker = invoker_with(transport.clone(), 5);

        let resp = invoker
            .invoke(&Url::parse("http://ci.example.com/x").unwrap(), Method::GET)
            .unwrap();

        assert_eq!(resp.body().unwrap()["ok"], true);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn zero_retry_limit_still_attempts_once() {
        let transport = Arc::new(FlakyTransport {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            body: String::new(),
        });
        let invoker = invoker_with(transport.clone(), 0);

        let err = invoker
            .invoke(&Url::parse("http://ci.example.com/x").unwrap(), Method::GET)
            .unwrap_err();

        assert!(matches!(err, Error::RetryLimitExceeded { attempts: 1, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_and_plain_text_bodies_are_absent_not_errors() {
        for body in ["", "OK", "Started build", "null"] {
            let transport = Arc::new(RecordingTransport {
                seen: Mutex::new(Vec::new()),
                body: body.into(),
            });
            let invoker = invoker_with(transport, 5);
            let resp = invoker
                .invoke(&Url::parse("http://ci.example.com/x").unwrap(), Method::GET)
                .unwrap();
            assert!(resp.body().is_none(), "body {body:?} should be absent");
        }
    }

    #[test]
    fn json_shaped_garbage_is_an_unexpected_format() {
        let transport = Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
            body: "{not json}".into(),
        });
        let invoker = invoker_with(transport, 5);
        let err = invoker
            .invoke(&Url::parse("http://ci.example.com/x").unwrap(), Method::GET)
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedRemoteFormat { .. }));
    }

    #[test]
    fn format_error_redacts_the_secret() {
        let transport = Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
            body: "{oops supersecret}".into(),
        });
        let invoker = HttpInvoker::new(
            transport,
            pacer(),
            Some(Auth::basic("user", "supersecret")),
            5,
        );
        let err = invoker
            .invoke(&Url::parse("http://ci.example.com/x").unwrap(), Method::GET)
            .unwrap_err();
        let rendered = err.to_string();
        assert!(!rendered.contains("supersecret"));
    }

    #[test]
    fn auth_and_accept_headers_are_attached() {
        let transport = Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
            body: "{}".into(),
        });
        let invoker = HttpInvoker::new(
            transport.clone(),
            pacer(),
            Some(Auth::basic("user", "token")),
            5,
        );
        invoker
            .invoke(&Url::parse("http://ci.example.com/x").unwrap(), Method::GET)
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        let headers = &seen[0].headers;
        assert_eq!(headers[header::ACCEPT], "application/json");
        assert_eq!(headers[header::AUTHORIZATION], "Basic dXNlcjp0b2tlbg==");
    }

    #[test]
    fn empty_auth_pair_attaches_no_header() {
        let transport = Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
            body: "{}".into(),
        });
        let invoker = HttpInvoker::new(transport.clone(), pacer(), Some(Auth::basic("", "")), 5);
        invoker
            .invoke(&Url::parse("http://ci.example.com/x").unwrap(), Method::GET)
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert!(!seen[0].headers.contains_key(header::AUTHORIZATION));
    }

    #[test]
    fn console_text_returns_the_raw_body() {
        let transport = Arc::new(RecordingTransport {
            seen: Mutex::new(Vec::new()),
            body: "line one\nline two\n".into(),
        });
        let invoker = invoker_with(transport.clone(), 5);
        let text = invoker
            .fetch_console_text("http://ci.example.com/job/foo/7/")
            .unwrap();
        assert_eq!(text, "line one\nline two\n");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(
            seen[0].url.as_str(),
            "http://ci.example.com/job/foo/7/consoleText"
        );
    }
}
