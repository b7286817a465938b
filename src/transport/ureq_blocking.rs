use super::{TransportRequest, TransportResponse};
use crate::error::{Error, TransportErrorKind};
use http::Method;
use std::time::Duration;
use ureq::Agent;

/// Default blocking transport built on `ureq`.
///
/// Non-2xx statuses are returned as responses, never as errors: an error body
/// the remote server managed to write is still a readable body.
#[derive(Clone)]
pub struct UreqBlocking {
    agent: Agent,
}

impl UreqBlocking {
    /// Construct a new transport.
    ///
    /// * `insecure` – accept invalid TLS certificates.
    /// * `ua` – User-Agent header.
    /// * `connect_timeout` – how long to wait for the connection to open.
    /// * `no_proxy` – ignore system proxy environment variables.
    pub fn try_new(
        insecure: bool,
        ua: &str,
        connect_timeout: Duration,
        no_proxy: bool,
    ) -> Result<Self, Error> {
        let mut builder = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(connect_timeout))
            .user_agent(ua);

        if no_proxy {
            builder = builder.proxy(None);
        }

        if insecure {
            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }

        Ok(Self {
            agent: Agent::new_with_config(builder.build()),
        })
    }
}

impl super::BlockingTransport for UreqBlocking {
    fn send(&self, req: TransportRequest) -> Result<TransportResponse, Error> {
        let TransportRequest {
            method,
            url,
            headers,
        } = req;
        let path = url.path().to_string().into_boxed_str();
        let url = url.as_str();
        let method_for_error = method.clone();

        let map_err = |err: ureq::Error| {
            let kind = match &err {
                ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
                ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
                    TransportErrorKind::Connect
                }
                ureq::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
                    TransportErrorKind::Timeout
                }
                ureq::Error::Io(io)
                    if matches!(
                        io.kind(),
                        std::io::ErrorKind::ConnectionRefused
                            | std::io::ErrorKind::ConnectionReset
                            | std::io::ErrorKind::ConnectionAborted
                            | std::io::ErrorKind::NotConnected
                    ) =>
                {
                    TransportErrorKind::Connect
                }
                _ => TransportErrorKind::Other,
            };

            Error::Transport {
                method: method_for_error.clone(),
                path: path.clone(),
                kind,
                source: Box::new(err),
            }
        };

        let mut response = match method {
            Method::GET => {
                let mut req = self.agent.get(url);
                for (name, value) in headers.iter() {
                    req = req.header(name, value);
                }
                req.call().map_err(map_err)?
            }
            Method::POST => {
                let mut req = self.agent.post(url);
                for (name, value) in headers.iter() {
                    req = req.header(name, value);
                }
                req.send_empty().map_err(map_err)?
            }
            other => {
                return Err(Error::InvalidConfig {
                    message: format!("unsupported HTTP method for remote trigger: {other}")
                        .into_boxed_str(),
                    source: None,
                });
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(map_err)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
