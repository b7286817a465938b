//! Remote endpoint URL construction.
//!
//! All query assembly happens on local values returned to the caller; there
//! is no shared query-string state between calls.

use crate::{Error, RemoteServer};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt;
use url::Url;

const PARAMETERIZED_BUILD_SEGMENT: &str = "/buildWithParameters";
const NORMAL_BUILD_SEGMENT: &str = "/build";
const BUILD_TOKEN_ROOT_SEGMENT: &str = "/buildByToken";

/// Everything outside `[A-Za-z0-9.\-*_]` is percent-encoded; space becomes
/// `%20`, never `+`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'*')
    .remove(b'_');

/// Percent-encode one query-string piece.
#[must_use]
pub fn encode_value(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY_VALUE).to_string()
}

/// `&`-joined query accumulator, local to one URL build.
#[derive(Default)]
struct QueryString(String);

impl QueryString {
    fn push(&mut self, item: &str) {
        if !self.0.is_empty() {
            self.0.push('&');
        }
        self.0.push_str(item);
    }
}

impl fmt::Display for QueryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn base_str(server: &RemoteServer) -> &str {
    server.address().as_str().trim_end_matches('/')
}

/// Builds the fully qualified trigger URL for one run.
#[derive(Debug)]
pub struct TriggerUrlBuilder<'a> {
    server: &'a RemoteServer,
    job: &'a str,
    security_token: &'a str,
    encoded_params: &'a str,
    remote_job_parameterized: bool,
    has_local_parameters: bool,
}

impl<'a> TriggerUrlBuilder<'a> {
    #[must_use]
    pub fn new(server: &'a RemoteServer, job: &'a str) -> Self {
        Self {
            server,
            job,
            security_token: "",
            encoded_params: "",
            remote_job_parameterized: false,
            has_local_parameters: false,
        }
    }

    #[must_use]
    pub fn security_token(mut self, token: &'a str) -> Self {
        self.security_token = token;
        self
    }

    /// Query string previously produced by
    /// [`encode_query_string`](crate::params::encode_query_string).
    #[must_use]
    pub fn encoded_params(mut self, params: &'a str) -> Self {
        self.encoded_params = params;
        self
    }

    #[must_use]
    pub fn remote_job_parameterized(mut self, yes: bool) -> Self {
        self.remote_job_parameterized = yes;
        self
    }

    #[must_use]
    pub fn has_local_parameters(mut self, yes: bool) -> Self {
        self.has_local_parameters = yes;
        self
    }

    fn build_type_segment(&self) -> &'static str {
        if self.remote_job_parameterized || self.has_local_parameters {
            PARAMETERIZED_BUILD_SEGMENT
        } else {
            NORMAL_BUILD_SEGMENT
        }
    }

    /// Produce the trigger URL: one `?`, well-formed `&`-joined query,
    /// `delay=0` always last.
    #[must_use]
    pub fn build(&self) -> String {
        let mut url = base_str(self.server).to_owned();
        let mut query = QueryString::default();

        if self.server.has_build_token_root() {
            url.push_str(BUILD_TOKEN_ROOT_SEGMENT);
            url.push_str(self.build_type_segment());
            query.push(&format!("job={}", encode_value(self.job)));
        } else {
            url.push_str("/job/");
            url.push_str(&encode_value(self.job));
            url.push_str(self.build_type_segment());
        }

        if !self.security_token.is_empty() {
            query.push(&format!("token={}", encode_value(self.security_token)));
        }

        if !self.encoded_params.is_empty() {
            query.push(self.encoded_params);
        }

        // delay=0 asks the remote queue for immediate placement.
        query.push("delay=0");

        format!("{url}?{query}")
    }
}

/// `{server}/job/{job}/api/json` – the parameterization probe endpoint.
#[must_use]
pub fn job_api_url(server: &RemoteServer, job: &str) -> String {
    format!("{}/job/{}/api/json", base_str(server), encode_value(job))
}

/// `{server}/job/{job}/lastBuild/api/json/` – the duplicate-build precheck.
#[must_use]
pub fn last_build_api_url(server: &RemoteServer, job: &str) -> String {
    format!(
        "{}/job/{}/lastBuild/api/json/",
        base_str(server),
        encode_value(job)
    )
}

/// `{server}/queue/item/{id}/api/json/` – queue item resolution.
#[must_use]
pub fn queue_item_api_url(server: &RemoteServer, queue_id: u64) -> String {
    format!("{}/queue/item/{}/api/json/", base_str(server), queue_id)
}

/// `{buildURL}api/json/` – status of a concrete remote build.
#[must_use]
pub fn build_status_url(build_url: &str) -> String {
    format!("{}api/json/", with_trailing_slash(build_url))
}

/// `{buildURL}consoleText` – full console output of a remote build.
#[must_use]
pub fn console_text_url(build_url: &str) -> String {
    format!("{}consoleText", with_trailing_slash(build_url))
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_owned()
    } else {
        format!("{url}/")
    }
}

/// Parse a URL this crate assembled (or the remote reported). Failure means
/// the remote fed us something unusable, not a transport problem.
pub(crate) fn parse_url(raw: &str) -> Result<Url, Error> {
    Url::parse(raw).map_err(|err| Error::UnexpectedRemoteFormat {
        detail: format!("`{raw}` is not a valid URL: {err}"),
    })
}
