//! Remote build lifecycle polling.

use crate::invoker::HttpInvoker;
use crate::queue::RemoteBuildHandle;
use crate::schedule::PollPacer;
use crate::urls::{build_status_url, parse_url};
use crate::Error;
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};
use url::Url;

/// Lifecycle of a remote build as one poll sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteBuildStatus {
    NotStarted,
    Running,
    /// Terminal: carries the remote system's raw result label.
    Finished(String),
}

/// Derive the build status from a status document.
///
/// A present, non-null `result` is terminal no matter what `building` says;
/// an absent document counts as not started (empty bodies are a known
/// transient on this endpoint).
#[must_use]
pub fn remote_build_status(doc: Option<&Value>) -> RemoteBuildStatus {
    let Some(doc) = doc else {
        return RemoteBuildStatus::NotStarted;
    };
    if let Some(result) = doc.get("result").and_then(Value::as_str) {
        return RemoteBuildStatus::Finished(result.to_owned());
    }
    if doc.get("building").and_then(Value::as_bool) == Some(true) {
        return RemoteBuildStatus::Running;
    }
    RemoteBuildStatus::NotStarted
}

/// Mapped terminal outcome of a remote build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteBuildResult {
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
    Unknown,
}

impl RemoteBuildResult {
    /// Map a remote result label. Unrecognized labels map to `Failure`,
    /// matching the host framework's `Result.fromString` contract.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            label if label.eq_ignore_ascii_case("SUCCESS") => Self::Success,
            label if label.eq_ignore_ascii_case("UNSTABLE") => Self::Unstable,
            label if label.eq_ignore_ascii_case("NOT_BUILT") => Self::NotBuilt,
            label if label.eq_ignore_ascii_case("ABORTED") => Self::Aborted,
            label if label.eq_ignore_ascii_case("UNKNOWN") => Self::Unknown,
            _ => Self::Failure,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Unstable => "UNSTABLE",
            Self::Failure => "FAILURE",
            Self::NotBuilt => "NOT_BUILT",
            Self::Aborted => "ABORTED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RemoteBuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polls a concrete remote build until it reaches a terminal result.
pub struct BuildStatusPoller<'a> {
    invoker: &'a HttpInvoker,
    pacer: &'a PollPacer,
    enhanced_logging: bool,
}

impl<'a> BuildStatusPoller<'a> {
    #[must_use]
    pub fn new(invoker: &'a HttpInvoker, pacer: &'a PollPacer, enhanced_logging: bool) -> Self {
        Self {
            invoker,
            pacer,
            enhanced_logging,
        }
    }

    /// One poll of the build's status endpoint.
    pub fn check(&self, status_url: &Url) -> Result<RemoteBuildStatus, Error> {
        let response = self.invoker.invoke(status_url, Method::GET)?;
        Ok(remote_build_status(response.body()))
    }

    /// Poll until terminal and return the raw result label.
    ///
    /// No retry bound of its own: only the invoker's per-poll transport
    /// limit and run interruption can end the loop early.
    pub fn wait_for_result(&self, handle: &RemoteBuildHandle) -> Result<String, Error> {
        let status_url = parse_url(&build_status_url(&handle.url))?;

        let mut status = self.check(&status_url)?;
        if status == RemoteBuildStatus::NotStarted {
            info!("waiting for the remote build to start");
        }
        let mut started = status != RemoteBuildStatus::NotStarted;
        if started {
            info!("remote build started, waiting for it to finish");
        }

        let label = loop {
            match status {
                RemoteBuildStatus::Finished(label) => break label,
                RemoteBuildStatus::NotStarted | RemoteBuildStatus::Running => {
                    debug!(
                        interval_secs = self.pacer.interval().as_secs(),
                        "waiting until next poll"
                    );
                    self.pacer.pause()?;
                    status = self.check(&status_url)?;
                    if !started && status != RemoteBuildStatus::NotStarted {
                        started = true;
                        info!("remote build started, waiting for it to finish");
                    }
                }
            }
        };
        info!(result = %label, "remote build finished");

        if self.enhanced_logging {
            let console = self.invoker.fetch_console_text(&handle.url)?;
            info!(
                "console output of remote job:\n{}\n{console}\n{}",
                "-".repeat(80),
                "-".repeat(80)
            );
        }

        Ok(label)
    }
}
