//! Duplicate-build precheck.
//!
//! Opt-in: before triggering, watch the remote job's last build and hold the
//! whole trigger until the remote job is free. Fails closed: a precheck that
//! cannot read a usable document aborts the run instead of triggering blind.

use crate::invoker::HttpInvoker;
use crate::schedule::PollPacer;
use crate::urls::{last_build_api_url, parse_url};
use crate::{Error, RemoteServer};
use http::Method;
use serde_json::Value;
use tracing::info;

pub struct DuplicateBuildGuard<'a> {
    invoker: &'a HttpInvoker,
    pacer: &'a PollPacer,
}

impl<'a> DuplicateBuildGuard<'a> {
    #[must_use]
    pub fn new(invoker: &'a HttpInvoker, pacer: &'a PollPacer) -> Self {
        Self { invoker, pacer }
    }

    /// Block until the remote job's last build is neither running nor
    /// result-less. Unbounded wait; only interruption ends it early.
    pub fn wait_until_idle(&self, server: &RemoteServer, job: &str) -> Result<(), Error> {
        info!(job, "checking that the remote job is not currently building");
        let url = parse_url(&last_build_api_url(server, job))?;

        let mut doc = self.fetch_document(&url)?;
        while is_active(&doc) {
            info!(
                job,
                wait_secs = self.pacer.interval().as_secs(),
                "remote build is currently running, waiting for it to finish"
            );
            self.pacer.pause()?;
            doc = self.fetch_document(&url)?;
        }
        info!(job, "remote job is not currently building");
        Ok(())
    }

    fn fetch_document(&self, url: &url::Url) -> Result<Value, Error> {
        self.invoker
            .invoke(url, Method::GET)?
            .body()
            .cloned()
            .ok_or_else(|| Error::PrecheckUnavailable {
                detail: "got a blank response from the remote server, cannot continue".to_owned(),
            })
    }
}

/// Active means the last build is running, or exists without a result yet.
fn is_active(doc: &Value) -> bool {
    let building = doc.get("building").and_then(Value::as_bool) == Some(true);
    let has_result = doc.get("result").and_then(Value::as_str).is_some();
    building || !has_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn running_build_is_active() {
        assert!(is_active(&json!({"building": true, "result": null})));
    }

    #[test]
    fn missing_result_is_active_even_when_not_building() {
        assert!(is_active(&json!({"building": false, "result": null})));
        assert!(is_active(&json!({"building": false})));
    }

    #[test]
    fn finished_build_is_idle() {
        assert!(!is_active(&json!({"building": false, "result": "FAILURE"})));
    }
}
