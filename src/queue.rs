//! Queue-admission resolution.
//!
//! A trigger POST only buys a queue item; this module polls that item until
//! the remote server turns it into a concrete executing build (or cancels
//! it).

use crate::invoker::{ConnectionResponse, HttpInvoker};
use crate::schedule::PollPacer;
use crate::urls::{parse_url, queue_item_api_url};
use crate::{Error, RemoteServer};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// A concrete remote build, once the queue item has resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBuildHandle {
    pub url: String,
    pub number: u64,
}

/// Transient state of a queue item, derived from one poll of its document.
#[derive(Clone, Debug, PartialEq)]
pub enum QueueItemStatus {
    Blocked,
    Pending,
    Buildable,
    Cancelled,
    Resolved(RemoteBuildHandle),
}

/// Derive a queue item's status from its JSON document.
pub fn queue_item_status(doc: &Value) -> Result<QueueItemStatus, Error> {
    if doc.get("cancelled").and_then(Value::as_bool) == Some(true) {
        return Ok(QueueItemStatus::Cancelled);
    }

    if let Some(executable) = doc.get("executable").filter(|value| !value.is_null()) {
        let handle: RemoteBuildHandle =
            serde_json::from_value(executable.clone()).map_err(|err| {
                Error::UnexpectedRemoteFormat {
                    detail: format!("queue item executable is missing url or number: {err}"),
                }
            })?;
        return Ok(QueueItemStatus::Resolved(handle));
    }

    if doc.get("blocked").and_then(Value::as_bool) == Some(true) {
        return Ok(QueueItemStatus::Blocked);
    }
    if doc.get("buildable").and_then(Value::as_bool) == Some(true) {
        return Ok(QueueItemStatus::Buildable);
    }
    Ok(QueueItemStatus::Pending)
}

fn queue_reason(doc: &Value) -> &str {
    doc.get("why").and_then(Value::as_str).unwrap_or("unknown")
}

/// Extract the queue id from a trigger response's `Location` URL: the
/// trailing numeric path segment.
pub fn queue_id_from_location(location: &str) -> Result<u64, Error> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse::<u64>().ok())
        .ok_or_else(|| Error::MalformedQueueLocation {
            detail: format!("no numeric queue id in `{location}`"),
        })
}

/// Polls the remote queue item until it resolves into an executing build.
pub struct QueueResolver<'a> {
    invoker: &'a HttpInvoker,
    server: &'a RemoteServer,
    pacer: &'a PollPacer,
}

impl<'a> QueueResolver<'a> {
    #[must_use]
    pub fn new(invoker: &'a HttpInvoker, server: &'a RemoteServer, pacer: &'a PollPacer) -> Self {
        Self {
            invoker,
            server,
            pacer,
        }
    }

    /// Resolve the queue item the trigger response points at.
    ///
    /// Loops without a retry bound: only cancellation of the queue item, an
    /// unusable document, or interruption of the run ends it.
    pub fn resolve(&self, trigger_response: &ConnectionResponse) -> Result<RemoteBuildHandle, Error> {
        let location =
            trigger_response
                .location()
                .ok_or_else(|| Error::MalformedQueueLocation {
                    detail: "trigger response carried no Location header".to_owned(),
                })?;
        info!(location, "remote job queued");

        let queue_id = queue_id_from_location(location)?;
        debug!(queue_id, "resolved queue item id");

        let url = parse_url(&queue_item_api_url(self.server, queue_id))?;

        let mut waiting_logged = false;
        loop {
            let response = self.invoker.invoke(&url, Method::GET)?;
            let doc = response
                .body()
                .ok_or_else(|| Error::UnexpectedRemoteFormat {
                    detail: format!("queue item {queue_id} returned an empty or non-JSON document"),
                })?;

            match queue_item_status(doc)? {
                QueueItemStatus::Cancelled => return Err(Error::RemoteBuildCancelled),
                QueueItemStatus::Resolved(handle) => {
                    info!(url = %handle.url, number = handle.number, "remote build assigned");
                    return Ok(handle);
                }
                state => {
                    match state {
                        QueueItemStatus::Blocked => {
                            info!(reason = queue_reason(doc), "the remote job is blocked");
                        }
                        QueueItemStatus::Pending => {
                            info!(reason = queue_reason(doc), "the remote job is pending");
                        }
                        QueueItemStatus::Buildable => {
                            info!(reason = queue_reason(doc), "the remote job is buildable");
                        }
                        _ => {}
                    }
                    if !waiting_logged {
                        info!(
                            interval_secs = self.pacer.interval().as_secs(),
                            "waiting for the queue item to resolve"
                        );
                        waiting_logged = true;
                    }
                    self.pacer.pause()?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_comes_from_the_trailing_segment() {
        assert_eq!(
            queue_id_from_location("http://ci.example.com/queue/item/123/").unwrap(),
            123
        );
        assert_eq!(queue_id_from_location("/queue/item/7").unwrap(), 7);
    }

    #[test]
    fn non_numeric_location_is_malformed() {
        let err = queue_id_from_location("http://ci.example.com/queue/").unwrap_err();
        assert!(matches!(err, Error::MalformedQueueLocation { .. }));
    }

    #[test]
    fn cancelled_wins_over_everything() {
        let doc = json!({"cancelled": true, "executable": {"url": "u", "number": 1}});
        assert_eq!(
            queue_item_status(&doc).unwrap(),
            QueueItemStatus::Cancelled
        );
    }

    #[test]
    fn executable_resolves_to_a_handle() {
        let doc = json!({"executable": {"url": "U", "number": 7}});
        assert_eq!(
            queue_item_status(&doc).unwrap(),
            QueueItemStatus::Resolved(RemoteBuildHandle {
                url: "U".to_owned(),
                number: 7
            })
        );
    }

    #[test]
    fn malformed_executable_is_an_unexpected_format() {
        let doc = json!({"executable": {"number": "soon"}});
        assert!(matches!(
            queue_item_status(&doc),
            Err(Error::UnexpectedRemoteFormat { .. })
        ));
    }

    #[test]
    fn waiting_states_derive_from_flags() {
        assert_eq!(
            queue_item_status(&json!({"blocked": true, "why": "upstream"})).unwrap(),
            QueueItemStatus::Blocked
        );
        assert_eq!(
            queue_item_status(&json!({"buildable": true})).unwrap(),
            QueueItemStatus::Buildable
        );
        assert_eq!(
            queue_item_status(&json!({"why": "just added"})).unwrap(),
            QueueItemStatus::Pending
        );
    }

    #[test]
    fn null_executable_is_not_resolved() {
        let doc = json!({"executable": null, "buildable": true});
        assert_eq!(
            queue_item_status(&doc).unwrap(),
            QueueItemStatus::Buildable
        );
    }
}
