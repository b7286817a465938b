//! Trigger a build on a remote Jenkins server, resolve the queued build,
//! and optionally block until the remote build reaches a terminal result.
//!
//! The entry point is [`TriggerOrchestrator`]; one [`TriggerRequest`] drives
//! one trigger → queue-resolve → poll → report cycle.

// compile-time guard: enable at least one TLS backend.
#[cfg(not(any(feature = "rustls", feature = "native-tls")))]
compile_error!("Enable at least one TLS backend: `rustls` (default) or `native-tls`.");

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod host;
pub mod invoker;
pub mod orchestrator;
pub mod params;
pub mod queue;
pub mod schedule;
pub mod status;
pub mod transport;
pub mod urls;
mod util;

pub use auth::{Auth, SecretString};
pub use config::{RemoteServer, ServerRegistry};
pub use error::{Error, ErrorKind, Result, TransportErrorKind};
pub use guard::DuplicateBuildGuard;
pub use host::{
    BuildInfoReporter, NoopReporter, NoopTokenExpander, RunContext, TokenExpander,
};
pub use invoker::{ConnectionResponse, HttpInvoker};
pub use orchestrator::{
    TerminalReport, TriggerOrchestrator, TriggerOrchestratorBuilder, TriggerRequest,
};
pub use params::{ParameterSource, encode_query_string, normalize_parameters};
pub use queue::{QueueItemStatus, QueueResolver, RemoteBuildHandle};
pub use schedule::{CancelToken, PollPacer, Scheduler, ThreadScheduler};
pub use status::{BuildStatusPoller, RemoteBuildResult, RemoteBuildStatus};
pub use transport::{
    BlockingTransport, DynBlockingTransport, TransportRequest, TransportResponse, UreqBlocking,
};
pub use urls::TriggerUrlBuilder;
