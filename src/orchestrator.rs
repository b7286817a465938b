//! The full trigger → resolve → poll → report sequence.

use crate::guard::DuplicateBuildGuard;
use crate::host::{
    BuildInfoReporter, NoopReporter, NoopTokenExpander, RunContext, TokenExpander, expand_lenient,
};
use crate::invoker::HttpInvoker;
use crate::params::{ParameterSource, encode_query_string, normalize_parameters};
use crate::queue::QueueResolver;
use crate::schedule::{CancelToken, PollPacer, Scheduler, ThreadScheduler};
use crate::status::{BuildStatusPoller, RemoteBuildResult};
use crate::transport::{DynBlockingTransport, UreqBlocking};
use crate::urls::{TriggerUrlBuilder, job_api_url, parse_url};
use crate::{Auth, Error, RemoteServer, ServerRegistry};
use http::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_CONNECTION_RETRY_LIMIT: u32 = 5;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Immutable input to one orchestration run.
#[derive(Clone, Debug)]
pub struct TriggerRequest {
    remote_server: String,
    job: String,
    token: String,
    parameters: ParameterSource,
    prevent_remote_build_queue: bool,
    block_until_complete: bool,
    enhanced_logging: bool,
    should_not_fail_build: bool,
    poll_interval: Duration,
    connection_retry_limit: u32,
    auth_override: Option<Auth>,
}

impl TriggerRequest {
    /// A fire-and-forget request for `job` on the server configured under
    /// `remote_server`. Job name is trimmed, as entered values usually are.
    #[must_use]
    pub fn new(remote_server: impl Into<String>, job: impl Into<String>) -> Self {
        Self {
            remote_server: remote_server.into(),
            job: job.into().trim().to_owned(),
            token: String::new(),
            parameters: ParameterSource::default(),
            prevent_remote_build_queue: false,
            block_until_complete: false,
            enhanced_logging: false,
            should_not_fail_build: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connection_retry_limit: DEFAULT_CONNECTION_RETRY_LIMIT,
            auth_override: None,
        }
    }

    /// Security token for the remote trigger endpoint. Trimmed.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into().trim().to_owned();
        self
    }

    #[must_use]
    pub fn parameters(mut self, parameters: ParameterSource) -> Self {
        self.parameters = parameters;
        self
    }

    /// Hold the trigger until no build of the remote job is active.
    #[must_use]
    pub fn prevent_remote_build_queue(mut self, yes: bool) -> Self {
        self.prevent_remote_build_queue = yes;
        self
    }

    /// Block the local run until the remote build reaches a terminal result.
    #[must_use]
    pub fn block_until_complete(mut self, yes: bool) -> Self {
        self.block_until_complete = yes;
        self
    }

    /// Dump the remote build's console output after it finishes.
    #[must_use]
    pub fn enhanced_logging(mut self, yes: bool) -> Self {
        self.enhanced_logging = yes;
        self
    }

    /// Log failures and let the local run continue instead of aborting it.
    #[must_use]
    pub fn should_not_fail_build(mut self, yes: bool) -> Self {
        self.should_not_fail_build = yes;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn connection_retry_limit(mut self, limit: u32) -> Self {
        self.connection_retry_limit = limit;
        self
    }

    /// Use these credentials instead of the server's configured ones.
    #[must_use]
    pub fn auth_override(mut self, auth: Auth) -> Self {
        self.auth_override = Some(auth);
        self
    }
}

/// What one run learned about the remote build.
#[derive(Clone, Debug, Serialize)]
pub struct TerminalReport {
    pub remote_job_name: String,
    pub remote_build_number: Option<u64>,
    pub remote_build_url: Option<String>,
    /// `Unknown` when the run did not block on completion.
    pub final_status: RemoteBuildResult,
}

/// Configures and constructs [`TriggerOrchestrator`].
pub struct TriggerOrchestratorBuilder {
    registry: ServerRegistry,
    transport: Option<DynBlockingTransport>,
    scheduler: Arc<dyn Scheduler>,
    expander: Arc<dyn TokenExpander>,
    reporter: Arc<dyn BuildInfoReporter>,
}

impl TriggerOrchestratorBuilder {
    fn new(registry: ServerRegistry) -> Self {
        Self {
            registry,
            transport: None,
            scheduler: Arc::new(ThreadScheduler),
            expander: Arc::new(NoopTokenExpander),
            reporter: Arc::new(NoopReporter),
        }
    }

    /// Swap out the underlying transport.
    #[must_use]
    pub fn transport(mut self, transport: DynBlockingTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    #[must_use]
    pub fn token_expander(mut self, expander: Arc<dyn TokenExpander>) -> Self {
        self.expander = expander;
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn BuildInfoReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn build(self) -> Result<TriggerOrchestrator, Error> {
        let transport: DynBlockingTransport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(UreqBlocking::try_new(
                false,
                DEFAULT_USER_AGENT,
                CONNECT_TIMEOUT,
                false,
            )?),
        };
        Ok(TriggerOrchestrator {
            registry: self.registry,
            transport,
            scheduler: self.scheduler,
            expander: self.expander,
            reporter: self.reporter,
        })
    }
}

/// Drives one remote trigger cycle: resolve the target server, clean and
/// expand inputs, trigger, resolve the queue item, then either return
/// immediately or poll the build to its terminal result.
pub struct TriggerOrchestrator {
    registry: ServerRegistry,
    transport: DynBlockingTransport,
    scheduler: Arc<dyn Scheduler>,
    expander: Arc<dyn TokenExpander>,
    reporter: Arc<dyn BuildInfoReporter>,
}

impl TriggerOrchestrator {
    #[must_use]
    pub fn builder(registry: ServerRegistry) -> TriggerOrchestratorBuilder {
        TriggerOrchestratorBuilder::new(registry)
    }

    /// All default collaborators.
    pub fn new(registry: ServerRegistry) -> Result<Self, Error> {
        Self::builder(registry).build()
    }

    /// Run with an anonymous context and a token nobody cancels.
    pub fn run(&self, request: &TriggerRequest) -> Result<TerminalReport, Error> {
        self.run_in_context(request, &RunContext::default(), &CancelToken::new())
    }

    /// Execute one trigger cycle on behalf of `ctx`.
    ///
    /// Every failure is logged; whether it aborts the caller is decided by
    /// the request's `should_not_fail_build` flag. A soft failure returns
    /// the partial report gathered so far.
    pub fn run_in_context(
        &self,
        request: &TriggerRequest,
        ctx: &RunContext,
        cancel: &CancelToken,
    ) -> Result<TerminalReport, Error> {
        let mut report = TerminalReport {
            remote_job_name: request.job.clone(),
            remote_build_number: None,
            remote_build_url: None,
            final_status: RemoteBuildResult::Unknown,
        };

        match self.execute(request, ctx, cancel, &mut report) {
            Ok(()) => Ok(report),
            Err(err) if request.should_not_fail_build => {
                warn!(
                    error = %err,
                    "remote build failed for the following reason, but the build will continue"
                );
                Ok(report)
            }
            Err(err) => {
                error!(error = %err, "remote build failed");
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        request: &TriggerRequest,
        ctx: &RunContext,
        cancel: &CancelToken,
        report: &mut TerminalReport,
    ) -> Result<(), Error> {
        let server =
            self.registry
                .find(&request.remote_server)
                .ok_or_else(|| Error::UnknownRemoteServer {
                    name: request.remote_server.clone(),
                })?;

        let cleaned = normalize_parameters(request.parameters.raw_lines());
        let cleaned: Vec<String> = cleaned
            .iter()
            .map(|parameter| expand_lenient(self.expander.as_ref(), parameter, ctx))
            .collect();

        let job_name = expand_lenient(self.expander.as_ref(), &request.job, ctx);
        let security_token = expand_lenient(self.expander.as_ref(), &request.token, ctx);
        report.remote_job_name = job_name.clone();

        let pacer = PollPacer::new(
            self.scheduler.clone(),
            cancel.clone(),
            request.poll_interval,
        );
        if request.auth_override.is_some() {
            info!(
                server = %request.remote_server,
                "using job-level defined credentials in place of those from the remote server config"
            );
        }
        let auth = self.resolve_credentials(&server, request.auth_override.as_ref(), ctx);
        let invoker = HttpInvoker::new(
            self.transport.clone(),
            pacer.clone(),
            auth,
            request.connection_retry_limit,
        );

        let remote_parameterized = self.is_remote_job_parameterized(&invoker, &server, &job_name)?;

        if request.prevent_remote_build_queue {
            DuplicateBuildGuard::new(&invoker, &pacer).wait_until_idle(&server, &job_name)?;
        } else {
            info!(job = %job_name, "not checking if the remote job is building");
        }

        let encoded_params = encode_query_string(&cleaned);
        let trigger_url = TriggerUrlBuilder::new(&server, &job_name)
            .security_token(&security_token)
            .encoded_params(&encoded_params)
            .remote_job_parameterized(remote_parameterized)
            .has_local_parameters(request.parameters.counts_as_parameterized())
            .build();

        info!(job = %job_name, "triggering remote job now");
        let trigger_response = invoker.invoke(&parse_url(&trigger_url)?, Method::POST)?;

        let handle = QueueResolver::new(&invoker, &server, &pacer).resolve(&trigger_response)?;
        report.remote_build_number = Some(handle.number);
        report.remote_build_url = Some(handle.url.clone());
        self.reporter
            .report(&job_name, handle.number, RemoteBuildResult::NotBuilt);

        if request.block_until_complete {
            info!("blocking local job until remote job completes");
            let label = BuildStatusPoller::new(&invoker, &pacer, request.enhanced_logging)
                .wait_for_result(&handle)?;
            let status = RemoteBuildResult::from_label(&label);
            report.final_status = status;
            self.reporter.report(&job_name, handle.number, status);

            // Exact match on the raw label: a lowercase "success" from an
            // exotic remote still fails the step.
            if label != "SUCCESS" {
                return Err(Error::UnsuccessfulBuild { status });
            }
        } else {
            info!("not blocking local job until remote job completes - fire and forget");
        }

        Ok(())
    }

    /// Probe whether the remote job has anything under `actions`, the
    /// protocol's approximation of "has default parameters defined".
    /// Failures degrade to `false`; interruption always propagates.
    fn is_remote_job_parameterized(
        &self,
        invoker: &HttpInvoker,
        server: &RemoteServer,
        job: &str,
    ) -> Result<bool, Error> {
        let url = parse_url(&job_api_url(server, job))?;
        match invoker.invoke(&url, Method::GET) {
            Ok(response) => Ok(response
                .body()
                .and_then(|doc| doc.get("actions"))
                .and_then(Value::as_array)
                .is_some_and(|actions| !actions.is_empty())),
            Err(Error::Interrupted) => Err(Error::Interrupted),
            Err(err) => {
                warn!(
                    job,
                    error = %err,
                    "could not inspect the remote job for parameters, assuming none"
                );
                Ok(false)
            }
        }
    }

    /// Override credentials when configured for this run, else the server's
    /// defaults; expand embedded variables in both parts before use.
    fn resolve_credentials(
        &self,
        server: &RemoteServer,
        auth_override: Option<&Auth>,
        ctx: &RunContext,
    ) -> Option<Auth> {
        let auth = auth_override.or_else(|| server.auth())?;
        if auth.is_empty() {
            return None;
        }
        let user = expand_lenient(self.expander.as_ref(), auth.user(), ctx);
        let secret = expand_lenient(self.expander.as_ref(), auth.secret().expose(), ctx);
        Some(Auth::basic(user, secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_trims_job_and_token() {
        let request = TriggerRequest::new("ci", "  deploy  ").token(" secret ");
        assert_eq!(request.job, "deploy");
        assert_eq!(request.token, "secret");
    }

    #[test]
    fn unknown_server_fails_the_run() {
        let orchestrator = TriggerOrchestrator::new(ServerRegistry::default()).unwrap();
        let err = orchestrator
            .run(&TriggerRequest::new("missing", "job"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownRemoteServer { .. }));
    }

    #[test]
    fn unknown_server_soft_fails_with_partial_report() {
        let orchestrator = TriggerOrchestrator::new(ServerRegistry::default()).unwrap();
        let report = orchestrator
            .run(
                &TriggerRequest::new("missing", "job").should_not_fail_build(true),
            )
            .unwrap();
        assert_eq!(report.remote_build_number, None);
        assert_eq!(report.final_status, RemoteBuildResult::Unknown);
    }
}
