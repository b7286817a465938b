//! Integration points with the host job runner.
//!
//! The trigger engine never talks to the host framework directly; it is
//! handed a run identity plus two capabilities: variable/token expansion and
//! build-info reporting. Both have no-op defaults for standalone use.

use crate::status::RemoteBuildResult;
use std::error::Error as StdError;
use std::path::PathBuf;
use tracing::warn;

/// Identity of the local run a trigger executes on behalf of.
#[derive(Clone, Debug, Default)]
pub struct RunContext {
    /// Name of the local job, if any.
    pub job_name: String,
    /// Workspace the local run executes in; parameter files and expansion
    /// variables are resolved relative to it.
    pub workspace: Option<PathBuf>,
}

impl RunContext {
    #[must_use]
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            workspace: None,
        }
    }

    #[must_use]
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }
}

/// Expands embedded variables (environment tokens, macros) in a string.
pub trait TokenExpander: Send + Sync {
    fn expand(
        &self,
        input: &str,
        ctx: &RunContext,
    ) -> Result<String, Box<dyn StdError + Send + Sync>>;
}

/// Expander that leaves every string untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTokenExpander;

impl TokenExpander for NoopTokenExpander {
    fn expand(
        &self,
        input: &str,
        _ctx: &RunContext,
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        Ok(input.to_owned())
    }
}

/// Expand `input`, logging and keeping the original text when expansion
/// fails. Expansion problems are never fatal.
pub(crate) fn expand_lenient(
    expander: &dyn TokenExpander,
    input: &str,
    ctx: &RunContext,
) -> String {
    match expander.expand(input, ctx) {
        Ok(expanded) => expanded,
        Err(err) => {
            warn!(input, error = %err, "failed to resolve variables in string, using it as-is");
            input.to_owned()
        }
    }
}

/// Receives the remote build's identity and status as the run learns them.
///
/// Called once after queue resolution (status [`RemoteBuildResult::NotBuilt`])
/// and, when the run blocks, once more with the terminal result.
/// Fire-and-forget: the engine does not depend on any effect.
pub trait BuildInfoReporter: Send + Sync {
    fn report(&self, job_name: &str, build_number: u64, status: RemoteBuildResult);
}

/// Reporter that discards every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

impl BuildInfoReporter for NoopReporter {
    fn report(&self, _job_name: &str, _build_number: u64, _status: RemoteBuildResult) {}
}
