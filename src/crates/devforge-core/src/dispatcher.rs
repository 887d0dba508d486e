//! Dispatcher
//!
//! Drives one request through validation, resolution, optional
//! disambiguation, and execution, then normalizes the outcome.
//!
//! ```text
//! Received ──validate──▶ Validated ──resolve──▶ Resolved ──execute──▶ Executed ──▶ Completed
//!     │                      │  │                   ▲
//!     ▼                      │  └──▶ AwaitingSelection ──select──┘
//!  Rejected                  ▼                      │
//!                         NotFound                  ▼
//!                                               Cancelled
//! ```
//!
//! Only `install`, `uninstall`, `update` and `version` are resolved; every
//! other task goes from `Validated` straight to `Resolved`. Validation and
//! resolution failures never reach the executor, and executor failures are
//! never retried here.

use crate::action::{ActionRequest, ValidatedRequest};
use crate::envelope::{normalize, Outcome, ResponseEnvelope, Status};
use crate::executor::{ExecutionResult, PlatformExecutor, ResolvedAction};
use crate::platform::PlatformTarget;
use crate::resolver::{NameResolver, ResolutionOutcome, ResolvedPackage};
use crate::session::{SessionId, SessionStore};
use crate::validator::validate;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-request pipeline state, used for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Validated,
    Rejected,
    Resolved,
    AwaitingSelection,
    NotFound,
    Cancelled,
    Executed,
    Completed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Received => "received",
            DispatchState::Validated => "validated",
            DispatchState::Rejected => "rejected",
            DispatchState::Resolved => "resolved",
            DispatchState::AwaitingSelection => "awaiting_selection",
            DispatchState::NotFound => "not_found",
            DispatchState::Cancelled => "cancelled",
            DispatchState::Executed => "executed",
            DispatchState::Completed => "completed",
        };
        f.write_str(name)
    }
}

struct Trace {
    request_id: String,
    started: Instant,
}

impl Trace {
    fn new() -> Self {
        let trace = Self {
            request_id: Uuid::new_v4().simple().to_string(),
            started: Instant::now(),
        };
        trace.enter(DispatchState::Received);
        trace
    }

    fn enter(&self, state: DispatchState) {
        debug!(request_id = %self.request_id, %state, "Dispatch transition");
    }

    fn complete(&self, envelope: &ResponseEnvelope) {
        self.enter(DispatchState::Completed);
        info!(
            request_id = %self.request_id,
            status = %envelope.status,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Request completed"
        );
    }
}

/// Entry point of the core
pub struct Dispatcher {
    platform: PlatformTarget,
    resolver: NameResolver,
    sessions: Arc<SessionStore>,
    executor: Arc<dyn PlatformExecutor>,
}

impl Dispatcher {
    /// The platform is taken from the executor and fixed for the
    /// dispatcher's lifetime.
    pub fn new(executor: Arc<dyn PlatformExecutor>, sessions: Arc<SessionStore>) -> Self {
        Self {
            platform: executor.platform(),
            resolver: NameResolver::new(),
            sessions,
            executor,
        }
    }

    pub fn with_resolver(mut self, resolver: NameResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn platform(&self) -> PlatformTarget {
        self.platform
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Run one request from `caller` to completion
    pub async fn dispatch(&self, caller: &str, request: ActionRequest) -> ResponseEnvelope {
        let trace = Trace::new();
        let envelope = normalize(self.run(caller, &request, &trace).await);
        trace.complete(&envelope);
        envelope
    }

    /// Resume an ambiguous request with the caller's choice
    pub async fn dispatch_selection(&self, session_id: &SessionId, index: usize) -> ResponseEnvelope {
        let trace = Trace::new();
        let outcome = match self.sessions.select(session_id, index) {
            Ok(selection) => {
                trace.enter(DispatchState::Resolved);
                info!(
                    request_id = %trace.request_id,
                    %session_id,
                    package = %selection.package.platform_identifier,
                    "Selection applied"
                );
                self.execute(&selection.caller, selection.request, Some(selection.package), &trace)
                    .await
            }
            Err(err) => {
                debug!(request_id = %trace.request_id, error = %err, "Selection rejected");
                Outcome::Selection(err)
            }
        };
        let envelope = normalize(outcome);
        trace.complete(&envelope);
        envelope
    }

    /// Abandon a pending selection
    pub fn cancel_selection(&self, session_id: &SessionId) -> ResponseEnvelope {
        let trace = Trace::new();
        let outcome = match self.sessions.cancel(session_id) {
            Ok(()) => {
                trace.enter(DispatchState::Cancelled);
                Outcome::Cancelled {
                    session_id: session_id.clone(),
                }
            }
            Err(err) => Outcome::Selection(err),
        };
        let envelope = normalize(outcome);
        trace.complete(&envelope);
        envelope
    }

    async fn run(&self, caller: &str, request: &ActionRequest, trace: &Trace) -> Outcome {
        let validated = match validate(request) {
            Ok(v) => v,
            Err(err) => {
                trace.enter(DispatchState::Rejected);
                debug!(request_id = %trace.request_id, error = %err, "Request rejected");
                return Outcome::Validation(err);
            }
        };
        trace.enter(DispatchState::Validated);
        debug!(request_id = %trace.request_id, action = %validated.summary(), "Request validated");

        let tool_name = match (&validated.tool_name, validated.task.resolves_package()) {
            (Some(tool), true) => tool.clone(),
            _ => {
                trace.enter(DispatchState::Resolved);
                return self.execute(caller, validated, None, trace).await;
            }
        };

        match self
            .resolver
            .resolve(&tool_name, &validated.version, self.platform)
            .await
        {
            ResolutionOutcome::One(package) => {
                trace.enter(DispatchState::Resolved);
                self.execute(caller, validated, Some(package), trace).await
            }
            ResolutionOutcome::Many(candidates) => self.await_selection(caller, tool_name, candidates, validated, trace),
            ResolutionOutcome::None => {
                trace.enter(DispatchState::NotFound);
                Outcome::NotFound {
                    tool_name,
                    platform: self.platform,
                }
            }
        }
    }

    fn await_selection(
        &self,
        caller: &str,
        tool_name: String,
        candidates: Vec<ResolvedPackage>,
        request: ValidatedRequest,
        trace: &Trace,
    ) -> Outcome {
        trace.enter(DispatchState::AwaitingSelection);
        let session_id = self.sessions.open(caller, candidates.clone(), request);
        info!(
            request_id = %trace.request_id,
            %session_id,
            candidates = candidates.len(),
            "Awaiting selection"
        );
        Outcome::Ambiguous {
            session_id,
            tool_name,
            candidates,
        }
    }

    /// Invoke the executor. The session store lock is never held here.
    ///
    /// An executor may answer `Ambiguous` with candidates; the session is
    /// then opened for `caller` like any resolver ambiguity.
    async fn execute(
        &self,
        caller: &str,
        request: ValidatedRequest,
        package: Option<ResolvedPackage>,
        trace: &Trace,
    ) -> Outcome {
        let mut action = ResolvedAction::new(request);
        if let Some(package) = package {
            action = action.with_package(package);
        }

        let result = self.executor.execute(&action).await;
        trace.enter(DispatchState::Executed);

        match result {
            Ok(result) if result.status == Status::Ambiguous => {
                if result.candidates.is_empty() {
                    warn!(request_id = %trace.request_id, "Executor reported ambiguity without candidates");
                    return Outcome::Executed(ExecutionResult::failure(format!(
                        "{} matched several packages but none were reported",
                        action.request.summary()
                    )));
                }
                let tool_name = action
                    .request
                    .tool_name
                    .clone()
                    .unwrap_or_else(|| action.request.task.to_string());
                self.await_selection(caller, tool_name, result.candidates, action.request, trace)
            }
            Ok(result) => Outcome::Executed(result),
            Err(err) => {
                warn!(request_id = %trace.request_id, error = %err, "Executor failed");
                Outcome::Execution(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<ResolvedAction>>,
    }

    #[async_trait]
    impl PlatformExecutor for RecordingExecutor {
        fn platform(&self) -> PlatformTarget {
            PlatformTarget::LinuxDebian
        }

        async fn execute(&self, action: &ResolvedAction) -> Result<ExecutionResult, ExecutionError> {
            self.calls.lock().push(action.clone());
            Ok(ExecutionResult::success(format!("ran {}", action.request.summary())))
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<RecordingExecutor>) {
        let executor = Arc::new(RecordingExecutor::default());
        (
            Dispatcher::new(executor.clone(), Arc::new(SessionStore::default())),
            executor,
        )
    }

    #[tokio::test]
    async fn test_validation_failure_never_executes() {
        let (dispatcher, executor) = dispatcher();
        let envelope = dispatcher.dispatch("c", ActionRequest::new("install")).await;
        assert_eq!(envelope.status, Status::Error);
        assert!(executor.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unique_resolution_executes_with_package() {
        let (dispatcher, executor) = dispatcher();
        let envelope = dispatcher
            .dispatch("c", ActionRequest::new("install").with_tool("docker"))
            .await;
        assert_eq!(envelope.status, Status::Success);
        let calls = executor.calls.lock();
        assert_eq!(calls[0].package.as_ref().unwrap().platform_identifier, "docker.io");
    }

    #[tokio::test]
    async fn test_executor_ambiguity_opens_session() {
        struct SearchExecutor;

        #[async_trait]
        impl PlatformExecutor for SearchExecutor {
            fn platform(&self) -> PlatformTarget {
                PlatformTarget::Windows
            }

            async fn execute(&self, action: &ResolvedAction) -> Result<ExecutionResult, ExecutionError> {
                if let Some(package) = &action.package {
                    return Ok(ExecutionResult::success(format!("installed {}", package.platform_identifier)));
                }
                let candidates = ["A.One", "B.Two"]
                    .into_iter()
                    .map(|id| ResolvedPackage {
                        canonical_name: "x".into(),
                        platform_identifier: id.into(),
                        resolved_version: "latest".into(),
                        substitution: None,
                    })
                    .collect();
                Ok(ExecutionResult::ambiguous("several matches", candidates))
            }
        }

        let dispatcher = Dispatcher::new(Arc::new(SearchExecutor), Arc::new(SessionStore::default()));
        let envelope = dispatcher
            .dispatch("c", ActionRequest::new("vscode_extension_install").with_tool("python"))
            .await;
        assert_eq!(envelope.status, Status::Ambiguous);

        let session = SessionId::from(envelope.session_id().unwrap());
        assert_eq!(dispatcher.sessions().open_session_of("c"), Some(session.clone()));
        let resumed = dispatcher.dispatch_selection(&session, 1).await;
        assert_eq!(resumed.message, "installed B.Two");
    }

    struct AlwaysAmbiguous {
        candidates: Vec<ResolvedPackage>,
    }

    #[async_trait]
    impl PlatformExecutor for AlwaysAmbiguous {
        fn platform(&self) -> PlatformTarget {
            PlatformTarget::Windows
        }

        async fn execute(&self, _action: &ResolvedAction) -> Result<ExecutionResult, ExecutionError> {
            Ok(ExecutionResult::ambiguous("several matches", self.candidates.clone()))
        }
    }

    #[tokio::test]
    async fn test_executor_ambiguity_follows_caller_policy() {
        let candidates = ["A.One", "B.Two"]
            .into_iter()
            .map(|id| ResolvedPackage {
                canonical_name: "x".into(),
                platform_identifier: id.into(),
                resolved_version: "latest".into(),
                substitution: None,
            })
            .collect();
        let dispatcher = Dispatcher::new(
            Arc::new(AlwaysAmbiguous { candidates }),
            Arc::new(SessionStore::default()),
        );
        let request = || ActionRequest::new("vscode_extension_install").with_tool("python");

        let first = dispatcher.dispatch("alice", request()).await;
        let second = dispatcher.dispatch("alice", request()).await;

        let sessions = dispatcher.sessions();
        assert_eq!(sessions.open_count(), 1);
        assert_eq!(
            sessions.open_session_of("alice").map(|id| id.to_string()).as_deref(),
            second.session_id()
        );
        let stale = SessionId::from(first.session_id().unwrap());
        let late = dispatcher.dispatch_selection(&stale, 0).await;
        assert_eq!(late.data.unwrap()["code"], "SESSION_EXPIRED");
    }

    #[tokio::test]
    async fn test_ambiguity_without_candidates_is_error() {
        let dispatcher = Dispatcher::new(
            Arc::new(AlwaysAmbiguous { candidates: vec![] }),
            Arc::new(SessionStore::default()),
        );
        let envelope = dispatcher
            .dispatch("alice", ActionRequest::new("vscode_extension_install").with_tool("python"))
            .await;
        assert_eq!(envelope.status, Status::Error);
        assert!(envelope.session_id().is_none());
        assert_eq!(dispatcher.sessions().open_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_selection() {
        let (dispatcher, executor) = dispatcher();
        let envelope = dispatcher
            .dispatch("c", ActionRequest::new("install").with_tool("java"))
            .await;
        let session = SessionId::from(envelope.session_id().unwrap());

        let cancelled = dispatcher.cancel_selection(&session);
        assert_eq!(cancelled.status, Status::Success);

        let late = dispatcher.dispatch_selection(&session, 0).await;
        assert_eq!(late.status, Status::Error);
        assert_eq!(late.data.unwrap()["code"], "SESSION_EXPIRED");
        assert!(executor.calls.lock().is_empty());
    }
}
