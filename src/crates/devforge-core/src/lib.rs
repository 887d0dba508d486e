//! Command resolution and dispatch core for DevForge
//!
//! This crate turns a structured [`ActionRequest`] into an OS-level effect:
//! it validates the request, resolves logical tool names to platform
//! package identifiers, tracks disambiguation sessions when a name maps to
//! several packages, and drives a [`PlatformExecutor`].
//!
//! The service and CLI crates are thin shells around [`Dispatcher`].

pub mod action;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod logging;
pub mod platform;
pub mod resolver;
pub mod session;
pub mod validator;

pub use action::{ActionRequest, GitAction, SubAction, SystemConfigAction, Task, ValidatedRequest};
pub use config::{ConfigLoader, DevforgeConfig};
pub use dispatcher::{DispatchState, Dispatcher};
pub use envelope::{normalize, Outcome, ResponseEnvelope, Status};
pub use error::{CoreError, ExecutionError, Result, SelectionError, ValidationError};
pub use executor::{
    CodeGenerator, ExecutionResult, ExecutorSettings, PlatformExecutor, ResolvedAction, SystemExecutor,
};
pub use platform::{PackageManager, PlatformTarget};
pub use resolver::{NameResolver, PackageIndex, ResolutionOutcome, ResolvedPackage};
pub use session::{SessionId, SessionState, SessionStore};
pub use validator::validate;
