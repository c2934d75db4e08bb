//! Idem: a declarative engine for idempotent local system configuration.
//!
//! Each task pairs a description, an optional idempotency predicate and an
//! action. The engine skips tasks whose end state already holds, runs the rest,
//! classifies the result (`ok`, `changed`, `failed`) and stops the whole run on
//! the first failure.

pub mod config;
pub mod engine;
pub mod logger;
pub mod stream;
pub mod utils;

pub use engine::action::{Action, Predicate, ShellMode};
pub use engine::classify::Status;
pub use engine::error::{FailureKind, TaskError};
pub use engine::executor::ExecContext;
pub use engine::iterate::Records;
pub use engine::report::Reporter;
pub use engine::{Run, TaskBuilder};
