// ABOUTME: Execution orchestration engine for the tutor workspace
// ABOUTME: Session lifecycle, console I/O, data file provisioning and periodic code review

pub mod controller;
pub mod error;
pub mod io;
pub mod provisioner;
pub mod review;
pub mod state;
pub mod telemetry;

pub use controller::{EngineOptions, EngineServices, SessionController};
pub use error::{EngineError, Result};
pub use io::{Interrupted, IoCoordinator};
pub use provisioner::{DataFile, FileProvisioner};
pub use review::{review_turns, ReviewDispatcher, ReviewOutcome, ReviewScheduler};
pub use state::{ConsoleEvent, ConsoleSnapshot, InputOutcome, ReplStatus, RunOutcome};
pub use telemetry::ActionReporter;
