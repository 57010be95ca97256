// ABOUTME: Remote collaborators of the execution engine
// ABOUTME: Append-only code/comment store, telemetry sink and data file download

pub mod client;
pub mod error;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::AppsApiClient;
pub use error::{AppDataError, AppDataResult};
pub use store::{ActionSink, CodeStore, FileContentSource};
