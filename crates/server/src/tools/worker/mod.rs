//! Worker lifecycle and page MCP tools.

pub mod attach;
pub mod detach;
pub mod fetch;
pub mod lifecycle;

pub use attach::{ClientAttachOutput, attach_impl};
pub use detach::{ClientDetachOutput, ClientDetachParams, detach_impl};
pub use fetch::{WorkerFetchOutput, WorkerFetchParams, fetch_impl};
pub use lifecycle::{WorkerSkipWaitingOutput, WorkerUpdateOutput, WorkerUpdateParams, skip_waiting_impl, status_impl, update_impl};
