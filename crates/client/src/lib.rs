//! Client code for offvault.
//!
//! This crate provides the network fetcher, request routing, resolution
//! strategies, and the worker lifecycle driven by the host.

pub mod fetch;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Fetcher, canonicalize};
pub use worker::{
    ClientId, ClientStatus, RegisterOutcome, Registration, RegistrationStatus, Route, Router, ServiceWorker,
    WorkerState, WorkerStatus,
};
