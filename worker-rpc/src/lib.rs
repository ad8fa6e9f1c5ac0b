//! Correlation-based RPC to an isolated embedding/storage worker.
//!
//! The caller side never blocks on the worker: every call is assigned a
//! correlation id, registered in a pending table and resolved when the
//! matching reply arrives, whatever order replies come back in. The
//! transport is a plain duplex pair of message channels, so the worker can
//! live on a tokio task, a dedicated thread, or behind any bridge that
//! shuttles [`protocol`] envelopes.

pub mod protocol;
pub mod proxy;
pub mod worker;

pub use protocol::{ReplyBody, ReplyEnvelope, RequestBody, RequestEnvelope};
pub use proxy::WorkerProxy;
pub use worker::{run_worker_loop, spawn_worker, spawn_worker_thread, WorkerServices};
