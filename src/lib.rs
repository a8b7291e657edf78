//! Asynchronous job execution with per-resource serialization.
//!
//! `jobsync` turns long-running operations into trackable jobs. A caller
//! submits a [`UnitOfWork`] and immediately receives a [`JobHandle`]; the
//! work runs later on a fixed-size worker pool. Jobs that declare the same
//! [`SyncKey`] execute in mutual exclusion (FIFO among waiters), while jobs
//! on disjoint keys run concurrently.
//!
//! Every job emits lifecycle [`EventRecord`]s tagged with its owning
//! identity and event type: `Scheduled` at submission, `Started` when the
//! worker begins execution, and `Completed` or `Failed` at the end.
//!
//! # Overview
//!
//! ```text
//! submit ──► JobStore (Pending) ──► Scheduled event ──► worker queue
//!                                                          │
//!            SyncCoordinator acquires keys (FIFO) ◄────────┘
//!                     │
//!                     ▼
//!   InProgress + Started ──► execute ──► Succeeded|Failed + event ──► release keys
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - Job, event and sync-key data model
//! - [`store`] - Job persistence trait and in-memory implementation
//! - [`events`] - Append-only lifecycle event recorder
//! - [`lock`] - Resource lock registry keyed by [`SyncKey`]
//! - [`sync`] - Ordered multi-key acquisition around a unit of work
//! - [`executor`] - Submission, worker pool and lifecycle management
//! - [`work`] - The [`UnitOfWork`] trait implemented by commands
//! - [`context`] - Per-job execution context handed to a unit of work
//! - [`config`] - Engine configuration (TOML + environment)
//! - `logging` - `tracing-subscriber` bootstrap (feature `logging`)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use jobsync::{FnWork, JobExecutor, JobStatus, SyncKey};
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let executor = JobExecutor::builder().worker_count(2).build();
//!
//! let work = FnWork::new("assigntoloadbalancerruleresponse", "LB.ASSIGN.TO.RULE", |_ctx| async {
//!     Ok(json!({ "success": true }))
//! })
//! .with_owner("account-7")
//! .with_sync_key(SyncKey::new("lb", "42"));
//!
//! let handle = executor.submit(Arc::new(work)).await.unwrap();
//! let job = executor.wait(&handle.job_id).await.unwrap();
//! assert_eq!(job.status, JobStatus::Succeeded);
//! assert_eq!(job.owner_id, "account-7");
//! executor.shutdown().await;
//! # });
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod events;
pub mod executor;
pub mod lock;
#[cfg(feature = "logging")]
pub mod logging;
pub mod store;
pub mod sync;
pub mod types;
pub mod work;

// Re-exports for ergonomic access
pub use config::{ConfigError, EngineConfig};
pub use constants::*;
pub use context::JobContext;
pub use error::JobError;
pub use events::{EventRecorder, InMemoryEventRecorder};
pub use executor::{JobExecutor, JobExecutorBuilder, JobHandle};
pub use lock::{LockGuard, ResourceLockRegistry};
pub use store::memory::InMemoryJobStore;
pub use store::{CancelOutcome, JobStore};
pub use sync::{ExclusiveError, SyncCoordinator};
pub use types::*;
pub use work::{FnWork, UnitOfWork};
