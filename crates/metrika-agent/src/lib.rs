//! metrika-agent — the sampling and delivery side of Metrika.
//!
//! # Pipeline
//!
//! ```text
//! Collectors ─▶ Poller ─▶ MemStore ─▶ Dispatcher ─▶ BatchQueue ─▶ WorkerPool
//!                                     (snapshot)    (bounded)     BatchSender ─▶ Transport
//! ```
//!
//! The poller and the dispatcher run on independent intervals and only meet
//! at the store. The queue between the dispatcher and the workers is bounded
//! by the worker count; when it is full the dispatcher drops the batch
//! instead of waiting.

pub mod collector;
pub mod dispatcher;
pub mod poller;
pub mod pool;
pub mod sender;

pub use collector::{Collector, RuntimeCollector, SystemCollector};
pub use dispatcher::{Dispatch, Dispatcher};
pub use poller::Poller;
pub use pool::{BatchQueue, DeliveryStats, SubmitError, WorkerPool};
pub use sender::{BatchSender, DeliveryOutcome, RetryPolicy};
