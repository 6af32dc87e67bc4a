//! Server configuration limits
//!
//! Defaults are conservative: they bound memory per connection and keep a
//! flood of oversized requests from exhausting the process. Raise them only
//! for workloads that genuinely need it (large uploads, deep pools).
//!
//! # Examples
//!
//! ```no_run
//! use oneshot_web::{Router, Server, limits::{ReqLimits, ServerLimits}};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::new();
//!     router.get("/", |_req, res| { res.body("hi"); });
//!
//!     let server = Server::builder()
//!         .router(router)
//!         .server_limits(ServerLimits {
//!             workers: 32, // Higher concurrency
//!             ..ServerLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             max_request_size: 8 * 1024 * 1024, // Allow large uploads
//!             ..ReqLimits::default()
//!         })
//!         .build();
//!
//!     server.start("127.0.0.1:8080").await.unwrap();
//! }
//! ```

use std::time::Duration;

/// Controls pool sizing, admission queueing and worker wait behavior.
///
/// Accepted connections go into a bounded queue; `workers` long-lived tasks
/// pull from it, each owning one connection at a time from read to close.
/// When the queue is full the accept loop itself waits, so a saturated pool
/// stops admitting new sockets instead of piling them up.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of pooled worker tasks (default: `16`).
    ///
    /// Spawned once at [start](crate::Server::start); each processes exactly
    /// one connection at a time, so this is also the cap on concurrently
    /// served requests.
    pub workers: usize,

    /// Capacity of the accepted-connection queue (default: `250`).
    ///
    /// Connections wait here between `accept` and pickup by a worker. A full
    /// queue blocks the accept loop; nothing is refused or shed.
    pub max_pending_requests: usize,

    /// How idle tasks wait (default: `Sleep(50µs)`).
    ///
    /// Used by workers polling an empty queue and by the accept loop pushing
    /// into a full one.
    pub wait_strategy: WaitStrategy,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            workers: 16,
            max_pending_requests: 250,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),

            _priv: (),
        }
    }
}

/// Strategy for waiting on the connection queue.
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// Re-poll after [`tokio::task::yield_now()`].
    ///
    /// Lowest latency, but spins a scheduler slot at full tilt while idle.
    Yield,

    /// Re-poll after [`tokio::time::sleep()`] with the given pause.
    ///
    /// A few tens of microseconds keeps latency low at negligible CPU cost.
    Sleep(Duration),
}

/// Request framing limits.
///
/// Both fields bound the frame-reading stage: `read_chunk_size` sets the
/// per-read granularity, `max_request_size` caps total accumulation so one
/// connection cannot buffer unbounded data.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Socket read granularity in bytes (default: `8 KB`).
    ///
    /// Each read pulls at most this many bytes into the frame buffer.
    /// Larger values help big uploads, smaller ones tighten memory churn.
    pub read_chunk_size: usize,

    /// Maximum size of one full request frame, headers plus body
    /// (default: `1 MB`).
    ///
    /// A request that grows past this is dropped without a response.
    /// File-upload endpoints usually need this raised.
    pub max_request_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            read_chunk_size: 8 * 1024,       // One typical MTU-coalesced read
            max_request_size: 1024 * 1024,   // Headers + body, 1 MiB

            _priv: (),
        }
    }
}
