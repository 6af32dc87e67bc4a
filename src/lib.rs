//! oneshot_web - Small pooled-worker HTTP server with one request per connection
//!
//! A deliberately simple HTTP server for form-driven sites and internal
//! tools. Every accepted connection carries exactly one request and is
//! closed after the response, there is no keep-alive, so handlers never
//! share connection state and slow clients never pin a worker between
//! requests.
//!
//! # Request Handling
//!
//! - **One request per connection** - read, respond, close, every time
//! - **Incremental framing** - requests are cut out of the byte stream by
//!   the header terminator plus `Content-Length`, however the peer chunks
//!   its writes
//! - **Form decoding** - urlencoded bodies merge into the query map,
//!   multipart bodies become named [`Part`]s with raw file bytes
//! - **Prefix fallback routing** - exact method and path first, then the
//!   longest registered prefix regardless of method
//! - **Pooled workers** - a fixed task pool pulls sockets from a bounded
//!   queue, so concurrency and memory stay capped under load
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use oneshot_web::{Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::new();
//!
//!     router.get("/", |_req, resp| {
//!         resp.header("Content-Type", "text/html")
//!             .body("<h1>Hello!</h1>");
//!     });
//!
//!     router.post("/login", |req, resp| {
//!         let user = req.query("user").unwrap_or("guest");
//!         resp.status(StatusCode::Found)
//!             .header("Location", "/")
//!             .body(format!("Welcome, {user}!"));
//!     });
//!
//!     router.static_dir("/assets", "./public");
//!
//!     let server = Server::builder().router(router).build();
//!     server.start("127.0.0.1:8080").await.unwrap();
//!
//!     std::future::pending::<()>().await;
//! }
//! ```
//! Tuning the pool and the framing limits:
//! ```no_run
//! use oneshot_web::{limits::{ReqLimits, ServerLimits}, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::new();
//!     router.get("/", |_req, resp| {
//!         resp.body("hi");
//!     });
//!
//!     let server = Server::builder()
//!         .router(router)
//!         .server_limits(ServerLimits {
//!             workers: 64, // Higher concurrency
//!             ..ServerLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             max_request_size: 8 * 1024 * 1024, // Room for file uploads
//!             ..ReqLimits::default()
//!         })
//!         .build();
//!
//!     server.start("127.0.0.1:8080").await.unwrap();
//!
//!     std::future::pending::<()>().await;
//! }
//! ```
//!
//! # Use Cases
//!
//! - **Form-driven sites** - logins, uploads and redirects with no client
//!   framework
//! - **Internal tools and admin panels** - static assets next to a few
//!   dynamic endpoints
//! - **Test doubles** - a real TCP server small enough to start inside a
//!   test

pub(crate) mod http {
    pub(crate) mod frame;
    pub(crate) mod multipart;
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod router;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;
pub(crate) mod static_files;

pub use crate::{
    http::{
        multipart::{Part, PartValue},
        query,
        request::{Body, Request},
        response::Response,
        types::StatusCode,
    },
    server::{
        router::{Handler, Router},
        server_impl::{Server, ServerBuilder},
    },
    static_files::{DirLoader, ResourceLoader, StaticFiles},
};
