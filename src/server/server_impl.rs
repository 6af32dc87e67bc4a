use crate::{
    limits::{ReqLimits, ServerLimits, WaitStrategy},
    server::{connection::HttpConnection, router::Router},
};
use crossbeam::queue::ArrayQueue;
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::Notify,
    task::yield_now,
    time::sleep as tokio_sleep,
};

/// An HTTP server that serves one request per connection.
///
/// Accepted sockets go into a bounded queue and a fixed pool of worker
/// tasks pulls from it. Each worker owns its connection from read to close,
/// so a handler is free to block; the pool size caps concurrency.
///
/// # Examples
///
/// ```no_run
/// use oneshot_web::{Router, Server};
///
/// #[tokio::main]
/// async fn main() {
///     let router = Router::new();
///     router.get("/", |_req, resp| {
///         resp.body("Hello world!");
///     });
///
///     let server = Server::builder().router(router).build();
///     server.start("127.0.0.1:8080").await.unwrap();
///
///     std::future::pending::<()>().await;
/// }
/// ```
pub struct Server {
    router: Arc<Router>,
    lifecycle: Arc<Lifecycle>,

    server_limits: ServerLimits,
    request_limits: ReqLimits,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            router: None,
            server_limits: None,
            request_limits: None,
        }
    }

    /// Binds `addr`, spawns the worker pool and the accept task, and
    /// returns the bound address.
    ///
    /// Returns as soon as the listener is live; serving happens on the
    /// spawned tasks. Binding port `0` picks a free port, the returned
    /// address carries the real one.
    ///
    /// # Errors
    ///
    /// Fails when `addr` does not resolve or the socket cannot be bound.
    pub async fn start<A: ToSocketAddrs>(&self, addr: A) -> io::Result<SocketAddr> {
        let listener = bind_listener(addr, self.server_limits.max_pending_requests)?;
        let local_addr = listener.local_addr()?;

        let queue = Arc::new(ArrayQueue::new(self.server_limits.max_pending_requests));

        for _ in 0..self.server_limits.workers {
            self.spawn_worker(&queue);
        }
        self.spawn_acceptor(listener, queue);

        log::info!("listening on {local_addr}");

        Ok(local_addr)
    }

    /// Signals the server to shut down.
    ///
    /// The accept task closes the listener, workers drain the pending
    /// queue, finish the connections they are serving and exit.
    pub fn stop(&self) {
        self.lifecycle.shutdown.store(true, Ordering::Release);
        self.lifecycle.notify.notify_waiters();
    }

    #[inline]
    fn spawn_worker(&self, queue: &StreamQueue) {
        let queue = queue.clone();
        let lifecycle = self.lifecycle.clone();
        let wait = self.server_limits.wait_strategy.clone();
        let conn = HttpConnection::new(self.router.clone(), self.request_limits.clone());

        tokio::spawn(async move {
            loop {
                let Some(mut stream) = queue.pop() else {
                    if lifecycle.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    wait_for(&wait).await;
                    continue;
                };

                if let Err(err) = conn.run(&mut stream).await {
                    log::warn!("request failed: {err}");
                }
            }
        });
    }

    #[inline]
    fn spawn_acceptor(&self, listener: TcpListener, queue: StreamQueue) {
        let lifecycle = self.lifecycle.clone();
        let wait = self.server_limits.wait_strategy.clone();

        tokio::spawn(async move {
            let notified = lifecycle.notify.notified();
            tokio::pin!(notified);

            loop {
                if lifecycle.shutdown.load(Ordering::Acquire) {
                    break;
                }

                let accepted = tokio::select! {
                    _ = &mut notified => break,
                    accepted = listener.accept() => accepted,
                };

                let Ok((stream, _)) = accepted else {
                    continue;
                };

                // A full queue stalls admission instead of shedding load.
                let mut pending = stream;
                while let Err(stream) = queue.push(pending) {
                    if lifecycle.shutdown.load(Ordering::Acquire) {
                        return;
                    }
                    pending = stream;
                    wait_for(&wait).await;
                }
            }
        });
    }
}

struct Lifecycle {
    shutdown: AtomicBool,
    notify: Notify,
}

async fn wait_for(strategy: &WaitStrategy) {
    match strategy {
        WaitStrategy::Yield => yield_now().await,
        WaitStrategy::Sleep(pause) => tokio_sleep(*pause).await,
    }
}

fn bind_listener<A: ToSocketAddrs>(addr: A, backlog: usize) -> io::Result<TcpListener> {
    let addr = addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "address did not resolve"))?;

    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog as i32)?;
    socket.set_nonblocking(true)?;

    TcpListener::from_std(socket.into())
}

//

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder {
    router: Option<Arc<Router>>,
    server_limits: Option<ServerLimits>,
    request_limits: Option<ReqLimits>,
}

impl ServerBuilder {
    /// Sets the router that resolves requests to handlers.
    ///
    /// **This is a required component.**
    ///
    /// # Examples
    ///
    /// ```
    /// use oneshot_web::{Router, Server};
    ///
    /// let router = Router::new();
    /// router.get("/ping", |_req, resp| {
    ///     resp.body("pong");
    /// });
    ///
    /// let server = Server::builder().router(router).build();
    /// ```
    #[inline(always)]
    pub fn router<R: Into<Arc<Router>>>(mut self, router: R) -> Self {
        self.router = Some(router.into());
        self
    }

    /// Configures pool sizing and admission queueing.
    ///
    /// # Examples
    ///
    /// ```
    /// use oneshot_web::{limits::ServerLimits, Router, Server};
    ///
    /// let server = Server::builder()
    ///     .router(Router::new())
    ///     .server_limits(ServerLimits {
    ///         workers: 32,
    ///         ..ServerLimits::default()
    ///     })
    ///     .build();
    /// ```
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures request framing limits.
    ///
    /// # Examples
    ///
    /// ```
    /// use oneshot_web::{limits::ReqLimits, Router, Server};
    ///
    /// let server = Server::builder()
    ///     .router(Router::new())
    ///     .request_limits(ReqLimits {
    ///         max_request_size: 8 * 1024 * 1024,
    ///         ..ReqLimits::default()
    ///     })
    ///     .build();
    /// ```
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] instance.
    ///
    /// # Panics
    ///
    /// Error messages:
    /// - ``The `router` method must be called to create``
    ///
    /// Panics when:
    /// - The `router` method was not called.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        Server {
            router: self
                .router
                .expect("The `router` method must be called to create"),
            lifecycle: Arc::new(Lifecycle {
                shutdown: AtomicBool::new(false),
                notify: Notify::new(),
            }),

            server_limits: self.server_limits.unwrap_or_default(),
            request_limits: self.request_limits.unwrap_or_default(),
        }
    }
}

type StreamQueue = Arc<ArrayQueue<TcpStream>>;

#[cfg(test)]
mod server_self {
    use super::*;
    use crate::http::{request::Request, response::Response, types::StatusCode};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn server() -> Server {
        let router = Router::new();
        router.get("/ping", |_: &Request, resp: &mut Response| {
            resp.header("Content-Type", "text/plain").body("pong");
        });
        router.post("/login", |req: &Request, resp: &mut Response| {
            let user = req.query("user").unwrap_or("nobody").to_owned();
            resp.status(StatusCode::Found)
                .header("Location", "/")
                .body(format!("hello {user}"));
        });

        Server::builder().router(router).build()
    }

    async fn send(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();

        let mut wire = Vec::new();
        stream.read_to_end(&mut wire).await.unwrap();
        String::from_utf8(wire).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn serves_routed_requests() {
        let server = server();
        let addr = server.start("127.0.0.1:0").await.unwrap();

        let raw = send(addr, b"GET /ping HTTP/1.1\r\n\r\n").await;

        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("\r\nContent-Type: text/plain\r\n"));
        assert!(raw.ends_with("\r\n\r\npong"));

        server.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn each_connection_carries_one_request() {
        let server = server();
        let addr = server.start("127.0.0.1:0").await.unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\n\r\nGET /ping HTTP/1.1\r\n\r\n")
            .await
            .unwrap();

        let mut wire = Vec::new();
        stream.read_to_end(&mut wire).await.unwrap();
        let raw = String::from_utf8(wire).unwrap();

        // The second request on the same socket is never served.
        assert_eq!(raw.matches("HTTP/1.1 200 OK").count(), 1);
        assert!(raw.ends_with("\r\n\r\npong"));

        server.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unrouted_paths_get_the_styled_404() {
        let server = server();
        let addr = server.start("127.0.0.1:0").await.unwrap();

        let raw = send(addr, b"GET /nowhere HTTP/1.1\r\n\r\n").await;

        assert!(raw.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(raw.contains("doesn't exist or has been moved"));

        server.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn form_post_round_trips() {
        let server = server();
        let addr = server.start("127.0.0.1:0").await.unwrap();

        let raw = send(
            addr,
            b"POST /login HTTP/1.1\r\n\
              Content-Type: application/x-www-form-urlencoded\r\n\
              Content-Length: 13\r\n\
              \r\n\
              user=an+na%21",
        )
        .await;

        assert!(raw.starts_with("HTTP/1.1 302 Found\r\n"));
        assert!(raw.contains("\r\nLocation: /\r\n"));

        server.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_closes_the_listener() {
        let server = server();
        let addr = server.start("127.0.0.1:0").await.unwrap();

        let raw = send(addr, b"GET /ping HTTP/1.1\r\n\r\n").await;
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));

        server.stop();
        tokio_sleep(Duration::from_millis(100)).await;

        match TcpStream::connect(addr).await {
            Err(_) => {}
            Ok(mut stream) => {
                // The handshake can still complete in the OS backlog, but
                // nobody serves the socket once the listener is gone.
                stream.write_all(b"GET /ping HTTP/1.1\r\n\r\n").await.ok();
                let mut wire = Vec::new();
                let read = stream.read_to_end(&mut wire).await.unwrap_or(0);
                assert_eq!(read, 0);
            }
        }
    }

    #[test]
    #[should_panic(expected = "The `router` method must be called to create")]
    fn build_without_router_panics() {
        Server::builder().build();
    }
}
