use crate::{
    http::{request::Request, response::Response},
    static_files::StaticFiles,
};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

/// Processes one request.
///
/// Implementations read the [Request] and mutate the [Response]; framing and
/// serialization stay with the server. Any closure over `(&Request,
/// &mut Response)` qualifies through the blanket implementation, so most
/// routes are plain closures. Implement the trait directly when the handler
/// carries state of its own.
///
/// # Examples
/// ```
/// use oneshot_web::{Handler, Request, Response, StatusCode};
///
/// struct Healthcheck;
///
/// impl Handler for Healthcheck {
///     fn handle(&self, _: &Request, resp: &mut Response) {
///         resp.status(StatusCode::Ok).body("ready");
///     }
/// }
/// ```
pub trait Handler: Sync + Send + 'static {
    /// Fills in the response for one request.
    ///
    /// Runs on a worker that owns the connection for its whole lifetime, so
    /// blocking on file or database access here is fine. A panic kills the
    /// worker, handle errors by setting a status code instead.
    fn handle(&self, request: &Request, response: &mut Response);
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut Response) + Sync + Send + 'static,
{
    #[inline]
    fn handle(&self, request: &Request, response: &mut Response) {
        self(request, response)
    }
}

/// Routing table mapping requests to [Handler]s.
///
/// Two layers: exact `(method, path)` routes and path-prefix fallbacks. The
/// exact layer wins. The prefix layer ignores the method and picks the
/// longest matching prefix, so `/static/css` shadows `/` for everything
/// underneath it. Registration goes through a shared reference and may
/// happen while the server is already running.
///
/// # Examples
/// ```
/// use oneshot_web::{Router, StatusCode};
///
/// let router = Router::new();
/// router.get("/", |_req, resp| {
///     resp.status(StatusCode::Ok).body("home");
/// });
/// router.post("/send", |req, resp| {
///     resp.body(format!("got {} bytes", req.text().map_or(0, str::len)));
/// });
/// router.static_dir("/static", "./public");
/// ```
pub struct Router {
    routes: RwLock<HashMap<String, HashMap<String, Arc<dyn Handler>>>>,
    prefixes: RwLock<Vec<(String, Arc<dyn Handler>)>>,
}

impl Router {
    /// Creates an empty table.
    #[inline]
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            prefixes: RwLock::new(Vec::new()),
        }
    }

    /// Registers a handler for an exact method and path pair.
    ///
    /// Both are matched byte for byte against the parsed request, the path
    /// in its decoded form. Registering the same pair again replaces the
    /// previous handler.
    pub fn register<H: Handler>(&self, method: &str, path: &str, handler: H) {
        let handler: Arc<dyn Handler> = Arc::new(handler);

        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method.to_owned())
            .or_default()
            .insert(path.to_owned(), handler);
    }

    /// Registers a fallback handler for every path starting with `prefix`,
    /// regardless of method. Registering the same prefix again replaces the
    /// previous handler.
    pub fn register_static<H: Handler>(&self, prefix: &str, handler: H) {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        let mut prefixes = self.prefixes.write().unwrap_or_else(PoisonError::into_inner);

        match prefixes.iter_mut().find(|(known, _)| known == prefix) {
            Some(entry) => entry.1 = handler,
            None => prefixes.push((prefix.to_owned(), handler)),
        }
    }

    /// Registers a `GET` route. Sugar over [register](Self::register).
    #[inline]
    pub fn get<F>(&self, path: &str, handler: F)
    where
        F: Fn(&Request, &mut Response) + Sync + Send + 'static,
    {
        self.register("GET", path, handler);
    }

    /// Registers a `POST` route. Sugar over [register](Self::register).
    #[inline]
    pub fn post<F>(&self, path: &str, handler: F)
    where
        F: Fn(&Request, &mut Response) + Sync + Send + 'static,
    {
        self.register("POST", path, handler);
    }

    /// Serves files under `dir` for every path starting with `prefix`.
    ///
    /// Sugar over [register_static](Self::register_static) with a
    /// [StaticFiles] handler. Nothing is read from disk until a request
    /// comes in.
    #[inline]
    pub fn static_dir<P: Into<PathBuf>>(&self, prefix: &str, dir: P) {
        self.register_static(prefix, StaticFiles::new(dir));
    }

    /// Looks up the handler for a request.
    ///
    /// The exact `(method, path)` route wins. Without one, the longest
    /// registered prefix the path starts with decides, whatever the method.
    /// `None` means 404.
    pub(crate) fn resolve(&self, method: &str, path: &str) -> Option<Arc<dyn Handler>> {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(handler) = routes.get(method).and_then(|paths| paths.get(path)) {
            return Some(handler.clone());
        }
        drop(routes);

        self.prefixes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, handler)| handler.clone())
    }
}

impl Default for Router {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod router_self {
    use super::*;

    fn respond(text: &'static str) -> impl Fn(&Request, &mut Response) + Sync + Send {
        move |_req: &Request, resp: &mut Response| {
            resp.body(text);
        }
    }

    /// Resolves and runs the matched handler, returning the response body.
    fn run(router: &Router, method: &str, path: &str) -> Option<String> {
        let handler = router.resolve(method, path)?;
        let raw = format!("{method} {path} HTTP/1.1\r\n\r\n");
        let req = Request::parse(raw.as_bytes()).unwrap();

        let mut resp = Response::new();
        handler.handle(&req, &mut resp);

        let raw = resp.to_bytes();
        let body_at = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        Some(String::from_utf8(raw[body_at..].to_vec()).unwrap())
    }

    #[test]
    fn exact_routes() {
        let router = Router::new();
        router.get("/", respond("home"));
        router.get("/about", respond("about"));
        router.post("/send", respond("sent"));

        assert_eq!(run(&router, "GET", "/").as_deref(), Some("home"));
        assert_eq!(run(&router, "GET", "/about").as_deref(), Some("about"));
        assert_eq!(run(&router, "POST", "/send").as_deref(), Some("sent"));

        assert_eq!(run(&router, "GET", "/missing"), None);
        assert_eq!(run(&router, "POST", "/"), None);
        assert_eq!(run(&router, "GET", "/send"), None);
    }

    #[test]
    fn methods_do_not_collide() {
        let router = Router::new();
        router.get("/form", respond("render"));
        router.post("/form", respond("submit"));

        assert_eq!(run(&router, "GET", "/form").as_deref(), Some("render"));
        assert_eq!(run(&router, "POST", "/form").as_deref(), Some("submit"));
    }

    #[test]
    fn register_overwrites() {
        let router = Router::new();
        router.get("/", respond("first"));
        router.get("/", respond("second"));

        assert_eq!(run(&router, "GET", "/").as_deref(), Some("second"));

        router.register_static("/p", respond("old"));
        router.register_static("/p", respond("new"));

        assert_eq!(run(&router, "GET", "/p/x").as_deref(), Some("new"));
    }

    #[test]
    fn prefix_fallback_ignores_method() {
        let router = Router::new();
        router.get("/page", respond("exact"));
        router.register_static("/", respond("fallback"));

        assert_eq!(run(&router, "GET", "/page").as_deref(), Some("exact"));
        // No POST route for /page, the prefix layer answers instead.
        assert_eq!(run(&router, "POST", "/page").as_deref(), Some("fallback"));
        assert_eq!(run(&router, "DELETE", "/anything").as_deref(), Some("fallback"));
    }

    #[test]
    fn longest_prefix_wins() {
        // Registration order must not matter.
        let orders: [&[(&str, &'static str)]; 2] = [
            &[("/", "root"), ("/static", "assets"), ("/static/css", "css")],
            &[("/static/css", "css"), ("/static", "assets"), ("/", "root")],
        ];

        for order in orders {
            let router = Router::new();
            for (prefix, tag) in order {
                router.register_static(prefix, respond(tag));
            }

            assert_eq!(run(&router, "GET", "/index.html").as_deref(), Some("root"));
            assert_eq!(run(&router, "GET", "/static/app.js").as_deref(), Some("assets"));
            assert_eq!(run(&router, "GET", "/static/css/main.css").as_deref(), Some("css"));
        }
    }

    #[test]
    fn empty_router_matches_nothing() {
        let router = Router::new();

        assert_eq!(run(&router, "GET", "/"), None);
        assert_eq!(run(&router, "POST", "/x"), None);
    }

    #[test]
    fn stateful_handler() {
        struct Counter(std::sync::atomic::AtomicUsize);

        impl Handler for Counter {
            fn handle(&self, _: &Request, resp: &mut Response) {
                let seen = self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                resp.body(format!("visit {seen}"));
            }
        }

        let router = Router::new();
        router.register("GET", "/count", Counter(std::sync::atomic::AtomicUsize::new(1)));

        assert_eq!(run(&router, "GET", "/count").as_deref(), Some("visit 1"));
        assert_eq!(run(&router, "GET", "/count").as_deref(), Some("visit 2"));
    }
}
