//! Static file serving for prefix routes.

use crate::{
    http::{
        request::Request,
        response::{self, Response},
        types::StatusCode,
    },
    server::router::Handler,
};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

/// Source of file bytes for [`StaticFiles`].
///
/// The stock implementation is [`DirLoader`], which reads from disk.
/// Swapping in another one changes the backing store without touching the
/// request-to-file mapping, which stays in [`StaticFiles`].
pub trait ResourceLoader: Sync + Send + 'static {
    /// Returns the full contents of the file at `path`, or `None` when it
    /// cannot be read. `path` is the rewritten request path and always
    /// starts with `/`.
    fn load(&self, path: &str) -> Option<Vec<u8>>;
}

/// Reads files from a directory on disk.
///
/// The request path is appended to the root directory as-is, so a handler
/// registered under `/assets` looks up `/assets/app.css` at
/// `<root>/assets/app.css`. Paths with `..` components are refused.
#[derive(Debug, Clone)]
pub struct DirLoader {
    root: PathBuf,
}

impl DirLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceLoader for DirLoader {
    fn load(&self, path: &str) -> Option<Vec<u8>> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|part| matches!(part, Component::ParentDir))
        {
            log::error!("refusing static file path {path:?}");
            return None;
        }

        match fs::read(self.root.join(relative)) {
            Ok(file) => Some(file),
            Err(err) => {
                log::error!("failed to load static file {path:?}: {err}");
                None
            }
        }
    }
}

/// Serves files under a directory for every request routed to it.
///
/// The full request path is used for the lookup, including the prefix the
/// handler was registered under. A path without a file extension is treated
/// as a directory and `/index.html` is appended; the bare `/` becomes
/// `/index.html`. The `Content-Type` header comes from the extension of the
/// served file. Missing or unreadable files get the styled 404 page.
///
/// # Examples
/// ```no_run
/// use oneshot_web::{Router, StaticFiles};
///
/// let router = Router::new();
/// router.register_static("/assets", StaticFiles::new("./public"));
/// ```
pub struct StaticFiles {
    loader: Box<dyn ResourceLoader>,
}

impl StaticFiles {
    /// Serves files from `dir` on disk.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self::with_loader(DirLoader::new(dir))
    }

    /// Serves files from a custom [`ResourceLoader`].
    pub fn with_loader<L: ResourceLoader>(loader: L) -> Self {
        Self {
            loader: Box::new(loader),
        }
    }
}

impl Handler for StaticFiles {
    fn handle(&self, request: &Request, response: &mut Response) {
        let mut path = request.path().to_owned();
        if path == "/" {
            path = String::from(INDEX_PATH);
        } else if file_extension(&path).is_empty() {
            path.push_str(INDEX_PATH);
        }

        match self.loader.load(&path) {
            Some(file) => {
                response
                    .status(StatusCode::Ok)
                    .header("Content-Type", mime_type(file_extension(&path)))
                    .body(file);
            }
            None => response::not_found(response),
        }
    }
}

const INDEX_PATH: &str = "/index.html";

/// Extension of the final path segment, without the dot. Empty when the
/// segment has none.
fn file_extension(path: &str) -> &str {
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rsplit_once('.') {
        Some((_, extension)) => extension,
        None => "",
    }
}

/// `Content-Type` value for a file extension. Lookup is case sensitive and
/// anything unlisted is served as `application/octet-stream`.
fn mime_type(extension: &str) -> &'static str {
    match extension {
        "jpeg" => "image/jpeg",
        "jpg" => "image/jpg",
        "png" => "image/png",
        "html" => "text/html",
        "js" => "application/javascript",
        "css" => "text/css",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
