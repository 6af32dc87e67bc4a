use crate::{
    errors::ErrorKind,
    http::{
        frame,
        request::Request,
        response::{self, Response},
    },
    limits::ReqLimits,
    server::router::Router,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Serves exactly one request on an accepted connection.
///
/// A worker hands the stream over, [run](Self::run) reads one frame, parses
/// it, dispatches through the router and writes the serialized response
/// back. The stream is shut down afterwards whatever the handler did, there
/// is no second request. A frame or parse failure closes the connection
/// without writing anything.
pub(crate) struct HttpConnection {
    router: Arc<Router>,
    req_limits: ReqLimits,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(router: Arc<Router>, req_limits: ReqLimits) -> Self {
        Self { router, req_limits }
    }

    pub(crate) async fn run<S>(&self, stream: &mut S) -> Result<(), ErrorKind>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let frame = frame::read_frame(stream, &self.req_limits).await?;
        let request = Request::parse(&frame)?;

        log::info!(
            "{} {} {}",
            request.method(),
            request.path(),
            request.version()
        );

        let mut resp = Response::new();
        match self.router.resolve(request.method(), request.path()) {
            Some(handler) => handler.handle(&request, &mut resp),
            None => response::not_found(&mut resp),
        }

        stream.write_all(&resp.to_bytes()).await?;
        stream.shutdown().await?;

        Ok(())
    }
}
