use crate::{
    errors::ErrorKind,
    http::{
        request::{read_request, Accumulated, Request},
        response::Response,
        types::StatusCode,
    },
    limits::ConnLimits,
    router::Router,
    server::server_impl::Limits,
    BodyWriter, WriteBuffer,
};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Byte stream a connection is served over.
///
/// Implemented for every `AsyncRead + AsyncWrite + Unpin + Send` type,
/// e.g. [`tokio::net::TcpStream`].
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// What the server does once a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Serialize and send [`Context`]'s response.
    Respond,
    /// The handler already wrote its response with [`Context::send`].
    Sent,
}

/// Everything one request is handled with: the socket, the parsed
/// request and the response being built.
///
/// The request borrows the connection's arena, so a `Context` never
/// outlives the connection it was created for.
///
/// # Examples
/// ```
/// use arena_web::{handler_fn, Signal, StatusCode};
///
/// let hello = handler_fn(|ctx| {
///     let name = ctx.query_param(b"name").unwrap_or(b"stranger");
///     let name = String::from_utf8_lossy(name).into_owned();
///
///     ctx.html_with(StatusCode::Ok, |w| {
///         w.append_text("Hello ");
///         w.append_text(&name);
///     });
///     Signal::Respond
/// });
/// # drop(hello);
/// ```
pub struct Context<'c> {
    stream: &'c mut dyn Io,
    request: Request<'c>,
    response: Response,
    deferred_body: Option<usize>,
    conn_limits: &'c ConnLimits,
}

impl<'c> Context<'c> {
    #[inline]
    pub(crate) fn new(
        stream: &'c mut dyn Io,
        request: Request<'c>,
        response: Response,
        deferred_body: Option<usize>,
        conn_limits: &'c ConnLimits,
    ) -> Self {
        Self {
            stream,
            request,
            response,
            deferred_body,
            conn_limits,
        }
    }

    #[inline(always)]
    pub const fn request(&self) -> &Request<'c> {
        &self.request
    }

    #[inline(always)]
    pub const fn response(&self) -> &Response {
        &self.response
    }

    #[inline(always)]
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// The client socket, for handlers that write their own bytes.
    #[inline(always)]
    pub fn socket(&mut self) -> &mut dyn Io {
        self.stream
    }

    #[inline]
    pub fn query_param(&self, key: &[u8]) -> Option<&'c [u8]> {
        self.request.query_param(key)
    }

    #[inline]
    pub fn form_value(&self, key: &[u8]) -> Option<&'c [u8]> {
        self.request.form_value(key)
    }

    /// Case-insensitive header lookup.
    #[inline]
    pub fn request_header(&self, name: &[u8]) -> Option<&'c [u8]> {
        self.request.header(name)
    }
}

/// Response shortcuts, see [`Response`].
impl Context<'_> {
    #[inline]
    #[track_caller]
    pub fn header<N: WriteBuffer, V: WriteBuffer>(&mut self, name: N, value: V) -> &mut Response {
        self.response.header(name, value)
    }

    #[inline]
    pub fn html<T: WriteBuffer>(&mut self, status: StatusCode, body: T) -> &mut Response {
        self.response.html(status, body)
    }

    #[inline]
    pub fn html_with<F: FnOnce(&mut BodyWriter)>(&mut self, status: StatusCode, f: F) -> &mut Response {
        self.response.html_with(status, f)
    }

    #[inline]
    pub fn blob<C: WriteBuffer, T: WriteBuffer>(
        &mut self,
        status: StatusCode,
        content_type: C,
        blob: T,
    ) -> &mut Response {
        self.response.blob(status, content_type, blob)
    }

    #[inline]
    pub fn stream<C: WriteBuffer, R: io::Read>(
        &mut self,
        status: StatusCode,
        content_type: C,
        reader: R,
    ) -> io::Result<&mut Response> {
        self.response.stream(status, content_type, reader)
    }

    #[inline]
    pub fn redirect<U: WriteBuffer>(&mut self, status: StatusCode, url: U) -> &mut Response {
        self.response.redirect(status, url)
    }

    #[inline]
    pub fn no_content(&mut self, status: StatusCode) -> &mut Response {
        self.response.no_content(status)
    }
}

impl Context<'_> {
    /// Returns the request body, reading it first if the client asked
    /// for `Expect: 100-continue`.
    ///
    /// In that case the server stops reading after the header section.
    /// This method answers `HTTP/1.1 100 Continue` and reads exactly
    /// `Content-Length` bytes. The body is returned as an owned buffer
    /// that can be decoded with [`Pairs::form`](crate::Pairs::form) or
    /// [`MultipartForm::parse`](crate::MultipartForm::parse).
    ///
    /// Without a pending body this returns a copy of [`Request::body`].
    pub async fn continue_body(&mut self) -> io::Result<Vec<u8>> {
        let Some(len) = self.deferred_body.take() else {
            return Ok(self.request.body().to_vec());
        };

        let mut interim = StatusCode::Continue.status_line().to_vec();
        interim.extend_from_slice(b"\r\n");
        socket::write_bytes(self.stream, &interim, self.conn_limits.socket_write_timeout).await?;

        let mut body = vec![0; len];
        let mut filled = 0;
        while filled < len {
            let n = socket::read_chunk(
                self.stream,
                &mut body[filled..],
                self.conn_limits.socket_read_timeout,
            )
            .await?;
            if n == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            filled += n;
        }

        log::trace!("Read {} body bytes after 100 Continue", len);
        Ok(body)
    }

    /// Serializes and writes the response now.
    ///
    /// A handler that calls this must return [`Signal::Sent`].
    pub async fn send(&mut self) -> io::Result<()> {
        let bytes = self.response.to_bytes();
        socket::write_bytes(self.stream, &bytes, self.conn_limits.socket_write_timeout).await
    }
}

/// Serves exactly one request on `stream` and closes it.
///
/// Framing errors are answered with their fixed error response. Transport
/// errors and oversized requests close the socket silently.
pub(crate) async fn serve<S: Io>(mut stream: S, router: &Router, limits: &Limits) -> io::Result<()> {
    let result = match handle(&mut stream, router, limits).await {
        Ok(()) => Ok(()),
        Err(ErrorKind::Io(err)) => Err(err.0),
        Err(err) => match err.as_http() {
            Some(response) => {
                log::warn!("Rejecting request: {}", err);
                socket::write_bytes(&mut stream, response, limits.conn.socket_write_timeout).await
            }
            None => {
                log::debug!("Closing connection: {}", err);
                Ok(())
            }
        },
    };

    let _ = stream.shutdown().await;
    result
}

async fn handle<S: Io>(stream: &mut S, router: &Router, limits: &Limits) -> Result<(), ErrorKind> {
    let Accumulated {
        mut arena,
        deferred_body,
    } = read_request(stream, &limits.conn, &limits.req).await?;

    let request = Request::parse(&mut arena)?;
    let handler = router.route(request.method().as_bytes(), request.path());

    let mut ctx = Context::new(
        stream,
        request,
        Response::new(&limits.resp),
        deferred_body,
        &limits.conn,
    );

    let signal = match handler {
        Some(handler) => handler.handle(&mut ctx).await,
        None => {
            log::trace!("No route for {:?}", String::from_utf8_lossy(ctx.request.path()));
            ctx.no_content(StatusCode::NotFound);
            Signal::Respond
        }
    };

    if signal == Signal::Respond {
        ctx.send().await?;
    }

    Ok(())
}

pub(crate) mod socket {
    use std::{io, time::Duration};
    use tokio::{
        io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
        time::timeout,
    };

    #[inline]
    pub(crate) async fn read_chunk<R: AsyncRead + Unpin + ?Sized>(
        stream: &mut R,
        buf: &mut [u8],
        limit: Option<Duration>,
    ) -> io::Result<usize> {
        match limit {
            Some(limit) => timeout(limit, stream.read(buf)).await?,
            None => stream.read(buf).await,
        }
    }

    /// Writes all of `bytes`, tolerating short writes.
    #[inline]
    pub(crate) async fn write_bytes<W: AsyncWrite + Unpin + ?Sized>(
        stream: &mut W,
        bytes: &[u8],
        limit: Option<Duration>,
    ) -> io::Result<()> {
        let result = match limit {
            Some(limit) => timeout(limit, stream.write_all(bytes)).await?,
            None => stream.write_all(bytes).await,
        };

        if let Err(err) = &result {
            log::error!("Failed to send {} bytes: {}", bytes.len(), err);
        }
        result
    }
}
