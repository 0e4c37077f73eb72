use crate::{
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits},
    router::Router,
    server::connection::{serve, Context, Signal},
};
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    future::{ready, Future},
    io,
    net::{SocketAddr, ToSocketAddrs},
    pin::Pin,
    sync::Arc,
};
use tokio::net::TcpListener;

/// Future returned by [`Handler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Signal> + Send + 'a>>;

/// Processes one request.
///
/// The handler fills [`Context`]'s response and returns
/// [`Signal::Respond`], or writes a response itself with
/// [`Context::send`] and returns [`Signal::Sent`].
///
/// Handlers are stored in the [`Router`] as trait objects, so the returned
/// future is boxed. Synchronous handlers are easier to write with
/// [`handler_fn`].
///
/// # Examples
/// ```
/// use arena_web::{Context, Handler, HandlerFuture, Signal, StatusCode};
///
/// struct Echo;
///
/// impl Handler for Echo {
///     fn handle<'a>(&'a self, ctx: &'a mut Context<'_>) -> HandlerFuture<'a> {
///         Box::pin(async move {
///             let body = match ctx.continue_body().await {
///                 Ok(body) => body,
///                 Err(_) => return Signal::Sent,
///             };
///
///             ctx.blob(StatusCode::Ok, "application/octet-stream", body);
///             Signal::Respond
///         })
///     }
/// }
/// ```
pub trait Handler
where
    Self: Send + Sync + 'static,
{
    fn handle<'a>(&'a self, ctx: &'a mut Context<'_>) -> HandlerFuture<'a>;
}

/// [`Handler`] over a synchronous closure, see [`handler_fn`].
#[derive(Clone, Copy)]
pub struct HandlerFn<F>(F);

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut Context<'_>) -> Signal + Send + Sync + 'static,
{
    #[inline]
    fn handle<'a>(&'a self, ctx: &'a mut Context<'_>) -> HandlerFuture<'a> {
        Box::pin(ready((self.0)(ctx)))
    }
}

/// Wraps a closure into a [`Handler`].
///
/// # Examples
/// ```
/// use arena_web::{handler_fn, Router, Signal, StatusCode};
///
/// let mut router = Router::new();
/// router.register_route("GET:/ping", handler_fn(|ctx| {
///     ctx.html(StatusCode::Ok, "pong");
///     Signal::Respond
/// }));
/// ```
#[inline]
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut Context<'_>) -> Signal + Send + Sync + 'static,
{
    HandlerFn(f)
}

/// Per-connection limits shared by every connection task.
#[derive(Debug, Clone, Default)]
pub(crate) struct Limits {
    pub(crate) conn: ConnLimits,
    pub(crate) req: ReqLimits,
    pub(crate) resp: RespLimits,
}

/// An HTTP server that serves one request per accepted connection.
///
/// Every connection runs in its own detached tokio task. The [`Router`]
/// is shared read-only between tasks.
///
/// # Examples
///
/// ```no_run
/// use arena_web::{handler_fn, limits::ServerLimits, Router, Server, Signal, StatusCode};
///
/// #[tokio::main]
/// async fn main() {
///     let mut router = Router::new();
///     router.register_route("GET:/", handler_fn(|ctx| {
///         ctx.html(StatusCode::Ok, "Hello world!");
///         Signal::Respond
///     }));
///
///     Server::builder()
///         .listener(Server::bind("127.0.0.1:8080", &ServerLimits::default()).unwrap())
///         .router(router)
///         .build()
///         .launch()
///         .await
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    limits: Arc<Limits>,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listener: None,
            router: None,
            limits: Limits::default(),
        }
    }

    /// Opens a listening socket configured by `limits`.
    ///
    /// `SO_REUSEADDR` is always set, `SO_REUSEPORT` on unix when
    /// [`ServerLimits::reuse_port`] is enabled. Must be called inside a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Address resolution, socket creation, `bind(2)` or `listen(2)` errors.
    pub fn bind<A: ToSocketAddrs>(addr: A, limits: &ServerLimits) -> io::Result<TcpListener> {
        let mut last_err = None;

        for addr in addr.to_socket_addrs()? {
            match Self::bind_addr(addr, limits) {
                Ok(listener) => return Ok(listener),
                Err(err) => last_err = Some(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "could not resolve to any address")
        }))
    }

    fn bind_addr(addr: SocketAddr, limits: &ServerLimits) -> io::Result<TcpListener> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        if limits.reuse_port {
            socket.set_reuse_port(true)?;
        }
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(limits.backlog.min(i32::MAX as u32) as i32)?;

        log::debug!("Listening on {} (backlog {})", addr, limits.backlog);
        TcpListener::from_std(socket.into())
    }

    /// Address the server accepts connections on.
    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts the server and begins accepting incoming connections.
    ///
    /// Runs forever. Accept errors are logged and the loop continues.
    pub async fn launch(self) {
        log::debug!("Routing table:\n{}", self.router);

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(value) => value,
                Err(err) => {
                    log::error!("Failed to accept a connection: {}", err);
                    continue;
                }
            };

            let router = self.router.clone();
            let limits = self.limits.clone();

            tokio::spawn(async move {
                log::trace!("Connection from {}", addr);

                if let Err(err) = serve(stream, &router, &limits).await {
                    log::debug!("Connection from {} failed: {}", addr, err);
                }
            });
        }
    }
}

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    router: Option<Router>,
    limits: Limits,
}

impl ServerBuilder {
    /// Sets the TCP listener that the server will use to accept connections.
    ///
    /// **This is a required component.** See [`Server::bind`].
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the route table.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Configures socket buffering and timeouts.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # #[tokio::main]
    /// # async fn main() {
    /// use arena_web::{limits::{ConnLimits, ServerLimits}, Router, Server};
    /// use std::time::Duration;
    ///
    /// let server = Server::builder()
    ///     .listener(Server::bind("127.0.0.1:8080", &ServerLimits::default()).unwrap())
    ///     .router(Router::new())
    ///     .connection_limits(ConnLimits {
    ///         socket_read_timeout: Some(Duration::from_secs(5)),
    ///         socket_write_timeout: Some(Duration::from_secs(2)),
    ///         ..ConnLimits::default() // Required line
    ///     })
    ///     .build();
    /// # }
    /// ```
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.limits.conn = limits;
        self
    }

    /// Configures request buffering limits.
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.limits.req = limits;
        self
    }

    /// Configures response buffering.
    #[inline(always)]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.limits.resp = limits;
        self
    }

    /// Finalizes the builder and constructs a [`Server`] instance.
    ///
    /// # Panics
    ///
    /// Error messages:
    /// - ``The `listener` method must be called to create``
    /// - ``The `router` method must be called to create``
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        Server {
            listener: self
                .listener
                .expect("The `listener` method must be called to create"),
            router: Arc::new(
                self.router
                    .expect("The `router` method must be called to create"),
            ),
            limits: Arc::new(self.limits),
        }
    }
}
