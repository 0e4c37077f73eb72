//! Server configuration limits and timeouts
//!
//! # Defaults
//!
//! The defaults keep the classic blocking behavior of a minimal HTTP/1.1
//! server: no socket timeouts, one task per connection, a 4 KiB staging
//! buffer and a 10 MiB ceiling on a buffered request.
//!
//! # Memory Consumption
//!
//! Each active connection consumes memory according to:
//!
//! `Total` = [`Staging Buffer`](crate::limits::ConnLimits::staging_buffer_size) +
//!           [`Request Arena`](crate::limits::ReqLimits#request-arena) +
//!           [`Response Buffer`](crate::limits::RespLimits) +
//!           `Runtime Overhead`
//!
//! # Examples
//!
//! ```no_run
//! use arena_web::{handler_fn, Router, Server, Signal, StatusCode};
//! use arena_web::limits::{ConnLimits, ReqLimits, ServerLimits};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let limits = ServerLimits {
//!         backlog: 4096,
//!         ..ServerLimits::default()
//!     };
//!
//!     let mut router = Router::new();
//!     router.register_route("GET", handler_fn(|ctx| {
//!         ctx.html(StatusCode::Ok, "Hello!");
//!         Signal::Respond
//!     }));
//!
//!     Server::builder()
//!         .listener(Server::bind("127.0.0.1:8080", &limits).unwrap())
//!         .router(router)
//!         .connection_limits(ConnLimits {
//!             socket_read_timeout: Some(Duration::from_secs(5)),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             max_request_size: 64 * 1024,
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Listening socket configuration.
///
/// Applied by [`Server::bind`](crate::Server::bind) before the socket is
/// handed to tokio. A listener created elsewhere is used as is.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Length of the kernel accept queue passed to `listen(2)` (default: `1024`)
    pub backlog: u32,

    /// Sets `SO_REUSEPORT` on unix platforms (default: `true`)
    ///
    /// `SO_REUSEADDR` is always set.
    pub reuse_port: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            backlog: 1024,
            reuse_port: true,

            _priv: (),
        }
    }
}

/// Connection-level buffers and timeouts
///
/// Every connection serves exactly one request and is then closed.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Size of a single socket read (default: `4096 B`)
    ///
    /// The whole header section must arrive in the first read, otherwise
    /// the request is answered with `431 Request Header Fields Too Large`.
    /// Without a `Content-Length`, reading stops at the first read that
    /// does not fill this buffer.
    pub staging_buffer_size: usize,

    /// Maximum duration to wait for a single socket read (default: `None`)
    ///
    /// With `None` a slow client holds its task until it sends data or
    /// closes the socket.
    pub socket_read_timeout: Option<Duration>,

    /// Maximum duration to wait for writing the response (default: `None`)
    pub socket_write_timeout: Option<Duration>,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            staging_buffer_size: 4096,
            socket_read_timeout: None,
            socket_write_timeout: None,

            _priv: (),
        }
    }
}

/// Request size limits
///
/// # Request arena
///
/// Each read is appended to one growable buffer. Once all bytes of the
/// request are buffered, every parsed part (method, path, headers, form
/// values, multipart files) borrows from that buffer. The buffer is
/// dropped together with the connection.
///
/// If the buffer would grow past `max_request_size`, the connection is
/// closed without a response.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum size of a buffered request, header section included (default: `10 MiB`)
    pub max_request_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            max_request_size: 10 * 1024 * 1024,

            _priv: (),
        }
    }
}

/// Response buffer configuration
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial capacity of the response body buffer (default: `1024 B`)
    ///
    /// The header buffer starts empty and grows with the first header.
    pub default_capacity: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 1024,

            _priv: (),
        }
    }
}
