//! arena_web - Minimal HTTP/1.1 server toolkit working on raw socket bytes
//!
//! A small server built around one idea: every request is read into a
//! single buffer (the request arena) and everything the parser produces,
//! from the method to multipart file contents, is a borrowed slice of it.
//! Nothing is copied and the borrow checker guarantees no slice outlives
//! the connection.
//!
//! # Protocol Support
//!
//! - **HTTP/1.1** subset: one request per connection, `Content-Length`
//!   framed bodies, `Expect: 100-continue`
//! - **Bodies**: `application/x-www-form-urlencoded` and `multipart/form-data`
//! - **Not supported**: keep-alive, chunked transfer-encoding, HTTP/2, TLS
//!
//! # Components
//!
//! - [`Request`] - zero-copy request parser
//! - [`Pairs`] - ordered key/value views (headers, query, form values)
//! - [`MultipartForm`] - `multipart/form-data` fields and files
//! - [`Router`] - prefix trie keyed by `"METHOD:/path"`
//! - [`Response`] - response builder with exact `Content-Length` framing
//! - [`Server`] - accept loop, one tokio task per connection
//!
//! # Examples
//!
//! ```no_run
//! use arena_web::{handler_fn, limits::ServerLimits, Router, Server, Signal, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut router = Router::new();
//!     router
//!         .register_route("GET:/hello", handler_fn(|ctx| {
//!             let name = ctx.query_param(b"name").unwrap_or(b"world");
//!             let name = String::from_utf8_lossy(name).into_owned();
//!
//!             ctx.html_with(StatusCode::Ok, |w| {
//!                 w.append_text("Hello, ");
//!                 w.append_text(&name);
//!             });
//!             Signal::Respond
//!         }))
//!         .register_route("POST:/concat", handler_fn(|ctx| {
//!             let first = ctx.form_value(b"1").unwrap_or_default();
//!             let second = ctx.form_value(b"2").unwrap_or_default();
//!
//!             ctx.html_with(StatusCode::Ok, |w| {
//!                 w.write(first);
//!                 w.write(second);
//!             });
//!             Signal::Respond
//!         }))
//!         // Catch-all for every other GET request.
//!         .register_route("GET", handler_fn(|ctx| {
//!             ctx.html(StatusCode::NotFound, "Nothing here");
//!             Signal::Respond
//!         }));
//!
//!     Server::builder()
//!         .listener(Server::bind("127.0.0.1:8080", &ServerLimits::default()).unwrap())
//!         .router(router)
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```
//!
//! # Logging
//!
//! The crate logs through the [`log`] facade and installs no logger.

pub(crate) mod http {
    pub mod multipart;
    pub mod pairs;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;
pub(crate) mod router;

pub use crate::{
    errors::{ErrorKind, IoError},
    http::{
        multipart::{content_type_boundary, FormFile, MultipartForm},
        pairs::Pairs,
        request::Request,
        response::{
            write::{BodyWriter, WriteBuffer},
            Response,
        },
        types::{Method, StatusCode},
    },
    router::Router,
    server::{
        connection::{Context, Io, Signal},
        server_impl::{handler_fn, Handler, HandlerFn, HandlerFuture, Server, ServerBuilder},
    },
};
