//! HTTP response builder and its byte-exact serializer.

use crate::{http::types::StatusCode, limits::RespLimits, BodyWriter, WriteBuffer};
use std::{borrow::Cow, io, rc::Rc, sync::Arc};

/// HTTP response filled in by a handler and serialized once by the server.
///
/// Headers and body live in separate buffers. Each method writes its part
/// and leaves the rest alone, so a later call overrides an earlier one:
///
/// | method                              | status | headers               | body      |
/// |-------------------------------------|--------|-----------------------|-----------|
/// | [`html`](Response::html)            | set    | kept                  | replaced  |
/// | [`blob`](Response::blob)            | set    | `Content-Type: X`     | replaced  |
/// | [`stream`](Response::stream)        | set    | `Content-Type: X`     | replaced  |
/// | [`redirect`](Response::redirect)    | set    | `Location: url`       | kept      |
/// | [`no_content`](Response::no_content)| set    | kept                  | kept      |
/// | [`header`](Response::header)        | kept   | appended              | kept      |
///
/// A fresh response is `200 OK` with no headers and an empty body.
///
/// # Wire format
///
/// ```text
/// HTTP/1.1 <code> <reason>\r\n
/// <headers>\r\n                      # only when headers are not empty
/// Content-Length: <len>\r\n
/// \r\n
/// <body>\r\n                         # the CRLF only when the body is not empty
/// ```
///
/// A non-empty body is terminated by `\r\n`, which is counted in
/// `Content-Length`.
///
/// # Examples
/// ```
/// use arena_web::{limits::RespLimits, Response, StatusCode};
///
/// let mut resp = Response::new(&RespLimits::default());
/// resp.html(StatusCode::Ok, "<h1>Hi</h1>")
///     .header("X-Id", 7);
///
/// assert_eq!(
///     resp.to_bytes(),
///     b"HTTP/1.1 200 OK\r\nX-Id: 7\r\nContent-Length: 13\r\n\r\n<h1>Hi</h1>\r\n"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: Vec<u8>,
    body: Vec<u8>,
}

impl Response {
    #[inline]
    pub fn new(limits: &RespLimits) -> Self {
        Self {
            status: StatusCode::Ok,
            headers: Vec::new(),
            body: Vec::with_capacity(limits.default_capacity),
        }
    }

    #[inline(always)]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Header lines joined by `\r\n`, without a trailing line break.
    #[inline(always)]
    pub fn headers(&self) -> &[u8] {
        &self.headers
    }

    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Response {
    /// Sets the status code, leaving headers and body untouched.
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Appends a header line.
    ///
    /// PLEASE DO NOT ADD `Content-Length`, it is calculated automatically.
    ///
    /// # Examples
    /// ```
    /// # use arena_web::{limits::RespLimits, Response, StatusCode};
    /// # let mut resp = Response::new(&RespLimits::default());
    /// resp.no_content(StatusCode::Ok)
    ///     .header("Cache-Control", "no-store")
    ///     .header("X-Retry", 3u8)
    ///     .header(b"X-Ready", true);
    ///
    /// assert_eq!(resp.headers(), b"Cache-Control: no-store\r\nX-Retry: 3\r\nX-Ready: true");
    /// ```
    ///
    /// # Panics
    /// Error message: `Content-Length is calculated automatically`
    ///
    /// Panics in `debug` mode when the header name is `Content-Length`
    /// (in any case).
    #[inline]
    #[track_caller]
    pub fn header<N: WriteBuffer, V: WriteBuffer>(&mut self, name: N, value: V) -> &mut Self {
        if !self.headers.is_empty() {
            self.headers.extend_from_slice(b"\r\n");
        }

        let start = self.headers.len();
        name.write_to(&mut self.headers);
        debug_assert!(
            !self.headers[start..].eq_ignore_ascii_case(b"content-length"),
            "Content-Length is calculated automatically"
        );

        self.headers.extend_from_slice(b": ");
        value.write_to(&mut self.headers);
        self
    }

    /// Sets the status and replaces the body with `body`.
    #[inline]
    pub fn html<T: WriteBuffer>(&mut self, status: StatusCode, body: T) -> &mut Self {
        self.status = status;
        self.body.clear();
        body.write_to(&mut self.body);
        self
    }

    /// Sets the status and rebuilds the body through a [`BodyWriter`].
    ///
    /// # Examples
    /// ```
    /// # use arena_web::{limits::RespLimits, Response, StatusCode};
    /// # let mut resp = Response::new(&RespLimits::default());
    /// use std::io::Write;
    ///
    /// resp.html_with(StatusCode::Ok, |w| {
    ///     w.append_text("<p>");
    ///     w.append_int(-42);
    ///     write!(w, " {}", "items").unwrap();
    ///     w.append_text("</p>");
    /// });
    ///
    /// assert_eq!(resp.body(), b"<p>-42 items</p>");
    /// ```
    #[inline]
    pub fn html_with<F: FnOnce(&mut BodyWriter)>(&mut self, status: StatusCode, f: F) -> &mut Self {
        self.status = status;
        self.body.clear();
        f(&mut BodyWriter(&mut self.body));
        self
    }

    /// Sets the status, replaces the body with `blob` and the headers
    /// with a single `Content-Type`.
    #[inline]
    pub fn blob<C: WriteBuffer, T: WriteBuffer>(
        &mut self,
        status: StatusCode,
        content_type: C,
        blob: T,
    ) -> &mut Self {
        self.status = status;
        self.body.clear();
        blob.write_to(&mut self.body);
        self.set_content_type(content_type);
        self
    }

    /// Like [`blob`](Response::blob) with the body read from `reader` to the end.
    ///
    /// On a read error the body holds whatever was read before it.
    #[inline]
    pub fn stream<C: WriteBuffer, R: io::Read>(
        &mut self,
        status: StatusCode,
        content_type: C,
        reader: R,
    ) -> io::Result<&mut Self> {
        self.status = status;
        self.body.clear();
        self.set_content_type(content_type);
        BodyWriter(&mut self.body).append_file_contents(reader)?;
        Ok(self)
    }

    /// Sets the status and replaces the headers with a single `Location`.
    #[inline]
    pub fn redirect<U: WriteBuffer>(&mut self, status: StatusCode, url: U) -> &mut Self {
        self.status = status;
        self.headers.clear();
        self.header("Location", url)
    }

    /// Sets only the status.
    #[inline]
    pub fn no_content(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    #[inline(always)]
    fn set_content_type<C: WriteBuffer>(&mut self, content_type: C) {
        self.headers.clear();
        self.header("Content-Type", content_type);
    }
}

impl Response {
    /// Serializes the response into its wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let body_len = match self.body.is_empty() {
            true => 0,
            false => self.body.len() + 2,
        };

        let status_line = self.status.status_line();
        let mut buffer = Vec::with_capacity(
            status_line.len() + self.headers.len() + body_len + 2 + 16 + NUMBER_LEN + 4,
        );

        buffer.extend_from_slice(status_line);
        if !self.headers.is_empty() {
            buffer.extend_from_slice(&self.headers);
            buffer.extend_from_slice(b"\r\n");
        }

        buffer.extend_from_slice(b"Content-Length: ");
        body_len.write_to(&mut buffer);
        buffer.extend_from_slice(b"\r\n\r\n");

        if body_len > 0 {
            buffer.extend_from_slice(&self.body);
            buffer.extend_from_slice(b"\r\n");
        }

        buffer
    }
}

const NUMBER_LEN: usize = 39;

#[inline]
const fn number_to_bytes(mut n: u128) -> ([u8; NUMBER_LEN], usize) {
    let mut buffer = [b'0'; NUMBER_LEN];
    let mut i = NUMBER_LEN;

    if n == 0 {
        return (buffer, NUMBER_LEN - 1);
    }

    while n > 0 {
        i -= 1;
        buffer[i] = b'0' + (n % 10) as u8;
        n /= 10;
    }

    (buffer, i)
}

pub mod write {
    use super::*;

    /// Writer for constructing the response body.
    /// Used in [html_with](Response::html_with).
    ///
    /// Also implements [std::io::Write], so `write!` works too.
    #[derive(Debug)]
    pub struct BodyWriter<'a>(pub(crate) &'a mut Vec<u8>);

    impl BodyWriter<'_> {
        /// Appends any [`WriteBuffer`] value.
        #[inline]
        pub fn write<T: WriteBuffer>(&mut self, value: T) {
            value.write_to(self.0);
        }

        #[inline]
        pub fn append_text(&mut self, text: &str) {
            self.0.extend_from_slice(text.as_bytes());
        }

        /// Appends the decimal representation of `value`.
        #[inline]
        pub fn append_int<I: Into<i128>>(&mut self, value: I) {
            impl_write_buffer_i128(value.into(), self.0);
        }

        /// Appends everything `reader` yields until EOF.
        /// Returns the number of bytes appended.
        #[inline]
        pub fn append_file_contents<R: io::Read>(&mut self, mut reader: R) -> io::Result<usize> {
            reader.read_to_end(self.0)
        }
    }

    impl io::Write for BodyWriter<'_> {
        #[inline]
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        #[inline]
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Trait for writing data to the [`Response`] buffers.
    ///
    /// Implemented for strings, bytes, booleans, chars and integers.
    /// Floating-point numbers are not implemented to avoid locale-dependent
    /// formatting in protocol headers.
    ///
    /// # Example
    /// ```
    /// use arena_web::WriteBuffer;
    ///
    /// struct MyString(String);
    ///
    /// impl WriteBuffer for MyString {
    ///     fn write_to(&self, buffer: &mut Vec<u8>) {
    ///         buffer.extend_from_slice(self.0.as_bytes())
    ///     }
    /// }
    /// ```
    pub trait WriteBuffer {
        /// Writes the value's representation directly to the buffer.
        fn write_to(&self, buffer: &mut Vec<u8>);
    }

    macro_rules! impl_write_buffer {
        (bytes, $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    let closure = $conn;
                    closure(self, buffer);
                }
            })*
        };
        (number($type:ty), $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    $conn(*self as $type, buffer);
                }
            })*
        };
    }

    impl<T: WriteBuffer + ?Sized> WriteBuffer for &T {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            T::write_to(*self, buffer);
        }
    }
    impl_write_buffer! {
        bytes, |value: &str, buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value.as_bytes());
        } => str, String, Box<str>, Cow<'_, str>, Arc<str>, Rc<str>
    }
    impl_write_buffer! {
        bytes, |value: &[u8], buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value);
        } => [u8], Vec<u8>, Box<[u8]>, Cow<'_, [u8]>, Arc<[u8]>, Rc<[u8]>
    }
    impl<const N: usize> WriteBuffer for [u8; N] {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self);
        }
    }
    impl_write_buffer! {
        number(u128), impl_write_buffer_u128 => u8, u16, u32, u64, u128, usize
    }
    impl_write_buffer! {
        number(i128), impl_write_buffer_i128 => i8, i16, i32, i64, i128, isize
    }
    impl WriteBuffer for bool {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(match self {
                true => b"true",
                false => b"false",
            });
        }
    }
    impl WriteBuffer for char {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            let mut buf = [0u8; 4];
            buffer.extend_from_slice(self.encode_utf8(&mut buf).as_bytes());
        }
    }

    #[inline(always)]
    fn impl_write_buffer_u128(value: u128, buffer: &mut Vec<u8>) {
        let (arr, start) = number_to_bytes(value);
        buffer.extend_from_slice(&arr[start..]);
    }

    #[inline(always)]
    fn impl_write_buffer_i128(value: i128, buffer: &mut Vec<u8>) {
        if value < 0 {
            buffer.push(b'-');
        }

        let (arr, start) = number_to_bytes(value.unsigned_abs());
        buffer.extend_from_slice(&arr[start..]);
    }
}
