use crate::{
    errors::ErrorKind,
    http::{
        multipart::{content_type_boundary, MultipartForm},
        pairs::Pairs,
        types::{slice_to_usize, to_lower_case, trim_ows},
    },
    limits::{ConnLimits, ReqLimits},
    server::connection::socket,
    Method,
};
use memchr::{memchr, memchr2, memchr3, memmem};
use std::{io, ops::Range};
use tokio::io::AsyncRead;

/// Parsed HTTP request borrowing from the connection's request arena.
///
/// Every field is a view into the one buffer the request was read into:
/// nothing is copied and nothing outlives the connection.
///
/// # Input data requirements
///
/// - `SP`: ASCII space (0x20)
/// - `CRLF`: exactly `"\r\n"`, a bare `LF` is an error
///
/// ```text
/// [METHOD] SP [PATH] SP [VERSION] CRLF
/// [HEADER NAME] ":" SP [HEADER VALUE] CRLF
/// ...
/// CRLF
/// [BODY]
/// ```
///
/// - `[METHOD]`: any token without `SP`/`CR`/`LF`. Only `GET` and `POST`
///   (case-sensitive) get special handling, see [`Method`].
/// - `[PATH]`: request target. A `#fragment` is discarded, a `?query`
///   is split off and, for `GET`, parsed into [`Request::query`].
/// - `[VERSION]`: kept as is, not validated.
/// - Header names are lowercased in place, values are not altered.
///   Folded header values are not supported.
/// - `[BODY]`: everything after the empty line. For `POST` it is decoded
///   according to `content-type`:
///   - absent or `application/x-www-form-urlencoded`: [`Request::form_values`]
///   - `multipart/form-data; boundary=X`: text fields in
///     [`Request::form_values`], files in [`Request::multipart`]
///   - anything else: raw [`Request::body`] only
///
/// # Examples
/// ```
/// use arena_web::{Method, Request};
///
/// let mut raw = b"GET /search?q=hi#frag HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec();
/// let req = Request::parse(&mut raw).unwrap();
///
/// assert_eq!(req.method(), Method::Get);
/// assert_eq!(req.path_str(), Some("/search"));
/// assert_eq!(req.query_param(b"q"), Some(&b"hi"[..]));
/// assert_eq!(req.header_str(b"HOST"), Some("localhost"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request<'buf> {
    method: Method<'buf>,
    path: &'buf [u8],
    version: &'buf [u8],
    headers: Pairs<'buf>,
    body: &'buf [u8],

    query: Pairs<'buf>,
    form_values: Pairs<'buf>,
    multipart: MultipartForm<'buf>,
}

impl<'buf> Request<'buf> {
    #[inline(always)]
    pub const fn method(&self) -> Method<'buf> {
        self.method
    }

    /// Request path without the query string and fragment.
    #[inline(always)]
    pub const fn path(&self) -> &'buf [u8] {
        self.path
    }

    #[inline]
    pub fn path_str(&self) -> Option<&'buf str> {
        simdutf8::basic::from_utf8(self.path).ok()
    }

    /// HTTP version token, e.g. `b"HTTP/1.1"`.
    #[inline(always)]
    pub const fn version(&self) -> &'buf [u8] {
        self.version
    }

    /// All headers in arrival order. Names are lowercase.
    #[inline(always)]
    pub const fn headers(&self) -> &Pairs<'buf> {
        &self.headers
    }

    /// Returns the first header value with case-insensitive name matching.
    /// Uses linear search.
    #[inline]
    pub fn header(&self, name: &[u8]) -> Option<&'buf [u8]> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    #[inline]
    pub fn header_str(&self, name: &[u8]) -> Option<&'buf str> {
        simdutf8::basic::from_utf8(self.header(name)?).ok()
    }

    /// Value of the `Content-Length` header, `None` if absent.
    ///
    /// A parsed request never carries a malformed or conflicting length.
    #[inline]
    pub fn content_length(&self) -> Option<usize> {
        slice_to_usize(trim_ows(self.header(b"content-length")?))
    }

    /// Raw bytes after the header section (possibly empty).
    #[inline(always)]
    pub const fn body(&self) -> &'buf [u8] {
        self.body
    }

    /// Query string parameters, only parsed for `GET`.
    #[inline(always)]
    pub const fn query(&self) -> &Pairs<'buf> {
        &self.query
    }

    #[inline]
    pub fn query_param(&self, key: &[u8]) -> Option<&'buf [u8]> {
        self.query.get(key)
    }

    /// Url-encoded form fields, or text fields of a multipart body.
    #[inline(always)]
    pub const fn form_values(&self) -> &Pairs<'buf> {
        &self.form_values
    }

    #[inline]
    pub fn form_value(&self, key: &[u8]) -> Option<&'buf [u8]> {
        self.form_values.get(key)
    }

    /// Files of a `multipart/form-data` body.
    #[inline(always)]
    pub const fn multipart(&self) -> &MultipartForm<'buf> {
        &self.multipart
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Method,
    Path,
    Version,
    HeaderKey,
    HeaderValue,
    Body,
}

/// Byte ranges found by the first pass, before the buffer is frozen.
#[derive(Debug, Default)]
struct Layout {
    method: Range<usize>,
    path: Range<usize>,
    version: Range<usize>,
    headers: Vec<(Range<usize>, Range<usize>)>,
    body: usize,
}

impl<'buf> Request<'buf> {
    /// Parses a complete request held in `buf`.
    ///
    /// Header names are lowercased in place, which is why the buffer is
    /// borrowed mutably. The returned request borrows it for its whole life.
    pub fn parse(buf: &'buf mut [u8]) -> Result<Self, ErrorKind> {
        let layout = scan(buf)?;
        let buf: &'buf [u8] = buf;

        let mut path = &buf[layout.path];
        if let Some(hash) = memchr(b'#', path) {
            path = &path[..hash];
        }
        let mut query_string: &[u8] = b"";
        if let Some(question) = memchr(b'?', path) {
            query_string = &path[question + 1..];
            path = &path[..question];
        }

        let mut headers = Pairs::new();
        for (key, value) in layout.headers {
            headers.push(&buf[key], &buf[value]);
        }
        single_length(
            headers
                .iter()
                .filter(|(key, _)| *key == b"content-length")
                .map(|(_, value)| value),
        )?;

        let mut request = Request {
            method: Method::from_bytes(&buf[layout.method]),
            path,
            version: &buf[layout.version],
            headers,
            body: &buf[layout.body..],

            query: Pairs::new(),
            form_values: Pairs::new(),
            multipart: MultipartForm::default(),
        };

        match request.method {
            Method::Get if !query_string.is_empty() => {
                request.query = Pairs::form(query_string);
            }
            Method::Post => request.decode_body()?,
            _ => {}
        }

        log::trace!(
            "Parsed {} {:?}: {} headers, {} body bytes",
            String::from_utf8_lossy(request.method.as_bytes()),
            String::from_utf8_lossy(request.path),
            request.headers.len(),
            request.body.len(),
        );

        Ok(request)
    }

    fn decode_body(&mut self) -> Result<(), ErrorKind> {
        let Some(content_type) = self.headers.get(b"content-type") else {
            self.form_values = Pairs::form(self.body);
            return Ok(());
        };

        let media_type = trim_ows(match memchr(b';', content_type) {
            Some(semicolon) => &content_type[..semicolon],
            None => content_type,
        });

        if media_type.eq_ignore_ascii_case(b"application/x-www-form-urlencoded") {
            self.form_values = Pairs::form(self.body);
        } else if media_type.eq_ignore_ascii_case(b"multipart/form-data") {
            let boundary = content_type_boundary(content_type).ok_or(ErrorKind::InvalidMultipart)?;
            self.multipart = MultipartForm::parse(self.body, boundary, &mut self.form_values);
        }

        Ok(())
    }
}

/// First pass: walks the states over `buf` and lowercases header names.
fn scan(buf: &mut [u8]) -> Result<Layout, ErrorKind> {
    let mut layout = Layout::default();
    let mut state = State::Method;
    let mut pos = 0;
    let mut key = 0..0;

    while state != State::Body {
        let rest = &buf[pos..];

        state = match state {
            State::Method | State::Path => {
                let end = match memchr3(b' ', b'\r', b'\n', rest) {
                    Some(end) if rest[end] == b' ' && end > 0 => pos + end,
                    _ => return Err(ErrorKind::InvalidRequestLine),
                };

                if state == State::Method {
                    layout.method = pos..end;
                    pos = end + 1;
                    State::Path
                } else {
                    layout.path = pos..end;
                    pos = end + 1;
                    State::Version
                }
            }
            State::Version => {
                let end = match memchr2(b'\r', b'\n', rest) {
                    Some(end) if end > 0 && rest[end..].starts_with(b"\r\n") => pos + end,
                    _ => return Err(ErrorKind::InvalidRequestLine),
                };

                layout.version = pos..end;
                pos = end + 2;
                after_line(buf, &mut pos)
            }
            State::HeaderKey => {
                let colon = match memchr3(b':', b'\r', b'\n', rest) {
                    Some(colon) if rest[colon..].starts_with(b": ") => pos + colon,
                    _ => return Err(ErrorKind::InvalidHeader),
                };

                to_lower_case(&mut buf[pos..colon]);
                key = pos..colon;
                pos = colon + 2;
                State::HeaderValue
            }
            State::HeaderValue => {
                let end = match memchr2(b'\r', b'\n', rest) {
                    Some(end) if rest[end..].starts_with(b"\r\n") => pos + end,
                    _ => return Err(ErrorKind::InvalidHeader),
                };

                layout.headers.push((key.clone(), pos..end));
                pos = end + 2;
                after_line(buf, &mut pos)
            }
            State::Body => State::Body,
        };

        if pos >= buf.len() && state != State::Body {
            return Err(match state {
                State::Method | State::Path | State::Version => ErrorKind::InvalidRequestLine,
                _ => ErrorKind::InvalidHeader,
            });
        }
    }

    layout.body = pos;
    Ok(layout)
}

/// An empty line ends the header section.
#[inline(always)]
fn after_line(buf: &[u8], pos: &mut usize) -> State {
    match buf[*pos..].starts_with(b"\r\n") {
        true => {
            *pos += 2;
            State::Body
        }
        false => State::HeaderKey,
    }
}

// Byte accumulation

/// A request read from the socket.
#[derive(Debug)]
pub(crate) struct Accumulated {
    /// Every byte of the request that was read.
    pub(crate) arena: Vec<u8>,
    /// Body length still to be read after an interim `100 Continue`.
    pub(crate) deferred_body: Option<usize>,
}

/// Reads one complete request into a fresh arena.
///
/// The header section must arrive in the first read. With a
/// `Content-Length` reading stops once exactly that many body bytes are
/// buffered, without one it stops at the first read that does not fill the
/// staging buffer.
pub(crate) async fn read_request<R: AsyncRead + Unpin + ?Sized>(
    stream: &mut R,
    conn_limits: &ConnLimits,
    req_limits: &ReqLimits,
) -> Result<Accumulated, ErrorKind> {
    let mut staging = vec![0; conn_limits.staging_buffer_size.max(1)];
    let mut arena = Vec::new();
    let timeout = conn_limits.socket_read_timeout;
    let max = req_limits.max_request_size;

    let mut last = socket::read_chunk(stream, &mut staging, timeout).await?;
    if last == 0 {
        return Err(ErrorKind::EmptyRequest);
    }
    append(&mut arena, &staging[..last], max)?;

    let head_len = memmem::find(&arena, b"\r\n\r\n")
        .map(|end| end + 4)
        .ok_or(ErrorKind::HeaderTooLarge)?;
    let head = &arena[..head_len];

    let content_length = find_content_length(head)?;
    let expects_continue = find_header(head, b"expect")
        .is_some_and(|value| trim_ows(value).eq_ignore_ascii_case(b"100-continue"));

    match content_length {
        Some(len) => {
            let total = head_len.checked_add(len).ok_or(ErrorKind::RequestTooLarge)?;
            if total > max {
                return Err(ErrorKind::RequestTooLarge);
            }

            if expects_continue && arena.len() == head_len && len > 0 {
                log::trace!("Deferring {} body bytes until 100 Continue", len);
                return Ok(Accumulated {
                    arena,
                    deferred_body: Some(len),
                });
            }

            while arena.len() < total {
                last = socket::read_chunk(stream, &mut staging, timeout).await?;
                if last == 0 {
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
                }
                append(&mut arena, &staging[..last], max)?;
            }

            if arena.len() > total {
                return Err(ErrorKind::BodyMismatch {
                    expected: total,
                    available: arena.len(),
                });
            }
        }
        None if expects_continue => return Err(ErrorKind::LengthRequired),
        None => {
            while last == staging.len() {
                last = socket::read_chunk(stream, &mut staging, timeout).await?;
                append(&mut arena, &staging[..last], max)?;
            }

            if arena.len() > head_len && arena.starts_with(b"POST ") {
                return Err(ErrorKind::LengthRequired);
            }
        }
    }

    Ok(Accumulated {
        arena,
        deferred_body: None,
    })
}

#[inline]
fn append(arena: &mut Vec<u8>, chunk: &[u8], max: usize) -> Result<(), ErrorKind> {
    if arena.len() + chunk.len() > max {
        return Err(ErrorKind::RequestTooLarge);
    }

    arena
        .try_reserve(chunk.len())
        .map_err(|_| ErrorKind::RequestTooLarge)?;
    arena.extend_from_slice(chunk);
    Ok(())
}

/// Case-insensitive lookup of a header in a raw, not yet parsed header section.
#[inline]
fn find_header<'a>(head: &'a [u8], name: &'a [u8]) -> Option<&'a [u8]> {
    header_values(head, name).next()
}

/// Values of every `name` line of a raw header section, in order.
fn header_values<'a>(head: &'a [u8], name: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
    let line_start = memmem::find(head, b"\r\n").map_or(head.len(), |end| end + 2);

    head[line_start..]
        .split(|&byte| byte == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter_map(move |line| {
            let colon = memchr(b':', line)?;
            match line[..colon].eq_ignore_ascii_case(name) {
                true => Some(&line[colon + 1..]),
                false => None,
            }
        })
}

#[inline]
fn find_content_length(head: &[u8]) -> Result<Option<usize>, ErrorKind> {
    single_length(header_values(head, b"content-length"))
}

/// Folds repeated `Content-Length` values into one.
///
/// Every value must be a plain decimal number and all of them must agree,
/// otherwise the body boundary is ambiguous.
fn single_length<'a, I: Iterator<Item = &'a [u8]>>(values: I) -> Result<Option<usize>, ErrorKind> {
    let mut result = None;

    for value in values {
        let len = slice_to_usize(trim_ows(value)).ok_or(ErrorKind::InvalidContentLength)?;
        match result {
            Some(previous) if previous != len => {
                log::debug!("Conflicting Content-Length values: {} and {}", previous, len);
                return Err(ErrorKind::InvalidContentLength);
            }
            _ => result = Some(len),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    type Parsed<'a> = (&'a str, &'a str, Vec<(&'a str, &'a str)>, &'a str);

    fn short(req: &Request<'_>) -> (String, String, Vec<(String, String)>, String) {
        (
            str_op(req.method().as_bytes()).to_owned(),
            str_op(req.path()).to_owned(),
            req.headers()
                .iter()
                .map(|(k, v)| (str_op(k).to_owned(), str_op(v).to_owned()))
                .collect(),
            str_op(req.body()).to_owned(),
        )
    }

    fn check(raw: &str, expected: Result<Parsed<'_>, ErrorKind>) {
        let mut buf = raw.as_bytes().to_vec();
        let result = Request::parse(&mut buf).map(|req| short(&req));

        let expected = expected.map(|(method, path, headers, body)| {
            (
                method.to_owned(),
                path.to_owned(),
                headers
                    .into_iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect(),
                body.to_owned(),
            )
        });
        assert_eq!(result, expected, "{raw:?}");
    }

    #[test]
    fn parse_valid_request() {
        #[rustfmt::skip]
        let cases = vec![
            ("GET / HTTP/1.1\r\n\r\n", ("GET", "/", vec![], "")),
            (
                "GET /api/qwe/name HTTP/1.1\r\nHOST: 127.0.0.1\r\n\r\n",
                ("GET", "/api/qwe/name", vec![("host", "127.0.0.1")], ""),
            ),
            (
                "PUT /qwe HTTP/1.1\r\nHoSt: 127.0.0.1\r\nUser-Agent: curl\r\n\r\n",
                ("PUT", "/qwe", vec![("host", "127.0.0.1"), ("user-agent", "curl")], ""),
            ),
            (
                "GET /file HTTP/1.1\r\ncontent-length: 12\r\n\r\nHello world!",
                ("GET", "/file", vec![("content-length", "12")], "Hello world!"),
            ),
            (
                "DELETE /x HTTP/1.0\r\nX-Value: MiXeD Case \r\n\r\n",
                ("DELETE", "/x", vec![("x-value", "MiXeD Case ")], ""),
            ),
            (
                "GET /search?q=hi#frag HTTP/1.1\r\n\r\n",
                ("GET", "/search", vec![], ""),
            ),
            (
                "GET /a#b?c=d HTTP/1.1\r\n\r\n",
                ("GET", "/a", vec![], ""),
            ),
            (
                "OPTIONS * HTTP/1.1\r\nEmpty: \r\n\r\n",
                ("OPTIONS", "*", vec![("empty", "")], ""),
            ),
        ];

        for (raw, expected) in cases {
            check(raw, Ok(expected));
        }
    }

    #[test]
    fn parse_invalid_request() {
        #[rustfmt::skip]
        let cases = [
            ("", ErrorKind::InvalidRequestLine),
            ("GET", ErrorKind::InvalidRequestLine),
            ("GET ", ErrorKind::InvalidRequestLine),
            (" GET / HTTP/1.1\r\n\r\n", ErrorKind::InvalidRequestLine),
            ("GET  HTTP/1.1\r\n\r\n", ErrorKind::InvalidRequestLine),
            ("GET /\r\n\r\n", ErrorKind::InvalidRequestLine),
            ("GET / HTTP/1.1\n\n", ErrorKind::InvalidRequestLine),
            ("GET / HTTP/1.1\r\r\n\r\n", ErrorKind::InvalidRequestLine),
            ("GET / \r\n\r\n", ErrorKind::InvalidRequestLine),
            ("GET / HTTP/1.1\r\n", ErrorKind::InvalidHeader),
            ("GET / HTTP/1.1\r\nHost: a\r\n", ErrorKind::InvalidHeader),
            ("GET / HTTP/1.1\r\nHost:a\r\n\r\n", ErrorKind::InvalidHeader),
            ("GET / HTTP/1.1\r\nHost a\r\n\r\n", ErrorKind::InvalidHeader),
            ("GET / HTTP/1.1\r\nHost\r\n: a\r\n\r\n", ErrorKind::InvalidHeader),
            ("GET / HTTP/1.1\r\nHost: a\n\r\n", ErrorKind::InvalidHeader),
            ("GET / HTTP/1.1\r\nHost: a", ErrorKind::InvalidHeader),
            ("POST / HTTP/1.1\r\nContent-Length: 1\r\ncontent-length: 2\r\n\r\na", ErrorKind::InvalidContentLength),
            ("POST / HTTP/1.1\r\nContent-Length: one\r\n\r\n", ErrorKind::InvalidContentLength),
        ];

        for (raw, error) in cases {
            check(raw, Err(error));
        }
    }

    #[test]
    fn header_case_insensitive() {
        let mut first = b"GET / HTTP/1.1\r\nContent-Type: text/plain\r\n\r\n".to_vec();
        let mut second = b"GET / HTTP/1.1\r\ncontent-type: text/plain\r\n\r\n".to_vec();
        let first = Request::parse(&mut first).unwrap();
        let second = Request::parse(&mut second).unwrap();

        for name in [&b"content-type"[..], b"Content-Type", b"CONTENT-TYPE"] {
            assert_eq!(str(first.header(name)), Some("text/plain"));
            assert_eq!(first.header(name), second.header(name));
        }
        assert_eq!(first.header_str(b"missing"), None);
    }

    #[test]
    fn query_parameters() {
        #[rustfmt::skip]
        let cases: [(&str, &str, &[(&str, &str)]); 6] = [
            ("GET /search?q=hi#frag HTTP/1.1\r\n\r\n", "/search", &[("q", "hi")]),
            ("GET /?a=1&b=2&c HTTP/1.1\r\n\r\n", "/", &[("a", "1"), ("b", "2"), ("c", "")]),
            ("GET /? HTTP/1.1\r\n\r\n", "/", &[]),
            ("GET /#?a=1 HTTP/1.1\r\n\r\n", "/", &[]),
            // Only GET parses the query string
            ("DELETE /item?id=7 HTTP/1.1\r\n\r\n", "/item", &[]),
            ("POST /item?id=7 HTTP/1.1\r\nContent-Length: 0\r\n\r\n", "/item", &[]),
        ];

        for (raw, path, expected) in cases {
            let mut buf = raw.as_bytes().to_vec();
            let req = Request::parse(&mut buf).unwrap();

            assert_eq!(req.path_str(), Some(path));
            assert_eq!(req.query().iter().map(str_2).collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn form_body() {
        #[rustfmt::skip]
        let cases: [(&str, &[(&str, &str)]); 5] = [
            ("POST / HTTP/1.1\r\nContent-Length: 7\r\n\r\na=1&b=2", &[("a", "1"), ("b", "2")]),
            ("POST / HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nx=y", &[("x", "y")]),
            ("POST / HTTP/1.1\r\ncontent-type: Application/X-WWW-Form-Urlencoded; charset=utf-8\r\n\r\nx", &[("x", "")]),
            ("POST / HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"a\":1}", &[]),
            ("GET / HTTP/1.1\r\n\r\na=1", &[]),
        ];

        for (raw, expected) in cases {
            let mut buf = raw.as_bytes().to_vec();
            let req = Request::parse(&mut buf).unwrap();

            assert_eq!(req.form_values().iter().map(str_2).collect::<Vec<_>>(), expected, "{raw:?}");
        }

        let mut buf = b"POST / HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{}".to_vec();
        let req = Request::parse(&mut buf).unwrap();
        assert_eq!(req.body(), b"{}");
        assert_eq!(req.form_value(b"{}"), None);
    }

    #[test]
    fn multipart_body() {
        let mut buf = b"POST /upload HTTP/1.1\r\n\
            Content-Type: multipart/form-data; boundary=XYZ\r\n\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"foo\"\r\n\r\n\
            bar\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"files\"; filename=\"a.txt\"\r\n\r\n\
            hello\r\n\
            --XYZ--\r\n"
            .to_vec();
        let req = Request::parse(&mut buf).unwrap();

        assert_eq!(str(req.form_value(b"foo")), Some("bar"));
        let files: Vec<_> = req.multipart().get(b"files").unwrap().iter().map(str_2).collect();
        assert_eq!(files, [("a.txt", "hello")]);

        let mut buf = b"POST /upload HTTP/1.1\r\n\
            Content-Type: multipart/form-data; charset=utf-8; boundary=XYZ\r\n\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"foo\"\r\n\r\n\
            bar\r\n\
            --XYZ--\r\n"
            .to_vec();
        let req = Request::parse(&mut buf).unwrap();
        assert_eq!(str(req.form_value(b"foo")), Some("bar"));

        for content_type in [
            "multipart/form-data",
            "multipart/form-data;boundary=XYZ",
            "multipart/form-data; foo=XYZ",
            "multipart/form-data; boundary",
        ] {
            let raw = format!("POST / HTTP/1.1\r\nContent-Type: {content_type}\r\n\r\n--XYZ--");
            let mut buf = raw.into_bytes();
            assert_eq!(Request::parse(&mut buf), Err(ErrorKind::InvalidMultipart));
        }
    }

    #[test]
    fn idempotent() {
        let raw = b"POST /p?x=1 HTTP/1.1\r\nHost: A\r\nContent-Length: 3\r\n\r\na=b".to_vec();
        let (mut first, mut second) = (raw.clone(), raw);

        assert_eq!(Request::parse(&mut first), Request::parse(&mut second));
    }

    #[test]
    fn utf8_views() {
        let mut buf = b"GET /\xff HTTP/1.1\r\nX-Bin: \xfe\r\n\r\n".to_vec();
        let req = Request::parse(&mut buf).unwrap();

        assert_eq!(req.path(), b"/\xff");
        assert_eq!(req.path_str(), None);
        assert_eq!(req.header_str(b"x-bin"), None);
        assert_eq!(req.version(), b"HTTP/1.1");
    }

    #[test]
    fn raw_header_lookup() {
        let head = b"POST / HTTP/1.1\r\nHost: a\r\nCONTENT-LENGTH:  42 \r\nExpect: 100-continue\r\n\r\n";

        assert_eq!(find_content_length(head), Ok(Some(42)));
        assert_eq!(str(find_header(head, b"expect")), Some(" 100-continue"));
        assert_eq!(find_header(head, b"content-type"), None);

        // The request line is never a header
        assert_eq!(find_header(b"content-length: 1\r\n\r\n", b"content-length"), None);

        #[rustfmt::skip]
        let cases: [(&[u8], Result<Option<usize>, ErrorKind>); 6] = [
            (b"GET / HTTP/1.1\r\n\r\n", Ok(None)),
            (b"GET / HTTP/1.1\r\nContent-Length: 0\r\n\r\n", Ok(Some(0))),
            (b"GET / HTTP/1.1\r\nContent-Length: 3\r\ncontent-length: 3\r\n\r\n", Ok(Some(3))),
            (b"GET / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 10\r\n\r\n", Err(ErrorKind::InvalidContentLength)),
            (b"GET / HTTP/1.1\r\nContent-Length: 1x\r\n\r\n", Err(ErrorKind::InvalidContentLength)),
            (b"GET / HTTP/1.1\r\nContent-Length: -1\r\n\r\n", Err(ErrorKind::InvalidContentLength)),
        ];

        for (head, expected) in cases {
            assert_eq!(find_content_length(head), expected);
        }
    }

    async fn read(raw: &[u8], staging: usize, max: usize) -> Result<Accumulated, ErrorKind> {
        let conn_limits = ConnLimits {
            staging_buffer_size: staging,
            ..ConnLimits::default()
        };
        let req_limits = ReqLimits {
            max_request_size: max,
            ..ReqLimits::default()
        };

        let mut stream = raw;
        read_request(&mut stream, &conn_limits, &req_limits).await
    }

    #[tokio::test]
    async fn accumulate() {
        #[rustfmt::skip]
        let cases: [(&[u8], usize); 5] = [
            (b"GET / HTTP/1.1\r\n\r\n", 4096),
            (b"GET / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello", 4096),
            // Body arrives over several reads
            (b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123456789", 40),
            (b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123456789", 41),
            // No Content-Length: reads continue while they fill the staging buffer
            (b"GET / HTTP/1.1\r\n\r\nabcdef", 18),
        ];

        for (raw, staging) in cases {
            let result = read(raw, staging, usize::MAX).await.unwrap();

            assert_eq!(str_op(&result.arena), str_op(raw));
            assert_eq!(result.deferred_body, None);
        }
    }

    #[tokio::test]
    async fn accumulate_errors() {
        #[rustfmt::skip]
        let cases: [(&[u8], usize, usize, ErrorKind); 9] = [
            (b"", 4096, 1024, ErrorKind::EmptyRequest),
            (
                b"POST / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 10\r\n\r\nabc", 4096, 1024,
                ErrorKind::InvalidContentLength,
            ),
            (b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n", 16, 1024, ErrorKind::HeaderTooLarge),
            (b"GET / HTTP/1.1\r\nContent-Length: x\r\n\r\n", 4096, 1024, ErrorKind::InvalidContentLength),
            (
                b"POST / HTTP/1.1\r\nContent-Length: 2\r\n\r\nabc", 4096, 1024,
                ErrorKind::BodyMismatch { expected: 40, available: 41 },
            ),
            (b"POST / HTTP/1.1\r\n\r\na=1", 4096, 1024, ErrorKind::LengthRequired),
            (b"POST / HTTP/1.1\r\nExpect: 100-continue\r\n\r\n", 4096, 1024, ErrorKind::LengthRequired),
            (b"POST / HTTP/1.1\r\nContent-Length: 100\r\n\r\n", 4096, 64, ErrorKind::RequestTooLarge),
            (b"GET / HTTP/1.1\r\n\r\n", 4096, 8, ErrorKind::RequestTooLarge),
        ];

        for (raw, staging, max, error) in cases {
            assert_eq!(read(raw, staging, max).await.unwrap_err(), error, "{:?}", str_op(raw));
        }
    }

    #[tokio::test]
    async fn accumulate_early_eof() {
        let result = read(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc", 4096, 1024).await;

        assert_eq!(
            result.unwrap_err(),
            ErrorKind::from(io::Error::from(io::ErrorKind::UnexpectedEof))
        );
    }

    #[tokio::test]
    async fn accumulate_expect_continue() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 3\r\nExpect: 100-Continue\r\n\r\n";
        let result = read(raw, 4096, 1024).await.unwrap();

        assert_eq!(result.arena, raw);
        assert_eq!(result.deferred_body, Some(3));

        // A client that sends the body anyway is read as usual
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 3\r\nExpect: 100-continue\r\n\r\nabc";
        let result = read(raw, 4096, 1024).await.unwrap();

        assert_eq!(result.arena, raw);
        assert_eq!(result.deferred_body, None);
    }
}
