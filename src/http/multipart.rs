//! `multipart/form-data` body parser.
//!
//! Parts without a `filename` become plain form values, parts with one are
//! grouped by field name into [`FormFile`]s. Nothing is copied, names and
//! contents borrow from the request body.

use crate::http::{pairs::Pairs, types::trim_ows};
use memchr::{memchr, memmem};

const CONTENT_DISPOSITION: &[u8] = b"Content-Disposition: form-data; name=\"";
const FILENAME: &[u8] = b"; filename=\"";

/// Files uploaded under one form field name.
///
/// A field may carry several files (`<input type="file" multiple>`), each
/// stored as a `(filename, content)` pair in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFile<'a> {
    files: Pairs<'a>,
}

impl<'a> FormFile<'a> {
    /// Iterates over `(filename, content)` pairs.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + '_ {
        self.files.iter()
    }

    /// Content of the first file named `filename`.
    #[inline]
    pub fn get(&self, filename: &[u8]) -> Option<&'a [u8]> {
        self.files.get(filename)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Parsed `multipart/form-data` body.
///
/// # Examples
/// ```rust
/// use arena_web::{MultipartForm, Pairs};
///
/// let body = b"--XYZ\r\n\
///     Content-Disposition: form-data; name=\"foo\"\r\n\r\n\
///     bar\r\n\
///     --XYZ\r\n\
///     Content-Disposition: form-data; name=\"files\"; filename=\"a.txt\"\r\n\
///     Content-Type: text/plain\r\n\r\n\
///     hello\r\n\
///     --XYZ--\r\n";
///
/// let mut values = Pairs::new();
/// let form = MultipartForm::parse(body, b"XYZ", &mut values);
///
/// assert_eq!(values.get(b"foo"), Some(&b"bar"[..]));
///
/// let files = form.get(b"files").unwrap();
/// assert_eq!(files.iter().collect::<Vec<_>>(), [(&b"a.txt"[..], &b"hello"[..])]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm<'a> {
    boundary: &'a [u8],
    fields: Vec<(&'a [u8], FormFile<'a>)>,
}

impl<'a> MultipartForm<'a> {
    /// Parses `body` delimited by `boundary`.
    ///
    /// Parsing is best-effort: a malformed part stops it, and everything
    /// emitted before that point is kept. A part's content ends only at
    /// `\r\n--<boundary>` followed by `\r\n` or `--`. Any other `\r\n--`
    /// is treated as content.
    pub fn parse(body: &'a [u8], boundary: &'a [u8], form_values: &mut Pairs<'a>) -> Self {
        let mut form = MultipartForm {
            boundary,
            fields: Vec::new(),
        };

        let dash_dash = memmem::Finder::new(b"--");
        let part_end = memmem::Finder::new(b"\r\n--");
        let mut pos = 0;

        while pos < body.len() {
            let Some(idx) = dash_dash.find(&body[pos..]) else {
                break;
            };
            pos += idx + 2;

            if !body[pos..].starts_with(boundary) {
                continue;
            }
            pos += boundary.len();

            let rest = &body[pos..];
            if rest.starts_with(b"--") {
                log::trace!("Multipart: closing boundary");
                break;
            }
            if !rest.starts_with(b"\r\n") {
                log::debug!("Multipart: boundary is not followed by CRLF");
                break;
            }
            pos += 2;

            let line_end = memmem::find(&body[pos..], b"\r\n").map_or(body.len(), |i| pos + i);
            let Some((name, filename)) = parse_disposition(&body[pos..line_end]) else {
                log::debug!("Multipart: malformed Content-Disposition");
                break;
            };

            let Some(headers_len) = memmem::find(&body[pos..], b"\r\n\r\n") else {
                log::debug!("Multipart: part headers are not terminated");
                break;
            };
            let content_start = pos + headers_len + 4;

            let mut search = content_start;
            let content_end = loop {
                let Some(idx) = part_end.find(&body[search..]) else {
                    break None;
                };
                let candidate = search + idx;
                if is_delimiter(&body[candidate..], boundary) {
                    break Some(candidate);
                }
                search = candidate + 4;
            };
            let Some(content_end) = content_end else {
                log::debug!("Multipart: part content is not terminated");
                break;
            };

            let content = &body[content_start..content_end];
            match filename {
                Some(filename) => {
                    log::trace!("Multipart: file {:?}", String::from_utf8_lossy(name));
                    form.append_file(name, filename, content);
                }
                None => {
                    log::trace!("Multipart: value {:?}", String::from_utf8_lossy(name));
                    form_values.push(name, content);
                }
            }

            // Re-examined as `--<boundary>` on the next iteration.
            pos = content_end + 2;
        }

        form
    }

    fn append_file(&mut self, name: &'a [u8], filename: &'a [u8], content: &'a [u8]) {
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, file)) => file.files.push(filename, content),
            None => {
                let mut file = FormFile::default();
                file.files.push(filename, content);
                self.fields.push((name, file));
            }
        }
    }

    /// Files uploaded under the field `name`.
    #[inline]
    pub fn get(&self, name: &[u8]) -> Option<&FormFile<'a>> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, file)| file)
    }

    #[inline]
    pub fn boundary(&self) -> &'a [u8] {
        self.boundary
    }

    /// Iterates over `(field name, files)` in the order fields first appeared.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&'a [u8], &FormFile<'a>)> + '_ {
        self.fields.iter().map(|(name, file)| (*name, file))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Extracts the `boundary` parameter from a `multipart/form-data` value.
///
/// Parameters are matched by name, case-insensitively, so
/// `multipart/form-data; charset=utf-8; boundary=XYZ` yields `XYZ`.
/// Returns `None` when the media type is not followed by `; `, when there
/// is no `boundary` parameter or when it is empty. Surrounding double
/// quotes are removed.
pub fn content_type_boundary(content_type: &[u8]) -> Option<&[u8]> {
    let semicolon = memchr(b';', content_type)?;
    if !content_type[semicolon..].starts_with(b"; ") {
        return None;
    }

    content_type[semicolon + 1..]
        .split(|&byte| byte == b';')
        .find_map(|param| {
            let param = trim_ows(param);
            let equal = memchr(b'=', param)?;

            match trim_ows(&param[..equal]).eq_ignore_ascii_case(b"boundary") {
                true => Some(trim_ows(&param[equal + 1..])),
                false => None,
            }
        })
        .map(|boundary| match boundary {
            [b'"', inner @ .., b'"'] => inner,
            other => other,
        })
        .filter(|boundary| !boundary.is_empty())
}

/// `name` and optional `filename` of a `Content-Disposition` line.
fn parse_disposition(line: &[u8]) -> Option<(&[u8], Option<&[u8]>)> {
    let start = memmem::find(line, CONTENT_DISPOSITION)? + CONTENT_DISPOSITION.len();
    let line = &line[start..];

    let quote = memchr(b'"', line)?;
    let name = &line[..quote];
    let rest = &line[quote + 1..];

    if rest.is_empty() {
        return Some((name, None));
    }

    let rest = rest.strip_prefix(FILENAME)?;
    let quote = memchr(b'"', rest)?;

    match rest[quote + 1..].is_empty() {
        true => Some((name, Some(&rest[..quote]))),
        false => None,
    }
}

/// `\r\n--<boundary>` followed by `\r\n` or `--`.
#[inline]
fn is_delimiter(src: &[u8], boundary: &[u8]) -> bool {
    let Some(rest) = src.strip_prefix(b"\r\n--") else {
        return false;
    };
    let Some(rest) = rest.strip_prefix(boundary) else {
        return false;
    };

    rest.starts_with(b"\r\n") || rest.starts_with(b"--")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    fn parse(body: &[u8]) -> (MultipartForm<'_>, Pairs<'_>) {
        let mut values = Pairs::new();
        let form = MultipartForm::parse(body, b"XYZ", &mut values);
        (form, values)
    }

    fn files<'a>(form: &MultipartForm<'a>, name: &str) -> Vec<(&'a str, &'a str)> {
        form.get(name.as_bytes())
            .map(|file| file.iter().map(str_2).collect())
            .unwrap_or_default()
    }

    #[test]
    fn value_and_file() {
        let body = b"--XYZ\r\n\
            Content-Disposition: form-data; name=\"foo\"\r\n\r\n\
            bar\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"files\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            hello\r\n\
            --XYZ--\r\n";
        let (form, values) = parse(body);

        assert_eq!(values.iter().map(str_2).collect::<Vec<_>>(), [("foo", "bar")]);
        assert_eq!(form.len(), 1);
        assert_eq!(files(&form, "files"), [("a.txt", "hello")]);
        assert_eq!(str_op(form.boundary()), "XYZ");
    }

    #[test]
    fn multiple_files_per_field() {
        let body = b"preamble\r\n--XYZ\r\n\
            Content-Disposition: form-data; name=\"docs\"; filename=\"a.txt\"\r\n\r\n\
            one\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"other\"; filename=\"\"\r\n\r\n\
            \r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"docs\"; filename=\"b.txt\"\r\n\r\n\
            two\r\n\
            --XYZ--";
        let (form, values) = parse(body);

        assert!(values.is_empty());
        assert_eq!(form.len(), 2);
        assert_eq!(files(&form, "docs"), [("a.txt", "one"), ("b.txt", "two")]);
        assert_eq!(files(&form, "other"), [("", "")]);

        let names: Vec<_> = form.iter().map(|(name, _)| str_op(name)).collect();
        assert_eq!(names, ["docs", "other"]);
    }

    #[test]
    fn dashes_inside_content() {
        let body = b"--XYZ\r\n\
            Content-Disposition: form-data; name=\"bin\"; filename=\"x.bin\"\r\n\r\n\
            a\r\n--XY\r\n--XYZabc\r\n-- end\r\n\
            --XYZ--\r\n";
        let (form, _) = parse(body);

        assert_eq!(files(&form, "bin"), [("x.bin", "a\r\n--XY\r\n--XYZabc\r\n-- end")]);
    }

    #[test]
    fn best_effort() {
        #[rustfmt::skip]
        let cases: [(&[u8], &[(&str, &str)]); 7] = [
            // no delimiter at all
            (b"just some text", &[]),
            (b"", &[]),
            // boundary not followed by CRLF
            (b"--XYZ  \r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--XYZ--", &[]),
            // unterminated second part is dropped
            (b"--XYZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--XYZ\r\nContent-Disposition: form-data; name=\"b\"\r\n\r\n2", &[("a", "1")]),
            // missing disposition
            (b"--XYZ\r\nContent-Type: text/plain\r\n\r\n1\r\n--XYZ--", &[]),
            // trailing garbage after the name
            (b"--XYZ\r\nContent-Disposition: form-data; name=\"a\" x\r\n\r\n1\r\n--XYZ--", &[]),
            // part headers never end
            (b"--XYZ\r\nContent-Disposition: form-data; name=\"a\"\r\n", &[]),
        ];

        for (body, expected) in cases {
            let (form, values) = parse(body);

            assert!(form.is_empty());
            assert_eq!(values.iter().map(str_2).collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn boundary_from_content_type() {
        #[rustfmt::skip]
        let cases: [(&str, Option<&str>); 12] = [
            ("multipart/form-data; boundary=XYZ", Some("XYZ")),
            ("multipart/form-data; boundary=\"a b\"", Some("a b")),
            ("multipart/form-data; boundary=----WebKitFormBoundary7MA4", Some("----WebKitFormBoundary7MA4")),
            ("multipart/form-data;boundary=XYZ", None),
            ("multipart/form-data; charset=utf-8; boundary=XYZ", Some("XYZ")),
            ("multipart/form-data; Boundary=XYZ; charset=utf-8", Some("XYZ")),
            ("multipart/form-data; foo=XYZ", None),
            ("multipart/form-data; myboundary=XYZ", None),
            ("multipart/form-data; boundary=\"\"", None),
            ("multipart/form-data; boundary", None),
            ("multipart/form-data", None),
            ("multipart/form-data; boundary=", None),
        ];

        for (value, expected) in cases {
            assert_eq!(content_type_boundary(value.as_bytes()).map(str_op), expected, "{value}");
        }
    }
}
