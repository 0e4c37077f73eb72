//! Zero-copy key/value list and the delimiter-driven pairs parser.
//!
//! Used for request headers, query strings and
//! `application/x-www-form-urlencoded` bodies.

use memchr::{memchr, memchr2, memchr3};

/// Ordered list of `(key, value)` byte slices.
///
/// Insertion order is preserved and keys are not required to be unique:
/// lookups scan linearly and the first match wins. Every slice borrows
/// from the buffer the pairs were parsed from.
///
/// Values are kept raw, **no percent-decoding is performed** (`%20`, `+`, etc.).
///
/// # Examples
/// ```rust
/// use arena_web::Pairs;
///
/// let pairs = Pairs::form(b"debug&name=&=Qwe&key=sda&key=dup");
///
/// assert_eq!(pairs.len(), 5);
/// assert_eq!(pairs.get(b"debug"), Some(&b""[..]));
/// assert_eq!(pairs.get(b""), Some(&b"Qwe"[..]));
/// assert_eq!(pairs.get_str(b"key"), Some("sda"));
/// assert_eq!(pairs.get(b"missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairs<'a> {
    items: Vec<(&'a [u8], &'a [u8])>,
}

impl<'a> Pairs<'a> {
    /// Creates an empty list.
    #[inline]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Parses `src` as a url-encoded form or query string (`a=1&b=2&flag`).
    #[inline]
    pub fn form(src: &'a [u8]) -> Self {
        Self::parse(src, b"&", b"=")
    }

    /// Parses `src` into a new list.
    ///
    /// `pair_delims` separate pairs, `kv_delims` separate a key from its
    /// value. Any byte of a set acts as the delimiter.
    ///
    /// # Examples
    /// ```
    /// use arena_web::Pairs;
    ///
    /// let pairs = Pairs::parse(b"a:1;b=2", b";", b":=");
    /// assert_eq!(pairs.get(b"a"), Some(&b"1"[..]));
    /// assert_eq!(pairs.get(b"b"), Some(&b"2"[..]));
    /// ```
    #[inline]
    pub fn parse(src: &'a [u8], pair_delims: &[u8], kv_delims: &[u8]) -> Self {
        let mut result = Self::new();
        result.parse_into(src, pair_delims, kv_delims);
        result
    }

    /// Parses `src` and appends every pair to `self`.
    ///
    /// A segment without a key/value delimiter becomes a key with an empty
    /// value (`?flag`). Parsing ends when no bytes remain, so a trailing
    /// pair delimiter does not produce an empty pair.
    pub fn parse_into(&mut self, src: &'a [u8], pair_delims: &[u8], kv_delims: &[u8]) {
        let mut rest = src;

        while !rest.is_empty() {
            let pde = find_any(pair_delims, rest).unwrap_or(rest.len());

            let (key, value): (&[u8], &[u8]) = match find_any(kv_delims, &rest[..pde]) {
                Some(de) => (&rest[..de], &rest[de + 1..pde]),
                None => (&rest[..pde], b""),
            };
            self.items.push((key, value));

            rest = match pde < rest.len() {
                true => &rest[pde + 1..],
                false => b"",
            };
        }
    }

    #[inline]
    pub fn push(&mut self, key: &'a [u8], value: &'a [u8]) {
        self.items.push((key, value));
    }

    /// Returns the value of the first pair whose key equals `key` byte-wise.
    #[inline]
    pub fn get(&self, key: &[u8]) -> Option<&'a [u8]> {
        self.items
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| *value)
    }

    /// Same as [`Pairs::get`], `None` also when the value is not valid UTF-8.
    #[inline]
    pub fn get_str(&self, key: &[u8]) -> Option<&'a str> {
        simdutf8::basic::from_utf8(self.get(key)?).ok()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + '_ {
        self.items.iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Position of the first byte of `hay` that belongs to `set`.
#[inline]
pub(crate) fn find_any(set: &[u8], hay: &[u8]) -> Option<usize> {
    match *set {
        [] => None,
        [a] => memchr(a, hay),
        [a, b] => memchr2(a, b, hay),
        [a, b, c] => memchr3(a, b, c, hay),
        _ => hay.iter().position(|byte| set.contains(byte)),
    }
}
