//! Prefix trie over `/`-delimited route keys.
//!
//! A route key is `"METHOD:/path/segments"` or the catch-all form
//! `"METHOD"`. The key is split on `/` and every segment becomes one
//! level of the trie, so `"GET:/api/users"` is stored as
//! `GET:` → `api` → `users`. Empty segments are skipped: `"GET:/a//b/"`
//! and `"GET:/a/b"` name the same node.

use crate::server::server_impl::Handler;
use std::{fmt, sync::Arc};

/// Maps route keys to [`Handler`]s.
///
/// Routes are registered once, before the server starts. The router is
/// then shared read-only between all connections.
///
/// # Examples
/// ```
/// use arena_web::{handler_fn, Router, Signal, StatusCode};
///
/// let mut router = Router::new();
/// router
///     .register_route("GET:/", handler_fn(|ctx| {
///         ctx.html(StatusCode::Ok, "home");
///         Signal::Respond
///     }))
///     .register_route("GET", handler_fn(|ctx| {
///         ctx.no_content(StatusCode::NotFound);
///         Signal::Respond
///     }));
///
/// assert!(router.route(b"GET", b"/").is_some());
/// // Falls back to the `GET` handler.
/// assert!(router.route(b"GET", b"/unknown").is_some());
/// assert!(router.route(b"POST", b"/").is_none());
/// ```
#[derive(Default)]
pub struct Router {
    root: Node,
}

#[derive(Default)]
struct Node {
    label: Box<[u8]>,
    children: Vec<Node>,
    handler: Option<Arc<dyn Handler>>,
}

impl Node {
    #[inline]
    fn new(label: &[u8]) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
            handler: None,
        }
    }

    #[inline]
    fn child(&self, label: &[u8]) -> Option<&Node> {
        self.children.iter().find(|child| &*child.label == label)
    }

    fn child_or_insert(&mut self, label: &[u8]) -> &mut Node {
        let index = match self.children.iter().position(|child| &*child.label == label) {
            Some(index) => index,
            None => {
                self.children.push(Node::new(label));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }
}

#[inline]
fn segments(key: &[u8]) -> impl Iterator<Item = &[u8]> {
    key.split(|byte| *byte == b'/')
        .filter(|segment| !segment.is_empty())
}

impl Router {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `handler` to the node named by `key`, creating the
    /// missing nodes on the way.
    ///
    /// Registering the same key twice replaces the previous handler.
    pub fn register_route<H: Handler>(&mut self, key: &str, handler: H) -> &mut Self {
        let mut node = &mut self.root;
        for segment in segments(key.as_bytes()) {
            node = node.child_or_insert(segment);
        }

        if node.handler.is_some() {
            log::warn!("Route {:?} registered twice, the last handler wins", key);
        }
        node.handler = Some(Arc::new(handler));
        self
    }

    /// Walks the trie along `key`.
    ///
    /// Returns `None` when a segment has no matching child. A returned
    /// node may still have no handler, e.g. `GET:/api` when only
    /// `GET:/api/users` was registered.
    fn find(&self, key: &[u8]) -> Option<&Node> {
        segments(key).try_fold(&self.root, |node, segment| node.child(segment))
    }

    /// Looks up the handler for `key` (`"METHOD:/path"` or `"METHOD"`).
    #[inline]
    pub fn lookup(&self, key: &[u8]) -> Option<&dyn Handler> {
        self.find(key)?.handler.as_deref()
    }

    /// Resolves a request: `METHOD:PATH` first, then the `METHOD`
    /// catch-all.
    pub fn route(&self, method: &[u8], path: &[u8]) -> Option<&dyn Handler> {
        let mut key = Vec::with_capacity(method.len() + 1 + path.len());
        key.extend_from_slice(method);
        key.push(b':');
        key.extend_from_slice(path);

        self.lookup(&key).or_else(|| self.lookup(method))
    }
}

impl fmt::Display for Router {
    /// One line per node, indented by depth, `*` marks nodes with a handler.
    ///
    /// ```text
    /// GET: *
    ///   hello *
    /// POST:
    ///   concat *
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_node(f: &mut fmt::Formatter<'_>, node: &Node, depth: usize) -> fmt::Result {
            write!(f, "{:indent$}{}", "", String::from_utf8_lossy(&node.label), indent = depth * 2)?;
            if node.handler.is_some() {
                f.write_str(" *")?;
            }
            f.write_str("\n")?;

            node.children
                .iter()
                .try_for_each(|child| write_node(f, child, depth + 1))
        }

        self.root
            .children
            .iter()
            .try_for_each(|child| write_node(f, child, 0))
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.root.children.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{handler_fn, Signal};

    fn noop() -> impl Handler {
        handler_fn(|_| Signal::Respond)
    }

    fn sample() -> Router {
        let mut router = Router::new();
        router
            .register_route("GET:/", noop())
            .register_route("GET:/hello", noop())
            .register_route("GET:/api/users/list", noop())
            .register_route("POST:/concat", noop());
        router
    }

    #[test]
    fn lookup() {
        let router = sample();

        #[rustfmt::skip]
        let cases: [(&str, bool); 9] = [
            ("GET:/", true),
            ("GET:", true),
            ("GET:/hello", true),
            ("GET://hello/", true),
            ("GET:/api/users/list", true),
            ("GET:/api/users", false),
            ("GET:/api", false),
            ("GET:/bye", false),
            ("POST:/", false),
        ];

        for (key, found) in cases {
            assert_eq!(router.lookup(key.as_bytes()).is_some(), found, "{key:?}");
        }
    }

    #[test]
    fn found_without_handler() {
        let router = sample();

        assert!(router.find(b"GET:/api/users").is_some());
        assert!(router.lookup(b"GET:/api/users").is_none());
        assert!(router.find(b"GET:/api/groups").is_none());
    }

    #[test]
    fn method_fallback() {
        let mut router = sample();
        assert!(router.route(b"GET", b"/unregistered").is_none());

        router.register_route("GET", noop());
        assert!(router.route(b"GET", b"/unregistered").is_some());
        assert!(router.route(b"GET", b"/api/users").is_some());
        assert!(router.route(b"POST", b"/unregistered").is_none());
        assert!(router.route(b"POST", b"/concat").is_some());
    }

    #[test]
    fn labels_are_unique() {
        let mut router = sample();
        router.register_route("GET:/hello", noop());

        let get = router.find(b"GET:").unwrap();
        assert_eq!(get.children.len(), 2);
        assert_eq!(router.root.children.len(), 2);
    }

    #[test]
    fn display() {
        let router = sample();

        assert_eq!(
            router.to_string(),
            "GET: *\n  hello *\n  api\n    users\n      list *\nPOST:\n  concat *\n"
        );
    }
}
