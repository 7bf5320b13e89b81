use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::handler::{handler_slot, Handler, HandlerSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Case-insensitive parse of a method token.
    pub fn parse(token: &str) -> Option<Method> {
        match token.to_ascii_lowercase().as_str() {
            "get" => Some(Method::Get),
            "post" => Some(Method::Post),
            "put" => Some(Method::Put),
            "patch" => Some(Method::Patch),
            "delete" => Some(Method::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::parse(s).ok_or_else(|| format!("unknown method `{s}`"))
    }
}

/// One registered route. The chain holds slots so entries can be observed in
/// place.
#[derive(Clone)]
pub struct RouteEntry {
    pub path: String,
    pub methods: BTreeSet<Method>,
    pub chain: Vec<HandlerSlot>,
}

impl RouteEntry {
    pub fn matches(&self, path: &str, method: Method) -> bool {
        self.path == path && self.methods.contains(&method)
    }

    /// Same entry seen from a mount point. The chain slots are shared.
    pub fn mounted_at(&self, prefix: &str) -> RouteEntry {
        RouteEntry {
            path: join_paths(prefix, &self.path),
            methods: self.methods.clone(),
            chain: self.chain.clone(),
        }
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("chain", &self.chain.len())
            .finish()
    }
}

/// An ordered route stack. Clones share the same stack.
#[derive(Clone, Default)]
pub struct Router {
    stack: Arc<RwLock<Vec<RouteEntry>>>,
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    pub fn route(&self, method: Method, path: &str, handlers: Vec<Arc<dyn Handler>>) {
        let entry = RouteEntry {
            path: path.to_string(),
            methods: BTreeSet::from([method]),
            chain: handlers.into_iter().map(handler_slot).collect(),
        };
        self.stack
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn get(&self, path: &str, handler: Arc<dyn Handler>) {
        self.route(Method::Get, path, vec![handler]);
    }

    pub fn post(&self, path: &str, handler: Arc<dyn Handler>) {
        self.route(Method::Post, path, vec![handler]);
    }

    pub fn entries(&self) -> Vec<RouteEntry> {
        self.stack
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First entry matching `path` and `method`, in registration order.
    pub fn find(&self, path: &str, method: Method) -> Option<RouteEntry> {
        self.stack
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|entry| entry.matches(path, method))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.stack.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when both handles share one stack.
    pub fn ptr_eq(&self, other: &Router) -> bool {
        Arc::ptr_eq(&self.stack, &other.stack)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.len()).finish()
    }
}

pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match path {
        "" | "/" if prefix.is_empty() => "/".to_string(),
        "" | "/" => prefix.to_string(),
        _ if path.starts_with('/') => format!("{prefix}{path}"),
        _ => format!("{prefix}/{path}"),
    }
}
