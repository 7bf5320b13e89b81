use tellerkit_web::{App, HandlerSlot, Method, RouteEntry};

/// The handler chain of one located route.
#[derive(Debug, Clone)]
pub struct HandlerChain {
    entry: RouteEntry,
}

impl HandlerChain {
    pub fn path(&self) -> &str {
        &self.entry.path
    }

    /// The first handler, the one a route registered with a single callback
    /// runs.
    pub fn handle(&self) -> Option<&HandlerSlot> {
        self.entry.chain.first()
    }

    pub fn entry(&self, index: usize) -> Option<&HandlerSlot> {
        self.entry.chain.get(index)
    }

    pub fn len(&self) -> usize {
        self.entry.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.chain.is_empty()
    }
}

/// Finds route handlers by exact path and case-insensitive method. Lookups
/// never fail and never change the application.
pub trait RouteLocator {
    fn locate(&self, path: &str, method: &str) -> Option<HandlerChain>;

    /// Only routes registered on the application itself, not mounted routers.
    fn locate_top_level(&self, path: &str, method: &str) -> Option<HandlerChain>;

    fn locate_any(&self, paths: &[&str], method: &str) -> Option<HandlerChain> {
        paths.iter().find_map(|path| self.locate(path, method))
    }
}

impl RouteLocator for App {
    fn locate(&self, path: &str, method: &str) -> Option<HandlerChain> {
        let method = Method::parse(method)?;
        self.route_table()
            .into_iter()
            .find(|entry| entry.matches(path, method))
            .map(|entry| HandlerChain { entry })
    }

    fn locate_top_level(&self, path: &str, method: &str) -> Option<HandlerChain> {
        let method = Method::parse(method)?;
        self.routes()
            .find(path, method)
            .map(|entry| HandlerChain { entry })
    }
}
