use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tellerkit_web::Router;

/// One recorded argument.
#[derive(Clone)]
pub enum Arg {
    Value(Value),
    Function,
    Router(Router),
}

impl Arg {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Arg::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value().and_then(Value::as_str)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(value) => write!(f, "{value}"),
            Arg::Function => f.write_str("<function>"),
            Arg::Router(router) => fmt::Debug::fmt(router, f),
        }
    }
}

/// Argument matchers for [`Capture::called_with_exactly`].
#[derive(Debug, Clone)]
pub enum Matcher {
    Eq(Value),
    AnyFunction,
    AnyObject,
    /// The very same router, not one with equal routes.
    SameRouter(Router),
}

impl Matcher {
    pub fn matches(&self, arg: &Arg) -> bool {
        match (self, arg) {
            (Matcher::Eq(expected), Arg::Value(actual)) => expected == actual,
            (Matcher::AnyFunction, Arg::Function) => true,
            (Matcher::AnyObject, Arg::Value(Value::Object(_))) => true,
            (Matcher::SameRouter(expected), Arg::Router(actual)) => expected.ptr_eq(actual),
            _ => false,
        }
    }
}

/// Records every call made through a double. Clones share the record.
#[derive(Clone, Default)]
pub struct Capture {
    calls: Arc<Mutex<Vec<Vec<Arg>>>>,
}

impl Capture {
    pub fn new() -> Self {
        Capture::default()
    }

    pub fn record(&self, args: Vec<Arg>) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(args);
    }

    pub fn calls(&self) -> Vec<Vec<Arg>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn called(&self) -> bool {
        self.call_count() > 0
    }

    pub fn called_once(&self) -> bool {
        self.call_count() == 1
    }

    pub fn first_call(&self) -> Option<Vec<Arg>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .cloned()
    }

    /// Argument `index` of the first call, when it was a plain value.
    pub fn first_arg(&self, index: usize) -> Option<Value> {
        self.first_call()?.get(index)?.value().cloned()
    }

    /// True when some call had exactly these arguments.
    pub fn called_with_exactly(&self, matchers: &[Matcher]) -> bool {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|args| {
                args.len() == matchers.len()
                    && matchers.iter().zip(args).all(|(m, a)| m.matches(a))
            })
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.calls()).finish()
    }
}
