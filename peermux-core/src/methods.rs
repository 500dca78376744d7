//! Method and callback handler plumbing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::CallResult;
use crate::peer::Peer;

/// An inbound invocation handed to a method or callback handler.
#[derive(Clone)]
pub struct Request {
    name: String,
    args: String,
    peer: Peer,
}

impl Request {
    pub(crate) fn new(name: impl Into<String>, args: impl Into<String>, peer: Peer) -> Self {
        Request {
            name: name.into(),
            args: args.into(),
            peer,
        }
    }

    /// The invoked method name, or the callback token for callback
    /// invocations.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw argument payload. Empty when the caller sent none.
    pub fn args(&self) -> &str {
        &self.args
    }

    /// The peer the invocation arrived on. Handlers use this to issue
    /// nested calls, publish updates or touch shared variables while the
    /// request is still in flight.
    pub fn peer(&self) -> &Peer {
        &self.peer
    }
}

/// Boxed future returned by method and callback handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = CallResult> + Send>>;

/// A registered method handler. Invoked once per inbound call, potentially
/// concurrently with itself.
pub type MethodHandler = Arc<dyn Fn(Request) -> HandlerFuture + Send + Sync>;

/// A one-shot callback handler, consumed by its first invocation.
pub(crate) type CallbackHandler = Box<dyn FnOnce(Request) -> HandlerFuture + Send>;

/// A method entry: the handler plus the documentation string served to
/// discovery queries.
pub(crate) struct Method {
    pub(crate) handler: MethodHandler,
    pub(crate) doc: String,
}

pub(crate) fn boxed_method<F, Fut>(f: F) -> MethodHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

pub(crate) fn boxed_callback<F, Fut>(f: F) -> CallbackHandler
where
    F: FnOnce(Request) -> Fut + Send + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    Box::new(move |req| Box::pin(f(req)))
}
