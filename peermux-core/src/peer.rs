//! The peer handle and its shared connection state.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use peermux_protocol::{Message, WireError};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use crate::discover::{self, DiscoverReply};
use crate::driver::{self, Directive, Transport};
use crate::error::{CallResult, PeerError};
use crate::methods::{self, Method, Request};
use crate::pending::PendingTable;
use crate::topics::{Publisher, TopicEntry, TopicHandler, TopicTables, UnsubscribeHook};
use crate::vars::VarTables;

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Attached, waiting for the transport to open.
    Connecting,
    /// Transport open; frames flow but no handshake has completed.
    Open,
    /// Handshake complete.
    Welcomed,
    /// Terminal. Entered once; never left.
    Closed,
}

/// Connection state guarded by one lock.
///
/// The lock is only ever held for table lookups and mutations, never across
/// an await point or a user handler invocation.
pub(crate) struct PeerState {
    pub pending: PendingTable,
    pub topics: TopicTables,
    pub vars: VarTables,
    pub methods: BTreeMap<String, Method>,
    pub callbacks: HashMap<String, methods::CallbackHandler>,
    pub phase: Phase,
    pub hello: Option<HelloState>,
    pub hello_responder: Option<Arc<dyn Fn(&str) -> String + Send + Sync>>,
    pub welcome: Option<String>,
    pub fault: Option<WireError>,
    pub close_reason: Option<String>,
}

pub(crate) struct HelloState {
    pub data: String,
    pub sent: bool,
}

impl PeerState {
    fn new() -> Self {
        PeerState {
            pending: PendingTable::default(),
            topics: TopicTables::default(),
            vars: VarTables::default(),
            methods: BTreeMap::new(),
            callbacks: HashMap::new(),
            phase: Phase::Connecting,
            hello: None,
            hello_responder: None,
            welcome: None,
            fault: None,
            close_reason: None,
        }
    }
}

/// State shared between peer handles, the driver task and handler tasks.
pub(crate) struct Shared {
    pub state: Mutex<PeerState>,
    pub directives: mpsc::UnboundedSender<Directive>,
    pub next_id: AtomicU64,
    pub phase_tx: watch::Sender<Phase>,
}

impl Shared {
    /// Queues one frame for the driver task. Silently dropped when the
    /// driver already exited; callers observe that through the phase.
    pub(crate) fn send(&self, msg: Message) {
        if self.directives.send(Directive::Send(msg.encode())).is_err() {
            tracing::debug!("Driver gone, dropping outbound frame");
        }
    }

    pub(crate) fn request_close(&self) {
        let _ = self.directives.send(Directive::Close);
    }

    pub(crate) fn peer(self: &Arc<Self>) -> Peer {
        Peer {
            shared: self.clone(),
        }
    }
}

/// One endpoint of a peermux connection.
///
/// Cheap to clone; every clone shares the same connection. Both sides of a
/// connection hold the same API: either peer may register methods, call the
/// other, publish topics or set variables.
#[derive(Clone)]
pub struct Peer {
    pub(crate) shared: Arc<Shared>,
}

impl Peer {
    /// Attaches a new peer to a transport and spawns its driver task.
    ///
    /// Must be called from within a tokio runtime. The connection lives
    /// until [`close`](Peer::close) is called, the remote side disconnects
    /// or a protocol fault occurs; dropping peer handles closes it too.
    pub fn attach<T: Transport>(transport: T) -> Peer {
        let (directive_tx, directive_rx) = mpsc::unbounded_channel();
        let (phase_tx, _) = watch::channel(Phase::Connecting);
        let shared = Arc::new(Shared {
            state: Mutex::new(PeerState::new()),
            directives: directive_tx,
            next_id: AtomicU64::new(1),
            phase_tx,
        });
        tokio::spawn(driver::run(transport, shared.clone(), directive_rx));
        Peer { shared }
    }

    /// Performs the handshake: sends a hello with `data` and resolves with
    /// the remote greeting once the welcome arrives.
    ///
    /// Idempotent: the first call sends the hello (queued until the
    /// transport opens if necessary), later calls return the cached
    /// greeting. When both sides init concurrently each side answers the
    /// other and both resolve.
    pub async fn init(&self, data: &str) -> Result<String, PeerError> {
        let mut phase_rx = self.shared.phase_tx.subscribe();
        let mut send_now = false;
        {
            let mut state = self.shared.state.lock();
            match state.phase {
                Phase::Closed => return Err(close_failure(&state)),
                Phase::Connecting => {
                    if state.hello.is_none() {
                        state.hello = Some(HelloState {
                            data: data.to_string(),
                            sent: false,
                        });
                    }
                }
                Phase::Open | Phase::Welcomed => {
                    if let Some(welcome) = &state.welcome {
                        return Ok(welcome.clone());
                    }
                    if state.hello.is_none() {
                        state.hello = Some(HelloState {
                            data: data.to_string(),
                            sent: true,
                        });
                        send_now = true;
                    }
                }
            }
        }
        if send_now {
            self.shared.send(Message::hello(data));
        }
        loop {
            {
                let state = self.shared.state.lock();
                if let Some(welcome) = &state.welcome {
                    return Ok(welcome.clone());
                }
                if state.phase == Phase::Closed {
                    return Err(close_failure(&state));
                }
            }
            if phase_rx.changed().await.is_err() {
                return Err(PeerError::Disconnected);
            }
        }
    }

    /// Installs the responder for inbound hellos. The returned string
    /// becomes the welcome payload. Without a responder, hellos are
    /// answered with an empty greeting.
    pub fn on_hello<F>(&self, responder: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.shared.state.lock().hello_responder = Some(Arc::new(responder));
    }

    /// Requests connection shutdown. Pending requests are rejected once the
    /// transport confirms closure; use [`wait_close`](Peer::wait_close) to
    /// await that.
    pub fn close(&self) {
        self.shared.request_close();
    }

    /// Waits until the connection is closed.
    ///
    /// Resolves with the transport's close reason, if it reported one, or
    /// with the connection fault when the connection died of a protocol
    /// error.
    pub async fn wait_close(&self) -> Result<Option<String>, PeerError> {
        let mut phase_rx = self.shared.phase_tx.subscribe();
        loop {
            {
                let state = self.shared.state.lock();
                if state.phase == Phase::Closed {
                    return match &state.fault {
                        Some(e) => Err(PeerError::Fault(e.clone())),
                        None => Ok(state.close_reason.clone()),
                    };
                }
            }
            if phase_rx.changed().await.is_err() {
                return Ok(None);
            }
        }
    }

    /// False once the connection reached [`Phase::Closed`].
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().phase != Phase::Closed
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    /// Number of requests awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Calls a remote method and waits for its outcome.
    ///
    /// `args` is passed through verbatim; the argument encoding is between
    /// the two applications. Replies may arrive in any order relative to
    /// other in-flight calls.
    pub async fn call(&self, method: &str, args: &str) -> CallResult {
        tracing::debug!("Calling method {}", method);
        let rx = self.create_request(|id| Message::method_call(id, method, args))?;
        await_reply(rx).await
    }

    /// Invokes a remote one-shot callback by its token.
    pub async fn call_callback(&self, token: &str, args: &str) -> CallResult {
        tracing::debug!("Calling callback {}", token);
        let rx = self.create_request(|id| Message::callback(id, token, args))?;
        await_reply(rx).await
    }

    /// Queries the remote method surface. An empty query lists everything
    /// the remote peer exposes; a method name fetches its documentation.
    pub async fn discover(&self, query: &str) -> Result<DiscoverReply, PeerError> {
        let rx = self.create_request(|id| Message::discover(id, query))?;
        let payload = await_reply(rx).await?;
        Ok(discover::parse_reply(&payload))
    }

    /// Registers (or replaces) a method under `name`. The doc string is
    /// served to discovery queries. Handlers run as their own tasks and may
    /// be invoked concurrently with themselves.
    pub fn register_method<F, Fut>(&self, name: &str, doc: &str, f: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        tracing::debug!("Registering method {}", name);
        self.shared.state.lock().methods.insert(
            name.to_string(),
            Method {
                handler: methods::boxed_method(f),
                doc: doc.to_string(),
            },
        );
    }

    /// Removes a registered method. Returns false when it was not
    /// registered.
    pub fn unregister_method(&self, name: &str) -> bool {
        self.shared.state.lock().methods.remove(name).is_some()
    }

    /// Registers a one-shot callback and returns its token. The token is
    /// opaque; pass it to the remote peer inside a method argument or
    /// result so it can invoke the callback once.
    pub fn reg_callback<F, Fut>(&self, f: F) -> String
    where
        F: FnOnce(Request) -> Fut + Send + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        let token = format!("cb-{}", Uuid::new_v4());
        self.shared
            .state
            .lock()
            .callbacks
            .insert(token.clone(), methods::boxed_callback(f));
        tracing::debug!("Registered callback {}", token);
        token
    }

    /// Drops a callback that was never invoked. Returns false when the
    /// token is unknown, including when the callback already fired.
    pub fn unreg_callback(&self, token: &str) -> bool {
        self.shared.state.lock().callbacks.remove(token).is_some()
    }

    /// Subscribes to a topic published by the remote peer, replacing any
    /// previous handler for it. The handler runs on the connection's driver
    /// task and must not block.
    pub fn subscribe<F>(&self, topic: &str, handler: F)
    where
        F: Fn(Option<&str>) -> bool + Send + Sync + 'static,
    {
        let handler: TopicHandler = Arc::new(handler);
        self.shared
            .state
            .lock()
            .topics
            .subscriptions
            .insert(topic.to_string(), handler);
    }

    /// Drops a subscription: runs the handler once with `None`, then
    /// notifies the publisher. Returns false when there was no
    /// subscription.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let handler = self.shared.state.lock().topics.subscriptions.remove(topic);
        match handler {
            Some(handler) => {
                handler(None);
                self.shared.send(Message::unsubscribe(topic));
                true
            }
            None => false,
        }
    }

    /// Declares publish intent for a topic and returns the producer handle.
    /// Restarts the topic when it is already being published.
    pub fn start_publish(&self, topic: &str) -> Result<Publisher, PeerError> {
        let mut state = self.shared.state.lock();
        if state.phase == Phase::Closed {
            return Err(PeerError::Disconnected);
        }
        state
            .topics
            .outgoing
            .insert(topic.to_string(), TopicEntry::default());
        drop(state);
        Ok(Publisher::new(topic.to_string(), self.clone()))
    }

    /// Sets a shared variable visible to the remote peer. Returns true when
    /// the value changed; unchanged writes send nothing.
    pub fn set_var(&self, name: &str, value: &str) -> bool {
        let (changed, connected) = {
            let mut state = self.shared.state.lock();
            let changed = state.vars.set_local(name, value);
            (changed, state.phase != Phase::Closed)
        };
        if changed && connected {
            self.shared.send(Message::var_set(name, value));
        }
        changed
    }

    /// Removes a shared variable. Returns false when it was not set.
    pub fn unset_var(&self, name: &str) -> bool {
        let (removed, connected) = {
            let mut state = self.shared.state.lock();
            let removed = state.vars.unset_local(name);
            (removed, state.phase != Phase::Closed)
        };
        if removed && connected {
            self.shared.send(Message::var_unset(name));
        }
        removed
    }

    /// Reads one of this peer's own variables.
    pub fn var(&self, name: &str) -> Option<String> {
        self.shared.state.lock().vars.local.get(name).cloned()
    }

    /// Snapshot of this peer's own variables.
    pub fn vars(&self) -> HashMap<String, String> {
        self.shared.state.lock().vars.local.clone()
    }

    /// Reads the mirror of a variable the remote peer set.
    pub fn peer_var(&self, name: &str) -> Option<String> {
        self.shared.state.lock().vars.remote.get(name).cloned()
    }

    /// Snapshot of the remote peer's variables.
    pub fn peer_vars(&self) -> HashMap<String, String> {
        self.shared.state.lock().vars.remote.clone()
    }

    fn create_request(
        &self,
        make: impl FnOnce(&str) -> Message,
    ) -> Result<oneshot::Receiver<CallResult>, PeerError> {
        let (rx, msg) = {
            let mut state = self.shared.state.lock();
            if state.phase == Phase::Closed {
                return Err(PeerError::Disconnected);
            }
            let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst).to_string();
            let rx = state.pending.insert(id.clone());
            (rx, make(&id))
        };
        self.shared.send(msg);
        Ok(rx)
    }

    pub(crate) fn publish_update(&self, topic: &str, value: &str) -> bool {
        let live = self
            .shared
            .state
            .lock()
            .topics
            .outgoing
            .contains_key(topic);
        if live {
            self.shared.send(Message::topic_update(topic, value));
        }
        live
    }

    pub(crate) fn publish_close(&self, topic: &str) -> bool {
        let removed = self
            .shared
            .state
            .lock()
            .topics
            .outgoing
            .remove(topic)
            .is_some();
        if removed {
            self.shared.send(Message::topic_close(topic));
        }
        removed
    }

    pub(crate) fn set_unsubscribe_hook(&self, topic: &str, hook: UnsubscribeHook) {
        if let Some(entry) = self.shared.state.lock().topics.outgoing.get_mut(topic) {
            entry.on_unsubscribe = Some(hook);
        }
    }

    pub(crate) fn topic_active(&self, topic: &str) -> bool {
        self.shared.state.lock().topics.outgoing.contains_key(topic)
    }
}

fn close_failure(state: &PeerState) -> PeerError {
    match &state.fault {
        Some(e) => PeerError::Fault(e.clone()),
        None => PeerError::Disconnected,
    }
}

async fn await_reply(rx: oneshot::Receiver<CallResult>) -> CallResult {
    match rx.await {
        Ok(outcome) => outcome,
        // The sender only disappears when the connection tears down.
        Err(_) => Err(PeerError::Disconnected),
    }
}
