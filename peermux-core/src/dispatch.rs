//! Inbound frame dispatch.
//!
//! Runs on the connection's driver task. Table lookups happen under the
//! state lock; user code (method handlers, topic handlers, hooks) always
//! runs with the lock released. Method and callback handlers get their own
//! tasks so a slow handler never stalls the connection.

use std::sync::Arc;

use peermux_protocol::{split_field, ErrorCode, Message, MsgType, WireError, PROTOCOL_VERSION};

use crate::error::{CallResult, PeerError};
use crate::methods::{HandlerFuture, Request};
use crate::peer::{Phase, Shared};
use crate::topics::UnsubscribeHook;

impl Shared {
    pub(crate) fn handle_opened(&self) {
        tracing::debug!("Transport opened");
        let hello = {
            let mut state = self.state.lock();
            if state.phase == Phase::Connecting {
                state.phase = Phase::Open;
                self.phase_tx.send_replace(Phase::Open);
            }
            match &mut state.hello {
                Some(hello) if !hello.sent => {
                    hello.sent = true;
                    Some(hello.data.clone())
                }
                _ => None,
            }
        };
        if let Some(data) = hello {
            self.send(Message::hello(&data));
        }
    }

    pub(crate) fn handle_binary(&self) {
        self.fault(ErrorCode::UnexpectedBinaryFrame.into());
    }

    pub(crate) fn handle_frame(self: &Arc<Self>, raw: &str) {
        let msg = match Message::decode(raw) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("Undecodable frame: {}", e);
                self.fault(ErrorCode::UnknownMessageType.into());
                return;
            }
        };
        match msg.kind {
            MsgType::MethodCall => self.on_method_call(msg),
            MsgType::Callback => self.on_callback(msg),
            MsgType::Result => self.on_result(msg),
            MsgType::Exception => self.on_exception(msg),
            MsgType::ExecutionError => self.on_execution_error(msg),
            MsgType::Discover => self.on_discover(msg),
            MsgType::TopicUpdate => self.on_topic_update(msg),
            MsgType::Unsubscribe => self.on_unsubscribe(msg),
            MsgType::TopicClose => self.on_topic_close(msg),
            MsgType::VarSet => self.on_var_set(msg),
            MsgType::VarUnset => self.on_var_unset(msg),
            MsgType::Hello => self.on_hello_frame(msg),
            MsgType::Welcome => self.on_welcome(msg),
        }
    }

    /// Tears the connection down after a clean close or transport failure.
    /// Rejects pending requests, closes subscriptions and fires the
    /// unsubscribe hooks of topics still being published.
    pub(crate) fn handle_closed(&self, reason: Option<String>) {
        let (rejected, hooks) = {
            let mut state = self.state.lock();
            if state.phase == Phase::Closed {
                return;
            }
            state.phase = Phase::Closed;
            state.close_reason = reason.clone();
            let rejected = state.pending.drain();
            state.topics.subscriptions.clear();
            state.callbacks.clear();
            let hooks: Vec<UnsubscribeHook> = state
                .topics
                .outgoing
                .drain()
                .filter_map(|(_, entry)| entry.on_unsubscribe)
                .collect();
            (rejected, hooks)
        };
        self.phase_tx.send_replace(Phase::Closed);
        if rejected > 0 {
            tracing::debug!("Rejected {} pending requests on close", rejected);
        }
        for hook in hooks {
            hook();
        }
        match reason {
            Some(reason) => tracing::info!("Connection closed: {}", reason),
            None => tracing::info!("Connection closed"),
        }
    }

    /// Raises a connection-level fault: reports it to the remote side with
    /// an id-less exception, records it locally and closes.
    fn fault(&self, err: WireError) {
        tracing::warn!("Connection fault: {}", err);
        {
            let mut state = self.state.lock();
            if state.fault.is_none() {
                state.fault = Some(err.clone());
            }
        }
        self.send(Message::node_error(&err));
        self.request_close();
    }

    /// Records a fault the remote side reported and closes without
    /// answering, so faults never ping-pong.
    fn remote_fault(&self, err: WireError) {
        tracing::warn!("Remote connection fault: {}", err);
        {
            let mut state = self.state.lock();
            if state.fault.is_none() {
                state.fault = Some(err);
            }
        }
        self.request_close();
    }

    fn on_method_call(self: &Arc<Self>, msg: Message) {
        let Some(payload) = msg.payload else {
            self.fault(ErrorCode::MessageProcessingError.into());
            return;
        };
        let (name, args) = split_field(&payload);
        let handler = {
            let state = self.state.lock();
            state.methods.get(name).map(|m| m.handler.clone())
        };
        match handler {
            Some(handler) => {
                let req = Request::new(name, args.unwrap_or(""), self.peer());
                self.spawn_handler(msg.id, handler(req));
            }
            None => {
                tracing::debug!("Method not found: {}", name);
                self.send(Message::execution_error(
                    &msg.id,
                    &ErrorCode::MethodNotFound.into(),
                ));
            }
        }
    }

    fn on_callback(self: &Arc<Self>, msg: Message) {
        let Some(payload) = msg.payload else {
            self.fault(ErrorCode::MessageProcessingError.into());
            return;
        };
        let (token, args) = split_field(&payload);
        // Consumed before the handler runs: a second invocation with the
        // same token must fail even while the first is still executing.
        let handler = self.state.lock().callbacks.remove(token);
        match handler {
            Some(handler) => {
                let req = Request::new(token, args.unwrap_or(""), self.peer());
                self.spawn_handler(msg.id, handler(req));
            }
            None => {
                tracing::debug!("Callback not registered: {}", token);
                self.send(Message::execution_error(
                    &msg.id,
                    &ErrorCode::CallbackNotRegistered.into(),
                ));
            }
        }
    }

    /// Runs a handler as its own task and turns its outcome, panics
    /// included, into the response frame.
    fn spawn_handler(self: &Arc<Self>, id: String, fut: HandlerFuture) {
        let shared = self.clone();
        let task = tokio::spawn(fut);
        tokio::spawn(async move {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let detail = if e.is_panic() {
                        match e.into_panic().downcast::<String>() {
                            Ok(s) => *s,
                            Err(payload) => match payload.downcast::<&'static str>() {
                                Ok(s) => (*s).to_string(),
                                Err(_) => "handler panicked".to_string(),
                            },
                        }
                    } else {
                        "handler cancelled".to_string()
                    };
                    tracing::warn!("Handler for request id={} failed: {}", id, detail);
                    Err(PeerError::Exception(WireError::new(
                        ErrorCode::UnhandledException.code(),
                        detail,
                    )))
                }
            };
            shared.respond(&id, outcome);
        });
    }

    /// Maps a handler outcome onto the response frame for `id`.
    pub(crate) fn respond(&self, id: &str, outcome: CallResult) {
        match outcome {
            Ok(value) => self.send(Message::result(id, &value)),
            Err(PeerError::Exception(e)) => self.send(Message::exception(id, &e)),
            Err(PeerError::Execution(e)) => self.send(Message::execution_error(id, &e)),
            Err(other) => {
                // Disconnects and faults from nested calls have no wire
                // form of their own; report them as unhandled.
                let e = WireError::new(ErrorCode::UnhandledException.code(), other.to_string());
                self.send(Message::exception(id, &e));
            }
        }
    }

    fn complete(&self, id: &str, outcome: CallResult) {
        if !self.state.lock().pending.complete(id, outcome) {
            tracing::debug!("No pending request for id={}", id);
        }
    }

    fn on_result(&self, msg: Message) {
        self.complete(&msg.id, Ok(msg.payload.unwrap_or_default()));
    }

    fn on_exception(&self, msg: Message) {
        let err = WireError::parse(&msg.payload.unwrap_or_default());
        if msg.id.is_empty() {
            self.remote_fault(err);
        } else {
            self.complete(&msg.id, Err(PeerError::Exception(err)));
        }
    }

    fn on_execution_error(&self, msg: Message) {
        let err = WireError::parse(&msg.payload.unwrap_or_default());
        if msg.id.is_empty() {
            self.remote_fault(err);
        } else {
            self.complete(&msg.id, Err(PeerError::Execution(err)));
        }
    }

    fn on_discover(&self, msg: Message) {
        let query = msg.payload.unwrap_or_default();
        let reply = {
            let state = self.state.lock();
            if query.is_empty() {
                Some(crate::discover::render_listing(
                    state.methods.keys().map(String::as_str),
                ))
            } else {
                state
                    .methods
                    .get(&query)
                    .map(|m| crate::discover::render_doc(&m.doc))
            }
        };
        match reply {
            Some(payload) => self.send(Message::result(&msg.id, &payload)),
            None => {
                tracing::debug!("Discovery for unknown method: {}", query);
                self.send(Message::exception(&msg.id, &ErrorCode::MethodNotFound.into()));
            }
        }
    }

    fn on_topic_update(&self, msg: Message) {
        let topic = msg.id;
        let data = msg.payload.unwrap_or_default();
        let handler = self.state.lock().topics.subscriptions.get(&topic).cloned();
        let keep = match &handler {
            Some(handler) => handler(Some(&data)),
            None => false,
        };
        if !keep {
            self.state.lock().topics.subscriptions.remove(&topic);
            self.send(Message::unsubscribe(&topic));
        }
    }

    fn on_unsubscribe(&self, msg: Message) {
        let entry = self.state.lock().topics.outgoing.remove(&msg.id);
        match entry {
            Some(entry) => {
                tracing::debug!("Remote unsubscribed from topic {}", msg.id);
                if let Some(hook) = entry.on_unsubscribe {
                    hook();
                }
            }
            None => tracing::debug!("Unsubscribe for inactive topic {}", msg.id),
        }
    }

    fn on_topic_close(&self, msg: Message) {
        let handler = self.state.lock().topics.subscriptions.remove(&msg.id);
        if let Some(handler) = handler {
            handler(None);
        }
    }

    fn on_var_set(&self, msg: Message) {
        let value = msg.payload.unwrap_or_default();
        self.state.lock().vars.remote.insert(msg.id, value);
    }

    fn on_var_unset(&self, msg: Message) {
        self.state.lock().vars.remote.remove(&msg.id);
    }

    fn on_hello_frame(&self, msg: Message) {
        if msg.id != PROTOCOL_VERSION {
            self.fault(ErrorCode::UnsupportedVersion.into());
            return;
        }
        let data = msg.payload.unwrap_or_default();
        let responder = self.state.lock().hello_responder.clone();
        let greeting = match responder {
            Some(responder) => responder(&data),
            None => String::new(),
        };
        {
            let mut state = self.state.lock();
            if matches!(state.phase, Phase::Connecting | Phase::Open) {
                state.phase = Phase::Welcomed;
                self.phase_tx.send_replace(Phase::Welcomed);
                tracing::info!("Handshake complete");
            }
        }
        // Answered even when already welcomed, so a peer that missed the
        // welcome can retry its hello.
        self.send(Message::welcome(&greeting));
    }

    fn on_welcome(&self, msg: Message) {
        if msg.id != PROTOCOL_VERSION {
            self.fault(ErrorCode::UnsupportedVersion.into());
            return;
        }
        let mut state = self.state.lock();
        if state.welcome.is_none() {
            state.welcome = Some(msg.payload.unwrap_or_default());
        }
        if matches!(state.phase, Phase::Connecting | Phase::Open) {
            state.phase = Phase::Welcomed;
            tracing::info!("Handshake complete");
        }
        let phase = state.phase;
        drop(state);
        // Unconditional so init calls waiting on the welcome wake up even
        // when the phase was already Welcomed.
        self.phase_tx.send_replace(phase);
    }
}
