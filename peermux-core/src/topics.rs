//! Topic subscription state and the publisher handle.

use std::collections::HashMap;
use std::sync::Arc;

use crate::peer::Peer;

/// Handler for inbound topic traffic.
///
/// Receives `Some(update)` for each update and `None` exactly once when the
/// publisher closes the topic. Returning false drops the subscription and
/// notifies the remote side.
pub type TopicHandler = Arc<dyn Fn(Option<&str>) -> bool + Send + Sync>;

/// Hook run once when the remote side unsubscribes from a published topic,
/// or when the connection closes with the topic still open.
pub(crate) type UnsubscribeHook = Box<dyn FnOnce() + Send>;

/// Publish-intent entry for a topic this peer produces.
#[derive(Default)]
pub(crate) struct TopicEntry {
    pub on_unsubscribe: Option<UnsubscribeHook>,
}

#[derive(Default)]
pub(crate) struct TopicTables {
    /// Topics this peer consumes, keyed by name.
    pub subscriptions: HashMap<String, TopicHandler>,
    /// Topics this peer produces, keyed by name.
    pub outgoing: HashMap<String, TopicEntry>,
}

/// Producer handle for one topic, returned by [`Peer::start_publish`].
///
/// The handle stays valid across clones of the peer; dropping it does not
/// close the topic.
pub struct Publisher {
    topic: String,
    peer: Peer,
}

impl Publisher {
    pub(crate) fn new(topic: String, peer: Peer) -> Self {
        Publisher { topic, peer }
    }

    /// The topic this handle publishes to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Sends one update to the remote subscriber.
    ///
    /// Returns false, sending nothing, once the remote side unsubscribed,
    /// the topic was closed or the connection dropped.
    pub fn publish(&self, value: &str) -> bool {
        self.peer.publish_update(&self.topic, value)
    }

    /// Closes the topic: notifies the subscriber and drops the local
    /// publish intent, so later [`publish`](Publisher::publish) calls
    /// return false. Returns false when the intent was already gone.
    pub fn close(&self) -> bool {
        self.peer.publish_close(&self.topic)
    }

    /// Installs a hook run once when the remote side unsubscribes or the
    /// connection closes. Replaces any previously installed hook. Has no
    /// effect once the topic is inactive.
    pub fn on_unsubscribe(&self, hook: impl FnOnce() + Send + 'static) {
        self.peer.set_unsubscribe_hook(&self.topic, Box::new(hook));
    }

    /// Whether the publish intent is still live.
    pub fn is_active(&self) -> bool {
        self.peer.topic_active(&self.topic)
    }
}
