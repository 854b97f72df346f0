use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::stream;
use rustc_hash::FxHashMap;
use tokio::sync::broadcast;

use super::event::ChatEvent;

/// Per-conversation broadcast hub.
///
/// Each conversation id maps to one broadcast channel created on demand from
/// either side (publisher or subscriber). Publishing is fire-and-forget:
/// events sent while no subscriber is registered are dropped, and a slow
/// subscriber that lags past the buffer skips ahead rather than blocking the
/// producer.
///
/// Subscriber registration doubles as the liveness flag the orchestrator
/// polls during its bounded pre-run wait: [`ConversationHub::subscriber_count`]
/// reports live receivers for a conversation.
#[derive(Debug)]
pub struct ConversationHub {
    channels: Mutex<FxHashMap<String, broadcast::Sender<ChatEvent>>>,
    capacity: usize,
    dropped_events: AtomicUsize,
}

impl ConversationHub {
    /// Create a hub whose per-conversation buffers hold `capacity` events.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(FxHashMap::default()),
            capacity: capacity.max(1),
            dropped_events: AtomicUsize::new(0),
        })
    }

    fn sender(&self, conversation_id: &str) -> broadcast::Sender<ChatEvent> {
        let mut channels = self.channels.lock().expect("hub lock poisoned");
        channels
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                let (sender, _) = broadcast::channel(self.capacity);
                sender
            })
            .clone()
    }

    /// Publish one event on a conversation channel.
    ///
    /// Returns the number of subscribers the event was delivered to; zero
    /// means the event was lost, which is the intended at-most-once behavior.
    pub fn publish(&self, conversation_id: &str, event: ChatEvent) -> usize {
        match self.sender(conversation_id).send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    /// Subscribe to a conversation channel.
    ///
    /// The returned [`EventStream`] yields events in publish order starting
    /// from the moment of subscription. Dropping the stream releases the
    /// receiver and, when it was the last one, the channel entry itself.
    pub fn subscribe(self: &Arc<Self>, conversation_id: &str) -> EventStream {
        EventStream {
            receiver: Some(self.sender(conversation_id).subscribe()),
            conversation_id: conversation_id.to_string(),
            hub: Arc::clone(self),
        }
    }

    /// Number of live subscribers on a conversation channel.
    pub fn subscriber_count(&self, conversation_id: &str) -> usize {
        let channels = self.channels.lock().expect("hub lock poisoned");
        channels
            .get(conversation_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop a conversation's channel entry if no subscriber remains.
    ///
    /// Safe to call at any time; a concurrent subscriber keeps the entry
    /// alive, and a later publish or subscribe recreates it on demand.
    pub fn release(&self, conversation_id: &str) {
        let mut channels = self.channels.lock().expect("hub lock poisoned");
        if let Some(sender) = channels.get(conversation_id) {
            if sender.receiver_count() == 0 {
                channels.remove(conversation_id);
            }
        }
    }

    /// Number of conversation channels currently held.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().expect("hub lock poisoned").len()
    }

    /// Events lost because no subscriber was listening, plus lag skips.
    pub fn dropped(&self) -> usize {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// True while the hub can accept publishes. The hub is in-process, so
    /// this only reports health-check reachability, never backpressure.
    pub fn is_open(&self) -> bool {
        self.channels.lock().is_ok()
    }
}

/// Live handle onto one conversation's event sequence.
///
/// Holds the underlying broadcast receiver; dropping the handle on any exit
/// path (including panics in the consumer task) releases the channel
/// resource deterministically.
#[derive(Debug)]
pub struct EventStream {
    receiver: Option<broadcast::Receiver<ChatEvent>>,
    conversation_id: String,
    hub: Arc<ConversationHub>,
}

impl EventStream {
    /// Receive the next event, skipping over any lagged gap.
    ///
    /// Returns `None` once the channel is closed (hub entry removed with no
    /// remaining sender).
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.hub
                        .dropped_events
                        .fetch_add(missed as usize, Ordering::Relaxed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// The conversation this handle is subscribed to.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Adapt the handle into an async [`Stream`](futures_util::Stream) of events.
    pub fn into_async_stream(self) -> impl futures_util::Stream<Item = ChatEvent> {
        stream::unfold(self, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        })
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        // Release the receiver before pruning so the count reflects reality.
        self.receiver.take();
        self.hub.release(&self.conversation_id);
    }
}
