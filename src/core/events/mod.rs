//! Real-time event fabric
//!
//! A single hub multiplexes provider-status, request, log, and stats events
//! to subscribers over bounded channels. Delivery is lossy: a subscriber
//! whose buffer is full is considered dead and evicted, so publishers never
//! block.


use crate::core::types::{Channel, Event};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outbound buffer size per subscriber
const SUBSCRIBER_BUFFER: usize = 64;
/// Broadcast inbox size
const INBOX_BUFFER: usize = 256;
/// Heartbeat period
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Idle time after which a subscriber is evicted
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

struct Subscriber {
    sender: mpsc::Sender<Event>,
    channels: HashSet<Channel>,
    last_activity: Instant,
}

#[derive(Default)]
struct HubState {
    subscribers: HashMap<Uuid, Subscriber>,
    by_channel: HashMap<Channel, HashSet<Uuid>>,
}

impl HubState {
    fn targets(&self, channel: Channel) -> Vec<(Uuid, mpsc::Sender<Event>)> {
        let mut ids: HashSet<Uuid> = self.by_channel.get(&channel).cloned().unwrap_or_default();
        if channel != Channel::All {
            if let Some(all) = self.by_channel.get(&Channel::All) {
                ids.extend(all.iter().copied());
            }
        }
        ids.into_iter()
            .filter_map(|id| self.subscribers.get(&id).map(|s| (id, s.sender.clone())))
            .collect()
    }

    fn remove(&mut self, id: &Uuid) {
        if self.subscribers.remove(id).is_some() {
            for members in self.by_channel.values_mut() {
                members.remove(id);
            }
        }
    }
}

/// Non-blocking publisher handle backed by the hub's bounded inbox
#[derive(Clone)]
pub struct EventPublisher {
    inbox: mpsc::Sender<(Channel, Event)>,
}

impl EventPublisher {
    /// Enqueue an event; dropped silently when the inbox is full
    pub fn publish(&self, channel: Channel, event: Event) {
        if self.inbox.try_send((channel, event)).is_err() {
            debug!(channel = %channel, "event inbox full, dropping event");
        }
    }
}

/// The hub owning every subscriber and the per-channel index
pub struct EventHub {
    state: Mutex<HubState>,
    inbox_tx: mpsc::Sender<(Channel, Event)>,
    inbox_rx: Mutex<Option<mpsc::Receiver<(Channel, Event)>>>,
}

impl EventHub {
    /// Create a hub
    pub fn new() -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_BUFFER);
        Self {
            state: Mutex::new(HubState::default()),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
        }
    }

    /// A clonable non-blocking publisher
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher { inbox: self.inbox_tx.clone() }
    }

    /// Register a subscriber on the given channels
    pub fn subscribe(&self, channels: &[Channel]) -> (Uuid, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = Uuid::new_v4();
        let mut state = self.state.lock();
        state.subscribers.insert(
            id,
            Subscriber {
                sender,
                channels: channels.iter().copied().collect(),
                last_activity: Instant::now(),
            },
        );
        for channel in channels {
            state.by_channel.entry(*channel).or_default().insert(id);
        }
        info!(subscriber = %id, channels = channels.len(), "subscriber connected");
        (id, receiver)
    }

    /// Remove a subscriber, closing its channel
    pub fn unsubscribe(&self, id: &Uuid) {
        self.state.lock().remove(id);
        info!(subscriber = %id, "subscriber disconnected");
    }

    /// Add channels to a subscriber's set
    ///
    /// Unknown subscribers are ignored; callers validate channel names
    /// before parsing them into `Channel`.
    pub fn add_channels(&self, id: &Uuid, channels: &[Channel]) {
        let mut state = self.state.lock();
        if let Some(subscriber) = state.subscribers.get_mut(id) {
            subscriber.channels.extend(channels.iter().copied());
            subscriber.last_activity = Instant::now();
            for channel in channels {
                state.by_channel.entry(*channel).or_default().insert(*id);
            }
        }
    }

    /// Remove channels from a subscriber's set
    pub fn remove_channels(&self, id: &Uuid, channels: &[Channel]) {
        let mut state = self.state.lock();
        if let Some(subscriber) = state.subscribers.get_mut(id) {
            for channel in channels {
                subscriber.channels.remove(channel);
            }
            subscriber.last_activity = Instant::now();
        }
        for channel in channels {
            if let Some(members) = state.by_channel.get_mut(channel) {
                members.remove(id);
            }
        }
    }

    /// Mark a subscriber alive
    pub fn touch(&self, id: &Uuid) {
        if let Some(subscriber) = self.state.lock().subscribers.get_mut(id) {
            subscriber.last_activity = Instant::now();
        }
    }

    /// Deliver an event to every subscriber of `channel` and of `all`
    ///
    /// Takes a snapshot under the lock, releases it, then sends without
    /// blocking; subscribers with a full buffer are evicted.
    pub fn broadcast(&self, channel: Channel, event: Event) {
        let targets = self.state.lock().targets(channel);
        let mut dead = Vec::new();
        for (id, sender) in targets {
            if sender.try_send(event.clone()).is_err() {
                dead.push(id);
            }
        }
        for id in dead {
            warn!(subscriber = %id, "subscriber buffer full, evicting");
            self.unsubscribe(&id);
        }
    }

    /// Number of connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    fn heartbeat(&self) {
        let snapshot: Vec<(Uuid, mpsc::Sender<Event>, Instant)> = {
            let state = self.state.lock();
            state
                .subscribers
                .iter()
                .map(|(id, s)| (*id, s.sender.clone(), s.last_activity))
                .collect()
        };

        let now = Instant::now();
        for (id, sender, last_activity) in snapshot {
            if now.duration_since(last_activity) > IDLE_TIMEOUT {
                warn!(subscriber = %id, "subscriber idle, evicting");
                self.unsubscribe(&id);
            } else if sender.try_send(Event::ping()).is_err() {
                warn!(subscriber = %id, "subscriber unresponsive, evicting");
                self.unsubscribe(&id);
            }
        }
    }

    /// Drive the hub: drain the broadcast inbox and tick the heartbeat
    ///
    /// On cancellation every subscriber is closed in a single sweep.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut inbox = self
            .inbox_rx
            .lock()
            .take()
            .expect("event hub can only be run once");
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = inbox.recv() => {
                    match message {
                        Some((channel, event)) => self.broadcast(channel, event),
                        None => break,
                    }
                }
                _ = heartbeat.tick() => self.heartbeat(),
            }
        }

        let ids: Vec<Uuid> = self.state.lock().subscribers.keys().copied().collect();
        for id in ids {
            self.unsubscribe(&id);
        }
        info!("event hub stopped");
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
