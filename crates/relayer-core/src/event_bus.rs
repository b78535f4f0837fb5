//! Event bus for inter-component communication.
//!
//! A thin wrapper over a tokio broadcast channel. Publishing is
//! fire-and-forget: a send with no live subscribers is not an error, and
//! no protocol decision depends on an event being delivered.

use relayer_types::RelayerEvent;
use tokio::sync::broadcast;

/// Broadcast bus carrying [`RelayerEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<RelayerEvent>,
}

impl EventBus {
	/// Creates a new event bus with the given channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns the number of subscribers that received the event; zero is
	/// a valid outcome, not a failure.
	pub fn publish(&self, event: RelayerEvent) -> usize {
		self.sender.send(event).unwrap_or(0)
	}

	/// Subscribes to the event stream from this point forward.
	pub fn subscribe(&self) -> broadcast::Receiver<RelayerEvent> {
		self.sender.subscribe()
	}
}
