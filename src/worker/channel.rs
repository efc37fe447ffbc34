//! Bidirectional message channel between two execution contexts
//!
//! Messages cross as plain JSON values, so nothing live (closures, handles)
//! can leak across; callbacks must go through the bridge.

use serde_json::Value;
use tokio::sync::mpsc;

use super::WorkerMessage;
use crate::error::{Error, Result};
use crate::ui;

/// Sending half; cheap to clone
#[derive(Debug, Clone)]
pub struct Outbox {
	sender: mpsc::UnboundedSender<Value>,
}

impl Outbox {
	pub fn post(&self, message: WorkerMessage) -> Result<()> {
		let encoded = serde_json::to_value(&message)?;
		self.sender.send(encoded).map_err(|_| Error::ChannelClosed)
	}

	pub fn is_closed(&self) -> bool {
		self.sender.is_closed()
	}
}

/// Receiving half
#[derive(Debug)]
pub struct Inbox {
	receiver: mpsc::UnboundedReceiver<Value>,
}

impl Inbox {
	/// Next decodable message; `None` once the peer is gone
	pub async fn recv(&mut self) -> Option<WorkerMessage> {
		loop {
			let encoded = self.receiver.recv().await?;
			match serde_json::from_value(encoded) {
				Ok(message) => return Some(message),
				Err(e) => ui::debug(&format!("Dropping malformed worker message: {}", e)),
			}
		}
	}
}

/// One end of a channel created by [`message_channel`]
#[derive(Debug)]
pub struct MessagePort {
	outbox: Outbox,
	inbox: Inbox,
}

impl MessagePort {
	pub fn outbox(&self) -> Outbox {
		self.outbox.clone()
	}

	pub fn post(&self, message: WorkerMessage) -> Result<()> {
		self.outbox.post(message)
	}

	pub async fn recv(&mut self) -> Option<WorkerMessage> {
		self.inbox.recv().await
	}

	pub fn into_parts(self) -> (Outbox, Inbox) {
		(self.outbox, self.inbox)
	}
}

/// Two connected ports: what one posts, the other receives
pub fn message_channel() -> (MessagePort, MessagePort) {
	let (a_tx, a_rx) = mpsc::unbounded_channel();
	let (b_tx, b_rx) = mpsc::unbounded_channel();

	(
		MessagePort {
			outbox: Outbox { sender: a_tx },
			inbox: Inbox { receiver: b_rx },
		},
		MessagePort {
			outbox: Outbox { sender: b_tx },
			inbox: Inbox { receiver: a_rx },
		},
	)
}
