//! Ordered delivery queue and event binding.
//!
//! Everything that leaves the session for the host goes through one
//! [`DeliveryQueue`]: status changes, inbound messages and invocation
//! completions. Transport callbacks post into the queue from any task; a
//! single consumer task drains it in order and calls the host.
//!
//! ```text
//!  transport tasks ──┐
//!  invocations ──────┼──► mpsc (unbounded) ──► consumer task ──► HostEvents
//!  lifecycle ────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::host::HostEvents;
use crate::identifiers::{Generation, InvocationId};
use crate::protocol::{EventPayload, InboundMessage, StatusChangeEvent};
use crate::transport::{HubConnection, PayloadHandler};

use super::state::Shared;

// ============================================================================
// Delivery
// ============================================================================

/// An item bound for the host.
pub(crate) enum Delivery {
    /// Status change notification.
    Status(StatusChangeEvent),
    /// Normalized hub event.
    Message(InboundMessage),
    /// Invocation outcome, handed back to the waiting caller.
    Completion {
        id: InvocationId,
        reply: oneshot::Sender<Result<String>>,
        result: Result<String>,
    },
}

// ============================================================================
// DeliveryQueue
// ============================================================================

/// Sending half of the ordered delivery context.
#[derive(Clone)]
pub(crate) struct DeliveryQueue {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl DeliveryQueue {
    /// Creates the queue and spawns its consumer task.
    ///
    /// The consumer stops once every sender is dropped.
    pub(crate) fn spawn(host: Arc<dyn HostEvents>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::run_consumer(rx, host));
        Self { tx }
    }

    /// Posts an item. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the consumer has stopped.
    pub(crate) fn post(&self, delivery: Delivery) -> Result<()> {
        self.tx.send(delivery).map_err(|_| Error::ConnectionClosed)
    }

    /// Consumer loop.
    async fn run_consumer(mut rx: mpsc::UnboundedReceiver<Delivery>, host: Arc<dyn HostEvents>) {
        while let Some(delivery) = rx.recv().await {
            Self::deliver(delivery, host.as_ref());
        }

        debug!("Delivery queue closed");
    }

    /// Hands one item to its destination.
    fn deliver(delivery: Delivery, host: &dyn HostEvents) {
        match delivery {
            Delivery::Status(event) => {
                trace!(status = ?event.status, "Delivering status change");
                host.on_status_change(event);
            }

            Delivery::Message(message) => {
                trace!(event = %message.event_name, "Delivering hub event");
                host.on_new_message(message.event_name, message.arguments);
            }

            Delivery::Completion { id, reply, result } => {
                if reply.send(result).is_err() {
                    debug!(%id, "Invocation caller went away before completion");
                }
            }
        }
    }
}

// ============================================================================
// Event Binding
// ============================================================================

/// Binds a normalizing handler for each event in `events` on `connection`.
///
/// Handlers hold only a weak reference to the session and drop payloads
/// from connections older than `generation`.
pub(crate) fn bind_events(
    connection: &dyn HubConnection,
    events: &[String],
    shared: &Weak<Shared>,
    generation: Generation,
) {
    for event in events {
        connection.subscribe(event, event_handler(event.clone(), shared.clone(), generation));
    }

    debug!(count = events.len(), %generation, "Bound hub event handlers");
}

/// Builds the handler for one event.
fn event_handler(event: String, shared: Weak<Shared>, generation: Generation) -> PayloadHandler {
    Arc::new(move |payload: EventPayload| {
        let Some(shared) = shared.upgrade() else {
            return;
        };

        let message = InboundMessage::from_payload(event.as_str(), &payload);
        shared.deliver_message(generation, message);
    })
}

// ============================================================================
// Tests
// ============================================================================
