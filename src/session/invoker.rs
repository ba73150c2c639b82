//! Hub method invocation.
//!
//! Each call runs on its caller's task, bounded by the session's invoke
//! timeout. The outcome is routed through the delivery queue before it is
//! handed back, so results reach the caller in delivery order.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::InvocationId;
use crate::protocol::{InvokeRequest, result_text};
use crate::transport::HubConnection;

use super::dispatch::{Delivery, DeliveryQueue};

// ============================================================================
// Invoker
// ============================================================================

/// Issues invocations and tracks how many are outstanding.
#[derive(Debug)]
pub(crate) struct Invoker {
    /// Outstanding invocations.
    pending: AtomicUsize,
    /// Cap on outstanding invocations.
    max_pending: usize,
    /// Per-call timeout.
    invoke_timeout: Duration,
}

impl Invoker {
    /// Creates an invoker.
    pub(crate) fn new(invoke_timeout: Duration, max_pending: usize) -> Self {
        Self {
            pending: AtomicUsize::new(0),
            max_pending,
            invoke_timeout,
        }
    }

    /// Returns the number of outstanding invocations.
    #[inline]
    #[must_use]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Invokes `request` on `connection`.
    ///
    /// # Errors
    ///
    /// - [`Error::Invocation`] if the hub or transport fails the call, or too
    ///   many calls are outstanding
    /// - [`Error::InvocationTimeout`] if no result arrives in time
    /// - [`Error::ConnectionClosed`] if the delivery queue is gone
    pub(crate) async fn invoke(
        &self,
        connection: &dyn HubConnection,
        queue: &DeliveryQueue,
        request: InvokeRequest,
    ) -> Result<String> {
        let _slot = self.acquire(&request.method_name)?;
        let id = InvocationId::next();

        debug!(%id, method = %request.method_name, args = request.arguments.len(), "Invoking hub method");

        let method = request.method_name.as_str();
        let result = match timeout(
            self.invoke_timeout,
            connection.invoke(method, request.wire_arguments()),
        )
        .await
        {
            Ok(Ok(value)) => Ok(result_text(value.as_ref())),
            Ok(Err(e)) => Err(into_invocation_error(method, e)),
            Err(_) => Err(Error::invocation_timeout(
                method,
                u64::try_from(self.invoke_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        };

        if let Err(e) = &result {
            warn!(%id, method, error = %e, "Hub invocation failed");
        }

        let (reply, done) = oneshot::channel();
        queue.post(Delivery::Completion { id, reply, result })?;
        done.await?
    }

    /// Reserves a pending slot.
    fn acquire(&self, method: &str) -> Result<PendingSlot<'_>> {
        let previous = self.pending.fetch_add(1, Ordering::AcqRel);
        let slot = PendingSlot {
            pending: &self.pending,
        };

        if previous >= self.max_pending {
            warn!(
                pending = previous,
                max = self.max_pending,
                method,
                "Too many pending invocations"
            );
            return Err(Error::invocation(
                method,
                format!("Too many pending invocations: {}/{}", previous, self.max_pending),
            ));
        }

        Ok(slot)
    }
}

/// Releases a pending slot on drop.
struct PendingSlot<'a> {
    pending: &'a AtomicUsize,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Maps a connection failure to an invocation failure of `method`.
fn into_invocation_error(method: &str, error: Error) -> Error {
    match error {
        Error::Invocation { .. } | Error::InvocationTimeout { .. } => error,
        other => Error::invocation(method, other.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
