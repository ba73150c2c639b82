//! Message types exchanged with the host.
//!
//! # Overview
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | [`StatusChangeEvent`] | Core → Host | Lifecycle and advisory status |
//! | [`InboundMessage`] | Core → Host | Normalized hub event |
//! | [`InvokeRequest`] | Host → Core | Hub method call |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `arguments` | Payload normalization |
//! | `message` | Inbound messages and invocation requests |
//! | `status` | Status enum and status change events |

// ============================================================================
// Submodules
// ============================================================================

/// Payload normalization.
pub mod arguments;

/// Inbound messages and invocation requests.
pub mod message;

/// Connection status notifications.
pub mod status;

// ============================================================================
// Re-exports
// ============================================================================

pub use arguments::{EventPayload, argument_text, normalize_arguments, result_text};
pub use message::{InboundMessage, InvokeRequest};
pub use status::{ConnectionStatus, StatusChangeEvent};
