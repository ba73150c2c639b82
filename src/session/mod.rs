//! Session management.
//!
//! A [`Session`] owns at most one hub connection at a time and everything
//! that runs over it.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`SessionBuilder`] |
//! | `core` | [`Session`] facade |
//! | `dispatch` | Ordered delivery queue and event binding |
//! | `invoker` | Hub method invocation |
//! | `state` | Connection state machine |

// ============================================================================
// Submodules
// ============================================================================

/// Session builder.
pub mod builder;

/// Session facade.
pub mod core;

mod dispatch;
mod invoker;
mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use core::Session;
pub use state::SessionState;
