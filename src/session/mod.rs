//! Client session lifecycle.
//!
//! [`SessionController`] is the single owner of the [`Session`](crate::Session).
//! It restores the cached session at startup, exchanges credentials for a new
//! one, clears it on logout, and keeps a waiting customer's tier fresh.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use appmoo_client::{MemoryStore, Route, SessionController};
//!
//! let session = Arc::new(SessionController::new(gateway, MemoryStore::new()));
//! session.init().await;
//!
//! // Re-render whenever the session changes.
//! let mut changes = session.subscribe();
//! tokio::spawn(async move {
//!     while changes.changed().await.is_ok() {
//!         let route = appmoo_client::derive_route(&changes.borrow_and_update());
//!         render(route);
//!     }
//! });
//!
//! session.login("alice", "Secret123").await?;
//! ```

mod controller;
mod poll;

pub use controller::SessionController;
pub use poll::PollHandle;
