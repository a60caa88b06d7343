#![doc = include_str!("../README.md")]

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod order;
pub mod route;
pub mod session;
pub mod store;
pub mod types;
pub mod validation;

// Re-exports for convenient access
pub use api::{ApiClient, LoginOutcome, StatusResponse, TierStatus};
pub use config::ClientConfig;
pub use error::Error;
#[cfg(feature = "http")]
pub use gateway::HttpGateway;
pub use gateway::{Gateway, Operation, Variables};
pub use order::{Menu, Order, OrderDraft, OrderLine};
pub use route::{Route, Screen, derive_route};
pub use session::{PollHandle, SessionController};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use types::{LoadingState, OrderId, Role, Session, Tier, User, UserId};
pub use validation::{Email, ResetCode};
