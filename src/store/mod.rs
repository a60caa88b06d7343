//! Persistent key-value storage for the cached session.
//!
//! The controller only needs three async calls: `get`, `set` and `remove`.
//! Implement [`KeyValueStore`] to back it with whatever the host platform
//! offers, or use one of the bundled stores:
//!
//! - [`MemoryStore`]: process-local, lost on exit. Good for tests.
//! - [`FileStore`]: a single JSON file on disk, survives restarts.

mod file;
mod memory;

use std::future::Future;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key under which the serialized [`User`](crate::User) record is stored.
pub const USER_KEY: &str = "user";

/// Key under which the credential token is stored.
pub const TOKEN_KEY: &str = "token";

/// Error type returned by store implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer-provided durable string storage.
///
/// Values must survive a process restart. Single-process access is assumed;
/// no coordination between concurrent writers is required.
///
/// # Example
///
/// ```rust,ignore
/// impl KeyValueStore for SecureStorage {
///     async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
///         Ok(self.keychain.read(key)?)
///     }
///
///     async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
///         self.keychain.write(key, value)?;
///         Ok(())
///     }
///
///     async fn remove(&self, key: &str) -> Result<(), StoreError> {
///         self.keychain.delete(key)?;
///         Ok(())
///     }
/// }
/// ```
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read a value. Missing keys are `Ok(None)`, not an error.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a value. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}
