//! Key-value storage primitives backing persisted sessions.
//!
//! Sessions live in two tiers supplied by the platform:
//!
//! 1. **Durable**: outlives tab and browser restarts (`localStorage` in a browser).
//! 2. **Ephemeral**: cleared when the tab ends (`sessionStorage` in a browser).
//!
//! Both tiers are accessed only through [`KeyValueStore`].

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use traits::KeyValueStore;
