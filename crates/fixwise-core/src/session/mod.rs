//! Session ownership: the store boundary, the in-process arena, and the
//! serialized session manager.

pub mod arena;
pub mod manager;
pub mod store;

pub use arena::ArenaSessionStore;
pub use manager::SessionManager;
pub use store::SessionStore;
