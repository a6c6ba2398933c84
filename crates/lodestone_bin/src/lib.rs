// Core modules
pub mod core;
pub mod error;
pub mod handler;
pub mod network;
pub mod world;

// Re-export commonly used types
pub use crate::core::server::{Server, ServerHandle};
pub use crate::error::ConnectionError;
pub use crate::handler::{Authenticator, EventHandler, PlayerProfile};
