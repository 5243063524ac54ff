//! Network Layer
//!
//! WebSocket front end over the arena. This layer only authenticates,
//! decodes and routes; every rule lives in `battle/`.

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{AuthConfig, AuthError, Authenticator, TokenClaims};
pub use protocol::{AuthResult, ClientMessage, ErrorCode, ServerError, ServerMessage};
pub use server::{ArenaServer, Dispatcher, ServerConfig, ServerRunError};
