//! Session token handling.
//!
//! - [`StoredToken`]: the token plus its issuance and expiry times
//! - [`TokenStore`]: the single storage slot, with in-memory and
//!   file-backed implementations

mod store;
mod token;

pub use store::{FileTokenStore, MemoryTokenStore, TokenPolicy, TokenStore};
pub use token::{StoredToken, TokenClaims};
