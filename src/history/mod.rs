//! Conversation history and its file export.
//!
//! # Example
//!
//! ```rust
//! use admin_console::history::{Direction, Message, MessageExchange, flatten};
//!
//! let now = chrono::Utc::now();
//! let exchange = MessageExchange {
//!     user_message: Message::text("1", Direction::Incoming, "Hello!", now),
//!     bot_messages: vec![Message::text("2", Direction::Outgoing, "Hi there.", now)],
//! };
//!
//! assert_eq!(flatten(&[exchange]).len(), 2);
//! ```

mod export;
mod model;

pub use export::{
    EXPORT_CONTENT_TYPE, EXPORT_FILE_NAME, MessageDownload, flatten, load_exchanges, render,
};
pub use model::{Direction, Message, MessageExchange};
