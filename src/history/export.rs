//! Message history export.
//!
//! Exchanges are flattened to a single ordered list (each user message
//! followed by its bot replies) and written as pretty-printed JSON.

use std::path::{Path, PathBuf};

use tracing::info;
use url::Url;

use super::model::{Message, MessageExchange};
use crate::error::{Error, Result};

/// File name of the exported history.
pub const EXPORT_FILE_NAME: &str = "message_history";

/// Content type of the exported history.
pub const EXPORT_CONTENT_TYPE: &str = "application/json";

/// Flatten exchanges into turn order.
#[must_use]
pub fn flatten(exchanges: &[MessageExchange]) -> Vec<&Message> {
    exchanges
        .iter()
        .flat_map(|exchange| std::iter::once(&exchange.user_message).chain(&exchange.bot_messages))
        .collect()
}

/// Render the flattened history as pretty-printed JSON.
pub fn render(exchanges: &[MessageExchange]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&flatten(exchanges))?)
}

/// Read exchanges previously saved as a JSON array.
pub fn load_exchanges(path: &Path) -> Result<Vec<MessageExchange>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// A rendered history ready to be handed to the operator.
#[derive(Debug, Clone)]
pub struct MessageDownload {
    body: String,
    message_count: usize,
}

impl MessageDownload {
    /// Render `exchanges` into a downloadable document.
    pub fn new(exchanges: &[MessageExchange]) -> Result<Self> {
        Ok(Self {
            body: render(exchanges)?,
            message_count: exchanges.iter().map(MessageExchange::message_count).sum(),
        })
    }

    /// Name the file is saved under.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        EXPORT_FILE_NAME
    }

    /// MIME type of the document.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        EXPORT_CONTENT_TYPE
    }

    /// The JSON document.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Number of messages in the document.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.message_count
    }

    /// Write the document into `dir` and return a link to it.
    pub fn save(&self, dir: &Path) -> Result<Url> {
        std::fs::create_dir_all(dir)?;
        let path: PathBuf = std::fs::canonicalize(dir)?.join(self.file_name());
        std::fs::write(&path, &self.body)?;

        let url = Url::from_file_path(&path)
            .map_err(|()| Error::Config(format!("not an absolute path: {}", path.display())))?;

        info!(
            name: "history.export.saved",
            path = %path.display(),
            messages = self.message_count,
            "Message history exported"
        );
        Ok(url)
    }
}
