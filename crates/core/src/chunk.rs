//! Incremental text output.

use serde::{Deserialize, Serialize};

/// One item of a chunked text response.
///
/// A well-formed sequence is zero or more `Text` items followed by exactly one
/// `Done`. A sequence that ends without `Done` was cut off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum Chunk {
    Text(String),
    Done,
}

impl Chunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
