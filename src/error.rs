//! Error taxonomy shared by the card engine, codec, sync glue and routes.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BingoError {
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("could not restore card state: {0}")]
    DecodeFailed(String),
    #[error("not enough eligible items: need {needed}, pool has {available}")]
    InsufficientPool { needed: usize, available: usize },
    #[error("{pinned} pinned items do not fit on a card of {capacity}")]
    TooManyPinned { pinned: usize, capacity: usize },
    #[error("unknown item: {0}")]
    UnknownItem(String),
    #[error("item is not on the current card: {0}")]
    NotOnCard(String),
    #[error("sync error: {0}")]
    Sync(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl BingoError {
    /// Stable machine-readable label, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CatalogUnavailable(_) => "catalog_unavailable",
            Self::DecodeFailed(_) => "decode_failed",
            Self::InsufficientPool { .. } => "insufficient_pool",
            Self::TooManyPinned { .. } => "too_many_pinned",
            Self::UnknownItem(_) => "unknown_item",
            Self::NotOnCard(_) => "not_on_card",
            Self::Sync(_) => "sync",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<serde_json::Error> for BingoError {
    fn from(value: serde_json::Error) -> Self {
        Self::DecodeFailed(value.to_string())
    }
}

impl From<base64::DecodeError> for BingoError {
    fn from(value: base64::DecodeError) -> Self {
        Self::DecodeFailed(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_map_to_decode_failed() {
        let err: BingoError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert_eq!(err.kind(), "decode_failed");
    }

    #[test]
    fn insufficient_pool_message_names_counts() {
        let err = BingoError::InsufficientPool { needed: 2, available: 1 };
        assert_eq!(err.to_string(), "not enough eligible items: need 2, pool has 1");
    }
}
