use super::offer::OfferStatus;
use super::types::Side;
use sled::transaction::TransactionError;

#[derive(thiserror::Error, Debug)]
pub enum MarketError {
    #[error("{kind} {id} was not found")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{caller} is not permitted to modify {resource}")]
    Unauthorized { caller: String, resource: String },
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("failed to mint identifier: {0}")]
    Identifier(String),
}

/// Rejections raised by the negotiation state machine itself.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("Offer is {0} and no longer open for negotiation")]
    Closed(OfferStatus),
    #[error("The {0} made the last proposal and must wait for a response")]
    OutOfTurn(Side),
    #[error("Negotiation history reached its limit of {0} entries")]
    HistoryFull(usize),
    #[error("Offer cannot move from {from} to {to}")]
    InvalidTransition { from: OfferStatus, to: OfferStatus },
}

impl MarketError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MarketError::NotFound { .. })
    }
}

impl From<TransactionError<MarketError>> for MarketError {
    fn from(value: TransactionError<MarketError>) -> Self {
        match value {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => MarketError::Storage(e),
        }
    }
}
