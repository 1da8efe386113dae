//! Push notifications for offer changes
//!
//! Every write to the offers tree emits a sled event carrying the full
//! encoded row, so a watcher sees each committed state of every offer that
//! concerns its party and never needs to diff.
use super::error::MarketError;
use super::offer::Offer;
use std::time::{Duration, Instant};
use tracing::warn;

/// Whose offers a watcher or snapshot follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Party {
    Seller(String),
    Buyer(String),
}

impl Party {
    pub fn concerns(&self, offer: &Offer) -> bool {
        match self {
            Party::Seller(id) => offer.seller_id() == id,
            Party::Buyer(address) => offer.buyer_address() == address,
        }
    }
}

pub struct OfferWatch {
    subscriber: sled::Subscriber,
    party: Party,
}

impl OfferWatch {
    pub(crate) fn new(subscriber: sled::Subscriber, party: Party) -> Self {
        Self { subscriber, party }
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    /// Waits up to `timeout` for the next change to an offer of this party.
    pub fn next_timeout(&mut self, timeout: Duration) -> Result<Option<Offer>, MarketError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let event = match self.subscriber.next_timeout(remaining) {
                Ok(event) => event,
                Err(_) => return Ok(None),
            };
            if let Some(offer) = self.accept(event)? {
                return Ok(Some(offer));
            }
        }
    }

    fn accept(&self, event: sled::Event) -> Result<Option<Offer>, MarketError> {
        match event {
            sled::Event::Insert { key: _, value } => {
                let offer: Offer = minicbor::decode(&value)?;
                Ok(self.party.concerns(&offer).then_some(offer))
            }
            // offers are never removed by the ledger
            sled::Event::Remove { key } => {
                warn!(key = %String::from_utf8_lossy(&key), "Offer row removed outside the ledger");
                Ok(None)
            }
        }
    }
}

impl Iterator for OfferWatch {
    type Item = Result<Offer, MarketError>;

    /// Blocks until the next relevant change. Ends when the database closes.
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let event = self.subscriber.next()?;
            match self.accept(event) {
                Ok(Some(offer)) => return Some(Ok(offer)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
