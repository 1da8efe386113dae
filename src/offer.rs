//! Negotiation state machine for a single offer
//!
//! An [`Offer`] is one buyer's attempt to buy one product. Its history is an
//! append-only list of price proposals that starts with the buyer's opening
//! price. The current `offer_price` always mirrors the last entry.
//!
//! ```text
//! pending ─► counter-offered ◄─┐
//!    │            │  └─────────┘
//!    ├────────────┴─► approved ─► completed
//!    └────────────┴─► rejected
//! ```
use super::catalog::Product;
use super::config::TurnPolicy;
use super::error::{MarketError, NegotiationError};
use super::store::Record;
use super::types::{Price, Side, TimeStamp};
use chrono::Utc;
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    CounterOffered,
    #[n(2)]
    Approved,
    #[n(3)]
    Rejected,
    #[n(4)]
    Completed,
}

impl OfferStatus {
    /// Negotiation is still in progress.
    pub fn is_active(self) -> bool {
        matches!(self, OfferStatus::Pending | OfferStatus::CounterOffered)
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::CounterOffered => "counter-offered",
            OfferStatus::Approved => "approved",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct NegotiationEntry {
    #[n(0)]
    pub price: Price,
    #[n(1)]
    pub from: Side,
    #[n(2)]
    pub timestamp: TimeStamp<Utc>,
    #[n(3)]
    pub message: Option<String>,
}

/// Copy of the latest counter-offer, kept while the offer is counter-offered.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CounterOffer {
    #[n(0)]
    pub price: Price,
    #[n(1)]
    pub from: Side,
    #[n(2)]
    pub timestamp: TimeStamp<Utc>,
}

/// On-chain reference for the payment that settled an approved offer.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    #[n(0)]
    pub tx_hash: String,
    #[n(1)]
    pub purchase_id: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    #[n(0)]
    id: String,
    #[n(1)]
    product_id: String,
    #[n(2)]
    product_name: String, // snapshot taken at creation
    #[n(3)]
    buyer_address: String,
    #[n(4)]
    seller_id: String,
    #[n(5)]
    offer_price: Price,
    #[n(6)]
    status: OfferStatus,
    #[n(7)]
    created_at: TimeStamp<Utc>,
    #[n(8)]
    negotiation_history: Vec<NegotiationEntry>,
    #[n(9)]
    current_counter_offer: Option<CounterOffer>,
    #[n(10)]
    version: u64,
    #[n(11)]
    updated_at: TimeStamp<Utc>,
    #[n(12)]
    completed_at: Option<TimeStamp<Utc>>,
    #[n(13)]
    settlement: Option<Settlement>,
}

/// Rules applied when appending to the history.
#[derive(Debug, Clone, Copy, Default)]
pub struct NegotiationRules {
    pub turn_policy: TurnPolicy,
    pub max_history_len: Option<usize>,
}

impl Offer {
    /// Opens a negotiation with the buyer's initial price.
    pub fn open(id: String, product: &Product, buyer_address: String, price: Price) -> Self {
        let now = TimeStamp::new();
        Self {
            id,
            product_id: product.id().to_string(),
            product_name: product.name().to_string(),
            buyer_address,
            seller_id: product.seller_id().to_string(),
            offer_price: price,
            status: OfferStatus::Pending,
            created_at: now.clone(),
            negotiation_history: vec![NegotiationEntry {
                price,
                from: Side::Buyer,
                timestamp: now.clone(),
                message: None,
            }],
            current_counter_offer: None,
            version: 0,
            updated_at: now,
            completed_at: None,
            settlement: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn product_id(&self) -> &str {
        &self.product_id
    }
    pub fn product_name(&self) -> &str {
        &self.product_name
    }
    pub fn buyer_address(&self) -> &str {
        &self.buyer_address
    }
    pub fn seller_id(&self) -> &str {
        &self.seller_id
    }
    pub fn offer_price(&self) -> Price {
        self.offer_price
    }
    pub fn status(&self) -> OfferStatus {
        self.status
    }
    pub fn created_at(&self) -> &TimeStamp<Utc> {
        &self.created_at
    }
    pub fn updated_at(&self) -> &TimeStamp<Utc> {
        &self.updated_at
    }
    pub fn completed_at(&self) -> Option<&TimeStamp<Utc>> {
        self.completed_at.as_ref()
    }
    pub fn negotiation_history(&self) -> &[NegotiationEntry] {
        &self.negotiation_history
    }
    pub fn current_counter_offer(&self) -> Option<&CounterOffer> {
        self.current_counter_offer.as_ref()
    }
    pub fn settlement(&self) -> Option<&Settlement> {
        self.settlement.as_ref()
    }
    /// Incremented on every persisted change.
    pub fn version(&self) -> u64 {
        self.version
    }
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn last_entry(&self) -> &NegotiationEntry {
        // history always holds the opening entry
        &self.negotiation_history[self.negotiation_history.len() - 1]
    }

    /// The side expected to respond next, while negotiation is open.
    pub fn awaiting(&self) -> Option<Side> {
        self.is_active().then(|| self.last_entry().from.opposite())
    }

    /// The identity acting for `side` on this offer.
    pub fn party(&self, side: Side) -> &str {
        match side {
            Side::Buyer => &self.buyer_address,
            Side::Seller => &self.seller_id,
        }
    }

    pub fn involves(&self, identity: &str) -> bool {
        self.buyer_address == identity || self.seller_id == identity
    }

    pub fn authorize(&self, caller: &str, side: Side) -> Result<(), MarketError> {
        if self.party(side) != caller {
            return Err(MarketError::Unauthorized {
                caller: caller.to_string(),
                resource: format!("offer {} as {side}", self.id),
            });
        }
        Ok(())
    }

    /// Appends a counter-offer from `from` and makes it the current price.
    pub fn counter(
        &mut self,
        price: Price,
        from: Side,
        message: Option<String>,
        rules: NegotiationRules,
    ) -> Result<(), NegotiationError> {
        if !self.is_active() {
            return Err(NegotiationError::Closed(self.status));
        }
        if rules.turn_policy == TurnPolicy::Alternating && self.last_entry().from == from {
            return Err(NegotiationError::OutOfTurn(from));
        }
        if let Some(limit) = rules.max_history_len {
            if self.negotiation_history.len() >= limit {
                return Err(NegotiationError::HistoryFull(limit));
            }
        }

        let now = TimeStamp::new();
        self.negotiation_history.push(NegotiationEntry {
            price,
            from,
            timestamp: now.clone(),
            message,
        });
        self.current_counter_offer = Some(CounterOffer {
            price,
            from,
            timestamp: now.clone(),
        });
        self.offer_price = price;
        self.status = OfferStatus::CounterOffered;
        self.updated_at = now;
        Ok(())
    }

    /// Moves to a terminal or settled status. Returns `false` when the offer
    /// already holds `to` and nothing changed.
    pub fn transition(
        &mut self,
        to: OfferStatus,
        rules: NegotiationRules,
    ) -> Result<bool, NegotiationError> {
        if self.status == to {
            return Ok(false);
        }
        let allowed = match to {
            OfferStatus::Approved | OfferStatus::Rejected => self.is_active(),
            OfferStatus::Completed => self.status == OfferStatus::Approved,
            OfferStatus::Pending | OfferStatus::CounterOffered => false,
        };
        if !allowed {
            return Err(NegotiationError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        // under alternation the seller accepts only a buyer proposal
        if to == OfferStatus::Approved
            && rules.turn_policy == TurnPolicy::Alternating
            && self.last_entry().from == Side::Seller
        {
            return Err(NegotiationError::OutOfTurn(Side::Seller));
        }

        let now = TimeStamp::new();
        if to == OfferStatus::Completed {
            self.completed_at = Some(now.clone());
        }
        self.status = to;
        self.updated_at = now;
        Ok(true)
    }

    pub(crate) fn attach_settlement(&mut self, settlement: Settlement) {
        self.settlement = Some(settlement);
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Whether this offer should badge as new for a seller who last looked at `since`.
    ///
    /// Counts active offers created after `since`, and active offers whose
    /// latest counter came from the buyer after `since`.
    pub fn is_new_since(&self, since: Option<&TimeStamp<Utc>>) -> bool {
        if !self.is_active() {
            return false;
        }
        let Some(since) = since else {
            return true;
        };
        let fresh_counter = self
            .current_counter_offer
            .as_ref()
            .is_some_and(|c| c.from == Side::Buyer && c.timestamp > *since);

        self.created_at > *since || fresh_counter
    }
}

impl Record for Offer {
    const KIND: &'static str = "offer";

    fn key(&self) -> String {
        self.id.clone()
    }
}
