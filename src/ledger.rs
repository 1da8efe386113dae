//! Offer ledger: persisted negotiations and the queries built on them
use super::catalog::Product;
use super::error::{MarketError, NegotiationError};
use super::offer::{NegotiationRules, Offer, OfferStatus, Settlement};
use super::store::{Change, Table, encode};
use super::types::{Price, Side, TimeStamp};
use super::utils;
use super::watch::{OfferWatch, Party};
use chrono::Utc;
use std::collections::HashMap;

/// Completed sales of one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSales {
    pub product_id: String,
    pub product_name: String,
    pub sales_count: usize,
    pub last_sale_at: TimeStamp<Utc>,
}

/// Full current state of a party's offers, with a digest for cheap change detection.
#[derive(Debug, Clone)]
pub struct OfferSnapshot {
    pub offers: Vec<Offer>,
    pub digest: String,
}

#[derive(Clone)]
pub struct OfferLedger {
    offers: Table<Offer>,
    rules: NegotiationRules,
}

impl OfferLedger {
    pub fn open(db: &sled::Db, rules: NegotiationRules) -> Result<Self, MarketError> {
        Ok(Self {
            offers: Table::open(db, "offers")?,
            rules,
        })
    }

    /// Opens a new offer in `pending` with the buyer's price as its first entry.
    pub fn create(
        &self,
        product: &Product,
        buyer_address: &str,
        price: Price,
    ) -> Result<Offer, MarketError> {
        let offer = Offer::open(
            utils::new_offer_id()?,
            product,
            buyer_address.to_string(),
            price,
        );
        self.offers.insert_new(&offer)?;
        Ok(offer)
    }

    /// Appends a counter-offer. `Ok(None)` when the offer is missing or closed.
    pub fn counter(
        &self,
        offer_id: &str,
        price: Price,
        from: Side,
        caller: &str,
        message: Option<String>,
    ) -> Result<Option<Offer>, MarketError> {
        let rules = self.rules;
        self.offers.update(offer_id, |offer| {
            offer.authorize(caller, from)?;
            match offer.counter(price, from, message.clone(), rules) {
                Ok(()) => {
                    offer.bump_version();
                    Ok(Change::Write)
                }
                Err(NegotiationError::Closed(_)) => Ok(Change::Discard),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Sets a status without touching the negotiation history.
    pub fn set_status(
        &self,
        offer_id: &str,
        status: OfferStatus,
        caller: &str,
    ) -> Result<Option<Offer>, MarketError> {
        self.settle(offer_id, status, caller, None)
    }

    /// Marks an approved offer completed and records its payment reference.
    pub fn complete(
        &self,
        offer_id: &str,
        caller: &str,
        settlement: Settlement,
    ) -> Result<Option<Offer>, MarketError> {
        self.settle(offer_id, OfferStatus::Completed, caller, Some(settlement))
    }

    fn settle(
        &self,
        offer_id: &str,
        status: OfferStatus,
        caller: &str,
        settlement: Option<Settlement>,
    ) -> Result<Option<Offer>, MarketError> {
        let rules = self.rules;
        self.offers.update(offer_id, |offer| {
            authorize_status(offer, status, caller)?;
            let changed = offer.transition(status, rules)?;
            let existing = offer.settlement().cloned();
            let attached = match (&settlement, existing) {
                (Some(s), None) => {
                    offer.attach_settlement(s.clone());
                    true
                }
                (Some(s), Some(existing)) if existing != *s => {
                    return Err(MarketError::InvalidInput(format!(
                        "offer {} is already settled by {}",
                        offer.id(),
                        existing.tx_hash
                    )));
                }
                _ => false,
            };
            if !changed && !attached {
                return Ok(Change::Keep);
            }
            offer.bump_version();
            Ok(Change::Write)
        })
    }

    pub fn get(&self, offer_id: &str) -> Result<Option<Offer>, MarketError> {
        self.offers.get(offer_id)
    }

    /// Offers matching `predicate`, in creation order.
    fn select<P>(&self, predicate: P) -> Result<Vec<Offer>, MarketError>
    where
        P: Fn(&Offer) -> bool,
    {
        let mut offers = self.offers.filter(predicate)?;
        offers.sort_by(|a, b| a.created_at().cmp(b.created_at()));
        Ok(offers)
    }

    pub fn by_seller(&self, seller_id: &str) -> Result<Vec<Offer>, MarketError> {
        self.select(|o| o.seller_id() == seller_id)
    }

    pub fn by_buyer(&self, buyer_address: &str) -> Result<Vec<Offer>, MarketError> {
        self.select(|o| o.buyer_address() == buyer_address)
    }

    pub fn by_product(&self, product_id: &str) -> Result<Vec<Offer>, MarketError> {
        self.select(|o| o.product_id() == product_id)
    }

    /// Most recently created offer of this buyer on this product.
    pub fn latest_for_product(
        &self,
        product_id: &str,
        buyer_address: &str,
    ) -> Result<Option<Offer>, MarketError> {
        let offers =
            self.select(|o| o.product_id() == product_id && o.buyer_address() == buyer_address)?;
        Ok(offers.into_iter().next_back())
    }

    pub fn new_offers_count(
        &self,
        seller_id: &str,
        since: Option<&TimeStamp<Utc>>,
    ) -> Result<usize, MarketError> {
        Ok(self
            .by_seller(seller_id)?
            .iter()
            .filter(|o| o.is_new_since(since))
            .count())
    }

    pub fn completed_by_seller(&self, seller_id: &str) -> Result<Vec<Offer>, MarketError> {
        self.select(|o| o.seller_id() == seller_id && o.status() == OfferStatus::Completed)
    }

    pub fn product_sales_count(&self, product_id: &str) -> Result<usize, MarketError> {
        Ok(self
            .offers
            .filter(|o| o.product_id() == product_id && o.status() == OfferStatus::Completed)?
            .len())
    }

    /// Completed sales grouped by product, most recently sold first.
    pub fn sold_products_by_seller(
        &self,
        seller_id: &str,
    ) -> Result<Vec<ProductSales>, MarketError> {
        let mut sales: HashMap<String, ProductSales> = HashMap::new();

        for offer in self.completed_by_seller(seller_id)? {
            let sold_at = offer
                .completed_at()
                .unwrap_or_else(|| offer.updated_at())
                .clone();

            sales
                .entry(offer.product_id().to_string())
                .and_modify(|entry| {
                    entry.sales_count += 1;
                    if sold_at > entry.last_sale_at {
                        entry.last_sale_at = sold_at.clone();
                    }
                })
                .or_insert_with(|| ProductSales {
                    product_id: offer.product_id().to_string(),
                    product_name: offer.product_name().to_string(),
                    sales_count: 1,
                    last_sale_at: sold_at.clone(),
                });
        }

        let mut sales: Vec<ProductSales> = sales.into_values().collect();
        sales.sort_by(|a, b| b.last_sale_at.cmp(&a.last_sale_at));
        Ok(sales)
    }

    /// Every offer the party takes part in, plus a digest of their encoded state.
    pub fn snapshot(&self, party: &Party) -> Result<OfferSnapshot, MarketError> {
        let offers = self.select(|o| party.concerns(o))?;
        let mut contents = vec![];
        for offer in &offers {
            contents.extend(encode(offer)?);
        }
        let digest = sha256::digest(contents);
        Ok(OfferSnapshot { offers, digest })
    }

    pub fn watch(&self, party: Party) -> OfferWatch {
        OfferWatch::new(self.offers.watch(), party)
    }
}

fn authorize_status(offer: &Offer, status: OfferStatus, caller: &str) -> Result<(), MarketError> {
    match status {
        // either party may walk away
        OfferStatus::Rejected if offer.involves(caller) => Ok(()),
        _ => offer.authorize(caller, Side::Seller),
    }
}
