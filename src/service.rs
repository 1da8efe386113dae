//! Service layer API for marketplace negotiation
use super::catalog::{Catalog, NewProduct, Product, ProductUpdate};
use super::config::MarketConfig;
use super::error::MarketError;
use super::ledger::{OfferLedger, OfferSnapshot, ProductSales};
use super::offer::{NegotiationRules, Offer, OfferStatus, Settlement};
use super::reputation::{LoyaltyTier, Reputation, SellerProfile, SellerRating, SellerReview};
use super::reviews::{NewReview, Review, ReviewFeed};
use super::types::{Price, Side, TimeStamp};
use super::watch::{OfferWatch, Party};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct MarketService {
    instance: Arc<sled::Db>,
    config: MarketConfig,
    catalog: Catalog,
    reviews: ReviewFeed,
    ledger: OfferLedger,
}

impl MarketService {
    pub fn new(instance: Arc<sled::Db>, config: MarketConfig) -> Result<Self, MarketError> {
        let rules = NegotiationRules {
            turn_policy: config.turn_policy,
            max_history_len: config.max_history_len,
        };
        Ok(Self {
            catalog: Catalog::open(&instance)?,
            reviews: ReviewFeed::open(&instance)?,
            ledger: OfferLedger::open(&instance, rules)?,
            instance,
            config,
        })
    }

    /// Opens (or creates) the database at `config.db_path`.
    pub fn open(config: MarketConfig) -> Result<Self, MarketError> {
        let db = sled::open(&config.db_path)?;
        Self::new(Arc::new(db), config)
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Flushes dirty pages to disk.
    pub fn flush(&self) -> Result<(), MarketError> {
        self.instance.flush()?;
        Ok(())
    }

    fn reputation(&self) -> Reputation<'_> {
        Reputation::new(&self.catalog, &self.reviews, &self.ledger)
    }

    // CATALOG

    pub fn add_product(&self, seller_id: &str, draft: NewProduct) -> Result<Product, MarketError> {
        let product = self.catalog.add(seller_id, draft, &self.config)?;
        info!(product_id = %product.id(), seller = %seller_id, "Product listed");
        Ok(product)
    }

    pub fn update_product(
        &self,
        product_id: &str,
        caller: &str,
        update: ProductUpdate,
    ) -> Result<Option<Product>, MarketError> {
        let product = self
            .catalog
            .update(product_id, caller, &update, &self.config)
            .inspect_err(|e| log_rejection(e, product_id, caller))?;
        if product.is_some() {
            info!(product_id, "Product updated");
        }
        Ok(product)
    }

    pub fn delete_product(&self, product_id: &str, caller: &str) -> Result<bool, MarketError> {
        let removed = self
            .catalog
            .delete(product_id, caller, self.reviews.table())
            .inspect_err(|e| log_rejection(e, product_id, caller))?;
        if removed {
            info!(product_id, "Product deleted with its reviews");
        }
        Ok(removed)
    }

    pub fn get_product(&self, product_id: &str) -> Result<Option<Product>, MarketError> {
        self.catalog.get(product_id)
    }

    pub fn get_all_products(&self) -> Result<Vec<Product>, MarketError> {
        self.catalog.all()
    }

    pub fn get_products_by_seller(&self, seller_id: &str) -> Result<Vec<Product>, MarketError> {
        self.catalog.by_seller(seller_id)
    }

    // REVIEWS

    pub fn add_review(
        &self,
        product_id: &str,
        draft: NewReview,
    ) -> Result<Option<Review>, MarketError> {
        let review = self
            .reviews
            .add(&self.catalog, product_id, draft, &self.config)?;
        match &review {
            Some(r) => info!(product_id, review_id = %r.id, rating = r.rating, "Review added"),
            None => warn!(product_id, "Review dropped, product does not exist"),
        }
        Ok(review)
    }

    pub fn get_reviews_for_product(&self, product_id: &str) -> Result<Vec<Review>, MarketError> {
        self.reviews.for_product(product_id)
    }

    // OFFERS

    /// Opens a negotiation on `product_id` at the buyer's price.
    pub fn create_offer(
        &self,
        product_id: &str,
        seller_id: &str,
        buyer_address: &str,
        offer_price: Price,
    ) -> Result<Offer, MarketError> {
        let product = self
            .catalog
            .get(product_id)?
            .ok_or_else(|| MarketError::NotFound {
                kind: "product",
                id: product_id.to_string(),
            })?;

        if product.seller_id() != seller_id {
            return Err(MarketError::InvalidInput(format!(
                "product {product_id} is not sold by {seller_id}"
            )));
        }
        if buyer_address.trim().is_empty() {
            return Err(MarketError::InvalidInput("buyer address is required".into()));
        }
        if buyer_address == seller_id {
            return Err(MarketError::InvalidInput(
                "sellers cannot make offers on their own products".into(),
            ));
        }

        let offer = self.ledger.create(&product, buyer_address, offer_price)?;
        info!(
            offer_id = %offer.id(),
            product_id,
            buyer = %buyer_address,
            price = %offer_price,
            "Offer created"
        );
        Ok(offer)
    }

    /// Appends a counter-offer made by `caller` on behalf of `from`.
    ///
    /// `Ok(None)` when the offer does not exist or is no longer negotiable.
    pub fn create_counter_offer(
        &self,
        offer_id: &str,
        counter_price: Price,
        from: Side,
        caller: &str,
        message: Option<String>,
    ) -> Result<Option<Offer>, MarketError> {
        let message = match message.map(|m| m.trim().to_string()) {
            Some(m) if m.is_empty() => {
                return Err(MarketError::InvalidInput("message must not be blank".into()));
            }
            other => other,
        };

        let offer = self
            .ledger
            .counter(offer_id, counter_price, from, caller, message)
            .inspect_err(|e| log_rejection(e, offer_id, caller))?;

        match &offer {
            Some(o) => info!(
                offer_id,
                side = %from,
                price = %counter_price,
                round = o.negotiation_history().len(),
                "Counter-offer recorded"
            ),
            None => info!(offer_id, "Counter-offer ignored, offer missing or closed"),
        }
        Ok(offer)
    }

    /// Sets `approved`, `rejected` or `completed`. History is left untouched.
    pub fn update_offer_status(
        &self,
        offer_id: &str,
        status: OfferStatus,
        caller: &str,
    ) -> Result<Option<Offer>, MarketError> {
        if status.is_active() {
            return Err(MarketError::InvalidInput(format!(
                "status {status} cannot be set directly"
            )));
        }
        let offer = self
            .ledger
            .set_status(offer_id, status, caller)
            .inspect_err(|e| log_rejection(e, offer_id, caller))?;
        if let Some(o) = &offer {
            info!(offer_id, status = %o.status(), price = %o.offer_price(), "Offer status updated");
        }
        Ok(offer)
    }

    /// Completes an approved offer once its escrow payment has settled.
    pub fn complete_offer(
        &self,
        offer_id: &str,
        caller: &str,
        settlement: Settlement,
    ) -> Result<Option<Offer>, MarketError> {
        if settlement.tx_hash.trim().is_empty() {
            return Err(MarketError::InvalidInput("transaction hash is required".into()));
        }
        let offer = self
            .ledger
            .complete(offer_id, caller, settlement)
            .inspect_err(|e| log_rejection(e, offer_id, caller))?;
        if let Some(o) = &offer {
            info!(
                offer_id,
                tx_hash = %o.settlement().map(|s| s.tx_hash.as_str()).unwrap_or_default(),
                "Offer completed"
            );
        }
        Ok(offer)
    }

    pub fn get_offer(&self, offer_id: &str) -> Result<Option<Offer>, MarketError> {
        self.ledger.get(offer_id)
    }

    pub fn get_latest_offer_for_product(
        &self,
        product_id: &str,
        buyer_address: &str,
    ) -> Result<Option<Offer>, MarketError> {
        self.ledger.latest_for_product(product_id, buyer_address)
    }

    pub fn get_offers_by_seller(&self, seller_id: &str) -> Result<Vec<Offer>, MarketError> {
        self.ledger.by_seller(seller_id)
    }

    pub fn get_offers_by_buyer(&self, buyer_address: &str) -> Result<Vec<Offer>, MarketError> {
        self.ledger.by_buyer(buyer_address)
    }

    pub fn get_offers_by_product(&self, product_id: &str) -> Result<Vec<Offer>, MarketError> {
        self.ledger.by_product(product_id)
    }

    pub fn get_completed_offers_by_seller(
        &self,
        seller_id: &str,
    ) -> Result<Vec<Offer>, MarketError> {
        self.ledger.completed_by_seller(seller_id)
    }

    /// Notification badge count for a seller who last checked at `since`.
    pub fn get_new_offers_count(
        &self,
        seller_id: &str,
        since: Option<&TimeStamp<Utc>>,
    ) -> Result<usize, MarketError> {
        self.ledger.new_offers_count(seller_id, since)
    }

    pub fn get_product_sales_count(&self, product_id: &str) -> Result<usize, MarketError> {
        self.ledger.product_sales_count(product_id)
    }

    pub fn get_sold_products_by_seller(
        &self,
        seller_id: &str,
    ) -> Result<Vec<ProductSales>, MarketError> {
        self.ledger.sold_products_by_seller(seller_id)
    }

    // UPDATES

    pub fn seller_snapshot(&self, seller_id: &str) -> Result<OfferSnapshot, MarketError> {
        self.ledger.snapshot(&Party::Seller(seller_id.to_string()))
    }

    pub fn buyer_snapshot(&self, buyer_address: &str) -> Result<OfferSnapshot, MarketError> {
        self.ledger.snapshot(&Party::Buyer(buyer_address.to_string()))
    }

    pub fn watch_seller(&self, seller_id: &str) -> OfferWatch {
        self.ledger.watch(Party::Seller(seller_id.to_string()))
    }

    pub fn watch_buyer(&self, buyer_address: &str) -> OfferWatch {
        self.ledger.watch(Party::Buyer(buyer_address.to_string()))
    }

    // REPUTATION

    pub fn get_seller_overall_rating(&self, seller_id: &str) -> Result<SellerRating, MarketError> {
        self.reputation().seller_rating(seller_id)
    }

    pub fn get_seller_loyalty_points(&self, seller_id: &str) -> Result<u32, MarketError> {
        self.reputation().seller_loyalty_points(seller_id)
    }

    pub fn get_seller_loyalty_tier(&self, points: u32) -> LoyaltyTier {
        LoyaltyTier::from_points(points)
    }

    pub fn get_all_reviews_by_seller(
        &self,
        seller_id: &str,
    ) -> Result<Vec<SellerReview>, MarketError> {
        self.reputation().seller_reviews(seller_id)
    }

    pub fn get_seller_profile(&self, seller_id: &str) -> Result<SellerProfile, MarketError> {
        self.reputation().seller_profile(seller_id)
    }
}

fn log_rejection(error: &MarketError, target: &str, caller: &str) {
    match error {
        MarketError::Unauthorized { .. } => {
            warn!(target_id = target, caller, error = %error, "Rejected unauthorized change")
        }
        MarketError::Storage(_) | MarketError::Decode(_) | MarketError::Encode(_) => {
            warn!(target_id = target, error = %error, "Persistence failure")
        }
        _ => info!(target_id = target, error = %error, "Change rejected"),
    }
}
