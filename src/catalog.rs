//! Catalog repository: seller listings and their price tiers
use super::config::MarketConfig;
use super::error::MarketError;
use super::reviews::Review;
use super::store::{Change, Record, Table};
use super::types::{Price, TimeStamp};
use super::utils;
use chrono::Utc;
use sled::Transactional;
use sled::transaction::ConflictableTransactionError;
use tracing::debug;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Product {
    #[n(0)]
    id: String,
    #[n(1)]
    name: String,
    #[n(2)]
    description: String,
    #[n(3)]
    images: Vec<String>,
    #[n(4)]
    seller_id: String, // wallet address of the owning seller
    #[n(5)]
    price_tiers: Vec<Price>,
    #[n(6)]
    category: Option<String>,
    #[n(7)]
    created_at: TimeStamp<Utc>,
}

/// Seller-supplied fields for a new listing.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    pub price_tiers: Vec<Price>,
    pub category: Option<String>,
}

/// Partial edit of a listing. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
    pub price_tiers: Option<Vec<Price>>,
    /// `Some(None)` clears the category.
    pub category: Option<Option<String>>,
}

impl Product {
    pub fn new(id: String, seller_id: String, draft: NewProduct) -> Self {
        Self {
            id,
            name: draft.name.trim().to_string(),
            description: draft.description.trim().to_string(),
            images: draft.images,
            seller_id,
            price_tiers: draft.price_tiers,
            category: draft.category,
            created_at: TimeStamp::new(),
        }
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn images(&self) -> &[String] {
        &self.images
    }
    pub fn seller_id(&self) -> &str {
        &self.seller_id
    }
    pub fn price_tiers(&self) -> &[Price] {
        &self.price_tiers
    }
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
    pub fn created_at(&self) -> &TimeStamp<Utc> {
        &self.created_at
    }
    /// Lowest seller-defined starting point for negotiation.
    pub fn lowest_tier(&self) -> Option<Price> {
        self.price_tiers.iter().min().copied()
    }
    fn apply(&mut self, update: &ProductUpdate) {
        if let Some(name) = &update.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = &update.description {
            self.description = description.trim().to_string();
        }
        if let Some(images) = &update.images {
            self.images = images.clone();
        }
        if let Some(tiers) = &update.price_tiers {
            self.price_tiers = tiers.clone();
        }
        if let Some(category) = &update.category {
            self.category = category.clone();
        }
    }
    /// Checks the listing against the configured minimums.
    pub fn validate(&self, config: &MarketConfig) -> Result<(), MarketError> {
        if self.name.chars().count() < config.min_product_name_len {
            return Err(MarketError::InvalidInput(format!(
                "product name must be at least {} characters",
                config.min_product_name_len
            )));
        }
        if self.description.chars().count() < config.min_description_len {
            return Err(MarketError::InvalidInput(format!(
                "description must be at least {} characters",
                config.min_description_len
            )));
        }
        if self.images.is_empty() {
            return Err(MarketError::InvalidInput(
                "at least one image is required".into(),
            ));
        }
        for image in &self.images {
            url::Url::parse(image).map_err(|e| {
                MarketError::InvalidInput(format!(
                    "image reference {image} is not a valid URL: {e}"
                ))
            })?;
        }
        // Price itself guarantees each tier is positive
        if self.price_tiers.is_empty() {
            return Err(MarketError::InvalidInput(
                "at least one price tier is required".into(),
            ));
        }
        Ok(())
    }
}

impl Record for Product {
    const KIND: &'static str = "product";

    fn key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Clone)]
pub struct Catalog {
    products: Table<Product>,
}

impl Catalog {
    pub fn open(db: &sled::Db) -> Result<Self, MarketError> {
        Ok(Self {
            products: Table::open(db, "products")?,
        })
    }

    pub(crate) fn table(&self) -> &Table<Product> {
        &self.products
    }

    pub fn get(&self, product_id: &str) -> Result<Option<Product>, MarketError> {
        self.products.get(product_id)
    }

    pub fn all(&self) -> Result<Vec<Product>, MarketError> {
        let mut products = self.products.list()?;
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(products)
    }

    pub fn by_seller(&self, seller_id: &str) -> Result<Vec<Product>, MarketError> {
        let mut products = self.products.filter(|p| p.seller_id == seller_id)?;
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(products)
    }

    pub fn add(
        &self,
        seller_id: &str,
        draft: NewProduct,
        config: &MarketConfig,
    ) -> Result<Product, MarketError> {
        let product = Product::new(utils::new_product_id()?, seller_id.to_string(), draft);
        product.validate(config)?;
        self.products.insert_new(&product)?;
        Ok(product)
    }

    /// Applies an owner edit. `Ok(None)` when the product does not exist.
    pub fn update(
        &self,
        product_id: &str,
        caller: &str,
        update: &ProductUpdate,
        config: &MarketConfig,
    ) -> Result<Option<Product>, MarketError> {
        self.products.update(product_id, |product| {
            ensure_owner(product, caller)?;
            product.apply(update);
            product.validate(config)?;
            Ok(Change::Write)
        })
    }

    /// Removes the product together with its reviews in one transaction.
    pub fn delete(
        &self,
        product_id: &str,
        caller: &str,
        reviews: &Table<Review>,
    ) -> Result<bool, MarketError> {
        let Some(product) = self.products.get(product_id)? else {
            return Ok(false);
        };
        ensure_owner(&product, caller)?;

        let review_keys = reviews.keys_with_prefix(&Review::product_prefix(product_id))?;

        let removed = (self.products.tree(), reviews.tree()).transaction(|(products, reviews)| {
            if products.remove(product_id.as_bytes())?.is_none() {
                return Ok(false);
            }
            for key in &review_keys {
                reviews.remove(key.clone())?;
            }
            Ok::<_, ConflictableTransactionError<MarketError>>(true)
        })?;

        if removed {
            // a review committed after the key scan survives the transaction
            let stragglers = purge_reviews(reviews, product_id)?;
            if stragglers > 0 {
                debug!(product_id, stragglers, "Removed reviews added during product delete");
            }
        }
        Ok(removed)
    }
}

/// Drops every review row under `product_id`, returning how many were removed.
fn purge_reviews(reviews: &Table<Review>, product_id: &str) -> Result<usize, MarketError> {
    let mut purged = 0;
    for key in reviews.keys_with_prefix(&Review::product_prefix(product_id))? {
        if reviews.tree().remove(key)?.is_some() {
            purged += 1;
        }
    }
    Ok(purged)
}

fn ensure_owner(product: &Product, caller: &str) -> Result<(), MarketError> {
    if product.seller_id != caller {
        return Err(MarketError::Unauthorized {
            caller: caller.to_string(),
            resource: format!("product {}", product.id),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewProduct {
        NewProduct {
            name: "Hand-woven basket".into(),
            description: "Sisal basket woven in Kisumu".into(),
            images: vec!["https://images.example.com/basket.png".into()],
            price_tiers: vec![Price::new(150).unwrap(), Price::new(120).unwrap()],
            category: Some("premium".into()),
        }
    }

    #[test]
    fn valid_listing_passes() {
        let product = Product::new("product1x".into(), "0xseller".into(), draft());
        assert!(product.validate(&MarketConfig::default()).is_ok());
        assert_eq!(product.lowest_tier(), Some(Price::new(120).unwrap()));
    }

    #[test]
    fn rejects_short_name_and_bad_images() {
        let config = MarketConfig::default();

        let mut short = draft();
        short.name = "ab".into();
        let product = Product::new("product1x".into(), "0xseller".into(), short);
        assert!(product.validate(&config).is_err());

        let mut broken = draft();
        broken.images = vec!["not a url".into()];
        let product = Product::new("product1x".into(), "0xseller".into(), broken);
        assert!(product.validate(&config).is_err());

        let mut untiered = draft();
        untiered.price_tiers.clear();
        let product = Product::new("product1x".into(), "0xseller".into(), untiered);
        assert!(product.validate(&config).is_err());
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut product = Product::new("product1x".into(), "0xseller".into(), draft());
        product.apply(&ProductUpdate {
            name: Some("  Large basket ".into()),
            ..Default::default()
        });

        assert_eq!(product.name(), "Large basket");
        assert_eq!(product.description(), "Sisal basket woven in Kisumu");
        assert_eq!(product.price_tiers().len(), 2);
    }

    #[test]
    fn category_can_be_changed_or_cleared() {
        let mut product = Product::new("product1x".into(), "0xseller".into(), draft());

        product.apply(&ProductUpdate {
            category: Some(Some("home".into())),
            ..Default::default()
        });
        assert_eq!(product.category(), Some("home"));

        product.apply(&ProductUpdate::default());
        assert_eq!(product.category(), Some("home"));

        product.apply(&ProductUpdate {
            category: Some(None),
            ..Default::default()
        });
        assert_eq!(product.category(), None);
    }

    #[test]
    fn purge_clears_reviews_left_under_a_deleted_product() -> anyhow::Result<()> {
        let db = sled::Config::new().temporary(true).open()?;
        let catalog = Catalog::open(&db)?;
        let reviews: Table<Review> = Table::open(&db, "reviews")?;

        let product = catalog.add("0xseller", draft(), &MarketConfig::default())?;
        let review = |id: &str, product_id: &str| Review {
            id: id.into(),
            product_id: product_id.into(),
            author: "akinyi".into(),
            rating: 4,
            comment: "Sturdy and well finished".into(),
            created_at: TimeStamp::new(),
        };
        reviews.insert_new(&review("review1a", product.id()))?;
        reviews.insert_new(&review("review1b", "product1other"))?;

        assert!(catalog.delete(product.id(), "0xseller", &reviews)?);
        assert!(reviews.scan_prefix(&Review::product_prefix(product.id()))?.is_empty());

        // a row written after the delete committed, as a racing add would leave it
        reviews.insert_new(&review("review1c", product.id()))?;
        assert_eq!(purge_reviews(&reviews, product.id())?, 1);
        assert_eq!(purge_reviews(&reviews, product.id())?, 0);

        let survivors = reviews.list()?;
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].product_id, "product1other");
        Ok(())
    }
}
