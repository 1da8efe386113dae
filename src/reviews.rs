//! Review feed: append-only buyer reviews attached to products
use super::catalog::Catalog;
use super::config::MarketConfig;
use super::error::MarketError;
use super::store::{Record, Table, encode};
use super::types::TimeStamp;
use super::utils;
use chrono::Utc;
use sled::Transactional;
use sled::transaction::ConflictableTransactionError;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Review {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub product_id: String,
    #[n(2)]
    pub author: String,
    #[n(3)]
    pub rating: u8, // 1..=5
    #[n(4)]
    pub comment: String,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub author: String,
    pub rating: u8,
    pub comment: String,
}

impl NewReview {
    pub fn validate(&self, config: &MarketConfig) -> Result<(), MarketError> {
        if !(1..=5).contains(&self.rating) {
            return Err(MarketError::InvalidInput(format!(
                "rating must be between 1 and 5, got {}",
                self.rating
            )));
        }
        if self.author.trim().is_empty() {
            return Err(MarketError::InvalidInput("review author is required".into()));
        }
        if self.comment.trim().chars().count() < config.min_review_comment_len {
            return Err(MarketError::InvalidInput(format!(
                "comment must be at least {} characters",
                config.min_review_comment_len
            )));
        }
        Ok(())
    }
}

impl Review {
    // reviews of one product share this key prefix
    pub(crate) fn product_prefix(product_id: &str) -> String {
        format!("{product_id}/")
    }
}

impl Record for Review {
    const KIND: &'static str = "review";

    fn key(&self) -> String {
        format!("{}{}", Review::product_prefix(&self.product_id), self.id)
    }
}

#[derive(Clone)]
pub struct ReviewFeed {
    reviews: Table<Review>,
}

impl ReviewFeed {
    pub fn open(db: &sled::Db) -> Result<Self, MarketError> {
        Ok(Self {
            reviews: Table::open(db, "reviews")?,
        })
    }

    pub(crate) fn table(&self) -> &Table<Review> {
        &self.reviews
    }

    /// Appends a review. `Ok(None)` when the product does not exist.
    pub fn add(
        &self,
        catalog: &Catalog,
        product_id: &str,
        draft: NewReview,
        config: &MarketConfig,
    ) -> Result<Option<Review>, MarketError> {
        draft.validate(config)?;

        let review = Review {
            id: utils::new_review_id()?,
            product_id: product_id.to_string(),
            author: draft.author.trim().to_string(),
            rating: draft.rating,
            comment: draft.comment.trim().to_string(),
            created_at: TimeStamp::new(),
        };
        let key = review.key();
        let bytes = encode(&review)?;

        // existence check and append commit together
        let inserted = (catalog.table().tree(), self.reviews.tree()).transaction(
            |(products, reviews)| {
                if products.get(product_id.as_bytes())?.is_none() {
                    return Ok(false);
                }
                reviews.insert(key.as_bytes(), bytes.clone())?;
                Ok::<_, ConflictableTransactionError<MarketError>>(true)
            },
        )?;

        Ok(inserted.then_some(review))
    }

    /// Reviews of one product, oldest first.
    pub fn for_product(&self, product_id: &str) -> Result<Vec<Review>, MarketError> {
        let mut reviews = self
            .reviews
            .scan_prefix(&Review::product_prefix(product_id))?;
        reviews.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds_are_enforced() {
        let config = MarketConfig::default();
        for rating in [0u8, 6, 255] {
            let draft = NewReview {
                author: "amina".into(),
                rating,
                comment: "Arrived quickly and well packed".into(),
            };
            assert!(draft.validate(&config).is_err(), "rating {rating} accepted");
        }
        for rating in 1u8..=5 {
            let draft = NewReview {
                author: "amina".into(),
                rating,
                comment: "Arrived quickly and well packed".into(),
            };
            assert!(draft.validate(&config).is_ok());
        }
    }

    #[test]
    fn short_comment_is_rejected() {
        let draft = NewReview {
            author: "amina".into(),
            rating: 4,
            comment: "   ok    ".into(),
        };
        assert!(draft.validate(&MarketConfig::default()).is_err());
    }
}
