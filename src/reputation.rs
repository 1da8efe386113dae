//! Seller reputation derived from reviews and completed sales
//!
//! Nothing here is cached: every figure is recomputed from the catalog,
//! review feed and ledger at read time.
use super::catalog::Catalog;
use super::error::MarketError;
use super::ledger::OfferLedger;
use super::reviews::{Review, ReviewFeed};
use std::fmt;

/// Review volume stops earning points past this many reviews.
pub const REVIEW_POINTS_CAP: usize = 50;
pub const PERFECT_RATING_BONUS: f64 = 20.0;
pub const HIGH_RATING_BONUS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SellerRating {
    /// Mean rating rounded to one decimal place, 0 when unreviewed.
    pub rating: f64,
    pub total_reviews: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoyaltyTier {
    Unrated,
    New,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

/// A review together with the listing it was written for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerReview {
    pub review: Review,
    pub product_id: String,
    pub product_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SellerProfile {
    pub seller_id: String,
    pub rating: SellerRating,
    pub loyalty_points: u32,
    pub tier: LoyaltyTier,
    pub completed_sales: usize,
}

pub fn overall_rating<'a, I>(reviews: I) -> SellerRating
where
    I: IntoIterator<Item = &'a Review>,
{
    let (sum, count) = reviews
        .into_iter()
        .fold((0u64, 0usize), |(sum, count), r| (sum + u64::from(r.rating), count + 1));

    if count == 0 {
        return SellerRating {
            rating: 0.0,
            total_reviews: 0,
        };
    }
    let mean = sum as f64 / count as f64;
    SellerRating {
        rating: (mean * 10.0).round() / 10.0,
        total_reviews: count,
    }
}

pub fn loyalty_points(rating: &SellerRating) -> u32 {
    if rating.total_reviews == 0 {
        return 0;
    }
    let rating_points = rating.rating * 10.0;
    let volume_points = rating.total_reviews.min(REVIEW_POINTS_CAP) as f64;
    let perfect_bonus = if rating.rating >= 5.0 {
        PERFECT_RATING_BONUS
    } else {
        0.0
    };
    let high_bonus = if rating.rating >= 4.5 && rating.rating < 5.0 {
        HIGH_RATING_BONUS
    } else {
        0.0
    };

    (rating_points + volume_points + perfect_bonus + high_bonus).round() as u32
}

impl LoyaltyTier {
    pub fn from_points(points: u32) -> Self {
        match points {
            100.. => LoyaltyTier::Platinum,
            75.. => LoyaltyTier::Gold,
            50.. => LoyaltyTier::Silver,
            25.. => LoyaltyTier::Bronze,
            1.. => LoyaltyTier::New,
            0 => LoyaltyTier::Unrated,
        }
    }
    pub fn label(&self) -> &'static str {
        match self {
            LoyaltyTier::Platinum => "Platinum",
            LoyaltyTier::Gold => "Gold",
            LoyaltyTier::Silver => "Silver",
            LoyaltyTier::Bronze => "Bronze",
            LoyaltyTier::New => "New",
            LoyaltyTier::Unrated => "Unrated",
        }
    }
    /// Presentation hint: a text colour class for badges.
    pub fn color(&self) -> &'static str {
        match self {
            LoyaltyTier::Platinum => "text-purple-400",
            LoyaltyTier::Gold => "text-yellow-400",
            LoyaltyTier::Silver => "text-gray-300",
            LoyaltyTier::Bronze => "text-orange-400",
            LoyaltyTier::New => "text-blue-400",
            LoyaltyTier::Unrated => "text-muted-foreground",
        }
    }
    /// Presentation hint: a badge glyph.
    pub fn icon(&self) -> &'static str {
        match self {
            LoyaltyTier::Platinum => "💎",
            LoyaltyTier::Gold => "⭐",
            LoyaltyTier::Silver => "🥈",
            LoyaltyTier::Bronze => "🥉",
            LoyaltyTier::New => "🌱",
            LoyaltyTier::Unrated => "📊",
        }
    }
}

impl fmt::Display for LoyaltyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-only view joining the listings, reviews and sales of sellers.
pub struct Reputation<'a> {
    catalog: &'a Catalog,
    reviews: &'a ReviewFeed,
    ledger: &'a OfferLedger,
}

impl<'a> Reputation<'a> {
    pub fn new(catalog: &'a Catalog, reviews: &'a ReviewFeed, ledger: &'a OfferLedger) -> Self {
        Self {
            catalog,
            reviews,
            ledger,
        }
    }

    /// All reviews on the seller's listings, most recent first.
    pub fn seller_reviews(&self, seller_id: &str) -> Result<Vec<SellerReview>, MarketError> {
        let mut collected = vec![];
        for product in self.catalog.by_seller(seller_id)? {
            for review in self.reviews.for_product(product.id())? {
                collected.push(SellerReview {
                    review,
                    product_id: product.id().to_string(),
                    product_name: product.name().to_string(),
                });
            }
        }
        collected.sort_by(|a, b| b.review.created_at.cmp(&a.review.created_at));
        Ok(collected)
    }

    pub fn seller_rating(&self, seller_id: &str) -> Result<SellerRating, MarketError> {
        let reviews = self.seller_reviews(seller_id)?;
        Ok(overall_rating(reviews.iter().map(|r| &r.review)))
    }

    pub fn seller_loyalty_points(&self, seller_id: &str) -> Result<u32, MarketError> {
        Ok(loyalty_points(&self.seller_rating(seller_id)?))
    }

    pub fn seller_profile(&self, seller_id: &str) -> Result<SellerProfile, MarketError> {
        let rating = self.seller_rating(seller_id)?;
        let loyalty_points = loyalty_points(&rating);
        Ok(SellerProfile {
            seller_id: seller_id.to_string(),
            rating,
            loyalty_points,
            tier: LoyaltyTier::from_points(loyalty_points),
            completed_sales: self.ledger.completed_by_seller(seller_id)?.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeStamp;

    fn review(rating: u8) -> Review {
        Review {
            id: format!("review1{rating}"),
            product_id: "product1x".into(),
            author: "wanjiru".into(),
            rating,
            comment: "Exactly as described".into(),
            created_at: TimeStamp::new(),
        }
    }

    #[test]
    fn unreviewed_seller_is_zero() {
        let none: Vec<Review> = vec![];
        let rating = overall_rating(&none);
        assert_eq!(
            rating,
            SellerRating {
                rating: 0.0,
                total_reviews: 0
            }
        );
        assert_eq!(loyalty_points(&rating), 0);
        assert_eq!(LoyaltyTier::from_points(0), LoyaltyTier::Unrated);
    }

    #[test]
    fn mean_rounds_to_one_decimal() {
        let reviews = [review(5), review(5), review(4)];
        let rating = overall_rating(&reviews);

        assert_eq!(rating.rating, 4.7);
        assert_eq!(rating.total_reviews, 3);
    }

    #[test]
    fn points_reward_quality_and_volume() {
        let perfect = SellerRating {
            rating: 5.0,
            total_reviews: 10,
        };
        assert_eq!(loyalty_points(&perfect), 80);

        let busy = SellerRating {
            rating: 4.6,
            total_reviews: 60,
        };
        assert_eq!(loyalty_points(&busy), 106);

        let middling = SellerRating {
            rating: 3.2,
            total_reviews: 4,
        };
        assert_eq!(loyalty_points(&middling), 36);
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(LoyaltyTier::from_points(80), LoyaltyTier::Gold);
        assert_eq!(LoyaltyTier::from_points(30), LoyaltyTier::Bronze);
        assert_eq!(LoyaltyTier::from_points(100), LoyaltyTier::Platinum);
        assert_eq!(LoyaltyTier::from_points(75), LoyaltyTier::Gold);
        assert_eq!(LoyaltyTier::from_points(50), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::from_points(24), LoyaltyTier::New);
        assert_eq!(LoyaltyTier::from_points(1), LoyaltyTier::New);
        assert_eq!(LoyaltyTier::Gold.to_string(), "Gold");
        assert_eq!(LoyaltyTier::Gold.icon(), "⭐");
    }
}
