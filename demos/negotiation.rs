//! Walks one listing through a full negotiation and prints the seller's
//! standing afterwards.
//!
//! ```sh
//! RUST_LOG=barcel_negotiation=debug cargo run --example negotiation
//! ```
//!
//! Settings come from `barcel.toml` / `BARCEL_*` as usual, but the database
//! lives in a scratch directory so repeated runs start clean.
use anyhow::Context;
use barcel_negotiation::{
    catalog::NewProduct,
    config::MarketConfig,
    offer::{OfferStatus, Settlement},
    reviews::NewReview,
    service::MarketService,
    types::{Price, Side},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const SELLER: &str = "0x5e11e700000000000000000000000000000000a1";
const BUYER: &str = "0xb0ye7000000000000000000000000000000000b2";

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
    let mut config = MarketConfig::load()?;
    config.db_path = scratch
        .path()
        .join("demo.db")
        .to_string_lossy()
        .into_owned();
    let service = MarketService::open(config).context("Failed to open marketplace database")?;

    let listing = service.add_product(
        SELLER,
        NewProduct {
            name: "Kikoi throw".into(),
            description: "Hand-loomed cotton kikoi from Lamu, 180 by 100 cm".into(),
            images: vec!["https://images.example.com/kikoi.png".into()],
            price_tiers: vec![Price::new(55)?, Price::new(45)?],
            category: Some("textiles".into()),
        },
    )?;

    let mut updates = service.watch_seller(SELLER);
    let offer = service.create_offer(listing.id(), SELLER, BUYER, Price::new(30)?)?;
    // the seller answers with their floor price
    let floor = listing
        .lowest_tier()
        .context("Listing has no price tiers")?;
    service.create_counter_offer(offer.id(), floor, Side::Seller, SELLER, None)?;
    service.create_counter_offer(
        offer.id(),
        Price::new(40)?,
        Side::Buyer,
        BUYER,
        Some("Would you take 40?".into()),
    )?;
    service.update_offer_status(offer.id(), OfferStatus::Approved, SELLER)?;
    let settled = service
        .complete_offer(
            offer.id(),
            SELLER,
            Settlement {
                tx_hash: "0x9f3c1d".into(),
                purchase_id: "escrow-1".into(),
            },
        )?
        .context("Offer vanished before completion")?;

    let interval = service.config().watch_interval();
    println!("updates for {:?}", updates.party());
    let mut seen = 0;
    while let Some(change) = updates.next_timeout(interval)? {
        seen += 1;
        let turn = change.awaiting().map_or("nobody", |side| side.as_str());
        println!(
            "update {seen}: offer {} is {} at {}, waiting on {turn}",
            change.id(),
            change.status(),
            change.offer_price()
        );
        if change.status() == OfferStatus::Completed {
            break;
        }
    }

    println!("offer {} settled at {}", settled.id(), settled.offer_price());
    for entry in settled.negotiation_history() {
        println!(
            "  {:<6} {:>4}  {}",
            entry.from.as_str(),
            entry.price.amount(),
            entry.message.as_deref().unwrap_or("")
        );
    }

    service.add_review(
        listing.id(),
        NewReview {
            author: "zawadi".into(),
            rating: 5,
            comment: "Soft, generous size and quick delivery".into(),
        },
    )?;

    let profile = service.get_seller_profile(SELLER)?;
    println!(
        "seller {}: {} {} ({} points, rating {:.1} over {} reviews, {} sales)",
        profile.seller_id,
        profile.tier.icon(),
        profile.tier,
        profile.loyalty_points,
        profile.rating.rating,
        profile.rating.total_reviews,
        profile.completed_sales
    );

    service.flush()?;
    Ok(())
}
