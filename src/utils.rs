//! Identifier minting
use super::error::MarketError;
use bech32::Bech32m;
use uuid7::uuid7;

pub const PRODUCT_HRP: &str = "product";
pub const REVIEW_HRP: &str = "review";
pub const OFFER_HRP: &str = "offer";

// construct a unique, time-ordered id then encode using bech32m
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String, MarketError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| MarketError::Identifier(e.to_string()))?;
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| MarketError::Identifier(e.to_string()))
}

pub fn new_product_id() -> Result<String, MarketError> {
    new_uuid_to_bech32(PRODUCT_HRP)
}

pub fn new_review_id() -> Result<String, MarketError> {
    new_uuid_to_bech32(REVIEW_HRP)
}

pub fn new_offer_id() -> Result<String, MarketError> {
    new_uuid_to_bech32(OFFER_HRP)
}
