//! Offer/counter-offer negotiation and seller reputation for the Barcel marketplace.
//!
//! Buyers open an [`offer::Offer`] on a listing, both sides append counter
//! proposals, and the seller approves or rejects it. Completed offers and
//! product reviews feed the seller's rating and loyalty tier.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod offer;
pub mod reputation;
pub mod reviews;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;
pub mod watch;
