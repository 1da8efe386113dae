//! Property-based tests for the offer negotiation state machine
//!
//! These run arbitrary sequences of counter-offers and status changes against
//! a single in-memory [`Offer`] and check the invariants that must hold after
//! every step, whatever the order of operations.
//!
//! Persistence and authorization are covered by the scenario tests; here the
//! state machine is exercised on its own.

use barcel_negotiation::{
    catalog::{NewProduct, Product},
    config::TurnPolicy,
    error::NegotiationError,
    offer::{NegotiationEntry, NegotiationRules, Offer, OfferStatus},
    reputation::{LoyaltyTier, SellerRating, loyalty_points},
    types::{Price, Side},
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Counter { price: u64, from: Side },
    Status(OfferStatus),
}

fn product() -> Product {
    Product::new(
        "product1prop".into(),
        "0xseller".into(),
        NewProduct {
            name: "Beaded sandals".into(),
            description: "Leather sandals with Maasai beadwork".into(),
            images: vec!["https://images.example.com/sandals.png".into()],
            price_tiers: vec![Price::new(80).unwrap()],
            category: None,
        },
    )
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buyer), Just(Side::Seller)]
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (1u64..=10_000, side_strategy())
            .prop_map(|(price, from)| Step::Counter { price, from }),
        1 => prop_oneof![
            Just(OfferStatus::Approved),
            Just(OfferStatus::Rejected),
            Just(OfferStatus::Completed),
        ]
        .prop_map(Step::Status),
    ]
}

fn rules_strategy() -> impl Strategy<Value = NegotiationRules> {
    (
        prop_oneof![Just(TurnPolicy::Open), Just(TurnPolicy::Alternating)],
        prop::option::of(1usize..=8),
    )
        .prop_map(|(turn_policy, max_history_len)| NegotiationRules {
            turn_policy,
            max_history_len,
        })
}

fn apply(offer: &mut Offer, step: &Step, rules: NegotiationRules) {
    match step {
        Step::Counter { price, from } => {
            let _ = offer.counter(Price::new(*price).unwrap(), *from, None, rules);
        }
        Step::Status(status) => {
            let _ = offer.transition(*status, rules);
        }
    }
}

proptest! {
    /// Property: the current price always mirrors the last history entry, and the
    /// history always opens with the buyer.
    #[test]
    fn prop_price_tracks_last_entry(
        opening in 1u64..=10_000,
        steps in prop::collection::vec(step_strategy(), 0..=20),
        rules in rules_strategy(),
    ) {
        let mut offer = Offer::open(
            "offer1prop".into(),
            &product(),
            "0xbuyer".into(),
            Price::new(opening).unwrap(),
        );

        for step in &steps {
            apply(&mut offer, step, rules);

            let history = offer.negotiation_history();
            prop_assert!(!history.is_empty());
            prop_assert_eq!(history[0].from, Side::Buyer);
            prop_assert_eq!(history[0].price, Price::new(opening).unwrap());
            prop_assert_eq!(offer.offer_price(), history[history.len() - 1].price);
            if let Some(limit) = rules.max_history_len {
                prop_assert!(history.len() <= limit.max(1));
            }
        }
    }

    /// Property: history is append-only. Each accepted counter adds exactly one
    /// entry and leaves every earlier entry untouched; anything else adds none.
    #[test]
    fn prop_history_is_append_only(
        steps in prop::collection::vec(step_strategy(), 1..=20),
        rules in rules_strategy(),
    ) {
        let mut offer = Offer::open(
            "offer1prop".into(),
            &product(),
            "0xbuyer".into(),
            Price::new(100).unwrap(),
        );

        for step in &steps {
            let before: Vec<NegotiationEntry> = offer.negotiation_history().to_vec();

            let accepted = match step {
                Step::Counter { price, from } => offer
                    .counter(Price::new(*price).unwrap(), *from, None, rules)
                    .is_ok(),
                Step::Status(status) => {
                    let _ = offer.transition(*status, rules);
                    false
                }
            };

            let after = offer.negotiation_history();
            let expected_len = before.len() + usize::from(accepted);
            prop_assert_eq!(after.len(), expected_len);
            prop_assert_eq!(&after[..before.len()], &before[..]);

            if accepted {
                let counter = offer.current_counter_offer().expect("counter snapshot");
                let last = &after[after.len() - 1];
                prop_assert_eq!(counter.price, last.price);
                prop_assert_eq!(counter.from, last.from);
                prop_assert_eq!(&counter.timestamp, &last.timestamp);
                prop_assert_eq!(offer.status(), OfferStatus::CounterOffered);
            }
        }
    }

    /// Property: once rejected or completed, nothing moves the offer again.
    #[test]
    fn prop_terminal_states_are_stable(
        terminal in prop_oneof![Just(OfferStatus::Rejected), Just(OfferStatus::Completed)],
        steps in prop::collection::vec(step_strategy(), 0..=15),
    ) {
        let rules = NegotiationRules::default();
        let mut offer = Offer::open(
            "offer1prop".into(),
            &product(),
            "0xbuyer".into(),
            Price::new(100).unwrap(),
        );
        if terminal == OfferStatus::Completed {
            offer.transition(OfferStatus::Approved, rules).unwrap();
        }
        offer.transition(terminal, rules).unwrap();
        let settled = offer.clone();

        for step in &steps {
            match step {
                Step::Counter { price, from } => {
                    let err = offer
                        .counter(Price::new(*price).unwrap(), *from, None, rules)
                        .unwrap_err();
                    prop_assert_eq!(err, NegotiationError::Closed(terminal));
                }
                Step::Status(status) => {
                    let result = offer.transition(*status, rules);
                    if *status == terminal {
                        prop_assert_eq!(result, Ok(false));
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
            }
            prop_assert_eq!(&offer, &settled);
        }
    }

    /// Property: under alternation no two consecutive entries share a side.
    #[test]
    fn prop_alternation_never_repeats_a_side(
        steps in prop::collection::vec(step_strategy(), 0..=25),
    ) {
        let rules = NegotiationRules {
            turn_policy: TurnPolicy::Alternating,
            max_history_len: None,
        };
        let mut offer = Offer::open(
            "offer1prop".into(),
            &product(),
            "0xbuyer".into(),
            Price::new(100).unwrap(),
        );

        for step in &steps {
            apply(&mut offer, step, rules);
        }

        for pair in offer.negotiation_history().windows(2) {
            prop_assert_ne!(pair[0].from, pair[1].from);
        }
    }

    /// Property: loyalty tiers never decrease as points grow.
    #[test]
    fn prop_tiers_are_monotonic(a in 0u32..=200, b in 0u32..=200) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(LoyaltyTier::from_points(low) <= LoyaltyTier::from_points(high));
    }

    /// Property: volume points stop at the cap, so more reviews past 50 add nothing.
    #[test]
    fn prop_review_volume_is_capped(tenths in 10u32..=50, extra in 0usize..=500) {
        let rating = f64::from(tenths) / 10.0;
        let capped = SellerRating { rating, total_reviews: 50 };
        let beyond = SellerRating { rating, total_reviews: 50 + extra };
        prop_assert_eq!(loyalty_points(&capped), loyalty_points(&beyond));
    }
}
