//! Tests for board generation.

use std::collections::HashMap;

use memorabilia::{DeckErrorKind, DeckGenerator, Difficulty, TierSpec, TierTable};
use strum::IntoEnumIterator;

#[test]
fn test_every_value_appears_exactly_twice() {
    let mut deck = DeckGenerator::seeded(TierTable::standard(), 42);
    for tier in Difficulty::iter() {
        let tiles = deck.generate(tier).expect("Generate failed");
        let pairs = TierTable::standard().pair_count(tier).expect("Tier missing");
        assert_eq!(tiles.len(), pairs * 2, "{tier} board size");

        let mut counts: HashMap<_, usize> = HashMap::new();
        for tile in &tiles {
            *counts.entry(tile.value()).or_default() += 1;
        }
        assert_eq!(counts.len(), pairs);
        assert!(counts.values().all(|&n| n == 2), "{tier}: {counts:?}");
    }
}

#[test]
fn test_tiles_start_face_down_in_position_order() {
    let mut deck = DeckGenerator::seeded(TierTable::standard(), 3);
    let tiles = deck.generate(Difficulty::Medium).expect("Generate failed");
    for (pos, tile) in tiles.iter().enumerate() {
        assert_eq!(tile.index(), pos);
        assert!(!tile.is_matched());
    }
}

#[test]
fn test_unconfigured_tier_is_invalid() {
    let table = TierTable::empty().with_tier(Difficulty::Easy, TierSpec::new(4, 10.0));
    let mut deck = DeckGenerator::seeded(table, 1);
    let err = deck.generate(Difficulty::Hard).expect_err("Hard is not configured");
    assert!(matches!(err.kind, DeckErrorKind::InvalidTier(_)));
}

#[test]
fn test_unknown_tier_code_is_invalid() {
    let mut deck = DeckGenerator::seeded(TierTable::standard(), 1);
    let err = deck.generate_code(9).expect_err("code 9 is unknown");
    assert!(matches!(err.kind, DeckErrorKind::InvalidTier(_)));
    assert_eq!(deck.generate_code(1).expect("Easy").len(), 8);
}

#[test]
fn test_zero_pair_tier_is_invalid() {
    let table = TierTable::empty().with_tier(Difficulty::Easy, TierSpec::new(0, 10.0));
    let mut deck = DeckGenerator::seeded(table, 1);
    assert!(deck.generate(Difficulty::Easy).is_err());
}

#[test]
fn test_different_seeds_shuffle_differently() {
    let boards: Vec<_> = (0..8)
        .map(|seed| {
            DeckGenerator::seeded(TierTable::standard(), seed)
                .generate(Difficulty::Hard)
                .expect("Generate failed")
        })
        .collect();
    assert!(boards.windows(2).any(|w| w[0] != w[1]));
}
