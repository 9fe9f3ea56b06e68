//! Tests for score, star and grade computation.

use memorabilia::{
    Difficulty, Grade, ScoringEngine, ScoringErrorKind, ScoringRules, TierTable,
};

fn engine() -> ScoringEngine {
    ScoringEngine::new(TierTable::standard())
}

#[test]
fn test_perfect_easy_game_has_no_penalty() {
    let scoring = engine();
    // (1000 + 500) * 10
    assert_eq!(scoring.score(Difficulty::Easy, 4, 0.0).expect("score"), 15_000);
    let rating = scoring.rate(Difficulty::Easy, 4, 0.0).expect("rate");
    assert_eq!(rating.stars().count(), 3);
    assert_eq!(*rating.grade(), Grade::S);
}

#[test]
fn test_time_bonus_decays_and_bottoms_out() {
    let scoring = engine();
    // (1000 + (500 - 2 * 60)) * 10
    assert_eq!(scoring.score(Difficulty::Easy, 4, 60.0).expect("score"), 13_800);
    assert_eq!(scoring.score(Difficulty::Easy, 4, 250.0).expect("score"), 10_000);
    assert_eq!(scoring.score(Difficulty::Easy, 4, 10_000.0).expect("score"), 10_000);
}

#[test]
fn test_extra_moves_cost_fifty_each() {
    let scoring = engine();
    // (1000 + 500 - 3 * 50) * 15
    assert_eq!(scoring.score(Difficulty::Medium, 11, 0.0).expect("score"), 20_250);
}

#[test]
fn test_score_never_negative() {
    let scoring = engine();
    assert_eq!(scoring.score(Difficulty::Hard, 500, 9_999.0).expect("score"), 0);
}

#[test]
fn test_score_non_increasing_in_moves_and_time() {
    let scoring = engine();
    for tier in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        let mut last = u64::MAX;
        for moves in 0..60 {
            let s = scoring.score(tier, moves, 30.0).expect("score");
            assert!(s <= last, "{tier} moves {moves}");
            last = s;
        }
        let mut last = u64::MAX;
        for secs in 0..400 {
            let s = scoring.score(tier, 10, f64::from(secs) * 0.75).expect("score");
            assert!(s <= last, "{tier} secs {secs}");
            last = s;
        }
    }
}

#[test]
fn test_negative_or_nan_elapsed_rejected() {
    let scoring = engine();
    for bad in [-1.0, f64::NAN, f64::INFINITY] {
        let err = scoring
            .score(Difficulty::Easy, 4, bad)
            .expect_err("invalid elapsed must fail");
        assert!(matches!(err.kind, ScoringErrorKind::InvalidInput(_)));
    }
}

#[test]
fn test_star_thresholds() {
    let stars = |moves| ScoringEngine::stars(moves, 10).expect("stars").count();
    assert_eq!(stars(10), 3);
    assert_eq!(stars(11), 3);
    assert_eq!(stars(12), 2);
    assert_eq!(stars(15), 2);
    assert_eq!(stars(16), 1);
    assert!(ScoringEngine::stars(4, 0).is_err());
}

#[test]
fn test_grade_bands() {
    assert_eq!(ScoringEngine::grade(12_000), Grade::S);
    assert_eq!(ScoringEngine::grade(11_999), Grade::A);
    assert_eq!(ScoringEngine::grade(10_000), Grade::B);
    assert_eq!(ScoringEngine::grade(9_000), Grade::C);
    assert_eq!(ScoringEngine::grade(8_000), Grade::D);
    assert_eq!(ScoringEngine::grade(7_999), Grade::F);
}

#[test]
fn test_optimal_moves_is_pair_count() {
    let scoring = engine();
    assert_eq!(scoring.optimal_moves(Difficulty::Easy).expect("easy"), 4);
    assert_eq!(scoring.optimal_moves(Difficulty::Medium).expect("medium"), 8);
    assert_eq!(scoring.optimal_moves(Difficulty::Hard).expect("hard"), 12);
}

#[test]
fn test_custom_rules_drive_the_formula() {
    assert_eq!(*engine().rules(), ScoringRules::default());
    assert_eq!(*engine().rules().base_score(), 1000.0);

    let rules = ScoringRules::new(2000.0, 100.0, 1.0, 100.0);
    let scoring = ScoringEngine::with_rules(TierTable::standard(), rules);
    assert_eq!(*scoring.rules(), rules);
    // (2000 + (100 - 40) - 2 * 100) * 10
    assert_eq!(scoring.score(Difficulty::Easy, 6, 40.0).expect("score"), 18_600);
}
