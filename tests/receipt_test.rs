//! Tests for receipt and read-result decoding.

use memorabilia::{
    Difficulty, DomainEvent, RawOutcome, RawReceipt, ReceiptEventExtractor, ReceiptSchema,
    SessionStatus,
};
use serde_json::json;

fn rpc07(events: serde_json::Value) -> RawOutcome {
    RawOutcome::Receipt(RawReceipt::new(
        ReceiptSchema::Rpc07,
        "0xabc".to_string(),
        json!({
            "transaction_hash": "0xabc",
            "execution_status": "SUCCEEDED",
            "finality_status": "ACCEPTED_ON_L2",
            "events": events,
        }),
    ))
}

#[test]
fn test_local_events_pass_through() {
    let extractor = ReceiptEventExtractor::new();
    let outcome = RawOutcome::Event(DomainEvent::Matched);
    assert_eq!(extractor.decode(&outcome).expect("decode"), DomainEvent::Matched);
}

#[test]
fn test_first_known_event_wins() {
    let extractor = ReceiptEventExtractor::new();
    let outcome = rpc07(json!([
        { "from_address": "0x1", "keys": ["0xfee"], "data": ["0x1"] },
        { "keys": ["memorabilia::systems::actions::GameStarted"], "data": ["0x2a", "0x99"] },
        { "keys": ["CardFlipped"], "data": ["0x2a", "3"] },
    ]));
    assert_eq!(
        extractor.decode(&outcome).expect("decode"),
        DomainEvent::Started { session_ref: 42 }
    );
}

#[test]
fn test_card_flipped_payload_carries_index() {
    let extractor = ReceiptEventExtractor::new();
    let outcome = rpc07(json!([{ "keys": ["CardFlipped"], "data": ["7", "0x5"] }]));
    assert_eq!(
        extractor.decode(&outcome).expect("decode"),
        DomainEvent::Flipped { tile_index: 5 }
    );
}

#[test]
fn test_suffix_match_requires_path_separator() {
    let extractor = ReceiptEventExtractor::new();
    let outcome = rpc07(json!([{ "keys": ["NotGameStarted"], "data": ["1"] }]));
    assert!(extractor.decode(&outcome).is_err());
}

#[test]
fn test_missing_event_has_no_fallback() {
    let extractor = ReceiptEventExtractor::new();
    let outcome = rpc07(json!([]));
    let err = extractor.decode(&outcome).expect_err("no event");
    assert!(err.message.contains("no game event"), "{err}");
}

#[test]
fn test_truncated_payload_is_malformed() {
    let extractor = ReceiptEventExtractor::new();
    let outcome = rpc07(json!([{ "keys": ["GameStarted"], "data": [] }]));
    assert!(extractor.decode(&outcome).is_err());
}

#[test]
fn test_reverted_receipt_is_rejected() {
    let extractor = ReceiptEventExtractor::new();
    let outcome = RawOutcome::Receipt(RawReceipt::new(
        ReceiptSchema::Rpc07,
        "0xdead".to_string(),
        json!({
            "transaction_hash": "0xdead",
            "execution_status": "REVERTED",
            "finality_status": "ACCEPTED_ON_L2",
            "revert_reason": "card already flipped",
            "events": [{ "keys": ["CardFlipped"], "data": ["1", "2"] }],
        }),
    ));
    let err = extractor.decode(&outcome).expect_err("reverted");
    assert!(err.message.contains("card already flipped"));
}

#[test]
fn test_legacy_schema_reads_status_field() {
    let extractor = ReceiptEventExtractor::new();
    let ok = RawOutcome::Receipt(RawReceipt::new(
        ReceiptSchema::Legacy,
        "0x1".to_string(),
        json!({
            "transaction_hash": "0x1",
            "status": "ACCEPTED_ON_L2",
            "events": [{ "keys": ["CardsMismatched"], "data": [] }],
        }),
    ));
    assert_eq!(extractor.decode(&ok).expect("decode"), DomainEvent::Mismatched);

    let rejected = RawOutcome::Receipt(RawReceipt::new(
        ReceiptSchema::Legacy,
        "0x2".to_string(),
        json!({ "transaction_hash": "0x2", "status": "REJECTED" }),
    ));
    assert!(extractor.decode(&rejected).is_err());
}

#[test]
fn test_schema_mismatch_fails_closed() {
    let extractor = ReceiptEventExtractor::new();
    let legacy_body_declared_rpc07 = RawOutcome::Receipt(RawReceipt::new(
        ReceiptSchema::Rpc07,
        "0x3".to_string(),
        json!({
            "transaction_hash": "0x3",
            "status": "ACCEPTED_ON_L2",
            "events": [{ "keys": ["CardsMatched"], "data": [] }],
        }),
    ));
    assert!(extractor.decode(&legacy_body_declared_rpc07).is_err());
}

fn game_felts() -> Vec<String> {
    let mut felts: Vec<String> = vec!["0x9", "0xa11ce", "1", "8"]
        .into_iter()
        .map(String::from)
        .collect();
    // values 0,1,2,3 each twice; tiles 0 and 4 matched
    for (value, matched) in [(0, 1), (1, 0), (2, 0), (3, 0), (0, 1), (1, 0), (2, 0), (3, 0)] {
        felts.push(value.to_string());
        felts.push(matched.to_string());
    }
    felts.extend(
        [
            "1",          // flipped_count
            "2",          // flipped
            "1",          // matched_count
            "4",          // total_pairs
            "3",          // moves
            "14000",      // score
            "1700000000", // started_at
            "0",          // completed_at
            "0",          // status
        ]
        .map(String::from),
    );
    felts
}

#[test]
fn test_get_game_felts_decode_into_session() {
    let extractor = ReceiptEventExtractor::new();
    let session = extractor
        .decode_state(&RawOutcome::CallResult(game_felts()))
        .expect("decode_state");
    assert_eq!(*session.id(), 9);
    assert_eq!(session.player_id(), "0xa11ce");
    assert_eq!(*session.difficulty(), Difficulty::Easy);
    assert_eq!(session.tiles().len(), 8);
    assert!(session.tiles()[0].is_matched());
    assert!(session.tiles()[4].is_matched());
    assert_eq!(session.face_up(), &vec![2]);
    assert_eq!(*session.matched_pairs(), 1);
    assert_eq!(*session.moves(), 3);
    assert_eq!(*session.score(), 14_000);
    assert_eq!(session.started_at().timestamp(), 1_700_000_000);
    assert!(session.completed_at().is_none());
    assert_eq!(*session.status(), SessionStatus::Active);
}

#[test]
fn test_get_game_rejects_trailing_and_truncated_felts() {
    let extractor = ReceiptEventExtractor::new();
    let mut long = game_felts();
    long.push("0".to_string());
    assert!(extractor.decode_state(&RawOutcome::CallResult(long)).is_err());

    let mut short = game_felts();
    short.pop();
    assert!(extractor.decode_state(&RawOutcome::CallResult(short)).is_err());
}

#[test]
fn test_events_are_not_state() {
    let extractor = ReceiptEventExtractor::new();
    assert!(extractor
        .decode_state(&RawOutcome::Event(DomainEvent::Matched))
        .is_err());
}
