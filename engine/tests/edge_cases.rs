//! Edge case tests for beacon-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use beacon_engine::{
    Batch, Buffer, BufferConfig, CorrelationToken, Delivery, DeviceTime, Error, FlushStart, Record,
    RecordData, DEVICE_TIME_MS_KEY,
};
use serde_json::{json, Value};

const T0: u64 = 1706745600000;

fn now() -> DeviceTime {
    DeviceTime::new("2024/02/01 00:00:00 +00:00", T0)
}

fn data(value: Value) -> RecordData {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

fn create_test_buffer() -> Buffer {
    Buffer::new(BufferConfig::default(), CorrelationToken::new("run-1"), T0)
}

fn started(start: FlushStart) -> beacon_engine::Flight {
    match start {
        FlushStart::Started(flight) => flight,
        other => panic!("expected a flight, got {:?}", other),
    }
}

// ============================================================================
// Record Content Edge Cases
// ============================================================================

#[test]
fn unicode_ids_and_values() {
    let mut buffer = create_test_buffer();

    let names = vec![
        "日本語テスト",      // Japanese
        "Привет мир",        // Russian
        "🎉🚀💯",            // Emoji
        "Hello\nWorld\tTab", // Whitespace
        "Null\0Test",        // Embedded null
    ];

    for name in &names {
        let record = Record::new(*name, data(json!({"label": name})), &now());
        buffer.append(record, &now()).unwrap();
    }

    let flight = started(buffer.begin_flush(T0).unwrap());
    let parsed = Batch::from_json(&flight.payload).unwrap();

    assert_eq!(parsed.ids(), names);
    for (record, name) in parsed.iter().zip(&names) {
        assert_eq!(record.get("label"), Some(&json!(name)));
    }
}

#[test]
fn whitespace_id_is_accepted() {
    // Only the empty id is malformed
    let mut buffer = create_test_buffer();
    assert!(buffer
        .append(Record::new(" ", RecordData::new(), &now()), &now())
        .is_ok());
}

#[test]
fn json_with_all_types() {
    let mut buffer = create_test_buffer();
    let payload = json!({
        "string": "hello",
        "int": 42,
        "negative": -17,
        "float": 3.25,
        "bool_true": true,
        "bool_false": false,
        "null": null,
        "array": [1, "two", 3.0, null],
        "object": {"nested": {"deep": [{"x": 1}]}},
    });

    buffer
        .append(Record::new("all_types", data(payload.clone()), &now()), &now())
        .unwrap();

    let flight = started(buffer.begin_flush(T0).unwrap());
    let parsed = Batch::from_json(&flight.payload).unwrap();
    let record = &parsed.records()[0];

    for (key, value) in payload.as_object().unwrap() {
        assert_eq!(record.get(key), Some(value), "mismatch for {}", key);
    }
}

#[test]
fn integer_boundaries() {
    let mut buffer = create_test_buffer();
    let record = Record::new(
        "bounds",
        data(json!({"max": i64::MAX, "min": i64::MIN, "umax": u64::MAX})),
        &DeviceTime::new("far future", u64::MAX),
    );
    buffer.append(record, &now()).unwrap();

    let flight = started(buffer.begin_flush(T0).unwrap());
    let parsed = Batch::from_json(&flight.payload).unwrap();
    let record = &parsed.records()[0];

    assert_eq!(record.get("max"), Some(&json!(i64::MAX)));
    assert_eq!(record.get("min"), Some(&json!(i64::MIN)));
    assert_eq!(record.get("umax"), Some(&json!(u64::MAX)));
    assert_eq!(record.device_time_ms(), Some(u64::MAX));
}

#[test]
fn unparseable_epoch_stamp_is_kept_verbatim() {
    let mut buffer = create_test_buffer();
    let record: Record = serde_json::from_value(json!({
        "record_id": "legacy",
        "record_data": {"device_time": "then", "device_time_ms": "not-a-number"}
    }))
    .unwrap();

    buffer.append(record, &now()).unwrap();

    let stored = &buffer.pending().records()[0];
    assert_eq!(stored.device_time_ms(), None);
    assert_eq!(stored.get(DEVICE_TIME_MS_KEY), Some(&json!("not-a-number")));
}

// ============================================================================
// Wire Format Edge Cases
// ============================================================================

#[test]
fn empty_batch_serializes_to_empty_array() {
    assert_eq!(Batch::new().to_json().unwrap(), "[]");
    assert!(Batch::from_json("[]").unwrap().is_empty());
}

#[test]
fn record_without_data_deserializes() {
    let batch = Batch::from_json(r#"[{"record_id": "only_id"}]"#).unwrap();
    assert_eq!(batch.ids(), vec!["only_id"]);
    assert!(batch.records()[0].data().is_empty());
}

#[test]
fn malformed_payload_is_rejected() {
    let err = Batch::from_json(r#"[{"record_data": {}}]"#).unwrap_err();
    assert!(matches!(err, Error::InvalidBatch(_)));

    let err = Batch::from_json("not json").unwrap_err();
    assert!(matches!(err, Error::InvalidBatch(_)));
}

#[test]
fn pretty_and_compact_payloads_agree() {
    let batch: Batch = (0..3)
        .map(|i| Record::new(format!("r{}", i), data(json!({"i": i})), &now()))
        .collect();

    let compact = Batch::from_json(&batch.to_json().unwrap()).unwrap();
    let pretty = Batch::from_json(&batch.to_json_pretty().unwrap()).unwrap();
    assert_eq!(compact, pretty);
}

// ============================================================================
// Retry Edge Cases
// ============================================================================

#[test]
fn repeated_failures_do_not_duplicate() {
    let mut buffer = create_test_buffer();
    for i in 1..=5 {
        buffer
            .append(Record::new(format!("r{}", i), RecordData::new(), &now()), &now())
            .unwrap();
    }

    for attempt in 0..10 {
        let flight = started(buffer.begin_flush(T0 + attempt).unwrap());
        assert_eq!(flight.records, 5);
        buffer.complete(flight.id, Delivery::Failed).unwrap();
    }

    assert_eq!(buffer.pending().ids(), vec!["r1", "r2", "r3", "r4", "r5"]);
    assert_eq!(buffer.stats().requeued, 50);
    assert_eq!(buffer.stats().flights, 10);
}

#[test]
fn failed_batch_merges_with_new_records() {
    let mut buffer = create_test_buffer();
    for i in 1..=5 {
        buffer
            .append(Record::new(format!("r{}", i), RecordData::new(), &now()), &now())
            .unwrap();
    }
    let flight = started(buffer.begin_flush(T0).unwrap());
    buffer.complete(flight.id, Delivery::Failed).unwrap();

    buffer
        .append(Record::new("r6", RecordData::new(), &now()), &now())
        .unwrap();
    let retry = started(buffer.begin_flush(T0).unwrap());
    let parsed = Batch::from_json(&retry.payload).unwrap();

    assert_eq!(parsed.ids(), vec!["r1", "r2", "r3", "r4", "r5", "r6"]);
}

#[test]
fn stale_flight_id_after_settlement() {
    let mut buffer = create_test_buffer();
    buffer
        .append(Record::new("r1", RecordData::new(), &now()), &now())
        .unwrap();
    let flight = started(buffer.begin_flush(T0).unwrap());
    buffer.complete(flight.id, Delivery::Delivered).unwrap();

    // Reporting twice must not resurrect anything
    assert!(buffer.complete(flight.id, Delivery::Failed).is_err());
    assert!(buffer.abandon(flight.id).is_err());
    assert_eq!(buffer.pending_len(), 0);
    assert_eq!(buffer.stats().delivered, 1);
}

// ============================================================================
// Correlation Token Edge Cases
// ============================================================================

#[test]
fn token_is_shared_by_all_records() {
    let mut buffer = create_test_buffer();
    for i in 0..20 {
        buffer
            .append(Record::new(format!("r{}", i), RecordData::new(), &now()), &now())
            .unwrap();
    }

    assert!(buffer
        .pending()
        .iter()
        .all(|r| r.token() == Some(buffer.token().as_str())));
}

#[test]
fn separate_buffers_keep_separate_tokens() {
    let mut a = Buffer::new(BufferConfig::default(), CorrelationToken::new("a"), T0);
    let mut b = Buffer::new(BufferConfig::default(), CorrelationToken::new("b"), T0);

    let record = Record::new("shared", RecordData::new(), &now());
    a.append(record.clone(), &now()).unwrap();
    b.append(record, &now()).unwrap();

    assert_eq!(a.pending().records()[0].token(), Some("a"));
    assert_eq!(b.pending().records()[0].token(), Some("b"));
}
