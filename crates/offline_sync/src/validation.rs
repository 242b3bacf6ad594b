//! Record validation before transmission.

use offline_store::StoredRecord;
use serde_json::Value;

/// Payload field holding the exercise reference
pub const EXERCISE_REF_FIELD: &str = "uebung_id";

/// Whether a record carries a usable exercise reference
///
/// A reference is usable when it is a finite, non-zero number or a string
/// that parses as one. Records failing this check are never sent.
pub fn has_exercise_ref(record: &StoredRecord) -> bool {
    record.field(EXERCISE_REF_FIELD).is_some_and(is_numeric_ref)
}

fn is_numeric_ref(value: &Value) -> bool {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.is_some_and(|n| n.is_finite() && n != 0.0)
}

/// Split records into (valid, invalid), keeping their order
pub fn partition(records: Vec<StoredRecord>) -> (Vec<StoredRecord>, Vec<StoredRecord>) {
    records.into_iter().partition(has_exercise_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_store::RecordId;
    use serde_json::json;

    fn record(id: u64, exercise: Value) -> StoredRecord {
        let mut payload = serde_json::Map::new();
        payload.insert(EXERCISE_REF_FIELD.to_string(), exercise);
        payload.insert("gewicht".to_string(), json!(80));
        StoredRecord {
            id: RecordId::new(id),
            timestamp: 0,
            synced: false,
            payload,
        }
    }

    #[test]
    fn test_numeric_refs_are_valid() {
        assert!(has_exercise_ref(&record(1, json!(12))));
        assert!(has_exercise_ref(&record(1, json!(3.5))));
        assert!(has_exercise_ref(&record(1, json!("12"))));
        assert!(has_exercise_ref(&record(1, json!(" 7 "))));
    }

    #[test]
    fn test_missing_or_non_numeric_refs_are_invalid() {
        assert!(!has_exercise_ref(&record(1, Value::Null)));
        assert!(!has_exercise_ref(&record(1, json!(0))));
        assert!(!has_exercise_ref(&record(1, json!(""))));
        assert!(!has_exercise_ref(&record(1, json!("bankdrücken"))));
        assert!(!has_exercise_ref(&record(1, json!(true))));
        assert!(!has_exercise_ref(&record(1, json!({"id": 1}))));

        let mut missing = record(1, json!(1));
        missing.payload.remove(EXERCISE_REF_FIELD);
        assert!(!has_exercise_ref(&missing));
    }

    #[test]
    fn test_partition_keeps_order() {
        let records = vec![
            record(1, json!(1)),
            record(2, Value::Null),
            record(3, json!("4")),
            record(4, json!("x")),
        ];
        let (valid, invalid) = partition(records);
        let ids = |v: &[StoredRecord]| v.iter().map(|r| r.id.value()).collect::<Vec<_>>();
        assert_eq!(ids(&valid), vec![1, 3]);
        assert_eq!(ids(&invalid), vec![2, 4]);
    }
}
