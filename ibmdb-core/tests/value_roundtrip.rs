//! Property-based tests for value marshalling between models and DB2 columns.

use chrono::{DateTime, NaiveDateTime};
use ibmdb_core::dialect::values::{
    ColumnValue, encode_timestamp, from_column_value, parse_timestamp, to_column_value,
};
use ibmdb_core::{ModelValue, PropertyDefinition, PropertyType, SqlValue};
use proptest::prelude::*;

fn bound(column: ColumnValue) -> SqlValue {
    match column {
        ColumnValue::Bound(value) => value,
        ColumnValue::Fragment(fragment) => panic!("expected bound value, got {fragment}"),
    }
}

fn round_trip(prop: &PropertyDefinition, value: &ModelValue) -> ModelValue {
    let column = bound(to_column_value(Some(prop), value).unwrap());
    from_column_value(Some(prop), &column).unwrap()
}

fn timestamp(millis: i64) -> NaiveDateTime {
    DateTime::from_timestamp_millis(millis).unwrap().naive_utc()
}

#[test]
fn test_timestamp_millis_are_zero_padded() {
    let base = timestamp(1_700_000_000_000);
    for (millis, suffix) in [(1, ".001000"), (12, ".012000"), (123, ".123000")] {
        let encoded = encode_timestamp(&(base + chrono::Duration::milliseconds(millis)));
        assert!(encoded.ends_with(suffix), "{encoded} should end with {suffix}");
    }
    assert_eq!(encode_timestamp(&base), "2023-11-14-22.13.20.000000");
}

proptest! {
    #[test]
    fn prop_timestamp_survives_at_millisecond_precision(
        millis in 0i64..4_102_444_800_000,
        micros in 0u32..1000,
    ) {
        let date = timestamp(millis) + chrono::Duration::microseconds(i64::from(micros));
        let encoded = encode_timestamp(&date);
        prop_assert!(encoded.ends_with("000"));
        prop_assert_eq!(parse_timestamp(&encoded), Some(timestamp(millis)));
    }

    #[test]
    fn prop_date_from_epoch_millis_reads_back(millis in 0i64..4_102_444_800_000) {
        let prop = PropertyDefinition::new("created", PropertyType::Date);
        prop_assert_eq!(
            round_trip(&prop, &ModelValue::Integer(millis)),
            ModelValue::Date(timestamp(millis))
        );
    }

    #[test]
    fn prop_integers_round_trip(value in any::<i64>()) {
        let prop = PropertyDefinition::new("qty", PropertyType::Number);
        prop_assert_eq!(round_trip(&prop, &ModelValue::Integer(value)), ModelValue::Integer(value));

        // The ODBC backend reads every column as text
        let from_text = from_column_value(Some(&prop), &SqlValue::Text(value.to_string())).unwrap();
        prop_assert_eq!(from_text, ModelValue::Integer(value));
    }

    #[test]
    fn prop_strings_round_trip(text in "\\PC{0,64}") {
        let prop = PropertyDefinition::new("name", PropertyType::String);
        prop_assert_eq!(round_trip(&prop, &ModelValue::from(text.as_str())), ModelValue::Text(text));
    }

    #[test]
    fn prop_booleans_round_trip(flag in any::<bool>()) {
        let prop = PropertyDefinition::new("active", PropertyType::Boolean);
        let column = bound(to_column_value(Some(&prop), &ModelValue::Boolean(flag)).unwrap());
        prop_assert_eq!(&column, &SqlValue::Integer(i64::from(flag)));
        prop_assert_eq!(from_column_value(Some(&prop), &column).unwrap(), ModelValue::Boolean(flag));
    }

    #[test]
    fn prop_buffers_round_trip_through_base64(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        let prop = PropertyDefinition::new("payload", PropertyType::Buffer);
        prop_assert_eq!(round_trip(&prop, &ModelValue::Binary(bytes.clone())), ModelValue::Binary(bytes));
    }
}
