use std::cmp::Ordering;

use mongodb::bson::{doc, Bson, DateTime, Document};
use proptest::prelude::*;
use scratch_query::pipeline::{compare_bson, unwind};
use scratch_query::prelude::*;

fn temp_value() -> impl Strategy<Value = Option<Bson>> {
    prop_oneof![
        Just(None),
        Just(Some(Bson::Null)),
        (0i32..10).prop_map(|t| Some(Bson::Int32(t))),
        (0i32..10).prop_map(|t| Some(Bson::Double(t as f64 + 0.5))),
        prop::collection::vec(0i32..10, 0..5)
            .prop_map(|ts| Some(Bson::Array(ts.into_iter().map(Bson::Int32).collect()))),
    ]
}

fn reading() -> impl Strategy<Value = Document> {
    (prop::option::of(0i64..10_000), temp_value()).prop_map(|(ts, temp)| {
        let mut doc = doc! { "device": "fec9e916" };
        if let Some(ts) = ts {
            doc.insert("timestamp", DateTime::from_millis(ts));
        }
        if let Some(temp) = temp {
            doc.insert("temp", temp);
        }
        doc
    })
}

fn collection() -> impl Strategy<Value = MemorySource> {
    prop::collection::vec(reading(), 0..40).prop_map(|docs| MemorySource::new("scratch_data", docs))
}

fn expected_rows(doc: &Document) -> i64 {
    match doc.get("temp") {
        None | Some(Bson::Null) => 0,
        Some(Bson::Array(items)) => items.len() as i64,
        Some(_) => 1,
    }
}

proptest! {
    #[test]
    fn count_matches_scan_all(source in collection()) {
        let scanned = source.scan_all().unwrap().count() as u64;
        prop_assert_eq!(source.count().unwrap(), scanned);
        // restartable
        let again = source.scan_all().unwrap().count() as u64;
        prop_assert_eq!(again, scanned);
    }

    #[test]
    fn range_is_bounded_and_ascending(source in collection(), bound in 0i64..10_000) {
        let docs: Vec<Document> = source
            .scan_range(DateTime::from_millis(bound))
            .unwrap()
            .collect::<scratch_query::Result<_>>()
            .unwrap();
        let stamps: Vec<i64> = docs
            .iter()
            .map(|d| d.get_datetime("timestamp").unwrap().timestamp_millis())
            .collect();
        prop_assert!(stamps.iter().all(|ts| *ts < bound));
        prop_assert!(stamps.windows(2).all(|w| w[0] <= w[1]));

        let expected = source
            .documents()
            .iter()
            .filter(|d| matches!(d.get("timestamp"), Some(Bson::DateTime(dt)) if dt.timestamp_millis() < bound))
            .count();
        prop_assert_eq!(docs.len(), expected);
    }

    #[test]
    fn counts_are_sorted_count_then_key_descending(source in collection()) {
        let counts = source.aggregate_temp_counts("temp").unwrap();
        for pair in counts.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.count >= b.count);
            if a.count == b.count {
                prop_assert_eq!(compare_bson(&a.key, &b.key), Ordering::Greater);
            }
        }
    }

    #[test]
    fn counts_sum_to_unwound_rows(source in collection()) {
        let counts = source.aggregate_temp_counts("temp").unwrap();
        let total: i64 = counts.iter().map(|c| c.count).sum();
        let expected: i64 = source.documents().iter().map(expected_rows).sum();
        prop_assert_eq!(total, expected);
        prop_assert_eq!(unwind(source.documents().to_vec(), "temp").len() as i64, expected);
    }

    #[test]
    fn compare_is_antisymmetric(a in temp_value(), b in temp_value()) {
        let a = a.unwrap_or(Bson::Null);
        let b = b.unwrap_or(Bson::Null);
        prop_assert_eq!(compare_bson(&a, &b), compare_bson(&b, &a).reverse());
    }
}

#[test]
fn worked_example_through_source() {
    let source = MemorySource::new(
        "scratch_data",
        vec![doc! { "temp": [1, 2] }, doc! { "temp": [2] }, doc! { "temp": [2] }],
    );
    assert_eq!(
        source.aggregate_temp_counts("temp").unwrap(),
        vec![TempCount::new(2, 3), TempCount::new(1, 1)]
    );
}
