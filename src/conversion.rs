use polars::prelude::*;

use mongodb::bson::{Bson, Document};
use num::traits::NumCast;

/// Newtype so BSON conversions can be implemented for polars types.
#[derive(Debug, Clone)]
#[repr(transparent)]
pub struct Wrap<T>(pub T);

impl From<&Bson> for Wrap<DataType> {
    fn from(bson: &Bson) -> Self {
        let dt = match bson {
            Bson::Double(_) => DataType::Float64,
            Bson::Boolean(_) => DataType::Boolean,
            Bson::Null | Bson::Undefined => DataType::Null,
            Bson::Int32(_) => DataType::Int32,
            Bson::Int64(_) => DataType::Int64,
            Bson::DateTime(_) => DataType::Datetime(TimeUnit::Milliseconds, None),
            // arrays, embedded documents, object ids and the rest print as text
            _ => DataType::String,
        };
        Wrap(dt)
    }
}

/// Widens two observed column types into one that holds both.
pub(crate) fn coerce_dtype(left: &DataType, right: &DataType) -> DataType {
    use DataType::*;
    match (left, right) {
        (a, b) if a == b => a.clone(),
        (Null, other) | (other, Null) => other.clone(),
        (Int32, Int64) | (Int64, Int32) => Int64,
        (Int32 | Int64, Float64) | (Float64, Int32 | Int64) => Float64,
        _ => String,
    }
}

/// Infers column names and types from the first `infer_schema_length` documents.
///
/// Columns keep the order in which their field was first seen. A column that
/// only ever held nulls becomes a string column.
pub(crate) fn infer_schema<'a, I>(docs: I, infer_schema_length: usize) -> Vec<(String, DataType)>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut columns: PlIndexMap<String, DataType> = PlIndexMap::default();
    for doc in docs.into_iter().take(infer_schema_length) {
        for (key, value) in doc {
            let dtype: Wrap<DataType> = value.into();
            let merged = match columns.get(key) {
                Some(seen) => coerce_dtype(seen, &dtype.0),
                None => dtype.0,
            };
            columns.insert(key.clone(), merged);
        }
    }
    columns
        .into_iter()
        .map(|(name, dtype)| match dtype {
            DataType::Null => (name, DataType::String),
            other => (name, other),
        })
        .collect()
}

pub(crate) fn deserialize_number<T: NumCast>(value: &Bson) -> Option<T> {
    match value {
        Bson::Double(num) => num::traits::cast::<f64, T>(*num),
        Bson::Int32(num) => num::traits::cast::<i32, T>(*num),
        Bson::Int64(num) => num::traits::cast::<i64, T>(*num),
        _ => None,
    }
}

pub(crate) fn deserialize_date(value: &Bson) -> Option<i64> {
    match value {
        Bson::DateTime(dt) => Some(dt.timestamp_millis()),
        _ => None,
    }
}

pub(crate) fn deserialize_string(value: &Bson) -> Option<String> {
    match value {
        Bson::Null | Bson::Undefined => None,
        Bson::String(v) | Bson::Symbol(v) | Bson::JavaScriptCode(v) => Some(v.clone()),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::DateTime(dt) => Some(
            dt.try_to_rfc3339_string()
                .unwrap_or_else(|_| dt.timestamp_millis().to_string()),
        ),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, DateTime};

    #[test]
    fn numeric_conflicts_widen() {
        let docs = vec![
            doc! { "a": 1_i32, "b": 1_i32 },
            doc! { "a": 2_i64, "b": 2.5 },
        ];
        let schema = infer_schema(&docs, 100);
        assert_eq!(
            schema,
            vec![
                ("a".to_string(), DataType::Int64),
                ("b".to_string(), DataType::Float64),
            ]
        );
    }

    #[test]
    fn other_conflicts_and_nested_values_become_strings() {
        let docs = vec![
            doc! { "temp": [21, 22], "flag": true, "_id": ObjectId::new() },
            doc! { "temp": 23, "flag": 1 },
        ];
        let schema: Vec<DataType> = infer_schema(&docs, 100).into_iter().map(|(_, dt)| dt).collect();
        assert_eq!(schema, vec![DataType::String, DataType::String, DataType::String]);
    }

    #[test]
    fn null_only_column_is_string_and_limit_is_respected() {
        let docs = vec![
            doc! { "gap": Bson::Null },
            doc! { "gap": 1, "late": 2 },
        ];
        let schema = infer_schema(&docs, 1);
        assert_eq!(schema, vec![("gap".to_string(), DataType::String)]);
    }

    #[test]
    fn dates_infer_millisecond_datetime() {
        let docs = vec![doc! { "timestamp": DateTime::from_millis(0) }];
        let schema = infer_schema(&docs, 100);
        assert_eq!(
            schema[0].1,
            DataType::Datetime(TimeUnit::Milliseconds, None)
        );
    }

    #[test]
    fn numbers_cast_between_widths() {
        assert_eq!(deserialize_number::<i64>(&Bson::Int32(7)), Some(7));
        assert_eq!(deserialize_number::<f64>(&Bson::Int64(7)), Some(7.0));
        assert_eq!(deserialize_number::<i32>(&Bson::Int64(i64::MAX)), None);
        assert_eq!(deserialize_number::<i64>(&Bson::String("7".into())), None);
    }
}
