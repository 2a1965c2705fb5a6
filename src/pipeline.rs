//! The fixed temperature aggregation: `$unwind`, `$group` + `$sum`, `$sort`.
//!
//! [`temp_counts_pipeline`] builds the stages for the server; the remaining
//! functions evaluate the same stages in process for [`crate::memory::MemorySource`].

use std::cmp::Ordering;

use mongodb::bson::{doc, Bson, Document};
use num::{BigInt, BigRational};

use crate::conversion::deserialize_number;
use crate::error::{Error, Result};

/// One row of the aggregation result: a distinct value and how often it occurs.
#[derive(Debug, Clone, PartialEq)]
pub struct TempCount {
    pub key: Bson,
    pub count: i64,
}

impl TempCount {
    pub fn new(key: impl Into<Bson>, count: i64) -> Self {
        TempCount {
            key: key.into(),
            count,
        }
    }

    /// Decodes a `{ _id, count }` row returned by the server.
    pub fn from_document(row: &Document) -> Result<Self> {
        let key = row
            .get("_id")
            .cloned()
            .ok_or_else(|| Error::Query(format!("aggregation row without _id: {row}")))?;
        let count = row
            .get("count")
            .and_then(deserialize_number::<i64>)
            .ok_or_else(|| Error::Query(format!("aggregation row without numeric count: {row}")))?;
        Ok(TempCount { key, count })
    }

    pub fn to_document(&self) -> Document {
        doc! { "_id": self.key.clone(), "count": self.count }
    }
}

pub fn temp_counts_pipeline(field: &str) -> Vec<Document> {
    let path = format!("${field}");
    vec![
        doc! { "$unwind": path.clone() },
        doc! { "$group": { "_id": path, "count": { "$sum": 1 } } },
        doc! { "$sort": { "count": -1, "_id": -1 } },
    ]
}

/// Expands an array-valued `field` into one document per element.
///
/// Scalars pass through as a single row; missing, null and empty arrays
/// produce nothing.
pub fn unwind<I>(docs: I, field: &str) -> Vec<Document>
where
    I: IntoIterator<Item = Document>,
{
    let mut rows = Vec::new();
    for doc in docs {
        match doc.get(field).cloned() {
            None | Some(Bson::Null) | Some(Bson::Undefined) => {}
            Some(Bson::Array(items)) => {
                for item in items {
                    let mut row = doc.clone();
                    row.insert(field, item);
                    rows.push(row);
                }
            }
            Some(_) => rows.push(doc),
        }
    }
    rows
}

/// Counts rows per distinct value of `field`, in ascending key order.
///
/// Numerically equal values of different types share a group, keyed by the
/// first one seen.
pub fn group_count(rows: &[Document], field: &str) -> Vec<TempCount> {
    let mut keys: Vec<&Bson> = rows
        .iter()
        .map(|row| row.get(field).unwrap_or(&Bson::Null))
        .collect();
    keys.sort_by(|a, b| compare_bson(a, b));

    let mut groups: Vec<TempCount> = Vec::new();
    for key in keys {
        match groups.last_mut() {
            Some(last) if compare_bson(&last.key, key) == Ordering::Equal => last.count += 1,
            _ => groups.push(TempCount::new(key.clone(), 1)),
        }
    }
    groups
}

/// Orders by count descending, then key descending.
pub fn sort_counts(mut counts: Vec<TempCount>) -> Vec<TempCount> {
    counts.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| compare_bson(&b.key, &a.key))
    });
    counts
}

pub fn aggregate_temp_counts_local<I>(docs: I, field: &str) -> Vec<TempCount>
where
    I: IntoIterator<Item = Document>,
{
    let rows = unwind(docs, field);
    sort_counts(group_count(&rows, field))
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 4,
        Bson::Document(_) | Bson::JavaScriptCodeWithScope(_) => 5,
        Bson::Array(_) => 6,
        Bson::Binary(_) => 7,
        Bson::ObjectId(_) => 8,
        Bson::Boolean(_) => 9,
        Bson::DateTime(_) => 10,
        Bson::Timestamp(_) => 11,
        Bson::RegularExpression(_) => 12,
        Bson::JavaScriptCode(_) | Bson::DbPointer(_) => 13,
        Bson::MaxKey => 14,
    }
}

/// Total order over BSON values, following the server's cross-type sort order.
///
/// Numbers of any type compare by exact value.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_), _) => {
            compare_numbers(a, b)
        }
        (Bson::String(x) | Bson::Symbol(x), Bson::String(y) | Bson::Symbol(y)) => x.cmp(y),
        (Bson::Document(x), Bson::Document(y)) => compare_documents(x, y),
        (Bson::Array(x), Bson::Array(y)) => compare_sequences(x, y),
        (Bson::Binary(x), Bson::Binary(y)) => x
            .bytes
            .len()
            .cmp(&y.bytes.len())
            .then_with(|| u8::from(x.subtype).cmp(&u8::from(y.subtype)))
            .then_with(|| x.bytes.cmp(&y.bytes)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment))
        }
        (Bson::RegularExpression(x), Bson::RegularExpression(y)) => x
            .pattern
            .cmp(&y.pattern)
            .then_with(|| x.options.cmp(&y.options)),
        (Bson::JavaScriptCode(x), Bson::JavaScriptCode(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

fn compare_numbers(a: &Bson, b: &Bson) -> Ordering {
    match (a, b, integer(a), integer(b)) {
        (_, _, Some(x), Some(y)) => x.cmp(&y),
        (Bson::Double(x), Bson::Double(y), _, _) => compare_f64(*x, *y),
        (_, Bson::Double(y), Some(x), _) => compare_i64_f64(x, *y),
        (Bson::Double(x), _, _, Some(y)) => compare_i64_f64(y, *x).reverse(),
        _ => ExactNumber::from_bson(a).cmp(&ExactNumber::from_bson(b)),
    }
}

// NaN sorts below every other number and equal to itself.
fn compare_f64(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Compares without rounding `x` through `f64`.
fn compare_i64_f64(x: i64, y: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if y.is_nan() {
        return Ordering::Greater;
    }
    if y >= TWO_POW_63 {
        return Ordering::Less;
    }
    if y < -TWO_POW_63 {
        return Ordering::Greater;
    }
    // |y| < 2^63 here, so its integral part fits an i64 and the fraction is exact
    let whole = y.trunc();
    x.cmp(&(whole as i64))
        .then_with(|| 0.0_f64.partial_cmp(&(y - whole)).unwrap_or(Ordering::Equal))
}

/// A number as an exact rational, with the IEEE specials ordered around it.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ExactNumber {
    NaN,
    NegativeInfinity,
    Finite(BigRational),
    PositiveInfinity,
}

impl ExactNumber {
    fn from_bson(value: &Bson) -> Self {
        match value {
            Bson::Int32(v) => ExactNumber::Finite(BigRational::from_integer(BigInt::from(*v))),
            Bson::Int64(v) => ExactNumber::Finite(BigRational::from_integer(BigInt::from(*v))),
            Bson::Double(v) => Self::from_f64(*v),
            Bson::Decimal128(d) => Self::from_decimal128(d.bytes()),
            _ => ExactNumber::NaN,
        }
    }

    fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            ExactNumber::NaN
        } else if value.is_infinite() && value > 0.0 {
            ExactNumber::PositiveInfinity
        } else if value.is_infinite() {
            ExactNumber::NegativeInfinity
        } else {
            BigRational::from_float(value).map_or(ExactNumber::NaN, ExactNumber::Finite)
        }
    }

    /// Decodes the little-endian IEEE 754-2008 BID layout BSON uses for decimals.
    fn from_decimal128(bytes: [u8; 16]) -> Self {
        const EXPONENT_BIAS: i64 = 6176;
        const MAX_COEFFICIENT: u128 = 9_999_999_999_999_999_999_999_999_999_999_999;

        let bits = u128::from_le_bytes(bytes);
        let negative = bits >> 127 == 1;
        match (bits >> 122) & 0x1f {
            0x1f => return ExactNumber::NaN,
            0x1e if negative => return ExactNumber::NegativeInfinity,
            0x1e => return ExactNumber::PositiveInfinity,
            _ => {}
        }

        let (biased_exponent, coefficient) = if (bits >> 125) & 0b11 == 0b11 {
            // the implied coefficient is at least 2^113, above the canonical maximum
            ((bits >> 111) & 0x3fff, 0)
        } else {
            ((bits >> 113) & 0x3fff, bits & ((1u128 << 113) - 1))
        };
        let coefficient = if coefficient > MAX_COEFFICIENT { 0 } else { coefficient };
        let exponent = biased_exponent as i64 - EXPONENT_BIAS;

        let mut numerator = BigInt::from(coefficient);
        if negative {
            numerator = -numerator;
        }
        let scale = num::pow(BigInt::from(10), exponent.unsigned_abs() as usize);
        let value = if exponent >= 0 {
            BigRational::from_integer(numerator * scale)
        } else {
            BigRational::new(numerator, scale)
        };
        ExactNumber::Finite(value)
    }
}

fn compare_documents(x: &Document, y: &Document) -> Ordering {
    for ((xk, xv), (yk, yv)) in x.iter().zip(y.iter()) {
        let ord = type_rank(xv)
            .cmp(&type_rank(yv))
            .then_with(|| xk.cmp(yk))
            .then_with(|| compare_bson(xv, yv));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    x.len().cmp(&y.len())
}

fn compare_sequences(x: &[Bson], y: &[Bson]) -> Ordering {
    for (xv, yv) in x.iter().zip(y.iter()) {
        let ord = compare_bson(xv, yv);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    x.len().cmp(&y.len())
}
