use crate::conversion::*;
use crate::error::Result;
use mongodb::bson::{Bson, Document};
use polars::prelude::*;

pub(crate) fn init_buffers(
    schema: &[(String, DataType)],
    capacity: usize,
) -> PlIndexMap<String, Buffer> {
    schema
        .iter()
        .map(|(name, dtype)| {
            let name_str = PlSmallStr::from(name.as_str());
            let builder = match dtype {
                DataType::Boolean => {
                    Buffer::Boolean(BooleanChunkedBuilder::new(name_str, capacity))
                }
                DataType::Int32 => Buffer::Int32(PrimitiveChunkedBuilder::new(name_str, capacity)),
                DataType::Int64 => Buffer::Int64(PrimitiveChunkedBuilder::new(name_str, capacity)),
                DataType::Float64 => {
                    Buffer::Float64(PrimitiveChunkedBuilder::new(name_str, capacity))
                }
                DataType::Datetime(_, _) => {
                    Buffer::Datetime(PrimitiveChunkedBuilder::new(name_str, capacity))
                }
                _ => Buffer::Utf8(StringChunkedBuilder::new(name_str, capacity)),
            };
            (name.clone(), builder)
        })
        .collect()
}

pub(crate) enum Buffer {
    Boolean(BooleanChunkedBuilder),
    Int32(PrimitiveChunkedBuilder<Int32Type>),
    Int64(PrimitiveChunkedBuilder<Int64Type>),
    Float64(PrimitiveChunkedBuilder<Float64Type>),
    Utf8(StringChunkedBuilder),
    Datetime(PrimitiveChunkedBuilder<Int64Type>),
}

impl Buffer {
    pub(crate) fn into_series(self) -> PolarsResult<Series> {
        let s = match self {
            Buffer::Boolean(v) => v.finish().into_series(),
            Buffer::Int32(v) => v.finish().into_series(),
            Buffer::Int64(v) => v.finish().into_series(),
            Buffer::Float64(v) => v.finish().into_series(),
            Buffer::Datetime(v) => v
                .finish()
                .into_series()
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
            Buffer::Utf8(v) => v.finish().into_series(),
        };
        Ok(s)
    }

    pub(crate) fn add_null(&mut self) {
        match self {
            Buffer::Boolean(v) => v.append_null(),
            Buffer::Int32(v) => v.append_null(),
            Buffer::Int64(v) => v.append_null(),
            Buffer::Float64(v) => v.append_null(),
            Buffer::Utf8(v) => v.append_null(),
            Buffer::Datetime(v) => v.append_null(),
        };
    }

    /// Appends `value`, or a null when it does not fit the column type.
    pub(crate) fn add(&mut self, value: &Bson) {
        match self {
            Buffer::Boolean(buf) => match value {
                Bson::Boolean(v) => buf.append_value(*v),
                _ => buf.append_null(),
            },
            Buffer::Int32(buf) => match value {
                Bson::Int32(v) => buf.append_value(*v),
                _ => buf.append_null(),
            },
            Buffer::Int64(buf) => match value {
                Bson::Int32(_) | Bson::Int64(_) => buf.append_option(deserialize_number(value)),
                _ => buf.append_null(),
            },
            Buffer::Float64(buf) => buf.append_option(deserialize_number(value)),
            Buffer::Utf8(buf) => buf.append_option(deserialize_string(value)),
            Buffer::Datetime(buf) => buf.append_option(deserialize_date(value)),
        }
    }
}

/// Collects documents into a frame, one column per field.
pub fn documents_frame(docs: &[Document], infer_schema_length: usize) -> Result<DataFrame> {
    let schema = infer_schema(docs, infer_schema_length.max(1));
    let mut buffers = init_buffers(&schema, docs.len());
    for doc in docs {
        buffers.iter_mut().for_each(|(name, inner)| match doc.get(name) {
            Some(v) => inner.add(v),
            None => inner.add_null(),
        });
    }
    let columns = buffers
        .into_values()
        .map(|buf| buf.into_series().map(Column::from))
        .collect::<PolarsResult<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, DateTime};

    #[test]
    fn frame_has_one_row_per_document() {
        let docs = vec![
            doc! { "timestamp": DateTime::from_millis(1_000), "temp": 21 },
            doc! { "timestamp": DateTime::from_millis(2_000), "temp": 22.5 },
            doc! { "timestamp": DateTime::from_millis(3_000) },
        ];
        let df = documents_frame(&docs, 100).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 2);
        let temp = df.column("temp").unwrap();
        assert_eq!(temp.dtype(), &DataType::Float64);
        assert_eq!(temp.null_count(), 1);
        assert_eq!(
            df.column("timestamp").unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );
    }

    #[test]
    fn values_outside_inferred_type_are_null() {
        let docs = vec![doc! { "flag": true }, doc! { "flag": false }, doc! { "flag": "x" }];
        let df = documents_frame(&docs, 2).unwrap();
        let flag = df.column("flag").unwrap();
        assert_eq!(flag.dtype(), &DataType::Boolean);
        assert_eq!(flag.null_count(), 1);
    }

    #[test]
    fn empty_input_gives_empty_frame() {
        let df = documents_frame(&[], 100).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 0);
    }
}
