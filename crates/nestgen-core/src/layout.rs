//! Physical validity of materialized values.
//!
//! These are the checks an array library runs before trusting a layout:
//! index buffers in range, masks long enough, scalars representable in
//! their dtype.

use crate::dtype::DType;
use crate::form::IndexWidth;
use crate::types::{StringEncoding, check_field_names, check_union_variants};
use crate::validation::{INVALID_LAYOUT, Violation};
use crate::value::{ListIndex, OptionMask, Scalars, Value};

/// First layout violation in `value`, or `None` when the value is valid.
pub fn validity_error(value: &Value) -> Option<Violation> {
    check(value, "$").err()
}

fn fail<T>(path: &str, message: impl Into<String>) -> Result<T, Violation> {
    Err(Violation::new(INVALID_LAYOUT, path, message))
}

fn check(value: &Value, path: &str) -> Result<(), Violation> {
    match value {
        Value::Numpy { dtype, data } => check_scalars(*dtype, data, path),
        Value::List { index, content } => {
            check_list_index(index, content.len(), path)?;
            check(content, &format!("{path}.content"))
        }
        Value::Regular {
            size,
            length,
            content,
        } => {
            if *size > 0 {
                let expected = content.len() / size;
                if *length != expected {
                    return fail(
                        path,
                        format!("regular length {length} but content holds {expected} groups of {size}"),
                    );
                }
            }
            check(content, &format!("{path}.content"))
        }
        Value::Option { mask, content } => {
            check_option_mask(mask, content, path)?;
            check(content, &format!("{path}.content"))
        }
        Value::Record { length, fields } => {
            check_field_names(fields.iter().map(|field| field.name.as_str()))
                .or_else(|message| fail(path, message))?;
            for field in fields {
                let field_path = format!("{path}.fields.{}", field.name);
                if field.value.len() < *length {
                    return fail(
                        &field_path,
                        format!(
                            "field holds {} entries, record needs {length}",
                            field.value.len()
                        ),
                    );
                }
                check(&field.value, &field_path)?;
            }
            Ok(())
        }
        Value::Union {
            index_width,
            tags,
            index,
            variants,
        } => {
            check_union_variants(variants.iter().map(Value::kind))
                .or_else(|message| fail(path, message))?;
            if tags.len() != index.len() {
                return fail(
                    path,
                    format!("{} tags but {} index entries", tags.len(), index.len()),
                );
            }
            for (i, (tag, entry)) in tags.iter().zip(index).enumerate() {
                let Some(variant) = usize::try_from(*tag).ok().and_then(|t| variants.get(t)) else {
                    return fail(path, format!("tag {tag} at {i} is out of range"));
                };
                if !index_width.fits(*entry) || *entry < 0 || *entry as usize >= variant.len() {
                    return fail(
                        path,
                        format!("index {entry} at {i} is out of range for variant {tag}"),
                    );
                }
            }
            for (i, variant) in variants.iter().enumerate() {
                check(variant, &format!("{path}.variants[{i}]"))?;
            }
            Ok(())
        }
        Value::String {
            encoding,
            index,
            bytes,
        } => {
            check_list_index(index, bytes.len(), path)?;
            if *encoding == StringEncoding::Utf8 {
                for i in 0..index.len() {
                    let Some((start, stop)) = index.bounds(i).filter(|(start, stop)| start < stop)
                    else {
                        continue;
                    };
                    if std::str::from_utf8(&bytes[start as usize..stop as usize]).is_err() {
                        return fail(path, format!("string {i} is not valid UTF-8"));
                    }
                }
            }
            Ok(())
        }
    }
}

fn check_width(width: IndexWidth, entries: &[i64], what: &str, path: &str) -> Result<(), Violation> {
    match entries.iter().find(|entry| !width.fits(**entry)) {
        Some(entry) => fail(path, format!("{what} entry {entry} does not fit {width}")),
        None => Ok(()),
    }
}

fn check_list_index(index: &ListIndex, content_len: usize, path: &str) -> Result<(), Violation> {
    let content_len = content_len as i64;
    match index {
        ListIndex::Offsets { width, offsets } => {
            check_width(*width, offsets, "offsets", path)?;
            let Some(first) = offsets.first() else {
                return fail(path, "offsets buffer is empty");
            };
            if *first < 0 {
                return fail(path, format!("first offset {first} is negative"));
            }
            if let Some(pair) = offsets.windows(2).find(|pair| pair[0] > pair[1]) {
                return fail(
                    path,
                    format!("offsets decrease from {} to {}", pair[0], pair[1]),
                );
            }
            if let Some(last) = offsets.last()
                && *last > content_len
            {
                return fail(
                    path,
                    format!("last offset {last} exceeds content length {content_len}"),
                );
            }
            Ok(())
        }
        ListIndex::StartsStops {
            width,
            starts,
            stops,
        } => {
            check_width(*width, starts, "starts", path)?;
            check_width(*width, stops, "stops", path)?;
            if starts.len() != stops.len() {
                return fail(
                    path,
                    format!("{} starts but {} stops", starts.len(), stops.len()),
                );
            }
            for (i, (start, stop)) in starts.iter().zip(stops).enumerate() {
                if start > stop {
                    return fail(path, format!("start {start} exceeds stop {stop} at {i}"));
                }
                if *start < 0 {
                    return fail(path, format!("start {start} at {i} is negative"));
                }
                // Empty lists may point anywhere.
                if start < stop && *stop > content_len {
                    return fail(
                        path,
                        format!("stop {stop} at {i} exceeds content length {content_len}"),
                    );
                }
            }
            Ok(())
        }
    }
}

fn check_option_mask(mask: &OptionMask, content: &Value, path: &str) -> Result<(), Violation> {
    if matches!(content, Value::Option { .. }) {
        return fail(path, "option content must not be an option");
    }
    let content_len = content.len();
    match mask {
        OptionMask::Indexed { width, index } => {
            if !width.is_signed() {
                return fail(path, format!("option index must be signed, got {width}"));
            }
            check_width(*width, index, "index", path)?;
            match index
                .iter()
                .find(|entry| **entry < -1 || **entry >= content_len as i64)
            {
                Some(entry) => fail(
                    path,
                    format!("index entry {entry} out of range for content length {content_len}"),
                ),
                None => Ok(()),
            }
        }
        OptionMask::ByteMasked { mask, .. } => {
            if mask.len() > content_len {
                return fail(
                    path,
                    format!("mask length {} exceeds content length {content_len}", mask.len()),
                );
            }
            Ok(())
        }
        OptionMask::BitMasked { length, mask, .. } => {
            if mask.len() != length.div_ceil(8) {
                return fail(
                    path,
                    format!("{} mask bytes cannot hold {length} bits", mask.len()),
                );
            }
            if *length > content_len {
                return fail(
                    path,
                    format!("mask length {length} exceeds content length {content_len}"),
                );
            }
            Ok(())
        }
        OptionMask::Unmasked => Ok(()),
    }
}

fn check_scalars(dtype: DType, data: &Scalars, path: &str) -> Result<(), Violation> {
    if !data.matches(dtype) {
        return fail(path, format!("scalar storage does not match dtype {dtype}"));
    }
    match data {
        Scalars::Int(values) => {
            let Some((min, max)) = dtype.signed_range() else {
                return Ok(());
            };
            match values.iter().find(|v| **v < min || **v > max) {
                Some(v) => fail(path, format!("{v} does not fit {dtype}")),
                None => Ok(()),
            }
        }
        Scalars::UInt(values) => {
            let Some(max) = dtype.unsigned_max() else {
                return Ok(());
            };
            match values.iter().find(|v| **v > max) {
                Some(v) => fail(path, format!("{v} does not fit {dtype}")),
                None => Ok(()),
            }
        }
        Scalars::Float(values) if dtype.is_single_precision() => {
            match values.iter().find(|v| !is_single(**v)) {
                Some(v) => fail(path, format!("{v} is not representable in {dtype}")),
                None => Ok(()),
            }
        }
        Scalars::Complex(values) if dtype.is_single_precision() => {
            match values.iter().find(|[re, im]| !is_single(*re) || !is_single(*im)) {
                Some([re, im]) => fail(
                    path,
                    format!("{re}+{im}j is not representable in {dtype}"),
                ),
                None => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

fn is_single(value: f64) -> bool {
    value.is_nan() || (value as f32) as f64 == value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{ListLayout, OptionLayout};

    fn ints(values: Vec<i64>) -> Value {
        Value::Numpy {
            dtype: DType::Int64,
            data: Scalars::Int(values),
        }
    }

    #[test]
    fn decreasing_offsets_are_rejected() {
        let value = Value::List {
            index: ListIndex::Offsets {
                width: IndexWidth::I64,
                offsets: vec![0, 2, 1],
            },
            content: Box::new(ints(vec![1, 2, 3])),
        };
        let violation = validity_error(&value).unwrap();
        assert_eq!(violation.code, INVALID_LAYOUT);
        assert!(violation.message.contains("decrease"));
    }

    #[test]
    fn offsets_past_content_are_rejected() {
        let value = Value::List {
            index: ListIndex::from_offsets(
                ListLayout::StartsStops {
                    width: IndexWidth::I32,
                },
                vec![0, 4],
            ),
            content: Box::new(ints(vec![1, 2, 3])),
        };
        assert!(validity_error(&value).is_some());
    }

    #[test]
    fn option_index_out_of_range_is_rejected() {
        let value = Value::Option {
            mask: OptionMask::Indexed {
                width: IndexWidth::I64,
                index: vec![0, -1, 3],
            },
            content: Box::new(ints(vec![1, 2, 3])),
        };
        let violation = validity_error(&value).unwrap();
        assert_eq!(violation.path, "$");
    }

    #[test]
    fn float32_values_must_be_representable() {
        let value = Value::Numpy {
            dtype: DType::Float32,
            data: Scalars::Float(vec![0.5, 0.1]),
        };
        assert!(validity_error(&value).is_some());

        let value = Value::Numpy {
            dtype: DType::Float32,
            data: Scalars::Float(vec![0.5, f64::NAN, 0.1_f32 as f64]),
        };
        assert!(validity_error(&value).is_none());
    }

    #[test]
    fn nested_violation_carries_path() {
        let value = Value::Record {
            length: 1,
            fields: vec![crate::value::ValueField {
                name: "x".to_string(),
                value: Value::Option {
                    mask: OptionMask::from_validity(
                        OptionLayout::ByteMasked { valid_when: true },
                        &[true],
                    ),
                    content: Box::new(Value::Numpy {
                        dtype: DType::Int8,
                        data: Scalars::Int(vec![300]),
                    }),
                },
            }],
        };
        let violation = validity_error(&value).unwrap();
        assert_eq!(violation.path, "$.fields.x.content");
    }
}
