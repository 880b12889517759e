use std::collections::BTreeSet;

use nestgen_core::{MAX_FIELDS, Value, ValueField};

use crate::errors::{GenerationError, Result};
use crate::model::Triple;
use crate::options::{GenerateOptions, Opts, Param};
use crate::strategy::{DrawContext, Strategy};

use super::{Contents, draw_contents};

const NAME_LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const MAX_NAME_LENGTH: usize = 3;

/// `count` unique field names of up to three ASCII letters. The empty name
/// is a valid field name.
pub(crate) fn draw_field_names(cx: &mut DrawContext<'_>, count: usize) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::with_capacity(count);
    while names.len() < count {
        let source = cx.source();
        let length = source.size(0, MAX_NAME_LENGTH);
        let name: String = (0..length)
            .filter_map(|_| source.choose(NAME_LETTERS).map(|byte| *byte as char))
            .collect();
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

/// Record node over `fields`. The record is as long as its shortest field;
/// a record without fields is empty.
pub fn wrap_record(
    cx: &mut DrawContext<'_>,
    names: Option<Vec<String>>,
    fields: Vec<Value>,
) -> Result<Value> {
    if fields.len() > MAX_FIELDS {
        return Err(GenerationError::Config(format!(
            "{} record fields exceed the cap {MAX_FIELDS}",
            fields.len()
        )));
    }
    let names = match names {
        Some(names) if names.len() == fields.len() => names,
        Some(names) => {
            return Err(GenerationError::Config(format!(
                "{} field names for {} fields",
                names.len(),
                fields.len()
            )));
        }
        None => draw_field_names(cx, fields.len()),
    };
    let length = fields.iter().map(Value::len).min().unwrap_or(0);
    Ok(Value::Record {
        length,
        fields: names
            .into_iter()
            .zip(fields)
            .map(|(name, value)| ValueField { name, value })
            .collect(),
    })
}

/// Number of fields drawn for a free record.
pub(crate) fn draw_field_count(cx: &mut DrawContext<'_>, options: &GenerateOptions) -> usize {
    cx.source().size(1, options.max_fields.min(MAX_FIELDS))
}

#[derive(Debug, Clone)]
pub struct RecordContents {
    opts: Opts,
    contents: Param<Vec<Triple>>,
}

pub fn record_contents(opts: &Opts, contents: Param<Vec<Triple>>) -> RecordContents {
    RecordContents {
        opts: opts.clone(),
        contents,
    }
}

impl Strategy for RecordContents {
    type Value = Triple;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Triple> {
        let fields = draw_contents(cx, &self.contents, |cx| {
            let count = draw_field_count(cx, self.opts.options());
            Ok((Contents::child(&self.opts), count))
        })?;
        let value = wrap_record(cx, None, fields.into_iter().map(|field| field.value).collect())?;
        Ok(Triple::from_value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Recorder;
    use crate::source::DrawSource;

    #[test]
    fn names_are_unique_and_short() {
        let mut source = DrawSource::new(2);
        let mut cx = DrawContext::new(&mut source, Recorder::new());
        let names = draw_field_names(&mut cx, 40);
        let unique: BTreeSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), 40);
        assert!(names.iter().all(|name| name.len() <= 3));
    }

    #[test]
    fn too_many_fields_are_rejected_before_naming() {
        let mut source = DrawSource::new(2);
        let mut cx = DrawContext::new(&mut source, Recorder::new());
        let empty = Value::Record {
            length: 0,
            fields: Vec::new(),
        };
        let fields = vec![empty; MAX_FIELDS + 1];
        let err = wrap_record(&mut cx, None, fields).unwrap_err();
        assert!(matches!(err, GenerationError::Config(_)));
        assert_eq!(source.draws(), 0);
    }

    #[test]
    fn empty_record_has_length_zero() {
        let mut source = DrawSource::new(2);
        let mut cx = DrawContext::new(&mut source, Recorder::new());
        let value = wrap_record(&mut cx, None, Vec::new()).unwrap();
        assert_eq!(value.len(), 0);
    }
}
