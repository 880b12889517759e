//! UTF-8 string and bytestring leaves.

use nestgen_core::{IndexWidth, ListIndex, ListLayout, StringEncoding, Value};

use crate::errors::Result;
use crate::model::Triple;
use crate::options::{GenerateOptions, Opts};
use crate::strategy::{DrawContext, Strategy};

/// Characters drawn when no alphabet is configured.
pub(crate) fn default_alphabet() -> Vec<char> {
    (' '..='~')
        .chain(['é', 'ß', 'λ', 'ж', '中', '😀'])
        .collect()
}

/// A string node of `length` strings, each of at most `max_string_length`
/// characters (or bytes).
pub fn string_value(
    cx: &mut DrawContext<'_>,
    options: &GenerateOptions,
    encoding: StringEncoding,
    layout: ListLayout,
    length: usize,
) -> Result<Value> {
    let alphabet = default_alphabet();
    let mut bytes = Vec::new();
    let mut offsets = Vec::with_capacity(length + 1);
    offsets.push(0_i64);
    for _ in 0..length {
        let count = cx.source().size(0, options.max_string_length);
        match encoding {
            StringEncoding::Utf8 => {
                let mut buf = [0_u8; 4];
                for _ in 0..count {
                    let ch = options.alphabet.resolve(cx, &alphabet)?;
                    bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
            StringEncoding::Bytes => {
                for _ in 0..count {
                    bytes.push(cx.source().byte());
                }
            }
        }
        offsets.push(bytes.len() as i64);
    }
    Ok(Value::String {
        encoding,
        index: ListIndex::from_offsets(layout, offsets),
        bytes,
    })
}

/// Index layout drawn for list-like nodes.
pub(crate) fn draw_list_layout(cx: &mut DrawContext<'_>) -> ListLayout {
    let source = cx.source();
    let width = IndexWidth::ALL[source.size(0, IndexWidth::ALL.len() - 1)];
    if source.coin() {
        ListLayout::Offsets { width }
    } else {
        ListLayout::StartsStops { width }
    }
}

#[derive(Debug, Clone)]
pub struct StringContents {
    opts: Opts,
    encoding: StringEncoding,
}

/// UTF-8 string leaves.
pub fn string_contents(opts: &Opts) -> StringContents {
    StringContents {
        opts: opts.clone(),
        encoding: StringEncoding::Utf8,
    }
}

/// Bytestring leaves.
pub fn bytestring_contents(opts: &Opts) -> StringContents {
    StringContents {
        opts: opts.clone(),
        encoding: StringEncoding::Bytes,
    }
}

impl Strategy for StringContents {
    type Value = Triple;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Triple> {
        let options = self.opts.options();
        let layout = draw_list_layout(cx);
        let length = cx.source().size(options.min_size, options.max_size);
        let value = string_value(cx, options, self.encoding, layout, length)?;
        Ok(Triple::from_value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Knob;
    use crate::source::DrawSource;

    #[test]
    fn strings_use_the_alphabet() {
        let opts = Opts::new(GenerateOptions {
            alphabet: Knob::OneOf(vec!['a', 'λ']),
            min_size: 3,
            max_size: 3,
            ..GenerateOptions::default()
        });
        let mut source = DrawSource::new(4);
        let mut cx = opts.context(&mut source);
        let triple = string_contents(&opts).draw(&mut cx).unwrap();
        assert!(triple.verify().is_ok());
        let Value::String { index, bytes, .. } = &triple.value else {
            panic!("expected a string node");
        };
        assert_eq!(index.len(), 3);
        let text = std::str::from_utf8(bytes).unwrap();
        assert!(text.chars().all(|ch| ch == 'a' || ch == 'λ'));
    }

    #[test]
    fn bytestrings_respect_max_length() {
        let opts = Opts::new(GenerateOptions {
            max_string_length: 2,
            ..GenerateOptions::default()
        });
        let mut source = DrawSource::new(10);
        let mut cx = opts.context(&mut source);
        for _ in 0..20 {
            let triple = bytestring_contents(&opts).draw(&mut cx).unwrap();
            let Value::String { index, .. } = &triple.value else {
                panic!("expected a string node");
            };
            for i in 0..index.len() {
                let (start, stop) = index.bounds(i).unwrap();
                assert!(stop - start <= 2);
            }
        }
    }
}
