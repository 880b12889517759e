use nestgen_core::{IndexWidth, TypeKind, Value};

use crate::errors::{GenerationError, Result};
use crate::model::Triple;
use crate::options::{GenerateOptions, Opts, Param};
use crate::strategy::{DrawContext, Strategy};

use super::{Contents, FreeRoot, draw_contents};

pub(crate) fn draw_union_index(cx: &mut DrawContext<'_>) -> IndexWidth {
    IndexWidth::ALL[cx.source().size(0, IndexWidth::ALL.len() - 1)]
}

/// Union node over `variants`.
///
/// Every entry of every variant is addressed once; the entries are
/// interleaved by a drawn permutation and cut to `max_size`.
pub fn wrap_union(
    cx: &mut DrawContext<'_>,
    options: &GenerateOptions,
    index_width: IndexWidth,
    variants: Vec<Value>,
) -> Result<Value> {
    if variants.is_empty() {
        return Err(GenerationError::Config(
            "union requires at least one variant".to_string(),
        ));
    }
    if variants.len() > i8::MAX as usize + 1 {
        return Err(GenerationError::Config(format!(
            "{} variants do not fit 8-bit tags",
            variants.len()
        )));
    }
    if variants.iter().any(|variant| variant.kind() == TypeKind::Union) {
        return Err(GenerationError::Config(
            "union variants must not be unions".to_string(),
        ));
    }
    let mut entries: Vec<(i8, i64)> = variants
        .iter()
        .enumerate()
        .flat_map(|(tag, variant)| (0..variant.len() as i64).map(move |i| (tag as i8, i)))
        .collect();
    cx.source().shuffle(&mut entries);
    entries.truncate(options.max_size);
    let (tags, index): (Vec<i8>, Vec<i64>) = entries.into_iter().unzip();
    Ok(Value::Union {
        index_width,
        tags,
        index,
        variants,
    })
}

/// Number of variants drawn for a free union.
pub(crate) fn draw_variant_count(cx: &mut DrawContext<'_>, options: &GenerateOptions) -> usize {
    cx.source().size(1, options.max_variants)
}

#[derive(Debug, Clone)]
pub struct UnionContents {
    opts: Opts,
    contents: Param<Vec<Triple>>,
}

pub fn union_contents(opts: &Opts, contents: Param<Vec<Triple>>) -> UnionContents {
    UnionContents {
        opts: opts.clone(),
        contents,
    }
}

impl Strategy for UnionContents {
    type Value = Triple;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Triple> {
        let variants = draw_contents(cx, &self.contents, |cx| {
            let count = draw_variant_count(cx, self.opts.options());
            Ok((Contents::child(&self.opts).root(FreeRoot::under_union()), count))
        })?;
        let index_width = draw_union_index(cx);
        let value = wrap_union(
            cx,
            self.opts.options(),
            index_width,
            variants.into_iter().map(|variant| variant.value).collect(),
        )?;
        Ok(Triple::from_value(value))
    }
}
