use nestgen_core::{IndexWidth, OptionLayout, OptionMask, TypeKind, Value};

use crate::errors::{GenerationError, Result};
use crate::model::Triple;
use crate::options::{GenerateOptions, Opts, Param};
use crate::strategy::{DrawContext, Strategy};

use super::{Contents, FreeRoot, draw_content};

const NULL_PROBABILITY: f64 = 0.25;

/// Layout drawn for option nodes.
pub(crate) fn draw_option_layout(cx: &mut DrawContext<'_>) -> OptionLayout {
    let source = cx.source();
    match source.size(0, 3) {
        0 => OptionLayout::Indexed {
            width: IndexWidth::SIGNED[source.size(0, IndexWidth::SIGNED.len() - 1)],
        },
        1 => OptionLayout::ByteMasked {
            valid_when: source.coin(),
        },
        2 => OptionLayout::BitMasked {
            valid_when: source.coin(),
            lsb_order: source.coin(),
        },
        _ => OptionLayout::Unmasked,
    }
}

/// Wrap `content` in an option node with per-entry null decisions.
///
/// Nulls are drawn only when `allow_null` resolves true and the layout can
/// express them.
pub fn wrap_option(
    cx: &mut DrawContext<'_>,
    options: &GenerateOptions,
    layout: OptionLayout,
    content: Value,
) -> Result<Value> {
    if content.kind() == TypeKind::Option {
        return Err(GenerationError::Config(
            "option content must not be an option".to_string(),
        ));
    }
    let allow_null = options.allow_null.resolve_or(cx, true)? && layout != OptionLayout::Unmasked;
    let valid: Vec<bool> = (0..content.len())
        .map(|_| !(allow_null && cx.source().boolean(NULL_PROBABILITY)))
        .collect();
    Ok(Value::Option {
        mask: OptionMask::from_validity(layout, &valid),
        content: Box::new(content),
    })
}

#[derive(Debug, Clone)]
pub struct OptionContents {
    opts: Opts,
    content: Param<Triple>,
}

pub fn option_contents(opts: &Opts, content: Param<Triple>) -> OptionContents {
    OptionContents {
        opts: opts.clone(),
        content,
    }
}

impl Strategy for OptionContents {
    type Value = Triple;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Triple> {
        let content = draw_content(cx, &self.content, || {
            Contents::child(&self.opts).root(FreeRoot::under_option())
        })?;
        let layout = draw_option_layout(cx);
        let value = wrap_option(cx, self.opts.options(), layout, content.value)?;
        Ok(Triple::from_value(value))
    }
}
