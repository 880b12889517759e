use nestgen_core::Value;

use crate::errors::Result;
use crate::model::Triple;
use crate::options::{GenerateOptions, Opts, Param};
use crate::strategy::{DrawContext, Strategy};

use super::{Contents, draw_content};

/// Group size dividing `content_len`, at most `max_size`. Empty content
/// takes any size up to `max_size`; no divisor yields 0.
pub(crate) fn draw_group_size(cx: &mut DrawContext<'_>, content_len: usize, max_size: usize) -> usize {
    if content_len == 0 {
        return cx.source().size(0, max_size);
    }
    let divisors: Vec<usize> = (1..=content_len.min(max_size))
        .filter(|size| content_len % size == 0)
        .collect();
    cx.source().choose(&divisors).copied().unwrap_or(0)
}

/// Wrap `content` in a regular node. `size` fixes the group size; `None`
/// draws one. Size 0 draws the number of empty groups.
pub fn wrap_regular(
    cx: &mut DrawContext<'_>,
    options: &GenerateOptions,
    size: Option<usize>,
    content: Value,
) -> Result<Value> {
    let size = match size {
        Some(size) => size,
        None => draw_group_size(cx, content.len(), options.max_size),
    };
    let length = if size == 0 {
        cx.source().size(0, options.max_size)
    } else {
        content.len() / size
    };
    Ok(Value::Regular {
        size,
        length,
        content: Box::new(content),
    })
}

#[derive(Debug, Clone)]
pub struct RegularContents {
    opts: Opts,
    content: Param<Triple>,
}

pub fn regular_contents(opts: &Opts, content: Param<Triple>) -> RegularContents {
    RegularContents {
        opts: opts.clone(),
        content,
    }
}

impl Strategy for RegularContents {
    type Value = Triple;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Triple> {
        let content = draw_content(cx, &self.content, || Contents::child(&self.opts))?;
        let value = wrap_regular(cx, self.opts.options(), None, content.value)?;
        Ok(Triple::from_value(value))
    }
}
