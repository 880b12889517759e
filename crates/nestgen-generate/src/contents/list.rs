use nestgen_core::{ListIndex, ListLayout, Value};

use crate::errors::{GenerationError, Result};
use crate::model::Triple;
use crate::options::{GenerateOptions, Opts, Param};
use crate::ranges::Ranges;
use crate::strategy::{DrawContext, Strategy};

use super::string::draw_list_layout;
use super::{Contents, draw_content};

/// Offsets splitting `content_len` elements into `n` lists.
pub(crate) fn draw_offsets(cx: &mut DrawContext<'_>, n: usize, content_len: usize) -> Vec<i64> {
    if n == 0 {
        return vec![0];
    }
    if content_len == 0 {
        return vec![0; n + 1];
    }
    let mut splits: Vec<i64> = (0..n - 1)
        .map(|_| cx.source().size(0, content_len) as i64)
        .collect();
    splits.sort_unstable();
    let mut offsets = Vec::with_capacity(n + 1);
    offsets.push(0);
    offsets.extend(splits);
    offsets.push(content_len as i64);
    offsets
}

/// Wrap `content` in a list node of `min_size..=max_size` lists.
///
/// Offset layouts split the content contiguously. Starts/stops layouts do
/// so half the time and otherwise draw each list's span on its own, so
/// lists may overlap or skip content.
pub fn wrap_list(
    cx: &mut DrawContext<'_>,
    options: &GenerateOptions,
    layout: ListLayout,
    content: Value,
) -> Result<Value> {
    let n = cx.source().size(options.min_size, options.max_size);
    let content_len = content.len();
    let independent = matches!(layout, ListLayout::StartsStops { .. }) && cx.source().coin();
    let index = match layout {
        ListLayout::StartsStops { width } if independent => {
            let spans = Ranges {
                min_start: Some(0),
                max_start: Some(content_len as i64),
                min_end: Some(0),
                max_end: Some(content_len as i64),
                allow_start_none: false,
                allow_end_none: false,
                ..Ranges::default()
            };
            let mut starts = Vec::with_capacity(n);
            let mut stops = Vec::with_capacity(n);
            for _ in 0..n {
                let (Some(start), Some(stop)) = cx.draw(&spans)? else {
                    return Err(GenerationError::Config(
                        "list spans must have both ends".to_string(),
                    ));
                };
                starts.push(start);
                stops.push(stop);
            }
            ListIndex::StartsStops {
                width,
                starts,
                stops,
            }
        }
        layout => ListIndex::from_offsets(layout, draw_offsets(cx, n, content_len)),
    };
    Ok(Value::List {
        index,
        content: Box::new(content),
    })
}

/// List contents around a drawn, fixed or handle-supplied child.
#[derive(Debug, Clone)]
pub struct ListContents {
    opts: Opts,
    content: Param<Triple>,
}

pub fn list_contents(opts: &Opts, content: Param<Triple>) -> ListContents {
    ListContents {
        opts: opts.clone(),
        content,
    }
}

impl Strategy for ListContents {
    type Value = Triple;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Triple> {
        let content = draw_content(cx, &self.content, || Contents::child(&self.opts))?;
        let layout = draw_list_layout(cx);
        let value = wrap_list(cx, self.opts.options(), layout, content.value)?;
        Ok(Triple::from_value(value))
    }
}
