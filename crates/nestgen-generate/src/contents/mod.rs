//! Content strategies, one per node variant, plus the free-form
//! [`contents`] strategy that picks variants recursively.

pub mod list;
pub mod numpy;
pub mod option;
pub mod record;
pub mod regular;
pub mod string;
pub mod union;

use nestgen_core::Value;

use crate::engine::{Builder, Shape, internal};
use crate::errors::{GenerationError, Result};
use crate::model::Triple;
use crate::options::{Opts, Param};
use crate::strategy::{DrawContext, Strategy};

pub use list::{ListContents, list_contents, wrap_list};
pub use numpy::{NumpyContents, numpy_contents, numpy_value};
pub use option::{OptionContents, option_contents, wrap_option};
pub use record::{RecordContents, record_contents, wrap_record};
pub use regular::{RegularContents, regular_contents, wrap_regular};
pub use string::{StringContents, bytestring_contents, string_contents, string_value};
pub use union::{UnionContents, union_contents, wrap_union};

/// Variants excluded at the root of a free draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreeRoot {
    pub no_option: bool,
    pub no_union: bool,
}

impl FreeRoot {
    /// Option content cannot itself be an option.
    pub fn under_option() -> Self {
        Self {
            no_option: true,
            no_union: false,
        }
    }

    /// Union variants cannot themselves be unions.
    pub fn under_union() -> Self {
        Self {
            no_option: false,
            no_union: true,
        }
    }
}

/// Any content, built recursively within the scope's budgets.
#[derive(Debug, Clone)]
pub struct Contents {
    opts: Opts,
    depth: usize,
    root: FreeRoot,
}

pub fn contents(opts: &Opts) -> Contents {
    Contents {
        opts: opts.clone(),
        depth: opts.options().max_depth,
        root: FreeRoot::default(),
    }
}

impl Contents {
    /// Contents one level below the scope's root.
    pub(crate) fn child(opts: &Opts) -> Self {
        Self {
            opts: opts.clone(),
            depth: opts.options().max_depth.saturating_sub(1),
            root: FreeRoot::default(),
        }
    }

    pub fn root(mut self, root: FreeRoot) -> Self {
        self.root = root;
        self
    }
}

impl Strategy for Contents {
    type Value = Triple;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Triple> {
        let options = self.opts.options();
        options.validate()?;
        let mut builder = Builder::new(cx, options);
        let value = builder.build(cx, Shape::Free(self.root), self.depth)?;
        let triple = Triple::from_value(value);
        triple.verify().map_err(internal)?;
        Ok(triple)
    }
}

/// A single terminal node: numeric leaf, string or bytestring.
#[derive(Debug, Clone)]
pub struct LeafContents {
    opts: Opts,
}

pub fn leaf_contents(opts: &Opts) -> LeafContents {
    LeafContents { opts: opts.clone() }
}

impl Strategy for LeafContents {
    type Value = Triple;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Triple> {
        let options = self.opts.options();
        let weights = [
            if options.allow_numpy { 4 } else { 0 },
            u32::from(options.allow_string),
            u32::from(options.allow_bytestring),
        ];
        match cx.source().weighted(&weights) {
            Some(0) => numpy_contents(&self.opts).draw(cx),
            Some(1) => string_contents(&self.opts).draw(cx),
            Some(_) => bytestring_contents(&self.opts).draw(cx),
            None => Err(GenerationError::Config(
                "at least one of numpy, string or bytestring leaves must be allowed".to_string(),
            )),
        }
    }
}

/// Resolve a content parameter. Supplied triples must be consistent.
pub(crate) fn draw_content<F>(
    cx: &mut DrawContext<'_>,
    content: &Param<Triple>,
    auto: F,
) -> Result<Triple>
where
    F: FnOnce() -> Contents,
{
    let triple = match content {
        Param::Auto => return auto().draw(cx),
        Param::Value(triple) => triple.clone(),
        Param::Drawn(handle) => cx.resolve(handle)?,
    };
    check_supplied(&triple)?;
    Ok(triple)
}

/// Resolve a list-of-contents parameter. `auto` picks the strategy and the
/// number of children to draw.
pub(crate) fn draw_contents<F>(
    cx: &mut DrawContext<'_>,
    contents: &Param<Vec<Triple>>,
    auto: F,
) -> Result<Vec<Triple>>
where
    F: FnOnce(&mut DrawContext<'_>) -> Result<(Contents, usize)>,
{
    let triples = match contents {
        Param::Auto => {
            let (strategy, count) = auto(cx)?;
            return (0..count).map(|_| strategy.draw(cx)).collect();
        }
        Param::Value(triples) => triples.clone(),
        Param::Drawn(handle) => cx.resolve(handle)?,
    };
    for triple in &triples {
        check_supplied(triple)?;
    }
    Ok(triples)
}

fn check_supplied(triple: &Triple) -> Result<()> {
    triple.verify().map_err(|violation| {
        GenerationError::Config(format!("supplied content is inconsistent: {violation}"))
    })
}

/// True when any leaf of `value` holds NaN or NaT.
pub fn any_nan_nat(value: &Value) -> bool {
    value.any_nan_nat()
}
