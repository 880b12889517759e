//! Property-based generation of nested array triples.
//!
//! Strategies draw from a seeded [`DrawSource`]; [`generate`] builds a
//! consistent `(type, form, value)` triple, optionally pinned to a given
//! type or form, and reports every registered draw in a [`DrawRecord`].

pub mod budget;
pub mod contents;
pub mod engine;
pub mod errors;
pub mod model;
pub mod options;
pub mod params;
pub mod ranges;
pub mod record;
pub mod source;
pub mod strategy;

pub use budget::{Budget, CountdownDrawer, CountdownLimits, HasLength};
pub use contents::{
    Contents, FreeRoot, LeafContents, any_nan_nat, bytestring_contents, contents, leaf_contents,
    list_contents, numpy_contents, option_contents, record_contents, regular_contents,
    string_contents, union_contents,
};
pub use engine::{GenerationEngine, check_request, generate};
pub use errors::{GenerationError, Result};
pub use model::{Output, Request, Selection, Triple};
pub use options::{GenerateOptions, Knob, Opts, OptionsPatch, Param};
pub use ranges::{Ranges, ranges};
pub use record::{DrawRecord, FactoryHandle, Handle, RecordEntry, Recorder};
pub use source::{DrawSource, hash_seed};
pub use strategy::{DrawContext, Strategy, booleans, from_fn, integers, just, sampled_from};
