//! Core contracts for nestgen.
//!
//! This crate defines the type, form and value algebra of nested arrays,
//! their flat buffer representation, and the consistency checks shared by
//! the generator and the CLI.

pub mod buffers;
pub mod dtype;
pub mod error;
pub mod form;
pub mod layout;
pub mod types;
pub mod validation;
pub mod value;

pub use buffers::{Buffer, BufferSet, from_buffers, to_buffers};
pub use dtype::{DType, DTypeFamily, NAT, TimeUnit};
pub use error::{Error, Result};
pub use form::{Form, FormField, IndexWidth, ListLayout, OptionLayout};
pub use layout::validity_error;
pub use types::{Field, StringEncoding, Type, TypeKind};
pub use validation::{Violation, check_consistency, form_diff, type_diff};
pub use value::{ListIndex, OptionMask, Scalars, Value, ValueField};

/// Hard recursion ceiling, independent of any configured depth.
pub const DEPTH_CEILING: usize = 64;

/// Most fields a generated record may carry. Generated names are unique
/// strings of one to three ASCII letters, so the cap stays well below that
/// name space.
pub const MAX_FIELDS: usize = 1024;

/// Current contract version for serialized forms and values.
pub const FORMAT_VERSION: &str = "0.1";
