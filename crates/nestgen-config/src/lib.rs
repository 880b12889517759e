//! Generation config contracts and validation.
//!
//! Config files are TOML or JSON documents describing the options, seed,
//! count and optional type/form constraints of a generation run.

pub mod errors;
pub mod model;
pub mod schema;
pub mod validate;

pub use errors::{ConfigError, IssueSeverity, Result, ValidationIssue, ValidationReport};
pub use model::{CONFIG_VERSION, Component, GenerationConfig, OptionsConfig};
pub use schema::config_json_schema;
pub use validate::{
    ValidatedConfig, load_config, parse_config_str, validate_config, validate_config_document,
    validate_config_json,
};
