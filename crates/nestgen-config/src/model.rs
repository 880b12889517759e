use nestgen_core::{DType, Form, Type};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Current contract version for generation config files.
pub const CONFIG_VERSION: &str = "0.1";

/// Top-level generation config, loaded from TOML or JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Config contract version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Seed for the deterministic draw source.
    #[serde(default)]
    pub seed: u64,
    /// Number of triples to generate.
    #[serde(default = "default_count")]
    pub count: usize,
    /// Generation options.
    #[serde(default)]
    pub options: OptionsConfig,
    /// Optional type constraint; fixes the generated type exactly.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    /// Optional form constraint; fixes the generated layout exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<Form>,
    /// Which parts of each triple to emit.
    #[serde(default = "default_emit")]
    pub emit: Vec<Component>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            seed: 0,
            count: default_count(),
            options: OptionsConfig::default(),
            ty: None,
            form: None,
            emit: default_emit(),
        }
    }
}

/// A part of a generated triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Type,
    Form,
    Value,
}

/// Plain-valued generation options.
///
/// Every field has a default, so an empty table is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsConfig {
    /// Admissible leaf dtypes; all supported dtypes when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtypes: Option<Vec<DType>>,
    /// Allow option nodes and missing entries.
    pub allow_null: bool,
    /// Allow NaN in float/complex leaves and NaT in time leaves.
    pub allow_nan: bool,
    /// Minimum length of leaf, string and list nodes.
    pub min_size: usize,
    /// Maximum length of every node.
    pub max_size: usize,
    /// Maximum composite nesting.
    pub max_depth: usize,
    /// Maximum composite nodes per generated triple.
    pub max_nodes: usize,
    /// Maximum record fields.
    #[schemars(range(max = 1024))]
    pub max_fields: usize,
    /// Maximum union variants.
    #[schemars(range(max = 127))]
    pub max_variants: usize,
    /// Lower bound for numeric leaves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    /// Upper bound for numeric leaves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Characters used for UTF-8 strings; printable ASCII when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alphabet: Option<String>,
    /// Maximum characters (or bytes) per string.
    pub max_string_length: usize,
    pub allow_numpy: bool,
    pub allow_string: bool,
    pub allow_bytestring: bool,
    pub allow_list: bool,
    pub allow_regular: bool,
    pub allow_record: bool,
    pub allow_union: bool,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            dtypes: None,
            allow_null: true,
            allow_nan: false,
            min_size: 0,
            max_size: 10,
            max_depth: 5,
            max_nodes: 32,
            max_fields: 4,
            max_variants: 3,
            min_value: None,
            max_value: None,
            alphabet: None,
            max_string_length: 8,
            allow_numpy: true,
            allow_string: true,
            allow_bytestring: true,
            allow_list: true,
            allow_regular: true,
            allow_record: true,
            allow_union: true,
        }
    }
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_count() -> usize {
    1
}

fn default_emit() -> Vec<Component> {
    vec![Component::Type, Component::Form, Component::Value]
}
