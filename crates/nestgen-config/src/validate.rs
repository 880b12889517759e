use std::path::Path;

use jsonschema::JSONSchema;
use nestgen_core::{DEPTH_CEILING, DType, MAX_FIELDS, check_consistency};
use serde_json::Value;

use crate::errors::{ConfigError, ValidationIssue, ValidationReport};
use crate::model::{CONFIG_VERSION, GenerationConfig};
use crate::schema::config_json_schema;

/// Validated config with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub config: GenerationConfig,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a config JSON document against the config JSON Schema.
pub fn validate_config_json(
    config_json: &Value,
    config_schema: &Value,
) -> Result<ValidationReport, ConfigError> {
    let compiled =
        JSONSchema::compile(config_schema).map_err(|err| ConfigError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(config_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push(ValidationIssue::error(
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Semantic checks the JSON Schema cannot express.
pub fn validate_config(config: &GenerationConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.version != CONFIG_VERSION {
        report.push(ValidationIssue::error(
            "version_mismatch",
            "/version",
            format!(
                "config version '{}' is not supported, expected '{CONFIG_VERSION}'",
                config.version
            ),
            Some("set version to the current config contract version"),
        ));
    }
    if config.count == 0 {
        report.push(ValidationIssue::warning(
            "count_zero",
            "/count",
            "count is zero, nothing will be generated",
            Some("set count to a positive integer"),
        ));
    }
    if config.emit.is_empty() {
        report.push(ValidationIssue::error(
            "emit_empty",
            "/emit",
            "emit must name at least one of type, form, value",
            None,
        ));
    }

    validate_options(config, &mut report);
    validate_constraints(config, &mut report);

    report
}

fn validate_options(config: &GenerationConfig, report: &mut ValidationReport) {
    let options = &config.options;

    if options.min_size > options.max_size {
        report.push(ValidationIssue::error(
            "size_bounds_inverted",
            "/options/min_size",
            format!(
                "min_size {} exceeds max_size {}",
                options.min_size, options.max_size
            ),
            Some("lower min_size or raise max_size"),
        ));
    }
    if options.max_depth > DEPTH_CEILING {
        report.push(ValidationIssue::error(
            "depth_ceiling_exceeded",
            "/options/max_depth",
            format!(
                "max_depth {} exceeds the recursion ceiling {DEPTH_CEILING}",
                options.max_depth
            ),
            None,
        ));
    }
    if options.max_fields == 0 {
        report.push(ValidationIssue::error(
            "max_fields_zero",
            "/options/max_fields",
            "records need at least one field",
            Some("set max_fields to 1 or more, or disable records with allow_record = false"),
        ));
    } else if options.max_fields > MAX_FIELDS {
        report.push(ValidationIssue::error(
            "max_fields_too_large",
            "/options/max_fields",
            format!(
                "max_fields {} exceeds the record field cap {MAX_FIELDS}",
                options.max_fields
            ),
            Some("keep max_fields at 1024 or below"),
        ));
    }
    if options.max_variants == 0 {
        report.push(ValidationIssue::error(
            "max_variants_zero",
            "/options/max_variants",
            "unions need at least one variant",
            Some("set max_variants to 1 or more, or disable unions with allow_union = false"),
        ));
    } else if options.max_variants > i8::MAX as usize {
        report.push(ValidationIssue::error(
            "max_variants_too_large",
            "/options/max_variants",
            format!(
                "{} variants do not fit 8-bit union tags",
                options.max_variants
            ),
            Some("keep max_variants at 127 or below"),
        ));
    }
    if let Some(dtypes) = &options.dtypes
        && dtypes.is_empty()
    {
        report.push(ValidationIssue::error(
            "dtypes_empty",
            "/options/dtypes",
            "dtype set is empty",
            Some("remove dtypes to allow every supported dtype"),
        ));
    }
    for (name, bound) in [("min_value", options.min_value), ("max_value", options.max_value)] {
        if let Some(bound) = bound
            && !bound.is_finite()
        {
            report.push(ValidationIssue::error(
                "value_bound_not_finite",
                format!("/options/{name}"),
                format!("{name} must be finite, got {bound}"),
                None,
            ));
        }
    }
    if let (Some(min), Some(max)) = (options.min_value, options.max_value)
        && min > max
    {
        report.push(ValidationIssue::error(
            "value_bounds_inverted",
            "/options/min_value",
            format!("min_value {min} exceeds max_value {max}"),
            None,
        ));
    }
    if let Some(alphabet) = &options.alphabet
        && alphabet.is_empty()
    {
        report.push(ValidationIssue::error(
            "alphabet_empty",
            "/options/alphabet",
            "alphabet must contain at least one character",
            Some("remove alphabet to use printable ASCII"),
        ));
    }
    if !options.allow_numpy && !options.allow_string && !options.allow_bytestring {
        report.push(ValidationIssue::error(
            "no_terminal_variant",
            "/options",
            "at least one of numpy, string or bytestring leaves must be allowed",
            None,
        ));
    }
}

fn validate_constraints(config: &GenerationConfig, report: &mut ValidationReport) {
    if let Some(ty) = &config.ty {
        if let Err(err) = ty.validate() {
            report.push(ValidationIssue::error("invalid_type", "/type", err.to_string(), None));
            return;
        }
        if ty.depth() > DEPTH_CEILING {
            report.push(ValidationIssue::error(
                "depth_ceiling_exceeded",
                "/type",
                format!(
                    "type nests {} composite layers, the ceiling is {DEPTH_CEILING}",
                    ty.depth()
                ),
                None,
            ));
        }
        if let Some(dtypes) = &config.options.dtypes {
            let missing: Vec<DType> = ty
                .dtypes()
                .into_iter()
                .filter(|dtype| !dtypes.contains(dtype))
                .collect();
            if let Some(dtype) = missing.first() {
                report.push(ValidationIssue::error(
                    "dtype_set_conflict",
                    "/options/dtypes",
                    format!("type uses {dtype}, which the dtype set excludes"),
                    Some("add the type's leaf dtypes to dtypes or drop the dtype set"),
                ));
            }
        }
        if !config.options.allow_null && ty.contains_kind(nestgen_core::TypeKind::Option) {
            report.push(ValidationIssue::warning(
                "nulls_disabled",
                "/options/allow_null",
                "type has option nodes but allow_null is false; they will hold no missing entries",
                None,
            ));
        }
    }

    if let Some(form) = &config.form
        && let Err(violation) = check_consistency(config.ty.as_ref(), Some(form), None)
    {
        report.push(ValidationIssue::error(
            violation.code,
            format!("/form{}", json_pointer_suffix(&violation.path)),
            violation.message,
            Some("the form must project exactly onto the type"),
        ));
    }
}

/// Validate the config end-to-end, returning structured issues on failure.
pub fn validate_config_document(config_json: &Value) -> Result<ValidatedConfig, ValidationReport> {
    let schema = match serde_json::to_value(config_json_schema()) {
        Ok(schema) => schema,
        Err(err) => return Err(single_error("schema_generation_error", err.to_string())),
    };
    let structural = match validate_config_json(config_json, &schema) {
        Ok(report) => report,
        Err(err) => return Err(single_error("schema_validation_error", err.to_string())),
    };
    if !structural.is_ok() {
        return Err(structural);
    }

    let config: GenerationConfig = match serde_json::from_value(config_json.clone()) {
        Ok(config) => config,
        Err(err) => return Err(single_error("invalid_config_json", err.to_string())),
    };

    let report = validate_config(&config);
    if !report.is_ok() {
        return Err(report);
    }

    Ok(ValidatedConfig {
        config,
        warnings: report.warnings,
    })
}

/// Parse config text as JSON or TOML into a JSON document.
pub fn parse_config_str(contents: &str, format: &str) -> Result<Value, ConfigError> {
    match format {
        "json" => Ok(serde_json::from_str(contents)?),
        "toml" => Ok(toml::from_str(contents)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Load and fully validate a config file; the format follows the extension.
pub fn load_config(path: &Path) -> Result<ValidatedConfig, ConfigError> {
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let contents = std::fs::read_to_string(path)?;
    let document = parse_config_str(&contents, &format)?;
    validate_config_document(&document).map_err(ConfigError::Invalid)
}

fn single_error(code: &str, message: String) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.push(ValidationIssue::error(code, "/", message, None));
    report
}

/// `$.fields.x.content` becomes `/fields/x/content`.
fn json_pointer_suffix(path: &str) -> String {
    path.trim_start_matches('$')
        .replace('[', ".")
        .replace(']', "")
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| format!("/{part}"))
        .collect()
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_paths_become_pointers() {
        assert_eq!(json_pointer_suffix("$"), "");
        assert_eq!(
            json_pointer_suffix("$.fields.x.variants[2].content"),
            "/fields/x/variants/2/content"
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = parse_config_str("{}", "yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
