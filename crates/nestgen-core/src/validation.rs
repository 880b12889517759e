use thiserror::Error;

use crate::form::Form;
use crate::layout::validity_error;
use crate::types::Type;
use crate::value::Value;

/// First inconsistency found among a type, a form and a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} at {path}: {message}")]
pub struct Violation {
    /// Stable machine-readable code.
    pub code: &'static str,
    /// JSON-path-like location of the offending node, e.g. `$.fields.x`.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(code: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
        }
    }
}

pub const INVALID_TYPE: &str = "invalid_type";
pub const INVALID_FORM: &str = "invalid_form";
pub const FORM_TYPE_MISMATCH: &str = "form_type_mismatch";
pub const INVALID_LAYOUT: &str = "invalid_layout";
pub const VALUE_FORM_MISMATCH: &str = "value_form_mismatch";
pub const VALUE_TYPE_MISMATCH: &str = "value_type_mismatch";

/// Check every supplied item on its own and against each other.
///
/// Items are checked in order type, form, value; the first violation wins.
/// Absent items are skipped, so `check_consistency(None, None, None)` is `Ok`.
pub fn check_consistency(
    ty: Option<&Type>,
    form: Option<&Form>,
    value: Option<&Value>,
) -> Result<(), Violation> {
    if let Some(ty) = ty {
        ty.validate()
            .map_err(|err| Violation::new(INVALID_TYPE, "$", err.to_string()))?;
    }
    if let Some(form) = form {
        form.validate()
            .map_err(|err| Violation::new(INVALID_FORM, "$", err.to_string()))?;
        if let Some(ty) = ty
            && let Some((path, message)) = type_diff(&form.project(), ty, "$")
        {
            return Err(Violation::new(FORM_TYPE_MISMATCH, path, message));
        }
    }
    if let Some(value) = value {
        if let Some(violation) = validity_error(value) {
            return Err(violation);
        }
        let actual = value.form();
        if let Some(form) = form
            && let Some((path, message)) = form_diff(&actual, form, "$")
        {
            return Err(Violation::new(VALUE_FORM_MISMATCH, path, message));
        }
        if let Some(ty) = ty
            && let Some((path, message)) = type_diff(&actual.project(), ty, "$")
        {
            return Err(Violation::new(VALUE_TYPE_MISMATCH, path, message));
        }
    }
    Ok(())
}

/// Locate the first structural difference between two types.
pub fn type_diff(actual: &Type, expected: &Type, path: &str) -> Option<(String, String)> {
    if actual.kind() != expected.kind() {
        return Some((
            path.to_string(),
            format!("expected {}, found {}", expected.kind(), actual.kind()),
        ));
    }
    match (actual, expected) {
        (Type::Leaf { dtype: a }, Type::Leaf { dtype: e }) if a != e => {
            Some((path.to_string(), format!("expected dtype {e}, found {a}")))
        }
        (Type::String { encoding: a }, Type::String { encoding: e }) if a != e => Some((
            path.to_string(),
            format!("expected {expected}, found {actual}"),
        )),
        (Type::Regular { size: a, content: ac }, Type::Regular { size: e, content: ec }) => {
            if a != e {
                return Some((path.to_string(), format!("expected size {e}, found {a}")));
            }
            type_diff(ac, ec, &format!("{path}.content"))
        }
        (Type::List { content: ac }, Type::List { content: ec })
        | (Type::Option { content: ac }, Type::Option { content: ec }) => {
            type_diff(ac, ec, &format!("{path}.content"))
        }
        (Type::Record { fields: af }, Type::Record { fields: ef }) => {
            let actual_names: Vec<&str> = af.iter().map(|f| f.name.as_str()).collect();
            let expected_names: Vec<&str> = ef.iter().map(|f| f.name.as_str()).collect();
            if actual_names != expected_names {
                return Some((
                    path.to_string(),
                    format!("expected fields {expected_names:?}, found {actual_names:?}"),
                ));
            }
            af.iter().zip(ef).find_map(|(a, e)| {
                type_diff(&a.ty, &e.ty, &format!("{path}.fields.{}", e.name))
            })
        }
        (Type::Union { variants: av }, Type::Union { variants: ev }) => {
            if av.len() != ev.len() {
                return Some((
                    path.to_string(),
                    format!("expected {} variants, found {}", ev.len(), av.len()),
                ));
            }
            av.iter()
                .zip(ev)
                .enumerate()
                .find_map(|(i, (a, e))| type_diff(a, e, &format!("{path}.variants[{i}]")))
        }
        _ => None,
    }
}

/// Locate the first difference between two forms, layout included.
pub fn form_diff(actual: &Form, expected: &Form, path: &str) -> Option<(String, String)> {
    if actual.kind() != expected.kind() {
        return Some((
            path.to_string(),
            format!("expected {}, found {}", expected.kind(), actual.kind()),
        ));
    }
    let here = |message: String| Some((path.to_string(), message));
    match (actual, expected) {
        (Form::Numpy { dtype: a }, Form::Numpy { dtype: e }) => {
            (a != e).then(|| (path.to_string(), format!("expected dtype {e}, found {a}")))
        }
        (Form::String { encoding: ae, layout: al }, Form::String { encoding: ee, layout: el }) => {
            if ae != ee {
                return here(format!("expected encoding {ee:?}, found {ae:?}"));
            }
            (al != el).then(|| (path.to_string(), format!("expected layout {el:?}, found {al:?}")))
        }
        (Form::List { layout: al, content: ac }, Form::List { layout: el, content: ec }) => {
            if al != el {
                return here(format!("expected layout {el:?}, found {al:?}"));
            }
            form_diff(ac, ec, &format!("{path}.content"))
        }
        (Form::Option { layout: al, content: ac }, Form::Option { layout: el, content: ec }) => {
            if al != el {
                return here(format!("expected layout {el:?}, found {al:?}"));
            }
            form_diff(ac, ec, &format!("{path}.content"))
        }
        (Form::Regular { size: a, content: ac }, Form::Regular { size: e, content: ec }) => {
            if a != e {
                return here(format!("expected size {e}, found {a}"));
            }
            form_diff(ac, ec, &format!("{path}.content"))
        }
        (Form::Record { fields: af }, Form::Record { fields: ef }) => {
            let actual_names: Vec<&str> = af.iter().map(|f| f.name.as_str()).collect();
            let expected_names: Vec<&str> = ef.iter().map(|f| f.name.as_str()).collect();
            if actual_names != expected_names {
                return here(format!(
                    "expected fields {expected_names:?}, found {actual_names:?}"
                ));
            }
            af.iter().zip(ef).find_map(|(a, e)| {
                form_diff(&a.form, &e.form, &format!("{path}.fields.{}", e.name))
            })
        }
        (Form::Union { index: ai, variants: av }, Form::Union { index: ei, variants: ev }) => {
            if ai != ei {
                return here(format!("expected index width {ei}, found {ai}"));
            }
            if av.len() != ev.len() {
                return here(format!(
                    "expected {} variants, found {}",
                    ev.len(),
                    av.len()
                ));
            }
            av.iter()
                .zip(ev)
                .enumerate()
                .find_map(|(i, (a, e))| form_diff(a, e, &format!("{path}.variants[{i}]")))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;

    #[test]
    fn nothing_supplied_is_consistent() {
        assert_eq!(check_consistency(None, None, None), Ok(()));
    }

    #[test]
    fn type_diff_reports_nested_path() {
        let actual = Type::record([("x", Type::list(Type::leaf(DType::Int8)))]).unwrap();
        let expected = Type::record([("x", Type::list(Type::leaf(DType::Int16)))]).unwrap();
        let (path, message) = type_diff(&actual, &expected, "$").unwrap();
        assert_eq!(path, "$.fields.x.content");
        assert!(message.contains("int16"));
    }

    #[test]
    fn form_type_mismatch_is_reported() {
        let ty = Type::list(Type::leaf(DType::Float64));
        let form = Form::canonical(&Type::list(Type::leaf(DType::Float32)));
        let violation = check_consistency(Some(&ty), Some(&form), None).unwrap_err();
        assert_eq!(violation.code, FORM_TYPE_MISMATCH);
        assert_eq!(violation.path, "$.content");
    }
}
