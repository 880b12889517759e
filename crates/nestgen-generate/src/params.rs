use serde_json::{Map, Value};

use nestgen_core::DType;

use crate::errors::GenerationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Size,
    Float,
    Text,
    DTypes,
}

#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn new(key: &'static str, kind: ParamKind, required: bool) -> Self {
        Self {
            key,
            kind,
            required,
        }
    }
}

pub struct ParamMap<'a> {
    map: Option<&'a Map<String, Value>>,
}

pub fn validate_params<'a>(
    params: Option<&'a Value>,
    specs: &[ParamSpec],
    ctx: &'static str,
) -> Result<ParamMap<'a>, GenerationError> {
    let map = match params {
        None => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            return Err(GenerationError::Config(format!(
                "{ctx}: options must be a JSON object"
            )));
        }
    };

    if let Some(map) = map {
        for (key, value) in map {
            let Some(spec) = specs.iter().find(|spec| spec.key == key.as_str()) else {
                return Err(GenerationError::Config(format!(
                    "{ctx}: unknown option '{key}'"
                )));
            };
            validate_kind(ctx, key, spec.kind, value)?;
        }
    }

    for spec in specs {
        if spec.required && !map.is_some_and(|map| map.contains_key(spec.key)) {
            return Err(GenerationError::Config(format!(
                "{ctx}: missing required option '{}'",
                spec.key
            )));
        }
    }

    Ok(ParamMap { map })
}

impl<'a> ParamMap<'a> {
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|map| map.get(key))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|value| usize::try_from(value).ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_dtypes(&self, key: &str) -> Option<Vec<DType>> {
        self.get(key)?
            .as_array()?
            .iter()
            .map(|item| item.as_str().and_then(|name| name.parse().ok()))
            .collect()
    }
}

fn validate_kind(
    ctx: &'static str,
    key: &str,
    kind: ParamKind,
    value: &Value,
) -> Result<(), GenerationError> {
    let valid = match kind {
        ParamKind::Bool => value.is_boolean(),
        ParamKind::Size => value.as_u64().is_some(),
        ParamKind::Float => value.as_f64().is_some_and(f64::is_finite),
        ParamKind::Text => value.is_string(),
        ParamKind::DTypes => value.as_array().is_some_and(|items| {
            items.iter().all(|item| {
                item.as_str()
                    .is_some_and(|name| name.parse::<DType>().is_ok())
            })
        }),
    };

    if valid {
        Ok(())
    } else {
        Err(GenerationError::Config(format!(
            "{ctx}: invalid value for option '{key}'"
        )))
    }
}
