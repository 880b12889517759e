//! Generation options and the scope that resolves them.

use std::fmt::Debug;
use std::rc::Rc;

use nestgen_config::OptionsConfig;
use nestgen_core::{DEPTH_CEILING, DType, MAX_FIELDS};
use serde_json::Value;

use crate::errors::{GenerationError, Result};
use crate::params::{ParamKind, ParamSpec, validate_params};
use crate::record::{DrawRecord, FactoryHandle, Handle, Recorder};
use crate::source::DrawSource;
use crate::strategy::{DrawContext, Strategy};

/// A scalar option: engine default, a concrete value, or a registered
/// strategy drawn each time the option is read.
#[derive(Debug, Clone, PartialEq)]
pub enum Param<T> {
    Auto,
    Value(T),
    Drawn(Handle<T>),
}

impl<T> Default for Param<T> {
    fn default() -> Self {
        Param::Auto
    }
}

impl<T: Clone + Debug + 'static> Param<T> {
    /// `None` for `Auto`.
    pub fn resolve(&self, cx: &mut DrawContext<'_>) -> Result<Option<T>> {
        match self {
            Param::Auto => Ok(None),
            Param::Value(value) => Ok(Some(value.clone())),
            Param::Drawn(handle) => cx.resolve(handle).map(Some),
        }
    }

    pub fn resolve_or(&self, cx: &mut DrawContext<'_>, default: T) -> Result<T> {
        Ok(self.resolve(cx)?.unwrap_or(default))
    }

    pub fn fixed(&self) -> Option<&T> {
        match self {
            Param::Value(value) => Some(value),
            Param::Auto | Param::Drawn(_) => None,
        }
    }

    fn check_handle(&self, recorder: &Recorder) -> Result<()> {
        if let Param::Drawn(handle) = self {
            recorder.strategy(handle)?;
        }
        Ok(())
    }
}

/// A choice among values: engine pool, one value, an explicit set, or a
/// registered strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Knob<T> {
    Auto,
    Fixed(T),
    OneOf(Vec<T>),
    /// Opaque to the checks made before recursion; each drawn value is
    /// checked where it is used.
    Drawn(Handle<T>),
}

impl<T> Default for Knob<T> {
    fn default() -> Self {
        Knob::Auto
    }
}

impl<T: Clone + Debug + PartialEq + 'static> Knob<T> {
    /// Draw one value; `Auto` picks from `pool`.
    pub fn resolve(&self, cx: &mut DrawContext<'_>, pool: &[T]) -> Result<T> {
        let values = match self {
            Knob::Fixed(value) => return Ok(value.clone()),
            Knob::Drawn(handle) => return cx.resolve(handle),
            Knob::Auto => pool,
            Knob::OneOf(values) => values.as_slice(),
        };
        cx.source()
            .choose(values)
            .cloned()
            .ok_or_else(|| GenerationError::Config("cannot choose from an empty set".to_string()))
    }

    /// Whether `value` can come out of this knob. Drawn knobs admit
    /// anything since their strategy is opaque.
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Knob::Auto | Knob::Drawn(_) => true,
            Knob::Fixed(fixed) => fixed == value,
            Knob::OneOf(values) => values.contains(value),
        }
    }

    fn check_handle(&self, recorder: &Recorder) -> Result<()> {
        if let Knob::Drawn(handle) = self {
            recorder.strategy(handle)?;
        }
        Ok(())
    }
}

/// Every knob the engine reads.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub dtypes: Knob<DType>,
    pub allow_null: Param<bool>,
    pub allow_nan: Param<bool>,
    /// Minimum length of leaf, string and list nodes.
    pub min_size: usize,
    /// Maximum length of every node.
    pub max_size: usize,
    pub max_depth: usize,
    /// Composite nodes per session.
    pub max_nodes: usize,
    pub max_fields: usize,
    pub max_variants: usize,
    pub min_value: Param<f64>,
    pub max_value: Param<f64>,
    pub alphabet: Knob<char>,
    pub max_string_length: usize,
    pub allow_numpy: bool,
    pub allow_string: bool,
    pub allow_bytestring: bool,
    pub allow_list: bool,
    pub allow_regular: bool,
    pub allow_record: bool,
    pub allow_union: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            dtypes: Knob::Auto,
            allow_null: Param::Value(true),
            allow_nan: Param::Value(false),
            min_size: 0,
            max_size: 10,
            max_depth: 5,
            max_nodes: 32,
            max_fields: 4,
            max_variants: 3,
            min_value: Param::Auto,
            max_value: Param::Auto,
            alphabet: Knob::Auto,
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

impl GenerateOptions {
    pub fn from_config(config: &OptionsConfig) -> Self {
        let dtypes = match config.dtypes.as_deref() {
            None => Knob::Auto,
            Some([dtype]) => Knob::Fixed(*dtype),
            Some(dtypes) => Knob::OneOf(dtypes.to_vec()),
        };
        let alphabet = match &config.alphabet {
            None => Knob::Auto,
            Some(chars) => Knob::OneOf(chars.chars().collect()),
        };
        Self {
            dtypes,
            allow_null: Param::Value(config.allow_null),
            allow_nan: Param::Value(config.allow_nan),
            min_size: config.min_size,
            max_size: config.max_size,
            max_depth: config.max_depth,
            max_nodes: config.max_nodes,
            max_fields: config.max_fields,
            max_variants: config.max_variants,
            min_value: config.min_value.map_or(Param::Auto, Param::Value),
            max_value: config.max_value.map_or(Param::Auto, Param::Value),
            alphabet,
            max_string_length: config.max_string_length,
            allow_numpy: config.allow_numpy,
            allow_string: config.allow_string,
            allow_bytestring: config.allow_bytestring,
            allow_list: config.allow_list,
            allow_regular: config.allow_regular,
            allow_record: config.allow_record,
            allow_union: config.allow_union,
        }
    }

    /// Static checks, run before any recursion.
    pub fn validate(&self) -> Result<()> {
        if self.min_size > self.max_size {
            return Err(config_error(format!(
                "min_size {} exceeds max_size {}",
                self.min_size, self.max_size
            )));
        }
        if self.max_depth > DEPTH_CEILING {
            return Err(config_error(format!(
                "max_depth {} exceeds the recursion ceiling {DEPTH_CEILING}",
                self.max_depth
            )));
        }
        if self.max_fields == 0 || self.max_fields > MAX_FIELDS {
            return Err(config_error(format!(
                "max_fields must be in 1..={MAX_FIELDS}, got {}",
                self.max_fields
            )));
        }
        if self.max_variants == 0 || self.max_variants > i8::MAX as usize {
            return Err(config_error(format!(
                "max_variants must be in 1..={}, got {}",
                i8::MAX,
                self.max_variants
            )));
        }
        if matches!(&self.dtypes, Knob::OneOf(dtypes) if dtypes.is_empty()) {
            return Err(config_error("dtype set is empty"));
        }
        if matches!(&self.alphabet, Knob::OneOf(chars) if chars.is_empty()) {
            return Err(config_error("alphabet is empty"));
        }
        for (name, bound) in [("min_value", &self.min_value), ("max_value", &self.max_value)] {
            if let Some(bound) = bound.fixed()
                && !bound.is_finite()
            {
                return Err(config_error(format!("{name} must be finite, got {bound}")));
            }
        }
        if let (Some(min), Some(max)) = (self.min_value.fixed(), self.max_value.fixed())
            && min > max
        {
            return Err(config_error(format!(
                "min_value {min} exceeds max_value {max}"
            )));
        }
        if !self.allow_numpy && !self.allow_string && !self.allow_bytestring {
            return Err(config_error(
                "at least one of numpy, string or bytestring leaves must be allowed",
            ));
        }
        Ok(())
    }

    /// Fail fast on handles that `recorder` never registered.
    pub fn check_handles(&self, recorder: &Recorder) -> Result<()> {
        self.dtypes.check_handle(recorder)?;
        self.allow_null.check_handle(recorder)?;
        self.allow_nan.check_handle(recorder)?;
        self.min_value.check_handle(recorder)?;
        self.max_value.check_handle(recorder)?;
        self.alphabet.check_handle(recorder)
    }

    /// Whether `dtype` can be produced at all under the fixed knobs.
    pub fn admits_dtype(&self, dtype: DType) -> bool {
        self.dtypes.admits(&dtype)
    }

    /// True unless nulls are switched off outright.
    pub fn may_be_null(&self) -> bool {
        self.allow_null.fixed() != Some(&false)
    }
}

fn config_error(message: impl Into<String>) -> GenerationError {
    GenerationError::Config(message.into())
}

/// Overrides layered on a parent scope by [`Opts::extend`]. `None` keeps
/// the parent's setting.
#[derive(Debug, Clone, Default)]
pub struct OptionsPatch {
    pub dtypes: Option<Knob<DType>>,
    pub allow_null: Option<Param<bool>>,
    pub allow_nan: Option<Param<bool>>,
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
    pub max_depth: Option<usize>,
    pub max_nodes: Option<usize>,
    pub max_fields: Option<usize>,
    pub max_variants: Option<usize>,
    pub min_value: Option<Param<f64>>,
    pub max_value: Option<Param<f64>>,
    pub alphabet: Option<Knob<char>>,
    pub max_string_length: Option<usize>,
    pub allow_numpy: Option<bool>,
    pub allow_string: Option<bool>,
    pub allow_bytestring: Option<bool>,
    pub allow_list: Option<bool>,
    pub allow_regular: Option<bool>,
    pub allow_record: Option<bool>,
    pub allow_union: Option<bool>,
}

const PATCH_SPECS: &[ParamSpec] = &[
    ParamSpec::new("dtypes", ParamKind::DTypes, false),
    ParamSpec::new("allow_null", ParamKind::Bool, false),
    ParamSpec::new("allow_nan", ParamKind::Bool, false),
    ParamSpec::new("min_size", ParamKind::Size, false),
    ParamSpec::new("max_size", ParamKind::Size, false),
    ParamSpec::new("max_depth", ParamKind::Size, false),
    ParamSpec::new("max_nodes", ParamKind::Size, false),
    ParamSpec::new("max_fields", ParamKind::Size, false),
    ParamSpec::new("max_variants", ParamKind::Size, false),
    ParamSpec::new("min_value", ParamKind::Float, false),
    ParamSpec::new("max_value", ParamKind::Float, false),
    ParamSpec::new("alphabet", ParamKind::Text, false),
    ParamSpec::new("max_string_length", ParamKind::Size, false),
    ParamSpec::new("allow_numpy", ParamKind::Bool, false),
    ParamSpec::new("allow_string", ParamKind::Bool, false),
    ParamSpec::new("allow_bytestring", ParamKind::Bool, false),
    ParamSpec::new("allow_list", ParamKind::Bool, false),
    ParamSpec::new("allow_regular", ParamKind::Bool, false),
    ParamSpec::new("allow_record", ParamKind::Bool, false),
    ParamSpec::new("allow_union", ParamKind::Bool, false),
];

impl OptionsPatch {
    /// Patch from a JSON object of plain values. Unknown keys are a
    /// configuration error.
    pub fn from_json(params: &Value) -> Result<Self> {
        let map = validate_params(Some(params), PATCH_SPECS, "options patch")?;
        Ok(Self {
            dtypes: map.get_dtypes("dtypes").map(|dtypes| match dtypes.as_slice() {
                [dtype] => Knob::Fixed(*dtype),
                _ => Knob::OneOf(dtypes),
            }),
            allow_null: map.get_bool("allow_null").map(Param::Value),
            allow_nan: map.get_bool("allow_nan").map(Param::Value),
            min_size: map.get_usize("min_size"),
            max_size: map.get_usize("max_size"),
            max_depth: map.get_usize("max_depth"),
            max_nodes: map.get_usize("max_nodes"),
            max_fields: map.get_usize("max_fields"),
            max_variants: map.get_usize("max_variants"),
            min_value: map.get_f64("min_value").map(Param::Value),
            max_value: map.get_f64("max_value").map(Param::Value),
            alphabet: map
                .get_str("alphabet")
                .map(|chars| Knob::OneOf(chars.chars().collect())),
            max_string_length: map.get_usize("max_string_length"),
            allow_numpy: map.get_bool("allow_numpy"),
            allow_string: map.get_bool("allow_string"),
            allow_bytestring: map.get_bool("allow_bytestring"),
            allow_list: map.get_bool("allow_list"),
            allow_regular: map.get_bool("allow_regular"),
            allow_record: map.get_bool("allow_record"),
            allow_union: map.get_bool("allow_union"),
        })
    }

    pub fn apply(self, base: &GenerateOptions) -> GenerateOptions {
        let base = base.clone();
        GenerateOptions {
            dtypes: self.dtypes.unwrap_or(base.dtypes),
            allow_null: self.allow_null.unwrap_or(base.allow_null),
            allow_nan: self.allow_nan.unwrap_or(base.allow_nan),
            min_size: self.min_size.unwrap_or(base.min_size),
            max_size: self.max_size.unwrap_or(base.max_size),
            max_depth: self.max_depth.unwrap_or(base.max_depth),
            max_nodes: self.max_nodes.unwrap_or(base.max_nodes),
            max_fields: self.max_fields.unwrap_or(base.max_fields),
            max_variants: self.max_variants.unwrap_or(base.max_variants),
            min_value: self.min_value.unwrap_or(base.min_value),
            max_value: self.max_value.unwrap_or(base.max_value),
            alphabet: self.alphabet.unwrap_or(base.alphabet),
            max_string_length: self.max_string_length.unwrap_or(base.max_string_length),
            allow_numpy: self.allow_numpy.unwrap_or(base.allow_numpy),
            allow_string: self.allow_string.unwrap_or(base.allow_string),
            allow_bytestring: self.allow_bytestring.unwrap_or(base.allow_bytestring),
            allow_list: self.allow_list.unwrap_or(base.allow_list),
            allow_regular: self.allow_regular.unwrap_or(base.allow_regular),
            allow_record: self.allow_record.unwrap_or(base.allow_record),
            allow_union: self.allow_union.unwrap_or(base.allow_union),
        }
    }
}

/// An options scope: option values plus the recorder every handle in the
/// scope logs into.
#[derive(Debug, Clone, Default)]
pub struct Opts {
    options: GenerateOptions,
    recorder: Recorder,
}

impl Opts {
    pub fn new(options: GenerateOptions) -> Self {
        Self {
            options,
            recorder: Recorder::new(),
        }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn register<S>(&self, strategy: S) -> Handle<S::Value>
    where
        S: Strategy + 'static,
        S::Value: 'static,
    {
        self.recorder.insert(Rc::new(strategy))
    }

    /// Register a shared strategy. Registering the same allocation twice
    /// yields the same handle, so each draw is logged once.
    pub fn register_shared<S>(&self, strategy: &Rc<S>) -> Handle<S::Value>
    where
        S: Strategy + 'static,
        S::Value: 'static,
    {
        let strategy: Rc<dyn Strategy<Value = S::Value>> = Rc::clone(strategy) as _;
        self.recorder.insert_shared(strategy)
    }

    pub fn register_factory<A, S, F>(&self, factory: F) -> FactoryHandle<A, S::Value>
    where
        F: Fn(A) -> S + 'static,
        S: Strategy + 'static,
        S::Value: 'static,
    {
        FactoryHandle::new(
            self.recorder.clone(),
            Rc::new(move |arg| Rc::new(factory(arg)) as Rc<dyn Strategy<Value = S::Value>>),
        )
    }

    /// Child scope with `patch` applied. Handles and the draw log are
    /// shared with `self`.
    pub fn extend(&self, patch: OptionsPatch) -> Opts {
        Opts {
            options: patch.apply(&self.options),
            recorder: self.recorder.clone(),
        }
    }

    pub fn reset(&self) {
        self.recorder.reset();
    }

    pub fn drawn<T: Clone + 'static>(&self, handle: &Handle<T>) -> Result<Vec<T>> {
        self.recorder.drawn(handle)
    }

    pub fn record(&self) -> DrawRecord {
        self.recorder.snapshot()
    }

    pub fn context<'a>(&self, source: &'a mut DrawSource) -> DrawContext<'a> {
        DrawContext::new(source, self.recorder.clone())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::strategy::{integers, sampled_from};

    #[test]
    fn defaults_are_valid() {
        assert!(GenerateOptions::default().validate().is_ok());
    }

    #[test]
    fn inverted_sizes_are_rejected() {
        let options = GenerateOptions {
            min_size: 4,
            max_size: 2,
            ..GenerateOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert!(matches!(err, GenerationError::Config(_)));
    }

    #[test]
    fn max_fields_above_cap_is_rejected() {
        let options = GenerateOptions {
            max_fields: MAX_FIELDS + 1,
            ..GenerateOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert!(matches!(err, GenerationError::Config(_)));

        let options = GenerateOptions {
            max_fields: MAX_FIELDS,
            ..GenerateOptions::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn no_terminal_variant_is_rejected() {
        let options = GenerateOptions {
            allow_numpy: false,
            allow_string: false,
            allow_bytestring: false,
            ..GenerateOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn patch_overrides_only_named_keys() {
        let patch = OptionsPatch::from_json(&json!({"max_size": 3, "dtypes": ["int32"]})).unwrap();
        let options = patch.apply(&GenerateOptions::default());
        assert_eq!(options.max_size, 3);
        assert_eq!(options.dtypes, Knob::Fixed(DType::Int32));
        assert_eq!(options.max_depth, 5);
    }

    #[test]
    fn extend_shares_the_log() {
        let base = Opts::default();
        let handle = base.register(integers(0, 9));
        let child = base.extend(OptionsPatch {
            max_size: Some(2),
            ..OptionsPatch::default()
        });
        let mut source = DrawSource::new(1);
        let mut cx = child.context(&mut source);
        let value = cx.resolve(&handle).unwrap();
        assert_eq!(base.drawn(&handle).unwrap(), vec![value]);
        assert_eq!(child.options().max_size, 2);
        assert_eq!(base.options().max_size, 10);
    }

    #[test]
    fn knob_admits_follows_fixed_values() {
        let knob = Knob::OneOf(vec![DType::Int8, DType::Float64]);
        assert!(knob.admits(&DType::Int8));
        assert!(!knob.admits(&DType::Bool));

        let opts = Opts::default();
        let drawn = Knob::Drawn(opts.register(sampled_from([DType::Bool])));
        assert!(drawn.admits(&DType::Int64));
    }
}
