//! Numeric leaves.

use nestgen_core::{DType, DTypeFamily, NAT, Scalars, Value};

use crate::errors::{GenerationError, Result};
use crate::model::Triple;
use crate::options::{GenerateOptions, Knob, Opts};
use crate::strategy::{DrawContext, Strategy};

/// Half-width of the float range used when a side is unbounded.
const FLOAT_SPAN: f64 = 1e6;
/// Tick range of datetime and timedelta leaves.
const TIME_SPAN: i64 = 1_000_000_000;
const NAN_PROBABILITY: f64 = 0.1;
const SPECIAL_PROBABILITY: f64 = 0.2;

/// Numeric bounds read once per leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bounds {
    pub fn fixed(options: &GenerateOptions) -> Self {
        Self {
            min: options.min_value.fixed().copied(),
            max: options.max_value.fixed().copied(),
        }
    }

    fn resolve(cx: &mut DrawContext<'_>, options: &GenerateOptions) -> Result<Self> {
        let bounds = Self {
            min: options.min_value.resolve(cx)?,
            max: options.max_value.resolve(cx)?,
        };
        if let (Some(min), Some(max)) = (bounds.min, bounds.max)
            && min > max
        {
            return Err(GenerationError::Config(format!(
                "min_value {min} exceeds max_value {max}"
            )));
        }
        Ok(bounds)
    }

    fn signed(&self, dtype: DType) -> Option<(i64, i64)> {
        let (low, high) = dtype.signed_range()?;
        let low = self.min.map_or(low, |min| low.max(min.ceil() as i64));
        let high = self.max.map_or(high, |max| high.min(max.floor() as i64));
        (low <= high).then_some((low, high))
    }

    fn unsigned(&self, dtype: DType) -> Option<(u64, u64)> {
        let high = dtype.unsigned_max()?;
        if self.max.is_some_and(|max| max < 0.0) {
            return None;
        }
        let low = self.min.map_or(0, |min| min.ceil().max(0.0) as u64);
        let high = self.max.map_or(high, |max| high.min(max.floor() as u64));
        (low <= high).then_some((low, high))
    }

    fn float(&self, single: bool) -> Option<(f64, f64)> {
        let (low, high) = match (self.min, self.max) {
            (Some(min), Some(max)) => (min, max),
            (Some(min), None) => (min, min + 2.0 * FLOAT_SPAN),
            (None, Some(max)) => (max - 2.0 * FLOAT_SPAN, max),
            (None, None) => (-FLOAT_SPAN, FLOAT_SPAN),
        };
        if !single {
            return (low <= high).then_some((low, high));
        }
        let mut low32 = (low.clamp(f32::MIN as f64, f32::MAX as f64)) as f32;
        if (low32 as f64) < low {
            low32 = f32_step(low32, true);
        }
        let mut high32 = (high.clamp(f32::MIN as f64, f32::MAX as f64)) as f32;
        if (high32 as f64) > high {
            high32 = f32_step(high32, false);
        }
        (low32 <= high32).then_some((low32 as f64, high32 as f64))
    }

    fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Whether any value of `dtype` lies inside the bounds. Bool and time
    /// dtypes ignore numeric bounds.
    pub fn admit(&self, dtype: DType) -> bool {
        match dtype.family() {
            DTypeFamily::Bool | DTypeFamily::Datetime | DTypeFamily::Timedelta => true,
            DTypeFamily::Signed => self.signed(dtype).is_some(),
            DTypeFamily::Unsigned => self.unsigned(dtype).is_some(),
            DTypeFamily::Float | DTypeFamily::Complex => {
                self.float(dtype.is_single_precision()).is_some()
            }
        }
    }
}

/// Neighbouring `f32` towards positive (`up`) or negative infinity.
fn f32_step(value: f32, up: bool) -> f32 {
    if !value.is_finite() {
        return value;
    }
    if value == 0.0 {
        let tiny = f32::from_bits(1);
        return if up { tiny } else { -tiny };
    }
    let bits = value.to_bits();
    if (value > 0.0) == up {
        f32::from_bits(bits + 1)
    } else {
        f32::from_bits(bits - 1)
    }
}

/// Draw a leaf dtype, skipping dtypes the fixed bounds exclude.
pub(crate) fn choose_dtype(cx: &mut DrawContext<'_>, options: &GenerateOptions) -> Result<DType> {
    let pool = match &options.dtypes {
        Knob::Fixed(_) | Knob::Drawn(_) => {
            let dtype = options.dtypes.resolve(cx, &[])?;
            if !Bounds::fixed(options).admit(dtype) {
                return Err(GenerationError::Config(format!(
                    "dtype {dtype} holds no value inside min_value/max_value"
                )));
            }
            return Ok(dtype);
        }
        Knob::Auto => DType::all(),
        Knob::OneOf(dtypes) => dtypes.clone(),
    };
    let pool = admissible_dtypes(options, pool);
    cx.source().choose(&pool).copied().ok_or_else(|| {
        GenerationError::Config("no dtype in the dtype set fits min_value/max_value".to_string())
    })
}

pub(crate) fn admissible_dtypes(options: &GenerateOptions, pool: Vec<DType>) -> Vec<DType> {
    let bounds = Bounds::fixed(options);
    pool.into_iter().filter(|dtype| bounds.admit(*dtype)).collect()
}

/// A numeric leaf of `length` entries.
pub fn numpy_value(
    cx: &mut DrawContext<'_>,
    options: &GenerateOptions,
    dtype: DType,
    length: usize,
) -> Result<Value> {
    let allow_nan = options.allow_nan.resolve_or(cx, false)?;
    let bounds = Bounds::resolve(cx, options)?;
    let excluded = || {
        GenerationError::Config(format!(
            "no {dtype} value lies within min_value/max_value"
        ))
    };
    let source = cx.source();
    let data = match dtype.family() {
        DTypeFamily::Bool => Scalars::Bool((0..length).map(|_| source.coin()).collect()),
        DTypeFamily::Signed => {
            let (low, high) = bounds.signed(dtype).ok_or_else(excluded)?;
            let specials = [low, high, 0];
            Scalars::Int(
                (0..length)
                    .map(|_| {
                        if source.boolean(SPECIAL_PROBABILITY) {
                            let pick = specials[source.size(0, 2)];
                            if (low..=high).contains(&pick) {
                                return pick;
                            }
                        }
                        source.integer(low, high)
                    })
                    .collect(),
            )
        }
        DTypeFamily::Unsigned => {
            let (low, high) = bounds.unsigned(dtype).ok_or_else(excluded)?;
            Scalars::UInt(
                (0..length)
                    .map(|_| {
                        if source.boolean(SPECIAL_PROBABILITY) {
                            if source.coin() { low } else { high }
                        } else {
                            source.unsigned(low, high)
                        }
                    })
                    .collect(),
            )
        }
        DTypeFamily::Float => {
            let range = bounds.float(dtype.is_single_precision()).ok_or_else(excluded)?;
            let draw = FloatDraw {
                range,
                single: dtype.is_single_precision(),
                allow_nan,
                open: bounds.is_open(),
            };
            Scalars::Float((0..length).map(|_| draw.draw(cx)).collect())
        }
        DTypeFamily::Complex => {
            let range = bounds.float(dtype.is_single_precision()).ok_or_else(excluded)?;
            let draw = FloatDraw {
                range,
                single: dtype.is_single_precision(),
                allow_nan,
                open: bounds.is_open(),
            };
            Scalars::Complex((0..length).map(|_| [draw.draw(cx), draw.draw(cx)]).collect())
        }
        DTypeFamily::Datetime | DTypeFamily::Timedelta => Scalars::Time(
            (0..length)
                .map(|_| {
                    if allow_nan && source.boolean(NAN_PROBABILITY) {
                        NAT
                    } else {
                        source.integer(-TIME_SPAN, TIME_SPAN)
                    }
                })
                .collect(),
        ),
    };
    Ok(Value::Numpy { dtype, data })
}

struct FloatDraw {
    range: (f64, f64),
    single: bool,
    allow_nan: bool,
    /// No bounds at all, so infinities are fair game.
    open: bool,
}

impl FloatDraw {
    fn draw(&self, cx: &mut DrawContext<'_>) -> f64 {
        let (low, high) = self.range;
        let source = cx.source();
        if self.allow_nan && source.boolean(NAN_PROBABILITY) {
            return f64::NAN;
        }
        if source.boolean(SPECIAL_PROBABILITY) {
            let mut specials = vec![low, high, 0.0, -0.0, 1.0, -1.0];
            if self.open {
                specials.extend([f64::INFINITY, f64::NEG_INFINITY]);
            }
            specials.retain(|value| value.is_infinite() || (low..=high).contains(value));
            if let Some(value) = source.choose(&specials) {
                return *value;
            }
        }
        let value = source.float(low, high);
        if self.single {
            // Round into f32 without leaving the range.
            let rounded = value as f32 as f64;
            if rounded < low || rounded > high {
                return low;
            }
            return rounded;
        }
        value
    }
}

/// Numeric leaf contents with a drawn dtype and a length in
/// `min_size..=max_size`.
#[derive(Debug, Clone)]
pub struct NumpyContents {
    opts: Opts,
}

pub fn numpy_contents(opts: &Opts) -> NumpyContents {
    NumpyContents { opts: opts.clone() }
}

impl Strategy for NumpyContents {
    type Value = Triple;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Triple> {
        let options = self.opts.options();
        let dtype = choose_dtype(cx, options)?;
        let length = cx.source().size(options.min_size, options.max_size);
        Ok(Triple::from_value(numpy_value(cx, options, dtype, length)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Param;
    use crate::record::Recorder;
    use crate::source::DrawSource;
    use nestgen_core::validity_error;

    #[test]
    fn integer_bounds_are_honoured() {
        let options = GenerateOptions {
            min_value: Param::Value(-3.5),
            max_value: Param::Value(7.2),
            ..GenerateOptions::default()
        };
        let mut source = DrawSource::new(5);
        let mut cx = DrawContext::new(&mut source, Recorder::new());
        let value = numpy_value(&mut cx, &options, DType::Int16, 200).unwrap();
        let Value::Numpy {
            data: Scalars::Int(values),
            ..
        } = value
        else {
            panic!("expected int storage");
        };
        assert!(values.iter().all(|v| (-3..=7).contains(v)));
    }

    #[test]
    fn drawn_dtype_outside_bounds_is_a_config_error() {
        let opts = Opts::default();
        let handle = opts.register(crate::strategy::just(DType::Int8));
        let options = GenerateOptions {
            dtypes: Knob::Drawn(handle),
            min_value: Param::Value(1_000.0),
            ..GenerateOptions::default()
        };
        let mut source = DrawSource::new(5);
        let mut cx = opts.context(&mut source);
        let err = choose_dtype(&mut cx, &options).unwrap_err();
        assert!(matches!(err, GenerationError::Config(_)));
    }

    #[test]
    fn negative_ceiling_excludes_unsigned() {
        let bounds = Bounds {
            min: None,
            max: Some(-1.0),
        };
        assert!(!bounds.admit(DType::UInt8));
        assert!(bounds.admit(DType::Int8));
        assert!(bounds.admit(DType::Bool));
    }

    #[test]
    fn float32_leaves_are_representable() {
        let options = GenerateOptions {
            min_value: Param::Value(0.1),
            max_value: Param::Value(0.3),
            ..GenerateOptions::default()
        };
        let mut source = DrawSource::new(2);
        let mut cx = DrawContext::new(&mut source, Recorder::new());
        let value = numpy_value(&mut cx, &options, DType::Complex64, 100).unwrap();
        assert!(validity_error(&value).is_none());
        let Value::Numpy {
            data: Scalars::Complex(values),
            ..
        } = value
        else {
            panic!("expected complex storage");
        };
        assert!(
            values
                .iter()
                .flatten()
                .all(|part| (0.1..=0.3).contains(part))
        );
    }

    #[test]
    fn nan_only_when_allowed() {
        let mut source = DrawSource::new(13);
        let mut cx = DrawContext::new(&mut source, Recorder::new());
        let options = GenerateOptions::default();
        let value = numpy_value(&mut cx, &options, DType::Float64, 500).unwrap();
        assert!(!value.any_nan_nat());

        let options = GenerateOptions {
            allow_nan: Param::Value(true),
            ..GenerateOptions::default()
        };
        let value = numpy_value(&mut cx, &options, DType::Datetime64(nestgen_core::TimeUnit::Second), 500)
            .unwrap();
        assert!(value.any_nan_nat());
    }

    #[test]
    fn dtype_pool_skips_excluded_dtypes() {
        let options = GenerateOptions {
            dtypes: Knob::OneOf(vec![DType::UInt8, DType::Int8]),
            max_value: Param::Value(-10.0),
            ..GenerateOptions::default()
        };
        let mut source = DrawSource::new(0);
        let mut cx = DrawContext::new(&mut source, Recorder::new());
        for _ in 0..20 {
            assert_eq!(choose_dtype(&mut cx, &options).unwrap(), DType::Int8);
        }
    }
}
