//! Draw strategies and the context they draw through.

use std::fmt::Debug;
use std::rc::Rc;

use tracing::trace;

use crate::errors::{GenerationError, Result};
use crate::record::{Handle, Recorder};
use crate::source::DrawSource;

/// A generator of values of one type.
pub trait Strategy {
    type Value;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Self::Value>;

    /// Apply `f` to every drawn value.
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: Fn(Self::Value) -> U,
    {
        Map { inner: self, f }
    }
}

impl<S: Strategy + ?Sized> Strategy for Rc<S> {
    type Value = S::Value;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Self::Value> {
        self.as_ref().draw(cx)
    }
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    type Value = S::Value;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Self::Value> {
        self.as_ref().draw(cx)
    }
}

/// Session-scoped draw state: the draw source plus the recorder that
/// resolves handles.
pub struct DrawContext<'a> {
    source: &'a mut DrawSource,
    recorder: Recorder,
}

impl<'a> DrawContext<'a> {
    pub fn new(source: &'a mut DrawSource, recorder: Recorder) -> Self {
        Self { source, recorder }
    }

    pub fn source(&mut self) -> &mut DrawSource {
        self.source
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn draw<S: Strategy + ?Sized>(&mut self, strategy: &S) -> Result<S::Value> {
        strategy.draw(self)
    }

    /// Draw through a registered handle and log the result.
    pub fn resolve<T: Clone + Debug + 'static>(&mut self, handle: &Handle<T>) -> Result<T> {
        let strategy = self.recorder.strategy(handle)?;
        let value = strategy.draw(self)?;
        self.recorder.log(handle, &value);
        trace!(handle = handle.index(), "handle drawn");
        Ok(value)
    }
}

/// Always the same value.
#[derive(Debug, Clone)]
pub struct Just<T>(T);

pub fn just<T: Clone>(value: T) -> Just<T> {
    Just(value)
}

impl<T: Clone> Strategy for Just<T> {
    type Value = T;

    fn draw(&self, _cx: &mut DrawContext<'_>) -> Result<T> {
        Ok(self.0.clone())
    }
}

/// Integers in an inclusive range.
#[derive(Debug, Clone, Copy)]
pub struct Integers {
    min: i64,
    max: i64,
}

pub fn integers(min: i64, max: i64) -> Integers {
    Integers { min, max }
}

impl Strategy for Integers {
    type Value = i64;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<i64> {
        if self.min > self.max {
            return Err(GenerationError::Config(format!(
                "integers: min {} exceeds max {}",
                self.min, self.max
            )));
        }
        Ok(cx.source().integer(self.min, self.max))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Booleans;

pub fn booleans() -> Booleans {
    Booleans
}

impl Strategy for Booleans {
    type Value = bool;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<bool> {
        Ok(cx.source().coin())
    }
}

/// Uniform choice from a fixed list.
#[derive(Debug, Clone)]
pub struct SampledFrom<T> {
    values: Vec<T>,
}

pub fn sampled_from<T: Clone>(values: impl IntoIterator<Item = T>) -> SampledFrom<T> {
    SampledFrom {
        values: values.into_iter().collect(),
    }
}

impl<T: Clone> Strategy for SampledFrom<T> {
    type Value = T;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<T> {
        cx.source()
            .choose(&self.values)
            .cloned()
            .ok_or_else(|| GenerationError::Config("sampled_from: no values".to_string()))
    }
}

/// Strategy from a closure over the draw context.
pub struct FromFn<F>(F);

pub fn from_fn<T, F>(f: F) -> FromFn<F>
where
    F: Fn(&mut DrawContext<'_>) -> Result<T>,
{
    FromFn(f)
}

impl<T, F> Strategy for FromFn<F>
where
    F: Fn(&mut DrawContext<'_>) -> Result<T>,
{
    type Value = T;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<T> {
        (self.0)(cx)
    }
}

pub struct Map<S, F> {
    inner: S,
    f: F,
}

impl<S, F, U> Strategy for Map<S, F>
where
    S: Strategy,
    F: Fn(S::Value) -> U,
{
    type Value = U;

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<U> {
        self.inner.draw(cx).map(&self.f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(source: &mut DrawSource) -> DrawContext<'_> {
        DrawContext::new(source, Recorder::new())
    }

    #[test]
    fn map_applies_to_every_draw() {
        let mut source = DrawSource::new(9);
        let mut cx = context(&mut source);
        let evens = integers(0, 50).map(|n| n * 2);
        for _ in 0..50 {
            assert_eq!(evens.draw(&mut cx).unwrap() % 2, 0);
        }
    }

    #[test]
    fn inverted_integers_are_a_config_error() {
        let mut source = DrawSource::new(1);
        let mut cx = context(&mut source);
        assert!(matches!(
            integers(3, 1).draw(&mut cx),
            Err(GenerationError::Config(_))
        ));
    }

    #[test]
    fn sampled_from_stays_in_the_list() {
        let mut source = DrawSource::new(4);
        let mut cx = context(&mut source);
        let letters = sampled_from(['a', 'b', 'c']);
        for _ in 0..30 {
            assert!(['a', 'b', 'c'].contains(&letters.draw(&mut cx).unwrap()));
        }
        let empty = sampled_from(Vec::<char>::new());
        assert!(empty.draw(&mut cx).is_err());
    }
}
