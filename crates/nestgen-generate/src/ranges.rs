//! Strategy for `(start, end)` pairs with optional ends.

use crate::errors::{GenerationError, Result};
use crate::strategy::{DrawContext, Strategy};

/// Span used for a side of the range left unbounded.
const OPEN_SPAN: i64 = 1_000;

/// `(start, end)` integer pairs. `None` on either side means open, and any
/// bound that is `None` is unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranges {
    pub min_start: Option<i64>,
    pub max_start: Option<i64>,
    pub min_end: Option<i64>,
    pub max_end: Option<i64>,
    pub allow_start_none: bool,
    pub allow_end_none: bool,
    /// Force `end = None` whenever `start` is `None`.
    pub let_end_none_if_start_none: bool,
    pub allow_equal: bool,
}

impl Default for Ranges {
    fn default() -> Self {
        Self {
            min_start: None,
            max_start: None,
            min_end: None,
            max_end: None,
            allow_start_none: true,
            allow_end_none: true,
            let_end_none_if_start_none: false,
            allow_equal: true,
        }
    }
}

pub fn ranges() -> Ranges {
    Ranges::default()
}

impl Ranges {
    fn gap(&self) -> i64 {
        if self.allow_equal { 0 } else { 1 }
    }

    fn start_bounds(&self) -> (i64, i64) {
        let anchor = self
            .max_start
            .or(self.min_end)
            .or(self.max_end)
            .unwrap_or(0);
        let low = self
            .min_start
            .unwrap_or_else(|| anchor.saturating_sub(OPEN_SPAN));
        let high = self
            .max_start
            .unwrap_or_else(|| low.saturating_add(2 * OPEN_SPAN));
        (low, high)
    }

    fn end_bounds(&self, start: Option<i64>) -> (i64, i64) {
        let after_start = start.map(|start| start.saturating_add(self.gap()));
        let low = match (self.min_end, after_start) {
            (Some(min), Some(after)) => min.max(after),
            (Some(bound), None) | (None, Some(bound)) => bound,
            (None, None) => self.max_end.unwrap_or(0).saturating_sub(OPEN_SPAN),
        };
        let high = self
            .max_end
            .unwrap_or_else(|| low.saturating_add(OPEN_SPAN));
        (low, high)
    }

    fn draw_start(&self, cx: &mut DrawContext<'_>) -> Result<Option<i64>> {
        if self.allow_start_none && cx.source().boolean(0.25) {
            return Ok(None);
        }
        let (low, high) = self.start_bounds();
        let capped = match self.max_end {
            Some(max_end) if !self.allow_end_none => high.min(max_end.saturating_sub(self.gap())),
            _ => high,
        };
        if low <= capped {
            return Ok(Some(cx.source().integer(low, capped)));
        }
        if self.allow_start_none {
            return Ok(None);
        }
        Err(GenerationError::Config(format!(
            "ranges: no start in [{low}, {capped}] leaves room for an end"
        )))
    }
}

impl Strategy for Ranges {
    type Value = (Option<i64>, Option<i64>);

    fn draw(&self, cx: &mut DrawContext<'_>) -> Result<Self::Value> {
        let start = self.draw_start(cx)?;
        if start.is_none() && self.let_end_none_if_start_none {
            return Ok((None, None));
        }
        let (low, high) = self.end_bounds(start);
        if self.allow_end_none && (low > high || cx.source().boolean(0.25)) {
            return Ok((start, None));
        }
        if low > high {
            return Err(GenerationError::Config(format!(
                "ranges: end bounds [{low}, {high}] are empty"
            )));
        }
        Ok((start, Some(cx.source().integer(low, high))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Recorder;
    use crate::source::DrawSource;

    fn draw_many(strategy: Ranges, seed: u64) -> Vec<(Option<i64>, Option<i64>)> {
        let mut source = DrawSource::new(seed);
        let mut cx = DrawContext::new(&mut source, Recorder::new());
        (0..200).map(|_| strategy.draw(&mut cx).unwrap()).collect()
    }

    #[test]
    fn bounds_and_order_hold() {
        let strategy = Ranges {
            min_start: Some(-5),
            max_start: Some(20),
            min_end: Some(0),
            max_end: Some(10),
            allow_end_none: false,
            allow_equal: false,
            ..Ranges::default()
        };
        for (start, end) in draw_many(strategy, 3) {
            let end = end.unwrap();
            assert!((0..=10).contains(&end));
            if let Some(start) = start {
                assert!((-5..=20).contains(&start));
                assert!(start < end);
            }
        }
    }

    #[test]
    fn end_follows_missing_start() {
        let strategy = Ranges {
            let_end_none_if_start_none: true,
            ..Ranges::default()
        };
        let pairs = draw_many(strategy, 8);
        assert!(pairs.iter().any(|(start, _)| start.is_none()));
        for (start, end) in pairs {
            if start.is_none() {
                assert!(end.is_none());
            }
        }
    }

    #[test]
    fn both_sides_required() {
        let strategy = Ranges {
            allow_start_none: false,
            allow_end_none: false,
            ..Ranges::default()
        };
        for (start, end) in draw_many(strategy, 21) {
            assert!(start.unwrap() <= end.unwrap());
        }
    }

    #[test]
    fn infeasible_bounds_are_a_config_error() {
        let strategy = Ranges {
            min_start: Some(5),
            max_start: Some(5),
            min_end: Some(5),
            max_end: Some(5),
            allow_start_none: false,
            allow_end_none: false,
            allow_equal: false,
            ..Ranges::default()
        };
        let mut source = DrawSource::new(0);
        let mut cx = DrawContext::new(&mut source, Recorder::new());
        assert!(matches!(
            strategy.draw(&mut cx),
            Err(GenerationError::Config(_))
        ));
    }
}
