//! Recursion budgets and shared element budgets.

use crate::errors::Result;
use crate::strategy::DrawContext;

/// Ephemeral depth and composite-node counter for one recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub depth: usize,
    pub nodes: usize,
}

impl Budget {
    pub fn new(depth: usize, nodes: usize) -> Self {
        Self { depth, nodes }
    }

    /// Weight of each composite variant in a free choice. Non-increasing as
    /// either counter shrinks, zero once either is exhausted.
    pub fn composite_weight(&self) -> u32 {
        self.depth.min(self.nodes).min(3) as u32
    }
}

/// Anything whose drawn size counts against a [`CountdownDrawer`].
pub trait HasLength {
    fn length(&self) -> usize;
}

impl HasLength for nestgen_core::Value {
    fn length(&self) -> usize {
        self.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownLimits {
    pub min_size_each: usize,
    /// `None` leaves only the total budget as a cap.
    pub max_size_each: Option<usize>,
    pub min_size_total: usize,
    pub max_size_total: usize,
    /// Maximum number of successful draws.
    pub max_draws: usize,
}

impl Default for CountdownLimits {
    fn default() -> Self {
        Self {
            min_size_each: 0,
            max_size_each: None,
            min_size_total: 0,
            max_size_total: 10,
            max_draws: 100,
        }
    }
}

/// Element budget shared by successive sized draws.
///
/// The effective total is drawn once, between the smallest total that can
/// satisfy `min_size_total` and `max_size_total`. Each draw is sized so the
/// running total stays within it while still reaching the minimum.
#[derive(Debug, Clone)]
pub struct CountdownDrawer {
    limits: CountdownLimits,
    total: usize,
    used: usize,
    draws: usize,
}

impl CountdownDrawer {
    pub fn new(cx: &mut DrawContext<'_>, limits: CountdownLimits) -> Self {
        let floor = if limits.min_size_total == 0 {
            0
        } else {
            match limits.max_size_each {
                Some(each) if each > 0 => {
                    let needed = limits.min_size_total.div_ceil(each);
                    limits.min_size_total.max(needed * limits.min_size_each)
                }
                _ => limits.min_size_total.max(limits.min_size_each),
            }
        };
        let total = cx.source().size(floor, limits.max_size_total.max(floor));
        Self {
            limits,
            total,
            used: 0,
            draws: 0,
        }
    }

    /// Elements still available.
    pub fn remaining(&self) -> usize {
        self.total - self.used
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Draw one item through `draw(cx, min, max)`. `None` once the budget
    /// is spent, too small for `min_size_each`, or the draw limit is hit.
    pub fn draw_next<T, F>(&mut self, cx: &mut DrawContext<'_>, draw: F) -> Result<Option<T>>
    where
        T: HasLength,
        F: FnOnce(&mut DrawContext<'_>, usize, usize) -> Result<T>,
    {
        let limits = self.limits;
        let remaining = self.remaining();
        if self.draws >= limits.max_draws || remaining == 0 || remaining < limits.min_size_each {
            return Ok(None);
        }
        let mut max_size = limits
            .max_size_each
            .map_or(remaining, |each| each.min(remaining));

        let deficit = limits.min_size_total.saturating_sub(self.used);
        let remaining_draws = limits.max_draws - self.draws;
        let mut min_size = limits.min_size_each.max(deficit.div_ceil(remaining_draws));

        if deficit > 0 {
            if deficit <= max_size {
                min_size = min_size.max(deficit);
            } else if limits.min_size_each > 0 && max_size > 0 {
                let reserve = limits.min_size_each * (deficit.div_ceil(max_size) - 1);
                if let Some(cap) = remaining.checked_sub(reserve)
                    && cap >= min_size
                {
                    max_size = max_size.min(cap);
                }
            }
        }
        let min_size = min_size.min(max_size);

        let item = draw(cx, min_size, max_size)?;
        self.used += item.length();
        self.draws += 1;
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Recorder;
    use crate::source::DrawSource;

    impl HasLength for Vec<u8> {
        fn length(&self) -> usize {
            self.len()
        }
    }

    fn sized(cx: &mut DrawContext<'_>, min: usize, max: usize) -> Result<Vec<u8>> {
        let n = cx.source().size(min, max);
        Ok(vec![0; n])
    }

    #[test]
    fn total_never_exceeds_budget() {
        for seed in 0..50 {
            let mut source = DrawSource::new(seed);
            let mut cx = DrawContext::new(&mut source, Recorder::new());
            let mut drawer = CountdownDrawer::new(
                &mut cx,
                CountdownLimits {
                    max_size_total: 12,
                    ..CountdownLimits::default()
                },
            );
            let mut total = 0;
            while let Some(item) = drawer.draw_next(&mut cx, sized).unwrap() {
                total += item.len();
            }
            assert!(total <= 12);
            assert_eq!(total, drawer.used());
        }
    }

    #[test]
    fn minimum_total_is_reached() {
        for seed in 0..50 {
            let mut source = DrawSource::new(seed);
            let mut cx = DrawContext::new(&mut source, Recorder::new());
            let mut drawer = CountdownDrawer::new(
                &mut cx,
                CountdownLimits {
                    min_size_each: 1,
                    max_size_each: Some(3),
                    min_size_total: 7,
                    max_size_total: 9,
                    max_draws: 4,
                },
            );
            let mut sizes = Vec::new();
            while let Some(item) = drawer.draw_next(&mut cx, sized).unwrap() {
                assert!((1..=3).contains(&item.len()));
                sizes.push(item.len());
            }
            let total: usize = sizes.iter().sum();
            assert!(sizes.len() <= 4);
            assert!((7..=9).contains(&total), "seed {seed}: {sizes:?}");
        }
    }

    #[test]
    fn exhausted_budget_returns_none() {
        let mut source = DrawSource::new(0);
        let mut cx = DrawContext::new(&mut source, Recorder::new());
        let mut drawer = CountdownDrawer::new(
            &mut cx,
            CountdownLimits {
                max_size_total: 0,
                ..CountdownLimits::default()
            },
        );
        assert!(drawer.draw_next(&mut cx, sized).unwrap().is_none());
    }

    #[test]
    fn composite_weight_reaches_zero() {
        assert_eq!(Budget::new(5, 32).composite_weight(), 3);
        assert_eq!(Budget::new(2, 32).composite_weight(), 2);
        assert_eq!(Budget::new(4, 1).composite_weight(), 1);
        assert_eq!(Budget::new(0, 32).composite_weight(), 0);
        assert_eq!(Budget::new(3, 0).composite_weight(), 0);
    }
}
