//! Sampling a compiled expression over a range of `x`.
//!
//! The number of evaluated points is chosen adaptively:
//!
//! ```text
//! actual = min(max(requested, ceil((max_x - min_x) * samples_per_unit)), max_points)
//! ```
//!
//! with 20 samples per unit and a cap of 2000 by default. The expression is then
//! evaluated at `x_i = min_x + i * step` for `i` in `0..=actual`, where
//! `step = (max_x - min_x) / actual`, and only finite results become points.
//!
//! # Example
//!
//! ```
//! use graph_eval::{compile, sample};
//!
//! let expr = compile("sqrt(x)").unwrap();
//! let result = sample(&expr, -1.0, 1.0, 2);
//! assert!(result.succeeded);
//! assert!(result.points.iter().all(|p| p.x >= 0.0));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::expression::{compile, Expression};

/// A single plottable sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Outcome of one sampling run.
///
/// On failure `points` is empty and `error_message` explains why. A run in which
/// every sample was non-finite still succeeds with no points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleResult {
    pub points: Vec<Point>,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

impl SampleResult {
    fn success(points: Vec<Point>) -> Self {
        Self {
            points,
            succeeded: true,
            error_message: None,
        }
    }

    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            points: Vec::new(),
            succeeded: false,
            error_message: Some(message.into()),
        }
    }
}

/// Everything needed for one sampling run, starting from source text.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRequest {
    pub expression: String,
    pub min_x: f64,
    pub max_x: f64,
    pub requested_points: usize,
}

/// Tuning for the adaptive density rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    /// Minimum number of samples per unit of `x` range
    pub samples_per_unit: f64,
    /// Upper bound on evaluated points, applied last; 0 acts as 1
    pub max_points: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            samples_per_unit: 20.0,
            max_points: 2000,
        }
    }
}

/// Message carried by a run that observed its cancellation flag.
pub const CANCELLED: &str = "sampling was cancelled";

/// Evaluates compiled expressions over a range.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sampler {
    config: SamplerConfig,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Number of intervals the range is split into.
    ///
    /// `requested` below one is treated as one. For an empty or inverted range the
    /// density term contributes nothing and `requested` is used as is, still capped.
    /// A NaN or non-positive `samples_per_unit` also disables the density term. The
    /// result is never zero.
    pub fn actual_points(&self, min_x: f64, max_x: f64, requested: usize) -> usize {
        let density = (max_x - min_x) * self.config.samples_per_unit;
        // `as` saturates, so a huge range simply hits the cap
        let density = if density > 0.0 {
            density.ceil() as usize
        } else {
            0
        };
        requested.max(1).max(density).min(self.cap())
    }

    fn cap(&self) -> usize {
        self.config.max_points.max(1)
    }

    /// Samples `expr` sequentially.
    pub fn sample(
        &self,
        expr: &Expression,
        min_x: f64,
        max_x: f64,
        requested: usize,
    ) -> SampleResult {
        let Some(grid) = self.grid(min_x, max_x, requested) else {
            return invalid_range(min_x, max_x);
        };

        let mut stack = Vec::with_capacity(expr.program().max_stack());
        let points = (0..=grid.intervals)
            .filter_map(|i| grid.point(expr, i, &mut stack))
            .collect();

        finish(grid, points)
    }

    /// Samples `expr` on the rayon thread pool.
    ///
    /// Produces exactly the same points, in the same order, as [`Sampler::sample`].
    pub fn sample_par(
        &self,
        expr: &Expression,
        min_x: f64,
        max_x: f64,
        requested: usize,
    ) -> SampleResult {
        let Some(grid) = self.grid(min_x, max_x, requested) else {
            return invalid_range(min_x, max_x);
        };

        let samples: Vec<Option<Point>> = (0..=grid.intervals)
            .into_par_iter()
            .map_init(
                || Vec::with_capacity(expr.program().max_stack()),
                |stack, i| grid.point(expr, i, stack),
            )
            .collect();

        finish(grid, samples.into_iter().flatten().collect())
    }

    /// Samples `expr` sequentially, checking `cancel` before every evaluation.
    ///
    /// Once the flag is observed set, the run stops and fails with [`CANCELLED`];
    /// points computed so far are discarded.
    pub fn sample_cancellable(
        &self,
        expr: &Expression,
        min_x: f64,
        max_x: f64,
        requested: usize,
        cancel: &AtomicBool,
    ) -> SampleResult {
        self.sample_until(expr, min_x, max_x, requested, |_| {
            cancel.load(Ordering::Relaxed)
        })
    }

    /// Sequential sampling that asks `stop` before evaluating sample `i`.
    fn sample_until(
        &self,
        expr: &Expression,
        min_x: f64,
        max_x: f64,
        requested: usize,
        mut stop: impl FnMut(usize) -> bool,
    ) -> SampleResult {
        let Some(grid) = self.grid(min_x, max_x, requested) else {
            return invalid_range(min_x, max_x);
        };

        let mut stack = Vec::with_capacity(expr.program().max_stack());
        let mut points = Vec::new();
        for i in 0..=grid.intervals {
            if stop(i) {
                log::info!(
                    "'{}' cancelled after {} of {} samples",
                    expr,
                    i,
                    grid.intervals.saturating_add(1)
                );
                return SampleResult::failure(CANCELLED);
            }
            points.extend(grid.point(expr, i, &mut stack));
        }

        finish(grid, points)
    }

    /// Compiles and samples a request; a compile error fails the whole run.
    pub fn sample_request(&self, request: &SampleRequest) -> SampleResult {
        match compile(&request.expression) {
            Ok(expr) => self.sample(
                &expr,
                request.min_x,
                request.max_x,
                request.requested_points,
            ),
            Err(e) => SampleResult::failure(e.to_string()),
        }
    }

    fn grid(&self, min_x: f64, max_x: f64, requested: usize) -> Option<Grid> {
        // catches NaN and infinite bounds, and finite ones whose width overflows
        // such as [-1e308, 1e308]
        if !(max_x - min_x).is_finite() {
            return None;
        }

        let intervals = self.actual_points(min_x, max_x, requested);
        if intervals == self.cap() && requested.max(1) != intervals {
            log::warn!(
                "sampling [{}, {}] clamped to {} points (requested {})",
                min_x,
                max_x,
                intervals,
                requested
            );
        }

        Some(Grid {
            min_x,
            step: (max_x - min_x) / intervals as f64,
            intervals,
        })
    }
}

/// Evenly spaced sample positions.
#[derive(Debug, Clone, Copy)]
struct Grid {
    min_x: f64,
    step: f64,
    intervals: usize,
}

impl Grid {
    #[inline]
    fn point(&self, expr: &Expression, i: usize, stack: &mut Vec<f64>) -> Option<Point> {
        let x = self.min_x + i as f64 * self.step;
        let y = expr.eval_with_stack(x, stack);
        y.is_finite().then_some(Point { x, y })
    }
}

fn finish(grid: Grid, points: Vec<Point>) -> SampleResult {
    let evaluated = grid.intervals.saturating_add(1);
    log::debug!(
        "evaluated {} samples, kept {}, dropped {} non-finite",
        evaluated,
        points.len(),
        evaluated - points.len()
    );
    SampleResult::success(points)
}

fn invalid_range(min_x: f64, max_x: f64) -> SampleResult {
    SampleResult::failure(format!(
        "Invalid range: minX = {}, maxX = {}",
        min_x, max_x
    ))
}

/// Samples `expr` with the default configuration.
pub fn sample(expr: &Expression, min_x: f64, max_x: f64, requested_points: usize) -> SampleResult {
    Sampler::default().sample(expr, min_x, max_x, requested_points)
}

/// Compiles `source` and samples it with the default configuration.
///
/// A compile error short-circuits: the result fails with the error's message.
pub fn sample_source(
    source: &str,
    min_x: f64,
    max_x: f64,
    requested_points: usize,
) -> SampleResult {
    Sampler::default().sample_request(&SampleRequest {
        expression: source.to_string(),
        min_x,
        max_x,
        requested_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn expr(source: &str) -> Expression {
        compile(source).unwrap()
    }

    #[test]
    fn test_actual_points_density() {
        let sampler = Sampler::default();
        assert_eq!(sampler.actual_points(0.0, 10.0, 10), 200);
        assert_eq!(sampler.actual_points(0.0, 10.0, 500), 500);
        assert_eq!(sampler.actual_points(-10.0, 10.0, 100), 400);
        assert_eq!(sampler.actual_points(0.0, 0.05, 1), 1);
        assert_eq!(sampler.actual_points(0.0, 0.11, 1), 3);
    }

    #[test]
    fn test_actual_points_clamped() {
        let sampler = Sampler::default();
        assert_eq!(sampler.actual_points(0.0, 100.0, 10), 2000);
        assert_eq!(sampler.actual_points(0.0, 1000.0, 10), 2000);
        assert_eq!(sampler.actual_points(0.0, 1.0, 5000), 2000);
        assert_eq!(sampler.actual_points(-1e308, 1e308, 10), 2000);
    }

    #[test]
    fn test_actual_points_degenerate_range() {
        let sampler = Sampler::default();
        assert_eq!(sampler.actual_points(3.0, 3.0, 7), 7);
        assert_eq!(sampler.actual_points(5.0, -5.0, 7), 7);
        assert_eq!(sampler.actual_points(3.0, 3.0, 0), 1);
    }

    #[test]
    fn test_raw_sample_count() {
        let result = sample(&expr("x"), 0.0, 10.0, 10);
        assert!(result.succeeded);
        assert_eq!(result.points.len(), 201);
        assert_eq!(result.points[0], Point { x: 0.0, y: 0.0 });
        assert_abs_diff_eq!(result.points[200].x, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_clamped_sample_count() {
        let result = sample(&expr("x"), 0.0, 100.0, 10);
        assert_eq!(result.points.len(), 2001);
    }

    #[test]
    fn test_filters_non_finite() {
        let result = sample(&expr("sqrt(x)"), -1.0, 1.0, 2);
        assert!(result.succeeded);
        assert!(result.points.iter().all(|p| p.x != -1.0));
        assert!(result.points.iter().all(|p| p.y.is_finite()));
        // x < 0 gives NaN, x = 0 survives
        assert_eq!(result.points.len(), 21);
        assert_eq!(result.points[0].x, 0.0);

        let result = sample(&expr("1/x"), -1.0, 1.0, 2);
        assert!(result.points.iter().all(|p| p.x != 0.0));
        assert_eq!(result.points.len(), 40);
    }

    #[test]
    fn test_ascending_order() {
        let result = sample(&expr("sin(x)"), -3.0, 4.0, 10);
        assert!(result
            .points
            .windows(2)
            .all(|pair| pair[0].x < pair[1].x));
    }

    #[test]
    fn test_all_filtered_is_still_success() {
        let result = sample(&expr("log(-1 - x^2)"), -5.0, 5.0, 10);
        assert!(result.succeeded);
        assert!(result.points.is_empty());
        assert_eq!(result.error_message, None);
    }

    #[test]
    fn test_zero_width_range() {
        let result = sample(&expr("x + 1"), 2.0, 2.0, 3);
        assert!(result.succeeded);
        assert_eq!(result.points.len(), 4);
        assert!(result.points.iter().all(|p| *p == Point { x: 2.0, y: 3.0 }));
    }

    #[test]
    fn test_non_finite_range_fails() {
        let result = sample(&expr("x"), f64::NAN, 1.0, 10);
        assert!(!result.succeeded);
        assert!(result.points.is_empty());

        let result = sample(&expr("x"), 0.0, f64::INFINITY, 10);
        assert!(!result.succeeded);
    }

    #[test]
    fn test_overflowing_span_fails() {
        let result = sample(&expr("1"), -1e308, 1e308, 10);
        assert!(!result.succeeded);
        assert!(result.points.is_empty());
        assert!(result
            .error_message
            .as_deref()
            .is_some_and(|m| m.starts_with("Invalid range")));
        assert!(!Sampler::default().sample_par(&expr("1"), -1e308, 1e308, 10).succeeded);

        // the widest span that still fits in f64 is sampled normally
        let result = sample(&expr("1"), -8e307, 8e307, 10);
        assert!(result.succeeded);
        assert_eq!(result.points.len(), 2001);
        assert!(result.points.iter().all(|p| p.x.is_finite()));
        assert!(result.points.windows(2).all(|pair| pair[0].x < pair[1].x));
    }

    #[test]
    fn test_parse_error_short_circuits() {
        let result = sample_source("2 * y", -10.0, 10.0, 100);
        assert!(!result.succeeded);
        assert!(result.points.is_empty());
        assert_eq!(
            result.error_message.as_deref(),
            Some("Unknown identifier 'y' at column 5")
        );

        let result = sample_source("", -10.0, 10.0, 100);
        assert_eq!(result.error_message.as_deref(), Some("Expression is empty"));
    }

    #[test]
    fn test_sample_source_success() {
        let result = sample_source("x^2", -1.0, 1.0, 4);
        assert!(result.succeeded);
        assert_eq!(result.points.len(), 41);
        assert_eq!(result.points[0], Point { x: -1.0, y: 1.0 });
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sampler = Sampler::default();
        let e = expr("tan(x) * exp(-abs(x)) + sqrt(x)");
        let seq = sampler.sample(&e, -20.0, 30.0, 10);
        let par = sampler.sample_par(&e, -20.0, 30.0, 10);
        assert_eq!(seq, par);
        assert!(!seq.points.is_empty());
    }

    #[test]
    fn test_cancellation() {
        let sampler = Sampler::default();
        let e = expr("x");

        let cancel = AtomicBool::new(true);
        let result = sampler.sample_cancellable(&e, 0.0, 10.0, 10, &cancel);
        assert!(!result.succeeded);
        assert_eq!(result.error_message.as_deref(), Some(CANCELLED));
        assert!(result.points.is_empty());

        let cancel = AtomicBool::new(false);
        let result = sampler.sample_cancellable(&e, 0.0, 10.0, 10, &cancel);
        assert_eq!(result, sampler.sample(&e, 0.0, 10.0, 10));
    }

    #[test]
    fn test_cancel_raised_mid_run() {
        let sampler = Sampler::default();
        let e = expr("x^2");
        let cancel = AtomicBool::new(false);
        let mut checked = 0;

        let result = sampler.sample_until(&e, 0.0, 10.0, 10, |i| {
            checked += 1;
            if i == 50 {
                cancel.store(true, Ordering::Relaxed);
            }
            cancel.load(Ordering::Relaxed)
        });

        assert!(!result.succeeded);
        assert_eq!(result.error_message.as_deref(), Some(CANCELLED));
        assert!(result.points.is_empty());
        // stopped at the 51st check, not after the full 201
        assert_eq!(checked, 51);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let sampler = Sampler::new(SamplerConfig {
            samples_per_unit: 20.0,
            max_points: 1 << 40,
        });
        let e = expr("sin(x) * exp(-abs(x))");
        let cancel = AtomicBool::new(false);

        let result = std::thread::scope(|scope| {
            let run = scope.spawn(|| sampler.sample_cancellable(&e, 0.0, 1e9, 1, &cancel));
            std::thread::sleep(std::time::Duration::from_millis(20));
            cancel.store(true, Ordering::Relaxed);
            run.join().unwrap()
        });

        assert!(!result.succeeded);
        assert_eq!(result.error_message.as_deref(), Some(CANCELLED));
        assert!(result.points.is_empty());
    }

    #[test]
    fn test_degenerate_config() {
        let sampler = Sampler::new(SamplerConfig {
            samples_per_unit: 20.0,
            max_points: 0,
        });
        assert_eq!(sampler.actual_points(0.0, 10.0, 10), 1);
        let result = sampler.sample(&expr("x"), 0.0, 10.0, 10);
        assert_eq!(
            result.points,
            vec![Point { x: 0.0, y: 0.0 }, Point { x: 10.0, y: 10.0 }]
        );

        for samples_per_unit in [f64::NAN, -5.0, 0.0] {
            let sampler = Sampler::new(SamplerConfig {
                samples_per_unit,
                max_points: 2000,
            });
            assert_eq!(sampler.actual_points(0.0, 10.0, 7), 7);
            assert!(sampler
                .sample(&expr("x"), 0.0, 10.0, 7)
                .points
                .iter()
                .all(|p| p.x.is_finite()));
        }
    }

    #[test]
    fn test_custom_config() {
        let sampler = Sampler::new(SamplerConfig {
            samples_per_unit: 1.0,
            max_points: 50,
        });
        assert_eq!(sampler.actual_points(0.0, 10.0, 2), 10);
        assert_eq!(sampler.actual_points(0.0, 100.0, 2), 50);
        assert_eq!(sampler.sample(&expr("x"), 0.0, 10.0, 2).points.len(), 11);
    }
}
