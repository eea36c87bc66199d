//! Raw estimates → integer pod counts.
//!
//! - frontend: `max(1, ceil(raw))`
//! - backend: `max(1, ceil(raw + perturbation))`, with the perturbation drawn
//!   per row from `{0: 0.5, -1: 0.2, +1: 0.2, +2: 0.1}`
//!
//! The backend draw is a deliberate safety margin, so repeated runs on the same
//! input differ. The draw sits behind [`PerturbationSource`] so callers can seed
//! it (reproducible batch runs) or pin it (tests).

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Origin, PodForecast, Timeline};
use crate::error::{AppError, EXIT_MODEL};
use crate::models::RawPredictions;

/// Backend perturbation support and weights.
pub const BACKEND_PERTURBATIONS: [i32; 4] = [0, -1, 1, 2];
pub const BACKEND_PERTURBATION_WEIGHTS: [f64; 4] = [0.5, 0.2, 0.2, 0.1];

pub trait PerturbationSource {
    /// Next backend perturbation, one of [`BACKEND_PERTURBATIONS`].
    fn draw(&mut self) -> i32;
}

/// Weighted draw over [`BACKEND_PERTURBATIONS`].
pub struct RandomPerturbation<R: Rng> {
    rng: R,
    dist: WeightedIndex<f64>,
}

impl<R: Rng> RandomPerturbation<R> {
    pub fn new(rng: R) -> Result<Self, AppError> {
        let dist = WeightedIndex::new(BACKEND_PERTURBATION_WEIGHTS)
            .map_err(|e| AppError::new(EXIT_MODEL, format!("Perturbation distribution error: {e}")))?;
        Ok(Self { rng, dist })
    }
}

impl RandomPerturbation<StdRng> {
    /// Seeded when `seed` is given, otherwise from OS entropy.
    pub fn from_seed(seed: Option<u64>) -> Result<Self, AppError> {
        match seed {
            Some(seed) => Self::new(StdRng::seed_from_u64(seed)),
            None => Self::new(StdRng::from_entropy()),
        }
    }
}

impl<R: Rng> PerturbationSource for RandomPerturbation<R> {
    fn draw(&mut self) -> i32 {
        BACKEND_PERTURBATIONS[self.dist.sample(&mut self.rng)]
    }
}

pub fn frontend_pods(raw: f64) -> u32 {
    ceil_pods(raw)
}

pub fn backend_pods(raw: f64, perturbation: i32) -> u32 {
    ceil_pods(raw + f64::from(perturbation))
}

fn ceil_pods(value: f64) -> u32 {
    let c = value.ceil();
    if c < 1.0 {
        1
    } else {
        c.min(u32::MAX as f64) as u32
    }
}

/// Turn raw predictions for every timeline row into budget-day forecasts.
///
/// Only budget rows are kept; the output is sorted by date. Perturbations are
/// drawn for budget rows only, in timeline order.
pub fn finalize_forecast(
    timeline: &Timeline,
    raw: &RawPredictions,
    source: &mut dyn PerturbationSource,
) -> Result<Vec<PodForecast>, AppError> {
    if raw.frontend.len() != timeline.len() || raw.backend.len() != timeline.len() {
        return Err(AppError::new(
            EXIT_MODEL,
            format!(
                "Prediction count mismatch: {} timeline rows, {} frontend, {} backend.",
                timeline.len(),
                raw.frontend.len(),
                raw.backend.len()
            ),
        ));
    }

    let mut out: Vec<PodForecast> = timeline
        .rows
        .iter()
        .zip(raw.frontend.iter().zip(&raw.backend))
        .filter(|(r, _)| r.origin == Origin::Budget)
        .map(|(r, (&fe, &be))| PodForecast {
            date: r.row.date,
            gmv: r.row.gmv,
            users: r.row.users,
            marketing_cost: r.row.marketing_cost,
            fe_pods: frontend_pods(fe),
            be_pods: backend_pods(be, source.draw()),
        })
        .collect();
    out.sort_by_key(|f| f.date);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{MetricRow, TimelineRow};

    struct Fixed(i32);

    impl PerturbationSource for Fixed {
        fn draw(&mut self) -> i32 {
            self.0
        }
    }

    #[test]
    fn frontend_ceils_with_floor_of_one() {
        assert_eq!(frontend_pods(2.01), 3);
        assert_eq!(frontend_pods(3.0), 3);
        assert_eq!(frontend_pods(0.2), 1);
        assert_eq!(frontend_pods(0.0), 1);
        assert_eq!(frontend_pods(-7.5), 1);
    }

    #[test]
    fn backend_applies_perturbation_before_ceiling() {
        assert_eq!(backend_pods(4.2, 0), 5);
        assert_eq!(backend_pods(4.2, -1), 4);
        assert_eq!(backend_pods(4.2, 2), 7);
        assert_eq!(backend_pods(0.5, -1), 1);
        assert_eq!(backend_pods(-3.0, 2), 1);
    }

    #[test]
    fn backend_stays_within_variance_bound() {
        let mut source = RandomPerturbation::from_seed(Some(7)).unwrap();
        for i in 0..2000 {
            let raw = (i as f64) * 0.37 - 20.0;
            let base = raw.ceil();
            let pods = f64::from(backend_pods(raw, source.draw()));
            assert!(pods >= 1.0);
            assert!(pods <= (base + 2.0).max(1.0), "raw={raw} pods={pods}");
            assert!(pods >= (base - 1.0).max(1.0), "raw={raw} pods={pods}");
        }
    }

    #[test]
    fn perturbation_distribution_has_expected_shape() {
        let mut source = RandomPerturbation::from_seed(Some(42)).unwrap();
        let n = 20_000;
        let mut counts = [0usize; 4];
        for _ in 0..n {
            let d = source.draw();
            let idx = BACKEND_PERTURBATIONS.iter().position(|&p| p == d).unwrap();
            counts[idx] += 1;
        }
        for (count, weight) in counts.iter().zip(BACKEND_PERTURBATION_WEIGHTS) {
            let share = *count as f64 / n as f64;
            assert!((share - weight).abs() < 0.02, "share {share} vs weight {weight}");
        }
    }

    #[test]
    fn seeded_sources_repeat() {
        let mut a = RandomPerturbation::from_seed(Some(1)).unwrap();
        let mut b = RandomPerturbation::from_seed(Some(1)).unwrap();
        let xs: Vec<i32> = (0..50).map(|_| a.draw()).collect();
        let ys: Vec<i32> = (0..50).map(|_| b.draw()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn only_budget_rows_are_returned_in_date_order() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 7, day).unwrap();
        let timeline = Timeline {
            rows: vec![
                TimelineRow {
                    row: MetricRow::new(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(), 1.0, 1.0, 1.0),
                    origin: Origin::Observed,
                },
                TimelineRow {
                    row: MetricRow::new(d(1), 2.0, 2.0, 2.0),
                    origin: Origin::Budget,
                },
                TimelineRow {
                    row: MetricRow::new(d(2), 3.0, 3.0, 3.0),
                    origin: Origin::Budget,
                },
            ],
        };
        let raw = RawPredictions {
            frontend: vec![100.0, 1.2, -4.0],
            backend: vec![100.0, 2.5, 0.1],
        };
        let out = finalize_forecast(&timeline, &raw, &mut Fixed(1)).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].date, d(1));
        assert_eq!((out[0].fe_pods, out[0].be_pods), (2, 4));
        assert_eq!((out[1].fe_pods, out[1].be_pods), (1, 2));
        assert_eq!(out[1].gmv, 3.0);
    }

    #[test]
    fn mismatched_prediction_lengths_fail() {
        let timeline = Timeline::default();
        let raw = RawPredictions {
            frontend: vec![1.0],
            backend: vec![],
        };
        assert!(finalize_forecast(&timeline, &raw, &mut Fixed(0)).is_err());
    }
}
