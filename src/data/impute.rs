//! Pod-count imputation for historical rows.
//!
//! Older sheet rows predate pod tracking. For those days we derive a pod count
//! from the metric that drives each tier:
//!
//! - frontend: one pod per `FE_USERS_PER_POD` active users
//! - backend: one pod per `BE_GMV_PER_POD` of GMV
//!
//! Ratios are rounded half-to-even and floored at one pod.

use chrono::NaiveDate;

use crate::domain::MetricRow;

pub const FE_USERS_PER_POD: f64 = 3800.0;
pub const BE_GMV_PER_POD: f64 = 2_100_000.0;

/// Fill missing pod counts on rows dated strictly before `cutoff`.
///
/// Returns the number of pod fields that were filled. Observed counts are never
/// overwritten and rows on/after the cutoff are left untouched.
pub fn impute_history(rows: &mut [MetricRow], cutoff: NaiveDate) -> usize {
    let mut filled = 0;
    for row in rows.iter_mut().filter(|r| r.date < cutoff) {
        if row.fe_pods.is_none() {
            row.fe_pods = Some(pods_for_ratio(row.users / FE_USERS_PER_POD));
            filled += 1;
        }
        if row.be_pods.is_none() {
            row.be_pods = Some(pods_for_ratio(row.gmv / BE_GMV_PER_POD));
            filled += 1;
        }
    }
    filled
}

fn pods_for_ratio(ratio: f64) -> u32 {
    if !ratio.is_finite() {
        return 1;
    }
    let rounded = ratio.round_ties_even();
    if rounded < 1.0 {
        1
    } else {
        rounded.min(u32::MAX as f64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cutoff() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn row(y: i32, m: u32, d: u32, gmv: f64, users: f64) -> MetricRow {
        MetricRow::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), gmv, users, 0.0)
    }

    #[test]
    fn zero_metrics_still_get_one_pod() {
        let mut rows = vec![row(2024, 1, 1, 0.0, 0.0)];
        impute_history(&mut rows, cutoff());
        assert_eq!(rows[0].fe_pods, Some(1));
        assert_eq!(rows[0].be_pods, Some(1));
    }

    #[test]
    fn ratios_round_half_to_even() {
        // 1.5 -> 2, 2.5 -> 2, 3.5 -> 4
        let mut rows = vec![
            row(2024, 1, 1, 3_150_000.0, 5700.0),
            row(2024, 1, 2, 5_250_000.0, 9500.0),
            row(2024, 1, 3, 7_350_000.0, 13_300.0),
        ];
        impute_history(&mut rows, cutoff());
        let fe: Vec<_> = rows.iter().map(|r| r.fe_pods.unwrap()).collect();
        let be: Vec<_> = rows.iter().map(|r| r.be_pods.unwrap()).collect();
        assert_eq!(fe, vec![2, 2, 4]);
        assert_eq!(be, vec![2, 2, 4]);
    }

    #[test]
    fn observed_counts_and_post_cutoff_rows_are_untouched() {
        let mut observed = row(2024, 5, 31, 21_000_000.0, 38_000.0);
        observed.fe_pods = Some(42);
        let mut rows = vec![observed, row(2024, 6, 1, 21_000_000.0, 38_000.0)];

        let filled = impute_history(&mut rows, cutoff());
        assert_eq!(filled, 1);
        assert_eq!(rows[0].fe_pods, Some(42));
        assert_eq!(rows[0].be_pods, Some(10));
        assert_eq!(rows[1].fe_pods, None);
        assert_eq!(rows[1].be_pods, None);
    }
}
