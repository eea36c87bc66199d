//! Feature engineering shared by training and inference.
//!
//! Both the trainer and the predictor build features through [`build_features`]
//! so the column set, order and semantics can never drift apart. Model
//! artifacts record [`FEATURE_SCHEMA_VERSION`] and [`FEATURE_COLUMNS`]; loading
//! an artifact built against a different schema fails fast.
//!
//! Features per timeline row:
//! - raw metrics: `gmv`, `users`, `marketing_cost`
//! - calendar: weekday (0 = Monday), day of month, weekend flag, month
//! - 7-row trailing means of the three metrics
//!
//! Rolling means look at the current row and up to six rows *before* it on the
//! merged timeline, regardless of origin. The first budget day therefore still
//! sees the tail of the history, and no row ever sees a later one.

use chrono::{Datelike, NaiveDate};

use crate::domain::Timeline;

pub const FEATURE_SCHEMA_VERSION: u32 = 1;

pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "gmv",
    "users",
    "marketing_cost",
    "day_of_week",
    "day_of_month",
    "is_weekend",
    "month",
    "gmv_7d_avg",
    "users_7d_avg",
    "marketing_7d_avg",
];

pub const FEATURE_COUNT: usize = 10;

/// Trailing window length (rows, current row included).
pub const ROLLING_WINDOW: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub gmv: f64,
    pub users: f64,
    pub marketing_cost: f64,
    pub day_of_week: u32,
    pub day_of_month: u32,
    pub is_weekend: bool,
    pub month: u32,
    pub gmv_7d_avg: f64,
    pub users_7d_avg: f64,
    pub marketing_7d_avg: f64,
}

impl FeatureVector {
    /// Values in `FEATURE_COLUMNS` order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.gmv,
            self.users,
            self.marketing_cost,
            self.day_of_week as f64,
            self.day_of_month as f64,
            if self.is_weekend { 1.0 } else { 0.0 },
            self.month as f64,
            self.gmv_7d_avg,
            self.users_7d_avg,
            self.marketing_7d_avg,
        ]
    }
}

/// Calendar features for a single date: `(day_of_week, day_of_month, is_weekend, month)`.
pub fn calendar_features(date: NaiveDate) -> (u32, u32, bool, u32) {
    let dow = date.weekday().num_days_from_monday();
    (dow, date.day(), dow >= 5, date.month())
}

/// Build one feature vector per timeline row, preserving order.
pub fn build_features(timeline: &Timeline) -> Vec<FeatureVector> {
    let gmv: Vec<f64> = timeline.rows.iter().map(|r| r.row.gmv).collect();
    let users: Vec<f64> = timeline.rows.iter().map(|r| r.row.users).collect();
    let marketing: Vec<f64> = timeline.rows.iter().map(|r| r.row.marketing_cost).collect();

    let gmv_avg = trailing_mean(&gmv, ROLLING_WINDOW);
    let users_avg = trailing_mean(&users, ROLLING_WINDOW);
    let marketing_avg = trailing_mean(&marketing, ROLLING_WINDOW);

    timeline
        .rows
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let (day_of_week, day_of_month, is_weekend, month) = calendar_features(r.row.date);
            FeatureVector {
                gmv: r.row.gmv,
                users: r.row.users,
                marketing_cost: r.row.marketing_cost,
                day_of_week,
                day_of_month,
                is_weekend,
                month,
                gmv_7d_avg: gmv_avg[i],
                users_7d_avg: users_avg[i],
                marketing_7d_avg: marketing_avg[i],
            }
        })
        .collect()
}

/// Mean of `values[i + 1 - window ..= i]`, shrinking to whatever exists at the start.
fn trailing_mean(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let lo = (i + 1).saturating_sub(window);
            let slice = &values[lo..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MetricRow, Origin, TimelineRow};

    fn timeline(values: &[f64]) -> Timeline {
        let start = NaiveDate::from_ymd_opt(2024, 6, 24).unwrap();
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, &v)| TimelineRow {
                row: MetricRow::new(start + chrono::Days::new(i as u64), v, v * 10.0, v * 100.0),
                origin: if i < 7 { Origin::Observed } else { Origin::Budget },
            })
            .collect();
        Timeline { rows }
    }

    #[test]
    fn schema_matches_vector_layout() {
        assert_eq!(FEATURE_COLUMNS.len(), FEATURE_COUNT);
        let t = timeline(&[1.0]);
        let f = build_features(&t)[0].to_array();
        assert_eq!(f[FEATURE_COLUMNS.iter().position(|c| *c == "users").unwrap()], 10.0);
        assert_eq!(f[FEATURE_COLUMNS.iter().position(|c| *c == "month").unwrap()], 6.0);
    }

    #[test]
    fn calendar_features_use_monday_zero() {
        // 2024-06-29 is a Saturday, 2024-07-01 a Monday.
        let sat = NaiveDate::from_ymd_opt(2024, 6, 29).unwrap();
        let mon = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(calendar_features(sat), (5, 29, true, 6));
        assert_eq!(calendar_features(mon), (0, 1, false, 7));
    }

    #[test]
    fn rolling_window_shrinks_at_start() {
        let f = build_features(&timeline(&[2.0, 4.0, 6.0]));
        assert_eq!(f[0].gmv_7d_avg, 2.0);
        assert_eq!(f[1].gmv_7d_avg, 3.0);
        assert_eq!(f[2].gmv_7d_avg, 4.0);
        assert_eq!(f[2].users_7d_avg, 40.0);
        assert_eq!(f[2].marketing_7d_avg, 400.0);
    }

    #[test]
    fn rolling_window_crosses_into_budget() {
        // Seven history rows of 1.0 then a budget row of 8.0.
        let f = build_features(&timeline(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 8.0]));
        // Window for row 7 is rows 1..=7: six 1.0s and the 8.0.
        assert!((f[7].gmv_7d_avg - 2.0).abs() < 1e-12);
    }

    #[test]
    fn features_never_look_ahead() {
        let base: Vec<f64> = (1..=12).map(f64::from).collect();
        let before = build_features(&timeline(&base));
        for i in 0..base.len() - 1 {
            let mut mutated = base.clone();
            for v in mutated.iter_mut().skip(i + 1) {
                *v *= 1000.0;
            }
            let after = build_features(&timeline(&mutated));
            assert_eq!(before[i], after[i], "row {i} changed after mutating later rows");
        }
    }

    #[test]
    fn features_ignore_origin_labels() {
        let t = timeline(&[3.0, 5.0, 8.0, 13.0, 21.0, 34.0, 55.0, 89.0, 144.0]);
        let mut relabelled = t.clone();
        for r in &mut relabelled.rows {
            r.origin = Origin::Budget;
        }
        assert_eq!(build_features(&t), build_features(&relabelled));
    }
}
