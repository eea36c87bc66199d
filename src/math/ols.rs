//! Ordinary least squares on standardized columns.
//!
//! Business metrics span wildly different scales (GMV in the millions next to
//! 0/1 weekend flags), so columns are z-scored before solving and the
//! coefficients are mapped back to raw units afterwards:
//!
//! ```text
//! y ≈ b0 + Σ b_j (x_j - μ_j) / σ_j
//!   = (b0 - Σ b_j μ_j / σ_j) + Σ (b_j / σ_j) x_j
//! ```
//!
//! Constant columns (σ = 0) carry no signal and get a zero coefficient.
//!
//! Nalgebra's `QR::solve` only handles square systems, so the solve goes
//! through SVD, which also copes with collinear columns.

use nalgebra::{DMatrix, DVector};

/// Fitted intercept and per-column coefficients, in raw units.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if no tolerance yields a finite solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }
    None
}

/// Fit `y ≈ intercept + Σ coef_j x_j` over the given rows.
///
/// All rows must have the same width. Returns `None` for an empty input or
/// when the solve fails.
pub fn fit_linear(rows: &[Vec<f64>], y: &[f64]) -> Option<LinearFit> {
    let n = rows.len();
    if n == 0 || n != y.len() {
        return None;
    }
    let width = rows[0].len();
    if rows.iter().any(|r| r.len() != width) {
        return None;
    }

    let (means, scales) = column_moments(rows, width);

    // Column 0 is the intercept; constant feature columns stay zero.
    let mut x = DMatrix::<f64>::zeros(n, width + 1);
    for (i, row) in rows.iter().enumerate() {
        x[(i, 0)] = 1.0;
        for j in 0..width {
            if scales[j] > 0.0 {
                x[(i, j + 1)] = (row[j] - means[j]) / scales[j];
            }
        }
    }
    let target = DVector::from_column_slice(y);
    let beta = solve_least_squares(&x, &target)?;

    let mut intercept = beta[0];
    let mut coefficients = vec![0.0; width];
    for j in 0..width {
        if scales[j] > 0.0 {
            coefficients[j] = beta[j + 1] / scales[j];
            intercept -= coefficients[j] * means[j];
        }
    }
    Some(LinearFit {
        intercept,
        coefficients,
    })
}

fn column_moments(rows: &[Vec<f64>], width: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len() as f64;
    let mut means = vec![0.0; width];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v / n;
        }
    }
    let mut scales = vec![0.0; width];
    for row in rows {
        for j in 0..width {
            let d = row[j] - means[j];
            scales[j] += d * d / n;
        }
    }
    for s in &mut scales {
        *s = s.sqrt();
        if *s < 1e-12 {
            *s = 0.0;
        }
    }
    (means, scales)
}
