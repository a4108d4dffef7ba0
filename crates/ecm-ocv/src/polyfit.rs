//! Least-squares polynomial regression.
//!
//! The abscissa is mapped onto `[-1, 1]` and the Vandermonde columns are
//! normalized before an SVD solve, which keeps degree 11-13 fits on SOC data
//! well inside double precision. A design matrix whose numerical rank is
//! below `degree + 1` is reported as [`OcvError::FitDegeneracy`].

use crate::error::{OcvError, OcvResult};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Polynomial `p(x) = sum_k c_k * u^k` with `u = (x - center) / half_width`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    /// Coefficients in ascending power order, in the normalized variable.
    pub coeffs: Vec<f64>,
    pub center: f64,
    pub half_width: f64,
}

impl Polynomial {
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    /// Evaluate with Horner's method.
    pub fn eval(&self, x: f64) -> f64 {
        let u = (x - self.center) / self.half_width;
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * u + c)
    }
}

/// Fit a degree-`degree` polynomial to `(xs, ys)` by least squares.
pub fn fit_polynomial(xs: &[f64], ys: &[f64], degree: usize) -> OcvResult<Polynomial> {
    if xs.len() != ys.len() {
        return Err(OcvError::InvalidTable {
            what: format!("x/y length mismatch: {} != {}", xs.len(), ys.len()),
        });
    }
    if xs.is_empty() {
        return Err(OcvError::DataUnavailable {
            what: "no samples to fit".to_string(),
        });
    }
    if let Some(bad) = xs.iter().chain(ys).find(|v| !v.is_finite()) {
        return Err(OcvError::InvalidTable {
            what: format!("non-finite sample {bad}"),
        });
    }

    let n_coeffs = degree + 1;
    let m = xs.len();
    if m < n_coeffs {
        return Err(OcvError::FitDegeneracy {
            degree,
            what: format!("{m} samples cannot determine {n_coeffs} coefficients"),
        });
    }

    let x_min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let center = 0.5 * (x_min + x_max);
    let half_width = 0.5 * (x_max - x_min);
    if half_width <= 0.0 && degree > 0 {
        return Err(OcvError::FitDegeneracy {
            degree,
            what: "all abscissae coincide".to_string(),
        });
    }
    let half_width = if half_width > 0.0 { half_width } else { 1.0 };

    let mut design = DMatrix::from_fn(m, n_coeffs, |i, j| {
        let u = (xs[i] - center) / half_width;
        u.powi(j as i32)
    });

    // Column equilibration, undone on the solution.
    let mut col_norms = vec![1.0; n_coeffs];
    for (j, norm) in col_norms.iter_mut().enumerate() {
        let n = design.column(j).norm();
        if n > 0.0 {
            *norm = n;
            design.column_mut(j).scale_mut(1.0 / n);
        }
    }

    let rhs = DVector::from_column_slice(ys);
    let svd = design.svd(true, true);

    let s_max = svd.singular_values.max();
    let rcond = (m.max(n_coeffs) as f64) * f64::EPSILON;
    let rank = svd
        .singular_values
        .iter()
        .filter(|&&s| s > rcond * s_max)
        .count();
    if rank < n_coeffs {
        return Err(OcvError::FitDegeneracy {
            degree,
            what: format!("design matrix rank {rank} < {n_coeffs}"),
        });
    }

    let scaled = svd
        .solve(&rhs, rcond * s_max)
        .map_err(|e| OcvError::FitDegeneracy {
            degree,
            what: e.to_string(),
        })?;

    let coeffs = scaled
        .iter()
        .zip(&col_norms)
        .map(|(c, n)| c / n)
        .collect();

    Ok(Polynomial {
        coeffs,
        center,
        half_width,
    })
}
