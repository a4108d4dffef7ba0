use crate::{CoreError, CoreResult};

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// `n` evenly spaced points over `[start, end]`, both ends included.
pub fn linspace(start: Real, end: Real, n: usize) -> Vec<Real> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as Real;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as Real })
                .collect()
        }
    }
}

/// Behaviour of [`interp_linear`] outside the tabulated range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Extrapolation {
    /// Return the boundary value.
    #[default]
    Clamp,
    /// Extend the first/last segment.
    Linear,
    /// Reject the query.
    Strict,
}

/// Piecewise-linear interpolation of `(xs, ys)` at `x`.
///
/// `xs` must be non-decreasing. Repeated abscissae are allowed; the query
/// resolves to the right-most segment containing `x`.
pub fn interp_linear(x: Real, xs: &[Real], ys: &[Real], mode: Extrapolation) -> CoreResult<Real> {
    if xs.len() != ys.len() {
        return Err(CoreError::LengthMismatch {
            what: "interpolation table",
            left: xs.len(),
            right: ys.len(),
        });
    }
    if xs.is_empty() {
        return Err(CoreError::InvalidArg {
            what: "interpolation table is empty",
        });
    }
    ensure_finite(x, "interpolation query")?;

    let n = xs.len();
    let (x_min, x_max) = (xs[0], xs[n - 1]);
    if n == 1 {
        return match mode {
            Extrapolation::Strict if x != x_min => Err(CoreError::OutOfRange {
                what: "interpolation query",
                value: x,
                min: x_min,
                max: x_max,
            }),
            _ => Ok(ys[0]),
        };
    }

    if x < x_min || x > x_max {
        match mode {
            Extrapolation::Clamp => return Ok(if x < x_min { ys[0] } else { ys[n - 1] }),
            Extrapolation::Strict => {
                return Err(CoreError::OutOfRange {
                    what: "interpolation query",
                    value: x,
                    min: x_min,
                    max: x_max,
                });
            }
            Extrapolation::Linear => {
                let (i0, i1) = if x < x_min { (0, 1) } else { (n - 2, n - 1) };
                return Ok(lerp_segment(x, xs[i0], xs[i1], ys[i0], ys[i1]));
            }
        }
    }

    // first index with xs[i] > x, so xs[hi - 1] <= x
    let hi = xs.partition_point(|&v| v <= x);
    if hi >= n {
        return Ok(ys[n - 1]);
    }
    let lo = hi - 1;
    Ok(lerp_segment(x, xs[lo], xs[hi], ys[lo], ys[hi]))
}

fn lerp_segment(x: Real, x0: Real, x1: Real, y0: Real, y1: Real) -> Real {
    let dx = x1 - x0;
    if dx == 0.0 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / dx
}
