//! Residual cost between predicted and measured voltage.

/// Sum of squared residuals; infinite when the traces cannot be compared.
pub fn sum_squared_error(predicted: &[f64], measured: &[f64]) -> f64 {
    if predicted.len() != measured.len() || predicted.is_empty() {
        return f64::INFINITY;
    }
    let sse: f64 = predicted
        .iter()
        .zip(measured)
        .map(|(p, m)| (p - m) * (p - m))
        .sum();
    if sse.is_finite() { sse } else { f64::INFINITY }
}
