//! Linear resampling of tabulated functions.

/// Linearly interpolate `(x, y)` at each point of `x_new`.
///
/// `x` must be strictly increasing. Points outside `[x[0], x[last]]` get
/// `0.0`, so a redshifted template contributes nothing where it has no
/// coverage.
pub fn interp_linear(x_new: &[f64], x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len().min(y.len());
    if n == 0 {
        return vec![0.0; x_new.len()];
    }
    let (lo, hi) = (x[0], x[n - 1]);

    x_new
        .iter()
        .map(|&xv| {
            if !(xv >= lo && xv <= hi) {
                return 0.0;
            }
            // First index with x[j] >= xv.
            let j = x[..n].partition_point(|&v| v < xv);
            if j == 0 {
                return y[0];
            }
            let (x0, x1) = (x[j - 1], x[j]);
            let u = (xv - x0) / (x1 - x0);
            y[j - 1] + u * (y[j] - y[j - 1])
        })
        .collect()
}
