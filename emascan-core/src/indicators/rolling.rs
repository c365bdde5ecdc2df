//! Trailing simple mean over a fixed window.

/// Trailing mean of `period` values.
///
/// Index t is NaN while t < period - 1 and whenever the window ending at t
/// contains a NaN.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;

    for i in 0..n {
        let entering = values[i];
        if entering.is_nan() {
            nan_count += 1;
        } else {
            sum += entering;
        }

        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }

        if i + 1 >= period && nan_count == 0 {
            result[i] = sum / period as f64;
        }
    }

    result
}
