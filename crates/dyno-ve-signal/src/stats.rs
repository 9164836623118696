//! Robust statistics for per-cell dispersion.

/// Median of a slice (sorts a copy). `None` when empty.
#[must_use]
pub fn median(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Median absolute deviation about the median. `None` when empty.
#[must_use]
pub fn median_absolute_deviation(data: &[f64]) -> Option<f64> {
    let med = median(data)?;
    let deviations: Vec<f64> = data.iter().map(|x| (x - med).abs()).collect();
    median(&deviations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn mad_ignores_single_outlier() {
        // median 2, deviations [1, 0, 0, 1, 98] -> 1
        let mad = median_absolute_deviation(&[1.0, 2.0, 2.0, 3.0, 100.0]).unwrap();
        assert_eq!(mad, 1.0);
    }

    #[test]
    fn mad_of_constant_is_zero() {
        assert_eq!(median_absolute_deviation(&[-1.5; 4]), Some(0.0));
    }
}
