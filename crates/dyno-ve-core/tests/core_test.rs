//! Property tests for binning, grids and clamp limits.

use proptest::prelude::*;

use dyno_ve_core::{
    nearest_bin, nearest_bin_index, ApplyClamp, BinAxes, ClampLimit, Grid, PreviewClamp,
    LOAD_CENTERS, RPM_CENTERS,
};

#[test]
fn test_locate_known_samples() {
    let axes = BinAxes::standard();
    let cell = axes.locate(3200.0, 85.0).unwrap();
    assert_eq!(axes.centers(cell), (3000.0, 80.0));
    assert_eq!(axes.centers(axes.locate(100.0, 0.0).unwrap()), (1500.0, 35.0));
    assert_eq!(axes.centers(axes.locate(9000.0, 200.0).unwrap()), (6500.0, 95.0));
    assert!(axes.locate(f64::NAN, 50.0).is_none());
}

#[test]
fn test_grid_csv_shape() {
    let text = Grid::filled(1.0).to_csv(&BinAxes::standard());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 12);
    assert!(lines[1..].iter().all(|l| l.split(',').count() == 6));
    assert!(lines[1..].iter().all(|l| l.ends_with(",+1.00")));
}

proptest! {
    #[test]
    fn prop_nearest_bin_minimizes_distance(value in -1000.0f64..10_000.0) {
        let i = nearest_bin_index(value, &RPM_CENTERS).unwrap();
        let best = (value - RPM_CENTERS[i]).abs();
        for (j, c) in RPM_CENTERS.iter().enumerate() {
            let d = (value - c).abs();
            prop_assert!(best <= d);
            // Ties go to the lower center.
            if j < i {
                prop_assert!(d > best);
            }
        }
    }

    #[test]
    fn prop_binning_is_pure(value in 0.0f64..150.0) {
        prop_assert_eq!(nearest_bin(value, &LOAD_CENTERS), nearest_bin(value, &LOAD_CENTERS));
        prop_assert!(LOAD_CENTERS.contains(&nearest_bin(value, &LOAD_CENTERS).unwrap()));
    }

    #[test]
    fn prop_clamp_is_bounded(limit in 0.1f64..50.0, value in -1e6f64..1e6) {
        let preview = PreviewClamp::new(limit).unwrap();
        let apply = ApplyClamp::new(limit).unwrap();
        prop_assert!(preview.clamp(value).abs() <= limit);
        prop_assert_eq!(preview.clamp(value), apply.clamp(value));
        if value.abs() <= limit {
            prop_assert_eq!(preview.clamp(value), value);
        }
    }
}
