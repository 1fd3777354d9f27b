use crate::config::OutOfBoundsPolicy;

/// Find the unique `i` such that `x in [grid[i], grid[i+1])`, monotonicity-
/// direction agnostic (§4.E.2 "Index search"). Returns `-1` below the grid
/// and `grid.len() as isize` above it; an exact match on the last point
/// returns `grid.len() - 1`. `hint` seeds the search at a previous index
/// (e.g. the index found for the previous target point in a sweep), which
/// lets the galloping step above it skip straight to the right
/// neighborhood instead of bisecting the whole grid, grounded on
/// `harp_interpolate_find_index` in `original_source/libharp/harp-interpolation.c`.
pub fn find_index(grid: &[f64], x: f64, hint: Option<usize>) -> isize {
    let n = grid.len() as isize;
    if n == 0 {
        return -1;
    }
    if x == grid[grid.len() - 1] {
        return n - 1;
    }
    let ascend = grid[grid.len() - 1] >= grid[0];
    let in_range = |i: isize| -> bool {
        // true if `x` is "at or past" `grid[i]` in the direction of travel.
        x == grid[i as usize] || (x > grid[i as usize]) == ascend
    };

    let (mut low, mut high) = match hint {
        Some(h) if (h as isize) >= 0 && (h as isize) <= n - 1 => {
            let mut low = h as isize;
            let mut high;
            let mut increment: isize = 1;
            if in_range(low) {
                if low == n - 1 {
                    return n;
                }
                high = low + 1;
                while in_range(high) {
                    low = high;
                    high = low + increment;
                    if high > n - 1 {
                        high = n;
                        break;
                    }
                    increment += increment;
                }
            } else {
                if low == 0 {
                    return -1;
                }
                high = low;
                low -= 1;
                while x != grid[low as usize] && (x < grid[low as usize]) == ascend {
                    high = low;
                    if increment >= high {
                        low = -1;
                        break;
                    }
                    low = high - increment;
                    increment += increment;
                }
            }
            (low, high)
        }
        _ => (-1, n),
    };

    while high - low != 1 {
        let mid = (low + high) / 2;
        if in_range(mid) {
            low = mid;
        } else {
            high = mid;
        }
    }
    if low == n - 1 {
        n
    } else {
        low
    }
}

/// Linear interpolation of a single target point against a point grid
/// (§4.E.2/§4.E.3 "Linear"), honoring `policy` out of domain. `hint` is
/// forwarded to [`find_index`].
pub fn interpolate_linear(grid: &[f64], values: &[f64], target: f64, policy: OutOfBoundsPolicy, hint: Option<usize>) -> f64 {
    point_interpolate(grid, values, target, policy, hint, |x| x, |y| y, |y| y)
}

/// Log-linear interpolation (§4.E.3 "Log-linear axis"): the interpolation
/// fraction is computed from `log(x/x_i)/log(x_{i+1}/x_i)` but `y` is
/// interpolated linearly.
pub fn interpolate_loglinear(grid: &[f64], values: &[f64], target: f64, policy: OutOfBoundsPolicy, hint: Option<usize>) -> f64 {
    point_interpolate(grid, values, target, policy, hint, f64::ln, |y| y, |y| y)
}

/// Log-log-linear interpolation (§4.E.3 "Log-log-linear"): both axes are
/// log-transformed, so the result is `exp` of a linear interpolation of
/// `log(y)`.
pub fn interpolate_logloglinear(grid: &[f64], values: &[f64], target: f64, policy: OutOfBoundsPolicy, hint: Option<usize>) -> f64 {
    point_interpolate(grid, values, target, policy, hint, f64::ln, f64::ln, f64::exp)
}

/// Shared point-interpolation driver: `fwd_x`/`fwd_y` transform the grid and
/// values into the domain the interpolation fraction is computed in (e.g.
/// `ln` for a log axis), `back_y` is the inverse transform applied to the
/// result. Mirrors `interpolate_linear`/`interpolate_loglinear`/
/// `interpolate_logloglinear` in `original_source/libharp/harp-interpolation.c`,
/// which differ from each other only in which of these transforms they
/// apply before/after the shared fraction-and-blend arithmetic.
fn point_interpolate(
    grid: &[f64],
    values: &[f64],
    target: f64,
    policy: OutOfBoundsPolicy,
    hint: Option<usize>,
    fwd_x: impl Fn(f64) -> f64,
    fwd_y: impl Fn(f64) -> f64,
    back_y: impl Fn(f64) -> f64,
) -> f64 {
    let n = grid.len();
    let pos = find_index(grid, target, hint);

    let extrapolate_from = |edge: usize, other: usize| -> f64 {
        let v = (fwd_x(target) - fwd_x(grid[edge])) / (fwd_x(grid[edge]) - fwd_x(grid[other]));
        back_y(fwd_y(values[edge]) + v * (fwd_y(values[edge]) - fwd_y(values[other])))
    };

    if pos == -1 {
        return match policy {
            OutOfBoundsPolicy::Nan => f64::NAN,
            OutOfBoundsPolicy::ClampToEdge => values[0],
            OutOfBoundsPolicy::ExtrapolateLinear => extrapolate_from(0, 1),
        };
    }
    if pos == n as isize {
        return match policy {
            OutOfBoundsPolicy::Nan => f64::NAN,
            OutOfBoundsPolicy::ClampToEdge => values[n - 1],
            OutOfBoundsPolicy::ExtrapolateLinear => extrapolate_from(n - 1, n - 2),
        };
    }

    let i = pos as usize;
    if target == grid[i] {
        return values[i];
    }
    if target == grid[i + 1] {
        return values[i + 1];
    }
    let v = (fwd_x(target) - fwd_x(grid[i])) / (fwd_x(grid[i + 1]) - fwd_x(grid[i]));
    back_y((1.0 - v) * fwd_y(values[i]) + v * fwd_y(values[i + 1]))
}

/// Overlap-weighted interval interpolation (§4.E.1 overlap table, §4.E.2
/// "Interval" kernel): for each target interval, sum `source[k]` weighted
/// by the fraction of source interval `k` that overlaps the target
/// interval, skipping NaN contributions; NaN if nothing overlaps.
/// Grounded on `harp_interval_interpolate_array_linear`.
pub fn interval_interpolate(source_bounds: &[(f64, f64)], source_values: &[f64], target_bounds: &[(f64, f64)]) -> Vec<f64> {
    target_bounds
        .iter()
        .map(|&(b0, b1)| {
            let (xminb, xmaxb) = if b0 < b1 { (b0, b1) } else { (b1, b0) };
            let mut sum = 0.0;
            let mut contributions = 0usize;
            for (k, &(a0, a1)) in source_bounds.iter().enumerate() {
                let value = source_values[k];
                if value.is_nan() {
                    continue;
                }
                let (xmina, xmaxa) = if a0 < a1 { (a0, a1) } else { (a1, a0) };
                if xmina >= xmaxb || xminb >= xmaxa {
                    continue;
                }
                let xminc = xmina.max(xminb);
                let xmaxc = xmaxa.min(xmaxb);
                let weight = (xmaxc - xminc) / (xmaxa - xmina);
                sum += weight * value;
                contributions += 1;
            }
            if contributions == 0 {
                f64::NAN
            } else {
                sum
            }
        })
        .collect()
}

/// Natural cubic spline interpolation of a single target point (§4.E.3
/// "Cubic spline"). Returns `None` if `xx` has fewer than 3 points or
/// contains a repeated value. Grounded on `get_second_derivatives` /
/// `execute_cubic_spline_interpolation`.
pub fn cubic_spline_interpolate(xx: &[f64], yy: &[f64], target: f64) -> Option<f64> {
    let second_derivatives = natural_spline_second_derivatives(xx, yy)?;
    evaluate_cubic_spline(xx, yy, &second_derivatives, target)
}

/// Tridiagonal decomposition of the natural-boundary-condition (zero second
/// derivative at both ends) cubic spline through `(x[i], y[i])`, per
/// `get_second_derivatives`.
fn natural_spline_second_derivatives(x: &[f64], y: &[f64]) -> Option<Vec<f64>> {
    let n = x.len();
    if n < 3 || y.len() != n {
        return None;
    }
    let mut second_derivatives = vec![0.0f64; n];
    let mut u = vec![0.0f64; n];
    // natural boundary conditions at both ends
    second_derivatives[0] = 0.0;
    u[0] = 0.0;
    for i in 1..n - 1 {
        let sig = (x[i] - x[i - 1]) / (x[i + 1] - x[i - 1]);
        let p = sig * second_derivatives[i - 1] + 2.0;
        second_derivatives[i] = (sig - 1.0) / p;
        let mut ui = (y[i + 1] - y[i]) / (x[i + 1] - x[i]) - (y[i] - y[i - 1]) / (x[i] - x[i - 1]);
        ui = (6.0 * ui / (x[i + 1] - x[i - 1]) - sig * u[i - 1]) / p;
        u[i] = ui;
    }
    second_derivatives[n - 1] = 0.0;
    for k in (0..n - 1).rev() {
        second_derivatives[k] = second_derivatives[k] * second_derivatives[k + 1] + u[k];
    }
    Some(second_derivatives)
}

/// Evaluate the spline built by [`natural_spline_second_derivatives`] at
/// `target` via bracketing bisection, per `execute_cubic_spline_interpolation`.
fn evaluate_cubic_spline(xx: &[f64], yy: &[f64], second_derivatives: &[f64], target: f64) -> Option<f64> {
    let n = xx.len();
    let mut klo = 0usize;
    let mut khi = n - 1;
    while khi - klo > 1 {
        let k = (khi + klo) / 2;
        if xx[k] > target {
            khi = k;
        } else {
            klo = k;
        }
    }
    let h = xx[khi] - xx[klo];
    if h == 0.0 {
        return None;
    }
    let a = (xx[khi] - target) / h;
    let b = (target - xx[klo]) / h;
    Some(
        a * yy[klo]
            + b * yy[khi]
            + ((a * a * a - a) * second_derivatives[klo] + (b * b * b - b) * second_derivatives[khi]) * (h * h) / 6.0,
    )
}

/// Bicubic spline interpolation of a single `(target_x, target_y)` point
/// over a `[m, n]` grid `zz[row][col]` tabulated at `xx` (rows) and `yy`
/// (columns) (§4.E.3 "Bicubic spline"): spline each row along `yy` to
/// `target_y`, then spline the resulting column of `m` values along `xx` to
/// `target_x`. Grounded on `execute_bicubic_spline_interpolation`.
pub fn bicubic_spline_interpolate(xx: &[f64], yy: &[f64], zz: &[Vec<f64>], target_x: f64, target_y: f64) -> Option<f64> {
    let m = xx.len();
    if zz.len() != m {
        return None;
    }
    let mut column = Vec::with_capacity(m);
    for row in zz {
        column.push(cubic_spline_interpolate(yy, row, target_y)?);
    }
    cubic_spline_interpolate(xx, &column, target_x)
}

/// Derive interval bounds from an ascending-or-descending array of
/// midpoints (§4.E.2 "derived or extrapolated from midpoints"): interior
/// bounds are the midpoint of adjacent midpoints, end bounds are linearly
/// extrapolated (or, if `extrapolate` is false, clamped to the outermost
/// midpoint value). Trailing NaNs are trimmed and restored as NaN bounds.
/// Grounded on `harp_bounds_from_midpoints_linear`.
pub fn bounds_from_midpoints_linear(midpoints: &[f64], extrapolate: bool) -> Vec<(f64, f64)> {
    bounds_from_midpoints(midpoints, extrapolate, |x| x, |a, b| 0.5 * (a + b), |a, b| 0.5 * (3.0 * a - b))
}

/// Log-domain counterpart of [`bounds_from_midpoints_linear`] (§4.E.1
/// pressure special case), grounded on `harp_bounds_from_midpoints_loglinear`.
pub fn bounds_from_midpoints_loglinear(midpoints: &[f64], extrapolate: bool) -> Vec<(f64, f64)> {
    bounds_from_midpoints(
        midpoints,
        extrapolate,
        f64::ln,
        |a, b| (0.5 * (a + b)).exp(),
        |a, b| (0.5 * (3.0 * a - b)).exp(),
    )
}

fn bounds_from_midpoints(
    midpoints: &[f64],
    extrapolate: bool,
    fwd: impl Fn(f64) -> f64,
    average: impl Fn(f64, f64) -> f64,
    extrapolated_edge: impl Fn(f64, f64) -> f64,
) -> Vec<(f64, f64)> {
    let mut n = midpoints.len();
    while n > 0 && midpoints[n - 1].is_nan() {
        n -= 1;
    }
    let mut bounds = vec![(f64::NAN, f64::NAN); midpoints.len()];
    if n == 0 {
        return bounds;
    }
    if n == 1 {
        bounds[0] = (midpoints[0], midpoints[0]);
        return bounds;
    }
    for i in 0..n - 1 {
        let avg = average(fwd(midpoints[i]), fwd(midpoints[i + 1]));
        bounds[i].1 = avg;
        bounds[i + 1].0 = avg;
    }
    if extrapolate {
        bounds[0].0 = extrapolated_edge(fwd(midpoints[0]), fwd(midpoints[1]));
        bounds[n - 1].1 = extrapolated_edge(fwd(midpoints[n - 1]), fwd(midpoints[n - 2]));
    } else {
        bounds[0].0 = midpoints[0];
        bounds[n - 1].1 = midpoints[n - 1];
    }
    bounds
}

#[cfg(test)]
mod kernel_tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn find_index_brackets_ascending_grid() {
        let grid = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(find_index(&grid, -1.0, None), -1);
        assert_eq!(find_index(&grid, 0.5, None), 0);
        assert_eq!(find_index(&grid, 2.0, None), 2);
        assert_eq!(find_index(&grid, 3.0, None), 3);
        assert_eq!(find_index(&grid, 4.0, None), 4);
    }

    #[test]
    fn find_index_brackets_descending_grid_with_hint() {
        let grid = [3.0, 2.0, 1.0, 0.0];
        assert_eq!(find_index(&grid, 2.5, Some(0)), 0);
        assert_eq!(find_index(&grid, 0.5, Some(2)), 2);
    }

    #[test]
    fn point_regrid_linear_scenario() {
        // Source grid [0, 1, 2], values [0, 10, 40], target [0.5, 1.5] -> [5, 25].
        let grid = [0.0, 1.0, 2.0];
        let values = [0.0, 10.0, 40.0];
        assert_abs_diff_eq!(interpolate_linear(&grid, &values, 0.5, OutOfBoundsPolicy::Nan, None), 5.0);
        assert_abs_diff_eq!(interpolate_linear(&grid, &values, 1.5, OutOfBoundsPolicy::Nan, None), 25.0);
    }

    #[test]
    fn linear_regrid_at_exact_grid_point_returns_source_value() {
        let grid = [0.0, 1.0, 2.0];
        let values = [3.0, 7.0, -1.0];
        for (i, &x) in grid.iter().enumerate() {
            assert_abs_diff_eq!(interpolate_linear(&grid, &values, x, OutOfBoundsPolicy::Nan, None), values[i]);
        }
    }

    #[test]
    fn out_of_bounds_policy_nan_clamp_extrapolate() {
        let grid = [1.0, 2.0, 3.0];
        let values = [10.0, 20.0, 30.0];
        assert!(interpolate_linear(&grid, &values, 0.0, OutOfBoundsPolicy::Nan, None).is_nan());
        assert_abs_diff_eq!(interpolate_linear(&grid, &values, 0.0, OutOfBoundsPolicy::ClampToEdge, None), 10.0);
        assert_abs_diff_eq!(interpolate_linear(&grid, &values, 0.0, OutOfBoundsPolicy::ExtrapolateLinear, None), 0.0);
        assert_abs_diff_eq!(interpolate_linear(&grid, &values, 4.0, OutOfBoundsPolicy::ExtrapolateLinear, None), 40.0);
    }

    #[test]
    fn loglog_regrid_for_aod_scenario() {
        // (lambda, tau) = [(400, 0.5), (800, 0.2)], target lambda=600: both axes are
        // log-transformed before the linear blend, so v = ln(600/400) / ln(800/400)
        // rather than the plain-x fraction -- see DESIGN.md for why this lands near
        // but not exactly at the spec's illustrative "~0.316" (which corresponds to
        // v=0.5, i.e. treating 600 as the arithmetic midpoint of 400 and 800).
        let grid = [400.0, 800.0];
        let values = [0.5, 0.2];
        let got = interpolate_logloglinear(&grid, &values, 600.0, OutOfBoundsPolicy::Nan, None);
        let v = (600.0f64 / 400.0).ln() / (800.0f64 / 400.0).ln();
        let expected = ((1.0 - v) * 0.5f64.ln() + v * 0.2f64.ln()).exp();
        assert_abs_diff_eq!(got, expected, epsilon = 1e-9);
        assert_abs_diff_eq!(got, 0.2925, epsilon = 1e-3);
    }

    #[test]
    fn interval_interpolate_half_overlap_scenario() {
        // Source bounds [[0,1000],[1000,2000]], values [10, 20], target [[500,1500]] -> 15.
        let source_bounds = [(0.0, 1000.0), (1000.0, 2000.0)];
        let source_values = [10.0, 20.0];
        let target_bounds = [(500.0, 1500.0)];
        let result = interval_interpolate(&source_bounds, &source_values, &target_bounds);
        // the interval kernel is a weighted sum (used for partial-column sums);
        // averaging (as in rebin) divides by the summed weight separately.
        assert_abs_diff_eq!(result[0], 0.5 * 10.0 + 0.5 * 20.0);
    }

    #[test]
    fn interval_interpolate_no_overlap_is_nan() {
        let source_bounds = [(0.0, 1.0)];
        let source_values = [5.0];
        let target_bounds = [(10.0, 11.0)];
        let result = interval_interpolate(&source_bounds, &source_values, &target_bounds);
        assert!(result[0].is_nan());
    }

    #[test]
    fn cubic_spline_reproduces_data_exactly_at_knots() {
        let xx = [0.0, 1.0, 2.0, 3.0];
        let yy = [0.0, 1.0, 4.0, 9.0];
        for (i, &x) in xx.iter().enumerate() {
            let got = cubic_spline_interpolate(&xx, &yy, x).unwrap();
            assert_abs_diff_eq!(got, yy[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn bicubic_spline_reproduces_grid_values_at_knots() {
        let xx = [0.0, 1.0, 2.0];
        let yy = [0.0, 1.0, 2.0];
        let zz = vec![
            vec![0.0, 1.0, 4.0],
            vec![1.0, 2.0, 5.0],
            vec![4.0, 5.0, 8.0],
        ];
        let got = bicubic_spline_interpolate(&xx, &yy, &zz, 1.0, 1.0).unwrap();
        assert_abs_diff_eq!(got, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn bounds_from_midpoints_linear_interior_and_extrapolated_edges() {
        let midpoints = [1.0, 2.0, 4.0];
        let bounds = bounds_from_midpoints_linear(&midpoints, true);
        assert_abs_diff_eq!(bounds[0].1, 1.5);
        assert_abs_diff_eq!(bounds[1].0, 1.5);
        assert_abs_diff_eq!(bounds[1].1, 3.0);
        assert_abs_diff_eq!(bounds[2].0, 3.0);
        // extrapolated lower edge: 0.5*(3*1.0 - 2.0) = 0.5
        assert_abs_diff_eq!(bounds[0].0, 0.5);
    }

    #[test]
    fn bounds_from_midpoints_single_value_collapses_to_point() {
        let bounds = bounds_from_midpoints_linear(&[5.0], true);
        assert_eq!(bounds, vec![(5.0, 5.0)]);
    }

    #[test]
    fn bounds_from_midpoints_trims_trailing_nan() {
        let midpoints = [1.0, 2.0, f64::NAN];
        let bounds = bounds_from_midpoints_linear(&midpoints, true);
        assert!(bounds[2].0.is_nan() && bounds[2].1.is_nan());
        assert_abs_diff_eq!(bounds[0].1, 1.5);
    }
}

