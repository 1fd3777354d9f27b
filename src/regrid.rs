//! Regridding (§4.E): interval rebinning, point regridding, and dimension
//! clamping.
//!
//! All three operations share the same shape: classify every variable
//! against the dimension being regridded, drop `remove`-kind variables,
//! expand the dimension to accommodate both grids, aggregate or interpolate
//! each surviving variable treated as a `[G, L_src, E]` array (the same
//! `G x L x B` decomposition [`crate::variable::Variable`]'s dimension
//! operations use), then shrink back down. Grounded on
//! `original_source/libharp/harp-rebin.c` (rebin) and
//! `original_source/libharp/harp-regrid.c` (point regrid, clamp), following
//! the [`crate::binning`] module's style of building a classifier enum plus
//! an `IndexMap` working set rather than threading the C implementation's
//! in-place array surgery through Rust (see DESIGN.md).
//!
//! Variable derivation (the C library's `harp_product_get_derived_variable`,
//! which can synthesize a requested quantity/unit from an unrelated one
//! already present) is out of scope here; source grids/bounds are looked up
//! by the target's exact variable name, with only a unit conversion applied
//! if the units differ (see DESIGN.md).

use indexmap::IndexMap;

use crate::config::{HarpContext, OutOfBoundsPolicy};
use crate::dimension::DimensionType;
use crate::error::{HarpErrorKind, HarpResult};
use crate::interpolation::{
    bounds_from_midpoints_linear, bounds_from_midpoints_loglinear, cubic_spline_interpolate, interpolate_linear,
    interpolate_loglinear, interpolate_logloglinear, interval_interpolate,
};
use crate::product::Product;
use crate::scalar::DataType;
use crate::units::UnitSystem;
use crate::variable::{Variable, VariableData};

fn is_pressure_axis(grid_name: &str, dimension_type: DimensionType) -> bool {
    dimension_type == DimensionType::Vertical && grid_name == "pressure"
}

fn strides_for(var: &Variable, dimension_type: DimensionType) -> HarpResult<(usize, usize, usize)> {
    let axis = var
        .dimension_type
        .iter()
        .position(|t| *t == dimension_type)
        .ok_or_else(|| {
            error_stack::Report::new(HarpErrorKind::invalid_argument(format!(
                "variable '{}' has no '{dimension_type}' dimension",
                var.name
            )))
        })?;
    let groups: usize = var.dimension[..axis].iter().product();
    let block: usize = var.dimension[axis + 1..].iter().product();
    Ok((groups, var.dimension[axis], block))
}

// ---------------------------------------------------------------------
// §4.E.1 Rebin (interval -> interval)
// ---------------------------------------------------------------------

/// Per-variable classification for rebinning (§4.E.1), a restricted form of
/// [`crate::binning::BinningKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebinKind {
    Skip,
    Remove,
    Weight,
    Angle,
    Sum,
    Average,
}

/// Classify `var` for rebinning along `dimension_type` (§4.E.1 "Per-variable
/// classifier").
pub fn classify_rebin_variable(var: &Variable, dimension_type: DimensionType) -> RebinKind {
    let matches = var.dimension_type.iter().filter(|t| **t == dimension_type).count();
    if matches == 0 {
        return RebinKind::Skip;
    }
    if matches > 1 {
        return RebinKind::Remove;
    }
    if var.name.ends_with("_bounds") {
        return RebinKind::Remove;
    }
    if var.name.ends_with("count") {
        return RebinKind::Remove;
    }
    if var.name.ends_with("weight") {
        return RebinKind::Weight;
    }
    if var.data_type() == DataType::String {
        return RebinKind::Remove;
    }
    if var.enum_values.is_some() {
        return RebinKind::Remove;
    }
    if var.unit.is_none() {
        return RebinKind::Remove;
    }
    if var.name.ends_with("_avk") {
        // 1-D column AVKs are rebinnable as a partial-column sum; any other
        // AVK (one with more than just the rebinned dimension) cannot be.
        if var.name.contains("_column_") && var.dimension.len() == 1 {
            return RebinKind::Sum;
        }
        return RebinKind::Remove;
    }
    if var.name.contains("latitude") || var.name.contains("longitude") || var.name.contains("angle") || var.name.contains("direction")
    {
        return RebinKind::Angle;
    }
    if var.name.contains("_column_")
        && (var.name.ends_with("_density") || var.name.ends_with("_apriori") || var.name.ends_with("_dfs"))
    {
        return RebinKind::Sum;
    }
    RebinKind::Average
}

struct Overlap {
    source_index: usize,
    weight: f64,
}

/// Overlap table between `target` and `source` interval lists (§4.E.1
/// "Overlap table"), grounded on `find_matching_intervals_for_bounds`.
fn overlap_table(target: &[(f64, f64)], source: &[(f64, f64)]) -> Vec<Vec<Overlap>> {
    target
        .iter()
        .map(|&(b0, b1)| {
            let (xminb, xmaxb) = if b0 < b1 { (b0, b1) } else { (b1, b0) };
            source
                .iter()
                .enumerate()
                .filter_map(|(k, &(a0, a1))| {
                    let (xmina, xmaxa) = if a0 < a1 { (a0, a1) } else { (a1, a0) };
                    if xmina >= xmaxb || xminb >= xmaxa {
                        return None;
                    }
                    let xminc = xmina.max(xminb);
                    let xmaxc = xmaxa.min(xmaxb);
                    Some(Overlap { source_index: k, weight: (xmaxc - xminc) / (xmaxa - xmina) })
                })
                .collect()
        })
        .collect()
}

fn bounds_pairs(data: &[f64], offset: usize, len: usize) -> Vec<(f64, f64)> {
    (0..len).map(|j| (data[offset + 2 * j], data[offset + 2 * j + 1])).collect()
}

/// Aggregate one `[G, L_src, E]` slice of raw values into `[G, L_tgt, E]`
/// (§4.E.1 "Aggregation"). `weight` carries any existing weight-variable
/// multiplier (1.0 everywhere if none). `normalize=false` produces the
/// `sum` kind (weighted sum only); `normalize=true` produces `average`
/// (divide by the summed weight, NaN if that sum is zero).
fn aggregate_interval(
    values: &[f64],
    weight: &[f64],
    groups: usize,
    l_src: usize,
    block: usize,
    overlaps: &[Vec<Vec<Overlap>>],
    num_time: usize,
    l_tgt: usize,
    normalize: bool,
) -> Vec<f64> {
    let mut out = vec![0.0f64; groups * l_tgt * block];
    let blocks_per_time = groups / num_time.max(1);
    for g in 0..groups {
        let t = if num_time > 1 { g / blocks_per_time.max(1) } else { 0 };
        for e in 0..block {
            for j in 0..l_tgt {
                let mut valuesum = 0.0;
                let mut weightsum = 0.0;
                for entry in &overlaps[t][j] {
                    let idx = (g * l_src + entry.source_index) * block + e;
                    let v = values[idx];
                    if v.is_nan() {
                        continue;
                    }
                    let w = entry.weight * weight[idx];
                    valuesum += w * v;
                    weightsum += w;
                }
                let out_idx = (g * l_tgt + j) * block + e;
                out[out_idx] = if weightsum == 0.0 {
                    f64::NAN
                } else if normalize {
                    valuesum / weightsum
                } else {
                    valuesum
                };
            }
        }
    }
    out
}

fn angle_unit_vectors(theta: &[f64], weight: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut x = vec![0.0; theta.len()];
    let mut y = vec![0.0; theta.len()];
    for i in 0..theta.len() {
        let w = if theta[i].is_nan() || weight[i] == 0.0 { 0.0 } else { weight[i] };
        x[i] = w * theta[i].cos();
        y[i] = w * theta[i].sin();
    }
    (x, y)
}

/// Rebin every aggregatable variable in `product` onto `target_bounds`
/// (§4.E.1). `target_bounds` must be a `[D,2]` or `[time,D,2]` `float64`
/// variable whose name ends in `_bounds`; its second-to-last dimension type
/// selects the axis. The matching source bounds (same variable name) must
/// already be present in `product`.
pub fn rebin(product: &Product, target_bounds: &Variable, ctx: &HarpContext, units: &dyn UnitSystem) -> HarpResult<Product> {
    let invalid = |msg: String| error_stack::Report::new(HarpErrorKind::invalid_argument(msg));

    if !target_bounds.name.ends_with("_bounds") {
        return Err(invalid("axis variable is not a boundaries variable".to_string()));
    }
    if target_bounds.data_type() != DataType::Float64 {
        return Err(invalid("invalid data type for axis bounds variable".to_string()));
    }
    let nd = target_bounds.num_dimensions();
    if nd != 2 && nd != 3 {
        return Err(invalid("invalid dimensions for axis bounds variable".to_string()));
    }
    let dimension_type = target_bounds.dimension_type[nd - 2];
    if dimension_type == DimensionType::Independent {
        return Err(invalid("invalid dimensions for axis variable".to_string()));
    }
    if target_bounds.dimension_type[nd - 1] != DimensionType::Independent || target_bounds.dimension[nd - 1] != 2 {
        return Err(invalid("invalid independent dimension for axis bounds variable".to_string()));
    }
    if nd == 3 {
        if target_bounds.dimension_type[0] != DimensionType::Time {
            return Err(invalid("invalid dimensions for axis bounds variable".to_string()));
        }
        if target_bounds.dimension[0] != product.dimension_length(DimensionType::Time) {
            return Err(invalid("time dimension of axis bounds variable does not match product".to_string()));
        }
    }

    let source_bounds_var = product
        .get(&target_bounds.name)
        .ok_or_else(|| error_stack::Report::new(HarpErrorKind::variable_not_found(&target_bounds.name)))?;
    let source_nd = source_bounds_var.num_dimensions();
    if source_bounds_var.dimension_type[source_nd - 2] != dimension_type {
        return Err(invalid(format!(
            "source bounds variable '{}' does not use the '{dimension_type}' dimension",
            target_bounds.name
        )));
    }

    let grid_name = target_bounds.name.trim_end_matches("_bounds").to_string();
    let pressure = is_pressure_axis(&grid_name, dimension_type);

    let time_dependent = nd == 3 || source_nd == 3;
    let num_time = if time_dependent { product.dimension_length(DimensionType::Time).max(1) } else { 1 };
    let target_len = target_bounds.dimension[nd - 2];
    let source_len = source_bounds_var.dimension[source_nd - 2];

    let mut target_data = target_bounds.data.to_f64_vec()?;
    let mut source_data = source_bounds_var.data.to_f64_vec()?;
    if pressure {
        for v in target_data.iter_mut() {
            *v = v.ln();
        }
        for v in source_data.iter_mut() {
            *v = v.ln();
        }
    }

    let overlaps: Vec<Vec<Vec<Overlap>>> = (0..num_time)
        .map(|t| {
            let target_offset = if nd == 3 { t * target_len * 2 } else { 0 };
            let source_offset = if source_nd == 3 { t * source_len * 2 } else { 0 };
            let target_pairs = bounds_pairs(&target_data, target_offset, target_len);
            let source_pairs = bounds_pairs(&source_data, source_offset, source_len);
            overlap_table(&target_pairs, &source_pairs)
        })
        .collect();

    let mut kinds: IndexMap<String, RebinKind> =
        product.variables().map(|v| (v.name.clone(), classify_rebin_variable(v, dimension_type))).collect();
    kinds.insert(target_bounds.name.clone(), RebinKind::Skip);
    if let Some(k) = kinds.get_mut(&grid_name) {
        *k = RebinKind::Skip;
    }

    let mut working: IndexMap<String, Variable> = IndexMap::new();
    for var in product.variables() {
        if kinds.get(&var.name).copied() != Some(RebinKind::Remove) && var.name != target_bounds.name {
            working.insert(var.name.clone(), var.deep_copy());
        } else if var.name != target_bounds.name {
            crate::logging::warn(&format!("dropping variable '{}' from rebinned product (not rebinnable)", var.name));
        }
    }

    // ensure every angle variable has a weight companion, as in binning.
    let angle_names: Vec<String> =
        working.keys().filter(|n| kinds.get(*n).copied() == Some(RebinKind::Angle)).cloned().collect();
    for name in &angle_names {
        let weight_name = format!("{name}_weight");
        if !working.contains_key(&weight_name) {
            let var = &working[name];
            let mut w = Variable::new(weight_name.clone(), DataType::Float64, var.dimension_type.clone(), var.dimension.clone())?;
            w.data = VariableData::Float64(vec![1.0; var.num_elements()]);
            kinds.insert(weight_name.clone(), RebinKind::Weight);
            working.insert(weight_name, w);
        }
    }

    // convert to double and resize the T dimension to the expanded length
    // before aggregation (§4.E.1 "Resizing ... expands to max(source_L, target_L)").
    let expand_len = source_len.max(target_len);
    for (name, var) in working.iter_mut() {
        if kinds.get(name).copied() == Some(RebinKind::Skip) {
            continue;
        }
        if kinds.get(name).copied() != Some(RebinKind::Weight) {
            var.convert_data_type(DataType::Float64)?;
        }
        if let Some(axis) = var.dimension_type.iter().position(|t| *t == dimension_type) {
            var.resize_dimension(axis, expand_len)?;
        }
    }

    let mut results: IndexMap<String, (Vec<usize>, Vec<DimensionType>, Vec<f64>, Option<String>)> = IndexMap::new();

    for name in working.keys().cloned().collect::<Vec<_>>() {
        let kind = kinds[&name];
        if !matches!(kind, RebinKind::Angle | RebinKind::Sum | RebinKind::Average) {
            continue;
        }
        let var = &working[&name];
        let (groups, l_src, block) = strides_for(var, dimension_type)?;
        let values = match &var.data {
            VariableData::Float64(v) => v.clone(),
            _ => unreachable!("converted to float64 above"),
        };

        let weight_values = {
            let weight_name = format!("{name}_weight");
            if kind != RebinKind::Angle {
                if let Some(w) = working.get(&weight_name).or_else(|| working.get("weight")) {
                    w.data.to_f64_vec()?
                } else {
                    vec![1.0; values.len()]
                }
            } else {
                vec![1.0; values.len()]
            }
        };

        let mut dims = var.dimension.clone();
        let axis = var.dimension_type.iter().position(|t| *t == dimension_type).unwrap();
        dims[axis] = target_len;

        if kind == RebinKind::Angle {
            let weight_name = format!("{name}_weight");
            let weight = working[&weight_name].data.to_f64_vec()?;
            let (x, y) = angle_unit_vectors(&values, &weight);
            let x_sum = aggregate_interval(&x, &vec![1.0; x.len()], groups, l_src, block, &overlaps, num_time, target_len, false);
            let y_sum = aggregate_interval(&y, &vec![1.0; y.len()], groups, l_src, block, &overlaps, num_time, target_len, false);
            let n = x_sum.len();
            let mut angle_out = vec![0.0; n];
            let mut weight_out = vec![0.0; n];
            for i in 0..n {
                let magnitude = (x_sum[i] * x_sum[i] + y_sum[i] * y_sum[i]).sqrt();
                weight_out[i] = magnitude;
                angle_out[i] = if magnitude == 0.0 { f64::NAN } else { y_sum[i].atan2(x_sum[i]) };
            }
            results.insert(name.clone(), (dims.clone(), var.dimension_type.clone(), angle_out, var.unit.clone()));
            results.insert(weight_name, (dims, var.dimension_type.clone(), weight_out, None));
        } else {
            let normalize = kind == RebinKind::Average;
            let out = aggregate_interval(&values, &weight_values, groups, l_src, block, &overlaps, num_time, target_len, normalize);
            results.insert(name, (dims, var.dimension_type.clone(), out, var.unit.clone()));
        }
    }

    for (name, (dims, dim_type, data, unit)) in results {
        let var = working.get_mut(&name).unwrap();
        var.dimension = dims;
        var.dimension_type = dim_type;
        var.data = VariableData::Float64(data);
        var.unit = unit;
    }

    // second pass: weight-kind companions rebin the same way, normalized.
    for name in working.keys().cloned().collect::<Vec<_>>() {
        if kinds.get(&name).copied() != Some(RebinKind::Weight) {
            continue;
        }
        let var = &working[&name];
        let (groups, l_src, block) = strides_for(var, dimension_type)?;
        let values = var.data.to_f64_vec()?;
        let out = aggregate_interval(&values, &vec![1.0; values.len()], groups, l_src, block, &overlaps, num_time, target_len, true);
        let var = working.get_mut(&name).unwrap();
        let axis = var.dimension_type.iter().position(|t| *t == dimension_type).unwrap();
        var.dimension[axis] = target_len;
        var.data = VariableData::Float64(out);
    }

    let mut out = Product::new();
    out.source_product = product.source_product.clone();
    out.history = product.history.clone();
    for (_, var) in working.into_iter() {
        out.add_variable(var)?;
    }
    out.add_variable(target_bounds.deep_copy())?;
    if let Some(grid_var) = product.get(&grid_name) {
        let mut grid_var = grid_var.deep_copy();
        recompute_grid_from_bounds(&mut grid_var, target_bounds, pressure)?;
        if out.contains(&grid_name) {
            out.remove_variable(&grid_name)?;
        }
        out.add_variable(grid_var)?;
    }
    let _ = ctx;
    let _ = units;
    Ok(out)
}

fn recompute_grid_from_bounds(grid_var: &mut Variable, bounds: &Variable, pressure: bool) -> HarpResult<()> {
    let bounds_data = bounds.data.to_f64_vec()?;
    let n = grid_var.num_elements();
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        let (b0, b1) = (bounds_data[2 * i], bounds_data[2 * i + 1]);
        values.push(if pressure { ((b0.ln() + b1.ln()) / 2.0).exp() } else { 0.5 * (b0 + b1) });
    }
    grid_var.dimension = bounds.dimension[..bounds.num_dimensions() - 1].to_vec();
    grid_var.dimension_type = bounds.dimension_type[..bounds.num_dimensions() - 1].to_vec();
    grid_var.convert_data_type(DataType::Float64)?;
    grid_var.data = VariableData::Float64(values);
    Ok(())
}

// ---------------------------------------------------------------------
// §4.E.2 Regrid (point -> point)
// ---------------------------------------------------------------------

/// Per-variable classification for point regridding (§4.E.2). `Linear`
/// becomes a log-linear-axis interpolation wherever the pressure special
/// case applies (§4.E.2 "Pressure special case") -- that substitution is
/// based on the axis, not the variable, so it is applied at aggregation
/// time rather than being a distinct classifier outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegridKind {
    Skip,
    Remove,
    Linear,
    LogLog,
    Interval,
}

/// Classify `var` for point regridding along `dimension_type` (§4.E.2
/// "Per-variable classifier").
pub fn classify_regrid_variable(var: &Variable, dimension_type: DimensionType) -> RegridKind {
    if dimension_type == DimensionType::Time {
        if var.name == "datetime_start" || var.name == "datetime_stop" || var.name == "datetime_length" {
            return if var.name == "datetime_length" { RegridKind::Interval } else { RegridKind::Remove };
        }
    }
    let matches = var.dimension_type.iter().filter(|t| **t == dimension_type).count();
    if matches == 0 {
        return RegridKind::Skip;
    }
    if var.data_type() == DataType::String {
        return RegridKind::Remove;
    }
    if var.unit.is_none() {
        return RegridKind::Remove;
    }
    if matches != 1 {
        return RegridKind::Remove;
    }
    if var.enum_values.is_some() {
        return RegridKind::Remove;
    }
    if var.name.contains("_uncertainty") {
        return RegridKind::Remove;
    }
    if var.name.contains("_bounds") {
        return RegridKind::Remove;
    }
    if dimension_type == DimensionType::Vertical && (var.name.ends_with("_avk") || var.name.contains("_column_")) {
        return RegridKind::Interval;
    }
    if dimension_type == DimensionType::Spectral
        && (var.name.contains("aerosol_optical_depth") || var.name.contains("aerosol_extinction_coefficient"))
    {
        return RegridKind::LogLog;
    }
    RegridKind::Linear
}

fn effective_length(values: &[f64]) -> usize {
    let mut n = values.len();
    while n > 0 && values[n - 1].is_nan() {
        n -= 1;
    }
    n.max(values.len().min(1))
}

/// Point-regrid every interpolatable variable in `product` onto
/// `target_grid` (§4.E.2). `target_grid` is `[D]` (time-independent) or
/// `[time, D]` (time-dependent), `float64`; `target_bounds`, if supplied, is
/// used by the `interval` kernel, otherwise bounds are derived from
/// `target_grid`'s midpoints via [`bounds_from_midpoints_linear`]/
/// [`bounds_from_midpoints_loglinear`].
pub fn regrid(
    product: &Product,
    target_grid: &Variable,
    target_bounds: Option<&Variable>,
    ctx: &HarpContext,
    _units: &dyn UnitSystem,
) -> HarpResult<Product> {
    let invalid = |msg: String| error_stack::Report::new(HarpErrorKind::invalid_argument(msg));

    let nd = target_grid.num_dimensions();
    if nd != 1 && nd != 2 {
        return Err(invalid("invalid dimensions for axis variable".to_string()));
    }
    let dimension_type = *target_grid.dimension_type.last().unwrap();
    if dimension_type == DimensionType::Independent {
        return Err(invalid("cannot regrid an independent dimension".to_string()));
    }
    if nd == 2 && target_grid.dimension_type[0] != DimensionType::Time {
        return Err(invalid("invalid dimensions for axis variable".to_string()));
    }

    let source_grid_var = product
        .get(&target_grid.name)
        .ok_or_else(|| error_stack::Report::new(HarpErrorKind::variable_not_found(&target_grid.name)))?;

    let grid_name = target_grid.name.clone();
    let pressure = is_pressure_axis(&grid_name, dimension_type);

    let time_dependent = nd == 2 || source_grid_var.num_dimensions() == 2;
    let num_time = if time_dependent { product.dimension_length(DimensionType::Time).max(1) } else { 1 };
    let target_len = *target_grid.dimension.last().unwrap();
    let source_len = *source_grid_var.dimension.last().unwrap();

    let target_grid_raw = target_grid.data.to_f64_vec()?;
    let source_grid_raw = source_grid_var.data.to_f64_vec()?;

    let target_bounds_raw: Vec<f64> = match target_bounds {
        Some(tb) => tb.data.to_f64_vec()?,
        None => {
            let mut all = Vec::with_capacity(num_time * target_len * 2);
            for t in 0..num_time {
                let off = if nd == 2 { t * target_len } else { 0 };
                let mids = &target_grid_raw[off..off + target_len];
                let pairs = if pressure { bounds_from_midpoints_loglinear(mids, true) } else { bounds_from_midpoints_linear(mids, true) };
                for (b0, b1) in pairs {
                    all.push(b0);
                    all.push(b1);
                }
            }
            all
        }
    };

    // explicit source bounds for the `interval` kernel (§4.E.2 "interval"),
    // looked up by name rather than ever reinterpreted from the midpoint
    // grid array; absent a stored bounds variable, derive them from the
    // source grid's own midpoints unconditionally.
    let source_bounds_raw: Option<Vec<f64>> =
        product.get(&format!("{grid_name}_bounds")).map(|v| v.data.to_f64_vec()).transpose()?;

    let kinds: IndexMap<String, RegridKind> =
        product.variables().map(|v| (v.name.clone(), classify_regrid_variable(v, dimension_type))).collect();

    let mut working: IndexMap<String, Variable> = IndexMap::new();
    for var in product.variables() {
        if kinds.get(&var.name).copied() != Some(RegridKind::Remove) && var.name != grid_name {
            working.insert(var.name.clone(), var.deep_copy());
        } else if var.name != grid_name {
            crate::logging::warn(&format!("dropping variable '{}' from regridded product (not interpolatable)", var.name));
        }
    }

    let mut out_len: Vec<usize> = vec![target_len; num_time];

    for name in working.keys().cloned().collect::<Vec<_>>() {
        let kind = kinds[&name];
        if matches!(kind, RegridKind::Skip | RegridKind::Remove) {
            continue;
        }
        let var = working.get_mut(&name).unwrap();
        var.convert_data_type(DataType::Float64)?;
        let (groups, l_src, block) = strides_for(var, dimension_type)?;
        let axis = var.dimension_type.iter().position(|t| *t == dimension_type).unwrap();
        let values = match &var.data {
            VariableData::Float64(v) => v.clone(),
            _ => unreachable!(),
        };

        let mut out = vec![f64::NAN; groups * target_len * block];
        let blocks_per_time = (groups / num_time.max(1)).max(1);

        for g in 0..groups {
            let t = if num_time > 1 { g / blocks_per_time } else { 0 };
            let src_off = if nd == 2 || source_grid_var.num_dimensions() == 2 { t * source_len } else { 0 };
            let tgt_off = if nd == 2 { t * target_len } else { 0 };
            let src_grid_eff = effective_length(&source_grid_raw[src_off..src_off + source_len]);
            let tgt_grid_eff = effective_length(&target_grid_raw[tgt_off..tgt_off + target_len]);

            for e in 0..block {
                let slice: Vec<f64> = (0..l_src).map(|k| values[(g * l_src + k) * block + e]).collect();

                match kind {
                    RegridKind::Interval => {
                        let tgt_bounds_off = tgt_off * 2;
                        let src_bounds: Vec<(f64, f64)> = match &source_bounds_raw {
                            Some(raw) => {
                                let src_bounds_off = src_off * 2;
                                (0..src_grid_eff)
                                    .map(|k| (raw[src_bounds_off + 2 * k], raw[src_bounds_off + 2 * k + 1]))
                                    .collect()
                            }
                            None => {
                                let mids = &source_grid_raw[src_off..src_off + src_grid_eff];
                                if pressure { bounds_from_midpoints_loglinear(mids, true) } else { bounds_from_midpoints_linear(mids, true) }
                            }
                        };
                        let tgt_bounds: Vec<(f64, f64)> = (0..tgt_grid_eff)
                            .map(|j| (target_bounds_raw[tgt_bounds_off + 2 * j], target_bounds_raw[tgt_bounds_off + 2 * j + 1]))
                            .collect();
                        let result = interval_interpolate(&src_bounds, &slice[..src_grid_eff], &tgt_bounds);
                        for (j, v) in result.into_iter().enumerate() {
                            out[(g * target_len + j) * block + e] = v;
                        }
                    }
                    RegridKind::Linear | RegridKind::LogLog => {
                        let src_grid_eval = &source_grid_raw[src_off..src_off + src_grid_eff];
                        let mut hint = None;
                        for j in 0..tgt_grid_eff {
                            let x_eval = target_grid_raw[tgt_off + j];
                            // the pressure special case (§4.E.2) substitutes a
                            // log-linear axis for an otherwise-linear variable;
                            // `interpolate_loglinear`/`interpolate_logloglinear`
                            // already apply the `ln` transform to the axis
                            // internally, so the raw grid/target values are
                            // passed through unchanged here.
                            let v = match kind {
                                RegridKind::Linear if pressure => {
                                    interpolate_loglinear(src_grid_eval, &slice[..src_grid_eff], x_eval, ctx.regrid_out_of_bounds, hint)
                                }
                                RegridKind::Linear => {
                                    interpolate_linear(src_grid_eval, &slice[..src_grid_eff], x_eval, ctx.regrid_out_of_bounds, hint)
                                }
                                RegridKind::LogLog => {
                                    interpolate_logloglinear(src_grid_eval, &slice[..src_grid_eff], x_eval, ctx.regrid_out_of_bounds, hint)
                                }
                                _ => unreachable!(),
                            };
                            out[(g * target_len + j) * block + e] = v;
                            hint = Some(crate::interpolation::find_index(src_grid_eval, x_eval, hint).max(0) as usize);
                        }
                    }
                    RegridKind::Skip | RegridKind::Remove => unreachable!(),
                }
            }
        }

        var.dimension[axis] = target_len;
        var.data = VariableData::Float64(out);
        if let Some(max_len) = out_len.get_mut(0) {
            *max_len = (*max_len).max(target_len);
        }
    }

    let mut out = Product::new();
    out.source_product = product.source_product.clone();
    out.history = product.history.clone();
    for (_, var) in working.into_iter() {
        out.add_variable(var)?;
    }
    out.add_variable(target_grid.deep_copy())?;
    if let Some(tb) = target_bounds {
        if !out.contains(&tb.name) {
            out.add_variable(tb.deep_copy())?;
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------
// §4.E.3 Dimension clamping
// ---------------------------------------------------------------------

/// Trim `grid`/`bounds` (a matched axis-grid/axis-bounds pair, both
/// time-independent `[D]`/`[D,2]`) to `[lower_bound, upper_bound]`, then
/// regrid `product` against the clamped target (§4.E.3). Drops intervals
/// entirely outside the range and clips the end intervals that straddle
/// it, recomputing their midpoint (geometric mean for `pressure`).
/// Grounded on `harp_product_clamp_dimension`.
pub fn clamp_dimension(
    product: &Product,
    grid: &Variable,
    bounds: &Variable,
    dimension_type: DimensionType,
    lower_bound: f64,
    upper_bound: f64,
    ctx: &HarpContext,
    units: &dyn UnitSystem,
) -> HarpResult<Product> {
    let (lower_bound, upper_bound) = if lower_bound > upper_bound { (upper_bound, lower_bound) } else { (lower_bound, upper_bound) };
    let pressure = is_pressure_axis(&grid.name, dimension_type);

    let mut grid_values = grid.data.to_f64_vec()?;
    let mut bounds_values = bounds.data.to_f64_vec()?;
    let dim_length = grid.num_elements();

    let mut local_len = effective_length(&grid_values);
    if local_len == 0 {
        return regrid(product, grid, Some(bounds), ctx, units);
    }

    let ascend = bounds_values[(local_len * 2) - 1] >= bounds_values[0];

    // clamp the lower boundary
    let (lo_bound, hi_bound) = if ascend { (lower_bound, upper_bound) } else { (upper_bound, lower_bound) };
    if lo_bound.is_finite() {
        if bounds_values[0] < lo_bound || bounds_values[0].is_nan() {
            let mut index = 0usize;
            while index < local_len && (bounds_values[2 * index + 1] <= lo_bound || bounds_values[2 * index + 1].is_nan()) {
                index += 1;
            }
            if index > 0 {
                local_len -= index;
                for j in 0..local_len {
                    grid_values[j] = grid_values[j + index];
                    bounds_values[2 * j] = bounds_values[2 * (j + index)];
                    bounds_values[2 * j + 1] = bounds_values[2 * (j + index) + 1];
                }
                for j in local_len..dim_length {
                    grid_values[j] = f64::NAN;
                    bounds_values[2 * j] = f64::NAN;
                    bounds_values[2 * j + 1] = f64::NAN;
                }
            }
            if local_len > 0 {
                bounds_values[0] = lo_bound;
                grid_values[0] = midpoint(bounds_values[0], bounds_values[1], pressure);
            }
        }
    }

    if local_len > 0 && hi_bound.is_finite() {
        let last = (bounds_values[2 * local_len - 1], 2 * local_len - 1);
        if last.0 > hi_bound || last.0.is_nan() {
            let mut index = local_len as isize - 1;
            while index >= 0 && (bounds_values[2 * index as usize] >= hi_bound || bounds_values[2 * index as usize].is_nan()) {
                index -= 1;
            }
            for j in (index + 1) as usize..local_len {
                grid_values[j] = f64::NAN;
                bounds_values[2 * j] = f64::NAN;
                bounds_values[2 * j + 1] = f64::NAN;
            }
            local_len = (index + 1) as usize;
            if local_len > 0 {
                bounds_values[2 * (local_len - 1) + 1] = hi_bound;
                grid_values[local_len - 1] = midpoint(bounds_values[2 * (local_len - 1)], bounds_values[2 * (local_len - 1) + 1], pressure);
            }
        }
    }

    let mut clamped_grid = grid.deep_copy();
    let mut clamped_bounds = bounds.deep_copy();
    if local_len < dim_length {
        clamped_grid.resize_dimension(grid.num_dimensions() - 1, local_len.max(1))?;
        clamped_bounds.resize_dimension(clamped_bounds.num_dimensions() - 2, local_len.max(1))?;
    }
    clamped_grid.data = VariableData::Float64(grid_values.into_iter().take(clamped_grid.num_elements()).collect());
    clamped_bounds.data = VariableData::Float64(bounds_values.into_iter().take(clamped_bounds.num_elements()).collect());

    regrid(product, &clamped_grid, Some(&clamped_bounds), ctx, units)
}

fn midpoint(lower: f64, upper: f64, pressure: bool) -> f64 {
    if pressure {
        ((lower.ln() + upper.ln()) / 2.0).exp()
    } else {
        0.5 * (lower + upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarpContext;
    use crate::units::UdunitsLikeSystem;
    use approx::assert_abs_diff_eq;

    fn ctx() -> HarpContext {
        HarpContext::default()
    }

    fn units() -> UdunitsLikeSystem {
        UdunitsLikeSystem::new()
    }

    fn bounds_var(name: &str, dim_type: DimensionType, pairs: &[(f64, f64)]) -> Variable {
        let mut v = Variable::new(
            format!("{name}_bounds"),
            DataType::Float64,
            vec![dim_type, DimensionType::Independent],
            vec![pairs.len(), 2],
        )
        .unwrap();
        let mut data = Vec::with_capacity(pairs.len() * 2);
        for &(a, b) in pairs {
            data.push(a);
            data.push(b);
        }
        v.data = VariableData::Float64(data);
        v
    }

    fn value_var(name: &str, dim_type: DimensionType, unit: &str, values: &[f64]) -> Variable {
        let mut v = Variable::new(name, DataType::Float64, vec![dim_type], vec![values.len()]).unwrap();
        v.data = VariableData::Float64(values.to_vec());
        v.set_unit(Some(unit.to_string()));
        v
    }

    #[test]
    fn rebin_half_overlap_scenario() {
        // source bounds [[0,1000],[1000,2000]], values [10,20]; target bounds [[500,1500]] -> 15.
        let mut product = Product::new();
        product.add_variable(bounds_var("altitude", DimensionType::Vertical, &[(0.0, 1000.0), (1000.0, 2000.0)])).unwrap();
        product.add_variable(value_var("altitude", DimensionType::Vertical, "m", &[500.0, 1500.0])).unwrap();
        product.add_variable(value_var("x", DimensionType::Vertical, "m", &[10.0, 20.0])).unwrap();

        let target_bounds = bounds_var("altitude", DimensionType::Vertical, &[(500.0, 1500.0)]);
        let out = rebin(&product, &target_bounds, &ctx(), &units()).unwrap();

        let x = out.get("x").unwrap();
        match &x.data {
            VariableData::Float64(v) => assert_abs_diff_eq!(v[0], 15.0),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rebin_drops_variables_with_no_unit() {
        let mut product = Product::new();
        product.add_variable(bounds_var("altitude", DimensionType::Vertical, &[(0.0, 1000.0), (1000.0, 2000.0)])).unwrap();
        product.add_variable(value_var("altitude", DimensionType::Vertical, "m", &[500.0, 1500.0])).unwrap();
        let mut flag = Variable::new("flag", DataType::Int32, vec![DimensionType::Vertical], vec![2]).unwrap();
        flag.data = VariableData::Int32(vec![1, 2]);
        product.add_variable(flag).unwrap();

        let target_bounds = bounds_var("altitude", DimensionType::Vertical, &[(500.0, 1500.0)]);
        let out = rebin(&product, &target_bounds, &ctx(), &units()).unwrap();
        assert!(!out.contains("flag"));
    }

    #[test]
    fn regrid_point_linear_scenario() {
        // source grid [0,1,2], values [0,10,40], target [0.5,1.5] -> [5,25].
        let mut product = Product::new();
        product.add_variable(value_var("altitude", DimensionType::Vertical, "m", &[0.0, 1.0, 2.0])).unwrap();
        product.add_variable(value_var("x", DimensionType::Vertical, "m", &[0.0, 10.0, 40.0])).unwrap();

        let target_grid = value_var("altitude", DimensionType::Vertical, "m", &[0.5, 1.5]);
        let out = regrid(&product, &target_grid, None, &ctx(), &units()).unwrap();

        let x = out.get("x").unwrap();
        match &x.data {
            VariableData::Float64(v) => {
                assert_abs_diff_eq!(v[0], 5.0);
                assert_abs_diff_eq!(v[1], 25.0);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn regrid_point_linear_uses_log_linear_on_pressure_axis() {
        // A plain-unit ("Linear"-classified) variable on a "pressure" vertical
        // grid must be interpolated against log(pressure), not pressure
        // itself (§4.E.2 pressure special case). With source grid [100,200]
        // and values [0,10], a target of 141.42 (the geometric mean) should
        // land at 5.0 under log-linear interpolation, not 4.142 under plain
        // linear interpolation.
        let mut product = Product::new();
        product.add_variable(value_var("pressure", DimensionType::Vertical, "hPa", &[100.0, 200.0])).unwrap();
        product.add_variable(value_var("temperature", DimensionType::Vertical, "K", &[0.0, 10.0])).unwrap();

        let target = (100.0_f64 * 200.0).sqrt();
        let target_grid = value_var("pressure", DimensionType::Vertical, "hPa", &[target]);
        let out = regrid(&product, &target_grid, None, &ctx(), &units()).unwrap();

        let t = out.get("temperature").unwrap();
        match &t.data {
            VariableData::Float64(v) => assert_abs_diff_eq!(v[0], 5.0, epsilon = 1e-9),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn clamp_dimension_trims_and_regrids() {
        let mut product = Product::new();
        product.add_variable(bounds_var("altitude", DimensionType::Vertical, &[(0.0, 10.0), (10.0, 20.0), (20.0, 30.0)])).unwrap();
        product.add_variable(value_var("altitude", DimensionType::Vertical, "m", &[5.0, 15.0, 25.0])).unwrap();
        product.add_variable(value_var("x", DimensionType::Vertical, "m", &[1.0, 2.0, 3.0])).unwrap();

        let grid = product.get("altitude").unwrap().deep_copy();
        let bounds = product.get("altitude_bounds").unwrap().deep_copy();
        let out = clamp_dimension(&product, &grid, &bounds, DimensionType::Vertical, 5.0, 25.0, &ctx(), &units()).unwrap();

        let altitude = out.get("altitude").unwrap();
        assert!(altitude.num_elements() <= 3);
    }
}
