//! Dimension mask algebra (§4.C).
//!
//! A [`DimensionMask`] carries at most two dimensions, a flat `bool` array
//! sized to the element count, and a derived `masked_dimension_length`: the
//! maximum count of set bits across the innermost axis among all outer-axis
//! slices (for a 1-D mask this is simply the number of set bits).
//!
//! [`DimensionMask::reduce`] *eliminates* the named axis and returns a 1-D
//! mask over the remaining axis -- the phrasing in §4.C ("result is a 1-D
//! mask of length `dim[d]`") reads naturally only once you treat `d` as the
//! eliminated axis and the surviving axis as the result's domain; this
//! reading is what makes the outer-product law in §8
//! (`outer(R, C).reduce(axis=0) == C`) hold, and is the one implemented
//! here (see DESIGN.md).

use std::collections::HashMap;

use crate::dimension::DimensionType;
use crate::error::{HarpErrorKind, HarpResult};

/// A mask over one or two dimensions (§4.C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionMask {
    pub dimension_type: Vec<DimensionType>,
    pub dimension: Vec<usize>,
    pub mask: Vec<bool>,
    pub masked_dimension_length: usize,
}

impl DimensionMask {
    fn validate_shape(dimension_type: &[DimensionType], dimension: &[usize]) -> HarpResult<()> {
        if dimension_type.len() != dimension.len() {
            return Err(error_stack::Report::new(HarpErrorKind::array_dims_mismatch(
                "dimension_type and dimension must have the same length",
            )));
        }
        if dimension.len() > 2 {
            return Err(error_stack::Report::new(HarpErrorKind::invalid_argument(
                "a dimension mask may carry at most two dimensions",
            )));
        }
        for len in dimension {
            if *len == 0 {
                return Err(error_stack::Report::new(HarpErrorKind::invalid_argument(
                    "a dimension mask's dimensions must be strictly positive",
                )));
            }
        }
        Ok(())
    }

    fn num_elements(dimension: &[usize]) -> usize {
        dimension.iter().product()
    }

    fn with_fill(dimension_type: Vec<DimensionType>, dimension: Vec<usize>, fill: bool) -> HarpResult<DimensionMask> {
        Self::validate_shape(&dimension_type, &dimension)?;
        let n = Self::num_elements(&dimension);
        let mask = vec![fill; n];
        let masked_dimension_length = compute_masked_dimension_length(&dimension, &mask);
        Ok(DimensionMask {
            dimension_type,
            dimension,
            mask,
            masked_dimension_length,
        })
    }

    pub fn new_false(dimension_type: Vec<DimensionType>, dimension: Vec<usize>) -> HarpResult<DimensionMask> {
        Self::with_fill(dimension_type, dimension, false)
    }

    pub fn new_true(dimension_type: Vec<DimensionType>, dimension: Vec<usize>) -> HarpResult<DimensionMask> {
        Self::with_fill(dimension_type, dimension, true)
    }

    pub fn num_dimensions(&self) -> usize {
        self.dimension.len()
    }

    /// O(n) fill, recomputing `masked_dimension_length` (§4.C).
    pub fn fill(&mut self, value: bool) {
        self.mask.iter_mut().for_each(|b| *b = value);
        self.masked_dimension_length = compute_masked_dimension_length(&self.dimension, &self.mask);
    }

    /// True iff every element of the mask is set -- the condition
    /// mask-set simplification uses to drop a mask entirely (§4.C).
    pub fn is_entirely_true(&self) -> bool {
        self.mask.iter().all(|b| *b)
    }

    /// Outer product of two 1-D masks: row `i` of the `[a, b]` result equals
    /// `col` if `row[i]` is set, else all-zero (§4.C).
    pub fn outer(row: &DimensionMask, col: &DimensionMask) -> HarpResult<DimensionMask> {
        if row.num_dimensions() != 1 || col.num_dimensions() != 1 {
            return Err(error_stack::Report::new(HarpErrorKind::invalid_argument(
                "outer product requires two 1-D masks",
            )));
        }
        let a = row.dimension[0];
        let b = col.dimension[0];
        let mut mask = vec![false; a * b];
        for i in 0..a {
            if row.mask[i] {
                mask[i * b..(i + 1) * b].copy_from_slice(&col.mask);
            }
        }
        let dimension_type = vec![row.dimension_type[0], col.dimension_type[0]];
        let dimension = vec![a, b];
        let masked_dimension_length = compute_masked_dimension_length(&dimension, &mask);
        Ok(DimensionMask {
            dimension_type,
            dimension,
            mask,
            masked_dimension_length,
        })
    }

    /// Broadcast a 1-D mask by prepending a new length-`k` outer dimension:
    /// every one of the `k` outer slices is a copy of `self` (§4.C).
    pub fn prepend_dimension(&self, dim_type: DimensionType, k: usize) -> HarpResult<DimensionMask> {
        if self.num_dimensions() != 1 {
            return Err(error_stack::Report::new(HarpErrorKind::invalid_argument(
                "prepend_dimension requires a 1-D mask",
            )));
        }
        let l = self.dimension[0];
        let mut mask = Vec::with_capacity(k * l);
        for _ in 0..k {
            mask.extend_from_slice(&self.mask);
        }
        let dimension_type = vec![dim_type, self.dimension_type[0]];
        let dimension = vec![k, l];
        let masked_dimension_length = compute_masked_dimension_length(&dimension, &mask);
        Ok(DimensionMask {
            dimension_type,
            dimension,
            mask,
            masked_dimension_length,
        })
    }

    /// Broadcast a 1-D mask by appending a new length-`k` inner dimension:
    /// entry `(i, j)` equals `self[i]` for every `j` (§4.C). Equivalent to
    /// `outer(self, all_true(k))`.
    pub fn append_dimension(&self, dim_type: DimensionType, k: usize) -> HarpResult<DimensionMask> {
        if self.num_dimensions() != 1 {
            return Err(error_stack::Report::new(HarpErrorKind::invalid_argument(
                "append_dimension requires a 1-D mask",
            )));
        }
        let all_true = DimensionMask::new_true(vec![dim_type], vec![k])?;
        DimensionMask::outer(self, &all_true)
    }

    /// Eliminate `axis`, returning a 1-D mask over the other axis: entry `i`
    /// is set iff any entry with that index on the surviving axis is set
    /// on the eliminated axis (§4.C; see the module doc for why `axis`
    /// names the axis being collapsed away).
    pub fn reduce(&self, axis: usize) -> HarpResult<DimensionMask> {
        if self.num_dimensions() != 2 {
            return Err(error_stack::Report::new(HarpErrorKind::invalid_argument(
                "reduce requires a 2-D mask",
            )));
        }
        if axis > 1 {
            return Err(error_stack::Report::new(HarpErrorKind::invalid_index(format!(
                "axis {axis} is out of range for a 2-D mask"
            ))));
        }
        let (a, b) = (self.dimension[0], self.dimension[1]);
        let (surviving_len, surviving_type) = if axis == 0 {
            (b, self.dimension_type[1])
        } else {
            (a, self.dimension_type[0])
        };
        let mut mask = vec![false; surviving_len];
        for i in 0..a {
            for j in 0..b {
                if self.mask[i * b + j] {
                    let surviving_index = if axis == 0 { j } else { i };
                    mask[surviving_index] = true;
                }
            }
        }
        let dimension = vec![surviving_len];
        let masked_dimension_length = compute_masked_dimension_length(&dimension, &mask);
        Ok(DimensionMask {
            dimension_type: vec![surviving_type],
            dimension,
            mask,
            masked_dimension_length,
        })
    }

    /// AND-merge `other` into `self`. If shapes match exactly, this is a
    /// plain elementwise AND. If `other` is 1-D and `self` is 2-D, `other`
    /// is broadcast along `axis` of `self` (AND semantics). Recomputes
    /// `masked_dimension_length` afterwards (§4.C).
    pub fn merge(&mut self, other: &DimensionMask, axis: Option<usize>) -> HarpResult<()> {
        if self.dimension == other.dimension {
            for (a, b) in self.mask.iter_mut().zip(other.mask.iter()) {
                *a = *a && *b;
            }
        } else if self.num_dimensions() == 2 && other.num_dimensions() == 1 {
            let axis = axis.ok_or_else(|| {
                error_stack::Report::new(HarpErrorKind::invalid_argument(
                    "merging a 1-D mask into a 2-D mask requires specifying the broadcast axis",
                ))
            })?;
            let (a, b) = (self.dimension[0], self.dimension[1]);
            if axis == 0 {
                if other.dimension[0] != a {
                    return Err(error_stack::Report::new(HarpErrorKind::array_dims_mismatch(
                        "merge axis-0 length mismatch",
                    )));
                }
                for i in 0..a {
                    for j in 0..b {
                        self.mask[i * b + j] = self.mask[i * b + j] && other.mask[i];
                    }
                }
            } else {
                if other.dimension[0] != b {
                    return Err(error_stack::Report::new(HarpErrorKind::array_dims_mismatch(
                        "merge axis-1 length mismatch",
                    )));
                }
                for i in 0..a {
                    for j in 0..b {
                        self.mask[i * b + j] = self.mask[i * b + j] && other.mask[j];
                    }
                }
            }
        } else {
            return Err(error_stack::Report::new(HarpErrorKind::array_dims_mismatch(
                "merge requires either matching shapes or a 1-D mask merged into a 2-D target",
            )));
        }
        self.masked_dimension_length = compute_masked_dimension_length(&self.dimension, &self.mask);
        Ok(())
    }
}

fn compute_masked_dimension_length(dimension: &[usize], mask: &[bool]) -> usize {
    match dimension.len() {
        0 => 0,
        1 => mask.iter().filter(|b| **b).count(),
        2 => {
            let b = dimension[1];
            (0..dimension[0])
                .map(|i| mask[i * b..(i + 1) * b].iter().filter(|x| **x).count())
                .max()
                .unwrap_or(0)
        }
        _ => unreachable!("a dimension mask has at most two dimensions"),
    }
}

/// A mask-set: at most one mask per dimension type, used to carry a
/// consistent selection across several correlated variables (§4.C).
#[derive(Debug, Clone, Default)]
pub struct MaskSet {
    masks: HashMap<DimensionType, DimensionMask>,
}

impl MaskSet {
    pub fn new() -> MaskSet {
        MaskSet { masks: HashMap::new() }
    }

    pub fn set(&mut self, t: DimensionType, mask: DimensionMask) {
        self.masks.insert(t, mask);
    }

    pub fn get(&self, t: DimensionType) -> Option<&DimensionMask> {
        self.masks.get(&t)
    }

    pub fn remove(&mut self, t: DimensionType) -> Option<DimensionMask> {
        self.masks.remove(&t)
    }

    /// Enforce cross-mask consistency (§4.C): any 2-D mask keyed by a
    /// secondary dimension type (with `[time, secondary]` layout) is
    /// reduced down to its time axis (eliminating the secondary axis) and
    /// AND-merged into the primary `time` mask; the resulting primary mask
    /// is then AND-broadcast back into every 2-D mask along its time axis;
    /// finally, any mask that is entirely true is dropped.
    pub fn simplify(&mut self) -> HarpResult<()> {
        let secondary_keys: Vec<DimensionType> = self
            .masks
            .iter()
            .filter(|(t, m)| **t != DimensionType::Time && m.num_dimensions() == 2)
            .map(|(t, _)| *t)
            .collect();

        for key in &secondary_keys {
            let reduced = {
                let m = self.masks.get(key).expect("key came from this map");
                m.reduce(1)?
            };
            if self.masks.contains_key(&DimensionType::Time) {
                let time_mask = self.masks.get_mut(&DimensionType::Time).expect("just checked");
                time_mask.merge(&reduced, None)?;
            } else {
                self.masks.insert(DimensionType::Time, reduced);
            }
        }

        if let Some(time_mask) = self.masks.get(&DimensionType::Time).cloned() {
            for key in &secondary_keys {
                if let Some(m) = self.masks.get_mut(key) {
                    m.merge(&time_mask, Some(0))?;
                }
            }
        }

        self.masks.retain(|_, m| !m.is_entirely_true());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(dim_type: DimensionType, bits: &[bool]) -> DimensionMask {
        let mut m = DimensionMask::new_false(vec![dim_type], vec![bits.len()]).unwrap();
        m.mask.copy_from_slice(bits);
        m.masked_dimension_length = compute_masked_dimension_length(&m.dimension, &m.mask);
        m
    }

    #[test]
    fn outer_product_reduce_axis0_recovers_columns() {
        let row = mask_from(DimensionType::Time, &[true, false, true]);
        let col = mask_from(DimensionType::Vertical, &[true, true, false, true]);
        let product = DimensionMask::outer(&row, &col).unwrap();
        assert_eq!(product.dimension, vec![3, 4]);

        let reduced = product.reduce(0).unwrap();
        assert_eq!(reduced.mask, col.mask);
    }

    #[test]
    fn outer_product_reduce_axis1_recovers_rows() {
        let row = mask_from(DimensionType::Time, &[true, false, true]);
        let col = mask_from(DimensionType::Vertical, &[true, true, false, true]);
        let product = DimensionMask::outer(&row, &col).unwrap();

        let reduced = product.reduce(1).unwrap();
        assert_eq!(reduced.mask, row.mask);
    }

    #[test]
    fn outer_product_with_all_false_row_is_all_zero() {
        let row = mask_from(DimensionType::Time, &[false, false]);
        let col = mask_from(DimensionType::Vertical, &[true, true]);
        let product = DimensionMask::outer(&row, &col).unwrap();
        assert!(product.mask.iter().all(|b| !b));
        assert_eq!(product.masked_dimension_length, 0);
    }

    #[test]
    fn fill_true_updates_masked_dimension_length() {
        let mut m = DimensionMask::new_false(vec![DimensionType::Time], vec![5]).unwrap();
        assert_eq!(m.masked_dimension_length, 0);
        m.fill(true);
        assert_eq!(m.masked_dimension_length, 5);
    }

    #[test]
    fn maskset_simplify_merges_secondary_into_primary_and_drops_all_true() {
        let mut set = MaskSet::new();
        // time mask: all true (will be dropped unless constrained)
        set.set(DimensionType::Time, DimensionMask::new_true(vec![DimensionType::Time], vec![2]).unwrap());
        // vertical mask over [time=2, vertical=3]; time index 1 has no set bits
        let mut vertical = DimensionMask::new_false(vec![DimensionType::Time, DimensionType::Vertical], vec![2, 3]).unwrap();
        vertical.mask = vec![true, false, false, false, false, false];
        vertical.masked_dimension_length = compute_masked_dimension_length(&vertical.dimension, &vertical.mask);
        set.set(DimensionType::Vertical, vertical);

        set.simplify().unwrap();

        let time_mask = set.get(DimensionType::Time).unwrap();
        assert_eq!(time_mask.mask, vec![true, false]);

        let vertical_mask = set.get(DimensionType::Vertical).unwrap();
        // time index 1 is now fully masked out
        assert_eq!(vertical_mask.mask, vec![true, false, false, false, false, false]);
    }
}
