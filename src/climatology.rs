//! Climatology collaborators (§6).
//!
//! Grounded on `original_source/libharp/harp-aux-usstd76.c` (a single fixed
//! 50-point profile per named quantity) and the AFGL-86 description in §6 (a
//! table indexed by datetime and latitude). Real reference data is out of
//! scope for this crate (§1 calls climatology lookups "static reference
//! data" and an external collaborator); these types only define the
//! interface and are gated behind [`crate::config::HarpContext`]'s two
//! enable flags so `Product` operations never consult one implicitly.

use std::collections::HashMap;

/// Number of altitude levels in the US-Standard-76 reference atmosphere, per
/// `harp-aux-usstd76.c`.
pub const USSTD76_NUM_LEVELS: usize = 50;

/// A climatology collaborator: given a profile name and optional
/// spatiotemporal context, return a reference profile.
pub trait ClimatologyProvider {
    /// Returns `None` if `name` is not one of the closed set of profiles this
    /// provider knows about.
    fn profile(&self, name: &str, datetime: Option<f64>, latitude: Option<f64>) -> Option<Vec<f64>>;
}

/// US-Standard-76: a single fixed profile per quantity, independent of
/// datetime and latitude.
pub struct UsStandard76 {
    profiles: HashMap<&'static str, [f64; USSTD76_NUM_LEVELS]>,
}

impl UsStandard76 {
    /// An empty table; real deployments populate profiles for the quantities
    /// they need (e.g. `temperature`, `pressure`) from the reference data
    /// file, which is out of scope here.
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    pub fn with_profile(mut self, name: &'static str, values: [f64; USSTD76_NUM_LEVELS]) -> Self {
        self.profiles.insert(name, values);
        self
    }
}

impl Default for UsStandard76 {
    fn default() -> Self {
        Self::new()
    }
}

impl ClimatologyProvider for UsStandard76 {
    fn profile(&self, name: &str, _datetime: Option<f64>, _latitude: Option<f64>) -> Option<Vec<f64>> {
        self.profiles.get(name).map(|v| v.to_vec())
    }
}

/// AFGL-86: a table indexed by a `(datetime, latitude)` bucket. The bucket
/// boundaries and reference values themselves come from the AFGL-86 report
/// and are not vendored into this crate; `with_bucket` lets a downstream data
/// crate populate them.
pub struct Afgl86 {
    buckets: Vec<(f64, f64, HashMap<&'static str, Vec<f64>>)>,
}

impl Afgl86 {
    pub fn new() -> Self {
        Self { buckets: Vec::new() }
    }

    /// Register a profile for the bucket whose reference `datetime`
    /// (seconds since the HARP epoch) and `latitude` (degrees) are closest to
    /// a query.
    pub fn with_bucket(mut self, datetime: f64, latitude: f64, name: &'static str, values: Vec<f64>) -> Self {
        if let Some(bucket) = self
            .buckets
            .iter_mut()
            .find(|(dt, lat, _)| *dt == datetime && *lat == latitude)
        {
            bucket.2.insert(name, values);
        } else {
            let mut profiles = HashMap::new();
            profiles.insert(name, values);
            self.buckets.push((datetime, latitude, profiles));
        }
        self
    }
}

impl Default for Afgl86 {
    fn default() -> Self {
        Self::new()
    }
}

impl ClimatologyProvider for Afgl86 {
    fn profile(&self, name: &str, datetime: Option<f64>, latitude: Option<f64>) -> Option<Vec<f64>> {
        let (datetime, latitude) = (datetime?, latitude?);
        self.buckets
            .iter()
            .min_by(|(dt_a, lat_a, _), (dt_b, lat_b, _)| {
                let dist_a = (dt_a - datetime).powi(2) + (lat_a - latitude).powi(2);
                let dist_b = (dt_b - datetime).powi(2) + (lat_b - latitude).powi(2);
                dist_a.total_cmp(&dist_b)
            })
            .and_then(|(_, _, profiles)| profiles.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usstd76_returns_none_for_unknown_profile() {
        let provider = UsStandard76::new();
        assert!(provider.profile("ozone", None, None).is_none());
    }

    #[test]
    fn usstd76_returns_registered_profile() {
        let values = [1.0; USSTD76_NUM_LEVELS];
        let provider = UsStandard76::new().with_profile("temperature", values);
        let profile = provider.profile("temperature", None, None).unwrap();
        assert_eq!(profile.len(), USSTD76_NUM_LEVELS);
    }

    #[test]
    fn afgl86_picks_nearest_bucket() {
        let provider = Afgl86::new()
            .with_bucket(0.0, 0.0, "temperature", vec![1.0])
            .with_bucket(0.0, 60.0, "temperature", vec![2.0]);
        let profile = provider.profile("temperature", Some(0.0), Some(50.0)).unwrap();
        assert_eq!(profile, vec![2.0]);
    }
}
