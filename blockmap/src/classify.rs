//! Which tagged line features act as barriers, and how important each kind is. The rules live in
//! a weighted lookup table instead of code, so callers can swap in their own.

use crate::osm::{Tags, TILE_EDGE_KEY, TILE_EDGE_VALUE};

/// A weighted `(key, value)` table, with `"*"` as a catch-all value per key. The first matching
/// tag in the feature's iteration order wins.
pub struct BarrierClassifier {
    // (key, value or "*", weight)
    table: Vec<(String, String, f64)>,
}

impl BarrierClassifier {
    pub fn new(table: Vec<(String, String, f64)>) -> BarrierClassifier {
        BarrierClassifier { table }
    }

    /// Covers the common dividers between urban cells: roads, rails, water. Heavier weight means
    /// a stronger divider.
    pub fn default_barriers() -> BarrierClassifier {
        let mut table = Vec::new();
        for (key, value, weight) in [
            ("highway", "motorway", 10.0),
            ("highway", "trunk", 9.0),
            ("highway", "primary", 8.0),
            ("highway", "secondary", 7.0),
            ("highway", "tertiary", 6.0),
            ("highway", "residential", 4.0),
            ("highway", "unclassified", 3.0),
            ("highway", "*", 2.0),
            ("railway", "rail", 9.0),
            ("railway", "*", 5.0),
            ("waterway", "river", 8.0),
            ("waterway", "canal", 7.0),
            ("waterway", "*", 4.0),
            (TILE_EDGE_KEY, TILE_EDGE_VALUE, 10.0),
        ] {
            table.push((key.to_string(), value.to_string(), weight));
        }
        BarrierClassifier::new(table)
    }

    pub fn is_barrier(&self, tags: &Tags) -> bool {
        self.classify(tags).is_some()
    }

    /// The matched `(key, value)` rule's key, or None when nothing matches.
    pub fn classify<'a>(&'a self, tags: &Tags) -> Option<&'a str> {
        self.lookup(tags).map(|(key, _)| key)
    }

    pub fn weight(&self, tags: &Tags) -> Option<f64> {
        self.lookup(tags).map(|(_, weight)| weight)
    }

    fn lookup<'a>(&'a self, tags: &Tags) -> Option<(&'a str, f64)> {
        for (tag_key, tag_value) in tags {
            for (key, value, weight) in &self.table {
                if key == tag_key && (value == "*" || value == tag_value) {
                    return Some((key, *weight));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn exact_match_beats_wildcard() {
        let c = BarrierClassifier::default_barriers();
        assert_eq!(Some(10.0), c.weight(&tags(&[("highway", "motorway")])));
        assert_eq!(Some(2.0), c.weight(&tags(&[("highway", "footpath")])));
    }

    #[test]
    fn non_barriers_rejected() {
        let c = BarrierClassifier::default_barriers();
        assert!(!c.is_barrier(&tags(&[("building", "yes")])));
        assert!(c.is_barrier(&tags(&[("name", "x"), ("waterway", "stream")])));
        assert!(c.is_barrier(&tags(&[("_tile_edge", "yes")])));
    }
}
