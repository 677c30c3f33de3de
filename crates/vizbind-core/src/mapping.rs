#![forbid(unsafe_code)]

//! Scalar and constant mappings.
//!
//! # Equality
//!
//! A [`ScalarMapping`] is identified by its `(quantity, axis)` pair alone.
//! Two mappings that bind the same quantity to the same axis are equal even
//! if their ranges differ; this is what lets independent displayables share
//! one live binding, since the display can bind only one control per axis.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use crate::adapter::DatumRef;
use crate::axis::{DisplayAxis, Quantity};

/// Closed data interval of a scalar mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

impl Range {
    #[must_use]
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Width of the interval; negative for inverted ranges.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    #[must_use]
    pub fn contains(&self, v: f64) -> bool {
        let (lo, hi) = if self.low <= self.high {
            (self.low, self.high)
        } else {
            (self.high, self.low)
        };
        (lo..=hi).contains(&v)
    }
}

/// Binding of a variable quantity to a display axis.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScalarMapping {
    pub quantity: Quantity,
    pub axis: DisplayAxis,
    /// Data range; not part of the mapping's identity.
    pub range: Option<Range>,
}

impl ScalarMapping {
    pub fn new(quantity: impl Into<Quantity>, axis: DisplayAxis) -> Self {
        Self {
            quantity: quantity.into(),
            axis,
            range: None,
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    /// Structural identity of this mapping.
    #[must_use]
    pub fn key(&self) -> (&Quantity, &DisplayAxis) {
        (&self.quantity, &self.axis)
    }

    /// Equal key and equal range.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self == other && self.range == other.range
    }
}

impl PartialEq for ScalarMapping {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScalarMapping {}

impl PartialOrd for ScalarMapping {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScalarMapping {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for ScalarMapping {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Binding of a fixed value to a display axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstantMapping {
    pub axis: DisplayAxis,
    pub value: f64,
}

impl ConstantMapping {
    pub fn new(axis: DisplayAxis, value: f64) -> Self {
        Self { axis, value }
    }
}

/// Ordered set of scalar mappings, keyed structurally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalarMapSet {
    maps: BTreeSet<ScalarMapping>,
}

impl ScalarMapSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping; an equal mapping already present is replaced so
    /// its range follows the latest insert. Returns `true` if the key was new.
    pub fn insert(&mut self, mapping: ScalarMapping) -> bool {
        self.maps.replace(mapping).is_none()
    }

    pub fn remove(&mut self, mapping: &ScalarMapping) -> bool {
        self.maps.remove(mapping)
    }

    #[must_use]
    pub fn contains(&self, mapping: &ScalarMapping) -> bool {
        self.maps.contains(mapping)
    }

    /// Merge every mapping of `other` into this set.
    pub fn merge(&mut self, other: &ScalarMapSet) {
        for mapping in &other.maps {
            self.maps.replace(mapping.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScalarMapping> {
        self.maps.iter()
    }
}

impl FromIterator<ScalarMapping> for ScalarMapSet {
    fn from_iter<I: IntoIterator<Item = ScalarMapping>>(iter: I) -> Self {
        let mut set = Self::new();
        for mapping in iter {
            set.insert(mapping);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ScalarMapSet {
    type Item = &'a ScalarMapping;
    type IntoIter = std::collections::btree_set::Iter<'a, ScalarMapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.maps.iter()
    }
}

/// Everything a displayable can contribute to a display.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Scalar(ScalarMapping),
    Constant(ConstantMapping),
    Data(DatumRef),
}

impl Binding {
    /// Axis touched by this binding, if any.
    #[must_use]
    pub fn axis(&self) -> Option<&DisplayAxis> {
        match self {
            Self::Scalar(m) => Some(&m.axis),
            Self::Constant(m) => Some(&m.axis),
            Self::Data(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn temp_color() -> ScalarMapping {
        ScalarMapping::new("Temperature", DisplayAxis::Rgb)
    }

    #[test]
    fn equality_ignores_range() {
        let a = temp_color();
        let b = temp_color().with_range(Range::new(250.0, 310.0));
        assert_eq!(a, b);
        assert!(!a.same_as(&b));
    }

    #[test]
    fn equality_requires_quantity_and_axis() {
        let a = temp_color();
        assert_ne!(a, ScalarMapping::new("Temperature", DisplayAxis::Z));
        assert_ne!(a, ScalarMapping::new("Pressure", DisplayAxis::Rgb));
    }

    #[test]
    fn hash_agrees_with_eq() {
        let mut set = HashSet::new();
        set.insert(temp_color());
        assert!(!set.insert(temp_color().with_range(Range::new(0.0, 1.0))));
    }

    #[test]
    fn set_insert_replaces_range() {
        let mut set = ScalarMapSet::new();
        assert!(set.insert(temp_color()));
        assert!(!set.insert(temp_color().with_range(Range::new(1.0, 2.0))));
        assert_eq!(set.len(), 1);
        let stored = set.iter().next().map(|m| m.range);
        assert_eq!(stored, Some(Some(Range::new(1.0, 2.0))));
    }

    #[test]
    fn set_merge_is_union() {
        let a: ScalarMapSet = [temp_color()].into_iter().collect();
        let b: ScalarMapSet = [
            temp_color(),
            ScalarMapping::new("Altitude", DisplayAxis::Z),
        ]
        .into_iter()
        .collect();
        let mut merged = a.clone();
        merged.merge(&b);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&ScalarMapping::new("Altitude", DisplayAxis::Z)));
    }

    #[test]
    fn range_contains_handles_inversion() {
        let r = Range::new(10.0, 0.0);
        assert!(r.contains(5.0));
        assert!(!r.contains(11.0));
        assert!(r.span() < 0.0);
    }

    #[test]
    fn binding_axis() {
        assert_eq!(
            Binding::Constant(ConstantMapping::new(DisplayAxis::Z, 2.0)).axis(),
            Some(&DisplayAxis::Z)
        );
    }
}
