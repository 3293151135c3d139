//! Version constraints as normalized unions of intervals.
//!
//! A [`VersionRange`] is a sorted list of disjoint, non-touching intervals.
//! Every operation returns a range in that normal form, so structural
//! equality is set equality and an empty list is the impossible constraint.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound::{self, Excluded, Included, Unbounded};

use super::Version;

/// A pair of start and end bounds
pub type Interval = (Bound<Version>, Bound<Version>);

/// A set of versions represented as a finite union of intervals
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    segments: Vec<Interval>,
}

fn start_cmp(a: &Bound<Version>, b: &Bound<Version>) -> Ordering {
    match (a, b) {
        (Unbounded, Unbounded) => Ordering::Equal,
        (Unbounded, _) => Ordering::Less,
        (_, Unbounded) => Ordering::Greater,
        (Included(x), Included(y)) | (Excluded(x), Excluded(y)) => x.cmp(y),
        (Included(x), Excluded(y)) => x.cmp(y).then(Ordering::Less),
        (Excluded(x), Included(y)) => x.cmp(y).then(Ordering::Greater),
    }
}

fn end_cmp(a: &Bound<Version>, b: &Bound<Version>) -> Ordering {
    match (a, b) {
        (Unbounded, Unbounded) => Ordering::Equal,
        (Unbounded, _) => Ordering::Greater,
        (_, Unbounded) => Ordering::Less,
        (Included(x), Included(y)) | (Excluded(x), Excluded(y)) => x.cmp(y),
        (Included(x), Excluded(y)) => x.cmp(y).then(Ordering::Greater),
        (Excluded(x), Included(y)) => x.cmp(y).then(Ordering::Less),
    }
}

fn valid_segment(start: &Bound<Version>, end: &Bound<Version>) -> bool {
    match (start, end) {
        (Unbounded, _) | (_, Unbounded) => true,
        (Included(s), Included(e)) => s <= e,
        (Included(s), Excluded(e)) | (Excluded(s), Included(e)) | (Excluded(s), Excluded(e)) => {
            s < e
        },
    }
}

/// No version lies at or below `end` and at or above `start`.
fn ends_before(end: &Bound<Version>, start: &Bound<Version>) -> bool {
    match (end, start) {
        (Unbounded, _) | (_, Unbounded) => false,
        (Included(e), Included(s)) => e < s,
        (Included(e), Excluded(s)) | (Excluded(e), Included(s)) | (Excluded(e), Excluded(s)) => {
            e <= s
        },
    }
}

/// Some version lies strictly between `end` and `start`, so two intervals
/// separated by them cannot be merged.
fn has_gap(end: &Bound<Version>, start: &Bound<Version>) -> bool {
    match (end, start) {
        (Unbounded, _) | (_, Unbounded) => false,
        (Excluded(e), Excluded(s)) => e <= s,
        (Included(e), Included(s)) | (Included(e), Excluded(s)) | (Excluded(e), Included(s)) => {
            e < s
        },
    }
}

fn flip(bound: &Bound<Version>) -> Bound<Version> {
    match bound {
        Unbounded => Unbounded,
        Included(v) => Excluded(v.clone()),
        Excluded(v) => Included(v.clone()),
    }
}

impl VersionRange {
    /// The impossible constraint
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Every version
    pub fn full() -> Self {
        Self {
            segments: vec![(Unbounded, Unbounded)],
        }
    }

    /// Exactly one version
    pub fn singleton(version: Version) -> Self {
        Self {
            segments: vec![(Included(version.clone()), Included(version))],
        }
    }

    /// `>= version`
    pub fn higher_than(version: Version) -> Self {
        Self {
            segments: vec![(Included(version), Unbounded)],
        }
    }

    /// `> version`
    pub fn strictly_higher_than(version: Version) -> Self {
        Self {
            segments: vec![(Excluded(version), Unbounded)],
        }
    }

    /// `<= version`
    pub fn lower_than(version: Version) -> Self {
        Self {
            segments: vec![(Unbounded, Included(version))],
        }
    }

    /// `< version`
    pub fn strictly_lower_than(version: Version) -> Self {
        Self {
            segments: vec![(Unbounded, Excluded(version))],
        }
    }

    /// `>= low, < high`; empty when `low >= high`
    pub fn between(low: Version, high: Version) -> Self {
        Self::from_intervals(vec![(Included(low), Excluded(high))])
    }

    /// Build a range from arbitrary intervals, dropping empty ones and merging
    /// overlapping or touching ones.
    pub fn from_intervals(mut intervals: Vec<Interval>) -> Self {
        intervals.retain(|(s, e)| valid_segment(s, e));
        intervals.sort_by(|a, b| start_cmp(&a.0, &b.0));

        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for (start, end) in intervals {
            if let Some(last) = merged.last_mut() {
                if !has_gap(&last.1, &start) {
                    if end_cmp(&end, &last.1) == Ordering::Greater {
                        last.1 = end;
                    }
                    continue;
                }
            }
            merged.push((start, end));
        }

        Self { segments: merged }
    }

    /// The normalized intervals
    pub fn intervals(&self) -> &[Interval] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_full(&self) -> bool {
        matches!(self.segments.as_slice(), [(Unbounded, Unbounded)])
    }

    /// The single version this range allows, if it allows exactly one
    pub fn as_singleton(&self) -> Option<&Version> {
        match self.segments.as_slice() {
            [(Included(a), Included(b))] if a == b => Some(a),
            _ => None,
        }
    }

    /// Membership test, binary search over the intervals
    pub fn contains(&self, version: &Version) -> bool {
        let idx = self.segments.partition_point(|(_, end)| match end {
            Unbounded => false,
            Included(e) => e < version,
            Excluded(e) => e <= version,
        });

        match self.segments.get(idx) {
            Some((start, _)) => match start {
                Unbounded => true,
                Included(s) => s <= version,
                Excluded(s) => s < version,
            },
            None => false,
        }
    }

    /// Whether the two ranges share at least one version
    pub fn allows_any(&self, other: &VersionRange) -> bool {
        other.segments.iter().any(|(start, end)| {
            let idx = self
                .segments
                .partition_point(|(_, own_end)| ends_before(own_end, start));
            match self.segments.get(idx) {
                Some((own_start, _)) => !ends_before(end, own_start),
                None => false,
            }
        })
    }

    /// Whether every version of `self` is also in `other`
    pub fn subset_of(&self, other: &VersionRange) -> bool {
        self.intersection(other) == *self
    }

    pub fn complement(&self) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        let mut gap_start = Some(Unbounded);

        for (start, end) in &self.segments {
            if let Some(open) = gap_start.take() {
                if !matches!(start, Unbounded) {
                    segments.push((open, flip(start)));
                }
            }
            gap_start = match end {
                Unbounded => None,
                bounded => Some(flip(bounded)),
            };
        }

        if let Some(open) = gap_start {
            segments.push((open, Unbounded));
        }

        Self { segments }
    }

    pub fn intersection(&self, other: &VersionRange) -> Self {
        let mut segments = Vec::new();
        let (mut i, mut j) = (0, 0);

        while let (Some((s1, e1)), Some((s2, e2))) = (self.segments.get(i), other.segments.get(j))
        {
            let start = if start_cmp(s1, s2) == Ordering::Greater {
                s1
            } else {
                s2
            };
            let end_first = end_cmp(e1, e2) == Ordering::Less;
            let end = if end_first { e1 } else { e2 };

            if valid_segment(start, end) {
                segments.push((start.clone(), end.clone()));
            }

            if end_first {
                i += 1;
            } else {
                j += 1;
            }
        }

        Self { segments }
    }

    pub fn union(&self, other: &VersionRange) -> Self {
        Self::from_intervals(
            self.segments
                .iter()
                .chain(other.segments.iter())
                .cloned()
                .collect(),
        )
    }

    /// Versions in `self` but not in `other`
    pub fn difference(&self, other: &VersionRange) -> Self {
        self.intersection(&other.complement())
    }

    /// Whether any finite bound carries a pre-release qualifier
    pub fn has_prerelease_bound(&self) -> bool {
        self.segments.iter().any(|(start, end)| {
            [start, end].iter().any(|bound| match bound {
                Included(v) | Excluded(v) => v.is_prerelease() && !is_series_floor(v),
                Unbounded => false,
            })
        })
    }
}

/// The lowest pre-release of a release (`2.0.0-0`), used as the exclusive
/// upper bound of a release series so that `<2.0.0` also rejects `2.0.0-rc.1`.
pub fn series_floor(release: Version) -> Version {
    release.release().with_prerelease("0")
}

fn is_series_floor(version: &Version) -> bool {
    version.prerelease.as_deref() == Some("0") && version.local.is_none()
}

fn fmt_version(version: &Version) -> String {
    if is_series_floor(version) {
        version.release().to_string()
    } else {
        version.to_string()
    }
}

fn fmt_interval(f: &mut fmt::Formatter<'_>, interval: &Interval) -> fmt::Result {
    match interval {
        (Unbounded, Unbounded) => write!(f, "*"),
        (Included(a), Included(b)) if a == b => write!(f, "{}", a),
        (Unbounded, Included(b)) => write!(f, "<={}", b),
        (Unbounded, Excluded(b)) => write!(f, "<{}", fmt_version(b)),
        (Included(a), Unbounded) => write!(f, ">={}", a),
        (Excluded(a), Unbounded) => write!(f, ">{}", a),
        (start, end) => {
            match start {
                Included(a) => write!(f, ">={}", a)?,
                Excluded(a) => write!(f, ">{}", a)?,
                Unbounded => {},
            }
            match end {
                Included(b) => write!(f, ", <={}", b),
                Excluded(b) => write!(f, ", <{}", fmt_version(b)),
                Unbounded => Ok(()),
            }
        },
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "∅");
        }
        for (idx, interval) in self.segments.iter().enumerate() {
            if idx > 0 {
                write!(f, " || ")?;
            }
            fmt_interval(f, interval)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_empty_and_full() {
        assert!(VersionRange::empty().is_empty());
        assert!(VersionRange::full().is_full());
        assert!(VersionRange::full().contains(&v("0.0.1")));
        assert!(!VersionRange::empty().contains(&v("0.0.1")));
        assert_eq!(VersionRange::full().complement(), VersionRange::empty());
        assert_eq!(VersionRange::empty().complement(), VersionRange::full());
    }

    #[test]
    fn test_contains_bounds() {
        let range = VersionRange::between(v("1.0.0"), v("2.0.0"));
        assert!(range.contains(&v("1.0.0")));
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0.0")));
        assert!(!range.contains(&v("0.9.0")));

        let open = VersionRange::strictly_higher_than(v("1.0.0"));
        assert!(!open.contains(&v("1.0.0")));
        assert!(open.contains(&v("1.0.0+1")));
    }

    #[test]
    fn test_between_inverted_is_empty() {
        assert!(VersionRange::between(v("2.0.0"), v("1.0.0")).is_empty());
        assert!(VersionRange::between(v("1.0.0"), v("1.0.0")).is_empty());
    }

    #[test]
    fn test_point_exclusion_is_two_intervals() {
        let not_one = VersionRange::singleton(v("1.0.0")).complement();
        assert_eq!(not_one.intervals().len(), 2);
        assert!(!not_one.contains(&v("1.0.0")));
        assert!(not_one.contains(&v("0.9.0")));
        assert!(not_one.contains(&v("1.0.1")));
    }

    #[test]
    fn test_union_merges_touching() {
        let low = VersionRange::between(v("1.0.0"), v("2.0.0"));
        let high = VersionRange::between(v("2.0.0"), v("3.0.0"));
        let merged = low.union(&high);
        assert_eq!(merged, VersionRange::between(v("1.0.0"), v("3.0.0")));

        // A hole at exactly 2.0.0 is kept
        let below = VersionRange::strictly_lower_than(v("2.0.0"));
        let above = VersionRange::strictly_higher_than(v("2.0.0"));
        let holed = below.union(&above);
        assert_eq!(holed.intervals().len(), 2);
        assert_eq!(holed, VersionRange::singleton(v("2.0.0")).complement());
    }

    #[test]
    fn test_intersection() {
        let a = VersionRange::higher_than(v("1.2.0"));
        let b = VersionRange::strictly_lower_than(v("1.5.0"));
        let both = a.intersection(&b);
        assert_eq!(both, VersionRange::between(v("1.2.0"), v("1.5.0")));

        let disjoint = VersionRange::lower_than(v("1.0.0"))
            .intersection(&VersionRange::strictly_higher_than(v("1.0.0")));
        assert!(disjoint.is_empty());

        let point = VersionRange::lower_than(v("1.0.0"))
            .intersection(&VersionRange::higher_than(v("1.0.0")));
        assert_eq!(point.as_singleton(), Some(&v("1.0.0")));
    }

    #[test]
    fn test_empty_is_absorbing() {
        let a = VersionRange::between(v("1.0.0"), v("2.0.0"));
        assert!(a.intersection(&VersionRange::empty()).is_empty());
        assert_eq!(a.union(&VersionRange::empty()), a);
    }

    #[test]
    fn test_allows_any_and_subset() {
        let a = VersionRange::between(v("1.0.0"), v("2.0.0"));
        let b = VersionRange::between(v("1.5.0"), v("3.0.0"));
        let c = VersionRange::higher_than(v("2.0.0"));
        assert!(a.allows_any(&b));
        assert!(!a.allows_any(&c));
        assert!(VersionRange::singleton(v("1.2.0")).subset_of(&a));
        assert!(!b.subset_of(&a));
        assert!(VersionRange::empty().subset_of(&a));
    }

    #[test]
    fn test_difference() {
        let a = VersionRange::between(v("1.0.0"), v("3.0.0"));
        let b = VersionRange::between(v("1.5.0"), v("2.0.0"));
        let d = a.difference(&b);
        assert!(d.contains(&v("1.4.0")));
        assert!(!d.contains(&v("1.7.0")));
        assert!(d.contains(&v("2.0.0")));
    }

    #[test]
    fn test_display() {
        assert_eq!(VersionRange::full().to_string(), "*");
        assert_eq!(VersionRange::singleton(v("1.0.0")).to_string(), "1.0.0");
        assert_eq!(
            VersionRange::between(v("1.0.0"), v("2.0.0")).to_string(),
            ">=1.0.0, <2.0.0"
        );
        assert_eq!(
            VersionRange::between(v("1.0.0"), series_floor(v("2.0.0"))).to_string(),
            ">=1.0.0, <2.0.0"
        );
        assert_eq!(
            VersionRange::singleton(v("1.0.0")).complement().to_string(),
            "<1.0.0 || >1.0.0"
        );
    }

    #[test]
    fn test_series_floor_rejects_prereleases() {
        let range = VersionRange::between(v("1.0.0"), series_floor(v("2.0.0")));
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0.0-rc.1")));
        assert!(!range.has_prerelease_bound());
        assert!(VersionRange::higher_than(v("2.0.0-rc.1")).has_prerelease_bound());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_version() -> impl Strategy<Value = Version> {
        (0u64..4, 0u64..4).prop_map(|(major, minor)| Version::new(major, minor, 0))
    }

    fn arb_bound() -> impl Strategy<Value = Bound<Version>> {
        prop_oneof![
            Just(Unbounded),
            arb_version().prop_map(Included),
            arb_version().prop_map(Excluded),
        ]
    }

    fn arb_interval() -> impl Strategy<Value = Interval> {
        (arb_bound(), arb_bound())
    }

    fn arb_range() -> impl Strategy<Value = VersionRange> {
        prop::collection::vec(arb_interval(), 0..4).prop_map(VersionRange::from_intervals)
    }

    fn probes() -> Vec<Version> {
        let mut out = Vec::new();
        for major in 0..5 {
            for minor in 0..5 {
                out.push(Version::new(major, minor, 0));
                out.push(Version::new(major, minor, 1));
            }
        }
        out
    }

    proptest! {
        #[test]
        fn intersection_is_commutative(a in arb_range(), b in arb_range()) {
            prop_assert_eq!(a.intersection(&b), b.intersection(&a));
        }

        #[test]
        fn intersection_is_associative(a in arb_range(), b in arb_range(), c in arb_range()) {
            prop_assert_eq!(
                a.intersection(&b).intersection(&c),
                a.intersection(&b.intersection(&c))
            );
        }

        #[test]
        fn intersection_contains_is_and(a in arb_range(), b in arb_range()) {
            let both = a.intersection(&b);
            for version in probes() {
                prop_assert_eq!(
                    both.contains(&version),
                    a.contains(&version) && b.contains(&version)
                );
            }
        }

        #[test]
        fn union_contains_is_or(a in arb_range(), b in arb_range()) {
            let either = a.union(&b);
            for version in probes() {
                prop_assert_eq!(
                    either.contains(&version),
                    a.contains(&version) || b.contains(&version)
                );
            }
        }

        #[test]
        fn union_with_complement_is_full(a in arb_range()) {
            prop_assert!(a.union(&a.complement()).is_full());
            prop_assert!(a.intersection(&a.complement()).is_empty());
        }

        #[test]
        fn complement_is_involutive(a in arb_range()) {
            prop_assert_eq!(a.complement().complement(), a);
        }

        #[test]
        fn allows_any_matches_intersection(a in arb_range(), b in arb_range()) {
            prop_assert_eq!(a.allows_any(&b), !a.intersection(&b).is_empty());
        }

        #[test]
        fn union_is_normalized(a in arb_range(), b in arb_range()) {
            let merged = a.union(&b);
            prop_assert_eq!(merged.clone(), VersionRange::from_intervals(merged.intervals().to_vec()));
        }
    }
}
