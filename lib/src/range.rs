use itertools::Itertools;
use serde::Serialize;
use std::{borrow::Borrow, fmt};

/// Range where lower bound is inclusive, upper bound is exclusive or unbounded.
///
/// A range can carry a display label, for when the half-open bounds would read badly
/// (`0-18` rather than `0 - 19`).
#[derive(Debug, Copy, Clone, Serialize)]
pub struct Range<T> {
    from: T,
    to: Option<T>,
    label: Option<&'static str>,
}

impl<T> Range<T>
where
    T: Ord,
{
    pub fn new(from: T, to: Option<T>) -> Self {
        if let Some(ref to) = to {
            if from >= *to {
                panic!("ranges must go from low to high")
            }
        }
        Range {
            from,
            to,
            label: None,
        }
    }

    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn contains(&self, val: &T) -> bool {
        if let Some(end) = &self.to {
            val >= &self.from && val < end
        } else {
            val >= &self.from
        }
    }
}

impl<T> fmt::Display for Range<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.label, &self.to) {
            (Some(label), _) => f.write_str(label),
            (None, Some(end)) => write!(f, "{} - {}", self.from, end),
            (None, None) => write!(f, "{}+", self.from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RangeSet<T> {
    ranges: Vec<Range<T>>,
}

impl<T> RangeSet<T> {
    pub fn new(ranges: Vec<Range<T>>) -> Self {
        Self { ranges }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range<T>> + '_ {
        self.ranges.iter()
    }
}

impl<T> RangeSet<T>
where
    T: Ord,
{
    pub fn bucket_values<I, B>(self, values: I) -> RangeSetCounts<T>
    where
        I: Iterator<Item = B>,
        B: Borrow<T>,
    {
        let mut buckets = vec![0usize; self.ranges.len()];
        for value in values {
            if let Some(idx) = self.ranges.iter().position(|r| r.contains(value.borrow())) {
                buckets[idx] += 1;
            }
        }
        RangeSetCounts {
            set: self,
            counts: buckets,
        }
    }
}

/// A range set with values bucketed, and bucket sizes recorded.
#[derive(Debug, Clone)]
pub struct RangeSetCounts<T> {
    set: RangeSet<T>,
    counts: Vec<usize>,
}

impl<T> RangeSetCounts<T> {
    pub fn iter(&self) -> impl Iterator<Item = (&Range<T>, usize)> {
        self.set.iter().zip_eq(self.counts.iter().copied())
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn labels_override_bounds() {
        assert_eq!(Range::new(0u8, Some(19)).with_label("0-18").to_string(), "0-18");
        assert_eq!(Range::new(19u8, Some(36)).to_string(), "19 - 36");
        assert_eq!(Range::new(66u8, None).to_string(), "66+");
    }

    #[test]
    fn values_land_in_one_bucket() {
        let set = RangeSet::new(vec![Range::new(0u8, Some(10)), Range::new(10, None)]);
        let counts = set.bucket_values([0u8, 9, 10, 200].iter());
        let counts: Vec<_> = counts.iter().map(|(_, count)| count).collect();
        assert_eq!(counts, vec![2, 2]);
    }
}
