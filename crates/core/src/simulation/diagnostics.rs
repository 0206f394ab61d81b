//! Field statistics and comparison used by tests and hosts

/// Count of cells that moved away from a reference field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldComparison {
    pub changed: usize,
    pub unchanged: usize,
}

impl FieldComparison {
    pub fn total(&self) -> usize {
        self.changed + self.unchanged
    }

    pub fn is_identical(&self) -> bool {
        self.changed == 0
    }
}

/// Compare two fields value by value
///
/// A value counts as changed when it differs by more than `tolerance`. Values
/// present in only one of the fields always count as changed.
pub fn compare_fields(a: &[f32], b: &[f32], tolerance: f32) -> FieldComparison {
    let mut comparison = FieldComparison::default();
    for (x, y) in a.iter().zip(b) {
        if (x - y).abs() > tolerance {
            comparison.changed += 1;
        } else {
            comparison.unchanged += 1;
        }
    }
    comparison.changed += a.len().abs_diff(b.len());
    comparison
}

/// Summary of one channel of a field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub min: f32,
    pub max: f32,
    pub mean: f64,
    pub total: f64,
    /// Cell holding the maximum
    pub argmax: usize,
}

impl FieldStats {
    /// Statistics of `channel` in interleaved `data`, `None` for an empty field
    pub fn of(data: &[f32], channels: usize, channel: usize) -> Option<Self> {
        let mut values = data.iter().skip(channel).step_by(channels.max(1));
        let first = *values.next()?;
        let mut stats = Self {
            min: first,
            max: first,
            mean: 0.0,
            total: f64::from(first),
            argmax: 0,
        };
        let mut count = 1usize;
        for (i, &v) in values.enumerate() {
            stats.min = stats.min.min(v);
            if v > stats.max {
                stats.max = v;
                stats.argmax = i + 1;
            }
            stats.total += f64::from(v);
            count += 1;
        }
        stats.mean = stats.total / count as f64;
        Some(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_counts_changes() {
        let a = [0.0, 1.0, 2.0, 3.0];
        let b = [0.0, 1.05, 2.5, 3.0];
        let comparison = compare_fields(&a, &b, 0.1);
        assert_eq!(comparison, FieldComparison { changed: 1, unchanged: 3 });
        assert!(!comparison.is_identical());
        assert!(compare_fields(&a, &a, 0.0).is_identical());
    }

    #[test]
    fn test_compare_length_mismatch() {
        let comparison = compare_fields(&[1.0, 2.0], &[1.0], 0.0);
        assert_eq!(comparison.changed, 1);
        assert_eq!(comparison.total(), 2);
    }

    #[test]
    fn test_stats_of_second_channel() {
        let data = [0.0, 1.0, 5.0, -2.0, 3.0, 4.0];
        let stats = FieldStats::of(&data, 2, 1).unwrap();
        assert_eq!(stats.min, -2.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.argmax, 2);
        assert_eq!(stats.total, 3.0);
        assert_eq!(stats.mean, 1.0);
        assert!(FieldStats::of(&[], 1, 0).is_none());
    }
}
