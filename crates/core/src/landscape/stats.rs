//! Per-band statistics over valid cells

use super::NODATA;
use rayon::prelude::*;

/// Number of histogram bins stored per band
pub const HISTOGRAM_BINS: usize = 256;

/// Summary of a band's valid (non-nodata) cells
#[derive(Debug, Clone, PartialEq)]
pub struct BandStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub histogram: Vec<u64>,
    pub valid_cells: usize,
}

impl BandStats {
    /// Statistics of an all-nodata band: NaN summary and an empty histogram
    pub fn empty() -> Self {
        Self {
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            std: f64::NAN,
            histogram: vec![0; HISTOGRAM_BINS],
            valid_cells: 0,
        }
    }

    /// Histogram as the comma separated string stored in the metadata
    pub fn histogram_string(&self) -> String {
        self.histogram
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Clone, Copy)]
struct Moments {
    count: usize,
    min: i16,
    max: i16,
    sum: i64,
}

impl Moments {
    const IDENTITY: Self = Self {
        count: 0,
        min: i16::MAX,
        max: i16::MIN,
        sum: 0,
    };

    fn push(mut self, v: i16) -> Self {
        self.count += 1;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.sum += i64::from(v);
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            count: self.count + other.count,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sum: self.sum + other.sum,
        }
    }
}

/// Compute min/max/mean/std and a 256-bin histogram over cells that are
/// not [`NODATA`].
///
/// Bins are equal width over `[min, max]` with the last bin closed. A
/// constant band uses `[min - 0.5, max + 0.5]`.
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "cell counts and bin indices stay far below 2^52"
)]
pub fn compute(cells: &[i16]) -> BandStats {
    let moments = cells
        .par_iter()
        .filter(|&&v| v != NODATA)
        .fold(|| Moments::IDENTITY, |m, &v| m.push(v))
        .reduce(|| Moments::IDENTITY, Moments::merge);

    if moments.count == 0 {
        return BandStats::empty();
    }

    let n = moments.count as f64;
    let mean = moments.sum as f64 / n;
    let sq_dev: f64 = cells
        .par_iter()
        .filter(|&&v| v != NODATA)
        .map(|&v| (f64::from(v) - mean).powi(2))
        .sum();

    let (lo, hi) = if moments.min == moments.max {
        (f64::from(moments.min) - 0.5, f64::from(moments.max) + 0.5)
    } else {
        (f64::from(moments.min), f64::from(moments.max))
    };
    let width = (hi - lo) / HISTOGRAM_BINS as f64;
    let histogram = cells
        .par_iter()
        .filter(|&&v| v != NODATA)
        .fold(
            || vec![0u64; HISTOGRAM_BINS],
            |mut bins, &v| {
                let bin = (((f64::from(v) - lo) / width) as usize).min(HISTOGRAM_BINS - 1);
                bins[bin] += 1;
                bins
            },
        )
        .reduce(
            || vec![0u64; HISTOGRAM_BINS],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        );

    BandStats {
        min: f64::from(moments.min),
        max: f64::from(moments.max),
        mean,
        std: (sq_dev / n).sqrt(),
        histogram,
        valid_cells: moments.count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nodata_excluded() {
        let stats = compute(&[1, 2, 3, 4, NODATA, NODATA]);
        assert_eq!(stats.valid_cells, 4);
        assert_relative_eq!(stats.min, 1.0);
        assert_relative_eq!(stats.max, 4.0);
        assert_relative_eq!(stats.mean, 2.5);
        assert_relative_eq!(stats.std, 1.25_f64.sqrt());
        assert_eq!(stats.histogram.iter().sum::<u64>(), 4);
    }

    #[test]
    fn test_histogram_edges() {
        let stats = compute(&[0, 255, 255]);
        assert_eq!(stats.histogram[0], 1);
        assert_eq!(stats.histogram[HISTOGRAM_BINS - 1], 2);
    }

    #[test]
    fn test_constant_band_lands_in_middle_bin() {
        let stats = compute(&[7, 7, 7]);
        assert_relative_eq!(stats.std, 0.0);
        assert_eq!(stats.histogram[HISTOGRAM_BINS / 2], 3);
    }

    #[test]
    fn test_all_nodata_band() {
        let stats = compute(&[NODATA; 9]);
        assert!(stats.mean.is_nan());
        assert_eq!(stats.valid_cells, 0);
        assert!(stats.histogram.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_histogram_string() {
        let stats = compute(&[3]);
        let text = stats.histogram_string();
        assert_eq!(text.split(',').count(), HISTOGRAM_BINS);
    }
}
