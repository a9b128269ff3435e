use serde::Serialize;

/// Upper bounds (inclusive) and labels for the score histogram. The final
/// bucket is open-ended.
const BUCKETS: &[(i32, &str)] = &[
    (10, "0-10"),
    (50, "11-50"),
    (100, "51-100"),
    (500, "101-500"),
    (1000, "501-1000"),
];
const OVERFLOW_BUCKET: &str = "1000+";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBucket {
    pub label: &'static str,
    pub count: usize,
}

/// Summary of post scores within one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDistribution {
    pub min: i32,
    pub max: i32,
    /// Rounded to two decimal places.
    pub mean: f64,
    pub median: f64,
    pub total: usize,
    pub buckets: Vec<ScoreBucket>,
}

impl ScoreDistribution {
    /// Build the distribution from raw scores. Missing scores should be
    /// passed as `0`. Negative scores land in the lowest bucket.
    #[must_use]
    pub fn from_scores(scores: &[i32]) -> Self {
        let mut buckets: Vec<ScoreBucket> = BUCKETS
            .iter()
            .map(|&(_, label)| ScoreBucket { label, count: 0 })
            .chain(std::iter::once(ScoreBucket {
                label: OVERFLOW_BUCKET,
                count: 0,
            }))
            .collect();

        if scores.is_empty() {
            return Self {
                min: 0,
                max: 0,
                mean: 0.0,
                median: 0.0,
                total: 0,
                buckets,
            };
        }

        for &score in scores {
            let idx = BUCKETS
                .iter()
                .position(|&(upper, _)| score <= upper)
                .unwrap_or(BUCKETS.len());
            buckets[idx].count += 1;
        }

        let mut sorted = scores.to_vec();
        sorted.sort_unstable();
        let n = sorted.len();
        let median = if n % 2 == 1 {
            f64::from(sorted[n / 2])
        } else {
            (f64::from(sorted[n / 2 - 1]) + f64::from(sorted[n / 2])) / 2.0
        };

        let sum: i64 = scores.iter().map(|&s| i64::from(s)).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = round2(sum as f64 / n as f64);

        Self {
            min: sorted[0],
            max: sorted[n - 1],
            mean,
            median,
            total: n,
            buckets,
        }
    }

    #[must_use]
    pub fn bucket(&self, label: &str) -> Option<usize> {
        self.buckets.iter().find(|b| b.label == label).map(|b| b.count)
    }
}

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
