// Grouping, ranking and distribution helpers shared by the report and the
// figures. Everything here is a pure function of the records.
use crate::types::{CampaignRecord, Dimension, Metric};
use crate::util::average;
use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Row count and running sums of every metric for one category.
#[derive(Debug, Clone)]
pub struct GroupAggregate {
    pub key: String,
    pub count: usize,
    sums: [f64; Metric::COUNT],
}

impl GroupAggregate {
    fn new(key: String) -> Self {
        Self {
            key,
            count: 0,
            sums: [0.0; Metric::COUNT],
        }
    }

    fn push(&mut self, r: &CampaignRecord) {
        self.count += 1;
        for m in Metric::ALL {
            self.sums[m.index()] += m.of(r);
        }
    }

    pub fn sum(&self, metric: Metric) -> f64 {
        self.sums[metric.index()]
    }

    pub fn mean(&self, metric: Metric) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum(metric) / self.count as f64
    }
}

/// Group in one pass; groups come back in first-seen order.
pub fn group_by(data: &[CampaignRecord], dimension: Dimension) -> Vec<GroupAggregate> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<GroupAggregate> = Vec::new();
    for r in data {
        let key = dimension.of(r);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(GroupAggregate::new(key.to_string()));
            groups.len() - 1
        });
        groups[slot].push(r);
    }
    groups
}

/// Same as [`group_by`] but ordered by category label.
pub fn group_by_sorted(data: &[CampaignRecord], dimension: Dimension) -> Vec<GroupAggregate> {
    let mut groups = group_by(data, dimension);
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}

/// Rows per category, most frequent first. Ties keep first-seen order.
pub fn value_counts(data: &[CampaignRecord], dimension: Dimension) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = group_by(data, dimension)
        .into_iter()
        .map(|g| (g.key, g.count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Rows per category, ordered by category label.
pub fn value_counts_by_label(data: &[CampaignRecord], dimension: Dimension) -> Vec<(String, usize)> {
    group_by_sorted(data, dimension)
        .into_iter()
        .map(|g| (g.key, g.count))
        .collect()
}

/// Project each group to one value and sort descending (stable).
pub fn rank_groups<F>(groups: &[GroupAggregate], value: F) -> Vec<(String, f64)>
where
    F: Fn(&GroupAggregate) -> f64,
{
    let mut ranked: Vec<(String, f64)> = groups.iter().map(|g| (g.key.clone(), value(g))).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked
}

/// Raw values of `metric` per category, ordered by category label.
pub fn grouped_values(
    data: &[CampaignRecord],
    dimension: Dimension,
    metric: Metric,
) -> Vec<(String, Vec<f64>)> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in data {
        groups.entry(dimension.of(r)).or_default().push(metric.of(r));
    }
    groups
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub fn column_values(data: &[CampaignRecord], metric: Metric) -> Vec<f64> {
    data.iter().map(|r| metric.of(r)).collect()
}

pub fn column_sum(data: &[CampaignRecord], metric: Metric) -> f64 {
    data.iter().map(|r| metric.of(r)).sum()
}

pub fn column_mean(data: &[CampaignRecord], metric: Metric) -> f64 {
    average(&column_values(data, metric))
}

/// The `k` rows with the largest `metric`. Equal values keep row order.
pub fn top_k(data: &[CampaignRecord], metric: Metric, k: usize) -> Vec<&CampaignRecord> {
    let mut rows: Vec<&CampaignRecord> = data.iter().collect();
    rows.sort_by(|a, b| {
        metric
            .of(b)
            .partial_cmp(&metric.of(a))
            .unwrap_or(Ordering::Equal)
    });
    rows.truncate(k);
    rows
}

/// The `k` rows with the smallest `metric`. Equal values keep row order.
pub fn bottom_k(data: &[CampaignRecord], metric: Metric, k: usize) -> Vec<&CampaignRecord> {
    let mut rows: Vec<&CampaignRecord> = data.iter().collect();
    rows.sort_by(|a, b| {
        metric
            .of(a)
            .partial_cmp(&metric.of(b))
            .unwrap_or(Ordering::Equal)
    });
    rows.truncate(k);
    rows
}

/// Sum of `metric` per calendar month, oldest first, labelled `YYYY-MM`.
/// `dates` must be parallel to `data`.
pub fn monthly_totals(
    data: &[CampaignRecord],
    dates: &[NaiveDate],
    metric: Metric,
) -> Vec<(String, f64)> {
    let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (r, d) in data.iter().zip(dates) {
        *months.entry((d.year(), d.month())).or_insert(0.0) += metric.of(r);
    }
    months
        .into_iter()
        .map(|((y, m), total)| (format!("{:04}-{:02}", y, m), total))
        .collect()
}

/// Five-number summary as drawn by a box plot.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Lowest value within `q1 - 1.5 * IQR`.
    pub whisker_low: f64,
    /// Highest value within `q3 + 1.5 * IQR`.
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub fn from_values(values: &[f64]) -> Option<BoxStats> {
        let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
        if v.is_empty() {
            return None;
        }
        v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let q1 = percentile(&v, 0.25);
        let median = percentile(&v, 0.5);
        let q3 = percentile(&v, 0.75);
        let iqr = q3 - q1;
        let (lo_fence, hi_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
        let whisker_low = v.iter().copied().find(|x| *x >= lo_fence).unwrap_or(q1);
        let whisker_high = v.iter().rev().copied().find(|x| *x <= hi_fence).unwrap_or(q3);
        let outliers = v
            .iter()
            .copied()
            .filter(|x| *x < lo_fence || *x > hi_fence)
            .collect();
        Some(BoxStats {
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
            outliers,
        })
    }

    /// Smallest and largest value drawn for this box.
    pub fn extent(&self) -> (f64, f64) {
        let lo = self.outliers.iter().copied().fold(self.whisker_low, f64::min);
        let hi = self.outliers.iter().copied().fold(self.whisker_high, f64::max);
        (lo, hi)
    }
}

/// Linear interpolation between closest ranks over sorted input.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width bins over `min..=max`. The last bin includes its upper edge.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mut min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        min -= 0.5;
        max += 0.5;
    }
    let width = (max - min) / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            start: min + width * i as f64,
            end: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    for x in finite {
        let idx = (((x - min) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}
