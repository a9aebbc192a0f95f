//! Aggregator Module
//! Grouped counts, grouped statistics and pivot tables over a [`RowSet`].
//!
//! Groups are keyed by text; rows with a missing key are left out of every
//! grouping. Counts rank descending and ties keep first-encounter order.

use crate::data::{FrameError, RowSet};
use crate::stats::calculator::{Describe, Stat, StatsCalculator};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Occurrences of one distinct value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Sub-category counts within one top-level group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCounts {
    pub group: String,
    pub total: usize,
    /// Ranked by count, descending.
    pub counts: Vec<ValueCount>,
}

impl GroupCounts {
    /// Keep the `n` most frequent sub-categories.
    pub fn top(&self, n: usize) -> GroupCounts {
        GroupCounts {
            group: self.group.clone(),
            total: self.total,
            counts: self.counts.iter().take(n).cloned().collect(),
        }
    }
}

/// Statistics of one group, always paired with its sample size.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    pub key: Vec<String>,
    /// Rows in the group.
    pub size: usize,
    /// Rows in the group with a non-missing value.
    pub samples: usize,
    pub stats: Vec<(Stat, Option<f64>)>,
}

impl GroupSummary {
    pub fn get(&self, stat: Stat) -> Option<f64> {
        self.stats
            .iter()
            .find(|(s, _)| *s == stat)
            .and_then(|(_, v)| *v)
    }
}

/// Two-dimensional table of one statistic. Empty cells are missing, not zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub stat: Stat,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    cells: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.row_labels.iter().position(|l| l == row)?;
        let c = self.column_labels.iter().position(|l| l == column)?;
        self.cells[r][c]
    }

    pub fn row(&self, row: &str) -> Option<&[Option<f64>]> {
        let r = self.row_labels.iter().position(|l| l == row)?;
        Some(&self.cells[r])
    }

    /// Reorder rows by the values in `column`. Missing cells sort last.
    pub fn sort_by_column(&mut self, column: &str, descending: bool) {
        let Some(c) = self.column_labels.iter().position(|l| l == column) else {
            return;
        };
        let mut order: Vec<usize> = (0..self.row_labels.len()).collect();
        order.sort_by(|&a, &b| compare_missing_last(self.cells[a][c], self.cells[b][c], descending));
        self.row_labels = order.iter().map(|&i| self.row_labels[i].clone()).collect();
        self.cells = order.iter().map(|&i| self.cells[i].clone()).collect();
    }
}

/// Grouping and cross-tabulation queries.
pub struct Aggregator;

impl Aggregator {
    /// Distinct values of `column` with their counts, most frequent first.
    pub fn value_counts(rows: &RowSet, column: &str) -> Result<Vec<ValueCount>, FrameError> {
        Ok(rank_counts(rows.texts(column)?.into_iter().flatten()))
    }

    /// Like [`Aggregator::value_counts`] but ordered by value, numerically
    /// when every value is a number.
    pub fn value_counts_by_key(
        rows: &RowSet,
        column: &str,
    ) -> Result<Vec<ValueCount>, FrameError> {
        let mut counts = Self::value_counts(rows, column)?;
        let numeric: Option<Vec<f64>> = counts.iter().map(|c| c.value.parse().ok()).collect();
        match numeric {
            Some(keys) => {
                let mut keyed: Vec<(f64, ValueCount)> = keys.into_iter().zip(counts).collect();
                keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
                counts = keyed.into_iter().map(|(_, c)| c).collect();
            }
            None => counts.sort_by(|a, b| a.value.cmp(&b.value)),
        }
        Ok(counts)
    }

    /// Count `sub` values within each `group`. Groups are ordered by key.
    pub fn group_counts(
        rows: &RowSet,
        group: &str,
        sub: &str,
    ) -> Result<Vec<GroupCounts>, FrameError> {
        let groups = rows.texts(group)?;
        let subs = rows.texts(sub)?;

        let mut partitions: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (g, s) in groups.into_iter().zip(subs) {
            if let (Some(g), Some(s)) = (g, s) {
                partitions.entry(g).or_default().push(s);
            }
        }

        Ok(partitions
            .into_iter()
            .map(|(group, values)| GroupCounts {
                group,
                total: values.len(),
                counts: rank_counts(values.into_iter()),
            })
            .collect())
    }

    /// The `n` most frequent `sub` values inside every `group`.
    pub fn top_n_per_group(
        rows: &RowSet,
        group: &str,
        sub: &str,
        n: usize,
    ) -> Result<Vec<GroupCounts>, FrameError> {
        Ok(Self::group_counts(rows, group, sub)?
            .iter()
            .map(|g| g.top(n))
            .collect())
    }

    /// Flatten per-group rankings into `(group, value, count)` triples ranked
    /// by count across all groups.
    pub fn rank_across_groups(groups: &[GroupCounts]) -> Vec<(String, String, usize)> {
        let mut flat: Vec<(String, String, usize)> = groups
            .iter()
            .flat_map(|g| {
                g.counts
                    .iter()
                    .map(|c| (g.group.clone(), c.value.clone(), c.count))
            })
            .collect();
        flat.sort_by(|a, b| b.2.cmp(&a.2));
        flat
    }

    /// Per-group statistics of `value`, keyed by one or more columns.
    pub fn group_stats(
        rows: &RowSet,
        keys: &[&str],
        value: &str,
        stats: &[Stat],
    ) -> Result<Vec<GroupSummary>, FrameError> {
        Ok(partition(rows, keys, value)?
            .into_iter()
            .map(|(key, (size, samples))| GroupSummary {
                key,
                size,
                samples: samples.len(),
                stats: stats
                    .iter()
                    .map(|&s| (s, StatsCalculator::compute(s, &samples)))
                    .collect(),
            })
            .collect())
    }

    /// [`Aggregator::describe`] of `value` within every group, ordered by key.
    pub fn group_describe(
        rows: &RowSet,
        keys: &[&str],
        value: &str,
    ) -> Result<Vec<(Vec<String>, Describe)>, FrameError> {
        Ok(partition(rows, keys, value)?
            .into_iter()
            .map(|(key, (_, samples))| (key, StatsCalculator::compute_descriptive_stats(&samples)))
            .collect())
    }

    /// Order summaries by one statistic; groups without it sort last.
    pub fn sort_by_stat(summaries: &mut [GroupSummary], stat: Stat, descending: bool) {
        summaries.sort_by(|a, b| compare_missing_last(a.get(stat), b.get(stat), descending));
    }

    /// Cross-tabulate `stat(value)` by `row_key` x `column_key`.
    pub fn pivot(
        rows: &RowSet,
        row_key: &str,
        column_key: &str,
        value: &str,
        stat: Stat,
    ) -> Result<PivotTable, FrameError> {
        let row_keys = rows.texts(row_key)?;
        let column_keys = rows.texts(column_key)?;
        let values = rows.numbers(value)?;

        let mut cells: HashMap<(String, String), Vec<f64>> = HashMap::new();
        let mut row_labels = BTreeSet::new();
        let mut column_labels = BTreeSet::new();
        for ((r, c), v) in row_keys.into_iter().zip(column_keys).zip(values) {
            if let (Some(r), Some(c), Some(v)) = (r, c, v) {
                row_labels.insert(r.clone());
                column_labels.insert(c.clone());
                cells.entry((r, c)).or_default().push(v);
            }
        }

        let row_labels: Vec<String> = row_labels.into_iter().collect();
        let column_labels: Vec<String> = column_labels.into_iter().collect();
        let cells = row_labels
            .iter()
            .map(|r| {
                column_labels
                    .iter()
                    .map(|c| {
                        cells
                            .get(&(r.clone(), c.clone()))
                            .and_then(|samples| StatsCalculator::compute(stat, samples))
                    })
                    .collect()
            })
            .collect();

        Ok(PivotTable {
            stat,
            row_labels,
            column_labels,
            cells,
        })
    }

    /// Descriptive summary of a numeric column, ignoring missing values.
    pub fn describe(rows: &RowSet, column: &str) -> Result<Describe, FrameError> {
        let values: Vec<f64> = rows.numbers(column)?.into_iter().flatten().collect();
        Ok(StatsCalculator::compute_descriptive_stats(&values))
    }
}

/// Split rows by key, tracking each group's row count and present values.
/// Rows with any missing key component are skipped.
fn partition(
    rows: &RowSet,
    keys: &[&str],
    value: &str,
) -> Result<BTreeMap<Vec<String>, (usize, Vec<f64>)>, FrameError> {
    let key_columns = keys
        .iter()
        .map(|k| rows.texts(k))
        .collect::<Result<Vec<_>, _>>()?;
    let values = rows.numbers(value)?;

    let mut partitions: BTreeMap<Vec<String>, (usize, Vec<f64>)> = BTreeMap::new();
    for (row, v) in values.into_iter().enumerate() {
        let key: Option<Vec<String>> =
            key_columns.iter().map(|column| column[row].clone()).collect();
        let Some(key) = key else {
            continue;
        };
        let entry = partitions.entry(key).or_default();
        entry.0 += 1;
        entry.1.extend(v);
    }
    Ok(partitions)
}

/// Count values, rank by count descending with first-seen order on ties.
fn rank_counts(values: impl Iterator<Item = String>) -> Vec<ValueCount> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<ValueCount> = Vec::new();
    for value in values {
        match index.get(&value) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(value.clone(), counts.len());
                counts.push(ValueCount { value, count: 1 });
            }
        }
    }
    // stable: ties stay in encounter order
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

fn compare_missing_last(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
