use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;
use tracing::debug;

use crate::metrics::{self, round_to, Totals};
use crate::models::{DateRow, MemberRow, Metrics, Record, SupplierRow, Trend};

/// Records sharing one grouping key, in the order they were seen.
pub struct Group<'a, K> {
    pub key: K,
    pub records: Vec<&'a Record>,
}

/// What every group is measured against: a reference NPS and the
/// denominator that turns a group's share of the weight into a fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub nps: f64,
    pub denominator: f64,
}

/// A group's metrics measured against a reference NPS.
#[derive(Debug, Clone)]
pub struct GroupStat<K> {
    pub key: K,
    pub metrics: Metrics,
    pub contribution: f64,
}

impl<K> GroupStat<K> {
    pub fn negative_contribution(&self) -> bool {
        self.contribution < 0.0
    }
}

/// Groups come back in first-appearance order.
pub fn partition<'a, K, F>(records: &[&'a Record], key: F) -> Vec<Group<'a, K>>
where
    K: Eq + Hash + Clone,
    F: Fn(&'a Record) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Group<'a, K>> = Vec::new();

    for record in records.iter().copied() {
        let group_key = key(record);
        let slot = *index.entry(group_key.clone()).or_insert_with(|| {
            groups.push(Group {
                key: group_key,
                records: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].records.push(record);
    }

    groups
}

/// Partition `records`, measure every group against the baseline picked from
/// the whole subset's metrics, and order by reported NPS descending. Equal
/// NPS keeps first-appearance order.
///
/// Contributions are built from the group's reported (2-decimal) NPS and
/// denominator, so they agree with the columns printed next to them.
pub fn analyze<'a, K, F, R>(records: &[&'a Record], key: F, baseline: R) -> Vec<GroupStat<K>>
where
    K: Eq + Hash + Clone,
    F: Fn(&'a Record) -> K,
    R: FnOnce(&Metrics) -> Baseline,
{
    let subset = metrics::compute(records.iter().copied());
    let baseline = baseline(&subset);

    let mut stats: Vec<GroupStat<K>> = partition(records, key)
        .into_iter()
        .map(|group| {
            let metrics = metrics::compute(group.records.iter().copied());
            let reported = metrics.reported();
            let weight = if baseline.denominator > 0.0 {
                reported.effective_denominator / baseline.denominator
            } else {
                0.0
            };
            GroupStat {
                key: group.key,
                metrics,
                contribution: round_to((reported.nps - baseline.nps) * weight, 4),
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        round_to(b.metrics.nps, 2)
            .partial_cmp(&round_to(a.metrics.nps, 2))
            .unwrap_or(Ordering::Equal)
    });

    debug!(
        groups = stats.len(),
        reference_nps = baseline.nps,
        "computed grouped dimension"
    );
    stats
}

pub fn supplier_rows(records: &[Record], supplier_id: i64) -> Vec<&Record> {
    records
        .iter()
        .filter(|record| record.supplier_id == supplier_id)
        .collect()
}

/// Every supplier ranked against the dataset-wide baseline. The overall NPS
/// is used unrounded here.
pub fn supplier_dimension(records: &[Record], overall_nps: f64, target: i64) -> Vec<SupplierRow> {
    let all: Vec<&Record> = records.iter().collect();
    let target = target as f64;

    analyze(
        &all,
        |record| (record.supplier_id, record.supplier_name.as_str()),
        |subset| Baseline {
            nps: overall_nps,
            denominator: subset.effective_denominator,
        },
    )
    .into_iter()
    .enumerate()
    .map(|(idx, stat)| {
        let metrics = stat.metrics.reported();
        SupplierRow {
            rank: idx + 1,
            supplier_id: stat.key.0,
            supplier_name: stat.key.1.to_string(),
            below_target: metrics.nps < target,
            negative_contribution: stat.negative_contribution(),
            contribution: stat.contribution,
            metrics,
        }
    })
    .collect()
}

pub fn sub_account_dimension(records: &[Record], supplier_id: i64) -> Vec<MemberRow> {
    member_dimension(records, supplier_id, |record| {
        (
            record.sub_account_id.as_str(),
            record.sub_account_name.as_str(),
        )
    })
}

pub fn follower_dimension(records: &[Record], supplier_id: i64) -> Vec<MemberRow> {
    member_dimension(records, supplier_id, |record| {
        (record.follower_id.as_str(), record.follower_name.as_str())
    })
}

fn member_dimension<'a, F>(records: &'a [Record], supplier_id: i64, key: F) -> Vec<MemberRow>
where
    F: Fn(&'a Record) -> (&'a str, &'a str),
{
    let rows = supplier_rows(records, supplier_id);
    if rows.is_empty() {
        return Vec::new();
    }

    analyze(&rows, key, |supplier| {
        let reported = supplier.reported();
        Baseline {
            nps: reported.nps,
            denominator: reported.effective_denominator,
        }
    })
        .into_iter()
        .map(|stat| MemberRow {
            id: stat.key.0.to_string(),
            name: stat.key.1.to_string(),
            metrics: stat.metrics.reported(),
            negative_contribution: stat.negative_contribution(),
            contribution: stat.contribution,
        })
        .collect()
}

/// Per-day metrics in chronological order with a running NPS folded over
/// every day so far.
pub fn date_dimension(records: &[Record], supplier_id: i64) -> Vec<DateRow> {
    let rows = supplier_rows(records, supplier_id);
    let mut days: Vec<Group<'_, NaiveDate>> = partition(&rows, |record| record.travel_date);
    days.sort_by_key(|group| group.key);

    let mut running = Totals::default();
    // unrounded, so a shift smaller than the displayed precision still counts
    let mut previous: Option<f64> = None;
    let mut output = Vec::with_capacity(days.len());

    for day in days {
        let totals: Totals = day.records.iter().copied().collect();
        running.merge(&totals);

        let daily = totals.metrics().reported();
        let cumulative = running.metrics().nps;
        let trend = match previous {
            None => Trend::First,
            Some(prev) => match cumulative.partial_cmp(&prev) {
                Some(Ordering::Greater) => Trend::Improved,
                Some(Ordering::Less) => Trend::Declined,
                _ => Trend::Unchanged,
            },
        };
        previous = Some(cumulative);

        output.push(DateRow {
            date: day.key,
            order_count: daily.order_count,
            effective_denominator: daily.effective_denominator,
            detractor_count: daily.detractor_count,
            promoter_score: daily.promoter_score,
            daily_nps: daily.nps,
            cumulative_nps: round_to(cumulative, 2),
            trend,
        });
    }

    output
}
