use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// A 0/1 indicator column, summable as a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    No,
    Yes,
}

impl Flag {
    pub fn value(self) -> u32 {
        match self {
            Flag::No => 0,
            Flag::Yes => 1,
        }
    }

    pub fn is_set(self) -> bool {
        self == Flag::Yes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub order_id: String,
    pub supplier_id: i64,
    pub supplier_name: String,
    pub sub_account_id: String,
    pub sub_account_name: String,
    pub travel_date: NaiveDate,
    pub follower_id: String,
    pub follower_name: String,
    pub denominator_weight: f64,
    pub detractor: Flag,
    pub promoter_score: f64,
    pub has_user_feedback: Flag,
}

/// NPS quantities for one subset of records. Values are unrounded;
/// `Metrics::reported` gives the two-decimal display form.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Metrics {
    pub order_count: usize,
    pub effective_denominator: f64,
    pub detractor_count: i64,
    pub promoter_score_sum: f64,
    pub detractor_rate: f64,
    pub promoter_rate: f64,
    pub nps: f64,
}

/// Metric columns shared by every grouped view, already rounded for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricColumns {
    pub order_count: usize,
    pub effective_denominator: f64,
    pub detractor_count: i64,
    pub promoter_score: f64,
    pub detractor_rate: f64,
    pub promoter_rate: f64,
    pub nps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierRow {
    pub rank: usize,
    pub supplier_id: i64,
    pub supplier_name: String,
    #[serde(flatten)]
    pub metrics: MetricColumns,
    pub below_target: bool,
    pub contribution: f64,
    pub negative_contribution: bool,
}

/// One sub-account or follower inside a supplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRow {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub metrics: MetricColumns,
    pub contribution: f64,
    pub negative_contribution: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Trend {
    First,
    Improved,
    Declined,
    Unchanged,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::First => "-",
            Trend::Improved => "improved",
            Trend::Declined => "declined",
            Trend::Unchanged => "unchanged",
        };
        f.write_str(label)
    }
}

impl From<Trend> for String {
    fn from(trend: Trend) -> String {
        trend.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRow {
    pub date: NaiveDate,
    pub order_count: usize,
    pub effective_denominator: f64,
    pub detractor_count: i64,
    pub promoter_score: f64,
    pub daily_nps: f64,
    pub cumulative_nps: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub enum Priority {
    DetractorFullWeight = 1,
    PartialWeight = 2,
    Other = 3,
}

impl Priority {
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> u8 {
        priority.level()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum FollowUpType {
    SolicitPositiveReview,
    ConvertDetractor,
    NoFollowUpNeeded,
}

impl fmt::Display for FollowUpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FollowUpType::SolicitPositiveReview => "solicit positive review",
            FollowUpType::ConvertDetractor => "convert detractor",
            FollowUpType::NoFollowUpNeeded => "no follow-up needed",
        };
        f.write_str(label)
    }
}

impl From<FollowUpType> for String {
    fn from(kind: FollowUpType) -> String {
        kind.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowUpRow {
    pub order_id: String,
    pub priority: Priority,
    pub priority_label: String,
    pub follow_up_type: FollowUpType,
    pub denominator_weight: f64,
    pub is_detractor: bool,
    pub has_user_feedback: bool,
    pub promoter_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplierSummary {
    pub id: i64,
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub dataset_id: Uuid,
    pub record_count: usize,
    pub supplier_count: usize,
    pub overall_nps: f64,
    pub suppliers: Vec<SupplierSummary>,
}

impl LoadSummary {
    pub fn message(&self) -> String {
        format!(
            "loaded {} records, {} suppliers",
            self.record_count, self.supplier_count
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallView {
    pub overall_nps: f64,
    pub target: i64,
    pub suppliers: Vec<SupplierRow>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SupplierBreakdown {
    pub followup: Vec<FollowUpRow>,
    pub date_dimension: Vec<DateRow>,
    pub account_dimension: Vec<MemberRow>,
    pub follower_dimension: Vec<MemberRow>,
}
