use std::cmp::Ordering;

use crate::dimension::supplier_rows;
use crate::models::{FollowUpRow, FollowUpType, Priority, Record};

/// First matching rule wins: a full-weight detractor, then any 0.6 weight.
pub fn priority(record: &Record) -> (Priority, String) {
    if record.denominator_weight == 1.0 && record.detractor.is_set() {
        (
            Priority::DetractorFullWeight,
            "denominator-1 + detractor".to_string(),
        )
    } else if record.denominator_weight == 0.6 {
        (Priority::PartialWeight, "denominator-0.6".to_string())
    } else {
        (
            Priority::Other,
            // always carries a decimal point: `denominator-1.0`, `denominator-0.3`
            format!("denominator-{:?}", record.denominator_weight),
        )
    }
}

pub fn follow_up_type(record: &Record) -> FollowUpType {
    if !record.has_user_feedback.is_set() {
        FollowUpType::SolicitPositiveReview
    } else if record.detractor.is_set() {
        FollowUpType::ConvertDetractor
    } else {
        FollowUpType::NoFollowUpNeeded
    }
}

pub fn classify(record: &Record) -> FollowUpRow {
    let (priority, priority_label) = priority(record);
    FollowUpRow {
        order_id: record.order_id.clone(),
        priority,
        priority_label,
        follow_up_type: follow_up_type(record),
        denominator_weight: record.denominator_weight,
        is_detractor: record.detractor.is_set(),
        has_user_feedback: record.has_user_feedback.is_set(),
        promoter_score: record.promoter_score,
    }
}

/// A supplier's orders as a worklist: most urgent priority first, heavier
/// weight first within a priority.
pub fn worklist(records: &[Record], supplier_id: i64) -> Vec<FollowUpRow> {
    let mut rows: Vec<FollowUpRow> = supplier_rows(records, supplier_id)
        .into_iter()
        .map(classify)
        .collect();

    rows.sort_by(|a, b| {
        a.priority.cmp(&b.priority).then_with(|| {
            b.denominator_weight
                .partial_cmp(&a.denominator_weight)
                .unwrap_or(Ordering::Equal)
        })
    });
    rows
}
