use std::fmt::Write;

use crate::error::Result;
use crate::models::{FollowUpRow, FollowUpType, Priority, SupplierRow};
use crate::session::Analyzer;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workload {
    pub solicit_positive: usize,
    pub convert_detractor: usize,
    pub no_follow_up: usize,
    pub urgent: usize,
}

pub fn summarize_workload(rows: &[FollowUpRow]) -> Workload {
    let mut workload = Workload::default();
    for row in rows {
        match row.follow_up_type {
            FollowUpType::SolicitPositiveReview => workload.solicit_positive += 1,
            FollowUpType::ConvertDetractor => workload.convert_detractor += 1,
            FollowUpType::NoFollowUpNeeded => workload.no_follow_up += 1,
        }
        if row.priority == Priority::DetractorFullWeight {
            workload.urgent += 1;
        }
    }
    workload
}

pub fn build_report(analyzer: &Analyzer) -> Result<String> {
    let dataset = analyzer.dataset()?;
    let overall = analyzer.overall()?;

    let mut output = String::new();
    let _ = writeln!(output, "# Supplier NPS Report");
    let _ = writeln!(
        output,
        "Dataset {} loaded {} ({} records)",
        dataset.id,
        dataset.loaded_at.format("%Y-%m-%d %H:%M UTC"),
        dataset.records.len()
    );
    let _ = writeln!(
        output,
        "Overall NPS {:.2} against a target of {}",
        overall.overall_nps, overall.target
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Supplier Ranking");
    if overall.suppliers.is_empty() {
        let _ = writeln!(output, "No suppliers in this dataset.");
    } else {
        let _ = writeln!(
            output,
            "| Rank | Supplier | Orders | NPS | Contribution | Below target |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for row in &overall.suppliers {
            let _ = writeln!(
                output,
                "| {} | {} ({}) | {} | {:.2} | {:.4} | {} |",
                row.rank,
                row.supplier_name,
                row.supplier_id,
                row.metrics.order_count,
                row.metrics.nps,
                row.contribution,
                if row.below_target { "yes" } else { "no" }
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Below Target");
    let below: Vec<&SupplierRow> = overall
        .suppliers
        .iter()
        .filter(|row| row.below_target)
        .collect();
    if below.is_empty() {
        let _ = writeln!(output, "Every supplier meets the target.");
    } else {
        for row in &below {
            let _ = writeln!(
                output,
                "- {} at {:.2} ({:.2} under)",
                row.supplier_name,
                row.metrics.nps,
                overall.target as f64 - row.metrics.nps
            );
        }
    }

    let mut draggers: Vec<&SupplierRow> = overall
        .suppliers
        .iter()
        .filter(|row| row.negative_contribution)
        .collect();
    draggers.sort_by(|a, b| a.contribution.total_cmp(&b.contribution));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Largest Negative Contributors");
    if draggers.is_empty() {
        let _ = writeln!(output, "No supplier pulls the overall score down.");
    } else {
        for row in draggers.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} contributes {:.4}",
                row.supplier_name, row.contribution
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Follow-up Workload");
    for supplier in dataset.suppliers() {
        let workload = summarize_workload(&analyzer.supplier(supplier.id)?.followup);
        let _ = writeln!(
            output,
            "- {}: {} to solicit, {} detractors to convert, {} settled, {} urgent",
            supplier.name,
            workload.solicit_positive,
            workload.convert_detractor,
            workload.no_follow_up,
            workload.urgent
        );
    }

    Ok(output)
}
