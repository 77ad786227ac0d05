use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dimension;
use crate::error::{AnalyzerError, Result};
use crate::export::{self, ExportBundle, SupplierTables};
use crate::followup;
use crate::metrics::{self, round_to};
use crate::models::{
    LoadSummary, Metrics, OverallView, Record, SupplierBreakdown, SupplierSummary,
};
use crate::schema::{self, RawTable};

pub const DEFAULT_NPS_TARGET: i64 = 60;

/// One validated, immutable dataset and its dataset-wide baseline.
#[derive(Debug)]
pub struct Dataset {
    pub id: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub records: Vec<Record>,
    pub overall: Metrics,
}

impl Dataset {
    fn new(records: Vec<Record>) -> Self {
        let overall = metrics::compute(&records);
        Self {
            id: Uuid::new_v4(),
            loaded_at: Utc::now(),
            records,
            overall,
        }
    }

    /// Distinct suppliers ordered by id, then name.
    pub fn suppliers(&self) -> Vec<SupplierSummary> {
        let mut counts: BTreeMap<(i64, &str), usize> = BTreeMap::new();
        for record in &self.records {
            *counts
                .entry((record.supplier_id, record.supplier_name.as_str()))
                .or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|((id, name), count)| SupplierSummary {
                id,
                name: name.to_string(),
                count,
            })
            .collect()
    }

    /// Suppliers counted by distinct name, which is what the load message
    /// reports.
    pub fn supplier_name_count(&self) -> usize {
        self.records
            .iter()
            .map(|record| record.supplier_name.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// The analyzer session. Loading swaps in a new `Arc<Dataset>`; queries work
/// on the snapshot they started with. A failed load keeps the previous
/// dataset. Callers sharing a session across threads wrap it in a lock.
#[derive(Debug)]
pub struct Analyzer {
    dataset: Option<Arc<Dataset>>,
    nps_target: i64,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            dataset: None,
            nps_target: DEFAULT_NPS_TARGET,
        }
    }

    pub fn load(&mut self, table: &RawTable, nps_target: i64) -> Result<LoadSummary> {
        let records = match schema::validate(table) {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "rejected dataset; keeping previous one");
                return Err(err);
            }
        };

        let dataset = Arc::new(Dataset::new(records));
        let suppliers = dataset.suppliers();
        let summary = LoadSummary {
            dataset_id: dataset.id,
            record_count: dataset.records.len(),
            supplier_count: dataset.supplier_name_count(),
            overall_nps: round_to(dataset.overall.nps, 2),
            suppliers,
        };

        info!(
            dataset_id = %dataset.id,
            records = summary.record_count,
            suppliers = summary.supplier_count,
            overall_nps = summary.overall_nps,
            "loaded dataset"
        );
        self.dataset = Some(dataset);
        self.nps_target = nps_target;
        Ok(summary)
    }

    pub fn set_target(&mut self, target: i64) -> Result<()> {
        self.dataset()?;
        self.nps_target = target;
        Ok(())
    }

    pub fn target(&self) -> i64 {
        self.nps_target
    }

    pub fn dataset(&self) -> Result<Arc<Dataset>> {
        self.dataset.clone().ok_or(AnalyzerError::NoDataset)
    }

    pub fn overall(&self) -> Result<OverallView> {
        let dataset = self.dataset()?;
        Ok(OverallView {
            overall_nps: round_to(dataset.overall.nps, 2),
            target: self.nps_target,
            suppliers: dimension::supplier_dimension(
                &dataset.records,
                dataset.overall.nps,
                self.nps_target,
            ),
        })
    }

    pub fn supplier(&self, supplier_id: i64) -> Result<SupplierBreakdown> {
        let dataset = self.dataset()?;
        Ok(breakdown(&dataset.records, supplier_id))
    }

    pub fn export(&self) -> Result<ExportBundle> {
        let dataset = self.dataset()?;
        let overall = self.overall()?;

        let suppliers = dataset
            .suppliers()
            .into_iter()
            .map(|supplier| {
                let views = breakdown(&dataset.records, supplier.id);
                SupplierTables::from_breakdown(supplier, &views)
            })
            .collect();

        Ok(ExportBundle {
            overall: export::overall_table(&overall.suppliers),
            suppliers,
        })
    }
}

fn breakdown(records: &[Record], supplier_id: i64) -> SupplierBreakdown {
    SupplierBreakdown {
        followup: followup::worklist(records, supplier_id),
        date_dimension: dimension::date_dimension(records, supplier_id),
        account_dimension: dimension::sub_account_dimension(records, supplier_id),
        follower_dimension: dimension::follower_dimension(records, supplier_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::{headers, row};

    fn table() -> RawTable {
        RawTable::new(
            headers(),
            vec![
                row([
                    "o-1", "1", "Alpha", "a1", "Desk", "2025-05-01", "f1", "Ana", "1", "1",
                    "0", "1",
                ]),
                row([
                    "o-2", "1", "Alpha", "a2", "Web", "2025-05-02", "f1", "Ana", "1", "0",
                    "1", "0",
                ]),
                row([
                    "o-3", "2", "Beta", "b1", "Desk", "2025-05-01", "f2", "Bo", "1", "0", "1",
                    "1",
                ]),
            ],
        )
    }

    #[test]
    fn queries_before_load_fail_with_no_dataset() {
        let mut analyzer = Analyzer::new();
        assert_eq!(analyzer.overall().unwrap_err(), AnalyzerError::NoDataset);
        assert_eq!(analyzer.supplier(1).unwrap_err(), AnalyzerError::NoDataset);
        assert_eq!(analyzer.export().unwrap_err(), AnalyzerError::NoDataset);
        assert_eq!(analyzer.set_target(70).unwrap_err(), AnalyzerError::NoDataset);
    }

    #[test]
    fn load_reports_summary_and_baseline() {
        let mut analyzer = Analyzer::new();
        let summary = analyzer.load(&table(), 50).unwrap();
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.supplier_count, 2);
        assert_eq!(summary.overall_nps, 33.33);
        assert_eq!(summary.message(), "loaded 3 records, 2 suppliers");
        assert_eq!(summary.suppliers[0].name, "Alpha");
        assert_eq!(summary.suppliers[0].count, 2);
        assert_eq!(analyzer.target(), 50);
    }

    #[test]
    fn supplier_count_is_by_name() {
        let mut rows = table().rows;
        rows.push(row([
            "o-4", "3", "Beta", "b2", "Desk", "2025-05-03", "f2", "Bo", "1", "0", "1", "1",
        ]));
        let mut analyzer = Analyzer::new();
        let summary = analyzer.load(&RawTable::new(headers(), rows), 60).unwrap();
        assert_eq!(summary.supplier_count, 2);
        assert_eq!(summary.suppliers.len(), 3);
        assert_eq!(summary.message(), "loaded 4 records, 2 suppliers");
    }

    #[test]
    fn failed_reload_keeps_previous_dataset() {
        let mut analyzer = Analyzer::new();
        let first = analyzer.load(&table(), 60).unwrap();

        let broken = RawTable::new(vec!["order_id".to_string()], Vec::new());
        assert!(matches!(
            analyzer.load(&broken, 10),
            Err(AnalyzerError::MissingColumns { .. })
        ));
        assert_eq!(analyzer.dataset().unwrap().id, first.dataset_id);
        assert_eq!(analyzer.target(), 60);
    }

    #[test]
    fn successful_reload_replaces_dataset() {
        let mut analyzer = Analyzer::new();
        let first = analyzer.load(&table(), 60).unwrap();
        let held = analyzer.dataset().unwrap();

        let mut smaller = table();
        smaller.rows.truncate(1);
        let second = analyzer.load(&smaller, 60).unwrap();

        assert_ne!(first.dataset_id, second.dataset_id);
        assert_eq!(analyzer.dataset().unwrap().records.len(), 1);
        assert_eq!(held.records.len(), 3);
    }

    #[test]
    fn target_changes_only_the_flag() {
        let mut analyzer = Analyzer::new();
        analyzer.load(&table(), 60).unwrap();
        let before = analyzer.overall().unwrap();
        assert!(before.suppliers.iter().any(|row| row.below_target));

        analyzer.set_target(-100).unwrap();
        let after = analyzer.overall().unwrap();
        assert_eq!(after.target, -100);
        assert!(after.suppliers.iter().all(|row| !row.below_target));
        for (a, b) in before.suppliers.iter().zip(after.suppliers.iter()) {
            assert_eq!(a.metrics, b.metrics);
            assert_eq!(a.contribution, b.contribution);
        }
    }

    #[test]
    fn supplier_query_returns_all_views() {
        let mut analyzer = Analyzer::new();
        analyzer.load(&table(), 60).unwrap();
        let views = analyzer.supplier(1).unwrap();
        assert_eq!(views.followup.len(), 2);
        assert_eq!(views.followup[0].order_id, "o-1");
        assert_eq!(views.date_dimension.len(), 2);
        assert_eq!(views.account_dimension.len(), 2);
        assert_eq!(views.follower_dimension.len(), 1);

        let unknown = analyzer.supplier(404).unwrap();
        assert!(unknown.followup.is_empty());
        assert!(unknown.date_dimension.is_empty());
    }

    #[test]
    fn empty_table_loads_with_zero_baseline() {
        let mut analyzer = Analyzer::new();
        let summary = analyzer.load(&RawTable::new(headers(), Vec::new()), 60).unwrap();
        assert_eq!(summary.record_count, 0);
        assert_eq!(summary.overall_nps, 0.0);
        assert!(analyzer.overall().unwrap().suppliers.is_empty());
    }
}
