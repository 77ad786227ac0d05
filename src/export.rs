use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use crate::models::{
    DateRow, FollowUpRow, MemberRow, MetricColumns, SupplierBreakdown, SupplierRow,
    SupplierSummary,
};

pub const OVERALL_COLUMNS: [&str; 13] = [
    "rank",
    "supplier_id",
    "supplier_name",
    "order_count",
    "effective_denominator",
    "detractor_count",
    "promoter_score",
    "detractor_rate",
    "promoter_rate",
    "nps",
    "below_target",
    "contribution",
    "negative_contribution",
];

pub const FOLLOWUP_COLUMNS: [&str; 8] = [
    "order_id",
    "priority",
    "priority_label",
    "follow_up_type",
    "denominator_weight",
    "is_detractor",
    "has_user_feedback",
    "promoter_score",
];

pub const DATE_COLUMNS: [&str; 8] = [
    "date",
    "order_count",
    "effective_denominator",
    "detractor_count",
    "promoter_score",
    "daily_nps",
    "cumulative_nps",
    "trend",
];

pub const SUB_ACCOUNT_COLUMNS: [&str; 11] = [
    "sub_account_id",
    "sub_account_name",
    "order_count",
    "effective_denominator",
    "detractor_count",
    "promoter_score",
    "detractor_rate",
    "promoter_rate",
    "nps",
    "contribution",
    "negative_contribution",
];

pub const FOLLOWER_COLUMNS: [&str; 11] = [
    "follower_id",
    "follower_name",
    "order_count",
    "effective_denominator",
    "detractor_count",
    "promoter_score",
    "detractor_rate",
    "promoter_rate",
    "nps",
    "contribution",
    "negative_contribution",
];

/// A view flattened to text cells under a fixed column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(self.columns)?;
        for row in &self.rows {
            out.write_record(row)?;
        }
        out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SupplierTables {
    pub supplier: SupplierSummary,
    pub followup: Table,
    pub date: Table,
    pub sub_account: Table,
    pub follower: Table,
}

impl SupplierTables {
    pub fn from_breakdown(supplier: SupplierSummary, views: &SupplierBreakdown) -> Self {
        Self {
            supplier,
            followup: followup_table(&views.followup),
            date: date_table(&views.date_dimension),
            sub_account: member_table(
                "sub_account",
                &SUB_ACCOUNT_COLUMNS,
                &views.account_dimension,
            ),
            follower: member_table("follower", &FOLLOWER_COLUMNS, &views.follower_dimension),
        }
    }

    pub fn tables(&self) -> [&Table; 4] {
        [&self.followup, &self.date, &self.sub_account, &self.follower]
    }

    /// `<id>_<name>`, with the name cut to 20 characters and path separators
    /// replaced.
    pub fn directory_name(&self) -> String {
        let name: String = self
            .supplier
            .name
            .chars()
            .take(20)
            .map(|ch| if ch == '/' || ch == '\\' { '_' } else { ch })
            .collect();
        format!("{}_{}", self.supplier.id, name)
    }
}

#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub overall: Table,
    pub suppliers: Vec<SupplierTables>,
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

fn metric_cells(metrics: &MetricColumns) -> [String; 7] {
    [
        metrics.order_count.to_string(),
        metrics.effective_denominator.to_string(),
        metrics.detractor_count.to_string(),
        metrics.promoter_score.to_string(),
        metrics.detractor_rate.to_string(),
        metrics.promoter_rate.to_string(),
        metrics.nps.to_string(),
    ]
}

pub fn overall_table(rows: &[SupplierRow]) -> Table {
    Table {
        name: "overall",
        columns: &OVERALL_COLUMNS,
        rows: rows
            .iter()
            .map(|row| {
                let mut cells = vec![
                    row.rank.to_string(),
                    row.supplier_id.to_string(),
                    row.supplier_name.clone(),
                ];
                cells.extend(metric_cells(&row.metrics));
                cells.push(yes_no(row.below_target));
                cells.push(row.contribution.to_string());
                cells.push(yes_no(row.negative_contribution));
                cells
            })
            .collect(),
    }
}

pub fn followup_table(rows: &[FollowUpRow]) -> Table {
    Table {
        name: "followup",
        columns: &FOLLOWUP_COLUMNS,
        rows: rows
            .iter()
            .map(|row| {
                vec![
                    row.order_id.clone(),
                    row.priority.level().to_string(),
                    row.priority_label.clone(),
                    row.follow_up_type.to_string(),
                    row.denominator_weight.to_string(),
                    yes_no(row.is_detractor),
                    yes_no(row.has_user_feedback),
                    row.promoter_score.to_string(),
                ]
            })
            .collect(),
    }
}

pub fn date_table(rows: &[DateRow]) -> Table {
    Table {
        name: "date",
        columns: &DATE_COLUMNS,
        rows: rows
            .iter()
            .map(|row| {
                vec![
                    row.date.format("%Y-%m-%d").to_string(),
                    row.order_count.to_string(),
                    row.effective_denominator.to_string(),
                    row.detractor_count.to_string(),
                    row.promoter_score.to_string(),
                    row.daily_nps.to_string(),
                    row.cumulative_nps.to_string(),
                    row.trend.to_string(),
                ]
            })
            .collect(),
    }
}

pub fn member_table(
    name: &'static str,
    columns: &'static [&'static str],
    rows: &[MemberRow],
) -> Table {
    Table {
        name,
        columns,
        rows: rows
            .iter()
            .map(|row| {
                let mut cells = vec![row.id.clone(), row.name.clone()];
                cells.extend(metric_cells(&row.metrics));
                cells.push(row.contribution.to_string());
                cells.push(yes_no(row.negative_contribution));
                cells
            })
            .collect(),
    }
}

/// Write `overall.csv` plus one directory per supplier under `dir`. Empty
/// tables are skipped. Returns the written file paths.
pub fn write_bundle(bundle: &ExportBundle, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    if !bundle.overall.is_empty() {
        written.push(write_table(&bundle.overall, dir)?);
    }

    for supplier in &bundle.suppliers {
        let supplier_dir = dir.join("suppliers").join(supplier.directory_name());
        for table in supplier.tables() {
            if table.is_empty() {
                continue;
            }
            std::fs::create_dir_all(&supplier_dir)
                .with_context(|| format!("failed to create {}", supplier_dir.display()))?;
            written.push(write_table(table, &supplier_dir)?);
        }
        debug!(supplier_id = supplier.supplier.id, "exported supplier tables");
    }

    info!(files = written.len(), dir = %dir.display(), "export complete");
    Ok(written)
}

fn write_table(table: &Table, dir: &Path) -> anyhow::Result<PathBuf> {
    let path = dir.join(format!("{}.csv", table.name));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    table
        .write_csv(file)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::record;
    use crate::{dimension, metrics};

    fn sample_records() -> Vec<crate::models::Record> {
        let mut a = record(1, 1.0, 1, 0.0);
        a.supplier_name = "North/South Tours".to_string();
        let mut b = record(1, 0.6, 0, 0.77);
        b.supplier_name = "North/South Tours".to_string();
        b.sub_account_id = "acct-2".to_string();
        vec![a, b, record(2, 1.0, 0, 0.913), record(3, 1.0, 0, 0.25)]
    }

    #[test]
    fn overall_csv_reads_back_to_the_same_numbers() {
        let records = sample_records();
        let overall = metrics::compute(&records).nps;
        let rows = dimension::supplier_dimension(&records, overall, 60);
        let table = overall_table(&rows);

        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();

        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        let headers: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(|header| header.to_string())
            .collect();
        assert_eq!(headers, OVERALL_COLUMNS);

        let parsed: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(parsed.len(), rows.len());
        for (record, row) in parsed.iter().zip(rows.iter()) {
            assert_eq!(record[0].parse::<usize>().unwrap(), row.rank);
            assert_eq!(record[2].to_string(), row.supplier_name);
            assert_eq!(record[9].parse::<f64>().unwrap(), row.metrics.nps);
            assert_eq!(record[11].parse::<f64>().unwrap(), row.contribution);
            assert_eq!(&record[10], if row.below_target { "yes" } else { "no" });
        }
    }

    #[test]
    fn date_and_member_tables_follow_declared_columns() {
        let records = sample_records();
        let dates = date_table(&dimension::date_dimension(&records, 1));
        assert_eq!(dates.columns, DATE_COLUMNS);
        assert_eq!(dates.rows[0][0], "2025-03-01");
        assert_eq!(dates.rows[0][7], "-");
        assert!(dates.rows.iter().all(|row| row.len() == DATE_COLUMNS.len()));

        let accounts = member_table(
            "sub_account",
            &SUB_ACCOUNT_COLUMNS,
            &dimension::sub_account_dimension(&records, 1),
        );
        assert_eq!(accounts.rows.len(), 2);
        assert!(accounts
            .rows
            .iter()
            .all(|row| row.len() == SUB_ACCOUNT_COLUMNS.len()));
    }

    #[test]
    fn date_csv_reads_back_to_the_same_numbers() {
        let mut later = record(1, 1.0, 0, 0.9);
        later.travel_date = chrono::NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let mut records = sample_records();
        records.push(later);
        let rows = dimension::date_dimension(&records, 1);
        assert_eq!(rows.len(), 2);

        let mut buffer = Vec::new();
        date_table(&rows).write_csv(&mut buffer).unwrap();

        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        let parsed: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(parsed.len(), rows.len());
        for (record, row) in parsed.iter().zip(rows.iter()) {
            assert_eq!(&record[0], row.date.format("%Y-%m-%d").to_string());
            assert_eq!(record[1].parse::<usize>().unwrap(), row.order_count);
            assert_eq!(record[2].parse::<f64>().unwrap(), row.effective_denominator);
            assert_eq!(record[4].parse::<f64>().unwrap(), row.promoter_score);
            assert_eq!(record[5].parse::<f64>().unwrap(), row.daily_nps);
            assert_eq!(record[6].parse::<f64>().unwrap(), row.cumulative_nps);
            assert_eq!(&record[7], row.trend.to_string());
        }
        assert_eq!(&parsed[1][7], "improved");
    }

    #[test]
    fn directory_name_is_truncated_and_sanitized() {
        let tables = SupplierTables::from_breakdown(
            SupplierSummary {
                id: 9,
                name: "North/South Tours\\Extra Long Name".to_string(),
                count: 1,
            },
            &SupplierBreakdown::default(),
        );
        assert_eq!(tables.directory_name(), "9_North_South Tours_Ex");
        assert!(tables.tables().iter().all(|table| table.is_empty()));
    }
}
