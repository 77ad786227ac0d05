use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::error::{AnalyzerError, Result};
use crate::models::{Flag, Record};

/// A parsed table of text cells: the hand-off point between the file or
/// database readers and the analyzer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    OrderId,
    SupplierId,
    SupplierName,
    SubAccountId,
    SubAccountName,
    TravelDate,
    FollowerId,
    FollowerName,
    DenominatorWeight,
    DetractorFlag,
    PromoterScore,
    HasUserFeedback,
}

impl Column {
    pub const REQUIRED: [Column; 12] = [
        Column::OrderId,
        Column::SupplierId,
        Column::SupplierName,
        Column::SubAccountId,
        Column::SubAccountName,
        Column::TravelDate,
        Column::FollowerId,
        Column::FollowerName,
        Column::DenominatorWeight,
        Column::DetractorFlag,
        Column::PromoterScore,
        Column::HasUserFeedback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::OrderId => "order_id",
            Column::SupplierId => "supplier_id",
            Column::SupplierName => "supplier_name",
            Column::SubAccountId => "sub_account_id",
            Column::SubAccountName => "sub_account_name",
            Column::TravelDate => "travel_date",
            Column::FollowerId => "follower_id",
            Column::FollowerName => "follower_name",
            Column::DenominatorWeight => "denominator_weight",
            Column::DetractorFlag => "detractor_flag",
            Column::PromoterScore => "promoter_score",
            Column::HasUserFeedback => "has_user_feedback",
        }
    }

    /// Header used by the survey export this tool was first written against.
    pub fn alias(self) -> &'static str {
        match self {
            Column::OrderId => "订单号",
            Column::SupplierId => "成团供应商id",
            Column::SupplierName => "成团供应商名称",
            Column::SubAccountId => "成团子账号uid",
            Column::SubAccountName => "成团子账号名称",
            Column::TravelDate => "成团出行日期",
            Column::FollowerId => "跟进人id",
            Column::FollowerName => "跟进人姓名",
            Column::DenominatorWeight => "分母V5",
            Column::DetractorFlag => "拟合诋毁V5",
            Column::PromoterScore => "拟合推荐V5",
            Column::HasUserFeedback => "有用户反馈",
        }
    }

    fn matches(self, header: &str) -> bool {
        let header = header.trim_start_matches('\u{feff}').trim();
        header == self.name() || header == self.alias()
    }
}

/// Column positions for every required field, indexed by `Column`.
struct Layout {
    positions: [usize; 12],
}

impl Layout {
    fn resolve(headers: &[String]) -> Result<Self> {
        let mut positions = [0usize; 12];
        let mut missing = Vec::new();

        for (slot, column) in Column::REQUIRED.iter().enumerate() {
            match headers.iter().position(|header| column.matches(header)) {
                Some(idx) => positions[slot] = idx,
                None => missing.push(column.name().to_string()),
            }
        }

        if missing.is_empty() {
            Ok(Self { positions })
        } else {
            Err(AnalyzerError::MissingColumns { missing })
        }
    }

    fn cell<'r>(&self, row: &'r [String], column: Column) -> &'r str {
        row.get(self.positions[column as usize])
            .map(|value| value.trim())
            .unwrap_or("")
    }
}

/// Check that every required column is present, then coerce each row into a
/// typed `Record`. Any bad cell rejects the whole table.
pub fn validate(table: &RawTable) -> Result<Vec<Record>> {
    let layout = Layout::resolve(&table.headers)?;

    table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| parse_row(&layout, row, idx + 1))
        .collect()
}

fn parse_row(layout: &Layout, row: &[String], line: usize) -> Result<Record> {
    let cell = |column: Column| Cell {
        column,
        line,
        value: layout.cell(row, column),
    };

    Ok(Record {
        order_id: cell(Column::OrderId).identifier()?,
        supplier_id: cell(Column::SupplierId).integer()?,
        supplier_name: cell(Column::SupplierName).text()?,
        sub_account_id: cell(Column::SubAccountId).identifier()?,
        sub_account_name: cell(Column::SubAccountName).text()?,
        travel_date: cell(Column::TravelDate).date()?,
        follower_id: cell(Column::FollowerId).identifier()?,
        follower_name: cell(Column::FollowerName).text()?,
        denominator_weight: cell(Column::DenominatorWeight).weight()?,
        detractor: cell(Column::DetractorFlag).flag()?,
        promoter_score: cell(Column::PromoterScore).number()?,
        has_user_feedback: cell(Column::HasUserFeedback).flag()?,
    })
}

struct Cell<'r> {
    column: Column,
    line: usize,
    value: &'r str,
}

impl Cell<'_> {
    fn invalid(&self, reason: &str) -> AnalyzerError {
        AnalyzerError::InvalidValue {
            row: self.line,
            column: self.column.name(),
            value: self.value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn text(&self) -> Result<String> {
        if self.value.is_empty() {
            return Err(self.invalid("value is required"));
        }
        Ok(self.value.to_string())
    }

    /// Spreadsheets hand numeric ids back as `123.0`.
    fn identifier(&self) -> Result<String> {
        let value = self.text()?;
        match value.strip_suffix(".0") {
            Some(whole) if whole.parse::<i64>().is_ok() => Ok(whole.to_string()),
            _ => Ok(value),
        }
    }

    fn integer(&self) -> Result<i64> {
        let value = self.text()?;
        if let Ok(parsed) = value.parse::<i64>() {
            return Ok(parsed);
        }
        match value.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() && parsed.fract() == 0.0 => Ok(parsed as i64),
            _ => Err(self.invalid("expected an integer")),
        }
    }

    fn number(&self) -> Result<f64> {
        match self.text()?.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => Ok(parsed),
            _ => Err(self.invalid("expected a number")),
        }
    }

    fn weight(&self) -> Result<f64> {
        let weight = self.number()?;
        if weight < 0.0 {
            return Err(self.invalid("weight must not be negative"));
        }
        Ok(weight + 0.0)
    }

    fn flag(&self) -> Result<Flag> {
        let value = self.text()?;
        match value.to_ascii_lowercase().as_str() {
            "true" => return Ok(Flag::Yes),
            "false" => return Ok(Flag::No),
            _ => {}
        }
        match value.parse::<f64>() {
            Ok(parsed) if parsed == 0.0 => Ok(Flag::No),
            Ok(parsed) if parsed == 1.0 => Ok(Flag::Yes),
            _ => Err(self.invalid("expected 0 or 1")),
        }
    }

    fn date(&self) -> Result<NaiveDate> {
        let value = self.text()?;
        parse_date(&value).ok_or_else(|| self.invalid("expected a date"))
    }
}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// Accepts plain dates, date-times (the time part is dropped), RFC 3339
/// timestamps and spreadsheet day serials.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.date());
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime.date_naive());
    }

    let serial = value.parse::<f64>().ok()?;
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.trunc() as i64))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn headers() -> Vec<String> {
        Column::REQUIRED
            .iter()
            .map(|column| column.name().to_string())
            .collect()
    }

    pub(crate) fn row(values: [&str; 12]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn sample_row() -> Vec<String> {
        row([
            "A-1001", "17", "Harbor Tours", "88.0", "Desk", "2025-04-02 08:30:00", "5",
            "Lena", "1", "0", "0.85", "1",
        ])
    }

    #[test]
    fn coerces_a_valid_row() {
        let table = RawTable::new(headers(), vec![sample_row()]);
        let records = validate(&table).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.supplier_id, 17);
        assert_eq!(record.sub_account_id, "88");
        assert_eq!(record.travel_date, NaiveDate::from_ymd_opt(2025, 4, 2).unwrap());
        assert_eq!(record.denominator_weight, 1.0);
        assert_eq!(record.detractor, Flag::No);
        assert_eq!(record.has_user_feedback, Flag::Yes);
        assert_eq!(record.promoter_score, 0.85);
    }

    #[test]
    fn reports_every_missing_column() {
        let headers: Vec<String> = headers()
            .into_iter()
            .filter(|name| name != "order_id" && name != "promoter_score")
            .collect();
        let err = validate(&RawTable::new(headers, Vec::new())).unwrap_err();
        assert_eq!(
            err,
            AnalyzerError::MissingColumns {
                missing: vec!["order_id".to_string(), "promoter_score".to_string()],
            }
        );
    }

    #[test]
    fn accepts_localized_headers_in_any_order() {
        let mut headers: Vec<String> = Column::REQUIRED
            .iter()
            .map(|column| column.alias().to_string())
            .collect();
        headers[0] = format!("\u{feff}{}", headers[0]);
        headers.push("备注".to_string());
        let mut values = sample_row();
        values.push("extra".to_string());
        headers.swap(1, 2);
        values.swap(1, 2);

        let records = validate(&RawTable::new(headers, vec![values])).unwrap();
        assert_eq!(records[0].order_id, "A-1001");
        assert_eq!(records[0].supplier_id, 17);
        assert_eq!(records[0].supplier_name, "Harbor Tours");
    }

    #[test]
    fn rejects_non_binary_flag_with_row_and_column() {
        let mut values = sample_row();
        values[9] = "0.4".to_string();
        let err = validate(&RawTable::new(headers(), vec![sample_row(), values])).unwrap_err();
        match err {
            AnalyzerError::InvalidValue { row, column, value, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "detractor_flag");
                assert_eq!(value, "0.4");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_and_negative_cells() {
        let mut blank = sample_row();
        blank[2] = "  ".to_string();
        assert!(matches!(
            validate(&RawTable::new(headers(), vec![blank])),
            Err(AnalyzerError::InvalidValue { column: "supplier_name", .. })
        ));

        let mut negative = sample_row();
        negative[8] = "-1".to_string();
        assert!(matches!(
            validate(&RawTable::new(headers(), vec![negative])),
            Err(AnalyzerError::InvalidValue { column: "denominator_weight", .. })
        ));
    }

    #[test]
    fn flags_accept_float_and_boolean_text() {
        let mut values = sample_row();
        values[9] = "1.0".to_string();
        values[11] = "FALSE".to_string();
        let records = validate(&RawTable::new(headers(), vec![values])).unwrap();
        assert_eq!(records[0].detractor, Flag::Yes);
        assert_eq!(records[0].has_user_feedback, Flag::No);
    }

    #[test]
    fn parses_common_date_shapes() {
        let expected = NaiveDate::from_ymd_opt(2025, 4, 2);
        assert_eq!(parse_date("2025-04-02"), expected);
        assert_eq!(parse_date("2025/04/02"), expected);
        assert_eq!(parse_date("20250402"), None);
        assert_eq!(parse_date("2025-04-02T23:59:59"), expected);
        assert_eq!(parse_date("2025-04-02 07:00:00.250"), expected);
        assert_eq!(parse_date("2025-04-02T10:00:00+08:00"), expected);
        assert_eq!(parse_date("45749"), expected);
        assert_eq!(parse_date("next tuesday"), None);
    }
}
