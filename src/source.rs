use std::io;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::debug;

use crate::error::{AnalyzerError, Result};
use crate::schema::RawTable;

/// Pick a reader from the file extension: `.xlsx`/`.xls`/`.xlsm`/`.ods` go
/// through calamine, everything else is read as CSV.
pub fn read_path(path: &Path) -> Result<RawTable> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let table = match extension.as_deref() {
        Some("xlsx" | "xls" | "xlsm" | "xlsb" | "ods") => read_workbook(path)?,
        _ => {
            let file = std::fs::File::open(path)
                .map_err(|err| AnalyzerError::Read(format!("{}: {err}", path.display())))?;
            read_csv(file)?
        }
    };

    debug!(
        path = %path.display(),
        columns = table.headers.len(),
        rows = table.rows.len(),
        "read table"
    );
    Ok(table)
}

pub fn read_csv<R: io::Read>(reader: R) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| AnalyzerError::Read(err.to_string()))?
        .iter()
        .map(|header| header.to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| AnalyzerError::Read(err.to_string()))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(pad(record.iter().map(str::to_string).collect(), headers.len()));
    }

    Ok(RawTable::new(headers, rows))
}

/// First sheet, first row as headers.
pub fn read_workbook(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|err| AnalyzerError::Read(format!("{}: {err}", path.display())))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AnalyzerError::Read(format!("{}: workbook has no sheets", path.display())))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|err| AnalyzerError::Read(format!("sheet {sheet:?}: {err}")))?;

    let mut lines = range.rows();
    let headers: Vec<String> = match lines.next() {
        Some(header) => header.iter().map(cell_text).collect(),
        None => return Ok(RawTable::default()),
    };

    let rows = lines
        .map(|line| line.iter().map(cell_text).collect::<Vec<String>>())
        .filter(|cells| cells.iter().any(|cell| !cell.trim().is_empty()))
        .map(|cells| pad(cells, headers.len()))
        .collect();

    Ok(RawTable::new(headers, rows))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) | Data::DateTimeIso(value) | Data::DurationIso(value) => {
            value.clone()
        }
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => match value.as_datetime() {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string(),
        },
        other => other.to_string(),
    }
}

fn pad(mut cells: Vec<String>, width: usize) -> Vec<String> {
    if cells.len() < width {
        cells.resize(width, String::new());
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_csv_with_short_and_blank_rows() {
        let data = "order_id,supplier_id,supplier_name\nA-1,7,Harbor\n\nA-2,8\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["order_id", "supplier_id", "supplier_name"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["A-2", "8", ""]);
    }

    #[test]
    fn malformed_csv_is_a_read_error() {
        let data: &[u8] = b"order_id,name\n\xff\xfe,\"broken\n";
        assert!(matches!(read_csv(data), Err(AnalyzerError::Read(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = read_path(Path::new("does/not/exist.csv")).unwrap_err();
        assert!(matches!(err, AnalyzerError::Read(_)));
    }

    #[test]
    fn spreadsheet_cells_render_as_plain_text() {
        assert_eq!(cell_text(&Data::Float(1234.0)), "1234");
        assert_eq!(cell_text(&Data::Float(0.6)), "0.6");
        assert_eq!(cell_text(&Data::Int(17)), "17");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("Lena".to_string())), "Lena");
    }
}
