use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::{AnalyzerError, Result};
use crate::schema::RawTable;

pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|err| AnalyzerError::Read(format!("failed to connect to Postgres: {err}")))
}

/// Read a whole table with every column cast to text, so the same column
/// contract applies as for files.
pub async fn read_table(pool: &PgPool, schema: &str, table: &str) -> Result<RawTable> {
    let headers: Vec<String> = sqlx::query(
        r#"
        SELECT column_name::text AS column_name
        FROM information_schema.columns
        WHERE table_schema = $1 AND table_name = $2
        ORDER BY ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(read_error)?
    .into_iter()
    .map(|row| row.get("column_name"))
    .collect();

    if headers.is_empty() {
        return Err(AnalyzerError::Read(format!(
            "table {schema}.{table} not found or has no columns"
        )));
    }

    let records = sqlx::query(&select_as_text(schema, table, &headers))
        .fetch_all(pool)
        .await
        .map_err(read_error)?;

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut cells = Vec::with_capacity(headers.len());
        for idx in 0..headers.len() {
            let value: Option<String> = record.try_get(idx).map_err(read_error)?;
            cells.push(value.unwrap_or_default());
        }
        rows.push(cells);
    }

    debug!(schema, table, rows = rows.len(), "read table from Postgres");
    Ok(RawTable::new(headers, rows))
}

fn read_error(err: sqlx::Error) -> AnalyzerError {
    AnalyzerError::Read(err.to_string())
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn select_as_text(schema: &str, table: &str, columns: &[String]) -> String {
    let projection: Vec<String> = columns
        .iter()
        .map(|column| format!("{}::text", quote_ident(column)))
        .collect();
    format!(
        "SELECT {} FROM {}.{}",
        projection.join(", "),
        quote_ident(schema),
        quote_ident(table)
    )
}
