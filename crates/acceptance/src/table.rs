//! Named string-cell tables, the shape every provider hands to the engine.
//!
//! Cells stay as text until a typed row is extracted with [`Table::records`],
//! which checks the row type's required columns up front so a missing column
//! fails before any join runs.

use std::path::Path;
use std::str::FromStr;

use crate::error::{AcceptanceError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Build a table from string slices, mostly useful for fixtures.
    pub fn from_rows(name: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            name,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub fn from_csv(name: &str, csv_data: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }

        Ok(Self::new(name, headers, rows))
    }

    pub fn from_csv_path(name: &str, path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_csv(name, &data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| AcceptanceError::MissingColumn {
                table: self.name.clone(),
                column: column.into(),
            })
    }

    pub fn require_columns(&self, columns: &[&str]) -> Result<()> {
        for column in columns {
            self.column_index(column)?;
        }
        Ok(())
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(column)?;
        Ok(self
            .rows
            .iter()
            .map(|r| r.get(idx).map(String::as_str).unwrap_or(""))
            .collect())
    }

    /// Return a copy of this table with `f` applied to every cell of `column`.
    pub fn map_column(&self, column: &str, f: impl Fn(&str) -> String) -> Result<Table> {
        let idx = self.column_index(column)?;
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                if let Some(cell) = row.get_mut(idx) {
                    *cell = f(cell);
                }
                row
            })
            .collect();
        Ok(Table::new(self.name.clone(), self.headers.clone(), rows))
    }

    /// Extract typed rows. Fails with `MissingColumn` before reading any row
    /// if one of `T::COLUMNS` is absent.
    pub fn records<T: FromRow>(&self) -> Result<Vec<T>> {
        let positions: Vec<usize> = T::COLUMNS
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<_>>()?;

        self.rows
            .iter()
            .enumerate()
            .map(|(i, cells)| {
                T::from_row(&Row {
                    table: &self.name,
                    number: i + 1,
                    columns: T::COLUMNS,
                    positions: &positions,
                    cells,
                })
            })
            .collect()
    }
}

/// A typed row that can be read out of a [`Table`].
pub trait FromRow: Sized {
    /// Columns the row reads. All must exist on the table.
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> Result<Self>;
}

/// Borrowed view of one table row, addressed by column name.
pub struct Row<'a> {
    table: &'a str,
    number: usize,
    columns: &'static [&'static str],
    positions: &'a [usize],
    cells: &'a [String],
}

impl<'a> Row<'a> {
    fn raw(&self, column: &str) -> &'a str {
        self.columns
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.cells.get(self.positions[i]))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn text(&self, column: &str) -> String {
        self.raw(column).to_string()
    }

    /// Empty cells read as `None`.
    pub fn opt_text(&self, column: &str) -> Option<String> {
        let value = self.raw(column);
        (!value.is_empty()).then(|| value.to_string())
    }

    pub fn parse<T: FromStr>(&self, column: &str) -> Result<T> {
        let value = self.raw(column);
        value.parse().map_err(|_| self.parse_error(column, value))
    }

    /// Empty cells and `NaN` read as `None`.
    pub fn opt_parse<T: FromStr>(&self, column: &str) -> Result<Option<T>> {
        let value = self.raw(column);
        if value.is_empty() || value.eq_ignore_ascii_case("nan") {
            return Ok(None);
        }
        value
            .parse()
            .map(Some)
            .map_err(|_| self.parse_error(column, value))
    }

    fn parse_error(&self, column: &str, value: &str) -> AcceptanceError {
        AcceptanceError::ValueParse {
            table: self.table.to_string(),
            row: self.number,
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Flow {
        origin: String,
        flow: f64,
        note: Option<String>,
    }

    impl FromRow for Flow {
        const COLUMNS: &'static [&'static str] = &["origin", "flow", "note"];

        fn from_row(row: &Row<'_>) -> Result<Self> {
            Ok(Self {
                origin: row.text("origin"),
                flow: row.parse("flow")?,
                note: row.opt_text("note"),
            })
        }
    }

    #[test]
    fn load_csv_and_extract() {
        let csv = "\
origin,flow,note,extra
Alameda, 12.5 ,,x
Marin,3,late,y
";
        let table = Table::from_csv("flows", csv).unwrap();
        assert_eq!(table.len(), 2);

        let rows: Vec<Flow> = table.records().unwrap();
        assert_eq!(rows[0].origin, "Alameda");
        assert_eq!(rows[0].flow, 12.5);
        assert_eq!(rows[0].note, None);
        assert_eq!(rows[1].note.as_deref(), Some("late"));
    }

    #[test]
    fn missing_column_fails_before_rows() {
        // The bad flow value would fail parsing, but the schema check runs first.
        let table = Table::from_rows("flows", &["origin", "flow"], &[&["Napa", "oops"]]);
        let err = table.records::<Flow>().unwrap_err();
        match err {
            AcceptanceError::MissingColumn { table, column } => {
                assert_eq!(table, "flows");
                assert_eq!(column, "note");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_reports_row_number() {
        let table = Table::from_rows(
            "flows",
            &["origin", "flow", "note"],
            &[&["Napa", "1", ""], &["Solano", "many", ""]],
        );
        let err = table.records::<Flow>().unwrap_err();
        match err {
            AcceptanceError::ValueParse { row, column, value, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "flow");
                assert_eq!(value, "many");
            }
            other => panic!("expected ValueParse, got {other:?}"),
        }
    }

    #[test]
    fn map_column_leaves_source_untouched() {
        let table = Table::from_rows("t", &["a", "b"], &[&["x", "y"]]);
        let upper = table.map_column("b", |v| v.to_uppercase()).unwrap();
        assert_eq!(upper.column_values("b").unwrap(), vec!["Y"]);
        assert_eq!(table.column_values("b").unwrap(), vec!["y"]);
        assert!(table.map_column("c", |v| v.to_string()).is_err());
    }
}
