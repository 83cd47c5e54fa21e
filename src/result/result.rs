use crate::core::{Row, Value};

/// Rows returned by a SELECT on the relational transport.
#[derive(Debug, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Renders the result as an aligned text table.
    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return "Empty result set\n".to_string();
        }

        let cell = |value: &Value| value.to_string();

        // Calculate column widths
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        for row in &self.rows {
            for (i, value) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(cell(value).len());
            }
        }

        let mut out = String::new();

        let header: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{:width$}", col, width = widths[i]))
            .collect();
        out.push_str(header.join(" | ").trim_end());
        out.push('\n');

        let separator: String = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        out.push_str(&separator);
        out.push('\n');

        for row in &self.rows {
            let row_str: Vec<String> = row
                .iter()
                .enumerate()
                .take(widths.len())
                .map(|(i, val)| format!("{:width$}", cell(val), width = widths[i]))
                .collect();
            out.push_str(row_str.join(" | ").trim_end());
            out.push('\n');
        }

        out.push_str(&format!("\n{} row(s)\n", self.rows.len()));
        out
    }
}
