use crate::error::{PlotError, Result};
use csv::ReaderBuilder;
use std::collections::BTreeMap;

/// One row of a plot CSV, keyed by column header.
///
/// Columns may arrive in any order and any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlotRow {
    fields: BTreeMap<String, String>,
}

impl RawPlotRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, replacing any previous value.
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.fields.insert(column.to_string(), value.to_string());
        self
    }

    /// The trimmed value of `column`, or `None` when it is missing or blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// The value of `column` exactly as read.
    pub fn raw(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawPlotRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        RawPlotRow {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Parse a plot CSV (header row required) into raw rows.
///
/// Header names are trimmed and a leading byte-order mark is dropped. Short
/// rows are accepted; their trailing columns are simply absent.
pub fn read_plot_rows(csv_data: &str) -> Result<Vec<RawPlotRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(PlotError::MissingHeaders);
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row: RawPlotRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, value)| (header.clone(), value.to_string()))
            .collect();
        rows.push(row);
    }
    log::info!("[BCR Debug] raw: Read {} plot rows", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rows_by_header_name() {
        let csv = "\
NDVI,ID,Project_Type
0.41,P-001,Mangrove
0.55,P-002,Seagrass
";
        let rows = read_plot_rows(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("ID"), Some("P-001"));
        assert_eq!(rows[1].get("Project_Type"), Some("Seagrass"));
        assert_eq!(rows[1].get("NDVI"), Some("0.55"));
    }

    #[test]
    fn missing_and_blank_columns_are_absent() {
        let csv = "\
ID,Data_Source,NDVI
P-001,   ,0.3
P-002
";
        let rows = read_plot_rows(csv).unwrap();
        assert_eq!(rows[0].get("Data_Source"), None);
        assert_eq!(rows[0].raw("Data_Source"), Some("   "));
        assert_eq!(rows[1].get("NDVI"), None);
        assert_eq!(rows[1].raw("NDVI"), None);
        assert_eq!(rows[0].get("Timestamp"), None);
    }

    #[test]
    fn strips_bom_and_header_whitespace() {
        let csv = "\u{feff}ID , GPS_Lat\nP-9,1.5\n";
        let rows = read_plot_rows(csv).unwrap();
        assert_eq!(rows[0].get("ID"), Some("P-9"));
        assert_eq!(rows[0].get("GPS_Lat"), Some("1.5"));
    }

    #[test]
    fn empty_source_has_no_headers() {
        assert!(matches!(read_plot_rows(""), Err(PlotError::MissingHeaders)));
    }

    #[test]
    fn header_only_source_has_no_rows() {
        let rows = read_plot_rows("ID,NDVI\n").unwrap();
        assert!(rows.is_empty());
    }
}
