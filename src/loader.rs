use crate::error::{AnalysisError, Result};
use crate::types::{CampaignRecord, CampaignTable, REQUIRED_COLUMNS};
use crate::util::parse_date_safe;
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub fn load_campaigns(path: &Path) -> Result<CampaignTable> {
    let file = File::open(path).map_err(|e| AnalysisError::DataAccess {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })?;
    let table = read_campaigns(file)?;
    info!(
        path = %path.display(),
        rows = table.records.len(),
        columns = table.columns.len(),
        "loaded campaign table"
    );
    Ok(table)
}

/// Read a campaign table from any CSV source.
///
/// Fails on the first missing required column, on the first row that does
/// not deserialize, and on a file with a header but no rows.
pub fn read_campaigns<R: Read>(reader: R) -> Result<CampaignTable> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|c| !columns.iter().any(|h| h == *c))
    {
        return Err(AnalysisError::MissingColumn(missing.to_string()));
    }

    let mut records = Vec::new();
    for result in rdr.deserialize::<CampaignRecord>() {
        records.push(result?);
    }
    if records.is_empty() {
        return Err(AnalysisError::EmptyTable);
    }
    debug!(rows = records.len(), "deserialized campaign records");

    Ok(CampaignTable { columns, records })
}

impl CampaignTable {
    /// Parse the date column. The result is parallel to `records`.
    pub fn coerce_dates(&self) -> Result<Vec<NaiveDate>> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                parse_date_safe(&r.date).ok_or_else(|| AnalysisError::InvalidDate {
                    // 1-based, header counts as row 1.
                    row: i + 2,
                    value: r.date.clone(),
                })
            })
            .collect()
    }

    /// Earliest and latest raw date strings, compared as text.
    pub fn date_range(&self) -> Option<(&str, &str)> {
        let min = self.records.iter().map(|r| r.date.as_str()).min()?;
        let max = self.records.iter().map(|r| r.date.as_str()).max()?;
        Some((min, max))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const HEADER: &str = "campana_id,fecha_campana,plataforma,tipo_campana,audiencia_objetivo,presupuesto_diario,costo_total,revenue_generado,impresiones,clicks,conversiones,alcance,ctr,conversion_rate,engagement_rate,roas,cpc,cpa";

    /// Build a CSV document with the full header and one line per row.
    pub(crate) fn csv_with_rows(rows: &[&str]) -> String {
        let mut s = String::from(HEADER);
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s.push('\n');
        s
    }

    /// The three-campaign table used across the crate's tests:
    /// platforms A, A, B; revenue 100, 200, 50; cost 50, 50, 100.
    pub(crate) fn three_row_table() -> CampaignTable {
        let csv = csv_with_rows(&[
            "C001,2024-01-15,A,Search,18-24,10,50,100,1000,50,5,800,5.0,10.0,3.0,2.0,1.0,10.0",
            "C002,2024-02-03,A,Display,25-34,20,50,200,2000,40,8,1500,2.0,20.0,4.0,4.0,1.25,6.25",
            "C003,2024-02-20,B,Search,18-24,30,100,50,4000,100,2,3000,2.5,2.0,1.5,0.5,1.0,50.0",
        ]);
        read_campaigns(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_read_campaigns() {
        let table = three_row_table();
        assert_eq!(table.records.len(), 3);
        assert_eq!(table.columns.len(), 18);
        let first = &table.records[0];
        assert_eq!(first.id, "C001");
        assert_eq!(first.platform, "A");
        assert_eq!(first.revenue, 100.0);
        assert_eq!(first.net_profit(), 50.0);
    }

    #[test]
    fn test_extra_columns_are_counted_but_ignored() {
        let csv = format!(
            "{},notas\nC001,2024-01-15,A,Search,18-24,10,50,100,1000,50,5,800,5.0,10.0,3.0,2.0,1.0,10.0,ok\n",
            HEADER
        );
        let table = read_campaigns(csv.as_bytes()).unwrap();
        assert_eq!(table.columns.len(), 19);
        assert_eq!(table.records.len(), 1);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let csv = "campana_id,fecha_campana\nC001,2024-01-15\n";
        match read_campaigns(csv.as_bytes()) {
            Err(AnalysisError::MissingColumn(c)) => assert_eq!(c, "plataforma"),
            other => panic!("expected missing column, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_value_is_fatal() {
        let csv = csv_with_rows(&[
            "C001,2024-01-15,A,Search,18-24,10,cincuenta,100,1000,50,5,800,5.0,10.0,3.0,2.0,1.0,10.0",
        ]);
        assert!(matches!(
            read_campaigns(csv.as_bytes()),
            Err(AnalysisError::Malformed(_))
        ));
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let csv = csv_with_rows(&[]);
        assert!(matches!(
            read_campaigns(csv.as_bytes()),
            Err(AnalysisError::EmptyTable)
        ));
    }

    #[test]
    fn test_missing_file_is_data_access_error() {
        let err = load_campaigns(Path::new("definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, AnalysisError::DataAccess { .. }));
    }

    #[test]
    fn test_coerce_dates_and_range() {
        let table = three_row_table();
        let dates = table.coerce_dates().unwrap();
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[1], NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
        assert_eq!(table.date_range(), Some(("2024-01-15", "2024-02-20")));
    }

    #[test]
    fn test_invalid_date_reports_row() {
        let mut table = three_row_table();
        table.records[1].date = "pronto".to_string();
        match table.coerce_dates() {
            Err(AnalysisError::InvalidDate { row, value }) => {
                assert_eq!(row, 3);
                assert_eq!(value, "pronto");
            }
            other => panic!("expected invalid date, got {:?}", other),
        }
    }
}
