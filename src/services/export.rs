//! CSV export of the article collection

use crate::models::ArticleExportRow;
use anyhow::{Context, Result};

/// Column headings of the export, in order
pub const CSV_HEADER: [&str; 6] = ["ID", "Title", "Abstract", "Publication Date", "Authors", "Tags"];

/// Separator between names inside the Authors and Tags cells
const NAME_SEPARATOR: &str = ", ";

/// Render export rows as CSV, one line per article in the order given.
pub fn render_csv(rows: &[ArticleExportRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(CSV_HEADER)
        .context("Failed to write CSV header")?;

    for row in rows {
        writer
            .write_record([
                row.id.to_string(),
                row.title.clone(),
                row.abstract_text.clone(),
                row.publication_date.format("%Y-%m-%d").to_string(),
                row.authors.join(NAME_SEPARATOR),
                row.tags.join(NAME_SEPARATOR),
            ])
            .with_context(|| format!("Failed to write CSV row for article {}", row.id))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn row(id: i64, title: &str, authors: &[&str], tags: &[&str]) -> ArticleExportRow {
        ArticleExportRow {
            id,
            title: title.to_string(),
            abstract_text: "A".to_string(),
            publication_date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            authors: authors.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_empty_export_is_header_only() {
        let csv = render_csv(&[]).unwrap();
        assert_eq!(csv, "ID,Title,Abstract,Publication Date,Authors,Tags\n");
    }

    #[test]
    fn test_names_are_joined_and_quoted() {
        let csv = render_csv(&[row(3, "Hello", &["ann", "bob"], &["x"])]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "3,Hello,A,2025-03-09,\"ann, bob\",x");
    }

    #[test]
    fn test_quotes_and_newlines_are_escaped() {
        let csv = render_csv(&[row(1, "Say \"hi\"\nnow", &[], &[])]).unwrap();

        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[1], "Say \"hi\"\nnow");
        assert_eq!(&record[4], "");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn prop_one_record_per_row_in_order(
            titles in prop::collection::vec("[a-zA-Z ,\"]{0,12}", 0..8),
        ) {
            let rows: Vec<ArticleExportRow> = titles
                .iter()
                .enumerate()
                .map(|(i, t)| row(i as i64 + 1, t, &["u"], &[]))
                .collect();

            let csv = render_csv(&rows).unwrap();
            let mut reader = csv::Reader::from_reader(csv.as_bytes());

            let headers = reader.headers().unwrap().clone();
            prop_assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_HEADER.to_vec());

            let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
            prop_assert_eq!(records.len(), rows.len());
            for (record, row) in records.iter().zip(&rows) {
                let id = row.id.to_string();
                prop_assert_eq!(&record[0], id.as_str());
                prop_assert_eq!(&record[1], row.title.as_str());
            }
        }
    }
}
