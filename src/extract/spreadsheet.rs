//! Spreadsheet row extraction (.xlsx, .xls).

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveTime;
use std::collections::HashSet;
use std::path::Path;

use super::Table;
use crate::error::ExtractError;

/// Reads the first sheet. The first row names the columns; every later row
/// with at least one non-empty cell becomes a data row.
pub fn extract_spreadsheet(path: &Path) -> Result<Table, ExtractError> {
    let sheet_err = |source| ExtractError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(sheet_err)?;
    let Some(first) = workbook.sheet_names().first().cloned() else {
        return Err(ExtractError::EmptyWorkbook(path.to_path_buf()));
    };
    let range = workbook.worksheet_range(&first).map_err(sheet_err)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };

    let columns = unique_names(
        header
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let name = cell_text(cell);
                if name.is_empty() {
                    format!("Column {}", i + 1)
                } else {
                    name
                }
            })
            .collect(),
    );

    let rows: Vec<Vec<String>> = rows
        .map(|row| {
            let mut values: Vec<String> = row.iter().map(cell_text).collect();
            values.resize(columns.len(), String::new());
            values
        })
        .filter(|values| values.iter().any(|v| !v.is_empty()))
        .collect();

    crate::log(&format!(
        "Read {} row(s) x {} column(s) from sheet \"{}\" of {}",
        rows.len(),
        columns.len(),
        first,
        path.display()
    ));

    Ok(Table { columns, rows })
}

/// Suffixes repeated header names with `.1`, `.2`, ... so every column
/// stays addressable by name.
fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", name, n);
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::DateTime(dt) if dt.is_duration() => match dt.as_duration() {
            Some(d) => {
                let secs = d.num_seconds();
                format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
            }
            None => dt.to_string(),
        },
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) if value.time() == NaiveTime::MIN => value.format("%Y-%m-%d").to_string(),
            Some(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.to_string(),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn cell(col: usize, row: usize, value: &str) -> String {
        let r = format!("{}{}", (b'A' + col as u8) as char, row);
        match value.parse::<f64>() {
            Ok(_) => format!(r#"<c r="{}"><v>{}</v></c>"#, r, value),
            Err(_) => format!(r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#, r, value),
        }
    }

    /// Writes a minimal single-sheet workbook. Empty strings leave the cell out.
    pub(crate) fn write_xlsx(path: &Path, rows: &[&[&str]]) {
        let mut sheet = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet.push_str(&cell(c, r + 1, value));
                }
            }
            sheet.push_str("</row>");
        }
        sheet.push_str("</sheetData></worksheet>");
        write_package(path, sheet, None);
    }

    /// Zips a workbook around one sheet body and optional `xl/styles.xml`.
    pub(crate) fn write_package(path: &Path, sheet: String, styles: Option<&str>) {
        let mut parts = vec![
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Design Inputs" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
            ),
            ("xl/worksheets/sheet1.xml", sheet),
        ];
        if let Some(styles) = styles {
            parts.push(("xl/styles.xml", styles.to_string()));
        }

        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, body) in parts {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("inputs.xlsx");
        write_xlsx(
            &path,
            &[
                &["Part", "Material", ""],
                &["Shaft", "42CrMo4", "2"],
                &["", "", ""],
                &["Housing", "", "1"],
            ],
        );

        let table = extract_spreadsheet(&path).unwrap();
        assert_eq!(table.columns, vec!["Part", "Material", "Column 3"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["Shaft", "42CrMo4", "2"]);
        assert_eq!(table.rows[1], vec!["Housing", "", "1"]);
        assert_eq!(table.row_map(1).unwrap()["Column 3"], "1");
    }

    #[test]
    fn test_repeated_headers_stay_distinct() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qty.xlsx");
        write_xlsx(&path, &[&["Part", "Qty", "Qty", "Qty.1"], &["Bolt", "4", "8", "9"]]);

        let table = extract_spreadsheet(&path).unwrap();
        assert_eq!(table.columns, vec!["Part", "Qty", "Qty.1", "Qty.1.1"]);

        let merged = Table::concat(&[table]);
        assert_eq!(merged.rows, vec![vec!["Bolt", "4", "8", "9"]]);
        let row = merged.row_map(0).unwrap();
        assert_eq!(row["Qty"], "4");
        assert_eq!(row["Qty.1"], "8");
    }

    #[test]
    fn test_date_cells_are_formatted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dates.xlsx");
        let sheet = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Issued</t></is></c><c r="B1" t="inlineStr"><is><t>Inspected</t></is></c></row>"#,
            r#"<row r="2"><c r="A2" s="1"><v>45413</v></c><c r="B2" s="2"><v>45413.5</v></c></row>"#,
            r#"</sheetData></worksheet>"#,
        );
        let styles = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
            r#"<cellXfs count="3"><xf numFmtId="0"></xf><xf numFmtId="14" applyNumberFormat="1"></xf><xf numFmtId="22" applyNumberFormat="1"></xf></cellXfs>"#,
            r#"</styleSheet>"#,
        );
        write_package(&path, sheet.to_string(), Some(styles));

        let table = extract_spreadsheet(&path).unwrap();
        assert_eq!(table.rows, vec![vec!["2024-05-01", "2024-05-01 12:00:00"]]);
    }

    #[test]
    fn test_corrupt_workbook_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();
        let err = extract_spreadsheet(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Spreadsheet { .. }));
    }
}
