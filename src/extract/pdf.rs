//! PDF page text extraction.

use lopdf::Document;
use std::path::Path;

use super::PdfText;
use crate::error::ExtractError;

/// Extracts the text of the first `max_pages` pages, in page order.
///
/// An N-page document yields `min(N, max_pages)` strings. Encrypted or
/// malformed files are an error; no partial output is returned.
pub fn extract_pdf_text(path: &Path, max_pages: usize) -> Result<PdfText, ExtractError> {
    let pdf_err = |source| ExtractError::Pdf {
        path: path.to_path_buf(),
        source,
    };

    let doc = Document::load(path).map_err(pdf_err)?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(ExtractError::EncryptedPdf(path.to_path_buf()));
    }

    // get_pages is keyed by 1-based page number, already in order
    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys().take(max_pages) {
        let text = doc.extract_text(&[*page_number]).map_err(pdf_err)?;
        pages.push(normalize(&text));
    }

    crate::log(&format!(
        "Extracted {} page(s) of text from {}",
        pages.len(),
        path.display()
    ));

    Ok(PdfText {
        source: path.to_path_buf(),
        pages,
    })
}

/// Collapses runs of blank lines and trims trailing whitespace.
fn normalize(text: &str) -> String {
    let mut out = Vec::new();
    let mut blank = false;
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            if !blank && !out.is_empty() {
                out.push(String::new());
            }
            blank = true;
        } else {
            out.push(line.to_string());
            blank = false;
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use tempfile::tempdir;

    /// Writes a PDF with one line of text per page ("Page 1 text", ...).
    pub(crate) fn write_pdf(path: &Path, page_count: usize) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for n in 1..=page_count {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 18.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {} text", n))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_first_three_pages_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("brief.pdf");
        write_pdf(&path, 5);

        let text = extract_pdf_text(&path, 3).unwrap();
        assert_eq!(text.pages.len(), 3);
        assert!(text.pages[0].contains("Page 1 text"));
        assert!(text.pages[2].contains("Page 3 text"));
    }

    #[test]
    fn test_short_document_yields_all_pages() {
        let dir = tempdir().unwrap();
        for n in [1usize, 2, 3] {
            let path = dir.path().join(format!("doc{}.pdf", n));
            write_pdf(&path, n);
            let text = extract_pdf_text(&path, 3).unwrap();
            assert_eq!(text.pages.len(), n);
        }
    }

    #[test]
    fn test_malformed_pdf_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\nthis is not a pdf body").unwrap();
        let err = extract_pdf_text(&path, 3).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf { .. }));
        assert!(err.to_string().contains("broken.pdf"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a  \n\n\n b\n\n"), "a\n\n b");
    }
}
