//! PDF text extraction module
//!
//! Extracts text content from PDF files using lopdf. Pages are cleaned one by
//! one and joined with a blank line.

use docchat_common::errors::{AppError, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Separator placed between pages
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Extract text content from a PDF file
pub fn extract_text_from_pdf(path: &Path) -> Result<String> {
    let doc = lopdf::Document::load(path).map_err(|e| AppError::Pdf {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut page_texts = Vec::with_capacity(pages.len());
    let mut raw_len = 0;

    for (page_num, page_id) in pages {
        match extract_page_text(&doc, page_num, page_id) {
            Ok(page_text) => {
                raw_len += page_text.len();
                let cleaned = clean_text(&page_text);
                if !cleaned.is_empty() {
                    page_texts.push(cleaned);
                }
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    if page_texts.is_empty() {
        return Err(AppError::Pdf {
            path: path.display().to_string(),
            message: "No text content extracted from PDF".to_string(),
        });
    }

    let text = page_texts.join(PAGE_SEPARATOR);

    debug!(
        original_len = raw_len,
        cleaned_len = text.len(),
        pages_with_text = page_texts.len(),
        "Text extraction complete"
    );

    Ok(text)
}

/// Extract text from a single page: lopdf's font-aware extraction first, then
/// a plain scan of the content stream
fn extract_page_text(
    doc: &lopdf::Document,
    page_num: u32,
    page_id: lopdf::ObjectId,
) -> std::result::Result<String, String> {
    match doc.extract_text(&[page_num]) {
        Ok(text) if !text.trim().is_empty() => return Ok(text),
        Ok(_) => debug!(page = page_num, "Font-aware extraction empty, scanning content stream"),
        Err(e) => debug!(page = page_num, error = %e, "Font-aware extraction failed, scanning content stream"),
    }

    let content = doc.get_page_content(page_id).map_err(|e| e.to_string())?;
    Ok(extract_text_from_content(&content))
}

/// Extract text from PDF content stream
fn extract_text_from_content(content: &[u8]) -> String {
    // Text lives between BT and ET operators
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push(' ');
                current_text.clear();
            }
            continue;
        }

        if in_text_block {
            if let Some(text_content) = extract_text_from_operator(trimmed) {
                current_text.push_str(&text_content);
            }
        }
    }

    text
}

/// Extract text from a PDF text-showing operator (Tj, TJ, ', ")
fn extract_text_from_operator(line: &str) -> Option<String> {
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        let start = line.find('(')?;
        let end = line.rfind(')')?;
        if end <= start {
            return None;
        }
        return Some(decode_pdf_string(&line[start + 1..end]));
    }

    // [(text) -120 (text)] TJ
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut depth = 0usize;
        let mut escaped = false;
        let mut current = String::new();

        for ch in line.chars() {
            if depth > 0 {
                if escaped {
                    current.push('\\');
                    current.push(ch);
                    escaped = false;
                    continue;
                }
                match ch {
                    '\\' => escaped = true,
                    '(' => {
                        depth += 1;
                        current.push(ch);
                    }
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            result.push_str(&decode_pdf_string(&current));
                            current.clear();
                        } else {
                            current.push(ch);
                        }
                    }
                    _ => current.push(ch),
                }
            } else if ch == '(' {
                depth = 1;
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('(') => result.push('('),
                Some(')') => result.push(')'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Collapse whitespace and strip common PDF artifacts
fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|&c| c != '\u{FEFF}' && c != '\u{FFFD}')
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Write a minimal PDF with one text line per page
    pub(crate) fn write_pdf(path: &Path, pages: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_clean_text() {
        let input = "Hello   World\n\nTest";
        assert_eq!(clean_text(input), "Hello World Test");
        assert_eq!(clean_text("\u{201C}quoted\u{201D} it\u{2019}s"), "\"quoted\" it's");
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string("Hello\\nWorld"), "Hello\nWorld");
        assert_eq!(decode_pdf_string("Test\\(paren\\)"), "Test(paren)");
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!(
            extract_text_from_operator("(Hello) Tj").as_deref(),
            Some("Hello")
        );
        assert_eq!(
            extract_text_from_operator("[(Hel) -20 (lo \\(x\\))] TJ").as_deref(),
            Some("Hello (x)")
        );
        assert_eq!(extract_text_from_operator("100 600 Td"), None);
    }

    #[test]
    fn test_content_stream_scan() {
        let content = b"BT\n/F1 12 Tf\n(First) Tj\nET\nBT\n(Second) Tj\nET\n";
        assert_eq!(extract_text_from_content(content).trim(), "First Second");
    }

    #[test]
    fn test_pages_joined_with_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two_pages.pdf");
        write_pdf(&path, &["Page one text", "Page two text"]);

        let text = extract_text_from_pdf(&path).unwrap();
        let pages: Vec<&str> = text.split(PAGE_SEPARATOR).collect();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("Page one text"));
        assert!(pages[1].contains("Page two text"));
    }

    #[test]
    fn test_invalid_pdf_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        let err = extract_text_from_pdf(&path).unwrap_err();
        assert!(matches!(err, AppError::Pdf { .. }));
    }

    #[test]
    fn test_pdf_without_text_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.pdf");
        write_pdf(&path, &["   "]);

        assert!(extract_text_from_pdf(&path).is_err());
    }
}
