use crate::error::IngestError;
use crate::models::{Document, DocumentOutcome, ExtractionReport};
use lopdf::Document as PdfDocument;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document =
            PdfDocument::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(format!("page {page_no}: {error}")))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        Ok(pages)
    }
}

/// Classify one document: any parse failure makes it unreadable, parsed
/// documents without a text layer are scanned. Page text is joined in page
/// number order.
pub fn extract_document<X: PdfExtractor + ?Sized>(extractor: &X, document: &Document) -> DocumentOutcome {
    match extractor.extract_pages(&document.bytes) {
        Ok(mut pages) => {
            pages.sort_by_key(|page| page.number);
            let text = pages.into_iter().map(|page| page.text).collect::<String>();
            if text.trim().is_empty() {
                DocumentOutcome::Scanned
            } else {
                DocumentOutcome::Text(text)
            }
        }
        Err(error) => DocumentOutcome::Unreadable(error.to_string()),
    }
}

pub fn extract_documents<X: PdfExtractor + ?Sized>(
    extractor: &X,
    documents: &[Document],
) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    for document in documents {
        match extract_document(extractor, document) {
            DocumentOutcome::Text(text) => {
                debug!(name = %document.name, chars = text.chars().count(), "extracted pdf text");
                report.text.push_str(&text);
            }
            DocumentOutcome::Unreadable(reason) => {
                warn!(name = %document.name, reason = %reason, "failed to read pdf");
                report.unreadable.insert(document.name.clone(), reason);
            }
            DocumentOutcome::Scanned => {
                warn!(name = %document.name, "no extractable text in pdf");
                report.scanned.insert(document.name.clone());
            }
        }
    }

    report
}


#[cfg(test)]
mod tests {
    use super::fixtures::{scanned_pdf, text_pdf};
    use super::*;

    #[test]
    fn text_pdf_is_extracted() {
        let document = Document::new("a.pdf", text_pdf(&["The sky is blue."]));
        match extract_document(&LopdfExtractor, &document) {
            DocumentOutcome::Text(text) => assert!(text.contains("The sky is blue.")),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn image_only_pdf_is_scanned() {
        let document = Document::new("b.pdf", scanned_pdf());
        assert_eq!(extract_document(&LopdfExtractor, &document), DocumentOutcome::Scanned);
    }

    #[test]
    fn garbage_bytes_are_unreadable() {
        let document = Document::new("broken.pdf", b"%PDF-1.4\n%broken".to_vec());
        assert!(matches!(
            extract_document(&LopdfExtractor, &document),
            DocumentOutcome::Unreadable(_)
        ));
    }

    #[test]
    fn batch_continues_past_failures() {
        let documents = vec![
            Document::new("broken.pdf", b"not a pdf".to_vec()),
            Document::new("scan.pdf", scanned_pdf()),
            Document::new("a.pdf", text_pdf(&["First document."])),
            Document::new("b.pdf", text_pdf(&["Second document."])),
        ];

        let report = extract_documents(&LopdfExtractor, &documents);

        assert!(report.has_text());
        let first = report.text.find("First document.").expect("first text present");
        let second = report.text.find("Second document.").expect("second text present");
        assert!(first < second);
        let reason = report.unreadable.get("broken.pdf").expect("broken pdf reported");
        assert!(reason.starts_with("pdf parse error:"));
        assert!(report.scanned.contains("scan.pdf"));
    }

    struct UnorderedExtractor;

    impl PdfExtractor for UnorderedExtractor {
        fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
            Ok(vec![
                PageText {
                    number: 2,
                    text: "second page. ".to_string(),
                },
                PageText {
                    number: 1,
                    text: "first page. ".to_string(),
                },
            ])
        }
    }

    #[test]
    fn pages_are_joined_in_page_order() {
        let document = Document::new("a.pdf", Vec::new());
        assert_eq!(
            extract_document(&UnorderedExtractor, &document),
            DocumentOutcome::Text("first page. second page. ".to_string())
        );
    }

    #[test]
    fn scanned_only_batch_yields_no_text() {
        let documents = vec![Document::new("scan.pdf", scanned_pdf())];
        let report = extract_documents(&LopdfExtractor, &documents);
        assert!(!report.has_text());
        assert_eq!(report.scanned.len(), 1);
        assert!(report.unreadable.is_empty());
    }
}
