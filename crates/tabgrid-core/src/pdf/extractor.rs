//! Lattice table extraction using lopdf.

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, warn};

use super::content::page_graphics;
use super::lattice::LatticeBuilder;
use super::{PdfPageTables, PdfTableSource, Result};
use crate::error::PdfError;
use crate::models::config::PdfConfig;

/// Finds ruled tables in PDF pages from their drawn lines.
#[derive(Debug, Clone, Default)]
pub struct LatticePdfExtractor {
    config: PdfConfig,
}

impl LatticePdfExtractor {
    /// Create an extractor.
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }

    fn load(&self, data: &[u8]) -> Result<Document> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        if doc.get_pages().is_empty() {
            return Err(PdfError::NoPages);
        }
        Ok(doc)
    }

    /// Tables of a single page.
    fn page_tables(&self, doc: &Document, page: u32, page_id: ObjectId) -> Result<PdfPageTables> {
        let resources = page_resources(doc, page_id);
        let graphics = page_graphics(doc, page, page_id, resources.as_ref())?;

        let tables = LatticeBuilder::new(&self.config).tables(graphics.edges, &graphics.runs);
        debug!("Page {}: {} tables", page, tables.len());

        Ok(PdfPageTables { page, tables })
    }
}

impl PdfTableSource for LatticePdfExtractor {
    fn extract_tables(&self, data: &[u8]) -> Result<Vec<PdfPageTables>> {
        let doc = self.load(data)?;
        let pages = doc.get_pages();
        info!("Loaded PDF with {} pages", pages.len());

        let limit = match self.config.max_pages {
            0 => usize::MAX,
            n => n,
        };

        let mut result = Vec::new();
        for (&page, &page_id) in pages.iter().take(limit) {
            match self.page_tables(&doc, page, page_id) {
                Ok(tables) => result.push(tables),
                Err(e) => warn!("Skipping page {}: {}", page, e),
            }
        }

        Ok(result)
    }
}

/// Resources dictionary of a page, following inheritance up the page tree.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut node_id = page_id;
    // Guard against cyclic Parent chains.
    for _ in 0..64 {
        let Ok(Object::Dictionary(dict)) = doc.get_object(node_id) else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node_id = *parent_id,
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod testing {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// Serialize a one-page-per-entry PDF with the given content operations.
    pub fn pdf_with_pages(pages: Vec<Vec<Operation>>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().unwrap(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut data = Vec::new();
        doc.save_to(&mut data).unwrap();
        data
    }

    /// A stroked grid of `rows x cols` boxes, 100 by 20 points, with one
    /// string per cell.
    pub fn ruled_table(left: i64, top: i64, cells: &[&[&str]]) -> Vec<Operation> {
        let mut ops = vec![Operation::new("q", vec![]), Operation::new("w", vec![1.into()])];
        for (r, row) in cells.iter().enumerate() {
            for c in 0..row.len() {
                let x = left + 100 * c as i64;
                let y = top - 20 * (r as i64 + 1);
                ops.push(Operation::new("re", vec![x.into(), y.into(), 100.into(), 20.into()]));
            }
        }
        ops.push(Operation::new("S", vec![]));
        ops.push(Operation::new("Q", vec![]));

        for (r, row) in cells.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                let x = left + 100 * c as i64 + 5;
                let y = top - 20 * (r as i64 + 1) + 6;
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
                ops.push(Operation::new("Td", vec![x.into(), y.into()]));
                ops.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
                ops.push(Operation::new("ET", vec![]));
            }
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{pdf_with_pages, ruled_table};
    use super::*;
    use lopdf::content::Operation;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_extracts_ruled_table() {
        let cells: &[&[&str]] = &[&["Name", "Age", "City"], &["Ana", "30", "Lyon"], &["Bo", "41", "Oslo"]];
        let data = pdf_with_pages(vec![ruled_table(50, 700, cells)]);

        let pages = LatticePdfExtractor::default().extract_tables(&data).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[0].tables, vec![strings(cells)]);
    }

    #[test]
    fn test_tables_per_page_in_reading_order() {
        let mut first = ruled_table(50, 700, &[&["A", "B"], &["1", "2"]]);
        first.extend(ruled_table(50, 400, &[&["C", "D"], &["3", "4"]]));
        let text_only = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal("No tables here")]),
            Operation::new("ET", vec![]),
        ];
        let data = pdf_with_pages(vec![first, text_only]);

        let pages = LatticePdfExtractor::default().extract_tables(&data).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].tables.len(), 2);
        assert_eq!(pages[0].tables[0][0], vec!["A", "B"]);
        assert_eq!(pages[0].tables[1][1], vec!["3", "4"]);
        assert!(pages[1].tables.is_empty());
    }

    #[test]
    fn test_transformed_form_xobject() {
        // The table lives in a form XObject placed with a translation.
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let form_ops = ruled_table(0, 40, &[&["k", "v"], &["x", "1"]]);
        let form = lopdf::Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 200.into(), 40.into()],
            },
            lopdf::content::Content { operations: form_ops }.encode().unwrap(),
        );
        let form_id = doc.add_object(form);
        let page_ops = vec![
            Operation::new("q", vec![]),
            Operation::new("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 500.into()]),
            Operation::new("Do", vec!["Tbl".into()]),
            Operation::new("Q", vec![]),
        ];
        let content_id = doc.add_object(lopdf::Stream::new(
            dictionary! {},
            lopdf::content::Content { operations: page_ops }.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Tbl" => form_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut data = Vec::new();
        doc.save_to(&mut data).unwrap();

        let pages = LatticePdfExtractor::default().extract_tables(&data).unwrap();
        assert_eq!(pages[0].tables, vec![strings(&[&["k", "v"], &["x", "1"]])]);
    }

    #[test]
    fn test_max_pages() {
        let table = ruled_table(50, 700, &[&["A", "B"], &["1", "2"]]);
        let data = pdf_with_pages(vec![table.clone(), table.clone(), table]);

        let config = PdfConfig {
            max_pages: 2,
            ..PdfConfig::default()
        };
        let pages = LatticePdfExtractor::new(config).extract_tables(&data).unwrap();
        assert_eq!(pages.iter().map(|p| p.page).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_invalid_data() {
        let result = LatticePdfExtractor::default().extract_tables(b"not a pdf");
        assert!(matches!(result, Err(PdfError::Parse(_))));
    }
}
