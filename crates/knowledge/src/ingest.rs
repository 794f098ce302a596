//! Document ingestion: load, split, embed, write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use babysquad_common::{Result, SquadError};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::embedding::Embedder;
use crate::splitter::TextSplitter;
use crate::store::VectorIndex;
use crate::types::{ChunkMetadata, Document, KnowledgeConfig};

/// Form feed, the page break `pdftotext` emits.
const PAGE_BREAK: char = '\x0C';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Text,
    Pdf,
}

impl SourceFormat {
    fn of(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" | "md" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files: usize,
    pub pages: usize,
    pub chunks: usize,
    pub skipped: Vec<PathBuf>,
}

#[derive(Debug)]
pub enum IngestOutcome {
    /// The data directory did not exist and was created empty.
    DataDirCreated(PathBuf),
    /// Nothing loadable was found.
    NoDocuments { skipped: Vec<PathBuf> },
    Ingested(IngestReport),
}

/// Split a file's text into 0-based pages. Blank pages keep their number but
/// produce no document.
pub fn paginate(source: &str, text: &str) -> Vec<Document> {
    text.split(PAGE_BREAK)
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(page, body)| Document {
            text: body.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                page: page as u32,
            },
        })
        .collect()
}

/// One document per non-blank PDF page, numbered from 0.
pub fn pdf_pages(source: &str, bytes: &[u8]) -> Result<Vec<Document>> {
    let pdf = lopdf::Document::load_mem(bytes)
        .map_err(|e| SquadError::Knowledge(format!("{source}: unreadable PDF: {e}")))?;

    let mut documents = Vec::new();
    for number in pdf.get_pages().into_keys() {
        let text = pdf.extract_text(&[number]).map_err(|e| {
            SquadError::Knowledge(format!("{source}: page {number}: {e}"))
        })?;
        if text.trim().is_empty() {
            continue;
        }
        documents.push(Document {
            text,
            metadata: ChunkMetadata {
                source: source.to_string(),
                page: number.saturating_sub(1),
            },
        });
    }
    Ok(documents)
}

async fn load_file(path: &Path, format: SourceFormat) -> Result<Vec<Document>> {
    let source = path.to_string_lossy().into_owned();
    match format {
        SourceFormat::Text => {
            let text = tokio::fs::read_to_string(path).await?;
            Ok(paginate(&source, &text))
        }
        SourceFormat::Pdf => {
            let bytes = tokio::fs::read(path).await?;
            tokio::task::spawn_blocking(move || pdf_pages(&source, &bytes))
                .await
                .map_err(|e| SquadError::Knowledge(format!("PDF extraction task failed: {e}")))?
        }
    }
}

/// Recursively load every supported file under `dir`, in path order.
pub async fn load_documents(dir: &Path) -> Result<(Vec<Document>, Vec<PathBuf>, usize)> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();

    let mut documents = Vec::new();
    let mut skipped = Vec::new();
    let mut loaded = 0;
    for path in files {
        let Some(format) = SourceFormat::of(&path) else {
            warn!(path = %path.display(), "Skipping unsupported file");
            skipped.push(path);
            continue;
        };

        match load_file(&path, format).await {
            Ok(pages) => {
                documents.extend(pages);
                loaded += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                skipped.push(path);
            }
        }
    }

    Ok((documents, skipped, loaded))
}

pub struct Ingestor {
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(config: &KnowledgeConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Ok(Self {
            splitter: TextSplitter::new(config.chunk_size, config.chunk_overlap)?,
            embedder,
            batch_size: config.embed_batch_size.max(1),
        })
    }

    /// Rebuild `index`'s collection from the files under `data_dir`.
    #[instrument(skip(self, index), fields(data_dir = %data_dir.display()))]
    pub async fn run(&self, data_dir: &Path, index: &VectorIndex) -> Result<IngestOutcome> {
        if !tokio::fs::try_exists(data_dir).await? {
            tokio::fs::create_dir_all(data_dir).await?;
            info!("Created empty data directory");
            return Ok(IngestOutcome::DataDirCreated(data_dir.to_path_buf()));
        }

        let (documents, skipped, files) = load_documents(data_dir).await?;
        if documents.is_empty() {
            info!(skipped = skipped.len(), "No documents to ingest");
            return Ok(IngestOutcome::NoDocuments { skipped });
        }

        let chunks = self.splitter.split_documents(&documents);
        info!(files, pages = documents.len(), chunks = chunks.len(), "Documents split");

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            embeddings.extend(self.embedder.embed_documents(&texts).await?);
        }

        index.replace_collection(&chunks, &embeddings).await?;

        Ok(IngestOutcome::Ingested(IngestReport {
            files,
            pages: documents.len(),
            chunks: chunks.len(),
            skipped,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    /// A Courier-only PDF with one text run per page.
    fn pdf_fixture(pages: &[&str]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
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
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
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
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn pdf_pages_are_zero_based_and_skip_blank_pages() {
        let bytes = pdf_fixture(&["Wake windows at four months", "   ", "Night feeds taper off"]);
        let docs = pdf_pages("./data/sleep.pdf", &bytes).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.page, 0);
        assert!(docs[0].text.contains("Wake windows"));
        assert_eq!(docs[1].metadata.page, 2);
        assert!(docs[1].text.contains("Night feeds"));
        assert!(docs.iter().all(|d| d.metadata.source == "./data/sleep.pdf"));
    }

    #[test]
    fn corrupt_pdf_is_a_knowledge_error() {
        let err = pdf_pages("scan.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, SquadError::Knowledge(_)));
    }

    #[test]
    fn form_feed_separates_zero_based_pages() {
        let docs = paginate("guide.txt", "cover\x0C\x0Cthird page");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.page, 0);
        assert_eq!(docs[1].metadata.page, 2);
        assert_eq!(docs[1].text, "third page");
    }

    #[tokio::test]
    async fn loads_supported_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sleep")).unwrap();
        std::fs::write(dir.path().join("sleep/naps.txt"), "낮잠 가이드").unwrap();
        std::fs::write(dir.path().join("feeding.md"), "# 분유\n수유량").unwrap();
        std::fs::write(dir.path().join("scan.pdf"), [0u8, 1, 2]).unwrap();
        std::fs::write(dir.path().join("notes.docx"), "binary").unwrap();
        std::fs::write(
            dir.path().join("sleep/guide.pdf"),
            pdf_fixture(&["Nap schedule", "Bedtime routine"]),
        )
        .unwrap();

        let (docs, skipped, files) = load_documents(dir.path()).await.unwrap();
        assert_eq!(files, 3);
        assert_eq!(docs.len(), 4);
        assert_eq!(skipped.len(), 2);
        assert!(skipped.iter().any(|p| p.ends_with("scan.pdf")));
        assert!(skipped.iter().any(|p| p.ends_with("notes.docx")));

        let pdf: Vec<u32> = docs
            .iter()
            .filter(|d| d.metadata.source.ends_with("guide.pdf"))
            .map(|d| d.metadata.page)
            .collect();
        assert_eq!(pdf, vec![0, 1]);
    }
}
