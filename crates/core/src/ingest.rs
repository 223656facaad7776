use crate::chunking::build_chunks;
use crate::error::{ExtractionError, IngestError};
use crate::extractor::{extract_page_texts, extract_plain_text, SourceKind};
use crate::models::{Chunk, Document, DocumentMetadata, IngestionOptions};
use crate::vector_index::VectorIndex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Recognized document files under `folder`, recursively and through
/// symlinks, in sorted order. Entries the walk cannot read are logged and
/// left out.
pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    walk_documents(folder).0
}

fn walk_documents(folder: &Path) -> (Vec<PathBuf>, Vec<SkippedFile>) {
    let mut files = Vec::new();
    let mut unreadable = Vec::new();

    for item in WalkDir::new(folder).follow_links(true) {
        let entry = match item {
            Ok(entry) => entry,
            Err(error) => {
                let path = error
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| folder.to_path_buf());
                warn!(path = %path.display(), reason = %error, "unreadable directory entry");
                unreadable.push(SkippedFile {
                    path,
                    reason: error.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if SourceKind::from_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    (files, unreadable)
}

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedFile>,
}

/// Loads every recognized file under `folder`. Files that fail to extract are
/// skipped and reported; the run only fails when the folder is missing or no
/// document at all could be loaded.
pub fn load_documents(folder: &Path) -> Result<LoadReport, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::MissingDirectory(folder.to_path_buf()));
    }

    let (files, mut skipped_files) = walk_documents(folder);
    let mut documents = Vec::new();

    for path in files {
        match load_file(folder, &path) {
            Ok(loaded) => {
                info!(path = %path.display(), documents = loaded.len(), "loaded file");
                documents.extend(loaded);
            }
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped file");
                skipped_files.push(SkippedFile {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    if documents.is_empty() {
        return Err(IngestError::NoDocuments(folder.to_path_buf()));
    }

    Ok(LoadReport {
        documents,
        skipped_files,
    })
}

fn load_file(folder: &Path, path: &Path) -> Result<Vec<Document>, ExtractionError> {
    let source = source_name(folder, path)?;

    match SourceKind::from_path(path) {
        Some(SourceKind::Pdf) => Ok(extract_page_texts(path)?
            .into_iter()
            .map(|page| Document {
                content: page.text,
                metadata: DocumentMetadata {
                    source: source.clone(),
                    page: Some(page.number),
                },
            })
            .collect()),
        Some(SourceKind::PlainText) => Ok(vec![Document {
            content: extract_plain_text(path)?,
            metadata: DocumentMetadata { source, page: None },
        }]),
        None => Ok(Vec::new()),
    }
}

/// Path relative to the ingested folder, which is the bare file name for
/// top-level files.
fn source_name(folder: &Path, path: &Path) -> Result<String, ExtractionError> {
    if path.file_name().is_none() {
        return Err(ExtractionError::MissingFileName(path.display().to_string()));
    }

    let relative = path.strip_prefix(folder).unwrap_or(path);
    Ok(relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

pub struct IngestionReport {
    pub documents: usize,
    pub chunks: usize,
    pub added: usize,
    pub skipped_files: Vec<SkippedFile>,
}

/// Load, chunk and index everything under `folder` into `index`.
pub async fn ingest_folder(
    folder: &Path,
    options: &IngestionOptions,
    index: &mut VectorIndex,
) -> Result<IngestionReport, IngestError> {
    let loaded = load_documents(folder)?;
    info!(
        folder = %folder.display(),
        documents = loaded.documents.len(),
        skipped = loaded.skipped_files.len(),
        "documents loaded"
    );

    let chunks: Vec<Chunk> = build_chunks(&loaded.documents, options)?;
    info!(chunks = chunks.len(), "documents chunked");

    let added = index.build(&chunks).await?;

    Ok(IngestionReport {
        documents: loaded.documents.len(),
        chunks: chunks.len(),
        added,
        skipped_files: loaded.skipped_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{CharacterNgramEmbedder, Embedder};
    use crate::test_support::write_pdf;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn discovery_is_recursive_and_filters_extensions() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        fs::write(base.join("a.txt"), "a")?;
        fs::write(base.join("notes.md"), "ignored")?;
        fs::write(nested.join("b.PDF"), b"%PDF-1.4\n%fake")?;

        let files = discover_documents(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn missing_directory_is_fatal() {
        let result = load_documents(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(IngestError::MissingDirectory(_))));
    }

    #[test]
    fn folder_without_documents_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("broken.pdf"), b"%PDF-1.4\n%broken")?;

        let result = load_documents(dir.path());
        assert!(matches!(result, Err(IngestError::NoDocuments(_))));
        Ok(())
    }

    #[test]
    fn unreadable_files_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("brief.txt"), "The buyer is Jane Doe.")?;
        fs::write(dir.path().join("broken.pdf"), b"%PDF-1.4\n%broken")?;
        fs::write(dir.path().join("empty.txt"), "   ")?;

        let report = load_documents(dir.path())?;

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].metadata.source, "brief.txt");
        assert_eq!(report.documents[0].metadata.page, None);
        let mut skipped = report
            .skipped_files
            .iter()
            .filter_map(|file| file.path.file_name().and_then(|name| name.to_str()))
            .collect::<Vec<_>>();
        skipped.sort_unstable();
        assert_eq!(skipped, vec!["broken.pdf", "empty.txt"]);
        Ok(())
    }

    #[test]
    fn nested_sources_keep_their_relative_path() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("actas"))?;
        fs::write(dir.path().join("actas").join("acta.txt"), "Acta de asamblea.")?;

        let report = load_documents(dir.path())?;
        assert_eq!(report.documents[0].metadata.source, "actas/acta.txt");
        Ok(())
    }

    #[tokio::test]
    async fn ingestion_indexes_one_entry_per_chunk() -> Result<(), Box<dyn std::error::Error>> {
        let source = tempdir()?;
        let storage = tempdir()?;
        fs::write(source.path().join("brief.txt"), "The buyer is Jane Doe. ".repeat(30))?;
        fs::write(source.path().join("deed.txt"), "The notary certified the deed.")?;

        let embedder: Arc<dyn Embedder> = Arc::new(CharacterNgramEmbedder::default());
        let mut index = VectorIndex::open(storage.path(), embedder.clone())?;
        let options = IngestionOptions {
            chunk_size: 200,
            chunk_overlap: 30,
        };

        let report = ingest_folder(source.path(), &options, &mut index).await?;

        assert_eq!(report.documents, 2);
        assert!(report.chunks > 2);
        assert_eq!(report.added, report.chunks);
        assert_eq!(VectorIndex::open(storage.path(), embedder)?.len(), report.chunks);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_documents_are_loaded() -> Result<(), Box<dyn std::error::Error>> {
        let elsewhere = tempdir()?;
        let target = elsewhere.path().join("original.txt");
        fs::write(&target, "The buyer is Jane Doe.")?;

        let dir = tempdir()?;
        std::os::unix::fs::symlink(&target, dir.path().join("brief.txt"))?;

        let report = load_documents(dir.path())?;
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].metadata.source, "brief.txt");
        assert!(report.documents[0].content.contains("Jane Doe"));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_reported_as_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("brief.txt"), "The buyer is Jane Doe.")?;
        std::os::unix::fs::symlink(dir.path().join("missing.txt"), dir.path().join("gone.txt"))?;

        let report = load_documents(dir.path())?;
        assert_eq!(report.documents.len(), 1);
        assert!(report
            .skipped_files
            .iter()
            .any(|file| file.path.ends_with("gone.txt")));
        Ok(())
    }

    #[tokio::test]
    async fn pdf_chunks_keep_their_page_numbers() -> Result<(), Box<dyn std::error::Error>> {
        let source = tempdir()?;
        let storage = tempdir()?;
        write_pdf(
            &source.path().join("deed.pdf"),
            &["The notary certified the deed.", "The buyer is Jane Doe."],
        )?;

        let report = load_documents(source.path())?;
        let pages = report
            .documents
            .iter()
            .map(|document| document.metadata.page)
            .collect::<Vec<_>>();
        assert_eq!(pages, vec![Some(1), Some(2)]);

        let embedder: Arc<dyn Embedder> = Arc::new(CharacterNgramEmbedder::default());
        let mut index = VectorIndex::open(storage.path(), embedder)?;
        ingest_folder(source.path(), &IngestionOptions::default(), &mut index).await?;

        let buyer = index
            .chunks()
            .find(|chunk| chunk.content.contains("Jane Doe"))
            .ok_or("buyer chunk missing")?;
        assert_eq!(buyer.metadata.source, "deed.pdf");
        assert_eq!(buyer.metadata.page, Some(2));
        assert!(index.chunks().all(|chunk| chunk.metadata.page.is_some()));
        Ok(())
    }
}
