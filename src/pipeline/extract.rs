//! URL → PDF on disk.
//!
//! [`PageDocumentExtractor`] asks its [`DocumentSource`] for the embedded
//! document, names it after the URL, and writes it under the download
//! directory. Nothing is written unless the source produced bytes.
//!
//! Two URLs that derive the same stem in one run (`/a/inv.html` and
//! `/b/inv.html`) would silently overwrite each other, so later claims get a
//! numeric suffix: `inv.pdf`, `inv-2.pdf`, `inv-3.pdf`. Across runs the same
//! URL maps to the same file and overwrites it.

use super::locate::derive_document_stem;
use super::source::DocumentSource;
use crate::error::ItemError;
use crate::output::DownloadedDocument;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct PageDocumentExtractor {
    source: Arc<dyn DocumentSource>,
    download_dir: PathBuf,
    claimed: Mutex<HashSet<String>>,
}

impl PageDocumentExtractor {
    pub fn new(source: Arc<dyn DocumentSource>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            download_dir: download_dir.into(),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Fetch the page, locate the embedded PDF, and save it.
    pub async fn extract(&self, url: &str) -> Result<DownloadedDocument, ItemError> {
        let bytes = self
            .source
            .fetch_embedded(url)
            .await?
            .ok_or_else(|| ItemError::NoEmbeddedDocument {
                url: url.to_string(),
            })?;

        let stem = self.claim_stem(&derive_document_stem(url));
        let path = self.download_dir.join(format!("{stem}.pdf"));

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| ItemError::DocumentWrite {
                path: path.clone(),
                source: e,
            })?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ItemError::DocumentWrite {
                path: path.clone(),
                source: e,
            })?;

        info!(
            "PDF extracted and saved: {} ({} bytes, via {})",
            path.display(),
            bytes.len(),
            self.source.name()
        );

        Ok(DownloadedDocument {
            url: url.to_string(),
            path,
            bytes_written: bytes.len(),
        })
    }

    /// Reserve a unique stem for this run, suffixing `-N` on repeats.
    fn claim_stem(&self, stem: &str) -> String {
        let mut claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut candidate = stem.to_string();
        let mut n = 1;
        while claimed.contains(&candidate) {
            n += 1;
            candidate = format!("{stem}-{n}");
        }
        claimed.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(Option<Vec<u8>>);

    #[async_trait]
    impl DocumentSource for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn fetch_embedded(&self, _url: &str) -> Result<Option<Vec<u8>>, ItemError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn writes_bytes_under_derived_name() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("downloads");
        let extractor = PageDocumentExtractor::new(
            Arc::new(Canned(Some(b"%PDF-1.7 body".to_vec()))),
            &downloads,
        );

        let doc = extractor.extract("http://a.test/inv1.html").await.unwrap();
        assert_eq!(doc.path, downloads.join("inv1.pdf"));
        assert_eq!(doc.bytes_written, 13);
        assert_eq!(std::fs::read(&doc.path).unwrap(), b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn not_found_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("downloads");
        let extractor = PageDocumentExtractor::new(Arc::new(Canned(None)), &downloads);

        let err = extractor.extract("http://a.test/none.html").await.unwrap_err();
        assert!(matches!(err, ItemError::NoEmbeddedDocument { .. }));
        assert!(!downloads.exists());
    }

    #[tokio::test]
    async fn colliding_stems_get_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let extractor =
            PageDocumentExtractor::new(Arc::new(Canned(Some(b"%PDF".to_vec()))), dir.path());

        let a = extractor.extract("http://a.test/x/inv.html").await.unwrap();
        let b = extractor.extract("http://b.test/y/inv.php").await.unwrap();
        let c = extractor.extract("http://c.test/inv").await.unwrap();
        assert_eq!(a.path.file_name().unwrap(), "inv.pdf");
        assert_eq!(b.path.file_name().unwrap(), "inv-2.pdf");
        assert_eq!(c.path.file_name().unwrap(), "inv-3.pdf");

        let d = extractor.extract("http://d.test/inv-2.html").await.unwrap();
        assert_eq!(d.path.file_name().unwrap(), "inv-2-2.pdf");
    }

    #[tokio::test]
    async fn placeholder_name_for_bare_host() {
        let dir = tempfile::tempdir().unwrap();
        let extractor =
            PageDocumentExtractor::new(Arc::new(Canned(Some(b"%PDF".to_vec()))), dir.path());
        let doc = extractor.extract("https://a.test/").await.unwrap();
        assert_eq!(doc.path.file_name().unwrap(), "downloaded_file.pdf");
    }
}
