use crate::error::{CollectError, Result};
use crate::session::SessionDocument;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const DOCUMENT_FILE: &str = "session_document.json";

/// Durable home for session documents. Stored revisions are never rewritten.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Assign the next revision to `doc`, persist it and return its location
    async fn save(&self, doc: &mut SessionDocument) -> Result<String>;

    /// Latest stored revision for a session
    async fn load_latest(&self, session_id: &str) -> Result<Option<SessionDocument>>;
}

/// One JSON file per revision under `<root>/<session>/`
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// `session_document.json` for revision 1, `session_document.r<N>.json` after
    pub fn revision_path(&self, session_id: &str, revision: u32) -> PathBuf {
        let dir = self.session_dir(session_id);
        if revision <= 1 {
            dir.join(DOCUMENT_FILE)
        } else {
            dir.join(format!("session_document.r{revision}.json"))
        }
    }

    async fn latest_revision(&self, session_id: &str) -> Result<u32> {
        let dir = self.session_dir(session_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut latest = 0;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(revision) = revision_of(&entry.path()) {
                latest = latest.max(revision);
            }
        }
        Ok(latest)
    }
}

fn revision_of(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    if name == DOCUMENT_FILE {
        return Some(1);
    }
    name.strip_prefix("session_document.r")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn save(&self, doc: &mut SessionDocument) -> Result<String> {
        let dir = self.session_dir(&doc.session_id);
        tokio::fs::create_dir_all(&dir).await?;

        doc.revision = self.latest_revision(&doc.session_id).await? + 1;
        let path = self.revision_path(&doc.session_id, doc.revision);
        doc.stored_at = Some(path.to_string_lossy().into_owned());

        let json = serde_json::to_vec_pretty(doc)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| CollectError::Storage(format!("{}: {e}", path.display())))?;
        file.write_all(&json).await?;
        file.flush().await?;

        ::log::info!(
            "Stored session {} revision {} at {}",
            doc.session_id,
            doc.revision,
            path.display()
        );
        Ok(path.to_string_lossy().into_owned())
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<SessionDocument>> {
        let revision = self.latest_revision(session_id).await?;
        if revision == 0 {
            return Ok(None);
        }
        let bytes = tokio::fs::read(self.revision_path(session_id, revision)).await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
