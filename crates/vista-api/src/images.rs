use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

/// Writes uploaded images under one directory served as static files.
///
/// Files are stored flat as `{dir}/{token}_{original name}`; any bytes are
/// accepted and nothing is ever deduplicated or deleted.
pub struct ImageStore {
    dir: PathBuf,
    url_prefix: String,
}

/// A saved upload: the raw bytes for the vision model, plus where it lives.
pub struct StoredImage {
    pub bytes: Vec<u8>,
    pub path: PathBuf,
    pub url: String,
}

impl ImageStore {
    pub async fn new(dir: PathBuf, url_prefix: &str) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Image storage directory: {}", dir.display());
        Ok(Self {
            dir,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub async fn save(&self, original_name: &str, bytes: Vec<u8>) -> Result<StoredImage> {
        // Directory may have been removed since startup
        fs::create_dir_all(&self.dir).await?;

        let filename = format!("{}_{}", Uuid::new_v4().simple(), sanitize_name(original_name));
        let path = self.dir.join(&filename);

        let mut file = fs::File::create(&path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());

        Ok(StoredImage {
            bytes,
            url: format!("{}/{}", self.url_prefix, filename),
            path,
        })
    }
}

/// Keep only the final path component and URL-safe characters.
fn sanitize_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
