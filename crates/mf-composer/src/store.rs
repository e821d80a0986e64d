//! Asset storage seam and the filesystem implementation.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use mf_core::{Error, Result};

/// Binary asset storage, addressed by URI.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Local path for reading the asset behind `uri`.
    async fn fetch(&self, uri: &str) -> Result<PathBuf>;

    /// Store bytes as `name` in `collection`; returns the new URI.
    async fn store(&self, bytes: &[u8], collection: &str, name: &str) -> Result<String>;

    /// Move a local file into `collection` as `name`; returns the new URI.
    async fn store_file(&self, path: &Path, collection: &str, name: &str) -> Result<String>;
}

/// Stores assets under `<root>/<collection>/<name>` and hands out `file://`
/// URIs.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn destination(&self, collection: &str, name: &str) -> Result<PathBuf> {
        check_segment("collection", collection)?;
        check_segment("asset name", name)?;
        Ok(self.root.join(collection).join(name))
    }
}

/// One plain path segment: no separators, no `..`.
fn check_segment(what: &str, value: &str) -> Result<()> {
    let mut components = Path::new(value).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single {
        return Err(Error::illegal_input(format!("invalid {what} '{value}'")));
    }
    Ok(())
}

fn to_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn fetch(&self, uri: &str) -> Result<PathBuf> {
        let path = mf_av::probe::local_path(uri);
        if tokio::fs::try_exists(&path).await? {
            Ok(path)
        } else {
            Err(Error::not_found("asset", uri))
        }
    }

    async fn store(&self, bytes: &[u8], collection: &str, name: &str) -> Result<String> {
        let dest = self.destination(collection, name)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, bytes).await?;
        tracing::debug!(collection, name, "Stored asset");
        Ok(to_uri(&dest))
    }

    async fn store_file(&self, path: &Path, collection: &str, name: &str) -> Result<String> {
        let dest = self.destination(collection, name)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Rename within a filesystem, copy across filesystems.
        if tokio::fs::rename(path, &dest).await.is_err() {
            tokio::fs::copy(path, &dest).await?;
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::debug!(path = %path.display(), error = %e, "Failed to remove copied scratch file");
            }
        }
        tracing::debug!(collection, name, "Stored asset file");
        Ok(to_uri(&dest))
    }
}
