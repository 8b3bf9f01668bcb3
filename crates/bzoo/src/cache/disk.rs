//! # Cache Policy

use crate::cache::disk;
use anyhow::{Context, bail};
use burn::config::Config;
use burn::data::network::downloader;
use std::fs::{File, remove_file, rename};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Cache Policy
#[derive(Config, Debug)]
pub struct DiskCacheConfig {
    /// Key for the root cache directory.
    #[config(default = "\"bzoo\".to_string()")]
    pub root_cache_key: String,

    /// Parent of the root cache directory; ``$HOME/.cache`` when `None`.
    #[config(default = "None")]
    pub root_dir: Option<PathBuf>,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskCacheConfig {
    /// Fetch the base cache directory.
    ///
    /// If the cache directory does not exist, does not create it.
    pub fn base_cache_dir(&self) -> anyhow::Result<PathBuf> {
        let root = match &self.root_dir {
            Some(root) => root.clone(),
            None => dirs::home_dir()
                .context("unable to locate the home directory")?
                .join(".cache"),
        };
        Ok(root.join(&self.root_cache_key))
    }

    /// Fetch the base cache directory.
    ///
    /// If the cache directory does not exist, creates it.
    pub fn ensure_base_cache_dir(&self) -> anyhow::Result<PathBuf> {
        let dir = self.base_cache_dir()?;
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    /// Map a resource key to a cache path.
    ///
    /// Does not ensure that the path (or any of the parents) exist.
    pub fn resource_to_path(
        &self,
        resource_key: &[String],
    ) -> anyhow::Result<PathBuf> {
        let path = self.base_cache_dir()?;
        Ok(resource_key.iter().fold(path, |acc, s| acc.join(s)))
    }

    /// Map a resource key to a cache path and ensure the parent directory exists.
    pub fn ensure_resource_parent_dir(
        &self,
        resource_key: &[String],
    ) -> anyhow::Result<PathBuf> {
        let path = self.resource_to_path(resource_key)?;
        match path.parent() {
            Some(parent) if !parent.exists() => std::fs::create_dir_all(parent)?,
            _ => (),
        }
        Ok(path)
    }

    /// Fetch a Resource to the Cache.
    pub fn fetch_resource(
        &self,
        url: &str,
        resource: &[String],
    ) -> anyhow::Result<PathBuf> {
        let cache_file_path = self.ensure_resource_parent_dir(resource)?;
        disk::try_cache_download_to_path(url, cache_file_path)
    }
}

/// Download a URL resource to a given path.
///
/// If the path already exists, does nothing.
///
/// # Returns
///
/// The cache path.
pub fn try_cache_download_to_path(
    url: &str,
    cache_file_path: PathBuf,
) -> anyhow::Result<PathBuf> {
    if cache_file_path.exists() {
        tracing::debug!(path = %cache_file_path.display(), "cache hit");
        return Ok(cache_file_path);
    }

    let file_name = cache_file_path
        .file_name()
        .with_context(|| format!("cache path has no file name: {cache_file_path:?}"))?
        .to_string_lossy()
        .to_string();

    tracing::info!(url, path = %cache_file_path.display(), "downloading");
    let bytes = downloader::download_file_as_bytes(url, &file_name);

    write_cache_file(&cache_file_path, &bytes)
        .with_context(|| format!("failed to cache {url} to {cache_file_path:?}"))?;

    Ok(cache_file_path)
}

/// Write a cache file through a ``.part`` sibling, renamed into place.
///
/// On any failure the partial file is removed; `path` is never left
/// holding a partial write.
pub fn write_cache_file(
    path: &Path,
    bytes: &[u8],
) -> anyhow::Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("cache path has no file name: {path:?}"))?
        .to_string_lossy();
    let partial_path = path.with_file_name(format!("{file_name}.part"));

    let result = File::create(&partial_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| rename(&partial_path, path));

    if let Err(err) = result {
        tracing::warn!(
            path = %path.display(),
            size = bytes.len(),
            error = %err,
            "partial download removed"
        );
        if partial_path.exists() {
            remove_file(&partial_path)?;
        }
        bail!("Failed to write the whole file: {path:?}: {err}");
    }

    Ok(())
}
