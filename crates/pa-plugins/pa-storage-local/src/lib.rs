//! # pa-storage-local
//! pet-adopter/crates/pa-plugins/pa-storage-local/src/lib.rs
//! Local filesystem implementation of `PhotoStore`.
//! Photos live flat under one directory, named after the ad they belong to.

use async_trait::async_trait;
use image::io::Reader as ImageReader;
use image::ImageFormat;
use pa_core::error::{AppError, Result};
use pa_core::traits::PhotoStore;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct LocalPhotoStore {
    /// Root directory for all photos (e.g., "./data/photos")
    root_path: PathBuf,
}

impl LocalPhotoStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root_path: root }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Resolves a stored file name, refusing anything that would escape the root.
    fn path_for(&self, file_name: &str) -> Result<PathBuf> {
        let plain = !file_name.is_empty()
            && !file_name.contains(['/', '\\'])
            && file_name != "."
            && file_name != "..";
        if !plain {
            return Err(AppError::ValidationError(format!("bad photo name {file_name:?}")));
        }
        Ok(self.root_path.join(file_name))
    }
}

fn extension_of(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some(".jpg"),
        ImageFormat::Png => Some(".png"),
        ImageFormat::WebP => Some(".webp"),
        ImageFormat::Gif => Some(".gif"),
        _ => None,
    }
}

#[async_trait]
impl PhotoStore for LocalPhotoStore {
    /// Accepts JPEG, PNG, WebP and GIF whose header can actually be read.
    fn sniff_extension(&self, data: &[u8]) -> Option<String> {
        let format = image::guess_format(data).ok()?;
        let extension = extension_of(format)?;

        let readable = ImageReader::with_format(Cursor::new(data), format)
            .into_dimensions()
            .is_ok();
        readable.then(|| extension.to_string())
    }

    async fn write(&self, key: &str, extension: &str, data: &[u8]) -> Result<String> {
        let file_name = format!("{key}{extension}");
        let target_path = self.path_for(&file_name)?;

        fs::create_dir_all(&self.root_path).await.map_err(AppError::internal)?;
        fs::write(&target_path, data).await.map_err(|e| {
            log::error!("failed to write photo {}: {e}", target_path.display());
            AppError::internal(e)
        })?;

        log::debug!("stored photo {file_name} ({} bytes)", data.len());
        Ok(file_name)
    }

    async fn remove(&self, file_name: &str) -> Result<()> {
        let path = self.path_for(file_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("photo {file_name} already gone");
                Ok(())
            }
            Err(e) => Err(AppError::internal(e)),
        }
    }
}
