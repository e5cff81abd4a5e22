//! Temporary on-disk staging of uploaded image bytes.

use std::io::Write;
use std::path::Path;

use image::{DynamicImage, ImageReader};
use tempfile::NamedTempFile;

use crate::config::PipelineConfig;
use crate::error::Result;

/// Uploaded image bytes held in a temporary file for the duration of one
/// pipeline run. The file is deleted when the value is dropped.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Check the size ceiling, then write `bytes` to a fresh temporary file.
    pub fn stage(bytes: &[u8], config: &PipelineConfig) -> Result<Self> {
        config.check_input_size(bytes.len())?;
        let mut file = tempfile::Builder::new().prefix("upload_").tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        tracing::debug!(path = %file.path().display(), size = bytes.len(), "Staged upload");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn decode(&self) -> Result<DynamicImage> {
        let img = ImageReader::open(self.path())?
            .with_guessed_format()?
            .decode()?;
        Ok(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PatternError;

    #[test]
    fn test_file_removed_on_drop() {
        let staged = StagedUpload::stage(b"bytes", &PipelineConfig::default()).unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_oversized_upload_never_staged() {
        let config = PipelineConfig {
            max_input_bytes: 2,
            ..Default::default()
        };
        assert!(matches!(
            StagedUpload::stage(b"abc", &config),
            Err(PatternError::OversizedInput { size: 3, max: 2 })
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let staged = StagedUpload::stage(b"definitely not an image", &PipelineConfig::default())
            .unwrap();
        assert!(matches!(staged.decode(), Err(PatternError::Image(_))));
    }
}
