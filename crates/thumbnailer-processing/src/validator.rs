use std::path::Path;
use thumbnailer_core::UploadConfig;

/// Longest client filename accepted. Leaves room for the upload token
/// within the storage key limit.
const MAX_FILENAME_LEN: usize = 255;

/// Validation errors for uploaded files
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

/// Upload validator
///
/// Checks what the client sent before anything is written to the source
/// location. It never looks at pixels; undecodable images are the pipeline's
/// concern.
#[derive(Debug, Clone)]
pub struct MediaValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
    allowed_content_types: Vec<String>,
}

impl MediaValidator {
    pub fn new(
        max_file_size: usize,
        allowed_extensions: Vec<String>,
        allowed_content_types: Vec<String>,
    ) -> Self {
        Self {
            max_file_size,
            allowed_extensions,
            allowed_content_types,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.max_file_size_bytes,
            config.allowed_extensions.clone(),
            config.allowed_content_types.clone(),
        )
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Validate that the client filename can become part of a storage key.
    ///
    /// The filename is used verbatim in both the source and the thumbnail
    /// key, so it must be a single path segment.
    pub fn validate_filename(&self, filename: &str) -> Result<(), ValidationError> {
        let trimmed = filename.trim();
        if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
            return Err(ValidationError::InvalidFilename(filename.to_string()));
        }
        if filename.len() > MAX_FILENAME_LEN {
            return Err(ValidationError::InvalidFilename(format!(
                "filename exceeds {} bytes",
                MAX_FILENAME_LEN
            )));
        }
        if filename.contains(['/', '\\']) || filename.contains("..") {
            return Err(ValidationError::InvalidFilename(filename.to_string()));
        }
        if filename.chars().any(|c| c.is_control()) {
            return Err(ValidationError::InvalidFilename(
                "filename contains control characters".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate file extension
    pub fn validate_extension(&self, filename: &str) -> Result<(), ValidationError> {
        let extension = extension_of(filename)?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(())
    }

    /// Validate content type
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = normalize_content_type(content_type);

        if !self
            .allowed_content_types
            .iter()
            .any(|ct| ct == &normalized)
        {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate that Content-Type matches the file extension
    pub fn validate_extension_content_type_match(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        let extension = extension_of(filename)?;
        let normalized_content_type = normalize_content_type(content_type);

        let expected_content_types: &[&str] = match extension.as_str() {
            "jpg" | "jpeg" => &["image/jpeg"],
            "png" => &["image/png"],
            "gif" => &["image/gif"],
            "webp" => &["image/webp"],
            _ => {
                tracing::debug!(
                    extension = %extension,
                    content_type = %content_type,
                    "Unknown extension, skipping Content-Type/extension cross-validation"
                );
                return Ok(());
            }
        };

        if !expected_content_types
            .iter()
            .any(|ct| *ct == normalized_content_type)
        {
            return Err(ValidationError::InvalidContentType {
                content_type: format!(
                    "{} (does not match extension '{}'. Expected one of: {})",
                    content_type,
                    extension,
                    expected_content_types.join(", ")
                ),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate all aspects of an upload
    pub fn validate_all(
        &self,
        filename: &str,
        content_type: &str,
        file_size: usize,
    ) -> Result<(), ValidationError> {
        self.validate_filename(filename)?;
        self.validate_file_size(file_size)?;
        self.validate_extension(filename)?;
        self.validate_content_type(content_type)?;
        self.validate_extension_content_type_match(filename, content_type)?;
        Ok(())
    }
}

fn extension_of(filename: &str) -> Result<String, ValidationError> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))
}

/// Lowercase and drop parameters such as `; charset=binary`.
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> MediaValidator {
        MediaValidator::new(
            1024 * 1024, // 1MB
            vec!["jpg".to_string(), "png".to_string()],
            vec!["image/jpeg".to_string(), "image/png".to_string()],
        )
    }

    #[test]
    fn test_validate_file_size() {
        let validator = test_validator();
        assert!(validator.validate_file_size(512 * 1024).is_ok());
        assert!(matches!(
            validator.validate_file_size(2 * 1024 * 1024),
            Err(ValidationError::FileTooLarge { .. })
        ));
        assert!(matches!(
            validator.validate_file_size(0),
            Err(ValidationError::EmptyFile)
        ));
    }

    #[test]
    fn test_validate_extension() {
        let validator = test_validator();
        assert!(validator.validate_extension("test.jpg").is_ok());
        assert!(validator.validate_extension("test.PNG").is_ok()); // case insensitive
        assert!(validator.validate_extension("test.gif").is_err());
        assert!(matches!(
            validator.validate_extension("noextension"),
            Err(ValidationError::InvalidFilename(_))
        ));
    }

    #[test]
    fn test_validate_content_type() {
        let validator = test_validator();
        assert!(validator.validate_content_type("image/jpeg").is_ok());
        assert!(validator.validate_content_type("IMAGE/PNG").is_ok());
        assert!(validator.validate_content_type("image/png; charset=binary").is_ok());
        assert!(validator.validate_content_type("application/pdf").is_err());
    }

    #[test]
    fn test_validate_filename() {
        let validator = test_validator();
        assert!(validator.validate_filename("photo.png").is_ok());
        assert!(validator.validate_filename("holiday photo (1).png").is_ok());
        assert!(validator.validate_filename("").is_err());
        assert!(validator.validate_filename("  ").is_err());
        assert!(validator.validate_filename("../photo.png").is_err());
        assert!(validator.validate_filename("dir/photo.png").is_err());
        assert!(validator.validate_filename("dir\\photo.png").is_err());
        assert!(validator.validate_filename("bad\nname.png").is_err());
        assert!(validator
            .validate_filename(&format!("{}.png", "a".repeat(300)))
            .is_err());
    }

    #[test]
    fn test_validate_extension_content_type_mismatch() {
        let validator = test_validator();
        assert!(validator
            .validate_extension_content_type_match("photo.jpg", "image/jpeg")
            .is_ok());
        assert!(validator
            .validate_extension_content_type_match("photo.jpg", "image/png")
            .is_err());
        assert!(validator
            .validate_extension_content_type_match("photo.JPEG", "IMAGE/JPEG")
            .is_ok());
    }

    #[test]
    fn test_validate_all() {
        let validator = test_validator();
        assert!(validator.validate_all("photo.png", "image/png", 1000).is_ok());
        assert!(validator
            .validate_all("photo.png", "image/png", 2 * 1024 * 1024)
            .is_err());
        assert!(validator.validate_all("photo.txt", "image/png", 1000).is_err());
        assert!(validator.validate_all("a/photo.png", "image/png", 1000).is_err());
    }

    #[test]
    fn test_from_config_defaults() {
        let validator = MediaValidator::from_config(&UploadConfig::default());
        assert!(validator.validate_all("photo.webp", "image/webp", 10).is_ok());
        assert_eq!(validator.max_file_size(), 50 * 1024 * 1024);
    }
}
