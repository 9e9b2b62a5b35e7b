//! Upload validation policy
//!
//! Cheap checks that run before any key derivation or encryption.

use docseal_core::config::ValidationConfig;
use std::collections::HashSet;

use crate::error::ValidationError;

#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    max_file_size: u64,
    /// Lowercased, without parameters
    allowed_mime_types: HashSet<String>,
    /// Lowercased, without leading dot
    forbidden_extensions: HashSet<String>,
}

impl ValidationPolicy {
    pub fn new(
        max_file_size: u64,
        allowed_mime_types: impl IntoIterator<Item = impl AsRef<str>>,
        forbidden_extensions: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        Self {
            max_file_size,
            allowed_mime_types: allowed_mime_types
                .into_iter()
                .map(|m| normalize_mime(m.as_ref()))
                .collect(),
            forbidden_extensions: forbidden_extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Check an upload. The first failing rule wins.
    pub fn validate(&self, name: &str, mime_type: &str, size: u64) -> Result<(), ValidationError> {
        if name.trim().is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
        {
            return Err(ValidationError::InvalidName(name.to_string()));
        }
        if size == 0 {
            return Err(ValidationError::Empty);
        }
        if size > self.max_file_size {
            return Err(ValidationError::TooLarge {
                size,
                max: self.max_file_size,
            });
        }
        // Only the final extension counts: "report.pdf.exe" is an exe.
        if let Some((_, ext)) = name.rsplit_once('.') {
            let ext = ext.trim().to_ascii_lowercase();
            if self.forbidden_extensions.contains(&ext) {
                return Err(ValidationError::ForbiddenExtension(ext));
            }
        }
        if !self.allowed_mime_types.contains(&normalize_mime(mime_type)) {
            return Err(ValidationError::UnsupportedType(mime_type.to_string()));
        }
        Ok(())
    }
}

impl From<&ValidationConfig> for ValidationPolicy {
    fn from(cfg: &ValidationConfig) -> Self {
        Self::new(
            cfg.max_file_size,
            &cfg.allowed_mime_types,
            &cfg.forbidden_extensions,
        )
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::from(&ValidationConfig::default())
    }
}

/// "Text/Plain; charset=utf-8" → "text/plain"
fn normalize_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> ValidationPolicy {
        ValidationPolicy::new(100, ["text/plain", "image/png"], [".exe", "SH"])
    }

    #[test]
    fn test_accepts_valid_upload() {
        assert!(policy().validate("notes.txt", "text/plain", 10).is_ok());
        assert!(policy().validate("photo.PNG", "IMAGE/PNG", 100).is_ok());
        assert!(policy()
            .validate("notes", "text/plain; charset=utf-8", 1)
            .is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(
            policy().validate("a.txt", "text/plain", 0),
            Err(ValidationError::Empty)
        );
    }

    #[test]
    fn test_rejects_oversized() {
        assert_eq!(
            policy().validate("a.txt", "text/plain", 101),
            Err(ValidationError::TooLarge { size: 101, max: 100 })
        );
    }

    #[test]
    fn test_rejects_unlisted_mime() {
        assert!(matches!(
            policy().validate("a.pdf", "application/pdf", 5),
            Err(ValidationError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_rejects_forbidden_extension_case_insensitive() {
        assert_eq!(
            policy().validate("setup.EXE", "text/plain", 5),
            Err(ValidationError::ForbiddenExtension("exe".into()))
        );
        assert_eq!(
            policy().validate("report.txt.sh", "text/plain", 5),
            Err(ValidationError::ForbiddenExtension("sh".into()))
        );
        assert!(matches!(
            policy().validate(".exe", "text/plain", 5),
            Err(ValidationError::ForbiddenExtension(_))
        ));
    }

    #[test]
    fn test_rejects_path_like_names() {
        for name in ["", "  ", "..", "../etc/passwd", "dir\\file.txt", "a\0b.txt"] {
            assert!(
                matches!(
                    policy().validate(name, "text/plain", 5),
                    Err(ValidationError::InvalidName(_))
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_default_policy_from_config() {
        let policy = ValidationPolicy::default();
        assert_eq!(policy.max_file_size(), 50 * 1024 * 1024);
        assert!(policy.validate("a.pdf", "application/pdf", 1).is_ok());
        assert!(policy.validate("a.js", "text/plain", 1).is_err());
    }

    proptest! {
        #[test]
        fn names_with_separators_always_rejected(
            head in "[a-z]{0,8}",
            sep in prop::sample::select(vec!['/', '\\', '\0']),
            tail in "[a-z]{0,8}\\.txt",
        ) {
            let name = format!("{head}{sep}{tail}");
            prop_assert!(matches!(
                policy().validate(&name, "text/plain", 1),
                Err(ValidationError::InvalidName(_))
            ));
        }

        #[test]
        fn size_limit_is_inclusive(size in 1u64..=200) {
            let result = policy().validate("a.txt", "text/plain", size);
            prop_assert_eq!(result.is_ok(), size <= 100);
        }
    }
}
