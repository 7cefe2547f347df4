use super::error::KycError;

/// A document file picked by the user
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

// File bytes stay out of logs
impl std::fmt::Debug for DocumentUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentUpload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl DocumentUpload {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// `image/png; charset=..` -> `image/png`
    pub fn essence(&self) -> String {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    pub fn validate(&self, max_bytes: usize) -> Result<(), KycError> {
        let essence = self.essence();
        let accepted = essence == "application/pdf"
            || (essence.starts_with("image/") && essence.len() > "image/".len());
        if !accepted {
            return Err(KycError::UnsupportedFileType(self.mime_type.clone()));
        }
        if self.bytes.is_empty() {
            return Err(KycError::EmptyFile);
        }
        if self.bytes.len() > max_bytes {
            return Err(KycError::FileTooLarge {
                size: self.bytes.len(),
                max: max_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_images_and_pdf() {
        for mime in ["image/jpeg", "image/png", "IMAGE/PNG", "application/pdf; q=1"] {
            DocumentUpload::new("id.bin", mime, vec![1, 2, 3])
                .validate(10)
                .unwrap();
        }
    }

    #[test]
    fn test_rejects_other_types() {
        let err = DocumentUpload::new("id.txt", "text/plain", vec![1])
            .validate(10)
            .unwrap_err();
        assert_eq!(err, KycError::UnsupportedFileType("text/plain".into()));

        assert!(DocumentUpload::new("x", "image/", vec![1]).validate(10).is_err());
    }

    #[test]
    fn test_size_limits() {
        assert_eq!(
            DocumentUpload::new("id.png", "image/png", vec![]).validate(10),
            Err(KycError::EmptyFile)
        );
        assert_eq!(
            DocumentUpload::new("id.png", "image/png", vec![0; 11]).validate(10),
            Err(KycError::FileTooLarge { size: 11, max: 10 })
        );
    }

    #[test]
    fn test_debug_hides_bytes() {
        let upload = DocumentUpload::new("id.png", "image/png", vec![0xAB; 4]);
        let rendered = format!("{:?}", upload);
        assert!(rendered.contains("len: 4"));
        assert!(!rendered.contains("171"));
    }
}
