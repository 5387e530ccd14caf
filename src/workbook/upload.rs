use crate::error::InsightSheetError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// An uploaded workbook: the file bytes plus the name the client sent, if any.
#[derive(Clone, Debug, Default)]
pub struct Upload {
    pub(crate) file_name: Option<String>,
    pub(crate) bytes: Vec<u8>,
}

impl Upload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { file_name: None, bytes }
    }

    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = Some(file_name.to_owned());
        self
    }

    /// Decodes a browser upload of the form `data:<mime>;base64,<payload>`.
    pub fn from_data_url(contents: &str, file_name: Option<&str>) -> Result<Self, InsightSheetError> {
        let unreadable = |reason: &str| InsightSheetError::UnreadableFile(format!(
            "{}: {}",
            file_name.unwrap_or("upload"),
            reason
        ));

        let rest = contents
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| unreadable("not a data URL"))?;
        let (media_type, payload) = rest
            .split_once(',')
            .ok_or_else(|| unreadable("data URL has no payload"))?;
        if !media_type.split(';').any(|parameter| parameter.eq_ignore_ascii_case("base64")) {
            return Err(unreadable("data URL payload is not base64"));
        }
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|error| unreadable(&format!("invalid base64 payload ({error})")))?;

        Ok(Self {
            file_name: file_name.map(|name| name.to_owned()),
            bytes,
        })
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Name used in messages: the client file name or a placeholder.
    pub(crate) fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("upload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_urls() -> Result<(), InsightSheetError> {
        let upload = Upload::from_data_url(
            "data:application/vnd.openxmlformats-officedocument.spreadsheetml.sheet;base64,UEsDBA==",
            Some("report.xlsx"),
        )?;
        assert_eq!(upload.bytes(), b"PK\x03\x04");
        assert_eq!(upload.file_name(), Some("report.xlsx"));
        Ok(())
    }

    #[test]
    fn rejects_malformed_data_urls() {
        for contents in ["UEsDBA==", "data:text/plain,hello", "data:;base64", "data:;base64,@@@"] {
            let result = Upload::from_data_url(contents, None);
            assert!(matches!(result, Err(InsightSheetError::UnreadableFile(_))), "{contents}");
        }
    }
}
