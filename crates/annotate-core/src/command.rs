//! Request/response objects for the external conversion service and the
//! summary handed back to callers after an export.

use crate::compositor::CompositeReport;
use crate::error::AnnotateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Word,
    Excel,
    Ppt,
    Html,
    Text,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Word => "docx",
            TargetFormat::Excel => "xlsx",
            TargetFormat::Ppt => "pptx",
            TargetFormat::Html => "html",
            TargetFormat::Text => "txt",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetFormat::Word => "word",
            TargetFormat::Excel => "excel",
            TargetFormat::Ppt => "ppt",
            TargetFormat::Html => "html",
            TargetFormat::Text => "text",
        };
        f.write_str(name)
    }
}

impl FromStr for TargetFormat {
    type Err = AnnotateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "word" | "docx" => Ok(TargetFormat::Word),
            "excel" | "xlsx" => Ok(TargetFormat::Excel),
            "ppt" | "pptx" | "powerpoint" => Ok(TargetFormat::Ppt),
            "html" => Ok(TargetFormat::Html),
            "text" | "txt" => Ok(TargetFormat::Text),
            other => Err(AnnotateError::OperationError(format!(
                "Unknown target format: {}",
                other
            ))),
        }
    }
}

/// Upload sent to the conversion service. File bytes travel as base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServiceCommand {
    Convert {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
        format: TargetFormat,
        operation: String,
    },
    #[serde(rename_all = "camelCase")]
    Encrypt {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
        user_password: String,
        #[serde(default)]
        owner_password: Option<String>,
    },
    Decrypt {
        #[serde(with = "base64_bytes")]
        file: Vec<u8>,
        password: String,
    },
}

impl ServiceCommand {
    pub fn convert(file: Vec<u8>, format: TargetFormat) -> Self {
        ServiceCommand::Convert {
            file,
            format,
            operation: format!("pdf-to-{}", format),
        }
    }

    pub fn file(&self) -> &[u8] {
        match self {
            ServiceCommand::Convert { file, .. }
            | ServiceCommand::Encrypt { file, .. }
            | ServiceCommand::Decrypt { file, .. } => file,
        }
    }

    /// Name of the file the service should return.
    pub fn output_filename(&self, stem: &str) -> String {
        match self {
            ServiceCommand::Convert { format, .. } => format!("{}.{}", stem, format.extension()),
            ServiceCommand::Encrypt { .. } => format!("{}-protected.pdf", stem),
            ServiceCommand::Decrypt { .. } => format!("{}-unlocked.pdf", stem),
        }
    }

    pub fn to_json(&self) -> Result<String, AnnotateError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ServiceResponse {
    Converted {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        filename: String,
    },
    Failed {
        error: String,
    },
}

impl ServiceResponse {
    pub fn from_json(json: &str) -> Result<Self, AnnotateError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Converted bytes and file name, or the service's error message.
    pub fn into_result(self) -> Result<(Vec<u8>, String), AnnotateError> {
        match self {
            ServiceResponse::Converted { data, filename } => Ok((data, filename)),
            ServiceResponse::Failed { error } => Err(AnnotateError::OperationError(error)),
        }
    }
}

/// Result of an export, shaped for the browser boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub success: bool,
    /// Base64-encoded PDF data
    pub data: Option<String>,
    pub error: Option<String>,
    pub metrics: Option<ExportMetrics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: usize,
    pub edit_count: usize,
    pub applied: usize,
    pub skipped_out_of_range: usize,
    pub skipped_noop: usize,
    pub failed: usize,
}

impl ExportMetrics {
    pub fn from_report(
        report: &CompositeReport,
        input_size_bytes: usize,
        output_size_bytes: usize,
        edit_count: usize,
    ) -> Self {
        Self {
            input_size_bytes,
            output_size_bytes,
            page_count: report.page_count,
            edit_count,
            applied: report.applied,
            skipped_out_of_range: report.skipped_out_of_range,
            skipped_noop: report.skipped_noop,
            failed: report.failed,
        }
    }
}

impl ExportResult {
    pub fn ok(bytes: &[u8], metrics: ExportMetrics) -> Self {
        use base64::Engine;
        Self {
            success: true,
            data: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
            error: None,
            metrics: Some(metrics),
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            metrics: None,
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
