//! Query results.
//!
//! Result payloads (VOTable, CSV, JSON, FITS, ...) are kept as opaque bytes.
//! Light inspection helpers are provided for JSON and VOTable payloads.

use std::fmt;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::conn::HttpResponse;
use crate::error::{TapError, TapResult};
use crate::xmlparser;

/// Output format requested from the server (`FORMAT` parameter).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Votable,
    VotablePlain,
    Csv,
    Json,
    Fits,
    Ecsv,
    Other(String),
}

impl OutputFormat {
    /// Wire name sent as `FORMAT`.
    pub fn as_str(&self) -> &str {
        match self {
            OutputFormat::Votable => "votable",
            OutputFormat::VotablePlain => "votable_plain",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Fits => "fits",
            OutputFormat::Ecsv => "ecsv",
            OutputFormat::Other(name) => name,
        }
    }

    /// File extension used when no content type is known.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Votable | OutputFormat::VotablePlain => ".vot",
            OutputFormat::Csv => ".csv",
            OutputFormat::Json => ".json",
            OutputFormat::Fits => ".fits",
            OutputFormat::Ecsv => ".ecsv",
            OutputFormat::Other(name) => {
                let name = name.to_ascii_lowercase();
                if name.contains("vot") {
                    ".vot"
                } else if name.contains("xml") {
                    ".xml"
                } else if name.contains("json") {
                    ".json"
                } else if name.contains("plain") || name.contains("ascii") {
                    ".txt"
                } else if name.contains("csv") {
                    ".csv"
                } else if name.contains("fits") {
                    ".fits"
                } else {
                    ""
                }
            }
        }
    }

    pub fn is_votable(&self) -> bool {
        matches!(self, OutputFormat::Votable | OutputFormat::VotablePlain)
    }
}

impl From<&str> for OutputFormat {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "votable" | "vot" => OutputFormat::Votable,
            "votable_plain" => OutputFormat::VotablePlain,
            "csv" => OutputFormat::Csv,
            "json" => OutputFormat::Json,
            "fits" => OutputFormat::Fits,
            "ecsv" => OutputFormat::Ecsv,
            _ => OutputFormat::Other(value.trim().to_string()),
        }
    }
}

impl From<String> for OutputFormat {
    fn from(value: String) -> Self {
        OutputFormat::from(value.as_str())
    }
}

impl From<OutputFormat> for String {
    fn from(value: OutputFormat) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `FIELD` declared by a VOTable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotableField {
    pub name: String,
    pub datatype: Option<String>,
    pub arraysize: Option<String>,
    pub unit: Option<String>,
    pub ucd: Option<String>,
    pub description: Option<String>,
}

/// Shape of a VOTable payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotableSummary {
    pub fields: Vec<VotableField>,
    /// Number of `TR` rows; `None` for binary serializations.
    pub row_count: Option<usize>,
    /// Value of the `QUERY_STATUS` info (`OK`, `ERROR`, `OVERFLOW`).
    pub query_status: Option<String>,
    pub status_message: Option<String>,
}

impl VotableSummary {
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn is_overflow(&self) -> bool {
        self.query_status.as_deref() == Some("OVERFLOW")
    }
}

/// Payload returned by a query, in the requested output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResults {
    pub format: OutputFormat,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl QueryResults {
    pub fn new(format: OutputFormat, content_type: Option<String>, data: Vec<u8>) -> Self {
        Self {
            format,
            content_type,
            data,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_text(&self) -> TapResult<String> {
        String::from_utf8(self.data.clone())
            .map_err(|e| TapError::parse(format!("Results are not valid UTF-8: {}", e)))
    }

    pub fn to_json(&self) -> TapResult<serde_json::Value> {
        serde_json::from_slice(&self.data)
            .map_err(|e| TapError::parse(format!("Results are not valid JSON: {}", e)))
    }

    pub fn votable_summary(&self) -> TapResult<VotableSummary> {
        xmlparser::parse_votable_summary(&self.data)
    }

    /// Read results previously dumped to `path`. Gzip files are decompressed.
    pub async fn load(path: &Path, format: OutputFormat) -> TapResult<Self> {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read results from {}", path.display()))?;
        let data = if raw.starts_with(&[0x1f, 0x8b]) {
            let mut out = Vec::new();
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut out)
                .with_context(|| format!("Cannot decompress {}", path.display()))?;
            out
        } else {
            raw
        };
        Ok(Self::new(format, None, data))
    }

    pub async fn save(&self, path: &Path) -> TapResult<()> {
        tokio::fs::write(path, &self.data)
            .await
            .with_context(|| format!("Failed to save results to {}", path.display()))?;
        Ok(())
    }
}

/// Wrap a response body, decompressing it when needed.
pub fn read_http_response(
    response: &HttpResponse,
    format: &OutputFormat,
) -> TapResult<QueryResults> {
    let data = response.decoded_body()?;
    Ok(QueryResults::new(
        format.clone(),
        response.header("Content-Type").map(str::to_string),
        data,
    ))
}
