// promptforge — Document extraction for business context

pub mod codebase;
pub mod infra;

use crate::artifact::BusinessContextArtifact;
use crate::error::ExtractError;
use std::path::Path;

/// Supported document formats, by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Markdown,
    Text,
    Csv,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            "txt" | "text" => Ok(DocumentFormat::Text),
            "csv" => Ok(DocumentFormat::Csv),
            "" => Err(ExtractError::UnsupportedFormat(path.display().to_string())),
            other => Err(ExtractError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Markdown => "markdown",
            DocumentFormat::Text => "text",
            DocumentFormat::Csv => "csv",
        }
    }
}

/// Extract a document's text as Markdown.
///
/// Markdown and plain text pass through; CSV becomes a Markdown table.
/// Anything else (PDF included) is `UnsupportedFormat`.
pub async fn extract_text(path: &Path) -> Result<String, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::NotFound(path.display().to_string()));
    }
    let format = DocumentFormat::from_path(path)?;
    let raw = tokio::fs::read_to_string(path).await?;
    let title = file_name(path);

    let markdown = match format {
        DocumentFormat::Markdown => raw,
        DocumentFormat::Text => format!("# {}\n\n{}", title, raw.trim_end()),
        DocumentFormat::Csv => format!("# {}\n\n{}", title, csv_to_markdown(&raw)?),
    };
    tracing::debug!(path = %path.display(), format = format.as_str(), chars = markdown.len(), "Document extracted");
    Ok(markdown)
}

/// Extract a document and wrap it as a business-context artifact.
pub async fn index_document(path: &Path) -> Result<BusinessContextArtifact, ExtractError> {
    let extracted_markdown = extract_text(path).await?;
    let format = DocumentFormat::from_path(path)?;
    Ok(BusinessContextArtifact {
        filename: file_name(path),
        file_type: format.as_str().to_string(),
        source_uri: path.display().to_string(),
        extracted_markdown,
        indexed_at: chrono::Utc::now().to_rfc3339(),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Render CSV text as a Markdown table. The first record is the header.
///
/// Quoted fields may span lines; embedded newlines become `<br>`.
pub fn csv_to_markdown(raw: &str) -> Result<String, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let rows: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .map_err(|e| ExtractError::Parse {
            format: "csv".into(),
            message: e.to_string(),
        })?;

    let Some((header, body)) = rows.split_first() else {
        return Ok(String::new());
    };

    let width = header.len();
    let cell = |s: &str| s.replace('|', "\\|").replace("\r\n", "<br>").replace('\n', "<br>");
    let mut out = String::new();
    out.push_str(&format!(
        "| {} |\n",
        header.iter().map(cell).collect::<Vec<_>>().join(" | ")
    ));
    out.push_str(&format!("|{}\n", " --- |".repeat(width)));
    for row in body {
        let cells: Vec<String> = (0..width)
            .map(|i| row.get(i).map(cell).unwrap_or_default())
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    Ok(out)
}
