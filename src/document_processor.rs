use anyhow::{anyhow, Result};
use std::path::Path;
use tokio::fs;

const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "docx", "txt", "md"];

/// Extracts plain contract text from uploaded documents.
pub struct DocumentProcessor;

impl DocumentProcessor {
    pub fn new() -> Self {
        Self
    }

    pub async fn extract_text_from_file<P: AsRef<Path>>(&self, file_path: P) -> Result<String> {
        let path = file_path.as_ref();
        let extension = Self::extension_of(path)
            .ok_or_else(|| anyhow!("Unable to determine file extension of {}", path.display()))?;

        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(anyhow!(
                "Unsupported file format: .{} (supported: .pdf, .docx, .txt, .md)",
                extension
            ));
        }

        let bytes = fs::read(path).await?;
        self.extract_text_from_bytes(&extension, &bytes)
    }

    /// Extracts text from raw document bytes, dispatching on the extension.
    pub fn extract_text_from_bytes(&self, extension: &str, bytes: &[u8]) -> Result<String> {
        match extension.to_lowercase().as_str() {
            "pdf" => self.extract_pdf_text(bytes),
            "docx" => self.extract_docx_text(bytes),
            "txt" | "md" => {
                let text = String::from_utf8(bytes.to_vec())
                    .map_err(|_| anyhow!("Text file is not valid UTF-8"))?;
                Ok(text)
            }
            other => Err(anyhow!("Unsupported file format: .{}", other)),
        }
    }

    fn extract_pdf_text(&self, bytes: &[u8]) -> Result<String> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| anyhow!("Failed to extract PDF text: {}", e))?;

        let cleaned_text = self.clean_extracted_text(&text);
        if cleaned_text.is_empty() {
            // Scanned PDFs carry images only.
            return Err(anyhow!("The PDF has no extractable text (is it a scanned document?)"));
        }
        Ok(cleaned_text)
    }

    fn extract_docx_text(&self, bytes: &[u8]) -> Result<String> {
        let docx = docx_rs::read_docx(bytes)
            .map_err(|e| anyhow!("Failed to read DOCX file: {}", e))?;

        let mut text = String::new();
        for child in docx.document.children {
            if let docx_rs::DocumentChild::Paragraph(para) = child {
                for run in para.children {
                    if let docx_rs::ParagraphChild::Run(run_content) = run {
                        for run_child in run_content.children {
                            match run_child {
                                docx_rs::RunChild::Text(text_content) => text.push_str(&text_content.text),
                                docx_rs::RunChild::Tab(_) => text.push('\t'),
                                _ => {}
                            }
                        }
                    }
                }
                text.push('\n');
            }
        }

        Ok(self.clean_extracted_text(&text))
    }

    fn clean_extracted_text(&self, text: &str) -> String {
        text.lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn extension_of(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    pub fn is_supported_format<P: AsRef<Path>>(&self, file_path: P) -> bool {
        Self::extension_of(file_path.as_ref())
            .map_or(false, |ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new()
    }
}
