//! Storing uploaded text and PDF attachments as scope documents.

use crate::models::Attachment;
use crate::store::DocumentStore;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UploadReport {
    pub saved: Vec<String>,
    pub too_large: Vec<String>,
    /// Not text, not valid UTF-8, or a PDF without extractable text.
    pub unsupported: Vec<String>,
    /// Download or storage errors.
    pub failed: Vec<String>,
}

impl UploadReport {
    pub fn summary(&self, label: Option<&str>, max_bytes: u64) -> String {
        let mut lines = Vec::new();
        if !self.saved.is_empty() {
            lines.push(match label {
                Some(label) => format!(
                    "Saved {} file(s) under memory \"{}\": {}",
                    self.saved.len(),
                    label,
                    self.saved.join(", ")
                ),
                None => format!(
                    "Saved {} file(s) for this channel: {}",
                    self.saved.len(),
                    self.saved.join(", ")
                ),
            });
        }
        if !self.too_large.is_empty() {
            lines.push(format!(
                "❌ Too large (max {} MB): {}",
                max_bytes / (1024 * 1024),
                self.too_large.join(", ")
            ));
        }
        if !self.unsupported.is_empty() {
            lines.push(format!(
                "❌ Not a text file: {}",
                self.unsupported.join(", ")
            ));
        }
        if !self.failed.is_empty() {
            lines.push(format!("❌ Could not store: {}", self.failed.join(", ")));
        }
        lines.join("\n")
    }
}

/// Downloads and stores every text or PDF attachment. Images are skipped silently;
/// they are read by the vision path instead.
pub async fn ingest_attachments(
    http: &reqwest::Client,
    store: &dyn DocumentStore,
    scope_key: &str,
    label: Option<&str>,
    attachments: &[Attachment],
    max_bytes: u64,
) -> UploadReport {
    let mut report = UploadReport::default();

    for attachment in attachments.iter().filter(|a| !a.is_image()) {
        let name = attachment.filename.clone();
        if attachment.size > max_bytes {
            report.too_large.push(name);
            continue;
        }

        let bytes = match download(http, attachment).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Upload: download of {} failed: {}", name, e);
                report.failed.push(name);
                continue;
            }
        };
        if bytes.len() as u64 > max_bytes {
            report.too_large.push(name);
            continue;
        }
        let content = if attachment.is_pdf() {
            pdf_text(&name, bytes).await
        } else {
            as_text(attachment, bytes)
        };
        let Some(content) = content else {
            report.unsupported.push(name);
            continue;
        };

        match store.save_document(scope_key, &name, &content, label).await {
            Ok(id) => {
                info!(
                    "Upload: stored {} as document {} in scope {} (label: {:?})",
                    name, id, scope_key, label
                );
                report.saved.push(name);
            }
            Err(e) => {
                warn!("Upload: storing {} failed: {}", name, e);
                report.failed.push(name);
            }
        }
    }

    report
}

async fn download(http: &reqwest::Client, attachment: &Attachment) -> anyhow::Result<Vec<u8>> {
    let response = http.get(&attachment.url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Text layer of a PDF. Parsing runs off the async workers and a parser panic
/// only loses this one file.
async fn pdf_text(name: &str, bytes: Vec<u8>) -> Option<String> {
    match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await {
        Ok(Ok(text)) => {
            let text = text.trim();
            if text.is_empty() {
                warn!("Upload: {} has no text layer", name);
                None
            } else {
                info!("Upload: extracted {} characters from {}", text.chars().count(), name);
                Some(text.to_string())
            }
        }
        Ok(Err(e)) => {
            warn!("Upload: PDF extraction failed for {}: {}", name, e);
            None
        }
        Err(e) => {
            warn!("Upload: PDF extraction aborted for {}: {}", name, e);
            None
        }
    }
}

/// UTF-8 text, or `None` for binary content.
fn as_text(attachment: &Attachment, bytes: Vec<u8>) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(text) if attachment.is_text() || !text.contains('\0') => Some(text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let report = UploadReport {
            saved: vec!["a.txt".to_string(), "b.md".to_string()],
            too_large: vec!["big.log".to_string()],
            unsupported: vec![],
            failed: vec![],
        };
        let summary = report.summary(Some("specs"), 10 * 1024 * 1024);
        assert!(summary.contains("Saved 2 file(s) under memory \"specs\": a.txt, b.md"));
        assert!(summary.contains("Too large (max 10 MB): big.log"));
        assert!(!summary.contains("Not a text file"));
    }

    #[test]
    fn test_binary_is_not_text() {
        let blob = Attachment {
            filename: "dump.bin".to_string(),
            url: "https://cdn.example/dump.bin".to_string(),
            content_type: Some("application/octet-stream".to_string()),
            size: 4,
        };
        assert!(!blob.is_pdf());
        assert_eq!(as_text(&blob, vec![0x25, 0x50, 0xff, 0xfe]), None);
        assert_eq!(as_text(&blob, b"a\0b".to_vec()), None);
        assert_eq!(as_text(&blob, b"plain".to_vec()), Some("plain".to_string()));
    }

    #[tokio::test]
    async fn test_broken_pdf_has_no_text() {
        assert_eq!(pdf_text("broken.pdf", b"%PDF-1.4 not really".to_vec()).await, None);
    }
}
