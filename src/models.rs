use chrono::{DateTime, Utc};

/// A text file remembered for a scope (channel or DM), optionally under a label.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: i64,
    pub scope_key: String,
    pub label: Option<String>,
    pub filename: String,
    pub content: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A vision model's reading of an uploaded chart, kept for follow-up predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartAnalysis {
    pub scope_key: String,
    pub filename: String,
    pub analysis: String,
    pub source_url: String,
    pub timestamp: DateTime<Utc>,
}

/// Transport-neutral view of a message attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size: u64,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }

    pub fn is_pdf(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => ct.starts_with("application/pdf"),
            None => self.filename.to_lowercase().ends_with(".pdf"),
        }
    }

    pub fn is_text(&self) -> bool {
        match self.content_type.as_deref() {
            Some(ct) => {
                ct.starts_with("text/")
                    || ct.starts_with("application/json")
                    || ct.starts_with("application/xml")
                    || ct.starts_with("application/x-yaml")
            }
            None => {
                let lower = self.filename.to_lowercase();
                [".txt", ".md", ".csv", ".json", ".log", ".yaml", ".yml", ".toml"]
                    .iter()
                    .any(|ext| lower.ends_with(ext))
            }
        }
    }
}

/// One inbound question, already stripped of mentions and control phrases.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub scope_key: String,
    pub user_id: String,
    pub question: String,
    pub label: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl Inbound {
    pub fn images(&self) -> Vec<Attachment> {
        self.attachments.iter().filter(|a| a.is_image()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: &str, ct: Option<&str>) -> Attachment {
        Attachment {
            filename: name.to_string(),
            url: format!("https://cdn.example/{}", name),
            content_type: ct.map(str::to_string),
            size: 10,
        }
    }

    #[test]
    fn test_attachment_kinds() {
        assert!(attachment("chart.png", Some("image/png")).is_image());
        assert!(!attachment("chart.png", Some("image/png")).is_text());
        assert!(attachment("notes.txt", Some("text/plain; charset=utf-8")).is_text());
        assert!(attachment("data.json", None).is_text());
        assert!(!attachment("report.pdf", Some("application/pdf")).is_text());
        assert!(attachment("report.pdf", Some("application/pdf")).is_pdf());
        assert!(attachment("Report.PDF", None).is_pdf());
        assert!(!attachment("notes.txt", Some("text/plain")).is_pdf());
    }
}
