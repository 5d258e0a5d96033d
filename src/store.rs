use crate::config::UnlabeledDocuments;
use crate::models::Document;
use async_trait::async_trait;

/// Documents partitioned by scope and optional label.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save_document(
        &self,
        scope_key: &str,
        filename: &str,
        content: &str,
        label: Option<&str>,
    ) -> anyhow::Result<i64>;

    /// Documents visible to a question, newest first.
    ///
    /// With a label only that label's documents are returned; without one the
    /// `policy` decides between the whole scope and nothing.
    async fn documents_for(
        &self,
        scope_key: &str,
        label: Option<&str>,
        policy: UnlabeledDocuments,
    ) -> anyhow::Result<Vec<Document>>;

    async fn has_documents(
        &self,
        scope_key: &str,
        label: Option<&str>,
        policy: UnlabeledDocuments,
    ) -> anyhow::Result<bool>;
}

/// Append-only question/answer audit trail.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn log_conversation(
        &self,
        scope_key: &str,
        user_id: &str,
        question: &str,
        answer: &str,
    ) -> anyhow::Result<()>;
}
