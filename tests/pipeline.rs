use async_trait::async_trait;
use chrono::Utc;
use elder::config::UnlabeledDocuments;
use elder::db::Database;
use elder::fetch::{FetchOutcome, MarketData, WebSearch};
use elder::intent::{Intent, IntentClassifier, KeywordConfig};
use elder::llm::{Completion, CompletionRequest, LlmError, Part};
use elder::memory::{
    ChartMemory, InMemoryChartMemory, InMemoryNotifications, Notification, NotificationBoard,
};
use elder::models::{Attachment, Inbound};
use elder::pipeline::{Assistant, AssistantParts};
use elder::replies;
use elder::resolver::ContextResolver;
use elder::models::Document;
use elder::store::{ConversationLog, DocumentStore};
use elder::synthesis::{SynthesisSettings, Synthesizer};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct FakeLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeLlm {
    fn push(&self, reply: Result<String, LlmError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for FakeLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }
}

/// Keeps every logged exchange in memory.
#[derive(Default)]
struct RecordingLog {
    entries: Mutex<Vec<(String, String, String)>>,
}

impl RecordingLog {
    fn answers(&self) -> Vec<String> {
        self.entries.lock().unwrap().iter().map(|e| e.2.clone()).collect()
    }

    fn questions(&self) -> Vec<String> {
        self.entries.lock().unwrap().iter().map(|e| e.1.clone()).collect()
    }
}

#[async_trait]
impl ConversationLog for RecordingLog {
    async fn log_conversation(
        &self,
        scope_key: &str,
        _user_id: &str,
        question: &str,
        answer: &str,
    ) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push((
            scope_key.to_string(),
            question.to_string(),
            answer.to_string(),
        ));
        Ok(())
    }
}

/// A document store whose backing database is gone.
struct BrokenStore;

#[async_trait]
impl DocumentStore for BrokenStore {
    async fn save_document(&self, _: &str, _: &str, _: &str, _: Option<&str>) -> anyhow::Result<i64> {
        anyhow::bail!("database is locked")
    }

    async fn documents_for(
        &self,
        _: &str,
        _: Option<&str>,
        _: UnlabeledDocuments,
    ) -> anyhow::Result<Vec<Document>> {
        anyhow::bail!("database is locked")
    }

    async fn has_documents(&self, _: &str, _: Option<&str>, _: UnlabeledDocuments) -> anyhow::Result<bool> {
        anyhow::bail!("database is locked")
    }
}

struct Offline;

#[async_trait]
impl MarketData for Offline {
    async fn lookup(&self, _query: &str) -> FetchOutcome {
        FetchOutcome::Found("**Bitcoin (BTC) live market data**\n- Price: $67,234.50".to_string())
    }
}

#[async_trait]
impl WebSearch for Offline {
    async fn search(&self, _query: &str) -> FetchOutcome {
        FetchOutcome::Failed("offline".to_string())
    }
}

struct Harness {
    assistant: Assistant,
    llm: Arc<FakeLlm>,
    db: Database,
    log: Arc<RecordingLog>,
    charts: Arc<InMemoryChartMemory>,
    notifications: Arc<InMemoryNotifications>,
}

fn harness() -> Harness {
    let db = Database::open(":memory:").unwrap();
    db.execute_init().unwrap();
    harness_with(db.clone(), Arc::new(db))
}

fn harness_with(db: Database, documents: Arc<dyn DocumentStore>) -> Harness {
    let llm = Arc::new(FakeLlm::default());
    let log = Arc::new(RecordingLog::default());
    let charts = Arc::new(InMemoryChartMemory::new(10));
    let notifications = Arc::new(InMemoryNotifications::new(Duration::from_secs(3600)));
    let classifier = Arc::new(IntentClassifier::new(&KeywordConfig::default()).unwrap());

    let resolver = ContextResolver::new(
        classifier.clone(),
        documents.clone(),
        charts.clone(),
        Arc::new(Offline),
        Arc::new(Offline),
        UnlabeledDocuments::All,
    );
    let assistant = Assistant::new(AssistantParts {
        classifier,
        resolver,
        synthesizer: Synthesizer::new(llm.clone(), SynthesisSettings::default()),
        documents,
        charts: charts.clone(),
        notifications: notifications.clone(),
        log: log.clone(),
        unlabeled: UnlabeledDocuments::All,
    });

    Harness {
        assistant,
        llm,
        db,
        log,
        charts,
        notifications,
    }
}

fn ask(question: &str) -> Inbound {
    Inbound {
        scope_key: "chan-1".to_string(),
        user_id: "user-1".to_string(),
        question: question.to_string(),
        label: None,
        attachments: Vec::new(),
    }
}

fn chart_image() -> Attachment {
    Attachment {
        filename: "sol-4h.png".to_string(),
        url: "https://cdn.example/sol-4h.png".to_string(),
        content_type: Some("image/png".to_string()),
        size: 2048,
    }
}

#[tokio::test]
async fn empty_mention_gets_greeting_without_model_call() {
    let h = harness();
    let reply = h.assistant.respond(&ask("   ")).await;
    assert_eq!(reply.intent, Intent::Greeting);
    assert_eq!(reply.text, replies::GREETING);
    assert!(h.llm.requests().is_empty());
}

#[tokio::test]
async fn image_requests_are_refused() {
    let h = harness();
    let reply = h.assistant.respond(&ask("generate an image of a bull market")).await;
    assert_eq!(reply.text, replies::IMAGE_REFUSAL);
    assert!(h.llm.requests().is_empty());
}

#[tokio::test]
async fn prediction_needs_a_chart_first() {
    let h = harness();
    let reply = h.assistant.respond(&ask("predict where SOL lands by end of 2026")).await;
    assert_eq!(reply.text, replies::NO_CHART);
    assert!(h.llm.requests().is_empty());
}

#[tokio::test]
async fn chart_upload_feeds_later_prediction() {
    let h = harness();
    h.llm.push(Ok("SOL 4h: ascending channel, support $138, resistance $165.".to_string()));

    let mut upload = ask("");
    upload.attachments.push(chart_image());
    let reply = h.assistant.respond(&upload).await;
    assert_eq!(reply.grounding, "1 image");
    assert_eq!(h.charts.recent("chan-1").len(), 1);
    assert!(h.charts.recent("other").is_empty());

    h.llm.push(Ok(
        "Bullish: break of $165.\nBase: range.\nBearish: lose $138.\nMy price prediction is $150-175 by end of 2026"
            .to_string(),
    ));
    let reply = h.assistant.respond(&ask("predict SOL by end of 2026")).await;
    assert_eq!(reply.intent, Intent::Prediction);
    assert!(reply.is_plain());
    assert!(reply.text.ends_with("My price prediction is $150-175 by end of 2026"));

    let requests = h.llm.requests();
    assert!(requests[0].user.iter().any(|p| matches!(p, Part::ImageUrl(_))));
    assert!(matches!(&requests[1].user[0], Part::Text(t) if t.contains("ascending channel")));
    assert_eq!(requests[1].max_tokens, 2000);
}

#[tokio::test]
async fn failed_vision_call_is_not_remembered() {
    let h = harness();
    h.llm.push(Err(LlmError::Api("boom".to_string())));
    let mut upload = ask("what is this?");
    upload.attachments.push(chart_image());

    let reply = h.assistant.respond(&upload).await;
    assert_eq!(reply.text, replies::LLM_FAILED);
    assert!(h.charts.recent("chan-1").is_empty());
}

#[tokio::test]
async fn labeled_documents_ground_the_answer() {
    let h = harness();
    h.db.save_document("chan-1", "roadmap.txt", "Launch is planned for March.", Some("roadmap"))
        .await
        .unwrap();
    h.db.save_document("chan-1", "other.txt", "Unrelated notes.", Some("misc"))
        .await
        .unwrap();
    h.llm.push(Ok("From roadmap.txt: \"Launch is planned for March.\"".to_string()));

    let mut question = ask("when is the launch?");
    question.label = Some("roadmap".to_string());
    let reply = h.assistant.respond(&question).await;

    assert_eq!(reply.intent, Intent::DocumentQuery);
    assert_eq!(reply.grounding, "1 document");
    let system = &h.llm.requests()[0].system;
    assert!(system.contains("Launch is planned for March."));
    assert!(!system.contains("Unrelated notes."));
    assert_eq!(h.log.answers(), vec![reply.text.clone()]);
    assert_eq!(h.log.questions(), vec!["[roadmap] when is the launch?".to_string()]);
}

#[tokio::test]
async fn live_questions_use_market_data() {
    let h = harness();
    h.llm.push(Ok("Bitcoin trades at $67,234.50.".to_string()));
    let reply = h.assistant.respond(&ask("what is the bitcoin price right now?")).await;
    assert_eq!(reply.intent, Intent::RealTimeInfo);
    assert_eq!(reply.grounding, "live market data");
    assert!(h.llm.requests()[0].system.contains("$67,234.50"));
}

#[tokio::test]
async fn rate_limits_get_a_friendly_reply() {
    let h = harness();
    h.llm.push(Err(LlmError::RateLimited("429".to_string())));
    let reply = h.assistant.respond(&ask("tell me a joke")).await;
    assert_eq!(reply.text, replies::RATE_LIMITED);
}

#[tokio::test]
async fn recent_notification_is_offered_as_history() {
    let h = harness();
    h.notifications.record(Notification {
        user_id: "user-1".to_string(),
        message: "ETH long closed at +6%".to_string(),
        sent_at: Utc::now(),
    });
    h.assistant.respond(&ask("what did that last signal mean?")).await;
    h.assistant
        .respond(&Inbound {
            user_id: "user-2".to_string(),
            ..ask("what did that last signal mean?")
        })
        .await;

    let requests = h.llm.requests();
    assert!(requests[0].system.contains("ETH long closed at +6%"));
    assert!(!requests[1].system.contains("ETH long closed at +6%"));
}

#[tokio::test]
async fn screenshot_is_read_even_when_documents_exist() {
    let h = harness();
    h.db.save_document("chan-1", "notes.txt", "Team offsite is in May.", None)
        .await
        .unwrap();
    h.llm.push(Ok("BTC 1h chart: higher lows, resistance at $71,000.".to_string()));

    let mut question = ask("what do you see in this screenshot?");
    question.attachments.push(chart_image());
    let reply = h.assistant.respond(&question).await;

    assert_eq!(reply.intent, Intent::Chat);
    assert_eq!(reply.grounding, "1 image");
    let requests = h.llm.requests();
    assert!(requests[0].user.iter().any(|p| matches!(p, Part::ImageUrl(_))));
    assert!(!requests[0].system.contains("Team offsite"));
    assert_eq!(h.charts.recent("chan-1").len(), 1);
}

#[tokio::test]
async fn store_failure_aborts_before_the_model() {
    let db = Database::open(":memory:").unwrap();
    db.execute_init().unwrap();
    let h = harness_with(db, Arc::new(BrokenStore));

    let reply = h.assistant.respond(&ask("what did we decide about pricing?")).await;

    assert_eq!(reply.text, replies::STORE_FAILED);
    assert!(h.llm.requests().is_empty());
    assert!(h.log.answers().is_empty());
}
