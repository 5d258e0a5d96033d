//! End-to-end handling of one question: classify, resolve, synthesize, record.

use crate::config::{Config, UnlabeledDocuments};
use crate::db::Database;
use crate::fetch::{CoinGecko, WebSearcher};
use crate::intent::{Intent, IntentClassifier};
use crate::llm::LlmClient;
use crate::memory::{ChartMemory, NotificationBoard};
use crate::models::{ChartAnalysis, Inbound};
use crate::replies;
use crate::resolver::{Context, ContextResolver, Resolution};
use crate::store::{ConversationLog, DocumentStore};
use crate::synthesis::{failure_message, SynthesisSettings, Synthesizer};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub intent: Intent,
    /// What the answer was grounded on, e.g. "3 documents".
    pub grounding: String,
}

impl Reply {
    fn fixed(text: &str, intent: Intent) -> Self {
        Self {
            text: text.to_string(),
            intent,
            grounding: "none".to_string(),
        }
    }

    /// Predictions go out as plain messages so the closing line is never hidden in an embed.
    pub fn is_plain(&self) -> bool {
        self.intent == Intent::Prediction
    }
}

pub struct Assistant {
    classifier: Arc<IntentClassifier>,
    resolver: ContextResolver,
    synthesizer: Synthesizer,
    documents: Arc<dyn DocumentStore>,
    charts: Arc<dyn ChartMemory>,
    notifications: Arc<dyn NotificationBoard>,
    log: Arc<dyn ConversationLog>,
    unlabeled: UnlabeledDocuments,
}

/// Collaborators for [`Assistant::new`].
pub struct AssistantParts {
    pub classifier: Arc<IntentClassifier>,
    pub resolver: ContextResolver,
    pub synthesizer: Synthesizer,
    pub documents: Arc<dyn DocumentStore>,
    pub charts: Arc<dyn ChartMemory>,
    pub notifications: Arc<dyn NotificationBoard>,
    pub log: Arc<dyn ConversationLog>,
    pub unlabeled: UnlabeledDocuments,
}

impl Assistant {
    pub fn new(parts: AssistantParts) -> Self {
        Self {
            classifier: parts.classifier,
            resolver: parts.resolver,
            synthesizer: parts.synthesizer,
            documents: parts.documents,
            charts: parts.charts,
            notifications: parts.notifications,
            log: parts.log,
            unlabeled: parts.unlabeled,
        }
    }

    /// Production wiring: SQLite documents and log, CoinGecko, web search and the OpenAI client.
    pub fn from_config(
        config: &Config,
        db: Database,
        http: reqwest::Client,
        charts: Arc<dyn ChartMemory>,
        notifications: Arc<dyn NotificationBoard>,
    ) -> anyhow::Result<Self> {
        let classifier = Arc::new(IntentClassifier::new(&config.keywords)?);
        let timeout = Duration::from_secs(config.fetch_timeout_secs);
        let db = Arc::new(db);

        let market = CoinGecko::new(
            http.clone(),
            &config.coingecko_url,
            timeout,
            config.market_snapshot_size,
        );
        let mut search = WebSearcher::new(http, &config.duckduckgo_url, timeout);
        if let Some(key) = &config.tavily_api_key {
            search = search.with_tavily(&config.tavily_url, key);
        }

        let resolver = ContextResolver::new(
            classifier.clone(),
            db.clone(),
            charts.clone(),
            Arc::new(market),
            Arc::new(search),
            config.unlabeled_documents,
        );
        let synthesizer = Synthesizer::new(
            Arc::new(LlmClient::new(config)),
            SynthesisSettings::from_config(config),
        );

        Ok(Self::new(AssistantParts {
            classifier,
            resolver,
            synthesizer,
            documents: db.clone(),
            charts,
            notifications,
            log: db,
            unlabeled: config.unlabeled_documents,
        }))
    }

    /// Always produces a reply; every failure is mapped to a user-facing message.
    pub async fn respond(&self, inbound: &Inbound) -> Reply {
        let question = inbound.question.trim();
        if question.is_empty() && inbound.attachments.is_empty() {
            return Reply::fixed(replies::GREETING, Intent::Greeting);
        }

        let documents_available = match self
            .documents
            .has_documents(&inbound.scope_key, inbound.label.as_deref(), self.unlabeled)
            .await
        {
            Ok(available) => available,
            Err(e) => {
                error!("Pipeline: document lookup failed for {}: {}", inbound.scope_key, e);
                return Reply::fixed(replies::STORE_FAILED, Intent::Chat);
            }
        };

        // Images are answered with vision even when the scope holds documents.
        let intent = self.classifier.classify_in_scope(
            question,
            !inbound.attachments.is_empty(),
            documents_available && inbound.images().is_empty(),
        );
        info!(
            "Pipeline: {} in scope {} classified as {}",
            inbound.user_id, inbound.scope_key, intent
        );

        let context = match self.resolver.resolve(intent, inbound).await {
            Ok(Resolution::Ready(context)) => context,
            Ok(Resolution::ShortCircuit(text)) => return Reply::fixed(text, intent),
            Err(e) => {
                error!("Pipeline: context resolution failed: {}", e);
                return Reply::fixed(replies::STORE_FAILED, intent);
            }
        };

        let history = self
            .notifications
            .recent(&inbound.user_id)
            .map(|n| n.message);

        let text = match self
            .synthesizer
            .try_synthesize(question, intent, &context, history.as_deref())
            .await
        {
            Ok(text) => {
                self.remember_charts(inbound, &context, &text);
                text
            }
            Err(e) => {
                error!("Pipeline: synthesis failed: {}", e);
                failure_message(&e).to_string()
            }
        };

        let logged_question = match &inbound.label {
            Some(label) => format!("[{}] {}", label, question),
            None => question.to_string(),
        };
        if let Err(e) = self
            .log
            .log_conversation(&inbound.scope_key, &inbound.user_id, &logged_question, &text)
            .await
        {
            warn!("Pipeline: failed to log conversation: {}", e);
        }

        Reply {
            text,
            intent,
            grounding: context.summary(),
        }
    }

    /// A successful vision answer doubles as the analysis of each image for later predictions.
    fn remember_charts(&self, inbound: &Inbound, context: &Context, analysis: &str) {
        if let Context::Visual(images) = context {
            for image in images {
                self.charts.remember(ChartAnalysis {
                    scope_key: inbound.scope_key.clone(),
                    filename: image.filename.clone(),
                    analysis: analysis.to_string(),
                    source_url: image.url.clone(),
                    timestamp: Utc::now(),
                });
            }
        }
    }
}
