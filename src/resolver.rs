//! Maps an intent to the context the answer will be grounded on.

use crate::config::UnlabeledDocuments;
use crate::fetch::{FetchOutcome, MarketData, WebSearch};
use crate::intent::{Intent, IntentClassifier};
use crate::memory::ChartMemory;
use crate::models::{Attachment, ChartAnalysis, Document, Inbound};
use crate::replies;
use crate::store::DocumentStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Material handed to the synthesizer. Exactly one kind per question.
#[derive(Debug, Clone, PartialEq)]
pub enum Context {
    Documents(Vec<Document>),
    ChartAnalyses(Vec<ChartAnalysis>),
    /// Images attached to the current message, read by a vision model.
    Visual(Vec<Attachment>),
    WebSearch(String),
    Financial(String),
    Empty,
}

impl Context {
    /// Short description for logs and reply footers.
    pub fn summary(&self) -> String {
        match self {
            Context::Documents(docs) => plural(docs.len(), "document"),
            Context::ChartAnalyses(charts) => plural(charts.len(), "saved chart"),
            Context::Visual(images) => plural(images.len(), "image"),
            Context::WebSearch(_) => "web search".to_string(),
            Context::Financial(_) => "live market data".to_string(),
            Context::Empty => "general knowledge".to_string(),
        }
    }
}

fn plural(n: usize, noun: &str) -> String {
    format!("{} {}{}", n, noun, if n == 1 { "" } else { "s" })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Ready(Context),
    /// A final reply that needs no model call.
    ShortCircuit(&'static str),
}

pub struct ContextResolver {
    classifier: Arc<IntentClassifier>,
    documents: Arc<dyn DocumentStore>,
    charts: Arc<dyn ChartMemory>,
    market: Arc<dyn MarketData>,
    search: Arc<dyn WebSearch>,
    unlabeled: UnlabeledDocuments,
}

impl ContextResolver {
    pub fn new(
        classifier: Arc<IntentClassifier>,
        documents: Arc<dyn DocumentStore>,
        charts: Arc<dyn ChartMemory>,
        market: Arc<dyn MarketData>,
        search: Arc<dyn WebSearch>,
        unlabeled: UnlabeledDocuments,
    ) -> Self {
        Self {
            classifier,
            documents,
            charts,
            market,
            search,
            unlabeled,
        }
    }

    /// Gathers context for one question. Fetch failures degrade into a
    /// context note; only document store errors are returned.
    pub async fn resolve(&self, intent: Intent, inbound: &Inbound) -> anyhow::Result<Resolution> {
        let images = inbound.images();

        let resolution = match intent {
            Intent::Greeting => Resolution::ShortCircuit(replies::GREETING),
            Intent::ImageGeneration => Resolution::ShortCircuit(replies::IMAGE_REFUSAL),
            Intent::Prediction if !images.is_empty() => Resolution::Ready(Context::Visual(images)),
            Intent::Prediction => {
                let charts = self.charts.recent(&inbound.scope_key);
                if charts.is_empty() {
                    Resolution::ShortCircuit(replies::NO_CHART)
                } else {
                    Resolution::Ready(Context::ChartAnalyses(charts))
                }
            }
            Intent::RealTimeInfo => Resolution::Ready(self.live_context(&inbound.question).await),
            Intent::DocumentQuery => {
                let docs = self
                    .documents
                    .documents_for(&inbound.scope_key, inbound.label.as_deref(), self.unlabeled)
                    .await?;
                if docs.is_empty() {
                    Resolution::Ready(Context::Empty)
                } else {
                    Resolution::Ready(Context::Documents(docs))
                }
            }
            Intent::Chat if !images.is_empty() => Resolution::Ready(Context::Visual(images)),
            Intent::Chat => Resolution::Ready(Context::Empty),
        };

        if let Resolution::Ready(context) = &resolution {
            debug!("Resolver: {} -> {}", intent, context.summary());
        }
        Ok(resolution)
    }

    async fn live_context(&self, question: &str) -> Context {
        if self.classifier.is_financial(question) {
            match self.market.lookup(question).await {
                FetchOutcome::Found(text) => return Context::Financial(text),
                FetchOutcome::Failed(reason) => {
                    info!("Resolver: market data unavailable ({}), trying web search", reason)
                }
            }
        }

        match self.search.search(question).await {
            FetchOutcome::Found(text) => Context::WebSearch(text),
            FetchOutcome::Failed(reason) => {
                warn!("Resolver: no live data for question: {}", reason);
                Context::WebSearch(format!(
                    "**Live data unavailable:** unable to fetch current information right now ({}). \
                     Answer from general knowledge and tell the user the information may be out of date.",
                    reason
                ))
            }
        }
    }
}
