//! Fixed user-facing texts.

pub const GREETING: &str = "👋 Hi! Mention me with a question and I'll answer it.\n\n\
**What I can do:**\n\
• Answer questions, using live market data and web search for current topics\n\
• Read charts you upload and give price predictions\n\
• Remember documents: upload text or PDF files with `remember as <label>`\n\
• Answer from a memory: ask with `using <label>`\n\n\
Commands: `/ask`, `/memories`, `/forget_charts`";

pub const IMAGE_REFUSAL: &str = "Sorry, I do not create or generate images.";

pub const NO_CHART: &str = "I don't have any charts in memory to make predictions about. \
Please upload a chart first, then ask me for predictions!";

pub const RATE_LIMITED: &str =
    "I'm currently experiencing high demand. Please try again in a moment, or ask a simpler question.";

pub const LLM_FAILED: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

pub const STORE_FAILED: &str =
    "❌ Sorry, I couldn't process that. Please try again in a moment.";

pub const UPLOAD_NEEDS_LABEL: &str =
    "Please give the memory a name, like: `remember as project_docs`";

pub const UPLOAD_FAILED: &str =
    "❌ Sorry, I couldn't process that file. Please make sure it's a text or PDF file.";
