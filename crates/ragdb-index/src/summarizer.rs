use std::sync::Arc;

use async_trait::async_trait;

use ragdb_core::traits::{Generator, Summarizer};

const TEXT_PROMPT: &str = "You are good at summarizing passages. The summary will be embedded and used to retrieve \
the original passage, so state the key points of the passage below.\nPassage: {text}\nSummary: ";

const TABLE_PROMPT: &str = "You are good at summarizing tables. The summary will be embedded and used to retrieve \
the original table, so state the key points of the table below.\nTable: {table}\nSummary: ";

/// Summaries produced by a language model.
pub struct LlmSummarizer {
    generator: Arc<dyn Generator>,
}

impl LlmSummarizer {
    pub fn new(generator: Arc<dyn Generator>) -> Self { Self { generator } }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str) -> anyhow::Result<String> {
        let out = self.generator.complete(&TEXT_PROMPT.replace("{text}", text)).await?;
        Ok(out.trim().to_string())
    }

    async fn summarize_table(&self, table: &str) -> anyhow::Result<String> {
        let out = self.generator.complete(&TABLE_PROMPT.replace("{table}", table)).await?;
        Ok(out.trim().to_string())
    }
}
