//! Query-side adapters over a text generator: multi-query rewriting and HyDE.

use std::sync::Arc;

use async_trait::async_trait;

use ragdb_core::traits::{Generator, QueryRewriter};

const MULTI_QUERY_PROMPT: &str = "You help retrieve documents from a vector database. Rewrite the user question \
below as three different search queries that keep its meaning but vary wording, synonyms and scope. If the \
question has several aspects, give each its own query. Reply with one query per line and nothing else.\n\
Question: {question}";

const HYDE_PROMPT: &str = "Rewrite the search request below so it finds the most useful passages in a knowledge \
base. Do not answer it. Give one or two short rewritten requests, at most 30 words each, one per line, keeping \
the original meaning.\nSearch request: {question}\nRewritten:";

/// One rewrite per non-empty line of the generator's reply.
pub struct LlmQueryRewriter {
    generator: Arc<dyn Generator>,
}

impl LlmQueryRewriter {
    pub fn new(generator: Arc<dyn Generator>) -> Self { Self { generator } }
}

#[async_trait]
impl QueryRewriter for LlmQueryRewriter {
    async fn rewrite(&self, query: &str) -> anyhow::Result<Vec<String>> {
        let reply = self.generator.complete(&MULTI_QUERY_PROMPT.replace("{question}", query)).await?;
        Ok(reply.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
    }
}

/// Appends a generated search hint to the query.
pub struct HydeExpander {
    generator: Arc<dyn Generator>,
}

impl HydeExpander {
    pub fn new(generator: Arc<dyn Generator>) -> Self { Self { generator } }

    pub async fn expand(&self, query: &str) -> anyhow::Result<String> {
        let reply = self.generator.complete(&HYDE_PROMPT.replace("{question}", query)).await?;
        Ok(format!("{query}\n{}", reply.trim()))
    }
}
