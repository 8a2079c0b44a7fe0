//! The answer pipeline: assemble facts from the current index snapshot,
//! hand them to the formatter, and check what comes back.
//!
//! A formatted reply is accepted only when every number in it appears in
//! the facts, the citations, or the question. Otherwise the deterministic
//! rendering is used instead. A reply without a `Sources:` block is
//! re-requested once with a stricter prompt, then completed with the
//! citations.

use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::Arc;
use vaultqa_core::assemble::{
    assemble, ensure_sources, parse_sources, verify_rendering, Assembly, FactSheet,
    NOT_FOUND_REPLY,
};
use vaultqa_core::models::ExtractedRecord;
use vaultqa_core::retrieve::RetrievalParams;

use crate::formatter::{FormatRequest, Formatter, Turn};
use crate::state::IndexHandle;

/// A reply ready to send.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub reply: String,
    /// `identity`, `small-talk`, `not-found`, or `facts`.
    pub outcome: &'static str,
    pub sources: Vec<String>,
    pub records: Vec<ExtractedRecord>,
    /// The formatter's reply was rejected and replaced by the plain rendering.
    pub fallback: bool,
}

impl Answer {
    fn canned(outcome: &'static str, reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            outcome,
            sources: Vec::new(),
            records: Vec::new(),
            fallback: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AnswerOutcome {
    Replied(Answer),
    /// The formatter failed. Carries what had already been extracted.
    FormattingUnavailable {
        error: String,
        records: Vec<ExtractedRecord>,
        sources: Vec<String>,
    },
}

pub struct Answerer {
    index: Arc<IndexHandle>,
    formatter: Arc<dyn Formatter>,
    params: RetrievalParams,
}

impl Answerer {
    pub fn new(index: Arc<IndexHandle>, formatter: Arc<dyn Formatter>, params: RetrievalParams) -> Self {
        Self {
            index,
            formatter,
            params,
        }
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    /// Run the deterministic part of the pipeline against the current
    /// snapshot.
    pub fn assemble(&self, query: &str) -> Assembly {
        let snapshot = self.index.snapshot();
        assemble(query, &snapshot.index, self.index.lexicon(), &self.params)
    }

    pub async fn answer(&self, query: &str, history: &[Turn]) -> Result<AnswerOutcome> {
        let query = query.trim();
        if query.is_empty() {
            bail!("text must not be empty");
        }

        let assembly = self.assemble(query);
        tracing::debug!(outcome = assembly.outcome(), "assembled");

        let sheet = match assembly {
            Assembly::Identity | Assembly::NotFound => {
                let reply = assembly.canned_reply().unwrap_or(NOT_FOUND_REPLY);
                return Ok(AnswerOutcome::Replied(Answer::canned(assembly.outcome(), reply)));
            }
            Assembly::SmallTalk => {
                let request = FormatRequest {
                    query,
                    history,
                    facts: None,
                    insist_on_sources: false,
                };
                return Ok(match self.formatter.format(&request).await {
                    Ok(reply) => AnswerOutcome::Replied(Answer::canned("small-talk", &reply)),
                    Err(e) => self.unavailable(e, None),
                });
            }
            Assembly::Facts(sheet) => sheet,
        };

        let mut request = FormatRequest {
            query,
            history,
            facts: Some(&sheet),
            insist_on_sources: false,
        };
        let mut reply = match self.formatter.format(&request).await {
            Ok(reply) => reply,
            Err(e) => return Ok(self.unavailable(e, Some(&sheet))),
        };

        if reply.trim() == NOT_FOUND_REPLY {
            return Ok(AnswerOutcome::Replied(Answer::canned("not-found", NOT_FOUND_REPLY)));
        }

        if parse_sources(&reply).is_empty() {
            request.insist_on_sources = true;
            match self.formatter.format(&request).await {
                Ok(retry) => reply = retry,
                Err(e) => {
                    tracing::warn!(error = %e, "formatter retry failed; appending sources");
                }
            }
        }

        let mut fallback = false;
        if let Err(unsupported) = verify_rendering(&reply, &sheet) {
            tracing::warn!(
                formatter = self.formatter.name(),
                ?unsupported,
                "formatted reply states numbers absent from the facts; using plain rendering"
            );
            reply = sheet.render_plain();
            fallback = true;
        }

        let (reply, sources) = ensure_sources(&reply, &sheet);
        Ok(AnswerOutcome::Replied(Answer {
            reply,
            outcome: "facts",
            sources,
            records: sheet.records,
            fallback,
        }))
    }

    fn unavailable(&self, error: anyhow::Error, sheet: Option<&FactSheet>) -> AnswerOutcome {
        tracing::error!(formatter = self.formatter.name(), error = %error, "formatting unavailable");
        AnswerOutcome::FormattingUnavailable {
            error: error.to_string(),
            records: sheet.map(|s| s.records.clone()).unwrap_or_default(),
            sources: sheet.map(FactSheet::sources).unwrap_or_default(),
        }
    }
}

/// CLI entry point for `vqa ask`.
pub async fn run_ask(answerer: &Answerer, query: &str) -> Result<()> {
    match answerer.answer(query, &[]).await? {
        AnswerOutcome::Replied(answer) => {
            println!("{}", answer.reply);
            Ok(())
        }
        AnswerOutcome::FormattingUnavailable {
            error,
            records,
            sources,
        } => {
            for record in &records {
                println!("- {}", record.summary());
            }
            if !sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &sources {
                    println!("- {}", source);
                }
            }
            bail!("formatting unavailable: {}", error)
        }
    }
}
