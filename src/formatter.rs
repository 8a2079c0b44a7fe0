//! Formatter backends.
//!
//! A formatter turns an already assembled [`FactSheet`] into a reply. It is
//! told to restate the facts only; the answer pipeline verifies that it did.
//!
//! | Backend | Behavior |
//! |---------|----------|
//! | `disabled` | deterministic [`FactSheet::render_plain`] |
//! | `command` | runs a local program with the prompt on stdin |
//! | `openai` | OpenAI-compatible chat completions over HTTP |
//!
//! # Retry strategy (`openai`)
//!
//! - HTTP 429 or 5xx → retry with exponential backoff
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error → retry

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use vaultqa_core::assemble::{FactSheet, IDENTITY_REPLY, NOT_FOUND_REPLY};
use vaultqa_core::classify::Route;

use crate::config::FormatterConfig;

/// Reply to small talk when no model is configured.
pub const SMALL_TALK_REPLY: &str = "Hej! Spørg mig om noget fra vaulten.";

/// One earlier message of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
}

/// Everything a formatter may see.
#[derive(Debug, Clone, Copy)]
pub struct FormatRequest<'a> {
    pub query: &'a str,
    pub history: &'a [Turn],
    /// `None` for small talk.
    pub facts: Option<&'a FactSheet>,
    /// Second attempt after a reply came back without sources.
    pub insist_on_sources: bool,
}

#[async_trait]
pub trait Formatter: Send + Sync {
    fn name(&self) -> &str;

    async fn format(&self, request: &FormatRequest<'_>) -> Result<String>;
}

/// Build the formatter selected by `[formatter].backend`.
pub fn create_formatter(config: &FormatterConfig) -> Result<Arc<dyn Formatter>> {
    match config.backend.as_str() {
        "disabled" => Ok(Arc::new(DisabledFormatter)),
        "command" => Ok(Arc::new(CommandFormatter::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiFormatter::new(config)?)),
        other => bail!("Unknown formatter backend: {}", other),
    }
}

pub fn system_prompt(request: &FormatRequest<'_>) -> String {
    let mut prompt = format!(
        "You are Dory. If asked who you are or your name, reply exactly: '{}'. \
         You are an Obsidian-vault-grounded assistant and must not invent corporate facts.",
        IDENTITY_REPLY
    );
    let Some(sheet) = request.facts else {
        return prompt;
    };
    prompt.push_str(&format!(
        " You will receive extracted facts from the vault. \
         Format those facts clearly without adding, inferring, or omitting information. \
         Answer only using the provided facts. \
         If the answer is not in the facts, reply exactly: '{}'. \
         Include a Sources section with citations in this exact format: \
         - <path>#<heading> (lines a-b)",
        NOT_FOUND_REPLY
    ));
    if sheet.route == Route::Price {
        prompt.push_str(
            " When asked for prices or packages, list each package name with its price exactly as provided.",
        );
    }
    if request.insist_on_sources {
        prompt.push_str(" You MUST include a Sources section with citations.");
    }
    prompt
}

/// Numbered fact block, one entry per record.
pub fn render_facts(sheet: &FactSheet) -> String {
    sheet
        .records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}\n{}", i + 1, r.source, r.summary()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Single-text prompt for backends without a chat format.
pub fn render_prompt(request: &FormatRequest<'_>) -> String {
    let mut lines = vec![
        "SYSTEM:".to_string(),
        system_prompt(request),
        String::new(),
        "CONVERSATION:".to_string(),
    ];
    for turn in request.history {
        let label = if turn.role == "user" { "User" } else { "Assistant" };
        lines.push(format!("{}: {}", label, turn.content));
    }
    lines.push(format!("User: {}", request.query));
    if let Some(sheet) = request.facts {
        lines.push(String::new());
        lines.push("VAULT FACTS:".to_string());
        lines.push(render_facts(sheet));
    }
    lines.push(String::new());
    lines.push("ASSISTANT:".to_string());
    lines.join("\n")
}

// ============ disabled ============

/// Renders facts deterministically; never calls out.
pub struct DisabledFormatter;

#[async_trait]
impl Formatter for DisabledFormatter {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn format(&self, request: &FormatRequest<'_>) -> Result<String> {
        Ok(match request.facts {
            Some(sheet) => sheet.render_plain(),
            None => SMALL_TALK_REPLY.to_string(),
        })
    }
}

// ============ command ============

/// Runs `command args…`, writes the prompt to stdin, and returns stdout.
pub struct CommandFormatter {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandFormatter {
    pub fn new(config: &FormatterConfig) -> Result<Self> {
        let command = config
            .command
            .clone()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("formatter.command required"))?;
        Ok(Self {
            command,
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl Formatter for CommandFormatter {
    fn name(&self) -> &str {
        "command"
    }

    async fn format(&self, request: &FormatRequest<'_>) -> Result<String> {
        let prompt = render_prompt(request);

        let mut child = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Formatter command not found: {}", self.command))?;

        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                // A program may exit without reading its input.
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                }
            }
            Ok(())
        };
        // Output is drained while the prompt is still being written.
        let run = async move {
            let (written, output) = tokio::join!(write, child.wait_with_output());
            written?;
            output
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(output) => output.with_context(|| format!("Formatter command failed: {}", self.command))?,
            Err(_) => bail!(
                "Formatter command timed out after {}s",
                self.timeout.as_secs()
            ),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            bail!(
                "Formatter command failed ({}): {}",
                output.status,
                detail.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

// ============ openai ============

/// OpenAI-compatible `chat/completions` client.
pub struct OpenAiFormatter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_retries: u32,
    api_key_env: String,
}

impl OpenAiFormatter {
    pub fn new(config: &FormatterConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("formatter.model required"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model,
            temperature: config.temperature,
            max_retries: config.max_retries,
            api_key_env: config.api_key_env.clone(),
        })
    }

    fn messages(&self, request: &FormatRequest<'_>) -> Vec<serde_json::Value> {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": system_prompt(request),
        })];
        for turn in request.history {
            messages.push(serde_json::json!({ "role": turn.role, "content": turn.content }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.query }));
        if let Some(sheet) = request.facts {
            messages.push(serde_json::json!({
                "role": "system",
                "content": format!("Vault facts:\n{}", render_facts(sheet)),
            }));
        }
        messages
    }
}

#[async_trait]
impl Formatter for OpenAiFormatter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn format(&self, request: &FormatRequest<'_>) -> Result<String> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} not set", self.api_key_env))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": self.messages(request),
            "temperature": self.temperature,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        tracing::warn!(attempt, %status, "formatter request failed; retrying");
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "formatter request failed; retrying");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Formatting failed after retries")))
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))?;
    let content = content.trim();
    if content.is_empty() {
        bail!("Invalid chat response: empty content");
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vaultqa_core::assemble::{assemble, Assembly};
    use vaultqa_core::index::{IndexOptions, NoteDocument, VaultIndex};
    use vaultqa_core::retrieve::RetrievalParams;
    use vaultqa_core::vocab::Lexicon;

    fn sheet() -> FactSheet {
        let lexicon = Lexicon::default();
        let index = VaultIndex::build(
            vec![NoteDocument::new(
                "services/Basis.md",
                "# Basis\n## Priser\nBasic package: 500 kr\n",
            )],
            &IndexOptions::default(),
            &lexicon,
        );
        match assemble("Hvad koster basis?", &index, &lexicon, &RetrievalParams::default()) {
            Assembly::Facts(sheet) => sheet,
            other => panic!("expected facts, got {other:?}"),
        }
    }

    fn request<'a>(sheet: &'a FactSheet, history: &'a [Turn]) -> FormatRequest<'a> {
        FormatRequest {
            query: "Hvad koster basis?",
            history,
            facts: Some(sheet),
            insist_on_sources: false,
        }
    }

    #[test]
    fn test_prompt_carries_facts_and_rules() {
        let sheet = sheet();
        let history = vec![Turn {
            role: "user".to_string(),
            content: "hej".to_string(),
        }];
        let prompt = render_prompt(&request(&sheet, &history));
        assert!(prompt.starts_with("SYSTEM:\n"));
        assert!(prompt.contains(NOT_FOUND_REPLY));
        assert!(prompt.contains("exactly as provided"));
        assert!(prompt.contains("User: hej\nUser: Hvad koster basis?"));
        assert!(prompt.contains("[1] services/Basis.md#Priser (lines 3-3)\nBasic package: 500 kr"));
        assert!(prompt.ends_with("ASSISTANT:"));
    }

    #[test]
    fn test_small_talk_prompt_has_no_fact_rules() {
        let req = FormatRequest {
            query: "hej",
            history: &[],
            facts: None,
            insist_on_sources: false,
        };
        let prompt = system_prompt(&req);
        assert!(prompt.contains(IDENTITY_REPLY));
        assert!(!prompt.contains("Sources"));
    }

    #[tokio::test]
    async fn test_disabled_renders_plain() {
        let sheet = sheet();
        let out = DisabledFormatter.format(&request(&sheet, &[])).await.unwrap();
        assert_eq!(out, sheet.render_plain());
    }

    fn command_config(command: &str, args: &[&str], timeout_secs: u64) -> FormatterConfig {
        FormatterConfig {
            backend: "command".to_string(),
            command: Some(command.to_string()),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_secs,
            ..FormatterConfig::default()
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_receives_prompt_on_stdin() {
        let sheet = sheet();
        let formatter = CommandFormatter::new(&command_config("cat", &[], 10)).unwrap();
        let out = formatter.format(&request(&sheet, &[])).await.unwrap();
        assert_eq!(out, render_prompt(&request(&sheet, &[])).trim());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_large_prompt_streams_through() {
        let sheet = sheet();
        let query = "basis ".repeat(100_000);
        let req = FormatRequest {
            query: &query,
            history: &[],
            facts: Some(&sheet),
            insist_on_sources: false,
        };
        let formatter = CommandFormatter::new(&command_config("cat", &[], 10)).unwrap();
        let out = formatter.format(&req).await.unwrap();
        assert_eq!(out, render_prompt(&req).trim());
        assert!(out.len() > 600_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_failures_are_errors() {
        let sheet = sheet();
        let req = request(&sheet, &[]);

        let missing = CommandFormatter::new(&command_config("no-such-formatter-bin", &[], 5)).unwrap();
        let err = missing.format(&req).await.unwrap_err();
        assert!(err.to_string().contains("not found"));

        let failing = CommandFormatter::new(&command_config("sh", &["-c", "echo boom >&2; exit 3"], 5)).unwrap();
        let err = failing.format(&req).await.unwrap_err();
        assert!(err.to_string().contains("boom"));

        let slow = CommandFormatter::new(&command_config("sleep", &["5"], 1)).unwrap();
        let err = slow.format(&req).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    async fn mock_chat(fail_first: usize) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |Json(body): Json<serde_json::Value>| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < fail_first {
                        return (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({})));
                    }
                    let model = body["model"].as_str().unwrap_or_default().to_string();
                    (
                        StatusCode::OK,
                        Json(serde_json::json!({
                            "choices": [{ "message": { "role": "assistant", "content": format!(" reply from {model} ") } }]
                        })),
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/v1/chat/completions", addr), calls)
    }

    fn openai_config(endpoint: String, max_retries: u32) -> FormatterConfig {
        FormatterConfig {
            backend: "openai".to_string(),
            endpoint,
            model: Some("test-model".to_string()),
            max_retries,
            timeout_secs: 5,
            api_key_env: "VAULTQA_TEST_FORMATTER_KEY".to_string(),
            ..FormatterConfig::default()
        }
    }

    #[tokio::test]
    async fn test_openai_retries_server_errors() {
        std::env::set_var("VAULTQA_TEST_FORMATTER_KEY", "sk-test");
        let (endpoint, calls) = mock_chat(1).await;
        let formatter = OpenAiFormatter::new(&openai_config(endpoint, 2)).unwrap();
        let sheet = sheet();
        let out = formatter.format(&request(&sheet, &[])).await.unwrap();
        assert_eq!(out, "reply from test-model");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_openai_gives_up_after_retries() {
        std::env::set_var("VAULTQA_TEST_FORMATTER_KEY", "sk-test");
        let (endpoint, calls) = mock_chat(usize::MAX).await;
        let formatter = OpenAiFormatter::new(&openai_config(endpoint, 0)).unwrap();
        let sheet = sheet();
        let err = formatter.format(&request(&sheet, &[])).await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_chat_response_requires_content() {
        assert!(parse_chat_response(&serde_json::json!({ "choices": [] })).is_err());
        let ok = serde_json::json!({ "choices": [{ "message": { "content": "hi" } }] });
        assert_eq!(parse_chat_response(&ok).unwrap(), "hi");
    }
}
