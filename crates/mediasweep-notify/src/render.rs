//! Optional stylized opening sentence for run summaries.
//!
//! A text generator drafts one sentence from the run outcome. The draft is
//! normalized and validated; a rejected draft is retried once with the
//! rejection reason fed back, then the caller falls back to the fixed
//! prefix. Rendered text is never required for a notification to go out.

use crate::format::summary_label;
use crate::summary::RunSummary;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

pub const MAX_PREFIX_CHARS: usize = 180;

static MULTI_SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?].+[A-Z]").expect("valid regex"));
static BANNED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(today|yesterday|uptime|since|elapsed)\b").expect("valid regex")
});

const FILLER_OPENINGS: &[&str] = &["ok", "understood", "please provide"];
const DELETION_WORDS: &[&str] = &["deleted", "removed", "purged", "redacted", "cleared"];

// ── Config ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorMode {
    #[default]
    Ollama,
    Openai,
}

/// `add_personality` configuration block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityConfig {
    pub enabled: bool,
    pub characters_api_url: String,
    pub characters_api_key: Option<String>,
    pub characters_api_key_header: String,
    pub character_id: String,
    pub cathy_api_url: String,
    pub cathy_api_key: Option<String>,
    pub cathy_api_mode: GeneratorMode,
    pub cathy_api_model: String,
    pub timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub min_seconds_between_calls: u64,
    pub fallback_system_prompt: String,
}

impl Default for PersonalityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            characters_api_url: String::new(),
            characters_api_key: None,
            characters_api_key_header: "X-API-Key".to_string(),
            character_id: String::new(),
            cathy_api_url: String::new(),
            cathy_api_key: None,
            cathy_api_mode: GeneratorMode::Ollama,
            cathy_api_model: "gemma2:2b".to_string(),
            timeout_seconds: 6,
            max_tokens: 180,
            temperature: 0.2,
            top_p: 0.9,
            min_seconds_between_calls: 30,
            fallback_system_prompt: "You are a terse storage maintenance assistant.".to_string(),
        }
    }
}

// ── Generators ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Backend that turns a conversation into one reply.
pub trait TextGenerator {
    /// Persona instructions. Implementations fall back to a fixed prompt
    /// rather than failing.
    fn system_prompt(&mut self) -> String;

    fn complete(&mut self, messages: &[ChatMessage]) -> anyhow::Result<String>;
}

/// HTTP generator backed by a characters API (persona prompt) and an
/// Ollama or OpenAI-compatible chat endpoint.
pub struct HttpGenerator {
    config: PersonalityConfig,
    agent: ureq::Agent,
    cached_prompt: Option<String>,
    cached_etag: Option<String>,
}

impl HttpGenerator {
    pub fn new(config: PersonalityConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            config,
            agent,
            cached_prompt: None,
            cached_etag: None,
        }
    }

    fn fetch_system_prompt(&mut self) -> anyhow::Result<Option<String>> {
        let url = format!(
            "{}/characters/{}?view=private",
            self.config.characters_api_url.trim_end_matches('/'),
            self.config.character_id
        );
        let mut request = self.agent.get(&url);
        if let Some(key) = &self.config.characters_api_key {
            request = request.header(self.config.characters_api_key_header.as_str(), key.as_str());
        }
        if let Some(etag) = &self.cached_etag {
            request = request.header("If-None-Match", etag.as_str());
        }

        let mut response = request.call()?;
        let status = response.status().as_u16();
        if status == 304 {
            if let Some(cached) = &self.cached_prompt {
                return Ok(Some(cached.clone()));
            }
        }
        if !(200..300).contains(&status) {
            anyhow::bail!("characters api returned HTTP {status}");
        }

        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.body_mut().read_to_string()?;
        let data: Value = serde_json::from_str(&body)?;
        let prompt = ["system_prompt", "prompt", "background"]
            .iter()
            .find_map(|key| {
                data.get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            })
            .map(str::to_string);

        if let Some(prompt) = &prompt {
            self.cached_prompt = Some(prompt.clone());
            self.cached_etag = etag;
        }
        Ok(prompt)
    }

    fn post_json(&self, url: &str, body: &Value) -> anyhow::Result<Value> {
        let mut request = self.agent.post(url).header("Content-Type", "application/json");
        if let Some(key) = &self.config.cathy_api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let mut response = request.send(body.to_string())?;
        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string()?;
        if !(200..300).contains(&status) {
            let snippet: String = text.chars().take(200).collect();
            anyhow::bail!("generator returned HTTP {status}: {snippet}");
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl TextGenerator for HttpGenerator {
    fn system_prompt(&mut self) -> String {
        match self.fetch_system_prompt() {
            Ok(Some(prompt)) => prompt,
            Ok(None) => self.config.fallback_system_prompt.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "system prompt fetch failed, using fallback");
                self.config.fallback_system_prompt.trim().to_string()
            }
        }
    }

    fn complete(&mut self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let base = self.config.cathy_api_url.trim_end_matches('/');
        let started = Instant::now();
        let text = match self.config.cathy_api_mode {
            GeneratorMode::Ollama => {
                let body = json!({
                    "model": self.config.cathy_api_model,
                    "stream": false,
                    "messages": messages,
                    "options": {
                        "temperature": self.config.temperature,
                        "num_predict": 32,
                        "num_ctx": 384,
                        "stop": ["\n"],
                    },
                });
                let data = self.post_json(&format!("{base}/api/chat"), &body)?;
                data["message"]["content"].as_str().unwrap_or("").to_string()
            }
            GeneratorMode::Openai => {
                let body = json!({
                    "model": self.config.cathy_api_model,
                    "messages": messages,
                    "temperature": self.config.temperature,
                    "top_p": self.config.top_p,
                    "max_tokens": self.config.max_tokens,
                    "stream": false,
                });
                let data = self.post_json(&format!("{base}/v1/chat/completions"), &body)?;
                data["choices"][0]["message"]["content"]
                    .as_str()
                    .unwrap_or("")
                    .to_string()
            }
        };
        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "generator replied");
        Ok(text)
    }
}

// ── Normalization & validation ──

/// Trim, strip one pair of wrapping quotes, keep the first line.
pub fn normalize(raw: &str) -> String {
    let mut s = raw.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            s = s[1..s.len() - 1].trim();
            break;
        }
    }
    s.lines().next().unwrap_or("").trim().to_string()
}

/// Check a drafted prefix. `Err` carries the rejection reason.
pub fn validate_prefix(text: &str, deleted_count: u64) -> Result<(), String> {
    let t = text.trim();
    let lower = t.to_lowercase();

    if t.is_empty() {
        return Err("empty".into());
    }
    if t.contains('\n') {
        return Err("newline".into());
    }
    if t.chars().count() > MAX_PREFIX_CHARS {
        return Err("too long".into());
    }
    if MULTI_SENTENCE.is_match(t) {
        return Err("likely multiple sentences".into());
    }
    if FILLER_OPENINGS.iter().any(|f| lower.starts_with(f)) {
        return Err("acknowledgement/assistant filler".into());
    }
    if let Some(m) = BANNED_WORD.captures(&lower).and_then(|c| c.get(1)) {
        return Err(format!("banned phrase '{}'", m.as_str()));
    }
    if t.chars().any(|c| c.is_ascii_digit()) {
        return Err("contains digits".into());
    }
    if deleted_count == 0 && DELETION_WORDS.iter().any(|w| lower.contains(w)) {
        return Err("claims deletion".into());
    }
    Ok(())
}

fn user_prompt(summary: &RunSummary) -> String {
    let label = summary_label(summary);
    let (tense, meaning) = if summary.deleted_count() == 0 {
        ("is", "You reviewed the logs and concluded no action was needed; nothing was touched.")
    } else {
        ("was", "You reviewed the logs and cleanup was performed.")
    };
    format!(
        "You reviewed the server logs. Storage {tense} {label}.\n\
         Write ONE short sentence (max 110 chars).\n\
         Meaning: {meaning}\n\
         No digits, no percentages, no GB, no timestamps, no quotes, no emojis.\n\
         Do not add a second sentence.\n"
    )
}

fn retry_prompt(reason: &str) -> String {
    format!(
        "Your previous sentence broke a rule: {reason}\n\
         Rewrite it.\n\
         - ONE sentence only.\n\
         - No digits, numbers, percentages, sizes, IDs or timestamps.\n\
         - Do not claim anything was deleted.\n\
         - Do not use: today, yesterday, since, uptime, elapsed.\n\
         - Plain text only.\n"
    )
}

// ── Renderer ──

/// Produces an optional opening sentence for a summary.
pub trait Renderer {
    /// `None` means use the deterministic fallback.
    fn render_prefix(&mut self, summary: &RunSummary) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Draft { attempt: u8, feedback: Option<String> },
    Validate { attempt: u8, text: String },
    Retry(String),
    Accept(String),
    Fallback,
}

/// Bounded draft/validate loop over a [`TextGenerator`], at most one retry.
/// Rate-limit and prompt-cache state live on this instance.
pub struct PrefixRenderer<G> {
    generator: G,
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl<G: TextGenerator> PrefixRenderer<G> {
    pub fn new(generator: G, min_seconds_between_calls: u64) -> Self {
        Self {
            generator,
            min_interval: Duration::from_secs(min_seconds_between_calls),
            last_call: None,
        }
    }

    fn rate_limited(&mut self) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_call {
            if now.duration_since(last) < self.min_interval {
                return true;
            }
        }
        self.last_call = Some(now);
        false
    }
}

impl PrefixRenderer<HttpGenerator> {
    pub fn from_config(config: &PersonalityConfig) -> Self {
        Self::new(
            HttpGenerator::new(config.clone()),
            config.min_seconds_between_calls,
        )
    }
}

impl<G: TextGenerator> Renderer for PrefixRenderer<G> {
    fn render_prefix(&mut self, summary: &RunSummary) -> Option<String> {
        if self.rate_limited() {
            tracing::debug!("renderer rate limited, using fallback");
            return None;
        }

        let base = vec![
            ChatMessage::system(self.generator.system_prompt()),
            ChatMessage::user(user_prompt(summary)),
        ];
        let mut step = Step::Draft {
            attempt: 0,
            feedback: None,
        };

        loop {
            step = match step {
                Step::Draft { attempt, feedback } => {
                    let mut messages = base.clone();
                    if let Some(reason) = feedback {
                        messages.push(ChatMessage::user(retry_prompt(&reason)));
                    }
                    match self.generator.complete(&messages) {
                        Ok(raw) => Step::Validate {
                            attempt,
                            text: normalize(&raw),
                        },
                        Err(e) => {
                            tracing::info!(attempt, error = %e, "generator call failed");
                            if attempt == 0 {
                                Step::Retry("generator error".into())
                            } else {
                                Step::Fallback
                            }
                        }
                    }
                }
                Step::Validate { attempt, text } => {
                    match validate_prefix(&text, summary.deleted_count()) {
                        Ok(()) => Step::Accept(text),
                        Err(reason) => {
                            tracing::info!(attempt, %reason, prefix = %text, "rendered prefix rejected");
                            if attempt == 0 {
                                Step::Retry(reason)
                            } else {
                                Step::Fallback
                            }
                        }
                    }
                }
                Step::Retry(reason) => Step::Draft {
                    attempt: 1,
                    feedback: Some(reason),
                },
                Step::Accept(text) => {
                    tracing::debug!(prefix = %text, "rendered prefix accepted");
                    return Some(text);
                }
                Step::Fallback => return None,
            };
        }
    }
}
