//! Conversation controller and session state machine
//!
//! One controller per session, `Idle -> AwaitingResponse -> Idle` per
//! message. The state machine structurally serializes submissions: a new
//! one is only accepted from `Idle`. The local path calls the rule engine
//! on the current effective snapshot; the delegated path composes an
//! instruction and calls the model provider under a timeout. Every failure
//! on the delegated path is caught here and becomes a visible assistant
//! message carrying the `⚠️` marker, so a provider error never corrupts
//! session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::llm::{HistoryEntry, MessageRole, ModelError, ModelProvider, ModelRequest};
use crate::locale::Locale;
use crate::memory::{Memory, MemoryStore};
use crate::policy::{self, Audience, ComposeInput, ComposeParams};
use crate::rules;
use crate::signals::{SignalFlags, SignalSnapshot};

/// Marker prepended to user-visible error messages in the thread.
const ERROR_MARKER: &str = "⚠️";

/// One conversation message. Append-only; never mutated after creation,
/// except for the seeded greeting which may be rewritten on a locale
/// switch before any exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Unique message id
    pub id: Uuid,
    /// Who authored it
    pub role: MessageRole,
    /// Message text
    pub text: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// How responses are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Deterministic rule engine, no external call
    #[default]
    Local,
    /// Composed instruction sent to the external model
    Delegated,
}

impl std::str::FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(ResponseMode::Local),
            "delegated" => Ok(ResponseMode::Delegated),
            other => Err(format!("unknown mode '{other}' (expected local or delegated)")),
        }
    }
}

impl std::fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseMode::Local => write!(f, "local"),
            ResponseMode::Delegated => write!(f, "delegated"),
        }
    }
}

/// Controller state. Submissions are only accepted from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// Ready for a submission
    #[default]
    Idle,
    /// A response computation is in flight
    AwaitingResponse,
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input or controller busy; nothing was appended
    Ignored,
    /// A response (possibly an error marker) was appended
    Replied(Message),
}

/// Session tunables, typically carried from config.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Conversation locale
    pub locale: Locale,
    /// Audience framing for composed instructions
    pub audience: Audience,
    /// Initial response mode
    pub mode: ResponseMode,
    /// Randomness budget, clamped to [0,1]
    pub temperature: f64,
    /// Whether the model may proactively suggest actions
    pub allow_initiative: bool,
    /// History window sent to the model (last N messages)
    pub history_window: usize,
    /// Hard cap on each serialized context substring
    pub context_max_chars: usize,
    /// Heart-rate threshold for the pain-triage knowledge module
    pub pain_cue_heart_rate: f64,
    /// Upper bound on one external model call
    pub request_timeout: Duration,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            audience: Audience::default(),
            mode: ResponseMode::default(),
            temperature: 0.4,
            allow_initiative: true,
            history_window: 14,
            context_max_chars: policy::DEFAULT_CONTEXT_MAX_CHARS,
            pain_cue_heart_rate: policy::DEFAULT_PAIN_CUE_HEART_RATE,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-session orchestrator: owns the message list, mode, memory and
/// manual flag toggles; reads signal snapshots through a watch receiver.
pub struct ChatController {
    state: ControllerState,
    locale: Locale,
    audience: Audience,
    mode: ResponseMode,
    temperature: f64,
    allow_initiative: bool,
    manual_flags: SignalFlags,
    messages: Vec<Message>,
    memory: Memory,
    history_window: usize,
    compose_params: ComposeParams,
    request_timeout: Duration,
    provider: Arc<dyn ModelProvider>,
    store: Arc<dyn MemoryStore>,
    signals_rx: watch::Receiver<SignalSnapshot>,
}

impl ChatController {
    /// Create a controller: loads memory from the store and seeds the
    /// greeting in the active locale.
    pub fn new(
        params: SessionParams,
        provider: Arc<dyn ModelProvider>,
        store: Arc<dyn MemoryStore>,
        signals_rx: watch::Receiver<SignalSnapshot>,
    ) -> Self {
        let memory = store.load();
        let greeting = Message::new(MessageRole::Assistant, params.locale.greeting());

        Self {
            state: ControllerState::Idle,
            locale: params.locale,
            audience: params.audience,
            mode: params.mode,
            temperature: params.temperature.clamp(0.0, 1.0),
            allow_initiative: params.allow_initiative,
            manual_flags: SignalFlags::default(),
            messages: vec![greeting],
            memory,
            history_window: params.history_window.max(2),
            compose_params: ComposeParams {
                context_max_chars: params.context_max_chars,
                pain_cue_heart_rate: params.pain_cue_heart_rate,
            },
            request_timeout: params.request_timeout,
            provider,
            store,
            signals_rx,
        }
    }

    /// Submit one user message and produce the response.
    ///
    /// Empty or whitespace-only input is silently ignored, as is a
    /// submission while a prior one is still resolving. On every other
    /// path the session returns to `Idle` with exactly one new message
    /// pair appended.
    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return SubmitOutcome::Ignored;
        }
        if self.state != ControllerState::Idle {
            debug!("submission rejected: response computation in flight");
            return SubmitOutcome::Ignored;
        }

        self.messages.push(Message::new(MessageRole::User, trimmed));
        self.state = ControllerState::AwaitingResponse;

        let reply_text = match self.mode {
            ResponseMode::Local => rules::respond(&self.effective_snapshot(), self.locale),
            ResponseMode::Delegated => match self.delegated_reply().await {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "delegated response failed");
                    format!("{ERROR_MARKER} {err}")
                }
            },
        };

        let reply = Message::new(MessageRole::Assistant, reply_text);
        self.messages.push(reply.clone());
        self.state = ControllerState::Idle;
        SubmitOutcome::Replied(reply)
    }

    async fn delegated_reply(&self) -> Result<String, ModelError> {
        let snapshot = self.effective_snapshot();
        let instruction = policy::compose(
            &ComposeInput {
                locale: self.locale,
                audience: self.audience,
                signals: &snapshot,
                memory: &self.memory,
                allow_initiative: self.allow_initiative,
            },
            &self.compose_params,
        );

        let start = self.messages.len().saturating_sub(self.history_window);
        let history: Vec<HistoryEntry> = self.messages[start..]
            .iter()
            .map(|m| HistoryEntry::new(m.role, m.text.clone()))
            .collect();

        let request = ModelRequest {
            instruction,
            history,
            temperature: self.temperature.clamp(0.0, 1.0),
        };

        let reply = tokio::time::timeout(self.request_timeout, self.provider.complete(&request))
            .await
            .map_err(|_| ModelError::Timeout)??;

        // Advisory prompts may answer with a structured verdict; render it
        // as readable lines, otherwise pass the text through untouched.
        Ok(match parse_structured_reply(&reply.text) {
            Some(verdict) => verdict.to_string(),
            None => reply.text,
        })
    }

    /// The shared feed snapshot with this session's manual toggles merged in.
    pub fn effective_snapshot(&self) -> SignalSnapshot {
        let mut snapshot = self.signals_rx.borrow().clone();
        snapshot.flags = snapshot.flags.merge(self.manual_flags);
        snapshot
    }

    /// Switch the conversation locale.
    ///
    /// Before any exchange the sole seeded greeting is rewritten in place;
    /// after one, existing messages are untouched and only future
    /// responses change.
    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = locale;
        if self.messages.len() == 1 && self.messages[0].role == MessageRole::Assistant {
            self.messages[0].text = locale.greeting().to_string();
        }
    }

    /// Switch between the local and delegated response paths.
    pub fn set_mode(&mut self, mode: ResponseMode) {
        self.mode = mode;
    }

    /// Set the randomness budget, clamped to [0,1].
    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature.clamp(0.0, 1.0);
    }

    /// Set the audience framing for future composed instructions.
    pub fn set_audience(&mut self, audience: Audience) {
        self.audience = audience;
    }

    /// Allow or forbid unsolicited suggestions in future instructions.
    pub fn set_allow_initiative(&mut self, allow: bool) {
        self.allow_initiative = allow;
    }

    /// Toggle one manual session flag by short name (`overload`, `noise`,
    /// `hunger`, `rest`). Returns false for unknown names.
    pub fn set_manual_flag(&mut self, name: &str, on: bool) -> bool {
        self.manual_flags.set_by_name(name, on)
    }

    /// Apply a memory edit: takes effect on the session immediately and is
    /// persisted synchronously before returning. Affects the next composer
    /// invocation, never past instructions.
    pub fn update_memory(&mut self, memory: Memory) -> Result<(), EngineError> {
        self.memory = memory;
        self.store.store(&self.memory)
    }

    /// Message history, insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current session memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Current controller state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Current response mode.
    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    /// Current locale.
    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Current randomness budget.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    #[cfg(test)]
    fn force_state(&mut self, state: ControllerState) {
        self.state = state;
    }
}

/// Structured verdict some advisory prompts ask the model to return.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdvisoryVerdict {
    /// The selected option
    pub choice: String,
    /// Short explanation of why
    pub rationale: String,
    /// Optional supporting design principles
    #[serde(default)]
    pub design_principles: Vec<String>,
    /// Optional accessibility notes
    #[serde(default)]
    pub accessibility: Option<String>,
    /// Optional bias/noise warnings
    #[serde(default)]
    pub risk_notes: Option<String>,
}

impl std::fmt::Display for AdvisoryVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Choice: {}\nWhy: {}", self.choice, self.rationale)?;
        if !self.design_principles.is_empty() {
            write!(f, "\nPrinciples: {}", self.design_principles.join(", "))?;
        }
        if let Some(accessibility) = &self.accessibility {
            write!(f, "\nAccessibility: {accessibility}")?;
        }
        if let Some(risk_notes) = &self.risk_notes {
            write!(f, "\nRisk notes: {risk_notes}")?;
        }
        Ok(())
    }
}

/// Try to read a model reply as a structured verdict.
///
/// The reply is an untrusted external payload: this accepts either bare
/// JSON or a fenced ```json block, and returns `None` on any structural
/// mismatch so the delegated path falls back to the raw text. Parse
/// failure is never an error.
pub fn parse_structured_reply(text: &str) -> Option<AdvisoryVerdict> {
    let trimmed = text.trim();

    if let Ok(verdict) = serde_json::from_str(trimmed) {
        return Some(verdict);
    }

    let fence_start = trimmed.find("```")?;
    let after_opening = &trimmed[fence_start + 3..];
    let body_start = after_opening.find('\n')? + 1;
    let body = &after_opening[body_start..];
    let body_end = body.find("```")?;
    serde_json::from_str(body[..body_end].trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelReply;
    use crate::memory::InMemoryStore;
    use async_trait::async_trait;

    struct StubProvider {
        reply: Result<String, ModelError>,
    }

    impl StubProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
            })
        }

        fn failing(err: ModelError) -> Arc<Self> {
            Arc::new(Self { reply: Err(err) })
        }
    }

    #[async_trait]
    impl ModelProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _request: &ModelRequest) -> crate::llm::Result<ModelReply> {
            match &self.reply {
                Ok(text) => Ok(ModelReply { text: text.clone() }),
                Err(ModelError::MissingCredential) => Err(ModelError::MissingCredential),
                Err(ModelError::Timeout) => Err(ModelError::Timeout),
                Err(ModelError::EmptyReply) => Err(ModelError::EmptyReply),
                Err(ModelError::Http { status, message }) => Err(ModelError::Http {
                    status: *status,
                    message: message.clone(),
                }),
                Err(ModelError::Network(m)) => Err(ModelError::Network(m.clone())),
                Err(ModelError::Parse(m)) => Err(ModelError::Parse(m.clone())),
            }
        }
    }

    fn controller_with(provider: Arc<dyn ModelProvider>) -> ChatController {
        let (_tx, rx) = watch::channel(SignalSnapshot::default());
        ChatController::new(
            SessionParams::default(),
            provider,
            Arc::new(InMemoryStore::new()),
            rx,
        )
    }

    fn controller_with_signals(
        provider: Arc<dyn ModelProvider>,
    ) -> (watch::Sender<SignalSnapshot>, ChatController) {
        let (tx, rx) = watch::channel(SignalSnapshot::default());
        let controller = ChatController::new(
            SessionParams::default(),
            provider,
            Arc::new(InMemoryStore::new()),
            rx,
        );
        (tx, controller)
    }

    #[test]
    fn test_session_starts_with_seeded_greeting() {
        let controller = controller_with(StubProvider::replying("ok"));
        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.messages()[0].role, MessageRole::Assistant);
        assert_eq!(controller.messages()[0].text, Locale::Sv.greeting());
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_blank_submission_is_ignored() {
        let mut controller = controller_with(StubProvider::replying("ok"));
        assert_eq!(controller.submit("").await, SubmitOutcome::Ignored);
        assert_eq!(controller.submit("   \t ").await, SubmitOutcome::Ignored);
        assert_eq!(controller.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_submission_rejected_while_awaiting_response() {
        let mut controller = controller_with(StubProvider::replying("ok"));
        controller.force_state(ControllerState::AwaitingResponse);
        assert_eq!(controller.submit("hello").await, SubmitOutcome::Ignored);
        assert_eq!(controller.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_local_mode_empty_telemetry_yields_fixed_fallback() {
        let mut controller = controller_with(StubProvider::replying("unused"));
        match controller.submit("hello").await {
            SubmitOutcome::Replied(msg) => assert_eq!(msg.text, Locale::Sv.fallback()),
            other => panic!("expected reply, got {other:?}"),
        }
        assert_eq!(controller.messages().len(), 3);
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_local_mode_overload_beats_everything() {
        let (tx, mut controller) = controller_with_signals(StubProvider::replying("unused"));
        let mut snapshot = SignalSnapshot::default();
        snapshot.flags.sensory_overload = true;
        snapshot.flags.high_noise = true;
        snapshot.flags.hunger = true;
        tx.send(snapshot).unwrap();

        match controller.submit("anything").await {
            SubmitOutcome::Replied(msg) => assert_eq!(msg.text, Locale::Sv.overload()),
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_manual_flags_merge_into_feed_snapshot() {
        let mut controller = controller_with(StubProvider::replying("unused"));
        assert!(controller.set_manual_flag("hunger", true));
        match controller.submit("hej").await {
            SubmitOutcome::Replied(msg) => assert_eq!(msg.text, Locale::Sv.hunger()),
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delegated_failure_becomes_visible_message_and_recovers() {
        let mut controller = controller_with(StubProvider::failing(ModelError::MissingCredential));
        controller.set_mode(ResponseMode::Delegated);

        match controller.submit("hello").await {
            SubmitOutcome::Replied(msg) => {
                assert!(msg.text.starts_with("⚠️"));
                assert!(msg.text.contains("missing API credential"));
            }
            other => panic!("expected reply, got {other:?}"),
        }
        assert_eq!(controller.state(), ControllerState::Idle);

        // A subsequent local-mode submission still succeeds.
        controller.set_mode(ResponseMode::Local);
        match controller.submit("hello again").await {
            SubmitOutcome::Replied(msg) => assert_eq!(msg.text, Locale::Sv.fallback()),
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn test_locale_switch_rewrites_sole_greeting() {
        let mut controller = controller_with(StubProvider::replying("ok"));
        controller.set_locale(Locale::En);
        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.messages()[0].text, Locale::En.greeting());
    }

    #[tokio::test]
    async fn test_locale_switch_after_exchange_leaves_history_untouched() {
        let mut controller = controller_with(StubProvider::replying("ok"));
        controller.submit("hej").await;
        let before: Vec<String> = controller.messages().iter().map(|m| m.text.clone()).collect();

        controller.set_locale(Locale::Es);
        let after: Vec<String> = controller.messages().iter().map(|m| m.text.clone()).collect();
        assert_eq!(before, after);

        // Future responses use the new locale.
        match controller.submit("hola").await {
            SubmitOutcome::Replied(msg) => assert_eq!(msg.text, Locale::Es.fallback()),
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn test_temperature_is_clamped() {
        let mut controller = controller_with(StubProvider::replying("ok"));
        controller.set_temperature(3.5);
        assert_eq!(controller.temperature(), 1.0);
        controller.set_temperature(-0.2);
        assert_eq!(controller.temperature(), 0.0);
    }

    #[tokio::test]
    async fn test_memory_edit_is_persisted_synchronously() {
        let store = Arc::new(InMemoryStore::new());
        let (_tx, rx) = watch::channel(SignalSnapshot::default());
        let mut controller = ChatController::new(
            SessionParams::default(),
            StubProvider::replying("ok"),
            store.clone(),
            rx,
        );

        let mut memory = Memory::default();
        memory.avoid_words.insert("shouting".to_string());
        controller.update_memory(memory.clone()).unwrap();

        assert_eq!(controller.memory(), &memory);
        assert_eq!(store.load(), memory);
    }

    #[tokio::test]
    async fn test_delegated_verdict_reply_is_rendered_readably() {
        let provider = StubProvider::replying(
            r#"{"choice":"quiet room","rationale":"lower stimulus","risk_notes":"small sample"}"#,
        );
        let mut controller = controller_with(provider);
        controller.set_mode(ResponseMode::Delegated);

        match controller.submit("which room?").await {
            SubmitOutcome::Replied(msg) => {
                assert!(msg.text.starts_with("Choice: quiet room"), "got: {}", msg.text);
                assert!(msg.text.contains("Why: lower stimulus"));
                assert!(msg.text.contains("Risk notes: small sample"));
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delegated_prose_reply_passes_through_untouched() {
        let provider = StubProvider::replying("Option A seems calmer.");
        let mut controller = controller_with(provider);
        controller.set_mode(ResponseMode::Delegated);

        match controller.submit("which option?").await {
            SubmitOutcome::Replied(msg) => assert_eq!(msg.text, "Option A seems calmer."),
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn test_message_serializes_for_json_output() {
        let message = Message::new(MessageRole::Assistant, "hej");
        let json = serde_json::to_string(&message).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["role"], "assistant");
        assert_eq!(parsed["text"], "hej");
        assert!(parsed["id"].is_string());
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn test_parse_structured_reply_bare_json() {
        let verdict = parse_structured_reply(
            r#"{"choice":"A","rationale":"lower stimulus","design_principles":["calm"]}"#,
        )
        .unwrap();
        assert_eq!(verdict.choice, "A");
        assert_eq!(verdict.rationale, "lower stimulus");
        assert_eq!(verdict.design_principles, vec!["calm".to_string()]);
        assert_eq!(verdict.accessibility, None);
    }

    #[test]
    fn test_parse_structured_reply_fenced_json() {
        let text = "Here you go:\n```json\n{\"choice\":\"B\",\"rationale\":\"fewer people\"}\n```\nhope it helps";
        let verdict = parse_structured_reply(text).unwrap();
        assert_eq!(verdict.choice, "B");
    }

    #[test]
    fn test_parse_structured_reply_falls_back_on_prose() {
        assert_eq!(parse_structured_reply("Option A seems calmer."), None);
        assert_eq!(parse_structured_reply(""), None);
        assert_eq!(parse_structured_reply("{\"choice\": 3}"), None);
    }
}
