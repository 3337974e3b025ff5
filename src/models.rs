//! Core data models: conversation state, actions and ticker records

use crate::error::AgentError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

pub type JsonMap = Map<String, Value>;

pub const DEFAULT_LOCALE: &str = "en-US";

//
// ================= Messages =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message body: plain text, or a list of content parts sent by the front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
}

impl MessageContent {
    /// Text of the message. For part lists this is the last part's
    /// `content` (or `text`) field.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => match parts.last() {
                Some(Value::Object(part)) => part
                    .get("content")
                    .or_else(|| part.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                Some(Value::String(text)) => text.clone(),
                _ => String::new(),
            },
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(default = "new_message_id")]
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
    /// Tool name for `tool` messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(name: &str, tool_call_id: &str, content: impl Into<MessageContent>) -> Self {
        Self {
            name: Some(name.to_string()),
            tool_call_id: Some(tool_call_id.to_string()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn text(&self) -> String {
        self.content.text()
    }
}

//
// ================= Tickers =================
//

/// Accepts strings, numbers or null; the model sometimes emits numeric symbols.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// A ticker as named by the user or extracted by the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TickerQuery {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub en_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl TickerQuery {
    pub fn from_symbol(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            ..Self::default()
        }
    }

    /// Lookup text: symbol, else English name, else short name.
    pub fn query(&self) -> &str {
        [&self.symbol, &self.en_name, &self.short_name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }

    pub fn symbol(&self) -> &str {
        self.symbol.as_deref().unwrap_or("")
    }

    pub fn short_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or("")
    }
}

/// A resolved instrument returned by the dataset lookup.
/// Unknown fields are kept so the payload reaches the UI unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TickerDescriptor {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub industry_link: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub industry_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub quote_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regular_market_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regular_market_percent_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regular_market_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

//
// ================= Action =================
//

/// Type tag of a pending action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Front end already switched the ticker; only echo the selection.
    TickerSwitch,
    TickerAnalysis,
    TickerSearch,
    Other(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::TickerSwitch => "ticker_switch",
            ActionKind::TickerAnalysis => "ticker_analysis",
            ActionKind::TickerSearch => "ticker_search",
            ActionKind::Other(tag) => tag,
        }
    }
}

impl From<&str> for ActionKind {
    fn from(tag: &str) -> Self {
        match tag {
            "ticker_switch" => ActionKind::TickerSwitch,
            "ticker_analysis" => ActionKind::TickerAnalysis,
            "ticker_search" => ActionKind::TickerSearch,
            other => ActionKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawTag {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawTag::deserialize(deserializer)? {
            RawTag::Text(tag) => ActionKind::from(tag.as_str()),
            RawTag::Number(n) => ActionKind::Other(n.to_string()),
        })
    }
}

/// One-shot instruction from the front end (or the planner), cleared once consumed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub parameters: JsonMap,
}

impl StateAction {
    pub fn new(kind: ActionKind, parameters: JsonMap) -> Self {
        Self { kind, parameters }
    }

    /// Ticker queries under `parameters.tickers`; missing or null means none.
    pub fn tickers(&self) -> crate::Result<Vec<TickerQuery>> {
        match self.parameters.get("tickers") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                AgentError::InvalidState(format!("action.parameters.tickers is malformed: {}", e))
            }),
        }
    }

    /// Externally supplied suggestions, if the action carries them.
    pub fn suggestions(&self) -> Option<Vec<String>> {
        let list = self.parameters.get("suggestions")?.as_array()?;
        Some(
            list.iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        )
    }

    pub fn agents(&self) -> Vec<String> {
        self.parameters
            .get("agents")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn end_date(&self) -> Option<String> {
        self.parameters
            .get("end_date")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

//
// ================= Context =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisTask {
    pub agent: String,
    pub ticker: TickerQuery,
}

/// Per-session scratch space used by the analysis loop; reset when a turn ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_data: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<JsonMap>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<AnalysisTask>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<AnalysisTask>,
    #[serde(default)]
    pub task_index: usize,
}

//
// ================= Agent State =================
//

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

/// Conversation state passed between nodes.
///
/// Field defaults and clearing rules:
/// - `messages`: empty; only ever appended to.
/// - `locale`: `en-US`.
/// - `action`: `None`; cleared by the node that consumes it.
/// - `suggestions`: `None`; replaced by the suggestions node.
/// - `context`: `None`; reset to empty when a general-agent turn ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub tickers: Option<Vec<TickerDescriptor>>,
    #[serde(default)]
    pub agents: Option<Vec<String>>,
    #[serde(default)]
    pub action: Option<StateAction>,
    #[serde(default)]
    pub suggestions: Option<Vec<String>>,
    #[serde(default)]
    pub context: Option<StateContext>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            locale: default_locale(),
            tickers: None,
            agents: None,
            action: None,
            suggestions: None,
            context: None,
        }
    }
}

impl AgentState {
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: StateAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn latest_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Merge a node's partial output into this state.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        update.action.apply_to(&mut self.action);
        update.suggestions.apply_to(&mut self.suggestions);
        update.context.apply_to(&mut self.context);
        update.tickers.apply_to(&mut self.tickers);
    }
}

//
// ================= State Update =================
//

/// How a node changes one optional state field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate<T> {
    Keep,
    Set(T),
    Clear,
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T> FieldUpdate<T> {
    pub fn apply_to(self, field: &mut Option<T>) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Set(value) => *field = Some(value),
            FieldUpdate::Clear => *field = None,
        }
    }
}

/// Partial state returned by a node; messages are appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub action: FieldUpdate<StateAction>,
    pub suggestions: FieldUpdate<Vec<String>>,
    pub context: FieldUpdate<StateContext>,
    pub tickers: FieldUpdate<Vec<TickerDescriptor>>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn set_action(mut self, action: StateAction) -> Self {
        self.action = FieldUpdate::Set(action);
        self
    }

    pub fn clear_action(mut self) -> Self {
        self.action = FieldUpdate::Clear;
        self
    }

    pub fn set_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = FieldUpdate::Set(suggestions);
        self
    }

    pub fn set_context(mut self, context: StateContext) -> Self {
        self.context = FieldUpdate::Set(context);
        self
    }
}
