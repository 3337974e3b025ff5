//! Per-request settings
//!
//! The front end sends its settings as a base64-encoded JSON blob inside
//! the run configuration. It is decoded on every request and never cached.

use crate::error::AgentError;
use crate::models::JsonMap;
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of the settings blob under `configurable`.
pub const SETTINGS_KEY: &str = "x-settings";

/// Run configuration passed opaquely through every node call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub configurable: JsonMap,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config carrying an already-encoded settings blob.
    pub fn with_settings_blob(blob: impl Into<String>) -> Self {
        let mut configurable = JsonMap::new();
        configurable.insert(SETTINGS_KEY.to_string(), Value::String(blob.into()));
        Self { configurable }
    }

    /// Encode `settings` as the blob the front end would send.
    pub fn with_settings(settings: &Value) -> Self {
        Self::with_settings_blob(STANDARD.encode(settings.to_string()))
    }

    pub fn settings(&self) -> Result<Settings> {
        Settings::from_config(self)
    }
}

/// One entry of the model router's model list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelEntry {
    pub model_name: String,
    pub litellm_params: JsonMap,
}

/// Decoded settings blob; `None` when the request carried no settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    blob: Option<JsonMap>,
}

impl Settings {
    /// Decode the blob under `configurable["x-settings"]`.
    ///
    /// Absent or empty values give empty settings. Anything that fails to
    /// decode is an error: a malformed blob means the caller broke the contract.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        match config.configurable.get(SETTINGS_KEY) {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::String(encoded)) => Self::decode(encoded),
            Some(other) => Err(AgentError::InvalidSettings(format!(
                "{} must be a base64 string, got {}",
                SETTINGS_KEY, other
            ))),
        }
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        if encoded.is_empty() {
            return Ok(Self::default());
        }

        let bytes = STANDARD.decode(encoded.trim())?;
        let text = String::from_utf8(bytes)?;

        let value = serde_json::from_str::<Value>(&text)
            .map_err(|e| AgentError::InvalidSettings(format!("settings are not valid JSON: {}", e)))?;

        match value {
            Value::Object(blob) => Ok(Self { blob: Some(blob) }),
            other => Err(AgentError::InvalidSettings(format!(
                "settings must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_none()
    }

    fn section(&self, key: &str) -> JsonMap {
        self.blob
            .as_ref()
            .and_then(|blob| blob.get(key))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    fn text(&self, key: &str) -> String {
        self.blob
            .as_ref()
            .and_then(|blob| blob.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn intent_recognition_model(&self) -> JsonMap {
        self.section("intentRecognitionModel")
    }

    pub fn analysis_model(&self) -> JsonMap {
        self.section("analysisModel")
    }

    /// Always two entries: intent-recognition model, then analysis model.
    pub fn model_list(&self) -> Vec<ModelEntry> {
        [self.intent_recognition_model(), self.analysis_model()]
            .into_iter()
            .map(|params| ModelEntry {
                model_name: params
                    .get("model")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                litellm_params: params,
            })
            .collect()
    }

    pub fn remote_financial_data_api_url(&self) -> String {
        self.text("remoteFinancialDataApiUrl")
    }

    pub fn remote_financial_data_api_key(&self) -> String {
        self.text("remoteFinancialDataApiKey")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_settings() -> Value {
        json!({
            "intentRecognitionModel": {"model": "openai/gpt-4o-mini", "api_key": "k1"},
            "analysisModel": {"model": "openai/gpt-4o", "api_key": "k2"},
            "remoteFinancialDataApiUrl": "https://data.example.com/",
            "remoteFinancialDataApiKey": "secret"
        })
    }

    #[test]
    fn test_absent_settings_default_to_empty_sections() {
        for config in [RunConfig::new(), RunConfig::with_settings_blob("")] {
            let settings = config.settings().unwrap();
            assert!(settings.is_empty());
            assert!(settings.intent_recognition_model().is_empty());
            assert!(settings.analysis_model().is_empty());
            assert_eq!(settings.remote_financial_data_api_url(), "");
            assert_eq!(settings.remote_financial_data_api_key(), "");

            let list = serde_json::to_value(settings.model_list()).unwrap();
            assert_eq!(
                list,
                json!([
                    {"model_name": "", "litellm_params": {}},
                    {"model_name": "", "litellm_params": {}}
                ])
            );
        }
    }

    #[test]
    fn test_decodes_sections() {
        let settings = RunConfig::with_settings(&sample_settings()).settings().unwrap();

        assert_eq!(
            settings.intent_recognition_model().get("model"),
            Some(&json!("openai/gpt-4o-mini"))
        );
        assert_eq!(settings.remote_financial_data_api_key(), "secret");

        let list = settings.model_list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].model_name, "openai/gpt-4o-mini");
        assert_eq!(list[1].model_name, "openai/gpt-4o");
        assert_eq!(list[1].litellm_params.get("api_key"), Some(&json!("k2")));
    }

    #[test]
    fn test_model_list_keeps_two_entries_when_one_side_missing() {
        let config = RunConfig::with_settings(&json!({"analysisModel": {"model": "m"}}));
        let list = config.settings().unwrap().model_list();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].model_name, "");
        assert_eq!(list[1].model_name, "m");
    }

    #[test]
    fn test_malformed_blob_is_an_error() {
        let bad_base64 = RunConfig::with_settings_blob("not base64!!");
        assert!(matches!(bad_base64.settings(), Err(AgentError::Base64Error(_))));

        let bad_json = RunConfig::with_settings_blob(STANDARD.encode("{oops"));
        assert!(matches!(bad_json.settings(), Err(AgentError::InvalidSettings(_))));

        let not_object = RunConfig::with_settings_blob(STANDARD.encode("[1,2]"));
        assert!(matches!(not_object.settings(), Err(AgentError::InvalidSettings(_))));

        let mut configurable = JsonMap::new();
        configurable.insert(SETTINGS_KEY.to_string(), json!(42));
        let wrong_type = RunConfig { configurable };
        assert!(matches!(wrong_type.settings(), Err(AgentError::InvalidSettings(_))));
    }
}
