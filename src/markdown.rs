//! Markdown output for the chat UI
//!
//! Structured payloads travel to the front end as fenced code blocks whose
//! info string names the payload type:
//!
//! ````text
//! ```TickerSelect
//! {"list": [...], "selected": {...}, "_id_": "..."}
//! ```
//! ````
//!
//! The UI keys re-renders on `_id_`, so an id is assigned once and then kept.

use crate::models::JsonMap;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub const FRAGMENT_ID_KEY: &str = "_id_";

/// Fenced-block tags understood by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    TickerSelect,
    AnalysisData,
}

impl FragmentKind {
    pub fn tag(self) -> &'static str {
        match self {
            FragmentKind::TickerSelect => "TickerSelect",
            FragmentKind::AnalysisData => "AnalysisData",
        }
    }
}

/// A typed UI payload embedded in markdown.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    kind: FragmentKind,
    payload: JsonMap,
}

impl Fragment {
    /// Build a fragment from `data`, assigning `_id_` when it is missing or null.
    pub fn new(kind: FragmentKind, mut data: JsonMap) -> Self {
        let has_id = data
            .get(FRAGMENT_ID_KEY)
            .is_some_and(|id| !id.is_null());
        if !has_id {
            data.insert(
                FRAGMENT_ID_KEY.to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }

        Self { kind, payload: data }
    }

    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    /// Payload including `_id_`.
    pub fn payload(&self) -> &JsonMap {
        &self.payload
    }

    pub fn into_payload(self) -> JsonMap {
        self.payload
    }

    pub fn id(&self) -> &str {
        self.payload
            .get(FRAGMENT_ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = serde_json::to_string(&self.payload).map_err(|_| fmt::Error)?;
        write!(f, "```{}\n{}\n```", self.kind.tag(), body)
    }
}

/// `TickerSelect` fragment; `data` itself is left untouched.
pub fn ticker_select(data: &JsonMap) -> Fragment {
    Fragment::new(FragmentKind::TickerSelect, data.clone())
}

/// `AnalysisData` fragment; `data` itself is left untouched.
pub fn analysis_data(data: &JsonMap) -> Fragment {
    Fragment::new(FragmentKind::AnalysisData, data.clone())
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One `## key` section per entry.
pub fn from_dict(data: &JsonMap) -> String {
    let mut out = String::new();
    for (key, value) in data {
        if key == FRAGMENT_ID_KEY {
            continue;
        }
        out.push_str(&format!("## {}\n\n{}\n\n", key, cell(value)));
    }
    out
}

/// Two-column `Key | Value` table, optionally restricted to `keys`.
pub fn dict_to_table(data: &JsonMap, keys: Option<&[&str]>) -> String {
    let mut out = String::from("| Key | Value |\n| --- | --- |\n");
    for (key, value) in data {
        if key == FRAGMENT_ID_KEY {
            continue;
        }
        if let Some(allowed) = keys {
            if !allowed.contains(&key.as_str()) {
                continue;
            }
        }
        out.push_str(&format!("| {} | {} |\n", key, cell(value)));
    }
    out
}

/// Table with one row per mapping.
///
/// Without explicit `keys` the header comes from the first row, so rows with
/// other keys only show the columns the first row happens to have. An empty
/// list without keys renders nothing.
pub fn list_dict_to_table(rows: &[JsonMap], keys: Option<&[&str]>) -> String {
    let header: Vec<String> = match keys {
        Some(keys) => keys.iter().map(|k| k.to_string()).collect(),
        None => match rows.first() {
            Some(first) => first.keys().cloned().collect(),
            None => return String::new(),
        },
    };

    let mut out = format!("| {} |\n", header.join(" | "));
    out.push_str(&format!(
        "| {} |\n",
        vec!["---"; header.len()].join(" | ")
    ));

    for row in rows {
        let cells: Vec<String> = header
            .iter()
            .map(|key| row.get(key).map(cell).unwrap_or_default())
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

/// Numbered markdown list.
pub fn list_str_to_sequence(items: &[String]) -> String {
    items.iter().map(|item| format!("1. {}\n", item)).collect()
}

pub fn to_h1(text: &str) -> String {
    format!("# {}\n\n", text)
}

pub fn to_h2(text: &str) -> String {
    format!("## {}\n\n", text)
}

pub fn to_h3(text: &str) -> String {
    format!("### {}\n\n", text)
}
