//! Financial Copilot Agents
//!
//! Conversational back end for a financial assistant:
//! - Resolves the tickers a user is talking about against a remote dataset
//! - Runs persona-driven analysis (scored metrics, then a model verdict)
//! - Answers factual questions through dataset tools
//! - Suggests follow-up questions
//!
//! Replies carry structured fragments (`TickerSelect`, `AnalysisData`)
//! embedded in markdown for the front end to render.
//!
//! TURN:
//! STATE → PLAN → NODE(S) → STATE UPDATE → CLEAR ACTION

pub mod agents;
pub mod api;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod llm;
pub mod markdown;
pub mod models;
pub mod nodes;
pub mod settings;
pub mod tools;

pub use error::{AgentError, Result};
