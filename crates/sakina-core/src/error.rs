//! Error types for the therapy core.
//!
//! Everything here is a *reported* condition: the dispatch boundary turns these
//! into natural-language strings, so none of them ever reaches the remote model
//! as a raw error.

use crate::orchestrator::PersonaId;

/// Failure inside a single tool handler call.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid {tool} action '{given}'. Use: {}", .valid.join(", "))]
    InvalidAction {
        tool: &'static str,
        given: String,
        valid: Vec<&'static str>,
    },
    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{tool} received a request meant for {received}")]
    MismatchedRequest {
        tool: &'static str,
        received: &'static str,
    },
    #[error("tool construction failed: {0}")]
    Construction(String),
}

/// Persona registration and switching failures.
#[derive(Debug, thiserror::Error)]
pub enum PersonaError {
    #[error("Therapeutic persona '{requested}' not available. Available: {}", join_ids(.available))]
    UnknownPersona {
        requested: String,
        available: Vec<PersonaId>,
    },
    #[error("persona '{0}' is already registered")]
    AlreadyRegistered(PersonaId),
    #[error("persona '{persona}' binds tool '{tool}' which has no active handler")]
    UnboundTool { persona: PersonaId, tool: String },
}

/// Tool-call routing failures. Rendered to strings by `handle_function_call`.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown therapeutic function: {0}. Available functions: detect_crisis, apply_cbt_technique, analyze_emotion, manage_session")]
    UnknownFunction(String),
    #[error("Tool '{tool}' is not available for the current persona ({persona})")]
    NotAvailable { tool: String, persona: PersonaId },
    #[error("Tool '{0}' is bound to the persona but has no live handler")]
    MissingHandler(String),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Registry bookkeeping failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{0}' is not registered")]
    NotRegistered(String),
    #[error("tool '{name}' failed to construct: {source}")]
    Factory {
        name: String,
        #[source]
        source: ToolError,
    },
}

fn join_ids(ids: &[PersonaId]) -> String {
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}
