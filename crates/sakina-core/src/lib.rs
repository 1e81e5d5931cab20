//! sakina-core: culturally adapted therapy session orchestration.
//!
//! Keyword matchers, the four therapeutic tool handlers, the per-session tool
//! registry and the persona orchestrator that routes model function calls.

pub mod config;
pub mod context;
pub mod documentation;
pub mod error;
pub mod matchers;
pub mod notify;
pub mod orchestrator;
pub mod prompts;
pub mod registry;
pub mod tools;

pub use config::{CoreConfig, RiskConfig};
pub use context::{ClinicalState, CulturalContext};
pub use documentation::{ExportFormat, SessionDocumentation};
pub use error::{DispatchError, PersonaError, RegistryError, ToolError};
pub use matchers::{classify, classify_with, Category, Classification};
pub use notify::{ClientEvent, ClientHub};
pub use orchestrator::{
    recommend, switch_announcement, Persona, PersonaId, PersonaInfo, PersonaOrchestrator, RecreateError,
    Recommendation, SessionRecreator, SwitchRecord, SystemStatus,
};
pub use registry::{CrisisStatus, RegistryStats, ToolDeps, ToolFactory, ToolRegistry};
pub use tools::{FunctionCall, ToolDefinition, ToolHandler, ToolKind, ToolOutcome, ToolRequest};
