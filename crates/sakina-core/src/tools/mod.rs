//! Therapeutic tool handlers invoked through LLM function calls.
//!
//! Each handler owns its private clinical state plus a [`ClinicalRecord`]. A call
//! returns prose for the model and, optionally, a [`CrisisSignal`] that the
//! orchestrator turns into a persona switch within the same call.

pub mod cbt;
pub mod crisis;
pub mod emotion;
pub mod record;
pub mod request;
pub mod session;

use serde::{Deserialize, Serialize};

use crate::context::CulturalContext;
use crate::error::ToolError;

pub use cbt::CbtHandler;
pub use crisis::CrisisHandler;
pub use emotion::EmotionHandler;
pub use record::{ClinicalAction, ClinicalContext, ClinicalRecord, SafetyFlags, ToolDocumentation};
pub use request::{FunctionCall, ToolRequest};
pub use session::SessionHandler;

// ---------------------------------------------------------------------------
// Tool identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    CrisisDetection,
    CbtTechniques,
    EmotionalAnalysis,
    SessionManagement,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::CrisisDetection,
        ToolKind::CbtTechniques,
        ToolKind::EmotionalAnalysis,
        ToolKind::SessionManagement,
    ];

    /// Registry key.
    pub fn key(&self) -> &'static str {
        match self {
            ToolKind::CrisisDetection => "crisis_detection",
            ToolKind::CbtTechniques => "cbt_techniques",
            ToolKind::EmotionalAnalysis => "emotional_analysis",
            ToolKind::SessionManagement => "session_management",
        }
    }

    /// Name the model calls.
    pub fn function_name(&self) -> &'static str {
        match self {
            ToolKind::CrisisDetection => "detect_crisis",
            ToolKind::CbtTechniques => "apply_cbt_technique",
            ToolKind::EmotionalAnalysis => "analyze_emotion",
            ToolKind::SessionManagement => "manage_session",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.function_name() == name)
    }

    /// Accepts either a registry key or a function name.
    pub fn resolve(name: &str) -> Option<Self> {
        Self::from_key(name).or_else(|| Self::from_function_name(name))
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// JSON-schema function definition handed to the remote model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Call context and outcome
// ---------------------------------------------------------------------------

/// Session state a handler may read during one call.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub cultural: &'a CulturalContext,
}

impl<'a> ToolContext<'a> {
    pub fn new(cultural: &'a CulturalContext) -> Self {
        Self { cultural }
    }
}

/// Handler-raised request to move the session into crisis mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrisisSignal {
    pub kind: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub reply: String,
    pub escalation: Option<CrisisSignal>,
}

impl ToolOutcome {
    pub fn reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            escalation: None,
        }
    }

    pub fn escalate(mut self, kind: impl Into<String>, data: serde_json::Value) -> Self {
        self.escalation = Some(CrisisSignal {
            kind: kind.into(),
            data,
        });
        self
    }
}

/// Register of the culturally framed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    Supportive,
    Encouraging,
    #[default]
    Understanding,
}

impl Tone {
    pub fn prefix(&self) -> &'static str {
        match self {
            Tone::Supportive => "الله يعطيك القوة، ",
            Tone::Encouraging => "إن شاء الله كل شيء سيكون بخير، ",
            Tone::Understanding => "أفهم مشاعرك، ",
        }
    }
}

/// Prefix `text` with the tone's Arabic opener.
pub fn culturally(text: impl AsRef<str>, tone: Tone) -> String {
    format!("{}{}", tone.prefix(), text.as_ref())
}

// ---------------------------------------------------------------------------
// Handler trait
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn definition(&self) -> ToolDefinition;

    fn record(&self) -> &ClinicalRecord;

    fn record_mut(&mut self) -> &mut ClinicalRecord;

    /// Tool-specific accumulators (risk assessment, mood logs, notes, ...).
    fn clinical_data(&self) -> serde_json::Value;

    async fn execute(
        &mut self,
        request: ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError>;

    fn documentation(&self) -> ToolDocumentation {
        self.record().documentation()
    }

    /// Clears the safety flags. Only called on an explicit operator reset.
    fn reset_crisis_flags(&mut self) {
        self.record_mut().reset_flags();
    }
}

pub(crate) fn mismatched(tool: ToolKind, request: &ToolRequest) -> ToolError {
    ToolError::MismatchedRequest {
        tool: tool.key(),
        received: request.kind().key(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_resolve() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::resolve(kind.key()), Some(kind));
            assert_eq!(ToolKind::resolve(kind.function_name()), Some(kind));
        }
        assert_eq!(ToolKind::resolve("play_music"), None);
    }

    #[test]
    fn test_tone_prefixes() {
        assert!(culturally("hello", Tone::Supportive).starts_with("الله يعطيك القوة، "));
        assert!(culturally("hello", Tone::default()).ends_with("hello"));
    }
}
