//! Session documentation snapshot for clinical records, plus the plain-text
//! clinical-notes rendering.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::orchestrator::{PersonaOrchestrator, SwitchRecord, SystemStatus};
use crate::registry::CrisisStatus;
use crate::tools::ToolDocumentation;

const CULTURAL_ADAPTATIONS: [&str; 4] = [
    "omani_arabic_expressions",
    "islamic_therapeutic_concepts",
    "gulf_family_dynamics",
    "cultural_crisis_protocols",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    ClinicalNotes,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::ClinicalNotes => "clinical_notes",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "clinical_notes" | "notes" => Some(ExportFormat::ClinicalNotes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionOverview {
    pub service: String,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
    pub cultural_context: &'static str,
    pub therapeutic_approach: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDocumentation {
    pub session_overview: SessionOverview,
    pub agent_status: SystemStatus,
    pub agent_history: Vec<SwitchRecord>,
    pub tool_documentation: BTreeMap<String, ToolDocumentation>,
    pub clinical_summary: Map<String, Value>,
    pub safety_assessment: CrisisStatus,
    pub cultural_adaptations_applied: Vec<&'static str>,
}

impl SessionDocumentation {
    /// Point-in-time snapshot of one live session.
    pub fn capture(orchestrator: &PersonaOrchestrator, service: &str) -> Self {
        let registry = orchestrator.registry();
        let tool_documentation = registry
            .iter()
            .map(|(name, handler)| (name.to_string(), handler.documentation()))
            .collect();
        let documentation = Self {
            session_overview: SessionOverview {
                service: service.to_string(),
                session_id: orchestrator.session_id().to_string(),
                started_at: orchestrator.started_at(),
                timestamp: Utc::now(),
                cultural_context: "omani_gulf_arabic_islamic",
                therapeutic_approach: "culturally_integrated_ai_therapy",
            },
            agent_status: orchestrator.system_status(),
            agent_history: orchestrator.switch_history().to_vec(),
            tool_documentation,
            clinical_summary: registry.clinical_data(),
            safety_assessment: registry.crisis_status(),
            cultural_adaptations_applied: CULTURAL_ADAPTATIONS.to_vec(),
        };
        tracing::info!(
            target: "sakina::documentation",
            session_id = %documentation.session_overview.session_id,
            tools = documentation.tool_documentation.len(),
            "session documentation captured"
        );
        documentation
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn clinical_notes(&self) -> String {
        let overview = &self.session_overview;
        let mut notes = String::new();
        let _ = writeln!(notes, "{} - CLINICAL SESSION NOTES", overview.service.to_uppercase());
        let _ = writeln!(notes, "Session ID: {}", overview.session_id);
        let _ = writeln!(notes, "Date/Time: {}", overview.timestamp.to_rfc3339());
        notes.push_str("Cultural Context: Omani/Gulf Arabic with Islamic considerations\n\n");

        notes.push_str("AGENT STATUS:\n");
        let _ = writeln!(notes, "Current Agent: {}", self.agent_status.current_persona);
        let _ = writeln!(notes, "Crisis Active: {}", self.agent_status.crisis_active);
        let _ = writeln!(notes, "Persona Switches: {}\n", self.agent_history.len());

        notes.push_str("SAFETY ASSESSMENT:\n");
        let _ = writeln!(notes, "Crisis Detected: {}", self.safety_assessment.any_crisis_detected);
        let _ = writeln!(
            notes,
            "Emergency Escalation: {}\n",
            self.safety_assessment.emergency_escalation_needed
        );

        notes.push_str(
            "CULTURAL ADAPTATIONS APPLIED:\n\
             - Omani Arabic expressions and cultural sensitivity\n\
             - Islamic therapeutic concepts integration\n\
             - Gulf family dynamics consideration\n\
             - Culturally appropriate crisis protocols\n\n",
        );

        notes.push_str("CLINICAL ACTIONS TAKEN:\n");
        if self.tool_documentation.is_empty() {
            notes.push_str("No tool activity recorded.\n");
        }
        for (name, doc) in &self.tool_documentation {
            let _ = writeln!(notes, "\n{} TOOL:", name.to_uppercase());
            let _ = writeln!(notes, "Total Actions: {}", doc.session_summary.total_actions);
            if !doc.recommendations.is_empty() {
                notes.push_str("Recommendations:\n");
                for rec in &doc.recommendations {
                    let _ = writeln!(notes, "- {rec}");
                }
            }
        }

        notes.push_str(
            "\nFOLLOW-UP REQUIREMENTS:\n\
             - Continue monitoring as per cultural protocols\n\
             - Ensure family support system engagement if appropriate\n\
             - Maintain Islamic therapeutic principles in ongoing care\n\
             - Document any cultural considerations for future sessions\n\n\
             END OF CLINICAL NOTES\n",
        );
        notes
    }

    /// Export body for the requested format.
    pub fn export(&self, format: ExportFormat) -> Value {
        match format {
            ExportFormat::Json => self.to_json(),
            ExportFormat::ClinicalNotes => serde_json::json!({
                "format": format.as_str(),
                "content": self.clinical_notes(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::PersonaId;
    use crate::registry::ToolDeps;

    #[test]
    fn test_format_names() {
        assert_eq!(ExportFormat::from_str("clinical_notes"), Some(ExportFormat::ClinicalNotes));
        assert_eq!(ExportFormat::from_str(" JSON "), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_str("pdf"), None);
    }

    #[test]
    fn test_fresh_session_notes_have_every_heading() {
        let orch = PersonaOrchestrator::standard(ToolDeps::default(), PersonaId::General).unwrap();
        let doc = SessionDocumentation::capture(&orch, "Sakina");
        assert_eq!(doc.tool_documentation.len(), 4);
        let notes = doc.clinical_notes();
        for heading in [
            "AGENT STATUS:",
            "SAFETY ASSESSMENT:",
            "CULTURAL ADAPTATIONS APPLIED:",
            "CLINICAL ACTIONS TAKEN:",
            "FOLLOW-UP REQUIREMENTS:",
        ] {
            assert!(notes.contains(heading), "missing {heading}");
        }
        assert!(notes.contains("Current Agent: general"));
        assert!(notes.contains("CRISIS_DETECTION TOOL:"));
    }
}
