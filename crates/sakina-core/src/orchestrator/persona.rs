//! Persona identities, their prompts and the tools each one binds.

use serde::{Deserialize, Serialize};

use crate::context::CulturalContext;
use crate::prompts::{self, CBT_SPECIALIST_PROMPT, CRISIS_INTERVENTION_PROMPT, GENERAL_THERAPY_PROMPT};
use crate::tools::ToolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaId {
    General,
    Crisis,
    Cbt,
}

impl PersonaId {
    pub const ALL: [PersonaId; 3] = [PersonaId::General, PersonaId::Crisis, PersonaId::Cbt];

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonaId::General => "general",
            PersonaId::Crisis => "crisis",
            PersonaId::Cbt => "cbt",
        }
    }

    /// Accepts the short ids and the legacy agent names.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "general" | "general_therapy" => Some(PersonaId::General),
            "crisis" | "crisis_intervention" => Some(PersonaId::Crisis),
            "cbt" | "cbt_specialist" => Some(PersonaId::Cbt),
            _ => None,
        }
    }

    /// Role phrase used in switch announcements.
    pub fn role(&self) -> &'static str {
        match self {
            PersonaId::General => "your primary therapist",
            PersonaId::Crisis => "crisis intervention specialist",
            PersonaId::Cbt => "cognitive behavioral therapy specialist",
        }
    }

    pub fn specialization(&self) -> &'static str {
        match self {
            PersonaId::General => "Comprehensive mental health support with cultural sensitivity",
            PersonaId::Crisis => "Emergency crisis intervention and safety management",
            PersonaId::Cbt => "Cognitive Behavioral Therapy with Islamic integration",
        }
    }

    pub fn cultural_adaptations(&self) -> &'static [&'static str] {
        match self {
            PersonaId::General => &[
                "Gulf Arabic cultural understanding",
                "Islamic values integration",
                "Family dynamics consideration",
                "Community support recognition",
            ],
            PersonaId::Crisis => &[
                "Cultural crisis protocols",
                "Family involvement in emergencies",
                "Religious crisis support",
                "Community resource activation",
            ],
            PersonaId::Cbt => &[
                "Islamic CBT (I-CBT) techniques",
                "Religious thought integration",
                "Cultural behavioral experiments",
                "Community-based interventions",
            ],
        }
    }

    fn template(&self) -> &'static str {
        match self {
            PersonaId::General => GENERAL_THERAPY_PROMPT,
            PersonaId::Crisis => CRISIS_INTERVENTION_PROMPT,
            PersonaId::Cbt => CBT_SPECIALIST_PROMPT,
        }
    }

    /// Tools bound in the standard setup.
    pub fn default_tools(&self) -> Vec<ToolKind> {
        match self {
            PersonaId::General => ToolKind::ALL.to_vec(),
            PersonaId::Crisis => vec![ToolKind::CrisisDetection, ToolKind::SessionManagement],
            PersonaId::Cbt => vec![ToolKind::CbtTechniques, ToolKind::EmotionalAnalysis],
        }
    }
}

impl std::fmt::Display for PersonaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable persona description. Handlers live in the session registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Persona {
    pub id: PersonaId,
    prompt: String,
    tools: Vec<ToolKind>,
    pub specialization: &'static str,
    pub cultural_adaptations: Vec<&'static str>,
}

impl Persona {
    /// Persona with its standard prompt and an explicit tool binding.
    pub fn new(id: PersonaId, tools: Vec<ToolKind>) -> Self {
        Self::with_template(id, id.template(), tools)
    }

    pub fn with_template(id: PersonaId, template: &str, tools: Vec<ToolKind>) -> Self {
        let mut bound: Vec<ToolKind> = Vec::with_capacity(tools.len());
        for tool in tools {
            if !bound.contains(&tool) {
                bound.push(tool);
            }
        }
        Self {
            id,
            prompt: prompts::assemble(template),
            tools: bound,
            specialization: id.specialization(),
            cultural_adaptations: id.cultural_adaptations().to_vec(),
        }
    }

    pub fn standard(id: PersonaId) -> Self {
        Self::new(id, id.default_tools())
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn tools(&self) -> &[ToolKind] {
        &self.tools
    }

    pub fn binds(&self, tool: ToolKind) -> bool {
        self.tools.contains(&tool)
    }

    pub fn tool_keys(&self) -> Vec<&'static str> {
        self.tools.iter().map(ToolKind::key).collect()
    }
}

/// Announcement returned after a successful switch.
pub fn switch_announcement(to: PersonaId, reason: &str, cultural: &CulturalContext) -> String {
    let role = to.role();
    let mut message = if cultural.prefers_arabic() {
        format!("سأقوم بتحويلك إلى {role} للحصول على الدعم المتخصص.\nI'm connecting you with {role} for specialized support.")
    } else {
        format!("I'm connecting you with {role} for specialized support.")
    };
    if !reason.trim().is_empty() {
        message.push_str(&format!("\n\nReason for this change: {reason}"));
    }
    let religious = cultural.religious();
    if religious {
        message.push_str(
            "\n\nإن شاء الله، ستجد الدعم المناسب مع هذا التخصص.\n\
             Insha'Allah, you will find the appropriate support with this specialization.",
        );
    }
    match to {
        PersonaId::Crisis => message.push_str(
            "\n\n🚨 Crisis support activated. Your safety is the priority.\n\
             أنت لست وحدك. نحن هنا لمساعدتك. (You are not alone. We are here to help you.)",
        ),
        PersonaId::Cbt => {
            message.push_str("\n\n🧠 CBT specialist ready to help with thought patterns and coping strategies.");
            if religious {
                message.push_str("\nWe'll integrate Islamic principles with evidence-based therapy techniques.");
            }
        }
        PersonaId::General => {
            message.push_str("\n\n💬 Back to general therapeutic support for comprehensive care.")
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_aliases() {
        assert_eq!(PersonaId::from_str("crisis_intervention"), Some(PersonaId::Crisis));
        assert_eq!(PersonaId::from_str("CBT"), Some(PersonaId::Cbt));
        assert_eq!(PersonaId::from_str("general_therapy"), Some(PersonaId::General));
        assert_eq!(PersonaId::from_str("nutrition"), None);
    }

    #[test]
    fn test_standard_bindings() {
        assert_eq!(Persona::standard(PersonaId::General).tools().len(), 4);
        let crisis = Persona::standard(PersonaId::Crisis);
        assert!(crisis.binds(ToolKind::CrisisDetection));
        assert!(!crisis.binds(ToolKind::CbtTechniques));
        assert!(crisis.prompt().ends_with(prompts::SPEAKING_TONE));
    }

    #[test]
    fn test_duplicate_bindings_collapse() {
        let persona = Persona::new(
            PersonaId::Cbt,
            vec![ToolKind::CbtTechniques, ToolKind::CbtTechniques],
        );
        assert_eq!(persona.tool_keys(), vec!["cbt_techniques"]);
    }

    #[test]
    fn test_announcement_variants() {
        let plain = switch_announcement(PersonaId::Crisis, "Crisis escalation: imminent_risk", &CulturalContext::new());
        assert!(plain.starts_with("I'm connecting you with crisis intervention specialist"));
        assert!(plain.contains("Reason for this change: Crisis escalation: imminent_risk"));
        assert!(plain.contains("🚨"));

        let cultural = CulturalContext::new()
            .with("preferred_language", "arabic")
            .with("religious_considerations", true);
        let arabic = switch_announcement(PersonaId::Cbt, "", &cultural);
        assert!(arabic.starts_with("سأقوم بتحويلك"));
        assert!(arabic.contains("Insha'Allah"));
        assert!(arabic.contains("We'll integrate Islamic principles"));
        assert!(!arabic.contains("Reason for this change"));
    }
}
