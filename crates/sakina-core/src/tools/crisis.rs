//! Suicide-risk assessment, crisis monitoring, safety planning and emergency escalation.

use serde::Serialize;
use serde_json::{json, Value};

use super::request::{CrisisAction, CrisisArgs};
use super::{culturally, mismatched, ClinicalRecord, ToolContext, ToolDefinition, ToolHandler, ToolKind, ToolOutcome, ToolRequest, Tone};
use crate::config::RiskConfig;
use crate::error::ToolError;
use crate::matchers::crisis::{alert_level, assess_risk, emotional_state, monitor_indicators};
use crate::matchers::{RiskAssessment, RiskLevel};

pub const EMERGENCY_MESSAGE: &str = "🚨 EMERGENCY PROTOCOL ACTIVATED 🚨

الله معك في هذه اللحظة الصعبة. أنت لست وحدك.
Allah is with you in this difficult moment. You are not alone.

اتصل فوراً بـ / Call immediately:
📞 Emergency Services: 999 (الطوارئ العمانية)
📞 Royal Oman Police: 9999 (شرطة عمان السلطانية)
📞 Mental Health Services: Ministry of Health Oman
📞 Trusted family member or close friend (فرد من العائلة أو صديق مقرب)
📞 Local mosque imam for spiritual support (إمام المسجد للدعم الروحي)

طلب المساعدة ليس عيباً، بل علامة قوة وحكمة.
Seeking help is not shameful, but a sign of strength and wisdom.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SafetyPlan {
    pub warning_signs: Vec<&'static str>,
    pub coping_strategies: Vec<&'static str>,
    pub support_contacts: Vec<&'static str>,
    pub professional_resources: Vec<&'static str>,
    pub environmental_safety: Vec<&'static str>,
}

impl SafetyPlan {
    fn build(religious: bool, supportive_family: bool) -> Self {
        let mut plan = SafetyPlan {
            warning_signs: vec![
                "Feeling overwhelmed",
                "Thoughts of hopelessness",
                "Strong urges to harm oneself",
            ],
            ..Default::default()
        };
        if religious {
            plan.coping_strategies.extend([
                "Prayer and dhikr (remembrance of Allah)",
                "Reading Quran for comfort",
                "Seeking guidance from religious counsel",
            ]);
        }
        plan.coping_strategies.extend([
            "Deep breathing exercises",
            "Call a trusted family member",
            "Go to a public place",
            "Listen to calming music",
        ]);
        if supportive_family {
            plan.support_contacts.extend([
                "Immediate family members",
                "Extended family elders",
                "Close family friends",
            ]);
        }
        plan.professional_resources.extend([
            "Mental health hotline: 999",
            "Nearest hospital emergency room",
            "Culturally sensitive therapist",
            "Community mental health center",
        ]);
        plan.environmental_safety.extend([
            "Remove access to harmful objects",
            "Stay with trusted family/friends",
            "Avoid isolation",
            "Create calming environment",
        ]);
        plan
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrisisAdaptations {
    pub family_involvement: bool,
    pub religious_considerations: bool,
    pub community_support: bool,
}

#[derive(Debug)]
pub struct CrisisHandler {
    risk: RiskConfig,
    record: ClinicalRecord,
    current_risk_level: RiskLevel,
    last_assessment: Option<RiskAssessment>,
    crisis_indicators: Vec<&'static str>,
    safety_plan: Option<SafetyPlan>,
    adaptations: CrisisAdaptations,
    escalated: bool,
}

impl CrisisHandler {
    pub fn new(risk: RiskConfig) -> Self {
        Self {
            risk,
            record: ClinicalRecord::new(ToolKind::CrisisDetection),
            current_risk_level: RiskLevel::Low,
            last_assessment: None,
            crisis_indicators: Vec::new(),
            safety_plan: None,
            adaptations: CrisisAdaptations::default(),
            escalated: false,
        }
    }

    pub fn current_risk_level(&self) -> RiskLevel {
        self.current_risk_level
    }

    pub fn safety_plan(&self) -> Option<&SafetyPlan> {
        self.safety_plan.as_ref()
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }

    fn assess(&mut self, args: &CrisisArgs) -> ToolOutcome {
        let text = args.user_input.as_deref().unwrap_or_default();
        self.record.check_crisis_indicators(text);
        let assessment = assess_risk(Some(text), &args.risk_factors, &self.risk);
        self.current_risk_level = assessment.risk_level;

        tracing::info!(
            target: "sakina::tools",
            risk_level = %assessment.risk_level,
            risk_score = assessment.risk_score,
            keyword = assessment.crisis_keyword.unwrap_or(""),
            "risk assessed"
        );
        self.record.emit(
            "risk_assessment",
            json!({
                "risk_level": assessment.risk_level,
                "risk_score": assessment.risk_score,
                "requires_immediate_action": assessment.risk_level.requires_immediate_action(),
            }),
        );
        self.last_assessment = Some(assessment.clone());

        let follow = if assessment.risk_level.requires_immediate_action() {
            "Immediate intervention protocols activated."
        } else {
            "Monitoring and support initiated."
        };
        let reply = culturally(
            format!(
                "Risk assessment completed. Risk level: {}. {follow}",
                assessment.risk_level
            ),
            Tone::default(),
        );

        if assessment.risk_level == RiskLevel::Imminent {
            let escalation = self.escalate(RiskLevel::Imminent.as_str(), &args.risk_factors);
            return ToolOutcome {
                reply,
                escalation: escalation.escalation,
            };
        }
        ToolOutcome::reply(reply)
    }

    fn monitor(&mut self, args: &CrisisArgs) -> ToolOutcome {
        let text = args.user_input.as_deref().unwrap_or_default();
        let detected = monitor_indicators(text);
        if detected.is_empty() {
            return ToolOutcome::reply("Monitoring continues. No immediate crisis indicators detected.");
        }

        self.crisis_indicators.extend(detected.iter().copied());
        self.record.mark_crisis_detected();
        self.record.emit(
            "crisis_indicators_detected",
            json!({
                "indicators": detected,
                "total_indicators": self.crisis_indicators.len(),
                "alert_level": alert_level(&detected),
            }),
        );
        ToolOutcome::reply(culturally(
            format!(
                "Crisis indicators detected: {}. Activating enhanced monitoring and support protocols.",
                detected.join(", ")
            ),
            Tone::Supportive,
        ))
    }

    fn create_safety_plan(&mut self, args: &CrisisArgs, ctx: &ToolContext<'_>) -> ToolOutcome {
        let culture = &args.cultural_context;
        let religious = culture.religious_beliefs.unwrap_or_else(|| ctx.cultural.religious());
        let plan = SafetyPlan::build(religious, family_supportive(args, ctx));
        self.record.emit(
            "safety_plan_created",
            json!({"safety_plan": plan, "cultural_adaptations": culture}),
        );
        self.safety_plan = Some(plan);

        ToolOutcome::reply(culturally(
            "Safety plan created with your cultural and family context in mind. \
             This plan will help you stay safe during difficult moments. \
             Keep important contact numbers easily accessible.",
            Tone::Encouraging,
        ))
    }

    /// First call raises the escalation signal; later calls only repeat the message.
    fn escalate(&mut self, urgency: &str, risk_factors: &[String]) -> ToolOutcome {
        if self.escalated {
            return ToolOutcome::reply(EMERGENCY_MESSAGE);
        }
        self.escalated = true;

        let data = json!({
            "urgency_level": urgency,
            "risk_factors": risk_factors,
            "immediate_actions_required": true,
            "professional_intervention_needed": true,
        });
        self.record
            .trigger_emergency_protocol(&format!("Crisis escalation - {urgency} risk"), data.clone());
        self.record.emit(
            "emergency_activated",
            json!({
                "urgency": urgency,
                "message": EMERGENCY_MESSAGE,
                "immediate_actions": [
                    "Call emergency services if in immediate danger",
                    "Go to nearest emergency room",
                    "Call trusted family member",
                    "Do not be alone",
                ],
            }),
        );
        ToolOutcome::reply(EMERGENCY_MESSAGE).escalate("emergency_escalation", data)
    }

    fn immediate_support(&mut self, args: &CrisisArgs, ctx: &ToolContext<'_>) -> ToolOutcome {
        let text = args.user_input.as_deref().unwrap_or_default();
        let state = emotional_state(text);

        let mut reply = culturally(
            "I can hear that you're going through a very difficult time right now. \
             Your feelings are valid, and you deserve support and care.",
            Tone::Supportive,
        );
        if args
            .cultural_context
            .religious_beliefs
            .unwrap_or_else(|| ctx.cultural.religious())
        {
            reply.push_str(
                "\n\nاللهم اشفه شفاءً لا يغادر سقماً (May Allah grant you complete healing). \
                 Remember that seeking help is encouraged in Islam, and taking care of your mental \
                 health is part of taking care of the trust Allah has given you.",
            );
        }
        reply.push_str("\n\nLet's try some immediate techniques to help you feel safer right now:");
        reply.push_str("\n1. Take deep, slow breaths with me");
        reply.push_str("\n2. Look around and name 5 things you can see");
        reply.push_str("\n3. Feel your feet on the ground");
        reply.push_str("\n4. Remember: This feeling will pass");

        self.record.emit(
            "immediate_support",
            json!({
                "emotional_state": state,
                "support_message": reply,
                "coping_techniques": ["breathing", "grounding", "mindfulness"],
            }),
        );
        ToolOutcome::reply(reply)
    }

    fn cultural_protocols(&mut self, args: &CrisisArgs, ctx: &ToolContext<'_>) -> ToolOutcome {
        let culture = &args.cultural_context;
        let mut activated = Vec::new();
        if family_supportive(args, ctx) {
            self.adaptations.family_involvement = true;
            activated.push("family_support_integration");
        }
        if culture.religious_beliefs.unwrap_or_else(|| ctx.cultural.religious()) {
            self.adaptations.religious_considerations = true;
            activated.push("islamic_spiritual_support");
        }
        let social = culture
            .social_support
            .as_deref()
            .or_else(|| ctx.cultural.get("social_support").and_then(Value::as_str));
        if social == Some("available") {
            self.adaptations.community_support = true;
            activated.push("community_resource_activation");
        }

        self.record.emit(
            "cultural_protocols_activated",
            json!({"protocols": activated, "cultural_adaptations": self.adaptations}),
        );
        ToolOutcome::reply(culturally(
            format!(
                "Cultural sensitivity protocols activated: {}. Support will be provided in a way \
                 that respects your cultural values and family context.",
                activated.join(", ")
            ),
            Tone::default(),
        ))
    }
}

fn family_supportive(args: &CrisisArgs, ctx: &ToolContext<'_>) -> bool {
    args.cultural_context
        .family_dynamics
        .as_deref()
        .or_else(|| ctx.cultural.get("family_dynamics").and_then(Value::as_str))
        == Some("supportive")
}

#[async_trait::async_trait]
impl ToolHandler for CrisisHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::CrisisDetection
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ToolKind::CrisisDetection.function_name().to_string(),
            description: "Monitor and respond to mental health crises, suicide risk, and emergency \
                          situations with cultural sensitivity"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": CrisisAction::names(),
                        "description": "Crisis detection action to perform"
                    },
                    "user_input": {"type": "string", "description": "User's recent input to analyze for crisis indicators"},
                    "risk_factors": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Identified risk factors (hopelessness, social_isolation, previous_attempts, ...)"
                    },
                    "cultural_context": {
                        "type": "object",
                        "properties": {
                            "family_dynamics": {"type": "string"},
                            "religious_beliefs": {"type": "string"},
                            "social_support": {"type": "string"}
                        }
                    },
                    "urgency_level": {"type": "string", "enum": ["low", "moderate", "high", "imminent"]}
                },
                "required": ["action"]
            }),
        }
    }

    fn record(&self) -> &ClinicalRecord {
        &self.record
    }

    fn record_mut(&mut self) -> &mut ClinicalRecord {
        &mut self.record
    }

    fn clinical_data(&self) -> Value {
        json!({
            "current_risk_level": self.current_risk_level,
            "risk_assessment": self.last_assessment,
            "crisis_indicators": self.crisis_indicators,
            "safety_plan_created": self.safety_plan.is_some(),
            "safety_plan": self.safety_plan,
            "cultural_adaptations": self.adaptations,
            "emergency_escalated": self.escalated,
        })
    }

    /// Operator reset also re-arms escalation.
    fn reset_crisis_flags(&mut self) {
        self.record.reset_flags();
        self.escalated = false;
    }

    async fn execute(
        &mut self,
        request: ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError> {
        let (action, args) = match request {
            ToolRequest::Crisis { action, args } => (action, args),
            other => return Err(mismatched(ToolKind::CrisisDetection, &other)),
        };

        let urgency = args.urgency_level.clone().unwrap_or_else(|| "low".to_string());
        if !(action == CrisisAction::EscalateEmergency && self.escalated) {
            self.record.log_action(
                format!("crisis_detection_{}", action.as_str()),
                json!({
                    "user_input_length": args.user_input.as_deref().map_or(0, |t| t.chars().count()),
                    "risk_factors": args.risk_factors,
                    "urgency_level": urgency,
                    "cultural_context": args.cultural_context,
                }),
            );
        }

        Ok(match action {
            CrisisAction::AssessRisk => self.assess(&args),
            CrisisAction::MonitorIndicators => self.monitor(&args),
            CrisisAction::CreateSafetyPlan => self.create_safety_plan(&args, ctx),
            CrisisAction::EscalateEmergency => self.escalate(&urgency, &args.risk_factors),
            CrisisAction::ProvideImmediateSupport => self.immediate_support(&args, ctx),
            CrisisAction::ActivateCulturalProtocols => self.cultural_protocols(&args, ctx),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CulturalContext;

    fn request(action: CrisisAction, args: CrisisArgs) -> ToolRequest {
        ToolRequest::Crisis { action, args }
    }

    fn with_input(text: &str) -> CrisisArgs {
        CrisisArgs {
            user_input: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_keyword_assessment_cascades_into_escalation() {
        let cultural = CulturalContext::new();
        let ctx = ToolContext::new(&cultural);
        let mut handler = CrisisHandler::new(RiskConfig::default());

        let out = handler
            .execute(request(CrisisAction::AssessRisk, with_input("I want to end it all")), &ctx)
            .await
            .unwrap();
        assert!(out.reply.contains("Risk level: imminent"));
        assert!(out.reply.contains("Immediate intervention protocols activated."));
        assert_eq!(out.escalation.map(|s| s.kind), Some("emergency_escalation".to_string()));
        assert_eq!(handler.current_risk_level(), RiskLevel::Imminent);
        assert!(handler.record().flags().crisis_detected);
        assert!(handler.record().flags().emergency_escalation_needed);
    }

    #[tokio::test]
    async fn test_escalation_is_idempotent() {
        let cultural = CulturalContext::new();
        let ctx = ToolContext::new(&cultural);
        let mut handler = CrisisHandler::new(RiskConfig::default());

        let first = handler
            .execute(request(CrisisAction::EscalateEmergency, CrisisArgs::default()), &ctx)
            .await
            .unwrap();
        let logged = handler.record().actions().len();
        handler.record_mut().take_events();

        let second = handler
            .execute(request(CrisisAction::EscalateEmergency, CrisisArgs::default()), &ctx)
            .await
            .unwrap();
        assert!(first.escalation.is_some());
        assert!(second.escalation.is_none());
        assert_eq!(first.reply, second.reply);
        assert_eq!(handler.record().actions().len(), logged);
        assert!(handler.record_mut().take_events().is_empty());
    }

    #[tokio::test]
    async fn test_factor_scoring_without_keyword() {
        let cultural = CulturalContext::new();
        let ctx = ToolContext::new(&cultural);
        let mut handler = CrisisHandler::new(RiskConfig::default());
        let args = CrisisArgs {
            user_input: Some("things are heavy lately".into()),
            risk_factors: vec!["previous_attempts".into(), "hopelessness".into()],
            ..Default::default()
        };
        let out = handler.execute(request(CrisisAction::AssessRisk, args), &ctx).await.unwrap();
        assert_eq!(handler.current_risk_level(), RiskLevel::High);
        assert!(out.escalation.is_none());
        assert!(out.reply.starts_with("أفهم مشاعرك، "));
    }

    #[tokio::test]
    async fn test_safety_plan_follows_cultural_context() {
        let cultural = CulturalContext::new().with("religious_considerations", true);
        let ctx = ToolContext::new(&cultural);
        let mut handler = CrisisHandler::new(RiskConfig::default());

        let mut args = CrisisArgs::default();
        args.cultural_context.family_dynamics = Some("supportive".into());
        handler
            .execute(request(CrisisAction::CreateSafetyPlan, args), &ctx)
            .await
            .unwrap();
        let plan = handler.safety_plan().cloned().unwrap();
        assert_eq!(plan.warning_signs.len(), 3);
        assert_eq!(plan.coping_strategies.len(), 7);
        assert_eq!(plan.support_contacts.len(), 3);

        // overwritten, not appended
        handler
            .execute(request(CrisisAction::CreateSafetyPlan, CrisisArgs::default()), &ctx)
            .await
            .unwrap();
        assert!(handler.safety_plan().unwrap().support_contacts.is_empty());
    }

    #[tokio::test]
    async fn test_monitor_and_protocols() {
        let cultural = CulturalContext::new();
        let ctx = ToolContext::new(&cultural);
        let mut handler = CrisisHandler::new(RiskConfig::default());

        let quiet = handler
            .execute(request(CrisisAction::MonitorIndicators, with_input("fine today")), &ctx)
            .await
            .unwrap();
        assert_eq!(quiet.reply, "Monitoring continues. No immediate crisis indicators detected.");

        let loud = handler
            .execute(request(CrisisAction::MonitorIndicators, with_input("I feel hopeless and all alone")), &ctx)
            .await
            .unwrap();
        assert!(loud.reply.contains("hopelessness, isolation"));

        let mut args = CrisisArgs::default();
        args.cultural_context.social_support = Some("available".into());
        let out = handler
            .execute(request(CrisisAction::ActivateCulturalProtocols, args), &ctx)
            .await
            .unwrap();
        assert!(out.reply.contains("community_resource_activation"));
    }

    #[tokio::test]
    async fn test_rejects_other_tool_requests() {
        let cultural = CulturalContext::new();
        let ctx = ToolContext::new(&cultural);
        let mut handler = CrisisHandler::new(RiskConfig::default());
        let err = handler
            .execute(
                ToolRequest::Session {
                    action: crate::tools::request::SessionAction::StartSession,
                    args: Default::default(),
                },
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MismatchedRequest { .. }));
    }
}
