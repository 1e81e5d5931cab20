//! Typed tool-call requests.
//!
//! The model sends `{name, arguments}` with the action under a tool-specific key
//! (`action`, `technique` or `analysis_type`, with `action` accepted as an alias
//! everywhere). [`ToolRequest::from_call`] pulls the discriminator out, validates
//! it against the tool's action set and deserializes the remaining arguments
//! into that tool's argument record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::ToolKind;
use crate::context::truthy;
use crate::error::{DispatchError, ToolError};
use crate::matchers::VoiceFeatures;

/// Raw function call as emitted by the remote model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

macro_rules! action_set {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn from_str(s: &str) -> Option<Self> {
                match s.trim() {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|a| a.as_str()).collect()
            }
        }
    };
}

action_set!(CrisisAction {
    AssessRisk => "assess_risk",
    MonitorIndicators => "monitor_indicators",
    CreateSafetyPlan => "create_safety_plan",
    EscalateEmergency => "escalate_emergency",
    ProvideImmediateSupport => "provide_immediate_support",
    ActivateCulturalProtocols => "activate_cultural_protocols",
});

action_set!(CbtTechnique {
    ThoughtChallenging => "thought_challenging",
    BehavioralActivation => "behavioral_activation",
    MoodMonitoring => "mood_monitoring",
    CognitiveRestructuring => "cognitive_restructuring",
    GroundingTechniques => "grounding_techniques",
    IslamicCbtIntegration => "islamic_cbt_integration",
    GratitudePractice => "gratitude_practice",
    BehavioralExperiment => "behavioral_experiment",
});

action_set!(EmotionAnalysis {
    DetectEmotions => "detect_emotions",
    TrackPatterns => "track_patterns",
    CulturalContextAnalysis => "cultural_context_analysis",
    EmotionalIntensityAssessment => "emotional_intensity_assessment",
    TherapeuticRecommendations => "therapeutic_recommendations",
    CrisisEmotionalIndicators => "crisis_emotional_indicators",
});

action_set!(SessionAction {
    StartSession => "start_session",
    EndSession => "end_session",
    ManageConsent => "manage_consent",
    UpdateNotes => "update_notes",
    SetEmergencyContacts => "set_emergency_contacts",
    ManagePrivacySettings => "manage_privacy_settings",
    TrackTherapeuticGoals => "track_therapeutic_goals",
    DocumentProgress => "document_progress",
    HandleSessionInterruption => "handle_session_interruption",
    ExportSessionSummary => "export_session_summary",
});

// ---------------------------------------------------------------------------
// Lenient field decoding
// ---------------------------------------------------------------------------

/// Accepts booleans, "yes"/"islam"-style strings and numbers.
fn lenient_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.filter(|v| !v.is_null()).map(|v| truthy(&v)))
}

/// Accepts integers, floats and numeric strings.
fn lenient_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    })
}

/// Strings only; anything else (including `null`) reads as absent.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// A list of strings, or one string read as a single entry.
fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Argument records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrisisCulture {
    #[serde(default, deserialize_with = "lenient_text")]
    pub family_dynamics: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub religious_beliefs: Option<bool>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub social_support: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrisisArgs {
    #[serde(default, deserialize_with = "lenient_text")]
    pub user_input: Option<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub cultural_context: CrisisCulture,
    #[serde(default, deserialize_with = "lenient_text")]
    pub urgency_level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CbtCulture {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub religious_integration: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub family_involvement: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub arabic_preferred: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CbtArgs {
    #[serde(default, deserialize_with = "lenient_text")]
    pub user_thoughts: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub target_behavior: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub mood_rating: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub emotion: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub evidence_for: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub evidence_against: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub balanced_thought: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub cultural_reframe: Option<String>,
    #[serde(default)]
    pub cultural_context: CbtCulture,
    #[serde(default)]
    pub session_goals: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionCulture {
    #[serde(default, deserialize_with = "lenient_flag")]
    pub arabic_language_used: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub religious_expressions: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub family_context_mentioned: Option<bool>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub cultural_values_referenced: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionArgs {
    #[serde(default, deserialize_with = "lenient_text")]
    pub user_input: Option<String>,
    #[serde(default)]
    pub voice_features: Option<VoiceFeatures>,
    #[serde(default)]
    pub cultural_context: EmotionCulture,
    #[serde(default)]
    pub session_context: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInput {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub relationship: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub priority: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub cultural_considerations: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionArgs {
    #[serde(default)]
    pub consent_details: Map<String, Value>,
    #[serde(default)]
    pub emergency_contacts: Vec<ContactInput>,
    #[serde(default)]
    pub cultural_preferences: Map<String, Value>,
    #[serde(default)]
    pub therapeutic_goals: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub session_notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub privacy_level: Option<String>,
}

// ---------------------------------------------------------------------------
// ToolRequest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    Crisis { action: CrisisAction, args: CrisisArgs },
    Cbt { technique: CbtTechnique, args: CbtArgs },
    Emotion { analysis: EmotionAnalysis, args: EmotionArgs },
    Session { action: SessionAction, args: SessionArgs },
}

impl ToolRequest {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolRequest::Crisis { .. } => ToolKind::CrisisDetection,
            ToolRequest::Cbt { .. } => ToolKind::CbtTechniques,
            ToolRequest::Emotion { .. } => ToolKind::EmotionalAnalysis,
            ToolRequest::Session { .. } => ToolKind::SessionManagement,
        }
    }

    pub fn action_name(&self) -> &'static str {
        match self {
            ToolRequest::Crisis { action, .. } => action.as_str(),
            ToolRequest::Cbt { technique, .. } => technique.as_str(),
            ToolRequest::Emotion { analysis, .. } => analysis.as_str(),
            ToolRequest::Session { action, .. } => action.as_str(),
        }
    }

    pub fn from_call(call: &FunctionCall) -> Result<Self, DispatchError> {
        let kind = ToolKind::from_function_name(&call.name)
            .ok_or_else(|| DispatchError::UnknownFunction(call.name.clone()))?;
        Ok(Self::parse(kind, &call.arguments)?)
    }

    pub fn parse(kind: ToolKind, arguments: &Value) -> Result<Self, ToolError> {
        let (given, rest) = split_discriminator(kind, arguments);
        let given = given.or_else(|| default_action(kind).map(str::to_string));

        let invalid = |given: Option<String>, valid: Vec<&'static str>| ToolError::InvalidAction {
            tool: kind.key(),
            given: given.unwrap_or_else(|| "(none)".to_string()),
            valid,
        };
        let args_error = |source| ToolError::InvalidArguments {
            tool: kind.key(),
            source,
        };

        let request = match kind {
            ToolKind::CrisisDetection => {
                let action = given
                    .as_deref()
                    .and_then(CrisisAction::from_str)
                    .ok_or_else(|| invalid(given.clone(), CrisisAction::names()))?;
                let args = serde_json::from_value(rest).map_err(args_error)?;
                ToolRequest::Crisis { action, args }
            }
            ToolKind::CbtTechniques => {
                let technique = given
                    .as_deref()
                    .and_then(CbtTechnique::from_str)
                    .ok_or_else(|| invalid(given.clone(), CbtTechnique::names()))?;
                let args = serde_json::from_value(rest).map_err(args_error)?;
                ToolRequest::Cbt { technique, args }
            }
            ToolKind::EmotionalAnalysis => {
                let analysis = given
                    .as_deref()
                    .and_then(EmotionAnalysis::from_str)
                    .ok_or_else(|| invalid(given.clone(), EmotionAnalysis::names()))?;
                let args = serde_json::from_value(rest).map_err(args_error)?;
                ToolRequest::Emotion { analysis, args }
            }
            ToolKind::SessionManagement => {
                let action = given
                    .as_deref()
                    .and_then(SessionAction::from_str)
                    .ok_or_else(|| invalid(given.clone(), SessionAction::names()))?;
                let args = serde_json::from_value(rest).map_err(args_error)?;
                ToolRequest::Session { action, args }
            }
        };
        Ok(request)
    }
}

/// Keys that may carry the action, in precedence order.
fn discriminator_keys(kind: ToolKind) -> &'static [&'static str] {
    match kind {
        ToolKind::CrisisDetection | ToolKind::SessionManagement => &["action"],
        ToolKind::CbtTechniques => &["technique", "action"],
        ToolKind::EmotionalAnalysis => &["analysis_type", "action"],
    }
}

fn default_action(kind: ToolKind) -> Option<&'static str> {
    match kind {
        ToolKind::CrisisDetection => Some("assess_risk"),
        ToolKind::CbtTechniques => Some("thought_challenging"),
        ToolKind::EmotionalAnalysis => Some("detect_emotions"),
        ToolKind::SessionManagement => None,
    }
}

/// Returns the discriminator (first present key wins) and the arguments with
/// every discriminator key removed. Arguments delivered as a JSON string are
/// decoded first; anything that is not an object reads as empty.
fn split_discriminator(kind: ToolKind, arguments: &Value) -> (Option<String>, Value) {
    let mut map = match arguments {
        Value::Object(map) => map.clone(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    };

    let mut given = None;
    for key in discriminator_keys(kind) {
        if let Some(value) = map.remove(*key) {
            if given.is_none() {
                given = value.as_str().map(str::to_string);
            }
        }
    }
    (given, Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_apply_when_discriminator_missing() {
        let req = ToolRequest::parse(ToolKind::CrisisDetection, &json!({"user_input": "hi"})).unwrap();
        assert_eq!(req.action_name(), "assess_risk");
        let req = ToolRequest::parse(ToolKind::CbtTechniques, &Value::Null).unwrap();
        assert_eq!(req.action_name(), "thought_challenging");
        let req = ToolRequest::parse(ToolKind::EmotionalAnalysis, &json!({})).unwrap();
        assert_eq!(req.action_name(), "detect_emotions");
    }

    #[test]
    fn test_session_has_no_default() {
        let err = ToolRequest::parse(ToolKind::SessionManagement, &json!({})).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid session_management action '(none)'"), "{msg}");
        assert!(msg.contains("start_session"));
    }

    #[test]
    fn test_action_alias_accepted() {
        let req = ToolRequest::parse(
            ToolKind::CbtTechniques,
            &json!({"action": "mood_monitoring", "mood_rating": "7"}),
        )
        .unwrap();
        match req {
            ToolRequest::Cbt { technique, args } => {
                assert_eq!(technique, CbtTechnique::MoodMonitoring);
                assert_eq!(args.mood_rating, Some(7));
            }
            other => panic!("unexpected request: {other:?}"),
        }

        let req = ToolRequest::parse(
            ToolKind::EmotionalAnalysis,
            &json!({"analysis_type": "track_patterns", "action": "detect_emotions"}),
        )
        .unwrap();
        assert_eq!(req.action_name(), "track_patterns");
    }

    #[test]
    fn test_invalid_action_lists_valid_set() {
        let err = ToolRequest::parse(ToolKind::CrisisDetection, &json!({"action": "dance"})).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'dance'"));
        assert!(msg.contains("assess_risk, monitor_indicators"));
    }

    #[test]
    fn test_lenient_cultural_flags() {
        let req = ToolRequest::parse(
            ToolKind::CrisisDetection,
            &json!({"action": "create_safety_plan", "cultural_context": {"religious_beliefs": "islam", "family_dynamics": null}}),
        )
        .unwrap();
        match req {
            ToolRequest::Crisis { args, .. } => {
                assert_eq!(args.cultural_context.religious_beliefs, Some(true));
                assert_eq!(args.cultural_context.family_dynamics, None);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_stringified_arguments_and_unknown_function() {
        let call = FunctionCall::new("manage_session", json!("{\"action\":\"start_session\"}"));
        assert_eq!(ToolRequest::from_call(&call).unwrap().action_name(), "start_session");

        let call = FunctionCall::new("play_music", json!({}));
        let err = ToolRequest::from_call(&call).unwrap_err();
        assert!(err.to_string().starts_with("Unknown therapeutic function: play_music."));
    }

    #[test]
    fn test_bad_argument_shape_is_reported() {
        let err = ToolRequest::parse(
            ToolKind::CrisisDetection,
            &json!({"action": "assess_risk", "risk_factors": "isolation"}),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { tool: "crisis_detection", .. }));
    }
}
