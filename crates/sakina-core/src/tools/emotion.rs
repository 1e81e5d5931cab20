//! Emotion detection over text and voice hints, pattern tracking and crisis-level indicators.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use super::request::{EmotionAnalysis, EmotionArgs};
use super::{culturally, mismatched, ClinicalRecord, ToolContext, ToolDefinition, ToolHandler, ToolKind, ToolOutcome, ToolRequest, Tone};
use crate::error::ToolError;
use crate::matchers::emotion::{
    analyze_voice, crisis_emotional_indicators, cultural_signals, emotional_intensity, intensity_word_score,
};
use crate::matchers::detect_text_emotions;

/// Overall intensity at or above this triggers the emergency protocol.
pub const HIGH_INTENSITY: u32 = 8;
/// Number of crisis emotional indicators that counts as severe.
pub const SEVERE_INDICATORS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionSnapshot {
    pub timestamp: DateTime<Utc>,
    pub primary_emotions: Vec<&'static str>,
    pub cultural_markers: Vec<&'static str>,
    pub voice_stress_indicators: Vec<&'static str>,
    pub emotional_intensity: u32,
    /// First 100 characters of the input.
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionalPatterns {
    pub dominant_emotions: Vec<&'static str>,
    pub emotional_progression: &'static str,
    pub cultural_themes: Vec<&'static str>,
    pub intensity_trend: &'static str,
}

impl EmotionalPatterns {
    /// Computed over the last five snapshots.
    pub fn from_history(history: &[EmotionSnapshot]) -> Self {
        let recent = &history[history.len().saturating_sub(5)..];
        Self {
            dominant_emotions: ranked(recent.iter().flat_map(|e| e.primary_emotions.iter().copied())),
            emotional_progression: progression(recent),
            cultural_themes: ranked_with_count(recent.iter().flat_map(|e| e.cultural_markers.iter().copied()))
                .into_iter()
                .filter(|(_, n)| *n > 1)
                .map(|(label, _)| label)
                .collect(),
            intensity_trend: intensity_trend(recent),
        }
    }

    fn recommendations(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.dominant_emotions.contains(&"sadness") {
            out.push("Focus on behavioral activation and mood lifting");
        }
        if self.dominant_emotions.contains(&"anxiety") {
            out.push("Implement anxiety management techniques");
        }
        match self.emotional_progression {
            "intensifying" => out.push("Increase support and monitoring"),
            "improving" => out.push("Reinforce positive progress"),
            _ => {}
        }
        out
    }
}

/// Labels by descending frequency; ties keep first-seen order.
fn ranked_with_count(labels: impl Iterator<Item = &'static str>) -> Vec<(&'static str, usize)> {
    let mut order: Vec<&'static str> = Vec::new();
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for label in labels {
        let n = counts.entry(label).or_insert(0);
        if *n == 0 {
            order.push(label);
        }
        *n += 1;
    }
    let mut out: Vec<(&'static str, usize)> = order
        .into_iter()
        .map(|l| (l, counts.get(l).copied().unwrap_or(0)))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1));
    out
}

fn ranked(labels: impl Iterator<Item = &'static str>) -> Vec<&'static str> {
    ranked_with_count(labels).into_iter().map(|(l, _)| l).collect()
}

fn progression(history: &[EmotionSnapshot]) -> &'static str {
    match (history.first(), history.last()) {
        (Some(first), Some(last)) if history.len() >= 2 => {
            if last.emotional_intensity > first.emotional_intensity {
                "intensifying"
            } else if last.emotional_intensity < first.emotional_intensity {
                "improving"
            } else {
                "stable"
            }
        }
        _ => "stable",
    }
}

fn intensity_trend(history: &[EmotionSnapshot]) -> &'static str {
    if history.len() < 3 {
        return "insufficient_data";
    }
    let last3: Vec<u32> = history[history.len() - 3..].iter().map(|e| e.emotional_intensity).collect();
    if last3.windows(2).all(|w| w[0] < w[1]) {
        "increasing"
    } else if last3.windows(2).all(|w| w[0] > w[1]) {
        "decreasing"
    } else {
        "fluctuating"
    }
}

/// Crisis tier from the number of crisis emotional indicators.
pub fn crisis_tier(indicators: usize) -> &'static str {
    if indicators >= SEVERE_INDICATORS {
        "severe"
    } else if indicators >= 2 {
        "moderate"
    } else {
        "low"
    }
}

fn crisis_actions(tier: &str) -> [&'static str; 4] {
    match tier {
        "severe" => [
            "Activate emergency protocols",
            "Ensure immediate safety",
            "Contact emergency services if needed",
            "Notify emergency contacts",
        ],
        "moderate" => [
            "Implement safety plan",
            "Increase monitoring",
            "Activate support system",
            "Consider professional consultation",
        ],
        _ => [
            "Continue regular support",
            "Monitor for changes",
            "Maintain therapeutic relationship",
            "Document emotional state",
        ],
    }
}

fn intensity_interventions(level: &str) -> [&'static str; 4] {
    match level {
        "high" => [
            "Immediate crisis intervention",
            "Safety planning",
            "Professional referral",
            "Emergency contacts activation",
        ],
        "moderate" => [
            "Enhanced coping techniques",
            "Increased session frequency",
            "Support system activation",
            "Stress reduction techniques",
        ],
        _ => [
            "Standard therapeutic techniques",
            "Regular monitoring",
            "Skill building",
            "Prevention strategies",
        ],
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct EmotionHandler {
    record: ClinicalRecord,
    history: Vec<EmotionSnapshot>,
    current: Option<EmotionSnapshot>,
    patterns: Option<EmotionalPatterns>,
    crisis_analysis: Option<Value>,
}

impl Default for EmotionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionHandler {
    pub fn new() -> Self {
        Self {
            record: ClinicalRecord::new(ToolKind::EmotionalAnalysis),
            history: Vec::new(),
            current: None,
            patterns: None,
            crisis_analysis: None,
        }
    }

    pub fn history(&self) -> &[EmotionSnapshot] {
        &self.history
    }

    pub fn current(&self) -> Option<&EmotionSnapshot> {
        self.current.as_ref()
    }

    fn detect(&mut self, args: &EmotionArgs, religious: bool) -> String {
        let text = args.user_input.as_deref().unwrap_or_default();
        let text_emotions = detect_text_emotions(text);
        let voice = args
            .voice_features
            .as_ref()
            .filter(|v| !v.is_empty())
            .map(analyze_voice);
        let intensity = emotional_intensity(&text_emotions, voice.as_ref());

        let snapshot = EmotionSnapshot {
            timestamp: Utc::now(),
            primary_emotions: text_emotions.primary.clone(),
            cultural_markers: text_emotions.cultural_markers.clone(),
            voice_stress_indicators: voice.as_ref().map(|v| v.stress_indicators.clone()).unwrap_or_default(),
            emotional_intensity: intensity,
            excerpt: text.chars().take(100).collect(),
        };
        self.history.push(snapshot.clone());
        self.current = Some(snapshot.clone());

        let mut implications = Vec::new();
        let primary = &snapshot.primary_emotions;
        if primary.contains(&"sadness") && intensity > 6 {
            implications.push("Consider depression screening");
        }
        if primary.contains(&"anxiety") && intensity > 7 {
            implications.push("Anxiety management techniques needed");
        }
        if primary.len() > 2 {
            implications.push("Complex emotional state, needs careful exploration");
        }
        if intensity > HIGH_INTENSITY {
            implications.push("High intensity requires immediate support");
        }
        let arabic_used = args.cultural_context.arabic_language_used.unwrap_or(false);
        self.record.emit(
            "emotion_analysis",
            json!({
                "detected_emotions": snapshot,
                "voice_indicators": voice,
                "cultural_interpretation": {
                    "cultural_emotional_style": if arabic_used { "expressive" } else { "reserved" },
                    "religious_coping_indicated": !snapshot.cultural_markers.is_empty(),
                    "family_context_important": args.cultural_context.family_context_mentioned.unwrap_or(false),
                    "community_expectations_factor": snapshot.cultural_markers.contains(&"social_pressure"),
                },
                "therapeutic_implications": implications,
            }),
        );

        let Some(main) = primary.first().copied() else {
            return culturally(
                "I'm listening to understand how you're feeling. Please continue sharing with me.",
                Tone::default(),
            );
        };
        let mut reply = match main {
            "sadness" => "I can hear the sadness in your voice. It's completely natural to feel this way.".to_string(),
            "anxiety" => "I notice you're feeling anxious. These worries are understandable.".to_string(),
            "anger" => "I can sense your frustration and anger. These feelings are valid.".to_string(),
            "fear" => "I hear the fear in what you're sharing. It's okay to feel scared.".to_string(),
            other => format!("I can sense that you're feeling {other}. Thank you for sharing this with me."),
        };
        if religious && matches!(main, "sadness" | "fear" | "anxiety") {
            reply.push_str(" Remember that Allah is with you in this difficulty.");
        }
        culturally(reply, Tone::Supportive)
    }

    fn track_patterns(&mut self) -> String {
        if self.history.len() < 2 {
            return culturally(
                "I'm beginning to understand your emotional patterns. \
                 Let's continue our conversation to gain more insights.",
                Tone::default(),
            );
        }
        let patterns = EmotionalPatterns::from_history(&self.history);

        let mut reply = culturally(
            "I'm noticing some patterns in your emotional experience. \
             Understanding these patterns can help us work together more effectively.",
            Tone::default(),
        );
        if let Some(dominant) = patterns.dominant_emotions.first() {
            reply.push_str(&format!("\n\nThe main emotion I'm sensing is {dominant}. "));
            match *dominant {
                "sadness" | "anxiety" | "fear" => reply.push_str("These feelings are completely valid and understandable."),
                "anger" => reply.push_str("It's natural to feel this way, and we can work with these feelings constructively."),
                _ => {}
            }
        }
        match patterns.emotional_progression {
            "improving" => reply.push_str("\n\nI notice your emotional state seems to be gradually improving as we talk."),
            "intensifying" => reply.push_str(
                "\n\nI'm noticing you might be feeling more distressed. Let's focus on some support techniques.",
            ),
            _ => {}
        }
        if !patterns.cultural_themes.is_empty() {
            reply.push_str(&format!(
                "\n\nI also notice themes related to {} in your expressions.",
                patterns.cultural_themes.join(", ")
            ));
        }

        self.record.emit(
            "emotional_patterns",
            json!({"patterns": patterns, "recommendations": patterns.recommendations()}),
        );
        self.patterns = Some(patterns);
        reply
    }

    fn cultural_analysis(&mut self, text: &str) -> String {
        if text.trim().is_empty() {
            return culturally(
                "I'm here to support you. Please share your thoughts and feelings when you're ready.",
                Tone::default(),
            );
        }
        let signals = cultural_signals(text);
        let mut reply = culturally(
            "I appreciate you sharing your feelings in a way that reflects your cultural background. \
             Your cultural values and beliefs are important in how we approach healing.",
            Tone::default(),
        );
        if !signals.religious_expressions.is_empty() {
            reply.push_str("\n\nI notice you draw on your faith for strength. This is a beautiful source of resilience.");
        }
        if signals.family_dynamics_indicated {
            reply.push_str(
                "\n\nFamily connections seem important to your experience. \
                 In our culture, family support is indeed very valuable.",
            );
        }
        if signals.social_expectations_pressure {
            reply.push_str(
                "\n\nI understand there may be social expectations affecting how you feel. \
                 Let's explore how to balance these with your personal wellbeing.",
            );
        }
        self.record.emit(
            "cultural_analysis",
            json!({
                "analysis": signals,
                "cultural_strengths": signals.strengths(),
                "cultural_adaptations_needed": signals.suggested_adaptations(),
            }),
        );
        reply
    }

    fn intensity_assessment(&mut self, args: &EmotionArgs) -> ToolOutcome {
        let text = args.user_input.as_deref().unwrap_or_default();
        if text.trim().is_empty() {
            return ToolOutcome::reply(culturally(
                "I'm listening and ready to support you. Please share what's on your mind.",
                Tone::default(),
            ));
        }
        let text_intensity = intensity_word_score(text);
        let voice_intensity = args
            .voice_features
            .as_ref()
            .and_then(|v| v.intensity_from_voice)
            .unwrap_or(0);
        let total = text_intensity.saturating_add(voice_intensity);
        let level = if total >= HIGH_INTENSITY {
            "high"
        } else if total >= 5 {
            "moderate"
        } else {
            "low"
        };

        let mut outcome = match level {
            "high" => ToolOutcome::reply(culturally(
                "I can hear that you're experiencing very intense feelings right now. \
                 Let's focus on immediate support and safety.",
                Tone::Supportive,
            )),
            "moderate" => ToolOutcome::reply(culturally(
                "You're going through a challenging time with significant emotional intensity. \
                 Let's work together to find ways to manage these feelings.",
                Tone::Supportive,
            )),
            _ => ToolOutcome::reply(culturally(
                "I'm hearing manageable levels of distress. \
                 This is a good space for us to work on understanding and growth.",
                Tone::default(),
            )),
        };
        if level == "high" {
            let data = json!({
                "intensity_level": total,
                "user_input": text.chars().take(50).collect::<String>(),
            });
            self.record
                .trigger_emergency_protocol("High emotional intensity detected", data.clone());
            outcome = outcome.escalate("high_emotional_intensity", data);
        }

        self.record.emit(
            "intensity_assessment",
            json!({
                "intensity_indicators": {
                    "text_intensity": text_intensity,
                    "voice_intensity": voice_intensity,
                    "overall_intensity": total.min(10),
                    "crisis_level": level,
                    "intervention_needed": level == "high",
                },
                "support_level_needed": level,
                "immediate_interventions": intensity_interventions(level),
            }),
        );
        outcome
    }

    fn therapeutic_recommendations(&mut self) -> String {
        let Some(current) = self.current.clone() else {
            return "Let's continue our conversation so I can better understand your emotional needs.".to_string();
        };

        let mut techniques = Vec::new();
        let mut focus = "";
        if current.primary_emotions.contains(&"sadness") {
            techniques.extend([
                "Gentle self-compassion exercises",
                "Behavioral activation planning",
                "Gratitude practice adaptation",
            ]);
            focus = "mood_support_and_activation";
        }
        if current.primary_emotions.contains(&"anxiety") {
            techniques.extend([
                "Grounding techniques",
                "Breathing exercises with dhikr",
                "Worry time scheduling",
            ]);
            focus = "anxiety_management";
        }
        if current.primary_emotions.contains(&"anger") {
            techniques.extend([
                "Anger validation and exploration",
                "Islamic anger management techniques",
                "Assertiveness in cultural context",
            ]);
            focus = "anger_processing";
        }

        let mut adaptations = Vec::new();
        if current.cultural_markers.contains(&"religious_guilt") {
            adaptations.push("Islamic guilt processing");
        }
        if current.cultural_markers.contains(&"family_honor") {
            adaptations.push("Family dynamics exploration");
        }
        if current.cultural_markers.contains(&"social_pressure") {
            adaptations.push("Social expectations balance");
        }

        let follow_up: &[&str] = if current.emotional_intensity >= 7 {
            &[
                "Crisis safety planning",
                "Professional referral consideration",
                "Family support activation",
            ]
        } else if current.emotional_intensity >= 4 {
            &["Regular check-ins", "Coping skills practice", "Progress monitoring"]
        } else {
            &[]
        };

        let mut reply = culturally(
            "Based on what I'm understanding about your emotional experience, \
             here are some approaches that might be helpful for you.",
            Tone::default(),
        );
        if !techniques.is_empty() {
            reply.push_str("\n\nImmediate techniques to try:");
            for t in techniques.iter().take(3) {
                reply.push_str(&format!("\n• {t}"));
            }
        }
        if !adaptations.is_empty() {
            reply.push_str("\n\nCultural considerations:");
            for a in &adaptations {
                reply.push_str(&format!("\n• {a}"));
            }
        }

        self.record.emit(
            "therapeutic_recommendations",
            json!({
                "recommendations": {
                    "immediate_techniques": techniques,
                    "session_focus": focus,
                    "cultural_adaptations": adaptations,
                    "follow_up_priorities": follow_up,
                },
                "emotional_basis": current,
            }),
        );
        reply
    }

    fn crisis_indicators(&mut self, text: &str) -> ToolOutcome {
        if text.trim().is_empty() {
            return ToolOutcome::reply(culturally(
                "I'm here to support you. Please share your thoughts and feelings when you're ready.",
                Tone::default(),
            ));
        }
        let indicators = crisis_emotional_indicators(text);
        let tier = crisis_tier(indicators.len());
        let analysis = json!({
            "indicators": indicators,
            "crisis_score": indicators.len(),
            "crisis_level": tier,
            "timestamp": Utc::now(),
        });
        self.crisis_analysis = Some(analysis);

        let mut outcome = match tier {
            "severe" => ToolOutcome::reply(
                culturally(
                    "I can hear the deep pain you're experiencing right now. \
                     You are not alone, and your life has value and meaning. \
                     Let's focus on your immediate safety and getting you the support you need.",
                    Tone::Supportive,
                ) + "\n\n🚨 If you're having thoughts of hurting yourself, please reach out for immediate help.",
            ),
            "moderate" => ToolOutcome::reply(culturally(
                "I hear that you're going through a very difficult time. \
                 These intense feelings can be overwhelming, but they will not last forever. \
                 Let's work together to find some relief and support.",
                Tone::Supportive,
            )),
            _ => ToolOutcome::reply(culturally(
                "I'm here to listen and support you through whatever you're experiencing. \
                 Your feelings are valid and important.",
                Tone::default(),
            )),
        };
        if tier == "severe" {
            let data = json!({
                "indicators": indicators,
                "user_input": text.chars().take(100).collect::<String>(),
            });
            self.record
                .trigger_emergency_protocol("Multiple crisis emotional indicators detected", data.clone());
            outcome = outcome.escalate("severe_emotional_crisis", data);
        }

        self.record.emit(
            "crisis_emotional_analysis",
            json!({"crisis_level": tier, "indicators": indicators, "immediate_actions": crisis_actions(tier)}),
        );
        outcome
    }
}

#[async_trait::async_trait]
impl ToolHandler for EmotionHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::EmotionalAnalysis
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ToolKind::EmotionalAnalysis.function_name().to_string(),
            description: "Analyze emotional states from speech and text with cultural sensitivity for Gulf Arabic context"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "analysis_type": {"type": "string", "enum": EmotionAnalysis::names()},
                    "user_input": {"type": "string", "description": "User's speech or text input to analyze"},
                    "voice_features": {
                        "type": "object",
                        "properties": {
                            "tone": {"type": "string"},
                            "pace": {"type": "string"},
                            "volume": {"type": "string"},
                            "pitch_variation": {"type": "string"},
                            "intensity_from_voice": {"type": "integer", "minimum": 0, "maximum": 10}
                        }
                    },
                    "cultural_context": {
                        "type": "object",
                        "properties": {
                            "arabic_language_used": {"type": "boolean"},
                            "religious_expressions": {"type": "boolean"},
                            "family_context_mentioned": {"type": "boolean"},
                            "cultural_values_referenced": {"type": "boolean"}
                        }
                    },
                    "session_context": {"type": "object"}
                },
                "required": ["analysis_type", "user_input"]
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
            "emotion_history": self.history,
            "current_emotional_state": self.current,
            "emotional_patterns": self.patterns,
            "crisis_emotional_analysis": self.crisis_analysis,
        })
    }

    async fn execute(
        &mut self,
        request: ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError> {
        let (analysis, args) = match request {
            ToolRequest::Emotion { analysis, args } => (analysis, args),
            other => return Err(mismatched(ToolKind::EmotionalAnalysis, &other)),
        };
        let text = args.user_input.clone().unwrap_or_default();
        let religious = args
            .cultural_context
            .religious_expressions
            .unwrap_or_else(|| ctx.cultural.religious());

        self.record.log_action(
            format!("emotional_analysis_{}", analysis.as_str()),
            json!({
                "user_input_length": text.chars().count(),
                "voice_features": args.voice_features,
                "cultural_context": args.cultural_context,
                "session_context": args.session_context,
            }),
        );

        Ok(match analysis {
            EmotionAnalysis::DetectEmotions => ToolOutcome::reply(self.detect(&args, religious)),
            EmotionAnalysis::TrackPatterns => ToolOutcome::reply(self.track_patterns()),
            EmotionAnalysis::CulturalContextAnalysis => ToolOutcome::reply(self.cultural_analysis(&text)),
            EmotionAnalysis::EmotionalIntensityAssessment => self.intensity_assessment(&args),
            EmotionAnalysis::TherapeuticRecommendations => ToolOutcome::reply(self.therapeutic_recommendations()),
            EmotionAnalysis::CrisisEmotionalIndicators => self.crisis_indicators(&text),
        })
    }
}
