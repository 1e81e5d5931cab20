//! CBT techniques with optional Islamic integration.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use super::request::{CbtArgs, CbtTechnique};
use super::{culturally, mismatched, ClinicalRecord, ToolContext, ToolDefinition, ToolHandler, ToolKind, ToolOutcome, ToolRequest, Tone};
use crate::error::ToolError;
use crate::matchers::{detect_distortions, islamic_concept_for};

const EMPTY_THOUGHTS: &str =
    "I'm here to help you work through your thoughts. Please share what's on your mind when you're ready.";
const DEFAULT_BEHAVIOR: &str = "a small positive activity";

const ISLAMIC_QUESTIONS: [&str; 4] = [
    "Is this thought aligned with having good thoughts about Allah's wisdom?",
    "Am I being too harsh on myself when Allah is Oft-Forgiving?",
    "How would Prophet Muhammad (PBUH) view this situation?",
    "What would I advise a fellow Muslim facing this thought?",
];

const SECULAR_QUESTIONS: [&str; 4] = [
    "What evidence do I have that this thought is true?",
    "What evidence do I have that contradicts this thought?",
    "What would I tell a good friend having this thought?",
    "How might I think about this situation in 5 years?",
];

const SPIRITUAL: [&str; 4] = ["Prayer and dhikr", "Reading Quran", "Visiting mosque", "Islamic study circles"];
const SOCIAL: [&str; 4] = ["Family gatherings", "Visiting relatives", "Community service", "Friend meetups"];
const PHYSICAL: [&str; 4] = ["Walking in nature", "Swimming", "Traditional sports", "Gentle exercise"];
const CREATIVE: [&str; 4] = ["Arabic calligraphy", "Traditional crafts", "Cooking traditional food", "Poetry writing"];

const GROUNDING_STEPS: [&str; 5] = [
    "5 things you can see around you",
    "4 things you can touch or feel",
    "3 things you can hear",
    "2 things you can smell",
    "1 thing you can taste",
];

const ISLAMIC_GROUNDING: [&str; 5] = [
    "Recite 'La hawla wa la quwwata illa billah' (There is no power except with Allah)",
    "Take deep breaths while saying 'SubhanAllah' (Glory be to Allah)",
    "Place your hand on your heart and feel Allah's creation working within you",
    "Look around and say 'Alhamdulillahi rabbil alameen' for what you can see",
    "Remember that Allah is with you: 'And He is with you wherever you are' (57:4)",
];

const ISLAMIC_GRATITUDE: [&str; 5] = [
    "What blessings from Allah are you grateful for today?",
    "Which of your senses allowed you to experience beauty today?",
    "What act of kindness did you witness or receive?",
    "How did Allah make things easy for you today?",
    "What in your faith brings you comfort?",
];

const GENERAL_GRATITUDE: [&str; 5] = [
    "What three things went well today?",
    "Who in your life are you grateful for?",
    "What ability or skill are you thankful for?",
    "What in nature brought you peace today?",
    "What small pleasure did you enjoy today?",
];

/// Five graded steps toward `behavior`.
pub fn small_steps(behavior: &str) -> Vec<String> {
    vec![
        format!("Plan when to do: {behavior}"),
        format!("Prepare what you need for: {behavior}"),
        format!("Start with 5-10 minutes of: {behavior}"),
        format!("Complete the full: {behavior}"),
        format!("Reflect on the experience of: {behavior}"),
    ]
}

// ---------------------------------------------------------------------------
// Mood monitoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoodTier {
    pub description: &'static str,
    pub arabic: &'static str,
    pub encouragement: &'static str,
}

/// 1–3 very low, 4–5 low to moderate, 6–7 moderate, 8–10 good.
pub fn mood_tier(rating: i64) -> MoodTier {
    match rating {
        i64::MIN..=3 => MoodTier {
            description: "very low",
            arabic: "منخفض جداً",
            encouragement: "This is a difficult time, but feelings change. You're taking a positive step by monitoring your mood.",
        },
        4..=5 => MoodTier {
            description: "low to moderate",
            arabic: "منخفض إلى متوسط",
            encouragement: "Your awareness of your mood is a strength. Small improvements are possible.",
        },
        6..=7 => MoodTier {
            description: "moderate",
            arabic: "متوسط",
            encouragement: "This is a manageable level. Let's work on techniques to improve further.",
        },
        _ => MoodTier {
            description: "good",
            arabic: "جيد",
            encouragement: "This is a positive mood level. Let's identify what's helping you feel this way.",
        },
    }
}

fn mood_recommendations(rating: i64) -> [&'static str; 4] {
    if rating <= 3 {
        [
            "Consider crisis support if needed",
            "Practice grounding techniques",
            "Reach out to a trusted person",
            "Focus on basic self-care",
        ]
    } else if rating <= 5 {
        [
            "Try a pleasant activity",
            "Practice gratitude",
            "Get some gentle movement",
            "Connect with others",
        ]
    } else {
        [
            "Maintain current positive activities",
            "Set small goals for growth",
            "Help others if possible",
            "Practice mindfulness",
        ]
    }
}

/// Compares the first and last of the most recent five ratings.
pub fn mood_trend(ratings: &[i64]) -> &'static str {
    if ratings.len() < 2 {
        return "insufficient_data";
    }
    let recent = &ratings[ratings.len().saturating_sub(5)..];
    match (recent.first(), recent.last()) {
        (Some(first), Some(last)) if last > first => "improving",
        (Some(first), Some(last)) if last < first => "declining",
        _ => "stable",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodEntry {
    pub rating: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThoughtRecord {
    pub automatic_thought: String,
    pub emotion: String,
    pub evidence_for: Vec<String>,
    pub evidence_against: Vec<String>,
    pub balanced_thought: String,
    pub cultural_reframe: String,
    pub cultural_questions: Vec<&'static str>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehavioralPlan {
    pub kind: &'static str,
    pub target_behavior: String,
    pub steps: Vec<String>,
    pub activities: Vec<&'static str>,
    pub safety_measures: Vec<&'static str>,
    pub cultural_considerations: Vec<&'static str>,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CbtHandler {
    record: ClinicalRecord,
    thought_records: Vec<ThoughtRecord>,
    mood_logs: Vec<MoodEntry>,
    behavioral_plans: Vec<BehavioralPlan>,
    active_techniques: Vec<CbtTechnique>,
}

impl Default for CbtHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CbtHandler {
    pub fn new() -> Self {
        Self {
            record: ClinicalRecord::new(ToolKind::CbtTechniques),
            thought_records: Vec::new(),
            mood_logs: Vec::new(),
            behavioral_plans: Vec::new(),
            active_techniques: Vec::new(),
        }
    }

    pub fn mood_logs(&self) -> &[MoodEntry] {
        &self.mood_logs
    }

    pub fn behavioral_plans(&self) -> &[BehavioralPlan] {
        &self.behavioral_plans
    }

    pub fn thought_records(&self) -> &[ThoughtRecord] {
        &self.thought_records
    }

    fn thought_challenging(&mut self, thoughts: &str, args: &CbtArgs, religious: bool) -> String {
        let questions = if religious { ISLAMIC_QUESTIONS } else { SECULAR_QUESTIONS };

        let mut reply = culturally(
            "Let's examine this thought together using a structured approach. \
             Sometimes our minds create thoughts that aren't completely accurate or helpful.",
            Tone::Supportive,
        );
        if !thoughts.is_empty() {
            reply.push_str(&format!("\n\nYour thought: '{thoughts}'"));
        }
        reply.push_str("\n\nLet's explore this thought by asking:");
        push_numbered(&mut reply, questions.iter());
        if religious {
            reply.push_str(
                "\n\nRemember the hadith: 'No fatigue, nor disease, nor sorrow, nor sadness, nor hurt \
                 befalls a Muslim, not even a prick from a thorn, except that Allah removes his sins \
                 thereby.' Your struggles have meaning and purpose.",
            );
        }

        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let record = ThoughtRecord {
            automatic_thought: thoughts.to_string(),
            emotion: text(&args.emotion),
            evidence_for: args.evidence_for.clone(),
            evidence_against: args.evidence_against.clone(),
            balanced_thought: text(&args.balanced_thought),
            cultural_reframe: text(&args.cultural_reframe),
            cultural_questions: questions.to_vec(),
            timestamp: Utc::now(),
        };
        self.record.emit(
            "thought_challenging_worksheet",
            json!({"thought_record": record, "questions": questions}),
        );
        self.thought_records.push(record);
        reply
    }

    fn behavioral_activation(&mut self, behavior: &str, religious: bool) -> String {
        let activities: Vec<&'static str> = if religious {
            SPIRITUAL.iter().chain(SOCIAL.iter()).copied().take(5).collect()
        } else {
            PHYSICAL.iter().chain(CREATIVE.iter()).copied().take(5).collect()
        };
        let plan = BehavioralPlan {
            kind: "activation",
            target_behavior: behavior.to_string(),
            steps: small_steps(behavior),
            activities: activities.clone(),
            safety_measures: Vec::new(),
            cultural_considerations: Vec::new(),
        };

        let mut reply = culturally(
            "Let's work on increasing positive activities in your life. \
             When we're feeling low, we often stop doing things that bring us joy and meaning.",
            Tone::Encouraging,
        );
        reply.push_str(&format!("\n\nTarget behavior: {behavior}"));
        reply.push_str("\n\nLet's break this down into small, manageable steps:");
        push_numbered(&mut reply, plan.steps.iter());
        reply.push_str("\n\nPleasant activities to try:");
        for activity in activities.iter().take(3) {
            reply.push_str(&format!("\n• {activity}"));
        }
        if religious {
            reply.push_str(
                "\n\nRemember: 'And whoever relies upon Allah, then He is sufficient for him. Indeed, \
                 Allah will accomplish His purpose.' (Quran 65:3). Take one step at a time with trust in Allah.",
            );
        }

        self.record.emit(
            "behavioral_activation_plan",
            json!({"activity_plan": plan, "cultural_activities": activities}),
        );
        self.behavioral_plans.push(plan);
        reply
    }

    fn mood_monitoring(&mut self, rating: Option<i64>) -> String {
        let rating = rating.unwrap_or(5).clamp(1, 10);
        let entry = MoodEntry {
            rating,
            timestamp: Utc::now(),
        };
        self.mood_logs.push(entry.clone());
        let tier = mood_tier(rating);
        let ratings: Vec<i64> = self.mood_logs.iter().map(|m| m.rating).collect();
        let trend = mood_trend(&ratings);

        let mut reply = format!(
            "Your current mood rating: {rating}/10 ({} / {})",
            tier.description, tier.arabic
        );
        reply.push_str(&format!("\n\n{}", tier.encouragement));
        reply.push_str("\n\nMood tracking helps us:");
        reply.push_str("\n• Identify patterns and triggers");
        reply.push_str("\n• Recognize what activities improve mood");
        reply.push_str("\n• See progress over time");
        reply.push_str("\n• Make informed decisions about self-care");

        self.record.emit(
            "mood_log_entry",
            json!({
                "mood_entry": entry,
                "mood_trend": trend,
                "recommendations": mood_recommendations(rating),
            }),
        );
        culturally(reply, Tone::default())
    }

    fn cognitive_restructuring(&mut self, thoughts: &str, religious: bool) -> String {
        if thoughts.trim().is_empty() {
            return culturally(EMPTY_THOUGHTS, Tone::default());
        }
        let distortions = detect_distortions(thoughts);

        let mut reply = culturally(
            "Let's restructure this thought to make it more balanced and helpful. \
             Our thoughts greatly influence how we feel and behave.",
            Tone::Supportive,
        );
        if !distortions.is_empty() {
            reply.push_str("\n\nI notice some thinking patterns that might be making you feel worse:");
            for d in &distortions {
                reply.push_str(&format!("\n• {} ({}): {}", d.english, d.arabic, d.description));
            }
        }

        let mut questions = vec![
            "What's a more balanced way to think about this?",
            "What evidence supports and challenges this thought?",
            "What would you tell a friend in this situation?",
            "How might this situation teach you something valuable?",
        ];
        if religious {
            questions.push("How might this challenge be a test that strengthens your faith?");
            questions.push("What duas or verses might bring comfort in this situation?");
        }
        reply.push_str("\n\nLet's work through these questions:");
        push_numbered(&mut reply, questions.iter());

        self.record.emit(
            "cognitive_restructuring_worksheet",
            json!({
                "original_thought": thoughts,
                "detected_distortions": distortions.iter().map(|d| d.key).collect::<Vec<_>>(),
                "restructuring_questions": questions,
            }),
        );
        reply
    }

    fn grounding(&mut self, religious: bool) -> String {
        let steps = if religious { ISLAMIC_GROUNDING } else { GROUNDING_STEPS };
        let mut reply = culturally(
            "Let's use a grounding technique to help you feel more present and calm. \
             This will help bring you back to the here and now.",
            Tone::Supportive,
        );
        reply.push_str("\n\nLet's do this together. Take your time with each step:");
        push_numbered(&mut reply, steps.iter());
        reply.push_str("\n\nTake slow, deep breaths between each step. There's no rush.");
        if religious {
            reply.push_str("\n\nRemember: 'And whoever fears Allah, He will make for him a way out.' (Quran 65:2)");
        }
        self.record.emit(
            "grounding_exercise",
            json!({"technique_type": if religious { "islamic" } else { "secular" }, "steps": steps}),
        );
        reply
    }

    fn islamic_cbt(&mut self, thoughts: &str) -> String {
        if thoughts.trim().is_empty() {
            return culturally(EMPTY_THOUGHTS, Tone::default());
        }
        let concept = islamic_concept_for(thoughts);
        let name = concept.as_str();

        let mut reply = culturally(
            "Let's look at this situation through the lens of Islamic wisdom and modern psychology. \
             Islam provides us with powerful tools for mental and spiritual wellbeing.",
            Tone::default(),
        );
        reply.push_str(&format!(
            "\n\nThe Islamic concept that applies here is **{}**:",
            name.to_uppercase()
        ));
        reply.push_str(&format!("\n• Meaning: {}", concept.meaning()));
        reply.push_str(&format!("\n• Application: {}", concept.application()));
        reply.push_str(&format!("\n• Quranic guidance: {}", concept.verse()));
        reply.push_str("\n\nHow can we apply this to your situation?");
        reply.push_str("\n1. Acknowledge your feelings as valid; Islam recognizes human emotions");
        reply.push_str(&format!("\n2. Apply the principle of {name} to find peace"));
        reply.push_str("\n3. Take positive action while trusting in Allah's wisdom");
        reply.push_str("\n4. Remember that trials are opportunities for spiritual growth");
        reply.push_str("\n\nDua for relief: 'اللهم لا سهل إلا ما جعلته سهلاً وأنت تجعل الحزن إذا شئت سهلاً'");
        reply.push_str(
            "\n(O Allah, nothing is easy except what You make easy, and You make the difficult easy if You wish.)",
        );

        self.record.emit(
            "islamic_cbt_guidance",
            json!({
                "concept": concept,
                "concept_info": {
                    "concept": concept.meaning(),
                    "application": concept.application(),
                    "verse": concept.verse(),
                },
                "practical_steps": [
                    "Make dua for guidance and ease",
                    "Apply the Islamic principle practically",
                    "Take positive action",
                    "Trust in Allah's wisdom",
                ],
            }),
        );
        reply
    }

    fn gratitude(&mut self, religious: bool) -> String {
        let prompts = if religious { ISLAMIC_GRATITUDE } else { GENERAL_GRATITUDE };
        let mut reply = culturally(
            "Gratitude practice is a powerful tool for improving mood and perspective. \
             Let's focus on the positive aspects of your life, no matter how small.",
            Tone::Encouraging,
        );
        if religious {
            reply.push_str("\n\nThe Quran says: 'If you are grateful, I will certainly give you more.' (14:7)");
            reply.push_str("\nGratitude (Shukr) is both a practice and a way of seeing Allah's blessings.");
        }
        reply.push_str("\n\nTake a moment to reflect on these questions:");
        push_numbered(&mut reply, prompts.iter().take(3));
        reply.push_str("\n\nTry to be specific and really feel the gratitude as you think of each answer.");
        if religious {
            reply.push_str("\n\nEnd with: 'الحمد لله رب العالمين' (All praise belongs to Allah, Lord of the worlds)");
        }
        self.record.emit(
            "gratitude_practice",
            json!({"prompts": prompts, "cultural_type": if religious { "islamic" } else { "general" }}),
        );
        reply
    }

    fn behavioral_experiment(&mut self, behavior: &str, religious: bool, family: bool) -> String {
        let mut considerations = Vec::new();
        let mut safety_measures = Vec::new();
        if family {
            considerations.push("Include family support where appropriate");
        }
        if religious {
            considerations.push("Begin with Bismillah and make dua for success");
            safety_measures.push("Ensure actions align with Islamic values");
        }
        let plan = BehavioralPlan {
            kind: "experiment",
            target_behavior: behavior.to_string(),
            steps: small_steps(behavior),
            activities: Vec::new(),
            safety_measures,
            cultural_considerations: considerations,
        };
        let hypothesis = format!("What will happen if I {behavior}?");

        let mut reply = culturally(
            "Let's design a behavioral experiment to test your assumptions about this behavior. \
             Often our fears about doing something are worse than the reality.",
            Tone::Encouraging,
        );
        reply.push_str(&format!("\n\nExperiment: {hypothesis}"));
        reply.push_str("\n\nSteps to try:");
        push_numbered(&mut reply, plan.steps.iter());
        reply.push_str("\n\nWhat to observe:");
        reply.push_str("\n• How did you feel before, during, and after?");
        reply.push_str("\n• What actually happened vs. what you expected?");
        reply.push_str("\n• What did you learn about yourself?");
        reply.push_str("\n• How might this apply to similar situations?");

        self.record.emit(
            "behavioral_experiment",
            json!({"experiment": plan, "hypothesis": hypothesis, "tracking_form": true}),
        );
        self.behavioral_plans.push(plan);
        reply
    }
}

fn push_numbered<I, S>(out: &mut String, items: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for (i, item) in items.into_iter().enumerate() {
        out.push_str(&format!("\n{}. {}", i + 1, item.as_ref()));
    }
}

#[async_trait::async_trait]
impl ToolHandler for CbtHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::CbtTechniques
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ToolKind::CbtTechniques.function_name().to_string(),
            description: "Apply Cognitive Behavioral Therapy techniques adapted for Arabic/Islamic cultural context"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "technique": {"type": "string", "enum": CbtTechnique::names(), "description": "CBT technique to apply"},
                    "user_thoughts": {"type": "string", "description": "User's current negative thoughts or concerns"},
                    "target_behavior": {"type": "string", "description": "Behavior to address or activate"},
                    "mood_rating": {"type": "integer", "minimum": 1, "maximum": 10},
                    "emotion": {"type": "string", "description": "Emotion attached to the thought"},
                    "evidence_for": {"type": "array", "items": {"type": "string"}},
                    "evidence_against": {"type": "array", "items": {"type": "string"}},
                    "balanced_thought": {"type": "string"},
                    "cultural_reframe": {"type": "string"},
                    "cultural_context": {
                        "type": "object",
                        "properties": {
                            "religious_integration": {"type": "boolean"},
                            "family_involvement": {"type": "boolean"},
                            "arabic_preferred": {"type": "boolean"}
                        }
                    },
                    "session_goals": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["technique"]
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
        let ratings: Vec<i64> = self.mood_logs.iter().map(|m| m.rating).collect();
        json!({
            "active_techniques": self.active_techniques,
            "thought_records": self.thought_records,
            "mood_logs": self.mood_logs,
            "mood_trend": mood_trend(&ratings),
            "behavioral_plans": self.behavioral_plans,
        })
    }

    async fn execute(
        &mut self,
        request: ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError> {
        let (technique, args) = match request {
            ToolRequest::Cbt { technique, args } => (technique, args),
            other => return Err(mismatched(ToolKind::CbtTechniques, &other)),
        };

        let thoughts = args.user_thoughts.as_deref().unwrap_or_default();
        let behavior = args
            .target_behavior
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(DEFAULT_BEHAVIOR);
        let religious = args
            .cultural_context
            .religious_integration
            .unwrap_or_else(|| ctx.cultural.religious());
        let family = args
            .cultural_context
            .family_involvement
            .unwrap_or_else(|| ctx.cultural.family_involvement());

        self.record.log_action(
            format!("cbt_{}", technique.as_str()),
            json!({
                "user_thoughts_length": thoughts.chars().count(),
                "target_behavior": behavior,
                "mood_rating": args.mood_rating,
                "cultural_adaptations": args.cultural_context,
                "session_goals": args.session_goals,
            }),
        );
        self.active_techniques.push(technique);

        let reply = match technique {
            CbtTechnique::ThoughtChallenging => self.thought_challenging(thoughts, &args, religious),
            CbtTechnique::BehavioralActivation => self.behavioral_activation(behavior, religious),
            CbtTechnique::MoodMonitoring => self.mood_monitoring(args.mood_rating),
            CbtTechnique::CognitiveRestructuring => self.cognitive_restructuring(thoughts, religious),
            CbtTechnique::GroundingTechniques => self.grounding(religious),
            CbtTechnique::IslamicCbtIntegration => self.islamic_cbt(thoughts),
            CbtTechnique::GratitudePractice => self.gratitude(religious),
            CbtTechnique::BehavioralExperiment => self.behavioral_experiment(behavior, religious, family),
        };
        Ok(ToolOutcome::reply(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CulturalContext;

    async fn run(handler: &mut CbtHandler, technique: CbtTechnique, args: CbtArgs) -> String {
        let cultural = CulturalContext::new();
        let ctx = ToolContext::new(&cultural);
        handler
            .execute(ToolRequest::Cbt { technique, args }, &ctx)
            .await
            .unwrap()
            .reply
    }

    #[test]
    fn test_mood_tier_boundaries() {
        assert_eq!(mood_tier(3).description, "very low");
        assert_eq!(mood_tier(4).description, "low to moderate");
        assert_eq!(mood_tier(5).description, "low to moderate");
        assert_eq!(mood_tier(6).description, "moderate");
        assert_eq!(mood_tier(7).description, "moderate");
        assert_eq!(mood_tier(8).description, "good");
        assert_eq!(mood_tier(10).description, "good");
    }

    #[test]
    fn test_mood_trend_uses_last_five() {
        assert_eq!(mood_trend(&[4]), "insufficient_data");
        assert_eq!(mood_trend(&[4, 6]), "improving");
        assert_eq!(mood_trend(&[9, 1, 2, 3, 4, 5]), "improving");
        assert_eq!(mood_trend(&[5, 8, 2, 5]), "stable");
        assert_eq!(mood_trend(&[7, 3]), "declining");
    }

    #[tokio::test]
    async fn test_mood_rating_clamped_and_logged() {
        let mut handler = CbtHandler::new();
        let args = CbtArgs {
            mood_rating: Some(42),
            ..Default::default()
        };
        let reply = run(&mut handler, CbtTechnique::MoodMonitoring, args).await;
        assert!(reply.contains("10/10 (good / جيد)"));
        assert_eq!(handler.mood_logs().len(), 1);
        assert_eq!(handler.mood_logs()[0].rating, 10);
    }

    #[tokio::test]
    async fn test_activation_and_experiment_produce_five_steps() {
        let mut handler = CbtHandler::new();
        let args = CbtArgs {
            target_behavior: Some("call my sister".into()),
            ..Default::default()
        };
        let reply = run(&mut handler, CbtTechnique::BehavioralActivation, args.clone()).await;
        assert!(reply.contains("1. Plan when to do: call my sister"));
        assert!(reply.contains("5. Reflect on the experience of: call my sister"));

        let reply = run(&mut handler, CbtTechnique::BehavioralExperiment, args).await;
        assert!(reply.contains("Experiment: What will happen if I call my sister?"));
        assert!(handler.behavioral_plans().iter().all(|p| p.steps.len() == 5));
    }

    #[tokio::test]
    async fn test_thought_record_keeps_evidence() {
        let mut handler = CbtHandler::new();
        let request = ToolRequest::parse(
            ToolKind::CbtTechniques,
            &json!({
                "technique": "thought_challenging",
                "user_thoughts": "Everyone thinks I'm a failure",
                "emotion": "shame",
                "evidence_for": ["I missed the deadline"],
                "evidence_against": "My manager praised my last report",
                "balanced_thought": "One late task doesn't define me",
            }),
        )
        .unwrap();
        let cultural = CulturalContext::new();
        handler.execute(request, &ToolContext::new(&cultural)).await.unwrap();

        let record = &handler.thought_records()[0];
        assert_eq!(record.automatic_thought, "Everyone thinks I'm a failure");
        assert_eq!(record.emotion, "shame");
        assert_eq!(record.evidence_for, vec!["I missed the deadline"]);
        assert_eq!(record.evidence_against, vec!["My manager praised my last report"]);
        assert_eq!(record.balanced_thought, "One late task doesn't define me");
        assert_eq!(record.cultural_reframe, "");

        let documented = serde_json::to_value(record).unwrap();
        for field in ["emotion", "evidence_for", "evidence_against", "balanced_thought", "cultural_reframe"] {
            assert!(documented.get(field).is_some(), "missing {field}");
        }
    }

    #[tokio::test]
    async fn test_religious_experiment_carries_safety_measure() {
        let mut handler = CbtHandler::new();
        let mut args = CbtArgs {
            target_behavior: Some("speak at the family gathering".into()),
            ..Default::default()
        };
        args.cultural_context.religious_integration = Some(true);
        run(&mut handler, CbtTechnique::BehavioralExperiment, args).await;

        let plan = &handler.behavioral_plans()[0];
        assert_eq!(plan.safety_measures, vec!["Ensure actions align with Islamic values"]);
        assert!(plan.cultural_considerations.contains(&"Begin with Bismillah and make dua for success"));

        run(&mut handler, CbtTechnique::BehavioralExperiment, CbtArgs::default()).await;
        assert!(handler.behavioral_plans()[1].safety_measures.is_empty());
    }

    #[tokio::test]
    async fn test_restructuring_names_distortions() {
        let mut handler = CbtHandler::new();
        let args = CbtArgs {
            user_thoughts: Some("I always fail, it's a disaster".into()),
            ..Default::default()
        };
        let reply = run(&mut handler, CbtTechnique::CognitiveRestructuring, args).await;
        assert!(reply.contains("All-or-nothing thinking (التفكير بالأبيض والأسود)"));
        assert!(reply.contains("Catastrophizing"));
        assert!(reply.contains("4. How might this situation teach you something valuable?"));

        let reply = run(&mut handler, CbtTechnique::CognitiveRestructuring, CbtArgs::default()).await;
        assert!(reply.ends_with(EMPTY_THOUGHTS));
    }

    #[tokio::test]
    async fn test_session_religious_context_applies_when_args_silent() {
        let cultural = CulturalContext::new().with("religious_integration", true);
        let ctx = ToolContext::new(&cultural);
        let mut handler = CbtHandler::new();
        let out = handler
            .execute(
                ToolRequest::Cbt {
                    technique: CbtTechnique::ThoughtChallenging,
                    args: CbtArgs::default(),
                },
                &ctx,
            )
            .await
            .unwrap();
        assert!(out.reply.contains(ISLAMIC_QUESTIONS[0]));

        // explicit false wins over the session default
        let mut args = CbtArgs::default();
        args.cultural_context.religious_integration = Some(false);
        let out = handler
            .execute(ToolRequest::Cbt { technique: CbtTechnique::GroundingTechniques, args }, &ctx)
            .await
            .unwrap();
        assert!(out.reply.contains(GROUNDING_STEPS[0]));
    }

    #[tokio::test]
    async fn test_islamic_cbt_picks_concept() {
        let mut handler = CbtHandler::new();
        let args = CbtArgs {
            user_thoughts: Some("everything is so hard lately".into()),
            ..Default::default()
        };
        let reply = run(&mut handler, CbtTechnique::IslamicCbtIntegration, args).await;
        assert!(reply.contains("**SABR**"));
    }
}
