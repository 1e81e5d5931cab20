//! Emotion vocabulary: Arabic and English emotion terms, cultural markers,
//! voice-feature hints and intensity cues.

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{compile_table, contains_any, count_matches, matching_labels, PatternTable};

const ARABIC_EMOTIONS: &[(&str, &[&str])] = &[
    ("sadness", &["حزين", "مكتئب", "زعلان", "مهموم", "مغموم"]),
    ("anxiety", &["قلقان", "متوتر", "خايف", "مرتبك", "مضطرب"]),
    ("anger", &["غاضب", "زعلان", "متضايق", "غضبان", "مستاء"]),
    ("happiness", &["فرحان", "مبسوط", "سعيد", "مسرور", "راضي"]),
    ("fear", &["خايف", "مرعوب", "متخوف", "قلقان", "مهووس"]),
    ("shame", &["خجلان", "محرج", "مكسوف", "نادم", "أسف"]),
    ("guilt", &["مذنب", "نادم", "أسف", "محرج", "مكسوف"]),
    ("hope", &["متفائل", "راجي", "متوقع خير", "متطلع", "آمل"]),
];

const CULTURAL_MARKERS: &[(&str, &[&str])] = &[
    ("family_honor", &["عيب", "حرام", "سمعة", "شرف", "كرامة"]),
    ("religious_guilt", &["ذنب", "حرام", "معصية", "تقصير", "استغفار"]),
    ("social_pressure", &["ناس", "مجتمع", "أهل", "عائلة", "أقارب"]),
    ("spiritual_comfort", &["الله", "دعاء", "صبر", "تسليم", "قدر"]),
];

static ENGLISH_EMOTIONS: Lazy<PatternTable> = Lazy::new(|| {
    compile_table(&[
        ("sadness", &[r"(?i)\b(sad|depressed|down|blue|melancholy|heartbroken)\b"]),
        ("anxiety", &[r"(?i)\b(anxious|worried|nervous|stressed|tense|panic)\b"]),
        ("anger", &[r"(?i)\b(angry|mad|furious|irritated|annoyed|rage)\b"]),
        ("happiness", &[r"(?i)\b(happy|joyful|excited|elated|cheerful|content)\b"]),
        ("fear", &[r"(?i)\b(scared|afraid|terrified|frightened|fearful)\b"]),
        ("shame", &[r"(?i)\b(ashamed|embarrassed|humiliated|disgrace)\b"]),
        ("guilt", &[r"(?i)\b(guilty|remorse|regret|sorry|fault)\b"]),
        ("hope", &[r"(?i)\b(hopeful|optimistic|confident|positive|encouraged)\b"]),
    ])
});

static CRISIS_EMOTIONAL_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    compile_table(&[
        (
            "hopelessness",
            &[
                r"(?i)\b(no\s+hope|hopeless|pointless|no\s+future|give\s+up)\b",
                r"لا\s+أمل|يائس|لا\s+فائدة|لا\s+مستقبل|استسلم",
            ],
        ),
        (
            "worthlessness",
            &[
                r"(?i)\b(worthless|useless|burden|no\s+value|waste)\b",
                r"لا\s+قيمة|عديم\s+الفائدة|عبء|لا\s+أستحق",
            ],
        ),
        (
            "overwhelming_pain",
            &[
                r"(?i)\b(unbearable|can't\s+take|too\s+much|overwhelming)\b",
                r"لا\s+أحتمل|أكثر\s+من\s+طاقتي|لا\s+أستطيع|مدمر",
            ],
        ),
        (
            "isolation",
            &[
                r"(?i)\b(all\s+alone|nobody\s+cares|no\s+one|isolated)\b",
                r"وحيد|لا\s+يهتم\s+أحد|لا\s+أحد|معزول",
            ],
        ),
    ])
});

pub const HIGH_INTENSITY_WORDS: &[&str] = &[
    "unbearable", "can't take it", "overwhelming", "desperate", "hopeless",
    "لا أستطيع", "محتمل", "مدمر", "يائس", "محطم",
];

pub const MODERATE_INTENSITY_WORDS: &[&str] = &[
    "difficult", "hard", "struggling", "stressed", "worried",
    "صعب", "متعب", "قلقان", "مرهق", "متوتر",
];

/// Emotions and cultural markers found in free text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextEmotions {
    /// At most three, de-duplicated, in detection order (Arabic terms first).
    pub primary: Vec<&'static str>,
    pub cultural_markers: Vec<&'static str>,
}

pub fn detect_text_emotions(text: &str) -> TextEmotions {
    if text.trim().is_empty() {
        return TextEmotions::default();
    }
    let mut primary: Vec<&'static str> = ARABIC_EMOTIONS
        .iter()
        .filter(|(_, terms)| contains_any(text, terms))
        .map(|(label, _)| *label)
        .collect();
    for label in matching_labels(&ENGLISH_EMOTIONS, text) {
        if !primary.contains(&label) {
            primary.push(label);
        }
    }
    primary.truncate(3);

    let cultural_markers = CULTURAL_MARKERS
        .iter()
        .filter(|(_, terms)| contains_any(text, terms))
        .map(|(label, _)| *label)
        .collect();

    TextEmotions {
        primary,
        cultural_markers,
    }
}

/// Optional voice characteristics supplied alongside a transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceFeatures {
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub pace: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    /// Accepted from the model but not scored.
    #[serde(default)]
    pub pitch_variation: Option<String>,
    #[serde(default)]
    pub cultural_expressions: bool,
    /// Pre-computed voice intensity from an upstream analyzer, if any.
    /// Clamped to `0..=VOICE_INTENSITY_MAX` on decode.
    #[serde(default, deserialize_with = "clamped_intensity")]
    pub intensity_from_voice: Option<u32>,
}

pub const VOICE_INTENSITY_MAX: u32 = 10;

/// Any JSON number or numeric string, clamped to the voice scale.
fn clamped_intensity<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(raw
        .filter(|f| f.is_finite())
        .map(|f| f.round().clamp(0.0, VOICE_INTENSITY_MAX as f64) as u32))
}

impl VoiceFeatures {
    pub fn is_empty(&self) -> bool {
        self.tone.is_none()
            && self.pace.is_none()
            && self.volume.is_none()
            && self.pitch_variation.is_none()
            && !self.cultural_expressions
            && self.intensity_from_voice.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoiceEmotions {
    pub tone_emotion: &'static str,
    pub intensity_from_voice: u32,
    pub stress_indicators: Vec<&'static str>,
    pub cultural_voice_patterns: Vec<&'static str>,
}

fn lowered(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().trim().to_lowercase()
}

pub fn analyze_voice(features: &VoiceFeatures) -> VoiceEmotions {
    let mut out = VoiceEmotions {
        tone_emotion: "neutral",
        ..Default::default()
    };

    match lowered(&features.tone).as_str() {
        "low" | "flat" | "monotone" => {
            out.tone_emotion = "sadness";
            out.intensity_from_voice += 2;
        }
        "high" | "tense" | "strained" => {
            out.tone_emotion = "anxiety";
            out.intensity_from_voice += 3;
        }
        "harsh" | "sharp" | "aggressive" => {
            out.tone_emotion = "anger";
            out.intensity_from_voice += 3;
        }
        _ => {}
    }

    match lowered(&features.pace).as_str() {
        "fast" | "rapid" | "rushed" => {
            out.stress_indicators.push("rapid_speech");
            out.intensity_from_voice += 1;
        }
        "slow" | "hesitant" | "labored" => {
            out.stress_indicators.push("slow_speech");
            out.intensity_from_voice += 1;
        }
        _ => {}
    }

    match lowered(&features.volume).as_str() {
        "quiet" | "whisper" | "low" => out.stress_indicators.push("withdrawn_expression"),
        "loud" | "shouting" | "raised" => out.stress_indicators.push("agitated_expression"),
        _ => {}
    }

    if features.cultural_expressions {
        out.cultural_voice_patterns.push("traditional_expression_style");
    }
    out
}

/// Overall intensity on a 0–10 scale.
pub fn emotional_intensity(text: &TextEmotions, voice: Option<&VoiceEmotions>) -> u32 {
    let mut intensity = text.primary.len() as u32 * 2 + text.cultural_markers.len() as u32;
    if let Some(voice) = voice {
        intensity += voice.intensity_from_voice + voice.stress_indicators.len() as u32;
    }
    intensity.min(10)
}

/// +3 per high-intensity cue, +1 per moderate cue.
pub fn intensity_word_score(text: &str) -> u32 {
    count_matches(text, HIGH_INTENSITY_WORDS) * 3 + count_matches(text, MODERATE_INTENSITY_WORDS)
}

pub fn crisis_emotional_indicators(text: &str) -> Vec<&'static str> {
    matching_labels(&CRISIS_EMOTIONAL_PATTERNS, text)
}

// ---------------------------------------------------------------------------
// Cultural signals
// ---------------------------------------------------------------------------

const RELIGIOUS_EXPRESSIONS: &[&str] = &["الله", "إن شاء الله", "الحمد لله", "استغفر الله", "صبر", "قدر"];
const FAMILY_WORDS: &[&str] = &["أهل", "عائلة", "والدي", "والدتي", "أخوي", "أختي", "زوج", "أطفال"];
const SOCIAL_PRESSURE_WORDS: &[&str] = &["ناس", "مجتمع", "عيب", "حرام", "سمعة", "كلام الناس"];
const TRADITIONAL_COPING: &[&str] = &["صبر", "دعاء", "صلاة", "قراءة القرآن", "ذكر"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CulturalSignals {
    pub religious_expressions: Vec<&'static str>,
    pub family_dynamics_indicated: bool,
    pub social_expectations_pressure: bool,
    pub traditional_coping_mentioned: bool,
}

impl CulturalSignals {
    pub fn strengths(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.religious_expressions.is_empty() {
            out.push("Strong spiritual foundation");
        }
        if self.family_dynamics_indicated {
            out.push("Family support system");
        }
        if self.traditional_coping_mentioned {
            out.push("Traditional coping mechanisms");
        }
        out
    }

    pub fn suggested_adaptations(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.social_expectations_pressure {
            out.push("Address social pressure in therapy");
        }
        if self.family_dynamics_indicated {
            out.push("Consider family involvement in treatment");
        }
        if !self.religious_expressions.is_empty() {
            out.push("Integrate spiritual coping in treatment");
        }
        out
    }
}

pub fn cultural_signals(text: &str) -> CulturalSignals {
    CulturalSignals {
        religious_expressions: RELIGIOUS_EXPRESSIONS
            .iter()
            .copied()
            .filter(|e| text.contains(e))
            .collect(),
        family_dynamics_indicated: contains_any(text, FAMILY_WORDS),
        social_expectations_pressure: contains_any(text, SOCIAL_PRESSURE_WORDS),
        traditional_coping_mentioned: contains_any(text, TRADITIONAL_COPING),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_emotions_capped_and_deduplicated() {
        let found = detect_text_emotions("I'm sad, anxious, angry and scared, so sad");
        assert_eq!(found.primary, vec!["sadness", "anxiety", "anger"]);
    }

    #[test]
    fn test_arabic_terms_and_markers() {
        let found = detect_text_emotions("أنا حزين وخايف من كلام الناس");
        assert!(found.primary.contains(&"sadness"));
        assert!(found.primary.contains(&"anxiety"));
        assert_eq!(found.cultural_markers, vec!["social_pressure"]);
    }

    #[test]
    fn test_empty_text_has_no_emotions() {
        assert_eq!(detect_text_emotions("   "), TextEmotions::default());
    }

    #[test]
    fn test_voice_hints_and_intensity_cap() {
        let voice = analyze_voice(&VoiceFeatures {
            tone: Some("Tense".into()),
            pace: Some("rapid".into()),
            volume: Some("shouting".into()),
            ..Default::default()
        });
        assert_eq!(voice.tone_emotion, "anxiety");
        assert_eq!(voice.intensity_from_voice, 4);
        assert_eq!(voice.stress_indicators, vec!["rapid_speech", "agitated_expression"]);

        let text = detect_text_emotions("sad anxious angry");
        assert_eq!(emotional_intensity(&text, Some(&voice)), 10);
        assert_eq!(emotional_intensity(&text, None), 6);
    }

    #[test]
    fn test_voice_intensity_clamped_on_decode() {
        let cases = [
            (json!(4), Some(4)),
            (json!(4294967295u64), Some(VOICE_INTENSITY_MAX)),
            (json!(-3), Some(0)),
            (json!("7"), Some(7)),
            (json!(null), None),
        ];
        for (raw, expected) in cases {
            let features: VoiceFeatures =
                serde_json::from_value(json!({"intensity_from_voice": raw.clone()})).unwrap();
            assert_eq!(features.intensity_from_voice, expected, "{raw}");
        }
    }

    #[test]
    fn test_pitch_variation_is_not_scored() {
        let voice = analyze_voice(&VoiceFeatures {
            pitch_variation: Some("high".into()),
            ..Default::default()
        });
        assert_eq!(voice.intensity_from_voice, 0);
        assert!(voice.stress_indicators.is_empty());
    }

    #[test]
    fn test_intensity_words() {
        assert_eq!(intensity_word_score("it is unbearable and hard"), 4);
        assert_eq!(intensity_word_score("fine"), 0);
    }

    #[test]
    fn test_crisis_emotional_indicators() {
        let found = crisis_emotional_indicators("I'm worthless, it's unbearable and I'm all alone");
        assert_eq!(found, vec!["worthlessness", "overwhelming_pain", "isolation"]);
    }
}
