//! Crisis keyword tables, risk-factor scoring and indicator regexes.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{compile_table, first_match, matching_labels, PatternTable};
use crate::config::RiskConfig;

/// Direct and dialect expressions of suicidal intent or extreme distress.
pub const CRISIS_KEYWORDS: &[&str] = &[
    // English
    "suicide", "kill myself", "end it all", "no point living", "hurt myself",
    "overdose", "jump", "cut myself", "die", "death", "can't go on",
    "better off dead", "want to disappear", "end my life", "not worth living",
    // Arabic
    "انتحار", "اقتل نفسي", "لا يوجد امل", "اؤذي نفسي", "اموت",
    "جرعة زائدة", "اقفز", "اجرح نفسي", "لا استطيع المتابعة", "اريد ان اختفي",
    "انهي حياتي", "لا استحق الحياة", "تعبت من الحياة", "ما فيه فايدة",
    // Gulf dialect
    "خلاص تعبت", "ما عاد فيني", "انطفيت", "مليت من الحياة",
    "ودي اروح", "تعبت من كل شي", "ما اقدر اكمل", "خلاص كفيت",
    "حياتي ما لها معنى", "مو قادر", "تعبان نفسياً مره",
    "الله يا خذني", "ريحني يا رب", "تعبت يا رب", "ما عاد لي صبر",
    "يا ليتني ما انولدت", "ودي الموت", "الموت ارحم",
    "ما عاد عندي امل", "خلاص انكسرت", "روحي تعبانة", "قلبي مات",
    "ما اقدر احتمل", "مو قادر على شي", "نفسيتي خربت خلاص",
];

pub const HIGH_RISK_FACTORS: &[&str] = &[
    "previous_attempts",
    "substance_abuse",
    "social_isolation",
    "recent_loss",
    "access_to_means",
    "specific_plan",
];

pub const MODERATE_RISK_FACTORS: &[&str] = &[
    "hopelessness",
    "depression",
    "anxiety",
    "family_conflict",
    "financial_stress",
    "health_problems",
];

/// Suicide-risk level, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    High,
    Imminent,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Imminent => "imminent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "moderate" => Some(RiskLevel::Moderate),
            "high" => Some(RiskLevel::High),
            "imminent" => Some(RiskLevel::Imminent),
            _ => None,
        }
    }

    /// High and imminent levels call for immediate intervention.
    pub fn requires_immediate_action(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Imminent)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a risk assessment over free text plus reported risk factors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub risk_score: u32,
    pub crisis_keyword: Option<&'static str>,
}

impl RiskAssessment {
    pub fn crisis_detected(&self) -> bool {
        self.crisis_keyword.is_some()
    }
}

/// First crisis keyword contained in `text` (case-insensitive).
pub fn find_crisis_keyword(text: &str) -> Option<&'static str> {
    first_match(text, CRISIS_KEYWORDS)
}

/// Sum of factor weights. Unknown factors contribute nothing.
pub fn score_risk_factors<S: AsRef<str>>(factors: &[S], cfg: &RiskConfig) -> u32 {
    factors
        .iter()
        .map(|f| {
            let f = f.as_ref();
            if HIGH_RISK_FACTORS.contains(&f) {
                cfg.high_factor_weight
            } else if MODERATE_RISK_FACTORS.contains(&f) {
                cfg.moderate_factor_weight
            } else {
                0
            }
        })
        .sum()
}

/// Maps a score to a level; a crisis keyword forces `Imminent`.
pub fn risk_level(score: u32, crisis_keyword_found: bool, cfg: &RiskConfig) -> RiskLevel {
    if crisis_keyword_found || score >= cfg.imminent_threshold {
        RiskLevel::Imminent
    } else if score >= cfg.high_threshold {
        RiskLevel::High
    } else if score >= cfg.moderate_threshold {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

pub fn assess_risk<S: AsRef<str>>(text: Option<&str>, factors: &[S], cfg: &RiskConfig) -> RiskAssessment {
    let crisis_keyword = text.and_then(find_crisis_keyword);
    let risk_score = score_risk_factors(factors, cfg);
    RiskAssessment {
        risk_level: risk_level(risk_score, crisis_keyword.is_some(), cfg),
        risk_score,
        crisis_keyword,
    }
}

// ---------------------------------------------------------------------------
// Indicator regexes
// ---------------------------------------------------------------------------

static MONITOR_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    compile_table(&[
        (
            "suicidal_ideation",
            &[
                r"(?i)\b(suicide|kill\s+myself|end\s+it\s+all|no\s+point\s+living)\b",
                r"انتحار|اقتل\s+نفسي|انهي\s+حياتي|لا\s+يوجد\s+أمل",
            ],
        ),
        (
            "self_harm",
            &[
                r"(?i)\b(cut\s+myself|hurt\s+myself|self\s+harm|overdose)\b",
                r"اجرح\s+نفسي|اؤذي\s+نفسي|جرعة\s+زائدة",
            ],
        ),
        (
            "hopelessness",
            &[
                r"(?i)\b(hopeless|nothing\s+matters|give\s+up|no\s+future)\b",
                r"لا\s+أمل|لا\s+يهم\s+شيء|استسلم|لا\s+مستقبل",
            ],
        ),
        (
            "isolation",
            &[
                r"(?i)\b(nobody\s+cares|all\s+alone|no\s+friends|isolated)\b",
                r"لا\s+يهتم\s+أحد|وحيد|لا\s+أصدقاء|معزول",
            ],
        ),
    ])
});

static EMOTIONAL_STATE_PATTERNS: Lazy<PatternTable> = Lazy::new(|| {
    compile_table(&[
        ("despair", &[r"(?i)\b(hopeless|despair|worthless|pointless)\b", r"يأس|لا\s+قيمة|لا\s+فائدة"]),
        ("anger", &[r"(?i)\b(angry|mad|furious|rage)\b", r"غاضب|متضايق|غضب"]),
        ("sadness", &[r"(?i)\b(sad|depressed|down|empty)\b", r"حزين|مكتئب|فارغ"]),
        ("fear", &[r"(?i)\b(scared|afraid|terrified|anxious)\b", r"خائف|قلق|مرعوب"]),
        ("numbness", &[r"(?i)\b(numb|empty|nothing|void)\b", r"مخدر|فارغ|لا\s+شيء"]),
    ])
});

/// Ongoing-conversation indicator categories found in `text`.
pub fn monitor_indicators(text: &str) -> Vec<&'static str> {
    matching_labels(&MONITOR_PATTERNS, text)
}

/// Snapshot of the user's immediate emotional state, used by crisis support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmotionalState {
    pub detected_emotions: Vec<&'static str>,
    pub intensity: &'static str,
    pub requires_immediate_attention: bool,
}

pub fn emotional_state(text: &str) -> EmotionalState {
    let detected_emotions = matching_labels(&EMOTIONAL_STATE_PATTERNS, text);
    let intensity = match detected_emotions.len() {
        0 => "low",
        1 | 2 => "moderate",
        _ => "high",
    };
    let requires_immediate_attention = detected_emotions
        .iter()
        .any(|e| *e == "despair" || *e == "numbness");
    EmotionalState {
        detected_emotions,
        intensity,
        requires_immediate_attention,
    }
}

/// Alert level for a batch of monitor indicators.
pub fn alert_level(indicators: &[&str]) -> &'static str {
    if indicators.len() > 1 {
        "high"
    } else {
        "moderate"
    }
}
