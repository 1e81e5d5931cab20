//! Keyword and regex classifiers over English and Gulf Arabic text.
//!
//! Every matcher is a pure function: no state, no errors. Empty or absent input
//! yields an empty [`Classification`].

pub mod cognitive;
pub mod crisis;
pub mod emotion;
pub mod session;

use regex::Regex;
use serde::Serialize;

pub use cognitive::{detect_distortions, islamic_concept_for, Distortion, IslamicConcept};
pub use crisis::{assess_risk, RiskAssessment, RiskLevel};
pub use emotion::{detect_text_emotions, TextEmotions, VoiceFeatures};

use crate::config::RiskConfig;

/// Label plus the compiled alternatives that trigger it.
pub(crate) type PatternTable = Vec<(&'static str, Vec<Regex>)>;

pub(crate) fn compile_table(table: &[(&'static str, &[&str])]) -> PatternTable {
    table.iter()
        .map(|(label, patterns)| {
            let compiled = patterns
                .iter()
                .filter_map(|p| match Regex::new(p) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(target: "sakina::matchers", label, error = %e, "pattern failed to compile");
                        None
                    }
                })
                .collect();
            (*label, compiled)
        })
        .collect()
}

/// Labels whose patterns match `text`, in table order. Each label at most once.
pub(crate) fn matching_labels(table: &PatternTable, text: &str) -> Vec<&'static str> {
    table
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|re| re.is_match(text)))
        .map(|(label, _)| *label)
        .collect()
}

/// Case-insensitive containment of any term.
pub fn contains_any(text: &str, terms: &[&str]) -> bool {
    let lower = text.to_lowercase();
    terms.iter().any(|t| lower.contains(&t.to_lowercase()))
}

pub fn first_match(text: &str, terms: &[&'static str]) -> Option<&'static str> {
    let lower = text.to_lowercase();
    terms.iter().copied().find(|t| lower.contains(&t.to_lowercase()))
}

pub fn count_matches(text: &str, terms: &[&str]) -> u32 {
    let lower = text.to_lowercase();
    terms
        .iter()
        .filter(|t| lower.contains(&t.to_lowercase()))
        .count() as u32
}

// ---------------------------------------------------------------------------
// classify(): single entry point across categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    CrisisRisk,
    Emotion,
    CognitiveDistortion,
    SessionAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub labels: Vec<&'static str>,
    pub crisis_detected: bool,
    /// Only set for [`Category::CrisisRisk`].
    pub risk_level: Option<RiskLevel>,
}

impl Classification {
    fn empty(category: Category) -> Self {
        Self {
            category,
            labels: Vec::new(),
            crisis_detected: false,
            risk_level: (category == Category::CrisisRisk).then_some(RiskLevel::Low),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && !self.crisis_detected
    }
}

/// Classify free text with the default risk table.
pub fn classify(text: Option<&str>, category: Category) -> Classification {
    classify_with(text, category, &RiskConfig::default())
}

pub fn classify_with(text: Option<&str>, category: Category, risk: &RiskConfig) -> Classification {
    let text = match text.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return Classification::empty(category),
    };

    match category {
        Category::CrisisRisk => {
            let no_factors: [&str; 0] = [];
            let assessment = assess_risk(Some(text), &no_factors, risk);
            Classification {
                category,
                labels: crisis::monitor_indicators(text),
                crisis_detected: assessment.crisis_detected(),
                risk_level: Some(assessment.risk_level),
            }
        }
        Category::Emotion => Classification {
            category,
            labels: detect_text_emotions(text).primary,
            crisis_detected: false,
            risk_level: None,
        },
        Category::CognitiveDistortion => Classification {
            category,
            labels: detect_distortions(text).iter().map(|d| d.key).collect(),
            crisis_detected: false,
            risk_level: None,
        },
        Category::SessionAction => Classification {
            category,
            labels: session::session_action_cues(text),
            crisis_detected: false,
            risk_level: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_crisis_keyword_classifies_imminent() {
        for keyword in crisis::CRISIS_KEYWORDS {
            let text = format!("honestly {keyword} right now");
            let c = classify(Some(&text), Category::CrisisRisk);
            assert!(c.crisis_detected, "keyword not detected: {keyword}");
            assert_eq!(c.risk_level, Some(RiskLevel::Imminent), "{keyword}");
        }
    }

    #[test]
    fn test_empty_input_is_empty_classification() {
        for category in [
            Category::CrisisRisk,
            Category::Emotion,
            Category::CognitiveDistortion,
            Category::SessionAction,
        ] {
            assert!(classify(None, category).is_empty());
            assert!(classify(Some("  "), category).is_empty());
        }
        assert_eq!(classify(None, Category::CrisisRisk).risk_level, Some(RiskLevel::Low));
    }

    #[test]
    fn test_labels_co_occur() {
        let c = classify(Some("I'm sad and worried"), Category::Emotion);
        assert_eq!(c.labels, vec!["sadness", "anxiety"]);
        let c = classify(Some("this is always a total disaster"), Category::CognitiveDistortion);
        assert_eq!(c.labels, vec!["all_or_nothing", "catastrophizing"]);
    }

    #[test]
    fn test_all_patterns_compile() {
        assert!(crisis::monitor_indicators("suicide").contains(&"suicidal_ideation"));
        assert_eq!(emotion::crisis_emotional_indicators("no one").len(), 1);
    }
}
