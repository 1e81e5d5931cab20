//! Advisory persona recommendation from raw user text.

use serde::Serialize;

use super::PersonaId;
use crate::context::ClinicalState;
use crate::matchers::crisis::find_crisis_keyword;
use crate::matchers::first_match;

const ANXIETY_KEYWORDS: &[&str] = &[
    "panic", "anxiety", "anxious", "worried", "stressed", "overthinking", "قلق", "متوتر", "خايف",
];

const COGNITIVE_KEYWORDS: &[&str] = &[
    "thoughts", "thinking", "can't stop", "ruminating", "negative thoughts", "أفكار",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub persona: PersonaId,
    pub reason: &'static str,
    /// Keyword that decided the recommendation, if any.
    pub matched: Option<&'static str>,
}

/// Crisis keywords win; anxiety maps to CBT unless a crisis is already active.
pub fn recommend(text: Option<&str>, state: &ClinicalState) -> Recommendation {
    let text = match text.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => {
            return Recommendation {
                persona: PersonaId::General,
                reason: "no input",
                matched: None,
            }
        }
    };

    if let Some(keyword) = find_crisis_keyword(text) {
        return Recommendation {
            persona: PersonaId::Crisis,
            reason: "crisis language",
            matched: Some(keyword),
        };
    }
    if let Some(keyword) = first_match(text, ANXIETY_KEYWORDS) {
        return if state.crisis_active {
            Recommendation {
                persona: PersonaId::Crisis,
                reason: "anxiety during active crisis",
                matched: Some(keyword),
            }
        } else {
            Recommendation {
                persona: PersonaId::Cbt,
                reason: "anxiety",
                matched: Some(keyword),
            }
        };
    }
    if let Some(keyword) = first_match(text, COGNITIVE_KEYWORDS) {
        return Recommendation {
            persona: PersonaId::Cbt,
            reason: "thought patterns",
            matched: Some(keyword),
        };
    }
    Recommendation {
        persona: PersonaId::General,
        reason: "general support",
        matched: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle() -> ClinicalState {
        ClinicalState::default()
    }

    #[test]
    fn test_crisis_language_first() {
        let rec = recommend(Some("I want to kill myself, I'm so anxious"), &idle());
        assert_eq!(rec.persona, PersonaId::Crisis);
    }

    #[test]
    fn test_anxiety_depends_on_crisis_state() {
        assert_eq!(recommend(Some("I'm so anxious"), &idle()).persona, PersonaId::Cbt);
        let mut active = idle();
        active.mark_crisis("imminent_risk", serde_json::json!({}));
        assert_eq!(recommend(Some("I'm so anxious"), &active).persona, PersonaId::Crisis);
    }

    #[test]
    fn test_cognitive_and_default() {
        assert_eq!(recommend(Some("my thoughts keep looping"), &idle()).persona, PersonaId::Cbt);
        assert_eq!(recommend(Some("hello"), &idle()).persona, PersonaId::General);
        assert_eq!(recommend(Some("   "), &idle()).persona, PersonaId::General);
        assert_eq!(recommend(None, &idle()).persona, PersonaId::General);
    }
}
