//! System prompts for the three personas plus the shared speaking-tone suffix.

pub mod cbt;
pub mod crisis;
pub mod general;

pub use cbt::CBT_SPECIALIST_PROMPT;
pub use crisis::CRISIS_INTERVENTION_PROMPT;
pub use general::GENERAL_THERAPY_PROMPT;

/// Appended to every persona prompt.
pub const SPEAKING_TONE: &str = r#"
Speaking style (always follow):
1. Speak English the way a native Omani Arab would, with a gentle Omani accent.
2. Follow Omani speech rhythm: a slower pace, soft consonants, stretched vowels.
3. Use Arabic expressions such as insha'Allah, habibi, masha'Allah or ya akhi where they fit.

Every sentence carries the calm, caring and grounded tone of an Omani therapist.
Keep the cultural softness, hospitality and wisdom that Omanis express in both Arabic and English.
The listener should feel they are speaking with a real Omani therapist: reassuring, respectful and deeply human.
"#;

/// Persona template followed by the speaking-tone suffix.
pub fn assemble(template: &str) -> String {
    let mut prompt = String::with_capacity(template.len() + SPEAKING_TONE.len());
    prompt.push_str(template.trim_end());
    prompt.push('\n');
    prompt.push_str(SPEAKING_TONE);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembled_prompts_end_with_tone() {
        for template in [GENERAL_THERAPY_PROMPT, CRISIS_INTERVENTION_PROMPT, CBT_SPECIALIST_PROMPT] {
            let prompt = assemble(template);
            assert!(prompt.ends_with(SPEAKING_TONE));
            assert!(prompt.contains("NEVER VERBALIZE TOOL OUTPUTS"));
        }
    }
}
