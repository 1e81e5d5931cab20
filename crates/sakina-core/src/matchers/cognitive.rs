//! Cognitive-distortion cues and Islamic CBT concept selection.

use serde::Serialize;

use super::contains_any;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Distortion {
    pub key: &'static str,
    pub english: &'static str,
    pub arabic: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    cues: &'static [&'static str],
}

pub const DISTORTIONS: &[Distortion] = &[
    Distortion {
        key: "all_or_nothing",
        english: "All-or-nothing thinking",
        arabic: "التفكير بالأبيض والأسود",
        description: "Seeing things as completely good or bad, with no middle ground",
        cues: &["always", "never", "completely", "totally"],
    },
    Distortion {
        key: "catastrophizing",
        english: "Catastrophizing",
        arabic: "التوقع الأسوأ",
        description: "Expecting the worst possible outcome",
        cues: &["terrible", "awful", "disaster", "horrible"],
    },
    Distortion {
        key: "mind_reading",
        english: "Mind reading",
        arabic: "قراءة الأفكار",
        description: "Assuming you know what others think",
        cues: &["they think", "everyone thinks", "people think", "they must think"],
    },
    Distortion {
        key: "emotional_reasoning",
        english: "Emotional reasoning",
        arabic: "التفكير العاطفي",
        description: "Believing feelings are facts",
        cues: &["i feel like a", "because i feel", "it feels true", "i just know"],
    },
];

/// Distortions whose cue words appear in `thought`, in table order.
pub fn detect_distortions(thought: &str) -> Vec<&'static Distortion> {
    DISTORTIONS
        .iter()
        .filter(|d| contains_any(thought, d.cues))
        .collect()
}

/// Islamic CBT concept used to reframe a thought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IslamicConcept {
    Tawakkul,
    Sabr,
    Qadar,
}

impl IslamicConcept {
    pub fn as_str(&self) -> &'static str {
        match self {
            IslamicConcept::Tawakkul => "tawakkul",
            IslamicConcept::Sabr => "sabr",
            IslamicConcept::Qadar => "qadar",
        }
    }

    pub fn meaning(&self) -> &'static str {
        match self {
            IslamicConcept::Tawakkul => "Trust in Allah after taking action",
            IslamicConcept::Sabr => "Patience and perseverance through trials",
            IslamicConcept::Qadar => "Divine decree and wisdom in all events",
        }
    }

    pub fn application(&self) -> &'static str {
        match self {
            IslamicConcept::Tawakkul => "Do your best, then trust Allah with the outcome",
            IslamicConcept::Sabr => "This difficulty is temporary and has wisdom",
            IslamicConcept::Qadar => "There is wisdom in what Allah has decreed",
        }
    }

    pub fn verse(&self) -> &'static str {
        match self {
            IslamicConcept::Tawakkul => "'And upon Allah rely, if you should be believers.' (5:23)",
            IslamicConcept::Sabr => "'And give good tidings to the patient.' (2:155)",
            IslamicConcept::Qadar => "'But perhaps you hate a thing and it is good for you.' (2:216)",
        }
    }
}

/// Worry and control map to tawakkul, hardship to sabr, anything else to qadar.
pub fn islamic_concept_for(thought: &str) -> IslamicConcept {
    if contains_any(thought, &["worry", "anxious", "control"]) {
        IslamicConcept::Tawakkul
    } else if contains_any(thought, &["difficult", "hard", "struggle"]) {
        IslamicConcept::Sabr
    } else {
        IslamicConcept::Qadar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_multiple_distortions() {
        let keys: Vec<_> = detect_distortions("I ALWAYS ruin things, it's a disaster")
            .iter()
            .map(|d| d.key)
            .collect();
        assert_eq!(keys, vec!["all_or_nothing", "catastrophizing"]);
        assert!(detect_distortions("today was okay").is_empty());
    }

    #[test]
    fn test_islamic_concept_selection() {
        assert_eq!(islamic_concept_for("I worry about money"), IslamicConcept::Tawakkul);
        assert_eq!(islamic_concept_for("life is hard"), IslamicConcept::Sabr);
        assert_eq!(islamic_concept_for("why did this happen"), IslamicConcept::Qadar);
    }
}
