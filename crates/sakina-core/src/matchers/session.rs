//! Free-text cues for session management requests ("let's stop here", "add a note").

const SESSION_CUES: &[(&str, &[&str])] = &[
    ("start_session", &["start session", "start the session", "begin session", "let's begin", "نبدأ الجلسة", "ابدأ الجلسة"]),
    ("end_session", &["end session", "end the session", "stop here", "that's all for today", "goodbye", "انهي الجلسة", "خلصنا"]),
    ("manage_consent", &["consent", "recording", "record this", "موافقة", "تسجيل"]),
    ("manage_privacy_settings", &["privacy", "private", "confidential", "خصوصية", "سرية"]),
    ("set_emergency_contacts", &["emergency contact", "contact my", "رقم الطوارئ", "اتصل ب"]),
    ("track_therapeutic_goals", &["goal", "goals", "want to work on", "هدف", "أهداف"]),
    ("document_progress", &["progress", "improvement", "getting better", "تحسن", "تقدم"]),
    ("update_notes", &["note", "write down", "remember this", "ملاحظة", "اكتب"]),
    ("handle_session_interruption", &["interrupted", "got cut off", "connection dropped", "انقطع"]),
    ("export_session_summary", &["summary", "export", "send me a copy", "ملخص"]),
];

/// Session action codes hinted at by `text`, in table order.
pub fn session_action_cues(text: &str) -> Vec<&'static str> {
    SESSION_CUES
        .iter()
        .filter(|(_, cues)| super::contains_any(text, cues))
        .map(|(action, _)| *action)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cues() {
        assert_eq!(session_action_cues("Let's stop here, goodbye"), vec!["end_session"]);
        assert_eq!(
            session_action_cues("can you export a summary of my goals"),
            vec!["track_therapeutic_goals", "export_session_summary"]
        );
        assert!(session_action_cues("the weather is nice").is_empty());
    }
}
