//! Session lifecycle: consent, notes, goals, emergency contacts, privacy and progress.
//!
//! Ending or exporting a session derives a read-only [`SessionSummary`]; notes, goals and
//! progress markers stay on the handler for the lifetime of the connection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::request::{ContactInput, SessionAction, SessionArgs};
use super::{culturally, mismatched, ClinicalRecord, ToolContext, ToolDefinition, ToolHandler, ToolKind, ToolOutcome, ToolRequest, Tone};
use crate::context::{truthy, CulturalContext};
use crate::error::ToolError;

const FAMILY_RELATIONSHIPS: &[&str] = &["family", "parent", "spouse", "sibling"];
const POSITIVE_PROGRESS: &[&str] = &["improvement", "better", "progress", "helpful", "positive"];
const NEGATIVE_PROGRESS: &[&str] = &["worse", "difficult", "struggle", "setback", "challenging"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Active,
    Ended,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Active => "active",
            SessionPhase::Ended => "ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Minimal,
    Standard,
    #[default]
    High,
    Maximum,
}

impl PrivacyLevel {
    pub const ALL: [PrivacyLevel; 4] = [Self::Minimal, Self::Standard, Self::High, Self::Maximum];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Minimal => "minimal",
            PrivacyLevel::Standard => "standard",
            PrivacyLevel::High => "high",
            PrivacyLevel::Maximum => "maximum",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }

    pub fn description(&self) -> &'static str {
        match self {
            PrivacyLevel::Minimal => "Basic privacy - session data may be stored for service improvement",
            PrivacyLevel::Standard => "Standard privacy - clinical data stored securely, limited sharing",
            PrivacyLevel::High => "High privacy - encrypted storage, no sharing without explicit consent",
            PrivacyLevel::Maximum => "Maximum privacy - minimal data retention, local processing preferred",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionNote {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: String,
    pub author: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub priority: i64,
    pub cultural_considerations: String,
}

impl EmergencyContact {
    /// A contact needs both a name and a phone number.
    fn from_input(input: &ContactInput) -> Option<Self> {
        let name = input.name.as_deref().filter(|s| !s.trim().is_empty())?;
        let phone = input.phone.as_deref().filter(|s| !s.trim().is_empty())?;
        Some(Self {
            name: name.to_string(),
            relationship: input
                .relationship
                .clone()
                .unwrap_or_else(|| "emergency_contact".to_string()),
            phone: phone.to_string(),
            priority: input.priority.unwrap_or(1),
            cultural_considerations: input.cultural_considerations.clone().unwrap_or_default(),
        })
    }

    pub fn is_family(&self) -> bool {
        FAMILY_RELATIONSHIPS.contains(&self.relationship.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressMarker {
    pub timestamp: DateTime<Utc>,
    pub progress_notes: String,
    pub session_id: Option<String>,
    pub therapeutic_goals_addressed: Vec<String>,
}

impl ProgressMarker {
    fn score(&self) -> i64 {
        let content = self.progress_notes.to_lowercase();
        let hits = |words: &[&str]| words.iter().filter(|w| content.contains(*w)).count() as i64;
        hits(POSITIVE_PROGRESS) - hits(NEGATIVE_PROGRESS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterruptionRecord {
    pub timestamp: DateTime<Utc>,
    pub minutes_before_interruption: i64,
    pub clinical_data_preserved: bool,
    pub emergency_protocols_activated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub interruption: Option<InterruptionRecord>,
}

impl SessionInfo {
    pub fn duration_minutes(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_minutes()
    }
}

/// Read-only view over the session handler's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub date: String,
    /// `None` while the session is still running.
    pub duration_minutes: Option<i64>,
    pub session_type: &'static str,
    pub cultural_adaptations: CulturalContext,
    pub therapeutic_goals: Vec<String>,
    pub progress_markers: usize,
    pub clinical_observations: usize,
    pub privacy_level: PrivacyLevel,
    pub emergency_contacts_set: bool,
    pub consent_status: Map<String, Value>,
    pub recent_notes: Vec<String>,
}

impl SessionSummary {
    /// Plain-text rendering for export.
    pub fn readable(&self) -> String {
        let granted = |key: &str| {
            if self.consent_status.get(key).map(truthy).unwrap_or(false) {
                "✅ Granted"
            } else {
                "❌ Not granted"
            }
        };
        let duration = self
            .duration_minutes
            .map(|m| m.to_string())
            .unwrap_or_else(|| "ongoing".to_string());
        let goals = if self.therapeutic_goals.is_empty() {
            "• No specific goals set".to_string()
        } else {
            bullets(self.therapeutic_goals.iter())
        };
        let notes = if self.recent_notes.is_empty() {
            "• No clinical notes recorded".to_string()
        } else {
            bullets(self.recent_notes.iter())
        };

        format!(
            "📋 THERAPEUTIC SESSION SUMMARY\n\
             ═══════════════════════════════\n\
             Session ID: {id}\n\
             Date: {date}\n\
             Duration: {duration} minutes\n\
             Type: {kind}\n\n\
             🎯 THERAPEUTIC GOALS ({goal_count})\n{goals}\n\n\
             📈 PROGRESS TRACKING\n\
             • Progress markers documented: {markers}\n\
             • Clinical observations: {observations}\n\
             • Privacy level: {privacy}\n\n\
             🌍 CULTURAL ADAPTATIONS\n\
             • Preferred language: {language}\n\
             • Religious considerations: {religious}\n\
             • Family involvement: {family}\n\n\
             🔒 PRIVACY & CONSENT\n\
             • Recording consent: {recording}\n\
             • Data storage consent: {storage}\n\
             • Emergency contacts: {contacts}\n\n\
             📝 CLINICAL NOTES\n{notes}",
            id = self.session_id,
            date = self.date,
            kind = self.session_type,
            goal_count = self.therapeutic_goals.len(),
            markers = self.progress_markers,
            observations = self.clinical_observations,
            privacy = self.privacy_level.as_str().to_uppercase(),
            language = self.cultural_adaptations.preferred_language().unwrap_or("Not specified"),
            religious = if self.cultural_adaptations.religious() { "Yes" } else { "No" },
            family = if self.cultural_adaptations.family_involvement() { "Preferred" } else { "Not specified" },
            recording = granted("recording_consent"),
            storage = granted("data_storage_consent"),
            contacts = if self.emergency_contacts_set { "✅ Set" } else { "❌ Not set" },
        )
    }
}

fn bullets<S: AsRef<str>>(items: impl Iterator<Item = S>) -> String {
    items
        .map(|s| format!("• {}", s.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `recording_consent` -> `Recording Consent`
fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SessionHandler {
    record: ClinicalRecord,
    phase: SessionPhase,
    current: Option<SessionInfo>,
    history: Vec<SessionInfo>,
    consent: Map<String, Value>,
    preferences: CulturalContext,
    notes: Vec<SessionNote>,
    goals: Vec<String>,
    goals_set_at: Option<DateTime<Utc>>,
    contacts: Vec<EmergencyContact>,
    privacy: PrivacyLevel,
    progress: Vec<ProgressMarker>,
}

impl Default for SessionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandler {
    pub fn new() -> Self {
        Self {
            record: ClinicalRecord::new(ToolKind::SessionManagement),
            phase: SessionPhase::Idle,
            current: None,
            history: Vec::new(),
            consent: Map::new(),
            preferences: CulturalContext::new(),
            notes: Vec::new(),
            goals: Vec::new(),
            goals_set_at: None,
            contacts: Vec::new(),
            privacy: PrivacyLevel::default(),
            progress: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn notes(&self) -> &[SessionNote] {
        &self.notes
    }

    pub fn goals(&self) -> &[String] {
        &self.goals
    }

    pub fn contacts(&self) -> &[EmergencyContact] {
        &self.contacts
    }

    pub fn privacy(&self) -> PrivacyLevel {
        self.privacy
    }

    pub fn progress(&self) -> &[ProgressMarker] {
        &self.progress
    }

    fn consented(&self, key: &str) -> bool {
        self.consent.get(key).map(truthy).unwrap_or(false)
    }

    /// Session-level preferences layered over the connection's cultural context.
    fn culture(&self, ctx: &ToolContext<'_>) -> CulturalContext {
        let mut merged = ctx.cultural.clone();
        merged.merge(self.preferences.as_map());
        merged
    }

    /// Summary of the running session, or of the last one when none is running.
    pub fn summary(&self) -> Option<SessionSummary> {
        let info = self.current.as_ref()?;
        Some(SessionSummary {
            session_id: info.session_id.clone(),
            date: info.started_at.format("%Y-%m-%d").to_string(),
            duration_minutes: info.ended_at.map(|_| info.duration_minutes()),
            session_type: "Voice Therapy - Sakina",
            cultural_adaptations: self.preferences.clone(),
            therapeutic_goals: self.goals.clone(),
            progress_markers: self.progress.len(),
            clinical_observations: self.notes.len(),
            privacy_level: self.privacy,
            emergency_contacts_set: !self.contacts.is_empty(),
            consent_status: self.consent.clone(),
            recent_notes: self.notes[self.notes.len().saturating_sub(3)..]
                .iter()
                .map(|n| {
                    let excerpt: String = n.content.chars().take(100).collect();
                    format!("{excerpt}...")
                })
                .collect(),
        })
    }

    fn brief_summary(&self, info: &SessionInfo) -> String {
        let mut parts = vec![format!("Session duration: {} minutes", info.duration_minutes())];
        if !self.goals.is_empty() {
            parts.push(format!("Therapeutic goals worked on: {}", self.goals.len()));
        }
        if !self.notes.is_empty() {
            parts.push(format!("Clinical observations recorded: {}", self.notes.len()));
        }
        if !self.progress.is_empty() {
            parts.push(format!("Progress documented: {} markers", self.progress.len()));
        }
        if self.record.flags().crisis_detected {
            parts.push("⚠️ Crisis indicators were addressed".to_string());
        }
        if !self.preferences.is_empty() {
            parts.push("Cultural preferences were incorporated".to_string());
        }
        parts.join(" | ")
    }

    fn follow_up_recommendations(&self, culture: &CulturalContext) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.record.flags().crisis_detected {
            out.extend([
                "Schedule follow-up within 24-48 hours",
                "Maintain safety plan adherence",
                "Consider professional referral consultation",
            ]);
        }
        if !self.progress.is_empty() {
            out.push("Continue working on established therapeutic goals");
        }
        if culture.family_involvement() {
            out.push("Consider family session for additional support");
        }
        if culture.religious() {
            out.push("Integrate spiritual practices in self-care routine");
        }
        if out.is_empty() {
            out.extend([
                "Practice techniques discussed in session",
                "Schedule regular follow-up session",
                "Maintain self-care routine",
            ]);
        }
        out
    }

    fn next_session_timing(&self) -> &'static str {
        let flags = self.record.flags();
        if flags.crisis_detected || flags.emergency_escalation_needed {
            "Within 24-48 hours (urgent follow-up)"
        } else if !self.progress.is_empty() {
            "Within 1 week (maintain momentum)"
        } else {
            "Within 1-2 weeks (regular follow-up)"
        }
    }

    /// Compares the first and last of the three most recent progress markers.
    pub fn progress_trend(&self) -> &'static str {
        if self.progress.len() < 2 {
            return "Insufficient data for trend analysis";
        }
        let recent = &self.progress[self.progress.len().saturating_sub(3)..];
        let first = recent.first().map(ProgressMarker::score).unwrap_or(0);
        let last = recent.last().map(ProgressMarker::score).unwrap_or(0);
        if last > first {
            "Positive progress trend observed"
        } else if last < first {
            "Some challenges noted - continued support needed"
        } else {
            "Stable progress - maintaining current approach"
        }
    }

    // -- actions ------------------------------------------------------------

    fn start(&mut self, args: &SessionArgs, ctx: &ToolContext<'_>) -> String {
        if self.phase == SessionPhase::Active {
            return "A session is already active. Please end the current session before starting a new one."
                .to_string();
        }
        self.preferences.merge(&args.cultural_preferences);
        for (key, value) in &args.consent_details {
            self.consent.insert(key.clone(), value.clone());
        }
        let started_at = Utc::now();
        let info = SessionInfo {
            session_id: format!("session_{}", started_at.format("%Y%m%d_%H%M%S")),
            started_at,
            ended_at: None,
            interruption: None,
        };
        if let Some(previous) = self.current.replace(info.clone()) {
            if self.history.last() != Some(&previous) {
                self.history.push(previous);
            }
        }
        self.phase = SessionPhase::Active;

        let culture = self.culture(ctx);
        let mut body = if culture.prefers_arabic() {
            "أهلاً وسهلاً! مرحباً بك في جلسة العلاج النفسي الصوتي.\nWelcome to your voice therapy session.".to_string()
        } else {
            "Welcome to your therapeutic voice session with Sakina.".to_string()
        };
        body.push_str("\n\nBefore we begin, let me review our privacy and consent:");
        body.push_str(if self.consented("recording_consent") {
            "\n✅ Session recording: Consented"
        } else {
            "\n❌ Session recording: Not consented"
        });
        body.push_str(if self.consented("data_storage_consent") {
            "\n✅ Clinical data storage: Consented"
        } else {
            "\n❌ Clinical data storage: Not consented"
        });
        body.push_str(
            "\n\nYour privacy and confidentiality are our highest priority. \
             This is a safe space for you to share and explore your feelings.",
        );
        let mut reply = culturally(body, Tone::Supportive);
        if culture.religious() {
            reply.push_str("\n\nبسم الله نبدأ جلستنا (In the name of Allah, we begin our session).");
        }

        tracing::info!(target: "sakina::tools", session_id = %info.session_id, "session started");
        self.record.emit(
            "session_started",
            json!({
                "session_id": info.session_id,
                "session_info": info,
                "cultural_adaptations": self.preferences,
                "consent_status": self.consent,
                "privacy_level": self.privacy,
            }),
        );
        reply
    }

    fn end(&mut self, final_notes: Option<&str>, ctx: &ToolContext<'_>) -> String {
        if self.phase != SessionPhase::Active {
            return "No active session to end.".to_string();
        }
        let ended_at = Utc::now();
        if let Some(notes) = final_notes.filter(|n| !n.trim().is_empty()) {
            self.notes.push(SessionNote {
                timestamp: ended_at,
                kind: "final_notes",
                content: notes.to_string(),
                author: "system",
            });
        }
        let Some(info) = self.current.as_mut() else {
            return "No active session to end.".to_string();
        };
        info.ended_at = Some(ended_at);
        let info = info.clone();
        self.history.push(info.clone());
        self.phase = SessionPhase::Ended;

        let culture = self.culture(ctx);
        let summary = self.brief_summary(&info);
        let closing = if culture.prefers_arabic() {
            "شكراً لك على مشاركتك في هذه الجلسة. أتمنى أن تكون مفيدة لك. الله يعطيك العافية.\n\n\
             Thank you for participating in this session. I hope it was helpful for you. \
             May Allah give you strength."
        } else {
            "Thank you for sharing in this therapeutic session. I hope you found it helpful and supportive."
        };
        let reply = culturally(format!("{closing}\n\nSession Summary:\n{summary}"), Tone::Encouraging);

        tracing::info!(
            target: "sakina::tools",
            session_id = %info.session_id,
            minutes = info.duration_minutes(),
            "session ended"
        );
        self.record.emit(
            "session_ended",
            json!({
                "session_summary": summary,
                "session_duration": info.duration_minutes(),
                "follow_up_recommendations": self.follow_up_recommendations(&culture),
                "next_session_suggested": self.next_session_timing(),
            }),
        );
        reply
    }

    fn manage_consent(&mut self, details: &Map<String, Value>) -> String {
        if details.is_empty() {
            let mut out = "Current consent status:".to_string();
            for (key, value) in &self.consent {
                let status = if truthy(value) { "✅ Granted" } else { "❌ Not granted" };
                out.push_str(&format!("\n• {}: {status}", title_case(key)));
            }
            return out;
        }

        let mut changes = Vec::new();
        for (key, value) in details {
            let before = self.consented(key);
            let after = truthy(value);
            if before != after {
                changes.push(format!(
                    "{}: {}",
                    title_case(key),
                    if after { "granted" } else { "revoked" }
                ));
            }
            self.consent.insert(key.clone(), value.clone());
        }
        if !changes.is_empty() {
            self.record.log_action(
                "consent_updated",
                json!({"changes": changes, "new_consent_status": self.consent}),
            );
        }

        let mut reply = culturally(
            "Thank you for updating your consent preferences. \
             Your choices are respected and can be changed at any time during our session.",
            Tone::default(),
        );
        if !changes.is_empty() {
            reply.push_str(&format!("\n\nConsent changes made:\n{}", bullets(changes.iter())));
        }
        if let Some(recording) = details.get("recording_consent") {
            reply.push_str(if truthy(recording) {
                "\n\n🔴 Session recording is now enabled for clinical documentation."
            } else {
                "\n\n⏹️ Session recording has been disabled per your request."
            });
        }
        self.record.emit(
            "consent_updated",
            json!({"consent_status": self.consent, "changes_made": changes}),
        );
        reply
    }

    fn update_notes(&mut self, notes: Option<&str>) -> String {
        let Some(notes) = notes.filter(|n| !n.trim().is_empty()) else {
            return "Please provide notes to add to the session.".to_string();
        };
        self.notes.push(SessionNote {
            timestamp: Utc::now(),
            kind: "clinical_note",
            content: notes.to_string(),
            author: "therapist_ai",
        });
        self.record.log_action(
            "session_notes_updated",
            json!({"note_length": notes.chars().count(), "total_notes": self.notes.len()}),
        );
        if self.consented("data_storage_consent") {
            self.record.emit(
                "notes_updated",
                json!({"note_added": true, "total_notes": self.notes.len(), "privacy_maintained": true}),
            );
        }
        "Session notes have been updated with your clinical observations.".to_string()
    }

    fn set_contacts(&mut self, inputs: &[ContactInput]) -> String {
        if inputs.is_empty() {
            return "Please provide emergency contact information.".to_string();
        }
        self.contacts = inputs.iter().filter_map(EmergencyContact::from_input).collect();
        let family = self.contacts.iter().filter(|c| c.is_family()).count();
        self.record.log_action(
            "emergency_contacts_updated",
            json!({"contacts_count": self.contacts.len(), "has_family_contacts": family > 0}),
        );

        let mut reply = culturally(
            format!(
                "Emergency contacts have been securely stored ({} contacts). \
                 This information will only be used in crisis situations or emergencies.",
                self.contacts.len()
            ),
            Tone::default(),
        );
        if family > 0 {
            reply.push_str(
                "\n\nI notice you've included family members as emergency contacts. \
                 In our culture, family support is very important for healing and recovery.",
            );
        }
        self.record.emit(
            "emergency_contacts_set",
            json!({
                "contacts_count": self.contacts.len(),
                "family_contacts_included": family,
                "privacy_secured": true,
            }),
        );
        reply
    }

    fn manage_privacy(&mut self, requested: Option<&str>) -> String {
        let Some(level) = PrivacyLevel::from_str(requested.unwrap_or("high")) else {
            let valid: Vec<&str> = PrivacyLevel::ALL.iter().map(PrivacyLevel::as_str).collect();
            return format!("Invalid privacy level. Choose from: {}", valid.join(", "));
        };
        let previous = std::mem::replace(&mut self.privacy, level);

        let mut reply = culturally(
            format!(
                "Privacy level updated to: {}\nThis means: {}",
                level.as_str().to_uppercase(),
                level.description()
            ),
            Tone::default(),
        );
        match level {
            PrivacyLevel::Maximum => reply.push_str(
                "\n\n🔒 Maximum privacy mode: Session data will be processed locally and deleted after session.",
            ),
            PrivacyLevel::High => {
                reply.push_str("\n\n🔐 High privacy mode: All data encrypted and access strictly controlled.")
            }
            _ => {}
        }
        self.record.log_action(
            "privacy_settings_updated",
            json!({"previous_level": previous, "new_level": level}),
        );
        self.record.emit(
            "privacy_settings_updated",
            json!({"privacy_level": level, "data_handling_info": level.description()}),
        );
        reply
    }

    fn track_goals(&mut self, goals: &[String], ctx: &ToolContext<'_>) -> String {
        if goals.is_empty() {
            if self.goals.is_empty() {
                return "No therapeutic goals currently set. \
                        Would you like to establish some goals for our work together?"
                    .to_string();
            }
            return format!("Current therapeutic goals:\n{}", bullets(self.goals.iter()));
        }
        self.goals = goals.to_vec();
        self.goals_set_at = Some(Utc::now());
        self.record.log_action(
            "therapeutic_goals_updated",
            json!({"goals_count": goals.len(), "goals_list": goals}),
        );

        let mut reply = culturally(
            "Therapeutic goals have been established for our work together. \
             Having clear goals helps us focus our efforts and measure progress.",
            Tone::default(),
        );
        reply.push_str("\n\nYour therapeutic goals:");
        for (i, goal) in goals.iter().enumerate() {
            reply.push_str(&format!("\n{}. {goal}", i + 1));
        }
        if self.culture(ctx).religious() {
            reply.push_str(
                "\n\nRemember: 'And whoever relies upon Allah - then He is sufficient for him. \
                 Indeed, Allah will accomplish His purpose.' (Quran 65:3)",
            );
        }
        self.record.emit(
            "therapeutic_goals_set",
            json!({"goals": goals, "goals_count": goals.len(), "tracking_enabled": true}),
        );
        reply
    }

    fn document_progress(&mut self, notes: Option<&str>) -> String {
        let Some(notes) = notes.filter(|n| !n.trim().is_empty()) else {
            return "Please provide progress notes to document.".to_string();
        };
        let marker = ProgressMarker {
            timestamp: Utc::now(),
            progress_notes: notes.to_string(),
            session_id: self.current.as_ref().map(|s| s.session_id.clone()),
            therapeutic_goals_addressed: self.goals.clone(),
        };
        self.progress.push(marker.clone());
        self.record.log_action(
            "progress_documented",
            json!({"progress_notes_length": notes.chars().count(), "total_progress_markers": self.progress.len()}),
        );

        let mut reply = culturally(
            "Therapeutic progress has been documented. \
             This helps us track your journey and adjust our approach as needed.",
            Tone::default(),
        );
        let trend = (self.progress.len() > 1).then(|| self.progress_trend());
        if let Some(trend) = trend {
            reply.push_str(&format!("\n\nProgress trend analysis: {trend}"));
        }
        self.record.emit(
            "progress_documented",
            json!({
                "progress_entry": marker,
                "total_progress_markers": self.progress.len(),
                "trend_analysis": trend,
            }),
        );
        reply
    }

    fn interrupt(&mut self, ctx: &ToolContext<'_>) -> String {
        if self.phase != SessionPhase::Active {
            return "No active session to handle interruption for.".to_string();
        }
        let emergency = self.record.flags().emergency_escalation_needed;
        let Some(info) = self.current.as_mut() else {
            return "No active session to handle interruption for.".to_string();
        };
        let now = Utc::now();
        let interruption = InterruptionRecord {
            timestamp: now,
            minutes_before_interruption: (now - info.started_at).num_minutes(),
            clinical_data_preserved: true,
            emergency_protocols_activated: emergency,
        };
        info.interruption = Some(interruption.clone());
        info.ended_at = Some(now);
        let info = info.clone();
        self.history.push(info);
        self.phase = SessionPhase::Ended;
        self.record.log_action("session_interrupted", json!(interruption));

        let mut reply = if emergency {
            "Session interrupted due to emergency protocols activation. \
             Emergency contacts have been notified if consented. \
             Professional support resources are available."
                .to_string()
        } else {
            culturally(
                "Session was interrupted. Your progress and clinical data have been safely preserved. \
                 You can resume therapy whenever you're ready.",
                Tone::default(),
            )
        };
        if self.culture(ctx).religious() {
            reply.push_str("\n\nالله معك في كل الأوقات (Allah is with you at all times).");
        }
        tracing::warn!(target: "sakina::tools", emergency, "session interrupted");
        self.record.emit(
            "session_interrupted",
            json!({
                "interruption_record": interruption,
                "data_preserved": true,
                "resume_available": true,
                "emergency_activated": emergency,
            }),
        );
        reply
    }

    fn export(&mut self) -> String {
        let Some(summary) = self.summary() else {
            return "No session data available to export.".to_string();
        };
        self.record.emit(
            "session_summary_exported",
            json!({
                "summary_data": summary,
                "readable_summary": summary.readable(),
                "export_timestamp": Utc::now(),
            }),
        );
        culturally(
            "Session summary has been generated and exported. \
             This summary maintains your privacy settings and contains your therapeutic progress information.",
            Tone::default(),
        )
    }
}

#[async_trait::async_trait]
impl ToolHandler for SessionHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::SessionManagement
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ToolKind::SessionManagement.function_name().to_string(),
            description: "Manage therapeutic session lifecycle, consent, privacy, and clinical documentation"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": SessionAction::names()},
                    "consent_details": {
                        "type": "object",
                        "properties": {
                            "recording_consent": {"type": "boolean"},
                            "data_storage_consent": {"type": "boolean"},
                            "emergency_contact_consent": {"type": "boolean"},
                            "family_involvement_consent": {"type": "boolean"}
                        }
                    },
                    "emergency_contacts": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "relationship": {"type": "string"},
                                "phone": {"type": "string"},
                                "priority": {"type": "integer"},
                                "cultural_considerations": {"type": "string"}
                            }
                        }
                    },
                    "cultural_preferences": {"type": "object"},
                    "therapeutic_goals": {"type": "array", "items": {"type": "string"}},
                    "session_notes": {"type": "string"},
                    "privacy_level": {
                        "type": "string",
                        "enum": ["minimal", "standard", "high", "maximum"]
                    }
                },
                "required": ["action"]
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
            "phase": self.phase,
            "current_session": self.current,
            "session_history": self.history,
            "session_notes": self.notes,
            "therapeutic_goals": {"goals": self.goals, "set_at": self.goals_set_at},
            "emergency_contacts": self.contacts,
            "consent_status": self.consent,
            "privacy_level": self.privacy,
            "progress_markers": self.progress,
        })
    }

    async fn execute(
        &mut self,
        request: ToolRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError> {
        let (action, args) = match request {
            ToolRequest::Session { action, args } => (action, args),
            other => return Err(mismatched(ToolKind::SessionManagement, &other)),
        };

        self.record.log_action(
            format!("session_management_{}", action.as_str()),
            json!({
                "consent_status": !args.consent_details.is_empty(),
                "emergency_contacts_count": args.emergency_contacts.len(),
                "cultural_preferences": !args.cultural_preferences.is_empty(),
                "therapeutic_goals_count": args.therapeutic_goals.len(),
                "privacy_level": args.privacy_level.as_deref().unwrap_or("high"),
            }),
        );

        let notes = args.session_notes.as_deref();
        let reply = match action {
            SessionAction::StartSession => self.start(&args, ctx),
            SessionAction::EndSession => self.end(notes, ctx),
            SessionAction::ManageConsent => self.manage_consent(&args.consent_details),
            SessionAction::UpdateNotes => self.update_notes(notes),
            SessionAction::SetEmergencyContacts => self.set_contacts(&args.emergency_contacts),
            SessionAction::ManagePrivacySettings => self.manage_privacy(args.privacy_level.as_deref()),
            SessionAction::TrackTherapeuticGoals => self.track_goals(&args.therapeutic_goals, ctx),
            SessionAction::DocumentProgress => self.document_progress(notes),
            SessionAction::HandleSessionInterruption => self.interrupt(ctx),
            SessionAction::ExportSessionSummary => self.export(),
        };
        Ok(ToolOutcome::reply(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(handler: &mut SessionHandler, action: SessionAction, args: SessionArgs) -> String {
        let cultural = CulturalContext::new();
        let ctx = ToolContext::new(&cultural);
        handler
            .execute(ToolRequest::Session { action, args }, &ctx)
            .await
            .unwrap()
            .reply
    }

    fn with_notes(text: &str) -> SessionArgs {
        SessionArgs {
            session_notes: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lifecycle_guards() {
        let mut handler = SessionHandler::new();
        assert_eq!(
            run(&mut handler, SessionAction::EndSession, SessionArgs::default()).await,
            "No active session to end."
        );
        run(&mut handler, SessionAction::StartSession, SessionArgs::default()).await;
        assert_eq!(handler.phase(), SessionPhase::Active);
        assert!(run(&mut handler, SessionAction::StartSession, SessionArgs::default())
            .await
            .starts_with("A session is already active."));

        run(&mut handler, SessionAction::EndSession, SessionArgs::default()).await;
        assert_eq!(handler.phase(), SessionPhase::Ended);
        assert_eq!(
            run(&mut handler, SessionAction::HandleSessionInterruption, SessionArgs::default()).await,
            "No active session to handle interruption for."
        );
    }

    #[tokio::test]
    async fn test_end_keeps_notes_goals_and_progress() {
        let mut handler = SessionHandler::new();
        run(&mut handler, SessionAction::StartSession, SessionArgs::default()).await;
        run(&mut handler, SessionAction::UpdateNotes, with_notes("client calmer")).await;
        run(
            &mut handler,
            SessionAction::TrackTherapeuticGoals,
            SessionArgs {
                therapeutic_goals: vec!["sleep better".into()],
                ..Default::default()
            },
        )
        .await;
        run(&mut handler, SessionAction::DocumentProgress, with_notes("some improvement")).await;

        let reply = run(&mut handler, SessionAction::EndSession, with_notes("wrap up")).await;
        assert!(reply.contains("Session duration: 0 minutes | Therapeutic goals worked on: 1"));
        assert_eq!(handler.notes().len(), 2);
        assert_eq!(handler.goals().to_vec(), vec!["sleep better".to_string()]);
        assert_eq!(handler.progress().len(), 1);

        run(&mut handler, SessionAction::ExportSessionSummary, SessionArgs::default()).await;
        assert_eq!(handler.notes().len(), 2);
        let summary = handler.summary().unwrap();
        assert_eq!(summary.progress_markers, 1);
        assert_eq!(summary.duration_minutes, Some(0));
        assert!(summary.readable().contains("• sleep better"));
    }

    #[tokio::test]
    async fn test_export_without_session() {
        let mut handler = SessionHandler::new();
        assert_eq!(
            run(&mut handler, SessionAction::ExportSessionSummary, SessionArgs::default()).await,
            "No session data available to export."
        );
    }

    #[tokio::test]
    async fn test_privacy_levels() {
        let mut handler = SessionHandler::new();
        let bad = SessionArgs {
            privacy_level: Some("secret".into()),
            ..Default::default()
        };
        assert_eq!(
            run(&mut handler, SessionAction::ManagePrivacySettings, bad).await,
            "Invalid privacy level. Choose from: minimal, standard, high, maximum"
        );
        let max = SessionArgs {
            privacy_level: Some("maximum".into()),
            ..Default::default()
        };
        let reply = run(&mut handler, SessionAction::ManagePrivacySettings, max).await;
        assert!(reply.contains("Privacy level updated to: MAXIMUM"));
        assert!(reply.contains("🔒"));
        assert_eq!(handler.privacy(), PrivacyLevel::Maximum);
    }

    #[tokio::test]
    async fn test_contacts_require_name_and_phone() {
        let mut handler = SessionHandler::new();
        let args = SessionArgs {
            emergency_contacts: vec![
                ContactInput {
                    name: Some("Fatma".into()),
                    relationship: Some("parent".into()),
                    phone: Some("+968 9000 0000".into()),
                    ..Default::default()
                },
                ContactInput {
                    name: Some("No phone".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let reply = run(&mut handler, SessionAction::SetEmergencyContacts, args).await;
        assert!(reply.contains("(1 contacts)"));
        assert!(reply.contains("family members"));
        assert_eq!(handler.contacts()[0].priority, 1);
    }

    #[tokio::test]
    async fn test_consent_changes_reported() {
        let mut handler = SessionHandler::new();
        let mut details = Map::new();
        details.insert("recording_consent".into(), json!(true));
        let reply = run(
            &mut handler,
            SessionAction::ManageConsent,
            SessionArgs {
                consent_details: details,
                ..Default::default()
            },
        )
        .await;
        assert!(reply.contains("Recording Consent: granted"));
        assert!(reply.contains("🔴"));

        let status = run(&mut handler, SessionAction::ManageConsent, SessionArgs::default()).await;
        assert_eq!(status, "Current consent status:\n• Recording Consent: ✅ Granted");
    }

    #[tokio::test]
    async fn test_progress_trend() {
        let mut handler = SessionHandler::new();
        run(&mut handler, SessionAction::DocumentProgress, with_notes("a setback this week")).await;
        let reply = run(&mut handler, SessionAction::DocumentProgress, with_notes("feeling better")).await;
        assert!(reply.contains("Positive progress trend observed"));
        assert_eq!(
            run(&mut handler, SessionAction::DocumentProgress, with_notes("   ")).await,
            "Please provide progress notes to document."
        );
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("data_storage_consent"), "Data Storage Consent");
    }
}
