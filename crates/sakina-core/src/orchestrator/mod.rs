//! Session persona orchestrator: one per connection.
//!
//! Tracks the active persona, arbitrates switches, invokes the remote-session
//! recreate hook and routes tool calls to the handlers bound by the active persona.
//! Local bookkeeping commits before the remote hook runs and is never rolled back.

pub mod persona;
pub mod recommend;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub use persona::{switch_announcement, Persona, PersonaId};
pub use recommend::{recommend, Recommendation};

use crate::config::CoreConfig;
use crate::context::{ClinicalState, CulturalContext};
use crate::error::{DispatchError, PersonaError};
use crate::notify::{ClientEvent, ClientHub};
use crate::registry::{CrisisStatus, ToolDeps, ToolRegistry};
use crate::tools::{FunctionCall, ToolContext, ToolDefinition, ToolKind, ToolRequest};

pub type RecreateError = Box<dyn std::error::Error + Send + Sync>;

/// Rebuilds the remote realtime session with a new system prompt and tool list.
#[async_trait::async_trait]
pub trait SessionRecreator: Send + Sync {
    async fn recreate(&self, prompt: &str, tools: &[ToolDefinition]) -> Result<(), RecreateError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchRecord {
    pub timestamp: DateTime<Utc>,
    pub from: PersonaId,
    pub to: PersonaId,
    pub reason: String,
    pub cultural_context: CulturalContext,
    pub clinical_state: ClinicalState,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonaInfo {
    pub current_persona: PersonaId,
    pub specialization: &'static str,
    pub cultural_adaptations: Vec<&'static str>,
    pub available_tools: Vec<&'static str>,
    pub clinical_state: ClinicalState,
    pub cultural_context: CulturalContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub session_id: String,
    pub current_persona: PersonaId,
    pub available_personas: Vec<PersonaId>,
    pub persona_switches_count: usize,
    pub crisis_active: bool,
    pub cultural_context_set: bool,
    pub total_registered_personas: usize,
    pub clinical_state: ClinicalState,
    pub cultural_adaptations_active: CulturalContext,
    pub tool_crisis_status: CrisisStatus,
}

pub struct PersonaOrchestrator {
    session_id: String,
    started_at: DateTime<Utc>,
    active: PersonaId,
    personas: BTreeMap<PersonaId, Persona>,
    registry: ToolRegistry,
    deps: ToolDeps,
    history: Vec<SwitchRecord>,
    cultural: CulturalContext,
    clinical: ClinicalState,
    recreator: Option<Arc<dyn SessionRecreator>>,
    hub: Option<Arc<ClientHub>>,
}

impl std::fmt::Debug for PersonaOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaOrchestrator")
            .field("session_id", &self.session_id)
            .field("active", &self.active)
            .field("personas", &self.personas.keys().collect::<Vec<_>>())
            .field("registry", &self.registry)
            .field("switches", &self.history.len())
            .finish()
    }
}

impl PersonaOrchestrator {
    /// Empty orchestrator; `initial` becomes active once it is registered.
    pub fn new(registry: ToolRegistry, deps: ToolDeps, initial: PersonaId) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(target: "sakina::persona", %session_id, initial = %initial, "orchestrator created");
        Self {
            session_id,
            started_at: Utc::now(),
            active: initial,
            personas: BTreeMap::new(),
            registry,
            deps,
            history: Vec::new(),
            cultural: CulturalContext::new(),
            clinical: ClinicalState::default(),
            recreator: None,
            hub: None,
        }
    }

    /// The three standard personas over the four default tools.
    pub fn standard(deps: ToolDeps, initial: PersonaId) -> Result<Self, PersonaError> {
        let mut orchestrator = Self::new(ToolRegistry::with_default_tools(), deps, initial);
        for id in PersonaId::ALL {
            orchestrator.register_persona(Persona::standard(id))?;
        }
        Ok(orchestrator)
    }

    pub fn from_config(config: &CoreConfig) -> Result<Self, PersonaError> {
        let initial = PersonaId::from_str(&config.default_persona).ok_or_else(|| PersonaError::UnknownPersona {
            requested: config.default_persona.clone(),
            available: PersonaId::ALL.to_vec(),
        })?;
        Self::standard(ToolDeps { risk: config.risk }, initial)
    }

    /// Write-once per id. Bound tools are instantiated in the registry on registration.
    pub fn register_persona(&mut self, persona: Persona) -> Result<(), PersonaError> {
        if self.personas.contains_key(&persona.id) {
            return Err(PersonaError::AlreadyRegistered(persona.id));
        }
        for tool in persona.tools() {
            if self.registry.get_or_create(tool.key(), &self.deps).is_none() {
                return Err(PersonaError::UnboundTool {
                    persona: persona.id,
                    tool: tool.key().to_string(),
                });
            }
        }
        tracing::info!(
            target: "sakina::persona",
            persona = %persona.id,
            tools = ?persona.tool_keys(),
            "persona registered"
        );
        self.personas.insert(persona.id, persona);
        Ok(())
    }

    pub fn bind_recreator(&mut self, recreator: Arc<dyn SessionRecreator>) {
        self.recreator = Some(recreator);
    }

    pub fn bind_hub(&mut self, hub: Arc<ClientHub>) {
        self.hub = Some(hub);
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn active_persona(&self) -> PersonaId {
        self.active
    }

    pub fn persona(&self, id: PersonaId) -> Option<&Persona> {
        self.personas.get(&id)
    }

    pub fn registered_personas(&self) -> Vec<PersonaId> {
        self.personas.keys().copied().collect()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    pub fn cultural_context(&self) -> &CulturalContext {
        &self.cultural
    }

    pub fn clinical_state(&self) -> &ClinicalState {
        &self.clinical
    }

    pub fn switch_history(&self) -> &[SwitchRecord] {
        &self.history
    }

    /// Definitions of the tools bound by `id`, in binding order.
    pub fn tool_definitions(&self, id: PersonaId) -> Vec<ToolDefinition> {
        self.personas
            .get(&id)
            .map(|p| self.registry.definitions_for(&p.tool_keys()))
            .unwrap_or_default()
    }

    fn publish(&self, event: ClientEvent) {
        if let Some(hub) = &self.hub {
            hub.broadcast(&event);
        }
    }

    // -----------------------------------------------------------------------
    // Switching
    // -----------------------------------------------------------------------

    /// Switch by name; accepts legacy persona names.
    pub async fn switch_named(
        &mut self,
        target: &str,
        reason: &str,
        cultural_context: Option<&Map<String, Value>>,
    ) -> Result<String, PersonaError> {
        match PersonaId::from_str(target) {
            Some(id) => self.switch(id, reason, cultural_context).await,
            None => Err(PersonaError::UnknownPersona {
                requested: target.to_string(),
                available: self.registered_personas(),
            }),
        }
    }

    pub async fn switch(
        &mut self,
        target: PersonaId,
        reason: &str,
        cultural_context: Option<&Map<String, Value>>,
    ) -> Result<String, PersonaError> {
        let (prompt, definitions) = match self.personas.get(&target) {
            Some(persona) => (
                persona.prompt().to_string(),
                self.registry.definitions_for(&persona.tool_keys()),
            ),
            None => {
                return Err(PersonaError::UnknownPersona {
                    requested: target.as_str().to_string(),
                    available: self.registered_personas(),
                })
            }
        };
        if target == self.active {
            return Ok(format!("Already using {target} persona."));
        }

        let from = self.active;
        self.history.push(SwitchRecord {
            timestamp: Utc::now(),
            from,
            to: target,
            reason: reason.to_string(),
            cultural_context: cultural_context
                .map(|m| CulturalContext::from_map(m.clone()))
                .unwrap_or_default(),
            clinical_state: self.clinical.clone(),
        });
        if let Some(updates) = cultural_context {
            self.cultural.merge(updates);
        }
        self.active = target;
        tracing::info!(target: "sakina::persona", from = %from, to = %target, reason, "persona switched");

        if let Some(recreator) = self.recreator.clone() {
            match recreator.recreate(&prompt, &definitions).await {
                Ok(()) => tracing::info!(target: "sakina::persona", persona = %target, "remote session recreated"),
                Err(e) => tracing::error!(
                    target: "sakina::persona",
                    persona = %target,
                    error = %e,
                    "remote session recreate failed; keeping local switch"
                ),
            }
        }

        let announcement = switch_announcement(target, reason, &self.cultural);
        self.publish(ClientEvent::session(
            "persona_switched",
            json!({"from": from, "to": target, "reason": reason, "message": announcement}),
        ));
        Ok(announcement)
    }

    /// Marks the crisis and moves to the crisis persona unless it is already active.
    pub async fn handle_crisis_escalation(&mut self, kind: &str, data: Value) -> String {
        self.clinical.mark_crisis(kind, data);
        tracing::warn!(target: "sakina::persona", crisis_type = kind, "crisis escalation");

        if self.active == PersonaId::Crisis {
            return "Crisis intervention persona already active and handling the situation.".to_string();
        }
        let reason = format!("Crisis escalation: {kind}");
        match self.switch(PersonaId::Crisis, &reason, None).await {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(target: "sakina::persona", error = %e, "crisis persona unavailable");
                e.to_string()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tool dispatch
    // -----------------------------------------------------------------------

    /// Never fails: every problem comes back as a reported string.
    pub async fn handle_function_call(&mut self, call: &FunctionCall) -> String {
        tracing::info!(
            target: "sakina::tools",
            function = %call.name,
            persona = %self.active,
            "handling function call"
        );
        match self.dispatch(call).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(target: "sakina::tools", function = %call.name, error = %e, "function call reported an error");
                e.to_string()
            }
        }
    }

    async fn dispatch(&mut self, call: &FunctionCall) -> Result<String, DispatchError> {
        let kind = ToolKind::from_function_name(&call.name)
            .ok_or_else(|| DispatchError::UnknownFunction(call.name.clone()))?;
        let bound = self.personas.get(&self.active).is_some_and(|p| p.binds(kind));
        if !bound {
            return Err(DispatchError::NotAvailable {
                tool: call.name.clone(),
                persona: self.active,
            });
        }
        let request = ToolRequest::parse(kind, &call.arguments)?;

        let handler = self
            .registry
            .get_mut(kind.key())
            .ok_or_else(|| DispatchError::MissingHandler(kind.key().to_string()))?;
        let ctx = ToolContext::new(&self.cultural);
        let outcome = handler.execute(request, &ctx).await;
        let events = handler.record_mut().take_events();
        let outcome = outcome?;

        for event in events {
            self.publish(event);
        }
        if let Some(signal) = outcome.escalation {
            let notice = self.handle_crisis_escalation(&signal.kind, signal.data).await;
            tracing::info!(target: "sakina::persona", tool = %kind, notice = %notice, "escalation handled");
        }
        Ok(outcome.reply)
    }

    // -----------------------------------------------------------------------
    // Context and status
    // -----------------------------------------------------------------------

    pub fn update_cultural_context(&mut self, updates: &Map<String, Value>) {
        self.cultural.merge(updates);
        tracing::info!(target: "sakina::persona", keys = ?updates.keys().collect::<Vec<_>>(), "cultural context updated");
    }

    /// Merge-update; `crisis_active` is never cleared here.
    pub fn update_clinical_state(&mut self, updates: &Map<String, Value>) {
        self.clinical.merge(updates);
        tracing::info!(target: "sakina::persona", keys = ?updates.keys().collect::<Vec<_>>(), "clinical state updated");
    }

    /// Operator reset of the session crisis state and every tool's safety flags.
    pub fn reset_crisis(&mut self) {
        self.clinical.reset_crisis();
        self.registry.reset_crisis_flags();
        tracing::warn!(target: "sakina::persona", session_id = %self.session_id, "crisis state reset by operator");
    }

    pub fn recommend(&self, text: Option<&str>) -> Recommendation {
        recommend(text, &self.clinical)
    }

    pub fn current_persona_info(&self) -> Option<PersonaInfo> {
        let persona = self.personas.get(&self.active)?;
        Some(PersonaInfo {
            current_persona: self.active,
            specialization: persona.specialization,
            cultural_adaptations: persona.cultural_adaptations.clone(),
            available_tools: persona.tool_keys(),
            clinical_state: self.clinical.clone(),
            cultural_context: self.cultural.clone(),
        })
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            session_id: self.session_id.clone(),
            current_persona: self.active,
            available_personas: self.registered_personas(),
            persona_switches_count: self.history.len(),
            crisis_active: self.clinical.crisis_active,
            cultural_context_set: !self.cultural.is_empty(),
            total_registered_personas: self.personas.len(),
            clinical_state: self.clinical.clone(),
            cultural_adaptations_active: self.cultural.clone(),
            tool_crisis_status: self.registry.crisis_status(),
        }
    }
}
