//! Tool registry: named factories plus the handlers active for one session.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::RiskConfig;
use crate::error::{RegistryError, ToolError};
use crate::tools::{
    CbtHandler, CrisisHandler, EmotionHandler, SessionHandler, ToolDefinition, ToolHandler, ToolKind,
};

/// Shared inputs handed to every factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolDeps {
    pub risk: RiskConfig,
}

pub type ToolFactory = Arc<dyn Fn(&ToolDeps) -> Result<Box<dyn ToolHandler>, ToolError> + Send + Sync>;

/// Aggregated safety flags across active tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrisisStatus {
    pub any_crisis_detected: bool,
    pub emergency_escalation_needed: bool,
    pub tools_with_crisis: Vec<String>,
    pub tools_with_escalation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub registered_tools: usize,
    pub active_tools: usize,
    pub tool_names: Vec<String>,
    pub active_tool_names: Vec<String>,
}

#[derive(Default)]
pub struct ToolRegistry {
    factories: BTreeMap<String, ToolFactory>,
    active: BTreeMap<String, Box<dyn ToolHandler>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.list_registered())
            .field("active", &self.list_active())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four therapeutic tools registered under their keys.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(ToolKind::CrisisDetection.key(), |deps| {
            Ok(Box::new(CrisisHandler::new(deps.risk)) as Box<dyn ToolHandler>)
        });
        registry.register(ToolKind::CbtTechniques.key(), |_| {
            Ok(Box::new(CbtHandler::new()) as Box<dyn ToolHandler>)
        });
        registry.register(ToolKind::EmotionalAnalysis.key(), |_| {
            Ok(Box::new(EmotionHandler::new()) as Box<dyn ToolHandler>)
        });
        registry.register(ToolKind::SessionManagement.key(), |_| {
            Ok(Box::new(SessionHandler::new()) as Box<dyn ToolHandler>)
        });
        registry
    }

    /// Registering an existing name replaces its factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ToolDeps) -> Result<Box<dyn ToolHandler>, ToolError> + Send + Sync + 'static,
    {
        let name = name.into();
        let replaced = self.factories.insert(name.clone(), Arc::new(factory)).is_some();
        tracing::info!(target: "sakina::registry", tool = %name, replaced, "tool registered");
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds a fresh handler, replacing any active instance of the same name.
    pub fn try_create(&mut self, name: &str, deps: &ToolDeps) -> Result<&mut dyn ToolHandler, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;
        let handler = factory(deps).map_err(|source| RegistryError::Factory {
            name: name.to_string(),
            source,
        })?;
        tracing::info!(target: "sakina::registry", tool = name, "tool instance created");
        let slot = match self.active.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(handler);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(handler),
        };
        Ok(slot.as_mut())
    }

    /// Like [`try_create`](Self::try_create) but logs failures and yields `None`.
    pub fn create(&mut self, name: &str, deps: &ToolDeps) -> Option<&mut dyn ToolHandler> {
        match self.try_create(name, deps) {
            Ok(handler) => Some(handler),
            Err(err) => {
                tracing::error!(target: "sakina::registry", tool = name, error = %err, "tool creation failed");
                None
            }
        }
    }

    /// Active handler, created on first use.
    pub fn get_or_create(&mut self, name: &str, deps: &ToolDeps) -> Option<&mut dyn ToolHandler> {
        if !self.active.contains_key(name) {
            self.create(name, deps)?;
        }
        match self.active.get_mut(name) {
            Some(handler) => Some(handler.as_mut()),
            None => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolHandler> {
        match self.active.get(name) {
            Some(handler) => Some(handler.as_ref()),
            None => None,
        }
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut dyn ToolHandler> {
        match self.active.get_mut(name) {
            Some(handler) => Some(handler.as_mut()),
            None => None,
        }
    }

    pub fn list_registered(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn list_active(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }

    /// Active handlers in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn ToolHandler)> {
        self.active.iter().map(|(name, h)| (name.as_str(), h.as_ref()))
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.active.values().map(|h| h.definition()).collect()
    }

    /// Definitions for the named tools that are active, in the order given.
    pub fn definitions_for(&self, names: &[&str]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.active.get(*name))
            .map(|h| h.definition())
            .collect()
    }

    pub fn crisis_status(&self) -> CrisisStatus {
        let mut status = CrisisStatus::default();
        for (name, handler) in &self.active {
            let flags = handler.record().flags();
            if flags.crisis_detected {
                status.any_crisis_detected = true;
                status.tools_with_crisis.push(name.clone());
            }
            if flags.emergency_escalation_needed {
                status.emergency_escalation_needed = true;
                status.tools_with_escalation.push(name.clone());
            }
        }
        status
    }

    pub fn reset_crisis_flags(&mut self) {
        for handler in self.active.values_mut() {
            handler.reset_crisis_flags();
        }
        tracing::info!(target: "sakina::registry", tools = self.active.len(), "crisis flags reset");
    }

    pub fn deactivate(&mut self, name: &str) -> bool {
        let removed = self.active.remove(name).is_some();
        if removed {
            tracing::info!(target: "sakina::registry", tool = name, "tool deactivated");
        }
        removed
    }

    pub fn deactivate_all(&mut self) {
        let count = self.active.len();
        self.active.clear();
        tracing::info!(target: "sakina::registry", count, "all tools deactivated");
    }

    pub fn clinical_data(&self) -> Map<String, Value> {
        self.active
            .iter()
            .map(|(name, h)| (name.clone(), h.clinical_data()))
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            registered_tools: self.factories.len(),
            active_tools: self.active.len(),
            tool_names: self.list_registered(),
            active_tool_names: self.list_active(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CulturalContext;
    use crate::tools::request::{CrisisAction, CrisisArgs};
    use crate::tools::{ToolContext, ToolRequest};

    #[test]
    fn test_default_tools_registered_not_active() {
        let registry = ToolRegistry::with_default_tools();
        assert_eq!(
            registry.list_registered(),
            vec!["cbt_techniques", "crisis_detection", "emotional_analysis", "session_management"]
        );
        assert!(registry.list_active().is_empty());
        assert!(registry.tool_definitions().is_empty());
    }

    #[test]
    fn test_create_unknown_or_failing_yields_none() {
        let mut registry = ToolRegistry::new();
        registry.register("broken", |_| Err(ToolError::Construction("no backend".into())));
        let deps = ToolDeps::default();
        assert!(registry.create("missing", &deps).is_none());
        assert!(registry.create("broken", &deps).is_none());
        assert!(matches!(
            registry.try_create("broken", &deps),
            Err(RegistryError::Factory { .. })
        ));
        assert!(registry.list_active().is_empty());
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = ToolRegistry::with_default_tools();
        registry.register(ToolKind::CbtTechniques.key(), |_| {
            Err(ToolError::Construction("disabled".into()))
        });
        assert_eq!(registry.stats().registered_tools, 4);
        assert!(registry.create("cbt_techniques", &ToolDeps::default()).is_none());
    }

    #[tokio::test]
    async fn test_crisis_status_and_explicit_reset() {
        let mut registry = ToolRegistry::with_default_tools();
        let deps = ToolDeps::default();
        registry.get_or_create("crisis_detection", &deps).unwrap();
        registry.get_or_create("cbt_techniques", &deps).unwrap();

        let cultural = CulturalContext::new();
        let ctx = ToolContext::new(&cultural);
        let handler = registry.get_mut("crisis_detection").unwrap();
        handler
            .execute(
                ToolRequest::Crisis {
                    action: CrisisAction::AssessRisk,
                    args: CrisisArgs {
                        user_input: Some("I want to die".into()),
                        ..Default::default()
                    },
                },
                &ctx,
            )
            .await
            .unwrap();

        let status = registry.crisis_status();
        assert!(status.any_crisis_detected);
        assert_eq!(status.tools_with_crisis, vec!["crisis_detection"]);

        registry.reset_crisis_flags();
        assert_eq!(registry.crisis_status(), CrisisStatus::default());
        assert_eq!(registry.clinical_data().len(), 2);
    }

    #[test]
    fn test_deactivate() {
        let mut registry = ToolRegistry::with_default_tools();
        let deps = ToolDeps::default();
        registry.create("emotional_analysis", &deps).unwrap();
        registry.create("session_management", &deps).unwrap();
        assert!(registry.deactivate("emotional_analysis"));
        assert!(!registry.deactivate("emotional_analysis"));
        assert_eq!(registry.list_active(), vec!["session_management"]);
        registry.deactivate_all();
        assert_eq!(registry.stats().active_tools, 0);
    }
}
