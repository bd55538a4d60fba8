// crates/cosmo-tester-core/src/state.rs
// ============================================================================
// Module: Manager State
// Description: Snapshots of manager entity collections and their delta.
// Purpose: Let tests assert which entities an operation created.
// Dependencies: serde, serde_json, tracing
// ============================================================================

//! ## Overview
//! A [`ManagerState`] maps collection names to entities keyed by id. The
//! delta between two states keeps only the entities of `after` whose ids were
//! absent from `before`. It answers "what is new" and deliberately reports
//! neither removed nor modified entities.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;
use tracing::info;

use crate::error::HarnessError;
use crate::rest::ManagerClient;
use crate::rest::entity_id;

// ============================================================================
// SECTION: Collections
// ============================================================================

/// Blueprints by id.
pub const BLUEPRINTS: &str = "blueprints";
/// Deployments by id.
pub const DEPLOYMENTS: &str = "deployments";
/// Node instances by id.
pub const NODES: &str = "nodes";
/// Node-instance lists by deployment id.
pub const DEPLOYMENT_NODES: &str = "deployment_nodes";
/// Node instances by id, grouped by deployment id.
pub const NODE_STATE: &str = "node_state";

/// Entities of one collection keyed by id.
pub type Collection = BTreeMap<String, Value>;

// ============================================================================
// SECTION: State
// ============================================================================

/// Entity collections captured from a manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ManagerState {
    /// Collections by name.
    collections: BTreeMap<String, Collection>,
}

impl ManagerState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entity.
    pub fn insert(&mut self, collection: &str, id: impl Into<String>, entity: Value) {
        self.collections.entry(collection.to_string()).or_default().insert(id.into(), entity);
    }

    /// Returns a collection by name.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Returns the ids in a collection, sorted.
    #[must_use]
    pub fn ids(&self, collection: &str) -> Vec<&str> {
        self.collections
            .get(collection)
            .map(|entities| entities.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns whether every collection is empty.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.collections.values().all(BTreeMap::is_empty)
    }

    /// Returns the entities of `self` whose ids are absent from `before`.
    #[must_use]
    pub fn delta_since(&self, before: &Self) -> Self {
        let mut delta = self.clone();
        for (name, entities) in &mut delta.collections {
            if let Some(previous) = before.collections.get(name) {
                entities.retain(|id, _| !previous.contains_key(id));
            }
        }
        delta
    }
}

/// Computes `after` minus the ids present in `before`, per collection.
#[must_use]
pub fn delta(before: &ManagerState, after: &ManagerState) -> ManagerState {
    after.delta_since(before)
}

/// Before/after states around one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateCapture {
    /// State captured before the operation.
    pub before: Option<ManagerState>,
    /// State captured after the operation.
    pub after: Option<ManagerState>,
}

impl StateCapture {
    /// Returns the delta when both states were captured.
    #[must_use]
    pub fn delta(&self) -> Option<ManagerState> {
        match (&self.before, &self.after) {
            (Some(before), Some(after)) => Some(after.delta_since(before)),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Fetch
// ============================================================================

/// Captures blueprints, deployments and node instances from the manager.
///
/// # Errors
///
/// Returns [`HarnessError::Rest`] when any collection query fails.
pub fn fetch_manager_state(client: &dyn ManagerClient) -> Result<ManagerState, HarnessError> {
    info!("fetching manager current state");
    let mut state = ManagerState::new();
    for kind in [BLUEPRINTS, DEPLOYMENTS, NODES, DEPLOYMENT_NODES, NODE_STATE] {
        state.collections.entry(kind.to_string()).or_default();
    }
    for blueprint in client.blueprints()? {
        insert_entity(&mut state, BLUEPRINTS, blueprint);
    }
    let deployments = client.deployments()?;
    let deployment_ids: Vec<String> =
        deployments.iter().filter_map(|deployment| entity_id(deployment).map(str::to_string)).collect();
    for deployment in deployments {
        insert_entity(&mut state, DEPLOYMENTS, deployment);
    }
    for deployment_id in deployment_ids {
        let instances = client.node_instances(&deployment_id)?;
        let mut by_id = Map::new();
        for instance in &instances {
            if let Some(id) = entity_id(instance) {
                by_id.insert(id.to_string(), instance.clone());
                state.insert(NODES, id, instance.clone());
            }
        }
        state.insert(NODE_STATE, deployment_id.clone(), Value::Object(by_id));
        state.insert(DEPLOYMENT_NODES, deployment_id, Value::Array(instances));
    }
    Ok(state)
}

/// Inserts an entity under its `id`; entities without one are skipped.
fn insert_entity(state: &mut ManagerState, collection: &str, entity: Value) {
    match entity_id(&entity).map(str::to_string) {
        Some(id) => state.insert(collection, id, entity),
        None => debug!(collection, "skipping entity without id"),
    }
}
