//! Versioned engine snapshots.
//!
//! Between requests an engine only exists as a [`MethodSnapshot`]: an
//! explicit serde record carrying a format version and the engine's state.
//! Sessions store it as an opaque JSON value so that an unreadable snapshot
//! breaks only its own session, never the whole store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use st_domain::error::{Error, Result};

use crate::engine::MethodEngine;
use crate::engines::{EvolutionaryMethod, NautilusNavigator, ReferencePointMethod, SynchronousNimbus};
use crate::family::MethodFamily;

/// Bump whenever an engine state changes shape.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "snake_case")]
pub enum EngineState {
    ReferencePoint(ReferencePointMethod),
    Nimbus(SynchronousNimbus),
    Navigator(NautilusNavigator),
    Evolutionary(EvolutionaryMethod),
}

impl EngineState {
    pub fn family(&self) -> MethodFamily {
        match self {
            Self::ReferencePoint(_) | Self::Nimbus(_) => MethodFamily::Scalarizing,
            Self::Navigator(_) => MethodFamily::Navigation,
            Self::Evolutionary(_) => MethodFamily::Population,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSnapshot {
    pub version: u32,
    pub family: MethodFamily,
    pub state: EngineState,
}

impl MethodSnapshot {
    pub fn new(state: EngineState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            family: state.family(),
            state,
        }
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse a stored snapshot. The version is checked before the state so
    /// that a snapshot from another format fails with a clear message.
    pub fn from_value(value: &Value) -> Result<Self> {
        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Serialization("snapshot has no version".into()))?;
        if version != u64::from(SNAPSHOT_VERSION) {
            return Err(Error::Serialization(format!(
                "snapshot version {version} is not supported (expected {SNAPSHOT_VERSION})"
            )));
        }
        let snapshot: Self = serde_json::from_value(value.clone())
            .map_err(|e| Error::Serialization(format!("unreadable snapshot: {e}")))?;
        if snapshot.family != snapshot.state.family() {
            return Err(Error::Serialization(format!(
                "snapshot tagged {} holds a {} engine",
                snapshot.family,
                snapshot.state.family()
            )));
        }
        Ok(snapshot)
    }

    /// Rebuild a working engine.
    pub fn restore(self) -> Result<Box<dyn MethodEngine>> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::Serialization(format!(
                "snapshot version {} is not supported",
                self.version
            )));
        }
        Ok(match self.state {
            EngineState::ReferencePoint(e) => Box::new(e),
            EngineState::Nimbus(e) => Box::new(e),
            EngineState::Navigator(e) => Box::new(e),
            EngineState::Evolutionary(e) => Box::new(e),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::model::fixtures;
    use st_domain::config::MethodsConfig;

    fn navigator_snapshot() -> MethodSnapshot {
        let engine = NautilusNavigator::new(&fixtures::discrete_problem(), &MethodsConfig::default()).unwrap();
        engine.snapshot()
    }

    #[test]
    fn value_roundtrip_keeps_the_state() {
        let snapshot = navigator_snapshot();
        let value = snapshot.to_value().unwrap();
        assert_eq!(value["version"], SNAPSHOT_VERSION);
        assert_eq!(value["family"], "navigation");
        assert_eq!(value["state"]["engine"], "navigator");
        assert_eq!(MethodSnapshot::from_value(&value).unwrap(), snapshot);
    }

    #[test]
    fn unknown_version_is_a_serialization_error() {
        let mut value = navigator_snapshot().to_value().unwrap();
        value["version"] = serde_json::json!(99);
        let err = MethodSnapshot::from_value(&value).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)), "{err}");
    }

    #[test]
    fn mismatched_family_tag_is_rejected() {
        let mut value = navigator_snapshot().to_value().unwrap();
        value["family"] = serde_json::json!("population");
        assert!(matches!(
            MethodSnapshot::from_value(&value),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn garbage_state_is_rejected() {
        let value = serde_json::json!({ "version": SNAPSHOT_VERSION, "family": "navigation", "state": 3 });
        assert!(matches!(
            MethodSnapshot::from_value(&value),
            Err(Error::Serialization(_))
        ));
    }
}
