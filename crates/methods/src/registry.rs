//! Method registry.
//!
//! Maps a method name to everything the session controller needs to know
//! about it without inspecting the engine: its family, whether it issues one
//! request or a tuple, which problem kinds it accepts, and how to build it.

use std::collections::HashMap;

use st_domain::config::MethodsConfig;
use st_domain::error::{Error, Result};
use st_domain::problem::{ProblemKind, ProblemRecord};

use crate::engine::MethodEngine;
use crate::engines::{
    EvolutionaryMethod, EvolutionaryVariant, NautilusNavigator, ReferencePointMethod,
    SynchronousNimbus,
};
use crate::family::{MethodFamily, RequestShape};

type Constructor = fn(&ProblemRecord, &MethodsConfig) -> Result<Box<dyn MethodEngine>>;

const ANY_KIND: &[ProblemKind] = &[ProblemKind::Analytical, ProblemKind::Discrete];
const DISCRETE: &[ProblemKind] = &[ProblemKind::Discrete];
const ANALYTICAL: &[ProblemKind] = &[ProblemKind::Analytical];

#[derive(Clone)]
pub struct MethodSpec {
    pub name: &'static str,
    pub family: MethodFamily,
    pub shape: RequestShape,
    pub accepts: &'static [ProblemKind],
    construct: Constructor,
}

impl std::fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("shape", &self.shape)
            .field("accepts", &self.accepts)
            .finish()
    }
}

impl MethodSpec {
    pub fn accepts(&self, kind: ProblemKind) -> bool {
        self.accepts.contains(&kind)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constructors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn reference_point(p: &ProblemRecord, c: &MethodsConfig) -> Result<Box<dyn MethodEngine>> {
    Ok(Box::new(ReferencePointMethod::new(p, c)?))
}

fn nimbus(p: &ProblemRecord, c: &MethodsConfig) -> Result<Box<dyn MethodEngine>> {
    Ok(Box::new(SynchronousNimbus::new(p, c)?))
}

fn navigator(p: &ProblemRecord, c: &MethodsConfig) -> Result<Box<dyn MethodEngine>> {
    Ok(Box::new(NautilusNavigator::new(p, c)?))
}

fn rvea(p: &ProblemRecord, c: &MethodsConfig) -> Result<Box<dyn MethodEngine>> {
    Ok(Box::new(EvolutionaryMethod::new(p, c, EvolutionaryVariant::Rvea, false)?))
}

fn irvea(p: &ProblemRecord, c: &MethodsConfig) -> Result<Box<dyn MethodEngine>> {
    Ok(Box::new(EvolutionaryMethod::new(p, c, EvolutionaryVariant::Rvea, true)?))
}

fn nsgaiii(p: &ProblemRecord, c: &MethodsConfig) -> Result<Box<dyn MethodEngine>> {
    Ok(Box::new(EvolutionaryMethod::new(p, c, EvolutionaryVariant::Nsga3, false)?))
}

fn insgaiii(p: &ProblemRecord, c: &MethodsConfig) -> Result<Box<dyn MethodEngine>> {
    Ok(Box::new(EvolutionaryMethod::new(p, c, EvolutionaryVariant::Nsga3, true)?))
}

fn spec(
    name: &'static str,
    family: MethodFamily,
    accepts: &'static [ProblemKind],
    construct: Constructor,
) -> MethodSpec {
    let shape = match family {
        MethodFamily::Population => RequestShape::Tuple,
        MethodFamily::Scalarizing | MethodFamily::Navigation => RequestShape::Single,
    };
    MethodSpec {
        name,
        family,
        shape,
        accepts,
        construct,
    }
}

fn builtin_specs() -> Vec<MethodSpec> {
    vec![
        spec("reference_point_method", MethodFamily::Scalarizing, ANY_KIND, reference_point),
        // Alias of the reference point method.
        spec("reference_point_method_alt", MethodFamily::Scalarizing, ANY_KIND, reference_point),
        spec("synchronous_nimbus", MethodFamily::Scalarizing, ANY_KIND, nimbus),
        spec("nautilus_navigator", MethodFamily::Navigation, DISCRETE, navigator),
        spec("rvea", MethodFamily::Population, ANALYTICAL, rvea),
        spec("irvea", MethodFamily::Population, ANALYTICAL, irvea),
        spec("nsgaiii", MethodFamily::Population, ANALYTICAL, nsgaiii),
        spec("insgaiii", MethodFamily::Population, ANALYTICAL, insgaiii),
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MethodRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds every method a session can be created with.
pub struct MethodRegistry {
    methods: HashMap<&'static str, MethodSpec>,
}

impl MethodRegistry {
    /// Registry with all built-in methods.
    pub fn builtin() -> Self {
        let methods = builtin_specs().into_iter().map(|s| (s.name, s)).collect();
        let registry = Self { methods };
        tracing::debug!(methods = ?registry.names(), "method registry ready");
        registry
    }

    /// Sorted names of all registered methods.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().map(|n| n.to_string()).collect();
        names.sort();
        names
    }

    pub fn get(&self, name: &str) -> Result<&MethodSpec> {
        self.methods.get(name).ok_or_else(|| Error::UnknownMethod {
            name: name.to_string(),
            available: self.names(),
        })
    }

    /// Resolve a method and build a fresh engine for `problem`.
    ///
    /// Fails with [`Error::IncompatibleProblemType`] when the method does not
    /// accept the problem's kind.
    pub fn construct(
        &self,
        name: &str,
        problem: &ProblemRecord,
        config: &MethodsConfig,
    ) -> Result<(&MethodSpec, Box<dyn MethodEngine>)> {
        let spec = self.get(name)?;
        if !spec.accepts(problem.kind) {
            return Err(Error::IncompatibleProblemType(format!(
                "{} does not accept {} problems",
                spec.name, problem.kind
            )));
        }
        let engine = (spec.construct)(problem, config)?;
        Ok((spec, engine))
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::model::fixtures;

    #[test]
    fn unknown_method_lists_available() {
        let registry = MethodRegistry::builtin();
        let err = registry.get("bogus").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bogus"));
        assert!(msg.contains("nautilus_navigator"));
        match err {
            Error::UnknownMethod { available, .. } => assert_eq!(available.len(), 8),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn navigator_refuses_analytical_problems() {
        let registry = MethodRegistry::builtin();
        let err = registry
            .construct("nautilus_navigator", &fixtures::dtlz2_problem(), &MethodsConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::IncompatibleProblemType(_)));
    }

    #[test]
    fn evolutionary_methods_refuse_tables() {
        let registry = MethodRegistry::builtin();
        for name in ["rvea", "irvea", "nsgaiii", "insgaiii"] {
            let err = registry
                .construct(name, &fixtures::discrete_problem(), &MethodsConfig::default())
                .err()
                .unwrap();
            assert!(matches!(err, Error::IncompatibleProblemType(_)), "{name}");
        }
    }

    #[test]
    fn shapes_follow_families() {
        let registry = MethodRegistry::builtin();
        for name in registry.names() {
            let spec = registry.get(&name).unwrap();
            let expected = match spec.family {
                MethodFamily::Population => RequestShape::Tuple,
                _ => RequestShape::Single,
            };
            assert_eq!(spec.shape, expected, "{name}");
        }
    }

    #[test]
    fn constructed_engine_reports_its_family() {
        let registry = MethodRegistry::builtin();
        let (spec, engine) = registry
            .construct("synchronous_nimbus", &fixtures::discrete_problem(), &MethodsConfig::default())
            .unwrap();
        assert_eq!(engine.family(), spec.family);
        assert_eq!(engine.snapshot().family, MethodFamily::Scalarizing);
    }
}
