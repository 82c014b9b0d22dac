//! The Engine: owns the Stream Keeper, the current scope, the year
//! counter, variable bindings, and the RecalcKit collaborators. This
//! module holds construction, scope navigation, year advancement, and
//! stream/variable reads; [`commands`] holds the mutating command API.

pub mod commands;
pub mod variables;
pub mod year;

use std::collections::HashSet;

use log::info;
use rust_decimal::Decimal;

use crate::error::{EngineError, Res};
use crate::quantity::Quantity;
use crate::serializer::{EngineResult, Serializer};
use crate::streams::types::{Scope, StreamName};
use crate::streams::StreamKeeper;
use crate::units::{StateContext, UnitConverter};
use crate::engine::variables::VariableStore;

pub use year::YearMatcher;

pub struct Engine {
    pub(crate) start_year: i32,
    pub(crate) end_year: i32,
    pub(crate) current_year: i32,
    pub(crate) keeper: StreamKeeper,
    pub(crate) converter: UnitConverter,
    pub(crate) scope: Scope,
    pub(crate) scenario: String,
    pub(crate) trial: u32,
    pub(crate) variables: VariableStore,
    policies: HashSet<String>,
    scenarios: HashSet<String>,
}

impl Engine {
    pub fn new(start_year: i32, end_year: i32) -> Self {
        info!("new engine: years {}..={}", start_year, end_year);
        let mut policies = HashSet::new();
        policies.insert("default".to_string());
        Self {
            start_year,
            end_year,
            current_year: start_year,
            keeper: StreamKeeper::new(),
            converter: UnitConverter::new(),
            scope: Scope::default(),
            scenario: "default".to_string(),
            trial: 0,
            variables: VariableStore::new(),
            policies,
            scenarios: HashSet::new(),
        }
    }

    /// Registers a named policy stanza so `setStanza` can validate against
    /// it — the driver calls this once per stanza discovered while
    /// resolving the parsed script, before running commands against it.
    pub fn register_policy(&mut self, name: impl Into<String>) {
        self.policies.insert(name.into());
    }

    /// Registers a named scenario so `setScenario` can validate against
    /// it, mirroring `register_policy`.
    pub fn register_scenario(&mut self, name: impl Into<String>) {
        self.scenarios.insert(name.into());
    }

    pub fn set_scenario(&mut self, name: impl Into<String>, trial: u32) -> Res<()> {
        let name = name.into();
        if !self.scenarios.is_empty() && !self.scenarios.contains(&name) {
            return Err(EngineError::ScenarioNotFound(name));
        }
        self.scenario = name;
        self.trial = trial;
        Ok(())
    }

    pub fn set_stanza(&mut self, policy_name: impl Into<String>) -> Res<()> {
        let name = policy_name.into();
        if !self.policies.contains(&name) {
            return Err(EngineError::PolicyNotFound(name));
        }
        self.scope.stanza = Some(name);
        Ok(())
    }

    pub fn set_application(&mut self, name: impl Into<String>) {
        self.scope.application = Some(name.into());
    }

    pub fn set_substance(&mut self, name: impl Into<String>) {
        self.scope.substance = Some(name.into());
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub(crate) fn years_elapsed(&self) -> Decimal {
        Decimal::from(self.current_year - self.start_year)
    }

    /// Advances `priorEquipment <- equipment`, clears recalculable
    /// streams, increments the year.
    pub fn increment_year(&mut self) {
        info!("incrementing year {} -> {}", self.current_year, self.current_year + 1);
        self.keeper.roll_year();
        self.current_year += 1;
    }

    pub fn is_done(&self) -> bool {
        self.current_year > self.end_year
    }

    pub fn get_results(&self) -> Vec<EngineResult> {
        let serializer = Serializer::new();
        self.keeper
            .keys_with_enabled_stream()
            .into_iter()
            .filter_map(|key| {
                serializer
                    .snapshot(
                        &self.keeper,
                        &self.converter,
                        &key,
                        self.current_year,
                        &self.scenario,
                        self.trial,
                    )
                    .ok()
                    .flatten()
            })
            .collect()
    }

    /// Reads a stream in its canonical unit, or converts to `units` when
    /// given. Uses the current scope unless `scope` overrides it.
    pub fn get_stream(&self, name: StreamName, scope: Option<&Scope>, units: Option<&str>) -> Res<Quantity> {
        let scope = scope.unwrap_or(&self.scope);
        let key = scope.use_key()?;
        let value = self.keeper.get_stream(&key, name);
        match units {
            None => Ok(value),
            Some(target) => {
                let state = StateContext::base(&self.keeper, &key, self.years_elapsed());
                self.converter.convert(&value, target, &state)
            }
        }
    }

    pub fn define_variable(&mut self, name: &str) {
        self.variables.define(&self.scope, name);
    }

    pub fn set_variable(&mut self, name: &str, value: Quantity) {
        self.variables.set(&self.scope, name, value);
    }

    pub fn get_variable(&self, name: &str) -> Quantity {
        self.variables.get(&self.scope, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_engine_starts_at_start_year_and_is_not_done() {
        let engine = Engine::new(2025, 2030);
        assert_eq!(engine.current_year(), 2025);
        assert!(!engine.is_done());
    }

    #[test]
    fn increment_year_past_end_marks_done() {
        let mut engine = Engine::new(2025, 2025);
        assert!(!engine.is_done());
        engine.increment_year();
        assert!(engine.is_done());
    }

    #[test]
    fn set_stanza_rejects_unregistered_policy() {
        let mut engine = Engine::new(2025, 2030);
        assert!(engine.set_stanza("default").is_ok());
        assert!(matches!(engine.set_stanza("Phasedown"), Err(EngineError::PolicyNotFound(_))));
        engine.register_policy("Phasedown");
        assert!(engine.set_stanza("Phasedown").is_ok());
    }

    #[test]
    fn set_scenario_unvalidated_until_registered() {
        let mut engine = Engine::new(2025, 2030);
        assert!(engine.set_scenario("BAU", 0).is_ok());
        engine.register_scenario("BAU");
        assert!(matches!(engine.set_scenario("Other", 0), Err(EngineError::ScenarioNotFound(_))));
    }
}
