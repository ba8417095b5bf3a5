// src/test_support.rs
//
// Fixtures shared by unit and router tests. Seven management actions, so the
// As-Is token is "80" and single-byte tokens such as "A1" are valid.

use crate::catchment::{CatchmentModel, ScenarioConfig};

pub const SCENARIO_TOML: &str = r#"
[Scenario]
Name = "Upper Burdekin"

[Model]
Type = "CatchmentModel"

[[Model.DecisionVariables]]
Name = "SedimentLoad"
UnitOfMeasure = "t/yr"
Value = 1000.0

[[Model.DecisionVariables]]
Name = "ImplementationCost"
UnitOfMeasure = "AUD"
Value = 0.0

[[Model.PlanningUnits]]
Id = 12
  [[Model.PlanningUnits.Actions]]
  Type = "RiverBankRestoration"
  Effects = { SedimentLoad = -50.0, ImplementationCost = 10000.0 }
  [[Model.PlanningUnits.Actions]]
  Type = "HillSlopeRestoration"
  Effects = { SedimentLoad = -30.0, ImplementationCost = 8000.0 }

[[Model.PlanningUnits]]
Id = 17
  [[Model.PlanningUnits.Actions]]
  Type = "GullyRestoration"
  Effects = { SedimentLoad = -120.0, ImplementationCost = 25000.0 }
  [[Model.PlanningUnits.Actions]]
  Type = "RiverBankRestoration"
  Effects = { SedimentLoad = -60.0, ImplementationCost = 12000.0 }

[[Model.PlanningUnits]]
Id = 23
  [[Model.PlanningUnits.Actions]]
  Type = "HillSlopeRestoration"
  Effects = { SedimentLoad = -25.0, ImplementationCost = 7000.0 }
  [[Model.PlanningUnits.Actions]]
  Type = "WetlandsEstablishment"
  Effects = { SedimentLoad = -80.0, ImplementationCost = 30000.0 }
  [[Model.PlanningUnits.Actions]]
  Type = "GullyRestoration"
  Effects = { SedimentLoad = -110.0, ImplementationCost = 22000.0 }

[[Model.Limits]]
Variable = "ImplementationCost"
Maximum = 60000.0
"#;

/// Same catchment with an annealing section, for job runs.
pub fn job_scenario_toml(seed: u64) -> String {
    format!(
        "{SCENARIO_TOML}\n[Annealer]\nObjective = \"SedimentLoad\"\nTemperature = 50.0\nCoolingFactor = 0.95\nMaximumIterations = 200\nSeed = {seed}\n"
    )
}

/// Solution-set table consistent with `SCENARIO_TOML`. "A1" activates
/// RiverBankRestoration at 12 and WetlandsEstablishment at 23.
pub const SOLUTION_SET_CSV: &str = "\
Solution,SedimentLoad,ImplementationCost,Actions,Summary
As-Is,1000,0,80,Nothing active
Front-1,870,40000,A1,River bank and wetlands
Front-2,840,48000,A3,Adds hill slope at 12
";

pub fn reference_model() -> CatchmentModel {
    match ScenarioConfig::from_toml(SCENARIO_TOML).and_then(|config| config.interpret()) {
        Ok(model) => model,
        Err(err) => panic!("fixture scenario must interpret: {err}"),
    }
}
