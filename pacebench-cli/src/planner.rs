//! Run Planner
//!
//! Selects the suites to run and the setups declared before each of them.
//!
//! - `--include` patterns select suites by name; none means every suite
//! - `--setup` patterns select setups by name; none means every setup
//!
//! Suites keep registry order (source file, then line). Setups are applied
//! in name order so every worker rebuilds the same tree.

use pacebench_core::{NameFilter, SetupDef, SuiteDef, SuitePlan};

/// Suites to run, each with its setups
#[derive(Debug, Default)]
pub struct RunPlan {
    /// Suites in execution order
    pub suites: Vec<SuitePlan>,
}

impl RunPlan {
    /// `true` when nothing was selected
    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}

/// Build the run plan from registered suites and setups
pub fn build_plan(
    suites: impl IntoIterator<Item = &'static SuiteDef>,
    setups: impl IntoIterator<Item = &'static SetupDef>,
    include: &NameFilter,
    setup_filter: &NameFilter,
) -> RunPlan {
    let mut selected_setups: Vec<_> = setups
        .into_iter()
        .filter(|s| setup_filter.enables([s.name]))
        .collect();
    selected_setups.sort_by_key(|s| s.name);

    let suites = suites
        .into_iter()
        .filter(|s| include.enables([s.name]))
        .map(|suite| SuitePlan {
            suite,
            setups: selected_setups.clone(),
        })
        .collect();

    RunPlan { suites }
}
