//! Multi-pass scenario runner
//!
//! Repeats the selected scenarios `passes` times against one store and stops
//! at the first pass that fails. Pass `i` (1-based) seeds its contention
//! workers from `seed_base + (i - 1) * threads`, so every worker of every
//! pass draws a distinct stream and a single failing pass can be replayed
//! with `--seed <pass seed> --passes 1`.

use crate::contention::{ContentionConfig, ContentionReport, ContentionScenario};
use crate::shutdown::{ShutdownReport, ShutdownScenario};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use stress_core::{Failure, HarnessConfig, HarnessError, HarnessResult, Verdict};
use stress_store::Store;
use tracing::{error, info};

/// Which scenarios a pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioSelection {
    /// Contention scenario only
    Contention,
    /// Shutdown scenario only
    Shutdown,
    /// Contention, then shutdown
    #[default]
    All,
}

impl ScenarioSelection {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioSelection::Contention => "contention",
            ScenarioSelection::Shutdown => "shutdown",
            ScenarioSelection::All => "all",
        }
    }

    fn runs_contention(&self) -> bool {
        matches!(self, ScenarioSelection::Contention | ScenarioSelection::All)
    }

    fn runs_shutdown(&self) -> bool {
        matches!(self, ScenarioSelection::Shutdown | ScenarioSelection::All)
    }
}

impl fmt::Display for ScenarioSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioSelection {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "contention" => Ok(ScenarioSelection::Contention),
            "shutdown" => Ok(ScenarioSelection::Shutdown),
            "all" => Ok(ScenarioSelection::All),
            other => Err(HarnessError::Config(format!(
                "unknown scenario '{}' (expected contention, shutdown or all)",
                other
            ))),
        }
    }
}

/// Reports of one pass
#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
    /// 1-based pass number
    pub pass: usize,
    /// Seed base the contention workers of this pass used
    pub seed_base: u64,
    /// Contention report, if the scenario was selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contention: Option<ContentionReport>,
    /// Shutdown report, if the scenario was selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown: Option<ShutdownReport>,
}

impl PassOutcome {
    /// Verdicts of the scenarios that ran, in run order
    pub fn verdicts(&self) -> Vec<&Verdict> {
        let contention = self.contention.as_ref().map(|r| &r.verdict);
        let shutdown = self.shutdown.as_ref().map(|r| &r.verdict);
        contention.into_iter().chain(shutdown).collect()
    }

    /// True iff every scenario of the pass passed
    pub fn is_success(&self) -> bool {
        self.verdicts().iter().all(|v| v.is_success())
    }
}

/// Outcome of a multi-pass run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Scenarios each pass ran
    pub selection: ScenarioSelection,
    /// Passes requested
    pub requested: usize,
    /// Passes that ran; the last one is the failing pass if any failed
    pub passes: Vec<PassOutcome>,
}

impl RunSummary {
    /// True iff every executed pass passed
    pub fn is_success(&self) -> bool {
        self.passes.iter().all(PassOutcome::is_success)
    }

    /// Every recorded failure with its scenario name
    pub fn failures(&self) -> Vec<(&str, &Failure)> {
        self.passes
            .iter()
            .flat_map(|pass| pass.verdicts())
            .flat_map(|verdict| {
                verdict
                    .failures
                    .iter()
                    .map(move |failure| (verdict.scenario.as_str(), failure))
            })
            .collect()
    }

    /// The first failing verdict as [`HarnessError::ScenarioFailed`]
    pub fn ensure_success(&self) -> HarnessResult<()> {
        self.passes
            .iter()
            .flat_map(|pass| pass.verdicts())
            .try_for_each(Verdict::ensure_success)
    }
}

/// Seed base of pass `pass` (1-based)
pub fn pass_seed(config: &HarnessConfig, pass: usize) -> u64 {
    let offset = (pass.saturating_sub(1) as u64).wrapping_mul(config.threads as u64);
    config.seed_base.wrapping_add(offset)
}

/// Run `selection` for `config.passes` passes against `store`.
///
/// Scenario failures end up in the summary; `Err` means the harness itself
/// could not run (invalid config, setup I/O, spawn failure).
pub fn run_passes<S>(
    store: &Arc<S>,
    config: &HarnessConfig,
    selection: ScenarioSelection,
) -> HarnessResult<RunSummary>
where
    S: Store + 'static,
{
    config.validate()?;
    let mut summary = RunSummary {
        selection,
        requested: config.passes,
        passes: Vec::with_capacity(config.passes),
    };

    for pass in 1..=config.passes {
        let seed_base = pass_seed(config, pass);
        info!(
            target: "stress::runner",
            pass,
            passes = config.passes,
            seed_base,
            scenarios = %selection,
            "Pass #{}", pass
        );

        let contention = if selection.runs_contention() {
            let scenario = ContentionScenario::new(ContentionConfig {
                seed_base,
                ..ContentionConfig::from_harness(config)
            });
            Some(scenario.run(store)?)
        } else {
            None
        };
        let shutdown = if selection.runs_shutdown() {
            Some(ShutdownScenario::from_harness(config).run(store)?)
        } else {
            None
        };

        let outcome = PassOutcome {
            pass,
            seed_base,
            contention,
            shutdown,
        };
        let passed = outcome.is_success();
        summary.passes.push(outcome);
        if !passed {
            error!(
                target: "stress::runner",
                pass,
                seed_base,
                "Pass #{} failed, stopping", pass
            );
            break;
        }
    }

    info!(
        target: "stress::runner",
        success = summary.is_success(),
        executed = summary.passes.len(),
        requested = summary.requested,
        "Run finished"
    );
    Ok(summary)
}
