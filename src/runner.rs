//! Runs test cases, one tester at a time, against a runtime boundary.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use extharness_config::{CaseConfig, HarnessConfig, RunConfig};
use extharness_core::protocols::{Properties, RuntimeBoundary, TesterError};
use extharness_core::{LifecycleController, TesterRegistry};

use crate::cases::TestCaseRegistry;

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;

/// Result of one case.
#[derive(Debug, Clone)]
pub struct CaseReport {
    pub name: String,
    pub outcome: Result<(), String>,
    pub elapsed: Duration,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl fmt::Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(()) => write!(f, "PASS {} ({:.2?})", self.name, self.elapsed),
            Err(reason) => write!(f, "FAIL {} ({:.2?}): {}", self.name, self.elapsed, reason),
        }
    }
}

/// Reports of a whole run, in execution order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<CaseReport>,
    /// Cases not run because an earlier one failed.
    pub skipped: Vec<String>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.reports {
            writeln!(f, "{}", report)?;
        }
        for name in &self.skipped {
            writeln!(f, "SKIP {}", name)?;
        }
        write!(
            f,
            "{} passed, {} failed, {} skipped",
            self.passed(),
            self.failed(),
            self.skipped.len()
        )
    }
}

pub struct Runner {
    cases: Arc<TestCaseRegistry>,
    boundary: Arc<dyn RuntimeBoundary>,
    testers: Arc<TesterRegistry>,
    timeout: Option<Duration>,
    fail_fast: bool,
}

impl Runner {
    pub fn new(cases: Arc<TestCaseRegistry>, boundary: Arc<dyn RuntimeBoundary>, run: &RunConfig) -> Self {
        Self {
            cases,
            boundary,
            testers: Arc::new(TesterRegistry::new()),
            timeout: run.timeout_secs.map(Duration::from_secs),
            fail_fast: run.fail_fast,
        }
    }

    /// Decide which cases to run and with what settings.
    ///
    /// Names on the command line win and run even if disabled in the
    /// configuration. Otherwise the configured, enabled cases run; with no
    /// configured cases every registered case runs with its defaults.
    pub fn plan(&self, config: &HarnessConfig, selected: &[String]) -> Result<Vec<CaseConfig>, TesterError> {
        let plan: Vec<CaseConfig> = if !selected.is_empty() {
            selected
                .iter()
                .map(|name| {
                    config
                        .case(name)
                        .cloned()
                        .unwrap_or_else(|| CaseConfig::new(name.as_str()))
                })
                .collect()
        } else if config.cases.is_empty() {
            self.cases.list_ids().into_iter().map(CaseConfig::new).collect()
        } else {
            config.cases.iter().filter(|case| case.enabled).cloned().collect()
        };

        for case in &plan {
            self.cases.require(&case.name)?;
        }
        Ok(plan)
    }

    pub async fn run_all(&self, plan: &[CaseConfig]) -> RunSummary {
        let mut summary = RunSummary::default();
        for (index, case) in plan.iter().enumerate() {
            let report = self.run_case(case).await;
            let failed = !report.passed();
            summary.reports.push(report);
            if failed && self.fail_fast {
                summary.skipped = plan[index + 1..].iter().map(|c| c.name.clone()).collect();
                if !summary.skipped.is_empty() {
                    warn!(skipped = summary.skipped.len(), "Stopping after first failure");
                }
                break;
            }
        }
        summary
    }

    pub async fn run_case(&self, case: &CaseConfig) -> CaseReport {
        let started = Instant::now();
        let outcome = self.execute(case).await;
        let elapsed = started.elapsed();
        match &outcome {
            Ok(()) => info!(case = %case.name, ?elapsed, "Case passed"),
            Err(reason) => error!(case = %case.name, ?elapsed, %reason, "Case failed"),
        }
        CaseReport {
            name: case.name.clone(),
            outcome,
            elapsed,
        }
    }

    async fn execute(&self, case: &CaseConfig) -> Result<(), String> {
        let test_case = self.cases.require(&case.name).map_err(|e| e.to_string())?;
        let addon = case
            .addon
            .clone()
            .unwrap_or_else(|| test_case.default_addon().to_string());
        let properties = resolve_properties(test_case.default_properties(), case)?;

        let prepared = test_case.prepare(&properties);
        let mut controller =
            LifecycleController::new(self.testers.clone(), self.boundary.clone(), prepared.tester);
        controller
            .set_test_mode_single(&addon, &properties.to_json_string())
            .map_err(|e| format!("test mode rejected: {}", e))?;

        info!(case = %case.name, handle = %controller.handle(), %addon, "Running case");
        let run = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, controller.run()).await {
                Ok(result) => result,
                Err(_) => return Err(format!("timed out after {:?}", limit)),
            },
            None => controller.run().await,
        };
        run.map_err(|e| format!("run failed: {}", e))?;
        prepared.verdict.outcome()
    }
}

/// Case defaults overlaid with the configured properties.
fn resolve_properties(mut defaults: Properties, case: &CaseConfig) -> Result<Properties, String> {
    let configured = case
        .properties_json()
        .map_err(|e| format!("invalid properties: {}", e))?;
    defaults
        .merge_json_str(&configured)
        .map_err(|e| format!("invalid properties: {}", e))?;
    Ok(defaults)
}
