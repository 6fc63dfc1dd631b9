//! extharness - lifecycle-driven test harness for message-passing extensions.
//!
//! Runs the registered test cases against the in-process loopback runtime.

mod cases;
mod cli;
mod logging;
mod runner;

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use extharness_config::{ConfigLoader, ConfigValidator, HarnessConfig};
use extharness_loopback::LoopbackRuntime;

use crate::cases::{TestCaseRegistry, builtin_cases};
use crate::cli::{Cli, Commands};
use crate::runner::Runner;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(cli.config.as_deref())?;
    let warnings = ConfigValidator::validate(&config).into_result()?;
    let _guard = logging::init_tracing(&config.logging)?;
    for warning in warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }

    let cases = Arc::new(builtin_cases()?);
    match cli.command {
        Commands::List => {
            list_cases(&cases, &config);
            Ok(())
        }
        Commands::Run { cases: selected } => run_cases(cases, &config, &selected).await,
    }
}

fn list_cases(cases: &TestCaseRegistry, config: &HarnessConfig) {
    for name in cases.list_ids() {
        let Some(case) = cases.get(&name) else {
            continue;
        };
        let disabled = config.case(&name).is_some_and(|c| !c.enabled);
        println!(
            "{:<24} {}{}",
            name,
            case.description(),
            if disabled { " (disabled)" } else { "" }
        );
    }
}

async fn run_cases(
    cases: Arc<TestCaseRegistry>,
    config: &HarnessConfig,
    selected: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Arc::new(LoopbackRuntime::with_default_addons()?);
    let runner = Runner::new(cases, runtime, &config.run);
    let plan = runner.plan(config, selected)?;
    info!(cases = plan.len(), "Starting run");

    let summary = runner.run_all(&plan).await;
    println!("{}", summary);
    if summary.is_success() {
        Ok(())
    } else {
        Err(format!("{} of {} cases failed", summary.failed(), plan.len()).into())
    }
}
