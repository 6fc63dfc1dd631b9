use super::*;
use crate::cases::{PreparedCase, TestCase, Verdict, builtin_cases};
use extharness_core::{NoopTester, Registerable};
use extharness_loopback::LoopbackRuntime;

fn runner(run: RunConfig) -> Runner {
    runner_with(builtin_cases().unwrap(), run)
}

fn runner_with(cases: TestCaseRegistry, run: RunConfig) -> Runner {
    let boundary = Arc::new(LoopbackRuntime::with_default_addons().unwrap());
    Runner::new(Arc::new(cases), boundary, &run)
}

fn names(plan: &[CaseConfig]) -> Vec<&str> {
    plan.iter().map(|case| case.name.as_str()).collect()
}

/// Never stops on its own.
struct Stalls;

impl Registerable for Stalls {
    fn registry_id(&self) -> &str {
        "stalls"
    }
}

impl TestCase for Stalls {
    fn description(&self) -> &str {
        "never requests a stop"
    }

    fn prepare(&self, _properties: &Properties) -> PreparedCase {
        PreparedCase {
            tester: Arc::new(NoopTester),
            verdict: Arc::new(Verdict::default()),
        }
    }
}

#[test]
fn test_plan_defaults_to_every_registered_case() {
    let runner = runner(RunConfig::default());
    let plan = runner.plan(&HarnessConfig::default(), &[]).unwrap();
    assert_eq!(plan.len(), 5);
    assert!(names(&plan).contains(&"greeting"));
}

#[test]
fn test_plan_uses_enabled_configured_cases() {
    let runner = runner(RunConfig::default());
    let mut config = HarnessConfig::default();
    config.cases.push(CaseConfig::new("greeting"));
    let mut disabled = CaseConfig::new("cmd_ping_pong");
    disabled.enabled = false;
    config.cases.push(disabled);

    let plan = runner.plan(&config, &[]).unwrap();
    assert_eq!(names(&plan), vec!["greeting"]);
}

#[test]
fn test_plan_selection_overrides_enabled() {
    let runner = runner(RunConfig::default());
    let mut config = HarnessConfig::default();
    let mut disabled = CaseConfig::new("cmd_ping_pong");
    disabled.enabled = false;
    config.cases.push(disabled);

    let plan = runner
        .plan(&config, &["cmd_ping_pong".to_string(), "data_ping_pong".to_string()])
        .unwrap();
    assert_eq!(names(&plan), vec!["cmd_ping_pong", "data_ping_pong"]);
}

#[test]
fn test_plan_rejects_unknown_case() {
    let runner = runner(RunConfig::default());
    let result = runner.plan(&HarnessConfig::default(), &["nope".to_string()]);
    assert!(matches!(result, Err(TesterError::NotFound(_))));
}

#[tokio::test]
async fn test_builtin_cases_pass_against_loopback() {
    let runner = runner(RunConfig {
        timeout_secs: Some(10),
        fail_fast: false,
    });
    let plan = runner.plan(&HarnessConfig::default(), &[]).unwrap();

    let summary = runner.run_all(&plan).await;

    assert!(summary.is_success(), "{}", summary);
    assert_eq!(summary.passed(), 5);
    assert!(summary.to_string().ends_with("5 passed, 0 failed, 0 skipped"));
}

#[tokio::test]
async fn test_configured_greeting_is_checked() {
    let runner = runner(RunConfig {
        timeout_secs: Some(10),
        fail_fast: false,
    });
    let mut case = CaseConfig::new("greeting");
    case.properties.insert(
        "greetingMsg".to_string(),
        toml::Value::String("bonjour".to_string()),
    );

    let report = runner.run_case(&case).await;
    assert!(report.passed(), "{}", report);
}

#[tokio::test]
async fn test_unknown_addon_fails_case() {
    let runner = runner(RunConfig::default());
    let mut case = CaseConfig::new("cmd_ping_pong");
    case.addon = Some("missing_addon".to_string());

    let report = runner.run_case(&case).await;
    let reason = report.outcome.unwrap_err();
    assert!(reason.starts_with("test mode rejected"), "{}", reason);
}

#[tokio::test]
async fn test_timeout_fails_case() {
    let cases = builtin_cases().unwrap();
    cases.register(Arc::new(Stalls)).unwrap();
    let runner = runner_with(
        cases,
        RunConfig {
            timeout_secs: Some(1),
            fail_fast: false,
        },
    );

    let report = runner.run_case(&CaseConfig::new("stalls")).await;
    assert!(report.outcome.unwrap_err().starts_with("timed out"));
}

#[tokio::test]
async fn test_fail_fast_skips_remaining_cases() {
    let runner = runner(RunConfig {
        timeout_secs: Some(10),
        fail_fast: true,
    });
    let mut broken = CaseConfig::new("cmd_ping_pong");
    broken.addon = Some("missing_addon".to_string());
    let plan = vec![broken, CaseConfig::new("greeting")];

    let summary = runner.run_all(&plan).await;

    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.skipped, vec!["greeting".to_string()]);
    assert!(!summary.is_success());
}
