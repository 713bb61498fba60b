//! Subcommand implementations. Each returns the text to print on stdout.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use convoy_core::data::documents::{load_context, load_current, load_target};
use convoy_core::{
    compute_next_steps, compute_removal_steps, Application, CompositionStep, ConvergenceDriver,
    ConvergenceReport, Engine, InMemoryStartDedupe, ReconcileContext, Settings, SimulatedEngine,
    StartDedupe,
};


/// Context file contents, or one derived from settings. Settings can only
/// turn local mode on.
fn context(path: Option<&Path>, settings: &Settings) -> Result<ReconcileContext> {
    let mut ctx = match path {
        Some(path) => load_context(path)
            .with_context(|| format!("loading context {}", path.display()))?,
        None => ReconcileContext::from_settings(settings),
    };
    ctx.local_mode |= settings.local_mode;
    ctx.default_update_strategy = settings.default_update_strategy;
    Ok(ctx)
}


fn render_steps(steps: &[CompositionStep], as_json: bool) -> Result<String> {
    if as_json {
        return serde_json::to_string_pretty(steps).context("serializing steps");
    }
    if steps.is_empty() {
        return Ok("nothing to do".into());
    }
    Ok(steps
        .iter()
        .map(CompositionStep::describe)
        .collect::<Vec<_>>()
        .join("\n"))
}


pub fn plan(
    current: &Path,
    target: &Path,
    context_path: Option<&Path>,
    started: &[String],
    settings: &Settings,
    as_json: bool,
) -> Result<String> {
    let current = load_current(current)
        .with_context(|| format!("loading current state {}", current.display()))?;
    let target = load_target(target)
        .with_context(|| format!("loading target {}", target.display()))?;
    let ctx = context(context_path, settings)?;

    let mut dedupe = InMemoryStartDedupe::new();
    for id in started {
        dedupe.set(id);
    }

    let steps = compute_next_steps(&current, &target, &ctx, &dedupe);
    info!(steps = steps.len(), "planned batch");
    render_steps(&steps, as_json)
}


pub fn teardown(
    current: &Path,
    context_path: Option<&Path>,
    settings: &Settings,
    as_json: bool,
) -> Result<String> {
    let current = load_current(current)
        .with_context(|| format!("loading current state {}", current.display()))?;
    let ctx = context(context_path, settings)?;
    render_steps(&compute_removal_steps(&current, &ctx), as_json)
}


pub fn simulate(
    target: &Path,
    current: Option<&Path>,
    context_path: Option<&Path>,
    max_passes: Option<u32>,
    settings: &Settings,
    as_json: bool,
) -> Result<String> {
    let target_app = load_target(target)
        .with_context(|| format!("loading target {}", target.display()))?;
    let current_app = match current {
        Some(path) => load_current(path)
            .with_context(|| format!("loading current state {}", path.display()))?,
        None => Application::current(target_app.app_id),
    };
    let ctx = context(context_path, settings)?;

    let mut settings = settings.clone();
    if let Some(limit) = max_passes {
        settings.max_passes = limit;
    }

    let mut engine = SimulatedEngine::with_state(current_app, ctx);
    let mut dedupe = InMemoryStartDedupe::new();
    let report = ConvergenceDriver::from_settings(&settings).converge(&target_app, &mut engine, &mut dedupe);
    render_report(&report, &engine, as_json)
}


fn render_report(report: &ConvergenceReport, engine: &SimulatedEngine, as_json: bool) -> Result<String> {
    if as_json {
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|(step, reason)| json!({ "step": step, "reason": reason }))
            .collect();
        let value = json!({
            "converged": report.converged,
            "passes": report.passes,
            "batches": report.batches,
            "failed": failed,
            "final": engine.observe(),
        });
        return serde_json::to_string_pretty(&value).context("serializing report");
    }

    let mut lines = Vec::new();
    for (i, batch) in report.batches.iter().enumerate() {
        lines.push(format!("pass {}:", i + 1));
        lines.extend(batch.iter().map(|s| format!("  {}", s.describe())));
    }
    for (step, reason) in &report.failed {
        lines.push(format!("failed: {} ({})", step.describe(), reason));
    }
    let outcome = if report.converged { "converged" } else { "not converged" };
    lines.push(format!(
        "{} after {} passes, {} steps applied",
        outcome,
        report.passes,
        report.applied_steps()
    ));
    Ok(lines.join("\n"))
}


pub fn validate(target: &Path, as_json: bool) -> Result<String> {
    let app = load_target(target)
        .with_context(|| format!("invalid target {}", target.display()))?;
    if as_json {
        return serde_json::to_string_pretty(&app).context("serializing target");
    }
    Ok(format!(
        "ok: app {} release {} ({} services, {} networks, {} volumes)",
        app.app_id,
        app.release_id.unwrap_or_default(),
        app.services.len(),
        app.networks.len(),
        app.volumes.len()
    ))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const RELEASE: &str = "\
app_id: 1
release_id: 1
services:
  db:
    image_id: 1
    image: db:1
  web:
    image_id: 2
    image: web:1
    depends_on: [db]
";

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn plan_fresh_install_fetches_images() {
        let dir = tempfile::tempdir().unwrap();
        let target = write(&dir, "release.yaml", RELEASE);
        let current = write(&dir, "current.json", r#"{"app_id": 1}"#);

        let out = plan(&current, &target, None, &[], &Settings::default(), false).unwrap();
        assert!(out.contains("createNetwork"));
        assert!(out.contains("fetch"));
        assert!(!out.contains("start"));
    }

    #[test]
    fn plan_json_is_a_step_array() {
        let dir = tempfile::tempdir().unwrap();
        let target = write(&dir, "release.yaml", RELEASE);
        let current = write(&dir, "current.json", r#"{"app_id": 1}"#);

        let out = plan(&current, &target, None, &[], &Settings::default(), true).unwrap();
        let steps: Vec<CompositionStep> = serde_json::from_str(&out).unwrap();
        assert!(steps.iter().any(|s| s.action().as_str() == "createNetwork"));
    }

    #[test]
    fn plan_in_local_mode_never_fetches() {
        let dir = tempfile::tempdir().unwrap();
        let target = write(&dir, "release.yaml", RELEASE);
        let current = write(&dir, "current.json", r#"{"app_id": 1}"#);
        let settings = Settings {
            local_mode: true,
            ..Settings::default()
        };

        let out = plan(&current, &target, None, &[], &settings, false).unwrap();
        assert!(!out.contains("fetch"));
    }

    #[test]
    fn teardown_of_empty_app_has_nothing_to_do() {
        let dir = tempfile::tempdir().unwrap();
        let current = write(&dir, "current.yaml", "app_id: 1\n");
        let out = teardown(&current, None, &Settings::default(), false).unwrap();
        assert_eq!(out, "nothing to do");
    }

    #[test]
    fn simulate_converges_fresh_install() {
        let dir = tempfile::tempdir().unwrap();
        let target = write(&dir, "release.yaml", RELEASE);
        let out = simulate(&target, None, None, None, &Settings::default(), false).unwrap();
        assert!(out.starts_with("pass 1:"));
        assert!(out.lines().last().unwrap().starts_with("converged after"));
    }

    #[test]
    fn simulate_json_reports_final_state() {
        let dir = tempfile::tempdir().unwrap();
        let target = write(&dir, "release.yaml", RELEASE);
        let out = simulate(&target, None, None, None, &Settings::default(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["converged"], true);
        assert_eq!(value["final"]["services"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn simulate_respects_pass_limit() {
        let dir = tempfile::tempdir().unwrap();
        let target = write(&dir, "release.yaml", RELEASE);
        let out = simulate(&target, None, None, Some(1), &Settings::default(), false).unwrap();
        assert!(out.ends_with("not converged after 1 passes, 3 steps applied"));
    }

    #[test]
    fn validate_reports_summary_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(&dir, "release.yaml", RELEASE);
        assert_eq!(
            validate(&good, false).unwrap(),
            "ok: app 1 release 1 (2 services, 1 networks, 0 volumes)"
        );

        let bad = write(&dir, "bad.yaml", "app_id: 1\nrelease_id: 1\nservices:\n  web:\n    image_id: 2\n    image: web:1\n    depends_on: [db]\n");
        let err = validate(&bad, false).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown service 'db'"));
    }
}
