//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use crate::config::ScenarioConfig;
use crate::orchestrator::ScenarioReport;
use crate::poller::WaitOutcome;
use crate::validator::ValidatedResources;

// ============================================================================
// Table formatting helpers
// ============================================================================

/// Format a simple table with headers and rows
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No entries.\n".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut output = String::new();
    let mut push_row = |cells: Vec<String>| {
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| match widths.get(i) {
                Some(width) => format!("{:width$}", cell, width = *width),
                None => cell.clone(),
            })
            .collect();
        output.push_str(line.join("   ").trim_end());
        output.push('\n');
    };

    push_row(headers.iter().map(|h| h.to_uppercase()).collect());
    for row in rows {
        push_row(row);
    }
    output
}

// ============================================================================
// Scenario display
// ============================================================================

pub fn format_report(report: &ScenarioReport) -> String {
    let mut output = String::new();
    let verdict = if report.succeeded() { "PASSED" } else { "FAILED" };

    output.push_str(&format!("Scenario:   {} ({})\n", report.scenario, verdict));
    output.push_str(&format!(
        "Namespace:  {}\n",
        report.namespace.as_deref().unwrap_or("-")
    ));
    output.push_str(&format!(
        "Identity:   {}\n",
        report.identity.as_deref().unwrap_or("-")
    ));
    output.push_str(&format!("State:      {}\n", report.state));
    let total = report.finished_at - report.started_at;
    output.push_str(&format!(
        "Duration:   {:.1}s\n",
        total.num_milliseconds() as f64 / 1000.0
    ));

    if let Some(failure) = &report.failure {
        output.push_str(&format!("Failure:    [{}] {}\n", failure.kind, failure.message));
    }

    if !report.steps.is_empty() {
        output.push_str("\nSteps:\n");
        let rows = report
            .steps
            .iter()
            .map(|step| {
                vec![
                    step.step.clone(),
                    format!("{:.1}s", step.elapsed.as_secs_f64()),
                ]
            })
            .collect();
        output.push_str(&format_table(&["step", "elapsed"], rows));
    }

    if !report.pods.is_empty() {
        output.push_str("\nReady pods:\n");
        let rows = report
            .pods
            .iter()
            .map(|observed| {
                vec![
                    observed.phase.clone(),
                    observed.pod.clone(),
                    observed.attempts.to_string(),
                ]
            })
            .collect();
        output.push_str(&format_table(&["phase", "pod", "attempts"], rows));
    }

    output
}

pub fn format_presets(names: &[&str]) -> String {
    let rows = names.iter().map(|name| vec![name.to_string()]).collect();
    format_table(&["preset"], rows)
}

/// Dry-run summary of a scenario file
pub fn format_scenario(scenario: &ScenarioConfig) -> String {
    let mut output = String::new();
    output.push_str(&format!("Scenario:    {}\n", scenario.name));
    output.push_str(&format!("Repository:  {}\n", scenario.repository));
    output.push_str(&format!(
        "Build:       mvn -f {} {} -P{}\n",
        scenario.build.descriptor, scenario.build.goals, scenario.build.profile
    ));
    if let Some(plugin) = &scenario.plugin {
        let version = plugin
            .version
            .clone()
            .or_else(|| {
                plugin
                    .version_from
                    .as_ref()
                    .map(|path| format!("from {}", path.display()))
            })
            .unwrap_or_default();
        output.push_str(&format!("Plugin:      {} {}\n", plugin.key, version));
    }
    output.push_str(&format!(
        "Wait:        {} x {}s on label '{}', settle {}s\n",
        scenario.wait.attempts,
        scenario.wait.interval_secs,
        scenario.wait.label_key,
        scenario.settle_secs
    ));
    if let Some(entry) = &scenario.config_entry {
        output.push_str(&format!(
            "Config:      {} ({} keys)\n",
            entry.name,
            entry.data.len()
        ));
    }
    output.push_str(&format!("Checks:      {}\n", scenario.checks.len()));
    if let Some(redeploy) = &scenario.redeploy {
        let mut mutations = Vec::new();
        if let Some(dependency) = &redeploy.add_dependency {
            mutations.push(format!(
                "dependency {}:{}",
                dependency.group_id, dependency.artifact_id
            ));
        }
        if let Some(marker) = &redeploy.marker {
            mutations.push(format!("marker {}", marker.key));
        }
        if redeploy.config_data.is_some() {
            mutations.push("config data".to_string());
        }
        output.push_str(&format!(
            "Redeploy:    {}, {} checks\n",
            mutations.join(", "),
            redeploy.checks.len()
        ));
    }
    output
}

pub fn format_wait(outcome: &WaitOutcome) -> String {
    format!(
        "Pod {} ready after {} attempt(s) ({:.1}s)\n",
        outcome.pod,
        outcome.attempts,
        outcome.elapsed.as_secs_f64()
    )
}

pub fn format_validated(app: &str, resources: &ValidatedResources) -> String {
    format!(
        "{} validated: {} {}, route host {}\n",
        app,
        resources.workload.kind.as_str(),
        resources.workload.name,
        resources.route_host.as_deref().unwrap_or("-")
    )
}
