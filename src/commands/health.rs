use crate::output::UserOutput;
use runtime_launcher::healthcheck::{probe_all, HealthReport};
use runtime_launcher::{Settings, Supervisor};

pub async fn run_health(
    supervisor: &Supervisor,
    settings: &Settings,
    path: Option<&str>,
    json: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let path = path.unwrap_or(&settings.health.path);
    let entries = supervisor.store().snapshot();
    let reports = probe_all(&entries, path, settings.health.timeout).await?;

    if json {
        out.status(&serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        out.status("No runtimes active.");
        return Ok(());
    }

    for report in &reports {
        out.status(&format_report(report, path));
    }
    Ok(())
}

fn format_report(report: &HealthReport, path: &str) -> String {
    let icon = if report.is_healthy() { "+" } else { "x" };
    let pid = if report.pid_alive { "alive" } else { "dead" };
    let http = if report.http_ok { "ok" } else { "failing" };
    format!(
        "  {} {:<20} PID {:<8} {} | GET :{}{} {}",
        icon, report.name, report.pid, pid, report.port, path, http
    )
}
