use crate::output::UserOutput;
use runtime_launcher::{RuntimeSummary, Supervisor};

pub fn run_list(supervisor: &Supervisor, json: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    let runtimes = supervisor.list();

    if json {
        out.status(&serde_json::to_string_pretty(&runtimes)?);
        return Ok(());
    }

    if runtimes.is_empty() {
        out.status("No runtimes active.");
        return Ok(());
    }

    for runtime in &runtimes {
        out.status(&format_line(runtime));
    }
    Ok(())
}

fn format_line(runtime: &RuntimeSummary) -> String {
    format!(
        "• {} — PID {} (port {})",
        runtime.name, runtime.pid, runtime.port
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CaptureOutput;
    use runtime_launcher::{RecoveryPolicy, RegistryEntry, RegistryStore, SharedLog, SupervisorOptions};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn supervisor(dir: &TempDir) -> Supervisor {
        let store = RegistryStore::open(dir.path().join("registry.json"), RecoveryPolicy::Empty)
            .unwrap();
        Supervisor::new(
            Arc::new(store),
            Arc::new(SharedLog::new(dir.path().join("logs.txt"))),
            SupervisorOptions::default(),
        )
    }

    #[test]
    fn empty_registry() {
        let dir = TempDir::new().unwrap();
        let out = CaptureOutput::default();
        run_list(&supervisor(&dir), false, &out).unwrap();
        assert_eq!(out.lines(), vec!["No runtimes active.".to_string()]);
    }

    #[test]
    fn one_line_per_runtime_sorted() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(&dir);
        sup.store().set("zeta", RegistryEntry::new(200, 9200)).unwrap();
        sup.store().set("alpha", RegistryEntry::new(100, 9100)).unwrap();

        let out = CaptureOutput::default();
        run_list(&sup, false, &out).unwrap();
        assert_eq!(
            out.lines(),
            vec![
                "• alpha — PID 100 (port 9100)".to_string(),
                "• zeta — PID 200 (port 9200)".to_string(),
            ]
        );
    }

    #[test]
    fn json_output() {
        let dir = TempDir::new().unwrap();
        let sup = supervisor(&dir);
        sup.store().set("widget", RegistryEntry::new(42, 9042)).unwrap();

        let out = CaptureOutput::default();
        run_list(&sup, true, &out).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out.lines()[0]).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!([{"name": "widget", "pid": 42, "port": 9042, "alive": true}])
        );
    }
}
