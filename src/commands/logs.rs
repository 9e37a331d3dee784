use crate::output::UserOutput;
use runtime_launcher::{Error, Supervisor};

pub async fn run_logs(
    supervisor: &Supervisor,
    service: Option<&str>,
    tail: usize,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let lines = supervisor.log().tail(service, tail).await?;

    if lines.is_empty() {
        match service {
            Some(name) if supervisor.get(name).is_none() => {
                return Err(Error::ServiceNotFound(name.to_string()).into());
            }
            Some(name) => out.status(&format!("No logs available for '{}'", name)),
            None => out.status("No logs available"),
        }
        return Ok(());
    }

    for line in lines {
        out.status(&line);
    }
    Ok(())
}
