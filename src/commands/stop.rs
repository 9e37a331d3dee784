use crate::output::UserOutput;
use runtime_launcher::Supervisor;

pub async fn run_stop(supervisor: &Supervisor, name: &str, out: &dyn UserOutput) -> anyhow::Result<()> {
    if supervisor.stop(name).await? {
        out.success(&format!("Stopped {}.", name));
    } else {
        out.status(&format!("{} not found.", name));
    }
    Ok(())
}
