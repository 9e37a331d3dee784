use crate::output::UserOutput;
use runtime_launcher::Supervisor;

pub fn run_prune(supervisor: &Supervisor, out: &dyn UserOutput) -> anyhow::Result<()> {
    let pruned = supervisor.prune()?;
    if pruned.is_empty() {
        out.status("Nothing to prune.");
    } else {
        out.success(&format!(
            "Pruned {} runtime(s): {}",
            pruned.len(),
            pruned.join(", ")
        ));
    }
    Ok(())
}
