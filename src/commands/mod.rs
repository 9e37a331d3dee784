mod deploy;
mod health;
mod list;
mod logs;
mod prune;
mod stop;

pub use deploy::{run_deploy, run_fetch, run_launch};
pub use health::run_health;
pub use list::run_list;
pub use logs::run_logs;
pub use prune::run_prune;
pub use stop::run_stop;
