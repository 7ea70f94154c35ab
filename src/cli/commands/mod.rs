//! CLI command implementations.

mod config;
mod doctor;
mod run;
mod search;
mod show;

pub use config::run_config;
pub use doctor::run_doctor;
pub use run::run_pipeline;
pub use search::run_search;
pub use show::run_show;
