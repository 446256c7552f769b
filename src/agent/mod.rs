pub mod call;
pub mod coding_agent;
pub mod logging;
pub mod maestro_loop;
pub mod orchestrator;
pub mod prompts;
pub mod refiner;
pub mod sub_agent;
pub mod types;

pub use maestro_loop::{Maestro, NoSearch};
