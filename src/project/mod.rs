//! Everything that touches the user's disk around a run: objective input,
//! artifact extraction and materialization, resumable task data, and the
//! markdown exchange log.

pub mod artifacts;
pub mod exchange_log;
pub mod materialize;
pub mod objective;
pub mod task_data;
