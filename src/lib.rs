pub mod agent;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod exec;
pub mod llm;
pub mod project;
pub mod safety;
pub mod search;
