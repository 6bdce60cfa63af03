pub mod commands;
pub mod config;
pub mod decoder;
pub mod job;
pub mod matcher;
pub mod queue;
pub mod worker;
