pub mod command;
pub mod config;
pub mod control;
pub mod messages;
pub mod pose;
pub mod runtime;
pub mod transport;
