#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod backend;
pub mod cli;
pub mod config;
pub mod configure;
pub mod error;
pub mod flow;
pub mod launch;
pub mod logging;
pub mod paths;
pub mod preflight;
pub mod progress;
pub mod ssh_config;
