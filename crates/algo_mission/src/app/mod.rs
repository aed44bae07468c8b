mod autopilot;
mod bootstrap;
mod loop_runner;
pub(crate) mod mission;

pub(crate) use bootstrap::{build_app, BootstrapError};
pub(crate) use loop_runner::run;
