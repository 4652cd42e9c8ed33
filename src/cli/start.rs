use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;

/// Read the command line, install logging at the requested level and resolve
/// the action the binary should run.
///
/// # Errors
///
/// Returns an error if the subscriber cannot be installed or the arguments do
/// not describe a runnable action.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(commands::log_level(&matches))?;

    dispatch::handler(&matches)
}
