use std::time::Duration;

//######################################################################################################################
// Environment variables

/// Filter directives for the logger, e.g. "rustyfatal=debug"
pub const ENV_RUSTYFATAL_LOG: &str = "RUSTYFATAL_LOG";

/// Overrides how long the harness waits for a termination point, e.g. "500ms" or "3s"
pub const ENV_RUSTYFATAL_TIMEOUT: &str = "RUSTYFATAL_TIMEOUT";

//######################################################################################################################
// Harness defaults

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

pub const DEFAULT_WORKER_NAME: &str = "rustyfatal-worker";

//######################################################################################################################
// Failure descriptions

pub const DESC_EXPECTED_PRECONDITION: &str = "Expected precondition failure in block.";
pub const DESC_EXPECTED_FATAL_ERROR: &str = "Expected fatal error in block.";

//######################################################################################################################
// Names of termination kinds, as accepted on the command line

pub const NAME_FATAL_ERROR: &str = "fatal-error";
pub const NAME_PRECONDITION: &str = "precondition";
pub const NAME_PRECONDITION_FAILURE: &str = "precondition-failure";
