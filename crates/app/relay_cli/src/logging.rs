pub mod formats;

use flexi_logger::{Logger, LoggerHandle};

use crate::Error;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_SPEC: &str = "info,sqlx=warn";

/// Start logging to stdout. Keep the handle alive until exit.
pub fn init() -> Result<LoggerHandle, Error> {
    let handle = Logger::try_with_env_or_str(DEFAULT_SPEC)?
        .format(formats::cli_format)
        .log_to_stdout()
        .start()?;

    Ok(handle)
}
