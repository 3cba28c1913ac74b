use anyhow::Result;
use log::LevelFilter;

pub mod cleaner;
pub mod config;
pub mod github;
pub mod handler;
pub mod request;
pub mod signature;
pub mod storage;

pub const APP_NAME: &str = "webhook_gc";

/// Logs WARN and above from dependencies, and INFO (DEBUG when verbose) from this crate and `calling_module`.
pub fn set_up_logger(app_name: &str, calling_module: &str, verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] [{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for(app_name.to_string(), level)
        .level_for(calling_module.to_string(), level)
        .chain(std::io::stdout())
        .apply()?;

    Ok(())
}
