#![warn(clippy::pedantic)]

mod demo;
pub mod global;

use anyhow::Result as AnyResult;

fn main() -> AnyResult<()> {
    let settings = global::settings::Settings::get();
    let level = settings.log_level();

    let has_term = std::io::IsTerminal::is_terminal(&std::io::stdin());
    // Log to a terminal, if available. Else, log to "log.out" in the working directory.
    if has_term {
        env_logger::builder().filter_level(level).init();
    } else {
        let _ = simple_logging::log_to_file("log.out", level);
    }

    if settings.did_fail_to_load() {
        log::warn!("Settings weren't available, defaulting.");
    }
    if let Err(e) = settings.save() {
        log::warn!("Failed to save settings:\n{e:?}");
    };

    demo::run(settings.file.processing.clone())
}
