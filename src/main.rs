mod app;
mod command;
mod config;
mod coordinator;
mod display;
mod error;
mod events;
mod geometry;
mod ipc;
mod logging;
mod media;
mod notch;
mod overlay;
mod surface;
mod theme;
mod timer;
mod util;
mod views;

fn main() -> Result<(), iced_layershell::Error> {
    // Read before logging is up; errors are reported again on the real load.
    let debug = config::Preferences::load(&config::preferences_path())
        .map(|p| p.debug_logging)
        .unwrap_or(false);
    logging::init(debug);
    app::run()
}
