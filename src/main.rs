mod cli;
mod config;
mod detect;
mod landmarks;
mod logging;
mod metrics;
mod signal;
mod stream;
mod trial;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
