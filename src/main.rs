use anyhow::Result;
use slog::{debug, o, Drain, Logger};

use crate::{
    client::{ApiError, Client, UreqTransport},
    commands::Args,
    config::Config,
    session::{FileStore, SessionState},
};

mod client;
mod commands;
mod config;
mod guide;
mod presentation;
mod pretty;
mod session;
mod validate;

fn main() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    if args.wants_usage() {
        println!("{}", commands::USAGE);
        return Ok(());
    }
    let config = Config::from_env()?;

    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain);
    let drain = slog_async::Async::new(drain).build().fuse();
    let log = Logger::root(drain, o!());

    inner_main(config, log, args)
}

fn inner_main(config: Config, logger: Logger, args: Args) -> Result<()> {
    debug!(logger, "Using session storage"; "dir" => %config.state_dir.display());
    let session = SessionState::restore(
        logger.new(o!("component" => "session")),
        Box::new(FileStore::new(&config.state_dir)),
    );
    let client = Client::new(
        logger.clone(),
        &config.base_url,
        Box::new(UreqTransport::new()),
        session,
    );

    commands::run(&client, &logger, &args).map_err(|err| {
        let rejected = err
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_unauthorized);
        if rejected {
            err.context("Session rejected by the server, run `backupmonitor-cli login`")
        } else {
            err
        }
    })
}
