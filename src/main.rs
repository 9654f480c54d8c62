mod cli;
mod client;
mod commands;
mod config;
mod data;
mod registry;
mod resource;
mod ui;

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use client::Client;
use config::ProviderConfig;
use labapi::HttpApi;
use reconcile::{CancelToken, Registry};
use std::io;
use std::sync::Arc;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: ProviderConfig,
    pub registry: Registry<Client>,
    pub cancel: CancelToken,
}

impl Context {
    /// Client talking to the configured instance over HTTP.
    pub fn client(&self) -> Client {
        let api = HttpApi::new(
            self.config.base_url.clone(),
            self.config.token.clone(),
            self.config.timeout(),
        );
        let client = Client::new(
            Arc::new(api),
            self.config.per_page,
            self.config.retry_config(),
        );
        log::debug!("listing {} item(s) per page", client.per_page());
        client
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "labstate", &mut io::stdout());
        return Ok(());
    }

    let config = ProviderConfig::load(cli.config.as_deref())?
        .with_overrides(cli.base_url.clone(), cli.token.clone());
    log::debug!("using {}", config.base_url);

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config,
        registry: registry::builtin().context("Invalid kind table")?,
        cancel: CancelToken::new(),
    };

    match cli.command {
        Command::Kinds => commands::kinds::run(&ctx),
        Command::Read(args) => commands::object::read(&ctx, &args),
        Command::Import(args) => commands::object::import(&ctx, &args),
        Command::Verify(args) => commands::object::verify(&ctx, &args),
        Command::Data(args) => commands::data::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Completions { .. } => Ok(()),
    }
}
