mod cli;
mod cmd;

use clap::Parser;
use cli::{Cli, Commands, ConfigAction, StreamAction};
use std::process;
use tracing_subscriber::EnvFilter;

use streamrank::output;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("STREAMRANK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let (command, result) = match cli.command {
        Commands::Init => ("init", cmd::init::run()),
        Commands::Stream { action } => (
            "stream",
            match action {
                StreamAction::Add {
                    external_id,
                    name,
                    channel,
                } => cmd::stream::run_add(&external_id, &name, &channel, cli.human),
                StreamAction::List { live } => cmd::stream::run_list(live, cli.human),
                StreamAction::Live { stream, off } => cmd::stream::run_live(&stream, !off),
            },
        ),
        Commands::Sample {
            stream,
            viewcount,
            at,
            batch,
        } => (
            "sample",
            match (batch, stream, viewcount) {
                (Some(batch_json), _, _) => cmd::sample::run_batch(&batch_json),
                (None, Some(stream), Some(viewcount)) => {
                    cmd::sample::run(&stream, viewcount, at.as_deref())
                }
                _ => Err(anyhow::anyhow!("stream and viewcount are required")),
            },
        ),
        Commands::Rank {
            limit,
            algorithm,
            trending,
            min_score,
        } => (
            "rank",
            cmd::rank::run(limit, algorithm.as_deref(), trending.then_some(min_score), cli.human),
        ),
        Commands::Score { stream, algorithm } => (
            "score",
            cmd::score::run(&stream, algorithm.as_deref(), cli.human),
        ),
        Commands::Config { action } => (
            "config",
            match action {
                ConfigAction::Show => cmd::config::run_show(cli.human),
                ConfigAction::Keys => cmd::config::run_keys(cli.human),
                ConfigAction::Set { key, value } => cmd::config::run_set(&key, &value),
                ConfigAction::Reset { key } => cmd::config::run_reset(&key),
            },
        ),
        Commands::Prune { days } => ("prune", cmd::prune::run(days)),
        Commands::Completions { shell } => ("completions", cmd::completions::run(shell)),
    };

    if let Err(e) = result {
        let err = output::error(command, output::error_code(&e), &format!("{:#}", e));
        eprintln!("{}", err);
        process::exit(1);
    }
}
