mod cli;

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, filter::Directive};

use whittle_delta::{
    DeltaError, MinimizerConfig, TesterConfig, default_mandatory_kinds, make_test_func, minimize,
};
use whittle_trace::{first_block, load_trace, write_trace};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling minimization");
            signal_token.cancel();
        }
    });

    // The minimizer is synchronous and replay-bound; keep it off the
    // async workers so the signal handler stays responsive.
    let output = tokio::task::spawn_blocking(move || run(cli, token)).await??;
    println!("{}", output.display());
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::builder()
        .with_default_directive(Directive::from(cli.log_level))
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");
}

fn run(cli: Cli, token: CancellationToken) -> eyre::Result<PathBuf> {
    let ops = load_trace(&cli.trace_files, 0, 0)?;
    info!(
        operations = ops.len(),
        files = cli.trace_files.len(),
        first_block = first_block(&ops),
        "loaded trace"
    );

    let tester_config = TesterConfig {
        db_impl: cli.db_impl,
        variant: cli.db_variant,
        tmp_dir: cli.tmp_dir,
        schema: cli.schema,
        log_level: cli.log_level.to_string(),
        chain_id: cli.chain_id,
    };
    let test = make_test_func(tester_config);

    let config = MinimizerConfig {
        address_sample_runs: cli.sample_runs,
        rand_seed: cli.seed,
        max_factor: cli.max_factor,
        mandatory_kinds: default_mandatory_kinds(),
    };

    let minimized = match minimize(&token, &ops, test, config) {
        Ok(ops) => ops,
        Err(DeltaError::InputDoesNotFail) => eyre::bail!(
            "the input trace does not fail against the selected backend; nothing to minimize"
        ),
        Err(err) => return Err(err.into()),
    };

    write_trace(&cli.output, &minimized)?;
    info!(operations = minimized.len(), "wrote minimized trace");
    Ok(cli.output)
}
