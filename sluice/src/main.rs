use clap::{Parser, Subcommand};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ObservabilitySnafu, Result},
    generate::GenerateArgs,
    run::RunArgs,
};

mod emitter;
mod error;
mod generate;
mod run;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Buffer protocol records and write them to an object store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read protocol messages from stdin and write records to a directory
    Run {
        #[clap(flatten)]
        inner: RunArgs,
    },
    /// Print synthetic protocol messages to stdout
    Generate {
        #[clap(flatten)]
        inner: GenerateArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    sluice_observability::init_observability(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .context(ObservabilitySnafu)?;

    let ct = CancellationToken::new();

    let ct_clone = ct.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ct_clone.cancel();
    });

    match cli.command {
        Commands::Run { inner } => inner.run(ct).await,
        Commands::Generate { inner } => inner.run(ct),
    }
}
