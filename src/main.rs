use clap::Parser;
use tracing::error;

use scan_assembler_lib::{
    cli::{Cli, Commands},
    commands,
    core::errors::AppResult,
    init_tracing,
    pipeline::CancelFlag,
};

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(code = err.code(), error = %err, "command failed");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process(args) => {
            let cancel = CancelFlag::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping after the current item");
                    on_ctrl_c.cancel();
                }
            });
            commands::process::run(args, cancel).await.map(|_| ())
        }
        Commands::SetKey(args) => commands::settings::set_key(args),
    }
}
