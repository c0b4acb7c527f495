use board_bridge_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    // Run CLI and handle errors
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("Error: {e}");

        // Exit with appropriate code based on error type
        let exit_code = match e {
            board_bridge_cli::CliError::InvalidArgument { .. } => 1,
            board_bridge_cli::CliError::Io(_) => 2,
            board_bridge_cli::CliError::Parse { .. } => 3,
            board_bridge_cli::CliError::Completion(_) => 4,
            board_bridge_cli::CliError::WorkItem(_) => 5,
        };

        std::process::exit(exit_code);
    }
}
