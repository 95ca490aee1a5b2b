// xshell entry point

use clap::Parser;
use xshell_cli::{output, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match xshell_cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&e.user_message());
            e.exit_code()
        }
    };

    std::process::exit(code);
}
