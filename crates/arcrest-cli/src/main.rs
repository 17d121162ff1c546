//! `arcrest` binary entrypoint.

use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    process::exit(arcrest_cli::run().await);
}
