use replcheck::cli;

// Current-thread runtime: the check is strictly sequential, one connection
// at a time.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    std::process::exit(cli::run().await);
}
