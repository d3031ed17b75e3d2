use data_manager::cli;
use tracing::info;

fn main() {
    // Initialize the logging system using tracing subscriber; stdout carries command output
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = cli::parse_args(args.as_slice());
    info!("Starting data-manager...");

    match cli::run(command) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
