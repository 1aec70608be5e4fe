use clap::Parser;
use deskpack::cli::Cli;
use dirs::config_dir;
use env_logger::Builder;
use log::LevelFilter;
use std::fs::OpenOptions;
use std::path::PathBuf;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(e.exit_code());
        }
    };

    if let Err(err) = cli.execute().await {
        log::error!("{}", err);
        eprintln!("Error: {}", err);
        std::process::exit(err.exit_code());
    }
}

fn init_logging() {
    let log_file = get_log_file_path();

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info).parse_default_env();

    match OpenOptions::new().create(true).append(true).open(&log_file) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", log_file.display(), e);
            builder.filter_level(LevelFilter::Off);
        }
    }

    if builder.try_init().is_ok() {
        log::info!("deskpack started");
    }
}

fn get_log_file_path() -> PathBuf {
    if let Some(config_dir) = config_dir() {
        config_dir.join("deskpack").join("deskpack.log")
    } else {
        std::env::current_dir()
            .map(|p| p.join("deskpack.log"))
            .unwrap_or_else(|_| "deskpack.log".into())
    }
}
