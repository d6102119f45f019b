//! terrane-ctl — command-line interface for the terrane toolkit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod cmd;
mod config;

use config::CtlConfig;

fn print_usage() {
    println!("Usage: terrane-ctl <command>");
    println!();
    println!("miniSEED");
    println!("  inspect <file>... [--samples]   Print a summary line per record");
    println!();
    println!("SeedLink");
    println!("  capture [server]                Stream records into per-stream files");
    println!("    --streams <list>              Stream list, e.g. NZ_AUCT:40BTT,NZ_WEL");
    println!("    --selectors <list>            Default selectors, e.g. \"40BTT 41BTT\"");
    println!("    --statefile <path>            Persist resumption state");
    println!("    --dir <path>                  Output directory");
    println!();
    println!("DataLink");
    println!("  publish [server] <file>         Write each record, acknowledged");
    println!("    --program <name>              Client program name for the ID handshake");
    println!("    --username <name>             Client username for the ID handshake");
    println!();
    println!("Servers and defaults come from the config file when omitted");
    println!("($TERRANE_CONFIG or ~/.config/terrane/config.toml).");
    println!();
    println!("Examples:");
    println!("  terrane-ctl inspect NZ_WEL_20_BNE.mseed --samples");
    println!("  terrane-ctl capture link.example.org --streams 'NZ_WEL' --statefile state.json");
    println!("  terrane-ctl publish ring.example.org:16000 NZ_WEL_20_BNE.mseed");
}

/// Pull `--flag value` out of an argument list, leaving positionals.
fn take_option(args: &mut Vec<String>, flag: &str) -> Result<Option<String>> {
    if let Some(i) = args.iter().position(|a| a == flag) {
        args.remove(i);
        anyhow::ensure!(i < args.len(), "{flag} requires a value");
        return Ok(Some(args.remove(i)));
    }
    Ok(None)
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = CtlConfig::load().context("failed to load config")?;
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let command = args.first().cloned();
    match command.as_deref() {
        Some("inspect") => {
            args.remove(0);
            let samples = take_flag(&mut args, "--samples");
            anyhow::ensure!(!args.is_empty(), "inspect requires at least one file");
            cmd::inspect::cmd_inspect(&args, samples)
        }

        Some("capture") => {
            args.remove(0);
            let streams = take_option(&mut args, "--streams")?
                .unwrap_or_else(|| config.seedlink.streams.clone());
            let selectors = take_option(&mut args, "--selectors")?
                .unwrap_or_else(|| config.seedlink.selectors.clone());
            let state_file = take_option(&mut args, "--statefile")?
                .or_else(|| {
                    (!config.seedlink.state_file.is_empty())
                        .then(|| config.seedlink.state_file.clone())
                })
                .map(PathBuf::from);
            let dir = take_option(&mut args, "--dir")?
                .map(PathBuf::from)
                .unwrap_or_else(|| config.seedlink.output_dir.clone());

            let server = args.pop().unwrap_or_else(|| config.seedlink.server.clone());
            anyhow::ensure!(!server.is_empty(), "no SeedLink server given or configured");

            cmd::capture::cmd_capture(&server, &streams, &selectors, state_file, dir).await
        }

        Some("publish") => {
            args.remove(0);
            let program = take_option(&mut args, "--program")?
                .unwrap_or_else(|| config.datalink.program.clone());
            let username = take_option(&mut args, "--username")?
                .unwrap_or_else(|| config.datalink.username.clone());

            let (server, file) = match args.as_slice() {
                [file] if !config.datalink.server.is_empty() => {
                    (config.datalink.server.clone(), file.clone())
                }
                [server, file] => (server.clone(), file.clone()),
                _ => anyhow::bail!("publish requires a server (or configured default) and a file"),
            };

            cmd::publish::cmd_publish(&server, &file, &program, &username).await
        }

        Some("help") | Some("--help") | Some("-h") | None => {
            print_usage();
            Ok(())
        }

        Some(other) => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
