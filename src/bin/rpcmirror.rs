use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rpcmirror::{generate, Discovery, Forwarder, HttpTransport, RustTemplate, Value};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rpcmirror", version = rpcmirror::VERSION)]
#[command(about = "Discover and call functions exposed by a remote rpcmirror server", long_about = None)]
struct Args {
    /// Server URL, e.g. http://127.0.0.1:8888/
    #[arg(short, long, global = true, env = "RPCMIRROR_SERVER")]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Page through everything the server exposes and print proxies for it.
    Discover(DiscoverArgs),
    /// Forward one call and print the decoded result.
    Call(CallArgs),
}

#[derive(Parser, Debug)]
struct DiscoverArgs {
    #[arg(long, value_enum, default_value_t = Format::Rust)]
    format: Format,

    /// Wrap the generated proxies in `pub mod <MODULE>`.
    #[arg(long)]
    module: Option<String>,

    /// Path the generated code imports rpcmirror from.
    #[arg(long, default_value = "rpcmirror")]
    crate_path: String,

    /// Write to a file instead of stdout.
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CallArgs {
    /// `Class::method` or a function name.
    target: String,

    /// Arguments: integers, floats, true/false, null, anything else is a string.
    args: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Rust,
    Json,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Reads a command-line argument as the most specific value it spells.
fn parse_arg(raw: &str) -> Value {
    match raw {
        "null" => Value::Nil,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| raw.parse::<f64>().map(Value::Float))
            .unwrap_or_else(|_| Value::from(raw)),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let server = args
        .server
        .context("no server given; pass --server or set RPCMIRROR_SERVER")?;

    match args.command {
        Command::Discover(opts) => {
            let mut discovery = Discovery::new();
            let stats = discovery
                .discover(&HttpTransport, &server)
                .await
                .with_context(|| format!("discovering {server}"))?;
            info!(?stats, "discovered");

            let rendered = match opts.format {
                Format::Rust => {
                    let template = RustTemplate {
                        crate_path: opts.crate_path,
                        module: opts.module,
                    };
                    generate::render(&discovery.into_catalog(), &template)?
                }
                Format::Json => {
                    let catalog = discovery.into_catalog();
                    let elements: Vec<_> = (1..=catalog.total_pages())
                        .filter_map(|page| catalog.serve_page(page))
                        .flat_map(|page| page.elements)
                        .collect();
                    serde_json::to_string_pretty(&elements)?
                }
            };
            match opts.out {
                Some(path) => std::fs::write(&path, rendered)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{rendered}"),
            }
        }
        Command::Call(call) => {
            let mut mirror = Forwarder::new();
            mirror.set_server(server);
            let call_args = call.args.iter().map(|a| parse_arg(a)).collect();
            let outcome = mirror.call(&call.target, call_args, None).await?;
            info!(
                time = %outcome.time,
                execution_time = ?outcome.execution_time,
                memory_usage = outcome.memory_usage,
                "call finished"
            );
            println!("{:?}", outcome.result);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_to_the_most_specific_value() {
        assert_eq!(parse_arg("42"), Value::Int(42));
        assert_eq!(parse_arg("-1.5"), Value::Float(-1.5));
        assert_eq!(parse_arg("true"), Value::Bool(true));
        assert_eq!(parse_arg("null"), Value::Nil);
        assert_eq!(parse_arg("hello"), Value::from("hello"));
    }

    #[test]
    fn version_flag_prints_the_library_version() {
        let err = Args::try_parse_from(["rpcmirror", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert!(err.to_string().contains(rpcmirror::VERSION));
        assert_eq!(rpcmirror::VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
