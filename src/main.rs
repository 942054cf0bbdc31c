// Main CLI entry point for reqcraft
// Uses clap for argument parsing

use std::collections::HashMap;
use std::fs;
use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command};
use reqcraft::auth::AuthorizationConfig;
use reqcraft::engine::HttpTransport;
use reqcraft::error::{AssembleError, ParseError};
use reqcraft::models::{Operation, RequestPayload};
use reqcraft::request::{AssemblerConfig, RequestAssembler};
use reqcraft::store::{ScopedStore, StoredValue};
use reqcraft::uri::ServerKind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid --server-kind")]
    ServerKind(#[source] ParseError),

    #[error("invalid --server-index: {0}")]
    ServerIndex(String),

    #[error("failed to print output")]
    Output(#[source] serde_json::Error),

    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

fn cli() -> Command {
    Command::new("reqcraft")
        .version(clap::crate_version!())
        .about("Compiles API operation parameters, user values and authorization into HTTP requests")
        .after_help("EXAMPLES:\n  reqcraft --operation op.json --values values.json --base-uri https://api.example.com\n  reqcraft -o op.json -v values.json -a auth.json --send\n  reqcraft -o op.json -v values.json --report")
        .arg(Arg::new("operation")
            .short('o')
            .long("operation")
            .required(true)
            .num_args(1)
            .help("Path to the operation description (JSON)"))
        .arg(Arg::new("values")
            .short('v')
            .long("values")
            .num_args(1)
            .help("Path to a JSON map of parameter id to entered value"))
        .arg(Arg::new("auth")
            .short('a')
            .long("auth")
            .num_args(1)
            .help("Path to a JSON list of authorization configs"))
        .arg(Arg::new("base_uri")
            .short('b')
            .long("base-uri")
            .num_args(1)
            .default_value("")
            .help("Explicit base URI, overrides server selection"))
        .arg(Arg::new("server_kind")
            .long("server-kind")
            .num_args(1)
            .default_value("server")
            .help("Server selection kind: server, custom or uri"))
        .arg(Arg::new("server_value")
            .long("server-value")
            .num_args(1)
            .default_value("")
            .help("URI used for custom/uri server selections"))
        .arg(Arg::new("server_index")
            .long("server-index")
            .num_args(1)
            .default_value("0")
            .help("Index of the model server used for server selections"))
        .arg(Arg::new("api_version")
            .long("api-version")
            .num_args(1)
            .help("Value substituted for {version} in server URLs"))
        .arg(Arg::new("nil")
            .long("nil")
            .action(ArgAction::Append)
            .help("Parameter id to send as an explicit nil value (repeatable)"))
        .arg(Arg::new("payload")
            .short('p')
            .long("payload")
            .num_args(1)
            .help("Path to a file used as the request body"))
        .arg(Arg::new("content_type")
            .long("content-type")
            .num_args(1)
            .help("Content type of the request body"))
        .arg(Arg::new("report")
            .long("report")
            .action(ArgAction::SetTrue)
            .help("Print the parameter serialization report instead of the request"))
        .arg(Arg::new("send")
            .long("send")
            .action(ArgAction::SetTrue)
            .help("Send the request and print the response"))
}

fn read_file(path: &str) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_string(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, CliError> {
    let data = read_file(path)?;
    serde_json::from_str(&data).map_err(|source| CliError::Parse {
        path: path.to_string(),
        source,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(CliError::Output)?;
    println!("{}", text);
    Ok(())
}

fn assembler_config(matches: &ArgMatches) -> Result<AssemblerConfig, CliError> {
    let arg = |name: &str| matches.get_one::<String>(name).cloned().unwrap_or_default();
    let server_kind: ServerKind = arg("server_kind").parse().map_err(CliError::ServerKind)?;
    let index_text = arg("server_index");
    let server_index = index_text
        .parse::<usize>()
        .map_err(|_| CliError::ServerIndex(index_text.clone()))?;
    Ok(AssemblerConfig {
        base_uri: arg("base_uri"),
        server_kind,
        server_value: arg("server_value"),
        server_index,
        api_version: matches.get_one::<String>("api_version").cloned(),
    })
}

fn run(matches: &ArgMatches) -> Result<(), CliError> {
    let operation_path = matches.get_one::<String>("operation").cloned().unwrap_or_default();
    let operation: Operation = read_json(&operation_path)?;
    info!(operation = %operation.id, parameters = operation.parameters.len(), "operation loaded");

    let store: ScopedStore = match matches.get_one::<String>("values") {
        Some(path) => read_json::<HashMap<String, StoredValue>>(path)?.into_iter().collect(),
        None => ScopedStore::new(),
    };

    let mut assembler = RequestAssembler::with_store(assembler_config(matches)?, store);
    assembler.select_operation(operation);

    if let Some(path) = matches.get_one::<String>("auth") {
        let authorization: Vec<AuthorizationConfig> = read_json(path)?;
        assembler.set_authorization(authorization);
    }
    if let Some(ids) = matches.get_many::<String>("nil") {
        for id in ids {
            assembler.mark_nil(id.clone());
        }
    }
    if let Some(path) = matches.get_one::<String>("payload") {
        let body = read_file(path)?;
        let content_type = matches.get_one::<String>("content_type").cloned();
        assembler.set_payload(Some(RequestPayload::Text(body)), content_type);
    }

    if matches.get_flag("report") {
        return print_json(&assembler.report()?);
    }

    if matches.get_flag("send") {
        let transport = HttpTransport::new().map_err(AssembleError::from)?;
        let response = assembler.execute(&transport)?;
        return print_json(&response);
    }

    match assembler.prepare() {
        Ok(prepared) => {
            info!(id = %prepared.id, "request prepared");
            print_json(&prepared.request)
        }
        Err(AssembleError::InvalidParameters(ids)) => {
            // still show what would be sent
            print_json(&assembler.serialize()?)?;
            Err(AssembleError::InvalidParameters(ids).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    if let Err(e) = run(&matches) {
        error!("{}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        process::exit(1);
    }
}
