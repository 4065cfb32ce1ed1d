use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use app_server_bridge::config::load_settings;
use app_server_bridge::{AppServerBridge, BridgeError, BridgeEvent, BridgeOptions, RequestId};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// How long to wait for the app server to exit after disposing.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Talk JSON-RPC to `codex app-server` over stdio
#[derive(Parser)]
#[command(name = "app-server-bridge")]
#[command(version)]
#[command(about = "Talk JSON-RPC to `codex app-server` over stdio")]
struct Cli {
    #[command(flatten)]
    bridge: BridgeArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct BridgeArgs {
    /// App server executable (default: $CODEX_BIN, then `codex`)
    #[arg(long, global = true)]
    codex_bin: Option<PathBuf>,

    /// Working directory for the app server
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Extra environment variable for the app server (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair, global = true)]
    env: Vec<(String, String)>,

    /// Do not send `initialize` on startup
    #[arg(long, global = true)]
    no_initialize: bool,

    /// Settings file (default: the user config file, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log bridge internals and raw traffic to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request and print its result
    Call {
        /// Method name (e.g., newConversation)
        method: String,

        /// Request params as JSON
        #[arg(long, value_parser = parse_json)]
        params: Option<Value>,
    },
    /// Send one notification
    Notify {
        /// Method name
        method: String,

        /// Notification params as JSON
        #[arg(long, value_parser = parse_json)]
        params: Option<Value>,
    },
    /// Interactive session: print events, send what is typed on stdin
    Repl,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("{0}")]
    Spawn(Arc<BridgeError>),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{}`", s)),
    }
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
}

/// One line of REPL input.
#[derive(Debug, PartialEq)]
enum ReplCommand {
    /// `<method> [json]`
    Request { method: String, params: Option<Value> },
    /// `!<method> [json]`
    Notify { method: String, params: Option<Value> },
    /// `=<id> [json]`
    Respond { id: RequestId, result: Value },
}

fn parse_repl_line(line: &str) -> Result<Option<ReplCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (head, rest) = line
        .split_once(char::is_whitespace)
        .map(|(head, rest)| (head, rest.trim()))
        .unwrap_or((line, ""));
    let params = if rest.is_empty() {
        None
    } else {
        Some(parse_json(rest)?)
    };

    let command = if let Some(method) = head.strip_prefix('!') {
        if method.is_empty() {
            return Err("missing method after `!`".to_string());
        }
        ReplCommand::Notify {
            method: method.to_string(),
            params,
        }
    } else if let Some(id) = head.strip_prefix('=') {
        if id.is_empty() {
            return Err("missing id after `=`".to_string());
        }
        let id = id
            .parse::<i64>()
            .map(RequestId::from)
            .unwrap_or_else(|_| RequestId::from(id));
        ReplCommand::Respond {
            id,
            result: params.unwrap_or(Value::Null),
        }
    } else {
        ReplCommand::Request {
            method: head.to_string(),
            params,
        }
    };
    Ok(Some(command))
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_module("app_server_bridge", log::LevelFilter::Debug);
    }
    builder.init();
}

/// Options from defaults and `CODEX_BIN`, then the settings file, then flags.
fn build_options(args: &BridgeArgs) -> Result<BridgeOptions, CliError> {
    let settings = load_settings(args.config.as_deref())?;
    let mut options = settings.apply(BridgeOptions::new());

    if let Some(codex_bin) = &args.codex_bin {
        options = options.codex_bin(codex_bin);
    }
    if let Some(cwd) = &args.cwd {
        options = options.cwd(cwd);
    }
    options = options.envs(args.env.iter().cloned());
    if args.no_initialize {
        options = options.auto_initialize(false);
    }
    Ok(options)
}

/// Start the bridge, turning a spawn failure into an error.
async fn start_bridge(bridge: &AppServerBridge) -> Result<(), CliError> {
    let mut events = bridge.subscribe();
    bridge.start().await?;

    while let Ok(event) = events.try_recv() {
        if let BridgeEvent::Error(err) = event {
            if matches!(err.as_ref(), BridgeError::SpawnFailure { .. }) {
                return Err(CliError::Spawn(err));
            }
        }
    }
    Ok(())
}

/// Dispose and give the app server a moment to exit.
async fn shutdown(bridge: &AppServerBridge) {
    let mut events = bridge.subscribe();
    bridge.dispose();

    let exited = tokio::time::timeout(EXIT_GRACE, async {
        loop {
            match events.recv().await {
                Ok(BridgeEvent::Exit(_)) | Err(broadcast::error::RecvError::Closed) => break,
                _ => {}
            }
        }
    })
    .await;
    if exited.is_err() {
        log::warn!("App server did not exit within {:?}", EXIT_GRACE);
    }
}

fn event_to_json(event: &BridgeEvent) -> Option<Value> {
    match event {
        BridgeEvent::Ready => Some(json!({"event": "ready"})),
        BridgeEvent::Message { message, raw } => Some(json!({
            "event": "message",
            "kind": message.kind().as_str(),
            "message": raw,
        })),
        // Already covered by `message` or `error`
        BridgeEvent::Raw(_) => None,
        BridgeEvent::Exit(info) => Some(json!({
            "event": "exit",
            "code": info.code,
            "signal": info.signal,
        })),
        BridgeEvent::Error(err) => Some(json!({
            "event": "error",
            "message": err.to_string(),
        })),
    }
}

fn print_json(value: &Value) {
    println!("{}", value);
}

async fn run_call(
    bridge: &AppServerBridge,
    method: String,
    params: Option<Value>,
) -> Result<bool, CliError> {
    start_bridge(bridge).await?;
    let outcome = bridge.send_request(method, params).await;
    shutdown(bridge).await;

    match outcome {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response.result)?);
            Ok(true)
        }
        Err(BridgeError::Rejected(error)) => {
            println!("{}", serde_json::to_string_pretty(&error.error)?);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_notify(
    bridge: &AppServerBridge,
    method: String,
    params: Option<Value>,
) -> Result<bool, CliError> {
    start_bridge(bridge).await?;
    bridge.send_notification(method, params)?;
    bridge.flush().await?;
    shutdown(bridge).await;
    Ok(true)
}

async fn run_repl(bridge: &AppServerBridge) -> Result<bool, CliError> {
    let mut events = bridge.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(value) = event_to_json(&event) {
                        print_json(&value);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Event printer lagged, skipped {} event(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    start_bridge(bridge).await?;

    let mut in_flight = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_repl_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                eprintln!("Error: {}", message);
                continue;
            }
        };

        let sent = match command {
            ReplCommand::Request { method, params } => {
                let bridge = bridge.clone();
                in_flight.spawn(async move {
                    let value = match bridge.send_request(method.clone(), params).await {
                        Ok(response) => json!({
                            "event": "result",
                            "method": method,
                            "id": response.id,
                            "result": response.result,
                        }),
                        Err(BridgeError::Rejected(error)) => json!({
                            "event": "rejected",
                            "method": method,
                            "id": error.id,
                            "error": error.error,
                        }),
                        Err(e) => json!({
                            "event": "failed",
                            "method": method,
                            "message": e.to_string(),
                        }),
                    };
                    print_json(&value);
                });
                Ok(())
            }
            ReplCommand::Notify { method, params } => bridge.send_notification(method, params),
            ReplCommand::Respond { id, result } => bridge.send_response(id, result),
        };
        if let Err(e) = sent {
            eprintln!("Error: {}", e);
        }
    }

    // Let outstanding requests settle before disposal rejects them
    let settled = tokio::time::timeout(EXIT_GRACE, async {
        while in_flight.join_next().await.is_some() {}
    })
    .await;
    if settled.is_err() {
        log::warn!("{} request(s) still pending at end of input", in_flight.len());
    }
    // Best effort: the writer may already be gone
    let _ = bridge.flush().await;
    shutdown(bridge).await;
    printer.abort();
    Ok(true)
}

async fn run(cli: Cli) -> Result<bool, CliError> {
    let options = build_options(&cli.bridge)?;
    log::debug!("Using {:?}", options);
    let bridge = AppServerBridge::new(options);

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Call { method, params } => run_call(&bridge, method, params).await,
        Commands::Notify { method, params } => run_notify(&bridge, method, params).await,
        Commands::Repl => run_repl(&bridge).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.bridge.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_pairs_split_on_first_equals() {
        assert_eq!(
            parse_env_pair("A=b=c"),
            Ok(("A".to_string(), "b=c".to_string()))
        );
        assert_eq!(parse_env_pair("EMPTY="), Ok(("EMPTY".to_string(), String::new())));
        assert!(parse_env_pair("=x").is_err());
        assert!(parse_env_pair("novalue").is_err());
    }

    #[test]
    fn repl_request_with_and_without_params() {
        assert_eq!(
            parse_repl_line("newConversation {\"model\":\"o3\"}"),
            Ok(Some(ReplCommand::Request {
                method: "newConversation".to_string(),
                params: Some(json!({"model": "o3"})),
            }))
        );
        assert_eq!(
            parse_repl_line("  ping  "),
            Ok(Some(ReplCommand::Request {
                method: "ping".to_string(),
                params: None,
            }))
        );
    }

    #[test]
    fn repl_notification_and_response() {
        assert_eq!(
            parse_repl_line("!initialized"),
            Ok(Some(ReplCommand::Notify {
                method: "initialized".to_string(),
                params: None,
            }))
        );
        assert_eq!(
            parse_repl_line("=7 {\"decision\":\"approved\"}"),
            Ok(Some(ReplCommand::Respond {
                id: RequestId::from(7),
                result: json!({"decision": "approved"}),
            }))
        );
        assert_eq!(
            parse_repl_line("=abc"),
            Ok(Some(ReplCommand::Respond {
                id: RequestId::from("abc"),
                result: Value::Null,
            }))
        );
    }

    #[test]
    fn repl_rejects_bad_input() {
        assert_eq!(parse_repl_line(""), Ok(None));
        assert!(parse_repl_line("ping {oops").is_err());
        assert!(parse_repl_line("! {}").is_err());
        assert!(parse_repl_line("=").is_err());
    }

    #[test]
    fn raw_events_are_not_printed() {
        assert_eq!(event_to_json(&BridgeEvent::Raw("x".to_string())), None);
        assert_eq!(
            event_to_json(&BridgeEvent::Ready),
            Some(json!({"event": "ready"}))
        );
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "app-server-bridge",
            "call",
            "initialize",
            "--params",
            "{}",
            "--env",
            "A=1",
            "--no-initialize",
        ])
        .unwrap();
        assert!(cli.bridge.no_initialize);
        assert_eq!(cli.bridge.env, vec![("A".to_string(), "1".to_string())]);
        assert!(matches!(
            cli.command,
            Some(Commands::Call { ref method, params: Some(_) }) if method == "initialize"
        ));
    }
}
