mod http;
mod system;

use clap::{Parser, Subcommand};
use dex_config::DexConfig;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use system::{Outcome, System};
use tracing::info;

mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const TASK_FAILURE: u8 = 1;
    pub const CONFIG_FAILURE: u8 = 2;
    pub const CANCELLED: u8 = 130;
}

#[derive(Parser, Debug)]
#[command(name = "dex")]
#[command(about = "Personal task-automation operator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a natural-language request and print the verdict.
    Run { request: Vec<String> },
    /// Print active tasks and recent trace summaries.
    Status,
    /// Create the data directory layout.
    Init,
    /// Check config validity, data dir writability, and notification channels.
    Doctor,
    /// Start the reminder monitor loop.
    Reminders,
    /// Start the HTTP dashboard.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Start the chat-bot surface.
    Chat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = DexConfig::from_env();
    dex_telemetry::init_logging(&config.log_level);

    let cli = Cli::parse();

    let code = match cli.command {
        Command::Run { request } => run_request(config, request.join(" ")).await,
        Command::Status => status(config).await,
        Command::Init => init(config).await,
        Command::Doctor => doctor(config).await,
        Command::Reminders => reminders(config).await,
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Chat => chat(config).await,
    };

    ExitCode::from(code)
}

async fn run_request(config: DexConfig, request: String) -> u8 {
    if request.trim().is_empty() {
        eprintln!("usage: dex run <request>");
        return exit_code::CONFIG_FAILURE;
    }

    let system = match System::build(config).await {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to start: {err}");
            return exit_code::CONFIG_FAILURE;
        }
    };

    let outcome = system
        .submit_task(&request, |risk| {
            print!("Plan carries {:?} risk ({}). Proceed? [y/N] ", risk.level, risk.reasoning);
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).is_ok() && line.trim().eq_ignore_ascii_case("y")
        })
        .await;

    match outcome {
        Ok(Outcome::Verified { plan, verification, .. }) => {
            println!("plan: {}", plan.reasoning);
            for step in &plan.steps {
                println!("  - {} ({})", step.description, step.tool_name);
            }
            println!("verified: {}", verification.verified);
            for issue in &verification.issues {
                println!("issue: {issue}");
            }
            for recommendation in &verification.recommendations {
                println!("recommendation: {recommendation}");
            }
            if verification.verified {
                exit_code::SUCCESS
            } else {
                exit_code::TASK_FAILURE
            }
        }
        Ok(Outcome::Cancelled { .. }) => {
            println!("cancelled");
            exit_code::CANCELLED
        }
        Err(err) => {
            eprintln!("{err}");
            exit_code::TASK_FAILURE
        }
    }
}

async fn status(config: DexConfig) -> u8 {
    let system = match System::build(config).await {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to start: {err}");
            return exit_code::CONFIG_FAILURE;
        }
    };

    let active = system.agents.state.get_active_tasks().await;
    if active.is_empty() {
        println!("no active tasks");
    }
    for trace in active {
        println!(
            "task {} status={:?} steps_executed={} errors={}",
            trace.task_id,
            trace.status,
            trace.steps_executed.len(),
            trace.errors.len()
        );
    }
    exit_code::SUCCESS
}

async fn init(config: DexConfig) -> u8 {
    match tokio::fs::create_dir_all(config.data_dir.join("notes")).await {
        Ok(()) => {
            println!("initialized data directory at {}", config.data_dir.display());
            exit_code::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to create data directory: {err}");
            exit_code::CONFIG_FAILURE
        }
    }
}

async fn doctor(config: DexConfig) -> u8 {
    let mut ok = true;

    println!("data_dir: {}", config.data_dir.display());
    let probe = config.data_dir.join(".doctor-write-probe");
    match tokio::fs::create_dir_all(&config.data_dir).await {
        Ok(()) => match tokio::fs::write(&probe, b"ok").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&probe).await;
                println!("data_dir writable: yes");
            }
            Err(err) => {
                println!("data_dir writable: no ({err})");
                ok = false;
            }
        },
        Err(err) => {
            println!("data_dir creatable: no ({err})");
            ok = false;
        }
    }

    println!("risk_mode: {:?}", config.risk_mode);
    println!("planner_provider: {}", config.planner.provider);

    let notifier = dex_notify::NotifierSet::from_config(&config.notify);
    for transport in notifier.transports() {
        println!("notify channel {}: configured={}", transport.name(), transport.is_configured());
    }

    if ok {
        println!("doctor: all checks passed");
        exit_code::SUCCESS
    } else {
        println!("doctor: some checks failed");
        exit_code::CONFIG_FAILURE
    }
}

async fn reminders(config: DexConfig) -> u8 {
    let store = Arc::new(dex_tools::ReminderStore::new(config.data_dir.join("reminders.json")));
    let notifier = Arc::new(dex_notify::NotifierSet::from_config(&config.notify));
    let interval = config.reminder_check_interval;
    info!(interval_secs = interval.as_secs(), "starting reminder monitor");
    let monitor = dex_scheduler::ReminderMonitor::new(store, notifier, interval);
    monitor.run().await
}

async fn serve(config: DexConfig, host: Option<String>, port: Option<u16>) -> u8 {
    let host = host.unwrap_or_else(|| config.http_host.clone());
    let port = port.unwrap_or(config.http_port);

    let system = match System::build(config).await {
        Ok(s) => Arc::new(s),
        Err(err) => {
            eprintln!("failed to start: {err}");
            return exit_code::CONFIG_FAILURE;
        }
    };

    let addr: std::net::SocketAddr = match format!("{host}:{port}").parse() {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("invalid host or port: {err}");
            return exit_code::CONFIG_FAILURE;
        }
    };

    let router = http::router(system);
    info!("starting dashboard on http://{addr}");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            eprintln!("failed to bind {addr}: {err}");
            return exit_code::CONFIG_FAILURE;
        }
    };

    if let Err(err) = axum::serve(listener, router).await {
        eprintln!("server error: {err}");
        return exit_code::TASK_FAILURE;
    }
    exit_code::SUCCESS
}

async fn chat(_config: DexConfig) -> u8 {
    println!("chat-bot surface requires an external chat platform integration; not implemented in this core.");
    exit_code::SUCCESS
}
