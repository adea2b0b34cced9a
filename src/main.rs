//! grid-tunnel CLI
//!
//! `cpu` and `gpu` run the proxy-command tunnel; `list`, `cancel`, and
//! `ssh` are the interactive management commands. Components return
//! errors; exit codes are decided here and nowhere else.

use std::io;
use std::process;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use grid_tunnel::config::TunnelConfig;
use grid_tunnel::job::{matches_prefix, JobClass, SessionRequest};
use grid_tunnel::lifecycle::{self, Controller, LifecycleContext, SubmitPlan};
use grid_tunnel::scheduler::{GridEngine, Scheduler};
use grid_tunnel::signal::Interrupt;
use grid_tunnel::timeout::Deadline;
use grid_tunnel::{bridge, session};

#[derive(Parser)]
#[command(name = "grid-tunnel")]
#[command(about = "Transient editor sessions on batch-scheduled cluster nodes", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tunnel to the CPU-class session job (ssh ProxyCommand mode)
    Cpu,

    /// Tunnel to the GPU-class session job (ssh ProxyCommand mode)
    Gpu,

    /// List session jobs
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Cancel session jobs and wait until none remains
    Cancel,

    /// Open an interactive shell on a running session node
    Ssh,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Unknown commands exit 1; help and version stay 0.
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            process::exit(code);
        }
    };

    let config = match TunnelConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error loading config: {}", err);
            process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Cpu => run_connect(&config, JobClass::Cpu),
        Commands::Gpu => run_connect(&config, JobClass::Gpu),
        Commands::List { json } => run_list(&config, json),
        Commands::Cancel => run_cancel(&config),
        Commands::Ssh => run_ssh(&config),
    };
    process::exit(code);
}

fn install_interrupt() -> Interrupt {
    let interrupt = Interrupt::new();
    if let Err(err) = interrupt.install() {
        eprintln!("Warning: could not install signal handler: {}", err);
    }
    interrupt
}

fn run_connect(config: &TunnelConfig, class: JobClass) -> i32 {
    let scheduler = GridEngine::new(config);
    let interrupt = install_interrupt();
    let request = SessionRequest::new(&config.base_name, class);
    let plan = SubmitPlan {
        params: config.params_for(class).to_string(),
        script: config.script_path(),
    };
    let mut controller = Controller::new(
        &scheduler,
        &config.effective_user(),
        plan,
        config.poll_intervals(),
        interrupt.clone(),
    );
    let mut ctx = LifecycleContext::new(config.start_timeout());

    let endpoint = match controller.wait_for_running(&request, &mut ctx) {
        Ok(endpoint) => endpoint,
        Err(err) => {
            eprintln!("{}", err);
            return 1;
        }
    };
    eprintln!("session job running on {}:{}", endpoint.node, endpoint.port);

    if let Err(err) = bridge::wait_reachable(
        &endpoint,
        ctx.deadline(),
        config.poll_intervals().reachability,
        &interrupt,
    ) {
        eprintln!("{}", err);
        return 1;
    }

    let stream = match bridge::connect(&endpoint) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("{}", err);
            return 1;
        }
    };
    match bridge::relay(stream, io::stdin(), io::stdout()) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("{}", err);
            1
        }
    }
}

fn run_list(config: &TunnelConfig, json: bool) -> i32 {
    let scheduler = GridEngine::new(config);
    let records = scheduler.list_jobs(&config.effective_user());
    let prefixes: Vec<String> = JobClass::ALL
        .iter()
        .map(|class| format!("{}-{}", config.base_name, class))
        .collect();
    let session_jobs: Vec<_> = records
        .iter()
        .filter(|record| {
            prefixes
                .iter()
                .any(|prefix| matches_prefix(&record.full_name, prefix))
        })
        .collect();

    if json {
        match serde_json::to_string_pretty(&session_jobs) {
            Ok(out) => {
                println!("{}", out);
                return 0;
            }
            Err(err) => {
                eprintln!("Error serializing output: {}", err);
                return 1;
            }
        }
    }

    if session_jobs.is_empty() {
        println!("No session jobs.");
        return 0;
    }
    println!("Session jobs ({} total):\n", session_jobs.len());
    for record in session_jobs {
        println!(
            "  {}  {}  {}  {}",
            record.id,
            record.full_name,
            record.state,
            record.queue_at_node.as_deref().unwrap_or("-")
        );
    }
    0
}

fn run_cancel(config: &TunnelConfig) -> i32 {
    let scheduler = GridEngine::new(config);
    let interrupt = install_interrupt();
    let deadline = Deadline::new(config.start_timeout());
    match lifecycle::cancel_all(
        &scheduler,
        &config.base_name,
        &config.effective_user(),
        &deadline,
        config.poll_intervals().cancel,
        &interrupt,
    ) {
        Ok(0) => {
            println!("No session jobs to cancel.");
            0
        }
        Ok(count) => {
            println!("Requested cancellation for {} job(s).", count);
            0
        }
        Err(err) => {
            eprintln!("{}", err);
            1
        }
    }
}

fn run_ssh(config: &TunnelConfig) -> i32 {
    let scheduler = GridEngine::new(config);
    let candidates =
        session::resolve_candidates(&scheduler, &config.effective_user(), &config.base_name);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut prompt = io::stderr();
    let chosen = match session::choose(candidates, &mut input, &mut prompt) {
        Ok(chosen) => chosen,
        Err(err) => {
            eprintln!("{}", err);
            return 1;
        }
    };

    eprintln!(
        "opening shell to {} ({} session)",
        chosen.endpoint.node, chosen.class
    );
    match session::open_shell(&chosen.endpoint.node) {
        Ok(status) => status.code().unwrap_or(1),
        Err(err) => {
            eprintln!("{}", err);
            1
        }
    }
}
