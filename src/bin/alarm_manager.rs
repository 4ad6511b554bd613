//! alarm-manager: receive alarm traps and query the raising agent.
//!
//! Part of the snmp-alarm CLI utilities.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use snmp_alarm::Manager;
use snmp_alarm::agent::DEFAULT_MANAGER_ADDRESS;
use snmp_alarm::cli::StdoutEventSink;
use snmp_alarm::cli::args::{CommonArgs, LogArgs, QueryArgs};
use snmp_alarm::manager::DEFAULT_MAX_CONCURRENT;
use snmp_alarm::sink::FileRecordSink;

/// Listen for alarm traps, log them and GET sysDescr.0 from each agent.
#[derive(Debug, Parser)]
#[command(name = "alarm-manager", version, about)]
struct Args {
    /// Address to receive traps on (host:port or host/port).
    #[arg(short = 'b', long = "bind", default_value = DEFAULT_MANAGER_ADDRESS)]
    bind: String,

    /// Directory holding alarms.txt and queries.txt.
    #[arg(short = 'l', long = "log-dir", default_value = ".")]
    log_dir: PathBuf,

    /// Maximum correlations running at once.
    #[arg(long = "max-concurrent", default_value_t = DEFAULT_MAX_CONCURRENT)]
    max_concurrent: usize,

    /// Query this agent address once and exit instead of listening.
    #[arg(long = "query", value_name = "ADDRESS", requires = "agent_id")]
    query: Option<String>,

    /// Agent id recorded with --query.
    #[arg(long = "agent-id")]
    agent_id: Option<String>,

    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    get: QueryArgs,

    #[command(flatten)]
    log: LogArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.log.init_tracing();

    let timeout = match args.get.timeout_duration() {
        Ok(timeout) => timeout,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let records = match FileRecordSink::in_dir(&args.log_dir) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error: cannot open logs in {}: {}", args.log_dir.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let builder = Manager::builder()
        .bind(args.bind.as_str())
        .community(args.common.community.clone().into_bytes())
        .timeout(timeout)
        .retry(args.get.retry_config())
        .max_concurrent(Some(args.max_concurrent))
        .records(Arc::new(records))
        .events(Arc::new(StdoutEventSink));

    // a one-off query must not take the trap port from a running manager
    if let (Some(address), Some(agent_id)) = (&args.query, &args.agent_id) {
        let record = builder.querier().query(address, agent_id).await;
        return if record.outcome.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let manager = match builder.build().await {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let running = tokio::spawn({
        let manager = manager.clone();
        async move { manager.run().await }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Error: {}", e);
    }
    manager.stop();

    match running.await {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
