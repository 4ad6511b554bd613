//! alarm-agent: raise an alarm and answer the manager's GET.
//!
//! Part of the snmp-alarm CLI utilities.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use snmp_alarm::Agent;
use snmp_alarm::agent::{DEFAULT_AGENT_ADDRESS, DEFAULT_ALARM_CODE, DEFAULT_ALARM_TEXT, DEFAULT_MANAGER_ADDRESS};
use snmp_alarm::cli::StdoutEventSink;
use snmp_alarm::cli::args::{CommonArgs, LogArgs};

/// Send alarm traps to a manager and serve sysDescr.0.
#[derive(Debug, Parser)]
#[command(name = "alarm-agent", version, about)]
struct Args {
    /// Agent id carried in every trap.
    #[arg(value_name = "AGENT_ID")]
    agent_id: String,

    /// Address to serve GETs on (host:port or host/port).
    #[arg(short = 'b', long = "bind", default_value = DEFAULT_AGENT_ADDRESS)]
    bind: String,

    /// Manager address traps are sent to.
    #[arg(short = 'm', long = "manager", default_value = DEFAULT_MANAGER_ADDRESS)]
    manager: String,

    /// Address written into traps (defaults to the bound address).
    #[arg(long = "advertise")]
    advertise: Option<String>,

    /// Value answered for sysDescr.0 (defaults to "<AGENT_ID> says Hello.").
    #[arg(long = "description")]
    description: Option<String>,

    /// Alarm code carried in traps.
    #[arg(long = "alarm-code", default_value = DEFAULT_ALARM_CODE)]
    alarm_code: String,

    /// Alarm text carried in traps.
    #[arg(long = "alarm-text", default_value = DEFAULT_ALARM_TEXT)]
    alarm_text: String,

    /// Number of alarm traps to send.
    #[arg(short = 'n', long = "traps", default_value = "1")]
    traps: u32,

    /// Seconds between alarm traps.
    #[arg(long = "interval", default_value = "1")]
    interval: u64,

    /// Skip the coldStart notification at startup.
    #[arg(long = "no-cold-start")]
    no_cold_start: bool,

    /// Exit after sending instead of serving GETs until interrupted.
    #[arg(long = "once")]
    once: bool,

    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    log: LogArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.log.init_tracing();

    let mut builder = Agent::builder(args.agent_id.as_str())
        .bind(args.bind.as_str())
        .manager(args.manager.as_str())
        .alarm_code(args.alarm_code.as_str())
        .alarm_text(args.alarm_text.as_str())
        .community(args.common.community.clone().into_bytes())
        .events(Arc::new(StdoutEventSink));
    if let Some(addr) = &args.advertise {
        builder = builder.advertise(addr.as_str());
    }
    if let Some(description) = &args.description {
        builder = builder.description(description.as_str());
    }

    let agent = match builder.build().await {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let serving = tokio::spawn({
        let agent = agent.clone();
        async move { agent.run().await }
    });

    if !args.no_cold_start {
        agent.send_cold_start().await;
    }

    let mut failures = 0u32;
    for i in 0..args.traps {
        if i > 0 {
            tokio::time::sleep(Duration::from_secs(args.interval)).await;
        }
        if !agent.send_trap().await {
            failures += 1;
        }
    }

    if !args.once {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("Error: {}", e);
        }
    }

    agent.stop();
    match serving.await {
        Ok(Ok(())) if failures == 0 => ExitCode::SUCCESS,
        Ok(Ok(())) => ExitCode::FAILURE,
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
