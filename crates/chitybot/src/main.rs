use anyhow::Context;
use chity_bot::{Bot, Stats, Supervisor};
use chity_bot_ws::WsConnector;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod output;

use config::Overrides;
use output::Output;

#[derive(Parser)]
#[command(name = "chitybot")]
#[command(version)]
#[command(about = "Run synthetic users against a ChityChat service")]
#[command(long_about = "Connects one or more bots to a ChityChat service. Each bot logs in as \
bot<N> (registering on first use), joins or creates groups and chats at random until interrupted.")]
struct Cli {
    /// Instance number; the bot logs in as bot<INSTANCE_ID>
    instance_id: u32,

    /// Output in JSON format, logs included
    #[arg(short, long)]
    json: bool,

    /// Config file (default: platform config dir/chitybot/config.json)
    #[arg(long, env = "CHITYBOT_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Chat service host
    #[arg(long, env = "CHITYBOT_HOST")]
    host: Option<String>,

    /// Chat service port
    #[arg(long, env = "CHITYBOT_PORT")]
    port: Option<u16>,

    /// Password for every instance
    #[arg(long, env = "CHITYBOT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Connect with plain ws:// instead of wss://
    #[arg(long)]
    insecure_ws: bool,

    /// Number of instances to run, numbered upwards from INSTANCE_ID
    #[arg(short = 'n', long, default_value = "1")]
    count: u32,
}

#[derive(Serialize)]
struct InstanceSummary {
    user: String,
    reached_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    stats: Stats,
    actions: BTreeMap<&'static str, u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let output = Output::new(cli.json);
    init_tracing(cli.json);

    if let Err(e) = run(cli, output).await {
        output.failure(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli, output: Output) -> anyhow::Result<()> {
    anyhow::ensure!(cli.count > 0, "--count must be at least 1");
    let last = cli
        .instance_id
        .checked_add(cli.count - 1)
        .context("Instance range overflows")?;

    let overrides = Overrides {
        host: cli.host,
        port: cli.port,
        password: cli.password,
        insecure_ws: cli.insecure_ws,
    };
    let mut base = config::load(cli.config.as_deref())?;
    overrides.apply(&mut base);
    info!(url = %base.url(), instances = cli.count, "starting");

    let mut supervisors = Vec::new();
    for instance in cli.instance_id..=last {
        let config = overrides.instance(&base, instance);
        let connector = WsConnector::from_config(&config);
        let user = config.username.clone();
        let bot = Bot::new(config, connector).on_connected(move |state| {
            output.event(
                "ready",
                json!({
                    "user": user,
                    "user_id": state.me,
                    "groups": state.cache.group_ids(),
                }),
            );
        });
        supervisors.push(Supervisor::new(bot));
    }
    let stops: Vec<_> = supervisors.iter().map(|s| s.stop_handle()).collect();

    let results = {
        let runs = futures_util::future::join_all(supervisors.iter_mut().map(|s| s.run()));
        tokio::pin!(runs);
        tokio::select! {
            results = &mut runs => results,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("interrupted, stopping bots");
                for stop in &stops {
                    stop.stop();
                }
                runs.await
            }
        }
    };

    let mut summaries = Vec::new();
    let mut failed = 0;
    for (supervisor, result) in supervisors.iter().zip(results) {
        let bot = supervisor.bot();
        let stats = bot.state().lock().await.stats.clone();
        let actions = stats.actions_by_name();
        if result.is_err() {
            failed += 1;
        }
        summaries.push(InstanceSummary {
            user: bot.config().username.clone(),
            reached_ready: bot.reached_ready(),
            error: result.err().map(|e| e.to_string()),
            stats,
            actions,
        });
    }
    output.summary(&summaries);

    anyhow::ensure!(failed == 0, "{} of {} bots failed", failed, summaries.len());
    Ok(())
}
