use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use hermes_clock::{Clock, SystemClock};
use hermes_gateway::GatewayFactory;
use hermes_registry::ExchangeFilter;
use hermes_runner::{
    Bootstrap, DEFAULT_CONFIG_FILE, DEFAULT_QUERY_LIMIT, Settings, init_logging, install_signal_handlers, load_config,
    run_market_data, run_query, run_trade,
};
use hermes_session::ShutdownSignal;
use log::{error, info};
use uuid::Uuid;

fn print_help() {
    eprintln!(
        r#"Hermes - futures gateway client: market-data capture and trade session

USAGE:
    hermes <MODE> [OPTIONS]

MODES:
    md                  Subscribe to today's contracts and store every tick
    trade               Authenticate, log in and query positions
    query               List stored tables, or print the tail of one

OPTIONS:
    --config <PATH>     Settings file (default: CONF.yml)
    --platform <NAME>   CTP_SERVER platform (default: SIMNOW)
    --env <NAME>        CTP_SERVER environment (default: simulation)
    --exchanges <LIST>  all, or comma-separated exchanges (default: all)
    --gateway <NAME>    Gateway binding (default: sim)
    --run-for <SECS>    Stop after this many seconds
    --container <NAME>  query: exchange container to open (e.g. SHFE)
    --table <NAME>      query: instrument table to print
    --limit <N>         query: records to print (default: 10)
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Overrides APP_CONFIG.log_level

EXAMPLES:
    hermes md --exchanges SHFE,DCE
    hermes trade --platform SIMNOW --env simulation --run-for 60
    hermes query --container SHFE --table rb2601 --limit 5
"#
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    MarketData,
    Trade,
    Query,
}

struct Options {
    mode: Mode,
    config: PathBuf,
    platform: String,
    environment: String,
    exchanges: ExchangeFilter,
    gateway: String,
    run_for: Option<Duration>,
    container: Option<String>,
    table: Option<String>,
    limit: usize,
}

/// `Ok(None)` when help was requested
fn parse_args(args: &[String]) -> anyhow::Result<Option<Options>> {
    let mut mode = None;
    let mut options = Options {
        mode: Mode::MarketData,
        config: PathBuf::from(DEFAULT_CONFIG_FILE),
        platform: "SIMNOW".to_string(),
        environment: "simulation".to_string(),
        exchanges: ExchangeFilter::All,
        gateway: "sim".to_string(),
        run_for: None,
        container: None,
        table: None,
        limit: DEFAULT_QUERY_LIMIT,
    };

    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        let mut value = || -> anyhow::Result<String> {
            i += 1;
            args.get(i).cloned().with_context(|| format!("{arg} requires a value"))
        };
        match arg {
            "--help" | "-h" => return Ok(None),
            "md" => mode = Some(Mode::MarketData),
            "trade" => mode = Some(Mode::Trade),
            "query" => mode = Some(Mode::Query),
            "--config" | "-c" => options.config = PathBuf::from(value()?),
            "--platform" => options.platform = value()?,
            "--env" => options.environment = value()?,
            "--exchanges" => options.exchanges = value()?.parse()?,
            "--gateway" => options.gateway = value()?,
            "--run-for" => {
                let secs: u64 = value()?.parse().context("--run-for expects whole seconds")?;
                options.run_for = Some(Duration::from_secs(secs));
            }
            "--container" => options.container = Some(value()?),
            "--table" => options.table = Some(value()?),
            "--limit" => options.limit = value()?.parse().context("--limit expects a number")?,
            other => bail!("Unknown argument: {other}"),
        }
        i += 1;
    }

    options.mode = mode.context("a mode (md, trade or query) is required")?;
    Ok(Some(options))
}

fn gateway_factory(name: &str, bootstrap: &Bootstrap) -> anyhow::Result<Box<dyn GatewayFactory>> {
    match name {
        "sim" => Ok(Box::new(bootstrap.simulator())),
        other => bail!("Gateway '{other}' is not built in; native bindings plug in through GatewayFactory"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_help();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            print_help();
            std::process::exit(1);
        }
    };

    let settings = load_config(&options.config)
        .with_context(|| format!("loading settings from {}", options.config.display()))?;
    let clock = SystemClock::new();
    if options.mode == Mode::Query {
        return query(&settings, &options);
    }

    let log_file = settings.log_file(clock.today());
    init_logging(settings.level_filter()?, Some(&log_file))?;
    let run_id = Uuid::new_v4();
    info!(
        "Hermes run {run_id} starting ({:?}, {}/{}, log {})",
        options.mode,
        options.platform,
        options.environment,
        log_file.display()
    );

    let shutdown = ShutdownSignal::new();
    let signals = install_signal_handlers(shutdown.clone());

    let bootstrap = Bootstrap::new(settings, &options.platform, &options.environment, &clock)?;
    let factory = gateway_factory(&options.gateway, &bootstrap)?;
    let outcome = match options.mode {
        Mode::MarketData => {
            run_market_data(&bootstrap, factory.as_ref(), options.exchanges.clone(), shutdown.clone(), options.run_for)
                .await
        }
        Mode::Trade => run_trade(&bootstrap, factory.as_ref(), shutdown.clone(), options.run_for).await,
        Mode::Query => Ok(()),
    };

    shutdown.trigger("run finished");
    if let Err(e) = signals.await {
        error!("Signal handler task failed: {e}");
    }

    match outcome {
        Ok(()) => {
            info!("Hermes run {run_id} finished");
            Ok(())
        }
        Err(e) => {
            error!("Hermes run {run_id} failed: {e}");
            Err(e.into())
        }
    }
}

fn query(settings: &Settings, options: &Options) -> anyhow::Result<()> {
    init_logging(settings.level_filter()?, None)?;
    let storage = settings.storage();
    let container = options.container.as_deref().unwrap_or_default();
    let mut stdout = std::io::stdout().lock();
    let printed = run_query(
        storage.kind,
        &storage.backend_dir(),
        container,
        options.table.as_deref(),
        options.limit,
        &mut stdout,
    )?;
    info!("{printed} rows from {} {container}", storage.kind);
    Ok(())
}
