//! Plenticore command line tool
//!
//! Polls a KOSTAL Plenticore inverter over Modbus/TCP, prints its values
//! and writes settings.
//!
//! Usage:
//!   plenticore --host 192.168.1.50 poll
//!   plenticore --host 192.168.1.50 watch --interval 10
//!   plenticore --host 192.168.1.50 set-min-soc 15
//!   plenticore plan

use std::time::Duration;

use clap::{Parser, Subcommand};
use plenticore_modbus::{
    logging, BridgeConfig, DeviceLimits, Endpoint, InverterBridge, LogLevel, ReadPlan,
    RegisterCatalog, Snapshot, Timeouts, DEFAULT_TCP_PORT,
};

#[derive(Parser)]
#[command(name = "plenticore")]
#[command(version, about = "Modbus/TCP bridge for KOSTAL Plenticore inverters")]
struct Cli {
    /// Inverter host name or IP address
    #[arg(long, global = true, env = "PLENTICORE_HOST")]
    host: Option<String>,

    /// Modbus/TCP port
    #[arg(long, global = true, env = "PLENTICORE_PORT", default_value_t = DEFAULT_TCP_PORT)]
    port: u16,

    /// Modbus unit id
    #[arg(long, global = true, default_value_t = plenticore_modbus::config::DEFAULT_UNIT_ID)]
    unit_id: u8,

    /// Connect and request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Dump raw frames (implies -vv)
    #[arg(long, global = true)]
    packets: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one polling cycle and print every register
    Poll,
    /// Poll periodically until Ctrl-C
    Watch {
        /// Seconds between cycles
        #[arg(long, default_value_t = 15)]
        interval: u64,
    },
    /// Write a read-write register by name
    Set { name: String, value: f64 },
    /// Set the battery's minimum state of charge in percent
    SetMinSoc { percent: f32 },
    /// Print the read plan without connecting
    Plan,
}

impl Cli {
    fn config(&self) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
        let host = self
            .host
            .clone()
            .ok_or("no inverter host given (use --host or PLENTICORE_HOST)")?;

        let mut config = BridgeConfig::with_endpoint(Endpoint::new(host, self.port))
            .with_unit_id(self.unit_id)
            .with_packet_logging(self.packets);
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeouts(Timeouts::uniform(Duration::from_millis(ms)));
        }
        Ok(config)
    }
}

fn print_snapshot(catalog: &RegisterCatalog, snapshot: &Snapshot) {
    let updated = snapshot
        .updated_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "status: {}  state: {}  updated: {}  blocks: {} ok / {} failed",
        snapshot.status,
        snapshot.inverter_state,
        updated,
        snapshot.last_cycle.blocks_ok,
        snapshot.last_cycle.blocks_failed
    );

    for descriptor in catalog.all() {
        let value = match snapshot.read(descriptor) {
            Ok(value) => value.to_string(),
            Err(e) => format!("<{}>", e),
        };
        println!(
            "  {:>5}  {:<40} {:>14} {}",
            descriptor.address,
            descriptor.name,
            value,
            descriptor.unit.unwrap_or("")
        );
    }
}

fn print_plan(plan: &ReadPlan) {
    println!(
        "{} blocks, {} registers, image size {}",
        plan.len(),
        plan.total_registers(),
        plan.end_address()
    );
    for block in plan.blocks() {
        println!("  start={:<5} count={}", block.start, block.count);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.packets {
        LogLevel::Trace
    } else {
        LogLevel::from_verbosity(cli.verbose)
    };
    logging::init(level);

    match &cli.command {
        Command::Plan => {
            let plan = ReadPlan::for_catalog(&RegisterCatalog::plenticore(), &DeviceLimits::default());
            print_plan(&plan);
        }
        Command::Poll => {
            let bridge = InverterBridge::new(cli.config()?)?;
            let snapshot = bridge.poll().await;
            print_snapshot(bridge.catalog(), &snapshot);
            if !snapshot.is_online() {
                return Err(format!("{} is offline", bridge.config().endpoint).into());
            }
        }
        Command::Watch { interval } => {
            let config = cli.config()?.with_poll_interval(Duration::from_secs(*interval));
            let bridge = InverterBridge::new(config)?;
            let mut updates = bridge.subscribe();

            let printer = async {
                while updates.changed().await.is_ok() {
                    let snapshot = updates.borrow_and_update().clone();
                    print_snapshot(bridge.catalog(), &snapshot);
                }
            };
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };

            tokio::select! {
                _ = bridge.run(shutdown) => {}
                _ = printer => {}
            }
        }
        Command::Set { name, value } => {
            let bridge = InverterBridge::new(cli.config()?)?;
            bridge.set_named(name, *value).await?;
            println!("{} = {}", name, value);
        }
        Command::SetMinSoc { percent } => {
            let bridge = InverterBridge::new(cli.config()?)?;
            bridge.set_min_soc(*percent).await?;
            println!("minimum_soc = {}", percent);
        }
    }

    Ok(())
}
