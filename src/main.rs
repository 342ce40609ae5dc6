//! TFA9890 host harness
//!
//! Plays the sensor-class host against a simulated I2C bus: attaches the
//! hardware, brings the device to D0, queries the data path and releases
//! it again, printing the bus transcript of every step.
//!
//! Usage:
//!   tfa9890-host --connections 0x34,0x36 --cycles 10 --fail-write 4

use chrono::Local;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tfa9890_sensor_driver::{
    BusFault, ConnectionId, DataField, DeviceLifecycle, DevicePowerState, DriverConfig, DriverError,
    ResourceDescriptor, SensorClient, SimulatedBus, Tfa9890Device,
};

#[derive(Parser, Debug)]
#[command(name = "tfa9890-host")]
#[command(about = "Drive the TFA9890 sensor driver through its lifecycle", long_about = None)]
struct Args {
    /// I2C connection ids assigned to the device (hex or decimal)
    #[arg(short, long, value_delimiter = ',', default_value = "0x34,0x36", value_parser = parse_connection_id)]
    connections: Vec<u64>,

    /// Number of D0 enter/exit cycles to run (0 runs until Ctrl+C)
    #[arg(long, default_value = "1")]
    cycles: u64,

    /// Fail the Nth bus write of the first power-on with a NACK
    #[arg(long)]
    fail_write: Option<usize>,

    /// Refuse to open the second I2C connection
    #[arg(long)]
    refuse_second: bool,

    /// Sampling interval to request in milliseconds
    #[arg(short, long, default_value = "100")]
    interval: u32,

    /// Simulated latency of every bus write in milliseconds
    #[arg(long)]
    write_delay_ms: Option<u64>,

    /// Per-write timeout in milliseconds (0 waits indefinitely)
    #[arg(long, default_value = "1000")]
    timeout_ms: u64,
}

fn parse_connection_id(s: &str) -> Result<u64, String> {
    let parsed = match s.trim().strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.trim().parse(),
    };
    parsed.map_err(|e| format!("invalid connection id '{}': {}", s, e))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    println!("TFA9890 Sensor Driver Host");
    println!("==========================");
    println!("Session: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("Connections: {:?}", args.connections);
    if args.cycles == 0 {
        println!("Cycles: continuous (Ctrl+C to stop)");
    } else {
        println!("Cycles: {}", args.cycles);
    }
    println!();

    let bus = SimulatedBus::new();
    if args.refuse_second {
        if let Some(id) = args.connections.get(1) {
            bus.refuse_open(&ConnectionId(*id).resource_hub_path(), BusFault::NotPresent);
        }
    }
    if let Some(delay) = args.write_delay_ms {
        bus.set_write_delay(Some(Duration::from_millis(delay)));
    }

    let timeout = match args.timeout_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };
    let config = DriverConfig::default().with_write_timeout(timeout);
    let device = Tfa9890Device::new(bus.clone(), config);

    let resources: Vec<ResourceDescriptor> = args
        .connections
        .iter()
        .map(|id| ResourceDescriptor::i2c(*id))
        .collect();

    println!("Attaching hardware...");
    match device.hardware_attach(&resources, &resources) {
        Ok(()) => println!("Hardware attached, state {:?}\n", device.state()),
        Err(DriverError::ResourceMismatch { found }) => {
            eprintln!("Error: device needs 2 I2C connections, {} assigned.", found);
            eprintln!("Pass exactly two ids with --connections.");
            release_and_dump(&device);
            return Err(Box::new(DriverError::ResourceMismatch { found }));
        }
        Err(e) => {
            eprintln!("Error attaching hardware: {}", e);
            release_and_dump(&device);
            return Err(Box::new(e));
        }
    }

    if let Some(props) = device.context().map(|c| c.enumeration_properties().clone()) {
        println!(
            "Enumerated as {} {}",
            props.manufacturer().unwrap_or("?"),
            props.model().unwrap_or("?")
        );
        for (key, value) in props.collection().iter() {
            println!("  {:?}: {:?}", key, value);
        }
        println!();
    }

    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C, stopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    if let Some(n) = args.fail_write {
        bus.fail_write(n, BusFault::Nack);
    }

    let mut cycle = 0u64;
    let mut failures = 0u64;
    while running.load(Ordering::SeqCst) && (args.cycles == 0 || cycle < args.cycles) {
        cycle += 1;
        bus.clear_events();

        match run_cycle(&device, args.interval) {
            Ok(()) => println!("Cycle {}: ok", cycle),
            Err(e) => {
                failures += 1;
                eprintln!("Cycle {}: {}", cycle, e);
            }
        }
        for line in bus.transcript() {
            println!("  {}", line);
        }

        if args.cycles == 0 {
            thread::sleep(Duration::from_millis(args.interval as u64));
        }
    }

    println!();
    bus.clear_events();
    release_and_dump(&device);

    println!("\nSession complete!");
    println!("Cycles run: {}", cycle);
    println!("Failed cycles: {}", failures);
    Ok(())
}

/// One D0 entry, data-path round trip and D0 exit
fn run_cycle(device: &Tfa9890Device<SimulatedBus>, interval: u32) -> Result<(), DriverError> {
    device.power_state_enter(DevicePowerState::D3)?;

    device.set_data_interval(interval)?;
    device.start()?;
    let fields = device.supported_data_fields()?;
    log::info!("sampling {} fields every {} ms", fields.len(), device.data_interval()?);
    for (key, value) in device.properties()?.iter() {
        log::debug!("{:?} = {:?}", key, value);
    }
    for (key, value) in device.data_field_properties(DataField::AccelerationX)?.iter() {
        log::debug!("AccelerationX {:?} = {:?}", key, value);
    }
    device.stop()?;

    device.power_state_exit(DevicePowerState::D3)
}

fn release_and_dump(device: &Tfa9890Device<SimulatedBus>) {
    if let Err(e) = device.hardware_release() {
        eprintln!("Error releasing hardware: {}", e);
    }
    println!("Hardware released, state {:?}", device.state());
    for line in device.bus().transcript() {
        println!("  {}", line);
    }
}
