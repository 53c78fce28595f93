use clap::Parser;
use platform::port::{self, LinkPort};
use platform::{ByteSource, LinkConfig, Pipeline, PipelineEvent, PlatformReader, ReplaySource};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Decode the platform serial link and print IMU, servo and difference data")]
struct Args {
    /// Serial port, e.g. /dev/ttyUSB0
    #[arg(short, long)]
    port: Option<String>,

    #[arg(short, long)]
    baud: Option<u32>,

    /// TOML file with link and pipeline settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Comma separated baud rates to probe before reading
    #[arg(long, value_delimiter = ',')]
    probe_baud: Vec<u32>,

    /// Decode a captured byte log instead of a live port
    #[arg(long)]
    replay: Option<PathBuf>,
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::Imu {
            source,
            sample,
            g_force,
            ..
        } => {
            println!(
                "{source}: acc x: {: >8.3} y: {: >8.3} z: {: >8.3}  gyro x: {: >8.3} y: {: >8.3} z: {: >8.3}",
                sample.accel.x, sample.accel.y, sample.accel.z, sample.gyro.x, sample.gyro.y, sample.gyro.z,
            );
            if let Some(g) = g_force {
                println!("  g: x: {: >6.3} y: {: >6.3}", g.x, g.y);
            }
        }
        PipelineEvent::Difference(d) => println!(
            "diff @ {:.3}s: acc x: {: >8.3} y: {: >8.3} z: {: >8.3}  gyro x: {: >8.3} y: {: >8.3} z: {: >8.3}",
            d.t, d.d_accel.x, d.d_accel.y, d.d_accel.z, d.d_gyro.x, d.d_gyro.y, d.d_gyro.z,
        ),
        PipelineEvent::Servo(s) => println!("servos: {:?} -> {:.3?}", s.degrees, s.normalized),
        PipelineEvent::Rejected(r) => println!("rejected ({}): {}", r.error.kind(), r.line),
    }
}

fn replay(path: &Path, config: &LinkConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = ReplaySource::new(std::fs::read(path)?, 64);
    let mut pipeline = Pipeline::new(&config.pipeline);
    let mut buffer = Vec::new();
    // Nominal 100 Hz line rate for stamping replayed samples.
    let mut t = 0.0;
    while !source.is_exhausted() {
        buffer.clear();
        source.read_available(&mut buffer)?;
        for event in pipeline.process(&buffer, t) {
            print_event(&event);
        }
        t += 0.01;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list_ports {
        for name in port::available_ports()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => LinkConfig::from_file(path)?,
        None => LinkConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }

    if let Some(path) = &args.replay {
        return replay(path, &config);
    }

    if !args.probe_baud.is_empty() {
        let port_name = config.port.clone().ok_or("no serial port given")?;
        let timeout = Duration::from_millis(config.read_timeout_ms);
        let mut link = LinkPort::open(&port_name, config.baud_rate, timeout)?;
        config.baud_rate = link.find_valid_baud_rate(&args.probe_baud, Duration::from_secs(1))?;
        info!(baud_rate = config.baud_rate, "using probed baud rate");
    }

    let reader = PlatformReader::new(&config)?;
    info!(port = ?config.port, baud_rate = config.baud_rate, "reading platform link");

    loop {
        match reader.next_event(Duration::from_secs(1)) {
            Some(event) => print_event(&event),
            None => warn!("no data received in the last second"),
        }
    }
}
