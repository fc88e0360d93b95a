use sms_transport::{DriverConfig, DriverRegistry, OutboundMessage, TracingSink};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Number own-number loopback uses when the config does not set one
const DEMO_OWN_NUMBER: &str = "+15550000";

/// Pump rounds before the demo gives up waiting for traffic
const DEMO_ROUNDS: usize = 3;

fn usage(program: &str) {
    eprintln!("Usage: {} [--config <file>] [--debug] <to> <message>", program);
    eprintln!("   Sending to the modem's own number loops the message back as inbound traffic.");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map_or("sms-transport", |s| s.as_str());

    let mut config_path = None;
    let mut debug = false;
    let mut positional = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config_path = iter.next().cloned(),
            "--debug" => debug = true,
            "--help" | "-h" => {
                usage(program);
                return Ok(());
            }
            _ => positional.push(arg.clone()),
        }
    }

    if positional.len() != 2 {
        usage(program);
        return Err("expected a recipient and a message".into());
    }

    let mut config = match config_path {
        Some(path) => DriverConfig::from_file(path)?,
        None => DriverConfig::default(),
    };
    config.debug |= debug;
    if config.own_number.is_none() {
        config.own_number = Some(DEMO_OWN_NUMBER.to_string());
    }

    let default_filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let registry = DriverRegistry::with_defaults();
    let mut driver = registry.create(config, Arc::new(TracingSink))?;

    driver.register_receive_handler(Box::new(|message, done| {
        println!(
            "Received from {} at {}: {}",
            message.from,
            message.timestamp.to_rfc3339(),
            message.content
        );
        done.accept();
    }))?;
    driver.register_error_handler(Box::new(|error| {
        eprintln!("Device error: {}", error);
    }))?;
    driver.start()?;

    let message = OutboundMessage::new(positional[0].clone(), positional[1].clone());
    driver.send(
        message,
        Box::new(|result| match result {
            Ok(report) => println!(
                "Send result: {:?} ({}/{} fragments delivered)",
                report.result,
                report.delivered_count(),
                report.fragments.len()
            ),
            Err(e) => eprintln!("Send failed: {}", e),
        }),
    );

    for _ in 0..DEMO_ROUNDS {
        if driver.dispatch_pending() == 0 {
            std::thread::sleep(poll_interval);
        }
    }

    driver.stop()?;
    driver.destroy()?;
    Ok(())
}
