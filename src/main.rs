use cadence::{DriverCommand, DriverUpdate, SequencerConfig, spawn_driver};
use std::io::BufRead;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => SequencerConfig::load(&path)?,
        None => SequencerConfig::default(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_filter.as_deref().unwrap_or("cadence=info"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let sequencer = config.build_sequencer()?;
    let driver = spawn_driver(sequencer, config.poll_interval());
    tracing::info!(name = %config.name, "loaded sequence; commands: start, stop, auto on|off, status, quit");

    let (line_tx, line_rx) = crossbeam::channel::unbounded::<String>();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    loop {
        crossbeam::select! {
            recv(line_rx) -> line => {
                let Ok(line) = line else { break };
                let command = match line.trim() {
                    "start" => DriverCommand::Start,
                    "stop" => DriverCommand::Stop,
                    "auto on" => DriverCommand::SetAutoRestart(true),
                    "auto off" => DriverCommand::SetAutoRestart(false),
                    "status" => {
                        let status = driver.status();
                        println!("{}", ron::to_string(&status)?);
                        continue;
                    }
                    "quit" | "exit" => break,
                    "" => continue,
                    other => {
                        tracing::warn!(command = other, "unknown command");
                        continue;
                    }
                };
                if !driver.send(command) {
                    break;
                }
            },
            recv(driver.update_rx) -> update => match update {
                Ok(DriverUpdate::Failed { message }) => tracing::error!(%message, "sequence failed"),
                Ok(update) => tracing::info!(?update, "sequencer"),
                Err(_) => break,
            },
        }
    }

    driver.shutdown();
    Ok(())
}
