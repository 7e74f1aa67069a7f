use crate::events::{SequencerStatus, Tick};
use crate::timing::{Sequencer, SystemClock};
use arc_swap::ArcSwap;
use crossbeam::channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    Start,
    Stop,
    SetAutoRestart(bool),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverUpdate {
    Started,
    Stepped { wait: f64, steps_taken: u64 },
    Restarted,
    Finished,
    Stopped,
    Failed { message: String },
}

pub struct DriverHandle {
    pub command_tx: Sender<DriverCommand>,
    pub update_rx: Receiver<DriverUpdate>,
    status: Arc<ArcSwap<SequencerStatus>>,
    thread: Option<JoinHandle<()>>,
}

impl DriverHandle {
    /// Latest status published by the driver thread.
    pub fn status(&self) -> SequencerStatus {
        **self.status.load()
    }

    /// Returns false once the driver thread is gone.
    pub fn send(&self, command: DriverCommand) -> bool {
        self.command_tx.send(command).is_ok()
    }

    pub fn shutdown(mut self) {
        let _ = self.command_tx.send(DriverCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("sequencer driver thread panicked");
            }
        }
    }
}

/// Moves `sequencer` onto its own thread and ticks it every `poll_interval`
/// with wall-clock elapsed time.
pub fn spawn_driver(sequencer: Sequencer, poll_interval: Duration) -> DriverHandle {
    let (command_tx, command_rx) = crossbeam::channel::unbounded();
    let (update_tx, update_rx) = crossbeam::channel::unbounded();
    let status = Arc::new(ArcSwap::from_pointee(sequencer.status()));

    let status_driver = status.clone();
    let thread = std::thread::spawn(move || {
        driver_thread(sequencer, poll_interval, command_rx, update_tx, status_driver);
    });

    DriverHandle {
        command_tx,
        update_rx,
        status,
        thread: Some(thread),
    }
}

fn driver_thread(
    mut sequencer: Sequencer,
    poll_interval: Duration,
    command_rx: Receiver<DriverCommand>,
    update_tx: Sender<DriverUpdate>,
    status: Arc<ArcSwap<SequencerStatus>>,
) {
    let ticker = crossbeam::channel::tick(poll_interval);
    let mut clock = SystemClock::new();
    tracing::info!(?poll_interval, "sequencer driver running");

    loop {
        crossbeam::select! {
            recv(command_rx) -> command => match command {
                Ok(DriverCommand::Start) => {
                    clock.reset();
                    sequencer.start();
                    let _ = update_tx.send(DriverUpdate::Started);
                }
                Ok(DriverCommand::Stop) => {
                    sequencer.stop();
                    let _ = update_tx.send(DriverUpdate::Stopped);
                }
                Ok(DriverCommand::SetAutoRestart(auto_restart)) => {
                    tracing::debug!(auto_restart, "auto restart changed");
                    sequencer.set_auto_restart(auto_restart);
                }
                Ok(DriverCommand::Shutdown) | Err(_) => break,
            },
            recv(ticker) -> _ => {
                let update = match sequencer.tick(&mut clock) {
                    Ok(Tick::Stepped { wait }) => Some(DriverUpdate::Stepped {
                        wait,
                        steps_taken: sequencer.steps_taken(),
                    }),
                    Ok(Tick::Restarted) => Some(DriverUpdate::Restarted),
                    Ok(Tick::Finished) => Some(DriverUpdate::Finished),
                    Ok(Tick::Idle | Tick::Waiting { .. }) => None,
                    Err(e) => Some(DriverUpdate::Failed {
                        message: e.to_string(),
                    }),
                };
                if let Some(update) = update {
                    let _ = update_tx.send(update);
                }
            },
        }

        status.store(Arc::new(sequencer.status()));
    }

    tracing::info!("sequencer driver stopped");
}
