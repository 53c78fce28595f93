pub mod config;
pub mod convert;
pub mod crc;
pub mod differencer;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod port;
pub mod record;
pub mod window;

pub use config::{LinkConfig, PipelineConfig};
pub use differencer::DualImuDifferencer;
pub use error::{FrameError, PlatformError, RejectedLine};
pub use frame::{FrameAssembler, RawFrame};
pub use pipeline::{Pipeline, PipelineEvent};
pub use platform_traits::{
    ByteSource, Clock, ErrorSample, GForce, ImuSample, ManualClock, MonotonicClock, RawTriple,
    ReplaySource, ServoAngleSet, SourceId, Vector3,
};
pub use port::LinkPort;
pub use record::{ImuRecord, Record, ServoRecord};
pub use window::ErrorSampleWindow;

use std::sync::{mpsc, Arc, RwLock};
use std::thread;
use std::time::Duration;
use tracing::{error, info, trace};

/// Events held for [`PlatformReader::drain_events`]. Once full, new events are
/// dropped until the consumer catches up; the snapshot keeps updating.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Latest view of the link, for a renderer polling at its own rate.
#[derive(Debug, Clone, Default)]
pub struct PlatformState {
    pub imu: [ImuSample; 2],
    pub g_force: GForce,
    /// IMU1 raw accelerometer counts, drives the platform orientation view.
    pub platform_accel: RawTriple,
    pub servos: Option<ServoAngleSet>,
    pub errors: Vec<ErrorSample>,
    pub time_range: (f64, f64),
    pub accel_range: Option<(f32, f32)>,
    pub gyro_range: Option<(f32, f32)>,
    pub rejected: u64,
}

impl PlatformState {
    fn apply(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Imu {
                source,
                sample,
                raw_accel,
                g_force,
            } => {
                self.imu[source.index()] = *sample;
                if let Some(g) = g_force {
                    self.g_force = *g;
                    self.platform_accel = *raw_accel;
                }
            }
            PipelineEvent::Servo(angles) => self.servos = Some(*angles),
            PipelineEvent::Rejected(_) => self.rejected += 1,
            PipelineEvent::Difference(_) => {}
        }
    }

    fn sync_window(&mut self, window: &ErrorSampleWindow) {
        self.errors.clear();
        self.errors.extend(window.iter().copied());
        self.time_range = window.range();
        self.accel_range = window.accel_range();
        self.gyro_range = window.gyro_range();
    }
}

#[derive(Debug)]
pub enum ReaderCommand {
    /// Drop buffered input and sensor state.
    Reset,
    Stop,
}

/// Runs the pipeline on a background thread fed by a byte source.
pub struct PlatformReader {
    state: Arc<RwLock<PlatformState>>,
    command_tx: mpsc::Sender<ReaderCommand>,
    events_rx: mpsc::Receiver<PipelineEvent>,
}

impl PlatformReader {
    /// Opens the configured serial port and starts reading from it.
    pub fn new(config: &LinkConfig) -> Result<Self, PlatformError> {
        let port_name = config
            .port
            .clone()
            .ok_or_else(|| PlatformError::Startup("no serial port configured".to_string()))?;
        let baud_rate = config.baud_rate;
        let timeout = Duration::from_millis(config.read_timeout_ms);

        Self::spawn(
            move || Ok(LinkPort::open(&port_name, baud_rate, timeout)?.into_inner()),
            MonotonicClock::new(),
            config.pipeline.clone(),
        )
    }

    /// Starts a reader over any byte source. `open` runs on the reader thread
    /// and its failure is returned from here.
    pub fn spawn<S, F, C>(open: F, clock: C, config: PipelineConfig) -> Result<Self, PlatformError>
    where
        S: ByteSource,
        F: FnOnce() -> Result<S, PlatformError> + Send + 'static,
        C: Clock + Send + 'static,
    {
        let state = Arc::new(RwLock::new(PlatformState::default()));
        let (command_tx, command_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::sync_channel(EVENT_QUEUE_CAPACITY);
        let (init_tx, init_rx) = mpsc::channel();

        let thread_state = Arc::clone(&state);
        thread::spawn(move || {
            let mut source = match open() {
                Ok(source) => {
                    let _ = init_tx.send(Ok(()));
                    source
                }
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };
            let mut pipeline = Pipeline::new(&config);
            let mut buffer = Vec::with_capacity(1024);

            loop {
                match command_rx.try_recv() {
                    Ok(ReaderCommand::Reset) => {
                        info!("resetting pipeline");
                        pipeline.reset();
                        match thread_state.write() {
                            Ok(mut state) => *state = PlatformState::default(),
                            Err(e) => {
                                error!("Failed to reset platform state: {}", e);
                                break;
                            }
                        }
                    }
                    Ok(ReaderCommand::Stop) | Err(mpsc::TryRecvError::Disconnected) => break,
                    Err(mpsc::TryRecvError::Empty) => {}
                }

                buffer.clear();
                let quiet = match source.read_available(&mut buffer) {
                    Ok(n) => n == 0,
                    Err(e) => {
                        error!("Error reading from link: {}", e);
                        buffer.clear();
                        true
                    }
                };

                // Runs on quiet reads too so the window keeps sliding.
                let events = pipeline.process(&buffer, clock.now());
                match thread_state.write() {
                    Ok(mut state) => {
                        for event in &events {
                            state.apply(event);
                        }
                        state.sync_window(pipeline.window());
                    }
                    Err(e) => {
                        error!("Failed to write platform state: {}", e);
                        break;
                    }
                }
                for event in events {
                    match events_tx.try_send(event) {
                        Ok(()) => {}
                        Err(mpsc::TrySendError::Full(event)) => {
                            trace!(?event, "event queue full, dropping event");
                        }
                        Err(mpsc::TrySendError::Disconnected(_)) => {}
                    }
                }
                if quiet {
                    thread::sleep(Duration::from_millis(5));
                }
            }
            info!("reader thread stopped");
        });

        init_rx
            .recv()
            .map_err(|_| PlatformError::Startup("reader thread exited".to_string()))??;

        Ok(PlatformReader {
            state,
            command_tx,
            events_rx,
        })
    }

    pub fn get_state(&self) -> Result<PlatformState, PlatformError> {
        Ok(self.state.read()?.clone())
    }

    /// Events produced since the last call.
    pub fn drain_events(&self) -> Vec<PipelineEvent> {
        self.events_rx.try_iter().collect()
    }

    /// Blocks up to `timeout` for the next event.
    pub fn next_event(&self, timeout: Duration) -> Option<PipelineEvent> {
        self.events_rx.recv_timeout(timeout).ok()
    }

    pub fn reset(&self) -> Result<(), PlatformError> {
        self.command_tx.send(ReaderCommand::Reset)?;
        Ok(())
    }

    pub fn stop(&self) -> Result<(), PlatformError> {
        self.command_tx.send(ReaderCommand::Stop)?;
        Ok(())
    }
}

impl Drop for PlatformReader {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
