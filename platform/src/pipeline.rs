use crate::config::PipelineConfig;
use crate::convert;
use crate::differencer::DualImuDifferencer;
use crate::error::{FrameError, RejectedLine};
use crate::frame::{FrameAssembler, RawFrame};
use crate::record::{self, Record};
use crate::window::ErrorSampleWindow;
use platform_traits::{ErrorSample, GForce, ImuSample, RawTriple, ServoAngleSet, SourceId};
use tracing::{debug, warn};

/// Everything the pipeline reports for one line.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Imu {
        source: SourceId,
        sample: ImuSample,
        raw_accel: RawTriple,
        /// Only reported for IMU1, which drives the g-force meter.
        g_force: Option<GForce>,
    },
    Difference(ErrorSample),
    Servo(ServoAngleSet),
    Rejected(RejectedLine),
}

/// Bytes in, events out. Each complete line is handled to completion before
/// the next one.
#[derive(Debug)]
pub struct Pipeline {
    assembler: FrameAssembler,
    differencer: DualImuDifferencer,
    window: ErrorSampleWindow,
    servos: Option<ServoAngleSet>,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Pipeline {
            assembler: FrameAssembler::new(Some(config.max_buffered_bytes)),
            differencer: DualImuDifferencer::new(config.stale_after),
            window: ErrorSampleWindow::new(config.window_width),
            servos: None,
        }
    }

    /// Feeds `bytes` received at time `now` and returns the events for every
    /// line they complete.
    pub fn process(&mut self, bytes: &[u8], now: f64) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        let frames: Vec<_> = self.assembler.feed(bytes).collect();
        for frame in frames {
            match frame {
                Ok(frame) => self.handle_frame(frame, now, &mut events),
                Err(error) => {
                    warn!(kind = error.kind(), "{}", error);
                    events.push(PipelineEvent::Rejected(RejectedLine {
                        error,
                        line: String::new(),
                    }));
                }
            }
        }
        self.window.prune(now);
        events
    }

    fn handle_frame(&mut self, frame: RawFrame, now: f64, events: &mut Vec<PipelineEvent>) {
        let record = match record::decode(frame.as_str()) {
            Ok(record) => record,
            Err(error) => {
                if error == FrameError::UnrecognizedLine {
                    debug!(line = %frame, "received unrecognized data");
                } else {
                    warn!(kind = error.kind(), line = %frame, "{}", error);
                }
                events.push(PipelineEvent::Rejected(RejectedLine {
                    error,
                    line: frame.into_string(),
                }));
                return;
            }
        };

        match record {
            Record::Imu(imu) => {
                let difference = self.differencer.update(&imu, now);
                events.push(PipelineEvent::Imu {
                    source: imu.source,
                    sample: *self.differencer.sample(imu.source),
                    raw_accel: imu.raw_accel,
                    g_force: (imu.source == SourceId::Imu1)
                        .then(|| convert::g_force(imu.raw_accel)),
                });
                if let Some(sample) = difference {
                    debug!(
                        t = sample.t,
                        d_accel = %sample.d_accel,
                        d_gyro = %sample.d_gyro,
                        "imu difference"
                    );
                    self.window.push(sample);
                    events.push(PipelineEvent::Difference(sample));
                }
            }
            Record::Servo(servo) => {
                let angles = convert::servo_angles(&servo);
                self.servos = Some(angles);
                events.push(PipelineEvent::Servo(angles));
            }
        }
    }

    pub fn window(&self) -> &ErrorSampleWindow {
        &self.window
    }

    pub fn imu(&self, source: SourceId) -> &ImuSample {
        self.differencer.sample(source)
    }

    pub fn servos(&self) -> Option<&ServoAngleSet> {
        self.servos.as_ref()
    }

    /// Returns to the freshly constructed state, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.assembler.clear();
        self.differencer.reset();
        self.window.clear();
        self.servos = None;
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}
