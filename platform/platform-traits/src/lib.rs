use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read};
use std::ops::Sub;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use strum_macros::{Display, EnumIter};

// --- Basic Types ---
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3 { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector3(x={}, y={}, z={})", self.x, self.y, self.z)
    }
}

/// Raw signed 16-bit triple as it appears on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTriple {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl RawTriple {
    pub fn new(x: i16, y: i16, z: i16) -> Self {
        RawTriple { x, y, z }
    }

    pub fn to_array(self) -> [i16; 3] {
        [self.x, self.y, self.z]
    }
}

/// Identity of one of the two IMUs on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum SourceId {
    #[strum(serialize = "IMU1")]
    Imu1,
    #[strum(serialize = "IMU2")]
    Imu2,
}

impl SourceId {
    /// Slot index used by two-element state arrays.
    pub fn index(self) -> usize {
        match self {
            SourceId::Imu1 => 0,
            SourceId::Imu2 => 1,
        }
    }
}

impl TryFrom<i32> for SourceId {
    type Error = i32;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(SourceId::Imu1),
            2 => Ok(SourceId::Imu2),
            other => Err(other),
        }
    }
}

// --- Converted Samples ---
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Acceleration (m/s²)
    pub accel: Vector3,
    /// Angular rate (rad/s)
    pub gyro: Vector3,
    /// Latched once the slot has received its first record.
    pub valid: bool,
}

/// IMU1 minus IMU2, stamped with the pipeline clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSample {
    /// Seconds since the clock reference
    pub t: f64,
    pub d_accel: Vector3,
    pub d_gyro: Vector3,
}

/// Planar acceleration in g, fed to the 2D vector meter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GForce {
    pub x: f32,
    pub y: f32,
}

pub const SERVO_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ServoAngleSet {
    /// Bar values, nominally in [0, 1]
    pub normalized: [f32; SERVO_COUNT],
    /// Angles as received (deg)
    pub degrees: [i16; SERVO_COUNT],
}

// --- Collaborators ---

/// Monotonic time source, in seconds since an arbitrary reference.
pub trait Clock {
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            start: Instant::now(),
        }
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Clock driven by hand, for tests and log replay. Shareable through an
/// `Arc` so a test can move time while a reader thread owns the clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    // f64 bits
    t: AtomicU64,
}

impl ManualClock {
    pub fn new(t: f64) -> Self {
        ManualClock {
            t: AtomicU64::new(t.to_bits()),
        }
    }

    pub fn set(&self, t: f64) {
        self.t.store(t.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, dt: f64) {
        let _ = self
            .t
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + dt).to_bits())
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.t.load(Ordering::Relaxed))
    }
}

/// Anything that can hand over the bytes it has received so far.
pub trait ByteSource {
    /// Appends whatever is currently available to `buf` and returns the count.
    /// A quiet line yields `Ok(0)`.
    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;
}

impl ByteSource for Box<dyn serialport::SerialPort> {
    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let mut chunk = [0u8; 1024];
        match self.read(&mut chunk) {
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Plays back a captured byte stream in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl ReplaySource {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        ReplaySource {
            data,
            pos: 0,
            chunk: chunk.max(1),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }
}

impl ByteSource for ReplaySource {
    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let end = (self.pos + self.chunk).min(self.data.len());
        let n = end - self.pos;
        buf.extend_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(n)
    }
}
