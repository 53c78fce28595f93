use crate::record::{ImuRecord, ServoRecord};
use platform_traits::{GForce, ImuSample, RawTriple, ServoAngleSet, Vector3, SERVO_COUNT};
use std::f32::consts::PI;

/// Accelerometer scale, counts to m/s².
pub const ACCEL_SCALE: f32 = 0.000565;
/// Gyroscope sensitivity, counts per °/s.
pub const GYRO_LSB_PER_DPS: f32 = 65.5;
/// Accelerometer counts per g for the planar g-force meter.
pub const ACCEL_LSB_PER_G: f32 = 16390.0;
pub const SERVO_MIN_DEG: f32 = -90.0;
pub const SERVO_SPAN_DEG: f32 = 180.0;

pub fn accel(raw: i16) -> f32 {
    raw as f32 * ACCEL_SCALE
}

pub fn gyro(raw: i16) -> f32 {
    raw as f32 / GYRO_LSB_PER_DPS * (PI / 180.0)
}

/// Maps [-90, 90] degrees to [0, 1]. Not clamped.
pub fn servo(raw_deg: i16) -> f32 {
    (raw_deg as f32 - SERVO_MIN_DEG) / SERVO_SPAN_DEG
}

fn triple(raw: RawTriple, f: fn(i16) -> f32) -> Vector3 {
    Vector3::new(f(raw.x), f(raw.y), f(raw.z))
}

pub fn imu_sample(record: &ImuRecord) -> ImuSample {
    ImuSample {
        accel: triple(record.raw_accel, accel),
        gyro: triple(record.raw_gyro, gyro),
        valid: true,
    }
}

pub fn g_force(raw_accel: RawTriple) -> GForce {
    GForce {
        x: raw_accel.x as f32 / ACCEL_LSB_PER_G,
        y: raw_accel.y as f32 / ACCEL_LSB_PER_G,
    }
}

pub fn servo_angles(record: &ServoRecord) -> ServoAngleSet {
    let mut normalized = [0.0; SERVO_COUNT];
    for (out, &raw) in normalized.iter_mut().zip(&record.raw_angles) {
        *out = servo(raw);
    }
    ServoAngleSet {
        normalized,
        degrees: record.raw_angles,
    }
}
