//! Line grammars:
//!
//! ```text
//! IMU:<id>,<ax>,<ay>,<az>,<gx>,<gy>,<gz>*<crc>
//! S:<a1>,<a2>,<a3>,<a4>,<a5>,<a6>*<crc>
//! ```

use crate::crc;
use crate::error::FrameError;
use platform_traits::{RawTriple, SourceId, SERVO_COUNT};

pub const IMU_PREFIX: &str = "IMU:";
pub const SERVO_PREFIX: &str = "S:";

const IMU_FIELDS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImuRecord {
    pub source: SourceId,
    pub raw_accel: RawTriple,
    pub raw_gyro: RawTriple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoRecord {
    pub raw_angles: [i16; SERVO_COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Imu(ImuRecord),
    Servo(ServoRecord),
}

/// Data part and checksum of a line whose CRC field is well formed.
struct Payload<'a> {
    data: &'a str,
    checksum: u8,
}

impl<'a> Payload<'a> {
    fn split(body: &'a str) -> Result<Self, FrameError> {
        let star = body
            .rfind('*')
            .ok_or(FrameError::MissingChecksumDelimiter)?;
        let (data, crc_part) = (&body[..star], &body[star + 1..]);

        if crc_part.len() != 2 || !crc_part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FrameError::BadChecksumFormat(crc_part.to_string()));
        }
        let checksum = u8::from_str_radix(crc_part, 16)
            .map_err(|_| FrameError::BadChecksumFormat(crc_part.to_string()))?;

        Ok(Payload { data, checksum })
    }

    fn fields<const N: usize>(&self) -> Result<[&'a str; N], FrameError> {
        let fields: Vec<&str> = self.data.split(',').collect();
        let found = fields.len();
        fields
            .try_into()
            .map_err(|_| FrameError::FieldCountMismatch { expected: N, found })
    }

    fn check(&self, values: &[i16]) -> Result<(), FrameError> {
        let calculated = crc::compute(values);
        if calculated != self.checksum {
            return Err(FrameError::ChecksumMismatch {
                received: self.checksum,
                calculated,
            });
        }
        Ok(())
    }
}

/// Decodes one trimmed line into a typed record.
pub fn decode(line: &str) -> Result<Record, FrameError> {
    if let Some(body) = line.strip_prefix(IMU_PREFIX) {
        decode_imu(body).map(Record::Imu)
    } else if let Some(body) = line.strip_prefix(SERVO_PREFIX) {
        decode_servo(body).map(Record::Servo)
    } else {
        Err(FrameError::UnrecognizedLine)
    }
}

fn decode_imu(body: &str) -> Result<ImuRecord, FrameError> {
    let payload = Payload::split(body)?;
    let fields = payload.fields::<IMU_FIELDS>()?;

    let id = fields[0]
        .trim()
        .parse::<i32>()
        .map_err(|_| FrameError::FieldParseError(fields[0].to_string()))?;
    let mut values = [0i16; 6];
    for (value, field) in values.iter_mut().zip(&fields[1..]) {
        *value = crc::parse_i16(field)?;
    }

    // The id is not covered by the checksum.
    payload.check(&values)?;

    let source = SourceId::try_from(id).map_err(FrameError::UnknownSourceId)?;
    Ok(ImuRecord {
        source,
        raw_accel: RawTriple::new(values[0], values[1], values[2]),
        raw_gyro: RawTriple::new(values[3], values[4], values[5]),
    })
}

fn decode_servo(body: &str) -> Result<ServoRecord, FrameError> {
    let payload = Payload::split(body)?;
    let fields = payload.fields::<SERVO_COUNT>()?;

    let mut raw_angles = [0i16; SERVO_COUNT];
    for (angle, field) in raw_angles.iter_mut().zip(&fields) {
        *angle = crc::parse_i16(field)?;
    }
    payload.check(&raw_angles)?;

    Ok(ServoRecord { raw_angles })
}

/// Formats a record as a wire line, without the terminator.
pub fn encode(record: &Record) -> String {
    match record {
        Record::Imu(imu) => {
            let values = [imu.raw_accel.to_array(), imu.raw_gyro.to_array()].concat();
            let id = match imu.source {
                SourceId::Imu1 => 1,
                SourceId::Imu2 => 2,
            };
            format!(
                "{}{},{}*{:02X}",
                IMU_PREFIX,
                id,
                join(&values),
                crc::compute(&values)
            )
        }
        Record::Servo(servo) => format!(
            "{}{}*{:02X}",
            SERVO_PREFIX,
            join(&servo.raw_angles),
            crc::compute(&servo.raw_angles)
        ),
    }
}

fn join(values: &[i16]) -> String {
    values
        .iter()
        .map(i16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
