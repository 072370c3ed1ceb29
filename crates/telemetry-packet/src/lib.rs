//! OMG1 telemetry packet encoder.
//!
//! One packet is a fixed 124-byte little-endian record: a 4-byte magic,
//! 118 bytes of telemetry, then a CRC-16 over everything before it.
//!
//! | Offset | Content                                   | Width |
//! |--------|-------------------------------------------|-------|
//! | 0      | magic `"OMG1"`                            | 4     |
//! | 4      | RPM, MaxRPM, Speed (f32)                  | 12    |
//! | 16     | Gear (i8)                                 | 1     |
//! | 17     | Throttle, Brake, Clutch (f32)             | 12    |
//! | 29     | Fuel, FuelPerLap (f32)                    | 8     |
//! | 37     | LapTime, BestLapTime, Delta (f32)         | 12    |
//! | 49     | Position, TotalCars (i8)                  | 2     |
//! | 51     | Lap (i16)                                 | 2     |
//! | 53     | SessionTimeRemaining (f32)                | 4     |
//! | 57     | Tire temps LF/RF/LR/RR x L/M/R (f32)      | 48    |
//! | 105    | Tire pressures LF/RF/LR/RR (f32)          | 16    |
//! | 121    | Flags: bit0 on track, bit1 pit, bit2 session | 1  |
//! | 122    | CRC-16 of bytes 0..122 (u16)              | 2     |
//!
//! There is no decoder here. Receivers validate the CRC and read fields at
//! the offsets in [`layout`].

#![deny(static_mut_refs)]

pub mod crc;
mod encode;
pub mod layout;

pub use crc::crc16;
pub use encode::{encode, encode_into, trailer_checksum};
pub use layout::{PACKET_LEN, PAYLOAD_LEN};
