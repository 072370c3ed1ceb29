//! Byte offsets of the OMG1 packet.
//!
//! All multi-byte fields are little-endian. Offsets are stable and public so
//! dashboard firmware can decode without depending on this crate.

/// `"OMG1"`.
pub const MAGIC: [u8; 4] = [0x4F, 0x4D, 0x47, 0x31];

pub const RPM: usize = 4;
pub const MAX_RPM: usize = 8;
pub const SPEED: usize = 12;
pub const GEAR: usize = 16;
pub const THROTTLE: usize = 17;
pub const BRAKE: usize = 21;
pub const CLUTCH: usize = 25;
pub const FUEL: usize = 29;
pub const FUEL_PER_LAP: usize = 33;
pub const LAP_TIME: usize = 37;
pub const BEST_LAP_TIME: usize = 41;
pub const DELTA: usize = 45;
pub const POSITION: usize = 49;
pub const TOTAL_CARS: usize = 50;
pub const LAP: usize = 51;
pub const SESSION_TIME_REMAINING: usize = 53;
/// 12 x f32: LF, RF, LR, RR, each L/M/R.
pub const TIRE_TEMPS: usize = 57;
/// 4 x f32: LF, RF, LR, RR.
pub const TIRE_PRESSURES: usize = 105;
pub const FLAGS: usize = 121;
pub const CHECKSUM: usize = 122;

/// Bytes covered by the checksum.
pub const PAYLOAD_LEN: usize = CHECKSUM;
/// Total datagram size.
pub const PACKET_LEN: usize = CHECKSUM + 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_contiguous() {
        assert_eq!(RPM, MAGIC.len());
        assert_eq!(GEAR, SPEED + 4);
        assert_eq!(THROTTLE, GEAR + 1);
        assert_eq!(POSITION, DELTA + 4);
        assert_eq!(LAP, TOTAL_CARS + 1);
        assert_eq!(SESSION_TIME_REMAINING, LAP + 2);
        assert_eq!(TIRE_TEMPS, SESSION_TIME_REMAINING + 4);
        assert_eq!(TIRE_PRESSURES, TIRE_TEMPS + 12 * 4);
        assert_eq!(FLAGS, TIRE_PRESSURES + 4 * 4);
        assert_eq!(CHECKSUM, FLAGS + 1);
        assert_eq!(PACKET_LEN, 124);
    }
}
