//! CRC-16 used for the packet trailer.
//!
//! Reflected polynomial 0xA001 (0x8005 bit-reversed), initial value 0xFFFF,
//! no final XOR. This is the CRC-16/MODBUS variant, check value 0x4B37.

pub const CRC16_POLY: u16 = 0xA001;
pub const CRC16_INIT: u16 = 0xFFFF;

/// Bitwise CRC-16 over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn empty_input_is_init() {
        assert_eq!(crc16(&[]), CRC16_INIT);
    }

    #[test]
    fn single_byte_differs_from_init() {
        assert_ne!(crc16(&[0x00]), crc16(&[0x01]));
    }
}
