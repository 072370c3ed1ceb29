//! Wire-format properties of the OMG1 encoder.

use omg_telemetry_core::{SnapshotFlags, TelemetrySnapshot, TireReadings};
use omg_telemetry_packet::{PACKET_LEN, PAYLOAD_LEN, crc16, encode, layout, trailer_checksum};
use omg_test_helpers::fixtures::reference_snapshot;
use proptest::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const REFERENCE_HEX: &str = concat!(
    "4f4d473100409c450000fa4500000000030000803f0000000000000000000048",
    "42000020400000b4420000b0420000004001140500000016440000a0420000a0",
    "420000a0420000a0420000a0420000a0420000a0420000a0420000a0420000a0",
    "420000a0420000a04200003443000034430000344300003443057db2",
);

fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let digits: Vec<char> = hex.chars().filter(|c| !c.is_whitespace()).collect();
    digits
        .chunks(2)
        .map(|pair| {
            let s: String = pair.iter().collect();
            u8::from_str_radix(&s, 16).map_err(Into::into)
        })
        .collect()
}

#[test]
fn reference_snapshot_encodes_to_known_bytes() -> TestResult {
    let packet = encode(&reference_snapshot());

    assert_eq!(packet.len(), 124);
    assert_eq!(packet.get(..4), Some(&[0x4F, 0x4D, 0x47, 0x31][..]));
    assert_eq!(packet.get(layout::FLAGS), Some(&0x05));
    assert_eq!(trailer_checksum(&packet), 0xB27D);
    assert_eq!(packet.get(layout::CHECKSUM..), Some(&[0x7D, 0xB2][..]));

    let expected = hex_to_bytes(REFERENCE_HEX)?;
    assert_eq!(packet.to_vec(), expected);
    Ok(())
}

#[test]
fn encoding_is_idempotent() {
    let snapshot = reference_snapshot();
    assert_eq!(encode(&snapshot), encode(&snapshot));
}

#[test]
fn every_single_bit_flip_changes_the_crc() -> TestResult {
    let packet = encode(&reference_snapshot());
    let payload = packet.get(..PAYLOAD_LEN).ok_or("short packet")?;
    let original = crc16(payload);

    for byte in 0..PAYLOAD_LEN {
        for bit in 0..8 {
            let mut corrupted = payload.to_vec();
            if let Some(b) = corrupted.get_mut(byte) {
                *b ^= 1 << bit;
            }
            assert_ne!(crc16(&corrupted), original, "flip at byte {byte} bit {bit}");
        }
    }
    Ok(())
}

fn arb_snapshot() -> impl Strategy<Value = TelemetrySnapshot> {
    (
        (any::<f32>(), any::<f32>(), any::<f32>(), any::<i8>()),
        (any::<f32>(), any::<f32>(), any::<f32>()),
        (any::<f32>(), any::<f32>(), any::<f32>(), any::<f32>(), any::<f32>()),
        (any::<i16>(), any::<i8>(), any::<i8>(), any::<f32>()),
        (any::<[[f32; 3]; 4]>(), any::<[f32; 4]>(), any::<u8>()),
    )
        .prop_map(
            |(
                (rpm, max_rpm, speed_ms, gear),
                (throttle, brake, clutch),
                (fuel_level, fuel_per_lap, lap_time, best_lap_time, delta_to_best),
                (lap, position, total_cars, session_time_remaining),
                (temperatures, pressures, flags),
            )| TelemetrySnapshot {
                rpm,
                max_rpm,
                speed_ms,
                gear,
                throttle,
                brake,
                clutch,
                fuel_level,
                fuel_per_lap,
                lap_time,
                best_lap_time,
                delta_to_best,
                lap,
                position,
                total_cars,
                session_time_remaining,
                tires: TireReadings {
                    temperatures,
                    pressures,
                },
                flags: SnapshotFlags::from_bits(flags),
            },
        )
}

proptest! {
    #[test]
    fn trailer_is_crc_of_payload(snapshot in arb_snapshot()) {
        let packet = encode(&snapshot);
        prop_assert_eq!(packet.len(), PACKET_LEN);
        prop_assert_eq!(packet.get(..4), Some(&layout::MAGIC[..]));
        let payload = packet.get(..PAYLOAD_LEN).unwrap_or_default();
        prop_assert_eq!(trailer_checksum(&packet), crc16(payload));
    }

    #[test]
    fn flags_byte_only_uses_low_three_bits(snapshot in arb_snapshot()) {
        let packet = encode(&snapshot);
        let flags = packet.get(layout::FLAGS).copied().unwrap_or(0xFF);
        prop_assert_eq!(flags & !0x07, 0);
    }
}
