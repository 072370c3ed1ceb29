use omg_telemetry_core::TelemetrySnapshot;

use crate::crc::crc16;
use crate::layout::{self, PACKET_LEN, PAYLOAD_LEN};

/// Sequential little-endian writer over a fixed packet buffer.
struct PacketWriter<'a> {
    buf: &'a mut [u8; PACKET_LEN],
    pos: usize,
}

impl<'a> PacketWriter<'a> {
    fn new(buf: &'a mut [u8; PACKET_LEN]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.pos.saturating_add(bytes.len());
        if let Some(dst) = self.buf.get_mut(self.pos..end) {
            dst.copy_from_slice(bytes);
        }
        self.pos = end;
    }

    fn f32(&mut self, value: f32) {
        self.put(&value.to_le_bytes());
    }

    fn i8(&mut self, value: i8) {
        self.put(&value.to_le_bytes());
    }

    fn i16(&mut self, value: i16) {
        self.put(&value.to_le_bytes());
    }

    fn u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    fn position(&self) -> usize {
        self.pos
    }
}

/// Encode `snapshot` into a new OMG1 packet.
///
/// Pure and infallible: the same snapshot always yields the same bytes.
pub fn encode(snapshot: &TelemetrySnapshot) -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    encode_into(snapshot, &mut packet);
    packet
}

/// Encode `snapshot` into a caller-owned buffer, overwriting all of it.
pub fn encode_into(snapshot: &TelemetrySnapshot, packet: &mut [u8; PACKET_LEN]) {
    let mut w = PacketWriter::new(packet);

    w.put(&layout::MAGIC);

    w.f32(snapshot.rpm);
    w.f32(snapshot.max_rpm);
    w.f32(snapshot.speed_ms);
    w.i8(snapshot.gear);
    w.f32(snapshot.throttle);
    w.f32(snapshot.brake);
    w.f32(snapshot.clutch);

    w.f32(snapshot.fuel_level);
    w.f32(snapshot.fuel_per_lap);

    w.f32(snapshot.lap_time);
    w.f32(snapshot.best_lap_time);
    w.f32(snapshot.delta_to_best);

    w.i8(snapshot.position);
    w.i8(snapshot.total_cars);
    w.i16(snapshot.lap);
    w.f32(snapshot.session_time_remaining);

    for temperature in snapshot.tires.temperatures_flat() {
        w.f32(temperature);
    }
    for pressure in snapshot.tires.pressures {
        w.f32(pressure);
    }

    w.u8(snapshot.flags.bits());
    debug_assert_eq!(w.position(), PAYLOAD_LEN);

    let checksum = crc16(packet.get(..PAYLOAD_LEN).unwrap_or_default());
    if let Some(trailer) = packet.get_mut(PAYLOAD_LEN..) {
        trailer.copy_from_slice(&checksum.to_le_bytes());
    }
}

/// Checksum carried in the trailer of an encoded packet.
pub fn trailer_checksum(packet: &[u8; PACKET_LEN]) -> u16 {
    let [.., lo, hi] = *packet;
    u16::from_le_bytes([lo, hi])
}

#[cfg(test)]
mod tests {
    use super::*;
    use omg_telemetry_core::{SnapshotFlags, TireReadings};

    fn field(packet: &[u8; PACKET_LEN], offset: usize) -> [u8; 4] {
        let mut out = [0u8; 4];
        if let Some(src) = packet.get(offset..offset + 4) {
            out.copy_from_slice(src);
        }
        out
    }

    #[test]
    fn zeroed_snapshot_has_magic_and_known_crc() {
        let packet = encode(&TelemetrySnapshot::default());
        assert_eq!(packet.get(..4), Some(&layout::MAGIC[..]));
        assert!(packet.get(4..PAYLOAD_LEN).is_some_and(|body| body.iter().all(|b| *b == 0)));
        assert_eq!(trailer_checksum(&packet), 0x21FC);
    }

    #[test]
    fn fields_land_at_layout_offsets() {
        let snapshot = TelemetrySnapshot {
            rpm: 1.0,
            max_rpm: 2.0,
            speed_ms: 3.0,
            gear: -1,
            throttle: 4.0,
            brake: 5.0,
            clutch: 6.0,
            fuel_level: 7.0,
            fuel_per_lap: 8.0,
            lap_time: 9.0,
            best_lap_time: 10.0,
            delta_to_best: -11.0,
            lap: 300,
            position: 12,
            total_cars: 13,
            session_time_remaining: 14.0,
            tires: TireReadings {
                temperatures: [[15.0, 16.0, 17.0], [0.0; 3], [0.0; 3], [0.0, 0.0, 18.0]],
                pressures: [19.0, 0.0, 0.0, 20.0],
            },
            flags: SnapshotFlags {
                on_track: false,
                in_pit: true,
                session_active: false,
            },
        };
        let packet = encode(&snapshot);

        assert_eq!(field(&packet, layout::RPM), 1.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::MAX_RPM), 2.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::SPEED), 3.0f32.to_le_bytes());
        assert_eq!(packet.get(layout::GEAR), Some(&0xFF));
        assert_eq!(field(&packet, layout::THROTTLE), 4.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::BRAKE), 5.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::CLUTCH), 6.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::FUEL), 7.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::FUEL_PER_LAP), 8.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::LAP_TIME), 9.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::BEST_LAP_TIME), 10.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::DELTA), (-11.0f32).to_le_bytes());
        assert_eq!(packet.get(layout::POSITION), Some(&12));
        assert_eq!(packet.get(layout::TOTAL_CARS), Some(&13));
        assert_eq!(packet.get(layout::LAP..layout::LAP + 2), Some(&300i16.to_le_bytes()[..]));
        assert_eq!(field(&packet, layout::SESSION_TIME_REMAINING), 14.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::TIRE_TEMPS), 15.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::TIRE_TEMPS + 8), 17.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::TIRE_TEMPS + 11 * 4), 18.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::TIRE_PRESSURES), 19.0f32.to_le_bytes());
        assert_eq!(field(&packet, layout::TIRE_PRESSURES + 12), 20.0f32.to_le_bytes());
        assert_eq!(packet.get(layout::FLAGS), Some(&0x02));
    }

    #[test]
    fn encode_into_overwrites_stale_bytes() {
        let mut buf = [0xAAu8; PACKET_LEN];
        encode_into(&TelemetrySnapshot::default(), &mut buf);
        assert_eq!(buf, encode(&TelemetrySnapshot::default()));
    }
}
