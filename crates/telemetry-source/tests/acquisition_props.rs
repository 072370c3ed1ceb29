//! Property tests for the snapshot slot and acquisition policy.

use omg_telemetry_core::TelemetrySnapshot;
use omg_telemetry_source::{
    DEFAULT_MAX_RPM, RecordMap, SessionInfo, SnapshotSlot, build_snapshot,
    acquisition::{fuel_per_lap, total_cars},
};
use omg_test_helpers::fixtures::reference_snapshot;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum SlotOp {
    Publish(f32),
    Clear,
}

fn slot_op() -> impl Strategy<Value = SlotOp> {
    prop_oneof![
        3 => (0.0f32..20_000.0).prop_map(SlotOp::Publish),
        1 => Just(SlotOp::Clear),
    ]
}

proptest! {
    #[test]
    fn slot_always_holds_the_last_publish(ops in prop::collection::vec(slot_op(), 1..64)) {
        let slot = SnapshotSlot::new();
        let mut model: Option<TelemetrySnapshot> = None;

        for op in ops {
            match op {
                SlotOp::Publish(rpm) => {
                    let snapshot = TelemetrySnapshot { rpm, ..reference_snapshot() };
                    slot.publish(snapshot);
                    model = Some(snapshot);
                }
                SlotOp::Clear => {
                    slot.clear();
                    model = None;
                }
            }
            prop_assert_eq!(slot.latest().map(|s| *s), model);
            prop_assert_eq!(slot.is_empty(), model.is_none());
        }
    }

    #[test]
    fn fuel_per_lap_is_never_negative(
        per_hour in -50.0f32..50.0,
        last_lap in -10.0f32..300.0,
    ) {
        let record = RecordMap::new()
            .with_float("FuelUsePerHour", per_hour)
            .with_float("LapLastLapTime", last_lap);
        let estimate = fuel_per_lap(&record);
        prop_assert!(estimate >= 0.0);
        if per_hour <= 0.0 {
            prop_assert!(estimate.abs() < f32::EPSILON);
        }
    }

    #[test]
    fn roster_size_saturates(roster in 0usize..10_000) {
        let record = RecordMap::new().with_session(SessionInfo {
            red_line_rpm: None,
            roster_size: Some(roster),
        });
        let expected = i8::try_from(roster).unwrap_or(i8::MAX);
        prop_assert_eq!(total_cars(&record), expected);
    }

    #[test]
    fn integer_fields_saturate_instead_of_wrapping(
        gear in any::<i32>(),
        lap in any::<i32>(),
        position in any::<i32>(),
    ) {
        let record = RecordMap::from_snapshot(&reference_snapshot())
            .with_int("Gear", gear)
            .with_int("Lap", lap)
            .with_int("PlayerCarPosition", position)
            .with_session(SessionInfo::default());
        let snapshot = build_snapshot(&record).map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(i32::from(snapshot.gear), gear.clamp(i32::from(i8::MIN), i32::from(i8::MAX)));
        prop_assert_eq!(i32::from(snapshot.lap), lap.clamp(i32::from(i16::MIN), i32::from(i16::MAX)));
        prop_assert_eq!(
            i32::from(snapshot.position),
            position.clamp(i32::from(i8::MIN), i32::from(i8::MAX))
        );
        prop_assert!((snapshot.max_rpm - DEFAULT_MAX_RPM).abs() < f32::EPSILON);
        prop_assert_eq!(snapshot.total_cars, 0);
    }
}
