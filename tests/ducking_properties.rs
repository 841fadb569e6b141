use proptest::prelude::*;
use serenade_lib::audio::{AmbientController, DuckLevel};
use serenade_lib::settings::AmbientSettings;
use serenade_lib::testing::{ManualClock, MockFactory};
use std::sync::Arc;
use std::time::Duration;

const FRAME: Duration = Duration::from_millis(10);

fn controller() -> (AmbientController, ManualClock) {
    let clock = ManualClock::new();
    let controller = AmbientController::new(
        AmbientSettings::default(),
        Arc::new(MockFactory::new()),
        Arc::new(clock.clone()),
    );
    (controller, clock)
}

/// Advance in frames, collecting the volume after each one
fn run_for(controller: &mut AmbientController, clock: &ManualClock, total: Duration) -> Vec<f32> {
    let mut volumes = Vec::new();
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        clock.advance(FRAME);
        elapsed += FRAME;
        controller.tick();
        volumes.push(controller.current_volume());
    }
    volumes
}

fn arb_level() -> impl Strategy<Value = DuckLevel> {
    prop::sample::select(DuckLevel::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_rests_at_last_preset(
        steps in prop::collection::vec((arb_level(), 0u64..900), 1..10)
    ) {
        let (mut ambient, clock) = controller();
        ambient.start();
        run_for(&mut ambient, &clock, Duration::from_secs(6));

        for (level, gap_ms) in &steps {
            ambient.duck(*level);
            run_for(&mut ambient, &clock, Duration::from_millis(*gap_ms));
        }
        run_for(&mut ambient, &clock, Duration::from_secs(2));

        let last = steps.last().map(|(level, _)| *level).unwrap_or_default();
        let expected = last.volume(0.25);
        prop_assert!(
            (ambient.current_volume() - expected).abs() < 1e-4,
            "rested at {} instead of {} ({})",
            ambient.current_volume(),
            expected,
            last
        );
        prop_assert!(!ambient.is_fading());
    }

    #[test]
    fn test_volume_stays_within_cruise(
        steps in prop::collection::vec((arb_level(), 0u64..900), 0..10),
        started_after_ms in 0u64..6000
    ) {
        let (mut ambient, clock) = controller();
        ambient.start();
        let mut volumes = run_for(&mut ambient, &clock, Duration::from_millis(started_after_ms));

        for (level, gap_ms) in &steps {
            ambient.duck(*level);
            volumes.extend(run_for(&mut ambient, &clock, Duration::from_millis(*gap_ms)));
        }
        volumes.extend(run_for(&mut ambient, &clock, Duration::from_secs(6)));

        for volume in volumes {
            prop_assert!((0.0..=0.25 + 1e-6).contains(&volume), "volume {} out of range", volume);
        }
    }

    #[test]
    fn test_retarget_moves_straight_to_new_preset(
        from in arb_level(),
        to in arb_level(),
        interrupt_ms in 10u64..600
    ) {
        let (mut ambient, clock) = controller();
        ambient.start();
        run_for(&mut ambient, &clock, Duration::from_secs(6));

        ambient.duck(from);
        run_for(&mut ambient, &clock, Duration::from_millis(interrupt_ms));
        let midway = ambient.current_volume();

        ambient.duck(to);
        let target = to.volume(0.25);
        let path = run_for(&mut ambient, &clock, Duration::from_secs(2));

        // No overshoot and no reversal on the way to the new target
        let mut previous = midway;
        for volume in path {
            if target >= midway {
                prop_assert!(volume + 1e-6 >= previous && volume <= target + 1e-6);
            } else {
                prop_assert!(volume <= previous + 1e-6 && volume + 1e-6 >= target);
            }
            previous = volume;
        }
        prop_assert!((previous - target).abs() < 1e-4);
    }
}
