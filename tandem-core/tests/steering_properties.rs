//! Property tests for the per-tick steering decision

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;
use tandem_core::prelude::*;

fn coordinate() -> impl Strategy<Value = f64> {
    0.0..=11.088889f64
}

fn pose() -> impl Strategy<Value = Pose> {
    (coordinate(), coordinate(), -PI..PI).prop_map(|(x, y, theta)| Pose::new(x, y, theta))
}

fn wall_hits(steering: &Steering, pose: &Pose) -> u8 {
    [pose.x, pose.y]
        .into_iter()
        .filter(|c| steering.at_wall(*c))
        .count() as u8
}

proptest! {
    #[test]
    fn prop_commands_stay_in_their_ranges(primary in pose(), companion in pose(), seed in any::<u64>()) {
        let steering = Steering::default();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let plan = steering.plan(Some(&primary), Some(&companion), &mut rng).unwrap();

        for (agent, pose) in [(Agent::Primary, &primary), (Agent::Companion, &companion)] {
            let cmd = plan.command(agent);
            let hits = wall_hits(&steering, pose);
            prop_assert_eq!(plan.bounces[agent.index()], hits);

            let speed = cmd.linear_x.abs();
            if plan.collision {
                prop_assert_eq!(speed, 1.0);
            } else {
                prop_assert!((1.0..=2.0).contains(&speed));
            }

            // an odd number of flips reverses the base direction
            let forward = if plan.collision { hits % 2 == 1 } else { hits % 2 == 0 };
            prop_assert_eq!(cmd.linear_x > 0.0, forward);

            if plan.collision || hits > 0 {
                let [lo, hi] = steering.evasive_range(agent);
                prop_assert!((lo..=hi).contains(&cmd.angular_z));
            } else {
                prop_assert!((-1.0..=1.0).contains(&cmd.angular_z));
            }
        }
    }

    #[test]
    fn prop_collision_is_strictly_closer_than_one(primary in pose(), companion in pose()) {
        let steering = Steering::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let plan = steering.plan(Some(&primary), Some(&companion), &mut rng).unwrap();
        prop_assert_eq!(plan.collision, primary.distance_to(&companion) < 1.0);
    }

    #[test]
    fn prop_pen_follows_midline(primary in pose(), companion in pose()) {
        let pen = Steering::default().pen_for(&primary, &companion);
        prop_assert_eq!(pen.width, 3);
        prop_assert!(!pen.off);

        let expected = match (primary.x > 5.5, companion.x > 5.5) {
            (true, false) => Rgb::GREEN,
            (false, true) => Rgb::RED,
            _ => Rgb::BLUE,
        };
        prop_assert_eq!(pen.color(), expected);
    }

    #[test]
    fn prop_same_seed_same_plan(primary in pose(), companion in pose(), seed in any::<u64>()) {
        let steering = Steering::default();
        let mut a = ChaCha8Rng::seed_from_u64(seed);
        let mut b = ChaCha8Rng::seed_from_u64(seed);
        prop_assert_eq!(
            steering.plan(Some(&primary), Some(&companion), &mut a),
            steering.plan(Some(&primary), Some(&companion), &mut b)
        );
    }

    #[test]
    fn prop_missing_pose_never_plans(known in pose(), primary_known in any::<bool>()) {
        let steering = Steering::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let plan = if primary_known {
            steering.plan(Some(&known), None, &mut rng)
        } else {
            steering.plan(None, Some(&known), &mut rng)
        };
        prop_assert!(plan.is_none());
    }
}
