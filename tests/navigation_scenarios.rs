//! End-to-end scenarios exercising the public `NavigationController` API
//! the way an external caller would, across multiple control ticks.

use horus_navstack::controller::{NavigationController, NavigationGoal, Status};
use horus_navstack::types::{Pose, Vector3};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn run_ticks(controller: &mut NavigationController, ticks: usize, dt: f64) {
    let mut position = controller.navigation_state().current_pose;
    for _ in 0..ticks {
        let (linear, angular) = controller.velocity_command(&[]);
        let heading = position.theta + angular * dt;
        let x = position.x + linear * heading.cos() * dt;
        let y = position.y + linear * heading.sin() * dt;
        position = Pose::new(x, y, heading);

        controller.update_pose(
            Vector3::new(position.x, 0.0, position.y),
            Vector3::new(0.0, position.theta, 0.0),
        );
    }
}

#[test]
fn empty_world_reaches_goal() {
    init_tracing();
    let mut controller = NavigationController::new();
    let goal = NavigationGoal::new(Pose::new(5.0, 0.0, 0.0));

    assert!(controller.map().width() > 0);

    controller.set_goal(goal).expect("open world should plan");
    assert_eq!(controller.navigation_state().path.first().unwrap().x, 0.0);
    assert_eq!(
        controller.navigation_state().path.last().unwrap().x,
        5.0
    );

    run_ticks(&mut controller, 200, 0.1);

    let final_pose = controller.navigation_state().current_pose;
    assert!(
        final_pose.distance(&goal.pose) < 0.5,
        "expected convergence near goal, got {final_pose:?}"
    );
}

#[test]
fn wall_between_start_and_goal_is_routed_around() {
    init_tracing();
    let mut controller = NavigationController::new();

    for row in 280..=320 {
        for col in 400..=420 {
            controller.map_mut().set_occupied(row, col, 0.95);
        }
    }

    let start = Pose::new(-5.0, 0.0, 0.0);
    let goal = Pose::new(5.0, 0.0, 0.0);
    controller.update_pose(Vector3::new(start.x, 0.0, start.y), Vector3::zero());

    let result = controller.set_goal(NavigationGoal::new(goal));
    if let Ok(()) = result {
        let path = &controller.navigation_state().path;
        assert!(!path.is_empty());
        let length: f64 = path
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum();
        assert!(length > 10.0, "expected a detour longer than the direct line, got {length}");
    }
}

#[test]
fn goal_inside_obstacle_fails_to_plan() {
    init_tracing();
    let mut controller = NavigationController::new();
    let (row, col) = controller.map().world_to_grid(5.0, 0.0).unwrap();
    for dr in -3..=3 {
        for dc in -3..=3 {
            controller.map_mut().set_occupied(row + dr, col + dc, 0.95);
        }
    }

    let result = controller.set_goal(NavigationGoal::new(Pose::new(5.0, 0.0, 0.0)));
    assert!(result.is_err());
    assert_eq!(controller.navigation_state().status, Status::Failed);
}

#[test]
fn emergency_stop_on_close_obstacle_preserves_path() {
    init_tracing();
    use horus_navstack::controller::SensorReading;

    let mut controller = NavigationController::new();
    controller
        .set_goal(NavigationGoal::new(Pose::new(5.0, 0.0, 0.0)))
        .expect("open world should plan");
    let path_before = controller.navigation_state().path.clone();

    let close_reading = SensorReading {
        point: Vector3::new(0.2, 0.0, 0.0),
        distance: 0.2,
        occupied: true,
        mesh_id: "obstacle".to_string(),
        normal: None,
    };
    let (linear, angular) = controller.velocity_command(&[close_reading]);

    assert_eq!((linear, angular), (0.0, 0.0));
    assert_eq!(controller.navigation_state().path, path_before);
    assert!(controller.navigation_state().is_navigating);
}

#[test]
fn replanning_on_map_change_updates_or_blocks_path() {
    init_tracing();
    use horus_navstack::controller::SensorReading;

    let mut controller = NavigationController::new();
    controller
        .set_goal(NavigationGoal::new(Pose::new(5.0, 0.0, 0.0)))
        .expect("open world should plan");
    let path_before = controller.navigation_state().path.clone();

    let next_waypoint = path_before[0];
    let blocking_reading = SensorReading {
        point: Vector3::new(next_waypoint.x, next_waypoint.y, 0.0),
        distance: next_waypoint.distance(&Pose::origin()),
        occupied: true,
        mesh_id: "new_obstacle".to_string(),
        normal: None,
    };

    controller.update_map(&[blocking_reading]);

    let status = controller.navigation_state().status;
    assert!(status == Status::Moving || status == Status::Blocked);
    if status == Status::Moving {
        assert_ne!(controller.navigation_state().path, path_before);
    } else {
        assert!(controller.navigation_state().path.is_empty());
    }
}

#[test]
fn localization_converges_under_zero_motion() {
    init_tracing();
    use horus_navstack::controller::SensorReading;

    let mut controller = NavigationController::new();
    let truth = Pose::origin();

    let readings = vec![
        SensorReading {
            point: Vector3::new(2.0, 0.0, 0.0),
            distance: 2.0,
            occupied: true,
            mesh_id: "wall".to_string(),
            normal: None,
        },
        SensorReading {
            point: Vector3::new(0.0, 2.0, 0.0),
            distance: 2.0,
            occupied: true,
            mesh_id: "wall".to_string(),
            normal: None,
        },
    ];

    for _ in 0..50 {
        controller.update_pose(Vector3::zero(), Vector3::zero());
        controller.apply_readings(&readings);
    }

    let estimate = controller.navigation_state().current_pose;
    assert!(estimate.distance(&truth) < 0.5);
}
