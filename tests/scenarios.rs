//! Black-box world-level scenarios: each test only touches the public
//! `World` API, the way an application embedding this engine would.

use rigid2d::{
    Body, BodyOptions, ContactMaterial, DynamicBodyOptions, Event, RaycastOptions, Settings,
    Shape, SleepMode, SolverConfig, Vec2, WorldConfig, World,
};

fn circle(position: Vec2, velocity: Vec2, radius: f64) -> Body {
    let mut body = Body::new_dynamic(
        BodyOptions {
            position,
            ..Default::default()
        },
        DynamicBodyOptions {
            velocity,
            ..Default::default()
        },
    );
    body.add_shape(Shape::circle(radius), None, None).unwrap();
    body
}

#[test]
fn elastic_head_on_collision_reverses_velocities() {
    let mut world = World::new(Settings::default());
    world.settings_mut().gravity = Vec2::zero();
    world.set_default_contact_material(ContactMaterial {
        friction: 0.0,
        restitution: 1.0,
        ..ContactMaterial::default()
    });

    let left = world
        .add_body(circle(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0), 0.5))
        .unwrap();
    let right = world
        .add_body(circle(Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0), 0.5))
        .unwrap();

    for _ in 0..60 {
        world.step(1.0 / 60.0);
    }

    let left_velocity = world.body(left).unwrap().velocity();
    let right_velocity = world.body(right).unwrap().velocity();
    assert!(left_velocity.x < 0.0, "left body should bounce back after impact");
    assert!(right_velocity.x > 0.0, "right body should bounce back after impact");
    assert!((left_velocity.x + right_velocity.x).abs() < 0.2, "momentum should stay balanced");
}

#[test]
fn box_resting_on_plane_falls_asleep_and_stays_put() {
    let mut settings = Settings::default();
    settings.world.sleep_mode = SleepMode::PerBody;
    settings.solver = SolverConfig {
        iterations: 40,
        ..SolverConfig::default()
    };
    let mut world = World::new(settings);

    let mut ground = Body::new_static(BodyOptions::default());
    ground.add_shape(Shape::plane(), None, None).unwrap();
    world.add_body(ground).unwrap();

    let mut opts = DynamicBodyOptions::default();
    opts.sleep_time_limit = 0.1;
    let mut resting_box = Body::new_dynamic(
        BodyOptions {
            position: Vec2::new(0.0, 0.55),
            ..Default::default()
        },
        opts,
    );
    resting_box.add_shape(Shape::rectangle(1.0, 1.0), None, None).unwrap();
    let id = world.add_body(resting_box).unwrap();

    for _ in 0..600 {
        world.step(1.0 / 60.0);
    }

    assert!(world.body(id).unwrap().is_sleeping());
    let settled_y = world.body(id).unwrap().position.y;

    for _ in 0..60 {
        world.step(1.0 / 60.0);
    }
    assert!(
        (world.body(id).unwrap().position.y - settled_y).abs() < 1e-9,
        "a sleeping body should not drift"
    );
}

#[test]
fn ccd_stops_a_bullet_at_a_thin_wall_discrete_stepping_would_miss() {
    let mut settings = Settings::default();
    settings.gravity = Vec2::zero();
    let mut world = World::new(settings);

    let mut wall = Body::new_static(BodyOptions {
        position: Vec2::new(0.0, 0.0),
        ..Default::default()
    });
    wall.add_shape(Shape::rectangle(0.1, 5.0), None, None).unwrap();
    world.add_body(wall).unwrap();

    let mut opts = DynamicBodyOptions {
        velocity: Vec2::new(1000.0, 0.0),
        ccd_speed_threshold: Some(10.0),
        ccd_iterations: 10,
        ..Default::default()
    };
    opts.velocity = Vec2::new(1000.0, 0.0);
    let mut bullet = Body::new_dynamic(
        BodyOptions {
            position: Vec2::new(-5.0, 0.0),
            ..Default::default()
        },
        opts,
    );
    bullet.add_shape(Shape::circle(0.1), None, None).unwrap();
    let id = world.add_body(bullet).unwrap();

    world.step(1.0 / 60.0);

    assert!(
        world.body(id).unwrap().position.x < 0.0,
        "CCD should keep the fast body from tunneling through the wall"
    );
}

#[test]
fn begin_and_end_contact_fire_exactly_once_per_touch() {
    let mut world = World::new(Settings::default());
    let mut ground = Body::new_static(BodyOptions::default());
    ground.add_shape(Shape::plane(), None, None).unwrap();
    world.add_body(ground).unwrap();

    let id = world
        .add_body(circle(Vec2::new(0.0, 0.6), Vec2::new(0.0, 0.0), 0.5))
        .unwrap();

    let mut begin_count = 0;
    let mut end_count = 0;
    for _ in 0..180 {
        world.step(1.0 / 240.0);
        for event in world.drain_events() {
            match event {
                Event::BeginContact { body_a, body_b, .. } => {
                    assert!(body_a == id || body_b == id);
                    begin_count += 1;
                }
                Event::EndContact { body_a, body_b, .. } => {
                    assert!(body_a == id || body_b == id);
                    end_count += 1;
                }
                _ => {}
            }
        }
    }

    assert_eq!(begin_count, 1, "a body settling onto the ground should begin contact exactly once");
    assert_eq!(end_count, 0, "a body that stays down should never end contact");
}

#[test]
fn two_separated_piles_form_independent_islands_when_split_is_enabled() {
    let mut settings = Settings::default();
    settings.world.island_split = true;
    let mut world = World::new(settings);

    let mut ground = Body::new_static(BodyOptions::default());
    ground.add_shape(Shape::plane(), None, None).unwrap();
    world.add_body(ground).unwrap();

    let left = world
        .add_body(circle(Vec2::new(0.0, 0.6), Vec2::new(0.0, 0.0), 0.5))
        .unwrap();
    let right = world
        .add_body(circle(Vec2::new(100.0, 0.6), Vec2::new(0.0, 0.0), 0.5))
        .unwrap();

    for _ in 0..30 {
        world.step(1.0 / 60.0);
    }

    assert!(world.body(left).unwrap().position.x.abs() < 1.0);
    assert!((world.body(right).unwrap().position.x - 100.0).abs() < 1.0);
}

#[test]
fn raycast_and_raycast_all_agree_on_the_closest_of_three_boxes() {
    let mut world = World::new(Settings::default());
    let mut first = None;
    for x in [2.0, 4.0, 6.0] {
        let mut body = Body::new_static(BodyOptions {
            position: Vec2::new(x, 0.0),
            ..Default::default()
        });
        body.add_shape(Shape::rectangle(1.0, 1.0), None, None).unwrap();
        let id = world.add_body(body).unwrap();
        if x == 2.0 {
            first = Some(id);
        }
    }
    world.step(1.0 / 60.0);

    let options = RaycastOptions::default();
    let hit = world
        .raycast(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), &options)
        .expect("ray should hit the nearest box");
    assert_eq!(hit.body, first.unwrap());

    let hits = world.raycast_all(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), &options);
    assert_eq!(hits.len(), 3);
    assert!(hits.windows(2).all(|pair| pair[0].distance <= pair[1].distance));
}

#[test]
fn a_sleeping_body_does_not_move_and_a_static_body_never_moves() {
    let mut settings = Settings::default();
    settings.world.sleep_mode = SleepMode::PerBody;
    settings.solver = SolverConfig {
        iterations: 40,
        ..SolverConfig::default()
    };
    let mut world = World::new(settings);

    let mut ground = Body::new_static(BodyOptions {
        position: Vec2::new(3.0, -7.0),
        ..Default::default()
    });
    ground.add_shape(Shape::plane(), None, None).unwrap();
    let ground_id = world.add_body(ground).unwrap();
    let ground_start = world.body(ground_id).unwrap().position;

    let mut opts = DynamicBodyOptions::default();
    opts.sleep_time_limit = 0.1;
    let mut box_body = Body::new_dynamic(
        BodyOptions {
            position: Vec2::new(3.0, -6.45),
            ..Default::default()
        },
        opts,
    );
    box_body.add_shape(Shape::rectangle(1.0, 1.0), None, None).unwrap();
    let id = world.add_body(box_body).unwrap();

    for _ in 0..600 {
        world.step(1.0 / 60.0);
    }

    assert_eq!(world.body(ground_id).unwrap().position, ground_start, "a static body never moves");
    assert!(world.body(id).unwrap().is_sleeping());
    assert_eq!(world.body(id).unwrap().velocity(), Vec2::zero(), "a sleeping body carries no velocity");
}

#[test]
fn world_aabb_always_contains_every_attached_shape() {
    let mut world = World::new(Settings::default());
    let mut body = Body::new_dynamic(
        BodyOptions {
            position: Vec2::new(2.0, -3.0),
            angle: 0.4,
        },
        DynamicBodyOptions::default(),
    );
    let shape_id = body.add_shape(Shape::circle(0.7), Some(Vec2::new(1.0, 0.5)), None).unwrap();
    let id = world.add_body(body).unwrap();

    world.step(1.0 / 60.0);

    let body = world.body(id).unwrap();
    let shape = body.shape(shape_id).unwrap();
    let shape_aabb = shape.compute_aabb(body.position, body.angle);
    let body_aabb = body.get_aabb();

    assert!(body_aabb.min.x <= shape_aabb.min.x && body_aabb.min.y <= shape_aabb.min.y);
    assert!(body_aabb.max.x >= shape_aabb.max.x && body_aabb.max.y >= shape_aabb.max.y);
}

#[test]
fn overlapping_circles_report_symmetric_overlap_through_the_public_query() {
    let mut world = World::new(Settings::default());
    let a = world
        .add_body(circle(Vec2::new(0.0, 0.0), Vec2::zero(), 1.0))
        .unwrap();
    let b = world
        .add_body(circle(Vec2::new(1.5, 0.0), Vec2::zero(), 1.0))
        .unwrap();
    world.step(1.0 / 60.0);

    assert_eq!(world.bodies_overlap(a, b).unwrap(), world.bodies_overlap(b, a).unwrap());
    assert!(world.bodies_overlap(a, b).unwrap());
}
