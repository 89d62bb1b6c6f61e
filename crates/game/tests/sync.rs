use adrift::{
    DamageSink, MoveUpdate, PendingAction, StateSink, SyncWorld, TileKind, WorldMap,
};
use glam::IVec2;

const DT: f32 = 1.0 / 30.0;

#[derive(Debug, Default)]
struct RecordingSink {
    broadcasts: Vec<MoveUpdate>,
}

impl StateSink for RecordingSink {
    fn send_to_all(&mut self, update: MoveUpdate) {
        self.broadcasts.push(update);
    }

    fn send_to(&mut self, _observer: u32, _update: MoveUpdate) {}
}

#[derive(Debug, Default)]
struct RecordingDamage {
    total: u32,
}

impl DamageSink for RecordingDamage {
    fn apply_oxygen_damage(&mut self, _entity_id: u32, amount: u32) {
        self.total += amount;
    }
}

/// 12x12 station with gravity, floored from (0,0) to (11,11), surrounded by
/// open space.
fn station_world() -> SyncWorld {
    let mut map = WorldMap::new();
    let id = map.add_matrix(100, true);
    for x in 0..12 {
        for y in 0..12 {
            map.set_tile(id, IVec2::new(x, y), TileKind::Floor);
        }
    }
    SyncWorld::new(map)
}

fn run_ticks(world: &mut SyncWorld, sink: &mut RecordingSink, ticks: u32) {
    let mut damage = RecordingDamage::default();
    for _ in 0..ticks {
        world.tick(DT, sink, &mut damage);
    }
}

#[test]
fn predicted_move_is_confirmed() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let id = world.spawn_entity(IVec2::new(5, 5));

    world
        .submit_action(id, &mut sink, PendingAction::new(IVec2::new(1, 0)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 30);

    let state = *world.entity(id).unwrap().state();
    assert_eq!(state.position, IVec2::new(6, 5));
    assert_eq!(state.move_number, 1);
    assert!(sink
        .broadcasts
        .iter()
        .any(|u| u.position == [6, 5] && u.move_number == 1));
}

#[test]
fn queued_moves_resolve_in_order() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let id = world.spawn_entity(IVec2::new(2, 2));

    world
        .submit_action(id, &mut sink, PendingAction::new(IVec2::new(1, 0)))
        .unwrap();
    world
        .submit_action(id, &mut sink, PendingAction::new(IVec2::new(0, 1)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 60);

    let state = *world.entity(id).unwrap().state();
    assert_eq!(state.position, IVec2::new(3, 3));
    assert_eq!(state.move_number, 2);
    assert_eq!(world.entity(id).unwrap().pending_actions(), 0);
}

#[test]
fn agreed_bump_stays_put_without_rollback() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let matrix = world.map.matrix_at(IVec2::new(5, 5));
    world.map.set_tile(matrix, IVec2::new(6, 5), TileKind::Wall);
    let id = world.spawn_entity(IVec2::new(5, 5));

    world
        .submit_action(id, &mut sink, PendingAction::bump(IVec2::new(1, 0)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 10);

    let entity = world.entity(id).unwrap();
    assert_eq!(entity.state().position, IVec2::new(5, 5));
    assert_eq!(entity.facing(), IVec2::new(1, 0));
    assert!(!sink
        .broadcasts
        .iter()
        .any(|u| u.has_flag(MoveUpdate::FLAG_RESET_QUEUE)));
}

#[test]
fn bump_mismatch_forces_rollback() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let matrix = world.map.matrix_at(IVec2::new(5, 5));
    world.map.set_tile(matrix, IVec2::new(6, 5), TileKind::Wall);
    let id = world.spawn_entity(IVec2::new(5, 5));

    // Client claims free passage through the wall.
    world
        .submit_action(id, &mut sink, PendingAction::new(IVec2::new(1, 0)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 10);

    let entity = world.entity(id).unwrap();
    assert_eq!(entity.state().position, IVec2::new(5, 5));
    assert_eq!(entity.state().move_number, 0);
    assert!(sink
        .broadcasts
        .iter()
        .any(|u| u.has_flag(MoveUpdate::FLAG_RESET_QUEUE)));
}

#[test]
fn phantom_bump_claim_also_rolls_back() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let id = world.spawn_entity(IVec2::new(5, 5));

    // Client claims a bump where the server sees open floor.
    world
        .submit_action(id, &mut sink, PendingAction::bump(IVec2::new(1, 0)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 10);

    assert_eq!(world.entity(id).unwrap().state().position, IVec2::new(5, 5));
    assert!(sink
        .broadcasts
        .iter()
        .any(|u| u.has_flag(MoveUpdate::FLAG_RESET_QUEUE)));
}

#[test]
fn bumping_a_closed_door_opens_it() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let door = world.map.spawn_door(IVec2::new(6, 5));
    let id = world.spawn_entity(IVec2::new(5, 5));

    world
        .submit_action(id, &mut sink, PendingAction::bump(IVec2::new(1, 0)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 5);
    assert!(world.map.door(door).unwrap().is_passable());

    // With the door open the same move now goes through.
    world
        .submit_action(id, &mut sink, PendingAction::new(IVec2::new(1, 0)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 30);
    assert_eq!(world.entity(id).unwrap().state().position, IVec2::new(6, 5));
}

#[test]
fn bumping_a_crate_shoves_it() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let crate_id = world.map.spawn_pushable(IVec2::new(6, 5), true);
    let id = world.spawn_entity(IVec2::new(5, 5));

    world
        .submit_action(id, &mut sink, PendingAction::bump(IVec2::new(1, 0)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 5);

    assert_eq!(
        world.map.pushable(crate_id).unwrap().position,
        IVec2::new(7, 5)
    );
    assert_eq!(world.entity(id).unwrap().state().position, IVec2::new(5, 5));
}

#[test]
fn action_flood_triggers_rollback() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let id = world.spawn_entity(IVec2::new(5, 5));

    for _ in 0..11 {
        world
            .submit_action(id, &mut sink, PendingAction::new(IVec2::new(1, 0)))
            .unwrap();
    }

    assert_eq!(world.entity(id).unwrap().pending_actions(), 0);
    assert!(sink
        .broadcasts
        .iter()
        .any(|u| u.has_flag(MoveUpdate::FLAG_RESET_QUEUE)));
}

#[test]
fn non_predictive_action_ignored_on_solid_ground() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let id = world.spawn_entity(IVec2::new(5, 5));

    let action = PendingAction {
        direction: IVec2::new(1, 0),
        is_bump: false,
        is_non_predictive: true,
    };
    world.submit_action(id, &mut sink, action).unwrap();
    run_ticks(&mut world, &mut sink, 10);

    let entity = world.entity(id).unwrap();
    assert_eq!(entity.state().position, IVec2::new(5, 5));
    assert_eq!(entity.state().move_number, 0);
    assert!(!sink
        .broadcasts
        .iter()
        .any(|u| u.has_flag(MoveUpdate::FLAG_RESET_QUEUE)));
}

#[test]
fn drift_updates_are_suppressed_until_stop() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    // Drop-off at x=12, isolated landing pad further out.
    let matrix = world.map.matrix_at(IVec2::new(5, 5));
    world.map.set_tile(matrix, IVec2::new(16, 5), TileKind::Floor);
    let id = world.spawn_entity(IVec2::new(11, 5));

    world.push_entity(id, &mut sink, IVec2::new(1, 0)).unwrap();
    assert!(world.entity(id).unwrap().is_drifting());
    run_ticks(&mut world, &mut sink, 300);

    let entity = world.entity(id).unwrap();
    assert!(!entity.is_drifting());
    assert_eq!(entity.state().position, IVec2::new(16, 5));

    // No mid-flight tile was ever broadcast.
    assert!(!sink
        .broadcasts
        .iter()
        .any(|u| (13..16).contains(&u.position[0])));
    // The landing announced itself with a queue reset.
    assert!(sink
        .broadcasts
        .iter()
        .any(|u| u.position == [16, 5] && u.has_flag(MoveUpdate::FLAG_RESET_QUEUE)));
}

#[test]
fn actions_submitted_mid_drift_are_dropped() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let id = world.spawn_entity(IVec2::new(11, 5));

    world.push_entity(id, &mut sink, IVec2::new(1, 0)).unwrap();
    run_ticks(&mut world, &mut sink, 30);
    assert!(world.entity(id).unwrap().is_drifting());

    world
        .submit_action(id, &mut sink, PendingAction::new(IVec2::new(0, 1)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 60);

    let entity = world.entity(id).unwrap();
    // Still going +x; the sideways input changed nothing.
    assert!(entity.is_drifting());
    assert_eq!(entity.state().impulse, IVec2::new(1, 0));
    assert_eq!(entity.state().position.y, 5);
    assert_eq!(entity.pending_actions(), 0);
}

#[test]
fn teleport_resets_prediction() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let id = world.spawn_entity(IVec2::new(2, 2));

    world
        .submit_action(id, &mut sink, PendingAction::new(IVec2::new(1, 0)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 30);
    assert_eq!(world.entity(id).unwrap().state().move_number, 1);

    world
        .set_entity_position(id, &mut sink, IVec2::new(9, 9))
        .unwrap();

    let entity = world.entity(id).unwrap();
    assert_eq!(entity.state().position, IVec2::new(9, 9));
    assert_eq!(entity.state().move_number, 0);
    assert_eq!(entity.pending_actions(), 0);
    assert_eq!(entity.lerp_position(), IVec2::new(9, 9).as_vec2());
    assert!(sink
        .broadcasts
        .iter()
        .any(|u| u.position == [9, 9] && u.has_flag(MoveUpdate::FLAG_RESET_QUEUE)));
}

#[test]
fn questionable_pushable_resolves_on_next_rollback() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let matrix = world.map.matrix_at(IVec2::new(5, 5));
    world.map.set_tile(matrix, IVec2::new(6, 5), TileKind::Wall);
    let id = world.spawn_entity(IVec2::new(5, 5));
    let far = world.map.spawn_pushable(IVec2::new(10, 10), true);

    // Unverifiable client push claim, benefit of the doubt for now.
    world.validate_push(id, far).unwrap();
    assert_eq!(world.entity(id).unwrap().questionable_count(), 1);
    assert!(!world.map.pushable_mut(far).unwrap().take_pending_notify());

    // An unrelated bump mismatch later forces the rollback.
    world
        .submit_action(id, &mut sink, PendingAction::new(IVec2::new(1, 0)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 10);

    assert_eq!(world.entity(id).unwrap().questionable_count(), 0);
    assert!(world.map.pushable_mut(far).unwrap().take_pending_notify());
}

#[test]
fn space_push_exchange_separates_entity_and_object() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let id = world.spawn_entity(IVec2::new(20, 20));
    let crate_id = world.map.spawn_pushable(IVec2::new(20, 21), true);

    world
        .submit_action(id, &mut sink, PendingAction::new(IVec2::new(1, 0)))
        .unwrap();
    run_ticks(&mut world, &mut sink, 120);

    // Newton held: entity went +x, the object got sent the other way.
    let entity = world.entity(id).unwrap();
    assert!(entity.state().position.x > 20);
    assert!(world.map.pushable(crate_id).unwrap().position.x < 20);
}

#[test]
fn vacuum_hurts_only_the_unprotected() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let mut damage = RecordingDamage::default();
    let id = world.spawn_entity(IVec2::new(30, 30));

    for _ in 0..90 {
        world.tick(DT, &mut sink, &mut damage);
    }
    let unprotected = damage.total;
    assert!(unprotected > 0);

    // Suit up; further ticks add nothing.
    let eva = adrift::Item { eva_capable: true };
    world.entity_mut(id).unwrap().inventory = adrift::Inventory {
        head: Some(eva),
        suit: Some(eva),
    };
    for _ in 0..90 {
        world.tick(DT, &mut sink, &mut damage);
    }
    assert_eq!(damage.total, unprotected);
}

#[test]
fn walking_onto_station_is_safe() {
    let mut world = station_world();
    let mut sink = RecordingSink::default();
    let mut damage = RecordingDamage::default();
    let id = world.spawn_entity(IVec2::new(5, 5));

    world
        .submit_action(id, &mut sink, PendingAction::new(IVec2::new(1, 0)))
        .unwrap();
    for _ in 0..90 {
        world.tick(DT, &mut sink, &mut damage);
    }
    assert_eq!(damage.total, 0);
}
