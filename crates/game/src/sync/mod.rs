mod drift;
mod exposure;
mod queue;
mod reconcile;
mod replicate;
mod rollback;
mod state;

pub use drift::SPACE_PUSH_CHAIN_STEPS;
pub use exposure::{DamageSink, Inventory, Item, EXPOSURE_DAMAGE};
pub use queue::{ActionQueue, Admission};
pub use reconcile::{next_state, StepEffect, StepResult};
pub use replicate::{notify_all, notify_one, StateSink};
pub use rollback::QuestionableSet;
pub use state::{LerpState, MoveState, PendingAction, StateFlags};

use std::collections::HashMap;

use glam::IVec2;

use crate::simulation::{Task, TaskScheduler, EXPOSURE_TICK_SECS, INTERACT_STEP_SECS};
use crate::world::{MatrixId, PushableId, RotationSubscription, WorldMap};

/// Default walking speed, tiles per second.
pub const DEFAULT_MOVE_SPEED: f32 = 4.0;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("unknown entity {0}")]
    UnknownEntity(u32),
    #[error("unknown pushable {0:?}")]
    UnknownPushable(PushableId),
}

/// Server-side movement authority for one entity.
///
/// Owns the authoritative state, the pending action queue, the lerp shadow,
/// and the questionable-pushable set. All mutation happens from the tick
/// context; inbound handlers only append to the queue or the set.
#[derive(Debug)]
pub struct EntitySync {
    pub entity_id: u32,
    pub inventory: Inventory,
    pub move_speed: f32,
    state: MoveState,
    lerp: LerpState,
    queue: ActionQueue,
    questionable: QuestionableSet,
    rotation_sub: Option<RotationSubscription>,
    /// Last direction moved in. Works like a true impulse: zeroed once a
    /// drift it seeded has ended.
    last_direction: IVec2,
    facing: IVec2,
    last_broadcast: Option<MoveState>,
    tile_reached: Option<IVec2>,
}

impl EntitySync {
    pub fn new(entity_id: u32, spawn_position: IVec2, map: &mut WorldMap) -> Self {
        let matrix_id = map.matrix_at(spawn_position);
        let state = MoveState::at(spawn_position, matrix_id);
        log::trace!("init entity {entity_id} at {spawn_position} on {matrix_id:?}");

        let mut sync = Self {
            entity_id,
            inventory: Inventory::default(),
            move_speed: DEFAULT_MOVE_SPEED,
            state,
            lerp: LerpState::at(spawn_position),
            queue: ActionQueue::new(),
            questionable: QuestionableSet::new(),
            rotation_sub: None,
            last_direction: IVec2::ZERO,
            facing: IVec2::new(0, -1),
            last_broadcast: None,
            tile_reached: None,
        };
        sync.resubscribe(map, matrix_id);
        sync
    }

    pub fn state(&self) -> &MoveState {
        &self.state
    }

    pub fn lerp_position(&self) -> glam::Vec2 {
        self.lerp.position
    }

    pub fn facing(&self) -> IVec2 {
        self.facing
    }

    pub fn pending_actions(&self) -> usize {
        self.queue.len()
    }

    pub fn questionable_count(&self) -> usize {
        self.questionable.len()
    }

    pub fn is_drifting(&self) -> bool {
        self.state.is_drifting()
    }

    /// Fires once per tile the lerp shadow arrives at.
    pub fn take_tile_reached(&mut self) -> Option<IVec2> {
        self.tile_reached.take()
    }

    /// Admit one client action; overflow is answered with a rollback before
    /// anything else gets processed.
    pub fn submit_action(
        &mut self,
        map: &mut WorldMap,
        sink: &mut dyn StateSink,
        action: PendingAction,
    ) {
        if self.queue.submit(action) == Admission::Overflowed {
            self.rollback(map, sink);
        }
    }

    /// Client claims it pushed `pushable`. If the object is out of arm's
    /// reach the claim can't be verified and the object becomes
    /// questionable until the next rollback.
    pub fn validate_push(&mut self, map: &WorldMap, pushable: PushableId) -> Result<(), SyncError> {
        let target = map
            .pushable(pushable)
            .ok_or(SyncError::UnknownPushable(pushable))?;
        if !map
            .spatial()
            .in_reach_of(self.state.position, target.position)
        {
            self.questionable.mark(pushable);
        }
        Ok(())
    }

    /// Shove this entity one tile. Indoors the impulse is consumed after a
    /// single tile; into space it keeps the entity drifting until something
    /// stops it. Zero direction is a no-op.
    pub fn push(&mut self, map: &mut WorldMap, sink: &mut dyn StateSink, direction: IVec2) -> bool {
        if direction == IVec2::ZERO {
            return false;
        }

        let origin = self.state.position;
        let goal = origin + direction;
        if !map.spatial().is_passable(origin, goal) {
            return false;
        }

        log::info!("server push of entity {} to {}", self.entity_id, goal);
        self.queue.clear();

        let matrix_id = map.matrix_at(goal);
        if matrix_id != self.state.matrix_id {
            self.resubscribe(map, matrix_id);
        }
        self.last_direction = direction;
        self.state = MoveState {
            move_number: 0,
            matrix_id,
            position: goal,
            impulse: direction,
            flags: StateFlags::IMPORTANT | StateFlags::RESET_QUEUE,
        };
        self.notify_players(sink);
        true
    }

    /// Teleport: wholesale state replacement, discarding all prediction.
    pub fn set_position(&mut self, map: &mut WorldMap, sink: &mut dyn StateSink, position: IVec2) {
        self.queue.clear();

        let matrix_id = map.matrix_at(position);
        if matrix_id != self.state.matrix_id {
            self.resubscribe(map, matrix_id);
        }
        self.state = MoveState {
            move_number: 0,
            matrix_id,
            position,
            impulse: IVec2::ZERO,
            flags: StateFlags::RESET_QUEUE,
        };
        self.lerp = LerpState::at(position);
        self.notify_players(sink);
    }

    /// The single recovery path for queue overflow and bump mismatch:
    /// resolve questionable pushables, then force the entity back onto its
    /// own authoritative position.
    pub fn rollback(&mut self, map: &mut WorldMap, sink: &mut dyn StateSink) {
        self.questionable.drain_notifying(map);
        let position = self.state.position;
        self.set_position(map, sink, position);
    }

    /// One simulation step: drift regime, lerp convergence, queued action
    /// reconciliation, vacuum exposure.
    pub fn tick(
        &mut self,
        map: &mut WorldMap,
        scheduler: &mut TaskScheduler,
        sink: &mut dyn StateSink,
        dt: f32,
    ) {
        drift::check_movement(self, map, sink);

        let was_caught_up = self.lerp.matches(self.state.position);
        let reached = self.lerp.advance(self.state.position, self.move_speed, dt);
        if reached && !was_caught_up {
            self.tile_reached = Some(self.state.position);
        }
        self.try_notify(map, scheduler, sink);

        if map.spatial().is_space(self.state.position)
            && !self.inventory.is_eva_compatible()
            && !scheduler.has_exposure_task(self.entity_id)
        {
            scheduler.schedule(
                EXPOSURE_TICK_SECS,
                Task::SpaceExposure {
                    entity_id: self.entity_id,
                },
            );
        }
    }

    /// Broadcast (subject to drift suppression) and remember what went out
    /// so an unchanged idle state isn't re-sent every tick.
    fn notify_players(&mut self, sink: &mut dyn StateSink) {
        if replicate::notify_all(sink, self.entity_id, &mut self.state) {
            self.last_broadcast = Some(self.state);
        }
    }

    /// When the lerp shadow has converged, inform observers and pull the
    /// next action off the queue.
    fn try_notify(
        &mut self,
        map: &mut WorldMap,
        scheduler: &mut TaskScheduler,
        sink: &mut dyn StateSink,
    ) {
        if !self.lerp.matches(self.state.position) {
            return;
        }
        if !self.state.flags.is_empty() || self.last_broadcast != Some(self.state) {
            self.notify_players(sink);
        }
        self.try_update_target(map, scheduler, sink);
    }

    /// Dequeue and reconcile one pending action.
    fn try_update_target(
        &mut self,
        map: &mut WorldMap,
        scheduler: &mut TaskScheduler,
        sink: &mut dyn StateSink,
    ) {
        if self.queue.is_empty() {
            return;
        }

        let position = self.state.position;
        let stuck_in_space = map.spatial().is_floating_at(position)
            && map.spatial().pushable_in_reach(position).is_none();
        if self.state.is_drifting() || stuck_in_space {
            log::info!("ignored queued move while entity {} floats", self.entity_id);
            self.queue.dequeue();
            return;
        }

        let Some(action) = self.queue.dequeue() else {
            return;
        };

        let result = reconcile::next_state(&self.state, action, map);
        if result.mismatch {
            self.rollback(map, sink);
        }

        match result.effect {
            StepEffect::Stay => {}
            StepEffect::Bump { facing } => {
                self.facing = facing;
                scheduler.schedule(
                    0.0,
                    Task::BumpInteract {
                        entity_id: self.entity_id,
                        origin: self.state.position,
                        direction: facing,
                    },
                );
            }
            StepEffect::SpaceInteract { pushable } => {
                if let Some(pushable) = pushable {
                    scheduler.schedule(
                        0.0,
                        Task::SpacePushStep {
                            entity_id: self.entity_id,
                            pushable,
                            direction: action.direction,
                            remaining: SPACE_PUSH_CHAIN_STEPS,
                            push_object: true,
                        },
                    );
                }
            }
            StepEffect::Moved {
                next,
                matrix_changed,
            } => {
                self.last_direction = next.position - self.state.position;
                self.facing = self.last_direction;
                self.state = next;
                if matrix_changed {
                    log::info!(
                        "entity {} changed matrix to {:?}",
                        self.entity_id,
                        next.matrix_id
                    );
                    self.resubscribe(map, next.matrix_id);
                }
                // Positions may already match (e.g. after a snap).
                self.try_notify(map, scheduler, sink);
            }
        }
    }

    /// Release the old rotation subscription and acquire the new one within
    /// the same tick; never zero, never two.
    fn resubscribe(&mut self, map: &mut WorldMap, new_matrix: MatrixId) {
        if let Some(sub) = self.rotation_sub.take() {
            if let Some(matrix) = map.matrix_mut(sub.matrix_id) {
                matrix.rotation_mut().unsubscribe(sub);
            }
        }
        if let Some(matrix) = map.matrix_mut(new_matrix) {
            self.rotation_sub = Some(matrix.rotation_mut().subscribe(new_matrix, self.entity_id));
        }
    }

    fn release_subscription(&mut self, map: &mut WorldMap) {
        if let Some(sub) = self.rotation_sub.take() {
            if let Some(matrix) = map.matrix_mut(sub.matrix_id) {
                matrix.rotation_mut().unsubscribe(sub);
            }
        }
    }

    /// The owning frame rotated under this entity; spin facing with it.
    pub(crate) fn apply_rotation(&mut self, degrees: i32) {
        let quarter_turns = degrees.rem_euclid(360) / 90;
        for _ in 0..quarter_turns {
            self.facing = IVec2::new(self.facing.y, -self.facing.x);
        }
    }
}

/// The simulation root: world context, per-entity sync authorities, and the
/// deferred-task scheduler. One logical tick thread mutates all of it.
pub struct SyncWorld {
    pub map: WorldMap,
    entities: HashMap<u32, EntitySync>,
    scheduler: TaskScheduler,
    next_entity_id: u32,
}

impl SyncWorld {
    pub fn new(map: WorldMap) -> Self {
        Self {
            map,
            entities: HashMap::new(),
            scheduler: TaskScheduler::new(),
            next_entity_id: 1,
        }
    }

    pub fn spawn_entity(&mut self, position: IVec2) -> u32 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities
            .insert(id, EntitySync::new(id, position, &mut self.map));
        id
    }

    pub fn despawn_entity(&mut self, id: u32) {
        if let Some(mut entity) = self.entities.remove(&id) {
            entity.release_subscription(&mut self.map);
        }
    }

    pub fn entity(&self, id: u32) -> Option<&EntitySync> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: u32) -> Option<&mut EntitySync> {
        self.entities.get_mut(&id)
    }

    pub fn entity_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn submit_action(
        &mut self,
        id: u32,
        sink: &mut dyn StateSink,
        action: PendingAction,
    ) -> Result<(), SyncError> {
        let entity = self.entities.get_mut(&id).ok_or(SyncError::UnknownEntity(id))?;
        entity.submit_action(&mut self.map, sink, action);
        Ok(())
    }

    pub fn validate_push(&mut self, id: u32, pushable: PushableId) -> Result<(), SyncError> {
        let entity = self.entities.get_mut(&id).ok_or(SyncError::UnknownEntity(id))?;
        entity.validate_push(&self.map, pushable)
    }

    pub fn push_entity(
        &mut self,
        id: u32,
        sink: &mut dyn StateSink,
        direction: IVec2,
    ) -> Result<bool, SyncError> {
        let entity = self.entities.get_mut(&id).ok_or(SyncError::UnknownEntity(id))?;
        Ok(entity.push(&mut self.map, sink, direction))
    }

    pub fn set_entity_position(
        &mut self,
        id: u32,
        sink: &mut dyn StateSink,
        position: IVec2,
    ) -> Result<(), SyncError> {
        let entity = self.entities.get_mut(&id).ok_or(SyncError::UnknownEntity(id))?;
        entity.set_position(&mut self.map, sink, position);
        Ok(())
    }

    pub fn rollback_entity(&mut self, id: u32, sink: &mut dyn StateSink) -> Result<(), SyncError> {
        let entity = self.entities.get_mut(&id).ok_or(SyncError::UnknownEntity(id))?;
        entity.rollback(&mut self.map, sink);
        Ok(())
    }

    /// One fixed simulation step for everything.
    pub fn tick(&mut self, dt: f32, sink: &mut dyn StateSink, damage: &mut dyn DamageSink) {
        for id in self.entity_ids() {
            if let Some(entity) = self.entities.get_mut(&id) {
                entity.tick(&mut self.map, &mut self.scheduler, sink, dt);
            }
        }

        self.map.step_pushables();

        for task in self.scheduler.advance(dt) {
            self.run_task(task, sink, damage);
        }

        for event in self.map.drain_rotation_events() {
            if let Some(entity) = self.entities.get_mut(&event.entity_id) {
                entity.apply_rotation(event.degrees);
            }
        }
    }

    pub(crate) fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    fn run_task(&mut self, task: Task, sink: &mut dyn StateSink, damage: &mut dyn DamageSink) {
        match task {
            Task::BumpInteract {
                entity_id,
                origin,
                direction,
            } => {
                let target = origin + direction;
                let door = {
                    let spatial = self.map.spatial();
                    spatial
                        .first_door_at(target)
                        .or_else(|| spatial.first_door_at(origin))
                };
                if let Some(door_id) = door {
                    if let Some(door) = self.map.door_mut(door_id) {
                        door.interact(entity_id);
                    }
                }

                // Shoving things needs footing.
                if !self.map.spatial().is_non_sticky(origin) {
                    if let Some(&first) = self.map.spatial().solid_occupants_at(target).first() {
                        self.map.try_push_object(first, direction);
                    }
                }
            }
            Task::SpacePushStep {
                entity_id,
                pushable,
                direction,
                remaining,
                push_object,
            } => {
                if remaining == 0 {
                    return;
                }
                if self.map.pushable(pushable).is_none() {
                    log::trace!("space push chain abandoned: {pushable:?} is gone");
                    return;
                }
                let Some(entity) = self.entities.get_mut(&entity_id) else {
                    return;
                };

                if push_object {
                    if let Some(target) = self.map.pushable_mut(pushable) {
                        target.queue_push(-direction);
                    }
                    log::trace!("queued obstacle push, {} left", remaining - 1);
                } else {
                    entity.push(&mut self.map, sink, direction);
                    log::trace!("queued entity push, {} left", remaining - 1);
                }

                let remaining = remaining - 1;
                if remaining > 0 {
                    self.scheduler.schedule(
                        INTERACT_STEP_SECS,
                        Task::SpacePushStep {
                            entity_id,
                            pushable,
                            direction,
                            remaining,
                            push_object: !push_object,
                        },
                    );
                }
            }
            Task::SpaceExposure { entity_id } => {
                let Some(entity) = self.entities.get(&entity_id) else {
                    return;
                };
                if self.map.spatial().is_space(entity.state().position)
                    && !entity.inventory.is_eva_compatible()
                {
                    damage.apply_oxygen_damage(entity_id, EXPOSURE_DAMAGE);
                }
            }
        }
    }
}
