//! Fixed-timestep client simulation.
//!
//! Physical positions live here, not in the entity records. Rendering samples
//! them at its own cadence; only [`SimulationLoop`] advances them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::world::{EntityId, Vec2, WorldBounds};

/// Meters per second, shared by every entity
pub const ENTITY_SPEED: f64 = 5.0;

pub const TICK_RATE: u32 = 60;

/// Remaining distance treated as arrived
pub const ARRIVAL_EPSILON: f64 = 1e-6;

/// Cap on wall-clock time fed into one frame
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Cap on fixed steps per frame; anything beyond is dropped
pub const MAX_TICKS_PER_FRAME: u32 = 15;

pub fn fixed_step() -> Duration {
    Duration::from_secs(1) / TICK_RATE
}

/// Move `position` toward `target` by at most `max_step` meters.
/// Lands exactly on the target once it is within reach.
pub fn seek(position: Vec2, target: Vec2, max_step: f64) -> Vec2 {
    let delta = target - position;
    let remaining = delta.length();
    if remaining <= max_step + ARRIVAL_EPSILON {
        return target;
    }
    position + delta * (max_step / remaining)
}

/// Simulated state of one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub target: Option<Vec2>,
    pub moving: bool,
}

impl Body {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            target: None,
            moving: false,
        }
    }

    pub fn arrived(&self) -> bool {
        self.target.map_or(true, |t| t == self.position)
    }
}

/// Entity id to physical position
#[derive(Debug, Clone)]
pub struct PhysicsTable {
    bodies: HashMap<EntityId, Body>,
    bounds: WorldBounds,
    speed: f64,
}

impl PhysicsTable {
    pub fn new(bounds: WorldBounds) -> Self {
        Self {
            bodies: HashMap::new(),
            bounds,
            speed: ENTITY_SPEED,
        }
    }

    pub fn insert(&mut self, id: impl Into<EntityId>, body: Body) {
        let body = Body {
            position: self.bounds.clamp(body.position),
            target: body.target.map(|t| self.bounds.clamp(t)),
            moving: body.moving,
        };
        self.bodies.insert(id.into(), body);
    }

    pub fn remove(&mut self, id: &str) -> Option<Body> {
        self.bodies.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Body> {
        self.bodies.get(id)
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        self.bodies.get(id).map(|b| b.position)
    }

    /// Returns false when the entity is not simulated
    pub fn set_target(&mut self, id: &str, target: Vec2) -> bool {
        let target = self.bounds.clamp(target);
        match self.bodies.get_mut(id) {
            Some(body) => {
                body.target = Some(target);
                true
            }
            None => false,
        }
    }

    pub fn set_moving(&mut self, id: &str, moving: bool) -> bool {
        match self.bodies.get_mut(id) {
            Some(body) => {
                body.moving = moving;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Integrate one fixed step. Returns how many bodies moved.
    pub fn step(&mut self, dt: Duration) -> usize {
        let max_step = self.speed * dt.as_secs_f64();
        let mut moved = 0;
        for body in self.bodies.values_mut() {
            if !body.moving {
                continue;
            }
            let Some(target) = body.target else {
                continue;
            };
            let next = seek(body.position, target, max_step);
            if next != body.position {
                body.position = next;
                moved += 1;
            }
        }
        moved
    }
}

/// Shared table for hosts that simulate and render on different threads
pub type SharedPhysics = Arc<RwLock<PhysicsTable>>;

pub fn shared(bounds: WorldBounds) -> SharedPhysics {
    Arc::new(RwLock::new(PhysicsTable::new(bounds)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub ticks_to_run: u32,
    pub remaining_accumulator: Duration,
    pub dropped_backlog: Duration,
}

pub fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator -= fixed_dt;
        ticks_to_run += 1;
    }

    // Backlog past the cap is discarded rather than carried into the next frame
    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };

    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

pub fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

/// Accumulator that turns wall-clock frames into fixed steps
#[derive(Debug, Clone)]
pub struct SimulationLoop {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    last_frame: Option<Instant>,
    total_ticks: u64,
}

impl SimulationLoop {
    pub fn new() -> Self {
        Self {
            fixed_dt: fixed_step(),
            max_frame_delta: MAX_FRAME_DELTA,
            max_ticks_per_frame: MAX_TICKS_PER_FRAME,
            accumulator: Duration::ZERO,
            last_frame: None,
            total_ticks: 0,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Advance using the wall-clock time since the previous call.
    /// The first call only records the starting instant.
    pub fn advance(&mut self, now: Instant, table: &mut PhysicsTable) -> StepPlan {
        let elapsed = match self.last_frame.replace(now) {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        self.advance_by(elapsed, table)
    }

    pub fn advance_by(&mut self, elapsed: Duration, table: &mut PhysicsTable) -> StepPlan {
        let frame_dt = clamp_frame_delta(elapsed, self.max_frame_delta);
        if frame_dt < elapsed {
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Frame delta clamped"
            );
        }

        let plan = plan_sim_steps(
            self.accumulator + frame_dt,
            self.fixed_dt,
            self.max_ticks_per_frame,
        );
        for _ in 0..plan.ticks_to_run {
            table.step(self.fixed_dt);
        }
        self.accumulator = plan.remaining_accumulator;
        self.total_ticks += u64::from(plan.ticks_to_run);

        if !plan.dropped_backlog.is_zero() {
            warn!(
                dropped_ms = plan.dropped_backlog.as_millis() as u64,
                ticks = plan.ticks_to_run,
                "Simulation backlog dropped"
            );
        }
        plan
    }
}

impl Default for SimulationLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive the shared table from a timer until `shutdown` flips to true
pub fn run_simulation(physics: SharedPhysics, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sim = SimulationLoop::new();
        let mut ticker = interval(sim.fixed_dt());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                now = ticker.tick() => {
                    sim.advance(now, &mut physics.write());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(ticks = sim.total_ticks(), "Simulation stopped");
    })
}
