//! One player's client: simulation, camera, input and at most one sync stream

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::api::ApiClient;
use crate::client::camera::{Camera, Viewport};
use crate::client::harvest::LocalInventory;
use crate::client::input::{Intent, InteractionController, Scene};
use crate::client::physics::{self, Body, SharedPhysics, SimulationLoop, StepPlan};
use crate::client::sync::SyncHandle;
use crate::client::ClientError;
use crate::wire::ResourceView;
use crate::world::{EntityId, HarvestOutcome, ResourceId, Vec2, WorldBounds};
use crate::ws::protocol::{ClientFrame, ServerFrame};

/// Last physical position is resent this often even without input
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(1);

pub struct ClientSession {
    ws_url: String,
    token: String,
    physics: SharedPhysics,
    sim: SimulationLoop,
    camera: Camera,
    input: InteractionController,
    resources: Vec<ResourceView>,
    inventory: LocalInventory,
    stream: Option<SyncHandle>,
    driven: Option<EntityId>,
    /// Latest confirmations, kept apart from the physics table
    observed: HashMap<EntityId, ServerFrame>,
    pending_harvests: Vec<ResourceId>,
    last_sync: Option<Instant>,
}

impl ClientSession {
    pub fn new(ws_url: &str, token: &str, viewport: Viewport, bounds: WorldBounds) -> Self {
        Self {
            ws_url: ws_url.to_string(),
            token: token.to_string(),
            physics: physics::shared(bounds),
            sim: SimulationLoop::new(),
            camera: Camera::new(viewport, bounds),
            input: InteractionController::new(),
            resources: Vec::new(),
            inventory: LocalInventory::new(),
            stream: None,
            driven: None,
            observed: HashMap::new(),
            pending_harvests: Vec::new(),
            last_sync: None,
        }
    }

    pub fn physics(&self) -> &SharedPhysics {
        &self.physics
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn input(&self) -> &InteractionController {
        &self.input
    }

    pub fn set_follow(&mut self, enabled: bool) {
        self.input.set_follow(enabled);
    }

    pub fn driven(&self) -> Option<&str> {
        self.driven.as_deref()
    }

    pub fn inventory(&self) -> &LocalInventory {
        &self.inventory
    }

    pub fn resources(&self) -> &[ResourceView] {
        &self.resources
    }

    pub fn set_resources(&mut self, resources: Vec<ResourceView>) {
        self.resources = resources;
    }

    pub fn observed(&self, entity_id: &str) -> Option<&ServerFrame> {
        self.observed.get(entity_id)
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    pub fn pending_harvests(&self) -> &[ResourceId] {
        &self.pending_harvests
    }

    /// Simulate an entity locally and make it the one input acts on
    pub fn track(&mut self, state: &ServerFrame) {
        self.physics.write().insert(
            state.entity_id.clone(),
            Body {
                position: state.position,
                target: state.target,
                moving: state.moving,
            },
        );
        self.camera.follow(state.position, false);
        self.driven = Some(state.entity_id.clone());
        self.last_sync = None;
    }

    /// Switch the driven entity. The previous stream is closed before the new
    /// one opens.
    pub async fn drive(&mut self, state: &ServerFrame) -> Result<(), ClientError> {
        if let Some(previous) = self.stream.take() {
            debug!(entity_id = %previous.entity_id(), "Closing previous sync stream");
            previous.close().await;
        }

        self.track(state);
        let handle = SyncHandle::open(&self.ws_url, &self.token, state.entity_id.clone()).await?;
        self.stream = Some(handle);
        info!(entity_id = %state.entity_id, "Driving entity");
        Ok(())
    }

    fn driven_body(&self) -> Option<Body> {
        let id = self.driven.as_deref()?;
        self.physics.read().get(id).copied()
    }

    /// Advance the simulation to `now`, keep the camera on the driven entity,
    /// resend when due and collect confirmations.
    pub fn tick(&mut self, now: Instant) -> StepPlan {
        if self.stream.as_ref().is_some_and(SyncHandle::is_closed) {
            warn!(entity_id = ?self.driven, "Sync stream dropped by server");
            self.stream = None;
        }

        let plan = self.sim.advance(now, &mut self.physics.write());

        if let Some(body) = self.driven_body() {
            self.camera.follow(body.position, body.moving && !body.arrived());
        }
        if self.resync_due(now) {
            self.send_update(now);
        }
        self.drain_confirmations();
        plan
    }

    pub fn resync_due(&self, now: Instant) -> bool {
        self.stream.is_some()
            && self
                .last_sync
                .map_or(true, |last| now.saturating_duration_since(last) >= RESYNC_INTERVAL)
    }

    fn send_update(&mut self, now: Instant) {
        let (Some(id), Some(body)) = (self.driven.clone(), self.driven_body()) else {
            return;
        };
        self.last_sync = Some(now);

        let Some(stream) = &self.stream else {
            return;
        };
        let frame = ClientFrame::update(id, body.position, body.target, Some(body.moving));
        if let Err(e) = stream.send(&frame) {
            warn!(entity_id = %frame.entity_id, error = %e, "Sync update not sent");
        }
    }

    /// Store confirmations for display. The physics table is not touched.
    pub fn drain_confirmations(&mut self) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };
        let mut received = 0;
        while let Some(frame) = stream.try_confirmation() {
            self.observed.insert(frame.entity_id.clone(), frame);
            received += 1;
        }
        received
    }

    pub fn apply_intents(&mut self, intents: Vec<Intent>) {
        let Some(id) = self.driven.clone() else {
            return;
        };

        let mut changed = false;
        for intent in intents {
            match intent {
                Intent::SetTarget(target) => {
                    let mut table = self.physics.write();
                    changed |= table.set_target(&id, target) && table.set_moving(&id, true);
                }
                Intent::Freeze => {
                    changed |= self.physics.write().set_moving(&id, false);
                }
                Intent::Resume => {
                    let mut table = self.physics.write();
                    if table.get(&id).is_some_and(|b| b.target.is_some()) {
                        changed |= table.set_moving(&id, true);
                    }
                }
                Intent::Harvest(resource_id) => self.harvest_locally(resource_id),
            }
        }

        if changed {
            self.send_update(Instant::now());
        }
    }

    fn harvest_locally(&mut self, resource_id: ResourceId) {
        let Some(resource) = self.resources.iter_mut().find(|r| r.id == resource_id) else {
            return;
        };
        if self.inventory.apply(resource) {
            debug!(resource_id = %resource_id, "Harvested locally");
            self.pending_harvests.push(resource_id);
        }
    }

    /// Send queued harvests to the server. Failures are logged and dropped.
    pub async fn flush_harvests(&mut self, api: &ApiClient) -> Vec<HarvestOutcome> {
        let Some(entity_id) = self.driven.clone() else {
            return Vec::new();
        };

        let mut outcomes = Vec::new();
        for resource_id in std::mem::take(&mut self.pending_harvests) {
            match api.harvest(&resource_id, &entity_id).await {
                Ok(outcome) => {
                    self.inventory.reconcile(outcome.resource_type, outcome.count);
                    outcomes.push(outcome);
                }
                Err(e) => warn!(resource_id = %resource_id, error = %e, "Harvest not registered"),
            }
        }
        outcomes
    }

    fn scene_entity(&self) -> Option<Vec2> {
        self.driven_body().map(|b| b.position)
    }

    pub fn pointer_move(&mut self, screen: Vec2) {
        let entity = self.scene_entity();
        let scene = Scene {
            entity,
            resources: &self.resources,
        };
        let intents = self.input.pointer_move(&mut self.camera, screen, &scene);
        self.apply_intents(intents);
    }

    pub fn pointer_down(&mut self, screen: Vec2) {
        let entity = self.scene_entity();
        let scene = Scene {
            entity,
            resources: &self.resources,
        };
        let intents = self.input.pointer_down(&mut self.camera, screen, &scene);
        self.apply_intents(intents);
    }

    pub fn pointer_up(&mut self, screen: Vec2) {
        let entity = self.scene_entity();
        let scene = Scene {
            entity,
            resources: &self.resources,
        };
        let intents = self.input.pointer_up(&mut self.camera, screen, &scene);
        self.apply_intents(intents);
    }

    pub fn touch_start(&mut self, touches: &[Vec2]) {
        let entity = self.scene_entity();
        let scene = Scene {
            entity,
            resources: &self.resources,
        };
        let intents = self.input.touch_start(&mut self.camera, touches, &scene);
        self.apply_intents(intents);
    }

    pub fn touch_move(&mut self, touches: &[Vec2]) {
        let entity = self.scene_entity();
        let scene = Scene {
            entity,
            resources: &self.resources,
        };
        let intents = self.input.touch_move(&mut self.camera, touches, &scene);
        self.apply_intents(intents);
    }

    pub fn touch_end(&mut self, remaining: &[Vec2], lifted: Vec2) {
        let entity = self.scene_entity();
        let scene = Scene {
            entity,
            resources: &self.resources,
        };
        let intents = self.input.touch_end(&mut self.camera, remaining, lifted, &scene);
        self.apply_intents(intents);
    }

    pub fn wheel(&mut self, screen: Vec2, delta_y: f64) {
        self.input.wheel(&mut self.camera, screen, delta_y);
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.camera.resize(viewport);
    }

    /// Close the stream; local state stays for rendering
    pub async fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ClientSession {
        let mut session = ClientSession::new(
            "ws://127.0.0.1:1/ws",
            "token",
            Viewport::new(800.0, 800.0),
            WorldBounds::default(),
        );
        session.track(&ServerFrame {
            entity_id: "e1".into(),
            position: Vec2::ZERO,
            target: None,
            moving: false,
        });
        session.set_resources(vec![ResourceView {
            id: "r1".into(),
            resource_type: 3,
            position: Vec2::new(2.0, 0.0),
            harvested: false,
        }]);
        session
    }

    #[tokio::test(start_paused = true)]
    async fn click_walks_entity_and_camera_recenters_on_arrival() {
        let mut session = session();
        let start = Instant::now();
        session.tick(start);

        // 1m left of the entity
        session.pointer_down(Vec2::new(300.0, 400.0));
        session.pointer_up(Vec2::new(300.0, 400.0));
        assert_eq!(
            session.physics().read().get("e1").unwrap().target,
            Some(Vec2::new(-1.0, 0.0))
        );

        session.tick(start + Duration::from_millis(100));
        assert_eq!(session.camera().target, Vec2::ZERO);

        for step in 2..=5 {
            session.tick(start + Duration::from_millis(100 * step));
        }
        let position = session.physics().read().position("e1").unwrap();
        assert_eq!(position, Vec2::new(-1.0, 0.0));
        assert_eq!(session.camera().target, Vec2::new(-1.0, 0.0));
    }

    #[tokio::test]
    async fn hover_freezes_and_resumes() {
        let mut session = session();
        session.apply_intents(vec![Intent::SetTarget(Vec2::new(5.0, 0.0))]);
        assert!(session.physics().read().get("e1").unwrap().moving);

        session.pointer_move(Vec2::new(402.0, 400.0));
        assert!(!session.physics().read().get("e1").unwrap().moving);

        session.pointer_move(Vec2::new(400.0, 100.0));
        assert!(session.physics().read().get("e1").unwrap().moving);
    }

    #[tokio::test]
    async fn harvest_is_local_then_queued_once() {
        let mut session = session();
        session.apply_intents(vec![Intent::Harvest("r1".into())]);
        session.apply_intents(vec![Intent::Harvest("r1".into())]);

        assert_eq!(session.inventory().count(3), 1);
        assert!(session.resources()[0].harvested);
        assert_eq!(session.pending_harvests(), ["r1".to_string()]);
    }

    #[tokio::test]
    async fn no_resync_without_stream() {
        let session = session();
        assert!(!session.is_streaming());
        assert!(!session.resync_due(Instant::now()));
    }
}
