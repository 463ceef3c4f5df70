//! Pointer and touch gestures mapped to entity intents and camera moves

use tracing::debug;

use crate::client::camera::Camera;
use crate::client::harvest::{find_harvestable, resource_at};
use crate::wire::ResourceView;
use crate::world::{ResourceId, Vec2};

/// Pointer distance in pixels that counts as hovering the local entity
pub const HOVER_RADIUS_PX: f64 = 20.0;

/// Movement in pixels past which a press is a drag, not a click
pub const CLICK_SLOP_PX: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    FollowingPointer,
    HoveringSelf,
    DraggingCamera,
    PinchZooming,
}

/// What the session should do to the local entity
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SetTarget(Vec2),
    /// Stop walking while the pointer inspects the entity
    Freeze,
    Resume,
    Harvest(ResourceId),
}

/// What the controller needs to know about the scene under the pointer
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    /// Physical position of the local entity
    pub entity: Option<Vec2>,
    pub resources: &'a [ResourceView],
}

#[derive(Debug, Clone, Copy)]
struct Press {
    origin: Vec2,
    dragged: bool,
}

#[derive(Debug, Clone)]
pub struct InteractionController {
    state: InteractionState,
    follow: bool,
    press: Option<Press>,
}

impl InteractionController {
    pub fn new() -> Self {
        Self {
            state: InteractionState::Idle,
            follow: false,
            press: None,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn follow_enabled(&self) -> bool {
        self.follow
    }

    pub fn set_follow(&mut self, enabled: bool) {
        self.follow = enabled;
        match self.state {
            InteractionState::Idle | InteractionState::FollowingPointer => {
                self.state = self.resting_state();
            }
            _ => {}
        }
    }

    fn resting_state(&self) -> InteractionState {
        if self.follow {
            InteractionState::FollowingPointer
        } else {
            InteractionState::Idle
        }
    }

    fn over_self(camera: &Camera, screen: Vec2, scene: &Scene<'_>) -> bool {
        scene
            .entity
            .is_some_and(|p| camera.world_to_screen(p).distance(screen) <= HOVER_RADIUS_PX)
    }

    pub fn pointer_move(&mut self, camera: &mut Camera, screen: Vec2, scene: &Scene<'_>) -> Vec<Intent> {
        match self.state {
            InteractionState::PinchZooming => Vec::new(),
            InteractionState::DraggingCamera => {
                self.track_press(screen);
                camera.on_drag_move(screen);
                Vec::new()
            }
            _ if self.press.is_some() => {
                // Pressed on the entity or a resource; no hover changes until release
                self.track_press(screen);
                Vec::new()
            }
            _ => self.hover(camera, screen, scene),
        }
    }

    fn hover(&mut self, camera: &Camera, screen: Vec2, scene: &Scene<'_>) -> Vec<Intent> {
        let mut intents = Vec::new();

        if Self::over_self(camera, screen, scene) {
            if self.state != InteractionState::HoveringSelf {
                self.state = InteractionState::HoveringSelf;
                intents.push(Intent::Freeze);
            }
            return intents;
        }

        if self.state == InteractionState::HoveringSelf {
            intents.push(Intent::Resume);
        }
        self.state = self.resting_state();
        if self.follow {
            intents.push(Intent::SetTarget(camera.screen_to_world(screen)));
        }
        intents
    }

    pub fn pointer_down(&mut self, camera: &mut Camera, screen: Vec2, scene: &Scene<'_>) -> Vec<Intent> {
        if self.state == InteractionState::PinchZooming {
            return Vec::new();
        }

        self.press = Some(Press {
            origin: screen,
            dragged: false,
        });

        let on_element = Self::over_self(camera, screen, scene)
            || resource_at(scene.resources, camera, screen).is_some();
        if !on_element {
            self.state = InteractionState::DraggingCamera;
            camera.on_drag_start(screen);
        }
        Vec::new()
    }

    pub fn pointer_up(&mut self, camera: &mut Camera, screen: Vec2, scene: &Scene<'_>) -> Vec<Intent> {
        let Some(press) = self.press.take() else {
            return Vec::new();
        };

        if self.state == InteractionState::DraggingCamera {
            camera.on_drag_end();
            self.state = self.resting_state();
        }

        if press.dragged || press.origin.distance(screen) > CLICK_SLOP_PX {
            return Vec::new();
        }
        self.click(camera, screen, scene)
    }

    fn track_press(&mut self, screen: Vec2) {
        if let Some(press) = self.press.as_mut() {
            if press.origin.distance(screen) > CLICK_SLOP_PX {
                press.dragged = true;
            }
        }
    }

    fn click(&self, camera: &Camera, screen: Vec2, scene: &Scene<'_>) -> Vec<Intent> {
        let Some(entity) = scene.entity else {
            return Vec::new();
        };

        if let Some(resource) = find_harvestable(scene.resources, camera, screen, entity) {
            return vec![Intent::Harvest(resource.id.clone())];
        }
        if Self::over_self(camera, screen, scene) {
            return Vec::new();
        }
        if self.follow {
            // Target already tracks the pointer
            return Vec::new();
        }

        let world = camera.screen_to_world(screen);
        debug!(x = world.x, y = world.y, "Click sets target");
        vec![Intent::SetTarget(world)]
    }

    pub fn touch_start(&mut self, camera: &mut Camera, touches: &[Vec2], scene: &Scene<'_>) -> Vec<Intent> {
        match touches {
            [] => Vec::new(),
            [single] => self.pointer_down(camera, *single, scene),
            [a, b, ..] => {
                if self.state == InteractionState::DraggingCamera {
                    camera.on_drag_end();
                }
                self.press = None;
                self.state = InteractionState::PinchZooming;
                camera.on_pinch_start(*a, *b);
                Vec::new()
            }
        }
    }

    pub fn touch_move(&mut self, camera: &mut Camera, touches: &[Vec2], scene: &Scene<'_>) -> Vec<Intent> {
        match (self.state, touches) {
            (InteractionState::PinchZooming, [a, b, ..]) => {
                camera.on_pinch_move(*a, *b);
                Vec::new()
            }
            (InteractionState::PinchZooming, _) => Vec::new(),
            (_, [single]) if self.press.is_some() => self.pointer_move(camera, *single, scene),
            _ => Vec::new(),
        }
    }

    /// `remaining` are the touches still down; `lifted` is where the finger left
    pub fn touch_end(
        &mut self,
        camera: &mut Camera,
        remaining: &[Vec2],
        lifted: Vec2,
        scene: &Scene<'_>,
    ) -> Vec<Intent> {
        if self.state == InteractionState::PinchZooming {
            if remaining.len() < 2 {
                camera.on_pinch_end();
                self.state = self.resting_state();
            }
            return Vec::new();
        }
        self.pointer_up(camera, lifted, scene)
    }

    pub fn wheel(&mut self, camera: &mut Camera, screen: Vec2, delta_y: f64) {
        camera.on_wheel(screen, delta_y);
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}
