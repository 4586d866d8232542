//! Rigid-body physics via [Rapier](https://rapier.rs).
//!
//! [`PhysicsWorld`] works in screen pixels with y pointing down, so body
//! positions can be handed straight to [`Sprite::set_position`](crate::sprite::Sprite::set_position).
//! Bodies are described with [`BodyDesc`] and addressed by [`BodyHandle`].
//!
//! ```ignore
//! let mut world = PhysicsWorld::new().with_bounds(640.0, 480.0);
//! let ball = world.add_body(BodyDesc::circle(320.0, 0.0, 16.0).bounce(0.6));
//! world.update(time.delta_secs());
//! if let Some(p) = world.position(ball) {
//!     sprite.set_position(p.x, p.y);
//! }
//! ```

use rapier2d::prelude::*;

/// Default gravity in pixels per second squared, pointing down the screen.
pub const GRAVITY: f32 = 500.0;

/// Thickness of the walls added by [`PhysicsWorld::with_bounds`].
const WALL_THICKNESS: f32 = 100.0;

/// Below this kinetic energy a body counts as resting.
const REST_ENERGY: f32 = 1.0;

/// Handle to a body in a [`PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Circle { radius: f32 },
    Rect { width: f32, height: f32 },
}

/// Description of a body to add.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    x: f32,
    y: f32,
    shape: Shape,
    bounce: f32,
    friction: f32,
    mass: f32,
    fixed: bool,
}

impl BodyDesc {
    /// A circle centered at `(x, y)`.
    pub fn circle(x: f32, y: f32, radius: f32) -> Self {
        Self {
            x,
            y,
            shape: Shape::Circle { radius },
            bounce: 0.0,
            friction: 0.5,
            mass: 1.0,
            fixed: false,
        }
    }

    /// A `width` × `height` box centered at `(x, y)`.
    pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            shape: Shape::Rect { width, height },
            ..Self::circle(x, y, 0.0)
        }
    }

    /// Restitution, 0 (dead) to 1 (perfectly elastic).
    pub fn bounce(mut self, bounce: f32) -> Self {
        self.bounce = bounce;
        self
    }

    pub fn friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// A body that never moves, e.g. a platform.
    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    fn collider(&self) -> ColliderBuilder {
        let builder = match self.shape {
            Shape::Circle { radius } => ColliderBuilder::ball(radius),
            Shape::Rect { width, height } => ColliderBuilder::cuboid(width / 2.0, height / 2.0),
        };
        builder.restitution(self.bounce).friction(self.friction)
    }
}

/// A 2D physics simulation stepped at a fixed rate.
pub struct PhysicsWorld {
    gravity: Vec2,
    pipeline: PhysicsPipeline,
    params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    walls: Vec<RigidBodyHandle>,
    accumulator: f32,
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("gravity", &self.gravity)
            .field("bodies", &self.bodies.len())
            .field("walls", &self.walls.len())
            .finish()
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// An empty world with [`GRAVITY`] and a 1/60 s step.
    pub fn new() -> Self {
        let mut params = IntegrationParameters::default();
        // Pixels, not meters.
        params.length_unit = 100.0;
        Self {
            gravity: Vec2::new(0.0, GRAVITY),
            pipeline: PhysicsPipeline::new(),
            params,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            walls: Vec::new(),
            accumulator: 0.0,
        }
    }

    pub fn with_gravity(mut self, x: f32, y: f32) -> Self {
        self.gravity = Vec2::new(x, y);
        self
    }

    /// Enclose a `width` × `height` screen with a floor and side walls. The
    /// top is open so bodies can be dropped in.
    pub fn with_bounds(mut self, width: f32, height: f32) -> Self {
        let t = WALL_THICKNESS;
        let walls = [
            (width / 2.0, height + t / 2.0, width / 2.0, t / 2.0),
            (-t / 2.0, height / 2.0, t / 2.0, height / 2.0),
            (width + t / 2.0, height / 2.0, t / 2.0, height / 2.0),
        ];
        for (x, y, hx, hy) in walls {
            let body = RigidBodyBuilder::fixed().translation(Vec2::new(x, y)).build();
            let handle = self.bodies.insert(body);
            let collider = ColliderBuilder::cuboid(hx, hy)
                .restitution(0.8)
                .friction(0.5)
                .build();
            self.colliders
                .insert_with_parent(collider, handle, &mut self.bodies);
            self.walls.push(handle);
        }
        self
    }

    pub fn add_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let kind = if desc.fixed {
            RigidBodyType::Fixed
        } else {
            RigidBodyType::Dynamic
        };
        let body = RigidBodyBuilder::new(kind)
            .translation(Vec2::new(desc.x, desc.y))
            .build();
        let handle = self.bodies.insert(body);
        let collider = desc.collider().mass(desc.mass.max(f32::EPSILON)).build();
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        log::debug!("Added {:?} body at ({}, {})", desc.shape, desc.x, desc.y);
        BodyHandle(handle)
    }

    pub fn remove_body(&mut self, body: BodyHandle) -> bool {
        self.bodies
            .remove(
                body.0,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    /// Number of bodies added with [`add_body`](Self::add_body).
    pub fn body_count(&self) -> usize {
        self.bodies.len() - self.walls.len()
    }

    /// Push on a body with a force in pixel units. Forces last until the
    /// next [`update`](Self::update) finishes.
    pub fn apply_force(&mut self, body: BodyHandle, x: f32, y: f32) {
        if let Some(b) = self.bodies.get_mut(body.0) {
            b.add_force(Vec2::new(x, y), true);
        }
    }

    /// Advance by `delta` seconds in fixed steps. Leftover time carries over
    /// to the next call; a long frame is capped at 0.25 s.
    pub fn update(&mut self, delta: f32) {
        if delta <= 0.0 {
            return;
        }
        self.accumulator += delta.min(0.25);

        let fixed_dt = self.params.dt;
        let mut stepped = false;
        while self.accumulator >= fixed_dt {
            self.pipeline.step(
                self.gravity,
                &self.params,
                &mut self.islands,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                &(),
                &(),
            );
            self.accumulator -= fixed_dt;
            stepped = true;
        }

        if stepped {
            for (_, body) in self.bodies.iter_mut() {
                body.reset_forces(false);
            }
        }
    }

    /// Center of the body in pixels.
    pub fn position(&self, body: BodyHandle) -> Option<crate::math::Vec2> {
        let p = self.bodies.get(body.0)?.translation();
        Some(crate::math::Vec2::new(p.x, p.y))
    }

    /// Radians.
    pub fn rotation(&self, body: BodyHandle) -> Option<f32> {
        Some(self.bodies.get(body.0)?.rotation().angle())
    }

    /// Asleep, or moving with less than a unit of kinetic energy.
    pub fn is_resting(&self, body: BodyHandle) -> bool {
        self.bodies
            .get(body.0)
            .is_some_and(|b| b.is_sleeping() || b.kinetic_energy() < REST_ENERGY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(world: &mut PhysicsWorld, seconds: f32) {
        let steps = (seconds * 60.0) as usize;
        for _ in 0..steps {
            world.update(1.0 / 60.0);
        }
    }

    #[test]
    fn bodies_fall_down_the_screen() {
        let mut world = PhysicsWorld::new();
        let ball = world.add_body(BodyDesc::circle(100.0, 0.0, 8.0));
        run(&mut world, 0.5);
        let p = world.position(ball).unwrap();
        assert!(p.y > 10.0, "y = {}", p.y);
        assert_eq!(p.x, 100.0);
    }

    #[test]
    fn fixed_bodies_stay_put() {
        let mut world = PhysicsWorld::new();
        let platform = world.add_body(BodyDesc::rect(50.0, 50.0, 100.0, 10.0).fixed());
        run(&mut world, 0.5);
        assert_eq!(world.position(platform).unwrap(), crate::math::Vec2::new(50.0, 50.0));
        assert!(world.is_resting(platform));
    }

    #[test]
    fn tiny_deltas_accumulate_before_stepping() {
        let mut world = PhysicsWorld::new();
        let ball = world.add_body(BodyDesc::circle(0.0, 0.0, 4.0));
        world.update(0.001);
        assert_eq!(world.position(ball).unwrap().y, 0.0);
        for _ in 0..20 {
            world.update(0.001);
        }
        assert!(world.position(ball).unwrap().y > 0.0);
    }

    #[test]
    fn floor_stops_a_dropped_ball() {
        let mut world = PhysicsWorld::new().with_bounds(640.0, 480.0);
        let ball = world.add_body(BodyDesc::circle(320.0, 100.0, 16.0));
        run(&mut world, 10.0);
        let p = world.position(ball).unwrap();
        assert!(p.y < 480.0 && p.y > 400.0, "y = {}", p.y);
        assert!(world.is_resting(ball));
    }

    #[test]
    fn force_pushes_sideways() {
        let mut world = PhysicsWorld::new().with_gravity(0.0, 0.0);
        let ball = world.add_body(BodyDesc::circle(0.0, 0.0, 4.0));
        world.apply_force(ball, 600.0, 0.0);
        world.update(1.0 / 60.0);
        let after_push = world.position(ball).unwrap().x;
        assert!(after_push > 0.0);
        run(&mut world, 0.5);
        assert!(world.position(ball).unwrap().x > after_push);
    }

    #[test]
    fn removed_bodies_are_gone() {
        let mut world = PhysicsWorld::new().with_bounds(100.0, 100.0);
        let ball = world.add_body(BodyDesc::circle(50.0, 50.0, 4.0));
        assert_eq!(world.body_count(), 1);
        assert!(world.remove_body(ball));
        assert!(!world.remove_body(ball));
        assert_eq!(world.body_count(), 0);
        assert!(world.position(ball).is_none());
        assert!(!world.is_resting(ball));
    }
}
