//! Physics — balls and crates dropped into a walled screen.
//!
//! Left click drops a ball at the cursor, right click a crate. Space kicks
//! everything upward. Bodies turn grey once they come to rest.
//!
//! Run with `cargo run --example physics --features physics`.

use sprig::prelude::*;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn main() -> Result<(), GameError> {
    Game::new("sprig — physics")
        .size(WIDTH, HEIGHT)
        .screen("physics", Pit::default())
        .start("physics")
        .run()
}

enum Kind {
    Ball(f32),
    Crate(f32),
}

#[derive(Default)]
struct Pit {
    world: Option<PhysicsWorld>,
    bodies: Vec<(BodyHandle, Kind)>,
}

impl Screen for Pit {
    fn load(&mut self, _engine: &mut Engine) {
        let mut world = PhysicsWorld::new().with_bounds(WIDTH as f32, HEIGHT as f32);
        world.add_body(BodyDesc::rect(320.0, 360.0, 200.0, 16.0).fixed());
        self.world = Some(world);
    }

    fn unload(&mut self, _engine: &mut Engine) {
        self.world = None;
        self.bodies.clear();
    }

    fn update(&mut self, engine: &mut Engine, delta: f32) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        let (x, y) = (engine.mouse.x(), engine.mouse.y());

        if engine.mouse.button_hit(MouseButton::Left) {
            let body = world.add_body(BodyDesc::circle(x, y, 12.0).bounce(0.5));
            self.bodies.push((body, Kind::Ball(12.0)));
        }
        if engine.mouse.button_hit(MouseButton::Right) {
            let body = world.add_body(BodyDesc::rect(x, y, 28.0, 28.0).friction(0.8).mass(2.0));
            self.bodies.push((body, Kind::Crate(28.0)));
        }
        if engine.keyboard.key_hit(KeyCode::Space) {
            for (body, _) in &self.bodies {
                world.apply_force(*body, 0.0, -40_000.0);
            }
        }
        if engine.keyboard.key_hit(KeyCode::Escape) {
            engine.quit();
        }

        world.update(delta);
    }

    fn render(&mut self, engine: &mut Engine) {
        let Some(world) = self.world.as_ref() else {
            return;
        };
        let r = &mut engine.renderer;
        r.set_offset(-0.5, -0.5);

        r.set_draw_color(90, 60, 30);
        r.draw_rect(320.0, 360.0, 200.0, 16.0);

        for (body, kind) in &self.bodies {
            let (Some(p), Some(angle)) = (world.position(*body), world.rotation(*body)) else {
                continue;
            };
            if world.is_resting(*body) {
                r.set_draw_color(150, 150, 150);
            } else {
                r.set_draw_color(240, 200, 60);
            }
            r.set_rotation(angle);
            let size = match kind {
                Kind::Ball(radius) => radius * 2.0,
                Kind::Crate(side) => *side,
            };
            r.draw_rect(p.x, p.y, size, size);
        }

        r.set_rotation(0.0);
        r.set_offset(0.0, 0.0);
        r.set_draw_color(255, 255, 255);
    }
}
