//! Render target — draw into an image, then draw the image.
//!
//! Paints a small scene into a 256×256 target every frame and shows it three
//! times: plain, spinning, and additively blended.

use sprig::prelude::*;

fn main() -> Result<(), GameError> {
    Game::new("sprig — render target")
        .size(800, 600)
        .screen("target", TargetDemo::default())
        .start("target")
        .run()
}

#[derive(Default)]
struct TargetDemo {
    target: Option<ImageHandle>,
    angle: f32,
}

impl Screen for TargetDemo {
    fn load(&mut self, engine: &mut Engine) {
        match engine.renderer.create_image(256, 256) {
            Ok(target) => self.target = Some(target),
            Err(e) => {
                log::error!("No render target: {e}");
                engine.quit();
            }
        }
    }

    fn unload(&mut self, engine: &mut Engine) {
        if let Some(target) = self.target.take() {
            engine.renderer.unload_image(target);
        }
    }

    fn update(&mut self, engine: &mut Engine, delta: f32) {
        self.angle += delta;
        if engine.keyboard.key_hit(KeyCode::Escape) {
            engine.quit();
        }
    }

    fn render(&mut self, engine: &mut Engine) {
        let Some(target) = self.target else {
            return;
        };
        let r = &mut engine.renderer;

        if let Err(e) = r.set_target(Some(target)) {
            log::warn!("set_target failed: {e}");
            return;
        }
        r.set_clear_color(40, 40, 40);
        r.cls();
        for i in 0..8 {
            let t = self.angle + i as f32 * 0.8;
            r.set_draw_color(255, (i * 30) as u8, 255 - (i * 30) as u8);
            r.draw_rect(128.0 + t.cos() * 90.0 - 12.0, 128.0 + t.sin() * 90.0 - 12.0, 24.0, 24.0);
        }
        if let Err(e) = r.set_target(None) {
            log::warn!("releasing target failed: {e}");
        }

        r.set_clear_color(100, 100, 200);
        r.set_draw_color(255, 255, 255);
        r.draw_image(target, 20.0, 20.0);

        r.set_offset(-0.5, -0.5);
        r.set_rotation(self.angle * 0.5);
        r.draw_image(target, 400.0, 300.0);
        r.set_rotation(0.0);

        r.set_blend(BlendMode::Light);
        r.set_scale(0.75, 0.75);
        r.draw_image(target, 650.0, 450.0);
        r.set_scale(1.0, 1.0);
        r.set_blend(BlendMode::Alpha);
        r.set_offset(0.0, 0.0);
    }
}
