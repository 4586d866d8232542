//! Sprites — animated sprites on two layers.
//!
//! Builds a four-frame sprite sheet in memory, scatters animated sprites over
//! the screen and bounces them off the edges. Space re-sorts the base layer
//! by z; Escape quits.

use sprig::prelude::*;

const FRAME: u32 = 32;
const FRAMES: u32 = 4;

fn main() -> Result<(), GameError> {
    Game::new("sprig — sprites")
        .size(640, 480)
        .clear_color(20, 20, 30)
        .screen("sprites", Sprites::default())
        .start("sprites")
        .run()
}

/// A strip of `FRAMES` squares that shrink from frame to frame.
fn sheet_pixels() -> Vec<u8> {
    let width = FRAME * FRAMES;
    let mut pixels = vec![0u8; (width * FRAME * 4) as usize];
    for y in 0..FRAME {
        for x in 0..width {
            let frame = x / FRAME;
            let (lx, ly) = (x % FRAME, y);
            let inset = frame * 3;
            let inside = lx >= inset && lx < FRAME - inset && ly >= inset && ly < FRAME - inset;
            if inside {
                let i = ((y * width + x) * 4) as usize;
                pixels[i..i + 4].copy_from_slice(&[255, 200 - frame as u8 * 40, 80, 255]);
            }
        }
    }
    pixels
}

#[derive(Default)]
struct Sprites {
    sheet: Option<ImageHandle>,
    layers: SpriteManager,
}

impl Screen for Sprites {
    fn load(&mut self, engine: &mut Engine) {
        let sheet = match engine.renderer.create_image_from_pixels(
            "sheet",
            FRAME * FRAMES,
            FRAME,
            sheet_pixels(),
            Some((FRAME, FRAME)),
        ) {
            Ok(sheet) => sheet,
            Err(e) => {
                log::error!("Could not build sprite sheet: {e}");
                engine.quit();
                return;
            }
        };

        self.layers.add_layer("front");
        for i in 0..40 {
            let x = (i * 53 % 600) as f32;
            let y = (i * 97 % 440) as f32;
            let mut sprite = Sprite::new(sheet, (FRAME, FRAME), x, y)
                .with_z(i % 5)
                .with_animation(Animation::new(0, FRAMES - 1, 80 + (i as u64 % 4) * 40));
            sprite.set_velocity(((i % 7) as f32 - 3.0) * 30.0, ((i % 5) as f32 - 2.0) * 40.0);
            sprite.set_offset(-0.5, -0.5);
            let layer = if i % 4 == 0 { "front" } else { BASE_LAYER };
            if i % 4 == 0 {
                sprite.set_scale(2.0, 2.0);
                sprite.set_alpha(0.7);
            }
            let _ = self.layers.add_sprite(layer, sprite);
        }
        self.sheet = Some(sheet);
    }

    fn unload(&mut self, engine: &mut Engine) {
        if let Some(sheet) = self.sheet.take() {
            engine.renderer.unload_image(sheet);
        }
    }

    fn update(&mut self, engine: &mut Engine, delta: f32) {
        if engine.keyboard.key_hit(KeyCode::Escape) {
            engine.quit();
        }
        if engine.keyboard.key_hit(KeyCode::Space) {
            self.layers.sort_layer(BASE_LAYER);
        }

        self.layers.update_all(delta);
        for name in ["base", "front"] {
            let Some(sprites) = self.layers.layer_mut(name) else {
                continue;
            };
            for sprite in sprites.iter_mut() {
                let (x, y) = (sprite.x(), sprite.y());
                let v = sprite.velocity();
                let vx = if (x < 0.0 && v.x < 0.0) || (x > 640.0 && v.x > 0.0) { -v.x } else { v.x };
                let vy = if (y < 0.0 && v.y < 0.0) || (y > 480.0 && v.y > 0.0) { -v.y } else { v.y };
                sprite.set_velocity(vx, vy);
                sprite.rotate(delta);
            }
        }
    }

    fn render(&mut self, engine: &mut Engine) {
        self.layers.render_all(&mut engine.renderer);
    }
}
