//! Audio — channel playback.
//!
//! Expects `assets/blip.ogg` and `assets/music.ogg`. Keys:
//!
//! - `1`: blip once on channel 0
//! - `2`: blip three times on channel 0
//! - `M`: loop the music on channel 1, `P` pauses/resumes it
//! - Up/Down: channel 1 volume
//!
//! Run with `cargo run --example audio --features audio`.

use sprig::prelude::*;

fn main() -> Result<(), GameError> {
    Game::new("sprig — audio")
        .size(320, 240)
        .search_path("assets")
        .screen("audio", AudioDemo::default())
        .start("audio")
        .run()
}

#[derive(Default)]
struct AudioDemo {
    blip: Option<Sound>,
    music: Option<Sound>,
    volume: f32,
}

impl Screen for AudioDemo {
    fn load(&mut self, engine: &mut Engine) {
        self.volume = 1.0;
        let Some(audio) = engine.audio.as_ref() else {
            log::error!("No audio output");
            return;
        };
        for (slot, path) in [(&mut self.blip, "blip.ogg"), (&mut self.music, "music.ogg")] {
            match audio.load_sound(&engine.files, path) {
                Ok(sound) => *slot = Some(sound),
                Err(e) => log::warn!("{path}: {e}"),
            }
        }
    }

    fn update(&mut self, engine: &mut Engine, _delta: f32) {
        if engine.keyboard.key_hit(KeyCode::Escape) {
            engine.quit();
        }
        let Some(audio) = engine.audio.as_mut() else {
            return;
        };
        let kb = &engine.keyboard;

        if let Some(blip) = &self.blip {
            let loops = if kb.key_hit(KeyCode::Digit1) {
                Some(0)
            } else if kb.key_hit(KeyCode::Digit2) {
                Some(2)
            } else {
                None
            };
            if let Some(loops) = loops {
                if let Err(e) = audio.play_sound(blip, 0, loops) {
                    log::warn!("{e}");
                }
            }
        }

        if let Some(music) = &self.music {
            if kb.key_hit(KeyCode::KeyM) {
                if let Err(e) = audio.play_sound(music, 1, -1) {
                    log::warn!("{e}");
                }
            }
        }
        if kb.key_hit(KeyCode::KeyP) {
            if audio.channel_paused(1) {
                audio.resume_channel(1);
            } else {
                audio.pause_channel(1);
            }
        }
        if kb.key_hit(KeyCode::ArrowUp) || kb.key_hit(KeyCode::ArrowDown) {
            let step = if kb.key_hit(KeyCode::ArrowUp) { 0.1 } else { -0.1 };
            self.volume = (self.volume + step).clamp(0.0, 1.0);
            audio.set_channel_volume(1, self.volume);
        }
    }

    fn render(&mut self, engine: &mut Engine) {
        let r = &mut engine.renderer;
        let playing = engine.audio.as_ref().is_some_and(|a| a.channel_playing(1));
        if playing {
            r.set_draw_color(80, 220, 120);
        } else {
            r.set_draw_color(120, 120, 120);
        }
        r.draw_rect(20.0, 100.0, 280.0 * self.volume, 40.0);
        r.set_draw_color(255, 255, 255);
    }

    fn unload(&mut self, engine: &mut Engine) {
        if let Some(audio) = engine.audio.as_mut() {
            audio.stop_all();
        }
    }
}
