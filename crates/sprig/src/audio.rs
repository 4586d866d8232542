//! Channel-based sound playback via [kira](https://docs.rs/kira).
//!
//! [`AudioPlayer`] owns a fixed bank of channels. Playing a sound on a channel
//! replaces whatever that channel was playing, so a game can reserve channels
//! for music, voice and effects and address them by number.
//!
//! ```ignore
//! let mut audio = AudioPlayer::new()?;
//! let blip = audio.load_sound(&files, "blip.ogg")?;
//! audio.play_sound(&blip, 0, 0)?;      // once
//! audio.play_sound(&music, 1, -1)?;    // forever
//! audio.update();                      // once per frame
//! ```

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use kira::sound::PlaybackState;
use kira::sound::static_sound::{StaticSoundData, StaticSoundHandle};
use kira::{AudioManager, AudioManagerSettings, Decibels, DefaultBackend, Tween};

use crate::fs::{FileManager, FsError};

/// Channels allocated by [`AudioPlayer::new`].
pub const DEFAULT_CHANNELS: usize = 16;

/// Steps in the channel volume scale.
pub const MAX_VOLUME: u8 = 128;

fn amplitude_to_db(amplitude: f64) -> Decibels {
    if amplitude <= 0.0 {
        Decibels::SILENCE
    } else {
        Decibels((20.0 * amplitude.log10()) as f32)
    }
}

/// Quantise a 0.0–1.0 volume onto the 0–[`MAX_VOLUME`] scale.
fn volume_steps(volume: f32) -> u8 {
    (volume.clamp(0.0, 1.0) * MAX_VOLUME as f32) as u8
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors that can occur in the audio system.
#[derive(Debug)]
pub enum AudioError {
    /// Failed to initialize the audio backend.
    BackendInit(String),
    /// Failed to read or decode a sound file.
    Load(String),
    /// Failed to play a sound.
    Play(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::BackendInit(e) => write!(f, "audio backend init failed: {e}"),
            AudioError::Load(e) => write!(f, "audio load failed: {e}"),
            AudioError::Play(e) => write!(f, "audio play failed: {e}"),
        }
    }
}

impl std::error::Error for AudioError {}

impl From<FsError> for AudioError {
    fn from(e: FsError) -> Self {
        AudioError::Load(e.to_string())
    }
}

// ── Sound ───────────────────────────────────────────────────────────────

/// Decoded audio data, cheap to clone (shared via `Arc` internally).
#[derive(Clone)]
pub struct Sound {
    inner: StaticSoundData,
}

impl Sound {
    /// Decode an encoded sound (OGG, MP3, WAV, FLAC) held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AudioError> {
        let inner = StaticSoundData::from_cursor(Cursor::new(bytes))
            .map_err(|e| AudioError::Load(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn duration(&self) -> std::time::Duration {
        self.inner.duration()
    }
}

impl fmt::Debug for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sound")
            .field("duration", &self.inner.duration())
            .finish()
    }
}

// ── Channels ────────────────────────────────────────────────────────────

/// How many more times a channel plays its sound after the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeats {
    Forever,
    Remaining(u32),
}

impl Repeats {
    /// `-1` (or any negative count) loops forever; `n` plays `n` extra times.
    fn from_loops(loops: i32) -> Self {
        u32::try_from(loops).map_or(Repeats::Forever, Repeats::Remaining)
    }

    /// Consume one repeat if there is one left.
    fn take(&mut self) -> bool {
        match self {
            Repeats::Forever => false,
            Repeats::Remaining(0) => false,
            Repeats::Remaining(n) => {
                *n -= 1;
                true
            }
        }
    }
}

#[derive(Default)]
struct Channel {
    handle: Option<StaticSoundHandle>,
    sound: Option<Sound>,
    repeats: Option<Repeats>,
    volume: u8,
    paused: bool,
}

impl Channel {
    fn new() -> Self {
        Self {
            volume: MAX_VOLUME,
            ..Default::default()
        }
    }

    fn amplitude(&self) -> f64 {
        self.volume as f64 / MAX_VOLUME as f64
    }

    fn is_playing(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| !matches!(h.state(), PlaybackState::Stopped))
    }

    fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop(Tween::default());
        }
        self.sound = None;
        self.repeats = None;
        self.paused = false;
    }
}

// ── AudioPlayer ─────────────────────────────────────────────────────────

/// Wraps kira's `AudioManager` with numbered channels.
pub struct AudioPlayer {
    manager: AudioManager<DefaultBackend>,
    channels: Vec<Channel>,
}

impl AudioPlayer {
    /// Open the default output device with [`DEFAULT_CHANNELS`] channels.
    pub fn new() -> Result<Self, AudioError> {
        Self::with_channels(DEFAULT_CHANNELS)
    }

    pub fn with_channels(count: usize) -> Result<Self, AudioError> {
        let manager = AudioManager::<DefaultBackend>::new(AudioManagerSettings::default())
            .map_err(|e| AudioError::BackendInit(e.to_string()))?;
        log::info!("Audio output opened with {count} channels");
        Ok(Self {
            manager,
            channels: (0..count).map(|_| Channel::new()).collect(),
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Load a sound through the file manager's search paths.
    pub fn load_sound(&self, files: &FileManager, path: impl AsRef<Path>) -> Result<Sound, AudioError> {
        let path = path.as_ref();
        let sound = Sound::from_bytes(files.read(path)?)?;
        log::debug!("Loaded sound {} ({:?})", path.display(), sound.duration());
        Ok(sound)
    }

    fn channel_mut(&mut self, channel: usize) -> Option<&mut Channel> {
        let found = self.channels.get_mut(channel);
        if found.is_none() {
            log::warn!("No audio channel {channel}");
        }
        found
    }

    /// Play `sound` on `channel`, replacing what it was playing. `loops` is
    /// the number of extra plays; negative loops forever.
    pub fn play_sound(&mut self, sound: &Sound, channel: usize, loops: i32) -> Result<(), AudioError> {
        let Some(ch) = self.channels.get_mut(channel) else {
            return Err(AudioError::Play(format!("no channel {channel}")));
        };
        ch.stop();

        let repeats = Repeats::from_loops(loops);
        let mut data = sound.inner.clone().volume(amplitude_to_db(ch.amplitude()));
        if repeats == Repeats::Forever {
            data = data.loop_region(..);
        }
        let handle = self
            .manager
            .play(data)
            .map_err(|e| AudioError::Play(e.to_string()))?;

        ch.handle = Some(handle);
        ch.sound = Some(sound.clone());
        ch.repeats = Some(repeats);
        Ok(())
    }

    /// Play on the first channel that isn't playing. Returns the channel used.
    pub fn play_sound_free(&mut self, sound: &Sound, loops: i32) -> Result<usize, AudioError> {
        let channel = self
            .channels
            .iter()
            .position(|c| !c.is_playing())
            .ok_or_else(|| AudioError::Play("all channels busy".into()))?;
        self.play_sound(sound, channel, loops)?;
        Ok(channel)
    }

    pub fn pause_channel(&mut self, channel: usize) {
        if let Some(ch) = self.channel_mut(channel) {
            if let Some(h) = ch.handle.as_mut() {
                h.pause(Tween::default());
                ch.paused = true;
            }
        }
    }

    pub fn resume_channel(&mut self, channel: usize) {
        if let Some(ch) = self.channel_mut(channel) {
            if let Some(h) = ch.handle.as_mut() {
                h.resume(Tween::default());
                ch.paused = false;
            }
        }
    }

    /// Stop the channel and forget any remaining loops.
    pub fn stop_channel(&mut self, channel: usize) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.stop();
        }
    }

    /// Whether the channel has a sound that hasn't finished. Paused counts
    /// as playing.
    pub fn channel_playing(&self, channel: usize) -> bool {
        self.channels.get(channel).is_some_and(|ch| {
            let loops_left = matches!(ch.repeats, Some(Repeats::Remaining(n)) if n > 0);
            ch.is_playing() || (loops_left && ch.sound.is_some())
        })
    }

    pub fn channel_paused(&self, channel: usize) -> bool {
        self.channels.get(channel).is_some_and(|ch| ch.paused)
    }

    /// Volume from 0.0 to 1.0, kept in [`MAX_VOLUME`] steps. Applies to the
    /// current sound and to later plays on the channel.
    pub fn set_channel_volume(&mut self, channel: usize, volume: f32) {
        if let Some(ch) = self.channel_mut(channel) {
            ch.volume = volume_steps(volume);
            let db = amplitude_to_db(ch.amplitude());
            if let Some(h) = ch.handle.as_mut() {
                h.set_volume(db, Tween::default());
            }
        }
    }

    pub fn channel_volume(&self, channel: usize) -> Option<u8> {
        self.channels.get(channel).map(|ch| ch.volume)
    }

    /// Restart channels whose sound finished but still have loops left.
    /// Call once per frame.
    pub fn update(&mut self) {
        for (i, ch) in self.channels.iter_mut().enumerate() {
            let finished = ch
                .handle
                .as_ref()
                .is_some_and(|h| matches!(h.state(), PlaybackState::Stopped));
            if !finished || ch.paused {
                continue;
            }
            let Some(repeats) = ch.repeats.as_mut() else {
                continue;
            };
            if !repeats.take() {
                ch.handle = None;
                continue;
            }
            let Some(sound) = ch.sound.as_ref() else {
                continue;
            };
            let data = sound.inner.clone().volume(amplitude_to_db(ch.amplitude()));
            match self.manager.play(data) {
                Ok(h) => ch.handle = Some(h),
                Err(e) => {
                    log::warn!("Channel {i} failed to loop: {e}");
                    ch.handle = None;
                    ch.repeats = None;
                }
            }
        }
    }

    pub fn stop_all(&mut self) {
        self.channels.iter_mut().for_each(Channel::stop);
    }
}

impl fmt::Debug for AudioPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioPlayer")
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_loops_repeat_forever() {
        assert_eq!(Repeats::from_loops(-1), Repeats::Forever);
        assert_eq!(Repeats::from_loops(-7), Repeats::Forever);
        assert_eq!(Repeats::from_loops(2), Repeats::Remaining(2));
    }

    #[test]
    fn finite_repeats_count_down() {
        let mut r = Repeats::from_loops(2);
        assert!(r.take());
        assert!(r.take());
        assert!(!r.take());
        assert_eq!(r, Repeats::Remaining(0));

        let mut forever = Repeats::Forever;
        assert!(!forever.take());
    }

    #[test]
    fn volume_is_quantised_to_128_steps() {
        assert_eq!(volume_steps(1.0), 128);
        assert_eq!(volume_steps(0.5), 64);
        assert_eq!(volume_steps(0.0), 0);
        assert_eq!(volume_steps(2.0), 128);
        assert_eq!(volume_steps(-1.0), 0);
    }

    #[test]
    fn amplitude_maps_to_decibels() {
        assert_eq!(amplitude_to_db(1.0), Decibels(0.0));
        assert_eq!(amplitude_to_db(0.0), Decibels::SILENCE);
        let half = amplitude_to_db(0.5).0;
        assert!((half + 6.0206).abs() < 0.001);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = Sound::from_bytes(vec![0u8; 64]).unwrap_err();
        assert!(matches!(err, AudioError::Load(_)));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileManager::with_search_paths([dir.path()]);
        let err = files.read("nope.ogg").map_err(AudioError::from).unwrap_err();
        assert!(matches!(err, AudioError::Load(_)));
    }
}
