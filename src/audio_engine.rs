//! Local-file `MediaEngine` built on symphonia decoding and cpal output.
//!
//! The handle is owned by the playback coordinator. Decoding and the cpal
//! stream live on a dedicated output thread (cpal streams are not `Send`),
//! which also advances to the next item when a track runs out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, info, warn};
use tokio::sync::broadcast::Sender;

use crate::audio_decoder::{decode_file, DecodedAudio};
use crate::media_engine::{
    EngineError, EngineEvent, EnginePlaybackState, MediaEngine, MediaItem, TransitionReason,
};
use crate::protocol::Message;
use crate::track_uri::parse_track_locator;

const OUTPUT_POLL_INTERVAL: Duration = Duration::from_millis(20);
const NO_SEEK: u64 = u64::MAX;

#[derive(Debug)]
struct EngineCore {
    items: Vec<MediaItem>,
    current_index: Option<usize>,
    state: EnginePlaybackState,
    play_when_ready: bool,
    is_playing: bool,
    duration_ms: Option<u64>,
    /// Bumped whenever a pending load becomes obsolete.
    generation: u64,
    released: bool,
}

/// State shared with the realtime callback.
#[derive(Debug)]
struct PlaybackCursor {
    playing: AtomicBool,
    finished: AtomicBool,
    seek_to_frame: AtomicU64,
    position_ms: AtomicU64,
}

impl PlaybackCursor {
    fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            seek_to_frame: AtomicU64::new(NO_SEEK),
            position_ms: AtomicU64::new(0),
        }
    }

    fn reset(&self, position_ms: u64, sample_rate: u32) {
        self.playing.store(false, Ordering::Release);
        self.finished.store(false, Ordering::Release);
        self.request_seek(position_ms, sample_rate);
    }

    fn request_seek(&self, position_ms: u64, sample_rate: u32) {
        let frame = position_ms.saturating_mul(u64::from(sample_rate)) / 1_000;
        self.seek_to_frame.store(frame, Ordering::Release);
        self.position_ms.store(position_ms, Ordering::Release);
    }
}

#[derive(Debug)]
enum OutputCommand {
    Load {
        uri: String,
        position_ms: u64,
        generation: u64,
    },
    Seek(u64),
    SetPlaying(bool),
    Stop,
    Shutdown,
}

fn lock_core(core: &Mutex<EngineCore>) -> MutexGuard<'_, EngineCore> {
    match core.lock() {
        Ok(core) => core,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn emit(bus_sender: &Sender<Message>, event: EngineEvent) {
    let _ = bus_sender.send(Message::Engine(event));
}

/// Fills one output buffer from `audio`, mapping channels and stepping
/// through source frames at the rate ratio.
fn render_into(
    data: &mut [f32],
    output_channels: usize,
    output_rate: u32,
    audio: &DecodedAudio,
    cursor: &PlaybackCursor,
    position_frames: &mut f64,
) {
    let requested = cursor.seek_to_frame.swap(NO_SEEK, Ordering::AcqRel);
    if requested != NO_SEEK {
        *position_frames = requested as f64;
    }
    if !cursor.playing.load(Ordering::Acquire) {
        data.fill(0.0);
        return;
    }

    let source_channels = usize::from(audio.channels.max(1));
    let frame_count = audio.frame_count();
    let step = f64::from(audio.sample_rate) / f64::from(output_rate.max(1));
    let mut finished = false;
    for output_frame in data.chunks_mut(output_channels.max(1)) {
        let source_frame = *position_frames as usize;
        if source_frame >= frame_count {
            output_frame.fill(0.0);
            finished = true;
            continue;
        }
        let base = source_frame * source_channels;
        for (channel, sample) in output_frame.iter_mut().enumerate() {
            let source_channel = channel.min(source_channels - 1);
            *sample = audio.samples[base + source_channel];
        }
        *position_frames += step;
    }

    let played_frames = position_frames.min(frame_count as f64);
    let position_ms = (played_frames * 1_000.0 / f64::from(audio.sample_rate.max(1))) as u64;
    cursor.position_ms.store(position_ms, Ordering::Release);
    if finished {
        cursor.playing.store(false, Ordering::Release);
        cursor.finished.store(true, Ordering::Release);
    }
}

fn pick_output_config(device: &cpal::Device) -> Result<cpal::StreamConfig, EngineError> {
    let default_config = device
        .default_output_config()
        .map_err(|err| EngineError::Output(err.to_string()))?;
    if default_config.sample_format() == cpal::SampleFormat::F32 {
        return Ok(default_config.into());
    }
    let f32_config = device
        .supported_output_configs()
        .map_err(|err| EngineError::Output(err.to_string()))?
        .find(|config| config.sample_format() == cpal::SampleFormat::F32)
        .map(|config| {
            let rate = default_config
                .sample_rate()
                .0
                .clamp(config.min_sample_rate().0, config.max_sample_rate().0);
            config.with_sample_rate(cpal::SampleRate(rate))
        });
    match f32_config {
        Some(config) => Ok(config.into()),
        None => Err(EngineError::Output(
            "output device has no f32 stream configuration".to_string(),
        )),
    }
}

struct OutputThread {
    commands: mpsc::Receiver<OutputCommand>,
    core: Arc<Mutex<EngineCore>>,
    cursor: Arc<PlaybackCursor>,
    bus_sender: Sender<Message>,
    stream: Option<cpal::Stream>,
    sample_rate: u32,
}

impl OutputThread {
    fn run(&mut self) {
        debug!("LocalAudioEngine: output thread started");
        loop {
            match self.commands.recv_timeout(OUTPUT_POLL_INTERVAL) {
                Ok(OutputCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => {}
            }
            if self.cursor.finished.swap(false, Ordering::AcqRel) {
                self.handle_track_finished();
            }
        }
        self.stream = None;
        debug!("LocalAudioEngine: output thread stopped");
    }

    fn handle_command(&mut self, command: OutputCommand) {
        match command {
            OutputCommand::Load {
                uri,
                position_ms,
                generation,
            } => self.load(&uri, position_ms, generation),
            OutputCommand::Seek(position_ms) => {
                self.cursor.request_seek(position_ms, self.sample_rate);
                emit(
                    &self.bus_sender,
                    EngineEvent::PositionDiscontinuity { position_ms },
                );
            }
            OutputCommand::SetPlaying(playing) => self.set_playing(playing),
            OutputCommand::Stop => {
                self.stream = None;
                self.cursor.reset(0, self.sample_rate);
                self.set_is_playing(false);
                lock_core(&self.core).duration_ms = None;
                emit(
                    &self.bus_sender,
                    EngineEvent::PlaybackStateChanged(EnginePlaybackState::Idle),
                );
            }
            OutputCommand::Shutdown => {}
        }
    }

    fn set_is_playing(&self, playing: bool) {
        let changed = {
            let mut core = lock_core(&self.core);
            let changed = core.is_playing != playing;
            core.is_playing = playing;
            changed
        };
        if changed {
            emit(&self.bus_sender, EngineEvent::IsPlayingChanged(playing));
        }
    }

    fn set_playing(&mut self, playing: bool) {
        let Some(stream) = self.stream.as_ref() else {
            return;
        };
        let result = if playing {
            stream.play().map_err(|err| err.to_string())
        } else {
            stream.pause().map_err(|err| err.to_string())
        };
        if let Err(err) = result {
            warn!("LocalAudioEngine: failed to toggle output stream: {}", err);
        }
        self.cursor.playing.store(playing, Ordering::Release);
        self.set_is_playing(playing);
    }

    fn build_stream(&mut self, audio: Arc<DecodedAudio>) -> Result<cpal::Stream, EngineError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::Output("no default output device".to_string()))?;
        let config = pick_output_config(&device)?;
        let output_channels = usize::from(config.channels);
        let output_rate = config.sample_rate.0;
        let cursor = Arc::clone(&self.cursor);
        let mut position_frames = 0.0f64;

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render_into(
                        data,
                        output_channels,
                        output_rate,
                        &audio,
                        &cursor,
                        &mut position_frames,
                    );
                },
                |err| error!("LocalAudioEngine: output stream error: {}", err),
                None,
            )
            .map_err(|err| EngineError::Output(err.to_string()))
    }

    fn is_current_generation(&self, generation: u64) -> bool {
        lock_core(&self.core).generation == generation
    }

    fn load(&mut self, uri: &str, position_ms: u64, generation: u64) {
        self.stream = None;
        self.cursor.reset(0, self.sample_rate);

        let decoded = parse_track_locator(uri)
            .ok_or_else(|| EngineError::Load {
                uri: uri.to_string(),
                reason: "not a local file locator".to_string(),
            })
            .and_then(|path| {
                decode_file(&path).map_err(|err| EngineError::Load {
                    uri: uri.to_string(),
                    reason: err.to_string(),
                })
            });
        if !self.is_current_generation(generation) {
            debug!("LocalAudioEngine: dropping stale load of {}", uri);
            return;
        }

        let audio = match decoded {
            Ok(audio) => Arc::new(audio),
            Err(err) => {
                error!("LocalAudioEngine: {}", err);
                self.enter_idle();
                return;
            }
        };
        self.sample_rate = audio.sample_rate;
        let duration_ms = audio.duration_ms();
        let stream = match self.build_stream(audio) {
            Ok(stream) => stream,
            Err(err) => {
                error!("LocalAudioEngine: {}", err);
                self.enter_idle();
                return;
            }
        };
        self.cursor.reset(position_ms, self.sample_rate);
        self.stream = Some(stream);

        let play_when_ready = {
            let mut core = lock_core(&self.core);
            core.duration_ms = Some(duration_ms);
            core.state = EnginePlaybackState::Ready;
            core.play_when_ready
        };
        info!("LocalAudioEngine: loaded {} ({} ms)", uri, duration_ms);
        emit(
            &self.bus_sender,
            EngineEvent::PlaybackStateChanged(EnginePlaybackState::Ready),
        );
        self.set_playing(play_when_ready);
    }

    fn enter_idle(&mut self) {
        self.stream = None;
        lock_core(&self.core).state = EnginePlaybackState::Idle;
        self.set_is_playing(false);
        emit(
            &self.bus_sender,
            EngineEvent::PlaybackStateChanged(EnginePlaybackState::Idle),
        );
    }

    fn handle_track_finished(&mut self) {
        let next = {
            let mut core = lock_core(&self.core);
            match core.current_index {
                Some(index) if index + 1 < core.items.len() => {
                    core.current_index = Some(index + 1);
                    core.state = EnginePlaybackState::Buffering;
                    core.generation += 1;
                    Some((core.items[index + 1].clone(), core.generation))
                }
                _ => {
                    core.state = EnginePlaybackState::Ended;
                    None
                }
            }
        };

        match next {
            Some((item, generation)) => {
                emit(
                    &self.bus_sender,
                    EngineEvent::MediaItemTransition {
                        media_item: Some(item.clone()),
                        reason: TransitionReason::Auto,
                    },
                );
                self.load(&item.uri, 0, generation);
            }
            None => {
                self.stream = None;
                self.set_is_playing(false);
                emit(
                    &self.bus_sender,
                    EngineEvent::PlaybackStateChanged(EnginePlaybackState::Ended),
                );
            }
        }
    }
}

/// Handle to the local playback engine.
pub struct LocalAudioEngine {
    core: Arc<Mutex<EngineCore>>,
    cursor: Arc<PlaybackCursor>,
    commands: mpsc::Sender<OutputCommand>,
    bus_sender: Sender<Message>,
    output_thread: Option<JoinHandle<()>>,
}

impl LocalAudioEngine {
    pub fn spawn(bus_sender: Sender<Message>) -> Result<Self, EngineError> {
        let core = Arc::new(Mutex::new(EngineCore {
            items: Vec::new(),
            current_index: None,
            state: EnginePlaybackState::Idle,
            play_when_ready: false,
            is_playing: false,
            duration_ms: None,
            generation: 0,
            released: false,
        }));
        let cursor = Arc::new(PlaybackCursor::new());
        let (command_sender, command_receiver) = mpsc::channel();

        let output_core = Arc::clone(&core);
        let output_cursor = Arc::clone(&cursor);
        let output_bus_sender = bus_sender.clone();
        let output_thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                // cpal::Stream is not Send, so the owner is built on its thread.
                let mut output = OutputThread {
                    commands: command_receiver,
                    core: output_core,
                    cursor: output_cursor,
                    bus_sender: output_bus_sender,
                    stream: None,
                    sample_rate: 44_100,
                };
                output.run()
            })
            .map_err(|err| EngineError::Output(err.to_string()))?;

        Ok(Self {
            core,
            cursor,
            commands: command_sender,
            bus_sender,
            output_thread: Some(output_thread),
        })
    }

    fn core(&self) -> Result<MutexGuard<'_, EngineCore>, EngineError> {
        let core = lock_core(&self.core);
        if core.released {
            return Err(EngineError::Released);
        }
        Ok(core)
    }

    fn send(&self, command: OutputCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::Released)
    }

    fn load_current(&self, core: &mut EngineCore, position_ms: u64) -> Result<(), EngineError> {
        let Some(item) = core.current_index.and_then(|index| core.items.get(index)) else {
            return Ok(());
        };
        core.generation += 1;
        let uri = item.uri.clone();
        core.state = EnginePlaybackState::Buffering;
        core.duration_ms = None;
        self.send(OutputCommand::Load {
            uri,
            position_ms,
            generation: core.generation,
        })
    }
}

impl MediaEngine for LocalAudioEngine {
    fn stop(&mut self) -> Result<(), EngineError> {
        {
            let mut core = self.core()?;
            core.generation += 1;
            core.state = EnginePlaybackState::Idle;
        }
        self.send(OutputCommand::Stop)
    }

    fn clear_media_items(&mut self) -> Result<(), EngineError> {
        let mut core = self.core()?;
        core.items.clear();
        core.current_index = None;
        Ok(())
    }

    fn add_media_item(&mut self, item: MediaItem) -> Result<(), EngineError> {
        let mut core = self.core()?;
        core.items.push(item);
        if core.current_index.is_none() {
            core.current_index = Some(0);
        }
        Ok(())
    }

    fn seek_to_item(&mut self, index: usize, position_ms: u64) -> Result<(), EngineError> {
        let (item, changed) = {
            let mut core = self.core()?;
            let count = core.items.len();
            let Some(item) = core.items.get(index).cloned() else {
                return Err(EngineError::IndexOutOfRange { index, count });
            };
            let changed = core.current_index != Some(index);
            core.current_index = Some(index);
            if core.state != EnginePlaybackState::Idle {
                self.load_current(&mut core, position_ms)?;
            }
            (item, changed)
        };
        if changed {
            emit(
                &self.bus_sender,
                EngineEvent::MediaItemTransition {
                    media_item: Some(item),
                    reason: TransitionReason::Seek,
                },
            );
        }
        Ok(())
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<(), EngineError> {
        let state = self.core()?.state;
        if state == EnginePlaybackState::Ended {
            let mut core = self.core()?;
            return self.load_current(&mut core, position_ms);
        }
        self.send(OutputCommand::Seek(position_ms))
    }

    fn prepare(&mut self) -> Result<(), EngineError> {
        let mut core = self.core()?;
        if core.items.is_empty() {
            return Ok(());
        }
        self.load_current(&mut core, 0)?;
        drop(core);
        emit(
            &self.bus_sender,
            EngineEvent::PlaybackStateChanged(EnginePlaybackState::Buffering),
        );
        Ok(())
    }

    fn play(&mut self) -> Result<(), EngineError> {
        let state = {
            let mut core = self.core()?;
            core.play_when_ready = true;
            core.state
        };
        if state == EnginePlaybackState::Ready {
            self.send(OutputCommand::SetPlaying(true))?;
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.core()?.play_when_ready = false;
        self.send(OutputCommand::SetPlaying(false))
    }

    fn release(&mut self) {
        {
            let mut core = lock_core(&self.core);
            if core.released {
                return;
            }
            core.released = true;
            core.generation += 1;
        }
        let _ = self.commands.send(OutputCommand::Shutdown);
        if let Some(handle) = self.output_thread.take() {
            if handle.join().is_err() {
                warn!("LocalAudioEngine: output thread panicked");
            }
        }
        info!("LocalAudioEngine: released");
    }

    fn media_item_count(&self) -> usize {
        lock_core(&self.core).items.len()
    }

    fn current_media_item_index(&self) -> Option<usize> {
        lock_core(&self.core).current_index
    }

    fn media_item_at(&self, index: usize) -> Option<MediaItem> {
        lock_core(&self.core).items.get(index).cloned()
    }

    fn current_position_ms(&self) -> Result<u64, EngineError> {
        self.core()?;
        Ok(self.cursor.position_ms.load(Ordering::Acquire))
    }

    fn duration_ms(&self) -> Result<Option<u64>, EngineError> {
        Ok(self.core()?.duration_ms)
    }

    fn is_playing(&self) -> bool {
        lock_core(&self.core).is_playing
    }

    fn playback_state(&self) -> EnginePlaybackState {
        lock_core(&self.core).state
    }
}

impl Drop for LocalAudioEngine {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    fn audio(frames: usize, channels: u16, sample_rate: u32) -> DecodedAudio {
        DecodedAudio {
            samples: (0..frames * usize::from(channels))
                .map(|index| index as f32)
                .collect(),
            sample_rate,
            channels,
        }
    }

    fn item(name: &str) -> MediaItem {
        MediaItem {
            media_id: name.to_string(),
            uri: format!("file:///nonexistent/{}.mp3", name),
        }
    }

    #[test]
    fn test_render_duplicates_mono_into_stereo() {
        let source = audio(4, 1, 1_000);
        let cursor = PlaybackCursor::new();
        cursor.reset(0, 1_000);
        cursor.playing.store(true, Ordering::Release);
        let mut position = 0.0;
        let mut data = vec![9.0f32; 4];

        render_into(&mut data, 2, 1_000, &source, &cursor, &mut position);
        assert_eq!(data, vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(cursor.position_ms.load(Ordering::Acquire), 2);
        assert!(!cursor.finished.load(Ordering::Acquire));
    }

    #[test]
    fn test_render_pads_silence_and_flags_end_of_track() {
        let source = audio(2, 1, 1_000);
        let cursor = PlaybackCursor::new();
        cursor.reset(0, 1_000);
        cursor.playing.store(true, Ordering::Release);
        let mut position = 0.0;
        let mut data = vec![9.0f32; 4];

        render_into(&mut data, 1, 1_000, &source, &cursor, &mut position);
        assert_eq!(data, vec![0.0, 1.0, 0.0, 0.0]);
        assert!(cursor.finished.load(Ordering::Acquire));
        assert!(!cursor.playing.load(Ordering::Acquire));
    }

    #[test]
    fn test_render_is_silent_while_paused_and_applies_pending_seek() {
        let source = audio(10, 1, 1_000);
        let cursor = PlaybackCursor::new();
        cursor.reset(5, 1_000);
        let mut position = 0.0;
        let mut data = vec![9.0f32; 2];

        render_into(&mut data, 1, 1_000, &source, &cursor, &mut position);
        assert_eq!(data, vec![0.0, 0.0]);
        assert_eq!(position, 5.0);
    }

    #[test]
    fn test_seek_beyond_any_track_saturates_and_ends_playback() {
        let source = audio(10, 1, 48_000);
        let cursor = PlaybackCursor::new();
        cursor.request_seek(u64::MAX, 48_000);
        assert_ne!(cursor.seek_to_frame.load(Ordering::Acquire), NO_SEEK);
        cursor.playing.store(true, Ordering::Release);
        let mut position = 0.0;
        let mut data = vec![9.0f32; 2];

        render_into(&mut data, 1, 48_000, &source, &cursor, &mut position);
        assert_eq!(data, vec![0.0, 0.0]);
        assert!(cursor.finished.load(Ordering::Acquire));
    }

    #[test]
    fn test_queue_bookkeeping_without_output() {
        let (sender, _receiver) = broadcast::channel(64);
        let mut engine = LocalAudioEngine::spawn(sender).expect("engine");
        engine.add_media_item(item("a")).expect("add");
        engine.add_media_item(item("b")).expect("add");
        assert_eq!(engine.media_item_count(), 2);
        assert_eq!(engine.current_media_item_index(), Some(0));

        engine.seek_to_item(1, 0).expect("seek");
        assert_eq!(engine.current_media_item().map(|item| item.media_id), Some("b".to_string()));
        assert!(matches!(
            engine.seek_to_item(5, 0),
            Err(EngineError::IndexOutOfRange { index: 5, count: 2 })
        ));
        assert_eq!(engine.playback_state(), EnginePlaybackState::Idle);
        assert!(!engine.is_playing());

        engine.release();
        assert!(matches!(engine.current_position_ms(), Err(EngineError::Released)));
        assert!(matches!(engine.play(), Err(EngineError::Released)));
    }

    #[test]
    fn test_unloadable_item_returns_engine_to_idle() {
        let (sender, mut receiver) = broadcast::channel(64);
        let mut engine = LocalAudioEngine::spawn(sender).expect("engine");
        engine.add_media_item(item("missing")).expect("add");
        engine.prepare().expect("prepare");
        engine.play().expect("play");

        let mut saw_idle = false;
        for _ in 0..100 {
            match receiver.try_recv() {
                Ok(Message::Engine(EngineEvent::PlaybackStateChanged(
                    EnginePlaybackState::Idle,
                ))) => {
                    saw_idle = true;
                    break;
                }
                Ok(_) => {}
                Err(_) => thread::sleep(Duration::from_millis(10)),
            }
        }
        assert!(saw_idle);
        assert!(!engine.is_playing());
        engine.release();
    }
}
