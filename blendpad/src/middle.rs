// Hub between the TUI, the blend engine and the audio thread. Input events
// come in, the coordinator and puck are driven, and whatever the audio
// thread needs to hear about goes back out as AudioCommands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{MasterGain, TransportSnapshot};
use crate::audio_api::AudioCommand;
use crate::pipeline::config::{SessionConfig, export_file_path};
use crate::pipeline::coordinator::{BlendCoordinator, CoordinatorOptions};
use crate::pipeline::export::{ExportSettings, export_wav};
use crate::pipeline::latent::LatentBridge;
use crate::pipeline::pattern::ActivePattern;
use crate::pipeline::pattern::Pattern;
use crate::pipeline::presets::{self, PRESET_NAMES};
use crate::pipeline::puck::{PadGeometry, PuckController};
use crate::pipeline::transport::{clamp_bars, clamp_bpm};
use crate::shared::{
    CornerId, DEBOUNCE_MS, DisplayState, EXPORT_SAMPLE_RATE, InputEvent, NUM_CORNERS, Position, STEPS_PER_PATTERN,
};

pub struct Middle {
    coordinator: BlendCoordinator,
    puck: PuckController,
    master: MasterGain,
    project_dir: PathBuf,
    noise: bool,

    corner_presets: [usize; NUM_CORNERS], // index into PRESET_NAMES
    selected_corner: CornerId,

    // transport mirror; the engine owns the real clock
    bpm: f32,
    bars: u16,
    volume_db: f32,
    playing: bool,
    transport: TransportSnapshot,
    audio_online: bool,

    display_text: String,
}

impl Middle {
    pub fn new(config: &SessionConfig, project_dir: PathBuf, master: MasterGain) -> Self {
        let (corner_presets, corners) = presets::corners_from_names(&config.corners);
        let options = CoordinatorOptions {
            threshold: config.threshold,
            debounce: Duration::from_millis(DEBOUNCE_MS),
            max_decode_failures: config.max_decode_failures,
        };
        let position = Position::default();
        let active = ActivePattern::new(Pattern::empty());
        let volume_db = master.set_db(config.volume_db);

        Self {
            coordinator: BlendCoordinator::new(corners, position, options, active),
            puck: PuckController::new(PadGeometry::default(), position),
            master,
            project_dir,
            noise: config.noise,
            corner_presets,
            selected_corner: CornerId::A,
            bpm: clamp_bpm(config.bpm),
            bars: clamp_bars(config.bars as i32),
            volume_db,
            playing: false,
            transport: TransportSnapshot::default(),
            audio_online: false,
            display_text: String::new(),
        }
    }

    /// Puts the startup blend on the pad and begins preparing the model.
    pub fn start(&mut self, bridge: Box<dyn LatentBridge>) {
        self.coordinator.start(bridge);
    }

    pub fn active(&self) -> Arc<ActivePattern> {
        self.coordinator.active().clone()
    }

    pub fn set_pad_geometry(&mut self, geometry: PadGeometry) {
        self.puck.set_geometry(geometry);
    }

    /// Everything a freshly started engine needs to match the mirror.
    pub fn sync_commands(&self) -> Vec<AudioCommand> {
        vec![AudioCommand::SetBpm(self.bpm), AudioCommand::SetBars(self.bars)]
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) -> Vec<AudioCommand> {
        match event {
            InputEvent::PuckDown { column, row } => {
                let pos = self.puck.on_drag_start(column as f32, row as f32);
                self.coordinator.set_position(pos, now);
                vec![]
            }
            InputEvent::PuckMove { column, row } => {
                if let Some(pos) = self.puck.on_drag_move(column as f32, row as f32) {
                    self.coordinator.set_position(pos, now);
                }
                vec![]
            }
            InputEvent::PuckUp => {
                self.puck.on_drag_end();
                vec![]
            }
            InputEvent::ToggleStep { track, step } => {
                let step = step as usize;
                if step >= STEPS_PER_PATTERN {
                    return vec![];
                }
                self.coordinator.toggle_step(track, step);
                // let the user hear a cell they just switched on
                if self.coordinator.active().load().is_on(track, step) {
                    vec![AudioCommand::Audition(track)]
                } else {
                    vec![]
                }
            }
            InputEvent::PlayPress => {
                self.playing = !self.playing;
                if self.playing { vec![AudioCommand::Play] } else { vec![AudioCommand::Stop] }
            }
            InputEvent::Clear => {
                self.playing = false;
                self.coordinator.clear();
                vec![AudioCommand::Clear]
            }
            InputEvent::NudgeBpm(delta) => {
                self.bpm = clamp_bpm(self.bpm + delta as f32);
                vec![AudioCommand::SetBpm(self.bpm)]
            }
            InputEvent::NudgeBars(delta) => {
                self.bars = clamp_bars(self.bars as i32 + delta);
                vec![AudioCommand::SetBars(self.bars)]
            }
            InputEvent::NudgeVolume(delta) => {
                self.volume_db = self.master.set_db(self.volume_db + delta);
                vec![]
            }
            InputEvent::SelectCorner(corner) => {
                self.selected_corner = corner;
                let name = PRESET_NAMES[self.corner_presets[corner.index()]];
                self.display_text = format!("corner {}: {}", corner.label(), name);
                vec![]
            }
            InputEvent::CyclePreset(delta) => {
                self.cycle_preset(delta);
                vec![]
            }
            InputEvent::ToggleMl => {
                let enabled = !self.coordinator.is_ml_enabled();
                self.coordinator.set_ml_enabled(enabled, now);
                log::info!("ml blending {}", if enabled { "enabled" } else { "disabled" });
                vec![]
            }
            InputEvent::Export => {
                self.export();
                vec![]
            }
            InputEvent::Quit => vec![],
        }
    }

    fn cycle_preset(&mut self, delta: i32) {
        let corner = self.selected_corner;
        let index = presets::cycle(self.corner_presets[corner.index()], delta);
        let name = PRESET_NAMES[index];
        let Some(pattern) = presets::preset(name) else {
            return;
        };
        self.corner_presets[corner.index()] = index;
        self.coordinator.replace_corner(corner, pattern);
        self.display_text = format!("corner {}: {}", corner.label(), name);
        log::info!("corner {} -> {}", corner.label(), name);
    }

    fn export(&mut self) {
        let path = export_file_path(&self.project_dir);
        let settings = ExportSettings {
            bpm: self.bpm,
            bars: self.bars,
            volume_db: self.volume_db,
            noise: self.noise,
            sample_rate: EXPORT_SAMPLE_RATE,
        };
        let pattern = self.coordinator.active().load();
        self.display_text = match export_wav(&path, &pattern, &settings) {
            Ok(summary) => format!("exported {:.1}s to {}", summary.seconds, path.display()),
            Err(e) => {
                log::error!("export failed: {e:#}");
                format!("export failed: {e}")
            }
        };
    }

    /// Once per UI frame: drain model replies and pick up the engine's state.
    /// The engine snapshot can lag a command by a callback, so `playing` stays
    /// ours and is only cleared when the audio goes away.
    pub fn tick(&mut self, now: Instant, transport: Option<TransportSnapshot>) {
        self.coordinator.poll(now);
        let was_online = self.audio_online;
        self.audio_online = transport.is_some();
        self.transport = transport.unwrap_or_default();
        if was_online && !self.audio_online {
            self.playing = false;
        }
    }

    /// The output device could not be opened; nothing is playing.
    pub fn audio_unavailable(&mut self, message: impl Into<String>) {
        self.display_text = message.into();
        self.playing = false;
    }

    pub fn display_state(&self) -> DisplayState {
        let playing_column = if self.transport.playing {
            self.transport.last_fired.map(|s| s as usize % STEPS_PER_PATTERN)
        } else {
            None
        };
        DisplayState {
            pattern: self.coordinator.active().load(),
            playing_column,
            current_step: self.transport.current_step,
            total_steps: STEPS_PER_PATTERN as u16 * self.bars,
            playing: self.playing,
            bpm: self.bpm,
            bars: self.bars,
            volume_db: self.volume_db,
            puck: self.coordinator.position(),
            dragging: self.puck.is_dragging(),
            status: self.coordinator.status(),
            selected_corner: self.selected_corner,
            corner_presets: self.corner_presets.map(|i| PRESET_NAMES[i]),
            audio_online: self.audio_online,
            display_text: self.display_text.clone(),
        }
    }

    pub fn shutdown(&mut self) {
        self.puck.teardown();
        self.coordinator.shutdown();
    }
}
