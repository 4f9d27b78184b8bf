mod shared;
mod error;
mod tui;
mod audio_api;
mod audio;
mod middle;
mod pipeline;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crossterm::event::{DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture};
use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use audio::{AudioContext, MasterGain};
use audio_api::AudioCommand;
use middle::Middle;
use pipeline::config;
use pipeline::latent::bridge_from_endpoint;
use pipeline::puck::PadGeometry;
use shared::InputEvent;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// the terminal belongs to the TUI, so logs go to <project>/.blendpad/blendpad.log
fn init_logging(project_dir: &Path) {
    let path = config::log_file_path(project_dir);
    let file = path
        .parent()
        .and_then(|dir| std::fs::create_dir_all(dir).ok())
        .and_then(|_| File::create(&path).ok());

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match file {
        Some(f) => {
            builder.target(env_logger::Target::Pipe(Box::new(f)));
        }
        None => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    let _ = builder.try_init();
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    init_logging(&project_dir);

    let cfg = config::load_config(&project_dir);
    let master = MasterGain::from_db(cfg.volume_db);
    let mut middle = Middle::new(&cfg, project_dir.clone(), master.clone());
    middle.start(bridge_from_endpoint(cfg.latent_endpoint.as_deref(), cfg.latent_timeout()));
    // the device is opened on the first play, not at launch
    let mut audio = AudioContext::new(middle.active(), master, cfg.noise);

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    crossterm::execute!(std::io::stdout(), EnableMouseCapture, EnableFocusChange)?;

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(16); // ~60fps
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        middle.tick(Instant::now(), audio.status());
        let ds = middle.display_state();
        tui_state.dragging = ds.dragging;

        let mut areas = tui::view::ViewAreas::default();
        term.draw(|frame| {
            areas = tui::view::render(frame, frame.area(), &ds);
        })?;
        tui_state.pad_area = areas.pad;
        tui_state.grid_area = areas.grid;
        // the last cell of each axis is the far edge of the pad
        middle.set_pad_geometry(PadGeometry::new(
            areas.pad.x as f32,
            areas.pad.y as f32,
            areas.pad.width.saturating_sub(1) as f32,
            areas.pad.height.saturating_sub(1) as f32,
        ));

        let events = tui::input::poll_input(tick_rate, &mut tui_state)?;
        for event in events {
            if event == InputEvent::Quit {
                middle.shutdown();
                audio.shutdown();
                drop(term);
                log::info!("bye");
                return Ok(());
            }
            let cmds = middle.handle_input(event, Instant::now());
            dispatch(&mut audio, &mut middle, cmds);
        }
    }
}

// opens the device on the first command that needs it
fn dispatch(audio: &mut AudioContext, middle: &mut Middle, cmds: Vec<AudioCommand>) {
    if cmds.is_empty() {
        return;
    }
    if !audio.is_started() {
        let wants_sound = cmds.iter().any(|c| matches!(c, AudioCommand::Play | AudioCommand::Audition(_)));
        if !wants_sound {
            return; // mirrored in the middle, synced once the engine starts
        }
        match audio.ensure_started() {
            Ok(handle) => {
                for cmd in middle.sync_commands() {
                    handle.send(cmd);
                }
            }
            Err(e) => {
                log::error!("{e}");
                middle.audio_unavailable(e.to_string());
                return;
            }
        }
    }
    for cmd in cmds {
        audio.send(cmd);
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(std::io::stdout(), DisableMouseCapture, DisableFocusChange);
        let _ = terminal::disable_raw_mode();
    }
}
