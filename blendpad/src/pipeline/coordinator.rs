// Decides where each pad position's pattern comes from (latent model or
// bilinear blend), debounces decodes, and makes sure late answers never
// overwrite newer ones.
//
// Uninitialized -> Loading -> { MlReady, FallbackOnly }
//
// Every resolution bumps `latest_seq`; a decode reply is applied only if it
// still carries the latest sequence number.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::blend::blend_at;
use super::latent::{LatentBridge, LatentBundle};
use super::pattern::{ActivePattern, Corners, Pattern};
use super::worker::{LatentJob, LatentReply, LatentWorker};
use crate::shared::{CornerId, DEBOUNCE_MS, DEFAULT_THRESHOLD, Position, TrackId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Uninitialized,
    Loading,
    MlReady,
    FallbackOnly,
}

/// What the pad's little indicator shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendStatus {
    Loading,
    Ready,
    Computing,
    Unavailable,
    Disabled,
}

impl BlendStatus {
    pub fn label(self) -> &'static str {
        match self {
            BlendStatus::Loading => "ML loading",
            BlendStatus::Ready => "ML ready",
            BlendStatus::Computing => "ML computing...",
            BlendStatus::Unavailable => "Fallback only",
            BlendStatus::Disabled => "ML off",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CoordinatorOptions {
    pub threshold: f32,
    pub debounce: Duration,
    /// Consecutive decode failures before giving up on the model.
    /// `None` keeps the per-call fallback forever.
    pub max_decode_failures: Option<u32>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            debounce: Duration::from_millis(DEBOUNCE_MS),
            max_decode_failures: None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct PendingDecode {
    seq: u64,
    position: Position,
    due: Instant,
}

pub struct BlendCoordinator {
    mode: BlendMode,
    ml_enabled: bool,
    options: CoordinatorOptions,

    corners: Corners,
    revision: u64, // bumped on every corner swap
    latents: Option<Arc<LatentBundle>>,
    encoding: Option<u64>,

    position: Position,
    latest_seq: u64,
    pending: Option<PendingDecode>,
    in_flight: Option<u64>,
    decode_failures: u32,

    active: Arc<ActivePattern>,
    worker: Option<LatentWorker>,
    cancelled: bool,
}

impl BlendCoordinator {
    pub fn new(corners: Corners, position: Position, options: CoordinatorOptions, active: Arc<ActivePattern>) -> Self {
        Self {
            mode: BlendMode::Uninitialized,
            ml_enabled: true,
            options,
            corners,
            revision: 0,
            latents: None,
            encoding: None,
            position,
            latest_seq: 0,
            pending: None,
            in_flight: None,
            decode_failures: 0,
            active,
            worker: None,
            cancelled: false,
        }
    }

    /// Emits the bilinear pattern for the current position right away, then
    /// starts preparing the model in the background.
    pub fn start(&mut self, bridge: Box<dyn LatentBridge>) {
        if self.mode != BlendMode::Uninitialized || self.cancelled {
            return;
        }
        self.emit_fallback(self.position);
        match LatentWorker::spawn(bridge) {
            Ok(worker) => {
                self.worker = Some(worker);
                self.enter_loading();
            }
            Err(e) => self.enter_fallback(&format!("latent worker failed to start: {e}")),
        }
    }

    pub fn set_position(&mut self, position: Position, now: Instant) {
        if self.cancelled {
            return;
        }
        self.position = position;
        if self.ml_path_ready() {
            self.schedule_decode(position, now + self.options.debounce);
        } else {
            self.emit_fallback(position);
        }
    }

    /// Swaps a whole corner. The blend for the current position goes out
    /// immediately; the model catches up once re-encoding lands.
    pub fn replace_corner(&mut self, id: CornerId, pattern: Pattern) {
        if self.cancelled {
            return;
        }
        self.corners.replace(id, pattern);
        self.revision += 1;
        self.emit_fallback(self.position);
        if self.mode == BlendMode::MlReady {
            self.request_encode();
        }
    }

    /// Drain worker replies and fire a decode whose debounce window closed.
    /// Called once per UI frame.
    pub fn poll(&mut self, now: Instant) {
        if self.cancelled {
            return;
        }
        while let Some(reply) = self.next_reply() {
            self.handle_reply(reply, now);
        }
        self.dispatch_due(now);
    }

    pub fn toggle_step(&mut self, track: TrackId, step: usize) {
        if self.cancelled {
            return;
        }
        let mut pattern = (*self.active.load()).clone();
        pattern.toggle(track, step);
        self.supersede();
        self.active.store(pattern);
    }

    /// Silences what is playing. Corners are untouched.
    pub fn clear(&mut self) {
        self.supersede();
        self.active.store(Pattern::empty());
    }

    pub fn set_ml_enabled(&mut self, enabled: bool, now: Instant) {
        if self.ml_enabled == enabled || self.cancelled {
            return;
        }
        self.ml_enabled = enabled;
        if !enabled {
            self.emit_fallback(self.position);
        } else if self.ml_path_ready() {
            self.schedule_decode(self.position, now);
        }
    }

    /// Flags everything in flight as cancelled. Late replies are dropped.
    pub fn shutdown(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.pending = None;
        self.in_flight = None;
        if let Some(mut worker) = self.worker.take() {
            worker.cancel();
        }
        log::debug!("blend coordinator shut down");
    }

    pub fn status(&self) -> BlendStatus {
        if !self.ml_enabled {
            return BlendStatus::Disabled;
        }
        match self.mode {
            BlendMode::Uninitialized | BlendMode::Loading => BlendStatus::Loading,
            BlendMode::FallbackOnly => BlendStatus::Unavailable,
            BlendMode::MlReady => {
                if self.pending.is_some() || self.in_flight.is_some() || self.encoding.is_some() {
                    BlendStatus::Computing
                } else {
                    BlendStatus::Ready
                }
            }
        }
    }

    #[cfg(test)]
    pub fn mode(&self) -> BlendMode {
        self.mode
    }

    pub fn position(&self) -> Position {
        self.position
    }

    #[cfg(test)]
    pub fn corners(&self) -> &Corners {
        &self.corners
    }

    pub fn is_ml_enabled(&self) -> bool {
        self.ml_enabled
    }

    #[cfg(test)]
    pub fn is_decoding(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn active(&self) -> &Arc<ActivePattern> {
        &self.active
    }

    // -- transitions --

    fn enter_loading(&mut self) {
        self.mode = BlendMode::Loading;
        log::info!("preparing latent model");
        if !self.submit(LatentJob::Prepare) {
            self.enter_fallback("latent worker unreachable");
        }
    }

    fn enter_ml_ready(&mut self) {
        self.mode = BlendMode::MlReady;
        log::info!("latent model ready");
        self.request_encode();
    }

    fn enter_fallback(&mut self, reason: &str) {
        if self.mode == BlendMode::FallbackOnly {
            return;
        }
        log::warn!("latent blending unavailable ({reason}); bilinear blend for the rest of the session");
        let had_work = self.pending.is_some() || self.in_flight.is_some();
        self.mode = BlendMode::FallbackOnly;
        self.latents = None;
        self.encoding = None;
        self.pending = None;
        self.in_flight = None;
        if let Some(mut worker) = self.worker.take() {
            worker.cancel();
        }
        // whatever was waiting on the model still needs an answer
        if had_work {
            self.emit_fallback(self.position);
        }
    }

    // -- internals --

    fn ml_path_ready(&self) -> bool {
        self.mode == BlendMode::MlReady && self.ml_enabled && self.latents.is_some()
    }

    fn submit(&self, job: LatentJob) -> bool {
        self.worker.as_ref().is_some_and(|w| w.submit(job))
    }

    fn next_reply(&self) -> Option<LatentReply> {
        self.worker.as_ref()?.try_recv()
    }

    fn request_encode(&mut self) {
        let job = LatentJob::Encode {
            revision: self.revision,
            corners: self.corners.clone(),
        };
        if self.submit(job) {
            self.encoding = Some(self.revision);
        } else {
            self.enter_fallback("latent worker unreachable");
        }
    }

    fn schedule_decode(&mut self, position: Position, due: Instant) {
        self.latest_seq += 1;
        self.pending = Some(PendingDecode {
            seq: self.latest_seq,
            position,
            due,
        });
    }

    // invalidates anything waiting or in flight
    fn supersede(&mut self) {
        self.latest_seq += 1;
        self.pending = None;
    }

    fn emit_fallback(&mut self, position: Position) {
        self.supersede();
        let pattern = blend_at(&self.corners, position.x, position.y, self.options.threshold);
        self.active.store(pattern);
    }

    fn dispatch_due(&mut self, now: Instant) {
        let Some(pending) = self.pending else {
            return;
        };
        if pending.due > now || self.in_flight.is_some() {
            return;
        }
        self.pending = None;

        let latents = match &self.latents {
            Some(l) if self.ml_path_ready() => l.clone(),
            _ => {
                self.emit_fallback(pending.position);
                return;
            }
        };
        let job = LatentJob::Decode {
            seq: pending.seq,
            latents,
            position: pending.position,
        };
        if self.submit(job) {
            self.in_flight = Some(pending.seq);
        } else {
            self.enter_fallback("latent worker unreachable");
            self.emit_fallback(pending.position);
        }
    }

    fn handle_reply(&mut self, reply: LatentReply, now: Instant) {
        match reply {
            LatentReply::Prepared(Ok(())) => {
                if self.mode == BlendMode::Loading {
                    self.enter_ml_ready();
                }
            }
            LatentReply::Prepared(Err(e)) => self.enter_fallback(&e.to_string()),
            LatentReply::Encoded { revision, result } => {
                if self.mode != BlendMode::MlReady {
                    return;
                }
                match result {
                    Ok(bundle) if revision == self.revision => {
                        log::debug!("corners encoded (revision {revision})");
                        self.latents = Some(Arc::new(bundle));
                        self.encoding = None;
                        if self.ml_enabled {
                            self.schedule_decode(self.position, now);
                        }
                    }
                    Ok(_) => log::debug!("dropping latents for stale corner revision {revision}"),
                    Err(e) => self.enter_fallback(&e.to_string()),
                }
            }
            LatentReply::Decoded { seq, position, result } => {
                if self.in_flight == Some(seq) {
                    self.in_flight = None;
                }
                if self.mode != BlendMode::MlReady || seq != self.latest_seq {
                    log::trace!("dropping superseded decode #{seq}");
                    return;
                }
                match result {
                    Ok(pattern) => {
                        self.decode_failures = 0;
                        self.active.store(pattern);
                    }
                    Err(e) => {
                        self.decode_failures += 1;
                        log::warn!("{e}; bilinear blend at ({:.2}, {:.2})", position.x, position.y);
                        self.emit_fallback(position);
                        if self
                            .options
                            .max_decode_failures
                            .is_some_and(|max| self.decode_failures >= max)
                        {
                            self.enter_fallback("too many consecutive decode failures");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_fixture::{ScriptedBridge, corner_fixture, decoded_at, scenario_corners, wait_for};
    use crate::shared::{CornerId, STEPS_PER_PATTERN};

    const SETTLE: Duration = Duration::from_secs(3);

    fn coordinator(corners: Corners, options: CoordinatorOptions) -> BlendCoordinator {
        BlendCoordinator::new(corners, Position::new(0.0, 0.0), options, ActivePattern::new(Pattern::empty()))
    }

    fn settle_at(c: &mut BlendCoordinator, now: Instant, done: impl Fn(&BlendCoordinator) -> bool) -> bool {
        wait_for(
            || {
                c.poll(now);
                done(c).then_some(())
            },
            SETTLE,
        )
        .is_some()
    }

    fn settle(c: &mut BlendCoordinator, done: impl Fn(&BlendCoordinator) -> bool) -> bool {
        wait_for(
            || {
                c.poll(Instant::now());
                done(c).then_some(())
            },
            SETTLE,
        )
        .is_some()
    }

    fn ready(c: &BlendCoordinator) -> bool {
        c.status() == BlendStatus::Ready
    }

    #[test]
    fn prepare_failure_means_fallback_for_the_session() {
        let bridge = ScriptedBridge::failing_prepare();
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(bridge.clone()));
        // the pad answers before the model does
        assert_eq!(*c.active().load(), corner_fixture().a);

        assert!(settle(&mut c, |c| c.mode() == BlendMode::FallbackOnly));
        c.set_position(Position::new(1.0, 1.0), Instant::now());
        assert_eq!(*c.active().load(), corner_fixture().d);
        assert_eq!(c.status(), BlendStatus::Unavailable);
        assert!(bridge.decode_calls().is_empty());
    }

    #[test]
    fn model_answers_once_ready() {
        let bridge = ScriptedBridge::new();
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(bridge.clone()));
        assert!(settle(&mut c, ready));
        assert_eq!(c.mode(), BlendMode::MlReady);
        assert_eq!(*c.active().load(), decoded_at(0.0, 0.0));
        assert_eq!(bridge.encode_calls(), 1);
    }

    #[test]
    fn rapid_moves_decode_only_the_last_position() {
        let bridge = ScriptedBridge::new();
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(bridge.clone()));
        assert!(settle(&mut c, ready));
        let calls_before = bridge.decode_calls().len();
        let version_before = c.active().version();

        let t0 = Instant::now();
        c.set_position(Position::new(0.1, 0.1), t0);
        c.set_position(Position::new(0.5, 0.2), t0 + Duration::from_millis(50));
        c.set_position(Position::new(0.9, 0.8), t0 + Duration::from_millis(100));

        // window still open
        c.poll(t0 + Duration::from_millis(150));
        assert!(!c.is_decoding());
        assert_eq!(c.status(), BlendStatus::Computing);

        let after = t0 + Duration::from_millis(100 + DEBOUNCE_MS + 1);
        assert!(settle_at(&mut c, after, ready));

        let calls = bridge.decode_calls();
        assert_eq!(&calls[calls_before..], &[(0.9f32, 0.8f32)]);
        assert_eq!(*c.active().load(), decoded_at(0.9, 0.8));
        assert_eq!(c.active().version(), version_before + 1);
    }

    #[test]
    fn encode_failure_never_decodes_again() {
        let bridge = ScriptedBridge::failing_encode();
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(bridge.clone()));
        assert!(settle(&mut c, |c| c.mode() == BlendMode::FallbackOnly));

        let t0 = Instant::now();
        for (i, (x, y)) in [(0.3, 0.3), (1.0, 0.0), (0.0, 1.0)].into_iter().enumerate() {
            let now = t0 + Duration::from_millis(200 * i as u64);
            c.set_position(Position::new(x, y), now);
            c.poll(now + Duration::from_millis(500));
        }
        assert_eq!(*c.active().load(), corner_fixture().c);
        c.replace_corner(CornerId::A, Pattern::empty());
        assert_eq!(bridge.encode_calls(), 1);
        assert!(bridge.decode_calls().is_empty());
        assert_eq!(c.mode(), BlendMode::FallbackOnly);
    }

    #[test]
    fn one_decode_failure_falls_back_for_that_call_only() {
        let bridge = ScriptedBridge::new();
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(bridge.clone()));
        assert!(settle(&mut c, ready));

        bridge.fail_next_decodes(1);
        let t0 = Instant::now();
        c.set_position(Position::new(1.0, 0.0), t0);
        assert!(settle_at(&mut c, t0 + Duration::from_millis(DEBOUNCE_MS), ready));
        assert_eq!(*c.active().load(), corner_fixture().b);
        assert_eq!(c.mode(), BlendMode::MlReady);

        let t1 = t0 + Duration::from_millis(1000);
        c.set_position(Position::new(0.4, 0.6), t1);
        assert!(settle_at(&mut c, t1 + Duration::from_millis(DEBOUNCE_MS), ready));
        assert_eq!(*c.active().load(), decoded_at(0.4, 0.6));
    }

    #[test]
    fn repeated_decode_failures_can_demote_when_configured() {
        let bridge = ScriptedBridge::new();
        let options = CoordinatorOptions {
            max_decode_failures: Some(2),
            ..CoordinatorOptions::default()
        };
        let mut c = coordinator(corner_fixture(), options);
        c.start(Box::new(bridge.clone()));
        assert!(settle(&mut c, ready));

        bridge.fail_next_decodes(5);
        let t0 = Instant::now();
        c.set_position(Position::new(0.0, 1.0), t0);
        assert!(settle_at(&mut c, t0 + Duration::from_millis(DEBOUNCE_MS), ready));
        let t1 = t0 + Duration::from_millis(500);
        c.set_position(Position::new(1.0, 1.0), t1);
        assert!(settle_at(&mut c, t1 + Duration::from_millis(DEBOUNCE_MS), |c| {
            c.mode() == BlendMode::FallbackOnly
        }));
        assert_eq!(*c.active().load(), corner_fixture().d);
    }

    #[test]
    fn superseded_decode_is_dropped() {
        let bridge = ScriptedBridge::new();
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(bridge.clone()));
        assert!(settle(&mut c, ready));

        let t0 = Instant::now();
        let p1_due = t0 + Duration::from_millis(DEBOUNCE_MS);
        c.set_position(Position::new(0.2, 0.2), t0);
        c.poll(p1_due);
        assert!(c.is_decoding());

        // move again before the first answer is picked up
        c.set_position(Position::new(0.7, 0.7), p1_due);
        let version = c.active().version();
        assert!(settle_at(&mut c, p1_due, |c| !c.is_decoding()));
        assert_eq!(c.active().version(), version);
        assert_ne!(*c.active().load(), decoded_at(0.2, 0.2));

        assert!(settle_at(&mut c, p1_due + Duration::from_millis(DEBOUNCE_MS), ready));
        assert_eq!(*c.active().load(), decoded_at(0.7, 0.7));
    }

    #[test]
    fn corner_swap_answers_immediately_and_reencodes() {
        let bridge = ScriptedBridge::new();
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(bridge.clone()));
        assert!(settle(&mut c, ready));

        let replacement = Pattern::from_steps(&[1, 5], &[9], &[]);
        c.replace_corner(CornerId::A, replacement.clone());
        assert_eq!(*c.active().load(), replacement);
        assert_eq!(c.status(), BlendStatus::Computing);

        assert!(settle(&mut c, ready));
        assert_eq!(bridge.encode_calls(), 2);
        assert_eq!(c.corners().a, replacement);
    }

    #[test]
    fn clear_silences_and_drops_in_flight_work() {
        let bridge = ScriptedBridge::new();
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(bridge.clone()));
        assert!(settle(&mut c, ready));

        let t0 = Instant::now();
        c.set_position(Position::new(0.5, 0.5), t0);
        c.poll(t0 + Duration::from_millis(DEBOUNCE_MS));
        c.clear();
        assert!(settle_at(&mut c, t0 + Duration::from_millis(DEBOUNCE_MS), |c| !c.is_decoding()));
        assert_eq!(*c.active().load(), Pattern::empty());
        assert_eq!(c.corners(), &corner_fixture());
    }

    #[test]
    fn disabling_ml_serves_the_blend() {
        let bridge = ScriptedBridge::new();
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(bridge.clone()));
        assert!(settle(&mut c, ready));

        c.set_ml_enabled(false, Instant::now());
        assert_eq!(c.status(), BlendStatus::Disabled);
        assert_eq!(*c.active().load(), corner_fixture().a);
        let calls = bridge.decode_calls().len();
        c.set_position(Position::new(1.0, 0.0), Instant::now());
        assert_eq!(*c.active().load(), corner_fixture().b);
        assert_eq!(bridge.decode_calls().len(), calls);

        c.set_ml_enabled(true, Instant::now());
        assert!(settle(&mut c, ready));
        assert_eq!(*c.active().load(), decoded_at(1.0, 0.0));
    }

    #[test]
    fn toggled_step_is_superseded_by_next_move() {
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(ScriptedBridge::failing_prepare()));
        assert!(settle(&mut c, |c| c.mode() == BlendMode::FallbackOnly));

        c.toggle_step(TrackId::Hat, 15);
        assert!(c.active().load().hat[15]);
        c.set_position(Position::new(0.0, 0.0), Instant::now());
        assert_eq!(*c.active().load(), corner_fixture().a);
    }

    #[test]
    fn shutdown_ignores_late_results() {
        let bridge = ScriptedBridge::new();
        let mut c = coordinator(corner_fixture(), CoordinatorOptions::default());
        c.start(Box::new(bridge.clone()));
        assert!(settle(&mut c, ready));

        let t0 = Instant::now();
        c.set_position(Position::new(0.6, 0.1), t0);
        c.poll(t0 + Duration::from_millis(DEBOUNCE_MS));
        let version = c.active().version();
        c.shutdown();
        std::thread::sleep(Duration::from_millis(30));
        c.poll(t0 + Duration::from_secs(1));
        c.set_position(Position::new(1.0, 1.0), t0 + Duration::from_secs(1));
        assert_eq!(c.active().version(), version);
    }

    #[test]
    fn dragging_between_scenario_corners() {
        let corners = scenario_corners();
        let mut c = coordinator(corners.clone(), CoordinatorOptions::default());
        c.start(Box::new(ScriptedBridge::failing_prepare()));
        assert!(settle(&mut c, |c| c.mode() == BlendMode::FallbackOnly));

        c.set_position(Position::new(0.0, 0.0), Instant::now());
        assert_eq!(*c.active().load(), corners.a);
        c.set_position(Position::new(1.0, 1.0), Instant::now());
        assert_eq!(*c.active().load(), corners.d);

        // only A has cells, so no cell reaches two votes
        c.set_position(Position::new(0.5, 0.5), Instant::now());
        let centre = c.active().load();
        for track in TrackId::ALL {
            for step in 0..STEPS_PER_PATTERN {
                let votes = CornerId::ALL.iter().filter(|&&id| corners.get(id).is_on(track, step)).count();
                assert_eq!(centre.is_on(track, step), votes >= 2);
            }
        }
    }
}
