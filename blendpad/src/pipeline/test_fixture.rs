// Purely for testing: a scripted latent bridge and a few corner sets.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::latent::{LatentBridge, LatentBundle};
use super::pattern::{Corners, Pattern};
use crate::error::BlendError;

#[derive(Default)]
pub struct Script {
    pub fail_prepare: bool,
    pub fail_encode: bool,
    pub fail_next_decodes: u32,
    pub encode_calls: usize,
    pub decode_calls: Vec<(f32, f32)>,
}

/// Clones share one script, so a test keeps a handle after the bridge
/// moves onto the worker thread.
#[derive(Clone, Default)]
pub struct ScriptedBridge {
    pub script: Arc<Mutex<Script>>,
}

impl ScriptedBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_prepare() -> Self {
        let b = Self::new();
        b.script.lock().unwrap().fail_prepare = true;
        b
    }

    pub fn failing_encode() -> Self {
        let b = Self::new();
        b.script.lock().unwrap().fail_encode = true;
        b
    }

    pub fn fail_next_decodes(&self, n: u32) {
        self.script.lock().unwrap().fail_next_decodes = n;
    }

    pub fn decode_calls(&self) -> Vec<(f32, f32)> {
        self.script.lock().unwrap().decode_calls.clone()
    }

    pub fn encode_calls(&self) -> usize {
        self.script.lock().unwrap().encode_calls
    }
}

/// What the scripted model "decodes" at a position. Every kick step is on,
/// which no fixture corner has, so it can't be mistaken for a blend.
pub fn decoded_at(x: f32, y: f32) -> Pattern {
    let mut p = Pattern::from_steps(&(0..16).collect::<Vec<_>>(), &[], &[]);
    p.hat[(x * 15.0).round() as usize] = true;
    p.snare[(y * 15.0).round() as usize] = true;
    p
}

impl LatentBridge for ScriptedBridge {
    fn prepare(&mut self) -> Result<(), BlendError> {
        if self.script.lock().unwrap().fail_prepare {
            return Err(BlendError::ModelUnavailable("scripted".into()));
        }
        Ok(())
    }

    fn encode(&self, _corners: &Corners) -> Result<LatentBundle, BlendError> {
        let mut s = self.script.lock().unwrap();
        s.encode_calls += 1;
        if s.fail_encode {
            return Err(BlendError::EncodeFailure("scripted".into()));
        }
        Ok(LatentBundle { a: vec![0.0; 4], b: vec![1.0; 4], c: vec![2.0; 4], d: vec![3.0; 4] })
    }

    fn decode(&self, _latents: &LatentBundle, x: f32, y: f32, _temperature: f32) -> Result<Pattern, BlendError> {
        let mut s = self.script.lock().unwrap();
        s.decode_calls.push((x, y));
        if s.fail_next_decodes > 0 {
            s.fail_next_decodes -= 1;
            return Err(BlendError::DecodeFailure("scripted".into()));
        }
        Ok(decoded_at(x, y))
    }
}

/// Four distinct corners with overlapping cells.
pub fn corner_fixture() -> Corners {
    Corners::new([
        Pattern::from_steps(&[0, 4, 8, 12], &[4, 12], &[0, 2, 4, 6]),
        Pattern::from_steps(&[0, 8], &[4, 12], &[8, 10, 12, 14]),
        Pattern::from_steps(&[0, 3, 10], &[6, 12], &[0, 4, 8, 12]),
        Pattern::from_steps(&[2, 4], &[12, 15], &[1, 5, 9, 13]),
    ])
}

/// A = kick on 0/4/8/12 only, every other corner silent.
pub fn scenario_corners() -> Corners {
    Corners::new([
        Pattern::from_steps(&[0, 4, 8, 12], &[], &[]),
        Pattern::empty(),
        Pattern::empty(),
        Pattern::empty(),
    ])
}

/// Poll `f` until it yields or the deadline passes.
pub fn wait_for<T>(mut f: impl FnMut() -> Option<T>, timeout: Duration) -> Option<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(v) = f() {
            return Some(v);
        }
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}
