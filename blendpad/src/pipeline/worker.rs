// Runs the latent bridge off the UI thread. Jobs go in over one channel,
// replies come back over another and are polled once per UI frame, same
// shape as the audio engine's command channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use super::latent::{LatentBridge, LatentBundle};
use super::pattern::{Corners, Pattern};
use crate::error::BlendError;
use crate::shared::{DECODE_TEMPERATURE, Position};

#[derive(Clone, Debug)]
pub enum LatentJob {
    Prepare,
    Encode { revision: u64, corners: Corners },
    Decode { seq: u64, latents: Arc<LatentBundle>, position: Position },
}

#[derive(Clone, Debug)]
pub enum LatentReply {
    Prepared(Result<(), BlendError>),
    Encoded { revision: u64, result: Result<LatentBundle, BlendError> },
    Decoded { seq: u64, position: Position, result: Result<Pattern, BlendError> },
}

pub struct LatentWorker {
    job_tx: Option<Sender<LatentJob>>,
    reply_rx: Receiver<LatentReply>,
    cancelled: Arc<AtomicBool>,
    _thread: JoinHandle<()>,
}

impl LatentWorker {
    pub fn spawn(mut bridge: Box<dyn LatentBridge>) -> std::io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<LatentJob>();
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded::<LatentReply>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let thread = std::thread::Builder::new()
            .name("latent-worker".into())
            .spawn(move || {
                for job in job_rx.iter() {
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    let reply = run_job(bridge.as_mut(), job);
                    // a late answer after teardown is dropped here
                    if flag.load(Ordering::Acquire) || reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                log::debug!("latent worker exiting");
            })?;

        Ok(Self {
            job_tx: Some(job_tx),
            reply_rx,
            cancelled,
            _thread: thread,
        })
    }

    /// False when the worker is gone or cancelled.
    pub fn submit(&self, job: LatentJob) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return false;
        }
        match &self.job_tx {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    pub fn try_recv(&self) -> Option<LatentReply> {
        if self.cancelled.load(Ordering::Acquire) {
            return None;
        }
        self.reply_rx.try_recv().ok()
    }

    /// Flags in-flight work as cancelled and lets the thread wind down on
    /// its own; a slow network call is never joined from the UI thread.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.job_tx = None;
    }
}

impl Drop for LatentWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_job(bridge: &mut dyn LatentBridge, job: LatentJob) -> LatentReply {
    match job {
        LatentJob::Prepare => LatentReply::Prepared(bridge.prepare()),
        LatentJob::Encode { revision, corners } => LatentReply::Encoded {
            revision,
            result: bridge.encode(&corners),
        },
        LatentJob::Decode { seq, latents, position } => LatentReply::Decoded {
            seq,
            position,
            result: bridge.decode(&latents, position.x, position.y, DECODE_TEMPERATURE),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_fixture::{ScriptedBridge, wait_for};
    use std::time::Duration;

    #[test]
    fn replies_follow_jobs() {
        let bridge = ScriptedBridge::new();
        let worker = LatentWorker::spawn(Box::new(bridge.clone())).unwrap();
        assert!(worker.submit(LatentJob::Prepare));
        let reply = wait_for(|| worker.try_recv(), Duration::from_secs(2)).unwrap();
        assert!(matches!(reply, LatentReply::Prepared(Ok(()))));

        assert!(worker.submit(LatentJob::Encode { revision: 7, corners: Corners::default() }));
        let reply = wait_for(|| worker.try_recv(), Duration::from_secs(2)).unwrap();
        match reply {
            LatentReply::Encoded { revision, result } => {
                assert_eq!(revision, 7);
                assert!(result.is_ok());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cancelled_worker_takes_no_jobs() {
        let mut worker = LatentWorker::spawn(Box::new(ScriptedBridge::new())).unwrap();
        worker.cancel();
        assert!(!worker.submit(LatentJob::Prepare));
        assert!(worker.try_recv().is_none());
    }
}
