//! Sequential mining back-end
//!
//! A single logical thread of control incrementing and hashing nonces. The
//! only suspension points are the throttled cooperative yields between
//! iterations; `stop` flips a flag observed at the top of the loop rather
//! than preempting. Progress survives interruption through periodic
//! checkpoints in the injected store.

use crate::core::hash::challenge_digest;
use crate::core::{Challenge, Difficulty, MinerPhase, MiningMode, MiningState, constants};
use crate::error::{Error, Result};
use crate::store::{CheckpointRecord, ProgressStore, ResultRecord};
use crate::utils::current_timestamp_ms;
use crate::workers::{
    HashRateMeter, Miner, MiningOutcome, ProgressSnapshot, restore_best, resume_point,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

/// Sequential miner configuration
#[derive(Debug, Clone)]
pub struct CpuMinerConfig {
    /// Nonces between checkpoint writes
    pub checkpoint_interval: u64,
    /// Nonces between cooperative yields to the scheduler
    pub yield_interval: u64,
    /// Minimum time between progress snapshots
    pub progress_interval: Duration,
}

impl Default for CpuMinerConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: constants::CPU_CHECKPOINT_INTERVAL,
            yield_interval: 256,
            progress_interval: Duration::from_millis(100),
        }
    }
}

/// Sequential mining worker
pub struct CpuMiner {
    config: CpuMinerConfig,
    store: Arc<dyn ProgressStore>,
    state: Mutex<Option<MiningState>>,
    phase: Mutex<MinerPhase>,
    is_running: Arc<AtomicBool>,
    meter: HashRateMeter,
    progress_tx: watch::Sender<ProgressSnapshot>,
}

impl CpuMiner {
    /// Create a sequential miner persisting through `store`
    pub fn new(config: CpuMinerConfig, store: Arc<dyn ProgressStore>) -> Self {
        let (progress_tx, _) = watch::channel(ProgressSnapshot::default());
        Self {
            config,
            store,
            state: Mutex::new(None),
            phase: Mutex::new(MinerPhase::Idle),
            is_running: Arc::new(AtomicBool::new(false)),
            meter: HashRateMeter::new(),
            progress_tx,
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> MinerPhase {
        *self.phase.lock()
    }

    /// Copy of the mining state for inspection
    pub fn state(&self) -> Option<MiningState> {
        self.state.lock().clone()
    }

    fn set_phase(&self, phase: MinerPhase) {
        *self.phase.lock() = phase;
    }

    fn checkpoint(
        &self,
        state: &MiningState,
        difficulty: Difficulty,
        digest_hex: &str,
    ) -> Result<()> {
        let mut record =
            CheckpointRecord::from_state(state, difficulty, None, current_timestamp_ms());
        record.digest_hex = digest_hex.to_string();
        self.store.save_checkpoint(&record)?;
        debug!(nonce = record.nonce, "checkpoint saved");
        Ok(())
    }

    fn publish(&self, state: &MiningState, digest_hex: &str, target_met: bool) {
        self.progress_tx.send_replace(ProgressSnapshot {
            nonce: state.current_nonce.value(),
            digest_hex: digest_hex.to_string(),
            hash_rate_per_second: self.meter.rate(),
            best_leading_zero_bits: state.best_leading_zero_bits,
            target_met,
        });
        *self.state.lock() = Some(state.clone());
    }
}

impl CpuMiner {
    async fn mine_inner(
        &self,
        challenge: &Challenge,
        difficulty: Difficulty,
        resume: bool,
    ) -> Result<Option<MiningOutcome>> {
        let mut state = MiningState::new(
            challenge.clone(),
            MiningMode::Sequential,
            current_timestamp_ms(),
        );
        state.is_active = true;

        if let Some(checkpoint) = resume_point(self.store.as_ref(), challenge, resume)? {
            info!(nonce = checkpoint.nonce, "resuming from checkpoint");
            state.advance_to(checkpoint.resume_nonce());
            restore_best(&mut state, &checkpoint);
        }

        self.set_phase(MinerPhase::Running);
        self.meter.reset();
        info!(%challenge, %difficulty, start = %state.current_nonce, "sequential mining started");

        let mut nonce = state.current_nonce;
        let mut last_digest_hex = String::new();
        let mut last_emit = Instant::now();

        loop {
            if !self.is_running.load(Ordering::Relaxed) {
                // cooperative stop: persist and park
                state.is_active = false;
                self.set_phase(MinerPhase::Paused);
                self.checkpoint(&state, difficulty, &last_digest_hex)?;
                self.publish(&state, &last_digest_hex, false);
                info!(nonce = %state.current_nonce, "sequential mining paused");
                return Ok(None);
            }

            let digest = challenge_digest(challenge, nonce);
            let leading_zero_bits = digest.leading_zero_bits();
            self.meter.record(1);
            last_digest_hex = digest.to_hex();

            if state.offer_best(nonce, digest, leading_zero_bits) {
                // a new best is worth keeping even across a crash
                self.checkpoint(&state, difficulty, &last_digest_hex)?;
            }

            if leading_zero_bits >= difficulty.bits() {
                let timestamp_ms = current_timestamp_ms();
                self.store.save_result(&ResultRecord::new(
                    challenge,
                    nonce,
                    &digest,
                    difficulty,
                    timestamp_ms,
                ))?;
                state.is_active = false;
                self.set_phase(MinerPhase::Completed);
                self.publish(&state, &last_digest_hex, true);
                info!(%nonce, digest = %last_digest_hex, "target difficulty met");
                return Ok(Some(MiningOutcome {
                    nonce,
                    digest,
                    leading_zero_bits,
                }));
            }

            let next = match nonce.checked_increment() {
                Ok(next) => next,
                Err(e) => {
                    state.is_active = false;
                    self.checkpoint(&state, difficulty, &last_digest_hex)?;
                    return Err(e);
                }
            };
            state.advance_to(next);

            if next.value() % self.config.checkpoint_interval.max(1) == 0 {
                self.checkpoint(&state, difficulty, &last_digest_hex)?;
            }
            if last_emit.elapsed() >= self.config.progress_interval {
                self.publish(&state, &last_digest_hex, false);
                last_emit = Instant::now();
            }
            if next.value() % self.config.yield_interval.max(1) == 0 {
                tokio::task::yield_now().await;
            }

            nonce = next;
        }
    }
}

#[async_trait]
impl Miner for CpuMiner {
    async fn mine(
        &self,
        challenge: &Challenge,
        difficulty: Difficulty,
        resume: bool,
    ) -> Result<Option<MiningOutcome>> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(Error::worker("already mining"));
        }
        let result = self.mine_inner(challenge, difficulty, resume).await;
        if result.is_err() {
            // the last checkpoint, if any, is untouched
            self.set_phase(MinerPhase::Paused);
        }
        self.is_running.store(false, Ordering::SeqCst);
        result
    }

    async fn stop(&self) -> Result<()> {
        self.is_running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn mode(&self) -> MiningMode {
        MiningMode::Sequential
    }

    fn progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    async fn hashrate(&self) -> u64 {
        self.meter.rate()
    }
}
