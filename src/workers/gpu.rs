//! Parallel mining back-end using wgpu
//!
//! The host compiles the compute kernel once, allocates fixed buffers, and
//! then drives one batch at a time: upload parameters, dispatch, await the
//! readback, merge the batch best into the mining state, issue the next
//! batch. Batches never overlap, so memory stays bounded and cancellation is
//! a check between dispatches; an in-flight batch always completes.

use crate::core::{
    Challenge, Difficulty, Digest, MinerPhase, MiningMode, MiningState, Nonce, NonceWords,
    constants,
};
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

/// Lanes per workgroup; must match `@workgroup_size` in the shader
const WORKGROUP_SIZE: u32 = 256;

/// Words in the fixed challenge buffer (4 bytes each)
const CHALLENGE_WORDS: usize = constants::MAX_CHALLENGE_LEN / 4;

/// Parallel miner configuration
#[derive(Debug, Clone)]
pub struct GpuMinerConfig {
    /// Device index to use (None = auto-select, preferring a discrete GPU)
    pub device_index: Option<usize>,
    /// Upper bound on nonces per dispatch
    pub max_batch_size: u32,
    /// Nonces between checkpoint writes
    pub checkpoint_interval: u64,
    /// Minimum time between progress snapshots
    pub progress_interval: Duration,
}

impl Default for GpuMinerConfig {
    fn default() -> Self {
        Self {
            device_index: None,
            max_batch_size: 1 << 24,
            checkpoint_interval: constants::GPU_CHECKPOINT_INTERVAL,
            progress_interval: Duration::from_millis(100),
        }
    }
}

/// Uniform parameter block for one dispatch (16-byte aligned)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BatchParams {
    start_lo: u32,
    start_hi: u32,
    count: u32,
    challenge_len: u32,
    _pad: [u32; 4],
}

/// Best result of one batch, read back from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBest {
    /// Leading zero bits of the batch's best digest
    pub leading_zero_bits: u32,
    /// Nonce that produced it
    pub nonce: Nonce,
    /// The digest itself
    pub digest: Digest,
}

/// Parallel mining worker
pub struct GpuMiner {
    config: GpuMinerConfig,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    params_buffer: wgpu::Buffer,
    challenge_buffer: wgpu::Buffer,
    best_digest_buffer: wgpu::Buffer,
    best_info_buffer: wgpu::Buffer,
    digest_staging: wgpu::Buffer,
    info_staging: wgpu::Buffer,
    challenge_len: Mutex<Option<u32>>,
    recommended_batch: u32,
    adapter_name: String,
    state: Mutex<Option<MiningState>>,
    phase: Mutex<MinerPhase>,
    is_running: Arc<AtomicBool>,
    meter: HashRateMeter,
    progress_tx: watch::Sender<ProgressSnapshot>,
    store: Arc<dyn ProgressStore>,
}

impl GpuMiner {
    /// Initialize the device, compile the kernel, and allocate fixed buffers
    ///
    /// Fails with [`Error::AcceleratorUnsupported`] when no adapter exists
    /// and [`Error::Gpu`] when device or kernel setup fails; either way the
    /// caller should fall back to the sequential miner.
    pub async fn new(config: GpuMinerConfig, store: Arc<dyn ProgressStore>) -> Result<Self> {
        info!("Initializing wgpu mining worker");

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapters: Vec<_> = instance.enumerate_adapters(wgpu::Backends::all());
        if adapters.is_empty() {
            return Err(Error::accelerator_unsupported("no GPU adapters found"));
        }

        let adapter = if let Some(index) = config.device_index {
            adapters.get(index).ok_or_else(|| {
                Error::accelerator_unsupported(format!("GPU device index {} not found", index))
            })?
        } else {
            // auto-select: prefer a discrete GPU
            adapters
                .iter()
                .find(|a| a.get_info().device_type == wgpu::DeviceType::DiscreteGpu)
                .unwrap_or(&adapters[0])
        };

        let adapter_info = adapter.get_info();
        info!(
            "Selected GPU: {} ({:?})",
            adapter_info.name, adapter_info.device_type
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("PoW Mining GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| Error::gpu(format!("failed to request GPU device: {}", e)))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sha256d Mining Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/sha256d.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mining Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mining Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Sha256d Mining Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Params Buffer"),
            size: std::mem::size_of::<BatchParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let challenge_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Challenge Buffer"),
            size: (CHALLENGE_WORDS * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let best_digest_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Best Digest Buffer"),
            size: 32,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let best_info_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Best Info Buffer"),
            size: 16,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let digest_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Digest Staging Buffer"),
            size: 32,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let info_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Info Staging Buffer"),
            size: 16,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mining Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: challenge_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: best_digest_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: best_info_buffer.as_entire_binding(),
                },
            ],
        });

        let limits = device.limits();
        let recommended_batch = config
            .max_batch_size
            .min(WORKGROUP_SIZE.saturating_mul(limits.max_compute_workgroups_per_dimension));

        let (progress_tx, _) = watch::channel(ProgressSnapshot::default());
        Ok(Self {
            config,
            device,
            queue,
            pipeline,
            bind_group,
            params_buffer,
            challenge_buffer,
            best_digest_buffer,
            best_info_buffer,
            digest_staging,
            info_staging,
            challenge_len: Mutex::new(None),
            recommended_batch,
            adapter_name: adapter_info.name,
            state: Mutex::new(None),
            phase: Mutex::new(MinerPhase::Idle),
            is_running: Arc::new(AtomicBool::new(false)),
            meter: HashRateMeter::new(),
            progress_tx,
            store,
        })
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> MinerPhase {
        *self.phase.lock()
    }

    /// Copy of the mining state for inspection
    pub fn state(&self) -> Option<MiningState> {
        self.state.lock().clone()
    }

    /// Nonces evaluated per dispatch on this device
    pub fn recommended_batch_size(&self) -> u32 {
        self.recommended_batch
    }

    /// Upload challenge bytes; done once per challenge, not per batch
    pub fn set_challenge(&self, challenge: &Challenge) -> Result<()> {
        let bytes = challenge.as_bytes();
        if bytes.len() > constants::MAX_CHALLENGE_LEN {
            return Err(Error::invalid_challenge(format!(
                "challenge is {} bytes, kernel supports at most {}",
                bytes.len(),
                constants::MAX_CHALLENGE_LEN
            )));
        }
        let mut words = [0u32; CHALLENGE_WORDS];
        for (i, chunk) in bytes.chunks(4).enumerate() {
            let mut word = 0u32;
            for (j, &byte) in chunk.iter().enumerate() {
                word |= (byte as u32) << (24 - 8 * j as u32);
            }
            words[i] = word;
        }
        self.queue
            .write_buffer(&self.challenge_buffer, 0, bytemuck::cast_slice(&words));
        *self.challenge_len.lock() = Some(bytes.len() as u32);
        Ok(())
    }

    /// Evaluate `count` nonces starting at `start` in one dispatch
    ///
    /// Returns the batch's best result, or `None` when no lane produced a
    /// digest with at least one leading zero bit. The dispatch and readback
    /// complete before this returns; batches never overlap.
    pub async fn compute_batch(&self, start: Nonce, count: u32) -> Result<Option<BatchBest>> {
        let challenge_len = (*self.challenge_len.lock())
            .ok_or_else(|| Error::worker("set_challenge must be called before compute_batch"))?;

        let words = start.to_words();
        let params = BatchParams {
            start_lo: words.lo,
            start_hi: words.hi,
            count,
            challenge_len,
            _pad: [0; 4],
        };
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
        // fresh best reduction per dispatch
        self.queue
            .write_buffer(&self.best_info_buffer, 0, bytemuck::cast_slice(&[0u32; 4]));
        self.queue
            .write_buffer(&self.best_digest_buffer, 0, bytemuck::cast_slice(&[0u32; 8]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Mining Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Mining Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            let num_groups = count.div_ceil(WORKGROUP_SIZE);
            pass.dispatch_workgroups(num_groups, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&self.best_digest_buffer, 0, &self.digest_staging, 0, 32);
        encoder.copy_buffer_to_buffer(&self.best_info_buffer, 0, &self.info_staging, 0, 16);
        self.queue.submit(std::iter::once(encoder.finish()));

        let digest_slice = self.digest_staging.slice(..);
        let info_slice = self.info_staging.slice(..);
        let (digest_tx, digest_rx) = tokio::sync::oneshot::channel();
        let (info_tx, info_rx) = tokio::sync::oneshot::channel();
        digest_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = digest_tx.send(result);
        });
        info_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = info_tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        digest_rx
            .await
            .map_err(|_| Error::gpu("readback channel closed"))?
            .map_err(|e| Error::gpu(format!("failed to map digest buffer: {:?}", e)))?;
        info_rx
            .await
            .map_err(|_| Error::gpu("readback channel closed"))?
            .map_err(|e| Error::gpu(format!("failed to map info buffer: {:?}", e)))?;

        let best = {
            let digest_view = digest_slice.get_mapped_range();
            let info_view = info_slice.get_mapped_range();
            let digest_words: &[u32] = bytemuck::cast_slice(&digest_view);
            let info_words: &[u32] = bytemuck::cast_slice(&info_view);

            let leading_zero_bits = info_words[0];
            if leading_zero_bits == 0 {
                None
            } else {
                let mut bytes = [0u8; 32];
                for (i, word) in digest_words.iter().enumerate() {
                    bytes[i * 4..(i + 1) * 4].copy_from_slice(&word.to_be_bytes());
                }
                let nonce = NonceWords {
                    lo: info_words[1],
                    hi: info_words[2],
                }
                .to_nonce();
                Some(BatchBest {
                    leading_zero_bits,
                    nonce,
                    digest: Digest::from_bytes(bytes),
                })
            }
        };
        self.digest_staging.unmap();
        self.info_staging.unmap();

        self.meter.record(count as u64);
        Ok(best)
    }

    fn set_phase(&self, phase: MinerPhase) {
        *self.phase.lock() = phase;
    }

    fn checkpoint(&self, state: &MiningState, difficulty: Difficulty) -> Result<()> {
        let record = CheckpointRecord::from_state(
            state,
            difficulty,
            state.best_digest.as_ref(),
            current_timestamp_ms(),
        );
        self.store.save_checkpoint(&record)?;
        debug!(nonce = record.nonce, "checkpoint saved");
        Ok(())
    }

    fn publish(&self, state: &MiningState, last_nonce: Nonce, digest_hex: &str, target_met: bool) {
        self.progress_tx.send_replace(ProgressSnapshot {
            nonce: last_nonce.value(),
            digest_hex: digest_hex.to_string(),
            hash_rate_per_second: self.meter.rate(),
            best_leading_zero_bits: state.best_leading_zero_bits,
            target_met,
        });
        *self.state.lock() = Some(state.clone());
    }
}

impl GpuMiner {
    async fn mine_inner(
        &self,
        challenge: &Challenge,
        difficulty: Difficulty,
        resume: bool,
    ) -> Result<Option<MiningOutcome>> {
        self.set_challenge(challenge)?;

        let mut state = MiningState::new(
            challenge.clone(),
            MiningMode::Parallel,
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
        info!(
            %challenge, %difficulty, start = %state.current_nonce,
            adapter = %self.adapter_name, batch = self.recommended_batch,
            "parallel mining started"
        );

        let mut last_checkpoint_nonce = state.current_nonce.value();
        let mut last_emit = Instant::now();
        let mut last_digest_hex = String::new();

        loop {
            // cancellation is immediate between batches only
            if !self.is_running.load(Ordering::Relaxed) {
                state.is_active = false;
                self.set_phase(MinerPhase::Paused);
                self.checkpoint(&state, difficulty)?;
                self.publish(&state, state.current_nonce, &last_digest_hex, false);
                info!(nonce = %state.current_nonce, "parallel mining paused");
                return Ok(None);
            }

            let start = state.current_nonce;
            let remaining = u64::MAX - start.value();
            if remaining == 0 {
                state.is_active = false;
                self.checkpoint(&state, difficulty)?;
                return Err(Error::NonceRangeExhausted(start.value()));
            }
            // cap so start + count never wraps the 64-bit boundary
            let count = (self.recommended_batch as u64).min(remaining) as u32;

            let batch_best = self.compute_batch(start, count).await?;
            let last_nonce = Nonce::new(start.value() + count as u64 - 1);

            if let Some(best) = batch_best {
                last_digest_hex = best.digest.to_hex();
                if state.offer_best(best.nonce, best.digest, best.leading_zero_bits) {
                    // keep a fresh best across crashes
                    self.checkpoint(&state, difficulty)?;
                    last_checkpoint_nonce = state.current_nonce.value();
                }

                if best.leading_zero_bits >= difficulty.bits() {
                    self.store.save_result(&ResultRecord::new(
                        challenge,
                        best.nonce,
                        &best.digest,
                        difficulty,
                        current_timestamp_ms(),
                    ))?;
                    state.is_active = false;
                    self.set_phase(MinerPhase::Completed);
                    self.publish(&state, best.nonce, &last_digest_hex, true);
                    info!(nonce = %best.nonce, digest = %last_digest_hex, "target difficulty met");
                    return Ok(Some(MiningOutcome {
                        nonce: best.nonce,
                        digest: best.digest,
                        leading_zero_bits: best.leading_zero_bits,
                    }));
                }
            }

            state.advance_to(Nonce::new(start.value() + count as u64));

            if state.current_nonce.value() - last_checkpoint_nonce >= self.config.checkpoint_interval
            {
                self.checkpoint(&state, difficulty)?;
                last_checkpoint_nonce = state.current_nonce.value();
            }
            if last_emit.elapsed() >= self.config.progress_interval {
                self.publish(&state, last_nonce, &last_digest_hex, false);
                last_emit = Instant::now();
            }
        }
    }
}

#[async_trait]
impl Miner for GpuMiner {
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
        MiningMode::Parallel
    }

    fn progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    async fn hashrate(&self) -> u64 {
        self.meter.rate()
    }
}

/// Enumerate available GPU devices
pub fn enumerate_gpus() -> Vec<(usize, String, wgpu::DeviceType)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .enumerate()
        .map(|(i, adapter)| {
            let info = adapter.get_info();
            (i, info.name, info.device_type)
        })
        .collect()
}

/// Capability probe: whether any adapter is present
///
/// A `true` answer does not guarantee device creation succeeds; callers must
/// still fall back to the sequential miner when [`GpuMiner::new`] fails.
pub fn is_supported() -> bool {
    !enumerate_gpus().is_empty()
}
