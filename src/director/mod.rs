// Wave director - beat-driven, admission-controlled spawn scheduler
//
// Key features:
// - Beats become scheduled waves via weighted selection over eligible descriptors
// - Queue kept in spawn-time order; full queue drops the beat
// - Telegraphs fire ahead of spawns, spawns materialize through a Spawner
// - Heavy waves are capped by concurrency, cooldown and a trailing window
// - Prolonged silence injects a fallback wave so content never stalls
//
// Entry lifecycle: Queued -> Telegraphed -> Spawned -> Completed
// (or Dropped before queuing when the queue is full).

pub mod collaborators;
pub mod descriptor;
pub mod ledger;
pub mod selection;


pub use collaborators::{
    EntityHandle, EntityId, SpawnOptions, Spawner, StageProvider, Telegraph, TelegraphHandle,
    TelegraphOptions, WaveInstanceId, ENTITY_ID_KEY, WAVE_INSTANCE_KEY,
};
pub use descriptor::{Playlist, Point, TelegraphSpec, WaveCategory, WaveDescriptor, INTRO_TAG};
pub use ledger::{Rejection, Strictness};
pub use selection::{candidate_weight, pick_weighted};

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::analysis::Band;
use crate::clock::TimeSource;
use crate::config::DirectorConfig;
use crate::error::DirectorError;
use crate::telemetry;
use ledger::SchedulingLedger;

/// A wave waiting in the queue
pub struct ScheduledWave {
    pub instance_id: WaveInstanceId,
    pub descriptor: Arc<WaveDescriptor>,
    pub spawn_at_ms: f64,
    pub telegraph_at_ms: Option<f64>,
    pub telegraph_fired: bool,
    pub anchor: Point,
    /// Injected on silence rather than picked for a beat
    pub fallback: bool,
    /// Band of the triggering beat
    pub band: Option<Band>,
    telegraph: Option<Box<dyn TelegraphHandle>>,
}

impl std::fmt::Debug for ScheduledWave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledWave")
            .field("instance_id", &self.instance_id)
            .field("descriptor", &self.descriptor.id)
            .field("spawn_at_ms", &self.spawn_at_ms)
            .field("telegraph_at_ms", &self.telegraph_at_ms)
            .field("telegraph_fired", &self.telegraph_fired)
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// A spawned wave with enemies still alive
#[derive(Debug)]
struct ActiveWave {
    descriptor_id: String,
    heavy: bool,
    remaining: HashSet<EntityId>,
}

pub struct WaveDirector {
    config: DirectorConfig,
    playlist: Vec<Arc<WaveDescriptor>>,
    fallback: Option<Arc<WaveDescriptor>>,
    spawner: Box<dyn Spawner>,
    telegraph: Option<Box<dyn Telegraph>>,
    stage_provider: StageProvider,
    time_source: TimeSource,
    rng: StdRng,
    queue: VecDeque<ScheduledWave>,
    ledger: SchedulingLedger,
    active: HashMap<WaveInstanceId, ActiveWave>,
    entity_owner: HashMap<EntityId, WaveInstanceId>,
    next_instance: u64,
    next_entity: u64,
    created_at_ms: f64,
    last_beat_ms: Option<f64>,
    last_fallback_ms: Option<f64>,
}

impl WaveDirector {
    /// Build a director over `playlist`.
    ///
    /// # Errors
    /// Returns `DirectorError` for an invalid config or duplicate
    /// descriptor ids. An empty playlist is accepted: the director then
    /// only produces fallback spawns.
    pub fn new(
        config: DirectorConfig,
        playlist: Playlist,
        spawner: Box<dyn Spawner>,
        time_source: TimeSource,
    ) -> Result<Self, DirectorError> {
        config.validate()?;

        let mut seen = HashSet::new();
        for wave in &playlist.waves {
            if !seen.insert(wave.id.clone()) {
                return Err(DirectorError::DuplicateDescriptor {
                    id: wave.id.clone(),
                });
            }
            wave.validate()?;
        }
        if let Some(fallback) = &config.fallback {
            fallback.validate()?;
        }

        if playlist.is_empty() {
            log::warn!("[WaveDirector] Empty playlist, only fallback spawns will occur");
        } else {
            log::info!(
                "[WaveDirector] Loaded {} waves ({})",
                playlist.len(),
                playlist.difficulty
            );
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let fallback = config.fallback.clone().map(Arc::new);
        let created_at_ms = time_source();

        Ok(Self {
            playlist: playlist.waves.into_iter().map(Arc::new).collect(),
            fallback,
            spawner,
            telegraph: None,
            stage_provider: Box::new(|| 1),
            time_source,
            rng,
            queue: VecDeque::with_capacity(config.max_queue_depth),
            ledger: SchedulingLedger::default(),
            active: HashMap::new(),
            entity_owner: HashMap::new(),
            next_instance: 1,
            next_entity: 1,
            created_at_ms,
            last_beat_ms: None,
            last_fallback_ms: None,
            config,
        })
    }

    /// Attach the telegraph collaborator; without one, telegraph times
    /// still pass but nothing is shown.
    pub fn with_telegraph(mut self, telegraph: Box<dyn Telegraph>) -> Self {
        self.telegraph = Some(telegraph);
        self
    }

    pub fn set_stage_provider(&mut self, provider: impl Fn() -> u32 + Send + 'static) {
        self.stage_provider = Box::new(provider);
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn active_wave_count(&self) -> usize {
        self.active.len()
    }

    pub fn active_heavy_count(&self) -> u32 {
        self.ledger.active_heavy()
    }

    pub fn pending_heavy_count(&self) -> u32 {
        self.ledger.pending_heavy()
    }

    pub fn is_fallback_only(&self) -> bool {
        self.playlist.is_empty()
    }

    pub fn last_beat_ms(&self) -> Option<f64> {
        self.last_beat_ms
    }

    /// Queued entries in spawn order
    pub fn scheduled(&self) -> impl Iterator<Item = &ScheduledWave> {
        self.queue.iter()
    }

    /// Enemies still alive in a spawned wave
    pub fn wave_entities(&self, instance_id: WaveInstanceId) -> Option<Vec<EntityId>> {
        self.active.get(&instance_id).map(|wave| {
            let mut ids: Vec<EntityId> = wave.remaining.iter().copied().collect();
            ids.sort();
            ids
        })
    }

    /// Record a beat and, if the queue has room, schedule a wave for it.
    ///
    /// Returns the scheduled instance, or `None` when the beat was dropped
    /// or nothing in the playlist is eligible.
    pub fn enqueue_beat(&mut self, band: Band) -> Option<WaveInstanceId> {
        let now = (self.time_source)();
        self.last_beat_ms = Some(now);

        if self.queue.len() >= self.config.max_queue_depth {
            log::debug!(
                "[WaveDirector] Queue full ({}), dropping {} beat",
                self.queue.len(),
                band.as_str()
            );
            telemetry::hub().record_beat_dropped(band, self.queue.len());
            return None;
        }

        let stage = (self.stage_provider)();
        let descriptor = self.select(band, stage, now)?;
        Some(self.schedule(descriptor, now, Some(band), false))
    }

    /// Advance the director to the current time.
    ///
    /// Fires due telegraphs, spawns due waves, prunes the heavy window,
    /// then injects a fallback wave after prolonged silence. Returns the
    /// number of waves spawned.
    pub fn update(&mut self) -> usize {
        let now = (self.time_source)();
        let stage = (self.stage_provider)();

        self.fire_telegraphs(now);
        let mut spawned = self.drain_due(now, stage);
        self.ledger.prune(now, self.config.heavy.window_ms);

        if self.fallback_due(now) {
            if let Some(fallback) = self.fallback.clone() {
                log::info!(
                    "[WaveDirector] No beat for {:.0} ms, injecting fallback '{}'",
                    now - self.silence_origin(),
                    fallback.id
                );
                self.last_fallback_ms = Some(now);
                self.schedule(fallback, now, None, true);
                // Due immediately: its telegraph must still show before it spawns
                self.fire_telegraphs(now);
                spawned += self.drain_due(now, stage);
            }
        }

        spawned
    }

    /// Report an enemy as removed.
    ///
    /// Returns `false` for ids the director never assigned or already released.
    pub fn notify_enemy_destroyed(&mut self, entity_id: EntityId) -> bool {
        let Some(instance_id) = self.entity_owner.remove(&entity_id) else {
            return false;
        };

        let completed = match self.active.get_mut(&instance_id) {
            Some(wave) => {
                wave.remaining.remove(&entity_id);
                wave.remaining.is_empty()
            }
            None => false,
        };

        if completed {
            if let Some(wave) = self.active.remove(&instance_id) {
                if wave.heavy {
                    self.ledger.on_heavy_completed();
                }
                log::debug!(
                    "[WaveDirector] Wave {} ('{}') completed",
                    instance_id.0,
                    wave.descriptor_id
                );
                telemetry::hub().record_wave_completed(instance_id.0);
            }
        }

        true
    }

    fn select(&mut self, band: Band, stage: u32, now: f64) -> Option<Arc<WaveDescriptor>> {
        if self.playlist.is_empty() {
            return None;
        }

        let mut candidates = self.eligible(stage, now, Strictness::Strict);
        if candidates.is_empty() {
            candidates = self.eligible(stage, now, Strictness::Softened);
            if candidates.is_empty() {
                log::debug!(
                    "[WaveDirector] No eligible wave for {} beat at stage {}",
                    band.as_str(),
                    stage
                );
                return None;
            }
            log::debug!(
                "[WaveDirector] Strict admission empty, softened to {} candidates",
                candidates.len()
            );
        }

        let weights: Vec<f64> = candidates
            .iter()
            .map(|descriptor| candidate_weight(descriptor, &self.config, stage, band))
            .collect();
        let index = pick_weighted(&mut self.rng, &weights)?;
        candidates.get(index).cloned()
    }

    fn eligible(&self, stage: u32, now: f64, strictness: Strictness) -> Vec<Arc<WaveDescriptor>> {
        self.playlist
            .iter()
            .filter(|descriptor| {
                match self
                    .ledger
                    .admit(descriptor, stage, now, &self.config, strictness)
                {
                    Ok(()) => true,
                    Err(reason) => {
                        log::trace!(
                            "[WaveDirector] '{}' rejected ({:?}, {:?})",
                            descriptor.id,
                            strictness,
                            reason
                        );
                        false
                    }
                }
            })
            .cloned()
            .collect()
    }

    fn schedule(
        &mut self,
        descriptor: Arc<WaveDescriptor>,
        now: f64,
        band: Option<Band>,
        fallback: bool,
    ) -> WaveInstanceId {
        let instance_id = WaveInstanceId(self.next_instance);
        self.next_instance += 1;

        let spawn_at_ms = now + descriptor.effective_delay_ms(self.config.default_delay_ms);
        let lead = self.config.telegraph_lead_ms;
        let telegraph_at_ms = descriptor
            .telegraph
            .as_ref()
            .filter(|_| lead > 0.0)
            .map(|_| spawn_at_ms - lead);
        let anchor = descriptor.anchor.unwrap_or(self.config.spawn_anchor);

        self.ledger.on_scheduled(&descriptor, !fallback);
        log::debug!(
            "[WaveDirector] Scheduled '{}' as wave {} at {:.1} ms",
            descriptor.id,
            instance_id.0,
            spawn_at_ms
        );
        telemetry::hub().record_wave_scheduled(&descriptor.id, instance_id.0, spawn_at_ms, fallback);

        // Equal spawn times keep arrival order
        let position = self
            .queue
            .iter()
            .position(|entry| entry.spawn_at_ms > spawn_at_ms)
            .unwrap_or(self.queue.len());
        self.queue.insert(
            position,
            ScheduledWave {
                instance_id,
                descriptor,
                spawn_at_ms,
                telegraph_at_ms,
                telegraph_fired: false,
                anchor,
                fallback,
                band,
                telegraph: None,
            },
        );
        telemetry::hub().record_queue_depth(self.queue.len(), self.config.max_queue_depth);

        instance_id
    }

    fn fire_telegraphs(&mut self, now: f64) {
        for entry in self.queue.iter_mut() {
            let due = entry
                .telegraph_at_ms
                .map(|at| at <= now)
                .unwrap_or(false);
            if !due || entry.telegraph_fired {
                continue;
            }

            entry.telegraph_fired = true;
            if let Some(telegraph) = self.telegraph.as_mut() {
                let options = TelegraphOptions {
                    instance_id: entry.instance_id,
                    spawn_at_ms: entry.spawn_at_ms,
                    lead_ms: (entry.spawn_at_ms - now).max(0.0),
                };
                entry.telegraph = Some(telegraph.show(&entry.descriptor, entry.anchor, &options));
            }
        }
    }

    fn drain_due(&mut self, now: f64, stage: u32) -> usize {
        let mut spawned = 0;
        while self
            .queue
            .front()
            .map(|entry| entry.spawn_at_ms <= now)
            .unwrap_or(false)
        {
            if let Some(entry) = self.queue.pop_front() {
                self.spawn(entry, now, stage);
                spawned += 1;
            }
        }
        if spawned > 0 {
            telemetry::hub().record_queue_depth(self.queue.len(), self.config.max_queue_depth);
        }
        spawned
    }

    fn spawn(&mut self, mut entry: ScheduledWave, now: f64, stage: u32) {
        if let Some(mut handle) = entry.telegraph.take() {
            handle.destroy();
        }

        let options = SpawnOptions {
            instance_id: entry.instance_id,
            stage,
            fallback: entry.fallback,
            spawn_at_ms: entry.spawn_at_ms,
        };
        let entities = self
            .spawner
            .spawn_wave(&entry.descriptor, entry.anchor, &options);

        let mut remaining = HashSet::with_capacity(entities.len());
        for mut entity in entities {
            if !entity.is_active() {
                continue;
            }
            let entity_id = EntityId(self.next_entity);
            self.next_entity += 1;
            entity.set_data(ENTITY_ID_KEY, serde_json::json!(entity_id.0));
            entity.set_data(WAVE_INSTANCE_KEY, serde_json::json!(entry.instance_id.0));
            remaining.insert(entity_id);
            self.entity_owner.insert(entity_id, entry.instance_id);
        }

        let entity_count = remaining.len();
        let still_active = entity_count > 0;
        self.ledger.on_spawned(&entry.descriptor, now, still_active);

        log::debug!(
            "[WaveDirector] Spawned '{}' (wave {}, {} enemies{})",
            entry.descriptor.id,
            entry.instance_id.0,
            entity_count,
            if entry.fallback { ", fallback" } else { "" }
        );
        telemetry::hub().record_wave_spawned(&entry.descriptor.id, entry.instance_id.0, entity_count);

        if still_active {
            self.active.insert(
                entry.instance_id,
                ActiveWave {
                    descriptor_id: entry.descriptor.id.clone(),
                    heavy: entry.descriptor.is_heavy(),
                    remaining,
                },
            );
        } else {
            telemetry::hub().record_wave_completed(entry.instance_id.0);
        }
    }

    fn silence_origin(&self) -> f64 {
        self.last_beat_ms.unwrap_or(self.created_at_ms)
    }

    fn fallback_due(&self, now: f64) -> bool {
        if self.fallback.is_none() || self.queue.len() >= self.config.max_queue_depth {
            return false;
        }
        let cooldown = self.config.fallback_cooldown_ms;
        if now - self.silence_origin() <= cooldown {
            return false;
        }
        self.last_fallback_ms
            .map(|last| now - last > cooldown * self.config.fallback_refire_fraction)
            .unwrap_or(true)
    }
}
