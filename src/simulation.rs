//! Offline frame-loop simulation.
//!
//! Wires a [`ManualClock`], a PCM feed, the analyzer, conductor, judge and
//! wave director together in per-frame order (analyze, schedule, update,
//! retire enemies) with recording collaborators standing in for the game.
//! Used by the CLI `simulate` command and by integration tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::analysis::{AudioAnalyzer, Band, BeatEvent, BeatJudge, Judgment, PcmFeed};
use crate::audio::{render_drum_track, Conductor};
use crate::clock::ManualClock;
use crate::config::AppConfig;
use crate::director::{
    EntityHandle, EntityId, Playlist, Point, SpawnOptions, Spawner, Telegraph, TelegraphHandle,
    TelegraphOptions, WaveDescriptor, WaveDirector, WaveInstanceId,
};
use crate::error::DirectorError;
use crate::telemetry;

/// Entity handed out by [`RecordingSpawner`]
#[derive(Debug, Clone, Default)]
pub struct SimEntity {
    data: HashMap<String, serde_json::Value>,
    active: bool,
    position: Point,
}

impl SimEntity {
    pub fn new(position: Point) -> Self {
        Self {
            data: HashMap::new(),
            active: true,
            position,
        }
    }

    /// An entity that died during its own spawn
    pub fn inactive(position: Point) -> Self {
        Self {
            active: false,
            ..Self::new(position)
        }
    }
}

impl EntityHandle for SimEntity {
    fn data(&self, key: &str) -> Option<serde_json::Value> {
        self.data.get(key).cloned()
    }

    fn set_data(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.to_string(), value);
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn position(&self) -> Point {
        self.position
    }
}

/// One `spawn_wave` call as seen by the spawner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRecord {
    pub descriptor_id: String,
    pub instance_id: u64,
    pub spawn_at_ms: f64,
    pub stage: u32,
    pub fallback: bool,
    pub entity_count: usize,
}

/// Shared log of spawn calls; clones see the same records.
#[derive(Debug, Clone, Default)]
pub struct SpawnLog {
    records: Arc<Mutex<Vec<SpawnRecord>>>,
}

impl SpawnLog {
    pub fn records(&self) -> Vec<SpawnRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn descriptor_ids(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|record| record.descriptor_id)
            .collect()
    }

    fn push(&self, record: SpawnRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

/// Spawner that materializes `descriptor.count` entities in a row and logs the call
pub struct RecordingSpawner {
    log: SpawnLog,
    spacing: f32,
}

impl RecordingSpawner {
    pub fn new(log: SpawnLog) -> Self {
        Self { log, spacing: 0.05 }
    }
}

impl Spawner for RecordingSpawner {
    fn spawn_wave(
        &mut self,
        descriptor: &WaveDescriptor,
        anchor: Point,
        options: &SpawnOptions,
    ) -> Vec<Box<dyn EntityHandle>> {
        let entities: Vec<Box<dyn EntityHandle>> = (0..descriptor.count)
            .map(|i| {
                let position = Point::new(anchor.x + i as f32 * self.spacing, anchor.y);
                Box::new(SimEntity::new(position)) as Box<dyn EntityHandle>
            })
            .collect();

        self.log.push(SpawnRecord {
            descriptor_id: descriptor.id.clone(),
            instance_id: options.instance_id.0,
            spawn_at_ms: options.spawn_at_ms,
            stage: options.stage,
            fallback: options.fallback,
            entity_count: entities.len(),
        });
        entities
    }
}

/// One telegraph shown by [`RecordingTelegraph`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegraphRecord {
    pub descriptor_id: String,
    pub instance_id: u64,
    pub spawn_at_ms: f64,
    pub lead_ms: f64,
}

/// Telegraph collaborator that records shows and counts destroyed handles
#[derive(Debug, Clone, Default)]
pub struct RecordingTelegraph {
    shown: Arc<Mutex<Vec<TelegraphRecord>>>,
    destroyed: Arc<AtomicUsize>,
}

impl RecordingTelegraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<TelegraphRecord> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::Relaxed)
    }
}

struct RecordedTelegraphHandle {
    destroyed: Arc<AtomicUsize>,
    alive: bool,
}

impl TelegraphHandle for RecordedTelegraphHandle {
    fn destroy(&mut self) {
        if self.alive {
            self.alive = false;
            self.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Telegraph for RecordingTelegraph {
    fn show(
        &mut self,
        descriptor: &WaveDescriptor,
        _position: Point,
        options: &TelegraphOptions,
    ) -> Box<dyn TelegraphHandle> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TelegraphRecord {
                descriptor_id: descriptor.id.clone(),
                instance_id: options.instance_id.0,
                spawn_at_ms: options.spawn_at_ms,
                lead_ms: options.lead_ms,
            });
        Box::new(RecordedTelegraphHandle {
            destroyed: Arc::clone(&self.destroyed),
            alive: true,
        })
    }
}

/// Knobs for a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    pub duration_ms: f64,
    pub frame_ms: f64,
    pub sample_rate: u32,
    /// Stage reported by the stage provider
    pub stage: u32,
    /// Enemies are reported destroyed this long after spawning
    pub enemy_lifetime_ms: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            duration_ms: 16_000.0,
            frame_ms: 1000.0 / 60.0,
            sample_rate: 44_100,
            stage: 1,
            enemy_lifetime_ms: 3000.0,
        }
    }
}

/// Verdict counts over the run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgmentTally {
    pub perfect: usize,
    pub normal: usize,
    pub miss: usize,
}

impl JudgmentTally {
    fn add(&mut self, judgment: Judgment) {
        match judgment {
            Judgment::Perfect => self.perfect += 1,
            Judgment::Normal => self.normal += 1,
            Judgment::Miss => self.miss += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub frames: usize,
    pub beats_by_band: BTreeMap<Band, usize>,
    pub bar_starts: u64,
    /// Conductor phase judged at each low-band beat
    pub judgments: JudgmentTally,
    pub spawns: Vec<SpawnRecord>,
    pub fallback_spawns: usize,
    pub telegraphs: Vec<TelegraphRecord>,
    pub enemies_destroyed: usize,
    pub final_queue_len: usize,
    pub final_active_waves: usize,
}

/// Simulate the synthetic drum track at the configured tempo.
pub fn run_simulation(
    config: &AppConfig,
    playlist: Playlist,
    params: &SimulationParams,
) -> Result<SimulationReport, DirectorError> {
    let pcm = render_drum_track(config.conductor.bpm, params.duration_ms, params.sample_rate);
    run_simulation_with_pcm(config, playlist, params, &pcm)
}

/// Simulate an arbitrary mono PCM signal at `params.sample_rate`.
pub fn run_simulation_with_pcm(
    config: &AppConfig,
    playlist: Playlist,
    params: &SimulationParams,
    pcm: &[f32],
) -> Result<SimulationReport, DirectorError> {
    let clock = ManualClock::new(0.0);
    let spawn_log = SpawnLog::default();
    let telegraph = RecordingTelegraph::new();

    let mut director = WaveDirector::new(
        config.director.clone(),
        playlist,
        Box::new(RecordingSpawner::new(spawn_log.clone())),
        clock.source(),
    )?
    .with_telegraph(Box::new(telegraph.clone()));
    let stage = params.stage;
    director.set_stage_provider(move || stage);

    let mut conductor = Conductor::from_config(&config.conductor, clock.source());
    let judge = BeatJudge::for_conductor(&conductor, &config.judge);

    let mut analyzer = AudioAnalyzer::new(config.analyzer.clone(), clock.source());
    let beats: Arc<Mutex<Vec<BeatEvent>>> = Arc::new(Mutex::new(Vec::new()));
    for band in Band::ALL {
        let sink = Arc::clone(&beats);
        analyzer.subscribe(band, move |event| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(*event);
        });
    }

    let mut feed = PcmFeed::new(params.sample_rate, config.analyzer.fft_size);
    analyzer.attach_to_source(&mut feed);

    let frame_ms = if params.frame_ms.is_finite() && params.frame_ms > 0.0 {
        params.frame_ms
    } else {
        SimulationParams::default().frame_ms
    };
    let frames = (params.duration_ms.max(0.0) / frame_ms).ceil() as usize;
    let beats_per_bar = conductor.beats_per_bar() as usize;

    let mut report = SimulationReport {
        frames,
        beats_by_band: Band::ALL.iter().map(|band| (*band, 0)).collect(),
        bar_starts: 0,
        judgments: JudgmentTally::default(),
        spawns: Vec::new(),
        fallback_spawns: 0,
        telegraphs: Vec::new(),
        enemies_destroyed: 0,
        final_queue_len: 0,
        final_active_waves: 0,
    };

    let mut low_beats = 0usize;
    let mut seen_spawns = 0usize;
    let mut pending_kills: Vec<(f64, EntityId)> = Vec::new();
    let mut cursor = 0usize;

    for frame in 0..frames {
        clock.advance(frame_ms);
        let now = clock.now();

        let end = ((now / 1000.0) * params.sample_rate as f64).round() as usize;
        let end = end.min(pcm.len());
        if end > cursor {
            feed.push(&pcm[cursor..end]);
            cursor = end;
        }

        if !analyzer.is_started() {
            analyzer.attach_to_source(&mut feed);
        }
        analyzer.update();

        let frame_beats: Vec<BeatEvent> = std::mem::take(
            &mut *beats.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for beat in frame_beats {
            *report.beats_by_band.entry(beat.band).or_insert(0) += 1;
            director.enqueue_beat(beat.band);

            if beat.band == Band::Low {
                if low_beats % beats_per_bar == 0 {
                    conductor.signal_bar_start();
                    report.bar_starts += 1;
                }
                low_beats += 1;

                let outcome = judge.judge_with_distance();
                report.judgments.add(outcome.judgment);
                telemetry::hub().record_judgment(&outcome);
            }
        }

        director.update();

        let records = spawn_log.records();
        for record in &records[seen_spawns..] {
            let instance = WaveInstanceId(record.instance_id);
            for entity in director.wave_entities(instance).unwrap_or_default() {
                pending_kills.push((now + params.enemy_lifetime_ms, entity));
            }
        }
        seen_spawns = records.len();

        let (due, alive): (Vec<_>, Vec<_>) = pending_kills
            .into_iter()
            .partition(|(kill_at, _)| *kill_at <= now);
        pending_kills = alive;
        for (_, entity) in due {
            if director.notify_enemy_destroyed(entity) {
                report.enemies_destroyed += 1;
            }
        }

        if frame > 0 && frame % 600 == 0 {
            log::debug!(
                "[Simulation] frame {} at {:.0} ms: {} spawns, queue {}",
                frame,
                now,
                seen_spawns,
                director.queue_len()
            );
        }
    }

    report.spawns = spawn_log.records();
    report.fallback_spawns = report.spawns.iter().filter(|s| s.fallback).count();
    report.telegraphs = telegraph.shown();
    report.final_queue_len = director.queue_len();
    report.final_active_waves = director.active_wave_count();

    log::info!(
        "[Simulation] {} frames, {} spawns ({} fallback), {} bars",
        report.frames,
        report.spawns.len(),
        report.fallback_spawns,
        report.bar_starts
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::ENTITY_ID_KEY;

    #[test]
    fn recording_spawner_logs_and_lays_out_entities() {
        let log = SpawnLog::default();
        let mut spawner = RecordingSpawner::new(log.clone());
        let descriptor = WaveDescriptor::new("row").with_count(3);
        let options = SpawnOptions {
            instance_id: WaveInstanceId(9),
            stage: 2,
            fallback: false,
            spawn_at_ms: 100.0,
        };

        let mut entities = spawner.spawn_wave(&descriptor, Point::new(0.1, 0.2), &options);
        assert_eq!(entities.len(), 3);
        assert!(entities.iter().all(|e| e.is_active()));
        assert!((entities[2].position().x - 0.2).abs() < 1e-6);

        entities[0].set_data(ENTITY_ID_KEY, serde_json::json!(5));
        assert_eq!(entities[0].data(ENTITY_ID_KEY), Some(serde_json::json!(5)));

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instance_id, 9);
        assert_eq!(records[0].entity_count, 3);
    }

    #[test]
    fn telegraph_handle_counts_single_destroy() {
        let mut telegraph = RecordingTelegraph::new();
        let options = TelegraphOptions {
            instance_id: WaveInstanceId(1),
            spawn_at_ms: 600.0,
            lead_ms: 600.0,
        };
        let mut handle = telegraph.show(&WaveDescriptor::new("t"), Point::default(), &options);
        handle.destroy();
        handle.destroy();

        assert_eq!(telegraph.shown().len(), 1);
        assert_eq!(telegraph.destroyed(), 1);
    }

    #[test]
    fn silent_run_produces_only_fallback_spawns() {
        let mut config = AppConfig::default();
        config.director.seed = Some(1);
        let params = SimulationParams {
            duration_ms: 9000.0,
            ..SimulationParams::default()
        };
        let silence = vec![0.0f32; 9 * 44_100];

        let report =
            run_simulation_with_pcm(&config, Playlist::default(), &params, &silence).unwrap();

        assert_eq!(report.beats_by_band.values().sum::<usize>(), 0);
        assert!(!report.spawns.is_empty());
        assert_eq!(report.fallback_spawns, report.spawns.len());
        assert!(report.spawns.iter().all(|s| s.descriptor_id == "fallback"));
    }
}
