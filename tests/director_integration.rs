//! Wave director integration tests
//!
//! Exercises the director through its public API with the recording
//! collaborators from the simulation module:
//! - Beat to spawn round trip
//! - Fallback spawning during silence
//! - Heavy concurrency cap released by enemy removal
//! - Shipped playlist and config assets

use beat_director::analysis::Band;
use beat_director::clock::ManualClock;
use beat_director::config::{AppConfig, DirectorConfig};
use beat_director::director::{
    EntityHandle, Playlist, Point, SpawnOptions, Spawner, WaveCategory, WaveDescriptor,
    WaveDirector, ENTITY_ID_KEY, WAVE_INSTANCE_KEY,
};
use beat_director::simulation::{RecordingSpawner, SimEntity, SpawnLog};
use std::sync::{Arc, Mutex};

fn seeded() -> DirectorConfig {
    DirectorConfig {
        seed: Some(21),
        ..DirectorConfig::default()
    }
}

fn build(config: DirectorConfig, waves: Vec<WaveDescriptor>) -> (ManualClock, SpawnLog, WaveDirector) {
    let clock = ManualClock::new(0.0);
    let log = SpawnLog::default();
    let director = WaveDirector::new(
        config,
        Playlist::new("integration", waves),
        Box::new(RecordingSpawner::new(log.clone())),
        clock.source(),
    )
    .unwrap();
    (clock, log, director)
}

#[test]
fn mid_beat_spawns_w1_in_same_update() {
    let (_clock, log, mut director) =
        build(seeded(), vec![WaveDescriptor::new("w1").with_delay_ms(0.0)]);

    director.enqueue_beat(Band::Mid);
    director.update();

    let records = log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].descriptor_id, "w1");
    assert!(!records[0].fallback);
}

#[test]
fn silence_triggers_single_fallback() {
    let (clock, log, mut director) = build(seeded(), vec![WaveDescriptor::new("w1")]);
    let cooldown = director.config().fallback_cooldown_ms;

    clock.advance(cooldown + 1.0);
    director.update();
    assert_eq!(log.len(), 1);

    // Well inside the refire interval
    for _ in 0..10 {
        clock.advance(10.0);
        director.update();
    }
    assert_eq!(log.len(), 1);
    assert!(log.records()[0].fallback);
}

#[test]
fn excess_heavy_waves_rejected_until_completion() {
    let waves = vec![
        WaveDescriptor::new("tank").with_category(WaveCategory::Heavy).with_count(3),
        WaveDescriptor::new("warden").with_category(WaveCategory::Boss).with_count(3),
    ];
    let (clock, log, mut director) = build(seeded(), waves);

    let first = director.enqueue_beat(Band::Low).expect("first heavy admitted");
    director.update();

    for _ in 0..5 {
        clock.advance(200.0);
        assert!(director.enqueue_beat(Band::Low).is_none());
        director.update();
    }
    assert_eq!(log.len(), 1);

    let entities = director.wave_entities(first).unwrap();
    assert_eq!(entities.len(), 3);
    for entity in &entities[..2] {
        director.notify_enemy_destroyed(*entity);
    }
    assert!(director.enqueue_beat(Band::Low).is_none());

    director.notify_enemy_destroyed(entities[2]);
    assert_eq!(director.active_heavy_count(), 0);
    assert!(director.enqueue_beat(Band::Low).is_some());
    director.update();
    assert_eq!(log.len(), 2);
}

/// Spawner that keeps the handles' data visible to the test
struct SharedDataSpawner {
    tagged: Arc<Mutex<Vec<(serde_json::Value, serde_json::Value)>>>,
}

struct TaggingEntity {
    inner: SimEntity,
    tagged: Arc<Mutex<Vec<(serde_json::Value, serde_json::Value)>>>,
}

impl EntityHandle for TaggingEntity {
    fn data(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.data(key)
    }

    fn set_data(&mut self, key: &str, value: serde_json::Value) {
        self.inner.set_data(key, value);
        if let (Some(entity), Some(wave)) =
            (self.inner.data(ENTITY_ID_KEY), self.inner.data(WAVE_INSTANCE_KEY))
        {
            self.tagged.lock().unwrap().push((entity, wave));
        }
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    fn position(&self) -> Point {
        self.inner.position()
    }
}

impl Spawner for SharedDataSpawner {
    fn spawn_wave(
        &mut self,
        _descriptor: &WaveDescriptor,
        anchor: Point,
        _options: &SpawnOptions,
    ) -> Vec<Box<dyn EntityHandle>> {
        vec![
            Box::new(TaggingEntity {
                inner: SimEntity::new(anchor),
                tagged: Arc::clone(&self.tagged),
            }),
            Box::new(TaggingEntity {
                inner: SimEntity::inactive(anchor),
                tagged: Arc::clone(&self.tagged),
            }),
        ]
    }
}

#[test]
fn active_entities_are_tagged_and_inactive_skipped() {
    let tagged = Arc::new(Mutex::new(Vec::new()));
    let clock = ManualClock::new(0.0);
    let mut director = WaveDirector::new(
        seeded(),
        Playlist::new("tags", vec![WaveDescriptor::new("pair")]),
        Box::new(SharedDataSpawner {
            tagged: Arc::clone(&tagged),
        }),
        clock.source(),
    )
    .unwrap();

    let instance = director.enqueue_beat(Band::High).unwrap();
    director.update();

    let tagged = tagged.lock().unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].1, serde_json::json!(instance.0));
    assert_eq!(director.wave_entities(instance).unwrap().len(), 1);
}

#[test]
fn shipped_assets_parse_and_validate() {
    let manifest = env!("CARGO_MANIFEST_DIR");
    let config_json =
        std::fs::read_to_string(format!("{}/assets/director_config.json", manifest)).unwrap();
    let config = AppConfig::from_json_str(&config_json).unwrap();
    assert_eq!(config.director.max_queue_depth, 6);

    let playlist_json =
        std::fs::read_to_string(format!("{}/assets/playlist_normal.json", manifest)).unwrap();
    let playlist = Playlist::from_json_str(&playlist_json).unwrap();
    assert_eq!(playlist.difficulty, "normal");
    assert!(playlist.waves.iter().any(|w| w.is_heavy()));
    assert!(playlist.waves.iter().any(|w| w.telegraph.is_some()));
}

#[test]
fn malformed_playlist_file_means_fallback_only() {
    let path = std::env::temp_dir().join("beat_director_bad_playlist.json");
    std::fs::write(&path, "{ \"waves\": [ { \"id\": 3 } ] }").unwrap();
    let playlist = Playlist::load_from_file(&path);
    let _ = std::fs::remove_file(&path);
    assert!(playlist.is_empty());

    let clock = ManualClock::new(0.0);
    let log = SpawnLog::default();
    let mut director = WaveDirector::new(
        seeded(),
        playlist,
        Box::new(RecordingSpawner::new(log.clone())),
        clock.source(),
    )
    .unwrap();
    assert!(director.is_fallback_only());
    assert!(director.enqueue_beat(Band::Low).is_none());

    clock.advance(director.config().fallback_cooldown_ms + 1.0);
    director.update();
    assert_eq!(log.descriptor_ids(), vec!["fallback".to_string()]);
}
