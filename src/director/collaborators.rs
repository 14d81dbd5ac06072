//! Collaborator contracts consumed by the wave director.
//!
//! The director never knows how a descriptor turns into bodies on screen.
//! It hands descriptors to a [`Spawner`], tags each returned entity with a
//! unique id, and later hears about removals through
//! `WaveDirector::notify_enemy_destroyed`.

use crate::director::descriptor::{Point, WaveDescriptor};

/// Entity data key carrying the director-assigned entity id
pub const ENTITY_ID_KEY: &str = "wave_entity_id";

/// Entity data key carrying the owning wave instance id
pub const WAVE_INSTANCE_KEY: &str = "wave_instance_id";

/// Unique id of a spawned enemy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct EntityId(pub u64);

/// Unique id of one scheduled (and later spawned) wave
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct WaveInstanceId(pub u64);

/// Handle to a spawned entity
pub trait EntityHandle {
    fn data(&self, key: &str) -> Option<serde_json::Value>;
    fn set_data(&mut self, key: &str, value: serde_json::Value);
    fn is_active(&self) -> bool;
    fn position(&self) -> Point;
}

/// Extra context passed with each spawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnOptions {
    pub instance_id: WaveInstanceId,
    pub stage: u32,
    /// Injected because of silence rather than a beat
    pub fallback: bool,
    pub spawn_at_ms: f64,
}

/// Materializes descriptors into entities
pub trait Spawner: Send {
    fn spawn_wave(
        &mut self,
        descriptor: &WaveDescriptor,
        anchor: Point,
        options: &SpawnOptions,
    ) -> Vec<Box<dyn EntityHandle>>;
}

/// Handle to a visible telegraph
pub trait TelegraphHandle: Send {
    fn destroy(&mut self);
}

/// Extra context passed with each telegraph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelegraphOptions {
    pub instance_id: WaveInstanceId,
    /// Time the wave will spawn
    pub spawn_at_ms: f64,
    /// Time left until the spawn when the telegraph fired
    pub lead_ms: f64,
}

/// Shows pre-spawn warnings; fire-and-forget
pub trait Telegraph: Send {
    fn show(
        &mut self,
        descriptor: &WaveDescriptor,
        position: Point,
        options: &TelegraphOptions,
    ) -> Box<dyn TelegraphHandle>;
}

/// Provides the current stage number for stage-range filtering
pub type StageProvider = Box<dyn Fn() -> u32 + Send>;
