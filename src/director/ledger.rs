//! Scheduling ledger: everything the director remembers about past
//! decisions, and the admission filter that reads it.

use std::collections::{HashMap, VecDeque};

use crate::config::DirectorConfig;
use crate::director::descriptor::{WaveCategory, WaveDescriptor};

/// How strictly a candidate is filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Every rule applies
    Strict,
    /// Cooldowns, the repeat rule and the pending rule are ignored.
    /// Stage range and the heavy caps still hold.
    Softened,
}

/// Why a candidate was filtered out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    StageRange,
    Repeat,
    AlreadyPending,
    DescriptorCooldown,
    CategoryCooldown,
    HeavySimultaneous,
    HeavyCooldown,
    HeavyWindow,
}

#[derive(Debug, Default)]
pub(crate) struct SchedulingLedger {
    last_spawn_by_descriptor: HashMap<String, f64>,
    last_spawn_by_category: HashMap<WaveCategory, f64>,
    pending_by_descriptor: HashMap<String, u32>,
    pending_heavy: u32,
    active_heavy: u32,
    last_heavy_spawn: Option<f64>,
    /// Heavy spawn times inside the trailing window, oldest first
    heavy_spawns: VecDeque<f64>,
    last_scheduled_id: Option<String>,
}

impl SchedulingLedger {
    pub fn pending_heavy(&self) -> u32 {
        self.pending_heavy
    }

    pub fn active_heavy(&self) -> u32 {
        self.active_heavy
    }

    pub fn pending_count(&self, id: &str) -> u32 {
        self.pending_by_descriptor.get(id).copied().unwrap_or(0)
    }

    pub fn last_scheduled_id(&self) -> Option<&str> {
        self.last_scheduled_id.as_deref()
    }

    pub fn heavy_in_window(&self) -> usize {
        self.heavy_spawns.len()
    }

    pub fn admit(
        &self,
        descriptor: &WaveDescriptor,
        stage: u32,
        now_ms: f64,
        config: &DirectorConfig,
        strictness: Strictness,
    ) -> Result<(), Rejection> {
        if !descriptor.allows_stage(stage) {
            return Err(Rejection::StageRange);
        }

        let strict = strictness == Strictness::Strict;

        if strict {
            if !config.allow_repeats && self.last_scheduled_id() == Some(descriptor.id.as_str()) {
                return Err(Rejection::Repeat);
            }
            if self.pending_count(&descriptor.id) > 0 {
                return Err(Rejection::AlreadyPending);
            }
            if let Some(last) = self.last_spawn_by_descriptor.get(&descriptor.id) {
                if now_ms - last < descriptor.cooldown_ms {
                    return Err(Rejection::DescriptorCooldown);
                }
            }
            if let Some(last) = self.last_spawn_by_category.get(&descriptor.category) {
                if now_ms - last < config.category_cooldown(descriptor.category) {
                    return Err(Rejection::CategoryCooldown);
                }
            }
        }

        if descriptor.is_heavy() {
            let heavy = &config.heavy;
            if self.pending_heavy + self.active_heavy >= heavy.max_simultaneous {
                return Err(Rejection::HeavySimultaneous);
            }
            if strict {
                if let Some(last) = self.last_heavy_spawn {
                    if now_ms - last < heavy.cooldown_ms {
                        return Err(Rejection::HeavyCooldown);
                    }
                }
            }
            let recent = self
                .heavy_spawns
                .iter()
                .filter(|at| now_ms - **at < heavy.window_ms)
                .count();
            if recent + self.pending_heavy as usize >= heavy.max_in_window as usize {
                return Err(Rejection::HeavyWindow);
            }
        }

        Ok(())
    }

    /// Record a newly queued entry. Fallback entries pass `remember = false`
    /// so they do not count as the previous pick for the repeat rule.
    pub fn on_scheduled(&mut self, descriptor: &WaveDescriptor, remember: bool) {
        *self
            .pending_by_descriptor
            .entry(descriptor.id.clone())
            .or_insert(0) += 1;
        if descriptor.is_heavy() {
            self.pending_heavy += 1;
        }
        if remember {
            self.last_scheduled_id = Some(descriptor.id.clone());
        }
    }

    /// Move an entry from pending to spawned
    pub fn on_spawned(&mut self, descriptor: &WaveDescriptor, now_ms: f64, still_active: bool) {
        if let Some(count) = self.pending_by_descriptor.get_mut(&descriptor.id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.pending_by_descriptor.remove(&descriptor.id);
            }
        }
        self.last_spawn_by_descriptor
            .insert(descriptor.id.clone(), now_ms);
        self.last_spawn_by_category
            .insert(descriptor.category, now_ms);

        if descriptor.is_heavy() {
            self.pending_heavy = self.pending_heavy.saturating_sub(1);
            if still_active {
                self.active_heavy += 1;
            }
            self.last_heavy_spawn = Some(now_ms);
            self.heavy_spawns.push_back(now_ms);
        }
    }

    /// A spawned heavy wave has completed
    pub fn on_heavy_completed(&mut self) {
        self.active_heavy = self.active_heavy.saturating_sub(1);
    }

    /// Forget heavy spawns that left the trailing window
    pub fn prune(&mut self, now_ms: f64, window_ms: f64) {
        while let Some(&oldest) = self.heavy_spawns.front() {
            if now_ms - oldest >= window_ms {
                self.heavy_spawns.pop_front();
            } else {
                break;
            }
        }
    }
}
