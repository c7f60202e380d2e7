use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{CompiledQuery, SynthesisDefaults, synthesize_with_defaults};
use crate::errors::SynthesisError;
use crate::models::enums::Dialect;
use crate::models::structs::QueryPlan;

const DEFAULT_CAPACITY: usize = 256;

/// Memoises synthesis by plan fingerprint. Owned by the caller; share it by
/// reference across sessions. Holds at most `capacity` entries and evicts the
/// oldest insertion first.
pub struct PlanCache {
    capacity: usize,
    inner: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CompiledQuery>,
    inserted: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl Default for PlanCache {
    fn default() -> Self { Self::with_capacity(DEFAULT_CAPACITY) }
}

impl PlanCache {
    pub fn new() -> Self { Self::default() }

    /// A zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), inner: Mutex::new(CacheState::default()) }
    }

    pub fn capacity(&self) -> usize { self.capacity }

    /// md5 over the canonical plan JSON, the dialect and the defaults.
    pub fn fingerprint(plan: &QueryPlan, dialect: Dialect, defaults: &SynthesisDefaults) -> Result<String, SynthesisError> {
        let plan_json = serde_json::to_vec(plan).map_err(|e| SynthesisError::Malformed(e.to_string()))?;
        let defaults_json = serde_json::to_vec(defaults).map_err(|e| SynthesisError::Malformed(e.to_string()))?;
        let mut ctx = md5::Context::new();
        ctx.consume(&plan_json);
        ctx.consume(dialect.to_string().as_bytes());
        ctx.consume(&defaults_json);
        Ok(format!("{:x}", ctx.compute()))
    }

    pub fn get_or_synthesize(
        &self,
        plan: &QueryPlan,
        dialect: Dialect,
        defaults: &SynthesisDefaults,
    ) -> Result<CompiledQuery, SynthesisError> {
        let key = Self::fingerprint(plan, dialect, defaults)?;
        if let Ok(mut g) = self.inner.lock()
            && let Some(hit) = g.entries.get(&key).cloned()
        {
            g.hits += 1;
            log::debug!("plan cache hit {}", key);
            return Ok(hit);
        }
        let compiled = synthesize_with_defaults(plan, dialect, defaults)?;
        if let Ok(mut g) = self.inner.lock() {
            g.misses += 1;
            while g.entries.len() >= self.capacity
                && let Some(oldest) = g.inserted.pop_front()
            {
                log::debug!("plan cache full, evicting {}", oldest);
                g.entries.remove(&oldest);
            }
            if g.entries.insert(key.clone(), compiled.clone()).is_none() {
                g.inserted.push_back(key);
            }
        }
        Ok(compiled)
    }

    pub fn hits(&self) -> u64 { self.inner.lock().map(|g| g.hits).unwrap_or(0) }

    pub fn misses(&self) -> u64 { self.inner.lock().map(|g| g.misses).unwrap_or(0) }

    pub fn len(&self) -> usize { self.inner.lock().map(|g| g.entries.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn clear(&self) {
        if let Ok(mut g) = self.inner.lock() {
            g.entries.clear();
            g.inserted.clear();
        }
    }
}
