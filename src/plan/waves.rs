//! Dependency-wave resolution.
//!
//! Greedy topological leveling: each pass selects every unscheduled step whose
//! dependencies all completed in earlier passes. Waves run strictly one after
//! another; steps inside a wave may run concurrently.

use std::collections::HashSet;
use std::str::FromStr;

use super::Step;

/// What to do with steps that can never become ready (cycles, unknown ids).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaveMode {
    /// Report them as blocked and never run them.
    #[default]
    Strict,
    /// Append each one as its own singleton wave, in original order.
    Compat,
}

impl FromStr for WaveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(WaveMode::Strict),
            "compat" | "compatible" => Ok(WaveMode::Compat),
            other => Err(format!("unknown wave mode '{}'", other)),
        }
    }
}

/// Waves as indices into the step slice, plus the indices left unschedulable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaveResolution {
    pub waves: Vec<Vec<usize>>,
    pub blocked: Vec<usize>,
}

/// Resolve waves with the singleton fallback for stalled steps.
pub fn resolve_waves(steps: &[Step]) -> Vec<Vec<usize>> {
    resolve_waves_with(steps, WaveMode::Compat).waves
}

pub fn resolve_waves_with(steps: &[Step], mode: WaveMode) -> WaveResolution {
    let mut resolution = WaveResolution::default();
    let mut completed: HashSet<u32> = HashSet::new();
    let mut remaining: Vec<usize> = (0..steps.len()).collect();

    // every productive pass schedules at least one step
    for _ in 0..=steps.len() {
        if remaining.is_empty() {
            break;
        }
        let wave: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| steps[i].depends_on.iter().all(|d| completed.contains(d)))
            .collect();

        if wave.is_empty() {
            match mode {
                WaveMode::Compat => resolution.waves.extend(remaining.iter().map(|&i| vec![i])),
                WaveMode::Strict => resolution.blocked = remaining.clone(),
            }
            remaining.clear();
            break;
        }

        completed.extend(wave.iter().map(|&i| steps[i].id));
        remaining.retain(|i| !wave.contains(i));
        resolution.waves.push(wave);
    }

    resolution
}
