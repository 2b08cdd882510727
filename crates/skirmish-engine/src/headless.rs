//! Headless match runner.
//!
//! This module provides:
//! - Building an [`Arena`] from an [`EngineConfig`] and an archetype table
//! - Stepping it at a fixed tick with bots attached
//! - Tallying the event stream and summarising the result as JSON

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use skirmish_common::{EntityId, TeamId};
use skirmish_gameplay::{
    ArchetypeTable, Arena, ArenaError, CombatEntity, CombatEvent, MapError, TileMap,
};

use crate::config::EngineConfig;

/// Errors raised while wiring a match together.
#[derive(Debug, Error)]
pub enum MatchSetupError {
    /// The configured map rows are unusable
    #[error("Invalid map: {0}")]
    Map(#[from] MapError),

    /// The arena refused a setup call
    #[error("Arena setup failed: {0}")]
    Arena(#[from] ArenaError),

    /// Nobody to fight
    #[error("Match roster is empty")]
    EmptyRoster,

    /// A bot target index points past the roster
    #[error("Combatant {index} targets roster slot {target}, which does not exist")]
    BadTarget {
        /// Roster index of the bot
        index: usize,
        /// Requested target index
        target: usize,
    },
}

/// Result type for match setup.
pub type MatchSetupResult<T> = Result<T, MatchSetupError>;

/// Running counts of published events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTally {
    /// Trigger pulls that fired
    pub shots: u32,
    /// Bullets lost to a full pool
    pub dropped_shots: u32,
    /// Damage events
    pub hits: u32,
    /// Deaths
    pub deaths: u32,
    /// Respawns
    pub respawns: u32,
    /// Skills and ultimates resolved
    pub abilities: u32,
    /// Area blasts
    pub detonations: u32,
    /// Heals applied
    pub heals: u32,
}

impl EventTally {
    /// Counts one event.
    pub fn record(&mut self, event: &CombatEvent) {
        match event {
            CombatEvent::WeaponFired { .. } => self.shots += 1,
            CombatEvent::ShotDropped { .. } => self.dropped_shots += 1,
            CombatEvent::Damaged { .. } => self.hits += 1,
            CombatEvent::Died { .. } => self.deaths += 1,
            CombatEvent::Respawned { .. } => self.respawns += 1,
            CombatEvent::AbilityActivated { .. } => self.abilities += 1,
            CombatEvent::Detonated { .. } => self.detonations += 1,
            CombatEvent::Healed { .. } => self.heals += 1,
            _ => {},
        }
    }
}

/// End-of-match line for one combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantSummary {
    /// Entity ID
    pub id: EntityId,
    /// Archetype name
    pub archetype: String,
    /// Team
    pub team: TeamId,
    /// Opponents finished off
    pub kills: u32,
    /// Times died
    pub deaths: u32,
    /// Health removed from others
    pub damage_dealt: f32,
    /// Alive at the final tick
    pub alive: bool,
    /// Health at the final tick
    pub health: f32,
}

impl CombatantSummary {
    fn from_entity(entity: &CombatEntity) -> Self {
        let record = entity.record();
        Self {
            id: entity.id(),
            archetype: entity.archetype().to_string(),
            team: entity.team(),
            kills: record.kills,
            deaths: record.deaths,
            damage_dealt: record.damage_dealt,
            alive: entity.is_alive(),
            health: entity.health(),
        }
    }
}

/// Result of a finished match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Simulated time covered
    pub duration_ms: u64,
    /// Ticks stepped
    pub ticks: u64,
    /// Event counts
    pub events: EventTally,
    /// Per-combatant results in spawn order
    pub combatants: Vec<CombatantSummary>,
}

impl MatchSummary {
    /// The team with the most kills, or `None` on a tie.
    #[must_use]
    pub fn winning_team(&self) -> Option<TeamId> {
        let mut totals: Vec<(TeamId, u32)> = Vec::new();
        for c in &self.combatants {
            match totals.iter_mut().find(|(team, _)| *team == c.team) {
                Some((_, kills)) => *kills += c.kills,
                None => totals.push((c.team, c.kills)),
            }
        }
        let best = totals.iter().map(|(_, k)| *k).max()?;
        let mut leaders = totals.iter().filter(|(_, k)| *k == best);
        let (team, _) = leaders.next()?;
        if leaders.next().is_some() {
            return None;
        }
        Some(*team)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Drives one configured match.
pub struct MatchRunner {
    arena: Arena,
    combatants: Vec<EntityId>,
    tick_ms: u64,
    total_ticks: u64,
    ticks: u64,
    tally: EventTally,
    trace_events: bool,
}

impl MatchRunner {
    /// Builds the arena, spawns the roster and attaches bots.
    pub fn new(config: &EngineConfig, archetypes: ArchetypeTable) -> MatchSetupResult<Self> {
        if config.combatants.is_empty() {
            return Err(MatchSetupError::EmptyRoster);
        }

        let map = TileMap::from_rows(&config.map.rows, config.map.tile_size)?;
        let mut arena = Arena::new(Box::new(map), archetypes, config.arena_settings());

        let combatants: Vec<EntityId> = config
            .combatants
            .iter()
            .map(|c| arena.spawn(&c.archetype, TeamId::new(c.team)))
            .collect();

        for (index, entry) in config.combatants.iter().enumerate() {
            let Some(difficulty) = entry.bot else {
                continue;
            };
            let target = match entry.target {
                Some(target) => Some(
                    *combatants
                        .get(target)
                        .ok_or(MatchSetupError::BadTarget { index, target })?,
                ),
                None => config
                    .combatants
                    .iter()
                    .position(|other| other.team != entry.team)
                    .map(|i| combatants[i]),
            };
            arena.attach_bot(combatants[index], target, difficulty)?;
        }

        info!(
            combatants = combatants.len(),
            bots = arena.bots().count(),
            tick_ms = config.tick_ms,
            "match ready"
        );

        Ok(Self {
            arena,
            combatants,
            tick_ms: config.tick_ms.max(1),
            total_ticks: config.total_ticks(),
            ticks: 0,
            tally: EventTally::default(),
            trace_events: config.trace_events,
        })
    }

    /// The simulation being driven.
    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Mutable access for external controllers.
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Entity IDs in roster order.
    #[must_use]
    pub fn combatants(&self) -> &[EntityId] {
        &self.combatants
    }

    /// Ticks stepped so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Counts gathered so far.
    #[must_use]
    pub fn tally(&self) -> EventTally {
        self.tally
    }

    /// Whether the configured match length has been covered.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ticks >= self.total_ticks
    }

    /// Advances one tick and folds the published events into the tally.
    pub fn step(&mut self) {
        self.arena.step(self.tick_ms);
        self.ticks += 1;
        for event in self.arena.drain_events() {
            if self.trace_events {
                debug!(tick = self.ticks, ?event, "event");
            }
            if let CombatEvent::Died { entity_id, killer, .. } = &event {
                info!(entity = %entity_id, killer = ?killer, tick = self.ticks, "kill");
            }
            self.tally.record(&event);
        }
    }

    /// Steps until the match length is covered and summarises.
    pub fn run(mut self) -> MatchSummary {
        while !self.is_finished() {
            self.step();
        }
        let summary = self.summary();
        info!(
            ticks = summary.ticks,
            shots = summary.events.shots,
            deaths = summary.events.deaths,
            winner = ?summary.winning_team(),
            "match finished"
        );
        summary
    }

    /// Snapshot of the match so far.
    #[must_use]
    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            duration_ms: self.arena.now().as_millis(),
            ticks: self.ticks,
            events: self.tally,
            combatants: self
                .combatants
                .iter()
                .filter_map(|id| self.arena.entity(*id))
                .map(CombatantSummary::from_entity)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CombatantConfig;
    use skirmish_gameplay::Difficulty;

    fn short_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.match_length_ms = 3_000;
        config.tick_ms = 20;
        config
    }

    #[test]
    fn test_runner_builds_roster_with_bots() {
        let runner = MatchRunner::new(&short_config(), ArchetypeTable::builtin()).expect("setup");
        assert_eq!(runner.combatants().len(), 2);
        assert_eq!(runner.arena().bots().count(), 2);
        let first = runner.arena().bots().next().map(|b| b.target());
        assert_eq!(first, Some(Some(runner.combatants()[1])));
    }

    #[test]
    fn test_run_covers_match_length() {
        let runner = MatchRunner::new(&short_config(), ArchetypeTable::builtin()).expect("setup");
        let summary = runner.run();
        assert_eq!(summary.ticks, 150);
        assert_eq!(summary.duration_ms, 3_000);
        assert_eq!(summary.combatants.len(), 2);
    }

    #[test]
    fn test_idle_combatant_gets_no_bot() {
        let mut config = short_config();
        config.combatants[1].bot = None;
        let runner = MatchRunner::new(&config, ArchetypeTable::builtin()).expect("setup");
        assert_eq!(runner.arena().bots().count(), 1);
    }

    #[test]
    fn test_empty_roster_rejected() {
        let mut config = short_config();
        config.combatants.clear();
        assert!(matches!(
            MatchRunner::new(&config, ArchetypeTable::builtin()),
            Err(MatchSetupError::EmptyRoster)
        ));
    }

    #[test]
    fn test_bad_target_rejected() {
        let mut config = short_config();
        config.combatants[0].target = Some(7);
        assert!(matches!(
            MatchRunner::new(&config, ArchetypeTable::builtin()),
            Err(MatchSetupError::BadTarget { index: 0, target: 7 })
        ));
    }

    #[test]
    fn test_bad_map_rejected() {
        let mut config = short_config();
        config.map.rows = vec!["###".to_string(), "#.".to_string()];
        assert!(matches!(
            MatchRunner::new(&config, ArchetypeTable::builtin()),
            Err(MatchSetupError::Map(MapError::Ragged { .. }))
        ));
    }

    #[test]
    fn test_explicit_target_respected() {
        let mut config = short_config();
        config
            .combatants
            .push(CombatantConfig::bot("medic", 1, Difficulty::Easy));
        config.combatants[0].target = Some(2);
        let runner = MatchRunner::new(&config, ArchetypeTable::builtin()).expect("setup");
        let striker = runner.combatants()[0];
        let bot = runner.arena().bots().find(|b| b.owner() == striker);
        assert_eq!(bot.and_then(|b| b.target()), Some(runner.combatants()[2]));
    }

    #[test]
    fn test_tally_counts_kinds() {
        let mut tally = EventTally::default();
        tally.record(&CombatEvent::ShotDropped {
            entity_id: EntityId::from_raw(1),
        });
        tally.record(&CombatEvent::Removed {
            entity_id: EntityId::from_raw(1),
        });
        assert_eq!(tally.dropped_shots, 1);
        assert_eq!(tally, EventTally { dropped_shots: 1, ..EventTally::default() });
    }

    fn line(team: u8, kills: u32) -> CombatantSummary {
        CombatantSummary {
            id: EntityId::from_raw(u64::from(kills) + u64::from(team) * 10),
            archetype: "recruit".to_string(),
            team: TeamId::new(team),
            kills,
            deaths: 0,
            damage_dealt: 0.0,
            alive: true,
            health: 100.0,
        }
    }

    #[test]
    fn test_winning_team() {
        let mut summary = MatchSummary {
            duration_ms: 0,
            ticks: 0,
            events: EventTally::default(),
            combatants: vec![line(0, 2), line(0, 1), line(1, 2)],
        };
        assert_eq!(summary.winning_team(), Some(TeamId::new(0)));

        summary.combatants.push(line(1, 1));
        assert_eq!(summary.winning_team(), None);
    }

    #[test]
    fn test_summary_serializes() {
        let runner = MatchRunner::new(&short_config(), ArchetypeTable::builtin()).expect("setup");
        let json = runner.summary().to_json().expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parses back");
        assert_eq!(value["combatants"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["ticks"], 0);
    }
}
