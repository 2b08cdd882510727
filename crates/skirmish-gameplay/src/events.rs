//! Event bus for cosmetic and UI observers.
//!
//! The combat core publishes here and never reads back. Rendering, audio and
//! HUD layers drain the bus once per frame to trigger presentation.

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use skirmish_common::{EntityId, HazardId, ProjectileId, SimTime, TeamId};

use crate::skills::AbilitySlot;

/// Which timed effect ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Damage-reduction shield
    Shield,
    /// Range multiplier
    Scope,
    /// Damage immunity window
    Invincible,
    /// Dash displacement
    Dash,
}

/// Why a projectile left the world without hitting a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpireReason {
    /// Ran out of range or lifetime
    Exhausted,
    /// Struck a wall
    Wall,
    /// Landed after a lob
    Landed,
}

/// Event types published by the combat core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Entity entered the arena
    Spawned {
        /// Entity ID
        entity_id: EntityId,
        /// Team
        team: TeamId,
        /// Spawn position
        position: Vec2,
    },
    /// Entity took damage
    Damaged {
        /// Entity ID
        entity_id: EntityId,
        /// Damage actually removed from health
        amount: f32,
        /// Health after the hit
        remaining: f32,
        /// Source entity (if any)
        source: Option<EntityId>,
    },
    /// Entity regained health
    Healed {
        /// Entity ID
        entity_id: EntityId,
        /// Health actually restored
        amount: f32,
    },
    /// Entity died
    Died {
        /// Entity ID
        entity_id: EntityId,
        /// Killer (if any)
        killer: Option<EntityId>,
        /// When the entity will come back
        respawn_at: SimTime,
    },
    /// Entity came back to life
    Respawned {
        /// Entity ID
        entity_id: EntityId,
        /// Spawn position
        position: Vec2,
    },
    /// Entity fired its weapon
    WeaponFired {
        /// Shooter
        entity_id: EntityId,
        /// Aim heading in radians
        aim_angle: f32,
        /// Projectiles spawned by this shot
        projectiles: u32,
    },
    /// A bullet could not be spawned because the pool was full
    ShotDropped {
        /// Shooter
        entity_id: EntityId,
    },
    /// Projectile left the world without a body hit
    ProjectileExpired {
        /// Projectile
        projectile_id: ProjectileId,
        /// Last position
        position: Vec2,
        /// Why it ended
        reason: ExpireReason,
    },
    /// Area damage went off
    Detonated {
        /// Whoever placed or fired it
        source: Option<EntityId>,
        /// Blast centre
        position: Vec2,
        /// Blast radius
        radius: f32,
    },
    /// A skill or ultimate resolved
    AbilityActivated {
        /// Caster
        entity_id: EntityId,
        /// Skill or ultimate slot
        slot: AbilitySlot,
        /// Effect key, e.g. `"shield"`
        effect: String,
        /// Aim point
        aim: Vec2,
    },
    /// A timed effect ran out
    EffectExpired {
        /// Entity ID
        entity_id: EntityId,
        /// Effect that ended
        effect: EffectKind,
    },
    /// A bomb, mine or field was placed
    HazardPlaced {
        /// Hazard ID
        hazard_id: HazardId,
        /// Owner
        owner: EntityId,
        /// Position
        position: Vec2,
    },
    /// Entity was taken out of the arena for good
    Removed {
        /// Entity ID
        entity_id: EntityId,
    },
}

/// Event bus for broadcasting events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<CombatEvent>,
    /// Receiver for collecting events
    receiver: Receiver<CombatEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            capacity: capacity.max(1),
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: CombatEvent) {
        // Non-blocking send - if full, event is dropped
        if self.sender.try_send(event).is_err() {
            tracing::trace!("event bus full, dropping event");
        }
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new receiver handle, e.g. for an audio thread.
    ///
    /// Receivers compete for events; each event reaches exactly one of them.
    #[must_use]
    pub fn subscriber(&self) -> Receiver<CombatEvent> {
        self.receiver.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(8);
        bus.publish(CombatEvent::Removed {
            entity_id: EntityId::from_raw(1),
        });
        bus.publish(CombatEvent::ShotDropped {
            entity_id: EntityId::from_raw(2),
        });
        assert_eq!(bus.pending_count(), 2);
        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops_instead_of_blocking() {
        let bus = EventBus::new(1);
        for raw in 0..5 {
            bus.publish(CombatEvent::Removed {
                entity_id: EntityId::from_raw(raw),
            });
        }
        assert_eq!(bus.drain().len(), 1);
    }
}
