use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::llm::media::ImageHandle;
use crate::storyboard::model::{Beat, Blueprint, Scene, Shot};

/// Structural address of a shot: scene, beat and shot-recommendation index.
/// Stable for the lifetime of a blueprint; rendered as `s1-b2-sh3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ShotId {
    pub scene: usize,
    pub beat: usize,
    pub shot: usize,
}

impl ShotId {
    pub const fn new(scene: usize, beat: usize, shot: usize) -> Self {
        ShotId { scene, beat, shot }
    }
}

impl fmt::Display for ShotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}-b{}-sh{}", self.scene + 1, self.beat + 1, self.shot + 1)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShotRef<'a> {
    pub id: ShotId,
    pub scene: &'a Scene,
    pub beat: &'a Beat,
    pub shot: &'a Shot,
}

/// Scene → beat → shot tree flattened in reading order.
pub fn flatten_shots(blueprint: &Blueprint) -> Vec<ShotRef<'_>> {
    let mut shots = Vec::new();
    for (scene_index, scene) in blueprint.scenes.iter().enumerate() {
        for (beat_index, beat) in scene.beats.iter().enumerate() {
            for (shot_index, shot) in beat.shot_recommendations.iter().enumerate() {
                shots.push(ShotRef {
                    id: ShotId::new(scene_index, beat_index, shot_index),
                    scene,
                    beat,
                    shot,
                });
            }
        }
    }
    shots
}

pub fn find_shot(blueprint: &Blueprint, id: ShotId) -> Option<(&Scene, &Shot)> {
    let scene = blueprint.scenes.get(id.scene)?;
    let shot = scene
        .beats
        .get(id.beat)?
        .shot_recommendations
        .get(id.shot)?;
    Some((scene, shot))
}

pub fn find_shot_mut(blueprint: &mut Blueprint, id: ShotId) -> Option<&mut Shot> {
    blueprint
        .scenes
        .get_mut(id.scene)?
        .beats
        .get_mut(id.beat)?
        .shot_recommendations
        .get_mut(id.shot)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShotStatus {
    pub is_loading: bool,
    pub url: Option<ImageHandle>,
}

impl ShotStatus {
    pub const fn loading() -> Self {
        ShotStatus {
            is_loading: true,
            url: None,
        }
    }
}

#[derive(Debug, Clone)]
struct ShotSlot {
    status: ShotStatus,
    ticket: u64,
}

/// A write permit for one slot. Completions carrying a superseded ticket are
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTicket {
    pub id: ShotId,
    ticket: u64,
}

/// Per-shot generation status. A missing entry means the shot has not been
/// requested yet.
#[derive(Debug, Clone, Default)]
pub struct ShotGenerationState {
    slots: BTreeMap<ShotId, ShotSlot>,
    next_ticket: u64,
}

impl ShotGenerationState {
    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Replaces every slot with a fresh loading entry in one step.
    pub fn begin_batch(&mut self, ids: &[ShotId]) -> Vec<SlotTicket> {
        let mut slots = BTreeMap::new();
        let mut tickets = Vec::with_capacity(ids.len());
        for id in ids {
            let ticket = self.issue_ticket();
            slots.insert(
                *id,
                ShotSlot {
                    status: ShotStatus::loading(),
                    ticket,
                },
            );
            tickets.push(SlotTicket { id: *id, ticket });
        }
        self.slots = slots;
        tickets
    }

    /// Marks a slot loading while keeping its current image on display.
    /// Returns the permit and the image to restore if the request fails.
    pub fn begin_regeneration(&mut self, id: ShotId) -> (SlotTicket, Option<ImageHandle>) {
        let ticket = self.issue_ticket();
        let slot = self.slots.entry(id).or_insert(ShotSlot {
            status: ShotStatus::loading(),
            ticket,
        });
        slot.status.is_loading = true;
        slot.ticket = ticket;
        (SlotTicket { id, ticket }, slot.status.url.clone())
    }

    /// Settles a slot. Returns false when the permit was superseded.
    pub fn complete(&mut self, permit: SlotTicket, url: Option<ImageHandle>) -> bool {
        match self.slots.get_mut(&permit.id) {
            Some(slot) if slot.ticket == permit.ticket => {
                slot.status = ShotStatus {
                    is_loading: false,
                    url,
                };
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: ShotId) -> Option<&ShotStatus> {
        self.slots.get(&id).map(|slot| &slot.status)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn loading_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.status.is_loading)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShotId, &ShotStatus)> {
        self.slots.iter().map(|(id, slot)| (*id, &slot.status))
    }
}
