//! Input normalization.
//!
//! Host pointer batches carry one masked action plus the full current pointer
//! set; the normalizer turns each batch into a canonical per-pointer event
//! stream with stable pointer identity across a gesture. Delivery order
//! within a `Move` batch is significant: one event per active pointer, in
//! ascending slot order, so the engine can rely on deterministic replay.

use crate::errors::ProtocolViolation;

/// Phase of one canonical pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One canonical event delivered to the engine. `pointer_id` is stable for
/// the duration of one contact (Down..Up/Cancel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub device_id: i32,
    pub pointer_id: i32,
    pub phase: PointerPhase,
    pub x: f32,
    pub y: f32,
}

/// Masked action of a host motion batch. Raw codes follow the host
/// convention (0 = Down .. 4 = Outside, 5 = PointerDown, 6 = PointerUp).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionAction {
    Down,
    Up,
    Move,
    Cancel,
    Outside,
    PointerDown,
    PointerUp,
}

impl MotionAction {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(MotionAction::Down),
            1 => Some(MotionAction::Up),
            2 => Some(MotionAction::Move),
            3 => Some(MotionAction::Cancel),
            4 => Some(MotionAction::Outside),
            5 => Some(MotionAction::PointerDown),
            6 => Some(MotionAction::PointerUp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MotionAction::Down => "down",
            MotionAction::Up => "up",
            MotionAction::Move => "move",
            MotionAction::Cancel => "cancel",
            MotionAction::Outside => "outside",
            MotionAction::PointerDown => "pointer_down",
            MotionAction::PointerUp => "pointer_up",
        }
    }
}

/// One pointer sample within a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchPointer {
    pub pointer_id: i32,
    pub x: f32,
    pub y: f32,
}

/// Host-native multi-pointer event batch.
///
/// `action_index` selects the pointer the action applies to (Down/Up/Cancel);
/// `pointers` always holds the full current pointer set.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionBatch {
    pub device_id: i32,
    pub action: MotionAction,
    pub action_index: usize,
    pub pointers: Vec<BatchPointer>,
}

/// Tracks active contacts in slots. A contact takes the lowest free slot on
/// Down and keeps it until Up/Cancel; Move fan-out walks the slots in
/// ascending order.
#[derive(Debug, Default)]
pub struct InputNormalizer {
    slots: Vec<Option<i32>>,
}

impl InputNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_pointers(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn slot_of(&self, pointer_id: i32) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(pointer_id))
    }

    fn occupy(&mut self, pointer_id: i32) {
        match self.slots.iter().position(Option::is_none) {
            Some(free) => self.slots[free] = Some(pointer_id),
            None => self.slots.push(Some(pointer_id)),
        }
    }

    /// Normalize one batch, delivering each canonical event to `sink` in
    /// order. `sink` returns whether the engine claimed the event; the batch
    /// result is the OR over all delivered events. Malformed batches and
    /// contract violations are logged and yield no events.
    pub fn normalize<F>(&mut self, batch: &MotionBatch, mut sink: F) -> bool
    where
        F: FnMut(&PointerEvent) -> bool,
    {
        match batch.action {
            MotionAction::Down | MotionAction::PointerDown => {
                let Some(p) = batch.pointers.get(batch.action_index) else {
                    log::warn!("malformed {} batch: no pointer at index {}", batch.action.name(), batch.action_index);
                    return false;
                };
                if self.slot_of(p.pointer_id).is_some() {
                    // Two downs for one contact without an intervening
                    // up/cancel breaks pointer-identity tracking; the first
                    // contact stays active and the duplicate is dropped.
                    log::warn!(
                        "{}",
                        ProtocolViolation::new("pointer_down", "pointer already active")
                    );
                    return false;
                }
                self.occupy(p.pointer_id);
                sink(&PointerEvent {
                    device_id: batch.device_id,
                    pointer_id: p.pointer_id,
                    phase: PointerPhase::Down,
                    x: p.x,
                    y: p.y,
                })
            }

            MotionAction::Up | MotionAction::PointerUp => {
                let Some(p) = batch.pointers.get(batch.action_index) else {
                    log::warn!("malformed {} batch: no pointer at index {}", batch.action.name(), batch.action_index);
                    return false;
                };
                let Some(slot) = self.slot_of(p.pointer_id) else {
                    log::warn!(
                        "{}",
                        ProtocolViolation::new("pointer_up", "pointer not active")
                    );
                    return false;
                };
                self.slots[slot] = None;
                sink(&PointerEvent {
                    device_id: batch.device_id,
                    pointer_id: p.pointer_id,
                    phase: PointerPhase::Up,
                    x: p.x,
                    y: p.y,
                })
            }

            MotionAction::Move => {
                // One Move per active pointer, ascending slot order, even if
                // only one of them actually moved.
                let mut claimed = false;
                for slot in 0..self.slots.len() {
                    let Some(id) = self.slots[slot] else { continue };
                    let Some(p) = batch.pointers.iter().find(|p| p.pointer_id == id) else {
                        log::debug!("move batch missing active pointer {}", id);
                        continue;
                    };
                    claimed |= sink(&PointerEvent {
                        device_id: batch.device_id,
                        pointer_id: id,
                        phase: PointerPhase::Move,
                        x: p.x,
                        y: p.y,
                    });
                }
                claimed
            }

            MotionAction::Cancel | MotionAction::Outside => {
                let Some(p) = batch.pointers.get(batch.action_index) else {
                    log::warn!("malformed {} batch: no pointer at index {}", batch.action.name(), batch.action_index);
                    return false;
                };
                let Some(slot) = self.slot_of(p.pointer_id) else {
                    log::warn!(
                        "{}",
                        ProtocolViolation::new("pointer_cancel", "pointer not active")
                    );
                    return false;
                };
                // The id is retired and may be reused by a future contact.
                self.slots[slot] = None;
                sink(&PointerEvent {
                    device_id: batch.device_id,
                    pointer_id: p.pointer_id,
                    phase: PointerPhase::Cancel,
                    x: p.x,
                    y: p.y,
                })
            }
        }
    }
}
