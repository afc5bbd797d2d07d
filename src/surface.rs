//! Surface state machine.
//!
//! The rendering surface has its own lifecycle (created → sized → destroyed)
//! nested inside an active application lifetime; one application instance may
//! see many surface cycles (rotation, backgrounding, view detach). The engine
//! must never receive a surface-dependent call while the state is `Absent` or
//! `Destroyed`, and calls for a stale surface identity are rejected until the
//! host creates a new one.

use crate::engine::{PixelLayout, SurfaceRef};
use crate::errors::ProtocolViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Absent,
    Created,
    Sized {
        width: u32,
        height: u32,
        format: PixelLayout,
    },
    Destroyed,
}

/// Payload-free discriminant of [`SurfaceState`], cheap to publish atomically
/// for readers on other threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SurfacePhase {
    Absent = 0,
    Created = 1,
    Sized = 2,
    Destroyed = 3,
}

impl SurfacePhase {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SurfacePhase::Created,
            2 => SurfacePhase::Sized,
            3 => SurfacePhase::Destroyed,
            _ => SurfacePhase::Absent,
        }
    }
}

impl SurfaceState {
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceState::Absent => "Absent",
            SurfaceState::Created => "Created",
            SurfaceState::Sized { .. } => "Sized",
            SurfaceState::Destroyed => "Destroyed",
        }
    }

    pub fn phase(&self) -> SurfacePhase {
        match self {
            SurfaceState::Absent => SurfacePhase::Absent,
            SurfaceState::Created => SurfacePhase::Created,
            SurfaceState::Sized { .. } => SurfacePhase::Sized,
            SurfaceState::Destroyed => SurfacePhase::Destroyed,
        }
    }

    /// Surface-dependent engine calls are legal only here.
    pub fn is_live(&self) -> bool {
        matches!(self, SurfaceState::Created | SurfaceState::Sized { .. })
    }
}

#[derive(Debug)]
pub struct SurfaceMachine {
    state: SurfaceState,
    /// Identity of the live surface, or of the last destroyed one.
    current: Option<SurfaceRef>,
}

impl Default for SurfaceMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceMachine {
    pub fn new() -> Self {
        Self {
            state: SurfaceState::Absent,
            current: None,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn current(&self) -> Option<SurfaceRef> {
        self.current
    }

    fn check_identity(
        &self,
        event: &'static str,
        surface: SurfaceRef,
    ) -> Result<(), ProtocolViolation> {
        if self.current == Some(surface) {
            Ok(())
        } else {
            // Stale or unknown identity: the host destroyed this surface (or
            // never announced it) and must create a new one first.
            Err(ProtocolViolation::new(event, self.state.name()))
        }
    }

    /// A new surface buffer exists. Legal from `Absent` and `Destroyed`; the
    /// machine adopts the new identity.
    pub fn created(&mut self, surface: SurfaceRef) -> Result<(), ProtocolViolation> {
        match self.state {
            SurfaceState::Absent | SurfaceState::Destroyed => {
                log::trace!("surface {} created", surface.0);
                self.state = SurfaceState::Created;
                self.current = Some(surface);
                Ok(())
            }
            _ => Err(ProtocolViolation::new("surface_created", self.state.name())),
        }
    }

    /// Size or format changed. May arrive without an intervening destroy
    /// (resize-in-place); same surface identity, updated dimensions.
    pub fn changed(
        &mut self,
        surface: SurfaceRef,
        format: PixelLayout,
        width: u32,
        height: u32,
    ) -> Result<(), ProtocolViolation> {
        if !self.state.is_live() {
            return Err(ProtocolViolation::new("surface_changed", self.state.name()));
        }
        self.check_identity("surface_changed", surface)?;

        log::trace!("surface {} sized {}x{} {:?}", surface.0, width, height, format);
        self.state = SurfaceState::Sized {
            width,
            height,
            format,
        };
        Ok(())
    }

    pub fn redraw_needed(&mut self, surface: SurfaceRef) -> Result<(), ProtocolViolation> {
        if !self.state.is_live() {
            return Err(ProtocolViolation::new(
                "surface_redraw_needed",
                self.state.name(),
            ));
        }
        self.check_identity("surface_redraw_needed", surface)
    }

    /// The host is about to release the buffer. Legal from the live states;
    /// the caller must forward to the engine synchronously before returning
    /// control to the host.
    pub fn destroyed(&mut self, surface: SurfaceRef) -> Result<(), ProtocolViolation> {
        if !self.state.is_live() {
            return Err(ProtocolViolation::new(
                "surface_destroyed",
                self.state.name(),
            ));
        }
        self.check_identity("surface_destroyed", surface)?;

        log::trace!("surface {} destroyed", surface.0);
        self.state = SurfaceState::Destroyed;
        Ok(())
    }
}
