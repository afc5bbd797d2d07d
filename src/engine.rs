//! The outbound call boundary between the bridge and the native engine.
//!
//! The bridge never interprets pixel data or font metrics; it forwards opaque
//! buffers and handles through [`EngineCallbacks`] and coordinates *when* the
//! engine is allowed to touch them. Every callback runs synchronously on the
//! host's serialized thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::input::PointerEvent;

/// Display metrics delivered to the engine once, at create.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMetrics {
    /// Logical density scale factor.
    pub density: f32,
    /// Screen density in dots per inch, bucketed.
    pub density_dpi: i32,
    /// Density scale for fonts, honors user text-size settings.
    pub scaled_density: f32,
    /// Physical width of the display in pixels.
    pub width_pixels: i32,
    /// Physical height of the display in pixels.
    pub height_pixels: i32,
    /// Exact horizontal dots per inch.
    pub xdpi: f32,
    /// Exact vertical dots per inch.
    pub ydpi: f32,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self {
            density: 1.0,
            density_dpi: 160,
            scaled_density: 1.0,
            width_pixels: 0,
            height_pixels: 0,
            xdpi: 160.0,
            ydpi: 160.0,
        }
    }
}

/// Opaque identity of a host surface buffer.
///
/// The bridge compares identities to reject surface calls that arrive for a
/// surface the host already destroyed; it never dereferences the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceRef(pub u64);

/// Pixel layout reported by the host in `surface_changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgba8888,
    Rgbx8888,
    Rgb565,
    /// Host-specific layout the bridge does not need to understand.
    Other(i32),
}

impl PixelLayout {
    /// Map the host's raw format code. Codes follow the common mobile
    /// convention (1 = RGBA_8888, 2 = RGBX_8888, 4 = RGB_565).
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => PixelLayout::Rgba8888,
            2 => PixelLayout::Rgbx8888,
            4 => PixelLayout::Rgb565,
            other => PixelLayout::Other(other),
        }
    }
}

/// Fire-and-forget redraw request the engine may raise from any thread.
///
/// The flag is coalesced: raising it twice before the host polls yields a
/// single redraw. The host drains it with [`InvalidateSignal::take`] on its
/// next paint opportunity.
#[derive(Debug, Clone, Default)]
pub struct InvalidateSignal(Arc<AtomicBool>);

impl InvalidateSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the host to schedule a redraw. Callable from any thread.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume a pending request, if any.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Fixed set of callbacks the bridge drives on the native engine.
///
/// One method per host notification in the lifecycle, surface, and input
/// timelines, plus the opaque application-level signals. Implementations must
/// not block the calling thread indefinitely; the host shell treats an
/// unresponsive callback as a fatal hang.
pub trait EngineCallbacks: Send {
    /// Application instance created. `saved_state` is the uninterpreted blob
    /// produced by an earlier [`EngineCallbacks::save_state`], carried by the
    /// host across process death.
    fn on_create(&mut self, saved_state: Option<&[u8]>, metrics: &DisplayMetrics);
    fn on_start(&mut self);
    fn on_restart(&mut self);
    fn on_resume(&mut self);
    fn on_pause(&mut self);
    fn on_stop(&mut self);
    fn on_destroy(&mut self);

    /// Host-triggered serialize request. The returned blob is owned by the
    /// host and comes back through `on_create` after a process restart.
    fn save_state(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn surface_created(&mut self, surface: &SurfaceRef);
    fn surface_changed(&mut self, surface: &SurfaceRef, format: PixelLayout, width: u32, height: u32);
    fn surface_redraw_needed(&mut self, surface: &SurfaceRef);
    /// The engine must drop every reference to the surface before returning;
    /// the host releases the underlying buffer as soon as this call ends.
    fn surface_destroyed(&mut self, surface: &SurfaceRef);

    /// Returns whether the engine claimed the event. Unclaimed events fall
    /// back to the host's default handling.
    fn pointer_event(&mut self, event: &PointerEvent) -> bool;

    fn configuration_changed(&mut self) {}
    fn low_memory(&mut self) {}
    fn trim_memory(&mut self, _level: i32) {}
}

/// Owning handle for a loaded engine.
///
/// Created once per process by the loader; a host that recreates its visible
/// application object can detach the handle from the destroyed bridge
/// ([`crate::bridge::Bridge::into_engine`]) and thread it into the next one,
/// so the engine itself is never re-loaded in-process.
pub struct EngineHandle {
    module: String,
    callbacks: Box<dyn EngineCallbacks>,
}

impl EngineHandle {
    pub fn new(module: impl Into<String>, callbacks: Box<dyn EngineCallbacks>) -> Self {
        Self {
            module: module.into(),
            callbacks,
        }
    }

    /// Logical name of the module this engine was loaded from.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub(crate) fn callbacks_mut(&mut self) -> &mut dyn EngineCallbacks {
        self.callbacks.as_mut()
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("module", &self.module)
            .field("callbacks", &"Box<dyn EngineCallbacks>")
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_signal_is_coalesced() {
        let signal = InvalidateSignal::new();
        assert!(!signal.take());
        signal.raise();
        signal.raise();
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn invalidate_signal_crosses_threads() {
        let signal = InvalidateSignal::new();
        let remote = signal.clone();
        std::thread::spawn(move || remote.raise())
            .join()
            .unwrap();
        assert!(signal.take());
    }

    #[test]
    fn pixel_layout_from_raw_maps_known_codes() {
        assert_eq!(PixelLayout::from_raw(1), PixelLayout::Rgba8888);
        assert_eq!(PixelLayout::from_raw(2), PixelLayout::Rgbx8888);
        assert_eq!(PixelLayout::from_raw(4), PixelLayout::Rgb565);
        assert_eq!(PixelLayout::from_raw(99), PixelLayout::Other(99));
    }

    #[test]
    fn display_metrics_default_is_mdpi() {
        let m = DisplayMetrics::default();
        assert_eq!(m.density_dpi, 160);
        assert_eq!(m.density, 1.0);
    }
}
