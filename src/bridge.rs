//! The bridge root object.
//!
//! [`Bridge`] receives the host shell's lifecycle, surface, and input
//! notifications on the host's serialized thread, validates them against the
//! two state machines, and forwards valid transitions to the native engine
//! synchronously. The engine handle is threaded through explicitly; there is
//! no process-wide singleton, so tests can run several engines in-process.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::engine::{EngineHandle, InvalidateSignal, PixelLayout, SurfaceRef};
use crate::errors::BridgeError;
use crate::input::{InputNormalizer, MotionBatch};
use crate::lifecycle::{LifecycleEvent, LifecycleMachine, LifecycleState};
use crate::loader::EngineRegistry;
use crate::surface::{SurfaceMachine, SurfacePhase, SurfaceState};

/// Cross-thread view of the published bridge state.
///
/// The bridge mutates its state only on the host thread, but a render thread
/// reacting to redraw requests may read it concurrently; transitions are
/// therefore published with release stores and read with acquire loads.
#[derive(Debug, Clone)]
pub struct StateWatch {
    inner: Arc<WatchCells>,
}

#[derive(Debug)]
struct WatchCells {
    lifecycle: AtomicU8,
    surface: AtomicU8,
}

impl StateWatch {
    fn new() -> Self {
        Self {
            inner: Arc::new(WatchCells {
                lifecycle: AtomicU8::new(LifecycleState::Idle as u8),
                surface: AtomicU8::new(SurfacePhase::Absent as u8),
            }),
        }
    }

    pub fn lifecycle(&self) -> LifecycleState {
        LifecycleState::from_u8(self.inner.lifecycle.load(Ordering::Acquire))
    }

    pub fn surface_phase(&self) -> SurfacePhase {
        SurfacePhase::from_u8(self.inner.surface.load(Ordering::Acquire))
    }

    fn publish_lifecycle(&self, state: LifecycleState) {
        self.inner.lifecycle.store(state as u8, Ordering::Release);
    }

    fn publish_surface(&self, phase: SurfacePhase) {
        self.inner.surface.store(phase as u8, Ordering::Release);
    }
}

/// Bridge between the host shell and the native engine.
///
/// All entry points execute synchronously on the calling host thread and
/// block until the engine call returns; the bridge performs no internal
/// threading of its own.
pub struct Bridge {
    config: BridgeConfig,
    registry: EngineRegistry,
    engine: Option<EngineHandle>,
    lifecycle: LifecycleMachine,
    surface: SurfaceMachine,
    input: InputNormalizer,
    watch: StateWatch,
    invalidate: InvalidateSignal,
}

impl Bridge {
    /// Create a bridge that loads its engine from `registry` at the first
    /// `on_create`.
    pub fn new(config: BridgeConfig, registry: EngineRegistry) -> Self {
        Self {
            config,
            registry,
            engine: None,
            lifecycle: LifecycleMachine::new(),
            surface: SurfaceMachine::new(),
            input: InputNormalizer::new(),
            watch: StateWatch::new(),
            invalidate: InvalidateSignal::new(),
        }
    }

    /// Create a bridge around an already-loaded engine, e.g. one detached
    /// from a destroyed bridge via [`Bridge::into_engine`] when the host
    /// recreates its visible application object.
    pub fn with_engine(config: BridgeConfig, engine: EngineHandle) -> Self {
        let mut bridge = Self::new(config, EngineRegistry::new());
        bridge.engine = Some(engine);
        bridge
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn surface_state(&self) -> SurfaceState {
        self.surface.state()
    }

    /// Cheap clonable view for readers on other threads.
    pub fn state_watch(&self) -> StateWatch {
        self.watch.clone()
    }

    /// Drain a pending engine redraw request, if any. Coalesced.
    pub fn take_invalidate_request(&self) -> bool {
        self.invalidate.take()
    }

    /// Clone of the redraw signal, raisable from any thread.
    pub fn invalidate_signal(&self) -> InvalidateSignal {
        self.invalidate.clone()
    }

    /// Detach the engine so the host can thread it into a successor bridge.
    /// `None` when the engine was never loaded.
    pub fn into_engine(self) -> Option<EngineHandle> {
        self.engine
    }

    // ---- lifecycle timeline -------------------------------------------

    /// Application instance created. Loads the engine module on first use;
    /// load failure is fatal and leaves the machine in `Idle`.
    pub fn on_create(&mut self, saved_state: Option<&[u8]>) -> Result<(), BridgeError> {
        if let Err(violation) = self.lifecycle.peek(LifecycleEvent::Create) {
            log::warn!("ignoring out-of-order host event: {}", violation);
            return Ok(());
        }

        if self.engine.is_none() {
            let module = self.config.engine_module().to_string();
            let handle = self
                .registry
                .load(&module, &self.config, self.invalidate.clone())
                .map_err(|source| BridgeError::EngineLoad { module, source })?;
            self.engine = Some(handle);
        }

        // Infallible after peek.
        let state = self
            .lifecycle
            .apply(LifecycleEvent::Create)
            .unwrap_or(LifecycleState::Created);
        self.watch.publish_lifecycle(state);

        if let Some(engine) = self.engine.as_mut() {
            engine
                .callbacks_mut()
                .on_create(saved_state, &self.config.display_metrics);
        }
        Ok(())
    }

    pub fn on_start(&mut self) {
        self.lifecycle_event(LifecycleEvent::Start);
    }

    pub fn on_restart(&mut self) {
        self.lifecycle_event(LifecycleEvent::Restart);
    }

    pub fn on_resume(&mut self) {
        self.lifecycle_event(LifecycleEvent::Resume);
    }

    pub fn on_pause(&mut self) {
        self.lifecycle_event(LifecycleEvent::Pause);
    }

    pub fn on_stop(&mut self) {
        self.lifecycle_event(LifecycleEvent::Stop);
    }

    /// Terminal: after this returns no further entry point may forward
    /// anything on this instance. The engine handle stays available through
    /// [`Bridge::into_engine`].
    pub fn on_destroy(&mut self) {
        self.lifecycle_event(LifecycleEvent::Destroy);
    }

    fn lifecycle_event(&mut self, event: LifecycleEvent) {
        let state = match self.lifecycle.apply(event) {
            Ok(state) => state,
            Err(violation) => {
                log::warn!("ignoring out-of-order host event: {}", violation);
                return;
            }
        };
        self.watch.publish_lifecycle(state);

        let Some(engine) = self.engine.as_mut() else {
            // Unreachable past on_create; every other event is rejected in
            // Idle by the machine.
            return;
        };
        let callbacks = engine.callbacks_mut();
        match event {
            LifecycleEvent::Create => {}
            LifecycleEvent::Start => callbacks.on_start(),
            LifecycleEvent::Restart => callbacks.on_restart(),
            LifecycleEvent::Resume => callbacks.on_resume(),
            LifecycleEvent::Pause => callbacks.on_pause(),
            LifecycleEvent::Stop => callbacks.on_stop(),
            LifecycleEvent::Destroy => callbacks.on_destroy(),
        }
    }

    // ---- surface timeline ---------------------------------------------

    pub fn surface_created(&mut self, surface: SurfaceRef) {
        if !self.surface_gate("surface_created") {
            return;
        }
        if let Err(violation) = self.surface.created(surface) {
            log::warn!("ignoring surface event: {}", violation);
            return;
        }
        self.watch.publish_surface(SurfacePhase::Created);
        if let Some(engine) = self.engine.as_mut() {
            engine.callbacks_mut().surface_created(&surface);
        }
    }

    pub fn surface_changed(
        &mut self,
        surface: SurfaceRef,
        format: PixelLayout,
        width: u32,
        height: u32,
    ) {
        if !self.surface_gate("surface_changed") {
            return;
        }
        if let Err(violation) = self.surface.changed(surface, format, width, height) {
            log::warn!("ignoring surface event: {}", violation);
            return;
        }
        self.watch.publish_surface(SurfacePhase::Sized);
        if let Some(engine) = self.engine.as_mut() {
            engine
                .callbacks_mut()
                .surface_changed(&surface, format, width, height);
        }
    }

    pub fn surface_redraw_needed(&mut self, surface: SurfaceRef) {
        if !self.surface_gate("surface_redraw_needed") {
            return;
        }
        if let Err(violation) = self.surface.redraw_needed(surface) {
            log::warn!("ignoring surface event: {}", violation);
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.callbacks_mut().surface_redraw_needed(&surface);
        }
    }

    /// Blocking from the host's perspective: when this returns, the engine
    /// has dropped every reference to the surface and the host may release
    /// the underlying buffer.
    pub fn surface_destroyed(&mut self, surface: SurfaceRef) {
        if !self.surface_gate("surface_destroyed") {
            return;
        }
        if let Err(violation) = self.surface.destroyed(surface) {
            log::warn!("ignoring surface event: {}", violation);
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.callbacks_mut().surface_destroyed(&surface);
        }
        // Published after the engine acknowledged the teardown, so a reader
        // seeing Destroyed knows the surface is no longer referenced.
        self.watch.publish_surface(SurfacePhase::Destroyed);
    }

    /// Host shells occasionally race surface callbacks against teardown;
    /// outside the active lifecycle range they are ignored and logged.
    fn surface_gate(&self, event: &'static str) -> bool {
        let state = self.lifecycle.state();
        if state.is_surface_active() {
            true
        } else {
            log::warn!("ignoring {} while lifecycle is {}", event, state.name());
            false
        }
    }

    // ---- input timeline -----------------------------------------------

    /// Normalize one host pointer batch and deliver the canonical events to
    /// the engine. Returns whether the engine claimed the batch; unclaimed
    /// batches fall through to the host's default gesture handling.
    pub fn on_motion(&mut self, batch: &MotionBatch) -> bool {
        if !self.lifecycle.state().is_surface_active() {
            log::debug!(
                "dropping {} batch while lifecycle is {}",
                batch.action.name(),
                self.lifecycle.state().name()
            );
            return false;
        }
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };

        let callbacks = engine.callbacks_mut();
        self.input
            .normalize(batch, |event| callbacks.pointer_event(event))
    }

    // ---- application-level signals ------------------------------------

    /// Host-triggered serialize request; the returned blob is carried by the
    /// host across process death and handed back at the next `on_create`.
    pub fn save_state(&mut self) -> Option<Vec<u8>> {
        self.engine.as_mut()?.callbacks_mut().save_state()
    }

    pub fn configuration_changed(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.callbacks_mut().configuration_changed();
        }
    }

    pub fn low_memory(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.callbacks_mut().low_memory();
        }
    }

    pub fn trim_memory(&mut self, level: i32) {
        if let Some(engine) = self.engine.as_mut() {
            engine.callbacks_mut().trim_memory(level);
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("lifecycle", &self.lifecycle.state())
            .field("surface", &self.surface.state())
            .field("engine", &self.engine)
            .finish()
    }
}
