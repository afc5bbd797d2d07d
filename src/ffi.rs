//! C ABI for host shells.
//!
//! The host links the cdylib, fills a [`RawEngineVTable`] with its engine
//! entry points, and drives the bridge through the `shell_bridge_*`
//! functions from its serialized callback thread. All pointers handed in
//! must stay valid for the duration of the call; the bridge copies what it
//! needs to keep.

use std::ffi::{c_int, c_void, CStr};
use std::os::raw::c_char;
use std::ptr;

use crate::bridge::Bridge;
use crate::config::{BridgeConfig, Manifest};
use crate::engine::{
    DisplayMetrics, EngineCallbacks, InvalidateSignal, PixelLayout, SurfaceRef,
};
use crate::input::{BatchPointer, MotionAction, MotionBatch, PointerEvent, PointerPhase};
use crate::loader::EngineRegistry;

/// Opaque bridge handle passed back and forth across the boundary.
pub struct ShellBridgeHandle {
    bridge: Bridge,
}

/// Display metrics in C layout, copied into the bridge config at creation.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawDisplayMetrics {
    pub density: f32,
    pub density_dpi: i32,
    pub scaled_density: f32,
    pub width_pixels: i32,
    pub height_pixels: i32,
    pub xdpi: f32,
    pub ydpi: f32,
}

impl From<RawDisplayMetrics> for DisplayMetrics {
    fn from(raw: RawDisplayMetrics) -> Self {
        Self {
            density: raw.density,
            density_dpi: raw.density_dpi,
            scaled_density: raw.scaled_density,
            width_pixels: raw.width_pixels,
            height_pixels: raw.height_pixels,
            xdpi: raw.xdpi,
            ydpi: raw.ydpi,
        }
    }
}

/// Engine entry points supplied by the host-side engine library.
///
/// Every slot is optional; a null slot is skipped. `user_data` is passed back
/// verbatim as the first argument of every call and is owned by the caller,
/// who guarantees it is usable from whichever thread hosts the bridge.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawEngineVTable {
    pub user_data: *mut c_void,
    pub on_create:
        Option<unsafe extern "C" fn(*mut c_void, *const u8, usize, *const RawDisplayMetrics)>,
    pub on_start: Option<unsafe extern "C" fn(*mut c_void)>,
    pub on_restart: Option<unsafe extern "C" fn(*mut c_void)>,
    pub on_resume: Option<unsafe extern "C" fn(*mut c_void)>,
    pub on_pause: Option<unsafe extern "C" fn(*mut c_void)>,
    pub on_stop: Option<unsafe extern "C" fn(*mut c_void)>,
    pub on_destroy: Option<unsafe extern "C" fn(*mut c_void)>,
    /// Copy up to `cap` bytes of serialized state into `out`; return the full
    /// length. A return of zero means nothing to save.
    pub save_state: Option<unsafe extern "C" fn(*mut c_void, *mut u8, usize) -> usize>,
    pub surface_created: Option<unsafe extern "C" fn(*mut c_void, u64)>,
    pub surface_changed: Option<unsafe extern "C" fn(*mut c_void, u64, c_int, u32, u32)>,
    pub surface_redraw_needed: Option<unsafe extern "C" fn(*mut c_void, u64)>,
    pub surface_destroyed: Option<unsafe extern "C" fn(*mut c_void, u64)>,
    /// device_id, pointer_id, phase (0 down, 1 move, 2 up, 3 cancel), x, y.
    /// Returns whether the engine claimed the event.
    pub pointer_event:
        Option<unsafe extern "C" fn(*mut c_void, c_int, c_int, c_int, f32, f32) -> bool>,
    pub configuration_changed: Option<unsafe extern "C" fn(*mut c_void)>,
    pub low_memory: Option<unsafe extern "C" fn(*mut c_void)>,
    pub trim_memory: Option<unsafe extern "C" fn(*mut c_void, c_int)>,
}

/// Adapter presenting a [`RawEngineVTable`] as [`EngineCallbacks`].
struct VTableEngine {
    vtable: RawEngineVTable,
}

// Thread affinity of user_data is the caller's contract; see RawEngineVTable.
unsafe impl Send for VTableEngine {}

impl VTableEngine {
    fn raw_phase(phase: PointerPhase) -> c_int {
        match phase {
            PointerPhase::Down => 0,
            PointerPhase::Move => 1,
            PointerPhase::Up => 2,
            PointerPhase::Cancel => 3,
        }
    }
}

impl EngineCallbacks for VTableEngine {
    fn on_create(&mut self, saved_state: Option<&[u8]>, metrics: &DisplayMetrics) {
        if let Some(f) = self.vtable.on_create {
            let raw = RawDisplayMetrics {
                density: metrics.density,
                density_dpi: metrics.density_dpi,
                scaled_density: metrics.scaled_density,
                width_pixels: metrics.width_pixels,
                height_pixels: metrics.height_pixels,
                xdpi: metrics.xdpi,
                ydpi: metrics.ydpi,
            };
            let (blob, len) = match saved_state {
                Some(blob) => (blob.as_ptr(), blob.len()),
                None => (ptr::null(), 0),
            };
            unsafe { f(self.vtable.user_data, blob, len, &raw) }
        }
    }

    fn on_start(&mut self) {
        if let Some(f) = self.vtable.on_start {
            unsafe { f(self.vtable.user_data) }
        }
    }

    fn on_restart(&mut self) {
        if let Some(f) = self.vtable.on_restart {
            unsafe { f(self.vtable.user_data) }
        }
    }

    fn on_resume(&mut self) {
        if let Some(f) = self.vtable.on_resume {
            unsafe { f(self.vtable.user_data) }
        }
    }

    fn on_pause(&mut self) {
        if let Some(f) = self.vtable.on_pause {
            unsafe { f(self.vtable.user_data) }
        }
    }

    fn on_stop(&mut self) {
        if let Some(f) = self.vtable.on_stop {
            unsafe { f(self.vtable.user_data) }
        }
    }

    fn on_destroy(&mut self) {
        if let Some(f) = self.vtable.on_destroy {
            unsafe { f(self.vtable.user_data) }
        }
    }

    fn save_state(&mut self) -> Option<Vec<u8>> {
        let f = self.vtable.save_state?;
        // First call sizes the blob, second fills it.
        let len = unsafe { f(self.vtable.user_data, ptr::null_mut(), 0) };
        if len == 0 {
            return None;
        }
        let mut blob = vec![0u8; len];
        let written = unsafe { f(self.vtable.user_data, blob.as_mut_ptr(), blob.len()) };
        blob.truncate(written.min(len));
        Some(blob)
    }

    fn surface_created(&mut self, surface: &SurfaceRef) {
        if let Some(f) = self.vtable.surface_created {
            unsafe { f(self.vtable.user_data, surface.0) }
        }
    }

    fn surface_changed(
        &mut self,
        surface: &SurfaceRef,
        format: PixelLayout,
        width: u32,
        height: u32,
    ) {
        if let Some(f) = self.vtable.surface_changed {
            let raw_format = match format {
                PixelLayout::Rgba8888 => 1,
                PixelLayout::Rgbx8888 => 2,
                PixelLayout::Rgb565 => 4,
                PixelLayout::Other(code) => code,
            };
            unsafe { f(self.vtable.user_data, surface.0, raw_format, width, height) }
        }
    }

    fn surface_redraw_needed(&mut self, surface: &SurfaceRef) {
        if let Some(f) = self.vtable.surface_redraw_needed {
            unsafe { f(self.vtable.user_data, surface.0) }
        }
    }

    fn surface_destroyed(&mut self, surface: &SurfaceRef) {
        if let Some(f) = self.vtable.surface_destroyed {
            unsafe { f(self.vtable.user_data, surface.0) }
        }
    }

    fn pointer_event(&mut self, event: &PointerEvent) -> bool {
        match self.vtable.pointer_event {
            Some(f) => unsafe {
                f(
                    self.vtable.user_data,
                    event.device_id,
                    event.pointer_id,
                    Self::raw_phase(event.phase),
                    event.x,
                    event.y,
                )
            },
            None => false,
        }
    }

    fn configuration_changed(&mut self) {
        if let Some(f) = self.vtable.configuration_changed {
            unsafe { f(self.vtable.user_data) }
        }
    }

    fn low_memory(&mut self) {
        if let Some(f) = self.vtable.low_memory {
            unsafe { f(self.vtable.user_data) }
        }
    }

    fn trim_memory(&mut self, level: i32) {
        if let Some(f) = self.vtable.trim_memory {
            unsafe { f(self.vtable.user_data, level) }
        }
    }
}

fn bridge_for_vtable(vtable: RawEngineVTable, config: BridgeConfig) -> Bridge {
    let module = config.engine_module().to_string();
    let mut registry = EngineRegistry::new();
    registry.register(module, move |_config, _invalidate| {
        Ok(Box::new(VTableEngine { vtable }) as Box<dyn EngineCallbacks>)
    });
    Bridge::new(config, registry)
}

/// Initialise env-filtered logging for the library. Safe to call repeatedly;
/// only the first call takes effect.
#[no_mangle]
pub extern "C" fn shell_bridge_enable_logging() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

/// Create a bridge around a host engine vtable with default configuration.
#[no_mangle]
pub extern "C" fn shell_bridge_new(
    vtable: RawEngineVTable,
    metrics: RawDisplayMetrics,
) -> *mut ShellBridgeHandle {
    let config = BridgeConfig {
        display_metrics: metrics.into(),
        ..BridgeConfig::default()
    };
    Box::into_raw(Box::new(ShellBridgeHandle {
        bridge: bridge_for_vtable(vtable, config),
    }))
}

/// Create a bridge with a package manifest JSON (module-name metadata and
/// friends). Returns null when the manifest does not parse.
///
/// # Safety
/// `manifest_json` must be a valid nul-terminated C string or null.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_new_with_manifest(
    vtable: RawEngineVTable,
    metrics: RawDisplayMetrics,
    manifest_json: *const c_char,
) -> *mut ShellBridgeHandle {
    if manifest_json.is_null() {
        return shell_bridge_new(vtable, metrics);
    }
    let json = match CStr::from_ptr(manifest_json).to_str() {
        Ok(s) => s,
        Err(e) => {
            log::error!("manifest is not valid UTF-8: {}", e);
            return ptr::null_mut();
        }
    };
    let manifest = match Manifest::from_json(json) {
        Ok(m) => m,
        Err(e) => {
            log::error!("manifest failed to parse: {}", e);
            return ptr::null_mut();
        }
    };
    let config = BridgeConfig {
        manifest,
        display_metrics: metrics.into(),
    };
    Box::into_raw(Box::new(ShellBridgeHandle {
        bridge: bridge_for_vtable(vtable, config),
    }))
}

unsafe fn bridge_mut<'a>(handle: *mut ShellBridgeHandle) -> Option<&'a mut Bridge> {
    handle.as_mut().map(|h| &mut h.bridge)
}

/// Application created. `saved_state` may be null when there is nothing to
/// restore. Returns false on fatal engine-load failure; the host must abort
/// startup in that case.
///
/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed;
/// `saved_state` must point to `saved_state_len` readable bytes or be null.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_on_create(
    handle: *mut ShellBridgeHandle,
    saved_state: *const u8,
    saved_state_len: usize,
) -> bool {
    let Some(bridge) = bridge_mut(handle) else {
        return false;
    };
    let blob = if saved_state.is_null() || saved_state_len == 0 {
        None
    } else {
        Some(std::slice::from_raw_parts(saved_state, saved_state_len))
    };
    match bridge.on_create(blob) {
        Ok(()) => true,
        Err(e) => {
            log::error!("startup aborted: {}", e);
            false
        }
    }
}

macro_rules! lifecycle_entry {
    ($name:ident, $method:ident) => {
        /// # Safety
        /// `handle` must come from a `shell_bridge_new*` call and not yet be
        /// freed.
        #[no_mangle]
        pub unsafe extern "C" fn $name(handle: *mut ShellBridgeHandle) {
            if let Some(bridge) = bridge_mut(handle) {
                bridge.$method();
            }
        }
    };
}

lifecycle_entry!(shell_bridge_on_start, on_start);
lifecycle_entry!(shell_bridge_on_restart, on_restart);
lifecycle_entry!(shell_bridge_on_resume, on_resume);
lifecycle_entry!(shell_bridge_on_pause, on_pause);
lifecycle_entry!(shell_bridge_on_stop, on_stop);
lifecycle_entry!(shell_bridge_on_destroy, on_destroy);

/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_surface_created(
    handle: *mut ShellBridgeHandle,
    surface: u64,
) {
    if let Some(bridge) = bridge_mut(handle) {
        bridge.surface_created(SurfaceRef(surface));
    }
}

/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_surface_changed(
    handle: *mut ShellBridgeHandle,
    surface: u64,
    format: c_int,
    width: u32,
    height: u32,
) {
    if let Some(bridge) = bridge_mut(handle) {
        bridge.surface_changed(
            SurfaceRef(surface),
            PixelLayout::from_raw(format),
            width,
            height,
        );
    }
}

/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_surface_redraw_needed(
    handle: *mut ShellBridgeHandle,
    surface: u64,
) {
    if let Some(bridge) = bridge_mut(handle) {
        bridge.surface_redraw_needed(SurfaceRef(surface));
    }
}

/// Blocks until the engine has released the surface.
///
/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_surface_destroyed(
    handle: *mut ShellBridgeHandle,
    surface: u64,
) {
    if let Some(bridge) = bridge_mut(handle) {
        bridge.surface_destroyed(SurfaceRef(surface));
    }
}

/// Deliver one pointer batch. `action` uses the host motion codes (0 down,
/// 1 up, 2 move, 3 cancel, 4 outside, 5 pointer-down, 6 pointer-up);
/// `ids`, `xs`, and `ys` are parallel arrays of `count` entries. Returns
/// whether the engine claimed the batch.
///
/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed;
/// `ids`, `xs`, and `ys` must each point to `count` readable elements.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_on_touch(
    handle: *mut ShellBridgeHandle,
    device_id: c_int,
    action: c_int,
    action_index: usize,
    count: usize,
    ids: *const c_int,
    xs: *const f32,
    ys: *const f32,
) -> bool {
    let Some(bridge) = bridge_mut(handle) else {
        return false;
    };
    let Some(action) = MotionAction::from_raw(action) else {
        log::warn!("unknown motion action code {}", action);
        return false;
    };
    // Empty batches may legally carry null arrays; slices are built only
    // when there is something to read.
    let pointers = if count == 0 {
        Vec::new()
    } else {
        if ids.is_null() || xs.is_null() || ys.is_null() {
            return false;
        }
        let ids = std::slice::from_raw_parts(ids, count);
        let xs = std::slice::from_raw_parts(xs, count);
        let ys = std::slice::from_raw_parts(ys, count);
        (0..count)
            .map(|i| BatchPointer {
                pointer_id: ids[i],
                x: xs[i],
                y: ys[i],
            })
            .collect()
    };

    bridge.on_motion(&MotionBatch {
        device_id,
        action,
        action_index,
        pointers,
    })
}

/// Serialize engine state into `out` (up to `cap` bytes); returns the full
/// blob length, or zero when there is nothing to save. Call with a null `out`
/// to size the buffer first.
///
/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed;
/// `out` must point to `cap` writable bytes or be null.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_save_state(
    handle: *mut ShellBridgeHandle,
    out: *mut u8,
    cap: usize,
) -> usize {
    let Some(bridge) = bridge_mut(handle) else {
        return 0;
    };
    let Some(blob) = bridge.save_state() else {
        return 0;
    };
    if !out.is_null() && cap > 0 {
        let n = blob.len().min(cap);
        std::slice::from_raw_parts_mut(out, n).copy_from_slice(&blob[..n]);
    }
    blob.len()
}

/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_configuration_changed(handle: *mut ShellBridgeHandle) {
    if let Some(bridge) = bridge_mut(handle) {
        bridge.configuration_changed();
    }
}

/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_low_memory(handle: *mut ShellBridgeHandle) {
    if let Some(bridge) = bridge_mut(handle) {
        bridge.low_memory();
    }
}

/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_trim_memory(handle: *mut ShellBridgeHandle, level: c_int) {
    if let Some(bridge) = bridge_mut(handle) {
        bridge.trim_memory(level);
    }
}

/// Drain a pending engine redraw request. Coalesced; returns true at most
/// once per raised request.
///
/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_take_invalidate(handle: *mut ShellBridgeHandle) -> bool {
    match bridge_mut(handle) {
        Some(bridge) => bridge.take_invalidate_request(),
        None => false,
    }
}

/// Clonable invalidate endpoint the engine may keep on its own threads.
pub struct ShellBridgeInvalidate {
    signal: InvalidateSignal,
}

/// Obtain an invalidate endpoint tied to this bridge. Free it with
/// [`shell_bridge_invalidate_free`]; it stays safe to raise after the bridge
/// itself is freed.
///
/// # Safety
/// `handle` must come from a `shell_bridge_new*` call and not yet be freed.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_invalidate_handle(
    handle: *mut ShellBridgeHandle,
) -> *mut ShellBridgeInvalidate {
    match bridge_mut(handle) {
        Some(bridge) => Box::into_raw(Box::new(ShellBridgeInvalidate {
            signal: bridge.invalidate_signal(),
        })),
        None => ptr::null_mut(),
    }
}

/// Request a redraw. Callable from any thread.
///
/// # Safety
/// `invalidate` must come from `shell_bridge_invalidate_handle` and not yet
/// be freed.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_invalidate_raise(invalidate: *mut ShellBridgeInvalidate) {
    if let Some(inv) = invalidate.as_ref() {
        inv.signal.raise();
    }
}

/// # Safety
/// `invalidate` must come from `shell_bridge_invalidate_handle`; passing it
/// twice is undefined behaviour. Null is ignored.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_invalidate_free(invalidate: *mut ShellBridgeInvalidate) {
    if !invalidate.is_null() {
        drop(Box::from_raw(invalidate));
    }
}

/// Destroy the bridge. The engine vtable is dropped; any state the engine
/// wants to keep must already live behind `user_data`.
///
/// # Safety
/// `handle` must come from a `shell_bridge_new*` call; passing it twice is
/// undefined behaviour. Null is ignored.
#[no_mangle]
pub unsafe extern "C" fn shell_bridge_free(handle: *mut ShellBridgeHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Call log shared with the extern "C" stubs below; tests that read it
    // serialize on LOG_GUARD.
    static LOG: Mutex<Vec<String>> = Mutex::new(Vec::new());
    static LOG_GUARD: Mutex<()> = Mutex::new(());

    fn push(line: String) {
        LOG.lock().unwrap().push(line);
    }

    fn drain_log() -> Vec<String> {
        std::mem::take(&mut *LOG.lock().unwrap())
    }

    unsafe extern "C" fn rec_on_create(
        _ud: *mut c_void,
        saved: *const u8,
        len: usize,
        metrics: *const RawDisplayMetrics,
    ) {
        let dpi = (*metrics).density_dpi;
        let saved = if saved.is_null() { 0 } else { len };
        push(format!("on_create saved={} dpi={}", saved, dpi));
    }

    unsafe extern "C" fn rec_on_start(_ud: *mut c_void) {
        push("on_start".into());
    }

    unsafe extern "C" fn rec_on_resume(_ud: *mut c_void) {
        push("on_resume".into());
    }

    unsafe extern "C" fn rec_surface_changed(
        _ud: *mut c_void,
        surface: u64,
        format: c_int,
        width: u32,
        height: u32,
    ) {
        push(format!(
            "surface_changed {} {} {}x{}",
            surface, format, width, height
        ));
    }

    unsafe extern "C" fn rec_pointer(
        _ud: *mut c_void,
        device: c_int,
        pointer: c_int,
        phase: c_int,
        x: f32,
        y: f32,
    ) -> bool {
        push(format!(
            "pointer d={} id={} p={} ({},{})",
            device, pointer, phase, x, y
        ));
        true
    }

    unsafe extern "C" fn rec_save_state(_ud: *mut c_void, out: *mut u8, cap: usize) -> usize {
        let blob = [7u8, 8, 9];
        if !out.is_null() && cap > 0 {
            let n = blob.len().min(cap);
            std::slice::from_raw_parts_mut(out, n).copy_from_slice(&blob[..n]);
        }
        blob.len()
    }

    fn empty_vtable() -> RawEngineVTable {
        RawEngineVTable {
            user_data: ptr::null_mut(),
            on_create: None,
            on_start: None,
            on_restart: None,
            on_resume: None,
            on_pause: None,
            on_stop: None,
            on_destroy: None,
            save_state: None,
            surface_created: None,
            surface_changed: None,
            surface_redraw_needed: None,
            surface_destroyed: None,
            pointer_event: None,
            configuration_changed: None,
            low_memory: None,
            trim_memory: None,
        }
    }

    fn recording_vtable() -> RawEngineVTable {
        RawEngineVTable {
            on_create: Some(rec_on_create),
            on_start: Some(rec_on_start),
            on_resume: Some(rec_on_resume),
            surface_changed: Some(rec_surface_changed),
            pointer_event: Some(rec_pointer),
            save_state: Some(rec_save_state),
            ..empty_vtable()
        }
    }

    fn metrics() -> RawDisplayMetrics {
        RawDisplayMetrics {
            density: 2.75,
            density_dpi: 440,
            scaled_density: 2.75,
            width_pixels: 1080,
            height_pixels: 2400,
            xdpi: 442.0,
            ydpi: 444.0,
        }
    }

    #[test]
    fn full_session_through_the_c_surface() {
        let _guard = LOG_GUARD.lock().unwrap();
        drain_log();

        let handle = shell_bridge_new(recording_vtable(), metrics());
        unsafe {
            assert!(shell_bridge_on_create(handle, ptr::null(), 0));
            shell_bridge_on_start(handle);
            shell_bridge_on_resume(handle);
            shell_bridge_surface_created(handle, 77);
            shell_bridge_surface_changed(handle, 77, 1, 1080, 2400);

            let ids = [3 as c_int];
            let xs = [10.5f32];
            let ys = [20.5f32];
            assert!(shell_bridge_on_touch(
                handle,
                0,
                0, // down
                0,
                1,
                ids.as_ptr(),
                xs.as_ptr(),
                ys.as_ptr(),
            ));

            shell_bridge_free(handle);
        }

        assert_eq!(
            drain_log(),
            vec![
                "on_create saved=0 dpi=440",
                "on_start",
                "on_resume",
                "surface_changed 77 1 1080x2400",
                "pointer d=0 id=3 p=0 (10.5,20.5)"
            ]
        );
    }

    #[test]
    fn save_state_copies_into_caller_buffer() {
        let _guard = LOG_GUARD.lock().unwrap();
        drain_log();

        let handle = shell_bridge_new(recording_vtable(), metrics());
        unsafe {
            assert!(shell_bridge_on_create(handle, ptr::null(), 0));

            let len = shell_bridge_save_state(handle, ptr::null_mut(), 0);
            assert_eq!(len, 3);
            let mut buf = vec![0u8; len];
            let written = shell_bridge_save_state(handle, buf.as_mut_ptr(), buf.len());
            assert_eq!(written, 3);
            assert_eq!(buf, vec![7, 8, 9]);

            shell_bridge_free(handle);
        }
        drain_log();
    }

    #[test]
    fn saved_state_blob_reaches_on_create() {
        let _guard = LOG_GUARD.lock().unwrap();
        drain_log();

        let handle = shell_bridge_new(recording_vtable(), metrics());
        let blob = [1u8, 2, 3, 4, 5];
        unsafe {
            assert!(shell_bridge_on_create(handle, blob.as_ptr(), blob.len()));
            shell_bridge_free(handle);
        }
        assert_eq!(drain_log(), vec!["on_create saved=5 dpi=440"]);
    }

    #[test]
    fn null_handle_entry_points_are_inert() {
        unsafe {
            assert!(!shell_bridge_on_create(ptr::null_mut(), ptr::null(), 0));
            shell_bridge_on_start(ptr::null_mut());
            shell_bridge_surface_created(ptr::null_mut(), 1);
            assert_eq!(
                shell_bridge_save_state(ptr::null_mut(), ptr::null_mut(), 0),
                0
            );
            assert!(!shell_bridge_take_invalidate(ptr::null_mut()));
            shell_bridge_free(ptr::null_mut());
            shell_bridge_invalidate_free(ptr::null_mut());
        }
    }

    #[test]
    fn manifest_selects_module_and_bad_json_is_rejected() {
        let json = std::ffi::CString::new(
            r#"{"package":"com.example.app","metadata":{"engine.module":"engine"}}"#,
        )
        .unwrap();
        unsafe {
            let handle = shell_bridge_new_with_manifest(empty_vtable(), metrics(), json.as_ptr());
            assert!(!handle.is_null());
            shell_bridge_free(handle);

            let bad = std::ffi::CString::new("{not json").unwrap();
            let handle = shell_bridge_new_with_manifest(empty_vtable(), metrics(), bad.as_ptr());
            assert!(handle.is_null());
        }
    }

    #[test]
    fn invalidate_endpoint_outlives_bridge_calls() {
        let handle = shell_bridge_new(empty_vtable(), metrics());
        unsafe {
            let inv = shell_bridge_invalidate_handle(handle);
            assert!(!inv.is_null());

            shell_bridge_invalidate_raise(inv);
            assert!(shell_bridge_take_invalidate(handle));
            assert!(!shell_bridge_take_invalidate(handle));

            shell_bridge_free(handle);
            // Still safe to raise; nobody is listening any more.
            shell_bridge_invalidate_raise(inv);
            shell_bridge_invalidate_free(inv);
        }
    }

    #[test]
    fn empty_vtable_session_does_not_crash() {
        let handle = shell_bridge_new(empty_vtable(), metrics());
        unsafe {
            assert!(shell_bridge_on_create(handle, ptr::null(), 0));
            shell_bridge_on_start(handle);
            shell_bridge_surface_created(handle, 1);
            shell_bridge_surface_redraw_needed(handle, 1);
            shell_bridge_surface_destroyed(handle, 1);
            shell_bridge_configuration_changed(handle);
            shell_bridge_low_memory(handle);
            shell_bridge_trim_memory(handle, 10);
            shell_bridge_free(handle);
        }
    }

    #[test]
    fn zero_count_batch_with_null_arrays_is_handled() {
        let _guard = LOG_GUARD.lock().unwrap();
        drain_log();

        let handle = shell_bridge_new(recording_vtable(), metrics());
        unsafe {
            assert!(shell_bridge_on_create(handle, ptr::null(), 0));
            shell_bridge_on_start(handle);
            drain_log();

            // Hosts may deliver an empty move batch with null arrays; it
            // must yield no events rather than touch the pointers.
            assert!(!shell_bridge_on_touch(
                handle,
                0,
                2, // move
                0,
                0,
                ptr::null(),
                ptr::null(),
                ptr::null(),
            ));
            assert!(drain_log().is_empty());
            shell_bridge_free(handle);
        }
    }

    #[test]
    fn unknown_action_code_is_not_claimed() {
        let _guard = LOG_GUARD.lock().unwrap();
        drain_log();

        let handle = shell_bridge_new(recording_vtable(), metrics());
        unsafe {
            assert!(shell_bridge_on_create(handle, ptr::null(), 0));
            shell_bridge_on_start(handle);
            assert!(!shell_bridge_on_touch(
                handle,
                0,
                42,
                0,
                0,
                ptr::null(),
                ptr::null(),
                ptr::null(),
            ));
            shell_bridge_free(handle);
        }
    }
}
