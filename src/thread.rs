//! Worker thread spawning.
//!
//! On ESP-IDF, `std::thread` maps onto FreeRTOS tasks through pthreads, and
//! `esp_pthread_set_cfg()` sets core affinity, priority and stack for the
//! *next* `pthread_create()` on the calling thread. The config→spawn pair must
//! therefore not interleave with other thread creation on the same thread.
//! On other targets the settings reduce to a named thread with a stack size.

use std::thread::JoinHandle;

use crate::error::{Error, Result};

/// CPU core identifiers for the ESP32 Xtensa dual-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): radio and protocol stacks.
    Pro = 0,
    /// Core 1 (APP_CPU): application logic.
    App = 1,
}

/// Placement and sizing of a worker thread.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSpec {
    /// Null-terminated for the ESP-IDF pthread config, e.g. `"bt-uart-tx\0"`.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

impl WorkerSpec {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

#[cfg(target_os = "espidf")]
pub fn spawn_worker(spec: WorkerSpec, f: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>> {
    // SAFETY: the config struct is fully initialised by
    // `esp_create_default_pthread_config` and `name` is 'static and
    // null-terminated, so the pointer outlives the pthread_create call.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = spec.priority as i32;
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        log::error!("esp_pthread_set_cfg failed for '{}': {}", spec.display_name(), ret);
        return Err(Error::Init("worker thread config rejected"));
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
        .map_err(|_| Error::Init("worker thread spawn failed"))
}

/// Host fallback: ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_worker(spec: WorkerSpec, f: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>> {
    log::info!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        spec.display_name(),
        spec.stack_kb
    );

    // Host threads get at least 64 KB.
    let stack = (spec.stack_kb * 1024).max(64 * 1024);
    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(stack)
        .spawn(f)
        .map_err(|_| Error::Init("worker thread spawn failed"))
}
