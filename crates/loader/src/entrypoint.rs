// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The explicit plugin registration protocol: Rust has no runtime
//! reflection, so discovery is a module export rather than scanned
//! metadata.
//!
//! A module opts in by exporting `hw_plugin_register`. The host imports
//! `hw_register_task(name_ptr, name_len, param_count)` and
//! `hw_register_workflow(name_ptr, name_len)`; calling `hw_plugin_register`
//! invokes those imports once per declared task/workflow. A module that
//! does not export `hw_plugin_register` is skipped with a warning, not a
//! load failure.

use std::path::Path;
use std::sync::Arc;

use hw_core::{ArtifactId, RegistrationSet, TaskHandle, WorkflowTypeHandle};
use parking_lot::Mutex;
use wasmtime::{Caller, Engine, Instance, Linker, Memory, Module, Store};

use crate::error::LoaderError;

#[derive(Default)]
struct PendingRegistrations {
    tasks: Vec<(String, usize)>,
    workflows: Vec<String>,
}

// `Arc<Mutex<_>>` rather than `Rc<RefCell<_>>`: `HostState` lives inside the
// `Store` a `CodeContainer` holds onto for its whole lifetime, and
// containers are shared across worker tasks behind an `Arc`, so the store's
// data type must stay `Send`.
pub(crate) struct HostState {
    pending: Arc<Mutex<PendingRegistrations>>,
}

fn read_string(caller: &mut Caller<'_, HostState>, memory: Memory, ptr: i32, len: i32) -> Option<String> {
    let data = memory.data(&caller);
    let start = usize::try_from(ptr).ok()?;
    let len = usize::try_from(len).ok()?;
    let end = start.checked_add(len)?;
    let bytes = data.get(start..end)?;
    String::from_utf8(bytes.to_vec()).ok()
}

fn build_linker(engine: &Engine) -> Result<Linker<HostState>, wasmtime::Error> {
    let mut linker = Linker::new(engine);

    linker.func_wrap(
        "env",
        "hw_register_task",
        |mut caller: Caller<'_, HostState>, name_ptr: i32, name_len: i32, param_count: i32| {
            let Some(memory) = caller.get_export("memory").and_then(|e| e.into_memory()) else {
                return;
            };
            let Some(name) = read_string(&mut caller, memory, name_ptr, name_len) else {
                return;
            };
            caller
                .data()
                .pending
                .lock()
                .tasks
                .push((name, param_count.max(0) as usize));
        },
    )?;

    linker.func_wrap(
        "env",
        "hw_register_workflow",
        |mut caller: Caller<'_, HostState>, name_ptr: i32, name_len: i32| {
            let Some(memory) = caller.get_export("memory").and_then(|e| e.into_memory()) else {
                return;
            };
            let Some(name) = read_string(&mut caller, memory, name_ptr, name_len) else {
                return;
            };
            caller.data().pending.lock().workflows.push(name);
        },
    )?;

    Ok(linker)
}

/// Load one compiled module, run its `hw_plugin_register` entry point (if
/// present), and return both the live [`Instance`]/[`Store`] pair (the
/// caller keeps these alive to keep the container's code loaded) and the
/// registrations it declared.
pub fn load_and_register(
    engine: &Engine,
    path: &Path,
    owner: ArtifactId,
    max_params: usize,
) -> Result<(Store<HostState>, Instance, RegistrationSet), LoaderError> {
    let module = Module::from_file(engine, path).map_err(|source| LoaderError::CompileModule {
        path: path.to_path_buf(),
        source,
    })?;

    let linker = build_linker(engine).map_err(|source| LoaderError::Instantiate {
        path: path.to_path_buf(),
        source,
    })?;

    let pending = Arc::new(Mutex::new(PendingRegistrations::default()));
    let mut store = Store::new(engine, HostState { pending: pending.clone() });

    let instance = linker
        .instantiate(&mut store, &module)
        .map_err(|source| LoaderError::Instantiate {
            path: path.to_path_buf(),
            source,
        })?;

    match instance.get_typed_func::<(), ()>(&mut store, "hw_plugin_register") {
        Ok(register) => {
            if let Err(e) = register.call(&mut store, ()) {
                tracing::warn!(module = %path.display(), error = %e, "hw_plugin_register trapped");
            }
        }
        Err(_) => {
            tracing::warn!(module = %path.display(), "module has no hw_plugin_register export, skipping");
            return Ok((store, instance, RegistrationSet::new()));
        }
    }

    let mut registrations = RegistrationSet::new();
    let pending = pending.lock();
    for (name, param_count) in &pending.tasks {
        if *param_count > max_params {
            tracing::warn!(
                task = name,
                param_count,
                max_params,
                "task exceeds parameter cap, skipping task only"
            );
            continue;
        }
        registrations.insert_task(TaskHandle::new(name.clone(), owner.clone(), *param_count));
    }
    for name in &pending.workflows {
        registrations.insert_workflow(WorkflowTypeHandle::new(name.clone(), owner.clone()));
    }

    Ok((store, instance, registrations))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> ArtifactId {
        ArtifactId {
            id: "demo".into(),
            version: "1.0.0".into(),
        }
    }

    #[test]
    fn missing_module_file_is_a_compile_error() {
        let engine = Engine::default();
        let result = load_and_register(&engine, Path::new("/nonexistent.wasm"), owner(), 8);
        assert!(matches!(result, Err(LoaderError::CompileModule { .. })));
    }
}
