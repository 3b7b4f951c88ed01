//! Hot-reload state machine.
//!
//! ```text
//! Unloaded --load(P)--> Loaded --first handler call--> Running
//!    ^                    |  ^                            |
//!    |                    |  +------- reload(P) ----------+
//!    +----- unload / failed load of a new path -----------+
//! ```
//!
//! Loading a path that is not the current one imports it, forces one
//! reimport so no stale compilation survives, and calls the constructor.
//! Loading the current path again only reimports. A failure while
//! reloading the current path keeps the running instance untouched; a
//! failure while loading a new path leaves the actor unloaded.

use crate::cache::ModuleCache;
use crate::host::ScriptHost;
use crate::ScriptError;
use rhai::{CallFnOptions, Dynamic, FuncArgs, Scope, AST};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A constructed script object and the compilation it came from.
pub struct Instance {
    path: PathBuf,
    ast: Arc<AST>,
    scope: Scope<'static>,
    this: Dynamic,
}

impl Instance {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The instance's integer `timeout` member, if it has one.
    pub fn timeout(&self) -> Option<i64> {
        let map = self.this.read_lock::<rhai::Map>()?;
        map.get("timeout").and_then(|v| v.as_int().ok())
    }

    pub fn member(&self, name: &str) -> Option<Dynamic> {
        let map = self.this.read_lock::<rhai::Map>()?;
        map.get(name).cloned()
    }
}

pub enum ScriptPhase {
    Unloaded,
    Loaded(Instance),
    Running(Instance),
}

impl ScriptPhase {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptPhase::Unloaded => "unloaded",
            ScriptPhase::Loaded(_) => "loaded",
            ScriptPhase::Running(_) => "running",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A different path was loaded.
    Fresh,
    /// The current path was reimported.
    Reloaded,
    Unloaded,
}

/// Everything of one actor that lives inside the interpreter. Always
/// accessed through the backend's interop lock.
pub struct ScriptRuntime {
    host: Arc<ScriptHost>,
    cache: ModuleCache,
    phase: ScriptPhase,
}

impl ScriptRuntime {
    pub fn new(host: Arc<ScriptHost>) -> Self {
        Self {
            host,
            cache: ModuleCache::new(),
            phase: ScriptPhase::Unloaded,
        }
    }

    pub fn phase(&self) -> &ScriptPhase {
        &self.phase
    }

    pub fn instance(&self) -> Option<&Instance> {
        match &self.phase {
            ScriptPhase::Unloaded => None,
            ScriptPhase::Loaded(instance) | ScriptPhase::Running(instance) => Some(instance),
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.instance().map(Instance::path)
    }

    pub fn is_loaded(&self) -> bool {
        self.instance().is_some()
    }

    /// Load `path`, or unload if it is empty.
    pub fn load(&mut self, path: &Path) -> Result<ReloadOutcome, ScriptError> {
        if path.as_os_str().is_empty() {
            self.unload();
            return Ok(ReloadOutcome::Unloaded);
        }

        let host = self.host.clone();
        let engine = host.engine();
        if self.current_path() == Some(path) {
            let ast = self.cache.reimport(engine, path)?;
            let instance = construct(&host, path, ast)?;
            self.phase = ScriptPhase::Loaded(instance);
            info!(path = %path.display(), "reloaded script");
            return Ok(ReloadOutcome::Reloaded);
        }

        // The old instance does not survive a switch, even a failed one.
        self.unload();
        let ast = self
            .cache
            .import(engine, path)
            .and_then(|_| self.cache.reimport(engine, path))?;
        let instance = construct(&host, path, ast)?;
        self.phase = ScriptPhase::Loaded(instance);
        info!(path = %path.display(), "loaded script");
        Ok(ReloadOutcome::Fresh)
    }

    pub fn unload(&mut self) {
        if let Some(path) = self.current_path().map(Path::to_path_buf) {
            self.cache.evict(&path);
            debug!(path = %path.display(), "unloaded script");
        }
        self.phase = ScriptPhase::Unloaded;
    }

    /// Call `method` with the instance bound as `this`.
    pub fn call(&mut self, method: &str, args: impl FuncArgs) -> Result<Dynamic, ScriptError> {
        let phase = std::mem::replace(&mut self.phase, ScriptPhase::Unloaded);
        let mut instance = match phase {
            ScriptPhase::Unloaded => return Err(ScriptError::NotLoaded),
            ScriptPhase::Loaded(instance) | ScriptPhase::Running(instance) => instance,
        };

        let ast = instance.ast.clone();
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(&mut instance.this);
        let result = self
            .host
            .engine()
            .call_fn_with_options::<Dynamic>(options, &mut instance.scope, &ast, method, args)
            .map_err(|e| ScriptError::Call {
                method: method.to_string(),
                message: e.to_string(),
            });

        self.phase = ScriptPhase::Running(instance);
        result
    }
}

fn construct(host: &ScriptHost, path: &Path, ast: Arc<AST>) -> Result<Instance, ScriptError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let constructor = [stem.as_str(), "new"]
        .into_iter()
        .find(|name| {
            ast.iter_functions()
                .any(|f| f.name == *name && f.params.is_empty())
        })
        .ok_or_else(|| ScriptError::MissingConstructor {
            path: path.to_path_buf(),
            stem: stem.clone(),
        })?;

    // Top-level statements run once, here.
    let mut scope = Scope::new();
    let options = CallFnOptions::new().eval_ast(true).rewind_scope(false);
    let this = host
        .engine()
        .call_fn_with_options::<Dynamic>(options, &mut scope, &ast, constructor, ())
        .map_err(|e| ScriptError::Call {
            method: constructor.to_string(),
            message: e.to_string(),
        })?;

    if !this.is_map() {
        return Err(ScriptError::NotAnObject {
            path: path.to_path_buf(),
            found: this.type_name().to_string(),
        });
    }
    Ok(Instance {
        path: path.to_path_buf(),
        ast,
        scope,
        this,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const COUNTER: &str = r#"
fn counter() { #{ timeout: 250, hits: 0 } }

fn handleSocket(address, args, kind, name, uuid) {
    this.hits += 1;
    [address, [this.hits]]
}
"#;

    fn runtime() -> ScriptRuntime {
        ScriptRuntime::new(Arc::new(ScriptHost::default()))
    }

    fn hit(runtime: &mut ScriptRuntime) -> i64 {
        let args = (
            "/hit".to_string(),
            rhai::Array::new(),
            "SOCK".to_string(),
            "a".to_string(),
            "u".to_string(),
        );
        let reply = runtime.call("handleSocket", args).unwrap();
        let array = reply.into_array().unwrap();
        array[1].clone().into_array().unwrap()[0].as_int().unwrap()
    }

    #[test]
    fn load_call_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.rhai");
        fs::write(&path, COUNTER).unwrap();

        let mut rt = runtime();
        assert_eq!(rt.load(&path).unwrap(), ReloadOutcome::Fresh);
        assert_eq!(rt.phase().name(), "loaded");
        assert_eq!(rt.instance().unwrap().timeout(), Some(250));

        assert_eq!(hit(&mut rt), 1);
        assert_eq!(hit(&mut rt), 2);
        assert_eq!(rt.phase().name(), "running");

        fs::write(&path, COUNTER.replace("timeout: 250", "timeout: 10")).unwrap();
        assert_eq!(rt.load(&path).unwrap(), ReloadOutcome::Reloaded);
        assert_eq!(rt.phase().name(), "loaded");
        assert_eq!(rt.instance().unwrap().timeout(), Some(10));
        assert_eq!(hit(&mut rt), 1);
    }

    #[test]
    fn failed_reload_keeps_running_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.rhai");
        fs::write(&path, COUNTER).unwrap();

        let mut rt = runtime();
        rt.load(&path).unwrap();
        assert_eq!(hit(&mut rt), 1);

        fs::write(&path, "fn counter( {").unwrap();
        assert!(matches!(rt.load(&path), Err(ScriptError::Compile { .. })));
        assert_eq!(rt.current_path(), Some(path.as_path()));
        assert_eq!(hit(&mut rt), 2);
    }

    #[test]
    fn failed_switch_unloads() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("counter.rhai");
        let bad = dir.path().join("nothing.rhai");
        fs::write(&good, COUNTER).unwrap();
        fs::write(&bad, "fn unrelated() { 1 }").unwrap();

        let mut rt = runtime();
        rt.load(&good).unwrap();
        assert!(matches!(
            rt.load(&bad),
            Err(ScriptError::MissingConstructor { .. })
        ));
        assert!(!rt.is_loaded());
        assert!(matches!(
            rt.call("handleSocket", ()),
            Err(ScriptError::NotLoaded)
        ));
    }

    #[test]
    fn constructor_falls_back_to_new_and_must_return_a_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anything.rhai");
        fs::write(&path, "let base = 5; fn new() { #{ base: 1 } }").unwrap();
        let mut rt = runtime();
        rt.load(&path).unwrap();
        assert_eq!(rt.instance().unwrap().timeout(), None);
        assert_eq!(
            rt.instance().unwrap().member("base").unwrap().as_int().unwrap(),
            1
        );

        let other = dir.path().join("scalar.rhai");
        fs::write(&other, "fn scalar() { 3 }").unwrap();
        assert!(matches!(
            rt.load(&other),
            Err(ScriptError::NotAnObject { .. })
        ));
    }

    #[test]
    fn empty_path_unloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.rhai");
        fs::write(&path, COUNTER).unwrap();
        let mut rt = runtime();
        rt.load(&path).unwrap();
        assert_eq!(rt.load(Path::new("")).unwrap(), ReloadOutcome::Unloaded);
        assert_eq!(rt.phase().name(), "unloaded");
    }

    #[test]
    fn missing_method_is_a_call_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.rhai");
        fs::write(&path, COUNTER).unwrap();
        let mut rt = runtime();
        rt.load(&path).unwrap();
        let args = ("TIME".to_string(), "a".to_string(), "u".to_string());
        assert!(matches!(
            rt.call("handleTimer", args),
            Err(ScriptError::Call { .. })
        ));
        // The instance survives a failed call.
        assert!(rt.is_loaded());
    }
}
