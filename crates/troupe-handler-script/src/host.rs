//! The shared interpreter.

use rhai::module_resolvers::{FileModuleResolver, ModuleResolversCollection};
use rhai::Engine;
use std::path::PathBuf;
use tracing::{debug, info};

/// Termination sentinel. A handler returning `SystemExit()` asks the host to
/// terminate the whole process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemExit;

impl SystemExit {
    pub fn new() -> Self {
        Self
    }
}

/// One [`Engine`] shared by every script actor.
///
/// Engine configuration (print routing, the `SystemExit` type, module
/// resolution) happens once here; evaluation state is per actor.
pub struct ScriptHost {
    engine: Engine,
    search_paths: Vec<PathBuf>,
}

impl ScriptHost {
    /// ## Parameters
    ///
    /// * `search_paths` - Directories searched by `import` statements, in
    ///   order. The working directory is always searched last.
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        let mut engine = Engine::new();

        engine.on_print(|text| info!(target: "script", "{}", text));
        engine.on_debug(|text, source, pos| {
            debug!(target: "script", source = source.unwrap_or(""), "{} {}", pos, text)
        });

        engine
            .register_type_with_name::<SystemExit>("SystemExit")
            .register_fn("SystemExit", SystemExit::new);

        let mut resolvers = ModuleResolversCollection::new();
        for path in &search_paths {
            resolvers.push(FileModuleResolver::new_with_path(path));
        }
        resolvers.push(FileModuleResolver::new());
        engine.set_module_resolver(resolvers);

        Self {
            engine,
            search_paths,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl std::fmt::Debug for ScriptHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptHost")
            .field("search_paths", &self.search_paths)
            .finish()
    }
}
