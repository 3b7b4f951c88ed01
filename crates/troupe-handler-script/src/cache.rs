//! Compiled-module cache.
//!
//! [`ModuleCache::import`] hands out the cached compilation of a file when
//! there is one. [`ModuleCache::reimport`] always goes back to disk and
//! replaces the entry; a failed reimport leaves the previous entry alone.

use crate::ScriptError;
use rhai::{Engine, AST};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: HashMap<PathBuf, Arc<AST>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import(&mut self, engine: &Engine, path: &Path) -> Result<Arc<AST>, ScriptError> {
        if let Some(ast) = self.modules.get(path) {
            return Ok(ast.clone());
        }
        self.reimport(engine, path)
    }

    pub fn reimport(&mut self, engine: &Engine, path: &Path) -> Result<Arc<AST>, ScriptError> {
        let mut ast = engine
            .compile_file(path.to_path_buf())
            .map_err(|e| ScriptError::Compile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        ast.set_source(path.display().to_string());
        debug!(path = %path.display(), "compiled script");

        let ast = Arc::new(ast);
        self.modules.insert(path.to_path_buf(), ast.clone());
        Ok(ast)
    }

    pub fn evict(&mut self, path: &Path) -> bool {
        self.modules.remove(path).is_some()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.modules.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
