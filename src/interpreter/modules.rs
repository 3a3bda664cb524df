use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
    rc::Rc,
};

use tracing::debug;

use super::callable::NativeFunction;
use super::runtime::RuntimeError;

pub const SOURCE_EXTENSION: &str = "qrk";
pub const LIBDIR_VAR: &str = "QUARK_LIBDIR";

/// A bundle of host functions that scripts pull in with `import`
#[derive(Clone, Debug)]
pub struct NativeModule {
    /// When set, exports are bound as `namespace:name`
    pub namespace: Option<String>,
    pub exports: Vec<NativeFunction>,
}

impl NativeModule {
    pub fn single(function: NativeFunction) -> NativeModule {
        NativeModule {
            namespace: None,
            exports: vec![function],
        }
    }

    pub fn list(namespace: Option<&str>, exports: Vec<NativeFunction>) -> NativeModule {
        NativeModule {
            namespace: namespace.map(str::to_string),
            exports,
        }
    }

    pub fn bound_name(&self, function: &NativeFunction) -> String {
        match &self.namespace {
            Some(namespace) => format!("{}:{}", namespace, function.name),
            None => function.name.clone(),
        }
    }
}

pub enum Resolved {
    Source(PathBuf),
    Native(Rc<NativeModule>),
}

/// Where imports are looked up, and the native modules the host made available
pub struct ModuleLoader {
    working_dir: PathBuf,
    library_dir: PathBuf,
    natives: HashMap<PathBuf, Rc<NativeModule>>,
}

impl ModuleLoader {
    pub fn new(working_dir: PathBuf, library_dir: PathBuf) -> ModuleLoader {
        ModuleLoader {
            working_dir,
            library_dir,
            natives: HashMap::new(),
        }
    }

    /// Make a native module importable under `specifier`, written the same way scripts import it (`std:io`)
    pub fn register(&mut self, specifier: &str, module: NativeModule) {
        self.natives.insert(specifier_to_path(specifier), Rc::new(module));
    }

    /// Find what `specifier` refers to, trying the importing script's directory, then the working directory, then the
    /// library directory
    pub fn resolve(&self, specifier: &str, current_dir: &Path) -> Result<Resolved, RuntimeError> {
        let relative = specifier_to_path(specifier);
        let mut searched = Vec::new();
        let dirs = [current_dir, self.working_dir.as_path(), self.library_dir.as_path()];
        for (i, dir) in dirs.iter().enumerate() {
            for candidate in candidates(dir, &relative) {
                if candidate.is_file() {
                    debug!(specifier, path = %candidate.display(), "resolved module source");
                    return Ok(Resolved::Source(candidate));
                }
                searched.push(candidate);
            }
            // Native modules live alongside the library
            if i == dirs.len() - 1 {
                if let Some(module) = self.natives.get(&relative) {
                    debug!(specifier, "resolved native module");
                    return Ok(Resolved::Native(module.clone()));
                }
            }
        }
        Err(RuntimeError::ModuleNotFound {
            specifier: specifier.to_string(),
            searched,
        })
    }
}

// `a:b` names the relative path `a/b`
pub fn specifier_to_path(specifier: &str) -> PathBuf {
    specifier.split(':').filter(|segment| !segment.is_empty()).collect()
}

fn candidates(dir: &Path, relative: &Path) -> Vec<PathBuf> {
    let exact = dir.join(relative);
    if relative.extension().is_some() {
        vec![exact]
    } else {
        let with_extension = exact.with_extension(SOURCE_EXTENSION);
        vec![exact, with_extension]
    }
}

/// The library directory: `$QUARK_LIBDIR` when set, `<working dir>/libs` otherwise
pub fn default_library_dir(working_dir: &Path) -> PathBuf {
    if let Some(libdir) = env::var_os(LIBDIR_VAR) {
        PathBuf::from(libdir)
    } else {
        working_dir.join("libs")
    }
}
