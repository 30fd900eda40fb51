use std::collections::{BTreeMap, HashMap};

/// Source of build-time flags.
///
/// The finalizer never reads the process environment directly; it is handed one of these.
pub trait BuildFlags {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads flags from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvFlags;

impl BuildFlags for EnvFlags {
    fn lookup(&self, key: &str) -> Option<String> {
        // A value that isn't unicode is still present, it just won't parse.
        std::env::var_os(key).map(|value| value.to_string_lossy().into_owned())
    }
}

impl BuildFlags for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl BuildFlags for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: BuildFlags + ?Sized> BuildFlags for &T {
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}
