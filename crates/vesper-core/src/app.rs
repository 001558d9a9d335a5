//! App executor seams and per-app bookkeeping types.
//!
//! The activation stack never runs app code itself; it drives executor
//! instances through the lifecycle callbacks below. Implement `AppExecutor`
//! for the real app adapter (external process, script host, ...) or use
//! `PlaceholderExecutor` when the behavior lives elsewhere.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;

use crate::error::CoreResult;

/// Per-app context options (e.g. `form`, `keepAlive`). Updates merge keys
/// shallowly instead of replacing the whole map.
pub type ContextOptions = Map<String, serde_json::Value>;

/// Shallow-merge `patch` into `options`, overwriting colliding keys.
pub(crate) fn merge_options(options: &mut ContextOptions, patch: ContextOptions) {
    for (key, value) in patch {
        options.insert(key, value);
    }
}

/// Factory for executor instances, one per registered app id.
#[async_trait]
pub trait AppExecutor: Send + Sync {
    /// Spawn a fresh executor instance for this app.
    async fn create(&self) -> CoreResult<Box<dyn AppInstance>>;
}

/// A running executor instance, driven by lifecycle callbacks from the
/// activation stack.
#[async_trait]
pub trait AppInstance: Send + Sync {
    /// The app is about to take the stack top. A failure rejects activation.
    async fn on_activated(&mut self) -> CoreResult<()>;

    /// The app left the stack but keeps running in background.
    async fn on_backgrounded(&mut self) {}

    /// The lifetime pause bracketing an awaken window has been lifted while
    /// this app is still the foreground app.
    async fn on_resumed(&mut self) {}

    /// The instance is being torn down.
    async fn on_destroyed(&mut self) {}
}

/// Registry entry for a known app: daemon flag plus its executor factory.
#[derive(Clone)]
pub struct AppRegistration {
    /// Daemon apps survive deactivation in background instead of being
    /// destroyed.
    pub daemon: bool,
    pub executor: Arc<dyn AppExecutor>,
}

impl AppRegistration {
    pub fn new(executor: Arc<dyn AppExecutor>) -> Self {
        Self {
            daemon: false,
            executor,
        }
    }

    pub fn daemon(executor: Arc<dyn AppExecutor>) -> Self {
        Self {
            daemon: true,
            executor,
        }
    }
}

/// Executor whose instances accept every lifecycle callback. Useful in tests
/// and for apps whose behavior is handled entirely out of process.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderExecutor;

#[async_trait]
impl AppExecutor for PlaceholderExecutor {
    async fn create(&self) -> CoreResult<Box<dyn AppInstance>> {
        Ok(Box::new(PlaceholderInstance))
    }
}

struct PlaceholderInstance;

#[async_trait]
impl AppInstance for PlaceholderInstance {
    async fn on_activated(&mut self) -> CoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_colliding_keys_only() {
        let mut options = ContextOptions::new();
        options.insert("form".into(), json!("cut"));
        options.insert("keepAlive".into(), json!(false));

        let mut patch = ContextOptions::new();
        patch.insert("keepAlive".into(), json!(true));
        merge_options(&mut options, patch);

        assert_eq!(options.get("form"), Some(&json!("cut")));
        assert_eq!(options.get("keepAlive"), Some(&json!(true)));
    }
}
