//! The application activation stack.
//!
//! Tracks which app instance owns the user's attention: an ordered stack of
//! foreground apps, a background set for daemon/keep-alive apps, and an
//! inactive set for created-but-never-activated apps. Preemption on
//! activation is arbitrated here; the voice session controller brackets
//! awaken windows with `pause_lifetime`/`resume_lifetime`.

use std::collections::{HashMap, HashSet};

use serde_json::json;
use tracing::{debug, info};

use crate::app::{merge_options, AppInstance, AppRegistration, ContextOptions};
use crate::error::{CoreResult, LifetimeError};

/// Activation form merged into context options when none is given.
pub const DEFAULT_FORM: &str = "cut";

/// The activation stack. One per device. Controller handlers read and write
/// it within the same logical step as session state, so a multi-threaded
/// host must guard both behind one mutex (or one serialized queue).
pub struct Lifetime {
    registry: HashMap<String, AppRegistration>,
    running: HashMap<String, Box<dyn AppInstance>>,
    /// Foreground stack; last element is the current app.
    stack: Vec<String>,
    background: HashSet<String>,
    inactive: HashSet<String>,
    context_options: HashMap<String, ContextOptions>,
    /// Foreground app recorded by `pause_lifetime`, cleared on resume.
    app_id_on_pause: Option<String>,
}

impl Lifetime {
    /// Build the stack over the full registry of known app executors.
    /// Creation of unknown ids is rejected; the registry never changes.
    pub fn new(registry: HashMap<String, AppRegistration>) -> Self {
        Self {
            registry,
            running: HashMap::new(),
            stack: Vec::new(),
            background: HashSet::new(),
            inactive: HashSet::new(),
            context_options: HashMap::new(),
            app_id_on_pause: None,
        }
    }

    pub fn is_daemon_app(&self, id: &str) -> bool {
        self.registry.get(id).map(|r| r.daemon).unwrap_or(false)
    }

    pub fn is_app_running(&self, id: &str) -> bool {
        self.running.contains_key(id)
    }

    pub fn is_app_in_stack(&self, id: &str) -> bool {
        self.stack.iter().any(|s| s == id)
    }

    pub fn is_background_app(&self, id: &str) -> bool {
        self.background.contains(id)
    }

    /// Created but neither in the stack nor in background.
    pub fn is_app_inactive(&self, id: &str) -> bool {
        self.running.contains_key(id) && self.inactive.contains(id)
    }

    /// Top of the activation stack.
    pub fn current_app_id(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    pub fn context_options_of(&self, id: &str) -> Option<&ContextOptions> {
        self.context_options.get(id)
    }

    /// Context options of `id`; alias matching the runtime's `getAppDataById`.
    pub fn app_data_of(&self, id: &str) -> Option<&ContextOptions> {
        self.context_options_of(id)
    }

    pub fn current_app_data(&self) -> Option<&ContextOptions> {
        self.current_app_id()
            .and_then(|id| self.context_options.get(id))
    }

    fn keep_alive(&self, id: &str) -> bool {
        self.context_options
            .get(id)
            .and_then(|options| options.get("keepAlive"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Allocate an executor instance for `id`. Non-daemon apps start out
    /// inactive; daemon apps are parked in background right away.
    pub async fn create_app(&mut self, id: &str) -> CoreResult<()> {
        let registration = self
            .registry
            .get(id)
            .ok_or_else(|| LifetimeError::AppNotRegistered(id.to_string()))?
            .clone();
        if self.running.contains_key(id) {
            return Err(LifetimeError::AppAlreadyRunning(id.to_string()));
        }
        let instance = registration.executor.create().await?;
        self.running.insert(id.to_string(), instance);
        self.context_options.entry(id.to_string()).or_default();
        if registration.daemon {
            self.background.insert(id.to_string());
        } else {
            self.inactive.insert(id.to_string());
        }
        info!(app = id, daemon = registration.daemon, "app created");
        Ok(())
    }

    /// Activate `id` with the default form.
    pub async fn activate_app(&mut self, id: &str) -> CoreResult<()> {
        self.activate_app_with_form(id, DEFAULT_FORM).await
    }

    /// Push `id` to the stack top, preempting the previous foreground app.
    /// A preempted app holding `keepAlive` is demoted to background whatever
    /// its daemon flag; otherwise daemons go to background and plain apps
    /// are destroyed. Rejects if the executor fails to start.
    pub async fn activate_app_with_form(&mut self, id: &str, form: &str) -> CoreResult<()> {
        match self.running.get_mut(id) {
            Some(instance) => instance.on_activated().await?,
            None => return Err(LifetimeError::AppNotRunning(id.to_string())),
        }

        if let Some(top) = self.current_app_id().map(str::to_owned) {
            if top != id {
                if self.keep_alive(&top) || self.is_daemon_app(&top) {
                    self.demote_to_background(&top).await;
                } else {
                    self.destroy_app(&top).await;
                }
            }
        }

        self.stack.retain(|s| s != id);
        self.stack.push(id.to_string());
        self.background.remove(id);
        self.inactive.remove(id);

        let mut patch = ContextOptions::new();
        patch.insert("form".into(), json!(form));
        merge_options(self.context_options.entry(id.to_string()).or_default(), patch);

        info!(app = id, form, "app activated");
        Ok(())
    }

    /// Pop `id` from the stack. Daemon and keep-alive apps move to
    /// background; everything else is torn down. No-op when `id` is not in
    /// the stack.
    pub async fn deactivate_app(&mut self, id: &str) {
        if !self.is_app_in_stack(id) {
            debug!(app = id, "deactivate skipped, app not in stack");
            return;
        }
        self.stack.retain(|s| s != id);
        if self.keep_alive(id) || self.is_daemon_app(id) {
            self.demote_to_background(id).await;
        } else {
            self.destroy_app(id).await;
        }
    }

    /// Move `id` out of the stack into background. No-op when not running.
    pub async fn set_background(&mut self, id: &str) {
        if !self.running.contains_key(id) {
            debug!(app = id, "set background skipped, app not running");
            return;
        }
        self.stack.retain(|s| s != id);
        self.demote_to_background(id).await;
    }

    async fn demote_to_background(&mut self, id: &str) {
        self.stack.retain(|s| s != id);
        self.inactive.remove(id);
        if self.background.insert(id.to_string()) {
            if let Some(instance) = self.running.get_mut(id) {
                instance.on_backgrounded().await;
            }
            info!(app = id, "app moved to background");
        }
    }

    /// Tear `id` down unconditionally: run state, stack slot, background
    /// flag, and context record are all cleared. No-op when not running.
    pub async fn destroy_app(&mut self, id: &str) {
        let Some(mut instance) = self.running.remove(id) else {
            debug!(app = id, "destroy skipped, app not running");
            return;
        };
        instance.on_destroyed().await;
        self.stack.retain(|s| s != id);
        self.background.remove(id);
        self.inactive.remove(id);
        self.context_options.remove(id);
        info!(app = id, "app destroyed");
    }

    /// Merge `patch` into the context options of `id`. Existing keys not in
    /// `patch` survive. Rejects when the app has no context record.
    pub fn set_context_options(&mut self, id: &str, patch: ContextOptions) -> CoreResult<()> {
        let Some(options) = self.context_options.get_mut(id) else {
            return Err(LifetimeError::NoContextRecord(id.to_string()));
        };
        merge_options(options, patch);
        Ok(())
    }

    /// Suspend stack-preemption side effects for an awaken window. Records
    /// the current foreground app for the matching resume.
    pub fn pause_lifetime(&mut self) {
        self.app_id_on_pause = self.current_app_id().map(str::to_owned);
        debug!(app = ?self.app_id_on_pause, "lifetime paused");
    }

    /// Lift the pause. With `recover`, the recorded app gets an `on_resumed`
    /// callback, unless the foreground changed during the pause. In that
    /// case the preemption supersedes recovery.
    pub async fn resume_lifetime(&mut self, recover: bool) {
        let paused = self.app_id_on_pause.take();
        if !recover {
            return;
        }
        let current = self.current_app_id().map(str::to_owned);
        if paused.is_none() || paused != current {
            debug!("foreground changed during pause, skipping app resume");
            return;
        }
        if let Some(id) = current {
            if let Some(instance) = self.running.get_mut(&id) {
                instance.on_resumed().await;
            }
        }
    }
}
