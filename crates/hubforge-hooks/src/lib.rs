//! # hubforge-hooks
//!
//! Typed extension points for operator-installed plugins. Plugins
//! implement [`InstallerHooks`]; every method defaults to a no-op so a
//! plugin implements only the hooks it cares about. The registry owns
//! aggregation: list hooks concatenate in registration order
//! (duplicates permitted, idempotent convergence tolerates them) and
//! mutation hooks run sequentially against the shared object with no
//! isolation between plugins. Plugins are operator-installed and
//! trusted, not sandboxed.

use hubforge_core::ServiceConfig;
use std::sync::OnceLock;
use tracing::debug;

/// Named extension points a plugin may implement.
///
/// List hooks return additional packages for one package-source kind;
/// mutation hooks receive shared mutable state and may change it in
/// place.
pub trait InstallerHooks: Send + Sync {
    /// Plugin name, for logs
    fn name(&self) -> &str;

    /// Extra OS (apt) packages to install
    fn extra_apt_packages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Extra pip packages for the hub environment
    fn extra_hub_pip_packages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Extra conda packages for the user environment
    fn extra_user_conda_packages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Extra pip packages for the user environment
    fn extra_user_pip_packages(&self) -> Vec<String> {
        Vec::new()
    }

    /// Customize the live service configuration before it is
    /// translated into runtime settings
    fn customize_service(&self, _config: &mut ServiceConfig) {}

    /// Modify the persisted configuration mapping after installation.
    /// Avoid overwriting anything the operator set explicitly.
    fn config_post_install(&self, _config: &mut serde_yaml_ng::Mapping) {}

    /// Arbitrary post-install logic, run after all package hooks
    fn post_install(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// React to a new user being created
    fn new_user_create(&self, _username: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Ordered collection of registered plugins.
///
/// Registration order is discovery order; every aggregation and
/// mutation walks plugins in that order.
#[derive(Default)]
pub struct HookRegistry {
    plugins: Vec<Box<dyn InstallerHooks>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin at the end of the discovery order
    pub fn register(&mut self, plugin: Box<dyn InstallerHooks>) {
        debug!("registered plugin {}", plugin.name());
        self.plugins.push(plugin);
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Concatenated extra apt packages, in discovery order
    pub fn extra_apt_packages(&self) -> Vec<String> {
        self.collect(|p| p.extra_apt_packages())
    }

    /// Concatenated extra hub pip packages, in discovery order
    pub fn extra_hub_pip_packages(&self) -> Vec<String> {
        self.collect(|p| p.extra_hub_pip_packages())
    }

    /// Concatenated extra user conda packages, in discovery order
    pub fn extra_user_conda_packages(&self) -> Vec<String> {
        self.collect(|p| p.extra_user_conda_packages())
    }

    /// Concatenated extra user pip packages, in discovery order
    pub fn extra_user_pip_packages(&self) -> Vec<String> {
        self.collect(|p| p.extra_user_pip_packages())
    }

    /// Let every plugin customize the live service configuration
    pub fn customize_service(&self, config: &mut ServiceConfig) {
        for plugin in &self.plugins {
            plugin.customize_service(config);
        }
    }

    /// Let every plugin mutate the persisted configuration mapping
    pub fn config_post_install(&self, config: &mut serde_yaml_ng::Mapping) {
        for plugin in &self.plugins {
            plugin.config_post_install(config);
        }
    }

    /// Run every plugin's post-install logic; the first failure aborts
    pub fn post_install(&self) -> anyhow::Result<()> {
        for plugin in &self.plugins {
            plugin.post_install()?;
        }
        Ok(())
    }

    /// Notify every plugin of a newly created user
    pub fn new_user_create(&self, username: &str) -> anyhow::Result<()> {
        for plugin in &self.plugins {
            plugin.new_user_create(username)?;
        }
        Ok(())
    }

    fn collect(&self, f: impl Fn(&dyn InstallerHooks) -> Vec<String>) -> Vec<String> {
        let mut packages = Vec::new();
        for plugin in &self.plugins {
            packages.extend(f(plugin.as_ref()));
        }
        packages
    }
}

static REGISTRY: OnceLock<HookRegistry> = OnceLock::new();

/// Install the process-wide registry. Discovery happens once per
/// process lifetime; a second call reports failure and leaves the
/// original registry in place.
pub fn install(registry: HookRegistry) -> anyhow::Result<()> {
    let count = registry.len();
    REGISTRY
        .set(registry)
        .map_err(|_| anyhow::anyhow!("hook registry already installed"))?;
    debug!("hook registry installed with {} plugins", count);
    Ok(())
}

/// The process-wide registry; empty until [`install`] has run
pub fn global() -> &'static HookRegistry {
    static EMPTY: OnceLock<HookRegistry> = OnceLock::new();
    REGISTRY
        .get()
        .unwrap_or_else(|| EMPTY.get_or_init(HookRegistry::new))
}
