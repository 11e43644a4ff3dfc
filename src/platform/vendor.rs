//! Vendor-specific settings navigation.
//!
//! Some device vendors hide the auto-start and battery whitelist screens
//! behind proprietary packages. Rather than a chain of special cases,
//! each capability maps to an ordered fallback sequence of settings
//! targets: they are tried in order, the first one that launches wins,
//! and a generic application-details screen is the final fallback.

use std::collections::HashMap;

/// A navigable settings screen, identified by package and screen path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettingsTarget {
    pub package: &'static str,
    pub screen: &'static str,
}

impl SettingsTarget {
    pub const fn new(package: &'static str, screen: &'static str) -> Self {
        Self { package, screen }
    }
}

/// A settings capability the application may need to surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Allow the app to start itself after boot.
    AutoStart,
    /// Exempt the app from battery optimization.
    BatteryWhitelist,
}

/// Launches a settings target; returns false when the target does not
/// exist on this device.
pub trait SettingsLauncher: Send + Sync {
    fn launch(&self, target: &SettingsTarget) -> bool;
}

/// Generic application-details screen, available everywhere.
pub const GENERIC_SETTINGS: SettingsTarget =
    SettingsTarget::new("android.settings", "APPLICATION_DETAILS_SETTINGS");

/// Auto-start management screens, per vendor, in trial order.
const AUTO_START_TARGETS: &[SettingsTarget] = &[
    // Xiaomi
    SettingsTarget::new(
        "com.miui.securitycenter",
        "com.miui.permcenter.autostart.AutoStartManagementActivity",
    ),
    // Oppo
    SettingsTarget::new(
        "com.coloros.safecenter",
        "com.coloros.safecenter.permission.startup.StartupAppListActivity",
    ),
    SettingsTarget::new(
        "com.oppo.safe",
        "com.oppo.safe.permission.startup.StartupAppListActivity",
    ),
    // Vivo
    SettingsTarget::new(
        "com.vivo.permissionmanager",
        "com.vivo.permissionmanager.activity.BgStartUpManagerActivity",
    ),
    SettingsTarget::new(
        "com.iqoo.secure",
        "com.iqoo.secure.ui.phoneoptimize.AddWhiteListActivity",
    ),
    // Huawei
    SettingsTarget::new(
        "com.huawei.systemmanager",
        "com.huawei.systemmanager.startupmgr.ui.StartupNormalAppListActivity",
    ),
    SettingsTarget::new(
        "com.huawei.systemmanager",
        "com.huawei.systemmanager.optimize.process.ProtectActivity",
    ),
    // OnePlus
    SettingsTarget::new(
        "com.oneplus.security",
        "com.oneplus.security.chainlaunch.view.ChainLaunchAppListActivity",
    ),
    // Realme
    SettingsTarget::new(
        "com.coloros.safecenter",
        "com.coloros.safecenter.startupapp.StartupAppListActivity",
    ),
];

/// Battery whitelist screens, per vendor, in trial order.
const BATTERY_TARGETS: &[SettingsTarget] = &[
    // Samsung
    SettingsTarget::new(
        "com.samsung.android.lool",
        "com.samsung.android.sm.battery.ui.BatteryActivity",
    ),
    SettingsTarget::new(
        "com.samsung.android.lool",
        "com.samsung.android.sm.ui.battery.BatteryActivity",
    ),
];

/// Resolves a capability to a settings screen via the fallback table.
pub struct SettingsNavigator {
    table: HashMap<Capability, Vec<SettingsTarget>>,
    fallback: SettingsTarget,
}

impl SettingsNavigator {
    /// Create a navigator with the built-in vendor table.
    pub fn new() -> Self {
        let mut table = HashMap::new();
        table.insert(Capability::AutoStart, AUTO_START_TARGETS.to_vec());
        table.insert(Capability::BatteryWhitelist, BATTERY_TARGETS.to_vec());
        Self {
            table,
            fallback: GENERIC_SETTINGS,
        }
    }

    /// Replace the fallback sequence for a capability.
    pub fn with_targets(mut self, capability: Capability, targets: Vec<SettingsTarget>) -> Self {
        self.table.insert(capability, targets);
        self
    }

    /// Open the settings screen for a capability.
    ///
    /// Tries each target in order; the first successful launch wins. When
    /// none of the vendor targets exist, falls back to the generic screen
    /// and returns it, or None if even that failed to launch.
    pub fn open(
        &self,
        capability: Capability,
        launcher: &dyn SettingsLauncher,
    ) -> Option<&SettingsTarget> {
        for target in self.table.get(&capability).into_iter().flatten() {
            if launcher.launch(target) {
                tracing::debug!(package = target.package, "vendor settings screen launched");
                return Some(target);
            }
        }

        if launcher.launch(&self.fallback) {
            tracing::debug!("fell back to generic settings screen");
            return Some(&self.fallback);
        }

        tracing::warn!(capability = ?capability, "no settings screen could be launched");
        None
    }
}

impl Default for SettingsNavigator {
    fn default() -> Self {
        Self::new()
    }
}
