//! Platform pass-throughs: permission queries and vendor settings
//! navigation. None of this is owned by the scheduling core; it is the
//! seam to whatever OS surface hosts the daemon.

pub mod permissions;
pub mod vendor;

pub use permissions::{PermissionProbe, Unrestricted};
pub use vendor::{Capability, SettingsLauncher, SettingsNavigator, SettingsTarget};
