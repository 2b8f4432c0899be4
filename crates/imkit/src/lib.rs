//! # imkit
//!
//! Drivers for IBM Installation Manager and WebSphere command-line tools.
//!
//! Each driver plugs into [`reconcile`]: it knows how to ask one tool what
//! exists, which command moves it to the desired state, and which non-zero
//! exits mean the state already held.
//!
//! | Kind | Tool | `present` | `absent` | `latest` |
//! |------|------|-----------|----------|----------|
//! | `package` | `imcl` | install | uninstall | `updateAll` |
//! | `installer` | IM agent `install` | install IM | `uninstallc` | - |
//! | `profile` | `manageprofiles.sh` | `-create` | `-delete` | - |
//! | `liberty-server` | `server create` | create | remove directory | - |
//! | `server` | `server` / `startServer.sh` | start | stop | - |
//!
//! ## Example
//!
//! ```no_run
//! use imkit::DriverKind;
//! use reconcile::{DesiredState, Parameters, ProcessInvoker, Report, TargetPresence};
//!
//! let desired = DesiredState::new("com.ibm.websphere.liberty.BASE.v85", TargetPresence::Present)
//!     .unwrap()
//!     .with_parameters(Parameters::new().with("repository", "/var/data/was"));
//! let driver = DriverKind::Package.driver();
//! let result = reconcile::reconcile(driver.as_ref(), &desired, &ProcessInvoker::new());
//! println!("{}", Report::from_result(&result).msg);
//! ```

mod common;
pub mod installer;
pub mod liberty;
pub mod package;
pub mod profile;
pub mod server;

pub use installer::ImInstallerDriver;
pub use liberty::LibertyServerDriver;
pub use package::ImPackageDriver;
pub use profile::ProfileDriver;
pub use server::{Flavour, ServerProcessDriver};

use reconcile::{BoxedDriver, Error};
use std::fmt;
use std::str::FromStr;

/// Resource kinds with a driver in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Package,
    Installer,
    Profile,
    LibertyServer,
    Server,
}

impl DriverKind {
    pub const ALL: [DriverKind; 5] = [
        Self::Package,
        Self::Installer,
        Self::Profile,
        Self::LibertyServer,
        Self::Server,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Installer => "installer",
            Self::Profile => "profile",
            Self::LibertyServer => "liberty-server",
            Self::Server => "server",
        }
    }

    /// Driver instance for this kind
    pub fn driver(&self) -> BoxedDriver {
        match self {
            Self::Package => Box::new(ImPackageDriver),
            Self::Installer => Box::new(ImInstallerDriver),
            Self::Profile => Box::new(ProfileDriver),
            Self::LibertyServer => Box::new(LibertyServerDriver),
            Self::Server => Box::new(ServerProcessDriver),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "package" | "ibmim" => Ok(Self::Package),
            "installer" | "ibmim_installer" => Ok(Self::Installer),
            "profile" => Ok(Self::Profile),
            "liberty-server" | "liberty_server" => Ok(Self::LibertyServer),
            "server" => Ok(Self::Server),
            other => Err(Error::InvalidDesiredState(format!(
                "unknown resource kind '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in DriverKind::ALL {
            assert_eq!(kind.as_str().parse::<DriverKind>().unwrap(), kind);
        }
        assert!("wsadmin".parse::<DriverKind>().is_err());
    }

    #[test]
    fn test_driver_kinds_are_distinct() {
        let kinds: Vec<&str> = DriverKind::ALL.iter().map(|k| k.driver().kind()).collect();
        assert_eq!(
            kinds,
            vec!["package", "installation manager", "profile", "liberty server", "server"]
        );
    }
}
