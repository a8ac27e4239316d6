//! Cross-crate constants for `shiftbox`.
//!
//! Names, ports and well-known URLs shared between the core, the API
//! server and the CLI. Anything configurable at runtime belongs in
//! `shiftbox-core::config` instead.

#![warn(clippy::all, clippy::pedantic)]

/// Default virtual machine / cluster instance name.
pub const DEFAULT_MACHINE_NAME: &str = "shiftbox";

/// File name of the daemon API unix socket, relative to the data directory.
pub const API_SOCKET_NAME: &str = "api.sock";

/// File name of the daemon PID file, relative to the data directory.
pub const DAEMON_PID_NAME: &str = "daemon.pid";

/// Base DNS domain of the cluster.
pub const CLUSTER_BASE_DOMAIN: &str = "shiftbox.testing";

/// Apps sub-domain for cluster routes (console, workloads).
pub const CLUSTER_APPS_DOMAIN: &str = "apps.shiftbox.testing";

/// Kubernetes API server port inside the VM.
pub const CLUSTER_API_PORT: u16 = 6443;

/// SSH port the VM forwards to the host when user-mode networking is active.
pub const DEFAULT_SSH_PORT: u16 = 2222;

/// SSH user baked into the cluster bundles.
pub const SSH_USERNAME: &str = "core";

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "SHIFTBOX_";

/// Returns the cluster API URL.
#[must_use]
pub fn cluster_api_url() -> String {
    format!("https://api.{CLUSTER_BASE_DOMAIN}:{CLUSTER_API_PORT}")
}

/// Returns the OpenShift web console URL.
#[must_use]
pub fn web_console_url() -> String {
    format!("https://console-openshift-console.{CLUSTER_APPS_DOMAIN}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_urls() {
        assert_eq!(cluster_api_url(), "https://api.shiftbox.testing:6443");
        assert_eq!(
            web_console_url(),
            "https://console-openshift-console.apps.shiftbox.testing"
        );
    }
}
