//! Rendering of the tor configuration file and the on-disk layout it implies.

use crate::config::ServiceConfig;
use std::path::{Path, PathBuf};

/// Name of the hidden service directory under the data directory
pub const HIDDEN_SERVICE_DIR: &str = "hidden_service";
/// Readiness artifact written by tor inside the hidden service directory
pub const HOSTNAME_FILE: &str = "hostname";
/// Name of the rendered configuration file under the data directory
pub const TORRC_FILE: &str = "torrc";
/// Name of tor's own log file under the data directory
pub const TOR_LOG_FILE: &str = "tor.log";

/// `<data_dir>/hidden_service`
pub fn hidden_service_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(HIDDEN_SERVICE_DIR)
}

/// `<data_dir>/hidden_service/hostname`
pub fn hostname_path(data_dir: &Path) -> PathBuf {
    hidden_service_dir(data_dir).join(HOSTNAME_FILE)
}

/// `<data_dir>/torrc`
pub fn torrc_path(data_dir: &Path) -> PathBuf {
    data_dir.join(TORRC_FILE)
}

/// Render the torrc for `config`
///
/// Directive order is fixed: data directory, SOCKS port, hidden service
/// directory, the single port forwarding rule, then the log destination.
pub fn render_torrc(config: &ServiceConfig) -> String {
    let data_dir = &config.data_dir;
    let mut torrc = String::new();

    torrc.push_str(&format!("DataDirectory {}\n", data_dir.display()));
    torrc.push_str(&format!("SocksPort {}\n", config.socks_port));
    torrc.push_str(&format!(
        "HiddenServiceDir {}\n",
        hidden_service_dir(data_dir).display()
    ));
    torrc.push_str(&format!(
        "HiddenServicePort {} {}:{}\n",
        config.virtual_port, config.target_addr, config.target_port
    ));
    // Notice level keeps tor's own log readable
    torrc.push_str(&format!(
        "Log notice file {}\n",
        data_dir.join(TOR_LOG_FILE).display()
    ));

    torrc
}
