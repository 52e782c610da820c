//! vlcrc inspection and setup.
//!
//! VLC only serves `status.json` when its HTTP interface is enabled. These
//! helpers check a `vlcrc` file against the configured host/port/password and
//! rewrite it in place when it does not match.

use std::collections::HashMap;
use std::fs;
use std::net::ToSocketAddrs;
use std::path::Path;

use tracing::{debug, info};

use crate::config::VlcConfig;
use crate::error::{Error, Result};

const HTTP_INTERFACE: &str = "http";
const DEFAULT_HTTP_PORT: u16 = 8080;

/// Parsed `key=value` pairs of a vlcrc file
#[derive(Debug, Clone, Default)]
pub struct VlcProperties {
    values: HashMap<String, String>,
}

impl VlcProperties {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Parse vlcrc content. Blank lines, comments and lines without `=` are skipped.
    pub fn parse(content: &str) -> Self {
        let values = content
            .lines()
            .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_u16(&self, key: &str, default: u16) -> Result<u16> {
        match self.get(key) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("{}={} is not a port", key, value))),
            None => Ok(default),
        }
    }
}

/// Check that the vlcrc enables the HTTP interface with the settings in `config`
pub fn is_configured(config: &VlcConfig, properties: &VlcProperties) -> Result<bool> {
    let password_ok = properties.get("http-password").is_some()
        && properties.get("http-password") == config.password.as_deref();
    let interface_ok = properties
        .get("extraintf")
        .is_some_and(|interfaces| interfaces.contains(HTTP_INTERFACE));
    let port_ok = properties.get_u16("http-port", DEFAULT_HTTP_PORT)? == config.port;
    let host_ok = match properties.get("http-host") {
        Some(host) => host == config.host,
        None => is_local(&config.host),
    };

    debug!(
        "vlcrc check: password={} interface={} port={} host={}",
        password_ok, interface_ok, port_ok, host_ok
    );
    Ok(password_ok && interface_ok && port_ok && host_ok)
}

/// Rewrite the HTTP interface settings of the vlcrc at `path`
pub fn configure<P: AsRef<Path>>(config: &VlcConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let updated = apply_settings(config, &content);
    fs::write(path, updated)?;
    info!("Updated VLC HTTP settings in {}", path.display());
    Ok(())
}

fn apply_settings(config: &VlcConfig, content: &str) -> String {
    let password = config.password.as_deref().unwrap_or("");
    let mut saw_password = false;
    let mut saw_interface = false;
    let mut saw_port = false;
    let mut saw_host = false;

    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if line.starts_with("http-password=") {
                saw_password = true;
                format!("http-password={}", password)
            } else if let Some(value) = line.strip_prefix("extraintf=") {
                saw_interface = true;
                let value = if value.is_empty() {
                    HTTP_INTERFACE.to_string()
                } else if value.split(':').any(|i| i == HTTP_INTERFACE) {
                    value.to_string()
                } else {
                    format!("{}:{}", value, HTTP_INTERFACE)
                };
                format!("extraintf={}", value)
            } else if line.starts_with("http-port=") {
                saw_port = true;
                format!("http-port={}", config.port)
            } else if line.starts_with("http-host=") {
                saw_host = true;
                format!("http-host={}", config.host)
            } else {
                line.to_string()
            }
        })
        .collect();

    if !saw_password {
        lines.push(format!("http-password={}", password));
    }
    if !saw_interface {
        lines.push(format!("extraintf={}", HTTP_INTERFACE));
    }
    if !saw_port {
        lines.push(format!("http-port={}", config.port));
    }
    if !saw_host {
        lines.push(format!("http-host={}", config.host));
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

fn is_local(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    (host, 0)
        .to_socket_addrs()
        .map(|mut addrs| addrs.any(|addr| addr.ip().is_loopback() || addr.ip().is_unspecified()))
        .unwrap_or(false)
}
