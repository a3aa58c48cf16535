//! Connection parameters of the monitored ClickHouse host.

use std::fmt;

/// Immutable description of one ClickHouse instance.
///
/// Built once from validated configuration and owned by the `Exporter` for the
/// lifetime of the process. Fetchers and writers created per scrape only read it.
#[derive(Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    username: String,
    password: String,
    hostname: String,
    port: u16,
}

impl TargetDescriptor {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            hostname: hostname.into(),
            port,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

// Password is never printed.
impl fmt::Debug for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetDescriptor")
            .field("username", &self.username)
            .field("password", &"***")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_return_constructor_values() {
        let target = TargetDescriptor::new("monitor", "secret", "ch-0.local", 8123);
        assert_eq!(target.username(), "monitor");
        assert_eq!(target.password(), "secret");
        assert_eq!(target.hostname(), "ch-0.local");
        assert_eq!(target.port(), 8123);
    }

    #[test]
    fn debug_hides_password() {
        let target = TargetDescriptor::new("monitor", "secret", "localhost", 8123);
        let printed = format!("{:?}", target);
        assert!(printed.contains("monitor"));
        assert!(!printed.contains("secret"));
    }
}
