//! Wallet connection gate

/// Identity of the connected wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub address: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

impl Identity {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            avatar: None,
        }
    }

    /// `name (address)` when a name is known, otherwise the bare address
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} ({})", self.address),
            None => self.address.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected(Identity),
}

/// Observes connection changes reported by the connector and relays them.
///
/// Connecting is never initiated here; the gate only records what the
/// connector reports.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGate {
    state: ConnectionState,
    connector: Option<String>,
}

impl ConnectionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            ConnectionState::Connected(identity) => Some(identity),
            ConnectionState::Disconnected => None,
        }
    }

    /// Name of the connector that established the current connection
    pub fn connector(&self) -> Option<&str> {
        self.connector.as_deref()
    }

    /// Record a successful connection
    pub fn on_connected(&mut self, connector: impl Into<String>, address: impl Into<String>) {
        self.state = ConnectionState::Connected(Identity::new(address));
        self.connector = Some(connector.into());
    }

    /// Record a disconnect reported by the connector
    pub fn on_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.connector = None;
    }

    /// Drop the connection and its identity metadata.
    ///
    /// Returns false when already disconnected.
    pub fn disconnect(&mut self) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.on_disconnected();
        true
    }

    /// Attach resolved identity metadata.
    ///
    /// Ignored unless `address` is still the connected address.
    pub fn apply_identity(
        &mut self,
        address: &str,
        name: Option<String>,
        avatar: Option<String>,
    ) -> bool {
        match &mut self.state {
            ConnectionState::Connected(identity) if identity.address.eq_ignore_ascii_case(address) => {
                identity.name = name;
                identity.avatar = avatar;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_connect_disconnect() {
        let mut gate = ConnectionGate::new();
        assert!(!gate.is_connected());
        assert!(!gate.disconnect());

        gate.on_connected("Node accounts", ACCOUNT);
        assert!(gate.is_connected());
        assert_eq!(gate.connector(), Some("Node accounts"));
        assert_eq!(gate.identity().map(|i| i.address.as_str()), Some(ACCOUNT));

        assert!(gate.disconnect());
        assert_eq!(gate.state(), &ConnectionState::Disconnected);
        assert!(gate.identity().is_none());
        assert!(gate.connector().is_none());
    }

    #[test]
    fn test_identity_applies_to_current_address_only() {
        let mut gate = ConnectionGate::new();
        assert!(!gate.apply_identity(ACCOUNT, Some("alice.eth".into()), None));

        gate.on_connected("Watch", ACCOUNT);
        assert!(!gate.apply_identity(
            "0x0000000000000000000000000000000000000001",
            Some("bob.eth".into()),
            None
        ));
        assert!(gate.apply_identity(
            &ACCOUNT.to_lowercase(),
            Some("alice.eth".into()),
            Some("https://example.org/a.png".into())
        ));

        let identity = gate.identity().unwrap();
        assert_eq!(identity.label(), format!("alice.eth ({ACCOUNT})"));
        assert_eq!(identity.avatar.as_deref(), Some("https://example.org/a.png"));
    }

    #[test]
    fn test_disconnect_clears_identity() {
        let mut gate = ConnectionGate::new();
        gate.on_connected("Watch", ACCOUNT);
        gate.apply_identity(ACCOUNT, Some("alice.eth".into()), None);
        gate.disconnect();

        gate.on_connected("Watch", ACCOUNT);
        assert_eq!(gate.identity().and_then(|i| i.name.clone()), None);
    }
}
