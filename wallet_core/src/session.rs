//! The client's belief about the connected wallet.

use serde::{Deserialize, Serialize};

use securepool_types::WalletAddress;

use crate::hub::ProviderSnapshot;

/// Whether a provider identity is currently authorized, and which address.
///
/// Being connected without an address is unrepresentable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SessionView", from = "SessionView")]
pub enum Session {
    #[default]
    Disconnected,
    Connected { address: WalletAddress },
}

impl Session {
    pub fn connected(address: WalletAddress) -> Self {
        Session::Connected { address }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Session::Connected { .. })
    }

    pub fn address(&self) -> Option<&WalletAddress> {
        match self {
            Session::Connected { address } => Some(address),
            Session::Disconnected => None,
        }
    }
}

/// Flat `{connected, address}` shape handed to presentation code.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SessionView {
    connected: bool,
    address: Option<WalletAddress>,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        match session {
            Session::Connected { address } => SessionView {
                connected: true,
                address: Some(address),
            },
            Session::Disconnected => SessionView {
                connected: false,
                address: None,
            },
        }
    }
}

impl From<SessionView> for Session {
    fn from(view: SessionView) -> Self {
        match (view.connected, view.address) {
            (true, Some(address)) => Session::Connected { address },
            _ => Session::Disconnected,
        }
    }
}

/// Result of mapping a provider snapshot onto a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciliation {
    pub session: Session,
    /// The snapshot was logged in without an address; the provider must be
    /// told to drop that half-open session.
    pub force_disconnect: bool,
}

/// Map a provider snapshot to a valid session.
pub fn reconcile(snapshot: &ProviderSnapshot) -> Reconciliation {
    match (snapshot.logged_in, &snapshot.address) {
        (true, Some(address)) => Reconciliation {
            session: Session::connected(address.clone()),
            force_disconnect: false,
        },
        (true, None) => Reconciliation {
            session: Session::Disconnected,
            force_disconnect: true,
        },
        (false, _) => Reconciliation {
            session: Session::Disconnected,
            force_disconnect: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> WalletAddress {
        WalletAddress::parse(s).unwrap()
    }

    #[test]
    fn logged_in_with_address_connects() {
        let r = reconcile(&ProviderSnapshot::logged_in(addr("0x9a2b")));
        assert_eq!(r.session, Session::connected(addr("0x9a2b")));
        assert!(!r.force_disconnect);
    }

    #[test]
    fn logged_in_without_address_heals() {
        let r = reconcile(&ProviderSnapshot {
            logged_in: true,
            address: None,
        });
        assert_eq!(r.session, Session::Disconnected);
        assert!(r.force_disconnect);
    }

    #[test]
    fn address_without_login_is_just_disconnected() {
        let r = reconcile(&ProviderSnapshot {
            logged_in: false,
            address: Some(addr("0x9a2b")),
        });
        assert_eq!(r.session, Session::Disconnected);
        assert!(!r.force_disconnect);
    }

    #[test]
    fn serializes_as_flat_view() {
        let json = serde_json::to_value(Session::connected(addr("0x9a2b"))).unwrap();
        assert_eq!(json, serde_json::json!({"connected": true, "address": "0x9a2b"}));
        let json = serde_json::to_value(Session::Disconnected).unwrap();
        assert_eq!(json, serde_json::json!({"connected": false, "address": null}));
    }

    #[test]
    fn invalid_view_deserializes_as_disconnected() {
        let s: Session =
            serde_json::from_value(serde_json::json!({"connected": true, "address": null}))
                .unwrap();
        assert_eq!(s, Session::Disconnected);
    }
}
