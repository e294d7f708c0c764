// DN to network authorization table

use std::collections::HashMap;

use super::Ipv4Network;
use crate::error::RouteError;

/// Which networks each certificate DN may route. Built once at startup and
/// never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationTable {
    entries: HashMap<String, Vec<Ipv4Network>>,
}

impl AuthorizationTable {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Ipv4Network>)>,
    {
        AuthorizationTable {
            entries: entries.into_iter().collect(),
        }
    }

    /// Networks authorized for `dn`, in the order they must be installed.
    pub fn lookup(&self, dn: &str) -> Result<&[Ipv4Network], RouteError> {
        match self.entries.get(dn) {
            None => Err(RouteError::UnknownUser),
            Some(networks) if networks.is_empty() => Err(RouteError::NoRoutes),
            Some(networks) => Ok(networks),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AuthorizationTable {
        AuthorizationTable::new([
            (
                "centos-gw".to_string(),
                vec!["192.168.178.0/24".parse().unwrap()],
            ),
            (
                "branch".to_string(),
                vec![
                    "10.20.0.0/16".parse().unwrap(),
                    "10.30.1.0/24".parse().unwrap(),
                ],
            ),
            ("revoked".to_string(), vec![]),
        ])
    }

    #[test]
    fn test_lookup_known_dn() {
        let table = table();
        let networks = table.lookup("centos-gw").unwrap();
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].to_string(), "192.168.178.0/24");
    }

    #[test]
    fn test_lookup_preserves_order() {
        let table = table();
        let networks: Vec<String> = table
            .lookup("branch")
            .unwrap()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(networks, vec!["10.20.0.0/16", "10.30.1.0/24"]);
    }

    #[test]
    fn test_lookup_unknown_and_empty() {
        let table = table();
        assert_eq!(table.lookup("unknown-host"), Err(RouteError::UnknownUser));
        assert_eq!(table.lookup(""), Err(RouteError::UnknownUser));
        assert_eq!(table.lookup("CENTOS-GW"), Err(RouteError::UnknownUser));
        assert_eq!(table.lookup("revoked"), Err(RouteError::NoRoutes));
    }
}
