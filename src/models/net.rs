//! Network interface model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const MAC_LEN: usize = 6;

/// Ethernet hardware address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; MAC_LEN]);

impl MacAddr {
    /// An all-zero address means "let the runtime pick one".
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}", a, b, c, d, e, g)
    }
}

impl FromStr for MacAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mac = [0u8; MAC_LEN];
        let mut parts = s.split([':', '-']);
        for byte in mac.iter_mut() {
            let part = parts
                .next()
                .filter(|p| !p.is_empty() && p.len() <= 2)
                .ok_or_else(|| format!("malformed MAC address '{}'", s))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| format!("malformed MAC address '{}'", s))?;
        }
        if parts.next().is_some() {
            return Err(format!("malformed MAC address '{}'", s));
        }
        Ok(MacAddr(mac))
    }
}

/// How an interface is attached on the host side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetType {
    Bridge,
    Network,
    Ethernet,
    User,
}

impl std::fmt::Display for NetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetType::Bridge => write!(f, "bridge"),
            NetType::Network => write!(f, "network"),
            NetType::Ethernet => write!(f, "ethernet"),
            NetType::User => write!(f, "user"),
        }
    }
}

impl FromStr for NetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bridge" => Ok(NetType::Bridge),
            "network" => Ok(NetType::Network),
            "ethernet" => Ok(NetType::Ethernet),
            "user" => Ok(NetType::User),
            other => Err(format!("unknown interface type '{}'", other)),
        }
    }
}

/// One `<interface>` device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetInterface {
    pub net_type: NetType,
    pub mac: MacAddr,
    /// Bridge, network or host device name depending on `net_type`
    pub source: Option<String>,
    /// Device name inside the container
    pub target: Option<String>,
    pub model: Option<String>,
    pub script: Option<String>,
    pub ip_address: Option<String>,
}

impl NetInterface {
    pub fn new(net_type: NetType) -> Self {
        Self {
            net_type,
            mac: MacAddr::default(),
            source: None,
            target: None,
            model: None,
            script: None,
            ip_address: None,
        }
    }

    /// MAC in display form, `None` when unset
    pub fn mac_string(&self) -> Option<String> {
        (!self.mac.is_empty()).then(|| self.mac.to_string())
    }
}
