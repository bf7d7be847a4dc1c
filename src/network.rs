//! `<interface>` device parsing
//!
//! The definition parser hands every interface element of the devices
//! section to an [`InterfaceParser`]. [`DefaultInterfaceParser`] understands
//! the usual net device layout:
//!
//! ```xml
//! <interface type="bridge">
//!   <mac address="00:18:51:ab:0c:ff"/>
//!   <source bridge="vzbr0"/>
//!   <target dev="veth101.0"/>
//! </interface>
//! ```

use crate::models::{MacAddr, NetInterface, NetType};
use roxmltree::Node;

/// Turns one `<interface>` element into a [`NetInterface`].
pub trait InterfaceParser: Send + Sync {
    /// Returns a human-readable reason on failure.
    fn parse(&self, node: Node<'_, '_>) -> Result<NetInterface, String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInterfaceParser;

impl InterfaceParser for DefaultInterfaceParser {
    fn parse(&self, node: Node<'_, '_>) -> Result<NetInterface, String> {
        let net_type = node
            .attribute("type")
            .ok_or_else(|| "missing interface type attribute".to_string())?
            .parse::<NetType>()?;

        let mut net = NetInterface::new(net_type);

        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "mac" => {
                    if let Some(addr) = child.attribute("address") {
                        net.mac = addr.parse::<MacAddr>()?;
                    }
                }
                "source" => {
                    let key = match net_type {
                        NetType::Bridge => "bridge",
                        NetType::Network => "network",
                        NetType::Ethernet | NetType::User => "dev",
                    };
                    if let Some(value) = child.attribute(key) {
                        net.source = Some(value.to_string());
                    }
                }
                "target" => net.target = child.attribute("dev").map(str::to_string),
                "model" => net.model = child.attribute("type").map(str::to_string),
                "script" => net.script = child.attribute("path").map(str::to_string),
                "ip" => net.ip_address = child.attribute("address").map(str::to_string),
                _ => {}
            }
        }

        if net_type == NetType::Network && net.source.is_none() {
            return Err("network interface requires <source network=...>".to_string());
        }

        Ok(net)
    }
}
