//! Domain XML to [`Definition`]
//!
//! Accepted document shape:
//!
//! ```xml
//! <domain type="openvz">
//!   <name>101</name>
//!   <uuid>8509f80e-4a3b-4ac4-8b2a-5d3b1b2f9c42</uuid>
//!   <vcpu>2</vcpu>
//!   <devices>
//!     <filesystem type="template">
//!       <source name="fedora-core-5-i386"/>
//!       <quota type="size" max="10000"/>
//!       <quota type="inodes" max="100"/>
//!     </filesystem>
//!     <interface type="bridge">...</interface>
//!   </devices>
//! </domain>
//! ```

use std::sync::Arc;

use roxmltree::{Document, Node};
use uuid::Uuid;

use crate::error::ParseError;
use crate::models::{Definition, FsDef, NAME_MAX, RESERVED_ID_LIMIT};
use crate::network::{DefaultInterfaceParser, InterfaceParser};
use crate::uuid_assign::{RandomUuid, UuidSource};

/// Builds validated definitions from domain documents
#[derive(Clone)]
pub struct DefinitionParser {
    uuids: Arc<dyn UuidSource>,
    interfaces: Arc<dyn InterfaceParser>,
}

impl Default for DefinitionParser {
    fn default() -> Self {
        Self {
            uuids: Arc::new(RandomUuid),
            interfaces: Arc::new(DefaultInterfaceParser),
        }
    }
}

impl DefinitionParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uuid_source(mut self, uuids: Arc<dyn UuidSource>) -> Self {
        self.uuids = uuids;
        self
    }

    pub fn with_interface_parser(mut self, interfaces: Arc<dyn InterfaceParser>) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Parse XML text and validate it
    pub fn parse_str(&self, xml: &str) -> Result<Definition, ParseError> {
        let doc = Document::parse(xml)?;
        self.parse(&doc)
    }

    /// Validate an already parsed document
    pub fn parse(&self, doc: &Document<'_>) -> Result<Definition, ParseError> {
        let root = doc.root_element();
        if root.tag_name().name() != "domain" {
            return Err(ParseError::InvalidRoot(root.tag_name().name().to_string()));
        }

        match root.attribute("type") {
            Some("openvz") => {}
            other => return Err(ParseError::InvalidType(other.map(str::to_string))),
        }

        let name = parse_name(root)?;
        let uuid = self.parse_uuid(root)?;

        // Absent and malformed counts both mean "runtime default".
        let vcpus = child_text(root, "vcpu")
            .and_then(|text| text.trim().parse::<u32>().ok())
            .unwrap_or(0);

        let devices: Vec<Node> = root
            .children()
            .filter(|n| n.has_tag_name("devices"))
            .collect();

        let fs = parse_filesystem(&devices)?;

        let mut net = Vec::new();
        for (index, node) in devices
            .iter()
            .flat_map(|d| d.children())
            .filter(|n| n.has_tag_name("interface"))
            .enumerate()
        {
            let iface = self
                .interfaces
                .parse(node)
                .map_err(|reason| ParseError::Interface { index, reason })?;
            net.push(iface);
        }

        tracing::debug!(name = %name, uuid = %uuid, vcpus, interfaces = net.len(), "Parsed domain definition");

        Ok(Definition {
            name,
            uuid,
            vcpus,
            fs,
            net,
        })
    }

    fn parse_uuid(&self, root: Node<'_, '_>) -> Result<Uuid, ParseError> {
        match child_text(root, "uuid").map(str::trim).filter(|s| !s.is_empty()) {
            Some(text) => {
                Uuid::parse_str(text).map_err(|_| ParseError::MalformedUuid(text.to_string()))
            }
            None => self
                .uuids
                .generate()
                .map_err(ParseError::UuidGenerationFailed),
        }
    }
}

/// Text of the first child element named `tag`, `None` if the element is absent.
fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .map(|n| n.text().unwrap_or(""))
}

fn parse_name(root: Node<'_, '_>) -> Result<String, ParseError> {
    let name = child_text(root, "name").map(str::trim).unwrap_or("");
    if name.is_empty() {
        return Err(ParseError::InvalidName("missing or empty <name>".into()));
    }

    let vpsid: i64 = name
        .parse()
        .map_err(|_| ParseError::InvalidName(format!("'{}' is not a numeric VPS id", name)))?;
    if vpsid <= RESERVED_ID_LIMIT {
        return Err(ParseError::ReservedId(vpsid));
    }
    if name.len() >= NAME_MAX {
        return Err(ParseError::InvalidName(format!(
            "'{}' is longer than {} characters",
            name,
            NAME_MAX - 1
        )));
    }

    Ok(name.to_string())
}

/// Read the single `<filesystem type="template">` element of the devices section.
fn parse_filesystem(devices: &[Node<'_, '_>]) -> Result<FsDef, ParseError> {
    let found: Vec<Node> = devices
        .iter()
        .flat_map(|d| d.children())
        .filter(|n| n.has_tag_name("filesystem"))
        .collect();

    let node = match found.as_slice() {
        [node] => *node,
        other => return Err(ParseError::BadFilesystemCount(other.len())),
    };

    match node.attribute("type") {
        Some("template") => {}
        other => return Err(ParseError::BadFilesystemType(other.map(str::to_string))),
    }

    let mut fs = FsDef::default();
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "source" => {
                if let Some(name) = child.attribute("name") {
                    fs.set_template(name);
                }
            }
            "quota" => match (child.attribute("type"), child.attribute("max")) {
                (Some("size"), Some(max)) => fs.disk_size = quota_value(max),
                (Some("inodes"), Some(max)) => fs.disk_inodes = quota_value(max),
                _ => {}
            },
            _ => {}
        }
    }

    Ok(fs)
}

// A malformed limit is indistinguishable from an unset one; both read as 0.
fn quota_value(max: &str) -> u64 {
    max.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NetType;

    const FS: &str = r#"<filesystem type="template">
          <source name="fedora-core-5-i386"/>
          <quota type="size" max="10000"/>
          <quota type="inodes" max="100"/>
        </filesystem>"#;

    fn domain(name: &str, extra: &str, devices: &str) -> String {
        format!(
            r#"<domain type="openvz"><name>{}</name>{}<devices>{}</devices></domain>"#,
            name, extra, devices
        )
    }

    struct FailingUuids;

    impl UuidSource for FailingUuids {
        fn generate(&self) -> std::io::Result<Uuid> {
            Err(std::io::Error::other("entropy source unavailable"))
        }
    }

    #[test]
    fn test_parse_full_definition() {
        let xml = domain(
            "101",
            "<uuid>8509f80e-4a3b-4ac4-8b2a-5d3b1b2f9c42</uuid><vcpu>2</vcpu>",
            &format!(r#"{}<interface type="bridge"><source bridge="vzbr0"/></interface>"#, FS),
        );
        let def = DefinitionParser::new().parse_str(&xml).unwrap();

        assert_eq!(def.name, "101");
        assert_eq!(def.uuid.to_string(), "8509f80e-4a3b-4ac4-8b2a-5d3b1b2f9c42");
        assert_eq!(def.vcpus, 2);
        assert_eq!(def.fs.template, "fedora-core-5-i386");
        assert_eq!(def.fs.disk_size, 10000);
        assert_eq!(def.fs.disk_inodes, 100);
        assert_eq!(def.net.len(), 1);
        assert_eq!(def.net[0].net_type, NetType::Bridge);
    }

    #[test]
    fn test_reserved_id() {
        let parser = DefinitionParser::new();
        let err = parser.parse_str(&domain("50", "", FS)).unwrap_err();
        assert!(matches!(err, ParseError::ReservedId(50)));

        let err = parser.parse_str(&domain("100", "", FS)).unwrap_err();
        assert!(matches!(err, ParseError::ReservedId(100)));

        // reserved wins even when everything else is broken too
        let err = parser
            .parse_str(&domain("50", "<uuid>garbage</uuid>", ""))
            .unwrap_err();
        assert!(matches!(err, ParseError::ReservedId(50)));
    }

    #[test]
    fn test_invalid_names() {
        let parser = DefinitionParser::new();
        for name in ["", "   ", "web01", "12345678"] {
            let err = parser.parse_str(&domain(name, "", FS)).unwrap_err();
            assert!(matches!(err, ParseError::InvalidName(_)), "name {:?}", name);
        }

        let xml = format!(r#"<domain type="openvz"><devices>{}</devices></domain>"#, FS);
        assert!(matches!(
            parser.parse_str(&xml).unwrap_err(),
            ParseError::InvalidName(_)
        ));
    }

    #[test]
    fn test_invalid_root_and_type() {
        let parser = DefinitionParser::new();
        let err = parser.parse_str("<vm type=\"openvz\"/>").unwrap_err();
        assert!(matches!(err, ParseError::InvalidRoot(ref r) if r == "vm"));

        let xml = domain("101", "", FS).replace("openvz", "kvm");
        let err = parser.parse_str(&xml).unwrap_err();
        assert!(matches!(err, ParseError::InvalidType(Some(ref t)) if t == "kvm"));

        let xml = domain("101", "", FS).replace(r#" type="openvz""#, "");
        let err = parser.parse_str(&xml).unwrap_err();
        assert!(matches!(err, ParseError::InvalidType(None)));

        assert!(matches!(
            parser.parse_str("<domain").unwrap_err(),
            ParseError::Xml(_)
        ));
    }

    #[test]
    fn test_uuid_handling() {
        let parser = DefinitionParser::new();
        let err = parser
            .parse_str(&domain("101", "<uuid>not-a-uuid</uuid>", FS))
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedUuid(_)));

        let a = parser.parse_str(&domain("101", "", FS)).unwrap();
        let b = parser.parse_str(&domain("101", "<uuid></uuid>", FS)).unwrap();
        assert!(!a.uuid.is_nil());
        assert_ne!(a.uuid, b.uuid);
    }

    #[test]
    fn test_uuid_generation_failure() {
        let parser = DefinitionParser::new().with_uuid_source(Arc::new(FailingUuids));
        let err = parser.parse_str(&domain("101", "", FS)).unwrap_err();
        assert!(matches!(err, ParseError::UuidGenerationFailed(_)));

        // an explicit uuid never touches the generator
        let def = parser
            .parse_str(&domain("101", "<uuid>8509f80e-4a3b-4ac4-8b2a-5d3b1b2f9c42</uuid>", FS))
            .unwrap();
        assert_eq!(def.name, "101");
    }

    #[test]
    fn test_vcpu_fallback() {
        let parser = DefinitionParser::new();
        for extra in ["", "<vcpu>abc</vcpu>", "<vcpu>-2</vcpu>", "<vcpu></vcpu>"] {
            let def = parser.parse_str(&domain("101", extra, FS)).unwrap();
            assert_eq!(def.vcpus, 0, "vcpu {:?}", extra);
        }
        let def = parser.parse_str(&domain("101", "<vcpu> 4 </vcpu>", FS)).unwrap();
        assert_eq!(def.vcpus, 4);
    }

    #[test]
    fn test_filesystem_count() {
        let parser = DefinitionParser::new();
        let err = parser.parse_str(&domain("101", "", "")).unwrap_err();
        assert!(matches!(err, ParseError::BadFilesystemCount(0)));

        let two = format!("{}{}", FS, FS);
        let err = parser.parse_str(&domain("101", "", &two)).unwrap_err();
        assert!(matches!(err, ParseError::BadFilesystemCount(2)));

        // filesystem outside <devices> does not count
        let xml = format!(r#"<domain type="openvz"><name>101</name>{}</domain>"#, FS);
        let err = parser.parse_str(&xml).unwrap_err();
        assert!(matches!(err, ParseError::BadFilesystemCount(0)));
    }

    #[test]
    fn test_filesystem_type() {
        let parser = DefinitionParser::new();
        let fs = FS.replace("template", "mount");
        let err = parser.parse_str(&domain("101", "", &fs)).unwrap_err();
        assert!(matches!(err, ParseError::BadFilesystemType(Some(_))));

        let fs = FS.replace(r#" type="template""#, "");
        let err = parser.parse_str(&domain("101", "", &fs)).unwrap_err();
        assert!(matches!(err, ParseError::BadFilesystemType(None)));
    }

    #[test]
    fn test_quota_fallback() {
        let fs = r#"<filesystem type="template">
              <source name="centos-6"/>
              <quota type="size" max="lots"/>
              <quota type="inodes" max="200"/>
              <quota type="cpu" max="7"/>
              <quota type="inodes"/>
            </filesystem>"#;
        let def = DefinitionParser::new()
            .parse_str(&domain("101", "", fs))
            .unwrap();
        assert_eq!(def.fs.template, "centos-6");
        assert_eq!(def.fs.disk_size, 0);
        assert_eq!(def.fs.disk_inodes, 200);
    }

    #[test]
    fn test_interfaces_keep_document_order() {
        let ifaces = ["vzbr0", "vzbr1", "vzbr2"]
            .iter()
            .map(|b| format!(r#"<interface type="bridge"><source bridge="{}"/></interface>"#, b))
            .collect::<String>();
        let def = DefinitionParser::new()
            .parse_str(&domain("101", "", &format!("{}{}", ifaces, FS)))
            .unwrap();

        let bridges: Vec<_> = def.net.iter().map(|n| n.source.as_deref().unwrap()).collect();
        assert_eq!(bridges, ["vzbr0", "vzbr1", "vzbr2"]);
    }

    #[test]
    fn test_bad_interface_aborts_parse() {
        let devices = format!(
            r#"{}<interface type="bridge"/><interface type="bogus"/>"#,
            FS
        );
        let err = DefinitionParser::new()
            .parse_str(&domain("101", "", &devices))
            .unwrap_err();
        assert!(matches!(err, ParseError::Interface { index: 1, .. }));
    }
}
