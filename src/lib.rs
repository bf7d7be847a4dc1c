//! OpenVZ container configuration
//!
//! Keeps the in-memory model of OpenVZ containers (VEs) and reconciles it
//! with the two places container configuration lives:
//!
//! - **Domain XML** - `<domain type="openvz">` documents are validated into a
//!   [`Definition`] by the [`DefinitionParser`].
//! - **Per-VE config files** - `<vpsid>.conf` files in the runtime's config
//!   directory, read by [`ConfigStore`] and used by [`UuidAssigner`] to keep
//!   a stable UUID for every container.
//!
//! The [`Registry`] tracks defined and running instances by id, name and
//! UUID; the [`Driver`] ties everything together behind a lock.
//!
//! # Example
//!
//! ```no_run
//! use vz_conf::{Driver, DriverConfig};
//!
//! let driver = Driver::open(DriverConfig::default())?;
//! driver.assign_uuids()?;
//! driver.refresh()?;
//!
//! let vm = driver.define_xml(r#"
//!     <domain type="openvz">
//!       <name>101</name>
//!       <devices>
//!         <filesystem type="template"><source name="centos-6"/></filesystem>
//!       </devices>
//!     </domain>"#)?;
//! println!("{} {}", vm.def.name, vm.def.uuid);
//! # Ok::<(), vz_conf::Error>(())
//! ```

pub mod conf_file;
pub mod config;
pub mod driver;
pub mod error;
pub mod models;
pub mod network;
pub mod parser;
pub mod registry;
pub mod status;
pub mod uuid_assign;

pub use conf_file::ConfigStore;
pub use config::DriverConfig;
pub use driver::Driver;
pub use error::{Error, ErrorCode, ErrorSink, ParseError, Result};
pub use models::{Definition, FsDef, Instance, NetInterface, VmStatus};
pub use parser::DefinitionParser;
pub use registry::{RefreshPolicy, Registry};
pub use status::{StatusRow, StatusSource};
pub use uuid_assign::UuidAssigner;
