//! Driver facade: wires parser, config store, UUID assigner and registry
//! together and reports every failure to an [`ErrorSink`].

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::DriverConfig;
use crate::conf_file::ConfigStore;
use crate::error::{ErrorSink, TracingSink, ERROR_DOMAIN};
use crate::models::Instance;
use crate::parser::DefinitionParser;
use crate::registry::Registry;
use crate::status::{StatusSource, VzList};
use crate::uuid_assign::{AssignReport, UuidAssigner};
use crate::{Error, Result};

/// OpenVZ driver state shared by all callers
pub struct Driver {
    config: DriverConfig,
    parser: DefinitionParser,
    assigner: UuidAssigner,
    status: Box<dyn StatusSource>,
    registry: Mutex<Registry>,
    sink: Arc<dyn ErrorSink>,
}

impl Driver {
    /// Locate the config directory and use `vzlist` for status.
    pub fn open(config: DriverConfig) -> Result<Self> {
        let sink: Arc<dyn ErrorSink> = Arc::new(TracingSink);
        let store = report(
            sink.as_ref(),
            config
                .validate()
                .and_then(|_| ConfigStore::locate(&config.conf_dirs)),
        )?;
        let status = Box::new(VzList::new(&config.vzlist_path));
        Ok(Self::new(config, store, status).with_sink(sink))
    }

    pub fn new(config: DriverConfig, store: ConfigStore, status: Box<dyn StatusSource>) -> Self {
        Self {
            config,
            parser: DefinitionParser::new(),
            assigner: UuidAssigner::new(store),
            status,
            registry: Mutex::new(Registry::new()),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &ConfigStore {
        self.assigner.store()
    }

    /// Parse a domain document and insert or redefine its instance.
    pub fn define_xml(&self, xml: &str) -> Result<Instance> {
        self.check(self.parser.parse_str(xml).map_err(Error::from).and_then(|def| {
            let mut registry = self.registry.lock();
            let vm = registry.assign(def)?.clone();
            Ok(vm)
        }))
    }

    /// Forget an inactive instance.
    pub fn undefine(&self, name: &str) -> Result<Instance> {
        self.check(self.registry.lock().remove(name))
    }

    /// Rebuild the registry from the runtime listing, assigning UUIDs where missing.
    ///
    /// The new registry is built aside first. UUID records for containers
    /// that had none are appended only once every row has been resolved, and
    /// the registry is swapped in after that.
    pub fn refresh(&self) -> Result<()> {
        self.check(self.status.list().and_then(|rows| {
            let mut registry = self.registry.lock();
            let mut staged = registry.clone();
            let mut fresh = Vec::new();
            staged.repopulate(&rows, self.config.refresh_policy, |vpsid| {
                let (uuid, is_new) = self.assigner.resolve(vpsid)?;
                if is_new {
                    fresh.push((vpsid, uuid));
                }
                Ok(uuid)
            })?;

            for (vpsid, uuid) in fresh {
                self.assigner.record(vpsid, uuid)?;
            }
            *registry = staged;
            Ok(())
        }))
    }

    /// Give every container config in the directory a UUID.
    pub fn assign_uuids(&self) -> Result<AssignReport> {
        self.check(self.assigner.scan_and_assign_all())
    }

    /// UUID of a container, assigned on first use
    pub fn container_uuid(&self, vpsid: i32) -> Result<Uuid> {
        self.check(self.assigner.ensure_uuid(vpsid))
    }

    /// Raw parameter from a container config
    pub fn read_param(&self, vpsid: i32, param: &str) -> Result<Option<String>> {
        self.check(self.store().find_param(vpsid, param))
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<Instance> {
        let found = self.registry.lock().find_by_name(name).cloned();
        self.check(found.ok_or_else(|| Error::InstanceNotFound(name.to_string())))
    }

    pub fn lookup_by_uuid(&self, uuid: &Uuid) -> Result<Instance> {
        let found = self.registry.lock().find_by_uuid(uuid).cloned();
        self.check(found.ok_or_else(|| Error::InstanceNotFound(uuid.to_string())))
    }

    pub fn lookup_by_id(&self, vpsid: i32) -> Result<Instance> {
        let found = self.registry.lock().find_by_id(vpsid).cloned();
        self.check(found.ok_or_else(|| Error::InstanceNotFound(vpsid.to_string())))
    }

    /// Record that the lifecycle layer started `name` as `vpsid`.
    pub fn mark_running(&self, name: &str, vpsid: i32) -> Result<()> {
        self.check(self.registry.lock().set_running(name, vpsid))
    }

    /// Record that the lifecycle layer stopped `name`.
    pub fn mark_shutoff(&self, name: &str) -> Result<()> {
        self.check(self.registry.lock().set_shutoff(name))
    }

    pub fn list(&self) -> Vec<Instance> {
        self.registry.lock().iter().cloned().collect()
    }

    pub fn num_active(&self) -> usize {
        self.registry.lock().active_count()
    }

    pub fn num_inactive(&self) -> usize {
        self.registry.lock().inactive_count()
    }

    pub fn active_ids(&self) -> Vec<i32> {
        self.registry.lock().active_ids()
    }

    pub fn inactive_names(&self) -> Vec<String> {
        self.registry.lock().inactive_names()
    }

    fn check<T>(&self, result: Result<T>) -> Result<T> {
        report(self.sink.as_ref(), result)
    }
}

fn report<T>(sink: &dyn ErrorSink, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        sink.report(ERROR_DOMAIN, e.code(), &e.to_string());
    }
    result
}
