//! In-memory registry of container instances
//!
//! The registry owns every [`Instance`] and keeps two counters in step with
//! the instance statuses. It does no locking of its own; callers sharing it
//! between threads serialize access (see [`crate::Driver`]).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Definition, Instance, VmStatus, NO_VPSID};
use crate::status::StatusRow;
use crate::{Error, Result};

/// What a refresh from the runtime listing does with existing instances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Drop everything and rebuild skeletons from the listing
    #[default]
    Replace,
    /// Keep known definitions, refresh their status, add skeletons for new ids
    Merge,
}

/// Owns all known instances
#[derive(Debug, Default, Clone)]
pub struct Registry {
    vms: Vec<Instance>,
    active: usize,
    inactive: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn inactive_count(&self) -> usize {
        self.inactive
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.vms.iter()
    }

    /// Running instance with runtime id `vpsid`
    pub fn find_by_id(&self, vpsid: i32) -> Option<&Instance> {
        if vpsid == NO_VPSID {
            return None;
        }
        self.vms.iter().find(|vm| vm.id == vpsid)
    }

    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<&Instance> {
        self.vms.iter().find(|vm| vm.def.uuid == *uuid)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Instance> {
        self.vms.iter().find(|vm| vm.def.name == name)
    }

    /// Runtime ids of all running instances
    pub fn active_ids(&self) -> Vec<i32> {
        self.vms
            .iter()
            .filter(|vm| vm.is_active())
            .map(|vm| vm.id)
            .collect()
    }

    /// Names of all inactive instances
    pub fn inactive_names(&self) -> Vec<String> {
        self.vms
            .iter()
            .filter(|vm| !vm.is_active())
            .map(|vm| vm.def.name.clone())
            .collect()
    }

    /// Insert `def`, or redefine the inactive instance of the same name.
    ///
    /// An active instance is never redefined; `def` is dropped and
    /// [`Error::NameInUse`] returned.
    pub fn assign(&mut self, def: Definition) -> Result<&Instance> {
        if let Some(idx) = self.position(&def.name) {
            let vm = &mut self.vms[idx];
            if vm.is_active() {
                tracing::warn!(name = %def.name, vpsid = vm.id, "Refusing to redefine active VM");
                return Err(Error::NameInUse(def.name));
            }
            tracing::info!(name = %def.name, uuid = %def.uuid, "Redefined inactive VM");
            vm.def = def;
            return Ok(&self.vms[idx]);
        }

        tracing::info!(name = %def.name, uuid = %def.uuid, "Defined new VM");
        self.vms.push(Instance::inactive(def));
        self.inactive += 1;
        Ok(&self.vms[self.vms.len() - 1])
    }

    /// Remove an inactive instance and hand it back.
    pub fn remove(&mut self, name: &str) -> Result<Instance> {
        let Some(idx) = self.position(name) else {
            tracing::warn!(name, "Removal of unknown VM requested");
            return Err(Error::InstanceNotFound(name.to_string()));
        };
        if self.vms[idx].is_active() {
            return Err(Error::InvalidState {
                current: VmStatus::Running.to_string(),
                expected: VmStatus::Shutoff.to_string(),
            });
        }

        let vm = self.vms.remove(idx);
        self.inactive -= 1;
        tracing::info!(name, "Removed inactive VM");
        Ok(vm)
    }

    /// Mark `name` as running under runtime id `vpsid`.
    pub fn set_running(&mut self, name: &str, vpsid: i32) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| Error::InstanceNotFound(name.to_string()))?;
        let vm = &mut self.vms[idx];
        if !vm.is_active() {
            self.inactive -= 1;
            self.active += 1;
        }
        vm.status = VmStatus::Running;
        vm.id = vpsid;
        Ok(())
    }

    /// Mark `name` as shut off.
    pub fn set_shutoff(&mut self, name: &str) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| Error::InstanceNotFound(name.to_string()))?;
        let vm = &mut self.vms[idx];
        if vm.is_active() {
            self.active -= 1;
            self.inactive += 1;
        }
        vm.status = VmStatus::Shutoff;
        vm.id = NO_VPSID;
        Ok(())
    }

    /// Rebuild the registry from a runtime listing.
    ///
    /// `uuid_for` supplies the UUID of every container that needs a skeleton
    /// definition. The first failure aborts the refresh and leaves the
    /// registry untouched. A listing that names the same id twice is
    /// rejected as malformed.
    pub fn repopulate<F>(&mut self, rows: &[StatusRow], policy: RefreshPolicy, mut uuid_for: F) -> Result<()>
    where
        F: FnMut(i32) -> Result<Uuid>,
    {
        let mut seen = HashSet::with_capacity(rows.len());
        if let Some(dup) = rows.iter().find(|row| !seen.insert(row.vpsid)) {
            return Err(Error::MalformedStatus(format!("VPS ID {} listed twice", dup.vpsid)));
        }

        match policy {
            RefreshPolicy::Replace => {
                let mut fresh = Vec::with_capacity(rows.len());
                for row in rows {
                    let uuid = uuid_for(row.vpsid)?;
                    let def = Definition::skeleton(row.vpsid, uuid);
                    fresh.push(Instance::from_status(row.vpsid, row.status(), def));
                }
                self.vms = fresh;
            }
            RefreshPolicy::Merge => {
                enum Plan<'r> {
                    Keep(usize, &'r StatusRow),
                    New(Instance),
                }

                let mut plan = Vec::with_capacity(rows.len());
                for row in rows {
                    match self.position(&row.vpsid.to_string()) {
                        Some(idx) => plan.push(Plan::Keep(idx, row)),
                        None => {
                            let uuid = uuid_for(row.vpsid)?;
                            let def = Definition::skeleton(row.vpsid, uuid);
                            plan.push(Plan::New(Instance::from_status(row.vpsid, row.status(), def)));
                        }
                    }
                }

                let mut old: Vec<Option<Instance>> =
                    std::mem::take(&mut self.vms).into_iter().map(Some).collect();
                let mut merged = Vec::with_capacity(old.len() + plan.len());
                for step in plan {
                    match step {
                        Plan::Keep(idx, row) => {
                            if let Some(vm) = old[idx].take() {
                                merged.push(Instance::from_status(row.vpsid, row.status(), vm.def));
                            }
                        }
                        Plan::New(vm) => merged.push(vm),
                    }
                }
                merged.extend(old.into_iter().flatten().map(|vm| Instance::inactive(vm.def)));
                self.vms = merged;
            }
        }

        self.recount();
        tracing::info!(
            active = self.active,
            inactive = self.inactive,
            ?policy,
            "Registry refreshed from runtime listing"
        );
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.vms.iter().position(|vm| vm.def.name == name)
    }

    fn recount(&mut self) {
        self.active = self.vms.iter().filter(|vm| vm.is_active()).count();
        self.inactive = self.vms.len() - self.active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FsDef;

    fn def(name: &str) -> Definition {
        Definition::new(name, Uuid::new_v4())
    }

    fn rich_def(name: &str, template: &str) -> Definition {
        def(name).with_fs(FsDef {
            template: template.into(),
            disk_size: 10000,
            disk_inodes: 100,
        })
    }

    fn assert_counts(reg: &Registry, active: usize, inactive: usize) {
        assert_eq!(reg.active_count(), active);
        assert_eq!(reg.inactive_count(), inactive);
        assert_eq!(reg.len(), active + inactive);
        assert_eq!(reg.iter().filter(|vm| vm.is_active()).count(), active);
    }

    #[test]
    fn test_assign_new() {
        let mut reg = Registry::new();
        let vm = reg.assign(def("101")).unwrap();
        assert_eq!(vm.id, NO_VPSID);
        assert_eq!(vm.status, VmStatus::Shutoff);
        assert_counts(&reg, 0, 1);
    }

    #[test]
    fn test_redefine_inactive_then_conflict_when_active() {
        let mut reg = Registry::new();
        reg.assign(rich_def("101", "fedora-core-5")).unwrap();

        let replacement = rich_def("101", "centos-6");
        let uuid = replacement.uuid;
        let vm = reg.assign(replacement).unwrap();
        assert_eq!(vm.def.fs.template, "centos-6");
        assert_eq!(vm.def.uuid, uuid);
        assert_counts(&reg, 0, 1);

        reg.set_running("101", 101).unwrap();
        assert_counts(&reg, 1, 0);

        let err = reg.assign(rich_def("101", "debian-12")).unwrap_err();
        assert!(matches!(err, Error::NameInUse(ref n) if n == "101"));

        let vm = reg.find_by_name("101").unwrap();
        assert_eq!(vm.def.fs.template, "centos-6");
        assert_eq!(vm.def.uuid, uuid);
        assert_counts(&reg, 1, 0);
    }

    #[test]
    fn test_lookups() {
        let mut reg = Registry::new();
        let a = def("101");
        let b = def("102");
        let uuid_b = b.uuid;
        reg.assign(a).unwrap();
        reg.assign(b).unwrap();
        reg.set_running("102", 102).unwrap();

        assert_eq!(reg.find_by_name("101").unwrap().def.name, "101");
        assert_eq!(reg.find_by_uuid(&uuid_b).unwrap().def.name, "102");
        assert_eq!(reg.find_by_id(102).unwrap().def.name, "102");
        assert!(reg.find_by_id(NO_VPSID).is_none());
        assert!(reg.find_by_id(101).is_none());
        assert!(reg.find_by_uuid(&Uuid::nil()).is_none());
        assert!(reg.find_by_name("999").is_none());

        assert_eq!(reg.active_ids(), vec![102]);
        assert_eq!(reg.inactive_names(), vec!["101".to_string()]);
    }

    #[test]
    fn test_remove() {
        let mut reg = Registry::new();
        reg.assign(def("101")).unwrap();
        reg.assign(def("102")).unwrap();
        reg.set_running("102", 102).unwrap();

        let vm = reg.remove("101").unwrap();
        assert_eq!(vm.def.name, "101");
        assert_counts(&reg, 1, 0);
        assert!(reg.find_by_name("101").is_none());

        assert!(matches!(reg.remove("102"), Err(Error::InvalidState { .. })));
        assert!(matches!(reg.remove("101"), Err(Error::InstanceNotFound(_))));
        assert_counts(&reg, 1, 0);
    }

    #[test]
    fn test_status_transitions() {
        let mut reg = Registry::new();
        reg.assign(def("101")).unwrap();

        reg.set_running("101", 101).unwrap();
        reg.set_running("101", 101).unwrap();
        assert_counts(&reg, 1, 0);

        reg.set_shutoff("101").unwrap();
        reg.set_shutoff("101").unwrap();
        assert_counts(&reg, 0, 1);
        assert_eq!(reg.find_by_name("101").unwrap().id, NO_VPSID);

        assert!(matches!(reg.set_running("999", 999), Err(Error::InstanceNotFound(_))));
    }

    #[test]
    fn test_repopulate_replace() {
        let mut reg = Registry::new();
        reg.assign(rich_def("101", "centos-6")).unwrap();
        reg.assign(def("150")).unwrap();

        let rows = vec![StatusRow::new(101, "running"), StatusRow::new(102, "stopped")];
        reg.repopulate(&rows, RefreshPolicy::Replace, |_| Ok(Uuid::new_v4()))
            .unwrap();

        assert_counts(&reg, 1, 1);
        let vm = reg.find_by_id(101).unwrap();
        assert!(vm.def.is_skeleton());
        assert_eq!(reg.find_by_name("102").unwrap().id, NO_VPSID);
        assert!(reg.find_by_name("150").is_none());
    }

    #[test]
    fn test_repopulate_merge() {
        let mut reg = Registry::new();
        let rich = rich_def("101", "centos-6");
        let uuid = rich.uuid;
        reg.assign(rich).unwrap();
        reg.assign(def("150")).unwrap();
        reg.set_running("150", 150).unwrap();

        let rows = vec![StatusRow::new(101, "running"), StatusRow::new(102, "stopped")];
        let mut asked = Vec::new();
        reg.repopulate(&rows, RefreshPolicy::Merge, |id| {
            asked.push(id);
            Ok(Uuid::new_v4())
        })
        .unwrap();

        assert_eq!(asked, vec![102]);
        assert_counts(&reg, 1, 2);

        let vm = reg.find_by_id(101).unwrap();
        assert_eq!(vm.def.fs.template, "centos-6");
        assert_eq!(vm.def.uuid, uuid);

        // no longer listed, kept as inactive
        let vm = reg.find_by_name("150").unwrap();
        assert_eq!(vm.status, VmStatus::Shutoff);
        assert_eq!(vm.id, NO_VPSID);
    }

    #[test]
    fn test_repopulate_is_all_or_nothing() {
        for policy in [RefreshPolicy::Replace, RefreshPolicy::Merge] {
            let mut reg = Registry::new();
            reg.assign(rich_def("101", "centos-6")).unwrap();
            reg.set_running("101", 101).unwrap();

            let rows = vec![
                StatusRow::new(102, "running"),
                StatusRow::new(103, "stopped"),
                StatusRow::new(104, "stopped"),
            ];
            let err = reg
                .repopulate(&rows, policy, |id| {
                    if id == 103 {
                        Err(Error::MalformedUuid { vpsid: id, value: "bad".into() })
                    } else {
                        Ok(Uuid::new_v4())
                    }
                })
                .unwrap_err();

            assert!(matches!(err, Error::MalformedUuid { vpsid: 103, .. }));
            assert_counts(&reg, 1, 0);
            assert_eq!(reg.find_by_id(101).unwrap().def.fs.template, "centos-6");
            assert!(reg.find_by_name("102").is_none());
        }
    }

    #[test]
    fn test_repopulate_rejects_duplicate_ids() {
        for policy in [RefreshPolicy::Replace, RefreshPolicy::Merge] {
            let mut reg = Registry::new();
            reg.assign(def("101")).unwrap();

            let rows = vec![
                StatusRow::new(101, "running"),
                StatusRow::new(102, "stopped"),
                StatusRow::new(101, "running"),
            ];
            let mut asked = 0;
            let err = reg
                .repopulate(&rows, policy, |_| {
                    asked += 1;
                    Ok(Uuid::new_v4())
                })
                .unwrap_err();

            assert!(matches!(err, Error::MalformedStatus(ref msg) if msg.contains("101")));
            assert_eq!(asked, 0);
            assert_counts(&reg, 0, 1);
        }
    }
}
