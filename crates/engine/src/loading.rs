//! Named load jobs and the loader collaborator that completes them.
//!
//! Loading happens outside the simulation. The simulation only registers jobs,
//! hands their completion handles to an [`AssetLoader`], and later asks whether a
//! job (or a set of jobs) is done. Asking about a job that is unknown or still in
//! flight is always safe and answers `false`.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, warn};

/// Completion flag for one load. Clones share the flag.
#[derive(Debug, Clone)]
pub struct JobHandle {
    name: Rc<str>,
    done: Rc<Cell<bool>>,
}

impl JobHandle {
    /// A handle not tracked by name, used as one part of a group job.
    pub fn detached(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            done: Rc::new(Cell::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn complete(&self) {
        if !self.done.replace(true) {
            debug!(job = %self.name, "load_job_complete");
        }
    }

    pub fn is_complete(&self) -> bool {
        self.done.get()
    }
}

#[derive(Debug)]
enum JobEntry {
    Single(JobHandle),
    AllOf(Vec<JobHandle>),
}

impl JobEntry {
    fn is_complete(&self) -> bool {
        match self {
            JobEntry::Single(handle) => handle.is_complete(),
            JobEntry::AllOf(parts) => parts.iter().all(JobHandle::is_complete),
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadTracker {
    jobs: BTreeMap<String, JobEntry>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` and returns its completion handle. Registering a name twice
    /// replaces the old job.
    pub fn register_job(&mut self, name: &str) -> JobHandle {
        let handle = JobHandle::detached(name);
        if self
            .jobs
            .insert(name.to_string(), JobEntry::Single(handle.clone()))
            .is_some()
        {
            warn!(job = name, "load_job_replaced");
        }
        handle
    }

    /// Registers `name` as done once every part is done. An empty group is done
    /// immediately.
    pub fn register_all_of(&mut self, name: &str, parts: Vec<JobHandle>) {
        if self
            .jobs
            .insert(name.to_string(), JobEntry::AllOf(parts))
            .is_some()
        {
            warn!(job = name, "load_job_replaced");
        }
    }

    /// Marks a single job complete by name. Unknown names and groups are ignored.
    pub fn mark_job_complete(&mut self, name: &str) -> bool {
        match self.jobs.get(name) {
            Some(JobEntry::Single(handle)) => {
                handle.complete();
                true
            }
            Some(JobEntry::AllOf(_)) => {
                warn!(job = name, "group_job_completes_through_parts");
                false
            }
            None => {
                warn!(job = name, "unknown_load_job");
                false
            }
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.jobs.get(name).is_some_and(JobEntry::is_complete)
    }

    pub fn load_complete(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.is_loaded(name))
    }

    pub fn pending_jobs(&self) -> Vec<&str> {
        self.jobs
            .iter()
            .filter(|(_, entry)| !entry.is_complete())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Model,
    Texture,
    Audio,
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub resource: String,
    pub kind: AssetKind,
}

impl LoadRequest {
    pub fn new(kind: AssetKind, resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            kind,
        }
    }
}

/// Load-and-callback collaborator. Implementations call `complete()` on the handle
/// whenever the resource is ready, possibly many ticks later, possibly never.
pub trait AssetLoader {
    fn load(&mut self, request: LoadRequest, on_complete: JobHandle);

    /// Called once per tick while the simulation waits on loads.
    fn poll(&mut self) {}
}

/// Completes every request on the next `poll`. Headless runs have nothing to fetch.
#[derive(Debug, Default)]
pub struct ImmediateLoader {
    pending: Vec<(LoadRequest, JobHandle)>,
    loaded: usize,
}

impl ImmediateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded
    }
}

impl AssetLoader for ImmediateLoader {
    fn load(&mut self, request: LoadRequest, on_complete: JobHandle) {
        self.pending.push((request, on_complete));
    }

    fn poll(&mut self) {
        for (request, handle) in self.pending.drain(..) {
            debug!(resource = %request.resource, kind = ?request.kind, "asset_loaded");
            handle.complete();
            self.loaded += 1;
        }
    }
}
