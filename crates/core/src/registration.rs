// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task and workflow handles extracted from a loaded artifact, and the
//! `RegistrationSet` a reload contributes as a whole.

use std::collections::BTreeMap;

use crate::registry::ArtifactId;

/// Type information carried by a task's parameters and return value.
///
/// Per the Design Notes' "delegate construction over arbitrary signatures"
/// redesign, every task exposes the uniform `(ctx, payload-bytes) ->
/// (result-bytes, error)` signature; de/serialization is the embedding
/// orchestration SDK's job, not this repo's. `Bytes` is therefore the only
/// descriptor in practice, kept as an enum so a richer descriptor could be
/// added later without breaking callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDescriptor {
    Bytes,
}

/// A callable extracted from a loaded module, addressable by its declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub name: String,
    pub input_types: Vec<TypeDescriptor>,
    pub output_type: TypeDescriptor,
    /// Identity of the artifact whose container owns this task's code.
    pub owner: ArtifactId,
}

impl TaskHandle {
    pub fn new(name: impl Into<String>, owner: ArtifactId, param_count: usize) -> Self {
        Self {
            name: name.into(),
            input_types: vec![TypeDescriptor::Bytes; param_count],
            output_type: TypeDescriptor::Bytes,
            owner,
        }
    }
}

/// A type descriptor extracted from a loaded module, used by the
/// orchestration SDK to instantiate workflow executions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowTypeHandle {
    pub name: String,
    pub owner: ArtifactId,
}

impl WorkflowTypeHandle {
    pub fn new(name: impl Into<String>, owner: ArtifactId) -> Self {
        Self {
            name: name.into(),
            owner,
        }
    }
}

/// The complete set of tasks and workflows a loaded artifact (or the
/// baseline) contributes. Uniqueness is by declared name; on a name
/// collision within one reload, the last definition registered wins and a
/// warning is logged by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationSet {
    tasks: BTreeMap<String, TaskHandle>,
    workflows: BTreeMap<String, WorkflowTypeHandle>,
}

impl RegistrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.workflows.is_empty()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskHandle> {
        self.tasks.values()
    }

    pub fn workflows(&self) -> impl Iterator<Item = &WorkflowTypeHandle> {
        self.workflows.values()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.len()
    }

    /// Insert a task, returning `true` if it replaced an existing
    /// registration under the same name (caller should warn on `true`).
    pub fn insert_task(&mut self, task: TaskHandle) -> bool {
        self.tasks.insert(task.name.clone(), task).is_some()
    }

    /// Insert a workflow, returning `true` if it replaced an existing
    /// registration under the same name (caller should warn on `true`).
    pub fn insert_workflow(&mut self, workflow: WorkflowTypeHandle) -> bool {
        self.workflows
            .insert(workflow.name.clone(), workflow)
            .is_some()
    }

    /// Merge `other` into `self`. Names present in both collide: `other`'s
    /// definition wins ("last loaded wins"), and the colliding names are
    /// returned so the caller can log a warning per name.
    pub fn merge(&mut self, other: RegistrationSet) -> Vec<String> {
        let mut collisions = Vec::new();
        for (name, task) in other.tasks {
            if self.tasks.insert(name.clone(), task).is_some() {
                collisions.push(name);
            }
        }
        for (name, workflow) in other.workflows {
            if self.workflows.insert(name.clone(), workflow).is_some() {
                collisions.push(name);
            }
        }
        collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> ArtifactId {
        ArtifactId {
            id: "demo".into(),
            version: "1.0.0".into(),
        }
    }

    #[test]
    fn duplicate_task_name_last_wins_and_is_reported() {
        let mut set = RegistrationSet::new();
        assert!(!set.insert_task(TaskHandle::new("sendEmail", owner(), 1)));
        assert!(set.insert_task(TaskHandle::new("sendEmail", owner(), 2)));
        assert_eq!(set.task_count(), 1);
        assert_eq!(set.tasks().next().unwrap().input_types.len(), 2);
    }

    #[test]
    fn merge_reports_all_collisions() {
        let mut a = RegistrationSet::new();
        a.insert_task(TaskHandle::new("sendEmail", owner(), 1));
        a.insert_workflow(WorkflowTypeHandle::new("OnboardingWorkflow", owner()));

        let mut b = RegistrationSet::new();
        b.insert_task(TaskHandle::new("sendEmail", owner(), 2));
        b.insert_task(TaskHandle::new("saveData", owner(), 1));
        b.insert_workflow(WorkflowTypeHandle::new("OnboardingWorkflow", owner()));

        let collisions = a.merge(b);
        assert_eq!(collisions.len(), 2);
        assert!(collisions.contains(&"sendEmail".to_string()));
        assert!(collisions.contains(&"OnboardingWorkflow".to_string()));
        assert_eq!(a.task_count(), 2);
        assert_eq!(a.workflow_count(), 1);
    }

    #[test]
    fn empty_set_reports_empty() {
        assert!(RegistrationSet::new().is_empty());
    }
}
