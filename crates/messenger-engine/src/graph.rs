// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow graph lookups.
//!
//! Steps link to each other by `step_ref`: a picked choice names its target,
//! otherwise the step's default successor applies, and a step with neither
//! ends the conversation. Dangling references are configuration errors.

use std::sync::Arc;

use messenger_core::types::{Module, ValidationFormat, Workflow, WorkflowStep};
use messenger_core::{MessengerError, StorageAdapter};

/// Where a conversation goes after an accepted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    Step(WorkflowStep),
    Terminal,
}

#[derive(Clone)]
pub struct WorkflowGraph {
    storage: Arc<dyn StorageAdapter>,
}

impl WorkflowGraph {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    pub async fn active_workflow(&self) -> Result<Workflow, MessengerError> {
        self.storage
            .get_active_workflow()
            .await?
            .ok_or_else(|| MessengerError::workflow("no active workflow"))
    }

    pub async fn entry_step(&self, workflow_id: &str) -> Result<WorkflowStep, MessengerError> {
        self.storage
            .get_entry_step(workflow_id)
            .await?
            .ok_or_else(|| {
                MessengerError::workflow(format!("workflow {workflow_id} has no entry step"))
            })
    }

    pub async fn step(
        &self,
        workflow_id: &str,
        step_ref: &str,
    ) -> Result<WorkflowStep, MessengerError> {
        self.storage
            .get_step(workflow_id, step_ref)
            .await?
            .ok_or_else(|| {
                MessengerError::workflow(format!(
                    "workflow {workflow_id} has no step `{step_ref}`"
                ))
            })
    }

    /// The active module a step renders.
    pub async fn module(&self, step: &WorkflowStep) -> Result<Module, MessengerError> {
        let module = self
            .storage
            .get_module_by_ref(&step.module_ref)
            .await?
            .ok_or_else(|| {
                MessengerError::workflow(format!(
                    "step `{}` references unknown module `{}`",
                    step.step_ref, step.module_ref
                ))
            })?;
        if !module.is_active {
            return Err(MessengerError::workflow(format!(
                "step `{}` references inactive module `{}`",
                step.step_ref, step.module_ref
            )));
        }
        Ok(module)
    }

    /// The validation format of a validated-field module, `None` for other types.
    pub async fn format_for(
        &self,
        module: &Module,
    ) -> Result<Option<ValidationFormat>, MessengerError> {
        let Some(code) = module.definition.validation_format_code() else {
            return Ok(None);
        };
        let format = self.storage.get_validation_format(code).await?;
        match format {
            Some(format) if format.is_active => Ok(Some(format)),
            Some(_) => Err(MessengerError::workflow(format!(
                "module `{}` references inactive validation format `{code}`",
                module.ref_code
            ))),
            None => Err(MessengerError::workflow(format!(
                "module `{}` references unknown validation format `{code}`",
                module.ref_code
            ))),
        }
    }

    /// Resolves the successor of `current`: the choice target, then the
    /// step default, then terminal.
    pub async fn resolve_next(
        &self,
        current: &WorkflowStep,
        choice_next: Option<&str>,
    ) -> Result<NextStep, MessengerError> {
        let target = choice_next
            .filter(|r| !r.trim().is_empty())
            .or(current.next_step_ref.as_deref().filter(|r| !r.trim().is_empty()));
        match target {
            Some(step_ref) => Ok(NextStep::Step(
                self.step(&current.workflow_id, step_ref).await?,
            )),
            None => Ok(NextStep::Terminal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messenger_config::model::StorageConfig;
    use messenger_core::types::{
        Choice, LocalizedText, Locale, ModuleDefinition, ModuleDraft, StepDraft, WorkflowDraft,
    };
    use messenger_storage::SqliteStorage;
    use tempfile::TempDir;

    async fn storage() -> (TempDir, Arc<SqliteStorage>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("graph.db").to_str().unwrap().to_string(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        (dir, Arc::new(storage))
    }

    fn step(step_ref: &str, next: Option<&str>) -> StepDraft {
        StepDraft {
            step_ref: step_ref.into(),
            step_name: step_ref.into(),
            module_ref: "PICK".into(),
            is_entry_point: false,
            order_index: None,
            next_step_ref: next.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn missing_active_workflow_is_a_configuration_error() {
        let (_dir, storage) = storage().await;
        let graph = WorkflowGraph::new(storage);
        assert!(matches!(
            graph.active_workflow().await,
            Err(MessengerError::WorkflowConfig(_))
        ));
    }

    #[tokio::test]
    async fn successor_precedence() {
        let (_dir, storage) = storage().await;
        let workflow = storage
            .create_workflow(&WorkflowDraft {
                name: "Booking".into(),
                description: None,
                is_active: true,
            })
            .await
            .unwrap();
        storage
            .create_module(&ModuleDraft {
                ref_code: "PICK".into(),
                name: "Pick".into(),
                content: LocalizedText::single(Locale::En, "Pick"),
                params: serde_json::Value::Null,
                definition: ModuleDefinition::Choice {
                    choices: vec![Choice {
                        id: "a".into(),
                        label: LocalizedText::single(Locale::En, "A"),
                        next_step_ref: Some("X".into()),
                    }],
                },
                custom_error_message: None,
                success_message: None,
                failure_message: None,
                category: "general".into(),
                is_active: true,
            })
            .await
            .unwrap();
        let start = storage
            .create_step(&workflow.id, &step("START", Some("Y")))
            .await
            .unwrap();
        storage.create_step(&workflow.id, &step("X", None)).await.unwrap();
        let y = storage.create_step(&workflow.id, &step("Y", None)).await.unwrap();

        let graph = WorkflowGraph::new(storage.clone());
        assert_eq!(graph.entry_step(&workflow.id).await.unwrap().step_ref, "START");

        let NextStep::Step(next) = graph.resolve_next(&start, Some("X")).await.unwrap() else {
            panic!("expected a step");
        };
        assert_eq!(next.step_ref, "X");
        let NextStep::Step(next) = graph.resolve_next(&start, None).await.unwrap() else {
            panic!("expected a step");
        };
        assert_eq!(next.step_ref, "Y");
        assert_eq!(
            graph.resolve_next(&y, None).await.unwrap(),
            NextStep::Terminal
        );
        assert!(matches!(
            graph.resolve_next(&y, Some("GONE")).await,
            Err(MessengerError::WorkflowConfig(_))
        ));
        assert!(graph.module(&start).await.unwrap().definition.choices().is_some());
    }
}
