// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ShambaLink

//! Crowdfunding projects: goal, running total, and the backer roll.
//!
//! Crediting is idempotent per payment reference, so a replayed
//! crowdfunding outcome can never inflate `raised_amount`.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::db::{LedgerDb, LedgerError, LedgerResult, PROJECTS};

/// One successful contribution to a project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BackerEntry {
    pub payer_id: String,
    /// Major units.
    pub amount: u64,
    /// Payment reference; the idempotency key for this entry.
    pub reference: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectRecord {
    pub project_id: String,
    pub farmer_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Major units.
    pub goal_amount: u64,
    /// Σ backer amounts; derived from the roll, never set directly.
    pub raised_amount: u64,
    pub currency: String,
    pub backers: Vec<BackerEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(
        farmer_id: String,
        title: String,
        description: Option<String>,
        goal_amount: u64,
        currency: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            project_id: Uuid::new_v4().to_string(),
            farmer_id,
            title,
            description,
            goal_amount,
            raised_amount: 0,
            currency: currency.to_ascii_uppercase(),
            backers: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of crediting a payment to a project.
#[derive(Debug)]
pub enum ProjectCredit {
    Applied(ProjectRecord),
    /// This payment reference is already on the backer roll.
    AlreadyApplied(ProjectRecord),
}

impl LedgerDb {
    pub fn create_project(&self, record: &ProjectRecord) -> LedgerResult<()> {
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PROJECTS)?;
            if table.get(record.project_id.as_str())?.is_some() {
                return Err(LedgerError::AlreadyExists(format!(
                    "project {}",
                    record.project_id
                )));
            }
            table.insert(record.project_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_project(&self, project_id: &str) -> LedgerResult<Option<ProjectRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROJECTS)?;
        match table.get(project_id)? {
            Some(value) => {
                let record: ProjectRecord = serde_json::from_slice(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Append a backer entry and bump the raised total, unless this
    /// payment reference was already credited.
    pub fn credit_project(
        &self,
        project_id: &str,
        entry: BackerEntry,
    ) -> LedgerResult<ProjectCredit> {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(PROJECTS)?;
            let existing_bytes = {
                let existing = table
                    .get(project_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("project {project_id}")))?;
                existing.value().to_vec()
            };
            let mut record: ProjectRecord = serde_json::from_slice(&existing_bytes)?;

            if record.backers.iter().any(|b| b.reference == entry.reference) {
                return Ok(ProjectCredit::AlreadyApplied(record));
            }

            record.raised_amount += entry.amount;
            record.backers.push(entry);
            record.updated_at = Utc::now();

            let json = serde_json::to_vec(&record)?;
            table.insert(project_id, json.as_slice())?;
            record
        };
        write_txn.commit()?;
        Ok(ProjectCredit::Applied(updated))
    }

    /// All projects, newest first.
    pub fn list_projects(&self) -> LedgerResult<Vec<ProjectRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROJECTS)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: ProjectRecord = serde_json::from_slice(value.value())?;
            records.push(record);
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
