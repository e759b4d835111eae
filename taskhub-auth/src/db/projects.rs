use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::FindOptions,
};
use std::{collections::HashMap, sync::Mutex};

use super::{lock_poisoned, MongoDb};
use crate::models::Project;
use crate::services::error::ServiceError;

#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn insert(&self, project: &Project) -> Result<(), ServiceError>;

    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>, ServiceError>;

    /// Projects of one workspace that list the user on their roster, newest first.
    async fn list_for_member_in_workspace(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Vec<Project>, ServiceError>;

    async fn update(
        &self,
        project_id: &str,
        changes: &ProjectChanges,
        at: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;

    async fn delete(&self, project_id: &str) -> Result<bool, ServiceError>;

    async fn delete_for_workspace(&self, workspace_id: &str) -> Result<u64, ServiceError>;
}

#[async_trait]
impl ProjectStore for MongoDb {
    async fn insert(&self, project: &Project) -> Result<(), ServiceError> {
        self.projects().insert_one(project, None).await?;
        Ok(())
    }

    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>, ServiceError> {
        Ok(self
            .projects()
            .find_one(doc! { "_id": project_id }, None)
            .await?)
    }

    async fn list_for_member_in_workspace(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Vec<Project>, ServiceError> {
        let mut filter = doc! { "workspace_id": workspace_id };
        filter.insert(format!("members.{}", user_id), doc! { "$exists": true });
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let mut cursor = self.projects().find(filter, options).await?;
        let mut projects = Vec::new();
        while cursor.advance().await? {
            projects.push(cursor.deserialize_current()?);
        }
        Ok(projects)
    }

    async fn update(
        &self,
        project_id: &str,
        changes: &ProjectChanges,
        at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut set = doc! { "updated_at": BsonDateTime::from_chrono(at) };
        if let Some(title) = &changes.title {
            set.insert("title", title.as_str());
        }
        if let Some(description) = &changes.description {
            set.insert("description", description.as_str());
        }

        let result = self
            .projects()
            .update_one(doc! { "_id": project_id }, doc! { "$set": set }, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete(&self, project_id: &str) -> Result<bool, ServiceError> {
        let result = self
            .projects()
            .delete_one(doc! { "_id": project_id }, None)
            .await?;
        Ok(result.deleted_count == 1)
    }

    async fn delete_for_workspace(&self, workspace_id: &str) -> Result<u64, ServiceError> {
        let result = self
            .projects()
            .delete_many(doc! { "workspace_id": workspace_id }, None)
            .await?;
        Ok(result.deleted_count)
    }
}

#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: Mutex<HashMap<String, Project>>,
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn insert(&self, project: &Project) -> Result<(), ServiceError> {
        let mut projects = self.projects.lock().map_err(lock_poisoned)?;
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn find_by_id(&self, project_id: &str) -> Result<Option<Project>, ServiceError> {
        let projects = self.projects.lock().map_err(lock_poisoned)?;
        Ok(projects.get(project_id).cloned())
    }

    async fn list_for_member_in_workspace(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Vec<Project>, ServiceError> {
        let projects = self.projects.lock().map_err(lock_poisoned)?;
        let mut found: Vec<Project> = projects
            .values()
            .filter(|p| p.workspace_id == workspace_id && p.members.contains_key(user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update(
        &self,
        project_id: &str,
        changes: &ProjectChanges,
        at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let mut projects = self.projects.lock().map_err(lock_poisoned)?;
        let Some(project) = projects.get_mut(project_id) else {
            return Ok(false);
        };

        if let Some(title) = &changes.title {
            project.title = title.clone();
        }
        if let Some(description) = &changes.description {
            project.description = Some(description.clone());
        }
        project.updated_at = at;
        Ok(true)
    }

    async fn delete(&self, project_id: &str) -> Result<bool, ServiceError> {
        let mut projects = self.projects.lock().map_err(lock_poisoned)?;
        Ok(projects.remove(project_id).is_some())
    }

    async fn delete_for_workspace(&self, workspace_id: &str) -> Result<u64, ServiceError> {
        let mut projects = self.projects.lock().map_err(lock_poisoned)?;
        let before = projects.len();
        projects.retain(|_, p| p.workspace_id != workspace_id);
        Ok((before - projects.len()) as u64)
    }
}
