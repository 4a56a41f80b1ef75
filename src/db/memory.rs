//! In-memory store backing all repository traits.
//!
//! Used by the test suites and by embedders that keep document metadata in
//! process. Writes go through the seeding helpers; the trait surface stays
//! read-only apart from the audit log.

use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{
    error::{DbError, DbResult},
    repos::{AuditLogRepo, DocumentPermissionRepo, DocumentRepo, GroupMembershipRepo},
};
use crate::models::{
    AuditLog, AuditLogQuery, CreateAuditLog, DocumentAccess, DocumentPermission, EntityType,
    GroupMembership, GroupRole, PermissionType,
};

#[derive(Default)]
struct Tables {
    documents: HashMap<Uuid, DocumentAccess>,
    group_admins: HashMap<Uuid, Uuid>,
    memberships: HashMap<(Uuid, Uuid), GroupRole>,
    /// Keyed by (document, entity type, entity); values are every granted level.
    permissions: BTreeMap<(Uuid, EntityType, Uuid), Vec<PermissionType>>,
    audit_logs: Vec<AuditLog>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    lookups: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&self, document: DocumentAccess) {
        self.tables.write().documents.insert(document.id, document);
    }

    pub fn remove_document(&self, id: Uuid) {
        self.tables.write().documents.remove(&id);
    }

    pub fn set_group_admin(&self, group_id: Uuid, user_id: Uuid) {
        self.tables.write().group_admins.insert(group_id, user_id);
    }

    pub fn add_member(&self, group_id: Uuid, user_id: Uuid, role: GroupRole) {
        self.tables
            .write()
            .memberships
            .insert((user_id, group_id), role);
    }

    pub fn remove_member(&self, group_id: Uuid, user_id: Uuid) {
        self.tables.write().memberships.remove(&(user_id, group_id));
    }

    pub fn grant(&self, document_id: Uuid, user_id: Uuid, permission_type: PermissionType) {
        let mut tables = self.tables.write();
        let levels = tables
            .permissions
            .entry((document_id, EntityType::User, user_id))
            .or_default();
        if !levels.contains(&permission_type) {
            levels.push(permission_type);
        }
    }

    pub fn revoke(&self, document_id: Uuid, user_id: Uuid) {
        self.tables
            .write()
            .permissions
            .remove(&(document_id, EntityType::User, user_id));
    }

    /// Make every subsequent lookup fail, simulating an unreachable backend.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of read lookups served so far (audit log access excluded).
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Snapshot of the recorded audit log, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditLog> {
        self.tables.read().audit_logs.clone()
    }

    pub(crate) fn check_available(&self) -> DbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::Internal("in-memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn begin_lookup(&self) -> DbResult<()> {
        self.check_available()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DocumentRepo for InMemoryStore {
    async fn get_access(&self, id: Uuid) -> DbResult<Option<DocumentAccess>> {
        self.begin_lookup()?;
        Ok(self.tables.read().documents.get(&id).cloned())
    }
}

#[async_trait]
impl GroupMembershipRepo for InMemoryStore {
    async fn get_membership(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> DbResult<Option<GroupMembership>> {
        self.begin_lookup()?;
        Ok(self
            .tables
            .read()
            .memberships
            .get(&(user_id, group_id))
            .map(|role| GroupMembership {
                user_id,
                group_id,
                role: *role,
            }))
    }

    async fn get_group_admin(&self, group_id: Uuid) -> DbResult<Option<Uuid>> {
        self.begin_lookup()?;
        Ok(self.tables.read().group_admins.get(&group_id).copied())
    }
}

#[async_trait]
impl DocumentPermissionRepo for InMemoryStore {
    async fn get_permission(
        &self,
        document_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> DbResult<Option<DocumentPermission>> {
        self.begin_lookup()?;
        let tables = self.tables.read();
        let strongest = tables
            .permissions
            .get(&(document_id, entity_type, entity_id))
            .and_then(|levels| levels.iter().max().copied());
        Ok(strongest.map(|permission_type| DocumentPermission {
            document_id,
            entity_type,
            entity_id,
            permission_type,
        }))
    }
}

#[async_trait]
impl AuditLogRepo for InMemoryStore {
    async fn create(&self, input: CreateAuditLog) -> DbResult<AuditLog> {
        self.check_available()?;
        let entry = AuditLog {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor_id: input.actor_id,
            action: input.action,
            resource_type: input.resource_type,
            resource_id: input.resource_id,
            details: input.details,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
        };
        self.tables.write().audit_logs.push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, query: AuditLogQuery) -> DbResult<Vec<AuditLog>> {
        self.check_available()?;
        let limit = query.effective_limit() as usize;
        let tables = self.tables.read();
        Ok(tables
            .audit_logs
            .iter()
            .rev()
            .filter(|log| query.actor_id.is_none_or(|id| log.actor_id == Some(id)))
            .filter(|log| query.action.as_ref().is_none_or(|a| &log.action == a))
            .filter(|log| query.resource_id.is_none_or(|id| log.resource_id == Some(id)))
            .filter(|log| query.from.is_none_or(|from| log.timestamp >= from))
            .take(limit)
            .cloned()
            .collect())
    }
}
