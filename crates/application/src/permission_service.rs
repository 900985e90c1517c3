//! Permission catalog ports, the startup registry, and the catalog service.
//!
//! Subsystems announce the permissions they enforce at startup. The registry
//! reconciles each announcement against the stored catalog and keeps an
//! in-process cache so repeated announcements of an unchanged set skip the
//! store entirely.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gateward_core::{AppError, AppResult};
use gateward_domain::{GroupId, Permission, PermissionId, Permissions, UserId};

use crate::actor_resolver::ActorResolver;
use crate::auth_service::CallContext;
use crate::firewall;
use crate::reconciliation::RegistryDiff;

const DEFAULT_LIST_LIMIT: i64 = 10;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// A stored catalog permission.
#[derive(Debug, Clone, Default)]
pub struct PermissionRecord {
    /// Unique permission identifier.
    pub id: PermissionId,
    /// Subsystem segment of the triple.
    pub subsystem: String,
    /// Module segment of the triple.
    pub module: String,
    /// Action segment of the triple.
    pub action: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: Option<DateTime<Utc>>,
}

impl PermissionRecord {
    /// Renders the stored triple as a permission value.
    #[must_use]
    pub fn permission(&self) -> Permission {
        Permission::new(format!(
            "{}:{}:{}",
            self.subsystem, self.module, self.action
        ))
    }
}

/// Listing constraints for catalog queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionFilter {
    /// Restricts rows by subsystem segment.
    pub subsystem: Option<String>,
    /// Restricts rows by module segment.
    pub module: Option<String>,
    /// Restricts rows by action segment.
    pub action: Option<String>,
    /// Number of rows to skip.
    pub offset: i64,
    /// Maximum number of rows to return.
    pub limit: i64,
}

/// Repository port for the permission catalog.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Finds a catalog row by its identifier.
    async fn find_by_id(&self, id: PermissionId) -> AppResult<Option<PermissionRecord>>;

    /// Lists catalog rows matching the filter.
    async fn find(&self, filter: &PermissionFilter) -> AppResult<Vec<PermissionRecord>>;

    /// Collects the permissions granted to a user, directly or via groups.
    async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Permissions>;

    /// Collects the permissions granted to a group.
    async fn find_by_group_id(&self, group_id: GroupId) -> AppResult<Permissions>;

    /// Reconciles the subsystem's catalog rows against the given set.
    ///
    /// Rows in the set but not the catalog are inserted, rows in both are
    /// left alone, and rows the catalog holds for the subsystem but the set
    /// no longer names are removed.
    async fn register(&self, subsystem: &str, permissions: &Permissions)
    -> AppResult<RegistryDiff>;

    /// Inserts the catalog rows missing for the given set. Returns the
    /// number of rows inserted.
    async fn insert_missing(&self, permissions: &Permissions) -> AppResult<i64>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Reconciles subsystem permission announcements against the catalog.
///
/// Clones share the cache, so one registry instance per process is enough
/// regardless of how many services hold it.
#[derive(Clone)]
pub struct PermissionRegistry {
    repository: Arc<dyn PermissionRepository>,
    known: Arc<RwLock<HashSet<Permission>>>,
}

impl PermissionRegistry {
    /// Creates a registry with an empty cache.
    #[must_use]
    pub fn new(repository: Arc<dyn PermissionRepository>) -> Self {
        Self {
            repository,
            known: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Registers the given permissions, all of one subsystem.
    ///
    /// When every permission is already known to the cache the store is not
    /// touched and a zero diff is returned. The cache is extended only after
    /// the store reports success, so a failed announcement is retried in
    /// full on the next call.
    pub async fn register(&self, permissions: &Permissions) -> AppResult<RegistryDiff> {
        let subsystem = registration_subsystem(permissions)?;

        {
            let known = self.known.read().unwrap_or_else(PoisonError::into_inner);
            if permissions.iter().all(|permission| known.contains(permission)) {
                return Ok(RegistryDiff::default());
            }
        }

        let diff = self.repository.register(&subsystem, permissions).await?;

        let mut known = self.known.write().unwrap_or_else(PoisonError::into_inner);
        for permission in permissions.iter() {
            known.insert(permission.clone());
        }

        Ok(diff)
    }
}

/// Extracts the single subsystem the permissions belong to.
fn registration_subsystem(permissions: &Permissions) -> AppResult<String> {
    let mut subsystem: Option<&str> = None;
    for permission in permissions.iter() {
        let candidate = permission.subsystem();
        if candidate.is_empty() {
            return Err(AppError::Validation(
                "subsystem name is empty string, permissions cannot be registered".to_owned(),
            ));
        }
        match subsystem {
            None => subsystem = Some(candidate),
            Some(existing) if existing != candidate => {
                return Err(AppError::Validation(
                    "provided permissions do not belong to one subsystem, permissions cannot be registered"
                        .to_owned(),
                ));
            }
            Some(_) => {}
        }
    }

    let Some(subsystem) = subsystem else {
        return Err(AppError::Validation(
            "empty slice, permissions cannot be registered".to_owned(),
        ));
    };

    Ok(subsystem.to_owned())
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service for the permission catalog.
#[derive(Clone)]
pub struct PermissionService {
    permission_repository: Arc<dyn PermissionRepository>,
    registry: PermissionRegistry,
    actor_resolver: ActorResolver,
}

impl PermissionService {
    /// Creates a new permission service.
    #[must_use]
    pub fn new(
        permission_repository: Arc<dyn PermissionRepository>,
        registry: PermissionRegistry,
        actor_resolver: ActorResolver,
    ) -> Self {
        Self {
            permission_repository,
            registry,
            actor_resolver,
        }
    }

    /// Registers a subsystem's permissions.
    ///
    /// Announcements carry no actor. Subsystems call this on startup over
    /// trusted channels, before any session exists.
    pub async fn register(&self, permissions: &Permissions) -> AppResult<RegistryDiff> {
        self.registry.register(permissions).await
    }

    /// Retrieves a single catalog permission.
    pub async fn get(&self, ctx: &CallContext, permission_id: i64) -> AppResult<PermissionRecord> {
        if permission_id < 1 {
            return Err(AppError::Validation(
                "permission id needs to be greater than zero".to_owned(),
            ));
        }

        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_retrieve_permission(&actor)?;

        self.permission_repository
            .find_by_id(PermissionId::from_i64(permission_id))
            .await?
            .ok_or_else(|| AppError::NotFound("permission does not exists".to_owned()))
    }

    /// Lists catalog permissions matching the filter.
    pub async fn list(
        &self,
        ctx: &CallContext,
        filter: PermissionFilter,
    ) -> AppResult<Vec<PermissionRecord>> {
        let actor = self.actor_resolver.resolve(ctx).await?;
        firewall::can_list_permissions(&actor)?;

        let mut filter = filter;
        if filter.limit == 0 {
            filter.limit = DEFAULT_LIST_LIMIT;
        }

        self.permission_repository.find(&filter).await
    }
}
