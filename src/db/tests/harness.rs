//! Test harness for database repository testing
//!
//! Provides utilities for setting up test databases:
//! - SQLite: Fast in-memory databases with real migrations
//! - PostgreSQL: Testcontainers-based instances with real migrations
//!
//! The repositories under test are read-only, so rows are seeded with raw SQL
//! through [`Fixtures`].

#[cfg(feature = "database-sqlite")]
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{AccessType, GroupRole, PermissionType, SystemRole};

/// Create an in-memory SQLite pool for testing
#[cfg(feature = "database-sqlite")]
pub async fn create_sqlite_pool() -> SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

/// Run SQLite migrations on the pool
///
/// Uses the actual migration files to ensure tests match production schema
#[cfg(feature = "database-sqlite")]
pub async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations_sqlx/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}

/// Raw-SQL seeding for the tables the authorization repositories read.
pub enum Fixtures {
    #[cfg(feature = "database-sqlite")]
    Sqlite(SqlitePool),
    #[cfg(feature = "database-postgres")]
    Postgres(sqlx::PgPool),
}

impl Fixtures {
    pub async fn user(&self, role: SystemRole) -> Uuid {
        let id = Uuid::new_v4();
        match self {
            #[cfg(feature = "database-sqlite")]
            Fixtures::Sqlite(pool) => {
                sqlx::query("INSERT INTO users (id, email, role) VALUES (?, ?, ?)")
                    .bind(id.to_string())
                    .bind(format!("{}@example.com", id.simple()))
                    .bind(role.as_str())
                    .execute(pool)
                    .await
                    .expect("Failed to insert user");
            }
            #[cfg(feature = "database-postgres")]
            Fixtures::Postgres(pool) => {
                sqlx::query("INSERT INTO users (id, email, role) VALUES ($1, $2, $3)")
                    .bind(id)
                    .bind(format!("{}@example.com", id.simple()))
                    .bind(role.as_str())
                    .execute(pool)
                    .await
                    .expect("Failed to insert user");
            }
        }
        id
    }

    pub async fn group(&self, admin: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        match self {
            #[cfg(feature = "database-sqlite")]
            Fixtures::Sqlite(pool) => {
                sqlx::query("INSERT INTO groups (id, name, group_admin_id) VALUES (?, ?, ?)")
                    .bind(id.to_string())
                    .bind("Research")
                    .bind(admin.map(|a| a.to_string()))
                    .execute(pool)
                    .await
                    .expect("Failed to insert group");
            }
            #[cfg(feature = "database-postgres")]
            Fixtures::Postgres(pool) => {
                sqlx::query("INSERT INTO groups (id, name, group_admin_id) VALUES ($1, $2, $3)")
                    .bind(id)
                    .bind("Research")
                    .bind(admin)
                    .execute(pool)
                    .await
                    .expect("Failed to insert group");
            }
        }
        id
    }

    pub async fn member(&self, group_id: Uuid, user_id: Uuid, role: GroupRole) {
        match self {
            #[cfg(feature = "database-sqlite")]
            Fixtures::Sqlite(pool) => {
                sqlx::query("INSERT INTO group_members (user_id, group_id, role) VALUES (?, ?, ?)")
                    .bind(user_id.to_string())
                    .bind(group_id.to_string())
                    .bind(role.as_str())
                    .execute(pool)
                    .await
                    .expect("Failed to insert group member");
            }
            #[cfg(feature = "database-postgres")]
            Fixtures::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO group_members (user_id, group_id, role) VALUES ($1, $2, $3)",
                )
                .bind(user_id)
                .bind(group_id)
                .bind(role.as_str())
                .execute(pool)
                .await
                .expect("Failed to insert group member");
            }
        }
    }

    pub async fn document(
        &self,
        access_type: AccessType,
        owner: Option<Uuid>,
        group_id: Option<Uuid>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        match self {
            #[cfg(feature = "database-sqlite")]
            Fixtures::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO documents (id, title, access_type, created_by, group_id) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(id.to_string())
                .bind("Quarterly report")
                .bind(access_type.as_str())
                .bind(owner.map(|o| o.to_string()))
                .bind(group_id.map(|g| g.to_string()))
                .execute(pool)
                .await
                .expect("Failed to insert document");
            }
            #[cfg(feature = "database-postgres")]
            Fixtures::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO documents (id, title, access_type, created_by, group_id) VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(id)
                .bind("Quarterly report")
                .bind(access_type.as_str())
                .bind(owner)
                .bind(group_id)
                .execute(pool)
                .await
                .expect("Failed to insert document");
            }
        }
        id
    }

    pub async fn grant(&self, document_id: Uuid, user_id: Uuid, permission: PermissionType) {
        match self {
            #[cfg(feature = "database-sqlite")]
            Fixtures::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO document_permissions (document_id, entity_type, entity_id, permission_type) VALUES (?, 'USER', ?, ?)",
                )
                .bind(document_id.to_string())
                .bind(user_id.to_string())
                .bind(permission.as_str())
                .execute(pool)
                .await
                .expect("Failed to insert document permission");
            }
            #[cfg(feature = "database-postgres")]
            Fixtures::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO document_permissions (document_id, entity_type, entity_id, permission_type) VALUES ($1, 'USER', $2, $3)",
                )
                .bind(document_id)
                .bind(user_id)
                .bind(permission.as_str())
                .execute(pool)
                .await
                .expect("Failed to insert document permission");
            }
        }
    }

    pub async fn delete_user(&self, user_id: Uuid) {
        match self {
            #[cfg(feature = "database-sqlite")]
            Fixtures::Sqlite(pool) => {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(user_id.to_string())
                    .execute(pool)
                    .await
                    .expect("Failed to delete user");
            }
            #[cfg(feature = "database-postgres")]
            Fixtures::Postgres(pool) => {
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(user_id)
                    .execute(pool)
                    .await
                    .expect("Failed to delete user");
            }
        }
    }
}

/// PostgreSQL test harness using testcontainers
#[cfg(all(test, feature = "database-postgres"))]
pub mod postgres {
    use std::sync::OnceLock;

    use sqlx::PgPool;
    use testcontainers_modules::{
        postgres::Postgres,
        testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner},
    };
    use tokio::sync::OnceCell;

    /// Shared container state - initialized once per test run
    struct SharedContainer {
        #[allow(dead_code)] // Test infrastructure: keeps container alive
        container: ContainerAsync<Postgres>,
        connection_string: String,
    }

    static SHARED_CONTAINER: OnceLock<OnceCell<SharedContainer>> = OnceLock::new();

    async fn get_shared_container() -> &'static SharedContainer {
        let cell = SHARED_CONTAINER.get_or_init(OnceCell::new);
        cell.get_or_init(|| async {
            let container = Postgres::default()
                .with_tag("17-alpine")
                .start()
                .await
                .expect("Failed to start PostgreSQL container");

            let host = container.get_host().await.expect("Failed to get host");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("Failed to get port");

            SharedContainer {
                container,
                connection_string: format!(
                    "postgres://postgres:postgres@{}:{}/postgres",
                    host, port
                ),
            }
        })
        .await
    }

    /// Create a pool bound to a fresh schema inside the shared container.
    ///
    /// Each test gets its own schema with fresh migrations, so tests stay
    /// isolated without paying container startup per test.
    pub async fn create_isolated_postgres_pool() -> PgPool {
        let shared = get_shared_container().await;

        let admin_pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&shared.connection_string)
            .await
            .expect("Failed to connect to PostgreSQL");

        let schema_name = format!("test_{}", uuid::Uuid::new_v4().simple());
        sqlx::query(&format!("CREATE SCHEMA \"{}\"", schema_name))
            .execute(&admin_pool)
            .await
            .expect("Failed to create test schema");

        let isolated_url = format!(
            "{}?options=-c search_path={}",
            shared.connection_string, schema_name
        );

        sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&isolated_url)
            .await
            .expect("Failed to connect to isolated schema")
    }

    pub async fn run_postgres_migrations(pool: &PgPool) {
        sqlx::migrate!("./migrations_sqlx/postgres")
            .run(pool)
            .await
            .expect("Failed to run PostgreSQL migrations");
    }
}
