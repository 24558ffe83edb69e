//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;
use tessera_orm::backends::{ConnectionProvider, DatabaseConnection, DatabaseRow};
use tessera_orm::prelude::*;
use tessera_orm::SqliteProvider;
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct User {
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
    pub age: Option<i32>,
}

impl User {
    pub fn new(username: &str, email: &str, age: Option<i32>) -> Self {
        Self {
            id: None,
            username: username.to_string(),
            email: email.to_string(),
            age,
        }
    }
}

impl Entity for User {
    fn mapping() -> EntityMapping<Self> {
        EntityMapping::new()
            .table("users")
            .id(Column::new("id", |u: &User| u.id, |u, v| u.id = v)
                .generated(GenerationType::Identity))
            .column(
                Column::new("username", |u: &User| u.username.clone(), |u, v| u.username = v)
                    .not_null()
                    .unique()
                    .length(50),
            )
            .column(
                Column::new("email", |u: &User| u.email.clone(), |u, v| u.email = v)
                    .not_null()
                    .unique()
                    .length(100),
            )
            .column(Column::new("age", |u: &User| u.age, |u, v| u.age = v))
    }
}

#[derive(Debug, Default)]
pub struct Post {
    pub id: Option<i64>,
    pub title: String,
    pub user: Option<EntityRef<User>>,
}

impl Post {
    pub fn new(title: &str, user: Option<EntityRef<User>>) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            user,
        }
    }
}

impl Entity for Post {
    fn mapping() -> EntityMapping<Self> {
        EntityMapping::new()
            .table("posts")
            .id(Column::new("id", |p: &Post| p.id, |p, v| p.id = v)
                .generated(GenerationType::Identity))
            .column(Column::new("title", |p: &Post| p.title.clone(), |p, v| p.title = v).not_null())
            .relation(Relation::many_to_one("user", |p: &Post| p.user.clone(), |p, v| p.user = v))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub label: String,
}

impl Tag {
    pub fn new(label: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.to_string(),
        }
    }
}

impl Entity for Tag {
    fn mapping() -> EntityMapping<Self> {
        EntityMapping::new()
            .table("tags")
            .id(Column::new("id", |t: &Tag| t.id, |t, v| t.id = v))
            .column(Column::new("label", |t: &Tag| t.label.clone(), |t, v| t.label = v).not_null())
    }
}

#[derive(Debug, Default)]
pub struct Sticker {
    pub id: Option<i64>,
    pub tag: Option<EntityRef<Tag>>,
}

impl Entity for Sticker {
    fn mapping() -> EntityMapping<Self> {
        EntityMapping::new()
            .table("stickers")
            .id(Column::new("id", |s: &Sticker| s.id, |s, v| s.id = v)
                .generated(GenerationType::Identity))
            .relation(Relation::many_to_one("tag", |s: &Sticker| s.tag.clone(), |s, v| s.tag = v))
    }
}

/// A SQLite database file in a temporary directory
pub struct TestDb {
    pub dir: TempDir,
    pub provider: SqliteProvider,
}

impl TestDb {
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let provider = SqliteProvider::open(dir.path().join("orm.db")).unwrap();
        Self { dir, provider }
    }

    /// Users and posts, schema created on build
    pub fn configuration(&self) -> Configuration {
        Configuration::new()
            .dialect(DialectKind::Sqlite)
            .connection_provider(Arc::new(self.provider.clone()))
            .add_entity::<User>()
            .add_entity::<Post>()
            .set_property("orm.schema.auto", "create")
    }

    pub fn factory(&self) -> SessionFactory {
        self.configuration().build_session_factory().unwrap()
    }

    pub fn fetch(&self, sql: &str) -> Vec<DatabaseRow> {
        let mut conn: Box<dyn DatabaseConnection> = self.provider.acquire().unwrap();
        conn.fetch_all(sql, &[]).unwrap()
    }

    pub fn count(&self, table: &str) -> i64 {
        let rows = self.fetch(&format!("SELECT COUNT(*) FROM {}", table));
        rows[0].get_by_index(0).and_then(|v| v.as_i64()).unwrap()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
