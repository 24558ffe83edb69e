mod common;

use std::sync::Arc;

use common::{Post, TestDb, User};
use tessera_orm::prelude::*;
use tessera_orm::SqliteProvider;

#[test]
fn test_sqlite_url_builds_provider_and_dialect() {
    common::init_tracing();
    let factory = Configuration::new()
        .database("sqlite::memory:")
        .add_entity::<User>()
        .add_entity::<User>()
        .set_property("orm.schema.auto", "create")
        .build_session_factory()
        .unwrap();

    assert_eq!(factory.dialect().kind(), DialectKind::Sqlite);
    assert_eq!(factory.registry().len(), 1);
    assert_eq!(factory.metadata::<User>().unwrap().table_name(), "users");
    assert!(factory.metadata::<Post>().is_err());

    let mut session = factory.open_session().unwrap();
    session.save(&EntityRef::new(User::new("m", "m@x.com", None))).unwrap();
    assert_eq!(session.find_all::<User>().unwrap().len(), 1);
}

#[test]
fn test_unregistered_entity_is_mapping_error() {
    let db = TestDb::new();
    let factory = Configuration::new()
        .dialect(DialectKind::Sqlite)
        .connection_provider(Arc::new(db.provider.clone()))
        .add_entity::<User>()
        .build_session_factory()
        .unwrap();

    let mut session = factory.open_session().unwrap();
    let err = session.find_by_id::<Post>(1_i64).unwrap_err();
    assert!(matches!(err, OrmError::Mapping { .. }));
}

#[test]
fn test_invalid_property_fails_factory_build() {
    let db = TestDb::new();
    let err = db
        .configuration()
        .set_property("orm.quote_identifiers", "sometimes")
        .build_session_factory()
        .unwrap_err();
    assert!(matches!(err, OrmError::Configuration(_)));
}

#[test]
fn test_current_session_reuses_open_session() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut context = SessionContext::new();

    let first = factory.current_session(&mut context).unwrap().id();
    let again = factory.current_session(&mut context).unwrap().id();
    assert_eq!(first, again);

    context.current().unwrap().close();
    let replaced = factory.current_session(&mut context).unwrap().id();
    assert_ne!(first, replaced);

    context.close();
    assert!(!context.has_session());
}

#[test]
fn test_context_session_from_other_factory_is_replaced() {
    let db = TestDb::new();
    let first_factory = db.factory();
    let second_factory = db.configuration().set_property("orm.schema.auto", "none").build_session_factory().unwrap();
    let mut context = SessionContext::new();

    let first = first_factory.current_session(&mut context).unwrap().id();
    let second = second_factory.current_session(&mut context).unwrap().id();
    assert_ne!(first, second);
}

#[test]
fn test_close_force_closes_sessions() {
    let db = TestDb::new();
    let factory = db.factory();

    let mut busy = factory.open_session().unwrap();
    let tx = busy.begin_transaction().unwrap();
    busy.save(&EntityRef::new(User::new("z", "z@x.com", None))).unwrap();
    let idle = factory.open_session().unwrap();
    assert_eq!(factory.open_session_count(), 2);

    factory.close();
    factory.close();

    assert!(factory.is_closed());
    assert!(!busy.is_open());
    assert!(!idle.is_open());
    assert_eq!(tx.status(), TransactionStatus::RolledBack);
    assert_eq!(db.count("users"), 0);
    assert!(matches!(factory.open_session().unwrap_err(), OrmError::FactoryClosed));
}

#[test]
fn test_closing_session_deregisters_it() {
    let db = TestDb::new();
    let factory = db.factory();
    let session = factory.open_session().unwrap();
    assert_eq!(factory.open_session_count(), 1);
    drop(session);
    assert_eq!(factory.open_session_count(), 0);
}

#[test]
fn test_recreate_schema_drops_data() {
    let db = TestDb::new();
    let factory = db.factory();
    {
        let mut session = factory.open_session().unwrap();
        session.save(&EntityRef::new(User::new("y", "y@x.com", None))).unwrap();
    }
    assert_eq!(db.count("users"), 1);

    factory.schema().recreate_schema().unwrap();
    assert_eq!(db.count("users"), 0);
}

#[test]
fn test_quoted_identifiers_round_trip() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let provider = SqliteProvider::open(dir.path().join("quoted.db")).unwrap();
    let factory = Configuration::new()
        .dialect(DialectKind::Sqlite)
        .connection_provider(Arc::new(provider))
        .add_entity::<User>()
        .set_property("orm.schema.auto", "create")
        .set_property("orm.quote_identifiers", "true")
        .build_session_factory()
        .unwrap();

    assert!(factory.schema().create_schema_sql()[0].starts_with("CREATE TABLE \"users\""));
    let mut session = factory.open_session().unwrap();
    let user = EntityRef::new(User::new("q", "q@x.com", Some(3)));
    session.save(&user).unwrap();
    session.clear();
    let id = user.read().id.unwrap();
    assert_eq!(session.find_by_id::<User>(id).unwrap().unwrap().read().age, Some(3));
}
