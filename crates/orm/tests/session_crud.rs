mod common;

use common::{Sticker, Tag, TestDb, User};
use tessera_orm::prelude::*;
use tessera_orm::ErrorKind;

#[test]
fn test_create_schema_builds_users_table() {
    let db = TestDb::new();
    let _factory = db.factory();

    let columns: Vec<String> = db
        .fetch("PRAGMA table_info(users)")
        .iter()
        .map(|row| row.get_by_name("name").and_then(|v| v.as_str()).unwrap().to_string())
        .collect();
    assert_eq!(columns, vec!["id", "username", "email", "age"]);

    let pk: Vec<i64> = db
        .fetch("PRAGMA table_info(users)")
        .iter()
        .map(|row| row.get_by_name("pk").and_then(|v| v.as_i64()).unwrap())
        .collect();
    assert_eq!(pk, vec![1, 0, 0, 0]);

    let unique_constraints = db
        .fetch("PRAGMA index_list(users)")
        .iter()
        .filter(|row| row.get_by_name("origin").and_then(|v| v.as_str()) == Some("u"))
        .count();
    assert_eq!(unique_constraints, 2);
}

#[test]
fn test_save_then_find_returns_field_equal_user() {
    let db = TestDb::new();
    let factory = db.factory();

    let mut session = factory.open_session().unwrap();
    let alice = EntityRef::new(User::new("alice", "a@x.com", Some(28)));
    session.save(&alice).unwrap();
    let id = alice.read().id.expect("generated id");

    // same session: the cached instance itself
    let cached = session.find_by_id::<User>(id).unwrap().unwrap();
    assert!(EntityRef::ptr_eq(&cached, &alice));

    // fresh session: an equal but distinct instance
    let mut other = factory.open_session().unwrap();
    let loaded = other.find_by_id::<User>(id).unwrap().unwrap();
    assert!(!EntityRef::ptr_eq(&loaded, &alice));
    assert_eq!(*loaded.read(), *alice.read());
}

#[test]
fn test_crud_round_trip() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();

    assert!(session.find_by_id::<User>(1_i64).unwrap().is_none());

    let bob = EntityRef::new(User::new("bob", "b@x.com", None));
    session.save(&bob).unwrap();
    let id = bob.read().id.unwrap();
    assert!(session.find_by_id::<User>(id).unwrap().is_some());

    bob.write().age = Some(41);
    bob.write().email = "bob@x.com".to_string();
    session.update(&bob).unwrap();

    let mut fresh = factory.open_session().unwrap();
    let loaded = fresh.find_by_id::<User>(id).unwrap().unwrap();
    assert_eq!(loaded.read().age, Some(41));
    assert_eq!(loaded.read().email, "bob@x.com");

    session.delete(&bob).unwrap();
    assert!(!session.contains::<User>(id));
    assert!(session.find_by_id::<User>(id).unwrap().is_none());
    assert_eq!(db.count("users"), 0);
}

#[test]
fn test_repeated_lookups_share_one_instance() {
    let db = TestDb::new();
    let factory = db.factory();
    {
        let mut seed = factory.open_session().unwrap();
        seed.save(&EntityRef::new(User::new("carol", "c@x.com", Some(30)))).unwrap();
    }

    let mut session = factory.open_session().unwrap();
    let first = session.find_by_id::<User>(1_i64).unwrap().unwrap();
    let second = session.find_by_id::<User>(1_i32).unwrap().unwrap();
    assert!(EntityRef::ptr_eq(&first, &second));
    assert_eq!(session.cache_size(), 1);

    // find_all hands out the cached instance too
    let all = session.find_all::<User>().unwrap();
    assert_eq!(all.len(), 1);
    assert!(EntityRef::ptr_eq(&all[0], &first));

    session.clear();
    assert_eq!(session.cache_size(), 0);
    let third = session.find_by_id::<User>(1_i64).unwrap().unwrap();
    assert!(!EntityRef::ptr_eq(&first, &third));
}

#[test]
fn test_uuid_keys_share_one_instance() {
    let db = TestDb::new();
    let factory = db
        .configuration()
        .add_entity::<Tag>()
        .add_entity::<Sticker>()
        .build_session_factory()
        .unwrap();
    let mut session = factory.open_session().unwrap();

    let tag = EntityRef::new(Tag::new("rust"));
    session.save(&tag).unwrap();
    let id = tag.read().id;

    // SQLite hands the key back as text
    let all = session.find_all::<Tag>().unwrap();
    assert_eq!(all.len(), 1);
    assert!(EntityRef::ptr_eq(&all[0], &tag));
    let by_id = session.find_by_id::<Tag>(id).unwrap().unwrap();
    assert!(EntityRef::ptr_eq(&by_id, &tag));
    let by_text = session.find_by_id::<Tag>(id.to_string()).unwrap().unwrap();
    assert!(EntityRef::ptr_eq(&by_text, &tag));
    assert_eq!(session.cache_size(), 1);
    assert!(session.contains::<Tag>(id.to_string()));

    let sticker = EntityRef::new(Sticker {
        id: None,
        tag: Some(tag.clone()),
    });
    session.save(&sticker).unwrap();
    let sticker_id = sticker.read().id.unwrap();

    let mut fresh = factory.open_session().unwrap();
    let loaded = fresh.find_by_id::<Sticker>(sticker_id).unwrap().unwrap();
    let resolved = loaded.read().tag.clone().expect("tag resolved");
    let direct = fresh.find_by_id::<Tag>(id).unwrap().unwrap();
    assert!(EntityRef::ptr_eq(&resolved, &direct));
    assert_eq!(direct.read().label, "rust");
    assert_eq!(fresh.cache_size(), 2);
}

#[test]
fn test_find_all_warms_cache() {
    let db = TestDb::new();
    let factory = db.factory();
    {
        let mut seed = factory.open_session().unwrap();
        for (name, email) in [("a", "a@x"), ("b", "b@x"), ("c", "c@x")] {
            seed.save(&EntityRef::new(User::new(name, email, None))).unwrap();
        }
    }

    let mut session = factory.open_session().unwrap();
    let users = session.find_all::<User>().unwrap();
    assert_eq!(users.len(), 3);
    assert_eq!(session.cache_size(), 3);
    assert!(session.contains::<User>(2_i64));
}

#[test]
fn test_save_or_update_routes_on_existence() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();

    let dave = EntityRef::new(User::new("dave", "d@x.com", Some(50)));
    session.save_or_update(&dave).unwrap();
    let id = dave.read().id.unwrap();
    assert_eq!(db.count("users"), 1);

    dave.write().age = Some(51);
    session.save_or_update(&dave).unwrap();
    assert_eq!(db.count("users"), 1);

    let mut fresh = factory.open_session().unwrap();
    assert_eq!(fresh.find_by_id::<User>(id).unwrap().unwrap().read().age, Some(51));
}

#[test]
fn test_operations_without_key_fail() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();
    let ghost = EntityRef::new(User::new("ghost", "g@x.com", None));

    let err = session.delete(&ghost).unwrap_err();
    assert!(matches!(err, OrmError::MissingKey { operation: "delete", .. }));
    let err = session.update(&ghost).unwrap_err();
    assert!(matches!(err, OrmError::MissingKey { operation: "update", .. }));
}

#[test]
fn test_unique_violation_is_persistence_error_with_sql() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();

    session.save(&EntityRef::new(User::new("erin", "e@x.com", None))).unwrap();
    let err = session
        .save(&EntityRef::new(User::new("erin", "other@x.com", None)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(err.sql().unwrap().starts_with("INSERT INTO users"));
    assert!(err.to_string().contains("User"));
}

#[test]
fn test_raw_queries_bind_parameters_and_skip_cache() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();
    for (name, age) in [("f1", 20), ("f2", 35), ("f3", 40)] {
        session
            .save(&EntityRef::new(User::new(name, &format!("{name}@x.com"), Some(age))))
            .unwrap();
    }
    session.clear();

    let older = session
        .create_query_with_params::<User>(
            "SELECT * FROM users WHERE age > ? ORDER BY age",
            &[DatabaseValue::from(30)],
        )
        .unwrap();
    assert_eq!(older.len(), 2);
    assert_eq!(older[0].read().username, "f2");
    assert_eq!(session.cache_size(), 0);

    let changed = session
        .execute_update_with_params("UPDATE users SET age = age + 1 WHERE age >= ?", &[DatabaseValue::from(35)])
        .unwrap();
    assert_eq!(changed, 2);

    let err = session.execute_update("UPDATE nowhere SET x = 1").unwrap_err();
    assert!(matches!(err, OrmError::Query { ref sql, .. } if sql == "UPDATE nowhere SET x = 1"));
}

#[test]
fn test_typed_query_with_trailing_semicolon_pages() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();
    for name in ["s1", "s2", "s3"] {
        session
            .save(&EntityRef::new(User::new(name, &format!("{name}@x.com"), None)))
            .unwrap();
    }

    let query = session
        .query::<User>("SELECT * FROM users ORDER BY username; \n")
        .set_max_results(2);
    assert_eq!(query.query_string(), "SELECT * FROM users ORDER BY username LIMIT 2");

    let page = query.result_list().unwrap();
    let names: Vec<String> = page.iter().map(|u| u.read().username.clone()).collect();
    assert_eq!(names, vec!["s1", "s2"]);
}

#[test]
fn test_typed_query_results() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();
    for (name, age) in [("g1", 18), ("g2", 25), ("g3", 32), ("g4", 47)] {
        session
            .save(&EntityRef::new(User::new(name, &format!("{name}@x.com"), Some(age))))
            .unwrap();
    }

    let page = session
        .query::<User>("SELECT * FROM users WHERE age >= :min ORDER BY age")
        .set_parameter("min", 20)
        .set_first_result(1)
        .set_max_results(2)
        .result_list()
        .unwrap();
    let names: Vec<String> = page.iter().map(|u| u.read().username.clone()).collect();
    assert_eq!(names, vec!["g3", "g4"]);

    let query = session
        .query::<User>("SELECT * FROM users")
        .set_max_results(5)
        .set_first_result(10);
    assert_eq!(query.query_string(), "SELECT * FROM users LIMIT 5 OFFSET 10");

    let single = session
        .query::<User>("SELECT * FROM users WHERE username = :name")
        .set_parameter("name", "g2")
        .single_result()
        .unwrap();
    assert_eq!(single.read().age, Some(25));

    let err = session
        .query::<User>("SELECT * FROM users WHERE age > :min")
        .set_parameter("min", 20)
        .single_result()
        .unwrap_err();
    assert!(matches!(err, OrmError::TooManyResults { count: 3, .. }));

    let err = session
        .query::<User>("SELECT * FROM users WHERE age > 100")
        .single_result()
        .unwrap_err();
    assert!(matches!(err, OrmError::NoResult { .. }));

    let none = session
        .query::<User>("SELECT * FROM users WHERE age > 100")
        .single_result_optional()
        .unwrap();
    assert!(none.is_none());

    let err = session
        .query::<User>("SELECT * FROM users WHERE age > :min")
        .result_list()
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidParameter { ref name, .. } if name == "min"));
}

#[test]
fn test_query_builder_runs_through_session() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();
    for (name, age) in [("h1", 22), ("h2", 33), ("h3", 44)] {
        session
            .save(&EntityRef::new(User::new(name, &format!("{name}@x.com"), Some(age))))
            .unwrap();
    }

    let builder = session
        .query_builder::<User>()
        .unwrap()
        .where_clause("age > :min")
        .order_by_desc("age")
        .limit(1)
        .set_parameter("min", 25);
    assert_eq!(
        builder.build(),
        "SELECT id, username, email, age FROM users WHERE age > :min ORDER BY age DESC LIMIT 1"
    );

    let found = session.execute_builder::<User>(&builder).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].read().username, "h3");
}

#[test]
fn test_closed_session_rejects_work() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();
    session.close();
    session.close();

    assert!(!session.is_open());
    let err = session.find_by_id::<User>(1_i64).unwrap_err();
    assert!(matches!(err, OrmError::SessionClosed));
    assert!(session.flush().is_err());
}

#[test]
fn test_monitor_counts_statements() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();
    factory.monitor().reset();

    session.save(&EntityRef::new(User::new("i1", "i1@x.com", None))).unwrap();
    session.find_all::<User>().unwrap();

    let monitor = factory.monitor();
    assert_eq!(monitor.stats(tessera_orm::OperationKind::Insert).unwrap().count, 1);
    // generated-key readback plus the full select
    assert_eq!(monitor.stats(tessera_orm::OperationKind::Select).unwrap().count, 2);
}
