mod common;

use common::{TestDb, User};
use tessera_orm::prelude::*;
use tessera_orm::ErrorKind;

fn save_batch(session: &mut Session, prefix: &str, n: usize) {
    for i in 0..n {
        let user = User::new(&format!("{prefix}{i}"), &format!("{prefix}{i}@x.com"), None);
        session.save(&EntityRef::new(user)).unwrap();
    }
}

#[test]
fn test_rollback_discards_batch() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();

    let tx = session.begin_transaction().unwrap();
    save_batch(&mut session, "r", 3);
    tx.rollback().unwrap();

    assert_eq!(tx.status(), TransactionStatus::RolledBack);
    assert!(session.transaction().is_none());
    assert_eq!(db.count("users"), 0);
}

#[test]
fn test_commit_keeps_batch() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();

    let tx = session.begin_transaction().unwrap();
    save_batch(&mut session, "c", 4);
    tx.commit().unwrap();

    assert_eq!(tx.status(), TransactionStatus::Committed);
    assert_eq!(db.count("users"), 4);
}

#[test]
fn test_second_begin_while_active_fails() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();

    let tx = session.begin_transaction().unwrap();
    let err = session.begin_transaction().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transaction);
    assert!(session.transaction().unwrap().is_active());

    tx.commit().unwrap();
    // a new one may start once the first is finished
    let next = session.begin_transaction().unwrap();
    next.rollback().unwrap();
}

#[test]
fn test_finished_transaction_cannot_finish_again() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();

    let tx = session.begin_transaction().unwrap();
    tx.commit().unwrap();
    assert!(matches!(tx.commit().unwrap_err(), OrmError::Transaction { .. }));
    assert!(matches!(tx.rollback().unwrap_err(), OrmError::Transaction { .. }));
    assert_eq!(tx.status(), TransactionStatus::Committed);
}

#[test]
fn test_close_rolls_back_active_transaction() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();

    let tx = session.begin_transaction().unwrap();
    save_batch(&mut session, "x", 2);
    session.close();

    assert_eq!(tx.status(), TransactionStatus::RolledBack);
    assert!(tx.commit().is_err());
    assert_eq!(db.count("users"), 0);
}

#[test]
fn test_dropping_session_rolls_back() {
    let db = TestDb::new();
    let factory = db.factory();
    let tx = {
        let mut session = factory.open_session().unwrap();
        let tx = session.begin_transaction().unwrap();
        save_batch(&mut session, "d", 2);
        tx
    };

    assert_eq!(tx.status(), TransactionStatus::RolledBack);
    assert_eq!(db.count("users"), 0);
}

#[test]
fn test_reads_inside_transaction_see_own_writes() {
    let db = TestDb::new();
    let factory = db.factory();
    let mut session = factory.open_session().unwrap();

    let tx = session.begin_transaction().unwrap();
    save_batch(&mut session, "v", 2);
    session.clear();
    assert_eq!(session.find_all::<User>().unwrap().len(), 2);
    tx.rollback().unwrap();

    session.clear();
    assert!(session.find_all::<User>().unwrap().is_empty());
}
