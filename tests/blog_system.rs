mod common;

use common::*;
use inkdb::query::{Predicate, Select};
use inkdb::{blog, Error, TransactionState, Tuple, Value};

#[test]
fn test_insert_read_back() {
    let (db, _) = blog_db();
    let mut txn = db.begin();
    add_user(&mut txn, "u1", "ann").unwrap();
    add_post(
        &mut txn,
        "p1",
        "u1",
        "Ünïcode title",
        Some("short"),
        "line one\nline two",
    )
    .unwrap();
    txn.commit().unwrap();

    let txn = db.begin();
    let post = txn.get("posts", "p1").unwrap().unwrap();
    assert_eq!(
        post,
        Tuple::new(vec![
            Value::from("p1"),
            Value::from("u1"),
            Value::from("Ünïcode title"),
            Value::from("short"),
            Value::from("line one\nline two"),
            Value::from("draft"),
            Value::Timestamp(T0),
            Value::Timestamp(T0),
        ])
    );
    let user = txn.get("users", "u1").unwrap().unwrap();
    assert_eq!(user.get(3), Some(&Value::from("active")));
}

#[test]
fn test_user_and_post_commit_together() {
    let (db, _) = blog_db();
    let mut txn = db.begin();
    add_user(&mut txn, "u1", "ann").unwrap();
    add_post(&mut txn, "p1", "u1", "Hello", None, "first post").unwrap();
    txn.commit().unwrap();

    assert_eq!(txn.state(), TransactionState::Committed);
    assert_eq!(count(&db, "users"), 1);
    assert_eq!(count(&db, "posts"), 1);
}

#[test]
fn test_orphan_post_persists_nothing() {
    let (db, _) = blog_db();
    let mut txn = db.begin();
    add_user(&mut txn, "u1", "ann").unwrap();
    let err = add_post(&mut txn, "p1", "ghost", "Hello", None, "orphan").unwrap_err();
    assert!(matches!(err, Error::ForeignKeyViolation { .. }));

    let err = txn.commit().unwrap_err();
    assert!(matches!(err, Error::ForeignKeyViolation { .. }));
    assert_eq!(txn.state(), TransactionState::RolledBack);
    assert_eq!(count(&db, "users"), 0);
    assert_eq!(count(&db, "posts"), 0);
}

#[test]
fn test_unique_username_and_email() {
    let (db, _) = blog_db();
    let mut txn = db.begin();
    add_user(&mut txn, "u1", "ann").unwrap();
    txn.commit().unwrap();

    let mut txn = db.begin();
    let err = add_user(&mut txn, "u2", "ann").unwrap_err();
    assert!(matches!(err, Error::UniqueViolation { ref constraint, .. } if constraint == "uq_users_username"));

    let mut txn = db.begin();
    let err = txn
        .insert(
            "users",
            [("id", "u3"), ("username", "bob"), ("email", "ann@example.com")],
        )
        .unwrap_err();
    assert!(matches!(err, Error::UniqueViolation { ref constraint, .. } if constraint == "uq_users_email"));
}

#[test]
fn test_column_checks() {
    let (db, _) = blog_db();
    let mut txn = db.begin();
    let err = txn
        .insert("users", [("id", "u1"), ("username", "ann")])
        .unwrap_err();
    assert!(matches!(err, Error::NullNotAllowed { ref column, .. } if column == "email"));

    let mut txn = db.begin();
    let long = "x".repeat(51);
    let err = txn
        .insert(
            "users",
            [("id", "u1"), ("username", long.as_str()), ("email", "a@b.c")],
        )
        .unwrap_err();
    assert!(matches!(err, Error::ValueTooLarge { max: 50, .. }));

    let mut txn = db.begin();
    add_user(&mut txn, "u1", "ann").unwrap();
    let err = txn
        .insert(
            "posts",
            [
                ("id", Value::from("p1")),
                ("user_id", Value::from("u1")),
                ("title", Value::from("t")),
                ("main_content", Value::from("c")),
                ("status", Value::from("deleted")),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[test]
fn test_update_stamps_commit_time() {
    let (db, clock) = blog_db();
    let mut txn = db.begin();
    add_user(&mut txn, "u1", "ann").unwrap();
    add_post(&mut txn, "p1", "u1", "Hello", None, "body").unwrap();
    txn.commit().unwrap();

    clock.set(T0 + 1_000);
    let mut txn = db.begin();
    txn.update(
        "posts",
        "p1",
        [
            ("title", Value::from("Hello again")),
            ("updated_at", Value::Timestamp(42)),
        ],
    )
    .unwrap();
    // the statement already ran the trigger
    let staged = txn.get("posts", "p1").unwrap().unwrap();
    assert_eq!(staged.get(7), Some(&Value::Timestamp(T0 + 1_000)));

    clock.set(T0 + 5_000);
    txn.commit().unwrap();

    let result = db
        .select(&Select::from("posts").columns(["title", "created_at", "updated_at"]))
        .unwrap();
    assert_eq!(result.value(0, "title"), Some(&Value::from("Hello again")));
    assert_eq!(result.value(0, "created_at"), Some(&Value::Timestamp(T0)));
    assert_eq!(result.value(0, "updated_at"), Some(&Value::Timestamp(T0 + 5_000)));
}

#[test]
fn test_delete_user_cascades() {
    let (db, _) = blog_db();
    let mut txn = db.begin();
    add_user(&mut txn, "u1", "ann").unwrap();
    add_user(&mut txn, "u2", "bob").unwrap();
    add_post(&mut txn, "p1", "u1", "One", None, "first").unwrap();
    add_post(&mut txn, "p2", "u1", "Two", None, "second").unwrap();
    add_post(&mut txn, "p3", "u2", "Three", None, "third").unwrap();
    add_comment(&mut txn, 1, "p1", "u2").unwrap();
    add_comment(&mut txn, 2, "p3", "u1").unwrap();
    add_comment(&mut txn, 3, "p3", "u2").unwrap();
    txn.insert("tags", [("id", Value::from(1i64)), ("name", Value::from("rust"))])
        .unwrap();
    txn.insert("categories", [("id", Value::from(1i64)), ("name", Value::from("news"))])
        .unwrap();
    txn.insert("post_tags", [("post_id", Value::from("p1")), ("tag_id", Value::from(1i64))])
        .unwrap();
    txn.insert("post_tags", [("post_id", Value::from("p3")), ("tag_id", Value::from(1i64))])
        .unwrap();
    txn.insert(
        "post_categories",
        [("post_id", Value::from("p2")), ("category_id", Value::from(1i64))],
    )
    .unwrap();
    txn.commit().unwrap();
    let version = db.committed_version();

    let mut txn = db.begin();
    // u1, p1, p2, comment 1 (on p1), comment 2 (by u1), post_tags (p1), post_categories (p2)
    assert_eq!(txn.delete("users", "u1").unwrap(), 7);
    txn.commit().unwrap();

    assert_eq!(db.committed_version(), version + 1);
    assert_eq!(column(&db, "users", "id"), vec![Value::from("u2")]);
    assert_eq!(column(&db, "posts", "id"), vec![Value::from("p3")]);
    assert_eq!(column(&db, "comments", "id"), vec![Value::from(3i64)]);
    assert_eq!(column(&db, "post_tags", "post_id"), vec![Value::from("p3")]);
    assert_eq!(count(&db, "post_categories"), 0);
    assert_eq!(count(&db, "tags"), 1);
    assert_eq!(count(&db, "categories"), 1);
}

#[test]
fn test_delete_missing_row() {
    let (db, _) = blog_db();
    let mut txn = db.begin();
    assert!(matches!(
        txn.delete("users", "nobody"),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_seed_demo_data_once() {
    let (db, _) = blog_db();
    assert!(blog::seed_demo_data(&db).unwrap());
    assert!(!blog::seed_demo_data(&db).unwrap());

    let users = db
        .select(&Select::from("users").filter(Predicate::eq("username", blog::DEMO_USERNAME)))
        .unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users.value(0, "id"), Some(&Value::from(blog::DEMO_USER_ID)));
    assert_eq!(users.value(0, "email"), Some(&Value::from(blog::DEMO_EMAIL)));
}

#[test]
fn test_create_post_for_demo_user() {
    let (db, _) = blog_db();
    blog::seed_demo_data(&db).unwrap();
    let post = blog::NewPost {
        id: "p1",
        user_id: blog::DEMO_USER_ID,
        title: "First",
        summary: None,
        content: "Hello from the demo author",
    };
    blog::create_post(&db, &post).unwrap();
    assert_eq!(count(&db, "posts"), 1);

    let orphan = blog::NewPost {
        id: "p2",
        user_id: "missing",
        ..post
    };
    assert!(matches!(
        blog::create_post(&db, &orphan),
        Err(Error::ForeignKeyViolation { .. })
    ));
}
