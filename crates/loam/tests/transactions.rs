use loam::driver::Rows;
use loam::mock::MockDriver;
use loam::schema::{AttrType, Attribute, ModelDef, Registry};
use loam::stmt::Value;
use loam::Manager;

use pretty_assertions::assert_eq;

fn blog_registry() -> Registry {
    let mut registry = Registry::new();
    registry.define(
        ModelDef::new("User")
            .attr(Attribute::new("name", AttrType::Text))
            .has_many("Article"),
    );
    registry.define(ModelDef::new("Article").attr(Attribute::new("title", AttrType::Text)));
    registry
}

async fn blog_manager() -> (MockDriver, Manager) {
    let driver = MockDriver::new();
    let manager = Manager::setup(driver.clone(), blog_registry())
        .await
        .unwrap();
    (driver, manager)
}

fn occurrences(statements: &[String], needle: &str) -> usize {
    statements.iter().filter(|s| *s == needle).count()
}

#[tokio::test]
async fn work_commits_inside_the_transaction_bracket() {
    let (driver, manager) = blog_manager().await;

    let mut user = manager.entity("User").unwrap();
    user.set("name", "gm");

    let base = driver.statements().len();
    let mut tx = manager.transaction().await.unwrap();
    tx.save(&mut user).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(
        driver.statements()[base..],
        [
            "BEGIN",
            "INSERT INTO loam_user (name) VALUES ('gm')",
            "COMMIT",
        ]
    );
}

#[tokio::test]
async fn nested_levels_are_bookkeeping_only() {
    let (driver, manager) = blog_manager().await;

    let mut user = manager.entity("User").unwrap();
    user.set("name", "gm");

    let mut tx = manager.transaction().await.unwrap();
    tx.begin();
    tx.save(&mut user).await.unwrap();
    tx.commit().await.unwrap(); // inner
    tx.commit().await.unwrap(); // outermost, reaches the backend

    let statements = driver.statements();
    assert_eq!(occurrences(&statements, "BEGIN"), 1);
    assert_eq!(occurrences(&statements, "COMMIT"), 1);
    assert_eq!(occurrences(&statements, "ROLLBACK"), 0);
}

#[tokio::test]
async fn a_nested_rollback_poisons_the_outer_commit() {
    let (driver, manager) = blog_manager().await;

    let mut tx = manager.transaction().await.unwrap();
    tx.begin();
    tx.rollback().await.unwrap();

    let err = tx.commit().await.unwrap_err();
    assert!(err.is_configuration());

    let statements = driver.statements();
    assert_eq!(statements.last().unwrap(), "ROLLBACK");
    assert_eq!(occurrences(&statements, "COMMIT"), 0);
}

#[tokio::test]
async fn outermost_rollback_reaches_the_backend() {
    let (driver, manager) = blog_manager().await;

    let mut user = manager.entity("User").unwrap();
    user.set("name", "gm");

    let mut tx = manager.transaction().await.unwrap();
    tx.save(&mut user).await.unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(driver.statements().last().unwrap(), "ROLLBACK");
}

#[tokio::test]
async fn cascade_delete_rides_the_open_transaction() {
    let (driver, manager) = blog_manager().await;

    let mut user = manager.entity("User").unwrap();
    user.set("id", 1i64);

    // The owned-article lookup inside the cascade.
    driver.script_rows(Rows::new(vec!["id".into()], vec![vec![Value::I64(5)]]));

    let base = driver.statements().len();
    let mut tx = manager.transaction().await.unwrap();
    tx.delete(&mut user, true).await.unwrap();
    tx.commit().await.unwrap();

    assert!(user.is_deleted());
    let statements = driver.statements();
    // One bracket around the whole cascade, no inner transaction.
    assert_eq!(occurrences(&statements[base..], "BEGIN"), 1);
    assert_eq!(occurrences(&statements[base..], "COMMIT"), 1);
    assert!(statements.contains(&"DELETE FROM loam_article WHERE id = 5".to_string()));
    assert!(statements.contains(&"DELETE FROM loam_user WHERE id = 1".to_string()));
}

#[tokio::test]
async fn a_dropped_transaction_never_taints_later_work() {
    let (driver, manager) = blog_manager().await;

    let tx = manager.transaction().await.unwrap();
    drop(tx);

    let before = driver.connections();
    let base = driver.statements().len();
    let mut user = manager.entity("User").unwrap();
    user.set("name", "gm");
    manager.save(&mut user).await.unwrap();

    // The abandoned connection was discarded, not reused; the insert ran
    // on a fresh one, outside any transaction.
    assert_eq!(driver.connections(), before + 1);
    assert_eq!(
        driver.statements()[base..],
        ["INSERT INTO loam_user (name) VALUES ('gm')"]
    );
}

#[tokio::test]
async fn reads_and_writes_share_the_pinned_connection() {
    let (driver, manager) = blog_manager().await;

    driver.script_rows(Rows::new(
        vec!["id".into(), "name".into()],
        vec![vec![Value::I64(1), "gm".into()]],
    ));

    let mut tx = manager.transaction().await.unwrap();
    let mut user = tx.load("User", 1i64).await.unwrap().unwrap();
    user.set("name", "editor");
    tx.save(&mut user).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(
        driver.statements().last().unwrap(),
        "COMMIT"
    );
    assert!(driver
        .statements()
        .contains(&"UPDATE loam_user SET name = 'editor' WHERE id = 1".to_string()));
}
