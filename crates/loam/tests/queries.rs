use loam::driver::Rows;
use loam::mock::MockDriver;
use loam::schema::{AttrType, Attribute, ModelDef, Registry};
use loam::stmt::Value;
use loam::{Condition, FindOptions, Manager, ManagerOptions, Op, Scope};

use pretty_assertions::assert_eq;

fn forum_registry() -> Registry {
    let mut registry = Registry::new();
    registry.define(
        ModelDef::new("User")
            .attr(Attribute::new("name", AttrType::Text))
            .has_many("Article"),
    );
    registry.define(ModelDef::new("Article").attr(Attribute::new("title", AttrType::Text)));
    registry.define(
        ModelDef::new("Guide")
            .extends("Article")
            .attr(Attribute::new("difficulty", AttrType::Int)),
    );
    registry
}

async fn forum_manager() -> (MockDriver, Manager) {
    let driver = MockDriver::new();
    let manager = Manager::setup(driver.clone(), forum_registry())
        .await
        .unwrap();
    (driver, manager)
}

fn article_row(id: i64, kind: &str, title: &str, difficulty: impl Into<Value>) -> Vec<Value> {
    vec![
        Value::I64(id),
        kind.into(),
        title.into(),
        Value::Null, // user_id
        difficulty.into(),
    ]
}

#[tokio::test]
async fn find_compiles_conditions_into_sql() {
    let (driver, manager) = forum_manager().await;

    let options = FindOptions::new()
        .condition(Condition::clause("name", Op::Eq, "gm"))
        .order("name ASC");
    let found = manager.find("User", &options).await.unwrap();

    assert!(found.is_empty());
    assert_eq!(
        driver.statements().last().unwrap(),
        "SELECT loam_user.* FROM loam_user WHERE name = 'gm' ORDER BY name ASC"
    );
}

#[tokio::test]
async fn rows_of_an_inheritance_root_come_back_concrete() {
    let (driver, manager) = forum_manager().await;

    driver.script_rows(Rows::new(
        vec![
            "id".into(),
            "model_type".into(),
            "title".into(),
            "user_id".into(),
            "difficulty".into(),
        ],
        vec![
            article_row(1, "Article", "News", Value::Null),
            article_row(2, "Guide", "Intro", 3i64),
        ],
    ));

    let found = manager.find("Article", &FindOptions::new()).await.unwrap();
    assert_eq!(found.len(), 2);

    let schema = manager.schema();
    assert_eq!(schema.model(found[0].model()).name.full(), "Article");
    assert_eq!(schema.model(found[1].model()).name.full(), "Guide");
    assert_eq!(found[1].get("difficulty"), &Value::I64(3));
}

#[tokio::test]
async fn finding_a_child_filters_by_discriminator() {
    let (driver, manager) = forum_manager().await;

    manager.find("Guide", &FindOptions::new()).await.unwrap();
    assert_eq!(
        driver.statements().last().unwrap(),
        "SELECT loam_article.* FROM loam_article WHERE loam_article.model_type = 'Guide'"
    );
}

#[tokio::test]
async fn active_scopes_constrain_every_find() {
    let (driver, manager) = forum_manager().await;

    {
        let _guard = manager.scope(Scope::with_condition(Condition::clause(
            "name",
            Op::Ne,
            "spam",
        )));
        manager.find("User", &FindOptions::new()).await.unwrap();
        assert_eq!(
            driver.statements().last().unwrap(),
            "SELECT loam_user.* FROM loam_user WHERE name <> 'spam'"
        );
    }

    // The guard dropped; the scope is gone.
    manager.find("User", &FindOptions::new()).await.unwrap();
    assert_eq!(
        driver.statements().last().unwrap(),
        "SELECT loam_user.* FROM loam_user"
    );
}

#[tokio::test]
async fn scopes_stay_with_the_handle_that_pushed_them() {
    let (driver, manager) = forum_manager().await;

    let _guard = manager.scope(Scope::with_condition(Condition::clause(
        "name",
        Op::Ne,
        "spam",
    )));
    manager.find("User", &FindOptions::new()).await.unwrap();
    assert_eq!(
        driver.statements().last().unwrap(),
        "SELECT loam_user.* FROM loam_user WHERE name <> 'spam'"
    );

    // A clone running in another task has no scope of its own.
    let other = manager.clone();
    let other_driver = driver.clone();
    tokio::spawn(async move {
        other.find("User", &FindOptions::new()).await.unwrap();
        assert_eq!(
            other_driver.statements().last().unwrap(),
            "SELECT loam_user.* FROM loam_user"
        );
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn find_one_limits_the_query() {
    let (driver, manager) = forum_manager().await;

    let found = manager.find_one("User", &FindOptions::new()).await.unwrap();
    assert!(found.is_none());
    assert_eq!(
        driver.statements().last().unwrap(),
        "SELECT loam_user.* FROM loam_user LIMIT 1"
    );
}

#[tokio::test]
async fn count_casts_the_backend_text() {
    let (driver, manager) = forum_manager().await;

    driver.script_rows(Rows::new(vec!["count".into()], vec![vec!["3".into()]]));
    let count = manager.count("User", &FindOptions::new()).await.unwrap();

    assert_eq!(count, 3);
    assert_eq!(
        driver.statements().last().unwrap(),
        "SELECT count(*) AS count FROM loam_user"
    );

    // No result row at all still counts as zero.
    assert_eq!(manager.count("User", &FindOptions::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn average_survives_a_fractional_result() {
    let (driver, manager) = forum_manager().await;

    driver.script_rows(Rows::new(vec!["avg".into()], vec![vec!["2.5".into()]]));
    let avg = manager
        .average("Guide", "difficulty", &FindOptions::new())
        .await
        .unwrap();

    assert_eq!(avg, Value::F64(2.5));
    assert_eq!(
        driver.statements().last().unwrap(),
        "SELECT avg(difficulty) AS avg FROM loam_article \
         WHERE loam_article.model_type = 'Guide'"
    );

    let err = manager
        .average("Guide", "nope", &FindOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn count_and_sum_over_a_condition() {
    let driver = MockDriver::new();
    let mut registry = Registry::new();
    registry.define(
        ModelDef::new("User")
            .attr(Attribute::new("name", AttrType::Text))
            .attr(Attribute::new("age", AttrType::Int)),
    );
    let manager = Manager::setup(driver.clone(), registry).await.unwrap();

    driver.script_rows(Rows::new(vec!["count".into()], vec![vec!["2".into()]]));
    let options = FindOptions::new().condition(Condition::clause("age", Op::Gt, 15));
    assert_eq!(manager.count("User", &options).await.unwrap(), 2);
    assert_eq!(
        driver.statements().last().unwrap(),
        "SELECT count(*) AS count FROM loam_user WHERE age > 15"
    );

    driver.script_rows(Rows::new(vec!["sum".into()], vec![vec!["60".into()]]));
    let sum = manager.sum("User", "age", &FindOptions::new()).await.unwrap();
    assert_eq!(sum, Value::I64(60));
    assert_eq!(
        driver.statements().last().unwrap(),
        "SELECT sum(age) AS sum FROM loam_user"
    );
}

#[tokio::test]
async fn summarize_returns_raw_grouped_rows() {
    let (driver, manager) = forum_manager().await;

    driver.script_rows(Rows::new(
        vec!["difficulty".into(), "count".into()],
        vec![
            vec![Value::I64(1), Value::I64(4)],
            vec![Value::I64(2), Value::I64(2)],
        ],
    ));
    let options = FindOptions::new().group("difficulty");
    let rows = manager
        .summarize("Guide", "count(*)", &options)
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], vec![Value::I64(1), Value::I64(4)]);
    assert_eq!(
        driver.statements().last().unwrap(),
        "SELECT difficulty, count(*) AS count FROM loam_article \
         WHERE loam_article.model_type = 'Guide' GROUP BY difficulty"
    );
}

#[tokio::test]
async fn suppressed_errors_report_empty_results() {
    let driver = MockDriver::new();
    let manager = Manager::setup_with(
        driver.clone(),
        forum_registry(),
        ManagerOptions {
            raise_errors: false,
            ..ManagerOptions::default()
        },
    )
    .await
    .unwrap();

    driver.fail_on("SELECT", false);
    let found = manager.find("User", &FindOptions::new()).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn unknown_models_are_a_configuration_error() {
    let (_driver, manager) = forum_manager().await;
    let err = manager.find("Ghost", &FindOptions::new()).await.unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("Ghost"));
}
