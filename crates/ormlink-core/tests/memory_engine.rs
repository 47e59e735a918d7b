//! In-memory adapter behavior through the storage traits.

mod common;

use std::sync::Arc;

use common::{registry, Post, Tag, User};
use ormlink_core::proto::{
    AggregateFunction, DestroyOptions, FindOptions, ReloadOptions, WriteOptions,
};
use ormlink_core::validation::REQUIRED;
use ormlink_core::{
    AssociationTarget, Entity, Error, Instance, MemoryEngine, ModelDef, Query, StorageEngine,
    StorageError,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn record(value: Value) -> ormlink_core::proto::Record {
    value.as_object().cloned().unwrap()
}

fn setup() -> (MemoryEngine, Arc<ModelDef>, Arc<ModelDef>, Arc<ModelDef>) {
    let registry = registry();
    let user = registry.model(User::NAME).unwrap();
    let post = registry.model(Post::NAME).unwrap();
    let tag = registry.model(Tag::NAME).unwrap();
    (MemoryEngine::new(registry), user, post, tag)
}

#[tokio::test]
async fn test_create_and_find_with_compiled_query() {
    let (engine, user, _, _) = setup();
    for (name, age) in [("Bruce", 40), ("Dick", 20), ("Alfred", 70)] {
        engine
            .create(&user, record(json!({ "name": name, "age": age })), WriteOptions::default())
            .await
            .unwrap();
    }

    let q = Query::<User>::new(engine.registry().clone())
        .unwrap()
        .filter(|f| f.age.lt(50))
        .order(|f| vec![f.age.desc()]);
    let rows = engine
        .find_all(&user, &q.compile_find_options().unwrap())
        .await
        .unwrap();
    let names: Vec<_> = rows.iter().map(|r| r.get("name").cloned().unwrap()).collect();
    assert_eq!(names, vec![json!("Bruce"), json!("Dick")]);

    let count = engine.count(&user, &FindOptions::default()).await.unwrap();
    assert_eq!(count, 3);

    let max = engine
        .aggregate(&user, "age", AggregateFunction::Max, &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(max, json!(70));
}

#[tokio::test]
async fn test_not_null_violation_coerces_to_required() {
    let (engine, user, _, _) = setup();
    let err = engine
        .create(&user, record(json!({ "email": "x@y" })), WriteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));

    let err = Error::from_storage(err, &user);
    let validation = err.as_validation().unwrap();
    assert_eq!(validation.errors_for("name")[0].kind, REQUIRED);
    assert!(validation.errors_for("email").is_empty());
    assert!(validation.constraints.is_empty());
}

#[tokio::test]
async fn test_eager_load_and_reload() {
    let (engine, user, post, _) = setup();
    let mentor = engine
        .create(&user, record(json!({ "name": "Bruce" })), WriteOptions::default())
        .await
        .unwrap();
    let mentor_id = mentor.get("id").cloned().unwrap();
    let mut dick = engine
        .create(
            &user,
            record(json!({ "name": "Dick", "mentorId": mentor_id })),
            WriteOptions::default(),
        )
        .await
        .unwrap();
    engine
        .create(
            &post,
            record(json!({ "title": "Gotham", "authorId": mentor_id })),
            WriteOptions::default(),
        )
        .await
        .unwrap();

    let q = Query::<User>::new(engine.registry().clone())
        .unwrap()
        .filter(|f| f.name.eq("Bruce"))
        .include(|f| f.mentee, None)
        .unwrap()
        .include(|f| f.posts, None)
        .unwrap();
    let bruce = engine
        .find_one(&user, &q.compile_find_options().unwrap())
        .await
        .unwrap()
        .unwrap();
    let mentee = bruce.related("mentee").and_then(|t| t.as_one()).unwrap();
    assert_eq!(mentee.get("name"), Some(&json!("Dick")));
    assert_eq!(bruce.related("posts").and_then(|t| t.as_many()).unwrap().len(), 1);

    let plain = bruce.to_plain_object(1);
    assert_eq!(plain["mentee"]["name"], json!("Dick"));
    assert!(bruce.to_plain_object(0).get("mentee").is_none());

    let include = q.compile_includes().unwrap();
    dick.reload(ReloadOptions::new(include, None)).await.unwrap();
    assert!(matches!(dick.related("mentee"), Some(AssociationTarget::None)));
}

#[tokio::test]
async fn test_required_include_drops_parents() {
    let (engine, user, _, _) = setup();
    let bruce = engine
        .create(&user, record(json!({ "name": "Bruce" })), WriteOptions::default())
        .await
        .unwrap();
    engine
        .create(
            &user,
            record(json!({ "name": "Dick", "mentorId": bruce.get("id").cloned().unwrap() })),
            WriteOptions::default(),
        )
        .await
        .unwrap();

    let q = Query::<User>::new(engine.registry().clone())
        .unwrap()
        .include(|f| f.mentor.required(), None)
        .unwrap();
    let rows = engine
        .find_all(&user, &q.compile_find_options().unwrap())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&json!("Dick")));
}

#[tokio::test]
async fn test_many_to_many_links() {
    let (engine, user, _, tag) = setup();
    let mut bruce = engine
        .create(&user, record(json!({ "name": "Bruce" })), WriteOptions::default())
        .await
        .unwrap();
    let tags = engine
        .bulk_create(
            &tag,
            vec![record(json!({ "label": "rich" })), record(json!({ "label": "bat" }))],
            WriteOptions::default(),
        )
        .await
        .unwrap();

    bruce
        .set_association("tags", AssociationTarget::Many(tags.clone()), None)
        .await
        .unwrap();
    bruce
        .set_association("tags", AssociationTarget::Many(tags[1..].to_vec()), None)
        .await
        .unwrap();

    let q = Query::<User>::new(engine.registry().clone())
        .unwrap()
        .include(|f| f.tags, None)
        .unwrap();
    bruce
        .reload(ReloadOptions::new(q.compile_includes().unwrap(), None))
        .await
        .unwrap();
    let labels: Vec<_> = bruce
        .related("tags")
        .unwrap()
        .iter()
        .map(|t| t.get("label").cloned().unwrap())
        .collect();
    assert_eq!(labels, vec![json!("bat")]);
}

#[tokio::test]
async fn test_bulk_create_is_all_or_nothing() {
    let (engine, _, _, tag) = setup();
    let err = engine
        .bulk_create(
            &tag,
            vec![record(json!({ "label": "a" })), record(json!({ "label": "a" }))],
            WriteOptions::default(),
        )
        .await;
    assert!(err.is_err());
    assert_eq!(engine.stored_rows("Tag"), 0);
}

#[tokio::test]
async fn test_paranoid_destroy_and_restore() {
    let (engine, _, post, _) = setup();
    engine
        .create(&post, record(json!({ "title": "a" })), WriteOptions::default())
        .await
        .unwrap();

    let options = DestroyOptions::default();
    assert_eq!(engine.destroy(&post, &options).await.unwrap(), 1);
    assert_eq!(engine.count(&post, &FindOptions::default()).await.unwrap(), 0);
    assert_eq!(engine.stored_rows("Post"), 1);

    assert_eq!(engine.restore(&post, &options).await.unwrap(), 1);
    assert_eq!(engine.count(&post, &FindOptions::default()).await.unwrap(), 1);

    let force = DestroyOptions {
        force: true,
        ..Default::default()
    };
    engine.destroy(&post, &force).await.unwrap();
    assert_eq!(engine.stored_rows("Post"), 0);
}

#[tokio::test]
async fn test_rollback_restores_snapshot() {
    let (engine, user, _, _) = setup();
    let tx = engine.begin().await.unwrap();
    engine
        .create(
            &user,
            record(json!({ "name": "Ghost" })),
            WriteOptions {
                validate: true,
                transaction: Some(tx),
            },
        )
        .await
        .unwrap();
    engine.rollback(tx).await.unwrap();
    assert_eq!(engine.count(&user, &FindOptions::default()).await.unwrap(), 0);

    assert!(matches!(
        engine.commit(tx).await,
        Err(StorageError::Transaction(_))
    ));
}

#[tokio::test]
async fn test_upsert_by_primary_key() {
    let (engine, user, _, _) = setup();
    let (created, was_created) = engine
        .upsert(&user, record(json!({ "name": "Ann" })), WriteOptions::default())
        .await
        .unwrap();
    assert!(was_created);

    let id = created.get("id").cloned().unwrap();
    let (updated, was_created) = engine
        .upsert(
            &user,
            record(json!({ "id": id, "name": "Anne" })),
            WriteOptions::default(),
        )
        .await
        .unwrap();
    assert!(!was_created);
    assert_eq!(updated.get("name"), Some(&json!("Anne")));
    assert_eq!(engine.stored_rows("User"), 1);
}
