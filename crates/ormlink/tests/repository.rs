//! Repository reads and writes over the in-memory engine.

mod common;

use common::{record, repositories, User, Users};
use ormlink::prelude::*;
use ormlink::proto::TableOptions;
use ormlink_core::validation::UNIQUE;
use pretty_assertions::assert_eq;
use serde_json::json;

fn partial(value: serde_json::Value) -> Partial<ormlink_core::MemoryInstance> {
    Partial::from_record(&User::model(), record(value))
}

#[tokio::test]
async fn test_create_with_new_mentee_stamps_foreign_key() {
    let (users, _, _) = repositories();
    let query = users.query().unwrap().include(|f| f.mentee, None).unwrap();

    let bruce = users
        .create(
            &query,
            partial(json!({ "name": "Bruce", "mentee": { "name": "Dick" } })),
            &PersistOptions::default(),
        )
        .await
        .unwrap();

    let mentee = bruce.related("mentee").and_then(|t| t.as_one()).unwrap();
    assert_eq!(mentee.get("name"), Some(&json!("Dick")));
    assert_eq!(mentee.get("mentorId"), bruce.get("id"));
    assert_eq!(users.count(&users.query().unwrap()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_create_without_includes_ignores_association_values() {
    let (users, _, _) = repositories();
    let bruce = users
        .create(
            &users.query().unwrap(),
            partial(json!({ "name": "Bruce", "mentee": { "name": "Dick" } })),
            &PersistOptions::default(),
        )
        .await
        .unwrap();

    assert!(bruce.related("mentee").is_none());
    assert_eq!(users.count(&users.query().unwrap()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_find_or_create() {
    let (users, _, _) = repositories();
    let options = PersistOptions::default();
    let existing = users
        .create(&users.query().unwrap(), partial(json!({ "name": "Bruce", "age": 40 })), &options)
        .await
        .unwrap();

    let bruce = users.query().unwrap().filter(|f| f.name.eq("Bruce"));
    let (found, created) = users
        .find_or_create(&bruce, Partial::new().with_field("age", 99), &options)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(found.get("id"), existing.get("id"));
    assert_eq!(found.get("age"), Some(&json!(40)));

    let alfred = users
        .query()
        .unwrap()
        .filter(|f| f.name.eq("Alfred").and(f.age.gt(60)));
    let (row, created) = users
        .find_or_create(&alfred, Partial::new().with_field("age", 70), &options)
        .await
        .unwrap();
    assert!(created);
    assert_eq!(row.get("name"), Some(&json!("Alfred")));
    assert_eq!(row.get("age"), Some(&json!(70)));
}

#[tokio::test]
async fn test_nested_failure_is_prefixed_with_alias() {
    let (users, _, _) = repositories();
    let options = PersistOptions::default();
    users
        .create(
            &users.query().unwrap(),
            partial(json!({ "name": "Alfred", "email": "alfred@wayne.com" })),
            &options,
        )
        .await
        .unwrap();

    let query = users.query().unwrap().include(|f| f.mentor, None).unwrap();
    let err = users
        .create(
            &query,
            partial(json!({
                "name": "Dick",
                "mentor": { "name": "Impostor", "email": "alfred@wayne.com" },
            })),
            &options,
        )
        .await
        .unwrap_err();

    let validation = err.as_validation().unwrap();
    assert_eq!(validation.errors_for("mentor.email")[0].kind, UNIQUE);
    assert_eq!(validation.failing_keys(), vec!["mentor.email"]);
}

#[tokio::test]
async fn test_two_level_failure_keeps_dotted_path() {
    let (users, _, _) = repositories();
    let options = PersistOptions::default();
    users
        .create(
            &users.query().unwrap(),
            partial(json!({ "name": "Alfred", "email": "alfred@wayne.com" })),
            &options,
        )
        .await
        .unwrap();

    let mentors = users.query().unwrap().include(|f| f.mentor, None).unwrap();
    let query = users
        .query()
        .unwrap()
        .include(|f| f.mentor, Some(mentors))
        .unwrap();
    let err = users
        .create(
            &query,
            partial(json!({
                "name": "Dick",
                "mentor": {
                    "name": "Bruce",
                    "mentor": { "name": "Impostor", "email": "alfred@wayne.com" },
                },
            })),
            &options,
        )
        .await
        .unwrap_err();

    let validation = err.as_validation().unwrap();
    assert_eq!(validation.errors_for("mentor.mentor.email")[0].kind, UNIQUE);
}

#[tokio::test]
async fn test_belongs_to_foreign_key_short_circuits() {
    let (users, _, _) = repositories();
    let options = PersistOptions::default();
    let bruce = users
        .create(&users.query().unwrap(), partial(json!({ "name": "Bruce" })), &options)
        .await
        .unwrap();

    let query = users.query().unwrap().include(|f| f.mentor, None).unwrap();
    let dick = users
        .create(
            &query,
            partial(json!({
                "name": "Dick",
                "mentorId": bruce.get("id").cloned().unwrap(),
                "mentor": { "name": "Ignored" },
            })),
            &options,
        )
        .await
        .unwrap();

    assert_eq!(dick.get("mentorId"), bruce.get("id"));
    assert_eq!(users.count(&users.query().unwrap()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_null_clears_association() {
    let (users, _, _) = repositories();
    let options = PersistOptions::default();
    let bruce = users
        .create(&users.query().unwrap(), partial(json!({ "name": "Bruce" })), &options)
        .await
        .unwrap();
    let dick = users
        .create(
            &users.query().unwrap(),
            partial(json!({ "name": "Dick", "mentorId": bruce.get("id").cloned().unwrap() })),
            &options,
        )
        .await
        .unwrap();

    let query = users
        .query()
        .unwrap()
        .include(|f| f.mentor, None)
        .unwrap()
        .filter(|f| f.name.eq("Dick"));
    let rows = users
        .update(&query, Partial::new().with_null("mentor"), &options)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("mentorId"), Some(&json!(null)));
    assert!(matches!(rows[0].related("mentor"), Some(AssociationTarget::None)));

    let reread = users
        .find_by_id(&users.query().unwrap(), dick.get("id").cloned().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reread.get("mentorId"), Some(&json!(null)));
}

#[tokio::test]
async fn test_attach_only_does_not_write_nested_rows() {
    let (users, _, tags) = repositories();
    let options = PersistOptions::default();
    let bat = tags
        .create(&tags.query().unwrap(), Partial::new().with_field("label", "bat"), &options)
        .await
        .unwrap();
    let id = bat.get("id").cloned().unwrap();

    let attach = users
        .query()
        .unwrap()
        .include(|f| f.tags.associate_only(), None)
        .unwrap();
    let bruce = users
        .create(
            &attach,
            partial(json!({ "name": "Bruce", "tags": [{ "id": id, "label": "renamed" }] })),
            &options,
        )
        .await
        .unwrap();
    let linked = bruce.related("tags").and_then(|t| t.as_many()).unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].get("label"), Some(&json!("bat")));

    let cascade = users.query().unwrap().include(|f| f.tags, None).unwrap();
    let alfred = users
        .create(
            &cascade,
            partial(json!({ "name": "Alfred", "tags": [{ "id": id, "label": "renamed" }] })),
            &options,
        )
        .await
        .unwrap();
    let linked = alfred.related("tags").and_then(|t| t.as_many()).unwrap();
    assert_eq!(linked[0].get("label"), Some(&json!("renamed")));
}

#[tokio::test]
async fn test_bare_keys_and_instances_attach() {
    let (users, _, tags) = repositories();
    let options = PersistOptions::default();
    let created = tags
        .bulk_create(
            &tags.query().unwrap(),
            vec![
                Partial::new().with_field("label", "rich"),
                Partial::new().with_field("label", "bat"),
            ],
            &options,
        )
        .await
        .unwrap();

    let query = users
        .query()
        .unwrap()
        .include(|f| f.tags.associate_only(), None)
        .unwrap();
    let values = Partial::new().with_field("name", "Bruce").with_many(
        "tags",
        vec![
            Related::Key(created[0].get("id").cloned().unwrap()),
            Related::Instance(created[1].clone()),
        ],
    );
    let bruce = users.create(&query, values, &options).await.unwrap();

    let labels: Vec<_> = bruce
        .related("tags")
        .unwrap()
        .iter()
        .map(|t| t.get("label").cloned().unwrap())
        .collect();
    assert_eq!(labels, vec![json!("rich"), json!("bat")]);
}

#[tokio::test]
async fn test_save_updates_or_creates() {
    let (users, _, _) = repositories();
    let options = PersistOptions::default();
    let query = users.query().unwrap();

    let created = users
        .save(&query, partial(json!({ "name": "Bruce" })), &options)
        .await
        .unwrap()
        .unwrap();
    let id = created.get("id").cloned().unwrap();

    let updated = users
        .save(&query, partial(json!({ "id": id, "name": "Batman" })), &options)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.get("name"), Some(&json!("Batman")));

    let stale = users
        .save(&query, partial(json!({ "id": 999, "name": "Nobody" })), &options)
        .await
        .unwrap();
    assert!(stale.is_none());
    assert_eq!(users.count(&query).await.unwrap(), 1);
}

async fn age_of(users: &Users, name: &str) -> serde_json::Value {
    let q = users.query().unwrap().filter(|f| f.name.eq(name));
    users.max(&q, "age").await.unwrap()
}

#[tokio::test]
async fn test_update_readback_modes() {
    let (users, _, _) = repositories();
    let options = PersistOptions::default();
    for (name, email) in [("Alfred", "alfred@wayne.com"), ("Dick", "dick@wayne.com")] {
        users
            .create(
                &users.query().unwrap(),
                partial(json!({ "name": name, "email": email, "age": 20 })),
                &options,
            )
            .await
            .unwrap();
    }
    let failing = || {
        partial(json!({
            "age": 21,
            "mentor": { "name": "Impostor", "email": "alfred@wayne.com" },
        }))
    };
    let dick = users
        .query()
        .unwrap()
        .include(|f| f.mentor, None)
        .unwrap()
        .filter(|f| f.name.eq("Dick"));

    let transactional = users
        .clone()
        .with_config(RepositoryConfig::new().with_readback(ReadbackMode::Transactional));
    assert!(transactional.update(&dick, failing(), &options).await.is_err());
    assert_eq!(age_of(&users, "Dick").await, json!(20));

    assert!(users.update(&dick, failing(), &options).await.is_err());
    assert_eq!(age_of(&users, "Dick").await, json!(21));
}

#[tokio::test]
async fn test_caller_transaction_rollback() {
    let (users, _, _) = repositories();
    let tx = users.transaction().await.unwrap();
    let options = PersistOptions::default().with_transaction(tx);
    users
        .create(&users.query().unwrap(), partial(json!({ "name": "Ghost" })), &options)
        .await
        .unwrap();
    users.rollback(tx).await.unwrap();
    assert_eq!(users.count(&users.query().unwrap()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_aggregates() {
    let (users, _, _) = repositories();
    let rows = [40, 20, 70]
        .into_iter()
        .map(|age| Partial::new().with_field("name", "n").with_field("age", age))
        .collect();
    users
        .bulk_create(&users.query().unwrap(), rows, &PersistOptions::default())
        .await
        .unwrap();

    let all = users.query().unwrap();
    assert_eq!(users.sum(&all, "age").await.unwrap(), json!(130));
    assert_eq!(users.min(&all, "age").await.unwrap(), json!(20));
    let young = all.filter(|f| f.age.lt(50));
    assert_eq!(users.max(&young, "age").await.unwrap(), json!(40));
}

#[tokio::test]
async fn test_bulk_create_associates_each_row() {
    let (users, posts, _) = repositories();
    let query = users.query().unwrap().include(|f| f.posts, None).unwrap();
    let rows = vec![
        partial(json!({ "name": "Bruce", "posts": [{ "title": "a" }, { "title": "b" }] })),
        partial(json!({ "name": "Dick", "posts": [{ "title": "c" }] })),
    ];
    let created = users
        .bulk_create(&query, rows, &PersistOptions::default())
        .await
        .unwrap();

    let counts: Vec<_> = created
        .iter()
        .map(|u| u.related("posts").and_then(|t| t.as_many()).map_or(0, |p| p.len()))
        .collect();
    assert_eq!(counts, vec![2, 1]);
    assert_eq!(posts.count(&posts.query().unwrap()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_destroy_restore_and_truncate() {
    let (_, posts, _) = repositories();
    let options = PersistOptions::default();
    for title in ["a", "b"] {
        posts
            .create(&posts.query().unwrap(), Partial::new().with_field("title", title), &options)
            .await
            .unwrap();
    }

    let a = posts.query().unwrap().filter(|f| f.title.eq("a"));
    assert_eq!(posts.destroy(&a, false, None).await.unwrap(), 1);
    assert_eq!(posts.count(&posts.query().unwrap()).await.unwrap(), 1);
    assert_eq!(posts.restore(&a, None).await.unwrap(), 1);
    assert_eq!(posts.count(&posts.query().unwrap()).await.unwrap(), 2);

    posts.truncate(TableOptions::default()).await.unwrap();
    assert_eq!(posts.count(&posts.query().unwrap()).await.unwrap(), 0);
}
