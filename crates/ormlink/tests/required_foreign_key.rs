//! Creating owned rows whose foreign key column is NOT NULL.

mod common;

use std::sync::Arc;

use common::{init_tracing, record};
use ormlink::prelude::*;
use ormlink_core::{AssociationDef, AttributeDef, DataType};
use pretty_assertions::assert_eq;
use serde_json::json;

struct Owner;

struct OwnerFields {
    pets: Association<Pet>,
    license: Association<License>,
}

impl Entity for Owner {
    const NAME: &'static str = "Owner";
    type Fields = OwnerFields;

    fn model() -> ModelDef {
        ModelDef::new(Self::NAME)
            .with_attribute(AttributeDef::identity("id"))
            .with_attribute(AttributeDef::new("name", DataType::String))
            .with_association(AssociationDef::has_many("pets", "Pet").with_foreign_key("ownerId"))
            .with_association(AssociationDef::has_one("license", "License"))
    }

    fn fields() -> OwnerFields {
        OwnerFields {
            pets: Association::new("pets"),
            license: Association::new("license"),
        }
    }
}

struct Pet;

impl Entity for Pet {
    const NAME: &'static str = "Pet";
    type Fields = ();

    fn model() -> ModelDef {
        ModelDef::new(Self::NAME)
            .with_attribute(AttributeDef::identity("id"))
            .with_attribute(AttributeDef::new("name", DataType::String))
            .with_attribute(AttributeDef::new("ownerId", DataType::Integer))
    }

    fn fields() -> Self::Fields {}
}

struct License;

impl Entity for License {
    const NAME: &'static str = "License";
    type Fields = ();

    fn model() -> ModelDef {
        ModelDef::new(Self::NAME)
            .with_attribute(AttributeDef::identity("id"))
            .with_attribute(AttributeDef::new("number", DataType::String))
            .with_attribute(AttributeDef::new("OwnerId", DataType::Integer))
    }

    fn fields() -> Self::Fields {}
}

fn owners() -> Repository<Owner, MemoryEngine> {
    init_tracing();
    let registry = Arc::new(Registry::new());
    registry.register_entity::<Owner>().unwrap();
    registry.register_entity::<Pet>().unwrap();
    registry.register_entity::<License>().unwrap();
    let engine = Arc::new(MemoryEngine::new(registry.clone()));
    Repository::new(engine, registry).unwrap()
}

#[tokio::test]
async fn test_create_stamps_required_foreign_key_before_nested_insert() {
    let owners = owners();
    let query = owners
        .query()
        .unwrap()
        .include(|f| f.pets, None)
        .unwrap()
        .include(|f| f.license, None)
        .unwrap();

    let values = Partial::from_record(
        &Owner::model(),
        record(json!({
            "name": "Ann",
            "pets": [{ "name": "Rex" }, { "name": "Tom" }],
            "license": { "number": "L-1" },
        })),
    );
    let ann = owners
        .create(&query, values, &PersistOptions::default())
        .await
        .unwrap();

    let pets = ann.related("pets").and_then(|t| t.as_many()).unwrap();
    assert_eq!(pets.len(), 2);
    assert!(pets.iter().all(|pet| pet.get("ownerId") == ann.get("id")));

    let license = ann.related("license").and_then(|t| t.as_one()).unwrap();
    assert_eq!(license.get("number"), Some(&json!("L-1")));
    assert_eq!(license.get("OwnerId"), ann.get("id"));
}
