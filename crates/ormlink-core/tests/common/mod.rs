//! Shared test models: users with mentors, posts, and tags.

#![allow(dead_code)]

use std::sync::Arc;

use ormlink_core::{
    Association, AssociationDef, AttributeDef, DataType, Entity, ModelDef, Queryable, Registry,
};

pub struct User;

pub struct UserFields {
    pub id: Queryable<i64>,
    pub name: Queryable<String>,
    pub email: Queryable<Option<String>>,
    pub age: Queryable<Option<i64>>,
    pub mentor_id: Queryable<Option<i64>>,
    pub mentor: Association<User>,
    pub mentee: Association<User>,
    pub posts: Association<Post>,
    pub tags: Association<Tag>,
}

impl Entity for User {
    const NAME: &'static str = "User";
    type Fields = UserFields;

    fn model() -> ModelDef {
        ModelDef::new(Self::NAME)
            .with_attribute(AttributeDef::identity("id"))
            .with_attribute(AttributeDef::new("name", DataType::String))
            .with_attribute(AttributeDef::optional("email", DataType::String).with_unique())
            .with_attribute(AttributeDef::optional("age", DataType::Integer))
            .with_attribute(AttributeDef::optional("mentorId", DataType::Integer))
            .with_association(AssociationDef::belongs_to("mentor", "User"))
            .with_association(AssociationDef::has_one("mentee", "User"))
            .with_association(AssociationDef::has_many("posts", "Post"))
            .with_association(AssociationDef::belongs_to_many("tags", "Tag", "UserTag"))
    }

    fn fields() -> UserFields {
        UserFields {
            id: Queryable::attribute("id"),
            name: Queryable::attribute("name"),
            email: Queryable::attribute("email"),
            age: Queryable::attribute("age"),
            mentor_id: Queryable::attribute("mentorId"),
            mentor: Association::new("mentor"),
            mentee: Association::new("mentee"),
            posts: Association::new("posts"),
            tags: Association::new("tags"),
        }
    }
}

pub struct Post;

pub struct PostFields {
    pub id: Queryable<i64>,
    pub title: Queryable<String>,
    pub author_id: Queryable<Option<i64>>,
    pub author: Association<User>,
}

impl Entity for Post {
    const NAME: &'static str = "Post";
    type Fields = PostFields;

    fn model() -> ModelDef {
        ModelDef::new(Self::NAME)
            .with_attribute(AttributeDef::identity("id"))
            .with_attribute(AttributeDef::new("title", DataType::String))
            .with_attribute(AttributeDef::optional("authorId", DataType::Integer))
            .with_association(AssociationDef::belongs_to("author", "User"))
            .with_paranoid()
    }

    fn fields() -> PostFields {
        PostFields {
            id: Queryable::attribute("id"),
            title: Queryable::attribute("title"),
            author_id: Queryable::attribute("authorId"),
            author: Association::new("author"),
        }
    }
}

pub struct Tag;

pub struct TagFields {
    pub id: Queryable<i64>,
    pub label: Queryable<String>,
}

impl Entity for Tag {
    const NAME: &'static str = "Tag";
    type Fields = TagFields;

    fn model() -> ModelDef {
        ModelDef::new(Self::NAME)
            .with_attribute(AttributeDef::identity("id"))
            .with_attribute(AttributeDef::new("label", DataType::String).with_unique())
    }

    fn fields() -> TagFields {
        TagFields {
            id: Queryable::attribute("id"),
            label: Queryable::attribute("label"),
        }
    }
}

pub fn registry() -> Arc<Registry> {
    let registry = Registry::new();
    registry.register_entity::<User>().unwrap();
    registry.register_entity::<Post>().unwrap();
    registry.register_entity::<Tag>().unwrap();
    Arc::new(registry)
}
