//! Scripted exercises against a live server.
//!
//! Every scenario opens its own session, runs a short sequence of operations
//! and closes the session again, whatever happened in between.

use mongodb::Database;
use rand::Rng;

use crate::{
    config::ConnectConfig,
    db::{AuthStyle, with_session},
    errors::{Result, StoreError},
    models::{GROUP_COLLECTION, Group, USER_COLLECTION, User, UserChanges},
    ops::{self, DeleteSummary, InsertAck, UpdateSummary},
};

pub const ID_RANGE: i64 = 100_000;
pub const DUPLICATE_ID_RANGE: i64 = 10_000;

pub const SCENARIO_NAMES: &[&str] = &[
    "connect", "insert", "duplicate", "mixed", "read", "update", "delete",
];

pub fn random_id(upper: i64) -> i64 {
    rand::thread_rng().gen_range(0..upper)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectReport {
    pub style: AuthStyle,
    pub database: String,
    pub collections: Vec<String>,
}

pub async fn connect(config: &ConnectConfig, style: AuthStyle) -> Result<ConnectReport> {
    with_session(config, style, |db| async move {
        let collections = db
            .list_collection_names()
            .await
            .map_err(|e| StoreError::from_driver("listCollections", db.name(), e))?;

        Ok::<_, StoreError>(ConnectReport {
            style,
            database: db.name().to_string(),
            collections,
        })
    })
    .await
}

pub async fn insert_user(config: &ConnectConfig, user: &User) -> Result<InsertAck> {
    with_session(config, AuthStyle::Credential, |db| async move {
        ops::insert_one(&db, USER_COLLECTION, user).await
    })
    .await
}

#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateOutcome {
    /// The second insert was rejected with a duplicate-key error.
    Rejected { user: User, message: String },
    /// The second insert went through, which means `_id` is not unique.
    Accepted { user: User },
}

/// Inserts the same user twice. The first insert must succeed; the second is
/// expected to fail with a duplicate-key error and any other error is fatal.
pub async fn insert_duplicate(config: &ConnectConfig, id: i64) -> Result<DuplicateOutcome> {
    let user = User::new(id, "name", "email");

    with_session(config, AuthStyle::Credential, |db| async move {
        ops::insert_one(&db, USER_COLLECTION, &user).await?;
        tracing::info!(id = user.id, "first insert succeeded");

        match ops::insert_one(&db, USER_COLLECTION, &user).await {
            Ok(_) => Ok::<_, StoreError>(DuplicateOutcome::Accepted { user }),
            Err(err) if err.is_duplicate_key() => {
                tracing::info!(id = user.id, error = %err, "second insert rejected as duplicate");
                Ok(DuplicateOutcome::Rejected {
                    user,
                    message: err.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    })
    .await
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixedReport {
    pub user: User,
    pub user_ack: InsertAck,
    pub group: Group,
    pub group_ack: InsertAck,
}

/// Stores a user and a group derived from it, each in its own collection.
pub async fn insert_mixed(config: &ConnectConfig, id: i64) -> Result<MixedReport> {
    let user = User::numbered(id);
    let group = Group::for_user(&user);

    with_session(config, AuthStyle::Credential, |db| async move {
        let user_ack = ops::insert_one(&db, USER_COLLECTION, &user).await?;
        let group_ack = ops::insert_one(&db, GROUP_COLLECTION, &group).await?;

        Ok::<_, StoreError>(MixedReport {
            user,
            user_ack,
            group,
            group_ack,
        })
    })
    .await
}

/// Inserts a numbered user, then reads back every user sharing its name.
pub async fn read_by_name(config: &ConnectConfig, id: i64) -> Result<Vec<User>> {
    let user = User::numbered(id);

    with_session(config, AuthStyle::Credential, |db| async move {
        ops::insert_one(&db, USER_COLLECTION, &user).await?;
        users_named(&db, &user.name).await
    })
    .await
}

pub async fn read_all_named(config: &ConnectConfig, name: &str) -> Result<Vec<User>> {
    with_session(config, AuthStyle::Credential, |db| async move {
        users_named(&db, name).await
    })
    .await
}

pub async fn update_by_name(
    config: &ConnectConfig,
    name: &str,
    changes: &UserChanges,
) -> Result<UpdateSummary> {
    with_session(config, AuthStyle::Credential, |db| async move {
        ops::set_fields(&db, USER_COLLECTION, ops::eq_filter(User::NAME, name), changes).await
    })
    .await
}

pub async fn delete_by_name(config: &ConnectConfig, name: &str) -> Result<DeleteSummary> {
    with_session(config, AuthStyle::Credential, |db| async move {
        ops::delete_one(&db, USER_COLLECTION, ops::eq_filter(User::NAME, name)).await
    })
    .await
}

async fn users_named(db: &Database, name: &str) -> Result<Vec<User>> {
    ops::find::<User>(db, USER_COLLECTION, ops::eq_filter(User::NAME, name))
        .await?
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    //! These need a `mongod` on localhost:27017 with a `user`/`pass` account in
    //! `admin`. Run with `cargo test -- --ignored`.

    use super::*;
    use crate::db::Session;
    use mongodb::bson::{Bson, doc};
    use std::time::Duration;

    fn live_config() -> ConnectConfig {
        ConnectConfig {
            server_selection_timeout: Some(Duration::from_secs(5)),
            ..ConnectConfig::from_env().unwrap()
        }
    }

    async fn cleanup_user(config: &ConnectConfig, id: i64) {
        with_session(config, AuthStyle::Credential, |db| async move {
            ops::delete_many(&db, USER_COLLECTION, ops::eq_filter(User::ID, id)).await
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_random_id_in_range() {
        for _ in 0..1000 {
            let id = random_id(DUPLICATE_ID_RANGE);
            assert!((0..DUPLICATE_ID_RANGE).contains(&id));
        }
    }

    #[tokio::test]
    #[ignore = "needs a running mongod"]
    async fn test_connect_both_styles() {
        let config = live_config();

        for style in [AuthStyle::Uri, AuthStyle::Credential] {
            let report = connect(&config, style).await.unwrap();
            assert_eq!(report.database, config.db);
            assert_eq!(report.style, style);
        }
    }

    #[tokio::test]
    #[ignore = "needs a running mongod"]
    async fn test_connect_rejects_bad_credentials() {
        let config = ConnectConfig {
            pass: "definitely-not-the-password".into(),
            ..live_config()
        };

        for style in [AuthStyle::Uri, AuthStyle::Credential] {
            let err = Session::open(&config, style).await.unwrap_err();
            assert!(matches!(err, StoreError::Connect { .. }), "got {err:?}");
        }
    }

    #[tokio::test]
    #[ignore = "needs a running mongod"]
    async fn test_insert_returns_assigned_id() {
        let config = live_config();
        let user = User::numbered(random_id(ID_RANGE) + 1_000_000);

        let ack = insert_user(&config, &user).await.unwrap();
        assert_eq!(ack.inserted_id, Bson::Int64(user.id));

        cleanup_user(&config, user.id).await;
    }

    #[tokio::test]
    #[ignore = "needs a running mongod"]
    async fn test_second_insert_is_duplicate() {
        let config = live_config();
        let id = random_id(DUPLICATE_ID_RANGE) + 2_000_000;

        match insert_duplicate(&config, id).await.unwrap() {
            DuplicateOutcome::Rejected { message, .. } => {
                assert!(message.contains("E11000 duplicate key error"), "{message}");
                assert!(message.contains("mst_user"), "{message}");
            }
            other => panic!("expected duplicate rejection, got {other:?}"),
        }

        cleanup_user(&config, id).await;
    }

    #[tokio::test]
    #[ignore = "needs a running mongod"]
    async fn test_shapes_coexist() {
        let config = live_config();
        let id = random_id(ID_RANGE) + 3_000_000;

        let report = insert_mixed(&config, id).await.unwrap();
        assert_eq!(report.user_ack.inserted_id, Bson::Int64(id));
        assert!(matches!(report.group_ack.inserted_id, Bson::ObjectId(_)));

        let group_id = report.group.group_id.clone();
        with_session(&config, AuthStyle::Credential, |db| async move {
            let groups = ops::find::<Group>(
                &db,
                GROUP_COLLECTION,
                ops::eq_filter(Group::GROUP_ID, group_id.as_str()),
            )
            .await?
            .collect()
            .await?;
            assert_eq!(groups, vec![report.group.clone()]);

            ops::delete_many(&db, GROUP_COLLECTION, ops::eq_filter(Group::GROUP_ID, group_id))
                .await
        })
        .await
        .unwrap();
        cleanup_user(&config, id).await;
    }

    #[tokio::test]
    #[ignore = "needs a running mongod"]
    async fn test_read_filters_by_exact_name() {
        let config = live_config();
        let id = random_id(ID_RANGE) + 4_000_000;

        let users = read_by_name(&config, id).await.unwrap();
        assert_eq!(users, vec![User::numbered(id)]);

        let name = format!("name-{id}");
        assert!(
            read_all_named(&config, &name)
                .await
                .unwrap()
                .iter()
                .all(|u| u.name == name)
        );

        cleanup_user(&config, id).await;
    }

    #[tokio::test]
    #[ignore = "needs a running mongod"]
    async fn test_undecodable_record_aborts_read() {
        let config = live_config();
        let id = random_id(ID_RANGE) + 7_000_000;
        let bad_id = format!("x-{id}");
        let name = format!("name-{id}");

        let outcome = with_session(&config, AuthStyle::Credential, |db| async move {
            ops::insert_one(
                &db,
                USER_COLLECTION,
                &doc! { "_id": bad_id.as_str(), "name": name.as_str(), "email": "email" },
            )
            .await?;

            let read = ops::find::<User>(&db, USER_COLLECTION, ops::eq_filter(User::NAME, name))
                .await?
                .collect()
                .await;

            ops::delete_many(&db, USER_COLLECTION, ops::eq_filter(User::ID, bad_id)).await?;
            Ok::<_, StoreError>(read)
        })
        .await
        .unwrap();

        assert!(
            matches!(outcome, Err(StoreError::Decode { ref collection, .. }) if collection == USER_COLLECTION),
            "got {outcome:?}"
        );
    }

    #[tokio::test]
    #[ignore = "needs a running mongod"]
    async fn test_update_reports_matches() {
        let config = live_config();
        let id = random_id(ID_RANGE) + 5_000_000;
        let changes = UserChanges {
            email: Some(format!("email-{id}-updated")),
            ..UserChanges::default()
        };

        let missing = update_by_name(&config, &format!("name-{id}-missing"), &changes)
            .await
            .unwrap();
        assert_eq!(missing, UpdateSummary { matched: 0, modified: 0 });

        insert_user(&config, &User::numbered(id)).await.unwrap();
        let updated = update_by_name(&config, &format!("name-{id}"), &changes)
            .await
            .unwrap();
        assert_eq!(updated, UpdateSummary { matched: 1, modified: 1 });

        let users = read_all_named(&config, &format!("name-{id}")).await.unwrap();
        assert_eq!(users[0].email, format!("email-{id}-updated"));
        assert_eq!(users[0].id, id);

        cleanup_user(&config, id).await;
    }

    #[tokio::test]
    #[ignore = "needs a running mongod"]
    async fn test_delete_removes_match() {
        let config = live_config();
        let id = random_id(ID_RANGE) + 6_000_000;
        let name = format!("name-{id}");

        insert_user(&config, &User::numbered(id)).await.unwrap();

        let deleted = delete_by_name(&config, &name).await.unwrap();
        assert_eq!(deleted, DeleteSummary { deleted: 1 });
        assert!(read_all_named(&config, &name).await.unwrap().is_empty());

        let again = delete_by_name(&config, &name).await.unwrap();
        assert_eq!(again, DeleteSummary { deleted: 0 });
    }
}
