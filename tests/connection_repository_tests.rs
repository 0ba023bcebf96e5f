//! SeaORM repository tests against in-memory SQLite.

#[path = "test_utils/mod.rs"]
mod test_utils;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use social_linker::models::{OAuthStateNonce, SocialConnection, connection};
use social_linker::providers::Platform;
use social_linker::repositories::{ConnectionRepository, OAuthStateRepository};
use social_linker::store::{ConnectionStore, NewConnection, StateNonceStore, StoreError};
use test_utils::{setup_test_db, test_crypto_key};

fn new_connection(user_id: &str, platform: Platform, access_token: &str) -> NewConnection {
    NewConnection {
        user_id: user_id.to_string(),
        platform,
        platform_user_id: format!("{}-remote", user_id),
        platform_user_name: "Remote Name".to_string(),
        access_token: access_token.to_string(),
        refresh_token: Some(format!("{}-refresh", access_token)),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        scopes: ["profile", "openid"].iter().map(|s| s.to_string()).collect(),
    }
}

async fn repository() -> (ConnectionRepository, Arc<sea_orm::DatabaseConnection>) {
    let db = Arc::new(setup_test_db().await.expect("Failed to set up test database"));
    (ConnectionRepository::new(db.clone(), test_crypto_key()), db)
}

#[tokio::test]
async fn test_upsert_inserts_then_overwrites_in_place() {
    let (repo, db) = repository().await;

    let first = repo
        .upsert(new_connection("user-1", Platform::Linkedin, "tok1"))
        .await
        .unwrap();
    assert_eq!(first.access_token, "tok1");
    assert_eq!(first.refresh_token.as_deref(), Some("tok1-refresh"));

    let mut relink = new_connection("user-1", Platform::Linkedin, "tok2");
    relink.refresh_token = None;
    relink.expires_at = None;
    relink.platform_user_name = "Renamed".to_string();
    let second = repo.upsert(relink).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(second.access_token, "tok2");
    assert_eq!(second.refresh_token, None);
    assert_eq!(second.expires_at, None);
    assert_eq!(second.platform_user_name, "Renamed");

    let rows = SocialConnection::find().count(&*db).await.unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_tokens_are_encrypted_at_rest() {
    let (repo, db) = repository().await;
    repo.upsert(new_connection("user-1", Platform::Twitter, "plain-access"))
        .await
        .unwrap();

    let row = SocialConnection::find()
        .one(&*db)
        .await
        .unwrap()
        .expect("row stored");
    assert!(
        !row.access_token_ciphertext
            .windows(b"plain-access".len())
            .any(|w| w == b"plain-access")
    );
    let refresh = row.refresh_token_ciphertext.expect("refresh stored");
    assert!(
        !refresh
            .windows(b"plain-access-refresh".len())
            .any(|w| w == b"plain-access-refresh")
    );
}

#[tokio::test]
async fn test_ciphertext_is_bound_to_its_owner() {
    let (repo, db) = repository().await;
    repo.upsert(new_connection("user-1", Platform::Linkedin, "tok1"))
        .await
        .unwrap();

    // Reassign the encrypted row to another user
    let row = SocialConnection::find().one(&*db).await.unwrap().unwrap();
    let mut active: connection::ActiveModel = row.into();
    active.user_id = Set("user-2".to_string());
    active.update(&*db).await.unwrap();

    let result = repo.find("user-2", Platform::Linkedin).await;
    assert!(matches!(result, Err(StoreError::Crypto(_))));
}

#[tokio::test]
async fn test_wrong_key_cannot_read_tokens() {
    let (repo, db) = repository().await;
    repo.upsert(new_connection("user-1", Platform::Linkedin, "tok1"))
        .await
        .unwrap();

    let other_key = social_linker::crypto::CryptoKey::new(vec![7u8; 32]).unwrap();
    let other = ConnectionRepository::new(db, other_key);
    assert!(matches!(
        other.find("user-1", Platform::Linkedin).await,
        Err(StoreError::Crypto(_))
    ));
}

#[tokio::test]
async fn test_scopes_are_stored_sorted() {
    let (repo, db) = repository().await;
    let mut record = new_connection("user-1", Platform::Facebook, "tok1");
    record.scopes = ["pages_show_list", "email", "public_profile"]
        .iter()
        .map(|s| s.to_string())
        .collect::<BTreeSet<_>>();
    let stored = repo.upsert(record).await.unwrap();

    assert_eq!(
        stored.scopes.iter().cloned().collect::<Vec<_>>(),
        vec!["email", "pages_show_list", "public_profile"]
    );

    let row = SocialConnection::find().one(&*db).await.unwrap().unwrap();
    assert_eq!(
        row.scopes,
        serde_json::json!(["email", "pages_show_list", "public_profile"])
    );
}

#[tokio::test]
async fn test_list_is_scoped_to_user_and_ordered_by_platform() {
    let (repo, _db) = repository().await;
    for platform in [Platform::Twitter, Platform::Facebook, Platform::Linkedin] {
        repo.upsert(new_connection("user-1", platform, "tok"))
            .await
            .unwrap();
    }
    repo.upsert(new_connection("user-2", Platform::Instagram, "tok"))
        .await
        .unwrap();

    let platforms: Vec<Platform> = repo
        .list_for_user("user-1")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.platform)
        .collect();
    assert_eq!(
        platforms,
        vec![Platform::Facebook, Platform::Linkedin, Platform::Twitter]
    );
    assert!(repo.list_for_user("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_reports_whether_a_row_was_removed() {
    let (repo, _db) = repository().await;
    repo.upsert(new_connection("user-1", Platform::Linkedin, "tok"))
        .await
        .unwrap();

    assert!(!repo.delete("user-2", Platform::Linkedin).await.unwrap());
    assert!(repo.delete("user-1", Platform::Linkedin).await.unwrap());
    assert!(!repo.delete("user-1", Platform::Linkedin).await.unwrap());
    assert!(repo.find("user-1", Platform::Linkedin).await.unwrap().is_none());
}

#[tokio::test]
async fn test_nonce_can_be_consumed_once() {
    let db = Arc::new(setup_test_db().await.unwrap());
    let ledger = OAuthStateRepository::new(db.clone());
    let now = Utc::now();
    let expires_at = now + Duration::minutes(10);

    assert!(
        ledger
            .consume("nonce-1", "user-1", Platform::Twitter, expires_at, now)
            .await
            .unwrap()
    );
    assert!(
        !ledger
            .consume("nonce-1", "user-1", Platform::Twitter, expires_at, now)
            .await
            .unwrap()
    );
    assert!(
        ledger
            .consume("nonce-2", "user-1", Platform::Twitter, expires_at, now)
            .await
            .unwrap()
    );
    assert_eq!(OAuthStateNonce::find().count(&*db).await.unwrap(), 2);
}

#[tokio::test]
async fn test_expired_nonces_are_purged() {
    let db = Arc::new(setup_test_db().await.unwrap());
    let ledger = OAuthStateRepository::new(db.clone());
    let now = Utc::now();
    let expired = now - Duration::minutes(1);

    ledger
        .consume("old", "user-1", Platform::Linkedin, expired, expired - Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(ledger.purge_expired(now).await.unwrap(), 1);
    assert_eq!(OAuthStateNonce::find().count(&*db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_consume_sweeps_expired_rows() {
    let db = Arc::new(setup_test_db().await.unwrap());
    let ledger = OAuthStateRepository::new(db.clone());
    let now = Utc::now();
    let expired = now - Duration::minutes(1);

    ledger
        .consume("old", "user-1", Platform::Linkedin, expired, expired - Duration::minutes(1))
        .await
        .unwrap();
    ledger
        .consume("fresh", "user-1", Platform::Linkedin, now + Duration::minutes(10), now)
        .await
        .unwrap();

    assert_eq!(OAuthStateNonce::find().count(&*db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_replay_within_validity_is_rejected_at_the_expiry_boundary() {
    let db = Arc::new(setup_test_db().await.unwrap());
    let ledger = OAuthStateRepository::new(db.clone());
    // Both redemptions happen while the state is still valid for the caller
    let validated_at = Utc::now() - Duration::minutes(10);
    let expires_at = validated_at + Duration::seconds(1);

    assert!(
        ledger
            .consume("edge", "user-1", Platform::Facebook, expires_at, validated_at)
            .await
            .unwrap()
    );
    assert!(
        !ledger
            .consume(
                "edge",
                "user-1",
                Platform::Facebook,
                expires_at,
                validated_at + Duration::milliseconds(500),
            )
            .await
            .unwrap()
    );
    assert_eq!(OAuthStateNonce::find().count(&*db).await.unwrap(), 1);
}
