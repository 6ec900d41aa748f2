//! Contract every item store must satisfy behind the repository.
//!
//! Each check expects an initialized, empty repository.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use itemdb::{Error, ItemRepository};
use serde_json::json;

/// Runs every contract check, clearing the store before each one.
pub async fn run_all(repo: &ItemRepository) {
    repo.delete_all().await.unwrap();
    add_assigns_identifier(repo).await;
    repo.delete_all().await.unwrap();
    add_keeps_supplied_identifier(repo).await;
    repo.delete_all().await.unwrap();
    duplicate_leaves_store_unchanged(repo).await;
    repo.delete_all().await.unwrap();
    missing_identifier_never_mutates(repo).await;
    repo.delete_all().await.unwrap();
    update_replaces_all_fields(repo).await;
    repo.delete_all().await.unwrap();
    delete_returns_prior_state(repo).await;
    repo.delete_all().await.unwrap();
    delete_all_reports_count(repo).await;
    repo.delete_all().await.unwrap();
    invalid_payloads_are_rejected(repo).await;
    repo.delete_all().await.unwrap();
}

pub async fn add_assigns_identifier(repo: &ItemRepository) {
    let item = repo
        .add_item(json!({ "name": "a", "tags": ["x"] }))
        .await
        .unwrap();
    assert!(!item.id_str().is_empty());

    let fetched = repo.get_by_id(item.id_str()).await.unwrap();
    assert_eq!(fetched, item);
    assert_eq!(fetched.get("name"), Some(&json!("a")));
    assert_eq!(fetched.get("tags"), Some(&json!(["x"])));

    let empty = repo.add_item(json!({ "id": "", "n": 1 })).await.unwrap();
    assert!(!empty.id_str().is_empty());
    assert_ne!(empty.id(), item.id());
}

pub async fn add_keeps_supplied_identifier(repo: &ItemRepository) {
    let item = repo.add_item(json!({ "id": "given", "n": 1 })).await.unwrap();
    assert_eq!(item.id_str(), "given");

    let legacy = repo
        .add_item(json!({ "_id": "legacy", "n": 2 }))
        .await
        .unwrap();
    assert_eq!(legacy.to_value(), json!({ "id": "legacy", "n": 2 }));
    assert_eq!(repo.get_by_id("legacy").await.unwrap(), legacy);
}

pub async fn duplicate_leaves_store_unchanged(repo: &ItemRepository) {
    repo.add_item(json!({ "id": "dup", "v": 1 })).await.unwrap();

    let result = repo.add_item(json!({ "id": "dup", "v": 2 })).await;
    assert!(matches!(result, Err(Error::DuplicateId(id)) if id == "dup"));

    let all = repo.get_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].get("v"), Some(&json!(1)));
}

pub async fn missing_identifier_never_mutates(repo: &ItemRepository) {
    let kept = repo.add_item(json!({ "id": "kept", "v": 1 })).await.unwrap();

    assert!(matches!(
        repo.get_by_id("absent").await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        repo.update_by_id("absent", json!({ "v": 2 })).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        repo.delete_by_id("absent").await,
        Err(Error::NotFound(_))
    ));

    assert_eq!(repo.get_all().await.unwrap(), vec![kept]);
}

pub async fn update_replaces_all_fields(repo: &ItemRepository) {
    repo.add_item(json!({ "id": "u", "a": 1, "b": 2 }))
        .await
        .unwrap();

    let updated = repo
        .update_by_id("u", json!({ "id": "ignored", "c": 3 }))
        .await
        .unwrap();
    assert_eq!(updated.to_value(), json!({ "id": "u", "c": 3 }));

    let fetched = repo.get_by_id("u").await.unwrap();
    assert_eq!(fetched, updated);
    assert!(fetched.get("a").is_none());
    assert!(matches!(
        repo.get_by_id("ignored").await,
        Err(Error::NotFound(_))
    ));
}

pub async fn delete_returns_prior_state(repo: &ItemRepository) {
    let item = repo.add_item(json!({ "name": "gone" })).await.unwrap();

    assert_eq!(repo.delete_by_id(item.id_str()).await.unwrap(), item);
    assert!(matches!(
        repo.get_by_id(item.id_str()).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        repo.delete_by_id(item.id_str()).await,
        Err(Error::NotFound(_))
    ));
}

pub async fn delete_all_reports_count(repo: &ItemRepository) {
    assert_eq!(repo.delete_all().await.unwrap(), 0);

    for n in 0..4 {
        repo.add_item(json!({ "n": n })).await.unwrap();
    }
    let before = repo.get_all().await.unwrap().len() as u64;

    assert_eq!(repo.delete_all().await.unwrap(), before);
    assert!(repo.get_all().await.unwrap().is_empty());
}

pub async fn invalid_payloads_are_rejected(repo: &ItemRepository) {
    for payload in [
        json!([1, 2]),
        json!("text"),
        json!(null),
        json!({ "id": 7 }),
    ] {
        assert!(matches!(
            repo.add_item(payload).await,
            Err(Error::InvalidInput(_))
        ));
    }

    repo.add_item(json!({ "id": "x" })).await.unwrap();
    assert!(matches!(
        repo.update_by_id("x", json!(42)).await,
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(repo.get_all().await.unwrap().len(), 1);
}
