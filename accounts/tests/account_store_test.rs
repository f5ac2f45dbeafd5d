mod common;

use account_store::store::{Document, StoreError, WriteConcern, WriteErrorCategory};
use account_store::users::{SESSIONS_COLLECTION, USERS_COLLECTION};
use account_store::{AccountStoreError, DocumentStore, Session};
use common::{TEST_EMAIL, create_test_accounts, prefs, test_user, with_store};
use serde_json::json;

//
// Accounts
//

#[tokio::test]
async fn test_add_user_uses_majority_write_concern() {
    let accounts = create_test_accounts().await;

    let added = accounts
        .add_user(&test_user(TEST_EMAIL))
        .await
        .expect("should add user");

    assert!(added);
    assert_eq!(
        accounts.store().write_concerns(USERS_COLLECTION),
        vec![WriteConcern::Majority]
    );
}

#[tokio::test]
async fn test_add_user_duplicate_email() {
    let accounts = create_test_accounts().await;
    let first = test_user(TEST_EMAIL);
    accounts.add_user(&first).await.expect("should add user");

    let second = test_user(TEST_EMAIL).with_attribute("name", "Impostor");
    let result = accounts.add_user(&second).await;

    match result {
        Err(AccountStoreError::DuplicateAccount(email)) => assert_eq!(email, TEST_EMAIL),
        other => panic!("Expected DuplicateAccount error, got {other:?}"),
    }

    let stored = accounts
        .get_user(TEST_EMAIL)
        .await
        .expect("should not error")
        .expect("first user should remain");
    assert_eq!(stored, first);
    assert_eq!(accounts.store().len(USERS_COLLECTION), 1);
}

#[tokio::test]
async fn test_add_user_write_failure_is_rejected() {
    let accounts = create_test_accounts().await;
    let failing = with_store(&accounts, |store| {
        store.failing_writes(WriteErrorCategory::ExecutionTimeout)
    });

    let result = failing.add_user(&test_user(TEST_EMAIL)).await;

    match result {
        Err(AccountStoreError::OperationRejected { operation, source }) => {
            assert_eq!(operation, "add_user");
            assert_eq!(source.category(), Some(WriteErrorCategory::ExecutionTimeout));
        }
        other => panic!("Expected OperationRejected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_add_user_attribute_cannot_replace_email() {
    let accounts = create_test_accounts().await;
    let user = test_user(TEST_EMAIL).with_attribute("email", "other@x.com");

    let result = accounts.add_user(&user).await;

    assert!(matches!(result, Err(AccountStoreError::InvalidArgument(_))));
    assert!(accounts.get_user(TEST_EMAIL).await.unwrap().is_none());
    assert!(accounts.get_user("other@x.com").await.unwrap().is_none());
    assert!(accounts.store().is_empty(USERS_COLLECTION));
}

#[tokio::test]
async fn test_get_user_passes_attributes_through() {
    let accounts = create_test_accounts().await;
    let user = test_user(TEST_EMAIL).with_preferences(prefs(json!({"favorite_fruit": "watermelon"})));
    accounts.add_user(&user).await.expect("should add user");

    let stored = accounts
        .get_user(TEST_EMAIL)
        .await
        .expect("should not error")
        .expect("user should exist");

    assert_eq!(stored, user);
    assert_eq!(stored.attribute("isAdmin"), Some(&json!(false)));
}

#[tokio::test]
async fn test_get_user_not_found() {
    let accounts = create_test_accounts().await;

    let user = accounts
        .get_user("missing@x.com")
        .await
        .expect("absence should not be an error");

    assert!(user.is_none());
}

#[tokio::test]
async fn test_get_user_store_down_is_read_failure() {
    let accounts = create_test_accounts().await;
    let down = with_store(&accounts, |store| store.disconnected());

    let result = down.get_user(TEST_EMAIL).await;

    assert!(matches!(
        result,
        Err(AccountStoreError::ReadFailed(StoreError::Unavailable(_)))
    ));
}

#[tokio::test]
async fn test_delete_user_missing_account() {
    let accounts = create_test_accounts().await;

    let result = accounts.delete_user("missing@x.com").await;

    match result {
        Err(AccountStoreError::AccountNotFound(email)) => assert_eq!(email, "missing@x.com"),
        other => panic!("Expected AccountNotFound error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_user_removes_account_and_session() {
    let accounts = create_test_accounts().await;
    accounts
        .add_user(&test_user(TEST_EMAIL))
        .await
        .expect("should add user");
    accounts
        .create_user_session(TEST_EMAIL, "tokA")
        .await
        .expect("should create session");

    let deleted = accounts
        .delete_user(TEST_EMAIL)
        .await
        .expect("should delete user");

    assert!(deleted);
    assert!(accounts.get_user(TEST_EMAIL).await.unwrap().is_none());
    assert!(accounts.get_user_session(TEST_EMAIL).await.unwrap().is_none());
    assert!(accounts.store().is_empty(SESSIONS_COLLECTION));
}

#[tokio::test]
async fn test_delete_user_is_not_idempotent() {
    let accounts = create_test_accounts().await;
    accounts
        .add_user(&test_user(TEST_EMAIL))
        .await
        .expect("should add user");

    accounts
        .delete_user(TEST_EMAIL)
        .await
        .expect("first delete should succeed");
    let second = accounts.delete_user(TEST_EMAIL).await;

    assert!(matches!(second, Err(AccountStoreError::AccountNotFound(_))));
}

#[tokio::test]
async fn test_delete_user_leaves_other_sessions() {
    let accounts = create_test_accounts().await;
    accounts
        .add_user(&test_user(TEST_EMAIL))
        .await
        .expect("should add user");
    accounts
        .create_user_session(TEST_EMAIL, "tokA")
        .await
        .expect("should create session");
    accounts
        .create_user_session("other@x.com", "tokB")
        .await
        .expect("should create session");

    accounts
        .delete_user(TEST_EMAIL)
        .await
        .expect("should delete user");

    assert_eq!(
        accounts.get_user_session("other@x.com").await.unwrap(),
        Some(Session::new("other@x.com", "tokB"))
    );
}

#[tokio::test]
async fn test_delete_user_unacknowledged_reports_false() {
    let accounts = create_test_accounts().await;
    accounts
        .add_user(&test_user(TEST_EMAIL))
        .await
        .expect("should add user");
    let unacknowledged = with_store(&accounts, |store| store.unacknowledged());

    let deleted = unacknowledged
        .delete_user(TEST_EMAIL)
        .await
        .expect("should not error");

    assert!(!deleted);
}

#[tokio::test]
async fn test_delete_user_write_failure_is_rejected() {
    let accounts = create_test_accounts().await;
    accounts
        .add_user(&test_user(TEST_EMAIL))
        .await
        .expect("should add user");
    let failing = with_store(&accounts, |store| {
        store.failing_writes(WriteErrorCategory::Uncategorized)
    });

    let result = failing.delete_user(TEST_EMAIL).await;

    assert!(matches!(
        result,
        Err(AccountStoreError::OperationRejected {
            operation: "delete_user",
            ..
        })
    ));
    assert!(accounts.get_user(TEST_EMAIL).await.unwrap().is_some());
}

//
// Sessions
//

#[tokio::test]
async fn test_create_session_twice_with_same_token() {
    let accounts = create_test_accounts().await;

    assert!(
        accounts
            .create_user_session("u1", "tokA")
            .await
            .expect("should create session")
    );
    let second = accounts.create_user_session("u1", "tokA").await;

    match second {
        Err(AccountStoreError::DuplicateSession { user_id }) => assert_eq!(user_id, "u1"),
        other => panic!("Expected DuplicateSession error, got {other:?}"),
    }
    assert_eq!(accounts.store().len(SESSIONS_COLLECTION), 1);
}

#[tokio::test]
async fn test_new_token_replaces_previous_session() {
    let accounts = create_test_accounts().await;

    accounts
        .create_user_session("u1", "tokA")
        .await
        .expect("should create session");
    accounts
        .create_user_session("u1", "tokB")
        .await
        .expect("should replace session");

    let session = accounts
        .get_user_session("u1")
        .await
        .expect("should not error");
    assert_eq!(session, Some(Session::new("u1", "tokB")));
    assert_eq!(accounts.store().len(SESSIONS_COLLECTION), 1);
}

#[tokio::test]
async fn test_previous_token_can_be_reissued_after_replacement() {
    let accounts = create_test_accounts().await;

    for jwt in ["tokA", "tokB", "tokA"] {
        accounts
            .create_user_session("u1", jwt)
            .await
            .expect("should create session");
    }

    let session = accounts.get_user_session("u1").await.unwrap();
    assert_eq!(session, Some(Session::new("u1", "tokA")));
}

#[tokio::test]
async fn test_sessions_of_different_users_are_independent() {
    let accounts = create_test_accounts().await;

    accounts.create_user_session("u1", "tok").await.unwrap();
    accounts.create_user_session("u2", "tok").await.unwrap();

    assert_eq!(accounts.store().len(SESSIONS_COLLECTION), 2);
}

#[tokio::test]
async fn test_create_session_write_failure_is_rejected() {
    let accounts = create_test_accounts().await;
    let failing = with_store(&accounts, |store| {
        store.failing_writes(WriteErrorCategory::Uncategorized)
    });

    let result = failing.create_user_session("u1", "tokA").await;

    assert!(matches!(
        result,
        Err(AccountStoreError::OperationRejected {
            operation: "create_user_session",
            ..
        })
    ));
}

#[tokio::test]
async fn test_create_session_unacknowledged_reports_false() {
    let accounts = create_test_accounts().await;
    let unacknowledged = with_store(&accounts, |store| store.unacknowledged());

    let created = unacknowledged
        .create_user_session("u1", "tokA")
        .await
        .expect("should not error");

    assert!(!created);
}

#[tokio::test]
async fn test_get_user_session_not_found() {
    let accounts = create_test_accounts().await;

    let session = accounts
        .get_user_session("nobody")
        .await
        .expect("absence should not be an error");

    assert!(session.is_none());
}

#[tokio::test]
async fn test_delete_user_sessions_nonexistent_is_success() {
    let accounts = create_test_accounts().await;

    let deleted = accounts
        .delete_user_sessions("nonexistent")
        .await
        .expect("should not error");

    assert!(deleted);
}

#[tokio::test]
async fn test_delete_user_sessions_removes_strays() {
    let accounts = create_test_accounts().await;
    // Sessions written behind the store's back, as a racing writer could.
    for jwt in ["tokA", "tokB"] {
        let mut document = Document::new();
        document.insert("userId".to_owned(), json!("u1"));
        document.insert("jwt".to_owned(), json!(jwt));
        accounts
            .store()
            .insert_one(SESSIONS_COLLECTION, document, WriteConcern::default())
            .await
            .unwrap();
    }

    assert!(accounts.delete_user_sessions("u1").await.unwrap());
    assert!(accounts.get_user_session("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_user_sessions_write_failure_is_rejected() {
    let accounts = create_test_accounts().await;
    let down = with_store(&accounts, |store| store.disconnected());

    let result = down.delete_user_sessions("u1").await;

    match result {
        Err(AccountStoreError::OperationRejected { operation, source }) => {
            assert_eq!(operation, "delete_user_sessions");
            assert!(matches!(source, StoreError::Unavailable(_)));
        }
        other => panic!("Expected OperationRejected error, got {other:?}"),
    }
}

//
// Preferences
//

#[tokio::test]
async fn test_update_preferences_absent_is_invalid() {
    let accounts = create_test_accounts().await;
    accounts
        .add_user(&test_user(TEST_EMAIL))
        .await
        .expect("should add user");

    let result = accounts.update_user_preferences(TEST_EMAIL, None).await;

    assert!(matches!(result, Err(AccountStoreError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_update_preferences_replaces_whole_map() {
    let accounts = create_test_accounts().await;
    let user = test_user(TEST_EMAIL).with_preferences(prefs(json!({"a": 1, "b": 2})));
    accounts.add_user(&user).await.expect("should add user");

    let updated = accounts
        .update_user_preferences(TEST_EMAIL, Some(prefs(json!({"c": [1, 2, 3]}))))
        .await
        .expect("should update preferences");

    assert!(updated);
    let stored = accounts.get_user(TEST_EMAIL).await.unwrap().unwrap();
    assert_eq!(stored.preferences, prefs(json!({"c": [1, 2, 3]})));
    assert_eq!(stored.attribute("name"), Some(&json!("Test User")));
}

#[tokio::test]
async fn test_update_preferences_identical_value_reports_false() {
    let accounts = create_test_accounts().await;
    accounts
        .add_user(&test_user(TEST_EMAIL))
        .await
        .expect("should add user");
    let preferences = prefs(json!({"theme": "dark"}));

    let first = accounts
        .update_user_preferences(TEST_EMAIL, Some(preferences.clone()))
        .await
        .expect("should not error");
    let second = accounts
        .update_user_preferences(TEST_EMAIL, Some(preferences))
        .await
        .expect("should not error");

    assert!(first);
    assert!(!second);
}

#[tokio::test]
async fn test_update_preferences_empty_map_only_counts_when_it_changes() {
    let accounts = create_test_accounts().await;
    let user = test_user(TEST_EMAIL).with_preferences(prefs(json!({"theme": "dark"})));
    accounts.add_user(&user).await.expect("should add user");

    let cleared = accounts
        .update_user_preferences(TEST_EMAIL, Some(prefs(json!({}))))
        .await
        .expect("empty preferences are valid");
    let again = accounts
        .update_user_preferences(TEST_EMAIL, Some(prefs(json!({}))))
        .await
        .expect("empty preferences are valid");

    assert!(cleared);
    assert!(!again);
    let stored = accounts.get_user(TEST_EMAIL).await.unwrap().unwrap();
    assert!(stored.preferences.is_empty());
}

#[tokio::test]
async fn test_update_preferences_unknown_user_reports_false() {
    let accounts = create_test_accounts().await;

    let updated = accounts
        .update_user_preferences("missing@x.com", Some(prefs(json!({"theme": "dark"}))))
        .await
        .expect("unknown user is not an error here");

    assert!(!updated);
    assert!(accounts.store().is_empty(USERS_COLLECTION));
}

#[tokio::test]
async fn test_update_preferences_write_failure_is_rejected() {
    let accounts = create_test_accounts().await;
    let failing = with_store(&accounts, |store| {
        store.failing_writes(WriteErrorCategory::Uncategorized)
    });

    let result = failing
        .update_user_preferences(TEST_EMAIL, Some(prefs(json!({}))))
        .await;

    assert!(matches!(
        result,
        Err(AccountStoreError::OperationRejected {
            operation: "update_user_preferences",
            ..
        })
    ));
}

//
// Indexes
//

#[tokio::test]
async fn test_ensure_indexes_is_repeatable() {
    let accounts = create_test_accounts().await;

    accounts
        .ensure_indexes()
        .await
        .expect("second call should be a no-op");
}

#[tokio::test]
async fn test_ensure_indexes_write_failure_is_rejected() {
    let accounts = create_test_accounts().await;
    let down = with_store(&accounts, |store| store.disconnected());

    assert!(matches!(
        down.ensure_indexes().await,
        Err(AccountStoreError::OperationRejected {
            operation: "ensure_indexes",
            ..
        })
    ));
}
