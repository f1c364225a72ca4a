mod common;

use ashiato::error::AppError;
use ashiato::store::Watermarks;
use common::{count_rows, insert_edge_at, seed_user, test_state};

#[tokio::test]
async fn befriending_is_symmetric_and_idempotent() {
    let (state, _temp) = test_state();
    let alice = seed_user(&state, "alice").await;
    let bob = seed_user(&state, "bob").await;

    assert!(!state.friends.is_friend(alice.id, bob.id).await.unwrap());
    // A negative answer is not remembered
    assert_eq!(state.friends.cached_pairs(), 0);

    assert!(state.friends.create_friendship(alice.id, bob.id).await.unwrap());
    assert!(!state.friends.create_friendship(bob.id, alice.id).await.unwrap());

    assert!(state.friends.is_friend(alice.id, bob.id).await.unwrap());
    assert!(state.friends.is_friend(bob.id, alice.id).await.unwrap());
    assert_eq!(count_rows(&state, "relations"), 2);
    assert_eq!(state.friends.cached_pairs(), 1);
}

#[tokio::test]
async fn cannot_befriend_yourself() {
    let (state, _temp) = test_state();
    let alice = seed_user(&state, "alice").await;

    let result = state.friends.create_friendship(alice.id, alice.id).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(count_rows(&state, "relations"), 0);
}

#[tokio::test]
async fn lookup_by_unknown_account_is_not_found() {
    let (state, _temp) = test_state();
    let alice = seed_user(&state, "alice").await;

    let result = state
        .friends
        .is_friend_by_account_name(alice.id, "nobody")
        .await;
    assert!(matches!(result, Err(AppError::ContentNotFound)));
}

#[tokio::test]
async fn friend_list_is_newest_first_with_ties_by_id() {
    let (state, _temp) = test_state();
    let alice = seed_user(&state, "alice").await;
    let bob = seed_user(&state, "bob").await;
    let carol = seed_user(&state, "carol").await;
    let dave = seed_user(&state, "dave").await;

    insert_edge_at(&state, alice.id, bob.id, "2024-01-01 00:00:00.000");
    insert_edge_at(&state, alice.id, dave.id, "2024-03-01 00:00:00.000");
    insert_edge_at(&state, alice.id, carol.id, "2024-03-01 00:00:00.000");

    let friends = state.timeline.friends(alice.id).await.unwrap();
    let ids: Vec<i64> = friends.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![carol.id, dave.id, bob.id]);
    assert_eq!(friends[2].created_at, "2024-01-01 00:00:00.000");
}

#[tokio::test]
async fn reset_and_clear_forget_friendships() {
    let (state, _temp) = test_state();
    let alice = seed_user(&state, "alice").await;
    let bob = seed_user(&state, "bob").await;
    state.friends.create_friendship(alice.id, bob.id).await.unwrap();

    state
        .store
        .reset_to_watermarks(Watermarks {
            relations: 0,
            footprints: 0,
            entries: 0,
            comments: 0,
        })
        .await
        .unwrap();
    // The cache still answers from memory until cleared
    assert!(state.friends.is_friend(alice.id, bob.id).await.unwrap());

    state.friends.clear();
    assert!(!state.friends.is_friend(alice.id, bob.id).await.unwrap());
}
