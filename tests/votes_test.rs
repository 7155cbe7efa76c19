//! Integration tests for one-vote-per-item voting

mod common;
use serial_test::serial;

use common::{database::*, fixtures::*};
use engage::content::get_content;
use engage::orm::content::Category;
use engage::votes::{cast_vote, user_vote_map, VoteError, VoteOutcome};

#[actix_rt::test]
#[serial]
async fn test_second_vote_is_already_voted() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let user = create_test_user(&db, 3001, "Sara").await.unwrap();
    let poll = create_test_poll(&db, "Which season do you prefer?", &["Summer", "Winter"])
        .await
        .unwrap();
    let summer = poll.options[0].id;
    let winter = poll.options[1].id;

    let first = cast_vote(&db, user.id, poll.content.id, summer).await.unwrap();
    assert_eq!(
        first,
        VoteOutcome::Recorded {
            option_id: summer,
            correct: None
        }
    );

    let second = cast_vote(&db, user.id, poll.content.id, winter).await.unwrap();
    assert_eq!(second, VoteOutcome::AlreadyVoted);
    assert_eq!(second.sentinel(), Some("USER_ALREADY_VOTED"));

    let detail = get_content(&db, poll.content.id).await.unwrap().unwrap();
    assert_eq!(detail.total_votes, 1, "Only the first vote counts");
    assert_eq!(detail.options[0].option.vote_count, 1);
    assert_eq!(detail.options[0].percentage, 100.0);
    assert_eq!(detail.options[1].percentage, 0.0);

    let map = user_vote_map(&db, user.id).await.unwrap();
    assert_eq!(map.get(&poll.content.id), Some(&summer));
}

#[actix_rt::test]
#[serial]
async fn test_racing_votes_count_once() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let user = create_test_user(&db, 3002, "Bilal").await.unwrap();
    let poll = create_test_poll(&db, "Best time for a walk?", &["Morning", "Evening"])
        .await
        .unwrap();
    let option_id = poll.options[1].id;

    let attempts = (0..5).map(|_| cast_vote(&db, user.id, poll.content.id, option_id));
    let outcomes = futures::future::join_all(attempts).await;

    let recorded = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(VoteOutcome::Recorded { .. })))
        .count();
    assert_eq!(recorded, 1);

    let detail = get_content(&db, poll.content.id).await.unwrap().unwrap();
    assert_eq!(detail.total_votes, 1);
}

#[actix_rt::test]
#[serial]
async fn test_quiz_vote_reports_correctness() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let alice = create_test_user(&db, 3003, "Alice").await.unwrap();
    let bob = create_test_user(&db, 3004, "Bob").await.unwrap();
    let quiz = create_test_challenge(&db, Category::Math, "What is seven times six?", &["42", "48"], 0)
        .await
        .unwrap();
    assert!(quiz.is_quiz());

    let right = cast_vote(&db, alice.id, quiz.content.id, quiz.options[0].id)
        .await
        .unwrap();
    assert!(matches!(right, VoteOutcome::Recorded { correct: Some(true), .. }));

    let wrong = cast_vote(&db, bob.id, quiz.content.id, quiz.options[1].id)
        .await
        .unwrap();
    assert!(matches!(wrong, VoteOutcome::Recorded { correct: Some(false), .. }));
}

#[actix_rt::test]
#[serial]
async fn test_option_from_other_content_is_rejected() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let user = create_test_user(&db, 3005, "Hana").await.unwrap();
    let a = create_test_poll(&db, "First question here?", &["Yes", "No"]).await.unwrap();
    let b = create_test_poll(&db, "Second question here?", &["Yes", "No"]).await.unwrap();

    let result = cast_vote(&db, user.id, a.content.id, b.options[0].id).await;
    assert!(matches!(result, Err(VoteError::InvalidOption)));

    let result = cast_vote(&db, user.id, 99_999, a.options[0].id).await;
    assert!(matches!(result, Err(VoteError::ContentNotFound)));

    assert!(user_vote_map(&db, user.id).await.unwrap().is_empty());
}
