use super::*;
use crate::types::Delivery;

fn msg(id: &str, upvotes: u32, downvotes: u32, user_vote: UserVote) -> Message {
    Message {
        id: MessageId::from(id),
        author: "alice".into(),
        content: format!("m-{id}"),
        upvotes,
        downvotes,
        user_vote,
        created_at: None,
    }
}

fn posted(id: &str, author: &str, content: &str) -> Message {
    Message {
        id: MessageId::from(id),
        author: author.into(),
        content: content.into(),
        upvotes: 0,
        downvotes: 0,
        user_vote: UserVote::None,
        created_at: None,
    }
}

fn seeded(messages: Vec<Message>) -> (MessageStore, VoteReconciler) {
    let mut store = MessageStore::new();
    let mut reconciler = VoteReconciler::new(Duration::from_secs(30));
    reconciler.reconcile(&mut store, messages);
    (store, reconciler)
}

fn id(raw: &str) -> MessageId {
    MessageId::from(raw)
}

#[test]
fn toggle_covers_every_transition() {
    let base = |user_vote| VoteTally::new(3, 2, user_vote);

    assert_eq!(
        toggle_vote(base(UserVote::None), VoteDirection::Upvote),
        VoteTally::new(4, 2, UserVote::Upvote)
    );
    assert_eq!(
        toggle_vote(base(UserVote::None), VoteDirection::Downvote),
        VoteTally::new(3, 3, UserVote::Downvote)
    );
    assert_eq!(
        toggle_vote(base(UserVote::Upvote), VoteDirection::Upvote),
        VoteTally::new(2, 2, UserVote::None)
    );
    assert_eq!(
        toggle_vote(base(UserVote::Downvote), VoteDirection::Downvote),
        VoteTally::new(3, 1, UserVote::None)
    );
    assert_eq!(
        toggle_vote(base(UserVote::Upvote), VoteDirection::Downvote),
        VoteTally::new(2, 3, UserVote::Downvote)
    );
    assert_eq!(
        toggle_vote(base(UserVote::Downvote), VoteDirection::Upvote),
        VoteTally::new(4, 1, UserVote::Upvote)
    );
}

#[test]
fn vote_delta_matches_service_arithmetic() {
    assert_eq!(
        vote_delta(UserVote::Upvote, VoteDirection::Downvote),
        VoteDelta {
            upvotes: -1,
            downvotes: 1,
            user_vote: UserVote::Downvote
        }
    );
    assert_eq!(
        vote_delta(UserVote::None, VoteDirection::Downvote),
        VoteDelta {
            upvotes: 0,
            downvotes: 1,
            user_vote: UserVote::Downvote
        }
    );
}

#[test]
fn double_click_same_button_returns_to_baseline() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 3, 0, UserVote::None)]);

    let first = reconciler
        .begin_vote(&mut store, &id("1"), VoteDirection::Upvote)
        .expect("first click");
    assert_eq!(first.applied, VoteTally::new(4, 0, UserVote::Upvote));
    assert_eq!(first.previous_vote, UserVote::None);

    let second = reconciler
        .begin_vote(&mut store, &id("1"), VoteDirection::Upvote)
        .expect("second click");
    assert_eq!(second.previous_vote, UserVote::Upvote);
    assert_eq!(
        store.tally(&id("1")),
        Some(VoteTally::new(3, 0, UserVote::None))
    );
}

#[test]
fn switching_vote_moves_one_from_each_counter() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 5, 2, UserVote::Upvote)]);

    reconciler
        .begin_vote(&mut store, &id("1"), VoteDirection::Downvote)
        .expect("switch");
    assert_eq!(
        store.tally(&id("1")),
        Some(VoteTally::new(4, 3, UserVote::Downvote))
    );
}

#[test]
fn snapshot_is_adopted_verbatim_without_intents() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 0, 0, UserVote::None)]);

    let snapshot = vec![
        msg("1", 7, 1, UserVote::Downvote),
        msg("2", 0, 4, UserVote::None),
    ];
    let report = reconciler.reconcile(&mut store, snapshot.clone());

    assert_eq!(store.messages(), snapshot.as_slice());
    assert_eq!(report.adopted, 2);
    assert_eq!(report.kept_pending, 0);
}

#[test]
fn pending_intent_survives_stale_snapshot() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 3, 0, UserVote::None)]);
    reconciler
        .begin_vote(&mut store, &id("1"), VoteDirection::Upvote)
        .expect("vote");

    let report = reconciler.reconcile(
        &mut store,
        vec![msg("1", 3, 0, UserVote::None), msg("2", 1, 1, UserVote::None)],
    );

    assert_eq!(report.kept_pending, 1);
    assert_eq!(
        store.tally(&id("1")),
        Some(VoteTally::new(4, 0, UserVote::Upvote))
    );
    assert_eq!(store.tally(&id("2")), Some(VoteTally::new(1, 1, UserVote::None)));
    assert!(reconciler.has_pending_vote(&id("1")));
}

#[test]
fn confirmed_intent_adopts_snapshot_and_is_dropped() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 3, 0, UserVote::None)]);
    let ticket = reconciler
        .begin_vote(&mut store, &id("1"), VoteDirection::Upvote)
        .expect("vote");
    let status = reconciler
        .resolve_vote(&mut store, &ticket, Ok(()))
        .expect("resolve");
    assert_eq!(status, IntentStatus::Confirmed);

    let report = reconciler.reconcile(&mut store, vec![msg("1", 6, 0, UserVote::Upvote)]);

    assert_eq!(report.confirmed, 1);
    assert!(reconciler.intent(&id("1")).is_none());
    assert_eq!(
        store.tally(&id("1")),
        Some(VoteTally::new(6, 0, UserVote::Upvote))
    );
}

#[test]
fn failed_intent_restores_pre_vote_state_after_many_ticks() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 3, 1, UserVote::Downvote)]);
    let ticket = reconciler
        .begin_vote(&mut store, &id("1"), VoteDirection::Upvote)
        .expect("vote");
    assert_eq!(ticket.applied, VoteTally::new(4, 0, UserVote::Upvote));

    for upvotes in [3, 8, 2] {
        reconciler.reconcile(&mut store, vec![msg("1", upvotes, 1, UserVote::Downvote)]);
        assert_eq!(
            store.tally(&id("1")),
            Some(VoteTally::new(4, 0, UserVote::Upvote))
        );
    }

    let err = ClientError::NetworkFailure("connection reset".into());
    let status = reconciler
        .resolve_vote(&mut store, &ticket, Err(&err))
        .expect("resolve");
    assert_eq!(status, IntentStatus::Failed);
    assert_eq!(
        store.tally(&id("1")),
        Some(VoteTally::new(3, 1, UserVote::Downvote))
    );

    let report = reconciler.reconcile(&mut store, vec![msg("1", 9, 9, UserVote::None)]);
    assert_eq!(report.reverted, 1);
    assert_eq!(
        store.tally(&id("1")),
        Some(VoteTally::new(3, 1, UserVote::Downvote))
    );
    assert!(reconciler.intent(&id("1")).is_none());

    reconciler.reconcile(&mut store, vec![msg("1", 9, 9, UserVote::None)]);
    assert_eq!(store.tally(&id("1")), Some(VoteTally::new(9, 9, UserVote::None)));
}

#[test]
fn newer_vote_supersedes_unresolved_one() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 0, 0, UserVote::None)]);
    let first = reconciler
        .begin_vote(&mut store, &id("1"), VoteDirection::Upvote)
        .expect("first");
    let second = reconciler
        .begin_vote(&mut store, &id("1"), VoteDirection::Downvote)
        .expect("second");
    assert_eq!(second.previous_vote, UserVote::Upvote);

    let err = ClientError::NetworkFailure("late".into());
    assert_eq!(
        reconciler.resolve_vote(&mut store, &first, Err(&err)),
        Err(ClientError::Superseded(id("1")))
    );
    assert_eq!(
        store.tally(&id("1")),
        Some(VoteTally::new(0, 1, UserVote::Downvote))
    );
    assert!(reconciler.has_pending_vote(&id("1")));

    assert_eq!(
        reconciler.resolve_vote(&mut store, &second, Ok(())),
        Ok(IntentStatus::Confirmed)
    );
}

#[test]
fn votes_on_unknown_or_unsent_messages_are_refused() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 0, 0, UserVote::None)]);
    assert_eq!(
        reconciler.begin_vote(&mut store, &id("nope"), VoteDirection::Upvote),
        Err(ClientError::UnknownMessage(id("nope")))
    );

    let ticket = reconciler
        .begin_post(&mut store, "alice", "hello")
        .expect("post");
    assert_eq!(
        reconciler.begin_vote(&mut store, &ticket.local_id, VoteDirection::Upvote),
        Err(ClientError::UnknownMessage(ticket.local_id.clone()))
    );
}

#[test]
fn intents_for_vanished_messages_are_dropped() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 0, 0, UserVote::None)]);
    reconciler
        .begin_vote(&mut store, &id("1"), VoteDirection::Upvote)
        .expect("vote");

    let report = reconciler.reconcile(&mut store, vec![msg("2", 0, 0, UserVote::None)]);
    assert_eq!(report.dropped_intents, 1);
    assert!(reconciler.intent(&id("1")).is_none());
}

#[test]
fn blank_post_is_rejected_without_touching_store() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 0, 0, UserVote::None)]);
    let before = store.messages().to_vec();

    assert_eq!(
        reconciler.begin_post(&mut store, "alice", " \t\n "),
        Err(ClientError::EmptyInput)
    );
    assert_eq!(store.messages(), before.as_slice());
    assert_eq!(reconciler.pending_post_count(), 0);
}

#[test]
fn confirmed_post_is_carried_until_snapshot_includes_it() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 0, 0, UserVote::None)]);
    let ticket = reconciler
        .begin_post(&mut store, "alice", "hello")
        .expect("post");
    assert_eq!(store.delivery(&ticket.local_id), Some(Delivery::Sending));

    let confirmed = posted("srv-1", "alice", "hello");
    reconciler.resolve_post(&mut store, &ticket.local_id, Ok(&confirmed));
    assert!(!store.contains(&ticket.local_id));
    assert_eq!(store.delivery(&id("srv-1")), Some(Delivery::Sent));

    let report = reconciler.reconcile(&mut store, vec![msg("1", 0, 0, UserVote::None)]);
    assert_eq!(report.carried_posts, 1);
    let ids: Vec<_> = store.messages().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "srv-1"]);

    reconciler.reconcile(
        &mut store,
        vec![msg("1", 0, 0, UserVote::None), posted("srv-1", "alice", "hello")],
    );
    assert_eq!(reconciler.pending_post_count(), 0);
    assert_eq!(store.len(), 2);
}

#[test]
fn sending_post_matches_its_echo_in_snapshot() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 0, 0, UserVote::None)]);
    let ticket = reconciler
        .begin_post(&mut store, "alice", "hello")
        .expect("post");

    let report = reconciler.reconcile(
        &mut store,
        vec![msg("1", 0, 0, UserVote::None), posted("srv-1", "alice", "hello")],
    );
    assert_eq!(report.echoed_posts, 1);
    assert_eq!(report.carried_posts, 0);
    assert_eq!(store.len(), 2);
    assert!(!store.contains(&ticket.local_id));

    reconciler.resolve_post(
        &mut store,
        &ticket.local_id,
        Ok(&posted("srv-1", "alice", "hello")),
    );
    assert_eq!(reconciler.pending_post_count(), 0);
    assert_eq!(store.len(), 2);
}

#[test]
fn echo_never_matches_a_message_seen_before_the_post() {
    let (mut store, mut reconciler) =
        seeded(vec![posted("old", "alice", "hello"), msg("1", 0, 0, UserVote::None)]);
    let ticket = reconciler
        .begin_post(&mut store, "alice", "hello")
        .expect("post");

    let report = reconciler.reconcile(
        &mut store,
        vec![posted("old", "alice", "hello"), msg("1", 0, 0, UserVote::None)],
    );
    assert_eq!(report.echoed_posts, 0);
    assert_eq!(report.carried_posts, 1);
    assert!(store.contains(&ticket.local_id));
    assert_eq!(store.messages().last().map(|m| &m.id), Some(&ticket.local_id));
}

#[test]
fn echo_respects_time_window_when_stamped() {
    let (mut store, mut reconciler) = seeded(Vec::new());
    reconciler
        .begin_post(&mut store, "alice", "hello")
        .expect("post");

    let mut stale = posted("srv-old", "alice", "hello");
    stale.created_at = Some(Utc::now() - chrono::Duration::hours(2));
    let report = reconciler.reconcile(&mut store, vec![stale]);

    assert_eq!(report.echoed_posts, 0);
    assert_eq!(report.carried_posts, 1);
}

#[test]
fn failed_post_is_removed() {
    let (mut store, mut reconciler) = seeded(vec![msg("1", 0, 0, UserVote::None)]);
    let ticket = reconciler
        .begin_post(&mut store, "alice", "hello")
        .expect("post");

    let err = ClientError::NetworkFailure("timed out".into());
    reconciler.resolve_post(&mut store, &ticket.local_id, Err(&err));

    assert_eq!(store.len(), 1);
    assert_eq!(reconciler.pending_post_count(), 0);
    reconciler.reconcile(&mut store, vec![msg("1", 0, 0, UserVote::None)]);
    assert_eq!(store.len(), 1);
}

#[test]
fn view_flags_pending_votes_and_unsent_posts() {
    let (mut store, mut reconciler) = seeded(vec![
        msg("1", 0, 0, UserVote::None),
        msg("2", 0, 0, UserVote::None),
    ]);
    reconciler
        .begin_vote(&mut store, &id("2"), VoteDirection::Downvote)
        .expect("vote");
    reconciler
        .begin_post(&mut store, "alice", "draft")
        .expect("post");

    let view = reconciler.view(&store);
    assert_eq!(view.len(), 3);
    assert!(!view[0].pending_vote);
    assert!(view[1].pending_vote);
    assert_eq!(view[1].message.downvotes, 1);
    assert_eq!(view[2].delivery, Delivery::Sending);
    assert_eq!(view[2].message.content, "draft");
}
