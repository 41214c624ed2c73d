//! Effectful phase engine: applies client intents to a room under its lock
//! and returns the ordered list of broadcasts to deliver.
//!
//! Every function here is synchronous and in-memory; callers hold the room
//! mutex for the duration of a call and dispatch the returned broadcasts
//! after releasing it. `phase-changed` always precedes phase-specific data
//! in the returned order.

use rand::seq::IndexedRandom;
use uuid::Uuid;

use crate::{
    dto::events::{EntrySnapshot, ServerEvent},
    error::ServiceError,
    state::{
        room::{Entry, MIN_PLAYERS, RatingRecord, Room, RoundResult},
        state_machine::{RoomEvent, RoomPhase, compute_transition},
    },
};

/// A broadcast the gateway should deliver, optionally after a pacing delay.
///
/// Pacing exists purely to let client transition animations settle; it is
/// applied by the gateway after the room lock is released and never gates
/// correctness.
#[derive(Debug, Clone)]
pub struct Broadcast {
    /// The event to deliver.
    pub event: ServerEvent,
    /// Whether delivery should wait for the fixed pacing delay.
    pub paced: bool,
}

impl Broadcast {
    /// A broadcast delivered immediately.
    pub fn now(event: ServerEvent) -> Self {
        Self {
            event,
            paced: false,
        }
    }

    /// A broadcast delivered after the pacing delay.
    pub fn paced(event: ServerEvent) -> Self {
        Self { event, paced: true }
    }
}

/// Start the game from the lobby.
///
/// Preconditions: the caller is host, the roster has at least
/// [`MIN_PLAYERS`] players, and everyone is ready. Violations are local
/// no-ops surfaced only to the caller.
pub fn start_game(room: &mut Room, caller: Uuid) -> Result<Vec<Broadcast>, ServiceError> {
    if room.host_id() != Some(caller) {
        return Err(ServiceError::InvalidState(
            "only the host can start the game".into(),
        ));
    }
    if room.players.len() < MIN_PLAYERS {
        return Err(ServiceError::InvalidState(format!(
            "at least {MIN_PLAYERS} players are required to start"
        )));
    }
    if !room.players.values().all(|player| player.is_ready) {
        return Err(ServiceError::InvalidState(
            "all players must be ready to start".into(),
        ));
    }

    room.phase = compute_transition(room.phase, RoomEvent::StartGame)
        .map_err(|err| ServiceError::InvalidState(err.to_string()))?;
    room.current_round = 1;
    room.clear_round_state();
    let prompt = choose_prompt(room)?;

    Ok(vec![
        Broadcast::now(ServerEvent::phase_of(room)),
        Broadcast::now(ServerEvent::PromptChanged { prompt }),
    ])
}

/// Record a player's entry for the current prompt.
///
/// Resubmitting overwrites the previous entry in place. The instant the
/// submission count matches the live roster, the room snapshots the rating
/// queue (arrival order, deliberately unshuffled) and enters `Rating`.
pub fn record_submission(
    room: &mut Room,
    conn: Uuid,
    entry_id: String,
    title: String,
    artist: String,
    artwork_url: Option<String>,
) -> Result<Vec<Broadcast>, ServiceError> {
    let Some(player) = room.players.get(&conn) else {
        return Err(ServiceError::InvalidState(
            "not a member of this room".into(),
        ));
    };
    if room.phase != RoomPhase::SongSelection {
        return Err(ServiceError::InvalidState(
            "entries can only be submitted during song selection".into(),
        ));
    }

    let owner_name = player.name.clone();
    room.submissions.insert(
        conn,
        Entry {
            entry_id,
            owner: conn,
            owner_name: owner_name.clone(),
            title,
            artist,
            artwork_url,
        },
    );

    let mut broadcasts = vec![
        Broadcast::now(ServerEvent::EntrySubmitted {
            player_id: conn,
            player_name: owner_name,
        }),
        Broadcast::now(ServerEvent::SubmissionProgress {
            submitted: room.submissions.len(),
            total: room.players.len(),
        }),
    ];

    if room.all_submitted() {
        room.phase = compute_transition(room.phase, RoomEvent::SubmissionsComplete)
            .map_err(|err| ServiceError::InvalidState(err.to_string()))?;
        room.rating_queue = room.submissions.values().cloned().collect();
        room.rating_cursor = 0;
        room.aggregate_ratings.clear();

        broadcasts.push(Broadcast::now(ServerEvent::phase_of(room)));
        broadcasts.push(begin_rating_round(room)?);
    }

    Ok(broadcasts)
}

/// Record a vote on the entry currently being rated.
///
/// The owner's sentinel is accepted but never enters the aggregate; a
/// non-owner sentinel counts as an abstention. Once every non-owner has
/// voted, the collected ratings are folded into the aggregate and the
/// cursor advances, finishing the round when the queue is exhausted.
pub fn record_rating(
    room: &mut Room,
    conn: Uuid,
    entry_id: &str,
    rating: u8,
) -> Result<Vec<Broadcast>, ServiceError> {
    if room.phase != RoomPhase::Rating {
        return Err(ServiceError::InvalidState(
            "ratings can only be submitted during the rating phase".into(),
        ));
    }
    if !room.players.contains_key(&conn) {
        return Err(ServiceError::InvalidState(
            "not a member of this room".into(),
        ));
    }

    let current = room
        .current_rating_entry()
        .ok_or_else(|| ServiceError::InvalidState("no entry is up for rating".into()))?;
    if current.entry_id != entry_id {
        return Err(ServiceError::InvalidInput(
            "rating does not target the entry currently being rated".into(),
        ));
    }

    // Owners are recorded as auto-skipped regardless of what they sent.
    let recorded = if conn == current.owner { 0 } else { rating };
    let current_entry_id = current.entry_id.clone();
    room.votes_for_current.insert(conn, recorded);

    let mut broadcasts = vec![Broadcast::now(ServerEvent::RatingProgress {
        submitted: room.votes_for_current.len(),
        total: room.players.len(),
        entry_id: current_entry_id.clone(),
    })];

    if room.rating_round_complete() {
        fold_votes_into_aggregate(room, &current_entry_id);
        room.rating_cursor += 1;

        if room.rating_cursor >= room.rating_queue.len() {
            room.phase = compute_transition(room.phase, RoomEvent::RatingComplete)
                .map_err(|err| ServiceError::InvalidState(err.to_string()))?;
            let result = compute_round_results(room);
            broadcasts.push(Broadcast::now(ServerEvent::phase_of(room)));
            broadcasts.push(Broadcast::paced(ServerEvent::results_of(&result)));
            room.last_round_result = Some(result);
        } else {
            broadcasts.push(begin_rating_round(room)?);
        }
    }

    Ok(broadcasts)
}

/// Advance from the results screen into the next round, or finish the game
/// when the configured round count is exhausted.
pub fn advance_round(room: &mut Room) -> Result<Vec<Broadcast>, ServiceError> {
    if room.current_round >= room.settings.round_count {
        room.phase = compute_transition(room.phase, RoomEvent::FinishGame)
            .map_err(|err| ServiceError::InvalidState(err.to_string()))?;
        return Ok(vec![Broadcast::now(ServerEvent::phase_of(room))]);
    }

    room.phase = compute_transition(room.phase, RoomEvent::NextRound)
        .map_err(|err| ServiceError::InvalidState(err.to_string()))?;
    room.current_round += 1;
    room.clear_round_state();
    let prompt = choose_prompt(room)?;

    Ok(vec![
        Broadcast::now(ServerEvent::phase_of(room)),
        Broadcast::now(ServerEvent::PromptChanged { prompt }),
    ])
}

/// Reset the room back to the lobby, keeping roster and settings.
pub fn return_to_lobby(room: &mut Room) -> Vec<Broadcast> {
    // Infallible: the transition table accepts this from every phase.
    if let Ok(next) = compute_transition(room.phase, RoomEvent::ReturnToLobby) {
        room.phase = next;
    }
    room.current_round = 1;
    room.clear_round_state();

    vec![Broadcast::now(ServerEvent::phase_of(room))]
}

/// Force the room back to the lobby when the roster shrinks below the
/// viability minimum outside the lobby. No-op otherwise.
///
/// Invoked after every roster mutation; idempotent.
pub fn check_viability(room: &mut Room) -> Vec<Broadcast> {
    let Ok(next) = compute_transition(room.phase, RoomEvent::InsufficientPlayers) else {
        // Already in the lobby.
        return Vec::new();
    };
    if room.players.len() >= MIN_PLAYERS {
        return Vec::new();
    }

    room.phase = next;
    room.clear_round_state();

    vec![
        Broadcast::now(ServerEvent::RoomError {
            message: "Not enough players to continue the game".into(),
        }),
        Broadcast::now(ServerEvent::phase_of(room)),
    ]
}

/// Reset the vote map and announce the entry at the cursor.
fn begin_rating_round(room: &mut Room) -> Result<Broadcast, ServiceError> {
    room.votes_for_current.clear();
    let total_entries = room.rating_queue.len();
    let rating_index = room.rating_cursor;
    let entry = room
        .current_rating_entry()
        .ok_or_else(|| ServiceError::InvalidState("rating queue is empty".into()))?;

    Ok(Broadcast::paced(ServerEvent::RatingRoundStarted {
        rating_index,
        total_entries,
        entry: EntrySnapshot::from(entry),
    }))
}

/// Append the collected non-sentinel votes to the aggregate for `entry_id`.
fn fold_votes_into_aggregate(room: &mut Room, entry_id: &str) {
    let records: Vec<RatingRecord> = room
        .votes_for_current
        .iter()
        .filter(|(_, rating)| **rating > 0)
        .map(|(rater, rating)| RatingRecord {
            rater: *rater,
            rating: *rating,
        })
        .collect();

    room.aggregate_ratings
        .entry(entry_id.to_string())
        .or_default()
        .extend(records);
    room.votes_for_current.clear();
}

/// Sum each queued entry's ratings and rank them descending.
///
/// The sort is stable, so equal totals keep submission order and the
/// earlier-submitted entry ranks higher on a tie.
fn compute_round_results(room: &Room) -> RoundResult {
    let mut ranked: Vec<(Entry, u32)> = room
        .rating_queue
        .iter()
        .map(|entry| {
            let total = room
                .aggregate_ratings
                .get(&entry.entry_id)
                .map(|records| records.iter().map(|r| u32::from(r.rating)).sum())
                .unwrap_or(0);
            (entry.clone(), total)
        })
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let winner_entry_id = ranked.first().map(|(entry, _)| entry.entry_id.clone());

    RoundResult {
        ranked,
        winner_entry_id,
    }
}

/// Draw a prompt uniformly at random from the settings pool.
fn choose_prompt(room: &mut Room) -> Result<String, ServiceError> {
    let prompt = room
        .settings
        .prompt_pool
        .choose(&mut rand::rng())
        .cloned()
        .ok_or_else(|| ServiceError::InvalidState("prompt pool is empty".into()))?;
    room.current_prompt = Some(prompt.clone());
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::phase::VisiblePhase,
        state::{room::RoomSettings, state_machine::RoomPhase},
    };

    fn settings() -> RoomSettings {
        RoomSettings {
            round_count: 2,
            round_seconds: 30,
            prompt_pool: vec!["late-night drive".into(), "villain arc".into()],
        }
    }

    fn ready_room(count: usize) -> (Room, Vec<Uuid>) {
        let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
        let mut room = Room::new("AB12CD".into(), ids[0], settings());
        room.update_player(ids[0], "p0".into(), true);
        for (index, id) in ids.iter().enumerate().skip(1) {
            room.upsert_player(*id, format!("p{index}"));
            room.update_player(*id, format!("p{index}"), true);
        }
        (room, ids)
    }

    fn submit(room: &mut Room, conn: Uuid, entry_id: &str) -> Vec<Broadcast> {
        record_submission(
            room,
            conn,
            entry_id.into(),
            format!("title-{entry_id}"),
            "artist".into(),
            None,
        )
        .unwrap()
    }

    fn events(broadcasts: &[Broadcast]) -> Vec<&ServerEvent> {
        broadcasts.iter().map(|b| &b.event).collect()
    }

    #[test]
    fn start_game_requires_host() {
        let (mut room, ids) = ready_room(3);
        let err = start_game(&mut room, ids[1]).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(room.phase, RoomPhase::Lobby);
    }

    #[test]
    fn start_game_requires_three_ready_players() {
        let (mut room, ids) = ready_room(2);
        assert!(start_game(&mut room, ids[0]).is_err());

        let (mut room, ids) = ready_room(3);
        room.update_player(ids[2], "p2".into(), false);
        assert!(start_game(&mut room, ids[0]).is_err());
        assert_eq!(room.phase, RoomPhase::Lobby);
    }

    #[test]
    fn start_game_picks_prompt_from_pool() {
        let (mut room, ids) = ready_room(3);
        let broadcasts = start_game(&mut room, ids[0]).unwrap();

        assert_eq!(room.phase, RoomPhase::SongSelection);
        assert_eq!(room.current_round, 1);
        let prompt = room.current_prompt.clone().unwrap();
        assert!(room.settings.prompt_pool.contains(&prompt));

        // phase-changed must precede the prompt for fresh clients.
        match events(&broadcasts)[..] {
            [
                ServerEvent::PhaseChanged { phase, round },
                ServerEvent::PromptChanged { .. },
            ] => {
                assert_eq!(*phase, VisiblePhase::SongSelection);
                assert_eq!(*round, 1);
            }
            ref other => panic!("unexpected broadcasts: {other:?}"),
        }
    }

    #[test]
    fn rating_starts_exactly_when_submissions_match_roster() {
        let (mut room, ids) = ready_room(3);
        start_game(&mut room, ids[0]).unwrap();

        submit(&mut room, ids[0], "a");
        assert_eq!(room.phase, RoomPhase::SongSelection);
        submit(&mut room, ids[1], "b");
        assert_eq!(room.phase, RoomPhase::SongSelection);

        let broadcasts = submit(&mut room, ids[2], "c");
        assert_eq!(room.phase, RoomPhase::Rating);
        assert_eq!(room.rating_queue.len(), 3);
        assert_eq!(room.rating_cursor, 0);

        // Arrival order is preserved, not shuffled.
        let queued: Vec<&str> = room
            .rating_queue
            .iter()
            .map(|e| e.entry_id.as_str())
            .collect();
        assert_eq!(queued, ["a", "b", "c"]);

        let last = broadcasts.last().unwrap();
        assert!(last.paced);
        assert!(matches!(
            last.event,
            ServerEvent::RatingRoundStarted { rating_index: 0, total_entries: 3, .. }
        ));
    }

    #[test]
    fn resubmission_overwrites_without_advancing() {
        let (mut room, ids) = ready_room(3);
        start_game(&mut room, ids[0]).unwrap();

        submit(&mut room, ids[0], "a");
        submit(&mut room, ids[0], "a2");
        assert_eq!(room.submissions.len(), 1);
        assert_eq!(room.submissions[&ids[0]].entry_id, "a2");
        assert_eq!(room.phase, RoomPhase::SongSelection);
    }

    #[test]
    fn owner_vote_is_never_required_and_never_aggregated() {
        let (mut room, ids) = ready_room(3);
        start_game(&mut room, ids[0]).unwrap();
        submit(&mut room, ids[0], "a");
        submit(&mut room, ids[1], "b");
        submit(&mut room, ids[2], "c");

        // Entry "a" is owned by ids[0]; only the two others need to vote.
        record_rating(&mut room, ids[1], "a", 3).unwrap();
        assert_eq!(room.rating_cursor, 0);
        record_rating(&mut room, ids[2], "a", 5).unwrap();
        assert_eq!(room.rating_cursor, 1);

        let records = &room.aggregate_ratings["a"];
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.rater != ids[0]));
    }

    #[test]
    fn owner_sentinel_counts_as_skip_not_score() {
        let (mut room, ids) = ready_room(3);
        start_game(&mut room, ids[0]).unwrap();
        submit(&mut room, ids[0], "a");
        submit(&mut room, ids[1], "b");
        submit(&mut room, ids[2], "c");

        // Owner sends a (bogus) high self-rating; it is downgraded to a skip.
        record_rating(&mut room, ids[0], "a", 5).unwrap();
        record_rating(&mut room, ids[1], "a", 2).unwrap();
        record_rating(&mut room, ids[2], "a", 4).unwrap();

        let total: u32 = room.aggregate_ratings["a"]
            .iter()
            .map(|r| u32::from(r.rating))
            .sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn mid_rating_joiner_is_counted_in_vote_completion() {
        let (mut room, ids) = ready_room(3);
        start_game(&mut room, ids[0]).unwrap();
        submit(&mut room, ids[0], "a");
        submit(&mut room, ids[1], "b");
        submit(&mut room, ids[2], "c");

        // Joins after the rating queue was snapshotted; still expected to vote.
        let joiner = Uuid::new_v4();
        room.upsert_player(joiner, "late".into());

        record_rating(&mut room, ids[1], "a", 3).unwrap();
        record_rating(&mut room, ids[2], "a", 5).unwrap();
        assert_eq!(room.rating_cursor, 0);

        record_rating(&mut room, joiner, "a", 4).unwrap();
        assert_eq!(room.rating_cursor, 1);
        assert_eq!(room.aggregate_ratings["a"].len(), 3);
    }

    #[test]
    fn rating_wrong_entry_is_rejected() {
        let (mut room, ids) = ready_room(3);
        start_game(&mut room, ids[0]).unwrap();
        submit(&mut room, ids[0], "a");
        submit(&mut room, ids[1], "b");
        submit(&mut room, ids[2], "c");

        let err = record_rating(&mut room, ids[1], "b", 4).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(room.votes_for_current.is_empty());
    }

    #[test]
    fn full_round_ranks_by_total_with_stable_ties() {
        let (mut room, ids) = ready_room(3);
        start_game(&mut room, ids[0]).unwrap();
        submit(&mut room, ids[0], "a");
        submit(&mut room, ids[1], "b");
        submit(&mut room, ids[2], "c");

        // a: 3 + 5 = 8, b: 4 + 4 = 8 (tie, a submitted first), c: 1 + 2 = 3.
        record_rating(&mut room, ids[1], "a", 3).unwrap();
        record_rating(&mut room, ids[2], "a", 5).unwrap();
        record_rating(&mut room, ids[0], "b", 4).unwrap();
        record_rating(&mut room, ids[2], "b", 4).unwrap();
        record_rating(&mut room, ids[0], "c", 1).unwrap();
        let broadcasts = record_rating(&mut room, ids[1], "c", 2).unwrap();

        assert_eq!(room.phase, RoomPhase::Results);
        let result = room.last_round_result.as_ref().unwrap();
        let order: Vec<&str> = result
            .ranked
            .iter()
            .map(|(entry, _)| entry.entry_id.as_str())
            .collect();
        assert_eq!(order, ["a", "b", "c"]);
        assert_eq!(result.ranked[0].1, 8);
        assert_eq!(result.ranked[1].1, 8);
        assert_eq!(result.ranked[2].1, 3);
        assert_eq!(result.winner_entry_id.as_deref(), Some("a"));

        // Results ride a paced broadcast behind the phase change.
        let last = broadcasts.last().unwrap();
        assert!(last.paced);
        assert!(matches!(last.event, ServerEvent::RoundResults { .. }));
    }

    #[test]
    fn advance_round_starts_next_round_then_game_over() {
        let (mut room, ids) = ready_room(3);
        start_game(&mut room, ids[0]).unwrap();
        finish_round(&mut room, &ids);

        advance_round(&mut room).unwrap();
        assert_eq!(room.phase, RoomPhase::SongSelection);
        assert_eq!(room.current_round, 2);
        assert!(room.submissions.is_empty());
        assert!(room.current_prompt.is_some());

        finish_round(&mut room, &ids);
        advance_round(&mut room).unwrap();
        assert_eq!(room.phase, RoomPhase::GameOver);
    }

    #[test]
    fn return_to_lobby_resets_round_state_and_keeps_roster() {
        let (mut room, ids) = ready_room(3);
        start_game(&mut room, ids[0]).unwrap();
        finish_round(&mut room, &ids);

        return_to_lobby(&mut room);
        assert_eq!(room.phase, RoomPhase::Lobby);
        assert_eq!(room.current_round, 1);
        assert!(room.last_round_result.is_none());
        assert_eq!(room.players.len(), 3);
    }

    #[test]
    fn viability_loss_forces_lobby_and_clears_round_state() {
        let (mut room, ids) = ready_room(3);
        start_game(&mut room, ids[0]).unwrap();
        submit(&mut room, ids[0], "a");
        submit(&mut room, ids[1], "b");
        submit(&mut room, ids[2], "c");
        record_rating(&mut room, ids[1], "a", 3).unwrap();

        room.remove_player(ids[2]);
        let broadcasts = check_viability(&mut room);

        assert_eq!(room.phase, RoomPhase::Lobby);
        assert!(room.rating_queue.is_empty());
        assert!(room.aggregate_ratings.is_empty());
        assert!(room.submissions.is_empty());

        match events(&broadcasts)[..] {
            [
                ServerEvent::RoomError { .. },
                ServerEvent::PhaseChanged { phase, .. },
            ] => assert_eq!(*phase, VisiblePhase::Lobby),
            ref other => panic!("unexpected broadcasts: {other:?}"),
        }
    }

    #[test]
    fn viability_check_is_a_noop_in_lobby_or_when_viable() {
        let (mut room, _) = ready_room(2);
        assert!(check_viability(&mut room).is_empty());

        let (mut room, ids) = ready_room(4);
        start_game(&mut room, ids[0]).unwrap();
        room.remove_player(ids[3]);
        assert!(check_viability(&mut room).is_empty());
        assert_eq!(room.phase, RoomPhase::SongSelection);
    }

    /// Drive a started room through submissions and unanimous votes.
    fn finish_round(room: &mut Room, ids: &[Uuid]) {
        for (index, id) in ids.iter().enumerate() {
            submit(room, *id, &format!("e{index}"));
        }
        for index in 0..ids.len() {
            let entry_id = format!("e{index}");
            for rater in ids {
                if *rater != ids[index] {
                    record_rating(room, *rater, &entry_id, 3).unwrap();
                }
            }
        }
        assert_eq!(room.phase, RoomPhase::Results);
    }
}
