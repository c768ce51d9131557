//! Poll lifecycle: creation, vote admission, result aggregation, expiry and
//! history. The only module that talks to the poll store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::DEFAULT_POLL_DURATION_SECS,
    dao::{
        models::{PollBundle, PollOptionRow, PollRow, VoteRow},
        poll_store::PollStore,
    },
    dto::poll::{CreatePollRequest, OptionResult, PollSnapshot},
    error::ServiceError,
    state::SharedState,
};

/// Whether a poll is accepting votes at `now`, regardless of what the stored
/// flag claims. This predicate is what every display and admission decision
/// uses; the stored flag alone is advisory.
pub fn is_effectively_active(poll: &PollRow, now: DateTime<Utc>) -> bool {
    poll.is_active && poll.end_time > now
}

/// Compute the client-facing snapshot of a poll at `now`.
///
/// Pure function of the bundle: per-option counts and rounded percentages,
/// total votes, remaining seconds (floored, clamped at zero) and effective
/// activeness. A formatted snapshot never reports an expired poll as active
/// even when the stored flag was not corrected yet.
pub fn snapshot(bundle: &PollBundle, now: DateTime<Utc>) -> PollSnapshot {
    let total_votes = bundle.votes.len();
    let remaining_time = (bundle.poll.end_time - now).num_seconds().max(0);

    let options = bundle
        .options
        .iter()
        .map(|option| {
            let vote_count = bundle
                .votes
                .iter()
                .filter(|vote| vote.option_id == option.id)
                .count();
            let percentage = if total_votes > 0 {
                ((vote_count as f64 / total_votes as f64) * 100.0).round() as u32
            } else {
                0
            };
            OptionResult {
                id: option.id,
                text: option.text.clone(),
                vote_count,
                percentage,
            }
        })
        .collect();

    PollSnapshot {
        id: bundle.poll.id,
        question: bundle.poll.question.clone(),
        duration: bundle.poll.duration,
        end_time: bundle.poll.end_time,
        is_active: bundle.poll.is_active && remaining_time > 0,
        created_at: bundle.poll.created_at,
        options,
        total_votes,
        remaining_time,
    }
}

/// Outcome of the staleness-aware active-poll lookup.
enum ActiveLookup {
    /// An unexpired active poll.
    Active(PollBundle),
    /// A stale active poll, already corrected to inactive in the store.
    Reconciled(PollBundle),
    /// No poll carries the active flag.
    None,
}

/// Find the latest stored-active poll and resolve staleness before anything
/// else looks at it: an expired one is flipped to inactive in the store (the
/// corrective write of lazy expiry) and reported as `Reconciled`.
async fn resolve_active(
    store: &Arc<dyn PollStore>,
    now: DateTime<Utc>,
) -> Result<ActiveLookup, ServiceError> {
    let Some(bundle) = store.find_latest_active().await? else {
        return Ok(ActiveLookup::None);
    };

    if is_effectively_active(&bundle.poll, now) {
        return Ok(ActiveLookup::Active(bundle));
    }

    info!(poll_id = %bundle.poll.id, "marking expired poll inactive");
    let corrected = store.mark_inactive(bundle.poll.id).await?.unwrap_or_else(|| {
        let mut fallback = bundle;
        fallback.poll.is_active = false;
        fallback
    });
    Ok(ActiveLookup::Reconciled(corrected))
}

/// Create a new poll with its options, persisted atomically.
///
/// Staleness is resolved first, so an expired poll with a stale active flag
/// never blocks creation; a truly active poll does.
pub async fn create_poll(
    state: &SharedState,
    request: CreatePollRequest,
) -> Result<PollSnapshot, ServiceError> {
    request.validate()?;

    let store = state.require_poll_store().await?;
    let now = Utc::now();

    if let ActiveLookup::Active(_) = resolve_active(&store, now).await? {
        return Err(ServiceError::Conflict);
    }

    let duration = request.duration.unwrap_or(DEFAULT_POLL_DURATION_SECS);
    let poll = PollRow {
        id: Uuid::new_v4(),
        question: request.question,
        duration,
        end_time: now + Duration::seconds(duration),
        is_active: true,
        created_at: now,
    };
    let options = request
        .options
        .into_iter()
        .map(|text| PollOptionRow {
            id: Uuid::new_v4(),
            poll_id: poll.id,
            text,
        })
        .collect();

    let bundle = store.insert_poll(poll, options).await?;
    info!(poll_id = %bundle.poll.id, question = %bundle.poll.question, "poll created");
    Ok(snapshot(&bundle, Utc::now()))
}

/// The most recent active poll, if any.
///
/// A stale active poll is corrected to inactive as a side effect and still
/// returned (now reporting inactive), so late readers see its final tallies.
pub async fn get_active_poll(state: &SharedState) -> Result<Option<PollSnapshot>, ServiceError> {
    let store = state.require_poll_store().await?;
    let now = Utc::now();

    match resolve_active(&store, now).await? {
        ActiveLookup::Active(bundle) | ActiveLookup::Reconciled(bundle) => {
            Ok(Some(snapshot(&bundle, now)))
        }
        ActiveLookup::None => Ok(None),
    }
}

/// Look up a poll by id.
pub async fn get_poll_by_id(
    state: &SharedState,
    poll_id: Uuid,
) -> Result<Option<PollSnapshot>, ServiceError> {
    let store = state.require_poll_store().await?;
    let bundle = store.find_poll(poll_id).await?;
    Ok(bundle.map(|bundle| snapshot(&bundle, Utc::now())))
}

/// Record a student's vote and return a freshly recomputed snapshot.
///
/// The duplicate pre-check is advisory; the store's unique index on
/// `(poll_id, student_id)` is the authoritative guard and its violation also
/// surfaces as [`ServiceError::DuplicateVote`].
pub async fn submit_vote(
    state: &SharedState,
    poll_id: Uuid,
    option_id: Uuid,
    student_id: String,
    student_name: String,
) -> Result<PollSnapshot, ServiceError> {
    let store = state.require_poll_store().await?;
    let now = Utc::now();

    let Some(bundle) = store.find_poll(poll_id).await? else {
        return Err(ServiceError::NotFound("poll"));
    };
    if !is_effectively_active(&bundle.poll, now) {
        return Err(ServiceError::Expired);
    }
    if !bundle.options.iter().any(|option| option.id == option_id) {
        return Err(ServiceError::InvalidOption);
    }
    if store
        .find_vote(poll_id, student_id.clone())
        .await?
        .is_some()
    {
        return Err(ServiceError::DuplicateVote);
    }

    store
        .insert_vote(VoteRow {
            id: Uuid::new_v4(),
            poll_id,
            option_id,
            student_id,
            student_name,
        })
        .await?;

    // Re-read instead of patching locally so the snapshot matches the store.
    let bundle = store
        .find_poll(poll_id)
        .await?
        .ok_or(ServiceError::NotFound("poll"))?;
    info!(poll_id = %poll_id, total_votes = bundle.votes.len(), "vote recorded");
    Ok(snapshot(&bundle, Utc::now()))
}

/// Whether a student already voted on a poll.
pub async fn has_student_voted(
    state: &SharedState,
    poll_id: Uuid,
    student_id: &str,
) -> Result<bool, ServiceError> {
    let store = state.require_poll_store().await?;
    Ok(store
        .find_vote(poll_id, student_id.to_owned())
        .await?
        .is_some())
}

/// End a poll unconditionally, regardless of remaining time.
///
/// Idempotent: ending an already-ended poll succeeds and returns its final
/// snapshot again.
pub async fn end_poll(state: &SharedState, poll_id: Uuid) -> Result<PollSnapshot, ServiceError> {
    let store = state.require_poll_store().await?;
    let bundle = store
        .mark_inactive(poll_id)
        .await?
        .ok_or(ServiceError::NotFound("poll"))?;
    info!(poll_id = %poll_id, "poll ended");
    Ok(snapshot(&bundle, Utc::now()))
}

/// Ended polls, newest first, capped at `limit`.
pub async fn get_poll_history(
    state: &SharedState,
    limit: i64,
) -> Result<Vec<PollSnapshot>, ServiceError> {
    let store = state.require_poll_store().await?;
    let now = Utc::now();
    let bundles = store.list_ended(limit).await?;
    Ok(bundles
        .iter()
        .map(|bundle| snapshot(bundle, now))
        .collect())
}
