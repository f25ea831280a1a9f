// File: walki-core/tests/route_run_tests.rs

use std::sync::Arc;
use walki_core::Error;
use walki_core::services::{RouteRunService, StepOutcome};
use walki_core::test_utils::fakes::InMemoryRouteStore;
use walki_common::models::MessageIdUpdate;

const USER: i32 = 7;
const ROUTE: i32 = 1;
const VERSION: i32 = 10;

/// Route 1, version 10, waypoints at indices 0, 2 and 5. User 7 has paid.
fn sparse_route() -> Arc<InMemoryRouteStore> {
    let store = Arc::new(InMemoryRouteStore::new());
    store.add_version(ROUTE, VERSION, 1);
    store.add_point(VERSION, 100, 0, "Gate");
    store.add_point(VERSION, 101, 2, "Bridge");
    store.add_point(VERSION, 102, 5, "Tower");
    store.attach_media(100, vec![1000], vec![2000]);
    store.grant_access(USER, ROUTE);
    store
}

fn service(store: &Arc<InMemoryRouteStore>) -> RouteRunService {
    RouteRunService::new(store.clone(), store.clone(), store.clone(), store.clone())
}

#[tokio::test]
async fn test_full_walk_finish_prev_and_restart() -> Result<(), Error> {
    let store = sparse_route();
    let run = service(&store);

    let first = run.start(USER, ROUTE).await?;
    assert_eq!(first.idx, 0);
    assert_eq!(first.point.title, "Gate");
    assert_eq!(first.photo_ids, vec![1000]);
    assert_eq!(first.voice_ids, vec![2000]);
    assert!(!first.has_prev);
    assert!(first.has_next);

    let second = run.continue_route(USER, ROUTE).await?.into_view().expect("moved to 2");
    assert_eq!(second.idx, 2);
    assert!(second.has_prev && second.has_next);

    let third = run.continue_route(USER, ROUTE).await?.into_view().expect("moved to 5");
    assert_eq!(third.idx, 5);
    assert!(third.has_prev);
    assert!(!third.has_next);

    let outcome = run.continue_route(USER, ROUTE).await?;
    assert_eq!(outcome, StepOutcome::Finished);
    let finished = store.progress_of(USER, VERSION).expect("progress row");
    assert!(finished.is_finished());
    assert_eq!(finished.current_idx, 5);

    // Past the end, Continue keeps answering Finished and Finish is a no-op.
    assert_eq!(run.continue_route(USER, ROUTE).await?, StepOutcome::Finished);
    run.finish(USER, VERSION).await?;
    let refinished = store.progress_of(USER, VERSION).unwrap();
    assert_eq!(refinished.current_idx, 5);
    assert_eq!(refinished.finished_at, finished.finished_at);

    // Stepping back does not reopen the run.
    let back = run.prev(USER, ROUTE).await?.into_view().expect("moved back to 2");
    assert_eq!(back.idx, 2);
    assert!(store.progress_of(USER, VERSION).unwrap().is_finished());

    let restarted = run.restart(USER, ROUTE).await?;
    assert_eq!(restarted.idx, 0);
    let row = store.progress_of(USER, VERSION).unwrap();
    assert_eq!(row.current_idx, 0);
    assert!(!row.is_finished());
    assert_eq!(store.progress_rows(), 1);

    Ok(())
}

#[tokio::test]
async fn test_start_without_access_leaves_no_progress() {
    let store = sparse_route();
    let run = service(&store);

    let err = run.start(99, ROUTE).await.unwrap_err();
    assert!(matches!(err, Error::NoAccess { user_id: 99, route_id: ROUTE }));
    assert_eq!(store.progress_rows(), 0);
}

#[tokio::test]
async fn test_steps_without_progress() -> Result<(), Error> {
    let store = sparse_route();
    let run = service(&store);

    assert_eq!(run.continue_route(USER, ROUTE).await?, StepOutcome::NoProgress);
    assert_eq!(run.prev(USER, ROUTE).await?, StepOutcome::NoProgress);
    assert!(run.progress(USER, ROUTE).await?.is_none());
    assert_eq!(store.progress_rows(), 0);
    Ok(())
}

#[tokio::test]
async fn test_prev_at_first_point_changes_nothing() -> Result<(), Error> {
    let store = sparse_route();
    let run = service(&store);
    run.start(USER, ROUTE).await?;

    let outcome = run.prev(USER, ROUTE).await?;
    assert_eq!(outcome, StepOutcome::AtFirst);
    assert!(!outcome.advanced());
    let row = store.progress_of(USER, VERSION).unwrap();
    assert_eq!(row.current_idx, 0);
    assert!(!row.is_finished());
    Ok(())
}

#[tokio::test]
async fn test_finish_twice_keeps_first_timestamp() -> Result<(), Error> {
    let store = sparse_route();
    let run = service(&store);
    run.start(USER, ROUTE).await?;

    run.finish(USER, VERSION).await?;
    let first = store.progress_of(USER, VERSION).unwrap().finished_at;
    run.finish(USER, VERSION).await?;
    let second = store.progress_of(USER, VERSION).unwrap().finished_at;

    assert!(first.is_some());
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_finish_without_progress_is_an_error() {
    let store = sparse_route();
    let run = service(&store);

    let err = run.finish(USER, VERSION).await.unwrap_err();
    assert!(matches!(err, Error::ProgressNotFound { user_id: USER, version_id: VERSION }));
}

#[tokio::test]
async fn test_start_on_version_not_numbered_from_zero() -> Result<(), Error> {
    let store = Arc::new(InMemoryRouteStore::new());
    store.add_version(2, 20, 1);
    store.add_point(20, 200, 3, "Square");
    store.add_point(20, 201, 7, "Park");
    store.grant_access(USER, 2);
    let run = service(&store);

    let view = run.start(USER, 2).await?;
    assert_eq!(view.idx, 3);
    assert!(!view.has_prev);
    assert!(view.has_next);
    assert_eq!(store.progress_of(USER, 20).unwrap().current_idx, 3);
    Ok(())
}

#[tokio::test]
async fn test_start_on_empty_version_fails() {
    let store = Arc::new(InMemoryRouteStore::new());
    store.add_version(3, 30, 1);
    store.grant_access(USER, 3);
    let run = service(&store);

    let err = run.start(USER, 3).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(store.progress_rows(), 0);
}

#[tokio::test]
async fn test_plays_latest_version_only() -> Result<(), Error> {
    let store = sparse_route();
    store.add_version(ROUTE, 11, 2);
    store.add_point(11, 110, 0, "New gate");
    let run = service(&store);

    let view = run.start(USER, ROUTE).await?;
    assert_eq!(view.version_id, 11);
    assert_eq!(view.point.title, "New gate");
    assert!(store.progress_of(USER, VERSION).is_none());
    Ok(())
}

#[tokio::test]
async fn test_failed_neighbour_probe_hides_button() -> Result<(), Error> {
    let store = sparse_route();
    let run = service(&store);
    run.start(USER, ROUTE).await?;

    // Move to the middle point, then make the probes fail while restarting.
    run.continue_route(USER, ROUTE).await?;
    store.fail_probes(true);
    let view = run.restart(USER, ROUTE).await?;

    assert_eq!(view.idx, 0);
    assert!(!view.has_prev);
    assert!(!view.has_next);
    Ok(())
}

#[tokio::test]
async fn test_view_carries_messages_on_screen() -> Result<(), Error> {
    let store = sparse_route();
    let run = service(&store);
    run.start(USER, ROUTE).await?;
    run.update_message_ids(USER, VERSION, MessageIdUpdate::Set(55), MessageIdUpdate::Set(56))
        .await?;

    let view = run.continue_route(USER, ROUTE).await?.into_view().unwrap();
    assert_eq!(view.content_message_id, Some(55));
    assert_eq!(view.voice_message_id, Some(56));
    Ok(())
}

#[tokio::test]
async fn test_update_message_ids_leaves_unset_field() -> Result<(), Error> {
    let store = sparse_route();
    let run = service(&store);
    run.start(USER, ROUTE).await?;
    run.update_message_ids(USER, VERSION, MessageIdUpdate::Set(1), MessageIdUpdate::Set(2))
        .await?;

    run.update_message_ids(USER, VERSION, MessageIdUpdate::Clear, MessageIdUpdate::Unset)
        .await?;
    let row = store.progress_of(USER, VERSION).unwrap();
    assert_eq!(row.content_message_id, None);
    assert_eq!(row.voice_message_id, Some(2));

    let err = run
        .update_message_ids(99, VERSION, MessageIdUpdate::Set(3), MessageIdUpdate::Unset)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProgressNotFound { .. }));
    Ok(())
}
