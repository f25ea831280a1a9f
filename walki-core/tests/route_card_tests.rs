// File: walki-core/tests/route_card_tests.rs

use std::sync::Arc;
use walki_core::Error;
use walki_core::cache::ReferenceCache;
use walki_core::services::{MediaService, RouteCardService, RouteRunService};
use walki_core::test_utils::fakes::{
    CountingBlobStore, InMemoryMediaStore, InMemoryRouteStore, PlatformCall, RecordingPlatform,
};
use walki_common::models::{MediaKind, TextFormat};

const CHAT: i64 = 555;
const USER: i32 = 1;
const ROUTE: i32 = 9;
const VERSION: i32 = 90;

struct World {
    routes: Arc<InMemoryRouteStore>,
    media: Arc<InMemoryMediaStore>,
    platform: Arc<RecordingPlatform>,
    run: Arc<RouteRunService>,
    cards: RouteCardService,
}

/// Point 0 has a photo and a narration, point 1 is text only, point 2 has a photo.
fn world() -> World {
    let routes = Arc::new(InMemoryRouteStore::new());
    routes.add_version(ROUTE, VERSION, 1);
    routes.add_point(VERSION, 900, 0, "Harbour");
    routes.add_point(VERSION, 901, 1, "Market");
    routes.add_point(VERSION, 902, 2, "Lighthouse");
    routes.attach_media(900, vec![1], vec![2]);
    routes.attach_media(902, vec![3], vec![]);
    routes.grant_access(USER, ROUTE);

    let media = Arc::new(InMemoryMediaStore::new());
    media.add_media(1, "image/jpeg", Some("p/1.jpg"));
    media.add_media(2, "audio/mpeg", Some("v/2.mp3"));
    media.add_media(3, "image/png", Some("p/3.png"));

    let platform = Arc::new(RecordingPlatform::new());
    let run = Arc::new(RouteRunService::new(routes.clone(), routes.clone(), routes.clone(), routes.clone()));
    let media_service = Arc::new(MediaService::new(
        media.clone(),
        Arc::new(ReferenceCache::new(media.clone())),
        Arc::new(CountingBlobStore::new()),
        platform.clone(),
    ));
    let cards = RouteCardService::new(platform.clone(), media_service, run.clone());

    World { routes, media, platform, run, cards }
}

#[tokio::test]
async fn test_first_card_sends_photo_then_voice() -> Result<(), Error> {
    let w = world();
    let view = w.run.start(USER, ROUTE).await?;

    let shown = w.cards.render(CHAT, USER, &view).await;

    let calls = w.platform.calls();
    assert_eq!(calls.len(), 2);
    match &calls[0] {
        PlatformCall::Media { kind, caption, controls, message_id, .. } => {
            assert_eq!(*kind, MediaKind::Photo);
            assert!(caption.starts_with("📍 *Harbour*"));
            let data: Vec<_> = controls.as_ref().unwrap().buttons().map(|b| b.callback_data.clone()).collect();
            assert_eq!(data, vec!["route_next:9".to_string()]);
            assert_eq!(shown.content_message_id, Some(*message_id));
        }
        other => panic!("expected photo card, got {other:?}"),
    }
    match &calls[1] {
        PlatformCall::Media { kind, caption, controls, message_id, .. } => {
            assert_eq!(*kind, MediaKind::Audio);
            assert!(caption.is_empty());
            assert!(controls.is_none());
            assert_eq!(shown.voice_message_id, Some(*message_id));
        }
        other => panic!("expected voice message, got {other:?}"),
    }

    let row = w.routes.progress_of(USER, VERSION).unwrap();
    assert_eq!(row.content_message_id, shown.content_message_id);
    assert_eq!(row.voice_message_id, shown.voice_message_id);
    assert_eq!(w.media.upsert_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_next_card_replaces_previous_messages() -> Result<(), Error> {
    let w = world();
    let view = w.run.start(USER, ROUTE).await?;
    let first = w.cards.render(CHAT, USER, &view).await;
    w.platform.clear();

    let next = w.run.continue_route(USER, ROUTE).await?.into_view().unwrap();
    let second = w.cards.render(CHAT, USER, &next).await;

    let expected: Vec<i32> = [first.content_message_id, first.voice_message_id]
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(w.platform.deleted(), expected);

    // Text-only point: controls ride on the text card, stored voice is cleared.
    let texts: Vec<_> = w
        .platform
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            PlatformCall::Text { text, format, controls, .. } => Some((text, format, controls)),
            _ => None,
        })
        .collect();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].0.starts_with("📍 *Market*"));
    assert_eq!(texts[0].1, TextFormat::Markdown);
    let data: Vec<_> = texts[0].2.as_ref().unwrap().buttons().map(|b| b.callback_data.clone()).collect();
    assert_eq!(data, vec!["route_prev:9".to_string(), "route_next:9".to_string()]);

    assert_eq!(second.voice_message_id, None);
    let row = w.routes.progress_of(USER, VERSION).unwrap();
    assert_eq!(row.content_message_id, second.content_message_id);
    assert_eq!(row.voice_message_id, None);
    Ok(())
}

#[tokio::test]
async fn test_failed_delete_does_not_block_new_card() -> Result<(), Error> {
    let w = world();
    let view = w.run.start(USER, ROUTE).await?;
    w.cards.render(CHAT, USER, &view).await;
    w.platform.fail_deletes(true);

    let next = w.run.continue_route(USER, ROUTE).await?.into_view().unwrap();
    let shown = w.cards.render(CHAT, USER, &next).await;

    assert_eq!(w.platform.deleted().len(), 2);
    assert!(shown.content_message_id.is_some());
    Ok(())
}

#[tokio::test]
async fn test_last_point_offers_finish_on_photo_card() -> Result<(), Error> {
    let w = world();
    w.run.start(USER, ROUTE).await?;
    w.run.continue_route(USER, ROUTE).await?;
    let last = w.run.continue_route(USER, ROUTE).await?.into_view().unwrap();
    w.platform.clear();

    w.cards.render(CHAT, USER, &last).await;

    let controls = w
        .platform
        .calls()
        .into_iter()
        .find_map(|c| match c {
            PlatformCall::Media { kind: MediaKind::Photo, controls, .. } => controls,
            _ => None,
        })
        .expect("photo card with controls");
    let data: Vec<_> = controls.buttons().map(|b| b.callback_data.clone()).collect();
    assert_eq!(data, vec!["route_prev:9".to_string(), "route_finish:9".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_failed_content_still_sends_voice() -> Result<(), Error> {
    let w = world();
    w.routes.attach_media(900, vec![404], vec![2]);
    let view = w.run.start(USER, ROUTE).await?;

    let shown = w.cards.render(CHAT, USER, &view).await;

    assert_eq!(shown.content_message_id, None);
    assert!(shown.voice_message_id.is_some());
    let row = w.routes.progress_of(USER, VERSION).unwrap();
    assert_eq!(row.content_message_id, None);
    assert_eq!(row.voice_message_id, shown.voice_message_id);
    Ok(())
}

#[tokio::test]
async fn test_voice_delivered_without_reference_is_tracked_and_replaced() -> Result<(), Error> {
    let w = world();
    w.platform.withhold_references(true);
    let view = w.run.start(USER, ROUTE).await?;

    let first = w.cards.render(CHAT, USER, &view).await;

    let voice = first.voice_message_id.expect("voice message delivered");
    assert_eq!(w.routes.progress_of(USER, VERSION).unwrap().voice_message_id, Some(voice));
    assert_eq!(w.media.upsert_count(), 0);

    w.platform.clear();
    let next = w.run.continue_route(USER, ROUTE).await?.into_view().unwrap();
    w.cards.render(CHAT, USER, &next).await;
    assert!(w.platform.deleted().contains(&voice));
    Ok(())
}
