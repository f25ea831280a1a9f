// File: walki-core/tests/repository_tests.rs
//
// Needs a reachable Postgres (TEST_DATABASE_URL). Run with `--ignored`.
// Everything lives in one test because each stage truncates the shared DB.

use sqlx::{Pool, Postgres, Row};

use walki_core::Error;
use walki_core::repositories::{
    AccessRepository, MediaRepository, PlatformReferenceRepository, PointRepository,
    PostgresMediaRepository, PostgresOrderRepository, PostgresRouteRepository,
    PostgresRouteRunRepository, PostgresUserRepository, ProgressRepository, RouteRepository,
    UserRepository,
};
use walki_core::test_utils::helpers::{clean_database, setup_test_database};
use walki_common::models::MessageIdUpdate;

struct Seed {
    user_id: i32,
    route_id: i32,
    old_version: i32,
    version_id: i32,
    point_ids: Vec<i32>,
}

async fn seed(pool: &Pool<Postgres>) -> Result<Seed, Error> {
    let users = PostgresUserRepository::new(pool.clone());
    let user_id = users.upsert_by_telegram_id(1001, Some("walker"), Some("Test Walker")).await?;

    let route_id: i32 = sqlx::query_scalar("INSERT INTO routes (status, is_visible) VALUES ('published', TRUE) RETURNING id")
        .fetch_one(pool)
        .await?;

    let mut versions = Vec::new();
    for number in [1, 2] {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO route_versions (route_id, version_number, title, city) VALUES ($1, $2, $3, 'Riga') RETURNING id",
        )
        .bind(route_id)
        .bind(number)
        .bind(format!("Old town v{number}"))
        .fetch_one(pool)
        .await?;
        versions.push(id);
    }
    let version_id = versions[1];

    let mut point_ids = Vec::new();
    for idx in [0, 2, 5] {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO route_points (version_id, order_index, title, latitude, longitude) VALUES ($1, $2, $3, 56.95, 24.1) RETURNING id",
        )
        .bind(version_id)
        .bind(idx)
        .bind(format!("Point {idx}"))
        .fetch_one(pool)
        .await?;
        point_ids.push(id);
    }

    Ok(Seed { user_id, route_id, old_version: versions[0], version_id, point_ids })
}

async fn check_routes_and_points(pool: &Pool<Postgres>, s: &Seed) -> Result<(), Error> {
    let routes = PostgresRouteRepository::new(pool.clone());
    let latest = routes.latest_version(s.route_id).await?.expect("latest version");
    assert_eq!(latest.id, s.version_id);
    assert_eq!(latest.version_number, 2);
    assert!(routes.version_by_id(s.old_version).await?.is_some());
    assert!(routes.latest_version(s.route_id + 1000).await?.is_none());

    let points = PostgresRouteRunRepository::new(pool.clone());
    assert_eq!(points.point_at_index(s.version_id, 2).await?.map(|p| p.id), Some(s.point_ids[1]));
    assert!(points.point_at_index(s.version_id, 1).await?.is_none());
    assert_eq!(points.first_point(s.version_id).await?.map(|p| p.idx), Some(0));
    assert_eq!(points.next_index(s.version_id, 0).await?, Some(2));
    assert_eq!(points.next_index(s.version_id, 5).await?, None);
    assert_eq!(points.prev_index(s.version_id, 5).await?, Some(2));
    assert_eq!(points.prev_index(s.version_id, 0).await?, None);
    Ok(())
}

async fn check_access(pool: &Pool<Postgres>, s: &Seed) -> Result<(), Error> {
    let access = PostgresOrderRepository::new(pool.clone());
    assert!(!access.user_has_access(s.user_id, s.route_id).await?);

    sqlx::query("INSERT INTO orders (user_id, route_id, status, access_expiry) VALUES ($1, $2, 'paid', NOW() - INTERVAL '1 day')")
        .bind(s.user_id)
        .bind(s.route_id)
        .execute(pool)
        .await?;
    assert!(!access.user_has_access(s.user_id, s.route_id).await?);

    sqlx::query("INSERT INTO orders (user_id, route_id, status) VALUES ($1, $2, 'paid')")
        .bind(s.user_id)
        .bind(s.route_id)
        .execute(pool)
        .await?;
    assert!(access.user_has_access(s.user_id, s.route_id).await?);
    Ok(())
}

async fn check_progress(pool: &Pool<Postgres>, s: &Seed) -> Result<(), Error> {
    let progress = PostgresRouteRunRepository::new(pool.clone());
    let (user, version) = (s.user_id, s.version_id);

    assert!(progress.get_progress(user, version).await?.is_none());
    let err = progress.finish(user, version).await.unwrap_err();
    assert!(matches!(err, Error::ProgressNotFound { .. }));

    progress.upsert_progress(user, s.route_id, version, 0, true).await?;
    progress.upsert_progress(user, s.route_id, version, 2, false).await?;
    let row = progress.get_progress(user, version).await?.expect("progress");
    assert_eq!(row.current_idx, 2);
    assert!(!row.is_finished());

    progress.finish(user, version).await?;
    let first_finish = progress.get_progress(user, version).await?.unwrap().finished_at;
    progress.finish(user, version).await?;
    assert_eq!(progress.get_progress(user, version).await?.unwrap().finished_at, first_finish);

    // Moving without reopening keeps the finish mark; reopening clears it.
    progress.upsert_progress(user, s.route_id, version, 0, false).await?;
    assert!(progress.get_progress(user, version).await?.unwrap().is_finished());
    progress.upsert_progress(user, s.route_id, version, 0, true).await?;
    assert!(!progress.get_progress(user, version).await?.unwrap().is_finished());

    progress
        .update_message_ids(user, version, MessageIdUpdate::Set(10), MessageIdUpdate::Set(11))
        .await?;
    progress
        .update_message_ids(user, version, MessageIdUpdate::Unset, MessageIdUpdate::Clear)
        .await?;
    let row = progress.get_progress(user, version).await?.unwrap();
    assert_eq!(row.content_message_id, Some(10));
    assert_eq!(row.voice_message_id, None);

    let err = progress
        .update_message_ids(user, s.old_version, MessageIdUpdate::Set(1), MessageIdUpdate::Unset)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProgressNotFound { .. }));

    let rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM route_progress")
        .fetch_one(pool)
        .await?
        .get("n");
    assert_eq!(rows, 1);
    Ok(())
}

async fn check_media(pool: &Pool<Postgres>, s: &Seed) -> Result<(), Error> {
    let mut ids = Vec::new();
    for (kind, mime, key) in [("image", "image/jpeg", "p/1.jpg"), ("audio", "audio/mpeg", "v/1.mp3")] {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO media (type, mime_type, s3_bucket, s3_key) VALUES ($1, $2, 'walki', $3) RETURNING id",
        )
        .bind(kind)
        .bind(mime)
        .bind(key)
        .fetch_one(pool)
        .await?;
        sqlx::query("INSERT INTO route_point_media (route_point_id, media_id) VALUES ($1, $2)")
            .bind(s.point_ids[0])
            .bind(id)
            .execute(pool)
            .await?;
        ids.push(id);
    }

    let points = PostgresRouteRunRepository::new(pool.clone());
    let attached = points.media_for_point(s.point_ids[0]).await?;
    assert_eq!(attached.photo_ids, vec![ids[0]]);
    assert_eq!(attached.audio_ids, vec![ids[1]]);

    let media = PostgresMediaRepository::new(pool.clone());
    let photo = media.get_by_id(ids[0]).await?.expect("media row");
    assert_eq!(photo.storage_key(), Some("p/1.jpg"));
    assert_eq!(photo.mime(), "image/jpeg");
    assert!(media.get_by_id(ids[1] + 1000).await?.is_none());

    assert!(media.get_reference(ids[0]).await?.is_none());
    media.upsert_reference(ids[0], "AgAD-first", "image/jpeg", Some(42)).await?;
    media.upsert_reference(ids[0], "AgAD-second", "image/jpeg", Some(42)).await?;
    let reference = media.get_reference(ids[0]).await?.expect("reference");
    assert_eq!(reference.native_ref, "AgAD-second");
    assert_eq!(reference.chat_id, Some(42));
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_postgres_repositories() -> Result<(), Error> {
    let db = setup_test_database().await?;
    let pool = db.pool();

    let s = seed(pool).await?;
    check_routes_and_points(pool, &s).await?;
    check_access(pool, &s).await?;
    check_progress(pool, &s).await?;
    check_media(pool, &s).await?;

    // Same telegram account maps to the same internal user.
    let users = PostgresUserRepository::new(pool.clone());
    assert_eq!(users.upsert_by_telegram_id(1001, None, None).await?, s.user_id);

    clean_database(pool).await?;
    Ok(())
}
