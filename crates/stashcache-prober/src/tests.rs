use stashcache_db::{upsert_clips, ClipUpsert, Database};

use crate::{client, probe_and_record, probe_batch, PendingClip};

#[tokio::test]
async fn probe_batch_omits_urls_whose_request_fails() {
    // Port 0 never accepts a connection; every probe in the batch fails
    // at the transport layer and should be dropped, not panic the batch.
    let urls = vec!["http://127.0.0.1:0/preview.webp".to_string(), "http://127.0.0.1:0/other.webp".to_string()];
    let results = probe_batch(&client(), &urls, 2).await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn probe_and_record_leaves_unreachable_clips_untouched() {
    let db = Database::open_in_memory().await.unwrap();
    let mut tx = db.begin().await.unwrap();
    upsert_clips(
        &mut tx,
        &[ClipUpsert {
            id: "c1".into(),
            instance: "".into(),
            scene_id: "s1".into(),
            scene_instance: "".into(),
            preview_path: Some("http://127.0.0.1:0/preview.webp".into()),
            seconds: 1.0,
            updated_at: "2024-01-01T00:00:00Z".into(),
            ..Default::default()
        }],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let clips = vec![PendingClip { id: "c1".into(), instance: "".into(), preview_url: "http://127.0.0.1:0/preview.webp".into() }];
    probe_and_record(db.pool(), &client(), &clips, 4).await;

    let row: (Option<bool>,) = sqlx::query_as("SELECT is_generated FROM clips WHERE id = 'c1'").fetch_one(db.pool()).await.unwrap();
    // The probe never got a response, so the verdict column is left as
    // it was (NULL) rather than being written as a false negative.
    assert_eq!(row.0, None);
}
