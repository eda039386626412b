mod common;

use std::path::Path;
use std::time::Duration;

use serde_json::json;

use common::*;
use hearth_client::Draft;
use hearth_shared::types::{ChannelId, MessageId, UserId};
use hearth_store::{Database, DatabaseHandle, EntityStore, Persister, StoreHandle};

fn last_write(dir: &Path) -> String {
    Database::open_in(dir)
        .unwrap()
        .conn()
        .query_row("SELECT MAX(updated_at) FROM collections", [], |row| row.get(0))
        .unwrap()
}

#[tokio::test]
async fn flushed_store_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in(dir.path()).unwrap();
    let store = StoreHandle::new(db.load_store());
    let (persister, task) = Persister::spawn(
        DatabaseHandle::new(db),
        store.clone(),
        Duration::from_millis(20),
    );

    let mut h = harness_with(HarnessOptions {
        persister: Some(persister.clone()),
        store_handle: Some(store.clone()),
        ..Default::default()
    });
    let conn = h.connect_ready().await;
    conn.push(message_json("01", "c1", "other")).await;
    h.session
        .queue()
        .send(&ChannelId::from("c1"), Draft::text("reply"))
        .await
        .unwrap();
    eventually(&h.session, |s| s.message(&MessageId::from("01")).is_some()).await;

    h.session.stop().await;
    persister.flush().await.unwrap();
    persister.shutdown().await;
    task.await.unwrap();

    let expected = store.read(EntityStore::without_ephemeral).unwrap();
    let reloaded = Database::open_in(dir.path()).unwrap().load_store();
    assert_eq!(reloaded, expected);
    assert_eq!(
        reloaded
            .channel_message_ids(&ChannelId::from("c1"))
            .map(<[MessageId]>::len),
        Some(2)
    );
}

#[tokio::test]
async fn sign_out_wipes_the_durable_copy() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in(dir.path()).unwrap();
    let store = StoreHandle::new(db.load_store());
    let (persister, task) = Persister::spawn(
        DatabaseHandle::new(db),
        store.clone(),
        Duration::from_millis(20),
    );

    let mut h = harness_with(HarnessOptions {
        persister: Some(persister.clone()),
        store_handle: Some(store),
        ..Default::default()
    });
    let _conn = h.connect_ready().await;
    persister.flush().await.unwrap();
    assert!(Database::open_in(dir.path())
        .unwrap()
        .load_store()
        .current_user()
        .is_some());

    h.session.sign_out().await.unwrap();
    persister.shutdown().await;
    task.await.unwrap();

    assert_eq!(
        Database::open_in(dir.path()).unwrap().load_store(),
        EntityStore::new()
    );
}

#[tokio::test]
async fn typing_does_not_rewrite_the_durable_copy() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in(dir.path()).unwrap();
    let store = StoreHandle::new(db.load_store());
    let (persister, task) = Persister::spawn(
        DatabaseHandle::new(db),
        store.clone(),
        Duration::from_millis(20),
    );

    let mut h = harness_with(HarnessOptions {
        persister: Some(persister.clone()),
        store_handle: Some(store),
        ..Default::default()
    });
    let conn = h.connect_ready().await;
    persister.flush().await.unwrap();
    let written = last_write(dir.path());

    conn.push(json!({"type": "ChannelStartTyping", "id": "c1", "user": "other"}))
        .await;
    eventually(&h.session, |s| s.typing_users(&ChannelId::from("c1")) == [UserId::from("other")])
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(last_write(dir.path()), written);

    conn.push(message_json("01", "c1", "other")).await;
    let mut rewritten = false;
    for _ in 0..100 {
        if last_write(dir.path()) != written {
            rewritten = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(rewritten, "a persisted change should still be written");

    h.session.stop().await;
    persister.shutdown().await;
    task.await.unwrap();
}
