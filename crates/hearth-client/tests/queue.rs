mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Semaphore;

use common::*;
use hearth_client::{ClientError, ClientEvent, Draft};
use hearth_net::{Attachment, NetError};
use hearth_shared::types::{ChannelId, MessageId};
use hearth_store::TimelineEntry;

fn c1() -> ChannelId {
    ChannelId::from("c1")
}

#[tokio::test]
async fn confirmed_send_leaves_exactly_one_message() {
    let mut h = harness();
    let conn = h.connect_ready().await;

    let message = h.session.queue().send(&c1(), Draft::text("hello")).await.unwrap();
    let nonce = message.nonce.clone().unwrap();
    assert_eq!(h.api.sent.lock().unwrap()[0].nonce, nonce);

    // The gateway echo of the same message lands after the REST response.
    let mut echo = confirmed_message_json("c1", &nonce, "hello");
    echo["type"] = json!("Message");
    conn.push(echo).await;
    conn.push(json!({"type": "ChannelStartTyping", "id": "c1", "user": "other"}))
        .await;
    eventually(&h.session, |s| !s.typing_users(&c1()).is_empty()).await;

    h.session
        .store()
        .read(|s| {
            assert!(s.queued(&c1()).is_empty());
            let timeline = s.channel_messages(&c1());
            assert_eq!(timeline.len(), 1);
            assert!(matches!(timeline[0], TimelineEntry::Message(m) if m.id == message.id));
            // Own messages never count as unread.
            assert!(!s.is_unread(&c1()));
        })
        .unwrap();
}

#[tokio::test]
async fn echo_before_response_reconciles_the_placeholder() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with(HarnessOptions {
        api: FakeApi {
            send_gate: Some(gate.clone()),
            ..Default::default()
        },
        ..Default::default()
    });
    let conn = h.connect_ready().await;

    let session = h.session.clone();
    let pending =
        tokio::spawn(async move { session.queue().send(&c1(), Draft::text("racing")).await });

    eventually(&h.session, |s| s.queued(&c1()).len() == 1).await;
    let nonce = h
        .session
        .store()
        .read(|s| {
            let timeline = s.channel_messages(&c1());
            assert!(matches!(timeline[..], [TimelineEntry::Queued(q)] if q.content == "racing"));
            s.queued(&c1())[0].nonce.clone()
        })
        .unwrap();

    let mut echo = confirmed_message_json("c1", nonce.as_str(), "racing");
    echo["type"] = json!("Message");
    conn.push(echo).await;
    let confirmed = FakeApi::confirmed_id(nonce.as_str());
    eventually(&h.session, |s| {
        s.queued(&c1()).is_empty() && s.message(&confirmed).is_some()
    })
    .await;

    gate.add_permits(1);
    let message = pending.await.unwrap().unwrap();
    assert_eq!(message.id, confirmed);

    let ids = h
        .session
        .store()
        .read(|s| s.channel_message_ids(&c1()).map(<[MessageId]>::to_vec))
        .unwrap();
    assert_eq!(ids, Some(vec![confirmed]));
}

#[tokio::test]
async fn failed_send_drops_the_placeholder_and_reports() {
    let mut h = harness();
    let _conn = h.connect_ready().await;
    h.api.fail_sends.store(true, Ordering::SeqCst);
    let mut events = h.session.subscribe();

    let result = h.session.queue().send(&c1(), Draft::text("doomed")).await;
    assert!(matches!(result, Err(ClientError::SendFailed(_))));

    h.session
        .store()
        .read(|s| {
            assert!(s.queued(&c1()).is_empty());
            assert!(s.channel_messages(&c1()).is_empty());
        })
        .unwrap();

    let nonce = h.api.sent.lock().unwrap()[0].nonce.clone();
    loop {
        if let ClientEvent::MessageFailed {
            channel,
            nonce: failed,
            ..
        } = events.recv().await.unwrap()
        {
            assert_eq!(channel, c1());
            assert_eq!(failed.as_str(), nonce);
            break;
        }
    }
}

#[tokio::test]
async fn attachments_need_file_storage() {
    let mut h = harness();
    let _conn = h.connect_ready().await;

    let draft = Draft {
        content: "see attached".into(),
        attachments: vec![Attachment {
            filename: "notes.txt".into(),
            content_type: "text/plain".into(),
            bytes: b"hello".to_vec(),
        }],
        ..Default::default()
    };
    let result = h.session.queue().send(&c1(), draft).await;

    assert!(matches!(
        result,
        Err(ClientError::Net(NetError::NoFileStorage))
    ));
    assert!(h.api.sent.lock().unwrap().is_empty());
    assert!(h
        .session
        .store()
        .read(|s| s.queued(&c1()).is_empty())
        .unwrap());
}

#[tokio::test]
async fn sending_requires_a_signed_in_user() {
    let h = harness();
    let result = h.session.queue().send(&c1(), Draft::text("hi")).await;
    assert!(matches!(result, Err(ClientError::NotAuthenticated)));
    assert!(h.api.sent.lock().unwrap().is_empty());
}
