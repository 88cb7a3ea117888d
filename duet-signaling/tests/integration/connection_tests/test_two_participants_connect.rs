use anyhow::Result;
use duet_signaling::CallConfig;

use crate::integration::{connected_pair, init_tracing};

fn position(events: &[String], name: &str) -> Option<usize> {
    events.iter().position(|e| e == name)
}

#[tokio::test]
async fn test_two_participants_connect() -> Result<()> {
    init_tracing();

    let (spy, organizer, joiner) = connected_pair(CallConfig::default()).await?;

    let from_organizer = spy.events_from("a7x").await;
    let from_joiner = spy.events_from("m2q").await;

    // Approval always precedes the offer, and the offer waits for joiner_ready.
    let approved = position(&from_organizer, "join_approved").expect("no join_approved");
    let offer = position(&from_organizer, "webrtc_offer").expect("no offer");
    assert!(approved < offer);
    assert_eq!(from_joiner.first().map(String::as_str), Some("join_request"));
    assert!(position(&from_joiner, "joiner_ready").is_some());
    assert!(position(&from_joiner, "webrtc_answer").is_some());

    assert_eq!(spy.count("webrtc_offer").await, 1);
    assert_eq!(spy.count("webrtc_answer").await, 1);
    assert!(from_organizer.iter().all(|e| e != "join_request" && e != "webrtc_answer"));

    // Batched candidates were applied on both sides.
    assert_eq!(organizer.control.applied_candidates().len(), 1);
    assert_eq!(joiner.control.applied_candidates().len(), 1);
    assert_eq!(organizer.control.created(), 1);
    assert_eq!(joiner.control.created(), 1);

    let offer_payload = spy
        .sent()
        .await
        .into_iter()
        .find(|b| b.event == "webrtc_offer")
        .expect("offer recorded")
        .payload;
    assert_eq!(offer_payload["from"], "a7x");
    assert_eq!(offer_payload["session"], 1);

    Ok(())
}
