use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::sync::mpsc;
use troupe::message::wire;
use troupe::{ActorTypeRegistry, Envelope, Frame, Message, Stage, Value};

fn stage() -> Stage {
    let mut registry = ActorTypeRegistry::new();
    troupe_handler_native::register(&mut registry).unwrap();
    Stage::new(registry)
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("channel closed")
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

#[test_log::test(tokio::test)]
async fn pulse_emits_until_rate_zero() {
    let mut stage = stage();
    let pulse = stage.spawn("Pulse", "clock").unwrap();
    let mut out = pulse.subscribe();

    pulse.apply_change("address", "/tick").unwrap();
    pulse.apply_change("rate", "20").unwrap();

    let first = recv(&mut out).await;
    let envelope = first.first_envelope().unwrap();
    assert_eq!(envelope.address(), Some("/tick"));
    assert_eq!(envelope.tags(), "si");
    let second = recv(&mut out).await;
    let (a, b) = (
        envelope.values()[1].as_i64().unwrap(),
        second.first_envelope().unwrap().values()[1].as_i64().unwrap(),
    );
    assert_eq!(b, a + 1);

    pulse.apply_change("rate", "0").unwrap();
    eventually(|| pulse.timeout() == -1).await;
    while out.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(out.try_recv().is_err());

    stage.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn rate_is_clamped_by_capabilities() {
    let mut stage = stage();
    let pulse = stage.spawn("Pulse", "clock").unwrap();
    pulse.apply_change("rate", "50000").unwrap();
    assert_eq!(pulse.capabilities().value("rate"), Some("10000"));
    eventually(|| pulse.timeout() == 10_000).await;
    stage.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn count_follows_pulse_and_resets() {
    let mut stage = stage();
    let pulse = stage.spawn("Pulse", "clock").unwrap();
    let count = stage.spawn("Count", "counter").unwrap();
    stage.connect("clock", "counter").unwrap();
    let mut totals = count.subscribe();

    pulse.apply_change("rate", "10").unwrap();
    let mut last = 0;
    for _ in 0..3 {
        let message = recv(&mut totals).await;
        let envelope = message.first_envelope().unwrap();
        assert_eq!(envelope.address(), Some("/count"));
        last = envelope.values()[1].as_i64().unwrap();
    }
    assert!(last >= 3);
    assert!(count.report().field("count").is_some());

    pulse.apply_change("rate", "0").unwrap();
    eventually(|| pulse.timeout() == -1).await;
    count.apply_change("reset", "").unwrap();
    eventually(|| count.report().field("count") == Some(&Value::Int64(0))).await;

    stage.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn log_passes_frames_through() {
    let mut stage = stage();
    let log = stage.spawn("Log", "trace").unwrap();
    let mut out = log.subscribe();

    log.apply_change("prefix", "in: ").unwrap();
    let envelope = Envelope::new().with("/raw").with(1.5f32);
    let mut message = Message::from(Envelope::new().with("/typed"));
    message.push(Frame::Raw(wire::encode(&envelope)));
    log.send_socket(message.clone()).unwrap();

    assert_eq!(recv(&mut out).await, message);
    stage.shutdown().await;
}
