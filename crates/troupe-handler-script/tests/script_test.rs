use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use troupe::{ActorRef, ActorTypeRegistry, Envelope, Message, Stage, Termination};
use troupe_handler_script::{ScriptHost, SCRIPT_ACTOR_TYPE};

const ECHO: &str = r#"
fn echo() { #{ seen: 0 } }

fn handleSocket(address, args, kind, name, uuid) {
    this.seen += 1;
    if address == "/quit" { return SystemExit(); }
    [address, args]
}
"#;

fn versioned(version: &str) -> String {
    format!(
        r#"
fn echo() {{ #{{}} }}

fn handleSocket(address, args, kind, name, uuid) {{ ["/{version}"] }}
"#
    )
}

fn stage() -> Stage {
    let mut registry = ActorTypeRegistry::new();
    troupe_handler_script::register(&mut registry, Arc::new(ScriptHost::default())).unwrap();
    Stage::new(registry)
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
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

fn ping(actor: &ActorRef) {
    actor
        .send_socket(Message::from(Envelope::new().with("/ping").with(42)))
        .unwrap();
}

async fn load(actor: &ActorRef, path: &Path) {
    actor
        .apply_change("script", path.to_str().unwrap())
        .unwrap();
    eventually(|| actor.sources().len() == 1).await;
}

#[test_log::test(tokio::test)]
async fn echoes_decoded_messages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.rhai");
    fs::write(&path, ECHO).unwrap();

    let mut stage = stage();
    let actor = stage.spawn(SCRIPT_ACTOR_TYPE, "echo").unwrap();
    let mut out = actor.subscribe();
    load(&actor, &path).await;

    ping(&actor);
    let reply = recv(&mut out).await;
    assert_eq!(
        reply.first_envelope(),
        Some(&Envelope::new().with("/ping").with(42))
    );
    // No timeout member, no timer.
    assert_eq!(actor.timeout(), -1);
    stage.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn timeout_member_drives_the_timer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ticker.rhai");
    fs::write(
        &path,
        r#"
fn ticker() { #{ timeout: 20, ticks: 0 } }

fn handleTimer(kind, name, uuid) {
    this.ticks += 1;
    if this.ticks >= 2 { this.timeout = -1; }
    ["/tick", [this.ticks, kind]]
}
"#,
    )
    .unwrap();

    let mut stage = stage();
    let actor = stage.spawn(SCRIPT_ACTOR_TYPE, "ticker").unwrap();
    let mut out = actor.subscribe();
    load(&actor, &path).await;

    for expected in 1..=2 {
        let tick = recv(&mut out).await;
        assert_eq!(
            tick.first_envelope(),
            Some(&Envelope::new().with("/tick").with(expected).with("TIME"))
        );
    }
    eventually(|| actor.timeout() == -1).await;
    stage.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn writing_the_file_reloads_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.rhai");
    fs::write(&path, versioned("v1")).unwrap();

    let mut stage = stage();
    let actor = stage.spawn(SCRIPT_ACTOR_TYPE, "echo").unwrap();
    let mut out = actor.subscribe();
    load(&actor, &path).await;
    ping(&actor);
    assert_eq!(recv(&mut out).await.first_envelope().unwrap().address(), Some("/v1"));

    fs::write(&path, versioned("v2")).unwrap();
    let mut address = String::new();
    for _ in 0..100 {
        ping(&actor);
        address = recv(&mut out)
            .await
            .first_envelope()
            .and_then(|e| e.address().map(str::to_string))
            .unwrap_or_default();
        if address == "/v2" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(address, "/v2");
    assert_eq!(actor.sources().len(), 1);
    stage.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn failed_reload_keeps_previous_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.rhai");
    fs::write(&path, versioned("v1")).unwrap();

    let mut stage = stage();
    let actor = stage.spawn(SCRIPT_ACTOR_TYPE, "echo").unwrap();
    let mut out = actor.subscribe();
    load(&actor, &path).await;

    // The broken write reaches the actor through the watch only. Give the
    // close-after-write event time to be dispatched before pinging.
    fs::write(&path, "fn echo( {").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    ping(&actor);
    assert_eq!(recv(&mut out).await.first_envelope().unwrap().address(), Some("/v1"));
    assert_eq!(actor.sources().len(), 1);

    // The watch outlives the failed reload: a fixed file is picked up.
    fs::write(&path, versioned("v2")).unwrap();
    let mut address = String::new();
    for _ in 0..50 {
        ping(&actor);
        let reply = recv(&mut out).await;
        address = reply.first_envelope().unwrap().address().unwrap_or("").to_string();
        if address == "/v2" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(address, "/v2");
    stage.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn reloading_twice_keeps_one_watch() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("echo.rhai");
    let second = dir.path().join("other.rhai");
    fs::write(&first, ECHO).unwrap();
    fs::write(&second, ECHO.replace("fn echo()", "fn other()")).unwrap();

    let mut stage = stage();
    let actor = stage.spawn(SCRIPT_ACTOR_TYPE, "echo").unwrap();
    let mut out = actor.subscribe();
    load(&actor, &first).await;
    let token = actor.sources();

    actor.apply_change("script", first.to_str().unwrap()).unwrap();
    actor.apply_change("script", first.to_str().unwrap()).unwrap();
    ping(&actor);
    recv(&mut out).await;
    assert_eq!(actor.sources(), token);

    actor.apply_change("script", second.to_str().unwrap()).unwrap();
    ping(&actor);
    recv(&mut out).await;
    let switched = actor.sources();
    assert_eq!(switched.len(), 1);
    assert!(switched != token);
    stage.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn removing_the_file_unloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.rhai");
    fs::write(&path, ECHO).unwrap();

    let mut stage = stage();
    let actor = stage.spawn(SCRIPT_ACTOR_TYPE, "echo").unwrap();
    let mut out = actor.subscribe();
    load(&actor, &path).await;

    fs::remove_file(&path).unwrap();
    eventually(|| actor.sources().is_empty()).await;
    ping(&actor);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(out.try_recv().is_err());
    stage.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn empty_filename_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.rhai");
    fs::write(&path, ECHO).unwrap();

    let mut stage = stage();
    let actor = stage.spawn(SCRIPT_ACTOR_TYPE, "echo").unwrap();
    let mut out = actor.subscribe();
    load(&actor, &path).await;
    let watch = actor.sources();

    actor.apply_change("script", "").unwrap();
    actor.send_api("SET FILE", None).unwrap();
    ping(&actor);
    assert_eq!(
        recv(&mut out).await.first_envelope(),
        Some(&Envelope::new().with("/ping").with(42))
    );
    assert_eq!(actor.sources(), watch);
    stage.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn stop_succeeds_without_an_instance() {
    let mut stage = stage();
    let actor = stage.spawn(SCRIPT_ACTOR_TYPE, "idle").unwrap();
    actor
        .apply_change("script", "/nonexistent/missing.rhai")
        .unwrap();
    ping(&actor);
    stage.stop("idle").await.unwrap();
    assert!(!actor.is_running());
    assert!(actor.sources().is_empty());
}

#[test_log::test(tokio::test)]
async fn stop_tears_down_the_watch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.rhai");
    fs::write(&path, ECHO).unwrap();

    let mut stage = stage();
    let actor = stage.spawn(SCRIPT_ACTOR_TYPE, "echo").unwrap();
    load(&actor, &path).await;
    stage.stop("echo").await.unwrap();
    assert!(actor.sources().is_empty());
}

#[test_log::test(tokio::test)]
async fn system_exit_terminates_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.rhai");
    fs::write(&path, ECHO).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut stage = stage().with_termination(Termination::notify(tx));
    let actor = stage.spawn(SCRIPT_ACTOR_TYPE, "echo").unwrap();
    load(&actor, &path).await;

    actor
        .send_socket(Message::from(Envelope::new().with("/quit")))
        .unwrap();
    let request = recv(&mut rx).await;
    assert_eq!(request.actor, "echo");
    assert_eq!(request.reason, "SystemExit");
    stage.shutdown().await;
}
