//! Device handle plumbing: command enqueueing and response channels,
//! exercised against a detached command receiver instead of a radio.

use meshgram::meshtastic::{DeviceCommand, DeviceError, DeviceHandle};

#[tokio::test]
async fn fire_and_forget_commands_enqueue_in_order() {
    let (handle, mut commands) = DeviceHandle::mock();
    handle.send_text("Ada: hello");
    handle.traceroute("!00000001");
    handle.send_direct("!00000002", "welcome");

    match commands.recv().await.unwrap() {
        DeviceCommand::SendText { text } => assert_eq!(text, "Ada: hello"),
        other => panic!("unexpected command: {other:?}"),
    }
    match commands.recv().await.unwrap() {
        DeviceCommand::Traceroute { dest } => assert_eq!(dest, "!00000001"),
        other => panic!("unexpected command: {other:?}"),
    }
    match commands.recv().await.unwrap() {
        DeviceCommand::SendDirect { dest, text } => {
            assert_eq!(dest, "!00000002");
            assert_eq!(text, "welcome");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[tokio::test]
async fn reboot_outcome_reaches_the_caller() {
    let (handle, mut commands) = DeviceHandle::mock();
    let actor = tokio::spawn(async move {
        match commands.recv().await.unwrap() {
            DeviceCommand::Reboot { respond_to } => {
                // Simulate a failed post-settle reconnect: the error must be
                // observable by whoever asked for the reboot.
                let _ = respond_to.send(Err(DeviceError::NotConnected));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    });

    let err = handle.reboot().await.unwrap_err();
    assert!(matches!(err, DeviceError::NotConnected));
    actor.await.unwrap();
}

#[tokio::test]
async fn queries_degrade_when_the_actor_is_gone() {
    let (handle, commands) = DeviceHandle::mock();
    drop(commands);

    assert!(matches!(handle.reboot().await, Err(DeviceError::TaskGone)));
    assert!(handle.nodes().await.is_empty());
    assert!(handle.channel_url().await.is_none());
    let status = handle.status().await;
    assert!(!status.connected);
    assert_eq!(status.node_count, 0);
}
