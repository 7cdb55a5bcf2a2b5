use super::*;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

#[test]
fn test_signal_wire_format() {
    let init = serde_json::to_string(&LifecycleSignal::Initialize { visit_id: 4 }).unwrap();
    assert_eq!(init, r#"{"action":"Initialize","visit_id":4}"#);

    let fin = serde_json::to_string(&LifecycleSignal::Finalize { visit_id: 4 }).unwrap();
    assert_eq!(fin, r#"{"action":"Finalize","visit_id":4}"#);
}

#[tokio::test]
async fn test_signals_arrive_as_json_lines() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        let mut received = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            received.push(line);
            if received.len() == 2 {
                break;
            }
        }
        received
    });

    let mut channel = LifecycleChannel::connect(Some(&addr)).await;
    assert!(channel.is_connected());
    channel.visit_started(9).await;
    channel.visit_finished(9).await;
    drop(channel);

    let received = server.await.unwrap();
    assert_eq!(received[0], r#"{"action":"Initialize","visit_id":9}"#);
    assert_eq!(received[1], r#"{"action":"Finalize","visit_id":9}"#);
}

#[tokio::test]
async fn test_unconfigured_channel_is_a_noop() {
    let mut channel = LifecycleChannel::connect(None).await;
    assert!(!channel.is_connected());
    channel.visit_started(1).await;
    channel.visit_finished(1).await;
}

#[tokio::test]
async fn test_unreachable_aggregator_disables_signals() {
    // Port 9 is the discard service, closed on any sane test host
    let mut channel = LifecycleChannel::connect(Some("127.0.0.1:9")).await;
    assert!(!channel.is_connected());
    channel.visit_started(1).await;
}
