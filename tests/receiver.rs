//! End-to-end tests driving both transports over loopback sockets.

mod common;

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use common::{Collector, Seen, collector, loopback_sender, loopback_server};
use netoutput::{
    CommandProcessor,
    ConnectorState,
    HandlerResult,
    Receiver,
    ReceiverConfig,
    Source,
};
use rstest::rstest;
use tokio::{io::AsyncWriteExt, net::TcpListener, time::timeout};

const WAIT: Duration = Duration::from_secs(2);

fn receiver_for(server: &TcpListener, collector: &Collector) -> Receiver {
    let port = server.local_addr().expect("server addr").port();
    let config = ReceiverConfig::default()
        .with_udp_port(0)
        .with_tcp_target("127.0.0.1", port)
        .with_retry_interval(Duration::from_millis(20))
        .with_stop_timeout(Duration::from_secs(1));
    Receiver::new(config, Arc::new(collector.processor()))
}

fn udp_port(receiver: &Receiver) -> u16 {
    receiver
        .listener()
        .local_addr()
        .expect("listener is bound")
        .port()
}

#[rstest]
#[tokio::test]
async fn both_transports_feed_one_processor(collector: Collector) {
    let server = loopback_server().await;
    let receiver = receiver_for(&server, &collector);
    receiver.start().expect("start receiver");

    let (mut stream, _) = timeout(WAIT, server.accept())
        .await
        .expect("connector dialed")
        .expect("accept");
    stream.write_all(b"pause=1\r\n").await.expect("write");
    assert_eq!(collector.wait_for(1).await.len(), 1);

    let sender = loopback_sender().await;
    sender
        .send_to(b"lamp0=1\n", ("127.0.0.1", udp_port(&receiver)))
        .await
        .expect("send");

    let seen = collector.wait_for(2).await;
    assert_eq!(
        seen,
        [
            Seen::new("pause", Some("1"), Source::Stream),
            Seen::new("lamp0", Some("1"), Source::Datagram),
        ]
    );
    receiver.stop().await;
}

#[rstest]
#[tokio::test]
async fn connector_reconnects_when_the_server_hangs_up(collector: Collector) {
    let server = loopback_server().await;
    let receiver = receiver_for(&server, &collector);
    receiver.start().expect("start receiver");

    let (mut first, _) = timeout(WAIT, server.accept())
        .await
        .expect("first dial")
        .expect("accept");
    first.write_all(b"pause\n").await.expect("write");
    collector.wait_for(1).await;
    drop(first);

    let (mut second, _) = timeout(WAIT, server.accept())
        .await
        .expect("connector redialed")
        .expect("accept");
    second.write_all(b"mame_stop=1\n").await.expect("write");

    let seen = collector.wait_for(2).await;
    assert_eq!(
        seen,
        [
            Seen::new("pause", None, Source::Stream),
            Seen::new("mame_stop", Some("1"), Source::Stream),
        ]
    );
    assert_eq!(receiver.connector().state(), ConnectorState::Connected);
    receiver.stop().await;
}

#[rstest]
#[tokio::test]
async fn connector_waits_for_a_late_server(collector: Collector) {
    // Reserve a port, then release it so the first attempts are refused.
    let reserved = loopback_server().await;
    let port = reserved.local_addr().expect("reserved addr").port();
    drop(reserved);

    let config = ReceiverConfig::default()
        .with_udp_port(0)
        .with_tcp_target("127.0.0.1", port)
        .with_retry_interval(Duration::from_millis(20))
        .with_stop_timeout(Duration::from_secs(1));
    let receiver = Receiver::new(config, Arc::new(collector.processor()));
    receiver.start().expect("start receiver");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(receiver.connector().state(), ConnectorState::Connecting);

    let server = TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("rebind reserved port");
    let (mut stream, _) = timeout(WAIT, server.accept())
        .await
        .expect("connector retried")
        .expect("accept");
    stream.write_all(b"tcp=1\n").await.expect("write");

    let seen = collector.wait_for(1).await;
    assert_eq!(seen, [Seen::new("tcp", Some("1"), Source::Stream)]);
    receiver.stop().await;
}

#[rstest]
#[tokio::test]
async fn stop_is_bounded_with_an_idle_connection(collector: Collector) {
    let server = loopback_server().await;
    let receiver = receiver_for(&server, &collector);
    receiver.start().expect("start receiver");
    let (_stream, _) = timeout(WAIT, server.accept())
        .await
        .expect("connector dialed")
        .expect("accept");

    timeout(Duration::from_secs(3), receiver.stop())
        .await
        .expect("stop should not wait for more data");
    assert!(!receiver.listener().is_running());
    assert!(!receiver.connector().is_running());
}

#[tokio::test]
async fn blocking_handler_on_one_transport_does_not_stall_the_other() {
    let handled_at = Arc::new(Mutex::new(None::<Instant>));
    let recorded = Arc::clone(&handled_at);
    let processor = CommandProcessor::builder()
        .route("slow", |_: Option<&str>, _: Source| -> HandlerResult {
            std::thread::sleep(Duration::from_secs(1));
            Ok(())
        })
        .expect("route slow")
        .fallback(
            move |_: &str, _: Option<&str>, _: Source| -> HandlerResult {
                recorded.lock().expect("lock").get_or_insert_with(Instant::now);
                Ok(())
            },
        )
        .build();

    let server = loopback_server().await;
    let port = server.local_addr().expect("server addr").port();
    let config = ReceiverConfig::default()
        .with_udp_port(0)
        .with_tcp_target("127.0.0.1", port)
        .with_retry_interval(Duration::from_millis(20))
        .with_stop_timeout(Duration::from_secs(1));
    let receiver = Receiver::new(config, Arc::new(processor));
    receiver.start().expect("start receiver");
    let (mut stream, _) = timeout(WAIT, server.accept())
        .await
        .expect("connector dialed")
        .expect("accept");

    let sender = loopback_sender().await;
    sender
        .send_to(b"slow\n", ("127.0.0.1", udp_port(&receiver)))
        .await
        .expect("send");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let sent_at = Instant::now();
    stream.write_all(b"lamp=1\n").await.expect("write");
    let handled = timeout(WAIT, async {
        loop {
            if let Some(at) = *handled_at.lock().expect("lock") {
                return at;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("stream command handled");

    let latency = handled.saturating_duration_since(sent_at);
    assert!(
        latency < Duration::from_millis(500),
        "stream command waited {latency:?} behind the datagram handler"
    );
    receiver.stop().await;
}
