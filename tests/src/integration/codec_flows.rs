//! # Codec Flows
//!
//! Wire fidelity end to end:
//!
//! 1. A frame sent in the current layout, orientation read from the bno055
//!    channels, is published unchanged.
//! 2. Frames recorded from a live source replay with the same content on
//!    the playback clock.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shared_bus::StateHub;
    use sm_03_source_protocol::{
        encode_bytes, AbsoluteOrientation, Battery, Euler, MultiFrame, SensorFrame, Vector3,
        WireVariant,
    };
    use sm_04_source_factory::{Control, InMemoryRecorder, SourceType};
    use sm_runtime::{NodeConfig, NodeRuntime};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    use crate::integration::support::{fast, next_frame, WAIT};

    const T0: f64 = 1_700_000_000_000.0;

    fn bno055_frame(id: &str, timestamp: f64, x: f64) -> SensorFrame {
        let mut frame = SensorFrame::new("riot", id);
        frame.api = Some("v3".into());
        frame.timestamp = timestamp;
        frame.frequency = 100.0;
        frame.accelerometer = Some(Vector3 {
            timestamp: Some(timestamp - 1.0),
            frequency: Some(200.0),
            ..Vector3::new(x, 0.5, -0.25)
        });
        frame.absoluteorientation = Some(AbsoluteOrientation {
            quaternion: [0.0, 0.5, 0.0, 0.5],
            euler: Euler {
                alpha: 10.0,
                beta: 20.0,
                gamma: 30.0,
            },
            sensor: Some("bno055".into()),
            ..AbsoluteOrientation::default()
        });
        frame.battery = Some(Battery {
            level: 0.75,
            ..Battery::default()
        });
        frame.set_control("switch", 1.0);
        frame
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        timeout(WAIT, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_record_then_replay() {
        let hub = StateHub::new();
        let recorder = InMemoryRecorder::new();
        let server = NodeRuntime::start(&hub, fast(NodeConfig::server())).await.unwrap();
        let client = NodeRuntime::start_with_recorder(
            &hub,
            fast(NodeConfig::client("recorder")),
            Arc::new(recorder.clone()),
        )
        .await
        .unwrap();
        server.registry().wait_for("recorder").await.unwrap();

        server
            .manager()
            .create_source(
                &json!({"type": "riot", "id": "4", "port": 0, "bno055": true}),
                Some(client.node_id()),
            )
            .await
            .unwrap();
        let live = server.manager().get_source("4").await.unwrap();
        let port = live.infos()["port"].as_u64().unwrap() as u16;

        live.set_record(true).unwrap();
        wait_until(|| recorder.sessions_of("4").len() == 1).await;

        let mut events = client.manager().sources().subscribe();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sent: Vec<SensorFrame> = (0..3)
            .map(|i| bno055_frame("4", T0 + 10.0 * i as f64, i as f64))
            .collect();
        for frame in &sent {
            let bytes = encode_bytes(frame, WireVariant::Current).unwrap();
            socket.send_to(&bytes, ("127.0.0.1", port)).await.unwrap();
            let published = next_frame(&mut events, live.record().id()).await;
            assert_eq!(published, vec![frame.clone()]);
        }

        live.set_record(false).unwrap();
        wait_until(|| recorder.sessions_of("4")[0].closed).await;
        let session = recorder.sessions_of("4").remove(0);
        assert_eq!(session.source_type, SourceType::Riot);
        assert_eq!(session.frames.len(), 3);

        // replay the session from the server
        server
            .manager()
            .create_source(
                &json!({"type": "stream-player", "id": "again", "stream": session.frames}),
                None,
            )
            .await
            .unwrap();
        let replay = server.manager().get_source("again").await.unwrap();
        assert_eq!(replay.duration(), Some(20.0));
        let mut events = server.manager().sources().subscribe();
        replay.set_control(Control::Play).unwrap();

        let mut replayed: Vec<MultiFrame> = Vec::new();
        for _ in 0..3 {
            replayed.push(next_frame(&mut events, replay.record().id()).await);
        }
        for (original, replayed) in sent.iter().zip(&replayed) {
            let replayed = &replayed[0];
            assert_eq!(replayed.accelerometer.unwrap().x, original.accelerometer.unwrap().x);
            assert_eq!(replayed.absoluteorientation, original.absoluteorientation);
            assert_eq!(replayed.frequency, original.frequency);
            assert!(replayed.timestamp > original.timestamp);
        }
    }
}
