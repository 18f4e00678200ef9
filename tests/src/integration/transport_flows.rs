//! # Transport Flows
//!
//! Device traffic entering one node and observed on another:
//!
//! 1. OSC over UDP into a `riot` source, with the watchdog driving `active`.
//! 2. Legacy raw bundles 10 ms apart publish at 100 Hz.
//! 3. JSON over WebSocket into a `comote` source.
//! 4. An `osc-bridge` forwarding a player's frames to a UDP destination.

#[cfg(test)]
mod tests {
    use futures_util::SinkExt;
    use serde_json::json;
    use sm_03_source_protocol::{
        encode_bytes, DecoderOptions, FrameDecoder, SensorFrame, Vector3, WireVariant,
    };
    use sm_04_source_factory::Control;
    use tokio::net::UdpSocket;
    use tokio::time::timeout;
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    use crate::integration::support::{mesh, next_frame, player, wait_active, WAIT};

    const T0: f64 = 1_700_000_000_000.0;

    fn bound_port(infos: &serde_json::Value) -> u16 {
        infos["port"].as_u64().unwrap() as u16
    }

    #[tokio::test]
    async fn test_udp_frames_reach_every_node() {
        let mesh = mesh(&["stage"]).await;
        let (server, client) = (&mesh.server, mesh.client(0));
        server
            .manager()
            .create_source(&json!({"type": "riot", "id": "3", "port": 0}), Some(client.node_id()))
            .await
            .unwrap();
        let view = server.manager().get_source("3").await.unwrap();
        let port = bound_port(&view.infos());
        let mut events = server.manager().sources().subscribe();

        let mut frame = SensorFrame::new("riot", "3");
        frame.timestamp = T0;
        frame.frequency = 200.0;
        frame.accelerometer = Some(Vector3::new(0.5, 0.25, -1.0));
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket
            .send_to(&encode_bytes(&frame, WireVariant::Current).unwrap(), ("127.0.0.1", port))
            .await
            .unwrap();

        let published = next_frame(&mut events, view.record().id()).await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, "3");
        assert_eq!(published[0].timestamp, T0);
        assert_eq!(published[0].frequency, 200.0);
        assert_eq!(published[0].accelerometer.unwrap().y, 0.25);

        // watchdog: active while traffic flows, inactive once it stops
        wait_active(server.manager().sources(), view.record().id(), true).await;
        wait_active(server.manager().sources(), view.record().id(), false).await;
    }

    #[tokio::test]
    async fn test_raw_bundles_ten_ms_apart_are_100_hz() {
        let mesh = mesh(&[]).await;
        let server = &mesh.server;
        server
            .manager()
            .create_source(&json!({"type": "riot", "id": "9", "port": 0}), None)
            .await
            .unwrap();
        let view = server.manager().get_source("9").await.unwrap();
        let port = bound_port(&view.infos());
        let mut events = server.manager().sources().subscribe();

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for timestamp in [T0, T0 + 10.0] {
            let mut frame = SensorFrame::new("riot", "9");
            frame.timestamp = timestamp;
            frame.gyroscope = Some(Vector3::new(1.0, 2.0, 3.0));
            socket
                .send_to(&encode_bytes(&frame, WireVariant::RiotRaw).unwrap(), ("127.0.0.1", port))
                .await
                .unwrap();
        }

        // the first bundle only seeds the device history
        let published = next_frame(&mut events, view.record().id()).await;
        assert_eq!(published[0].frequency, 100.0);
        assert_eq!(published[0].timestamp, T0 + 10.0);
        assert_eq!(published[0].gyroscope.unwrap().z, 3.0);
    }

    #[tokio::test]
    async fn test_websocket_frames_reach_every_node() {
        let mesh = mesh(&["stage"]).await;
        let (server, client) = (&mesh.server, mesh.client(0));
        client
            .manager()
            .create_source(&json!({"type": "comote", "id": "phone", "port": 0}), None)
            .await
            .unwrap();
        let view = server.manager().get_source("phone").await.unwrap();
        let port = bound_port(&view.infos());
        let mut events = server.manager().sources().subscribe();

        let url = format!("ws://127.0.0.1:{port}");
        let (mut device, _) = timeout(WAIT, connect_async(url.as_str()))
            .await
            .unwrap()
            .unwrap();
        let datagram = json!({
            "source": "comote", "id": "phone", "api": "v3",
            "timestamp": T0, "frequency": 60.0,
            "gyroscope": {"x": 1.0, "y": 2.0, "z": 3.0},
        });
        device
            .send(Message::text(datagram.to_string()))
            .await
            .unwrap();

        let published = next_frame(&mut events, view.record().id()).await;
        assert_eq!(published[0].source, "comote");
        assert_eq!(published[0].id, "phone");
        assert_eq!(published[0].frequency, 60.0);
        assert_eq!(published[0].gyroscope.unwrap().x, 1.0);
        wait_active(server.manager().sources(), view.record().id(), true).await;
    }

    #[tokio::test]
    async fn test_bridge_forwards_player_frames() {
        let mesh = mesh(&["stage"]).await;
        let (server, client) = (&mesh.server, mesh.client(0));
        let destination = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = destination.local_addr().unwrap().port();

        server
            .manager()
            .create_source(&player("replay", 2), Some(client.node_id()))
            .await
            .unwrap();
        server
            .manager()
            .create_source(
                &json!({
                    "type": "osc-bridge", "id": "out", "source": "replay",
                    "destination": {"hostname": "127.0.0.1", "port": port},
                }),
                None,
            )
            .await
            .unwrap();
        let bridge = server.manager().get_source("out").await.unwrap();
        assert!(!bridge.active());

        // looping keeps the player, and so the bridge, active
        let replay = server.manager().get_source("replay").await.unwrap();
        replay.set_loop(true).unwrap();
        replay.set_control(Control::Play).unwrap();

        let mut decoder = FrameDecoder::new(DecoderOptions::default());
        let mut buffer = [0u8; 2048];
        let (len, _) = timeout(WAIT, destination.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        let frame = decoder.decode_bytes(&buffer[..len]).unwrap().unwrap();
        assert_eq!(frame.source, "riot");
        assert_eq!(frame.id, "0");
        assert_eq!(frame.frequency, 100.0);
        assert_eq!(frame.control_value("index"), Some(0.0));

        // the bridge mirrors the forwarded source's activity
        wait_active(server.manager().sources(), bridge.record().id(), true).await;
        replay.set_control(Control::Pause).unwrap();
        wait_active(server.manager().sources(), bridge.record().id(), false).await;
    }
}
