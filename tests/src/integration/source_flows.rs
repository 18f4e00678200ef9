//! # Source Flows
//!
//! Source lifecycle across nodes through the source manager:
//!
//! 1. A source id is unique across the whole mesh.
//! 2. An aggregate on the server follows a primary owned by a client.
//! 3. A player owned by a client is driven from the server.
//! 4. Deleting a source frees its id for any node.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shared_bus::CollectionEvent;
    use sm_03_source_protocol::SensorFrame;
    use sm_04_source_factory::{fields, Control, SourceType};
    use tokio::time::timeout;

    use crate::integration::support::{mesh, next_frame, player, WAIT};

    #[tokio::test]
    async fn test_source_id_is_unique_across_nodes() {
        let mesh = mesh(&["left", "right"]).await;
        let (left, right) = (mesh.client(0), mesh.client(1));
        left.manager()
            .create_source(&player("shared", 2), None)
            .await
            .unwrap();

        let err = right
            .manager()
            .create_source(&player("shared", 2), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "DuplicateId");

        // requested remotely, rejected by the executor
        let err = mesh
            .server
            .manager()
            .create_source(&player("shared", 2), Some(right.node_id()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "DuplicateId");
        assert!(!right.factory().contains("shared"));
        assert_eq!(mesh.server.manager().owner_of("shared"), Some(left.node_id()));
    }

    #[tokio::test]
    async fn test_aggregate_follows_remote_primary() {
        let mesh = mesh(&["stage"]).await;
        let (server, client) = (&mesh.server, mesh.client(0));
        server
            .manager()
            .create_source(&player("primary", 2), Some(client.node_id()))
            .await
            .unwrap();
        server
            .manager()
            .create_source(&player("secondary", 2), None)
            .await
            .unwrap();
        let id = server
            .manager()
            .create_source(
                &json!({"type": "aggregated", "id": "agg", "sources": ["primary", "secondary"]}),
                None,
            )
            .await
            .unwrap();
        let aggregate = server.factory().get(&id).unwrap();
        let primary = client.factory().get("primary").unwrap();
        let secondary = server.factory().get("secondary").unwrap();
        let mut events = server.manager().sources().subscribe();

        let publish = |record: &shared_bus::SharedRecord, device: &str, timestamp: f64| {
            let frame = vec![SensorFrame::new("riot", device).restamped(timestamp, 100.0)];
            record
                .set_value(fields::FRAME, serde_json::to_value(frame).unwrap())
                .unwrap();
        };

        // P1 before any secondary frame
        publish(&primary, "p1", 1000.0);
        let first = next_frame(&mut events, aggregate.id()).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "p1");

        // S1 then P2: the secondary rides on the primary's clock
        publish(&secondary, "s1", 5.0);
        publish(&primary, "p2", 1010.0);
        let second = next_frame(&mut events, aggregate.id()).await;
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].id, "p2");
        assert_eq!(second[1].id, "s1");
        assert_eq!(second[1].timestamp, 1010.0);
        assert_eq!(second[1].frequency, 100.0);
    }

    #[tokio::test]
    async fn test_remote_player_driven_from_server() {
        let mesh = mesh(&["stage"]).await;
        let (server, client) = (&mesh.server, mesh.client(0));
        server
            .manager()
            .create_source(&player("replay", 4), Some(client.node_id()))
            .await
            .unwrap();
        let view = server.manager().get_source("replay").await.unwrap();
        assert!(!view.is_owner());
        assert_eq!(view.source_type(), Some(SourceType::StreamPlayer));
        assert_eq!(view.duration(), Some(30.0));

        let mut events = server.manager().sources().subscribe();
        view.set_control(Control::Play).unwrap();

        let mut indices = Vec::new();
        timeout(WAIT, async {
            loop {
                match events.recv().await {
                    Some(CollectionEvent::Updated { record_id, updates }) if record_id == view.record().id() => {
                        if let Some(frame) = updates.get(fields::FRAME) {
                            let frame: Vec<SensorFrame> = serde_json::from_value(frame.clone()).unwrap();
                            indices.push(frame[0].control_value("index").unwrap());
                        }
                        if updates.get(fields::CONTROL) == Some(&json!("pause")) {
                            break;
                        }
                    }
                    Some(_) => {}
                    None => panic!("collection closed"),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(indices, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(view.control(), Some(Control::Pause));
        assert!(!view.active());
    }

    #[tokio::test]
    async fn test_deleted_id_can_be_reused() {
        let mesh = mesh(&["stage"]).await;
        let (server, client) = (&mesh.server, mesh.client(0));
        server
            .manager()
            .create_source(&player("p", 2), Some(client.node_id()))
            .await
            .unwrap();
        timeout(WAIT, server.manager().delete_source("p", Some(client.node_id())))
            .await
            .unwrap()
            .unwrap();
        assert!(client.manager().get_source("p").await.is_none());

        server
            .manager()
            .create_source(&player("p", 3), None)
            .await
            .unwrap();
        let view = client.manager().get_source("p").await.unwrap();
        assert_eq!(view.owner(), server.node_id());
        assert_eq!(view.range(), (0, Some(2)));
    }

    #[tokio::test]
    async fn test_client_shutdown_removes_its_sources() {
        let mesh = mesh(&["stage"]).await;
        let (server, client) = (&mesh.server, mesh.client(0));
        client
            .manager()
            .create_source(&player("gone", 2), None)
            .await
            .unwrap();
        server
            .manager()
            .sources()
            .wait_for(|snapshot| snapshot.get_str(fields::ID) == Some("gone"))
            .await
            .unwrap();

        client.shutdown().await;
        timeout(
            WAIT,
            server
                .manager()
                .sources()
                .wait_until_absent(|snapshot| snapshot.get_str(fields::ID) == Some("gone")),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(server.manager().get_source("gone").await.is_none());
    }
}
