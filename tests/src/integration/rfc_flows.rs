//! # RFC Flows
//!
//! Calls between nodes over the shared bus record:
//!
//! 1. Both nodes call each other at the same time and every caller gets
//!    its own executor's answer.
//! 2. Concurrent calls from one caller are told apart by command id.
//! 3. Handler failures and missing handlers come back as typed errors.

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use serde_json::{json, Value};
    use sm_01_rfc_bus::{handler_fn, RfcHandlerError, HANDLER_MISSING};
    use tokio::time::timeout;

    use crate::integration::support::{mesh, WAIT};

    #[tokio::test]
    async fn test_cross_talk_resolves_each_caller() {
        let mesh = mesh(&["stage"]).await;
        let (server, client) = (&mesh.server, mesh.client(0));
        for node in [server, client] {
            let node_id = node.node_id();
            node.bus().set_handler(
                "whoami",
                handler_fn(move |payload: Value| async move {
                    Ok(json!({"executor": node_id, "echo": payload}))
                }),
            );
        }

        let (payload_s, payload_c) = (json!("s"), json!("c"));
        let (from_server, from_client) = timeout(WAIT, async {
            tokio::join!(
                server.bus().request(client.node_id(), "whoami", &payload_s),
                client.bus().request(server.node_id(), "whoami", &payload_c),
            )
        })
        .await
        .unwrap();

        assert_eq!(
            from_server.unwrap(),
            json!({"executor": client.node_id(), "echo": "s"})
        );
        assert_eq!(
            from_client.unwrap(),
            json!({"executor": server.node_id(), "echo": "c"})
        );
        assert_eq!(server.bus().pending_count(), 0);
        assert_eq!(client.bus().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_correlated() {
        let mesh = mesh(&["stage"]).await;
        let client = mesh.client(0);
        client.bus().set_handler(
            "double",
            handler_fn(|payload: Value| async move {
                let n = payload.as_i64().ok_or_else(|| RfcHandlerError::failed("not a number"))?;
                tokio::task::yield_now().await;
                Ok(json!(n * 2))
            }),
        );

        let payloads: Vec<Value> = (0..16).map(|n| json!(n)).collect();
        let calls = payloads.iter().map(|payload| {
            mesh.server
                .bus()
                .request(client.node_id(), "double", payload)
        });
        let results = timeout(WAIT, join_all(calls)).await.unwrap();
        for (n, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap(), json!(n as i64 * 2));
        }
    }

    #[tokio::test]
    async fn test_handler_errors_keep_kind_and_message() {
        let mesh = mesh(&["stage"]).await;
        let client = mesh.client(0);
        client.bus().set_handler(
            "busy",
            handler_fn(|_| async { Err(RfcHandlerError::new("Busy", "try again later")) }),
        );

        let err = timeout(
            WAIT,
            mesh.server.bus().request(client.node_id(), "busy", &json!(null)),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert_eq!(err.remote_kind(), Some("Busy"));
        assert!(err.to_string().contains("try again later"));

        // the executor keeps serving after a failure
        let err = mesh
            .server
            .bus()
            .request(client.node_id(), "busy", &json!(1))
            .await
            .unwrap_err();
        assert_eq!(err.remote_kind(), Some("Busy"));
    }

    #[tokio::test]
    async fn test_missing_handler_is_reported() {
        let mesh = mesh(&["stage"]).await;
        let err = timeout(
            WAIT,
            mesh.server
                .bus()
                .request(mesh.client(0).node_id(), "no-such-call", &json!({})),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert_eq!(err.remote_kind(), Some(HANDLER_MISSING));
        assert!(err.to_string().contains("no-such-call"));
    }

    #[tokio::test]
    async fn test_local_call_round_trips_through_the_bus() {
        let mesh = mesh(&[]).await;
        let server = &mesh.server;
        server
            .bus()
            .set_handler("ping", handler_fn(|_| async { Ok(json!("pong")) }));
        let pong = timeout(WAIT, server.bus().request(server.node_id(), "ping", &json!(null)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pong, json!("pong"));
    }
}
