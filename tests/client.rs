use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::json;

use ripc::{
    attach, local, schema, Client, Error, ErrorCode, Middleware, Procedure, Router,
    RouterBuilder, RouterExecutor,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: String,
    email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserId {
    id: String,
}

struct TestCtx {
    role: String,
}

fn app_router(handler_calls: Arc<AtomicUsize>) -> Router<TestCtx> {
    RouterBuilder::new()
        .merge("user", {
            RouterBuilder::new()
                .procedure(
                    "getById",
                    Procedure::builder()
                        .input(schema::json::<UserId>())
                        .output(schema::json::<User>())
                        .query(move |_ctx: Arc<TestCtx>, input: UserId| {
                            let handler_calls = handler_calls.clone();
                            async move {
                                handler_calls.fetch_add(1, Ordering::SeqCst);
                                Ok::<_, Error>(User {
                                    id: input.id,
                                    email: "a@x.com".into(),
                                })
                            }
                        }),
                )
                .procedure(
                    "delete",
                    Procedure::builder()
                        .input(schema::json::<UserId>())
                        .output(schema::json::<bool>())
                        .with(Middleware::new(|ctx: Arc<TestCtx>, _input, next| {
                            async move {
                                if ctx.role != "admin" {
                                    return Err(Error::forbidden().into());
                                }
                                next.exec().await
                            }
                        }))
                        .mutation(|_ctx, _input: UserId| async move { Ok::<_, Error>(true) }),
                )
        })
        .build()
        .expect("valid router")
}

/// Host side: build the router, bind it to the "rpc" channel, and hand back
/// the client end.
fn serve(role: &str, handler_calls: Arc<AtomicUsize>) -> Client {
    let role = role.to_string();
    let transport = local();
    let executor = RouterExecutor::new(app_router(handler_calls), move |_meta| {
        let role = role.clone();
        async move { Ok(TestCtx { role }) }
    });
    attach("rpc", executor, &transport);
    Client::new(Arc::new(transport), "rpc")
}

#[tokio::test]
async fn round_trip_resolves_typed_output() {
    let client = serve("admin", Arc::new(AtomicUsize::new(0)));
    let user: User = client
        .path("user")
        .path("getById")
        .call(json!({ "id": "u1" }))
        .await
        .expect("call succeeds");
    assert_eq!(
        user,
        User {
            id: "u1".into(),
            email: "a@x.com".into()
        }
    );
}

#[tokio::test]
async fn structured_errors_are_preserved_across_the_transport() {
    let client = serve("guest", Arc::new(AtomicUsize::new(0)));
    let error = client
        .path("user")
        .path("delete")
        .call::<_, bool>(json!({ "id": "u1" }))
        .await
        .expect_err("policy rejection");
    assert_eq!(error, Error::forbidden());

    let error = client
        .path("user")
        .path("getById")
        .call::<_, User>(json!({ "id": 42 }))
        .await
        .expect_err("invalid input");
    assert_eq!(error.code, ErrorCode::InvalidInput);
    assert!(error.issues.is_some());
}

#[tokio::test]
async fn sub_path_clients_are_inert_until_called() {
    let handler_calls = Arc::new(AtomicUsize::new(0));
    let client = serve("admin", handler_calls.clone());

    let user_client = client.path("user");
    let leaf = user_client.path("getById");
    assert_eq!(leaf.key(), "user.getById");
    // Building and cloning sub-paths sends nothing.
    let _clone = leaf.clone();
    assert_eq!(handler_calls.load(Ordering::SeqCst), 0);

    let _user: User = leaf.call(json!({ "id": "u1" })).await.expect("call succeeds");
    assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unbound_channel_is_a_client_side_error() {
    let transport = local();
    let client = Client::new(Arc::new(transport), "nowhere");
    let error = client
        .path("anything")
        .call::<_, User>(json!({}))
        .await
        .expect_err("no handler bound");
    assert_eq!(error.code, ErrorCode::Internal);
}

#[tokio::test]
async fn query_key_derives_a_stable_cache_key() {
    let client = serve("admin", Arc::new(AtomicUsize::new(0)));
    let (key, input) = client
        .path("user")
        .path("getById")
        .query_key(&json!({ "id": "u1" }));
    assert_eq!(key, "user.getById");
    assert_eq!(input, json!({ "id": "u1" }));
}

struct UserApi {
    get_by_id: Client,
}

#[tokio::test]
async fn extend_wraps_the_base_client() {
    let client = serve("admin", Arc::new(AtomicUsize::new(0)));
    let api = client.extend(|client| UserApi {
        get_by_id: client.path("user").path("getById"),
    });

    let user: User = api
        .get_by_id
        .call(json!({ "id": "u7" }))
        .await
        .expect("call succeeds");
    assert_eq!(user.id, "u7");
}

#[tokio::test]
async fn concurrent_client_calls_resolve_independently() {
    let client = serve("admin", Arc::new(AtomicUsize::new(0)));
    let leaf = client.path("user").path("getById");

    let (first, second) = tokio::join!(
        leaf.call::<_, User>(json!({ "id": "u1" })),
        leaf.call::<_, User>(json!({ "id": "u2" })),
    );
    assert_eq!(first.expect("first call").id, "u1");
    assert_eq!(second.expect("second call").id, "u2");
}
