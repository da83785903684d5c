use std::sync::Arc;
use std::time::Duration;

use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use common::{Role, TokenKeys};
use serde_json::{json, Value};
use store::UserStore;

use crate::gateway::{compose, Gateway, Subgraph, UpstreamClient};
use crate::graphql::{export_sdl, ServiceKind};
use crate::router::create_gateway_router;
use crate::schemas::GatewayState;
use crate::test_utils::{
    bearer, init_test_tracing, service_app, setup_test_store, spawn_server, test_keys,
};

const ACCESS_DENIED: &str = "Access denied! You don't have permission for this action!";

async fn service_server(kind: ServiceKind) -> (TestServer, UserStore) {
    let store = setup_test_store().await;
    let server = TestServer::new(service_app(kind, store.clone())).unwrap();
    (server, store)
}

async fn graphql(server: &TestServer, authorization: Option<&str>, body: Value) -> TestResponse {
    let mut request = server.post("/graphql").json(&body);
    if let Some(authorization) = authorization {
        request = request.add_header(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
    }
    request.await
}

fn first_error(body: &Value) -> (&str, &str) {
    let error = &body["errors"][0];
    (
        error["message"].as_str().unwrap_or_default(),
        error["extensions"]["code"].as_str().unwrap_or_default(),
    )
}

mod account_service {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let (server, _) = service_server(ServiceKind::Account).await;

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "account");
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_login_issues_verifiable_token() {
        let _guard = init_test_tracing();
        let (server, _) = service_server(ServiceKind::Account).await;

        let response = graphql(
            &server,
            None,
            json!({ "query": r#"{ login(id: "alice", password: "alice-secret") }"# }),
        )
        .await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert!(body.get("errors").is_none(), "unexpected errors: {}", body);

        let token = body["data"]["login"].as_str().unwrap();
        let claims = test_keys().verify(token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_fails() {
        let (server, _) = service_server(ServiceKind::Account).await;

        let body: Value = graphql(
            &server,
            None,
            json!({
                "query": "query Login($id: ID!, $password: String!) { login(id: $id, password: $password) }",
                "variables": { "id": "alice", "password": "wrong" }
            }),
        )
        .await
        .json();

        assert_eq!(body["data"], Value::Null);
        assert_eq!(
            first_error(&body),
            ("The ID or password was entered incorrectly.", "INVALID_CREDENTIALS")
        );
    }

    #[tokio::test]
    async fn test_login_with_unknown_id_fails() {
        let (server, _) = service_server(ServiceKind::Account).await;

        let body: Value = graphql(
            &server,
            None,
            json!({ "query": r#"{ login(id: "ghost", password: "x") }"# }),
        )
        .await
        .json();

        assert_eq!(first_error(&body), ("The id does not exist.", "NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_entity_references() {
        let (server, _) = service_server(ServiceKind::Account).await;

        let body: Value = graphql(
            &server,
            None,
            json!({
                "query": "query($r: [_Any!]!) { _entities(representations: $r) { ... on User { id username role } } }",
                "variables": { "r": [
                    { "__typename": "User", "id": "alice" },
                    { "__typename": "User", "id": "ghost" }
                ] }
            }),
        )
        .await
        .json();

        assert!(body.get("errors").is_none(), "unexpected errors: {}", body);
        let entities = body["data"]["_entities"].as_array().unwrap();
        assert_eq!(entities[0], json!({ "id": "alice", "username": "Alice", "role": "USER" }));
        assert_eq!(entities[1], Value::Null);
    }

    #[tokio::test]
    async fn test_federated_sdl() {
        let (server, _) = service_server(ServiceKind::Account).await;

        let body: Value = graphql(&server, None, json!({ "query": "{ _service { sdl } }" }))
            .await
            .json();
        let sdl = body["data"]["_service"]["sdl"].as_str().unwrap();
        assert!(sdl.contains("login(id: ID!, password: String!): String!"));
        assert!(sdl.contains("@key(fields: \"id\")"));

        // Also published on the REST endpoint
        let rest = server.get("/sdl").await.text();
        assert!(rest.contains("login(id: ID!, password: String!): String!"));
    }

    #[tokio::test]
    async fn test_user_type_hides_secrets() {
        let (server, _) = service_server(ServiceKind::Account).await;
        let sdl = server.get("/sdl").await.text();

        let user_type = sdl
            .split("type User")
            .nth(1)
            .and_then(|rest| rest.split('}').next())
            .unwrap();
        assert!(user_type.contains("username: String!"));
        assert!(!user_type.contains("password"));
        assert!(!user_type.contains("uuid"));
    }

    #[tokio::test]
    async fn test_graphiql_page() {
        let (server, _) = service_server(ServiceKind::Account).await;

        for path in ["/graphql", "/"] {
            let response = server.get(path).await;
            response.assert_status(StatusCode::OK);
            assert!(response.text().to_lowercase().contains("graphiql"));
        }
    }
}

mod credentials {
    use super::*;

    #[tokio::test]
    async fn test_invalid_token_is_rejected_with_401() {
        let (server, _) = service_server(ServiceKind::Admin).await;

        let response = graphql(
            &server,
            Some("Bearer not-a-token"),
            json!({ "query": "{ allUsers { id } }" }),
        )
        .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(first_error(&body).1, "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let (server, _) = service_server(ServiceKind::Admin).await;
        let keys = test_keys();
        let issued = chrono::Utc::now() - chrono::Duration::days(2);
        let token = keys.issue_at("root", Role::Admin, issued).unwrap();

        let response = graphql(
            &server,
            Some(format!("Bearer {}", token).as_str()),
            json!({ "query": "{ allUsers { id } }" }),
        )
        .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        let (server, _) = service_server(ServiceKind::Admin).await;
        let foreign = TokenKeys::new(b"someone-else", chrono::Duration::hours(1));

        let response = graphql(
            &server,
            Some(bearer(&foreign, "root", Role::Admin).as_str()),
            json!({ "query": "{ allUsers { id } }" }),
        )
        .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bare_token_is_accepted() {
        let (server, _) = service_server(ServiceKind::Admin).await;
        let token = test_keys().issue("root", Role::Admin).unwrap();

        let body: Value = graphql(&server, Some(token.as_str()), json!({ "query": "{ allUsers { id } }" }))
            .await
            .json();

        assert!(body.get("errors").is_none(), "unexpected errors: {}", body);
    }

    #[tokio::test]
    async fn test_blank_header_is_anonymous() {
        let (server, _) = service_server(ServiceKind::Account).await;

        let response = graphql(
            &server,
            Some("Bearer "),
            json!({ "query": r#"{ login(id: "bob", password: "bob-secret") }"# }),
        )
        .await;

        response.assert_status(StatusCode::OK);
    }
}

mod admin_service {
    use super::*;

    fn admin() -> String {
        bearer(&test_keys(), "root", Role::Admin)
    }

    #[tokio::test]
    async fn test_operations_require_admin_role() {
        let (server, _) = service_server(ServiceKind::Admin).await;
        let user = bearer(&test_keys(), "alice", Role::User);
        let guest = bearer(&test_keys(), "bob", Role::Guest);

        let operations = [
            r#"{ User(id: "alice") { id } }"#,
            "{ allUsers { id } }",
            "{ _allUsersMeta { count } }",
            r#"mutation { createUser(id: "x", username: "X", password: "p") { id } }"#,
            r#"mutation { updateUser(id: "alice", username: "A") { id } }"#,
            r#"mutation { deleteUser(id: "alice") { id } }"#,
        ];

        for query in operations {
            for authorization in [None, Some(user.as_str()), Some(guest.as_str())] {
                let body: Value = graphql(&server, authorization, json!({ "query": query }))
                    .await
                    .json();
                assert_eq!(
                    first_error(&body),
                    (ACCESS_DENIED, "FORBIDDEN"),
                    "{} allowed for {:?}",
                    query,
                    authorization
                );
            }
        }
    }

    #[tokio::test]
    async fn test_denied_mutations_have_no_side_effects() {
        let (server, store) = service_server(ServiceKind::Admin).await;
        let user = bearer(&test_keys(), "alice", Role::User);

        graphql(
            &server,
            Some(user.as_str()),
            json!({ "query": r#"mutation { deleteUser(id: "bob") { id } }"# }),
        )
        .await;

        assert!(store.find("bob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_read_user() {
        let (server, _) = service_server(ServiceKind::Admin).await;

        let body: Value = graphql(
            &server,
            Some(admin().as_str()),
            json!({ "query": r#"{ User(id: "alice") { id username role } }"# }),
        )
        .await
        .json();
        assert_eq!(body["data"]["User"], json!({ "id": "alice", "username": "Alice", "role": "USER" }));

        let body: Value = graphql(
            &server,
            Some(admin().as_str()),
            json!({ "query": r#"{ User(id: "ghost") { id } }"# }),
        )
        .await
        .json();
        assert_eq!(first_error(&body), ("The id does not exist.", "NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_create_user() {
        let (server, store) = service_server(ServiceKind::Admin).await;

        let body: Value = graphql(
            &server,
            Some(admin().as_str()),
            json!({
                "query": "mutation($id: ID!, $name: String!, $pw: String!) { createUser(id: $id, username: $name, password: $pw) { id username role } }",
                "variables": { "id": "carol", "name": "Carol", "pw": "carol-secret" }
            }),
        )
        .await
        .json();

        assert!(body.get("errors").is_none(), "unexpected errors: {}", body);
        assert_eq!(
            body["data"]["createUser"],
            json!({ "id": "carol", "username": "Carol", "role": "GUEST" })
        );

        let stored = store.get("carol").await.unwrap();
        assert_ne!(stored.password, "carol-secret");
        assert!(!stored.uuid.is_empty());
        store.verify_credentials("carol", "carol-secret").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_duplicate_user_fails() {
        let (server, store) = service_server(ServiceKind::Admin).await;

        let body: Value = graphql(
            &server,
            Some(admin().as_str()),
            json!({ "query": r#"mutation { createUser(id: "alice", username: "Other", password: "p") { id } }"# }),
        )
        .await
        .json();

        assert_eq!(first_error(&body), ("This ID already exists.", "ALREADY_EXISTS"));
        assert_eq!(store.get("alice").await.unwrap().username, "Alice");
    }

    #[tokio::test]
    async fn test_update_user_changes_username_only() {
        let (server, store) = service_server(ServiceKind::Admin).await;
        let before = store.get("alice").await.unwrap();

        let body: Value = graphql(
            &server,
            Some(admin().as_str()),
            json!({ "query": r#"mutation { updateUser(id: "alice", username: "Alice L.") { id username role } }"# }),
        )
        .await
        .json();
        assert_eq!(body["data"]["updateUser"]["username"], "Alice L.");

        let after = store.get("alice").await.unwrap();
        assert_eq!(after.role, before.role);
        assert_eq!(after.password, before.password);
        assert_eq!(after.uuid, before.uuid);

        let body: Value = graphql(
            &server,
            Some(admin().as_str()),
            json!({ "query": r#"mutation { updateUser(id: "ghost", username: "G") { id } }"# }),
        )
        .await
        .json();
        assert_eq!(first_error(&body), ("The id does not exist.", "NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (server, store) = service_server(ServiceKind::Admin).await;

        let body: Value = graphql(
            &server,
            Some(admin().as_str()),
            json!({ "query": r#"mutation { deleteUser(id: "bob") { id username } }"# }),
        )
        .await
        .json();
        assert_eq!(body["data"]["deleteUser"], json!({ "id": "bob", "username": "Bob" }));
        assert!(store.find("bob").await.unwrap().is_none());

        // Deleting again fails and leaves the rest untouched
        let body: Value = graphql(
            &server,
            Some(admin().as_str()),
            json!({ "query": r#"mutation { deleteUser(id: "bob") { id } }"# }),
        )
        .await
        .json();
        assert_eq!(first_error(&body), ("Deletion failed.", "NOT_FOUND"));
        assert_eq!(store.count(&Default::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_paging_sorting_and_filters() {
        let (server, _) = service_server(ServiceKind::Admin).await;

        let list = |query: &'static str| {
            let server = &server;
            async move {
                let body: Value = graphql(server, Some(admin().as_str()), json!({ "query": query }))
                    .await
                    .json();
                assert!(body.get("errors").is_none(), "unexpected errors: {}", body);
                body
            }
        };

        let body = list("{ allUsers { id } }").await;
        assert_eq!(body["data"]["allUsers"], json!([{ "id": "alice" }, { "id": "bob" }, { "id": "root" }]));

        let body = list(r#"{ allUsers(sortField: "username", sortOrder: "desc", perPage: 2) { username } }"#).await;
        assert_eq!(body["data"]["allUsers"], json!([{ "username": "Root" }, { "username": "Bob" }]));

        let body = list(r#"{ allUsers(sortField: "username", sortOrder: "DESC", page: 1, perPage: 2) { username } }"#).await;
        assert_eq!(body["data"]["allUsers"], json!([{ "username": "Alice" }]));

        let body = list("{ allUsers(filter: { role_gte: 1 }) { id } _allUsersMeta(filter: { role_gte: 1 }) { count } }").await;
        assert_eq!(body["data"]["allUsers"], json!([{ "id": "alice" }, { "id": "root" }]));
        assert_eq!(body["data"]["_allUsersMeta"]["count"], 2);

        let body = list(r#"{ allUsers(filter: { q: "li" }) { id } }"#).await;
        assert_eq!(body["data"]["allUsers"], json!([{ "id": "alice" }]));

        let body = list("{ allUsers(filter: { role: GUEST }) { id } _allUsersMeta(page: 4, perPage: 1, sortField: \"username\", sortOrder: \"DESC\") { count } }").await;
        assert_eq!(body["data"]["allUsers"], json!([{ "id": "bob" }]));
        assert_eq!(body["data"]["_allUsersMeta"]["count"], 3);
    }

    #[tokio::test]
    async fn test_list_rejects_bad_arguments() {
        let (server, _) = service_server(ServiceKind::Admin).await;

        for query in [
            r#"{ allUsers(sortField: "password") { id } }"#,
            r#"{ allUsers(sortOrder: "UP") { id } }"#,
            "{ allUsers(page: -1, perPage: 10) { id } }",
        ] {
            let body: Value = graphql(&server, Some(admin().as_str()), json!({ "query": query }))
                .await
                .json();
            assert_eq!(first_error(&body).1, "BAD_REQUEST", "{} accepted", query);
        }
    }

    #[tokio::test]
    async fn test_health_and_swagger() {
        let (server, _) = service_server(ServiceKind::Admin).await;

        let body: Value = server.get("/health").await.json();
        assert_eq!(body["service"], "admin");

        let response = server.get("/api-docs/openapi.json").await;
        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert!(body["paths"]["/sdl"].is_object());
    }
}

mod gateway {
    use super::*;

    /// Account and admin services on real ports, plus a gateway composed from them.
    async fn topology() -> (TestServer, UserStore) {
        let store = setup_test_store().await;
        let account = spawn_server(service_app(ServiceKind::Account, store.clone())).await;
        let admin = spawn_server(service_app(ServiceKind::Admin, store.clone())).await;

        let subgraphs = vec![
            Subgraph {
                name: "account".to_string(),
                url: format!("http://{}/graphql", account),
            },
            Subgraph {
                name: "admin".to_string(),
                url: format!("http://{}/graphql", admin),
            },
        ];
        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();
        let gateway = Gateway::connect(subgraphs, client, 100).await.unwrap();

        let state = GatewayState {
            gateway: Arc::new(gateway),
            keys: test_keys(),
        };
        (TestServer::new(create_gateway_router(state)).unwrap(), store)
    }

    #[tokio::test]
    async fn test_composed_schema_exposes_both_services() {
        let (server, _) = topology().await;

        let response = server.get("/sdl").await;
        response.assert_status(StatusCode::OK);
        let sdl = response.text();

        assert!(sdl.starts_with("type Query {"), "{sdl}");
        assert!(sdl.contains("type Mutation {"));
        assert!(!sdl.contains("AdminQuery") && !sdl.contains("AccountQuery"));
        assert!(sdl.contains("login(id: ID!, password: String!): String!"));
        assert!(sdl.contains("allUsers("));
        assert!(sdl.contains("_allUsersMeta("));
        assert!(sdl.contains("createUser(id: ID!, username: String!, password: String!): User!"));
        assert!(!sdl.contains("_service"));
        assert!(!sdl.contains("@key"));

        let body: Value = server.get("/health").await.json();
        assert_eq!(body["upstreams"], json!(["account", "admin"]));
    }

    #[tokio::test]
    async fn test_login_then_admin_query_through_gateway() {
        let (server, _) = topology().await;

        let body: Value = graphql(
            &server,
            None,
            json!({ "query": r#"{ login(id: "root", password: "root-secret") }"# }),
        )
        .await
        .json();
        let token = body["data"]["login"].as_str().unwrap().to_string();

        // The forwarded header is what lets the admin service authorize the call
        let authorization = format!("Bearer {}", token);
        let body: Value = graphql(
            &server,
            Some(authorization.as_str()),
            json!({ "query": "{ allUsers(sortField: \"id\") { id role } }" }),
        )
        .await
        .json();

        assert!(body.get("errors").is_none(), "unexpected errors: {}", body);
        assert_eq!(body["data"]["allUsers"][2], json!({ "id": "root", "role": "ADMIN" }));
    }

    #[tokio::test]
    async fn test_single_request_spanning_both_services() {
        let (server, _) = topology().await;
        let authorization = bearer(&test_keys(), "root", Role::Admin);

        let body: Value = graphql(
            &server,
            Some(authorization.as_str()),
            json!({
                "query": "query Both($id: ID!, $pw: String!) { meta: _allUsersMeta { count } token: login(id: $id, password: $pw) __typename ...Admins } fragment Admins on Query { admins: allUsers(filter: { role: ADMIN }) { id } }",
                "variables": { "id": "alice", "pw": "alice-secret" },
                "operationName": "Both"
            }),
        )
        .await
        .json();

        assert!(body.get("errors").is_none(), "unexpected errors: {}", body);
        let data = body["data"].as_object().unwrap();
        let keys: Vec<&String> = data.keys().collect();
        assert_eq!(keys, vec!["meta", "token", "__typename", "admins"]);
        assert_eq!(data["meta"]["count"], 3);
        assert_eq!(data["__typename"], "Query");
        assert_eq!(data["admins"], json!([{ "id": "root" }]));

        let claims = test_keys().verify(data["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[tokio::test]
    async fn test_anonymous_admin_call_is_denied_upstream() {
        let (server, _) = topology().await;

        let body: Value = graphql(
            &server,
            None,
            json!({ "query": r#"{ login(id: "bob", password: "bob-secret") allUsers { id } }"# }),
        )
        .await
        .json();

        // The account half succeeds, the admin half is denied
        assert!(body["data"]["login"].is_string());
        assert_eq!(body["data"]["allUsers"], Value::Null);
        assert_eq!(first_error(&body), (ACCESS_DENIED, "FORBIDDEN"));
    }

    #[tokio::test]
    async fn test_mutations_through_gateway() {
        let (server, store) = topology().await;
        let authorization = bearer(&test_keys(), "root", Role::Admin);

        let body: Value = graphql(
            &server,
            Some(authorization.as_str()),
            json!({ "query": r#"mutation { first: createUser(id: "dave", username: "Dave", password: "pw") { id } second: updateUser(id: "dave", username: "David") { username } }"# }),
        )
        .await
        .json();

        assert!(body.get("errors").is_none(), "unexpected errors: {}", body);
        assert_eq!(body["data"]["second"]["username"], "David");
        assert_eq!(store.get("dave").await.unwrap().username, "David");
    }

    #[tokio::test]
    async fn test_gateway_rejections() {
        let (server, _) = topology().await;

        let body: Value = graphql(&server, None, json!({ "query": "{ nope }" })).await.json();
        assert_eq!(first_error(&body).1, "GRAPHQL_VALIDATION_FAILED");

        let body: Value = graphql(&server, None, json!({ "query": "{ __schema { types { name } } }" }))
            .await
            .json();
        assert_eq!(first_error(&body).1, "GRAPHQL_VALIDATION_FAILED");

        let response = graphql(&server, Some("Bearer forged"), json!({ "query": "{ allUsers { id } }" })).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_nulls_its_fields() {
        let store = setup_test_store().await;
        let account = spawn_server(service_app(ServiceKind::Account, store)).await;

        // Nothing listens on the admin port once the listener is dropped
        let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let admin = closed.local_addr().unwrap();
        drop(closed);

        let supergraph = compose(vec![
            (
                Subgraph {
                    name: "account".to_string(),
                    url: format!("http://{}/graphql", account),
                },
                export_sdl(ServiceKind::Account),
            ),
            (
                Subgraph {
                    name: "admin".to_string(),
                    url: format!("http://{}/graphql", admin),
                },
                export_sdl(ServiceKind::Admin),
            ),
        ])
        .unwrap();
        let client = UpstreamClient::new(Duration::from_secs(5)).unwrap();
        let state = GatewayState {
            gateway: Arc::new(Gateway::new(supergraph, client, 10)),
            keys: test_keys(),
        };
        let server = TestServer::new(create_gateway_router(state)).unwrap();

        let body: Value = graphql(
            &server,
            Some(bearer(&test_keys(), "root", Role::Admin).as_str()),
            json!({ "query": r#"{ login(id: "bob", password: "bob-secret") allUsers { id } }"# }),
        )
        .await
        .json();

        assert!(body["data"]["login"].is_string());
        assert_eq!(body["data"]["allUsers"], Value::Null);
        assert_eq!(first_error(&body).1, "UPSTREAM_ERROR");
        assert_eq!(body["errors"][0]["extensions"]["service"], "admin");
    }
}
