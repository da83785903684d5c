//! The federation gateway.
//!
//! At startup the gateway fetches the SDL of each upstream and composes them.
//! Each request is then planned into per-upstream operations, forwarded with the
//! caller's `authorization` header, and the partial responses are merged.

mod compose;
mod error;
mod plan;
mod print;
mod upstream;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use moka::future::Cache;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

pub use compose::{compose, RootKind, Subgraph, Supergraph};
pub use error::{GatewayError, Result};
pub use plan::{plan, PlanStep, QueryPlan};
pub use upstream::{UpstreamClient, UpstreamRequest};

/// Attempts at fetching an upstream SDL before startup fails.
const STARTUP_ATTEMPTS: u32 = 10;
const STARTUP_RETRY_DELAY: Duration = Duration::from_secs(1);

/// GraphQL-over-HTTP request body accepted by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    pub query: String,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Option<Map<String, Value>>,
}

type PlanKey = (String, Option<String>);

pub struct Gateway {
    supergraph: Supergraph,
    client: UpstreamClient,
    plans: Cache<PlanKey, Arc<QueryPlan>>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("subgraphs", &self.supergraph.subgraphs())
            .field("cached_plans", &self.plans.entry_count())
            .finish()
    }
}

impl Gateway {
    pub fn new(supergraph: Supergraph, client: UpstreamClient, plan_cache_capacity: u64) -> Self {
        Self {
            supergraph,
            client,
            plans: Cache::new(plan_cache_capacity),
        }
    }

    /// Fetch every upstream SDL, in order, and compose them.
    #[instrument(skip_all)]
    pub async fn connect(
        subgraphs: Vec<Subgraph>,
        client: UpstreamClient,
        plan_cache_capacity: u64,
    ) -> Result<Self> {
        let mut sources = Vec::with_capacity(subgraphs.len());
        for subgraph in subgraphs {
            let sdl = fetch_sdl_with_retry(&client, &subgraph).await?;
            info!("Fetched schema of {} from {}", subgraph.name, subgraph.url);
            sources.push((subgraph, sdl));
        }

        let supergraph = compose(sources)?;
        debug!(
            "Query fields: {:?}, mutation fields: {:?}",
            supergraph.root_fields(RootKind::Query),
            supergraph.root_fields(RootKind::Mutation)
        );
        Ok(Self::new(supergraph, client, plan_cache_capacity))
    }

    pub fn supergraph(&self) -> &Supergraph {
        &self.supergraph
    }

    /// Composed schema as SDL.
    pub fn sdl(&self) -> &str {
        self.supergraph.sdl()
    }

    async fn plan(&self, query: &str, operation_name: Option<&str>) -> Result<Arc<QueryPlan>> {
        let key = (query.to_string(), operation_name.map(str::to_string));
        if let Some(plan) = self.plans.get(&key).await {
            debug!("Query plan cache hit");
            return Ok(plan);
        }

        let plan = Arc::new(plan(&self.supergraph, query, operation_name)?);
        self.plans.insert(key, plan.clone()).await;
        Ok(plan)
    }

    async fn run_step(
        &self,
        step: &PlanStep,
        operation_name: Option<&str>,
        variables: &Map<String, Value>,
        authorization: Option<&HeaderValue>,
    ) -> Result<Map<String, Value>> {
        let variables = step
            .variables
            .iter()
            .filter_map(|name| variables.get(name).map(|value| (name.clone(), value.clone())))
            .collect();
        let request = UpstreamRequest {
            query: &step.query,
            operation_name,
            variables,
        };
        self.client
            .send(self.supergraph.subgraph(step.subgraph), &request, authorization)
            .await
    }

    /// Answer one client request. Never fails: every failure becomes a GraphQL error.
    #[instrument(skip_all, fields(operation = ?request.operation_name))]
    pub async fn execute(&self, request: GatewayRequest, authorization: Option<HeaderValue>) -> Value {
        let operation_name = request.operation_name.as_deref();
        let plan = match self.plan(&request.query, operation_name).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Rejected request: {}", e);
                return json!({ "errors": [e.to_graphql_error()] });
            }
        };

        let variables = request.variables.clone().unwrap_or_default();
        let authorization = authorization.as_ref();

        let outcomes = match plan.root {
            RootKind::Query => {
                join_all(
                    plan.steps
                        .iter()
                        .map(|step| self.run_step(step, operation_name, &variables, authorization)),
                )
                .await
            }
            RootKind::Mutation => {
                let mut outcomes = Vec::with_capacity(plan.steps.len());
                for step in &plan.steps {
                    outcomes.push(self.run_step(step, operation_name, &variables, authorization).await);
                }
                outcomes
            }
        };

        merge_responses(&plan, outcomes)
    }
}

async fn fetch_sdl_with_retry(client: &UpstreamClient, subgraph: &Subgraph) -> Result<String> {
    let mut attempt = 1;
    loop {
        match client.fetch_sdl(subgraph).await {
            Ok(sdl) => return Ok(sdl),
            Err(e @ GatewayError::Transport { .. }) if attempt < STARTUP_ATTEMPTS => {
                warn!(
                    "Attempt {}/{} to fetch schema of {} failed: {}",
                    attempt, STARTUP_ATTEMPTS, subgraph.name, e
                );
                tokio::time::sleep(STARTUP_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Assemble the client response from the upstream outcomes of `plan`, in step order.
fn merge_responses(plan: &QueryPlan, outcomes: Vec<Result<Map<String, Value>>>) -> Value {
    let mut data = Map::new();
    let mut errors = Vec::new();

    for (step, outcome) in plan.steps.iter().zip(outcomes) {
        match outcome {
            Ok(mut envelope) => {
                match envelope.remove("data") {
                    Some(Value::Object(fields)) => data.extend(fields),
                    _ => {
                        for key in &step.response_keys {
                            data.insert(key.clone(), Value::Null);
                        }
                    }
                }
                if let Some(Value::Array(step_errors)) = envelope.remove("errors") {
                    errors.extend(step_errors);
                }
            }
            Err(e) => {
                error!("Upstream operation failed: {}", e);
                errors.push(e.to_graphql_error());
                for key in &step.response_keys {
                    data.insert(key.clone(), Value::Null);
                }
            }
        }
    }

    for key in &plan.typename_keys {
        data.insert(key.clone(), Value::from(plan.root.type_name()));
    }

    let mut ordered = Map::new();
    for key in &plan.response_keys {
        if let Some(value) = data.remove(key) {
            ordered.insert(key.clone(), value);
        }
    }

    let mut response = Map::new();
    response.insert("data".to_string(), Value::Object(ordered));
    if !errors.is_empty() {
        response.insert("errors".to_string(), Value::Array(errors));
    }
    Value::Object(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step_plan() -> QueryPlan {
        QueryPlan {
            root: RootKind::Query,
            steps: vec![
                PlanStep {
                    subgraph: 0,
                    query: "{ login }".to_string(),
                    variables: vec![],
                    response_keys: vec!["login".to_string()],
                },
                PlanStep {
                    subgraph: 1,
                    query: "{ allUsers { id } count: _allUsersMeta { count } }".to_string(),
                    variables: vec![],
                    response_keys: vec!["allUsers".to_string(), "count".to_string()],
                },
            ],
            typename_keys: vec!["kind".to_string()],
            response_keys: vec![
                "allUsers".to_string(),
                "kind".to_string(),
                "login".to_string(),
                "count".to_string(),
            ],
        }
    }

    fn envelope(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_merge_orders_fields_and_answers_typename() {
        let outcomes = vec![
            Ok(envelope(json!({ "data": { "login": "token" } }))),
            Ok(envelope(json!({ "data": { "count": { "count": 1 }, "allUsers": [{ "id": "a" }] } }))),
        ];
        let merged = merge_responses(&two_step_plan(), outcomes);

        let keys: Vec<&String> = merged["data"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["allUsers", "kind", "login", "count"]);
        assert_eq!(merged["data"]["kind"], "Query");
        assert_eq!(merged["data"]["login"], "token");
        assert!(merged.get("errors").is_none());
    }

    #[test]
    fn test_merge_concatenates_errors_and_nulls_failed_steps() {
        let outcomes = vec![
            Ok(envelope(json!({
                "data": null,
                "errors": [{ "message": "The ID or password was entered incorrectly." }]
            }))),
            Err(GatewayError::InvalidResponse {
                service: "admin".to_string(),
                message: "status 502 without data or errors".to_string(),
            }),
        ];
        let merged = merge_responses(&two_step_plan(), outcomes);

        assert_eq!(merged["data"]["login"], Value::Null);
        assert_eq!(merged["data"]["allUsers"], Value::Null);
        assert_eq!(merged["data"]["count"], Value::Null);

        let errors = merged["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["message"], "The ID or password was entered incorrectly.");
        assert_eq!(errors[1]["extensions"]["service"], "admin");
    }

    #[tokio::test]
    async fn test_execute_rejects_unknown_field_without_calling_upstreams() {
        let client = UpstreamClient::new(Duration::from_secs(1)).unwrap();
        let gateway = Gateway::new(compose::tests::supergraph(), client, 10);

        let response = gateway
            .execute(
                GatewayRequest {
                    query: "{ missing }".to_string(),
                    operation_name: None,
                    variables: None,
                },
                None,
            )
            .await;

        assert!(response.get("data").is_none());
        assert_eq!(response["errors"][0]["message"], "Cannot query field 'missing' on type 'Query'.");
    }

    #[tokio::test]
    async fn test_execute_answers_typename_locally() {
        let client = UpstreamClient::new(Duration::from_secs(1)).unwrap();
        let gateway = Gateway::new(compose::tests::supergraph(), client, 10);

        let request = GatewayRequest {
            query: "mutation { __typename }".to_string(),
            operation_name: None,
            variables: None,
        };
        let response = gateway.execute(request.clone(), None).await;
        assert_eq!(response, json!({ "data": { "__typename": "Mutation" } }));

        // Second run is served from the plan cache
        let response = gateway.execute(request, None).await;
        assert_eq!(response["data"]["__typename"], "Mutation");
    }
}
