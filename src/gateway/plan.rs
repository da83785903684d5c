//! Request planning: split one client operation into per-upstream operations.

use std::collections::HashSet;

use async_graphql_parser::types::{
    Directive, ExecutableDocument, Field, FragmentDefinition, OperationType, Selection,
    SelectionSet, VariableDefinition,
};
use async_graphql_parser::{parse_query, Positioned};
use async_graphql_value::{Name, Value};
use tracing::{debug, instrument};

use super::compose::{RootKind, Supergraph};
use super::error::{GatewayError, Result};
use super::print;

/// One upstream operation of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Index of the owning upstream in the supergraph
    pub subgraph: usize,
    pub query: String,
    /// Variables the operation declares, a subset of the client's
    pub variables: Vec<String>,
    /// Root response keys this step answers
    pub response_keys: Vec<String>,
}

/// How to answer one client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub root: RootKind,
    pub steps: Vec<PlanStep>,
    /// Root `__typename` keys answered by the gateway itself
    pub typename_keys: Vec<String>,
    /// Every root response key in document order
    pub response_keys: Vec<String>,
}

struct RootField {
    field: Positioned<Field>,
    subgraph: usize,
}

/// Collect root fields, inlining root-level fragments. Directives on a
/// fragment apply to every field it contributes.
fn collect_root_fields(
    document: &ExecutableDocument,
    root: RootKind,
    set: &SelectionSet,
    inherited: &[Positioned<Directive>],
    visiting: &mut Vec<Name>,
    out: &mut Vec<Positioned<Field>>,
) -> Result<()> {
    for item in &set.items {
        match &item.node {
            Selection::Field(field) => {
                let mut field = field.clone();
                field.node.directives.extend(inherited.iter().cloned());
                out.push(field);
            }
            Selection::FragmentSpread(spread) => {
                let name = &spread.node.fragment_name.node;
                let fragment = document
                    .fragments
                    .get(name)
                    .ok_or_else(|| GatewayError::UnknownFragment(name.to_string()))?;
                check_type_condition(&fragment.node.type_condition.node.on.node, root)?;
                if visiting.contains(name) {
                    continue;
                }

                let mut directives = inherited.to_vec();
                directives.extend(spread.node.directives.iter().cloned());
                directives.extend(fragment.node.directives.iter().cloned());

                visiting.push(name.clone());
                collect_root_fields(
                    document,
                    root,
                    &fragment.node.selection_set.node,
                    &directives,
                    visiting,
                    out,
                )?;
                visiting.pop();
            }
            Selection::InlineFragment(fragment) => {
                if let Some(condition) = &fragment.node.type_condition {
                    check_type_condition(&condition.node.on.node, root)?;
                }
                let mut directives = inherited.to_vec();
                directives.extend(fragment.node.directives.iter().cloned());
                collect_root_fields(
                    document,
                    root,
                    &fragment.node.selection_set.node,
                    &directives,
                    visiting,
                    out,
                )?;
            }
        }
    }
    Ok(())
}

fn check_type_condition(on: &Name, root: RootKind) -> Result<()> {
    if on.as_str() == root.type_name() {
        Ok(())
    } else {
        Err(GatewayError::FragmentTypeMismatch {
            on: on.to_string(),
            root: root.type_name().to_string(),
        })
    }
}

/// Names of the fragments and variables a selection refers to.
#[derive(Default)]
struct Usage {
    fragments: Vec<Name>,
    variables: HashSet<Name>,
}

impl Usage {
    fn value(&mut self, value: &Value) {
        match value {
            Value::Variable(name) => {
                self.variables.insert(name.clone());
            }
            Value::List(items) => items.iter().for_each(|item| self.value(item)),
            Value::Object(fields) => fields.values().for_each(|field| self.value(field)),
            _ => {}
        }
    }

    fn directives(&mut self, directives: &[Positioned<Directive>]) {
        for directive in directives {
            for (_, value) in &directive.node.arguments {
                self.value(&value.node);
            }
        }
    }

    fn field(&mut self, field: &Field) {
        for (_, value) in &field.arguments {
            self.value(&value.node);
        }
        self.directives(&field.directives);
        self.selection_set(&field.selection_set.node);
    }

    fn selection_set(&mut self, set: &SelectionSet) {
        for item in &set.items {
            match &item.node {
                Selection::Field(field) => self.field(&field.node),
                Selection::FragmentSpread(spread) => {
                    self.directives(&spread.node.directives);
                    let name = &spread.node.fragment_name.node;
                    if !self.fragments.contains(name) {
                        self.fragments.push(name.clone());
                    }
                }
                Selection::InlineFragment(fragment) => {
                    self.directives(&fragment.node.directives);
                    self.selection_set(&fragment.node.selection_set.node);
                }
            }
        }
    }

    /// Follow fragment spreads until no new fragment turns up.
    fn close_over(&mut self, document: &ExecutableDocument) -> Result<()> {
        let mut index = 0;
        while index < self.fragments.len() {
            let name = self.fragments[index].clone();
            let fragment = document
                .fragments
                .get(&name)
                .ok_or_else(|| GatewayError::UnknownFragment(name.to_string()))?;
            self.directives(&fragment.node.directives);
            self.selection_set(&fragment.node.selection_set.node);
            index += 1;
        }
        Ok(())
    }
}

fn build_step(
    document: &ExecutableDocument,
    operation_type: OperationType,
    operation_name: Option<&str>,
    variable_definitions: &[Positioned<VariableDefinition>],
    subgraph: usize,
    fields: Vec<Positioned<Field>>,
) -> Result<PlanStep> {
    let mut usage = Usage::default();
    for field in &fields {
        usage.field(&field.node);
    }
    usage.close_over(document)?;

    let variables: Vec<&VariableDefinition> = variable_definitions
        .iter()
        .map(|definition| &definition.node)
        .filter(|definition| usage.variables.contains(&definition.name.node))
        .collect();

    let fragments: Vec<(&Name, &FragmentDefinition)> = usage
        .fragments
        .iter()
        .filter_map(|name| document.fragments.get_key_value(name))
        .map(|(name, fragment)| (name, &fragment.node))
        .collect();

    let mut response_keys = Vec::new();
    for field in &fields {
        let key = field.node.response_key().node.to_string();
        if !response_keys.contains(&key) {
            response_keys.push(key);
        }
    }

    let items: Vec<Positioned<Selection>> = fields
        .into_iter()
        .map(|field| {
            let pos = field.pos;
            Positioned::new(Selection::Field(field), pos)
        })
        .collect();

    Ok(PlanStep {
        subgraph,
        query: print::operation(operation_type, operation_name, &variables, &items, &fragments),
        variables: variables.iter().map(|v| v.name.node.to_string()).collect(),
        response_keys,
    })
}

/// Plan `query` against the composed schema.
///
/// Query fields are grouped by upstream so each upstream is called once.
/// Mutation fields are grouped only while consecutive fields share an upstream,
/// which keeps their side effects in document order.
#[instrument(skip(supergraph, query))]
pub fn plan(supergraph: &Supergraph, query: &str, operation_name: Option<&str>) -> Result<QueryPlan> {
    let document = parse_query(query).map_err(|e| GatewayError::Syntax(e.to_string()))?;

    let (name, operation) = match operation_name {
        Some(wanted) => document
            .operations
            .iter()
            .find(|(name, _)| name.map(|n| n.as_str()) == Some(wanted))
            .ok_or_else(|| GatewayError::UnknownOperation(wanted.to_string()))?,
        None => {
            let mut operations = document.operations.iter();
            match (operations.next(), operations.next()) {
                (Some(operation), None) => operation,
                _ => return Err(GatewayError::OperationNameRequired),
            }
        }
    };
    let operation = &operation.node;
    let name = name.map(|n| n.as_str());

    let root = match operation.ty {
        OperationType::Query => RootKind::Query,
        OperationType::Mutation => RootKind::Mutation,
        OperationType::Subscription => return Err(GatewayError::SubscriptionUnsupported),
    };

    let mut fields = Vec::new();
    collect_root_fields(
        &document,
        root,
        &operation.selection_set.node,
        &[],
        &mut Vec::new(),
        &mut fields,
    )?;

    let mut response_keys: Vec<String> = Vec::new();
    let mut typename_keys = Vec::new();
    let mut owned = Vec::new();
    for field in fields {
        let key = field.node.response_key().node.to_string();
        if !response_keys.contains(&key) {
            response_keys.push(key.clone());
        }

        match field.node.name.node.as_str() {
            "__typename" => {
                if !typename_keys.contains(&key) {
                    typename_keys.push(key);
                }
            }
            "__schema" | "__type" => return Err(GatewayError::IntrospectionUnsupported),
            field_name => {
                let subgraph = supergraph.owner(root, field_name).ok_or_else(|| {
                    GatewayError::UnknownField {
                        root: root.type_name().to_string(),
                        field: field_name.to_string(),
                    }
                })?;
                owned.push(RootField { field, subgraph });
            }
        }
    }

    let mut groups: Vec<(usize, Vec<Positioned<Field>>)> = Vec::new();
    for RootField { field, subgraph } in owned {
        let existing = match root {
            RootKind::Query => groups.iter_mut().find(|(owner, _)| *owner == subgraph),
            RootKind::Mutation => groups.last_mut().filter(|(owner, _)| *owner == subgraph),
        };
        match existing {
            Some((_, group)) => group.push(field),
            None => groups.push((subgraph, vec![field])),
        }
    }

    let steps = groups
        .into_iter()
        .map(|(subgraph, fields)| {
            build_step(
                &document,
                operation.ty,
                name,
                &operation.variable_definitions,
                subgraph,
                fields,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Planned {} upstream operations", steps.len());
    Ok(QueryPlan {
        root,
        steps,
        typename_keys,
        response_keys,
    })
}
