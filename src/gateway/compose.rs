//! Schema composition.
//!
//! Every upstream publishes a federated SDL. The gateway merges those documents
//! into one schema without federation plumbing and records which upstream owns
//! each root field.

use std::collections::hash_map::Entry as HashEntry;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use async_graphql_parser::types::{
    ConstDirective, FieldDefinition, InputValueDefinition, TypeDefinition, TypeKind,
    TypeSystemDefinition,
};
use async_graphql_parser::{parse_schema, Positioned};
use async_graphql_value::Name;
use tracing::{debug, info, instrument, trace};

use super::error::{GatewayError, Result};
use super::print;

/// Root operation fields every federated subgraph exposes for the router.
const FEDERATION_ROOT_FIELDS: &[&str] = &["_service", "_entities"];

/// Directives that survive composition; all others belong to federation.
const BUILTIN_DIRECTIVES: &[&str] = &["deprecated", "specifiedBy", "oneOf"];

/// An upstream service the gateway forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subgraph {
    pub name: String,
    pub url: String,
}

/// Root operation types the gateway can plan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    Query,
    Mutation,
}

impl RootKind {
    pub fn type_name(self) -> &'static str {
        match self {
            RootKind::Query => "Query",
            RootKind::Mutation => "Mutation",
        }
    }

    fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "Query" => Some(RootKind::Query),
            "Mutation" => Some(RootKind::Mutation),
            _ => None,
        }
    }
}

/// The composed schema together with the root field ownership map.
#[derive(Debug)]
pub struct Supergraph {
    subgraphs: Vec<Subgraph>,
    owners: HashMap<(RootKind, String), usize>,
    sdl: String,
}

impl Supergraph {
    pub fn subgraphs(&self) -> &[Subgraph] {
        &self.subgraphs
    }

    pub fn subgraph(&self, index: usize) -> &Subgraph {
        &self.subgraphs[index]
    }

    /// Index of the upstream owning `root.field`.
    pub fn owner(&self, root: RootKind, field: &str) -> Option<usize> {
        self.owners.get(&(root, field.to_string())).copied()
    }

    /// Root fields of `root`, sorted by name.
    pub fn root_fields(&self, root: RootKind) -> Vec<&str> {
        let mut fields: Vec<&str> = self
            .owners
            .keys()
            .filter(|(kind, _)| *kind == root)
            .map(|(_, field)| field.as_str())
            .collect();
        fields.sort_unstable();
        fields
    }

    /// The composed schema as SDL.
    pub fn sdl(&self) -> &str {
        &self.sdl
    }
}

struct MergedType {
    /// Subgraph the first definition came from
    source: usize,
    definition: TypeDefinition,
}

struct RootNames {
    query: String,
    mutation: String,
    subscription: String,
}

impl RootNames {
    fn of(definitions: &[TypeSystemDefinition]) -> Self {
        let mut names = RootNames {
            query: "Query".to_string(),
            mutation: "Mutation".to_string(),
            subscription: "Subscription".to_string(),
        };
        for definition in definitions {
            if let TypeSystemDefinition::Schema(schema) = definition {
                if let Some(query) = &schema.node.query {
                    names.query = query.node.to_string();
                }
                if let Some(mutation) = &schema.node.mutation {
                    names.mutation = mutation.node.to_string();
                }
                if let Some(subscription) = &schema.node.subscription {
                    names.subscription = subscription.node.to_string();
                }
            }
        }
        names
    }

    /// Name of `name` in the composed schema, `None` for the subscription root.
    fn canonical(&self, name: &str) -> Option<String> {
        if name == self.query {
            Some("Query".to_string())
        } else if name == self.mutation {
            Some("Mutation".to_string())
        } else if name == self.subscription {
            None
        } else {
            Some(name.to_string())
        }
    }
}

fn is_federation_type(name: &str) -> bool {
    (name.starts_with('_') && !name.starts_with("__"))
        || name.starts_with("link__")
        || name.starts_with("federation__")
}

fn retain_builtin_directives(directives: &mut Vec<Positioned<ConstDirective>>) {
    directives.retain(|directive| BUILTIN_DIRECTIVES.contains(&directive.node.name.node.as_str()));
}

fn strip_input_value(value: &mut InputValueDefinition) {
    retain_builtin_directives(&mut value.directives);
}

fn strip_field(field: &mut FieldDefinition) {
    retain_builtin_directives(&mut field.directives);
    for argument in &mut field.arguments {
        strip_input_value(&mut argument.node);
    }
}

fn strip_definition(definition: &mut TypeDefinition) {
    definition.extend = false;
    retain_builtin_directives(&mut definition.directives);

    match &mut definition.kind {
        TypeKind::Object(object) => object.fields.iter_mut().for_each(|f| strip_field(&mut f.node)),
        TypeKind::Interface(interface) => {
            interface.fields.iter_mut().for_each(|f| strip_field(&mut f.node))
        }
        TypeKind::Enum(enum_type) => {
            for value in &mut enum_type.values {
                retain_builtin_directives(&mut value.node.directives);
            }
        }
        TypeKind::InputObject(input) => {
            input.fields.iter_mut().for_each(|f| strip_input_value(&mut f.node))
        }
        TypeKind::Scalar | TypeKind::Union(_) => {}
    }
}

fn merge_names(into: &mut Vec<Positioned<Name>>, from: Vec<Positioned<Name>>) {
    for name in from {
        if !into.iter().any(|existing| existing.node == name.node) {
            into.push(name);
        }
    }
}

fn merge_fields(into: &mut Vec<Positioned<FieldDefinition>>, from: Vec<Positioned<FieldDefinition>>) {
    for field in from {
        if !into.iter().any(|existing| existing.node.name.node == field.node.name.node) {
            into.push(field);
        }
    }
}

/// Whether two definitions of a type can be merged, and merge them if so.
fn merge_definition(existing: &mut TypeDefinition, incoming: TypeDefinition) -> bool {
    if existing.description.is_none() {
        existing.description = incoming.description;
    }

    match (&mut existing.kind, incoming.kind) {
        (TypeKind::Object(into), TypeKind::Object(from)) => {
            merge_names(&mut into.implements, from.implements);
            merge_fields(&mut into.fields, from.fields);
        }
        (TypeKind::Interface(into), TypeKind::Interface(from)) => {
            merge_names(&mut into.implements, from.implements);
            merge_fields(&mut into.fields, from.fields);
        }
        (TypeKind::Enum(into), TypeKind::Enum(from)) => {
            for value in from.values {
                if !into.values.iter().any(|existing| existing.node.value.node == value.node.value.node) {
                    into.values.push(value);
                }
            }
        }
        (TypeKind::Union(into), TypeKind::Union(from)) => merge_names(&mut into.members, from.members),
        // First definition wins
        (TypeKind::Scalar, TypeKind::Scalar) | (TypeKind::InputObject(_), TypeKind::InputObject(_)) => {}
        _ => return false,
    }
    true
}

fn is_empty_object(definition: &TypeDefinition) -> bool {
    matches!(&definition.kind, TypeKind::Object(object) if object.fields.is_empty())
}

/// Merge the SDL published by each subgraph, in order, into one schema.
#[instrument(skip_all, fields(subgraphs = sources.len()))]
pub fn compose(sources: Vec<(Subgraph, String)>) -> Result<Supergraph> {
    let mut types: BTreeMap<String, MergedType> = BTreeMap::new();
    let mut owners: HashMap<(RootKind, String), usize> = HashMap::new();
    let mut subgraphs = Vec::with_capacity(sources.len());

    for (index, (subgraph, sdl)) in sources.into_iter().enumerate() {
        let document = parse_schema(&sdl).map_err(|e| GatewayError::InvalidSchema {
            service: subgraph.name.clone(),
            message: e.to_string(),
        })?;
        let roots = RootNames::of(&document.definitions);

        for definition in document.definitions {
            let TypeSystemDefinition::Type(definition) = definition else {
                continue;
            };
            let mut definition = definition.node;
            let original = definition.name.node.to_string();
            if is_federation_type(&original) {
                trace!("Skipping federation type {} of {}", original, subgraph.name);
                continue;
            }
            let Some(name) = roots.canonical(&original) else {
                debug!("Ignoring subscription root {} of {}", original, subgraph.name);
                continue;
            };

            strip_definition(&mut definition);
            definition.name.node = Name::new(&name);

            if let (Some(root), TypeKind::Object(object)) =
                (RootKind::from_type_name(&name), &mut definition.kind)
            {
                object
                    .fields
                    .retain(|f| !FEDERATION_ROOT_FIELDS.contains(&f.node.name.node.as_str()));

                for field in &object.fields {
                    let field = field.node.name.node.to_string();
                    match owners.entry((root, field)) {
                        HashEntry::Occupied(entry) if *entry.get() != index => {
                            return Err(GatewayError::FieldConflict {
                                root: name,
                                field: entry.key().1.clone(),
                                first: subgraphs
                                    .get(*entry.get())
                                    .map(|s: &Subgraph| s.name.clone())
                                    .unwrap_or_default(),
                                second: subgraph.name.clone(),
                            });
                        }
                        HashEntry::Occupied(_) => {}
                        HashEntry::Vacant(entry) => {
                            trace!("{}.{} is owned by {}", name, entry.key().1, subgraph.name);
                            entry.insert(index);
                        }
                    }
                }
            }

            match types.entry(name) {
                Entry::Vacant(entry) => {
                    entry.insert(MergedType {
                        source: index,
                        definition,
                    });
                }
                Entry::Occupied(mut entry) => {
                    let merged = entry.get_mut();
                    if !merge_definition(&mut merged.definition, definition) {
                        let first = if merged.source == index {
                            subgraph.name.clone()
                        } else {
                            subgraphs
                                .get(merged.source)
                                .map(|s: &Subgraph| s.name.clone())
                                .unwrap_or_default()
                        };
                        return Err(GatewayError::KindMismatch {
                            name: entry.key().clone(),
                            first,
                            second: subgraph.name.clone(),
                        });
                    }
                }
            }
        }

        subgraphs.push(subgraph);
    }

    // Roots left without fields once federation fields are gone
    types.retain(|_, merged| !is_empty_object(&merged.definition));

    let mut sdl = String::new();
    for root in ["Query", "Mutation"] {
        if let Some(merged) = types.get(root) {
            print::type_definition(&mut sdl, &merged.definition);
        }
    }
    for (name, merged) in &types {
        if RootKind::from_type_name(name).is_none() {
            print::type_definition(&mut sdl, &merged.definition);
        }
    }

    info!(
        "Composed {} types and {} root fields from {} services",
        types.len(),
        owners.len(),
        subgraphs.len()
    );

    Ok(Supergraph {
        subgraphs,
        owners,
        sdl,
    })
}
