//! GraphQL document printers.
//!
//! The parser has no printer, so composed SDL and the operations forwarded to
//! upstreams are rendered here from the AST.

use std::fmt::Write;

use async_graphql_parser::types::{
    ConstDirective, Directive, FieldDefinition, FragmentDefinition, InputValueDefinition,
    OperationType, Selection, SelectionSet, TypeDefinition, TypeKind, VariableDefinition,
};
use async_graphql_parser::Positioned;
use async_graphql_value::Name;

const INDENT: &str = "  ";

fn description(out: &mut String, description: &Option<Positioned<String>>, depth: usize) {
    if let Some(description) = description {
        // JSON string escaping is a subset of GraphQL string escaping
        let quoted = serde_json::to_string(&description.node).unwrap_or_else(|_| "\"\"".to_string());
        let _ = writeln!(out, "{}{}", INDENT.repeat(depth), quoted);
    }
}

fn const_directives(out: &mut String, directives: &[Positioned<ConstDirective>]) {
    for directive in directives {
        let _ = write!(out, " @{}", directive.node.name.node);
        if !directive.node.arguments.is_empty() {
            out.push('(');
            for (i, (name, value)) in directive.node.arguments.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}: {}", name.node, value.node);
            }
            out.push(')');
        }
    }
}

fn directives(out: &mut String, directives: &[Positioned<Directive>]) {
    for directive in directives {
        let _ = write!(out, " @{}", directive.node.name.node);
        if !directive.node.arguments.is_empty() {
            out.push('(');
            for (i, (name, value)) in directive.node.arguments.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}: {}", name.node, value.node);
            }
            out.push(')');
        }
    }
}

fn input_value(out: &mut String, value: &InputValueDefinition) {
    if let Some(description) = &value.description {
        let quoted = serde_json::to_string(&description.node).unwrap_or_default();
        let _ = write!(out, "{} ", quoted);
    }
    let _ = write!(out, "{}: {}", value.name.node, value.ty.node);
    if let Some(default) = &value.default_value {
        let _ = write!(out, " = {}", default.node);
    }
    const_directives(out, &value.directives);
}

fn field_definition(out: &mut String, field: &FieldDefinition) {
    description(out, &field.description, 1);
    let _ = write!(out, "{}{}", INDENT, field.name.node);
    if !field.arguments.is_empty() {
        out.push('(');
        for (i, argument) in field.arguments.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            input_value(out, &argument.node);
        }
        out.push(')');
    }
    let _ = write!(out, ": {}", field.ty.node);
    const_directives(out, &field.directives);
    out.push('\n');
}

fn implements(out: &mut String, interfaces: &[Positioned<Name>]) {
    if !interfaces.is_empty() {
        let names: Vec<&str> = interfaces.iter().map(|name| name.node.as_str()).collect();
        let _ = write!(out, " implements {}", names.join(" & "));
    }
}

/// Print one type definition as SDL, followed by a blank line.
pub fn type_definition(out: &mut String, definition: &TypeDefinition) {
    description(out, &definition.description, 0);
    let name = &definition.name.node;

    match &definition.kind {
        TypeKind::Scalar => {
            let _ = write!(out, "scalar {}", name);
            const_directives(out, &definition.directives);
            out.push('\n');
        }
        TypeKind::Object(object) => {
            let _ = write!(out, "type {}", name);
            implements(out, &object.implements);
            const_directives(out, &definition.directives);
            out.push_str(" {\n");
            for field in &object.fields {
                field_definition(out, &field.node);
            }
            out.push_str("}\n");
        }
        TypeKind::Interface(interface) => {
            let _ = write!(out, "interface {}", name);
            implements(out, &interface.implements);
            const_directives(out, &definition.directives);
            out.push_str(" {\n");
            for field in &interface.fields {
                field_definition(out, &field.node);
            }
            out.push_str("}\n");
        }
        TypeKind::Union(union) => {
            let _ = write!(out, "union {}", name);
            const_directives(out, &definition.directives);
            let members: Vec<&str> = union.members.iter().map(|m| m.node.as_str()).collect();
            let _ = writeln!(out, " = {}", members.join(" | "));
        }
        TypeKind::Enum(enum_type) => {
            let _ = write!(out, "enum {}", name);
            const_directives(out, &definition.directives);
            out.push_str(" {\n");
            for value in &enum_type.values {
                description(out, &value.node.description, 1);
                let _ = write!(out, "{}{}", INDENT, value.node.value.node);
                const_directives(out, &value.node.directives);
                out.push('\n');
            }
            out.push_str("}\n");
        }
        TypeKind::InputObject(input) => {
            let _ = write!(out, "input {}", name);
            const_directives(out, &definition.directives);
            out.push_str(" {\n");
            for field in &input.fields {
                out.push_str(INDENT);
                input_value(out, &field.node);
                out.push('\n');
            }
            out.push_str("}\n");
        }
    }
    out.push('\n');
}

fn selection_set(out: &mut String, set: &SelectionSet, depth: usize) {
    out.push_str("{\n");
    for item in &set.items {
        selection(out, &item.node, depth + 1);
    }
    let _ = write!(out, "{}}}", INDENT.repeat(depth));
}

fn selection(out: &mut String, item: &Selection, depth: usize) {
    out.push_str(&INDENT.repeat(depth));
    match item {
        Selection::Field(field) => {
            let field = &field.node;
            if let Some(alias) = &field.alias {
                let _ = write!(out, "{}: ", alias.node);
            }
            out.push_str(&field.name.node);
            if !field.arguments.is_empty() {
                out.push('(');
                for (i, (name, value)) in field.arguments.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{}: {}", name.node, value.node);
                }
                out.push(')');
            }
            directives(out, &field.directives);
            if !field.selection_set.node.items.is_empty() {
                out.push(' ');
                selection_set(out, &field.selection_set.node, depth);
            }
        }
        Selection::FragmentSpread(spread) => {
            let _ = write!(out, "...{}", spread.node.fragment_name.node);
            directives(out, &spread.node.directives);
        }
        Selection::InlineFragment(fragment) => {
            out.push_str("...");
            if let Some(condition) = &fragment.node.type_condition {
                let _ = write!(out, " on {}", condition.node.on.node);
            }
            directives(out, &fragment.node.directives);
            out.push(' ');
            selection_set(out, &fragment.node.selection_set.node, depth);
        }
    }
    out.push('\n');
}

/// Print an operation with the given root selections and the fragments it needs.
pub fn operation(
    ty: OperationType,
    name: Option<&str>,
    variables: &[&VariableDefinition],
    items: &[Positioned<Selection>],
    fragments: &[(&Name, &FragmentDefinition)],
) -> String {
    let mut out = String::new();
    let _ = write!(out, "{}", ty);
    if let Some(name) = name {
        let _ = write!(out, " {}", name);
    }
    if !variables.is_empty() {
        out.push('(');
        for (i, variable) in variables.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "${}: {}", variable.name.node, variable.var_type.node);
            if let Some(default) = &variable.default_value {
                let _ = write!(out, " = {}", default.node);
            }
        }
        out.push(')');
    }
    out.push(' ');
    selection_set(
        &mut out,
        &SelectionSet {
            items: items.to_vec(),
        },
        0,
    );
    out.push('\n');

    for (name, fragment) in fragments {
        let _ = write!(out, "\nfragment {} on {}", name, fragment.type_condition.node.on.node);
        directives(&mut out, &fragment.directives);
        out.push(' ');
        selection_set(&mut out, &fragment.selection_set.node, 0);
        out.push('\n');
    }

    out
}
