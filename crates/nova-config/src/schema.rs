use schemars::schema::{RootSchema, Schema};
use schemars::schema_for;
use serde_json::json;

use crate::validation::MAX_CALL_GRAPH_THREADS;
use crate::NovaConfig;

/// JSON schema for `nova.toml`.
///
/// This schema is intended for editor tooling (TOML JSON schema integration) and CI validation.
#[must_use]
pub fn json_schema() -> RootSchema {
    let mut schema = schema_for!(NovaConfig);
    apply_semantic_constraints(&mut schema);
    allow_deprecated_aliases(&mut schema);
    schema
}

fn apply_semantic_constraints(schema: &mut RootSchema) {
    // JSON Schema does not apply defaults during validation, so this only triggers when
    // `call_graph.threads` is explicitly set.
    push_all_of(
        schema,
        schema_from_json(json!({
            "properties": {
                "call_graph": {
                    "properties": {
                        "threads": { "maximum": MAX_CALL_GRAPH_THREADS }
                    }
                }
            }
        })),
    );
}

fn allow_deprecated_aliases(schema: &mut RootSchema) {
    let Some(call_graph) = schema.schema.object().properties.get("call_graph").cloned() else {
        return;
    };
    let Schema::Object(mut alias) = call_graph else {
        return;
    };
    alias.metadata().deprecated = true;
    alias.metadata().description = Some("Deprecated alias for `call_graph`.".to_string());
    schema
        .schema
        .object()
        .properties
        .insert("callgraph".to_string(), Schema::Object(alias));
}

fn push_all_of(root: &mut RootSchema, schema: Schema) {
    let subschemas = root.schema.subschemas();
    subschemas.all_of.get_or_insert_with(Vec::new).push(schema);
}

fn schema_from_json(value: serde_json::Value) -> Schema {
    serde_json::from_value(value).expect("valid json schema")
}
