//! Schema-driven example synthesis.
//!
//! Walks a [`SchemaNode`] tree and produces a representative JSON value.
//! Literal examples and enums win over structure; structure is resolved
//! recursively; primitives are synthesized from their type name.

use crate::schema::{simple_ref, Definitions, RefResolver, SchemaKind, SchemaNode};
use rand::Rng;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

/// Placeholder used for every synthesized string.
pub const MOCKED_STRING: &str = "Mocked string";

/// Bound on nested resolution, reached only by pathological documents.
const MAX_DEPTH: usize = 32;

/// Top-level response body produced from a schema.
///
/// `is_array` records that the body schema was array-shaped while `value`
/// holds only the representative item; [`ResolvedBody::into_value`] wraps it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBody {
    pub value: Value,
    pub is_array: bool,
}

impl ResolvedBody {
    pub fn single(value: Value) -> Self {
        Self {
            value,
            is_array: false,
        }
    }

    pub fn array(item: Value) -> Self {
        Self {
            value: item,
            is_array: true,
        }
    }

    /// The value to serialize as response content.
    pub fn into_value(self) -> Value {
        if self.is_array {
            Value::Array(vec![self.value])
        } else {
            self.value
        }
    }
}

/// Produces example values from schema nodes.
pub struct SchemaExampleResolver<'a> {
    refs: RefResolver<'a>,
}

#[derive(Default)]
struct Walk {
    /// Definition names currently being expanded
    visiting: Vec<String>,
    depth: usize,
}

impl<'a> SchemaExampleResolver<'a> {
    pub fn new(definitions: &'a Definitions) -> Self {
        Self {
            refs: RefResolver::new(definitions),
        }
    }

    /// Resolve a schema node into an example value.
    ///
    /// Returns `None` when the node has no recognizable shape or its
    /// reference cannot be followed; callers omit the value in that case.
    pub fn resolve(&self, node: &SchemaNode) -> Option<Value> {
        self.resolve_node(node, &mut Walk::default())
    }

    /// Resolve a response body schema, keeping array-ness out of band.
    pub fn resolve_body(&self, schema: &SchemaNode) -> Option<ResolvedBody> {
        self.body_of(schema, 0)
    }

    fn body_of(&self, schema: &SchemaNode, hops: usize) -> Option<ResolvedBody> {
        if has_literal(schema) {
            return self.resolve(schema).map(ResolvedBody::single);
        }

        match &schema.kind {
            SchemaKind::Array { items } => self.resolve(items).map(ResolvedBody::array),
            SchemaKind::Scalar { ty } if ty == "array" => {
                Some(ResolvedBody::array(synthesize_scalar("string")))
            }
            SchemaKind::Reference { pointer } => {
                if hops >= MAX_DEPTH {
                    warn!(pointer = %pointer, "Reference chain too deep, omitting body");
                    return None;
                }
                match self.refs.resolve(pointer) {
                    Ok(target) => self.body_of(target, hops + 1),
                    Err(err) => {
                        warn!(error = %err, "Response body reference not found, omitting body");
                        None
                    }
                }
            }
            _ => self.resolve(schema).map(ResolvedBody::single),
        }
    }

    fn resolve_node(&self, node: &SchemaNode, walk: &mut Walk) -> Option<Value> {
        if let Some(example) = &node.example {
            return Some(example.clone());
        }
        if let Some(first) = node.enumeration.as_ref().and_then(|values| values.first()) {
            return Some(first.clone());
        }
        if walk.depth >= MAX_DEPTH {
            debug!(depth = walk.depth, "Maximum schema depth reached");
            return None;
        }

        walk.depth += 1;
        let value = match &node.kind {
            SchemaKind::Object {
                properties,
                additional_properties,
            } => Some(self.resolve_object(properties, additional_properties.as_deref(), walk)),
            SchemaKind::Array { items } => self.resolve_array(items, walk),
            SchemaKind::Reference { pointer } => self.resolve_reference(pointer, walk),
            SchemaKind::Composed { all_of } => Some(self.resolve_composed(all_of, walk)),
            SchemaKind::Scalar { ty } => Some(synthesize_scalar(ty)),
            SchemaKind::Empty => None,
        };
        walk.depth -= 1;

        value
    }

    fn resolve_object(
        &self,
        properties: &indexmap::IndexMap<String, SchemaNode>,
        additional: Option<&SchemaNode>,
        walk: &mut Walk,
    ) -> Value {
        // Open maps are represented by naming their value type.
        if let Some(additional) = additional {
            return json!({ "additionalProperty": additional.type_name() });
        }

        let fields: Map<String, Value> = properties
            .iter()
            .filter_map(|(name, schema)| {
                self.resolve_node(schema, walk)
                    .map(|value| (name.clone(), value))
            })
            .collect();
        Value::Object(fields)
    }

    fn resolve_array(&self, items: &SchemaNode, walk: &mut Walk) -> Option<Value> {
        match &items.kind {
            SchemaKind::Reference { pointer } if !has_literal(items) => {
                self.resolve_reference(pointer, walk)
            }
            _ => self
                .resolve_node(items, walk)
                .map(|item| Value::Array(vec![item])),
        }
    }

    fn resolve_reference(&self, pointer: &str, walk: &mut Walk) -> Option<Value> {
        let name = simple_ref(pointer);
        if walk.visiting.iter().any(|visiting| visiting == name) {
            debug!(pointer = %pointer, "Circular reference, omitting");
            return None;
        }

        let target = match self.refs.resolve(pointer) {
            Ok(target) => target,
            Err(err) => {
                warn!(error = %err, "Omitting value for unresolved reference");
                return None;
            }
        };

        walk.visiting.push(name.to_string());
        let value = self.resolve_node(target, walk);
        walk.visiting.pop();
        value
    }

    fn resolve_composed(&self, all_of: &[SchemaNode], walk: &mut Walk) -> Value {
        let mut merged = Map::new();
        for branch in all_of {
            if let Some(Value::Object(fields)) = self.resolve_node(branch, walk) {
                // Later branches overwrite earlier keys.
                merged.extend(fields);
            }
        }
        Value::Object(merged)
    }
}

fn has_literal(node: &SchemaNode) -> bool {
    node.example.is_some() || node.enumeration.as_ref().is_some_and(|e| !e.is_empty())
}

/// Synthesize a representative literal for a primitive type name.
///
/// Booleans and numbers are random; unknown types become an empty mapping.
pub fn synthesize_scalar(ty: &str) -> Value {
    let mut rng = rand::thread_rng();
    match ty {
        "string" => Value::from(MOCKED_STRING),
        "boolean" => Value::Bool(rng.gen()),
        "integer" => Value::from(rng.gen_range(0..1000_i64)),
        "number" => Value::from(rng.gen::<f64>()),
        "array" => json!([MOCKED_STRING]),
        _ => Value::Object(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pet_definitions() -> Definitions {
        let yaml = r##"
Pet:
  type: object
  properties:
    id:
      type: integer
    name:
      type: string
    status:
      type: string
      enum: [available, pending, sold]
Tag:
  properties:
    label:
      type: string
      example: urgent
Tree:
  type: object
  properties:
    value:
      type: string
    child:
      $ref: "#/definitions/Tree"
PetList:
  type: array
  items:
    $ref: "#/definitions/Pet"
"##;
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_object_keys_follow_declaration_order() {
        let defs = Definitions::new();
        let resolver = SchemaExampleResolver::new(&defs);
        let schema = SchemaNode::object([
            ("zeta", SchemaNode::scalar("string")),
            ("alpha", SchemaNode::scalar("boolean")),
            ("missing", SchemaNode::new(SchemaKind::Empty)),
            ("mid", SchemaNode::scalar("integer")),
        ]);

        let value = resolver.resolve(&schema).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(value["zeta"], MOCKED_STRING);
        assert!(value["alpha"].is_boolean());
    }

    #[test]
    fn test_example_is_returned_verbatim() {
        let defs = Definitions::new();
        let resolver = SchemaExampleResolver::new(&defs);
        let example = json!({"custom": [1, 2, 3]});
        let schema = SchemaNode::object([("ignored", SchemaNode::scalar("string"))])
            .with_example(example.clone())
            .with_enum(vec![json!("not used")]);

        assert_eq!(resolver.resolve(&schema), Some(example));
    }

    #[test]
    fn test_enum_first_value_is_stable() {
        let defs = pet_definitions();
        let resolver = SchemaExampleResolver::new(&defs);
        let schema = SchemaNode::reference("#/definitions/Pet");

        for _ in 0..5 {
            let value = resolver.resolve(&schema).unwrap();
            assert_eq!(value["status"], "available");
        }

        let empty_enum = SchemaNode::scalar("string").with_enum(vec![]);
        assert_eq!(resolver.resolve(&empty_enum), Some(json!(MOCKED_STRING)));
    }

    #[test]
    fn test_additional_properties_names_value_type() {
        let defs = Definitions::new();
        let resolver = SchemaExampleResolver::new(&defs);
        let schema = SchemaNode::new(SchemaKind::Object {
            properties: Default::default(),
            additional_properties: Some(Box::new(SchemaNode::scalar("integer"))),
        });

        assert_eq!(
            resolver.resolve(&schema),
            Some(json!({"additionalProperty": "integer"}))
        );

        let untyped = SchemaNode::new(SchemaKind::Object {
            properties: Default::default(),
            additional_properties: Some(Box::new(SchemaNode::reference("#/definitions/Pet"))),
        });
        assert_eq!(
            resolver.resolve(&untyped),
            Some(json!({"additionalProperty": null}))
        );
    }

    #[test]
    fn test_open_map_flag_with_properties_resolves_properties() {
        let defs = Definitions::new();
        let resolver = SchemaExampleResolver::new(&defs);
        let yaml = r#"
type: object
properties:
  name:
    type: string
additionalProperties: true
"#;
        let schema: SchemaNode = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(resolver.resolve(&schema), Some(json!({"name": MOCKED_STRING})));

        let open: SchemaNode = serde_yaml::from_str("additionalProperties: true").unwrap();
        assert_eq!(
            resolver.resolve(&open),
            Some(json!({"additionalProperty": "object"}))
        );
    }

    #[test]
    fn test_array_wraps_inline_items() {
        let defs = Definitions::new();
        let resolver = SchemaExampleResolver::new(&defs);

        let strings = SchemaNode::array(SchemaNode::scalar("string"));
        assert_eq!(resolver.resolve(&strings), Some(json!([MOCKED_STRING])));

        let objects = SchemaNode::array(SchemaNode::object([("a", SchemaNode::scalar("string"))]));
        assert_eq!(resolver.resolve(&objects), Some(json!([{"a": MOCKED_STRING}])));
    }

    #[test]
    fn test_array_of_reference_is_not_wrapped() {
        let defs = pet_definitions();
        let resolver = SchemaExampleResolver::new(&defs);
        let schema = SchemaNode::array(SchemaNode::reference("#/definitions/Tag"));

        assert_eq!(resolver.resolve(&schema), Some(json!({"label": "urgent"})));
    }

    #[test]
    fn test_composed_merges_branches() {
        let defs = pet_definitions();
        let resolver = SchemaExampleResolver::new(&defs);
        let schema = SchemaNode::composed(vec![
            SchemaNode::reference("#/definitions/Pet"),
            SchemaNode::object([
                ("name", SchemaNode::scalar("string").with_example(json!("Rex"))),
                ("owner", SchemaNode::scalar("string")),
            ]),
            SchemaNode::reference("#/definitions/Unknown"),
        ]);

        let value = resolver.resolve(&schema).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["id", "name", "status", "owner"]);
        assert_eq!(value["name"], "Rex");
    }

    #[test]
    fn test_unresolved_reference_is_omitted() {
        let defs = pet_definitions();
        let resolver = SchemaExampleResolver::new(&defs);
        let schema = SchemaNode::object([
            ("pet", SchemaNode::reference("#/definitions/Pet")),
            ("ghost", SchemaNode::reference("#/definitions/Ghost")),
        ]);

        let value = resolver.resolve(&schema).unwrap();
        assert!(value.get("pet").is_some());
        assert!(value.get("ghost").is_none());
        assert_eq!(resolver.resolve(&SchemaNode::reference("#/definitions/Ghost")), None);
    }

    #[test]
    fn test_circular_reference_terminates() {
        let defs = pet_definitions();
        let resolver = SchemaExampleResolver::new(&defs);

        let value = resolver.resolve(&SchemaNode::reference("#/definitions/Tree")).unwrap();
        assert_eq!(value, json!({"value": MOCKED_STRING}));
    }

    #[test]
    fn test_deep_nesting_is_cut_off() {
        fn chain(levels: usize) -> SchemaNode {
            (0..levels).fold(SchemaNode::scalar("string"), |inner, _| {
                SchemaNode::object([("next", inner)])
            })
        }
        fn innermost(mut value: &Value) -> (usize, &Value) {
            let mut hops = 0;
            while let Some(next) = value.get("next") {
                value = next;
                hops += 1;
            }
            (hops, value)
        }

        let defs = Definitions::new();
        let resolver = SchemaExampleResolver::new(&defs);

        let shallow = resolver.resolve(&chain(10)).unwrap();
        assert_eq!(innermost(&shallow), (10, &json!(MOCKED_STRING)));

        // Objects at depth 0..=31 resolve; everything below is absent.
        let deep = resolver.resolve(&chain(40)).unwrap();
        assert_eq!(innermost(&deep), (MAX_DEPTH - 1, &json!({})));
    }

    #[test]
    fn test_scalar_synthesis() {
        for _ in 0..50 {
            let int = synthesize_scalar("integer").as_i64().unwrap();
            assert!((0..1000).contains(&int));
            let num = synthesize_scalar("number").as_f64().unwrap();
            assert!((0.0..1.0).contains(&num));
        }
        assert!(synthesize_scalar("boolean").is_boolean());
        assert_eq!(synthesize_scalar("array"), json!([MOCKED_STRING]));
        assert_eq!(synthesize_scalar("file"), json!({}));
    }

    #[test]
    fn test_empty_schema_is_absent() {
        let defs = Definitions::new();
        let resolver = SchemaExampleResolver::new(&defs);
        assert_eq!(resolver.resolve(&SchemaNode::new(SchemaKind::Empty)), None);
    }

    #[test]
    fn test_body_tracks_array_shape() {
        let defs = pet_definitions();
        let resolver = SchemaExampleResolver::new(&defs);

        let body = resolver
            .resolve_body(&SchemaNode::array(SchemaNode::reference("#/definitions/Pet")))
            .unwrap();
        assert!(body.is_array);
        assert!(body.value.is_object());

        let via_ref = resolver
            .resolve_body(&SchemaNode::reference("#/definitions/PetList"))
            .unwrap();
        assert!(via_ref.is_array);
        assert_eq!(via_ref.into_value().as_array().map(Vec::len), Some(1));

        let bare = resolver.resolve_body(&SchemaNode::scalar("array")).unwrap();
        assert_eq!(bare.into_value(), json!([MOCKED_STRING]));

        let object = resolver
            .resolve_body(&SchemaNode::reference("#/definitions/Tag"))
            .unwrap();
        assert!(!object.is_array);
    }
}
