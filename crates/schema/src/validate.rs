use crate::report::ValidationReport;
use crate::schema::{Additional, Schema, SchemaDocument};
use physim_document::{GenericNode, NodePath};

/// Reference chains deeper than this are treated as a schema cycle.
const MAX_REFERENCE_DEPTH: usize = 64;

/// Check `node` against `schema`, collecting every violation.
pub fn validate(node: &GenericNode, schema: &SchemaDocument) -> ValidationReport {
    let _span = tracing::debug_span!("validate").entered();
    let mut report = ValidationReport::new();
    Validator { document: schema }.check(node, &schema.root, &NodePath::root(), 0, &mut report);
    tracing::debug!(violations = report.len(), "validation finished");
    report
}

/// Compact JSON rendering of a value for messages.
fn describe(node: &GenericNode) -> String {
    serde_json::to_string(node).unwrap_or_else(|_| node.type_name().to_string())
}

fn trim_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

struct Validator<'s> {
    document: &'s SchemaDocument,
}

impl Validator<'_> {
    fn passes(&self, node: &GenericNode, schema: &Schema, path: &NodePath, depth: usize) -> bool {
        let mut scratch = ValidationReport::new();
        self.check(node, schema, path, depth, &mut scratch);
        scratch.is_valid()
    }

    fn check(
        &self,
        node: &GenericNode,
        schema: &Schema,
        path: &NodePath,
        depth: usize,
        report: &mut ValidationReport,
    ) {
        if schema.never {
            report.push(path.clone(), "no value is allowed here");
            return;
        }

        if let Some(name) = &schema.reference {
            match self.document.definition(name) {
                Some(_) if depth >= MAX_REFERENCE_DEPTH => {
                    report.push(path.clone(), format!("reference `{name}` nests too deeply"));
                    return;
                }
                Some(target) => self.check(node, target, path, depth + 1, report),
                None => report.push(path.clone(), format!("unresolved reference `{name}`")),
            }
        }

        if let Some(types) = &schema.types {
            if !types.iter().any(|t| t.matches(node)) {
                let expected: Vec<_> = types.iter().map(|t| t.as_str()).collect();
                report.push(
                    path.clone(),
                    format!(
                        "expected {}, found {}",
                        expected.join(" or "),
                        node.type_name()
                    ),
                );
                return;
            }
        }

        if let Some(constant) = &schema.constant {
            if node != constant {
                report.push(path.clone(), format!("must equal {}", describe(constant)));
            }
        }
        if let Some(values) = &schema.enumeration {
            if !values.contains(node) {
                let allowed: Vec<_> = values.iter().map(describe).collect();
                report.push(
                    path.clone(),
                    format!(
                        "{} is not one of: {}",
                        describe(node),
                        allowed.join(", ")
                    ),
                );
            }
        }

        if let Some(value) = node.as_f64() {
            self.check_number(value, schema, path, report);
        }
        if let Some(text) = node.as_str() {
            self.check_string(text, schema, path, report);
        }
        if let Some(items) = node.as_sequence() {
            self.check_array(items, schema, path, depth, report);
        }
        if let Some(map) = node.as_mapping() {
            for key in &schema.required {
                if !map.contains_key(key) {
                    report.push(path.key(key.as_str()), "required property is missing");
                }
            }
            for (key, value) in map.iter() {
                let child = path.key(key);
                match (schema.property(key), &schema.additional) {
                    (Some(prop), _) => self.check(value, prop, &child, depth, report),
                    (None, Additional::Allowed) => {}
                    (None, Additional::Denied) => {
                        report.push(child, format!("unknown property `{key}` is not allowed"));
                    }
                    (None, Additional::Schema(extra)) => {
                        self.check(value, extra, &child, depth, report);
                    }
                }
            }
        }

        for branch in &schema.all_of {
            self.check(node, branch, path, depth, report);
        }
        if !schema.any_of.is_empty()
            && !schema
                .any_of
                .iter()
                .any(|branch| self.passes(node, branch, path, depth))
        {
            report.push(path.clone(), "does not match any of the allowed alternatives");
        }
        if let Some(conditional) = &schema.conditional {
            let branch = if self.passes(node, &conditional.condition, path, depth) {
                conditional.then.as_ref()
            } else {
                conditional.otherwise.as_ref()
            };
            if let Some(branch) = branch {
                let mut nested = ValidationReport::new();
                self.check(node, branch, path, depth, &mut nested);
                report.extend(nested);
            }
        }
    }

    fn check_number(&self, value: f64, schema: &Schema, path: &NodePath, report: &mut ValidationReport) {
        let shown = trim_number(value);
        if let Some(min) = schema.minimum {
            if value < min {
                report.push(path.clone(), format!("{shown} is less than the minimum {}", trim_number(min)));
            }
        }
        if let Some(max) = schema.maximum {
            if value > max {
                report.push(path.clone(), format!("{shown} is greater than the maximum {}", trim_number(max)));
            }
        }
        if let Some(min) = schema.exclusive_minimum {
            if value <= min {
                report.push(path.clone(), format!("{shown} must be greater than {}", trim_number(min)));
            }
        }
        if let Some(max) = schema.exclusive_maximum {
            if value >= max {
                report.push(path.clone(), format!("{shown} must be less than {}", trim_number(max)));
            }
        }
    }

    fn check_string(&self, text: &str, schema: &Schema, path: &NodePath, report: &mut ValidationReport) {
        let length = text.chars().count();
        if let Some(min) = schema.min_length {
            if length < min {
                report.push(path.clone(), format!("must be at least {min} characters long"));
            }
        }
        if let Some(max) = schema.max_length {
            if length > max {
                report.push(path.clone(), format!("must be at most {max} characters long"));
            }
        }
        if let Some(pattern) = &schema.pattern {
            if !pattern.is_match(text) {
                report.push(
                    path.clone(),
                    format!("{text:?} does not match pattern `{}`", pattern.as_str()),
                );
            }
        }
    }

    fn check_array(
        &self,
        items: &[GenericNode],
        schema: &Schema,
        path: &NodePath,
        depth: usize,
        report: &mut ValidationReport,
    ) {
        if let Some(min) = schema.min_items {
            if items.len() < min {
                report.push(path.clone(), format!("must contain at least {min} items"));
            }
        }
        if let Some(max) = schema.max_items {
            if items.len() > max {
                report.push(path.clone(), format!("must contain at most {max} items"));
            }
        }
        if let Some(item_schema) = &schema.items {
            for (i, item) in items.iter().enumerate() {
                self.check(item, item_schema, &path.index(i), depth, report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use physim_document::parse;

    fn schema(json: &str) -> SchemaDocument {
        SchemaDocument::from_json_str(json).unwrap()
    }

    fn paths(report: &ValidationReport) -> Vec<String> {
        report.iter().map(|v| v.path.to_string()).collect()
    }

    #[test]
    fn reports_each_missing_required_field() {
        let s = schema(r#"{"type": "object", "required": ["a", "b"]}"#);
        let report = validate(&parse("c: 1\n").unwrap(), &s);
        assert_eq!(report.len(), 2);
        assert_eq!(paths(&report), ["a", "b"]);
        assert!(report.iter().all(|v| v.message == "required property is missing"));
    }

    #[test]
    fn conforming_document_has_empty_report() {
        let s = schema(
            r#"{
                "type": "object",
                "required": ["name", "count"],
                "properties": {
                    "name": {"type": "string", "minLength": 2, "pattern": "^[a-z]+$"},
                    "count": {"type": "integer", "minimum": 0, "maximum": 10},
                    "ratio": {"type": "number", "exclusiveMinimum": 0, "exclusiveMaximum": 1},
                    "mode": {"enum": ["fast", "slow"]},
                    "tags": {"type": "array", "maxItems": 3, "items": {"type": "string"}}
                }
            }"#,
        );
        let doc = parse("name: ok\ncount: 3\nratio: 0.5\nmode: slow\ntags: [a, b]\nextra: ignored\n").unwrap();
        let report = validate(&doc, &s);
        assert!(report.is_valid(), "{report}");
    }

    #[test]
    fn accumulates_violations_with_full_paths() {
        let s = SchemaDocument::scenario().unwrap();
        let doc = parse(
            "\
bodies:
  - id: a
    mass: heavy
    position: {x: 0}
  - id: 9lives
    mass: 1
    position: {x: 0, y: 0}
    colour: red
forces:
  - kind: spring
    bodyId: a
",
        )
        .unwrap();
        let report = validate(&doc, &s);
        assert_eq!(
            paths(&report),
            [
                "bodies[0].mass",
                "bodies[0].position.y",
                "bodies[1].id",
                "bodies[1].colour",
                "forces[0].anchor",
                "forces[0].stiffness",
            ],
            "{report}"
        );
        assert_eq!(report.violations()[0].message, "expected number, found string");
    }

    #[test]
    fn additional_properties_denied_only_when_declared() {
        let open = schema(r#"{"properties": {"a": {"type": "integer"}}}"#);
        let closed = schema(r#"{"properties": {"a": {"type": "integer"}}, "additionalProperties": false}"#);
        let typed = schema(r#"{"additionalProperties": {"type": "number"}}"#);
        let doc = parse("a: 1\nb: x\n").unwrap();
        assert!(validate(&doc, &open).is_valid());
        let report = validate(&doc, &closed);
        assert_eq!(paths(&report), ["b"]);
        assert_eq!(report.violations()[0].message, "unknown property `b` is not allowed");
        assert_eq!(paths(&validate(&doc, &typed)), ["b"]);
    }

    #[test]
    fn type_mismatch_suppresses_nested_checks() {
        let s = schema(r#"{"type": "object", "required": ["a", "b"]}"#);
        let report = validate(&parse("- 1\n").unwrap(), &s);
        assert_eq!(report.len(), 1);
        assert_eq!(report.violations()[0].message, "expected object, found array");
        assert!(report.violations()[0].path.is_root());
    }

    #[test]
    fn numeric_and_string_bounds() {
        let s = schema(
            r#"{"properties": {
                "n": {"minimum": 1, "maximum": 2},
                "e": {"exclusiveMinimum": 0},
                "s": {"maxLength": 2, "pattern": "^a"},
                "l": {"minItems": 2}
            }}"#,
        );
        let report = validate(&parse("n: 3\ne: 0\ns: bcd\nl: [1]\n").unwrap(), &s);
        let messages: Vec<_> = report.iter().map(|v| v.to_string()).collect();
        assert_eq!(
            messages,
            [
                "n: 3 is greater than the maximum 2",
                "e: 0 must be greater than 0",
                "s: must be at most 2 characters long",
                "s: \"bcd\" does not match pattern `^a`",
                "l: must contain at least 2 items",
            ]
        );
    }

    #[test]
    fn enum_and_const() {
        let s = schema(r#"{"properties": {"p": {"enum": ["clamp", "wrap"]}, "v": {"const": 1}}}"#);
        let report = validate(&parse("p: bounce\nv: 2\n").unwrap(), &s);
        let messages: Vec<_> = report.iter().map(|v| v.to_string()).collect();
        assert_eq!(
            messages,
            [
                "p: \"bounce\" is not one of: \"clamp\", \"wrap\"",
                "v: must equal 1",
            ]
        );
    }

    #[test]
    fn any_of_and_conditionals() {
        let s = schema(
            r#"{
                "anyOf": [{"required": ["x"]}, {"required": ["y"]}],
                "if": {"properties": {"kind": {"const": "a"}}, "required": ["kind"]},
                "then": {"required": ["alpha"]},
                "else": {"required": ["beta"]}
            }"#,
        );
        assert!(validate(&parse("x: 1\nkind: a\nalpha: 1\n").unwrap(), &s).is_valid());
        assert!(validate(&parse("y: 1\nbeta: 1\n").unwrap(), &s).is_valid());
        let report = validate(&parse("kind: a\n").unwrap(), &s);
        assert_eq!(paths(&report), ["(root)", "alpha"]);
    }

    #[test]
    fn self_referencing_schema_terminates() {
        let s = schema(r##"{"$ref": "#/definitions/loop", "definitions": {"loop": {"$ref": "#/definitions/loop"}}}"##);
        let report = validate(&GenericNode::null(), &s);
        assert_eq!(report.len(), 1);
        assert!(report.violations()[0].message.contains("nests too deeply"));
    }

    #[test]
    fn false_schema_rejects_everything() {
        let s = schema(r#"{"properties": {"locked": false}}"#);
        assert_eq!(paths(&validate(&parse("locked: 1\n").unwrap(), &s)), ["locked"]);
    }

    #[test]
    fn scenario_schema_accepts_full_document() {
        let s = SchemaDocument::scenario().unwrap();
        let doc = parse(
            "\
name: demo
timeScale: 1
bounds:
  min: {x: -10, y: -10}
  max: {x: 10, y: 10}
  policy: clamp
bodies:
  - id: bob
    mass: 1
    position: {x: 1, y: 0}
    velocity: {x: 0, y: 0}
  - id: pin
    kind: fixed
    mass: 1
    position: {x: 0, y: 0}
forces:
  - kind: gravity
    g: {x: 0, y: -9.81}
    targets: [bob]
  - kind: drag
    coefficient: 0.2
  - kind: spring
    anchor: {x: 0, y: 0}
    bodyId: bob
    stiffness: 4
    restLength: 0.5
",
        )
        .unwrap();
        let report = validate(&doc, &s);
        assert!(report.is_valid(), "{report}");
    }
}
