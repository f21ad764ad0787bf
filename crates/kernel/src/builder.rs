use crate::error::BuildError;
use crate::world::{Body, BodyKind, BoundaryPolicy, Bounds, Force, PhysicsWorld, Targets};
use physim_common::{BodyId, Rect, Vector2};
use physim_document::{GenericNode, Mapping, NodePath};
use std::collections::BTreeSet;

/// Map a schema-validated scenario tree to a [`PhysicsWorld`].
///
/// Structural conformance is assumed but not trusted: a missing or
/// mis-shaped field yields [`BuildError::Malformed`] rather than a panic.
/// The checks the schema cannot express (magnitudes, unique ids,
/// references, kind names) are enforced here.
pub fn build(node: &GenericNode) -> Result<PhysicsWorld, BuildError> {
    let _span = tracing::info_span!("build").entered();
    let root = NodePath::root();
    let doc = mapping(node, &root)?;

    let name = optional(doc, &root, "name", |n, p| string(n, p).map(str::to_string))?;
    let time_scale = optional(doc, &root, "timeScale", positive)?.unwrap_or(1.0);
    let bounds = optional(doc, &root, "bounds", bounds)?;

    let bodies_path = root.key("bodies");
    let mut bodies = Vec::new();
    let mut ids = BTreeSet::new();
    for (i, item) in sequence(required(doc, &root, "bodies")?, &bodies_path)?.iter().enumerate() {
        let body = body(item, &bodies_path.index(i))?;
        if !ids.insert(body.id.clone()) {
            return Err(BuildError::DuplicateBody(body.id.0));
        }
        bodies.push(body);
    }

    let mut forces = Vec::new();
    if let Some(list) = doc.get("forces") {
        let forces_path = root.key("forces");
        for (i, item) in sequence(list, &forces_path)?.iter().enumerate() {
            forces.push(force(item, &forces_path.index(i), &ids)?);
        }
    }

    tracing::debug!(bodies = bodies.len(), forces = forces.len(), "world built");
    Ok(PhysicsWorld::new(name, time_scale, bounds, bodies, forces))
}

fn mapping<'a>(node: &'a GenericNode, path: &NodePath) -> Result<&'a Mapping, BuildError> {
    node.as_mapping()
        .ok_or_else(|| BuildError::malformed(path, format!("expected a mapping, found {}", node.type_name())))
}

fn sequence<'a>(node: &'a GenericNode, path: &NodePath) -> Result<&'a [GenericNode], BuildError> {
    node.as_sequence()
        .ok_or_else(|| BuildError::malformed(path, format!("expected a sequence, found {}", node.type_name())))
}

fn string<'a>(node: &'a GenericNode, path: &NodePath) -> Result<&'a str, BuildError> {
    node.as_str()
        .ok_or_else(|| BuildError::malformed(path, format!("expected a string, found {}", node.type_name())))
}

fn required<'a>(map: &'a Mapping, path: &NodePath, key: &str) -> Result<&'a GenericNode, BuildError> {
    map.get(key)
        .ok_or_else(|| BuildError::malformed(&path.key(key), "required field is missing"))
}

fn optional<'a, T>(
    map: &'a Mapping,
    path: &NodePath,
    key: &str,
    read: impl FnOnce(&'a GenericNode, &NodePath) -> Result<T, BuildError>,
) -> Result<Option<T>, BuildError> {
    map.get(key).map(|node| read(node, &path.key(key))).transpose()
}

/// Any finite number.
fn number(node: &GenericNode, path: &NodePath) -> Result<f64, BuildError> {
    let value = node
        .as_f64()
        .ok_or_else(|| BuildError::malformed(path, format!("expected a number, found {}", node.type_name())))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BuildError::InvalidMagnitude(path.clone()))
    }
}

fn positive(node: &GenericNode, path: &NodePath) -> Result<f64, BuildError> {
    let value = number(node, path)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(BuildError::InvalidMagnitude(path.clone()))
    }
}

fn non_negative(node: &GenericNode, path: &NodePath) -> Result<f64, BuildError> {
    let value = number(node, path)?;
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(BuildError::InvalidMagnitude(path.clone()))
    }
}

fn vector(node: &GenericNode, path: &NodePath) -> Result<Vector2, BuildError> {
    let map = mapping(node, path)?;
    let x = number(required(map, path, "x")?, &path.key("x"))?;
    let y = number(required(map, path, "y")?, &path.key("y"))?;
    Ok(Vector2::new(x, y))
}

fn bounds(node: &GenericNode, path: &NodePath) -> Result<Bounds, BuildError> {
    let map = mapping(node, path)?;
    let min = vector(required(map, path, "min")?, &path.key("min"))?;
    let max = vector(required(map, path, "max")?, &path.key("max"))?;
    if !(min.x < max.x && min.y < max.y) {
        return Err(BuildError::InvalidMagnitude(path.key("max")));
    }
    let policy_path = path.key("policy");
    let policy = match string(required(map, path, "policy")?, &policy_path)? {
        "clamp" => BoundaryPolicy::Clamp,
        "wrap" => BoundaryPolicy::Wrap,
        other => {
            return Err(BuildError::malformed(
                &policy_path,
                format!("unknown boundary policy `{other}`"),
            ));
        }
    };
    Ok(Bounds {
        rect: Rect::new(min, max),
        policy,
    })
}

fn body(node: &GenericNode, path: &NodePath) -> Result<Body, BuildError> {
    let map = mapping(node, path)?;
    let id = string(required(map, path, "id")?, &path.key("id"))?;
    let kind = match optional(map, path, "kind", |n, p| string(n, p))? {
        None | Some("particle") => BodyKind::Particle,
        Some("fixed") => BodyKind::Fixed,
        Some(other) => return Err(BuildError::UnknownKind(other.to_string())),
    };
    let mass = positive(required(map, path, "mass")?, &path.key("mass"))?;
    let position = vector(required(map, path, "position")?, &path.key("position"))?;
    let velocity = optional(map, path, "velocity", vector)?.unwrap_or(Vector2::ZERO);
    Ok(Body {
        id: BodyId::new(id),
        kind,
        mass,
        position,
        velocity,
    })
}

fn reference(node: &GenericNode, path: &NodePath, ids: &BTreeSet<BodyId>) -> Result<BodyId, BuildError> {
    let id = string(node, path)?;
    if ids.contains(id) {
        Ok(BodyId::new(id))
    } else {
        Err(BuildError::DanglingReference(id.to_string()))
    }
}

fn targets(map: &Mapping, path: &NodePath, ids: &BTreeSet<BodyId>) -> Result<Targets, BuildError> {
    let Some(list) = map.get("targets") else {
        return Ok(Targets::All);
    };
    let list_path = path.key("targets");
    let targets = sequence(list, &list_path)?
        .iter()
        .enumerate()
        .map(|(i, item)| reference(item, &list_path.index(i), ids))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Targets::Only(targets))
}

fn force(node: &GenericNode, path: &NodePath, ids: &BTreeSet<BodyId>) -> Result<Force, BuildError> {
    let map = mapping(node, path)?;
    let kind = string(required(map, path, "kind")?, &path.key("kind"))?;
    let force = match kind {
        "gravity" => Force::Gravity {
            g: vector(required(map, path, "g")?, &path.key("g"))?,
            targets: targets(map, path, ids)?,
        },
        "drag" => Force::Drag {
            coefficient: non_negative(required(map, path, "coefficient")?, &path.key("coefficient"))?,
            targets: targets(map, path, ids)?,
        },
        "spring" => Force::Spring {
            anchor: vector(required(map, path, "anchor")?, &path.key("anchor"))?,
            body: reference(required(map, path, "bodyId")?, &path.key("bodyId"), ids)?,
            stiffness: positive(required(map, path, "stiffness")?, &path.key("stiffness"))?,
            rest_length: optional(map, path, "restLength", non_negative)?.unwrap_or(0.0),
        },
        other => return Err(BuildError::UnknownKind(other.to_string())),
    };
    Ok(force)
}
