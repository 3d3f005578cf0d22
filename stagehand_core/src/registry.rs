// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named object types and their constructors.
//!
//! Instead of a class hierarchy, every object carries an [`ObjectKind`] tag
//! and was built by a [`Constructor`] looked up by name. A constructor turns
//! a [`Variant`] configuration into a [`Blueprint`]: the anchor rule, content
//! transform, retention policy, visibility, and the type-specific properties
//! the stage stores for the object.
//!
//! # Configuration fields
//!
//! [`Blueprint::from_config`] understands the fields common to every type:
//!
//! | Field                          | Value                                        |
//! |--------------------------------|----------------------------------------------|
//! | `anchor-self`, `anchor-parent` | anchor point name (`"top-left"`, `"center"`) |
//! | `offset-x`, `offset-y`         | pixels (number) or `"25%"` of the reference  |
//! | `width`, `height`              | pixels, `"50%"`, or `"stretch"`              |
//! | `inset-left`, `inset-right`    | stretch insets for `width: "stretch"`        |
//! | `inset-top`, `inset-bottom`    | stretch insets for `height: "stretch"`       |
//! | `scale`                        | uniform content scale for children           |
//! | `hidden`                       | bool                                         |
//! | `retention`                    | `"immediate"`, `"manual"`, `{"frames": n}`, `{"ticks": n}` |
//!
//! Every other field is kept verbatim as an object property.

use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use kurbo::Affine;

use crate::anchor::{AnchorPoint, AnchorSpec, Extent, Offset};
use crate::clock::{Duration, GracePeriod};
use crate::error::StageError;
use crate::stage::RetentionPolicy;
use crate::variant::Variant;

/// Runtime type tag of a display object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKind(pub(crate) u32);

impl ObjectKind {
    /// Registration order of this type (0 for the first type registered).
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }
}

/// Everything a constructor decides about a new object.
#[derive(Clone, Debug, PartialEq)]
pub struct Blueprint {
    /// Layout rule.
    pub anchor: AnchorSpec,
    /// Transform applied to the object's children.
    pub content_transform: Affine,
    /// Retention policy; `None` uses the stage default.
    pub retention: Option<RetentionPolicy>,
    /// Whether the object starts hidden.
    pub hidden: bool,
    /// Type-specific properties.
    pub properties: BTreeMap<String, Variant>,
}

impl Default for Blueprint {
    fn default() -> Self {
        Self {
            anchor: AnchorSpec::default(),
            content_transform: Affine::IDENTITY,
            retention: None,
            hidden: false,
            properties: BTreeMap::new(),
        }
    }
}

const LAYOUT_KEYS: &[&str] = &[
    "anchor-self",
    "anchor-parent",
    "offset-x",
    "offset-y",
    "width",
    "height",
    "inset-left",
    "inset-right",
    "inset-top",
    "inset-bottom",
    "scale",
    "hidden",
    "retention",
];

impl Blueprint {
    /// Parses the common configuration fields.
    ///
    /// `Null` is accepted as an empty configuration. Any other non-object
    /// value, or a recognized field with the wrong shape, is rejected with a
    /// human-readable reason.
    pub fn from_config(config: &Variant) -> Result<Self, String> {
        let fields = match config {
            Variant::Null => return Ok(Self::default()),
            Variant::Object(fields) => fields,
            other => return Err(format!("configuration must be an object, got {}", other.kind())),
        };

        let mut bp = Self::default();
        if let Some(v) = fields.get("anchor-self") {
            bp.anchor.self_point = parse_point("anchor-self", v)?;
        }
        if let Some(v) = fields.get("anchor-parent") {
            bp.anchor.parent_point = parse_point("anchor-parent", v)?;
        }
        if let Some(v) = fields.get("offset-x") {
            bp.anchor.offset_x = parse_offset("offset-x", v)?;
        }
        if let Some(v) = fields.get("offset-y") {
            bp.anchor.offset_y = parse_offset("offset-y", v)?;
        }
        if let Some(v) = fields.get("width") {
            let insets = (
                number_or(fields, "inset-left", 0.0)?,
                number_or(fields, "inset-right", 0.0)?,
            );
            bp.anchor.width = parse_extent("width", v, insets)?;
        }
        if let Some(v) = fields.get("height") {
            let insets = (
                number_or(fields, "inset-top", 0.0)?,
                number_or(fields, "inset-bottom", 0.0)?,
            );
            bp.anchor.height = parse_extent("height", v, insets)?;
        }
        if let Some(v) = fields.get("scale") {
            let s = number("scale", v)?;
            if s == 0.0 || !s.is_finite() {
                return Err("`scale` must be finite and non-zero".to_owned());
            }
            bp.content_transform = Affine::scale(s);
        }
        if let Some(v) = fields.get("hidden") {
            bp.hidden = v
                .as_bool()
                .map_err(|e| format!("`hidden`: {e}"))?;
        }
        if let Some(v) = fields.get("retention") {
            bp.retention = Some(parse_retention(v)?);
        }

        bp.properties = fields
            .iter()
            .filter(|(k, _)| !LAYOUT_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(bp)
    }
}

fn number(field: &str, v: &Variant) -> Result<f64, String> {
    v.as_real().map_err(|e| format!("`{field}`: {e}"))
}

fn number_or(fields: &BTreeMap<String, Variant>, field: &str, default: f64) -> Result<f64, String> {
    fields.get(field).map_or(Ok(default), |v| number(field, v))
}

fn parse_point(field: &str, v: &Variant) -> Result<AnchorPoint, String> {
    let name = v.as_str().map_err(|e| format!("`{field}`: {e}"))?;
    name.parse()
        .map_err(|_| format!("`{field}`: unknown anchor point `{name}`"))
}

fn parse_percent(s: &str) -> Option<f64> {
    s.strip_suffix('%')
        .and_then(|n| n.trim().parse::<f64>().ok())
        .map(|p| p / 100.0)
}

fn parse_offset(field: &str, v: &Variant) -> Result<Offset, String> {
    match v {
        Variant::String(s) => parse_percent(s)
            .map(Offset::Fraction)
            .ok_or_else(|| format!("`{field}`: expected pixels or a percentage, got `{s}`")),
        other => number(field, other).map(Offset::Pixels),
    }
}

fn parse_extent(field: &str, v: &Variant, (start, end): (f64, f64)) -> Result<Extent, String> {
    match v {
        Variant::String(s) if s == "stretch" => Ok(Extent::Stretch { start, end }),
        Variant::String(s) => {
            let fraction = parse_percent(s).ok_or_else(|| {
                format!("`{field}`: expected pixels, a percentage, or \"stretch\", got `{s}`")
            })?;
            if fraction < 0.0 {
                return Err(format!("`{field}` must not be negative"));
            }
            Ok(Extent::Relative(fraction))
        }
        other => {
            let px = number(field, other)?;
            if px < 0.0 {
                return Err(format!("`{field}` must not be negative"));
            }
            Ok(Extent::Fixed(px))
        }
    }
}

fn parse_retention(v: &Variant) -> Result<RetentionPolicy, String> {
    match v {
        Variant::String(s) if s == "immediate" => Ok(RetentionPolicy::DisposeImmediately),
        Variant::String(s) if s == "manual" => Ok(RetentionPolicy::RetainUntilRelease),
        Variant::Object(fields) => {
            let (unit, count) = match (fields.get("frames"), fields.get("ticks")) {
                (Some(n), None) => ("frames", n),
                (None, Some(n)) => ("ticks", n),
                _ => return Err("`retention` needs exactly one of `frames` or `ticks`".to_owned()),
            };
            let n = count.as_int().map_err(|e| format!("`retention.{unit}`: {e}"))?;
            let n = u64::try_from(n)
                .map_err(|_| format!("`retention.{unit}` must not be negative"))?;
            let period = if unit == "frames" {
                GracePeriod::Frames(n)
            } else {
                GracePeriod::Ticks(Duration(n))
            };
            Ok(RetentionPolicy::Grace(period))
        }
        other => Err(format!("`retention`: unsupported value of kind {}", other.kind())),
    }
}

/// Builds a [`Blueprint`] from a configuration, or explains why it cannot.
pub type Constructor = Box<dyn Fn(&Variant) -> Result<Blueprint, String>>;

struct TypeEntry {
    name: String,
    ctor: Constructor,
}

/// Mapping from type name to constructor.
#[derive(Default)]
pub struct TypeRegistry {
    by_name: HashMap<String, ObjectKind>,
    entries: Vec<TypeEntry>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.name))
            .finish()
    }
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in types (see [`builtin`]).
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, ctor) in builtin::constructors() {
            // Names in the built-in table are distinct.
            let _ = registry.register(name, ctor);
        }
        registry
    }

    /// Associates `name` with `ctor`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        ctor: Constructor,
    ) -> Result<ObjectKind, StageError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(StageError::DuplicateType(name));
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "more than u32::MAX registered types is not a realistic workload"
        )]
        let kind = ObjectKind(self.entries.len() as u32);
        self.by_name.insert(name.clone(), kind);
        self.entries.push(TypeEntry { name, ctor });
        Ok(kind)
    }

    /// Looks up a type by name.
    #[must_use]
    pub fn kind(&self, name: &str) -> Option<ObjectKind> {
        self.by_name.get(name).copied()
    }

    /// Returns the name a kind was registered under.
    #[must_use]
    pub fn name(&self, kind: ObjectKind) -> Option<&str> {
        self.entries.get(kind.0 as usize).map(|e| e.name.as_str())
    }

    /// Runs the constructor for `name`.
    pub fn construct(&self, name: &str, config: &Variant) -> Result<(ObjectKind, Blueprint), StageError> {
        let kind = self
            .kind(name)
            .ok_or_else(|| StageError::UnknownType(name.to_owned()))?;
        let entry = &self.entries[kind.0 as usize];
        let blueprint = (entry.ctor)(config).map_err(|reason| StageError::PayloadInvalid {
            type_name: name.to_owned(),
            reason,
        })?;
        Ok((kind, blueprint))
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no type is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Built-in object types.
///
/// - `group`: a container. Fills its reference frame unless `width` or
///   `height` say otherwise.
/// - `rect`: a solid rectangle. Requires `width` and `height`.
/// - `label`: a text run. Requires a string `text`.
pub mod builtin {
    use alloc::borrow::ToOwned;
    use alloc::boxed::Box;
    use alloc::vec;
    use alloc::vec::Vec;

    use crate::anchor::Extent;
    use crate::variant::Variant;

    use super::{Blueprint, Constructor};

    /// Name of the container type.
    pub const GROUP: &str = "group";
    /// Name of the rectangle type.
    pub const RECT: &str = "rect";
    /// Name of the text type.
    pub const LABEL: &str = "label";

    pub(super) fn constructors() -> Vec<(&'static str, Constructor)> {
        vec![
            (GROUP, Box::new(group) as Constructor),
            (RECT, Box::new(rect) as Constructor),
            (LABEL, Box::new(label) as Constructor),
        ]
    }

    fn group(config: &Variant) -> Result<Blueprint, alloc::string::String> {
        let mut bp = Blueprint::from_config(config)?;
        if config.get("width").is_none() {
            bp.anchor.width = Extent::Stretch { start: 0.0, end: 0.0 };
        }
        if config.get("height").is_none() {
            bp.anchor.height = Extent::Stretch { start: 0.0, end: 0.0 };
        }
        Ok(bp)
    }

    fn rect(config: &Variant) -> Result<Blueprint, alloc::string::String> {
        for field in ["width", "height"] {
            if config.get(field).is_none() {
                return Err(alloc::format!("missing required field `{field}`"));
            }
        }
        Blueprint::from_config(config)
    }

    fn label(config: &Variant) -> Result<Blueprint, alloc::string::String> {
        match config.get("text") {
            Some(Variant::String(_)) => Blueprint::from_config(config),
            Some(other) => Err(alloc::format!("`text` must be a string, got {}", other.kind())),
            None => Err("missing required field `text`".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_fields() {
        let config = Variant::object([
            ("anchor-self", Variant::from("center")),
            ("anchor-parent", Variant::from("bottom-right")),
            ("offset-x", Variant::from(-4)),
            ("offset-y", Variant::from("10%")),
            ("width", Variant::from(30.0)),
            ("height", Variant::from("stretch")),
            ("inset-top", Variant::from(2)),
            ("hidden", Variant::from(true)),
            ("retention", Variant::object([("frames", Variant::from(3))])),
            ("color", Variant::from("red")),
        ]);
        let bp = Blueprint::from_config(&config).unwrap();
        assert_eq!(bp.anchor.self_point, AnchorPoint::Center);
        assert_eq!(bp.anchor.parent_point, AnchorPoint::BottomRight);
        assert_eq!(bp.anchor.offset_x, Offset::Pixels(-4.0));
        assert_eq!(bp.anchor.offset_y, Offset::Fraction(0.1));
        assert_eq!(bp.anchor.width, Extent::Fixed(30.0));
        assert_eq!(bp.anchor.height, Extent::Stretch { start: 2.0, end: 0.0 });
        assert!(bp.hidden);
        assert_eq!(
            bp.retention,
            Some(RetentionPolicy::Grace(GracePeriod::Frames(3)))
        );
        assert_eq!(bp.properties.len(), 1, "only non-layout keys become properties");
        assert_eq!(bp.properties.get("color"), Some(&Variant::from("red")));

        let negative_offset = Variant::object([
            ("offset-x", Variant::from("-25%")),
            ("width", Variant::from("50%")),
        ]);
        let bp = Blueprint::from_config(&negative_offset).unwrap();
        assert_eq!(bp.anchor.offset_x, Offset::Fraction(-0.25));
        assert_eq!(bp.anchor.width, Extent::Relative(0.5));
    }

    #[test]
    fn rejects_malformed_fields() {
        for config in [
            Variant::Int(3),
            Variant::object([("anchor-self", Variant::from("middle"))]),
            Variant::object([("width", Variant::from(-1))]),
            Variant::object([("height", Variant::from("-50%"))]),
            Variant::object([("offset-x", Variant::from("left"))]),
            Variant::object([("scale", Variant::from(0))]),
            Variant::object([("retention", Variant::from("forever"))]),
        ] {
            assert!(Blueprint::from_config(&config).is_err(), "{config:?}");
        }
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = TypeRegistry::with_builtins();
        let err = registry
            .register(builtin::GROUP, Box::new(Blueprint::from_config))
            .unwrap_err();
        assert_eq!(err, StageError::DuplicateType("group".to_owned()));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn construct_reports_unknown_and_invalid() {
        let registry = TypeRegistry::with_builtins();
        assert_eq!(
            registry.construct("sprite", &Variant::Null).unwrap_err(),
            StageError::UnknownType("sprite".to_owned())
        );
        let err = registry.construct(builtin::RECT, &Variant::Null).unwrap_err();
        assert!(matches!(err, StageError::PayloadInvalid { ref type_name, .. } if type_name == "rect"));
        let err = registry
            .construct(builtin::LABEL, &Variant::object([("text", Variant::from(5))]))
            .unwrap_err();
        assert!(matches!(err, StageError::PayloadInvalid { .. }));
    }

    #[test]
    fn group_defaults_to_fill() {
        let registry = TypeRegistry::with_builtins();
        let (kind, bp) = registry.construct(builtin::GROUP, &Variant::Null).unwrap();
        assert_eq!(registry.name(kind), Some("group"));
        assert_eq!(bp.anchor, AnchorSpec::fill());
    }
}
