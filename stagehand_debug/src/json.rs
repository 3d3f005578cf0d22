// Copyright 2026 the Stagehand Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON export of recordings and tree snapshots, and Variant conversion.
//!
//! Variants map onto JSON one to one where JSON has a matching shape.
//! Integers that do not fit an `i64` come back as reals. Error values are
//! written as `{"$error": message}` and read back as errors; opaque
//! references become `{"$opaque": strong_count}` and cannot be read back
//! (they come back as plain objects). Non-finite reals are written as
//! `null`.

use std::io::{self, Write};

use serde_json::{Map, Value, json};

use stagehand_core::stage::ObjectRef;
use stagehand_core::{Handle, Stage, Variant};

use crate::recorder::TraceRecord;

const ERROR_KEY: &str = "$error";
const OPAQUE_KEY: &str = "$opaque";

/// Converts a Variant to a JSON value.
#[must_use]
pub fn variant_to_json(value: &Variant) -> Value {
    match value {
        Variant::Null => Value::Null,
        Variant::Bool(b) => Value::Bool(*b),
        Variant::Int(i) => Value::from(*i),
        Variant::Real(r) => Value::from(*r),
        Variant::String(s) => Value::String(s.clone()),
        Variant::Array(items) => Value::Array(items.iter().map(variant_to_json).collect()),
        Variant::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), variant_to_json(v)))
                .collect(),
        ),
        Variant::Opaque(r) => json!({ OPAQUE_KEY: r.strong_count() }),
        Variant::Error(message) => json!({ ERROR_KEY: message }),
    }
}

/// Converts a JSON value to a Variant.
#[must_use]
pub fn variant_from_json(value: &Value) -> Variant {
    match value {
        Value::Null => Variant::Null,
        Value::Bool(b) => Variant::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(Variant::Int)
            .or_else(|| n.as_f64().map(Variant::Real))
            .unwrap_or_default(),
        Value::String(s) => Variant::String(s.clone()),
        Value::Array(items) => Variant::Array(items.iter().map(variant_from_json).collect()),
        Value::Object(fields) => {
            if let (1, Some(Value::String(message))) = (fields.len(), fields.get(ERROR_KEY)) {
                return Variant::error(message.clone());
            }
            Variant::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), variant_from_json(v)))
                    .collect(),
            )
        }
    }
}

/// Serializes every live root and its subtree.
///
/// Each node carries its handle, type name, visibility, cached bounds (or
/// `null` if out of date), properties, and children in sibling order.
#[must_use]
pub fn snapshot(stage: &Stage) -> Value {
    Value::Array(
        stage
            .roots()
            .into_iter()
            .filter_map(|root| snapshot_subtree(stage, root))
            .collect(),
    )
}

/// Serializes one object and its subtree, or `None` for a stale handle.
#[must_use]
pub fn snapshot_subtree(stage: &Stage, handle: Handle) -> Option<Value> {
    stage.resolve(handle).ok().map(|object| node_to_json(stage, object))
}

fn node_to_json(stage: &Stage, object: ObjectRef<'_>) -> Value {
    let bounds = object
        .cached_bounds()
        .map_or(Value::Null, |r| json!([r.x0, r.y0, r.x1, r.y1]));
    let properties: Map<String, Value> = object
        .properties()
        .iter()
        .map(|(k, v)| (k.clone(), variant_to_json(v)))
        .collect();
    let children: Vec<Value> = object
        .children()
        .filter_map(|child| snapshot_subtree(stage, child))
        .collect();
    json!({
        "handle": object.handle().to_string(),
        "type": object.type_name(),
        "hidden": object.is_hidden(),
        "retained": object.is_retained(),
        "bounds": bounds,
        "properties": properties,
        "children": children,
    })
}

fn handle_json(handle: Option<Handle>) -> Value {
    handle.map_or(Value::Null, |h| Value::String(h.to_string()))
}

/// Converts one trace record to a JSON object with a `"name"` field and
/// the event's fields.
#[must_use]
pub fn record_to_json(record: &TraceRecord) -> Value {
    let args = match record {
        TraceRecord::Created(e) => json!({
            "frame": e.frame,
            "handle": e.handle.to_string(),
            "kind": e.kind.id(),
        }),
        TraceRecord::Retained(e) => json!({
            "frame": e.frame,
            "handle": e.handle.to_string(),
            "policy": format!("{:?}", e.policy),
            "external_refs": e.external_refs,
        }),
        TraceRecord::Reclaimed(e) => json!({
            "frame": e.frame,
            "handle": e.handle.to_string(),
        }),
        TraceRecord::Tree(e) => json!({
            "frame": e.frame,
            "op": format!("{:?}", e.op),
            "child": e.child.to_string(),
            "parent": handle_json(e.parent),
        }),
        TraceRecord::DispatchBegin(e) => json!({
            "mode": format!("{:?}", e.mode),
            "event_id": e.event_id,
            "target": handle_json(e.target),
        }),
        TraceRecord::DispatchEnd(e) => json!({
            "mode": format!("{:?}", e.mode),
            "event_id": e.event_id,
            "visited": e.visited,
            "invoked": e.invoked,
            "failures": e.failures,
            "stopped": e.stopped,
        }),
        TraceRecord::ListenerFailure(f) => json!({
            "event": f.event_type.name(),
            "phase": format!("{:?}", f.phase),
            "current": f.current.to_string(),
            "listener": f.listener.get(),
            "message": f.error.message,
        }),
        TraceRecord::Bounds(e) => json!({
            "handle": e.handle.to_string(),
            "bounds": [e.bounds.x0, e.bounds.y0, e.bounds.x1, e.bounds.y1],
        }),
    };
    json!({ "name": record.name(), "args": args })
}

/// Writes recorded events as a pretty-printed JSON array.
pub fn export_records(records: &[TraceRecord], writer: &mut dyn Write) -> io::Result<()> {
    let events: Vec<Value> = records.iter().map(record_to_json).collect();
    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use kurbo::Rect;
    use stagehand_core::config::StageConfig;
    use stagehand_core::registry::builtin;
    use stagehand_core::variant::OpaqueRef;

    #[test]
    fn variant_json_shapes() {
        let value = Variant::object([
            ("n", Variant::Null),
            ("flag", Variant::from(true)),
            ("count", Variant::from(3)),
            ("ratio", Variant::from(0.5)),
            ("name", Variant::from("panel")),
            ("list", Variant::Array(vec![Variant::from(1), Variant::from("two")])),
            ("bad", Variant::error("oops")),
            ("inf", Variant::from(f64::INFINITY)),
        ]);
        let expected = json!({
            "n": null,
            "flag": true,
            "count": 3,
            "ratio": 0.5,
            "name": "panel",
            "list": [1, "two"],
            "bad": { "$error": "oops" },
            "inf": null,
        });
        assert_eq!(variant_to_json(&value), expected);
    }

    #[test]
    fn variant_from_json_restores_kinds() {
        let value = json!({
            "count": 3,
            "ratio": 0.5,
            "huge": u64::MAX,
            "bad": { "$error": "oops" },
            "nested": { "$error": "not alone", "x": 1 },
        });
        let v = variant_from_json(&value);
        assert_eq!(v.get("count"), Some(&Variant::Int(3)));
        assert_eq!(v.get("ratio"), Some(&Variant::Real(0.5)));
        assert!(matches!(v.get("huge"), Some(Variant::Real(_))));
        assert_eq!(v.get("bad"), Some(&Variant::error("oops")));
        assert!(matches!(v.get("nested"), Some(Variant::Object(f)) if f.len() == 2));

        let back = variant_from_json(&variant_to_json(&v));
        assert_eq!(back, v);
    }

    #[test]
    fn opaque_is_exported_by_count() {
        let opaque = OpaqueRef::new(42_u8);
        let value = Variant::from(opaque.clone());
        assert_eq!(variant_to_json(&value), json!({ "$opaque": 2 }));
    }

    #[test]
    fn snapshot_nests_children() {
        let mut stage =
            Stage::with_config(StageConfig::default().with_frame(Rect::new(0.0, 0.0, 40.0, 20.0)));
        let root = stage.create(builtin::GROUP, &Variant::Null).unwrap();
        let label = stage
            .create(
                builtin::LABEL,
                &Variant::object([
                    ("text", Variant::from("hello")),
                    ("width", Variant::from(10.0)),
                    ("height", Variant::from(5.0)),
                ]),
            )
            .unwrap();
        stage.attach(label, root, None).unwrap();
        stage.update_layout();

        let snap = snapshot(&stage);
        assert_eq!(
            snap,
            json!([{
                "handle": "#0@0",
                "type": "group",
                "hidden": false,
                "retained": false,
                "bounds": [0.0, 0.0, 40.0, 20.0],
                "properties": {},
                "children": [{
                    "handle": "#1@0",
                    "type": "label",
                    "hidden": false,
                    "retained": false,
                    "bounds": [0.0, 0.0, 10.0, 5.0],
                    "properties": { "text": "hello" },
                    "children": [],
                }],
            }])
        );

        stage.set_frame(Rect::new(0.0, 0.0, 50.0, 50.0));
        let stale = snapshot_subtree(&stage, root).unwrap();
        assert_eq!(stale["bounds"], Value::Null);

        stage.destroy(root);
        assert!(snapshot_subtree(&stage, root).is_none());
        assert_eq!(snapshot(&stage), json!([]));
    }

    #[test]
    fn export_records_produces_valid_json() {
        let sink = RecorderSink::new();
        let recording = sink.recording();
        let mut stage = Stage::new();
        stage.set_trace_sink(Box::new(sink));
        let parent = stage.create(builtin::GROUP, &Variant::Null).unwrap();
        let child = stage.create(builtin::GROUP, &Variant::Null).unwrap();
        stage.attach(child, parent, None).unwrap();

        let mut out = Vec::new();
        export_records(&recording.records(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0]["name"], "create");
        assert_eq!(parsed[0]["args"]["handle"], "#0@0");
        assert_eq!(parsed[2]["name"], "tree");
        assert_eq!(parsed[2]["args"]["op"], "Attach");
        assert_eq!(parsed[2]["args"]["child"], "#1@0");
        assert_eq!(parsed[2]["args"]["parent"], "#0@0");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export_records(&[], &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&String::from_utf8(out).unwrap()).unwrap();
        assert!(parsed.is_empty());
    }
}
