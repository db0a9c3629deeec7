use std::sync::Arc;

use recast::deferred::emit;
use recast::eager::convert_value;
use recast::{ConverterCache, load_registry};
use serde_json::{Value, json};

const DOM_EVENTS: &str = include_str!("../demos/dom_events.json");
const TOUCH_EVENT: &str = include_str!("../demos/touch_event.json");

fn cache() -> ConverterCache {
    ConverterCache::new(Arc::new(load_registry(DOM_EVENTS).unwrap()))
}

#[test]
fn every_declared_type_compiles() {
    let cache = cache();
    let names: Vec<String> = cache
        .registry()
        .named_types()
        .map(|(name, _)| name.to_owned())
        .collect();
    for name in &names {
        cache.get_or_compile_named(name).unwrap();
    }
    assert!(cache.len() >= names.len());
}

#[test]
fn touch_event_payload() {
    let cache = cache();
    let converter = cache.get_or_compile_named("TouchEvent").unwrap();
    let src: Value = serde_json::from_str(TOUCH_EVENT).unwrap();
    let out = convert_value(&converter, &src).unwrap();

    assert_eq!(out["type"], json!("touchstart"));
    assert_eq!(
        out["target"],
        json!({
            "tag_name": "div",
            "id": "canvas",
            "class_name": "board",
            "client_width": 640,
            "client_height": 480,
            "scroll_top": 0,
            "dataset": {"layer": "main"}
        })
    );
    let touches = out["touches"].as_array().unwrap();
    assert_eq!(touches.len(), 2);
    assert_eq!(touches[0]["page_y"], json!(1300.0));
    assert_eq!(touches[0].get("force"), None);
    assert_eq!(touches[1]["target"]["tag_name"], json!("button"));
    assert_eq!(touches[1]["target"]["dataset"], Value::Null);
    // an element kind the schema does not know becomes null
    assert_eq!(out["changed_touches"][0]["target"], Value::Null);
    assert_eq!(out["target_touches"], json!([]));

    let deferred = emit(&converter, "e").unwrap().evaluate(&src).unwrap();
    assert_eq!(deferred, out);
}

#[test]
fn mouse_event_with_and_without_related_target() {
    let cache = cache();
    let converter = cache.get_or_compile_named("MouseEvent").unwrap();
    let anchor = json!({
        "tagName": "a", "id": "home", "className": "nav", "href": "/",
        "target": "_self", "download": "", "tabIndex": 0
    });
    let mut src = json!({
        "type": "mouseover",
        "target": anchor,
        "currentTarget": anchor,
        "bubbles": true,
        "timeStamp": 10.5,
        "altKey": false, "ctrlKey": false, "metaKey": false, "shiftKey": true,
        "button": 0, "buttons": 0,
        "clientX": 4.0, "clientY": 5.0, "pageX": 4.0, "pageY": 105.0,
        "relatedTarget": null
    });
    let out = convert_value(&converter, &src).unwrap();
    assert_eq!(out["related_target"], Value::Null);
    assert_eq!(out["shift_key"], json!(true));
    assert_eq!(out["current_target"]["href"], json!("/"));

    src["relatedTarget"] = json!({
        "tagName": "input", "id": "q", "className": "", "type": "search",
        "value": "rust", "checked": false, "placeholder": "Search",
        "selectionStart": 4, "selectionEnd": null
    });
    let out = convert_value(&converter, &src).unwrap();
    assert_eq!(
        out["related_target"],
        json!({
            "tag_name": "input", "id": "q", "class_name": "", "type": "search",
            "value": "rust", "checked": false, "placeholder": "Search",
            "selection_start": 4, "selection_end": null, "aria_label": null
        })
    );
}

#[test]
fn drag_event_reads_overridden_names() {
    let cache = cache();
    let converter = cache.get_or_compile_named("DragEvent").unwrap();
    let src = json!({
        "type": "drop",
        "target": {"tagName": "section", "id": "", "className": "", "clientWidth": 1.0, "clientHeight": 1.0, "scrollTop": 0.0},
        "clientX": 1.0,
        "clientY": 2.0,
        "dataTransfer": {
            "dropEffect": "copy",
            "items": [{"kind": "file", "type": "image/png"}],
            "types": ["Files"]
        }
    });
    let out = convert_value(&converter, &src).unwrap();
    assert_eq!(
        out["data_transfer"]["items"],
        json!([{"kind": "file", "mime_type": "image/png"}])
    );
}

#[test]
fn emitted_expression_is_stable_javascript() {
    let cache = cache();
    let converter = cache.get_or_compile_named("FocusEvent").unwrap();
    let js = emit(&converter, "e").unwrap().to_string();
    assert!(js.starts_with(r#"{"type": e.type, "target": ((_t0) => _t0 === "a" ? "#));
    assert!(js.contains(r#""related_target": ((_v0) => _v0 == null ? null : "#));
    assert!(js.contains("(e.relatedTarget)"));
    assert_eq!(js, emit(&converter, "e").unwrap().to_string());
}
