//! Parameter canonicalization: a request-shaping layer applied before a
//! tool call's arguments are sent to the executor. Unknown parameters
//! always pass through untouched.

use serde_json::{Map, Value, json};

/// Rewrite `{nodeId, r, g, b, a?, weight?}` into `{nodeId, color:{r,g,b,a},
/// weight?}`, defaulting `a` to 1 and, for stroke calls, `weight` to 1.
/// Tools other than `set_fill_color`/`set_stroke_color` pass through
/// unchanged.
pub fn canonicalize(command: &str, params: Value) -> Value {
    match command {
        "set_fill_color" => rewrite_color(params, false),
        "set_stroke_color" => rewrite_color(params, true),
        _ => params,
    }
}

fn rewrite_color(params: Value, with_weight: bool) -> Value {
    let Value::Object(mut map) = params else {
        return params;
    };

    if !(map.contains_key("r") && map.contains_key("g") && map.contains_key("b")) {
        // Missing color channels: not our shape to rewrite, leave untouched.
        return Value::Object(map);
    }
    let (Some(r), Some(g), Some(b)) = (map.remove("r"), map.remove("g"), map.remove("b")) else {
        unreachable!("presence of r/g/b keys was just checked above");
    };
    let a = map.remove("a").unwrap_or(json!(1));

    let mut color = Map::new();
    color.insert("r".to_string(), r);
    color.insert("g".to_string(), g);
    color.insert("b".to_string(), b);
    color.insert("a".to_string(), a);
    map.insert("color".to_string(), Value::Object(color));

    if with_weight {
        let weight = map.remove("weight").unwrap_or(json!(1));
        map.insert("weight".to_string(), weight);
    }

    Value::Object(map)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_color_defaults_alpha_to_one() {
        let input = json!({ "nodeId": "1:2", "r": 1.0, "g": 0.5, "b": 0.0 });
        let out = canonicalize("set_fill_color", input);
        assert_eq!(out["color"], json!({ "r": 1.0, "g": 0.5, "b": 0.0, "a": 1 }));
        assert_eq!(out["nodeId"], "1:2");
        assert!(out.get("r").is_none());
    }

    #[test]
    fn fill_color_preserves_explicit_alpha() {
        let input = json!({ "nodeId": "1:2", "r": 1.0, "g": 0.0, "b": 0.0, "a": 0.5 });
        let out = canonicalize("set_fill_color", input);
        assert_eq!(out["color"]["a"], 0.5);
    }

    #[test]
    fn stroke_color_defaults_weight_to_one() {
        let input = json!({ "nodeId": "1:2", "r": 0.0, "g": 0.0, "b": 0.0 });
        let out = canonicalize("set_stroke_color", input);
        assert_eq!(out["weight"], 1);
    }

    #[test]
    fn stroke_color_preserves_explicit_weight() {
        let input = json!({ "nodeId": "1:2", "r": 0.0, "g": 0.0, "b": 0.0, "weight": 4 });
        let out = canonicalize("set_stroke_color", input);
        assert_eq!(out["weight"], 4);
    }

    #[test]
    fn unrelated_command_passes_through_verbatim() {
        let input = json!({ "nodeId": "1:2", "text": "hi", "extra": "kept" });
        let out = canonicalize("set_text_content", input.clone());
        assert_eq!(out, input);
    }

    #[test]
    fn unknown_params_on_color_calls_are_not_dropped() {
        let input = json!({ "nodeId": "1:2", "r": 1, "g": 1, "b": 1, "note": "keep-me" });
        let out = canonicalize("set_fill_color", input);
        assert_eq!(out["note"], "keep-me");
    }

    #[test]
    fn partial_color_channels_are_left_completely_untouched() {
        let input = json!({ "nodeId": "1:2", "g": 0.5, "b": 0.25 });
        let out = canonicalize("set_fill_color", input.clone());
        assert_eq!(out, input);
    }
}
