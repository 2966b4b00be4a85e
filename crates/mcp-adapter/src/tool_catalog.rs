//! The static tool catalog: roughly fifty schema-only entries, baked into
//! the binary. There is no dynamic discovery — the executor on the other
//! end of the channel is what actually implements each command; this
//! adapter only describes the shape.

use serde_json::{Value, json};

use crate::mcp_types::McpToolDef;

fn obj(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn node_id_only(name: &str, description: &str) -> McpToolDef {
    McpToolDef {
        name: name.into(),
        description: Some(description.into()),
        input_schema: obj(json!({ "nodeId": { "type": "string" } }), &["nodeId"]),
    }
}

/// Tool names that bypass the "channel must be joined" check. `join_channel`
/// is handled specially before this set is even consulted; the rest are
/// broker-local commands that never reach an executor.
pub const CHANNEL_NOT_REQUIRED: &[&str] = &[
    "join_channel",
    "get_active_channels",
    "connection_diagnostics",
    "get_comments",
    "post_comment",
    "reply_to_comment",
    "post_reaction",
    "get_reactions",
    "delete_reaction",
    "get_config",
    "set_config",
    "send_notification",
];

pub fn catalog() -> Vec<McpToolDef> {
    vec![
        McpToolDef {
            name: "join_channel".into(),
            description: Some("Join a design channel by name so subsequent tool calls reach its executor".into()),
            input_schema: obj(json!({ "channel": { "type": "string" } }), &["channel"]),
        },
        McpToolDef {
            name: "get_document_info".into(),
            description: Some("Get metadata about the currently open document".into()),
            input_schema: obj(json!({}), &[]),
        },
        McpToolDef {
            name: "get_selection".into(),
            description: Some("Get the node ids currently selected in the design tool".into()),
            input_schema: obj(json!({}), &[]),
        },
        node_id_only("get_node_info", "Get detailed info about a single node"),
        McpToolDef {
            name: "get_nodes_info".into(),
            description: Some("Get detailed info about multiple nodes at once".into()),
            input_schema: obj(json!({ "nodeIds": { "type": "array", "items": { "type": "string" } } }), &["nodeIds"]),
        },
        McpToolDef {
            name: "read_my_design".into(),
            description: Some("Read the full structure of the current selection or page".into()),
            input_schema: obj(json!({}), &[]),
        },
        node_id_only("get_screenshot", "Render a PNG screenshot of a node"),
        McpToolDef {
            name: "get_styles".into(),
            description: Some("List paint, text, and effect styles defined in the document".into()),
            input_schema: obj(json!({}), &[]),
        },
        McpToolDef {
            name: "get_local_components".into(),
            description: Some("List components defined locally in the document".into()),
            input_schema: obj(json!({}), &[]),
        },
        node_id_only("get_annotations", "Get annotations attached to a node"),
        McpToolDef {
            name: "set_annotation".into(),
            description: Some("Set a single annotation on a node".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "label": { "type": "string" } }), &["nodeId", "label"]),
        },
        McpToolDef {
            name: "set_multiple_annotations".into(),
            description: Some("Set annotations on several nodes in one call".into()),
            input_schema: obj(json!({ "annotations": { "type": "array" } }), &["annotations"]),
        },
        McpToolDef {
            name: "scan_text_nodes".into(),
            description: Some("Find every text node under a root node".into()),
            input_schema: obj(json!({ "rootId": { "type": "string" } }), &["rootId"]),
        },
        McpToolDef {
            name: "create_rectangle".into(),
            description: Some("Create a rectangle node".into()),
            input_schema: obj(
                json!({
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "width": { "type": "number" },
                    "height": { "type": "number" },
                    "parentId": { "type": "string" },
                }),
                &["x", "y", "width", "height"],
            ),
        },
        McpToolDef {
            name: "create_frame".into(),
            description: Some("Create a frame node".into()),
            input_schema: obj(
                json!({
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "width": { "type": "number" },
                    "height": { "type": "number" },
                    "parentId": { "type": "string" },
                }),
                &["x", "y", "width", "height"],
            ),
        },
        McpToolDef {
            name: "create_text".into(),
            description: Some("Create a text node".into()),
            input_schema: obj(
                json!({ "x": { "type": "number" }, "y": { "type": "number" }, "text": { "type": "string" } }),
                &["x", "y", "text"],
            ),
        },
        McpToolDef {
            name: "create_ellipse".into(),
            description: Some("Create an ellipse node".into()),
            input_schema: obj(
                json!({
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "width": { "type": "number" },
                    "height": { "type": "number" },
                }),
                &["x", "y", "width", "height"],
            ),
        },
        McpToolDef {
            name: "create_component_instance".into(),
            description: Some("Instantiate a local component by key".into()),
            input_schema: obj(
                json!({ "componentKey": { "type": "string" }, "x": { "type": "number" }, "y": { "type": "number" } }),
                &["componentKey", "x", "y"],
            ),
        },
        McpToolDef {
            name: "clone_node".into(),
            description: Some("Duplicate an existing node".into()),
            input_schema: obj(
                json!({ "nodeId": { "type": "string" }, "x": { "type": "number" }, "y": { "type": "number" } }),
                &["nodeId"],
            ),
        },
        McpToolDef {
            name: "set_fill_color".into(),
            description: Some("Set a node's fill color (r, g, b in 0..1, a optional, default 1)".into()),
            input_schema: obj(
                json!({
                    "nodeId": { "type": "string" },
                    "r": { "type": "number" },
                    "g": { "type": "number" },
                    "b": { "type": "number" },
                    "a": { "type": "number" },
                }),
                &["nodeId", "r", "g", "b"],
            ),
        },
        McpToolDef {
            name: "set_stroke_color".into(),
            description: Some("Set a node's stroke color and weight (r, g, b in 0..1, a and weight optional)".into()),
            input_schema: obj(
                json!({
                    "nodeId": { "type": "string" },
                    "r": { "type": "number" },
                    "g": { "type": "number" },
                    "b": { "type": "number" },
                    "a": { "type": "number" },
                    "weight": { "type": "number" },
                }),
                &["nodeId", "r", "g", "b"],
            ),
        },
        McpToolDef {
            name: "set_corner_radius".into(),
            description: Some("Set a node's corner radius".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "radius": { "type": "number" } }), &["nodeId", "radius"]),
        },
        McpToolDef {
            name: "set_font_name".into(),
            description: Some("Set a text node's font family and style".into()),
            input_schema: obj(
                json!({ "nodeId": { "type": "string" }, "family": { "type": "string" }, "style": { "type": "string" } }),
                &["nodeId", "family"],
            ),
        },
        McpToolDef {
            name: "set_font_size".into(),
            description: Some("Set a text node's font size".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "size": { "type": "number" } }), &["nodeId", "size"]),
        },
        McpToolDef {
            name: "set_font_weight".into(),
            description: Some("Set a text node's font weight".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "weight": { "type": "number" } }), &["nodeId", "weight"]),
        },
        McpToolDef {
            name: "set_letter_spacing".into(),
            description: Some("Set a text node's letter spacing".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "value": { "type": "number" } }), &["nodeId", "value"]),
        },
        McpToolDef {
            name: "set_line_height".into(),
            description: Some("Set a text node's line height".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "value": { "type": "number" } }), &["nodeId", "value"]),
        },
        McpToolDef {
            name: "set_paragraph_spacing".into(),
            description: Some("Set a text node's paragraph spacing".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "value": { "type": "number" } }), &["nodeId", "value"]),
        },
        McpToolDef {
            name: "set_text_case".into(),
            description: Some("Set a text node's case transform".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "case": { "type": "string" } }), &["nodeId", "case"]),
        },
        McpToolDef {
            name: "set_text_decoration".into(),
            description: Some("Set a text node's decoration (underline, strikethrough)".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "decoration": { "type": "string" } }), &["nodeId", "decoration"]),
        },
        McpToolDef {
            name: "set_layout_mode".into(),
            description: Some("Set a frame's auto-layout mode".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "mode": { "type": "string" } }), &["nodeId", "mode"]),
        },
        McpToolDef {
            name: "set_padding".into(),
            description: Some("Set a frame's auto-layout padding".into()),
            input_schema: obj(
                json!({
                    "nodeId": { "type": "string" },
                    "top": { "type": "number" },
                    "right": { "type": "number" },
                    "bottom": { "type": "number" },
                    "left": { "type": "number" },
                }),
                &["nodeId"],
            ),
        },
        McpToolDef {
            name: "set_axis_align".into(),
            description: Some("Set a frame's primary/counter axis alignment".into()),
            input_schema: obj(
                json!({ "nodeId": { "type": "string" }, "primary": { "type": "string" }, "counter": { "type": "string" } }),
                &["nodeId"],
            ),
        },
        McpToolDef {
            name: "set_layout_sizing".into(),
            description: Some("Set a node's horizontal/vertical auto-layout sizing mode".into()),
            input_schema: obj(
                json!({ "nodeId": { "type": "string" }, "horizontal": { "type": "string" }, "vertical": { "type": "string" } }),
                &["nodeId"],
            ),
        },
        McpToolDef {
            name: "set_item_spacing".into(),
            description: Some("Set a frame's auto-layout item spacing".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "value": { "type": "number" } }), &["nodeId", "value"]),
        },
        McpToolDef {
            name: "set_text_content".into(),
            description: Some("Replace a text node's characters".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "text": { "type": "string" } }), &["nodeId", "text"]),
        },
        McpToolDef {
            name: "set_multiple_text_contents".into(),
            description: Some("Replace the characters of several text nodes in one call".into()),
            input_schema: obj(json!({ "edits": { "type": "array" } }), &["edits"]),
        },
        McpToolDef {
            name: "move_node".into(),
            description: Some("Move a node to an absolute position".into()),
            input_schema: obj(
                json!({ "nodeId": { "type": "string" }, "x": { "type": "number" }, "y": { "type": "number" } }),
                &["nodeId", "x", "y"],
            ),
        },
        McpToolDef {
            name: "resize_node".into(),
            description: Some("Resize a node".into()),
            input_schema: obj(
                json!({ "nodeId": { "type": "string" }, "width": { "type": "number" }, "height": { "type": "number" } }),
                &["nodeId", "width", "height"],
            ),
        },
        node_id_only("delete_node", "Delete a node"),
        McpToolDef {
            name: "delete_multiple_nodes".into(),
            description: Some("Delete several nodes in one call".into()),
            input_schema: obj(json!({ "nodeIds": { "type": "array", "items": { "type": "string" } } }), &["nodeIds"]),
        },
        McpToolDef {
            name: "set_node_locked".into(),
            description: Some("Lock or unlock a node".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "locked": { "type": "boolean" } }), &["nodeId", "locked"]),
        },
        McpToolDef {
            name: "set_node_visible".into(),
            description: Some("Show or hide a node".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "visible": { "type": "boolean" } }), &["nodeId", "visible"]),
        },
        McpToolDef {
            name: "export_node_as_image".into(),
            description: Some("Export a node as a PNG, JPG, or SVG".into()),
            input_schema: obj(json!({ "nodeId": { "type": "string" }, "format": { "type": "string" } }), &["nodeId"]),
        },
        node_id_only("get_instance_overrides", "Get the component-instance property overrides on a node"),
        McpToolDef {
            name: "set_instance_overrides".into(),
            description: Some("Apply component-instance property overrides to a node".into()),
            input_schema: obj(
                json!({ "nodeId": { "type": "string" }, "overrides": { "type": "object" } }),
                &["nodeId", "overrides"],
            ),
        },
        McpToolDef {
            name: "get_active_channels".into(),
            description: Some("List channels with at least one connected member (broker-local)".into()),
            input_schema: obj(json!({}), &[]),
        },
        McpToolDef {
            name: "connection_diagnostics".into(),
            description: Some("Report broker uptime, connection count, and joined channels (broker-local)".into()),
            input_schema: obj(json!({}), &[]),
        },
        McpToolDef {
            name: "get_comments".into(),
            description: Some("List comments on a design file (Figma REST)".into()),
            input_schema: obj(json!({ "fileKey": { "type": "string" } }), &[]),
        },
        McpToolDef {
            name: "post_comment".into(),
            description: Some("Post a new comment on a design file (Figma REST)".into()),
            input_schema: obj(
                json!({ "fileKey": { "type": "string" }, "message": { "type": "string" }, "clientMeta": { "type": "object" } }),
                &["message"],
            ),
        },
        McpToolDef {
            name: "reply_to_comment".into(),
            description: Some("Reply to an existing comment (Figma REST)".into()),
            input_schema: obj(
                json!({ "fileKey": { "type": "string" }, "commentId": { "type": "string" }, "message": { "type": "string" } }),
                &["commentId", "message"],
            ),
        },
        McpToolDef {
            name: "post_reaction".into(),
            description: Some("React to a comment with an emoji (Figma REST)".into()),
            input_schema: obj(
                json!({ "fileKey": { "type": "string" }, "commentId": { "type": "string" }, "emoji": { "type": "string" } }),
                &["commentId", "emoji"],
            ),
        },
        McpToolDef {
            name: "get_reactions".into(),
            description: Some("List reactions on a comment (Figma REST)".into()),
            input_schema: obj(json!({ "fileKey": { "type": "string" }, "commentId": { "type": "string" } }), &["commentId"]),
        },
        McpToolDef {
            name: "delete_reaction".into(),
            description: Some("Remove this app's reaction from a comment (Figma REST)".into()),
            input_schema: obj(
                json!({ "fileKey": { "type": "string" }, "commentId": { "type": "string" }, "emoji": { "type": "string" } }),
                &["commentId", "emoji"],
            ),
        },
        McpToolDef {
            name: "get_config".into(),
            description: Some("Read the broker's small config blob".into()),
            input_schema: obj(json!({}), &[]),
        },
        McpToolDef {
            name: "set_config".into(),
            description: Some("Merge the given key/value pairs into the broker's small config blob".into()),
            input_schema: json!({ "type": "object" }),
        },
        McpToolDef {
            name: "send_notification".into(),
            description: Some("Publish a broadcast notification to every subscriber of the log sink".into()),
            input_schema: obj(json!({ "title": { "type": "string" }, "body": { "type": "string" } }), &["title", "body"]),
        },
    ]
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_unique_names() {
        let tools = catalog();
        let mut names: Vec<_> = tools.iter().map(|t| t.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), tools.len());
    }

    #[test]
    fn catalog_is_roughly_fifty_entries() {
        let tools = catalog();
        assert!(tools.len() >= 45 && tools.len() <= 60, "got {}", tools.len());
    }

    #[test]
    fn channel_not_required_names_exist_in_catalog() {
        let tools = catalog();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        for exempt in CHANNEL_NOT_REQUIRED {
            assert!(names.contains(exempt), "{exempt} missing from catalog");
        }
    }
}
