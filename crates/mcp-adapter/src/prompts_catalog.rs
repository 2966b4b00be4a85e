//! The static prompt catalog: a handful of long-form strategy documents,
//! baked into the binary alongside the tool catalog.

use crate::mcp_types::{GetPromptResult, PromptContent, PromptDef, PromptMessage};

pub fn catalog() -> Vec<PromptDef> {
    vec![
        PromptDef {
            name: "design_review_checklist".into(),
            description: Some("A checklist for reviewing a design file before handoff".into()),
        },
        PromptDef {
            name: "component_naming_conventions".into(),
            description: Some("Guidance for naming components and variants consistently".into()),
        },
        PromptDef {
            name: "accessibility_audit".into(),
            description: Some("A walkthrough for auditing contrast, type scale, and tap targets".into()),
        },
        PromptDef {
            name: "handoff_to_engineering".into(),
            description: Some("A strategy for annotating a file so engineers can implement it without follow-up questions".into()),
        },
    ]
}

pub fn get(name: &str) -> Option<GetPromptResult> {
    let text = match name {
        "design_review_checklist" => DESIGN_REVIEW_CHECKLIST,
        "component_naming_conventions" => COMPONENT_NAMING_CONVENTIONS,
        "accessibility_audit" => ACCESSIBILITY_AUDIT,
        "handoff_to_engineering" => HANDOFF_TO_ENGINEERING,
        _ => return None,
    };
    Some(GetPromptResult {
        description: catalog().into_iter().find(|p| p.name == name).and_then(|p| p.description),
        messages: vec![PromptMessage { role: "user".into(), content: PromptContent::Text { text: text.into() } }],
    })
}

const DESIGN_REVIEW_CHECKLIST: &str = "\
Before marking a file ready for review, confirm: every frame has a \
descriptive name, not a default Figma label; text styles and color \
styles are applied rather than ad hoc overrides; auto-layout is used on \
any frame whose children may reflow; components are instances, not \
detached copies; and at least one comment exists per open question for \
the reviewer to resolve inline.";

const COMPONENT_NAMING_CONVENTIONS: &str = "\
Name components by role, not appearance: `Button/Primary`, not \
`Blue Rounded Button`. Variants share a component set name and vary \
only their property values. Boolean variant properties read as a \
predicate (`Disabled`, not `IsDisabled=true`). Avoid embedding size or \
color literals in the name once a variant property exists to carry \
that information.";

const ACCESSIBILITY_AUDIT: &str = "\
Walk every screen checking: text-to-background contrast meets 4.5:1 \
for body text and 3:1 for large text; tap targets are at least 44x44 \
logical pixels; focus order follows reading order; and no information \
is conveyed by color alone — pair it with an icon, label, or pattern.";

const HANDOFF_TO_ENGINEERING: &str = "\
Annotate spacing values on every frame that uses a non-default gap, \
state which breakpoints a layout supports, and link each screen to its \
corresponding ticket. Prefer one annotation per ambiguous decision over \
a long free-text comment thread.";

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_entry_resolves() {
        for prompt in catalog() {
            assert!(get(&prompt.name).is_some(), "{} failed to resolve", prompt.name);
        }
    }

    #[test]
    fn unknown_prompt_name_is_none() {
        assert!(get("does_not_exist").is_none());
    }
}
