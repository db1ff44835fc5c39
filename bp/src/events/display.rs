//! Tool display lookup - maps tool identifiers to UI-friendly descriptors
//!
//! The facade resolves every `tool.*` event through this table so consumers
//! get a human display name, an icon, and an action description without
//! knowing individual tools. Unknown identifiers fall back to a generic
//! descriptor, keeping the facade open to new tools without code changes
//! elsewhere.

use serde_json::Value;

/// Display information for one tool invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolInfo {
    pub display_name: String,
    pub icon: &'static str,
    pub description: String,
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

/// Resolve display info for a tool invocation
pub fn descriptor_for(tool_name: &str, args: &Value) -> ToolInfo {
    match tool_name {
        "navigation_tool" => ToolInfo {
            display_name: "Navigation".to_string(),
            icon: "🧭",
            description: match arg_str(args, "url") {
                Some(url) => format!("Navigating to {url}"),
                None => "Navigating".to_string(),
            },
        },
        "screenshot_tool" => ToolInfo {
            display_name: "Screenshot".to_string(),
            icon: "📸",
            description: "Capturing a screenshot of the page".to_string(),
        },
        "click_tool" => ToolInfo {
            display_name: "Click".to_string(),
            icon: "🖱️",
            description: match arg_str(args, "element") {
                Some(element) => format!("Clicking {element}"),
                None => "Clicking an element".to_string(),
            },
        },
        "type_tool" => ToolInfo {
            display_name: "Type".to_string(),
            icon: "⌨️",
            description: match arg_str(args, "field") {
                Some(field) => format!("Typing into {field}"),
                None => "Typing text".to_string(),
            },
        },
        "scroll_tool" => ToolInfo {
            display_name: "Scroll".to_string(),
            icon: "📜",
            description: match arg_str(args, "direction") {
                Some(direction) => format!("Scrolling {direction}"),
                None => "Scrolling the page".to_string(),
            },
        },
        "extract_tool" => ToolInfo {
            display_name: "Extract".to_string(),
            icon: "📄",
            description: "Extracting page content".to_string(),
        },
        "tab_tool" => ToolInfo {
            display_name: "Tabs".to_string(),
            icon: "🗂️",
            description: "Managing browser tabs".to_string(),
        },
        "search_tool" => ToolInfo {
            display_name: "Search".to_string(),
            icon: "🔎",
            description: match arg_str(args, "query") {
                Some(query) => format!("Searching for \"{query}\""),
                None => "Searching the web".to_string(),
            },
        },
        "human_input_tool" => ToolInfo {
            display_name: "Human input".to_string(),
            icon: "🙋",
            description: "Waiting for human input".to_string(),
        },
        "done_tool" => ToolInfo {
            display_name: "Done".to_string(),
            icon: "✅",
            description: "Finishing the task".to_string(),
        },
        other => ToolInfo {
            display_name: humanize(other),
            icon: "🔧",
            description: format!("Running {other}"),
        },
    }
}

/// "planner_tool" -> "Planner", "do_thing" -> "Do thing"
fn humanize(tool_name: &str) -> String {
    let base = tool_name.strip_suffix("_tool").unwrap_or(tool_name);
    let spaced = base.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Tool".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_tool_uses_args_in_description() {
        let info = descriptor_for("navigation_tool", &json!({"url": "https://a.test"}));
        assert_eq!(info.display_name, "Navigation");
        assert_eq!(info.icon, "🧭");
        assert_eq!(info.description, "Navigating to https://a.test");
    }

    #[test]
    fn test_known_tool_without_args() {
        let info = descriptor_for("click_tool", &json!({}));
        assert_eq!(info.description, "Clicking an element");
    }

    #[test]
    fn test_unknown_tool_falls_back() {
        let info = descriptor_for("weather_lookup_tool", &json!({}));
        assert_eq!(info.display_name, "Weather lookup");
        assert_eq!(info.icon, "🔧");
        assert_eq!(info.description, "Running weather_lookup_tool");
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("navigation_tool"), "Navigation");
        assert_eq!(humanize("do_thing"), "Do thing");
        assert_eq!(humanize(""), "Tool");
    }
}
