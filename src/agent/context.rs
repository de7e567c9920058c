use crate::session::Iteration;

const PREDECESSOR_CAVEAT: &str = "Follow with cares as your predecessor did not have access to its action result thus it did not have as much as information as you do when it came to analyzing and decision making";

/// Render the reasoning context for the next iteration.
///
/// Depends only on its arguments. Sections that have nothing to show are
/// left out; `seed` is only passed for the first iteration.
pub fn render_context(query: &str, previous: &Iteration, seed: Option<&str>) -> String {
    let mut sections = vec![format!(
        "# Context\n## User's original query regarding to current code base\n```\n{}\n```",
        query
    )];

    if let Some(seed) = seed.filter(|s| !s.is_empty()) {
        sections.push(format!("\n{}\n", seed));
    }

    if let Some(request) = &previous.tool_request {
        let request = serde_json::to_string(request).unwrap_or_default();
        sections.push(format!(
            "## Your predecessor's action\n```json\n{}\n```",
            request
        ));
    }
    if !previous.tool_result.is_empty() {
        sections.push(format!(
            "## Your predecessor's action result\n```\n{}\n```",
            previous.tool_result
        ));
    }
    if !previous.notes.is_empty() {
        sections.push(format!(
            "## Note from your predecessor\n{}\n```txt\n{}\n```",
            PREDECESSOR_CAVEAT, previous.notes
        ));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::RawToolCall;

    fn iteration() -> Iteration {
        Iteration {
            notes: "bar is a function in a.ts".to_string(),
            thinking: "I should open a.ts".to_string(),
            tool_request: Some(RawToolCall {
                name: "openFile".to_string(),
                arguments: serde_json::json!({"filePath": "a.ts"}),
            }),
            tool_result: "0: function bar() {}".to_string(),
        }
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let previous = iteration();
        let first = render_context("where is bar", &previous, Some("## listing"));
        let second = render_context("where is bar", &previous, Some("## listing"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_initial_iteration_renders_query_and_seed_only() {
        let text = render_context("where is bar", &Iteration::default(), Some("## listing"));
        assert_eq!(
            text,
            "# Context\n## User's original query regarding to current code base\n```\nwhere is bar\n```\n\n\n## listing\n"
        );

        let bare = render_context("q", &Iteration::default(), None);
        assert!(!bare.contains("predecessor"));
    }

    #[test]
    fn test_previous_iteration_sections_in_order() {
        let text = render_context("where is bar", &iteration(), None);
        let action = text.find("## Your predecessor's action\n```json\n{\"name\":\"openFile\"").unwrap();
        let result = text.find("## Your predecessor's action result").unwrap();
        let notes = text.find("## Note from your predecessor").unwrap();
        assert!(action < result && result < notes);
        assert!(text.contains("```txt\nbar is a function in a.ts\n```"));
        // thinking is never carried over
        assert!(!text.contains("I should open a.ts"));
    }
}
