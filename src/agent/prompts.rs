//! Instruction texts sent to the model at each phase.

use crate::inference::RawToolCall;

pub const SYSTEM_PROMPT: &str = "You are a professional static code analyst. Your task it to resolve user's query by following user's instruction.";

pub const THINKING_INSTRUCTION: &str = "Now is thinking stage.
You should think step by step and think critically to analyze the situation in plain text base on what you currently have and decide whether user's query can be resolved or the investigation needs to be continue.
You are not allow to make any assumptions which is not directly related current context.
Your predecessor's action result is the ground truth, while it may or may not be useful depending on the context.
Your predecessor's note is derived from truth which mean it may or may not be distorted thus you should adopt with thinking critically.
In this stage, you MUST ALWAYS think in nature language script and structured data are forbidden.
At the end describe your next direct action in one sentence and your action target must be this code base unless you are reporting to user.

To help your planning, below are actions you can perform during action stage which I'll specify later:
- searchFiles: Search file by file name or by content.
- openFile: Open a file by path to view its content.
- codeNavigation: Go to definition, list references or implementations of a symbol.
- listDir: List the files and directories in a given directory.
";

pub const VERDICT_QUESTION: &str = "Base on your analysis above, answer whether user's original query been resolved in one sentence. If resolved, quote the facts and evidences from predecessor's action result or notes or project's readme to support your verdict.";

pub const REPORT_INSTRUCTION: &str =
    "Base on your verdict about whether user's query has been resolved, invoke report tool provided.";

pub const FINAL_REPORT_INSTRUCTION: &str = "Now generate a report to resolve user's query.";

pub const TOOL_SELECT_INSTRUCTION: &str =
    "Base on your latest thought, execute your action with tools provided.";

/// Asks for a self-contained note; only the note, not the action result,
/// reaches the next iteration's reasoning.
pub fn noting_instruction(request: &RawToolCall) -> String {
    let request = serde_json::to_string(request).unwrap_or_default();
    format!(
        "Your next action request is:
```json
{request}
```
Your request is being process but before there is a result, you will be dead.
There will be a successor to handle the result and continue your work.
Your successor will have no knowledge about what you are doing and what have been done except user's original query and your action about to be form.
Make sure you take note of everything necessary so that your successor wouldn't have to repeat what have been done.
It's suggested to include and not limited to:
- Statement of facts written to help clarifying user's query which is highly recommended. Examples: \"foo is a file\", \"bar is a function\".
- Describe your general goal, plans and state at your current stage in one sentence.
- Code blocks with its original line numbers and file path
Your entire response will be the content of your notes and must being using nature language unless referring code.
Write with your own words! Do not copy paste contents from the context!
Be aware that there will be a compressing stage later on your note which means the longer your note is the more likely the key informations will be lost by compressing. Please be concise and focus on key points to ensure your message is clear and effective without unrelated commentary.
"
    )
}

/// Seed prompt asking which files are worth reading for `query`.
pub fn file_selection_prompt(listing: &str, query: &str) -> String {
    format!(
        "You are a professional code analyst. Listing all files within the given project result in:
{listing}

Select a list of files exists in list above that are likely to contain information required to resolve the following query.
```
{query}
```
The list is sorted by relevance.
You should select files with their dependencies in mind.
All path are relative to project root.
"
    )
}

pub fn file_submission_prompt(selection: &str) -> String {
    format!("Submit the file paths in following content using given tool:\n```\n{selection}\n```")
}

pub fn extraction_prompt(contents: &str, query: &str) -> String {
    format!(
        "Here is a list of files in the repository that may help you answer the query:
{contents}

# INSTRUCTION
You are an expert software engineer. Extract all useful information provided above which could help answering the following user query. Includes file path and original line numbers when referring code blocks.

# USER QUERY
```
{query}
```
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noting_instruction_embeds_request_json() {
        let request = RawToolCall {
            name: "openFile".to_string(),
            arguments: serde_json::json!({"filePath": "a.ts"}),
        };
        let text = noting_instruction(&request);
        assert!(text.starts_with(
            "Your next action request is:\n```json\n{\"name\":\"openFile\",\"arguments\":{\"filePath\":\"a.ts\"}}\n```"
        ));
    }
}
