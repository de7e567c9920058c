//! Schema generation and argument validation for tool calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use jsonschema::Validator;
use once_cell::sync::Lazy;
use schemars::generate::SchemaSettings;
use serde_json::Value;

use super::params::ToolParams;
use crate::error::{InvestigatorError, Result};
use crate::inference::{FunctionDefinition, ToolDefinition};

/// Compiled validators, one per tool name.
static VALIDATORS: Lazy<Mutex<HashMap<&'static str, Arc<Validator>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The parameter schema of `T`, inlined and stripped of root metadata so it
/// can be sent as a function declaration.
pub fn parameters_schema<T: ToolParams>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|settings| settings.inline_subschemas = true)
        .into_generator();
    let mut schema = generator.into_root_schema_for::<T>().to_value();
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object.remove("description");
        object.remove("definitions");
        object.remove("$defs");
    }
    schema
}

pub fn definition<T: ToolParams>() -> ToolDefinition {
    ToolDefinition {
        kind: "function",
        function: FunctionDefinition {
            name: T::NAME,
            description: T::DESCRIPTION,
            parameters: parameters_schema::<T>(),
        },
    }
}

fn validator<T: ToolParams>() -> Result<Arc<Validator>> {
    let mut cache = VALIDATORS
        .lock()
        .map_err(|_| InvestigatorError::Config("validator cache poisoned".to_string()))?;
    if let Some(validator) = cache.get(T::NAME) {
        return Ok(Arc::clone(validator));
    }

    let compiled = jsonschema::validator_for(&parameters_schema::<T>()).map_err(|e| {
        InvestigatorError::Config(format!("invalid schema for {}: {}", T::NAME, e))
    })?;
    let compiled = Arc::new(compiled);
    cache.insert(T::NAME, Arc::clone(&compiled));
    Ok(compiled)
}

/// Check `arguments` against the schema of `T` and deserialize them.
///
/// Either every field validates or the call fails with one report line per
/// offending path.
pub fn validate<T: ToolParams>(arguments: &Value) -> Result<T> {
    let validator = validator::<T>()?;
    let problems: Vec<String> = validator
        .iter_errors(arguments)
        .map(|error| {
            format!(
                "- {}: {}",
                display_path(&error.instance_path.to_string()),
                error
            )
        })
        .collect();

    if !problems.is_empty() {
        return Err(InvestigatorError::Validation {
            tool: T::NAME.to_string(),
            report: format!("Validation errors:\n{}", problems.join("\n")),
        });
    }

    serde_json::from_value(arguments.clone()).map_err(|e| InvestigatorError::Validation {
        tool: T::NAME.to_string(),
        report: format!("Validation errors:\n- (root): {}", e),
    })
}

/// `/filePaths/0` becomes `filePaths.0`; the empty pointer is the argument object.
fn display_path(pointer: &str) -> String {
    let trimmed = pointer.trim_start_matches('/');
    if trimmed.is_empty() {
        return "(root)".to_string();
    }
    trimmed
        .split('/')
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::NavigationKind;
    use crate::tools::params::{
        CodeNavigationParams, ListDirParams, ReportParams, SearchBy, SearchFilesParams,
        SubmitRelevantFilesParams, Verdict,
    };
    use serde_json::json;

    #[test]
    fn test_declaration_uses_wire_names() {
        let schema = parameters_schema::<CodeNavigationParams>();
        let properties = schema["properties"].as_object().unwrap();

        assert!(properties.contains_key("type"));
        assert!(properties.contains_key("filePath"));
        assert!(properties.contains_key("nthId"));
        assert!(schema.get("$schema").is_none());

        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"identifier"));
        assert!(!required.contains(&"nthId"));
    }

    #[test]
    fn test_enum_is_inlined_in_declaration() {
        let schema = parameters_schema::<ReportParams>();
        let rendered = schema.to_string();
        assert!(!rendered.contains("$ref"));
        assert!(rendered.contains("review"));
    }

    #[test]
    fn test_valid_arguments_deserialize() {
        let params: CodeNavigationParams = validate(&json!({
            "type": "definition",
            "filePath": "a.ts",
            "line": 3,
            "identifier": "bar"
        }))
        .unwrap();
        assert_eq!(params.kind, NavigationKind::Definition);
        assert_eq!(params.line, 3);
        assert_eq!(params.nth_id, None);

        let params: SearchFilesParams =
            validate(&json!({"searchBy": "content", "pattern": "fn main"})).unwrap();
        assert_eq!(params.search_by, SearchBy::Content);

        let params: ListDirParams = validate(&json!({"dirPath": null})).unwrap();
        assert_eq!(params.dir_path, None);
    }

    #[test]
    fn test_bad_enum_value_is_reported_by_field() {
        let err = validate::<ReportParams>(&json!({"reason": "done"})).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Validation errors:\n- reason: "));
        assert!(matches!(err, InvestigatorError::Validation { ref tool, .. } if tool == "report"));

        let ok: ReportParams = validate(&json!({"reason": "review"})).unwrap();
        assert_eq!(ok.reason, Verdict::Review);
    }

    #[test]
    fn test_every_offending_field_is_listed() {
        let err = validate::<SearchFilesParams>(&json!({"searchBy": "name"})).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("- searchBy: "));
        assert!(message.contains("- (root): "));
        assert_eq!(message.lines().count(), 3);
    }

    #[test]
    fn test_nested_paths_are_dotted() {
        let err =
            validate::<SubmitRelevantFilesParams>(&json!({"filePaths": ["a.ts", 3]})).unwrap_err();
        assert!(err.to_string().contains("- filePaths.1: "));
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(""), "(root)");
        assert_eq!(display_path("/reason"), "reason");
        assert_eq!(display_path("/a~1b/0"), "a/b.0");
    }
}
