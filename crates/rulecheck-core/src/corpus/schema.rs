//! JSON Schema validation for corpus catalogs.
//!
//! Catalog files are checked against `schema/corpus-catalog.schema.json`
//! before they are deserialized, so structural mistakes are reported with the
//! offending location instead of a bare serde message.

use std::sync::OnceLock;

/// Embedded catalog schema (loaded at compile time).
const CATALOG_SCHEMA_JSON: &str = include_str!("../../schema/corpus-catalog.schema.json");

/// Compiled validator, initialized once.
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(CATALOG_SCHEMA_JSON)
            .map_err(|e| format!("Invalid catalog schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile catalog schema: {}", e))
    });

    result.as_ref().map_err(Clone::clone)
}

/// Validate a catalog document against the schema.
///
/// Returns every violation as `"<message> at <path>"`.
pub fn validate_catalog_schema(catalog: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(catalog)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
