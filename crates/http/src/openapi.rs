//! OpenAPI document assembled from module fragments.

use serde_json::{json, Value};

use libris_kernel::ModuleRegistry;

const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch"];

/// One row of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub method: String,
    pub path: String,
    pub summary: String,
}

/// Merge the base document with every module's paths and schemas.
pub fn document(registry: &ModuleRegistry, version: &str) -> Value {
    let mut spec = json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Libris API",
            "version": version,
            "description": "Book catalogue API"
        },
        "paths": {},
        "components": {
            "schemas": {}
        }
    });

    // Shape of `AppError` responses
    spec["components"]["schemas"]["ErrorResponse"] = json!({
        "type": "object",
        "properties": {
            "error": {
                "type": "object",
                "properties": {
                    "message": { "type": "string" },
                    "details": { "type": "array", "items": {} }
                },
                "required": ["message"]
            }
        },
        "required": ["error"]
    });

    // Shape of the router's own 404
    spec["components"]["schemas"]["RouteNotFound"] = json!({
        "type": "object",
        "properties": {
            "message": { "type": "string" },
            "status": { "type": "integer" }
        },
        "required": ["message", "status"]
    });

    spec["paths"]["/"] = json!({
        "get": {
            "summary": "Application name and version",
            "responses": {
                "200": {
                    "description": "OK",
                    "content": { "text/plain": { "schema": { "type": "string" } } }
                }
            }
        }
    });

    spec["paths"]["/healthz"] = json!({
        "get": {
            "summary": "Health check",
            "responses": {
                "200": {
                    "description": "OK",
                    "content": { "text/plain": { "schema": { "type": "string" } } }
                }
            }
        }
    });

    for module in registry.modules() {
        let Some(module_spec) = module.openapi() else {
            continue;
        };
        let prefix = module.mount_path().unwrap_or_default();

        if let Some(paths) = module_spec.get("paths").and_then(Value::as_object) {
            for (path, path_item) in paths {
                spec["paths"][format!("{}{}", prefix, path)] = path_item.clone();
            }
        }

        if let Some(schemas) = module_spec
            .get("components")
            .and_then(|components| components.get("schemas"))
            .and_then(Value::as_object)
        {
            for (schema_name, schema_def) in schemas {
                spec["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    spec
}

/// Round-trip the merged document through `utoipa`'s typed model.
///
/// A fragment that does not fit the model is logged and the raw document
/// is served instead.
pub fn validated(spec: Value) -> Value {
    match serde_json::from_value::<utoipa::openapi::OpenApi>(spec.clone()) {
        Ok(openapi) => serde_json::to_value(&openapi).unwrap_or(spec),
        Err(e) => {
            tracing::warn!(error = %e, "merged OpenAPI document does not validate; serving it as-is");
            spec
        }
    }
}

/// Flatten the merged document into `(method, path, summary)` rows.
pub fn route_table(registry: &ModuleRegistry) -> Vec<RouteEntry> {
    let spec = document(registry, "");
    let mut routes = Vec::new();

    if let Some(paths) = spec["paths"].as_object() {
        for (path, item) in paths {
            for method in HTTP_METHODS {
                if let Some(operation) = item.get(*method) {
                    routes.push(RouteEntry {
                        method: method.to_uppercase(),
                        path: path.clone(),
                        summary: operation["summary"].as_str().unwrap_or_default().to_string(),
                    });
                }
            }
        }
    }

    routes.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.method.cmp(&b.method)));
    routes
}
