//! Remote Tool Schema Handling
//!
//! Remote tools that act on a user's project declare `user_id` and/or
//! `project_id` in their input schema. Those fields are never shown to the
//! model: they are stripped from the advertised schema and filled in from the
//! invocation context instead.

use serde_json::{Map, Value};

pub const USER_ID_FIELD: &str = "user_id";
pub const PROJECT_ID_FIELD: &str = "project_id";

/// Which context fields a remote tool declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectionPlan {
    pub user_id: bool,
    pub project_id: bool,
}

impl InjectionPlan {
    /// Inspect the original schema's `properties`.
    pub fn from_schema(schema: &Value) -> Self {
        let properties = schema.get("properties").and_then(Value::as_object);
        let declares = |field: &str| properties.is_some_and(|p| p.contains_key(field));
        Self {
            user_id: declares(USER_ID_FIELD),
            project_id: declares(PROJECT_ID_FIELD),
        }
    }

    pub fn requires_injection(&self) -> bool {
        self.user_id || self.project_id
    }

    /// Write the declared fields into outgoing arguments, overriding anything
    /// the model supplied.
    pub fn inject(&self, arguments: &mut Map<String, Value>, user_id: &str, project_id: &str) {
        if self.user_id {
            arguments.insert(USER_ID_FIELD.to_string(), Value::String(user_id.to_string()));
        }
        if self.project_id {
            arguments.insert(PROJECT_ID_FIELD.to_string(), Value::String(project_id.to_string()));
        }
    }
}

/// Deep copy of `schema` without the injected fields in `properties` and
/// `required`. The original is left untouched.
pub fn strip_injected_fields(schema: &Value) -> Value {
    let mut copy = schema.clone();
    let injected = [USER_ID_FIELD, PROJECT_ID_FIELD];

    if let Some(properties) = copy.get_mut("properties").and_then(Value::as_object_mut) {
        for field in injected {
            properties.remove(field);
        }
    }
    if let Some(required) = copy.get_mut("required").and_then(Value::as_array_mut) {
        required.retain(|v| !v.as_str().is_some_and(|name| injected.contains(&name)));
    }
    copy
}

/// Ensure the advertised schema is an object schema the provider accepts.
pub fn normalize_object_schema(schema: &mut Value) {
    if !schema.is_object() {
        *schema = serde_json::json!({"type": "object", "properties": {}});
        return;
    }
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.entry("type").or_insert_with(|| Value::String("object".to_string()));
        obj.entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
    }
}
