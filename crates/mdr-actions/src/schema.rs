//! Tool parameter schemas and their derivation from capability signatures.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    List,
    Object,
}

impl ParameterType {
    /// JSON-schema type name.
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::List => "array",
            Self::Object => "object",
        }
    }
}

/// Definition of a tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub description: String,
    pub param_type: ParameterType,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParameterDef {
    /// Creates a new required parameter definition.
    pub fn required(name: &str, description: &str, param_type: ParameterType) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            param_type,
            required: true,
            default: None,
        }
    }

    /// Creates a new optional parameter definition.
    pub fn optional(name: &str, description: &str, param_type: ParameterType, default: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            param_type,
            required: false,
            default: Some(default),
        }
    }
}

/// Name, description and parameters of a registered tool.
///
/// Serializes to the function-calling wire shape:
/// `{"type": "function", "function": {"name", "description", "parameters"}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDef>,
}

impl ToolSchema {
    pub fn new(name: &str, description: &str, parameters: Vec<ParameterDef>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// JSON-schema object describing the parameters.
    pub fn parameters_json(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut property = json!({
                "type": param.param_type.json_type(),
                "description": param.description,
            });
            if let Some(default) = &param.default {
                property["default"] = default.clone();
            }
            properties.insert(param.name.clone(), property);
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_json(),
            }
        })
    }
}

impl Serialize for ToolSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// One parameter of a capability signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    /// Declared type; undeclared parameters are exposed as strings.
    pub declared_type: Option<ParameterType>,
    /// A parameter with a default is optional.
    pub default: Option<Value>,
}

/// Reflectable description of a callable: name, doc and ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilitySignature {
    pub name: String,
    pub doc: String,
    pub params: Vec<ParamSpec>,
}

impl CapabilitySignature {
    pub fn new(name: &str, doc: &str) -> Self {
        Self {
            name: name.to_string(),
            doc: doc.to_string(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter without a default.
    pub fn param(mut self, name: &str, declared_type: Option<ParameterType>) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            declared_type,
            default: None,
        });
        self
    }

    /// Appends a parameter with a default.
    pub fn param_with_default(
        mut self,
        name: &str,
        declared_type: Option<ParameterType>,
        default: Value,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            declared_type,
            default: Some(default),
        });
        self
    }

    /// Derives the tool schema.
    pub fn to_schema(&self) -> ToolSchema {
        let parameters = self
            .params
            .iter()
            .map(|p| ParameterDef {
                name: p.name.clone(),
                description: format!("Parameter {}", p.name),
                param_type: p.declared_type.unwrap_or(ParameterType::String),
                required: p.default.is_none(),
                default: p.default.clone(),
            })
            .collect();
        ToolSchema {
            name: self.name.clone(),
            description: self.doc.clone(),
            parameters,
        }
    }
}
