use serde_json::{Map, Value};

/// A group of function declarations offered to the model.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    function_declarations: Vec<FunctionDeclaration>,
}

impl Tool {
    pub fn new(function_declarations: Vec<FunctionDeclaration>) -> Self {
        Self {
            function_declarations,
        }
    }

    pub fn function_declarations(&self) -> &[FunctionDeclaration] {
        &self.function_declarations
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionDeclaration {
    /// The name of the function
    name: String,

    /// The description of the function
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// The parameters of the function in the API's OpenAPI-subset schema format
    parameters: Value,
}

impl FunctionDeclaration {
    pub fn new(name: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            parameters,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    id: String,
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

impl FunctionCall {
    pub fn new(id: &str, name: &str, args: Map<String, Value>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            args,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    /// Returns a string argument, if present and a string.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionResult {
    pub result: String,
}

/// The answer to a [`FunctionCall`], correlated by `id`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunctionResponse {
    id: String,
    name: String,
    response: FunctionResult,
}

impl FunctionResponse {
    pub fn new(id: &str, name: &str, result: String) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            response: FunctionResult { result },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn result(&self) -> &str {
        &self.response.result
    }
}
