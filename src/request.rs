use serde_json::Value;
use std::collections::HashMap;

/// Request body as handed over by the host runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    /// The untouched bytes received on the wire.
    Raw(Vec<u8>),
    /// A body the host already decoded; signatures have to be checked against a re-serialization.
    Json(Value),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Raw(bytes) => bytes.is_empty(),
            Payload::Json(value) => value.is_null(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        match self {
            Payload::Empty => Ok(Value::Null),
            Payload::Raw(bytes) => serde_json::from_slice(bytes),
            Payload::Json(value) => Ok(value.clone()),
        }
    }
}

impl From<&str> for Payload {
    fn from(body: &str) -> Self {
        Payload::Raw(body.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(body: Vec<u8>) -> Self {
        Payload::Raw(body)
    }
}

impl From<Value> for Payload {
    fn from(body: Value) -> Self {
        Payload::Json(body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRequest {
    headers: HashMap<String, String>,
    pub body: Payload,
}

impl FunctionRequest {
    pub fn new<I, K, V>(headers: I, body: Payload) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
            .collect();

        Self { headers, body }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResponse {
    pub status: u16,
    pub body: Value,
}

impl FunctionResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn body_string(&self) -> String {
        self.body.to_string()
    }
}
