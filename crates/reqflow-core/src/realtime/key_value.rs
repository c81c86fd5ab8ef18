use async_trait::async_trait;
use serde_json::{Value, json};

use super::{BackendError, Constraint, Invocation, RealtimeRequest, ValueStream};

/// Operations of a tree-shaped key-value backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum KeyValueMethod {
    Get,
    Set,
    Push,
    Update,
    Remove,
    OnValue,
}

impl KeyValueMethod {
    pub fn requires_data(self) -> bool {
        matches!(self, Self::Set | Self::Push | Self::Update)
    }
}

#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    async fn get(&self, path: &str, constraints: &[Constraint]) -> Result<Value, BackendError>;

    async fn set(&self, path: &str, data: Value) -> Result<(), BackendError>;

    /// Appends under a generated child key and returns it.
    async fn push(&self, path: &str, data: Value) -> Result<String, BackendError>;

    async fn update(&self, path: &str, data: Value) -> Result<(), BackendError>;

    async fn remove(&self, path: &str) -> Result<(), BackendError>;

    async fn on_value(
        &self,
        path: &str,
        constraints: &[Constraint],
    ) -> Result<ValueStream, BackendError>;
}

pub(super) async fn invoke(
    backend: &dyn KeyValueBackend,
    method: KeyValueMethod,
    request: &RealtimeRequest,
) -> Result<Invocation, BackendError> {
    let path = request.path.as_str();
    let value = match method {
        KeyValueMethod::Get => backend.get(path, &request.constraints).await?,
        KeyValueMethod::Set => {
            let data = request.data_or_null();
            backend.set(path, data.clone()).await?;
            data
        }
        KeyValueMethod::Push => {
            let key = backend.push(path, request.data_or_null()).await?;
            json!({ "key": key })
        }
        KeyValueMethod::Update => {
            let data = request.data_or_null();
            backend.update(path, data.clone()).await?;
            data
        }
        KeyValueMethod::Remove => {
            backend.remove(path).await?;
            Value::Null
        }
        KeyValueMethod::OnValue => {
            let stream = backend.on_value(path, &request.constraints).await?;
            return Ok(Invocation::Stream(stream));
        }
    };
    Ok(Invocation::Value(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_method_round_trips_through_its_name() {
        for method in KeyValueMethod::iter() {
            assert_eq!(method.to_string().parse::<KeyValueMethod>(), Ok(method));
        }
        assert_eq!(KeyValueMethod::OnValue.to_string(), "onValue");
    }
}
