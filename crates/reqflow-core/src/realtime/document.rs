use async_trait::async_trait;
use serde_json::{Value, json};

use super::{BackendError, Constraint, Invocation, RealtimeRequest, ValueStream};

/// Operations of a document-store backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum DocumentMethod {
    GetDocs,
    GetDoc,
    SetDoc,
    AddDoc,
    UpdateDoc,
    DeleteDoc,
    OnSnapshot,
}

impl DocumentMethod {
    pub fn requires_data(self) -> bool {
        matches!(self, Self::SetDoc | Self::AddDoc | Self::UpdateDoc)
    }
}

/// A collection/document database. Paths address a collection for
/// `get_docs`, `add_doc` and `on_snapshot`, a document otherwise.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn get_docs(&self, path: &str, constraints: &[Constraint])
    -> Result<Value, BackendError>;

    async fn get_doc(&self, path: &str) -> Result<Value, BackendError>;

    async fn set_doc(&self, path: &str, data: Value, merge: bool) -> Result<(), BackendError>;

    /// Returns the generated document id.
    async fn add_doc(&self, path: &str, data: Value) -> Result<String, BackendError>;

    async fn update_doc(&self, path: &str, data: Value) -> Result<(), BackendError>;

    async fn delete_doc(&self, path: &str) -> Result<(), BackendError>;

    async fn on_snapshot(
        &self,
        path: &str,
        constraints: &[Constraint],
    ) -> Result<ValueStream, BackendError>;
}

pub(super) async fn invoke(
    backend: &dyn DocumentBackend,
    method: DocumentMethod,
    request: &RealtimeRequest,
) -> Result<Invocation, BackendError> {
    let path = request.path.as_str();
    let value = match method {
        DocumentMethod::GetDocs => backend.get_docs(path, &request.constraints).await?,
        DocumentMethod::GetDoc => backend.get_doc(path).await?,
        DocumentMethod::SetDoc => {
            let data = request.data_or_null();
            backend
                .set_doc(path, data.clone(), request.flag("merge"))
                .await?;
            data
        }
        DocumentMethod::AddDoc => {
            let id = backend.add_doc(path, request.data_or_null()).await?;
            json!({ "id": id })
        }
        DocumentMethod::UpdateDoc => {
            let data = request.data_or_null();
            backend.update_doc(path, data.clone()).await?;
            data
        }
        DocumentMethod::DeleteDoc => {
            backend.delete_doc(path).await?;
            Value::Null
        }
        DocumentMethod::OnSnapshot => {
            let stream = backend.on_snapshot(path, &request.constraints).await?;
            return Ok(Invocation::Stream(stream));
        }
    };
    Ok(Invocation::Value(value))
}
