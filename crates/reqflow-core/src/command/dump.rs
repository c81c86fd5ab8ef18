use reqflow_api::Payload;
use serde::{Deserialize, Serialize};

use super::{CommandConfig, Method};
use crate::endpoint::{Params, QueryParams};
use crate::keys::{DispatchKeys, KeyOverrides};

/// Transport-neutral snapshot of a command.
///
/// Carries the derived keys verbatim, so a restored command keeps the same
/// identity even if key derivation changes. Mocks are not serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDump {
    pub config: CommandConfig,
    pub method: Method,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub query_params: QueryParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
    pub keys: DispatchKeys,
    #[serde(default)]
    pub overrides: KeyOverrides,
    #[serde(default)]
    pub used: bool,
}
