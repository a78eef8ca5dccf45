//! 验证错误与载荷封套
//! 验证管线在封套上累积错误，从不提前中断

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::confirmation::ConfirmationFamily;

/// 验证错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    NotAuthorized,
    NotConnected,
    UnknownNetwork,
    NetworkUnreachable,
    InvalidAddress,
    InvalidPayload,
}

impl ValidationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "not_authorized",
            Self::NotConnected => "not_connected",
            Self::UnknownNetwork => "unknown_network",
            Self::NetworkUnreachable => "network_unreachable",
            Self::InvalidAddress => "invalid_address",
            Self::InvalidPayload => "invalid_payload",
        }
    }
}

/// 单条可恢复的验证失败
/// 统一为 类别 + 可读消息 + 可选字段名，各家族呈现格式一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, thiserror::Error)]
#[error("{}: {}", .kind.as_str(), .message)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
    pub field: Option<String>,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// 验证封套
/// 独占所有权地穿过整条验证管线，每一步可以补全字段或追加错误
#[derive(Debug, Clone)]
pub struct PayloadValidated<T> {
    /// 发起账户地址，允许为空直到某个步骤解析出来
    pub address: String,
    /// 链标识，验证期间可被改写
    pub network_key: String,
    pub family: ConfirmationFamily,
    pub payload: T,
    /// 只追加，不清除
    pub errors: Vec<ValidationError>,
    /// 某个步骤可将最终确认重定向到别的家族（例如错误确认）
    pub confirmation_override: Option<ConfirmationFamily>,
}

impl<T> PayloadValidated<T> {
    pub fn new(family: ConfirmationFamily, payload: T) -> Self {
        Self {
            address: String::new(),
            network_key: String::new(),
            family,
            payload,
            errors: Vec::new(),
            confirmation_override: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_network(mut self, network_key: impl Into<String>) -> Self {
        self.network_key = network_key.into();
        self
    }

    pub fn push_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// 没有收集到任何错误时调用方才进入确认环节
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn redirect_to(&mut self, family: ConfirmationFamily) {
        self.confirmation_override = Some(family);
    }

    /// 实际接收确认的家族
    pub fn effective_family(&self) -> ConfirmationFamily {
        self.confirmation_override.unwrap_or(self.family)
    }
}
