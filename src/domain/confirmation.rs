//! 确认请求领域模型
//! 按链生态分组的待确认队列数据结构

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::domain::validation::ValidationError;

/// 确认家族：每个链生态一条独立队列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationFamily {
    Evm,
    Substrate,
    Cardano,
    Bitcoin,
    /// 通用家族：连接授权、错误确认等与具体链无关的请求
    Generic,
}

impl ConfirmationFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::Substrate => "substrate",
            Self::Cardano => "cardano",
            Self::Bitcoin => "bitcoin",
            Self::Generic => "generic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "evm" => Some(Self::Evm),
            "substrate" => Some(Self::Substrate),
            "cardano" => Some(Self::Cardano),
            "bitcoin" => Some(Self::Bitcoin),
            "generic" => Some(Self::Generic),
            _ => None,
        }
    }

    pub fn all() -> [ConfirmationFamily; 5] {
        [
            Self::Evm,
            Self::Substrate,
            Self::Cardano,
            Self::Bitcoin,
            Self::Generic,
        ]
    }
}

/// 确认载荷
/// 每个家族一组变体，完成回调处按变体穷举匹配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "data")]
pub enum ConfirmationPayload {
    EvmSignMessage {
        address: String,
        network_key: String,
        message: String,
    },
    EvmSendTransaction {
        from: String,
        to: String,
        value: String,
        network_key: String,
        data: Option<String>,
    },
    SubstrateSignExtrinsic {
        address: String,
        network_key: String,
        call_data: String,
    },
    CardanoSignData {
        address: String,
        network_key: String,
        payload_hex: String,
    },
    BitcoinSignPsbt {
        address: String,
        network_key: String,
        psbt: String,
    },
    /// 连接授权（Generic 家族）
    AuthorizeConnection {
        origin: String,
        accounts: Vec<String>,
    },
    /// 错误确认（Generic 家族）：用户必须知晓的失败，例如网络不可达
    ErrorAcknowledge {
        network_key: String,
        message: String,
    },
}

impl ConfirmationPayload {
    /// 载荷归属的确认家族
    pub fn family(&self) -> ConfirmationFamily {
        match self {
            Self::EvmSignMessage { .. } | Self::EvmSendTransaction { .. } => {
                ConfirmationFamily::Evm
            }
            Self::SubstrateSignExtrinsic { .. } => ConfirmationFamily::Substrate,
            Self::CardanoSignData { .. } => ConfirmationFamily::Cardano,
            Self::BitcoinSignPsbt { .. } => ConfirmationFamily::Bitcoin,
            Self::AuthorizeConnection { .. } | Self::ErrorAcknowledge { .. } => {
                ConfirmationFamily::Generic
            }
        }
    }

    /// 载荷指纹：规范化JSON序列化后取SHA-256
    /// 同一 (url, 指纹) 在队列中只允许一个存活条目
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        hex::encode(digest)
    }
}

/// 签名消息请求的入站载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SignMessagePayload {
    pub address: String,
    pub network_key: String,
    /// 明文或0x前缀十六进制
    pub message: String,
}

/// 发送交易请求的入站载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SendTransactionPayload {
    pub from: String,
    pub to: String,
    /// 十进制数量字符串
    pub value: String,
    pub network_key: String,
    pub data: Option<String>,
}

/// 家族相关的确认选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfirmationOptions {
    /// 批准时是否必须携带密码
    #[serde(default)]
    pub requires_password: bool,
    pub address: Option<String>,
    pub network_key: Option<String>,
}

/// 队列中的一条待确认请求
/// 生命周期：入队 -> 等待用户 -> 批准/拒绝后移除，不支持原地修改
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfirmationRequest {
    pub id: String,
    /// 发起请求的应用来源
    pub url: String,
    pub payload: ConfirmationPayload,
    pub payload_fingerprint: String,
    pub options: ConfirmationOptions,
    /// 验证管线收集到的错误，交给UI渲染
    #[serde(default)]
    pub errors: Vec<ValidationError>,
    pub created_at: DateTime<Utc>,
}

/// 用户（或自动策略）给出的确认结果
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ConfirmationResult {
    pub id: String,
    pub is_approved: bool,
    pub password: Option<String>,
    pub signature: Option<String>,
    /// 拒绝原因（可选）
    pub reason: Option<String>,
}

/// 队列快照：{家族 -> {id -> 请求}}，通过watch通道发布给UI侧
pub type QueueSnapshot = HashMap<ConfirmationFamily, HashMap<String, ConfirmationRequest>>;
