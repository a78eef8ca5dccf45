//! 验证管线
//! 按调用方给定的顺序串行执行验证步骤，错误累积在封套上
//!
//! 管线本身永不失败：某一步失败不会阻止后续步骤执行，
//! 一次请求可以同时带回"未授权"和"载荷畸形"两类错误

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::RwLock;

use crate::domain::{
    confirmation::{ConfirmationFamily, SendTransactionPayload, SignMessagePayload},
    validation::{PayloadValidated, ValidationError, ValidationErrorKind},
};

/// 单条消息上限，超出的签名请求直接判为畸形
const MAX_MESSAGE_BYTES: usize = 64 * 1024;

static EVM_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());
static SUBSTRATE_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{46,48}$").unwrap());
static CARDANO_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^addr1[0-9a-z]{20,}$").unwrap());
static BITCOIN_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(bc1[0-9a-z]{8,87}|[13][1-9A-HJ-NP-Za-km-z]{25,34})$").unwrap());
static HEX_DATA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x([0-9a-fA-F]{2})*$").unwrap());

/// 地址形状是否符合家族惯例
pub fn address_is_valid(family: ConfirmationFamily, address: &str) -> bool {
    match family {
        ConfirmationFamily::Evm => EVM_ADDRESS_RE.is_match(address),
        ConfirmationFamily::Substrate => SUBSTRATE_ADDRESS_RE.is_match(address),
        ConfirmationFamily::Cardano => CARDANO_ADDRESS_RE.is_match(address),
        ConfirmationFamily::Bitcoin => BITCOIN_ADDRESS_RE.is_match(address),
        // Generic 家族的请求不绑定链地址
        ConfirmationFamily::Generic => true,
    }
}

// ============ 验证上下文 ============

/// 已登记的链网络
#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub key: String,
    pub family: ConfirmationFamily,
    pub active: bool,
}

/// 验证步骤读取的共享状态：来源授权表与网络注册表
pub struct ValidationContext {
    authorized_origins: RwLock<HashMap<String, HashSet<String>>>,
    networks: RwLock<HashMap<String, NetworkInfo>>,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationContext {
    pub fn new() -> Self {
        Self {
            authorized_origins: RwLock::new(HashMap::new()),
            networks: RwLock::new(HashMap::new()),
        }
    }

    /// 预置主流网络的上下文
    pub fn with_default_networks() -> Self {
        let defaults = [
            ("ethereum", ConfirmationFamily::Evm),
            ("polkadot", ConfirmationFamily::Substrate),
            ("cardano", ConfirmationFamily::Cardano),
            ("bitcoin", ConfirmationFamily::Bitcoin),
        ];
        let mut networks = HashMap::new();
        for (key, family) in defaults {
            networks.insert(
                key.to_string(),
                NetworkInfo {
                    key: key.to_string(),
                    family,
                    active: true,
                },
            );
        }
        Self {
            authorized_origins: RwLock::new(HashMap::new()),
            networks: RwLock::new(networks),
        }
    }

    pub async fn authorize_origin(&self, origin: impl Into<String>, accounts: Vec<String>) {
        self.authorized_origins
            .write()
            .await
            .insert(origin.into(), accounts.into_iter().collect());
    }

    pub async fn revoke_origin(&self, origin: &str) {
        self.authorized_origins.write().await.remove(origin);
    }

    pub async fn is_authorized(&self, origin: &str) -> bool {
        self.authorized_origins.read().await.contains_key(origin)
    }

    pub async fn upsert_network(&self, info: NetworkInfo) {
        self.networks.write().await.insert(info.key.clone(), info);
    }

    pub async fn set_network_active(&self, key: &str, active: bool) {
        if let Some(info) = self.networks.write().await.get_mut(key) {
            info.active = active;
        }
    }

    pub async fn network(&self, key: &str) -> Option<NetworkInfo> {
        self.networks.read().await.get(key).cloned()
    }
}

// ============ 验证步骤 ============

/// 无状态的验证能力，组合成每种请求各自的步骤序列
#[async_trait]
pub trait ValidationStep<T: Send + 'static>: Send + Sync {
    fn name(&self) -> &'static str;

    /// 接收上一步产出的封套，返回推进后的封套
    /// 失败通过追加错误表达，不允许中断管线
    async fn run(
        &self,
        ctx: &ValidationContext,
        url: &str,
        payload: PayloadValidated<T>,
        topic: Option<&str>,
    ) -> PayloadValidated<T>;
}

/// 执行一条验证管线
/// 步骤严格按给定顺序串行执行，后面的步骤依赖前面补全的字段
pub async fn validate<T: Send + 'static>(
    ctx: &ValidationContext,
    url: &str,
    initial: PayloadValidated<T>,
    steps: &[Arc<dyn ValidationStep<T>>],
    topic: Option<&str>,
) -> PayloadValidated<T> {
    let mut envelope = initial;
    for step in steps {
        tracing::debug!(step = step.name(), url = url, "running validation step");
        envelope = step.run(ctx, url, envelope, topic).await;
    }
    if !envelope.is_clean() {
        tracing::debug!(
            url = url,
            errors = envelope.errors.len(),
            "validation finished with errors"
        );
    }
    envelope
}

/// 来源授权检查：请求方必须已经建立过连接授权
pub struct OriginAuthCheck;

#[async_trait]
impl<T: Send + 'static> ValidationStep<T> for OriginAuthCheck {
    fn name(&self) -> &'static str {
        "origin_auth_check"
    }

    async fn run(
        &self,
        ctx: &ValidationContext,
        url: &str,
        mut payload: PayloadValidated<T>,
        _topic: Option<&str>,
    ) -> PayloadValidated<T> {
        if !ctx.is_authorized(url).await {
            payload.push_error(ValidationError::new(
                ValidationErrorKind::NotAuthorized,
                format!("origin is not authorized: {}", url),
            ));
        }
        payload
    }
}

/// 网络解析：规范化链标识，校验注册表状态
/// 网络不可达时把确认重定向到通用家族的错误确认
pub struct NetworkResolve;

#[async_trait]
impl<T: Send + 'static> ValidationStep<T> for NetworkResolve {
    fn name(&self) -> &'static str {
        "network_resolve"
    }

    async fn run(
        &self,
        ctx: &ValidationContext,
        _url: &str,
        mut payload: PayloadValidated<T>,
        _topic: Option<&str>,
    ) -> PayloadValidated<T> {
        let key = payload.network_key.trim().to_lowercase();
        if key.is_empty() {
            payload.push_error(
                ValidationError::new(ValidationErrorKind::InvalidPayload, "network key missing")
                    .with_field("network_key"),
            );
            return payload;
        }
        payload.network_key = key.clone();

        match ctx.network(&key).await {
            None => {
                payload.push_error(ValidationError::new(
                    ValidationErrorKind::UnknownNetwork,
                    format!("network is not registered: {}", key),
                ));
            }
            Some(info) if info.family != payload.family => {
                payload.push_error(ValidationError::new(
                    ValidationErrorKind::NotConnected,
                    format!("network {} does not belong to this chain family", key),
                ));
            }
            Some(info) if !info.active => {
                payload.push_error(ValidationError::new(
                    ValidationErrorKind::NetworkUnreachable,
                    format!("network is unreachable: {}", key),
                ));
                // 失败本身需要用户知晓
                payload.redirect_to(ConfirmationFamily::Generic);
            }
            Some(_) => {}
        }
        payload
    }
}

/// 地址形状检查
pub struct AddressShapeCheck;

#[async_trait]
impl<T: Send + 'static> ValidationStep<T> for AddressShapeCheck {
    fn name(&self) -> &'static str {
        "address_shape_check"
    }

    async fn run(
        &self,
        _ctx: &ValidationContext,
        _url: &str,
        mut payload: PayloadValidated<T>,
        _topic: Option<&str>,
    ) -> PayloadValidated<T> {
        if payload.address.is_empty() {
            payload.push_error(
                ValidationError::new(ValidationErrorKind::InvalidAddress, "address missing")
                    .with_field("address"),
            );
        } else if !address_is_valid(payload.family, &payload.address) {
            payload.push_error(
                ValidationError::new(
                    ValidationErrorKind::InvalidAddress,
                    format!(
                        "address does not match {} conventions",
                        payload.family.as_str()
                    ),
                )
                .with_field("address"),
            );
        }
        payload
    }
}

/// 签名消息形状检查
pub struct MessageShapeCheck;

#[async_trait]
impl ValidationStep<SignMessagePayload> for MessageShapeCheck {
    fn name(&self) -> &'static str {
        "message_shape_check"
    }

    async fn run(
        &self,
        _ctx: &ValidationContext,
        _url: &str,
        mut payload: PayloadValidated<SignMessagePayload>,
        _topic: Option<&str>,
    ) -> PayloadValidated<SignMessagePayload> {
        let message = payload.payload.message.clone();
        if message.is_empty() {
            payload.push_error(
                ValidationError::new(ValidationErrorKind::InvalidPayload, "message is empty")
                    .with_field("message"),
            );
        } else if message.len() > MAX_MESSAGE_BYTES {
            payload.push_error(
                ValidationError::new(
                    ValidationErrorKind::InvalidPayload,
                    format!("message exceeds {} bytes", MAX_MESSAGE_BYTES),
                )
                .with_field("message"),
            );
        } else if let Some(hex_part) = message.strip_prefix("0x") {
            if hex::decode(hex_part).is_err() {
                payload.push_error(
                    ValidationError::new(
                        ValidationErrorKind::InvalidPayload,
                        "message is not valid hex",
                    )
                    .with_field("message"),
                );
            }
        }
        payload
    }
}

/// 交易形状检查
pub struct TransactionShapeCheck;

#[async_trait]
impl ValidationStep<SendTransactionPayload> for TransactionShapeCheck {
    fn name(&self) -> &'static str {
        "transaction_shape_check"
    }

    async fn run(
        &self,
        _ctx: &ValidationContext,
        _url: &str,
        mut payload: PayloadValidated<SendTransactionPayload>,
        _topic: Option<&str>,
    ) -> PayloadValidated<SendTransactionPayload> {
        let tx = payload.payload.clone();

        if !address_is_valid(payload.family, &tx.to) {
            payload.push_error(
                ValidationError::new(ValidationErrorKind::InvalidAddress, "invalid recipient")
                    .with_field("to"),
            );
        }

        match tx.value.trim().parse::<f64>() {
            Ok(v) if v > 0.0 && v.is_finite() => {}
            _ => {
                payload.push_error(
                    ValidationError::new(
                        ValidationErrorKind::InvalidPayload,
                        "value must be a positive finite number",
                    )
                    .with_field("value"),
                );
            }
        }

        if let Some(data) = &tx.data {
            if !HEX_DATA_RE.is_match(data) {
                payload.push_error(
                    ValidationError::new(
                        ValidationErrorKind::InvalidPayload,
                        "calldata must be 0x-prefixed hex",
                    )
                    .with_field("data"),
                );
            }
        }
        payload
    }
}

// ============ 预置步骤序列 ============

/// "签名消息"请求的标准步骤序列
pub fn sign_message_steps() -> Vec<Arc<dyn ValidationStep<SignMessagePayload>>> {
    vec![
        Arc::new(OriginAuthCheck),
        Arc::new(NetworkResolve),
        Arc::new(AddressShapeCheck),
        Arc::new(MessageShapeCheck),
    ]
}

/// "发送交易"请求的标准步骤序列
pub fn send_transaction_steps() -> Vec<Arc<dyn ValidationStep<SendTransactionPayload>>> {
    vec![
        Arc::new(OriginAuthCheck),
        Arc::new(NetworkResolve),
        Arc::new(AddressShapeCheck),
        Arc::new(TransactionShapeCheck),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    async fn ctx_with_networks() -> ValidationContext {
        let ctx = ValidationContext::new();
        for (key, family) in [
            ("ethereum", ConfirmationFamily::Evm),
            ("polkadot", ConfirmationFamily::Substrate),
            ("bitcoin", ConfirmationFamily::Bitcoin),
        ] {
            ctx.upsert_network(NetworkInfo {
                key: key.into(),
                family,
                active: true,
            })
            .await;
        }
        ctx
    }

    fn evm_sign_envelope(message: &str) -> PayloadValidated<SignMessagePayload> {
        let payload = SignMessagePayload {
            address: "0x00000000000000000000000000000000000000aa".into(),
            network_key: "ethereum".into(),
            message: message.into(),
        };
        PayloadValidated::new(ConfirmationFamily::Evm, payload.clone())
            .with_address(payload.address)
            .with_network(payload.network_key)
    }

    /// 记录自身执行序号并追加一条错误的测试步骤
    struct FailingStep {
        index: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl ValidationStep<SignMessagePayload> for FailingStep {
        fn name(&self) -> &'static str {
            "failing_step"
        }

        async fn run(
            &self,
            _ctx: &ValidationContext,
            _url: &str,
            mut payload: PayloadValidated<SignMessagePayload>,
            _topic: Option<&str>,
        ) -> PayloadValidated<SignMessagePayload> {
            self.log.lock().unwrap().push(self.index);
            payload.push_error(ValidationError::new(
                ValidationErrorKind::InvalidPayload,
                format!("step {} failed", self.index),
            ));
            payload
        }
    }

    #[tokio::test]
    async fn test_every_step_runs_in_order_despite_errors() {
        let ctx = ValidationContext::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let steps: Vec<Arc<dyn ValidationStep<SignMessagePayload>>> = (0..4)
            .map(|index| {
                Arc::new(FailingStep {
                    index,
                    log: log.clone(),
                }) as Arc<dyn ValidationStep<SignMessagePayload>>
            })
            .collect();

        let out = validate(
            &ctx,
            "https://dapp.example",
            evm_sign_envelope("hello"),
            &steps,
            None,
        )
        .await;

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(out.errors.len(), 4);
    }

    #[tokio::test]
    async fn test_errors_from_multiple_steps_accumulate() {
        // 未授权来源 + 空消息，两类错误一次收齐
        let ctx = ctx_with_networks().await;
        let out = validate(
            &ctx,
            "https://unknown.example",
            evm_sign_envelope(""),
            &sign_message_steps(),
            None,
        )
        .await;

        let kinds: Vec<_> = out.errors.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&ValidationErrorKind::NotAuthorized));
        assert!(kinds.contains(&ValidationErrorKind::InvalidPayload));
    }

    #[tokio::test]
    async fn test_clean_request_passes() {
        let ctx = ctx_with_networks().await;
        ctx.authorize_origin("https://dapp.example", vec!["0xaa".into()])
            .await;

        let out = validate(
            &ctx,
            "https://dapp.example",
            evm_sign_envelope("hello world"),
            &sign_message_steps(),
            None,
        )
        .await;
        assert!(out.is_clean(), "unexpected errors: {:?}", out.errors);
        assert_eq!(out.effective_family(), ConfirmationFamily::Evm);
    }

    #[tokio::test]
    async fn test_unreachable_network_redirects_confirmation() {
        let ctx = ctx_with_networks().await;
        ctx.authorize_origin("https://dapp.example", vec![]).await;
        ctx.set_network_active("ethereum", false).await;

        let out = validate(
            &ctx,
            "https://dapp.example",
            evm_sign_envelope("hello"),
            &sign_message_steps(),
            None,
        )
        .await;

        assert!(out
            .errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::NetworkUnreachable));
        assert_eq!(out.effective_family(), ConfirmationFamily::Generic);
    }

    #[tokio::test]
    async fn test_network_key_is_normalized() {
        let ctx = ctx_with_networks().await;
        ctx.authorize_origin("https://dapp.example", vec![]).await;

        let envelope = evm_sign_envelope("hello").with_network(" Ethereum ");
        let out = validate(
            &ctx,
            "https://dapp.example",
            envelope,
            &sign_message_steps(),
            None,
        )
        .await;
        assert_eq!(out.network_key, "ethereum");
    }

    #[tokio::test]
    async fn test_transaction_shape_errors() {
        let ctx = ctx_with_networks().await;
        ctx.authorize_origin("https://dapp.example", vec![]).await;

        let payload = SendTransactionPayload {
            from: "0x00000000000000000000000000000000000000aa".into(),
            to: "not-an-address".into(),
            value: "-3".into(),
            network_key: "ethereum".into(),
            data: Some("zz".into()),
        };
        let envelope = PayloadValidated::new(ConfirmationFamily::Evm, payload.clone())
            .with_address(payload.from)
            .with_network(payload.network_key);

        let out = validate(
            &ctx,
            "https://dapp.example",
            envelope,
            &send_transaction_steps(),
            None,
        )
        .await;

        let fields: Vec<_> = out.errors.iter().filter_map(|e| e.field.clone()).collect();
        assert!(fields.contains(&"to".to_string()));
        assert!(fields.contains(&"value".to_string()));
        assert!(fields.contains(&"data".to_string()));
    }

    #[test]
    fn test_address_shapes_per_family() {
        assert!(address_is_valid(
            ConfirmationFamily::Evm,
            "0x00000000000000000000000000000000000000aa"
        ));
        assert!(!address_is_valid(ConfirmationFamily::Evm, "0x1234"));
        assert!(address_is_valid(
            ConfirmationFamily::Substrate,
            "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"
        ));
        assert!(address_is_valid(
            ConfirmationFamily::Bitcoin,
            "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"
        ));
        assert!(!address_is_valid(ConfirmationFamily::Bitcoin, "0xabc"));
    }
}
