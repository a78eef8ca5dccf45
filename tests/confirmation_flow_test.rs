//! 确认流程集成测试
//! 覆盖 验证管线 -> 确认队列 -> 结算 的完整链路

mod common;

use std::collections::HashMap;

use walletcore::{
    domain::confirmation::{
        ConfirmationFamily, ConfirmationOptions, ConfirmationPayload, ConfirmationResult,
        SignMessagePayload,
    },
    domain::external_request::{ExternalRequestStatus, ExternalRequestUpdate},
    domain::validation::PayloadValidated,
    error::{AppError, AppErrorCode},
    service::confirmation_broker::ResultValidator,
    service::validation_pipeline::{self, validate},
};

fn evm_payload(message: &str) -> ConfirmationPayload {
    ConfirmationPayload::EvmSignMessage {
        address: "0x00000000000000000000000000000000000000aa".into(),
        network_key: "ethereum".into(),
        message: message.into(),
    }
}

fn password_validator() -> ResultValidator {
    Box::new(|result: &ConfirmationResult| {
        if result.is_approved && result.password.is_none() {
            return Err(AppError::bad_request("password required"));
        }
        Ok(())
    })
}

/// 完整场景：入队 -> 去重 -> 带校验器的批准 -> 队列清空
#[tokio::test]
async fn test_full_confirmation_scenario() {
    let (state, surface, badge) = common::create_test_app_state();
    let broker = &state.broker;

    // 第一次入队成功，队列1条
    let outcome = broker
        .request(
            ConfirmationFamily::Evm,
            "r1",
            "https://dapp.example",
            evm_payload("approve listing"),
            ConfirmationOptions {
                requires_password: true,
                ..Default::default()
            },
            vec![],
            Some(password_validator()),
        )
        .unwrap();
    assert_eq!(broker.queues()[&ConfirmationFamily::Evm].len(), 1);

    // 同源同指纹的第二次入队：DuplicateRequest，队列仍1条
    let duplicate = broker.request(
        ConfirmationFamily::Evm,
        "r2",
        "https://dapp.example",
        evm_payload("approve listing"),
        ConfirmationOptions::default(),
        vec![],
        None,
    );
    assert_eq!(
        duplicate.unwrap_err().code,
        AppErrorCode::DuplicateRequest
    );
    assert_eq!(broker.queues()[&ConfirmationFamily::Evm].len(), 1);

    // 带密码的批准通过校验器，结算为批准
    let mut results = HashMap::new();
    results.insert(
        ConfirmationFamily::Evm,
        ConfirmationResult {
            id: "r1".into(),
            is_approved: true,
            password: Some("pw".into()),
            signature: Some("0xsigned".into()),
            reason: None,
        },
    );
    broker.complete(results).unwrap();

    let settled = outcome.wait().await.unwrap();
    assert!(settled.is_approved);
    assert_eq!(settled.signature.as_deref(), Some("0xsigned"));

    // 队列与聚合计数清零
    assert!(broker.queues()[&ConfirmationFamily::Evm].is_empty());
    assert_eq!(broker.pending_count(), 0);

    // 界面开过一次并在清空后关闭，角标最终清空
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    assert_eq!(surface.opens.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(surface.closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(badge.last().as_deref(), Some(""));
}

/// 验证管线到确认队列的衔接：干净请求入队，错误请求回绝
#[tokio::test]
async fn test_pipeline_feeds_broker() {
    let (state, _surface, _badge) = common::create_test_app_state();

    state
        .validation
        .authorize_origin("https://dapp.example", vec!["0xaa".into()])
        .await;

    let payload = SignMessagePayload {
        address: "0x00000000000000000000000000000000000000aa".into(),
        network_key: "ethereum".into(),
        message: "hello".into(),
    };
    let envelope = PayloadValidated::new(ConfirmationFamily::Evm, payload.clone())
        .with_address(payload.address.clone())
        .with_network(payload.network_key.clone());

    let validated = validate(
        &state.validation,
        "https://dapp.example",
        envelope,
        &validation_pipeline::sign_message_steps(),
        None,
    )
    .await;
    assert!(validated.is_clean());

    let outcome = state
        .broker
        .request(
            validated.effective_family(),
            "msg-1",
            "https://dapp.example",
            evm_payload("hello"),
            ConfirmationOptions::default(),
            validated.errors.clone(),
            None,
        )
        .unwrap();

    let mut results = HashMap::new();
    results.insert(
        ConfirmationFamily::Evm,
        ConfirmationResult {
            id: "msg-1".into(),
            is_approved: false,
            reason: Some("user closed the dialog".into()),
            ..Default::default()
        },
    );
    state.broker.complete(results).unwrap();

    let err = outcome.wait().await.unwrap_err();
    assert_eq!(err.code, AppErrorCode::UserRejected);
    assert!(err.message.contains("closed the dialog"));
}

/// 验证错误随条目发布给UI
#[tokio::test]
async fn test_errors_attached_to_published_entry() {
    let (state, _surface, _badge) = common::create_test_app_state();

    // 未授权来源直接走管线，错误被收集而不是中断
    let payload = SignMessagePayload {
        address: "0x00000000000000000000000000000000000000aa".into(),
        network_key: "ethereum".into(),
        message: "hello".into(),
    };
    let envelope = PayloadValidated::new(ConfirmationFamily::Evm, payload.clone())
        .with_address(payload.address.clone())
        .with_network(payload.network_key.clone());
    let validated = validate(
        &state.validation,
        "https://rogue.example",
        envelope,
        &validation_pipeline::sign_message_steps(),
        None,
    )
    .await;
    assert!(!validated.is_clean());

    let mut rx = state.broker.subscribe_queues();
    state
        .broker
        .request(
            ConfirmationFamily::Evm,
            "err-1",
            "https://rogue.example",
            evm_payload("hello"),
            ConfirmationOptions::default(),
            validated.errors.clone(),
            None,
        )
        .unwrap();

    rx.changed().await.unwrap();
    let snapshot = rx.borrow().clone();
    let entry = &snapshot[&ConfirmationFamily::Evm]["err-1"];
    assert!(!entry.errors.is_empty());
}

/// 外部请求全流程：登记 -> 推进 -> 回报 -> 清扫
#[tokio::test]
async fn test_external_request_lifecycle() {
    let (state, _surface, _badge) = common::create_test_app_state();
    let registry = &state.external_requests;

    let outcome = registry.create("qr-sign-1").unwrap();
    assert_eq!(
        registry.get("qr-sign-1").unwrap().status,
        ExternalRequestStatus::Pending
    );

    // 外部流程推进（无实际状态变化的部分更新也合法）
    registry.update("qr-sign-1", ExternalRequestUpdate { status: None });

    // 扫码完成回报签名
    registry
        .settle(
            "qr-sign-1",
            Ok(serde_json::json!({"signature": "0xqr-signed"})),
        )
        .unwrap();
    let value = outcome.wait().await.unwrap();
    assert_eq!(value["signature"], "0xqr-signed");

    // 终态条目在下一次清扫消失
    let removed = registry.sweep(chrono::Utc::now(), chrono::Duration::seconds(900));
    assert_eq!(removed, 1);
    assert!(registry.get("qr-sign-1").is_none());
}

/// 不同家族的队列互不干扰
#[tokio::test]
async fn test_families_are_isolated() {
    let (state, _surface, _badge) = common::create_test_app_state();
    let broker = &state.broker;

    let _evm = broker
        .request(
            ConfirmationFamily::Evm,
            "evm-1",
            "https://dapp.example",
            evm_payload("hello"),
            ConfirmationOptions::default(),
            vec![],
            None,
        )
        .unwrap();

    // 同url同消息、但家族不同的载荷拥有不同指纹，允许共存
    let _btc = broker
        .request(
            ConfirmationFamily::Bitcoin,
            "btc-1",
            "https://dapp.example",
            ConfirmationPayload::BitcoinSignPsbt {
                address: "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq".into(),
                network_key: "bitcoin".into(),
                psbt: "hello".into(),
            },
            ConfirmationOptions::default(),
            vec![],
            None,
        )
        .unwrap();

    assert_eq!(broker.pending_count(), 2);
    assert_eq!(broker.queues()[&ConfirmationFamily::Evm].len(), 1);
    assert_eq!(broker.queues()[&ConfirmationFamily::Bitcoin].len(), 1);

    broker.cancel("evm-1").unwrap();
    assert_eq!(broker.pending_count(), 1);
    assert_eq!(broker.queues()[&ConfirmationFamily::Bitcoin].len(), 1);
}
