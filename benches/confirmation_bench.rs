//! 性能基准测试
//! 载荷指纹计算与一次完整的请求/结算往返

use std::collections::HashMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use walletcore::domain::confirmation::{
    ConfirmationFamily, ConfirmationOptions, ConfirmationPayload, ConfirmationResult,
};
use walletcore::infrastructure::{LoggingBadge, LoggingSurface};
use walletcore::service::ConfirmationBroker;

fn bench_payload_fingerprint(c: &mut Criterion) {
    let payload = ConfirmationPayload::EvmSendTransaction {
        from: "0x00000000000000000000000000000000000000aa".into(),
        to: "0x00000000000000000000000000000000000000bb".into(),
        value: "1.5".into(),
        network_key: "ethereum".into(),
        data: Some("0xa9059cbb".into()),
    };

    c.bench_function("payload_fingerprint", |b| {
        b.iter(|| black_box(&payload).fingerprint())
    });
}

fn bench_request_complete_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("request_complete_cycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let broker =
                    ConfirmationBroker::new(Arc::new(LoggingSurface), Arc::new(LoggingBadge));
                let outcome = broker
                    .request(
                        ConfirmationFamily::Evm,
                        "bench-1",
                        "https://dapp.example",
                        ConfirmationPayload::EvmSignMessage {
                            address: "0x00000000000000000000000000000000000000aa".into(),
                            network_key: "ethereum".into(),
                            message: "bench".into(),
                        },
                        ConfirmationOptions::default(),
                        vec![],
                        None,
                    )
                    .unwrap();

                let mut results = HashMap::new();
                results.insert(
                    ConfirmationFamily::Evm,
                    ConfirmationResult {
                        id: "bench-1".into(),
                        is_approved: true,
                        signature: Some("0xsigned".into()),
                        password: None,
                        reason: None,
                    },
                );
                broker.complete(results).unwrap();
                black_box(outcome.wait().await.unwrap())
            })
        })
    });
}

criterion_group!(
    benches,
    bench_payload_fingerprint,
    bench_request_complete_cycle
);
criterion_main!(benches);
