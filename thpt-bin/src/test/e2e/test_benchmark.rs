use std::time::Duration;

use rama::http::{BodyExtractExt as _, StatusCode, service::client::HttpClientExt as _};

use super::runtime;

fn metric_value(text: &str, name: &str) -> Option<u64> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| line.strip_prefix(name)?.trim().parse().ok())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sender_drives_receiver_to_termination() {
    let receiver =
        runtime::spawn_receiver(&["--max-throughput-expected", "1000", "--grace", "2s"]).await;

    let sink = format!("http://{}/", receiver.receiver_addr);
    runtime::run_sender(
        &receiver.data_dir,
        &[
            "--sink",
            &sink,
            "--pace",
            "50:2",
            "--workers",
            "4",
            "--warmup",
            "0s",
            "--phase-pause",
            "100ms",
            "--linger",
            "0s",
        ],
    )
    .await
    .unwrap();

    let resp = runtime::client()
        .get(format!("http://{}/metrics", receiver.metrics_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let text = resp.try_into_string().await.unwrap();

    // workload of a single phase plus one gc and one end signal
    let received = metric_value(&text, "received_total").unwrap();
    assert!((95..=102).contains(&received), "received: {received}");

    // the end signal shuts the receiver down once its grace passed
    receiver.join(Duration::from_secs(30)).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sender_rejects_invalid_pace() {
    let data_dir = crate::test::tmp_dir::try_new("eventing_thpt_e2e_invalid").unwrap();

    let err = runtime::run_sender(
        &data_dir,
        &["--sink", "http://127.0.0.1:1/", "--pace", "100,,200"],
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("empty phase token"), "err: {err}");
    // nothing was started
    assert!(!data_dir.join("sender.metrics.addr.txt").exists());
}
