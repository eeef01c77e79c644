use std::{io::ErrorKind, path::PathBuf, time::Duration};

use clap::Parser;
use rama::{
    Layer as _, Service,
    error::BoxError,
    http::{Request, Response, client::EasyHttpWebClient},
    layer::TimeoutLayer,
    net::address::SocketAddress,
    rt::Executor,
};
use tokio::sync::oneshot;

use crate::Args;

/// A receiver process running on its own thread and runtime.
pub(super) struct ReceiverApp {
    pub data_dir: PathBuf,
    pub receiver_addr: SocketAddress,
    pub metrics_addr: SocketAddress,
    done_rx: oneshot::Receiver<Result<(), BoxError>>,
}

impl ReceiverApp {
    /// Wait for the receiver to exit by itself.
    pub async fn join(self, timeout: Duration) -> Result<(), BoxError> {
        tokio::time::timeout(timeout, self.done_rx)
            .await
            .map_err(|_| BoxError::from("receiver did not exit in time"))?
            .map_err(|_| BoxError::from("receiver thread dropped its result"))?
    }
}

pub(super) async fn spawn_receiver(extra_args: &[&str]) -> ReceiverApp {
    let data_dir = crate::test::tmp_dir::try_new("eventing_thpt_e2e").unwrap();
    eprintln!("eventing_thpt_e2e all data stored under: {data_dir:?}");

    let data_dir_str = data_dir.display().to_string();
    let mut argv: Vec<&str> = vec![
        eventing_thpt_lib::utils::env::project_name(),
        "--data",
        &data_dir_str,
        "--metrics",
        "127.0.0.1:0",
        "--graceful",
        "0.42",
        "receive",
        "--bind",
        "127.0.0.1:0",
    ];
    argv.extend(extra_args);

    let args = Args::try_parse_from(argv).unwrap();
    let (done_tx, done_rx) = oneshot::channel();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let result = rt.block_on(crate::run_with_args(std::future::pending::<()>(), args));
        let _ = done_tx.send(result);
    });

    let (receiver_addr, metrics_addr) = tokio::try_join!(
        tokio::time::timeout(
            Duration::from_secs(30),
            read_file_or_wait(data_dir.join("receiver.addr.txt"))
        ),
        tokio::time::timeout(
            Duration::from_secs(30),
            read_file_or_wait(data_dir.join("receiver.metrics.addr.txt"))
        ),
    )
    .unwrap();

    assert!(receiver_addr.ip_addr.is_loopback());
    assert_ne!(receiver_addr, metrics_addr);

    ReceiverApp {
        data_dir,
        receiver_addr,
        metrics_addr,
        done_rx,
    }
}

/// Run the sender to completion on the current runtime.
pub(super) async fn run_sender(
    data_dir: &std::path::Path,
    extra_args: &[&str],
) -> Result<(), BoxError> {
    let data_dir_str = data_dir.display().to_string();
    let mut argv: Vec<&str> = vec![
        eventing_thpt_lib::utils::env::project_name(),
        "--data",
        &data_dir_str,
        "--metrics",
        "127.0.0.1:0",
        "--graceful",
        "0.42",
        "send",
    ];
    argv.extend(extra_args);

    let args = Args::try_parse_from(argv).unwrap();
    crate::run_with_args(std::future::pending::<()>(), args).await
}

pub(super) fn client() -> impl Service<Request, Output = Response, Error = BoxError> {
    let inner = EasyHttpWebClient::connector_builder()
        .with_default_transport_connector()
        .without_tls_proxy_support()
        .without_proxy_support()
        .with_tls_support_using_boringssl(None)
        .with_default_http_connector(Executor::default())
        .try_with_default_connection_pool()
        .expect("create connection pool for e2e web client")
        .build_client();

    TimeoutLayer::new(Duration::from_secs(30)).into_layer(inner)
}

async fn read_file_or_wait(path: PathBuf) -> SocketAddress {
    loop {
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => {
                let s = s.trim();
                if s.is_empty() {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
                match s.parse() {
                    Ok(addr) => return addr,
                    Err(err) => {
                        eprintln!("unexpected error parsing socket addr (content={s:?}): {err}");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
}
