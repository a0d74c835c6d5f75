// Copyright Yuzu Contributors (https://github.com/yuzu-rs)
// SPDX-License-Identifier: Apache-2.0

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;

use parking_lot::Mutex;
use yuzu::prelude::*;
use yuzu::{BoxError, CallbackAccepter, ManualSignal};

#[derive(Clone, Debug, PartialEq)]
enum Evt {
    Start,
    Call(String),
    Error(String),
    End(EndState),
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<Evt>>>,
}

impl Recorder {
    fn sink(&self) -> CallbackAccepter<String> {
        let start = self.events.clone();
        let value = self.events.clone();
        let error = self.events.clone();
        let end = self.events.clone();
        CallbackAccepter::new()
            .on_start(move || start.lock().push(Evt::Start))
            .on_value(move |v: String| value.lock().push(Evt::Call(v)))
            .on_error(move |e: &BoxError| error.lock().push(Evt::Error(e.to_string())))
            .on_end(move |state| end.lock().push(Evt::End(state)))
    }

    fn events(&self) -> Vec<Evt> {
        self.events.lock().clone()
    }
}

/// Serves exactly one connection with a canned response and hands back the
/// raw bytes the client sent.
fn serve_once(response: &'static [u8]) -> (String, std::thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).unwrap();
            received.extend_from_slice(&chunk[..n]);
            if received.windows(4).any(|w| w == b"\r\n\r\n") || n == 0 {
                break;
            }
        }
        socket.write_all(response).unwrap();
        String::from_utf8_lossy(&received).into_owned()
    });
    (format!("http://{}", addr), handle)
}

fn data_service() -> ServiceDescriptor {
    ServiceDescriptor::new("Data").method(
        MethodDescriptor::new("fetch", HttpMethod::Get, "data/{id}.json")
            .param(ParamSpec::Path {
                name: "id".into(),
                encoded: false,
            })
            .param(ParamSpec::Field {
                name: "t".into(),
                encoded: false,
            }),
    )
}

fn client(base: String) -> Arc<Client> {
    Arc::new(
        Client::builder(base)
            .service(data_service())
            .build()
            .unwrap(),
    )
}

#[test]
fn get_through_pipeline_delivers_value_then_normal_end() {
    let (base, server) = serve_once(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\n\r\n{\"ok\":true}",
    );
    let recorder = Recorder::default();

    invoke_disposer::<String>(
        client(base),
        "Data",
        "fetch",
        vec!["101".into(), 1000.into()],
    )
    .subscribe(recorder.sink());

    assert_eq!(
        recorder.events(),
        vec![
            Evt::Start,
            Evt::Call("{\"ok\":true}".to_string()),
            Evt::End(EndState::Normal),
        ]
    );
    let received = server.join().unwrap();
    assert!(received.starts_with("GET /data/101.json?t=1000 HTTP/1.1\r\n"));
}

#[test]
fn http_error_arrives_as_on_error_then_normal_end() {
    let (base, server) = serve_once(b"HTTP/1.1 500 Oops\r\nContent-Length: 0\r\n\r\n");
    let recorder = Recorder::default();

    invoke_disposer::<String>(
        client(base),
        "Data",
        "fetch",
        vec!["101".into(), ArgValue::Null],
    )
    .subscribe(recorder.sink());

    let events = recorder.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], Evt::Start);
    assert!(matches!(&events[1], Evt::Error(m) if m.contains("500")));
    assert_eq!(events[2], Evt::End(EndState::Normal));
    server.join().unwrap();
}

#[test]
fn cancelled_pipeline_only_reports_cancelled_end() {
    // No server: the leaf must never run.
    let client = Arc::new(
        Client::builder("http://127.0.0.1:9")
            .service(data_service())
            .build()
            .unwrap(),
    );
    let recorder = Recorder::default();
    let signal = ManualSignal::new();

    let pipeline = invoke_disposer::<String>(
        client,
        "Data",
        "fetch",
        vec!["101".into(), ArgValue::Null],
    )
    .bind_cancel(&signal);
    signal.fire();
    pipeline.subscribe(recorder.sink());

    assert_eq!(recorder.events(), vec![Evt::End(EndState::Cancelled)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn scheduled_pipeline_preserves_event_order() {
    let (base, server) = serve_once(
        b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone",
    );
    let events = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = std::sync::mpsc::channel();

    let handle = tokio::runtime::Handle::current();
    let worker = Scheduler::worker(&handle);
    let callback = Scheduler::worker(&handle);

    let sink = {
        let start = events.clone();
        let value = events.clone();
        let end = events.clone();
        CallbackAccepter::new()
            .on_start(move || start.lock().push(Evt::Start))
            .on_value(move |v: String| value.lock().push(Evt::Call(v)))
            .on_end(move |state| {
                end.lock().push(Evt::End(state));
                let _ = done_tx.send(());
            })
    };

    invoke_disposer::<String>(
        client(base),
        "Data",
        "fetch",
        vec!["101".into(), ArgValue::Null],
    )
    .schedule_on(worker, callback)
    .subscribe(sink);

    tokio::task::spawn_blocking(move || {
        done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
    })
    .await
    .unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            Evt::Start,
            Evt::Call("done".to_string()),
            Evt::End(EndState::Normal),
        ]
    );
    server.join().unwrap();
}
