use fileway_ul::progress::{NoopReporter, ProgressReporter};
use fileway_ul::relay::{Method, RelayRequest, RelayResponse, Transport, TransportError};
use fileway_ul::{Error, Payload, PayloadMeta, PollPolicy, TransferClient, TransferState};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::time::Duration;

type Reply = Result<RelayResponse, TransportError>;

/// Relay stand-in: replays canned replies in order and records every request
#[derive(Default)]
struct ScriptedRelay {
    replies: RefCell<VecDeque<Reply>>,
    requests: RefCell<Vec<RelayRequest>>,
}

impl ScriptedRelay {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<RelayRequest> {
        self.requests.borrow().clone()
    }

    fn uploads(&self) -> Vec<Vec<u8>> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == Method::Put)
            .map(|r| r.body)
            .collect()
    }
}

impl Transport for ScriptedRelay {
    fn send(&self, request: &RelayRequest) -> Result<RelayResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Failed("unexpected request".into())))
    }
}

fn ok(body: &str) -> Reply {
    Ok(RelayResponse {
        status: 200,
        body: body.as_bytes().to_vec(),
    })
}

fn status(code: u16, body: &str) -> Reply {
    Ok(RelayResponse {
        status: code,
        body: body.as_bytes().to_vec(),
    })
}

#[derive(Default)]
struct RecordingReporter {
    calls: RefCell<Vec<(usize, usize)>>,
    finished: Cell<usize>,
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, completed: usize, total: usize) {
        self.calls.borrow_mut().push((completed, total));
    }

    fn finish(&self) {
        self.finished.set(self.finished.get() + 1);
    }
}

fn fast_poll() -> PollPolicy {
    PollPolicy::bounded(Duration::ZERO, 50)
}

fn write_payload(dir: &std::path::Path, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join("payload.bin");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(bytes).unwrap();
    path
}

#[test]
fn ten_byte_file_follows_relay_plan() {
    let dir = tempfile::tempdir().unwrap();
    let data = b"0123456789";
    let path = write_payload(dir.path(), data);

    let relay = ScriptedRelay::new(vec![
        ok("abc123"),
        ok(""),
        ok(""),
        ok("[4,4,2]"),
        ok("8192"),
        ok("8192"),
        ok("8192"),
    ]);
    let reporter = RecordingReporter::default();
    let mut client = TransferClient::new(&relay, "mysecret").with_poll_policy(fast_poll());

    let mut announced = None;
    let session = client
        .send(&Payload::File(path), &reporter, |s| {
            announced = Some(s.conduit_id().to_string())
        })
        .unwrap();

    assert_eq!(session.conduit_id(), "abc123");
    assert_eq!(announced.as_deref(), Some("abc123"));
    assert_eq!(client.state(), TransferState::Done);

    let requests = relay.requests();
    assert_eq!(requests.len(), 7);
    assert!(requests.iter().all(|r| r.secret == "mysecret"));

    let setup = &requests[0];
    assert_eq!(setup.path, "/setup");
    assert_eq!(
        setup.query,
        vec![
            ("filename", "payload.bin".to_string()),
            ("size", "10".to_string()),
            ("txt", "0".to_string()),
        ]
    );
    for ping in &requests[1..4] {
        assert_eq!(ping.method, Method::Get);
        assert_eq!(ping.path, "/ping/abc123");
    }
    for put in &requests[4..] {
        assert_eq!(put.path, "/ul/abc123");
    }

    let uploads = relay.uploads();
    let sizes: Vec<usize> = uploads.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
    assert_eq!(uploads.concat(), data);
    assert_eq!(*reporter.calls.borrow(), vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(reporter.finished.get(), 1);
}

#[test]
fn expired_session_mid_upload_stops_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_payload(dir.path(), b"0123456789");

    let relay = ScriptedRelay::new(vec![
        ok("abc123"),
        ok("[4,4,2]"),
        ok(""),
        status(404, "Conduit Not Found"),
        ok(""),
    ]);
    let mut client = TransferClient::new(&relay, "mysecret").with_poll_policy(fast_poll());

    let err = client
        .send(&Payload::File(path), &NoopReporter, |_| {})
        .unwrap_err();
    assert!(matches!(err, Error::SessionExpired));
    assert_eq!(err.to_string(), "upload timed out");
    assert_eq!(client.state(), TransferState::Failed);
    assert_eq!(relay.uploads().len(), 2);
    assert_eq!(relay.requests().len(), 4);

    // Terminal: nothing else goes out
    let again = client.begin_session(&PayloadMeta::file("x", 1)).unwrap_err();
    assert!(matches!(again, Error::Terminal(TransferState::Failed)));
    assert_eq!(relay.requests().len(), 4);
}

#[test]
fn text_is_sent_as_a_single_chunk() {
    let relay = ScriptedRelay::new(vec![ok("txt42"), ok("[]"), ok("[5]"), ok("")]);
    let mut client = TransferClient::new(&relay, "mysecret").with_poll_policy(fast_poll());

    let session = client
        .send(&Payload::Text("hello".into()), &NoopReporter, |_| {})
        .unwrap();
    assert!(session.is_text());
    assert_eq!(client.state(), TransferState::Done);

    let requests = relay.requests();
    assert_eq!(
        requests[0].query,
        vec![("size", "5".to_string()), ("txt", "1".to_string())]
    );
    assert_eq!(relay.uploads(), vec![b"hello".to_vec()]);
}

#[test]
fn setup_rejection_surfaces_relay_text() {
    let relay = ScriptedRelay::new(vec![status(401, "Secret Mismatch\n")]);
    let mut client = TransferClient::new(&relay, "wrong").with_poll_policy(fast_poll());

    let err = client
        .begin_session(&PayloadMeta::file("a.txt", 3))
        .unwrap_err();
    match err {
        Error::SetupFailed { status, detail } => {
            assert_eq!(status, 401);
            assert_eq!(detail, "Secret Mismatch");
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(client.state(), TransferState::Failed);
    assert_eq!(relay.requests().len(), 1);
}

#[test]
fn poll_timeouts_count_as_not_ready() {
    let relay = ScriptedRelay::new(vec![
        ok("abc123"),
        Err(TransportError::Timeout),
        ok("[]"),
        Err(TransportError::Timeout),
        ok("[3]"),
    ]);
    let mut client = TransferClient::new(&relay, "s").with_poll_policy(fast_poll());
    let session = client.begin_session(&PayloadMeta::file("a.txt", 3)).unwrap();
    let plan = client.await_chunk_plan(&session).unwrap();
    assert_eq!(plan.sizes(), &[3]);
    assert_eq!(client.state(), TransferState::Uploading);
    assert_eq!(relay.requests().len(), 5);
}

#[test]
fn setup_timeout_is_fatal() {
    let relay = ScriptedRelay::new(vec![Err(TransportError::Timeout)]);
    let mut client = TransferClient::new(&relay, "s").with_poll_policy(fast_poll());
    let err = client
        .begin_session(&PayloadMeta::file("a.txt", 3))
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(client.state(), TransferState::Failed);
}

#[test]
fn malformed_plan_is_fatal() {
    let relay = ScriptedRelay::new(vec![ok("abc123"), ok("{\"chunks\":3}")]);
    let mut client = TransferClient::new(&relay, "s").with_poll_policy(fast_poll());
    let session = client.begin_session(&PayloadMeta::file("a.txt", 3)).unwrap();
    let err = client.await_chunk_plan(&session).unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(client.state(), TransferState::Failed);
}

#[test]
fn plan_not_matching_size_is_fatal() {
    let relay = ScriptedRelay::new(vec![ok("abc123"), ok("[4,4]")]);
    let mut client = TransferClient::new(&relay, "s").with_poll_policy(fast_poll());
    let session = client.begin_session(&PayloadMeta::file("a.txt", 10)).unwrap();
    assert!(matches!(
        client.await_chunk_plan(&session),
        Err(Error::Protocol(_))
    ));
}

#[test]
fn expired_while_polling() {
    let relay = ScriptedRelay::new(vec![ok("abc123"), ok(""), status(404, "Conduit Not Found")]);
    let mut client = TransferClient::new(&relay, "s").with_poll_policy(fast_poll());
    let session = client.begin_session(&PayloadMeta::file("a.txt", 3)).unwrap();
    assert!(matches!(
        client.await_chunk_plan(&session),
        Err(Error::SessionExpired)
    ));
}

#[test]
fn bounded_polling_gives_up() {
    let relay = ScriptedRelay::new(vec![ok("abc123"), ok(""), ok(""), ok("")]);
    let mut client =
        TransferClient::new(&relay, "s").with_poll_policy(PollPolicy::bounded(Duration::ZERO, 3));
    let session = client.begin_session(&PayloadMeta::file("a.txt", 3)).unwrap();
    assert!(matches!(
        client.await_chunk_plan(&session),
        Err(Error::PollExhausted(3))
    ));
    assert_eq!(relay.requests().len(), 4);
}

#[test]
fn rejected_chunk_aborts_without_retry() {
    let relay = ScriptedRelay::new(vec![
        ok("abc123"),
        ok("[2,2]"),
        status(408, "timeout while offering chunk"),
    ]);
    let mut client = TransferClient::new(&relay, "s").with_poll_policy(fast_poll());
    let session = client.begin_session(&PayloadMeta::file("a.txt", 4)).unwrap();
    let plan = client.await_chunk_plan(&session).unwrap();
    let reporter = RecordingReporter::default();
    let err = client
        .upload(&session, &plan, Cursor::new(b"abcd".to_vec()), &reporter)
        .unwrap_err();
    match err {
        Error::UploadFailed { chunk, status, .. } => {
            assert_eq!(chunk, 1);
            assert_eq!(status, 408);
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(relay.uploads().len(), 1);
    // Progress display is closed even though the upload failed
    assert!(reporter.calls.borrow().is_empty());
    assert_eq!(reporter.finished.get(), 1);
}

fn ready_to_upload<'a>(
    relay: &'a ScriptedRelay,
    size: u64,
) -> (
    TransferClient<&'a ScriptedRelay>,
    fileway_ul::Session,
    fileway_ul::ChunkPlan,
) {
    let mut client = TransferClient::new(relay, "s").with_poll_policy(fast_poll());
    let session = client.begin_session(&PayloadMeta::file("a.bin", size)).unwrap();
    let plan = client.await_chunk_plan(&session).unwrap();
    (client, session, plan)
}

#[test]
fn source_shorter_than_plan_is_a_short_read() {
    // Payload shrank between setup and upload: chunk 2 comes up short
    let relay = ScriptedRelay::new(vec![ok("abc123"), ok("[4,4,2]"), ok(""), ok("")]);
    let (mut client, session, plan) = ready_to_upload(&relay, 10);
    let err = client
        .upload(&session, &plan, Cursor::new(b"012345".to_vec()), &NoopReporter)
        .unwrap_err();
    match err {
        Error::ShortRead {
            chunk,
            expected,
            actual,
        } => {
            assert_eq!((chunk, expected, actual), (2, 4, 2));
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(relay.uploads().len(), 1);
    assert_eq!(client.state(), TransferState::Failed);
}

#[test]
fn empty_final_chunk_is_a_short_read() {
    let relay = ScriptedRelay::new(vec![ok("abc123"), ok("[4,4,2]"), ok(""), ok("")]);
    let (mut client, session, plan) = ready_to_upload(&relay, 10);
    let err = client
        .upload(&session, &plan, Cursor::new(b"01234567".to_vec()), &NoopReporter)
        .unwrap_err();
    assert!(matches!(err, Error::ShortRead { chunk: 3, .. }));
    assert_eq!(relay.uploads().len(), 2);
}

#[test]
fn truncated_final_chunk_is_still_sent() {
    let relay = ScriptedRelay::new(vec![ok("abc123"), ok("[4,4,2]"), ok(""), ok(""), ok("")]);
    let (mut client, session, plan) = ready_to_upload(&relay, 10);
    client
        .upload(&session, &plan, Cursor::new(b"012345678".to_vec()), &NoopReporter)
        .unwrap();
    let sizes: Vec<usize> = relay.uploads().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![4, 4, 1]);
    assert_eq!(client.state(), TransferState::Done);
}

#[test]
fn every_plan_partitions_the_payload() {
    let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let plans: [&[u64]; 4] = [&[1000], &[1, 999], &[333, 333, 334], &[100; 10]];

    for sizes in plans {
        let plan_json = serde_json::to_string(sizes).unwrap();
        let mut replies = vec![ok("abc123"), ok(&plan_json)];
        replies.extend(sizes.iter().map(|_| ok("")));
        let relay = ScriptedRelay::new(replies);
        let (mut client, session, plan) = ready_to_upload(&relay, data.len() as u64);
        client
            .upload(&session, &plan, Cursor::new(data.clone()), &NoopReporter)
            .unwrap();

        let uploads = relay.uploads();
        let got: Vec<u64> = uploads.iter().map(|c| c.len() as u64).collect();
        assert_eq!(got, sizes);
        assert_eq!(uploads.concat(), data);
    }
}

#[test]
fn reporter_choice_does_not_change_traffic() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_payload(dir.path(), b"0123456789");
    let script = || {
        ScriptedRelay::new(vec![
            ok("abc123"),
            ok(""),
            ok("[4,4,2]"),
            ok(""),
            ok(""),
            ok(""),
        ])
    };

    let quiet = script();
    TransferClient::new(&quiet, "s")
        .with_poll_policy(fast_poll())
        .send(&Payload::File(path.clone()), &NoopReporter, |_| {})
        .unwrap();

    let loud = script();
    let reporter = RecordingReporter::default();
    TransferClient::new(&loud, "s")
        .with_poll_policy(fast_poll())
        .send(&Payload::File(path), &reporter, |_| {})
        .unwrap();

    assert_eq!(quiet.requests(), loud.requests());
    assert_eq!(reporter.calls.borrow().len(), 3);
}
