//! Telemetry acquisition: the record type, the live feeds (JSON lines on
//! stdin or a polled HTTP endpoint), the synthetic generator and the poller
//! that picks between them.

use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use reqwest::header::CACHE_CONTROL;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use thiserror::Error;

use crate::config::{FeedConfig, MockConfig};
use crate::status::{SensorStatus, Severity};

/// One telemetry sample. Missing numeric fields read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    pub speed_mps: f64,
    pub disk_mb_s: f64,
    pub pps_skew_us: f64,
    pub queue_pct: f64,
    /// Fraction in `[0, 1]`.
    pub gnss_lock: f64,
    pub temp_c: f64,
    pub status: Option<Vec<SensorStatus>>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TelemetryError {
    #[error("no telemetry received for {0:?}")]
    Stale(Duration),
    #[error("malformed telemetry: {0}")]
    Malformed(String),
    #[error("telemetry feed closed")]
    Disconnected,
    #[error("telemetry request failed: {0}")]
    Http(String),
}

/// Long field names and their short aliases.
const FIELDS: [(&str, &str); 6] = [
    ("speed_mps", "speed"),
    ("disk_mb_s", "disk"),
    ("pps_skew_us", "pps"),
    ("queue_pct", "queue"),
    ("gnss_lock", "gnss"),
    ("temp_c", "temp"),
];

fn number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

impl Telemetry {
    /// Map a decoded JSON value. Anything but an object is rejected; inside an
    /// object bad field types become NaN and are absorbed downstream.
    pub fn from_json(json: &Value) -> Result<Self, TelemetryError> {
        let object = json
            .as_object()
            .ok_or_else(|| TelemetryError::Malformed("expected a JSON object".to_string()))?;

        let field = |(long, short): (&str, &str)| {
            object
                .get(long)
                .filter(|v| !v.is_null())
                .or_else(|| object.get(short).filter(|v| !v.is_null()))
                .map_or(0.0, number)
        };
        let [speed, disk, pps, queue, gnss, temp] = FIELDS.map(field);

        let status = match object.get("status") {
            Some(list @ Value::Array(_)) => match serde_json::from_value(list.clone()) {
                Ok(rows) => Some(rows),
                Err(err) => {
                    log::debug!("ignoring status list: {}", err);
                    None
                }
            },
            _ => None,
        };

        Ok(Self {
            speed_mps: speed,
            disk_mb_s: disk,
            pps_skew_us: pps,
            queue_pct: queue,
            gnss_lock: gnss,
            temp_c: temp,
            status,
        })
    }

    pub fn parse_line(line: &str) -> Result<Self, TelemetryError> {
        let json: Value = serde_json::from_str(line)
            .map_err(|err| TelemetryError::Malformed(err.to_string()))?;
        Self::from_json(&json)
    }
}

/// Anything that can be asked for the current sample.
pub trait TelemetrySource {
    fn poll(&mut self) -> Result<Telemetry, TelemetryError>;
}

// ============================================================================
// LIVE FEED
// ============================================================================

/// Results forwarded by a feed thread, reduced to the newest on each poll.
struct Inbox {
    receiver: Receiver<Result<Telemetry, TelemetryError>>,
    latest: Option<(Telemetry, Instant)>,
    timeout: Duration,
    closed: bool,
}

impl Inbox {
    fn new(receiver: Receiver<Result<Telemetry, TelemetryError>>, timeout: Duration) -> Self {
        Self {
            receiver,
            latest: None,
            timeout,
            closed: false,
        }
    }

    fn poll(&mut self) -> Result<Telemetry, TelemetryError> {
        let mut newest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(result) => newest = Some(result),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }

        match newest {
            Some(Ok(telemetry)) => {
                self.latest = Some((telemetry.clone(), Instant::now()));
                Ok(telemetry)
            }
            Some(Err(err)) => Err(err),
            None => match &self.latest {
                Some((telemetry, at)) if at.elapsed() <= self.timeout => Ok(telemetry.clone()),
                _ if self.closed => Err(TelemetryError::Disconnected),
                _ => Err(TelemetryError::Stale(self.timeout)),
            },
        }
    }
}

/// JSON-lines feed. A background thread parses one object per line and
/// forwards the results; the thread ends once the feed is dropped.
pub struct StdinFeed {
    inbox: Inbox,
}

impl StdinFeed {
    pub fn spawn(config: &FeedConfig) -> Self {
        Self::from_reader(std::io::stdin(), config.timeout())
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R, timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(reader).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        log::warn!("telemetry input error: {}", err);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                if sender.send(Telemetry::parse_line(&line)).is_err() {
                    break;
                }
            }
            log::debug!("telemetry reader finished");
        });
        Self {
            inbox: Inbox::new(receiver, timeout),
        }
    }
}

impl TelemetrySource for StdinFeed {
    fn poll(&mut self) -> Result<Telemetry, TelemetryError> {
        self.inbox.poll()
    }
}

/// REST feed. A background thread issues one GET per poll interval, never
/// more than one at a time, and each request is cut off after the feed
/// timeout. A non-2xx answer counts as a failed poll.
pub struct HttpFeed {
    inbox: Inbox,
}

impl HttpFeed {
    pub fn spawn(url: impl Into<String>, config: &FeedConfig) -> Self {
        let url = url.into();
        let interval = config.poll_interval();
        let timeout = config.timeout();
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let client = match http_client(timeout) {
                Ok(client) => client,
                Err(err) => {
                    log::error!("cannot build http client: {}", err);
                    let _ = sender.send(Err(err));
                    return;
                }
            };
            loop {
                let result = fetch(&client, &url);
                if let Err(err) = &result {
                    log::trace!("poll of {} failed: {}", url, err);
                }
                if sender.send(result).is_err() {
                    break;
                }
                thread::sleep(interval);
            }
            log::debug!("telemetry poller for {} finished", url);
        });
        Self {
            inbox: Inbox::new(receiver, timeout),
        }
    }
}

impl TelemetrySource for HttpFeed {
    fn poll(&mut self) -> Result<Telemetry, TelemetryError> {
        self.inbox.poll()
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, TelemetryError> {
    let mut builder = reqwest::blocking::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|err| TelemetryError::Http(err.to_string()))
}

/// One uncached GET, decoded with the same mapping as a feed line.
fn fetch(client: &reqwest::blocking::Client, url: &str) -> Result<Telemetry, TelemetryError> {
    let response = client
        .get(url)
        .header(CACHE_CONTROL, "no-store")
        .send()
        .map_err(|err| TelemetryError::Http(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(TelemetryError::Http(format!("{} answered {}", url, status)));
    }
    let json: Value = response
        .json()
        .map_err(|err| TelemetryError::Malformed(err.to_string()))?;
    Telemetry::from_json(&json)
}

// ============================================================================
// SYNTHETIC GENERATOR
// ============================================================================

/// Slow sinusoids around nominal values, with optional multiplicative noise.
pub struct MockTelemetry {
    started: Instant,
    jitter: f64,
    rng: StdRng,
}

impl MockTelemetry {
    pub fn new(config: &MockConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            started: Instant::now(),
            jitter: if config.jitter.is_finite() {
                config.jitter.abs()
            } else {
                0.0
            },
            rng,
        }
    }

    fn noise(&mut self) -> f64 {
        if self.jitter > 0.0 {
            1.0 + self.rng.random_range(-self.jitter..=self.jitter)
        } else {
            1.0
        }
    }

    /// The sample at `t` seconds after start.
    pub fn sample(&mut self, t: f64) -> Telemetry {
        let s = |f: f64| (t * f).sin();
        Telemetry {
            speed_mps: (15.0 + 5.0 * s(0.4)) * self.noise(),
            disk_mb_s: (350.0 + 120.0 * s(0.27)) * self.noise(),
            pps_skew_us: (30.0 * s(0.6) * self.noise()).abs(),
            queue_pct: ((40.0 + 30.0 * s(0.33)) * self.noise()).clamp(0.0, 100.0),
            gnss_lock: ((0.85 + 0.12 * s(0.2)) * self.noise()).clamp(0.0, 1.0),
            temp_c: (50.0 + 10.0 * s(0.18)) * self.noise(),
            status: Some(vec![
                SensorStatus {
                    id: "ins".to_string(),
                    label: "GNSS/INS".to_string(),
                    severity: Severity::Ok,
                    message: Some("Mock".to_string()),
                },
                SensorStatus {
                    id: "recorder".to_string(),
                    label: "Recorder".to_string(),
                    severity: Severity::Ok,
                    message: None,
                },
            ]),
        }
    }
}

impl TelemetrySource for MockTelemetry {
    fn poll(&mut self) -> Result<Telemetry, TelemetryError> {
        let t = self.started.elapsed().as_secs_f64();
        Ok(self.sample(t))
    }
}

// ============================================================================
// POLLER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    Live,
    Mock,
}

impl FeedMode {
    pub fn badge(self) -> &'static str {
        match self {
            FeedMode::Live => "LIVE",
            FeedMode::Mock => "MOCK",
        }
    }
}

/// Polls the live source at a fixed cadence and substitutes the generator
/// whenever the live source fails or is absent.
pub struct TelemetryPoller {
    live: Option<Box<dyn TelemetrySource>>,
    mock: MockTelemetry,
    interval: Duration,
    last_poll: Option<Instant>,
    telemetry: Telemetry,
    mode: FeedMode,
}

impl TelemetryPoller {
    pub fn new(
        live: Option<Box<dyn TelemetrySource>>,
        mock: MockTelemetry,
        interval: Duration,
    ) -> Self {
        Self {
            live,
            mock,
            interval,
            last_poll: None,
            telemetry: Telemetry::default(),
            mode: FeedMode::Mock,
        }
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    /// Poll if the interval has elapsed since the last poll. Returns whether
    /// a new record was taken.
    pub fn poll_due(&mut self, now: Instant) -> bool {
        let due = self
            .last_poll
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_poll = Some(now);
            self.poll_now();
        }
        due
    }

    pub fn poll_now(&mut self) {
        let live = self.live.as_mut().map(|source| source.poll());
        let (telemetry, mode) = match live {
            Some(Ok(telemetry)) => (telemetry, FeedMode::Live),
            Some(Err(err)) => {
                if self.mode == FeedMode::Live {
                    log::warn!("live telemetry lost: {}", err);
                } else {
                    log::debug!("live telemetry unavailable: {}", err);
                }
                (self.mock_sample(), FeedMode::Mock)
            }
            None => (self.mock_sample(), FeedMode::Mock),
        };
        if mode != self.mode {
            log::info!("telemetry source: {}", mode.badge());
        }
        self.telemetry = telemetry;
        self.mode = mode;
    }

    fn mock_sample(&mut self) -> Telemetry {
        // The generator never fails.
        self.mock.poll().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::net::TcpListener;

    struct Scripted(Vec<Result<Telemetry, TelemetryError>>);

    impl TelemetrySource for Scripted {
        fn poll(&mut self) -> Result<Telemetry, TelemetryError> {
            if self.0.is_empty() {
                Err(TelemetryError::Disconnected)
            } else {
                self.0.remove(0)
            }
        }
    }

    fn seeded() -> MockTelemetry {
        MockTelemetry::new(&MockConfig {
            seed: Some(7),
            jitter: 0.0,
        })
    }

    #[test]
    fn accepts_long_names_and_aliases() {
        let t = Telemetry::parse_line(
            r#"{"speed_mps": 22.2, "disk": 400, "pps": "12.5", "queue_pct": null, "queue": 55}"#,
        )
        .unwrap();
        assert_eq!(t.speed_mps, 22.2);
        assert_eq!(t.disk_mb_s, 400.0);
        assert_eq!(t.pps_skew_us, 12.5);
        assert_eq!(t.queue_pct, 55.0);
        assert_eq!(t.gnss_lock, 0.0);
        assert!(t.status.is_none());
    }

    #[test]
    fn bad_types_become_nan() {
        let t = Telemetry::parse_line(r#"{"speed_mps": "fast", "temp_c": [1], "gnss": true}"#)
            .unwrap();
        assert!(t.speed_mps.is_nan());
        assert!(t.temp_c.is_nan());
        assert!(t.gnss_lock.is_nan());
    }

    #[test]
    fn non_objects_are_malformed() {
        assert!(matches!(
            Telemetry::parse_line("[1, 2]"),
            Err(TelemetryError::Malformed(_))
        ));
        assert!(matches!(
            Telemetry::parse_line("{nope"),
            Err(TelemetryError::Malformed(_))
        ));
    }

    #[test]
    fn status_is_kept_only_as_array() {
        let t = Telemetry::parse_line(
            r#"{"status": [{"id": "a", "label": "A", "severity": "warn", "message": "hot"}]}"#,
        )
        .unwrap();
        let rows = t.status.unwrap();
        assert_eq!(rows[0].severity, Severity::Warn);
        assert_eq!(rows[0].message.as_deref(), Some("hot"));

        let t = Telemetry::parse_line(r#"{"status": "all good"}"#).unwrap();
        assert!(t.status.is_none());
    }

    #[test]
    fn mock_stays_in_envelope() {
        let mut mock = seeded();
        for step in 0..2000 {
            let t = mock.sample(step as f64 * 0.1);
            assert!((10.0..=20.0).contains(&t.speed_mps));
            assert!((230.0..=470.0).contains(&t.disk_mb_s));
            assert!((0.0..=30.0).contains(&t.pps_skew_us));
            assert!((10.0..=70.0).contains(&t.queue_pct));
            assert!((0.73..=0.97).contains(&t.gnss_lock));
            assert!((40.0..=60.0).contains(&t.temp_c));
            assert_eq!(t.status.as_ref().map(Vec::len), Some(2));
        }
    }

    #[test]
    fn seeded_jitter_is_reproducible() {
        let config = MockConfig {
            seed: Some(42),
            jitter: 0.05,
        };
        let a = MockTelemetry::new(&config).sample(3.0);
        let b = MockTelemetry::new(&config).sample(3.0);
        assert_eq!(a, b);
        assert!((0.0..=100.0).contains(&a.queue_pct));
    }

    #[test]
    fn poller_without_live_source_is_mock() {
        let mut poller = TelemetryPoller::new(None, seeded(), Duration::from_millis(500));
        assert!(poller.poll_due(Instant::now()));
        assert_eq!(poller.mode(), FeedMode::Mock);
        assert!(poller.telemetry().speed_mps > 0.0);
    }

    #[test]
    fn poller_falls_back_and_recovers() {
        let live = Telemetry {
            speed_mps: 1.0,
            ..Telemetry::default()
        };
        let script = Scripted(vec![
            Ok(live.clone()),
            Err(TelemetryError::Malformed("x".to_string())),
            Ok(live.clone()),
        ]);
        let mut poller =
            TelemetryPoller::new(Some(Box::new(script)), seeded(), Duration::from_millis(500));

        poller.poll_now();
        assert_eq!(poller.mode(), FeedMode::Live);
        assert_eq!(poller.telemetry(), &live);

        poller.poll_now();
        assert_eq!(poller.mode(), FeedMode::Mock);
        assert_ne!(poller.telemetry(), &live);

        poller.poll_now();
        assert_eq!(poller.mode(), FeedMode::Live);
    }

    #[test]
    fn poller_respects_interval() {
        let mut poller = TelemetryPoller::new(None, seeded(), Duration::from_millis(500));
        let start = Instant::now();
        assert!(poller.poll_due(start));
        assert!(!poller.poll_due(start + Duration::from_millis(100)));
        assert!(poller.poll_due(start + Duration::from_millis(500)));
    }

    fn poll_until_settled(feed: &mut StdinFeed) -> Result<Telemetry, TelemetryError> {
        for _ in 0..200 {
            let result = feed.poll();
            if feed.inbox.closed {
                return result;
            }
            thread::sleep(Duration::from_millis(5));
        }
        feed.poll()
    }

    #[test]
    fn feed_keeps_newest_line() {
        let input = "{\"speed\": 1}\n\n{\"speed\": 2}\n";
        let mut feed = StdinFeed::from_reader(Cursor::new(input), Duration::from_secs(60));
        let t = poll_until_settled(&mut feed).unwrap();
        assert_eq!(t.speed_mps, 2.0);
        // still fresh after the reader finished
        assert_eq!(feed.poll().unwrap().speed_mps, 2.0);
    }

    #[test]
    fn feed_reports_malformed_newest_line() {
        let input = "{\"speed\": 1}\nnot json\n";
        let mut feed = StdinFeed::from_reader(Cursor::new(input), Duration::from_secs(60));
        let mut saw_malformed = false;
        for _ in 0..200 {
            match feed.poll() {
                Err(TelemetryError::Malformed(_)) => {
                    saw_malformed = true;
                    break;
                }
                _ => thread::sleep(Duration::from_millis(5)),
            }
        }
        assert!(saw_malformed);
    }

    /// Blocks until its sender is dropped, then reports end of input.
    struct Silent(Receiver<()>);

    impl Read for Silent {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn empty_feed_is_disconnected() {
        let mut feed = StdinFeed::from_reader(Cursor::new(""), Duration::from_secs(60));
        assert_eq!(poll_until_settled(&mut feed), Err(TelemetryError::Disconnected));
    }

    #[test]
    fn quiet_feed_goes_stale() {
        let (hold, blocked) = mpsc::channel();
        let mut feed = StdinFeed::from_reader(Silent(blocked), Duration::ZERO);
        assert_eq!(feed.poll(), Err(TelemetryError::Stale(Duration::ZERO)));
        drop(hold);
    }

    /// Answer every request on a local port with the same response.
    fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/telemetry", listener.local_addr().unwrap());
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let reply = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });
        url
    }

    fn client() -> reqwest::blocking::Client {
        http_client(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn http_success_maps_the_body() {
        let url = serve("200 OK", r#"{"speed": 3, "temp_c": 41.5}"#);
        let t = fetch(&client(), &url).unwrap();
        assert_eq!(t.speed_mps, 3.0);
        assert_eq!(t.temp_c, 41.5);
    }

    #[test]
    fn http_error_status_fails_the_poll() {
        let url = serve("503 Service Unavailable", r#"{"speed": 3}"#);
        assert!(matches!(fetch(&client(), &url), Err(TelemetryError::Http(_))));
    }

    #[test]
    fn http_non_object_body_is_malformed() {
        let url = serve("200 OK", "[1, 2]");
        assert!(matches!(
            fetch(&client(), &url),
            Err(TelemetryError::Malformed(_))
        ));
    }

    #[test]
    fn http_request_is_cut_off_after_the_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/telemetry", listener.local_addr().unwrap());
        thread::spawn(move || {
            // accept and never answer
            let held: Vec<_> = listener.incoming().take(1).collect();
            thread::sleep(Duration::from_secs(5));
            drop(held);
        });
        let client = http_client(Duration::from_millis(100)).unwrap();
        let started = Instant::now();
        assert!(matches!(fetch(&client, &url), Err(TelemetryError::Http(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn http_feed_goes_live() {
        let url = serve("200 OK", r#"{"speed_mps": 22.2}"#);
        let config = FeedConfig {
            poll_interval_ms: 10,
            timeout_ms: 2000,
            url: None,
        };
        let mut feed = HttpFeed::spawn(url, &config);
        let mut result = feed.poll();
        for _ in 0..400 {
            if result.is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
            result = feed.poll();
        }
        assert_eq!(result.map(|t| t.speed_mps), Ok(22.2));
    }
}
