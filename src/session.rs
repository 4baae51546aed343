//! Streaming sessions.
//!
//! A session owns the transport from the start command to the stop command:
//!
//! ```text
//! Idle -> Started -> Streaming -> Completed | Errored | Cancelled
//! ```
//!
//! The stop command is sent on every terminal transition, whether the stream
//! ended, the caller cancelled, or decoding failed. Records are handed to the
//! caller through a bounded channel in the order their packets arrived.

use chrono::{Local, NaiveDateTime, TimeDelta};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::Oximeter;
use crate::commands::Command;
use crate::error::{Error, Result};
use crate::protocol::{Package, PackageType, parse_realtime, parse_storage, split_storage_multi};
use crate::transport::Transport;
use crate::types::{RealtimeRecord, StorageRecord};

/// Default capacity of the record channel of spawned sessions.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle state of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SessionState {
    /// Nothing sent yet.
    Idle,
    /// Start command sent.
    Started,
    /// Packets arriving.
    Streaming,
    /// Stream ended normally.
    Completed,
    /// Aborted by an error.
    Errored,
    /// Cancelled by the caller.
    Cancelled,
}

impl SessionState {
    /// Returns true for states after which the stop command is due.
    pub(crate) const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Cancelled)
    }
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEnd {
    /// The device stopped sending or sent a normal disconnect notice.
    Completed,
    /// The caller cancelled or dropped the record receiver.
    Cancelled,
}

/// Parameters for transferring a stored recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageRequest {
    /// Time assigned to the first sample, `None` for now.
    pub start_time: Option<NaiveDateTime>,
    /// User whose recordings are transferred.
    pub user_index: u8,
    /// Recorded segment to transfer.
    pub segment: u8,
}

impl StorageRequest {
    /// Creates a request for the given user and segment.
    #[must_use]
    pub const fn new(user_index: u8, segment: u8) -> Self {
        Self {
            start_time: None,
            user_index,
            segment,
        }
    }

    /// Sets the time of the first sample.
    #[must_use]
    pub const fn start_time(mut self, time: NaiveDateTime) -> Self {
        self.start_time = Some(time);
        self
    }
}

impl Default for StorageRequest {
    fn default() -> Self {
        Self::new(0x01, 0x01)
    }
}

/// Session kind, deciding start and stop commands.
#[derive(Debug, Clone, Copy)]
enum SessionKind {
    Realtime,
    Storage { user_index: u8, segment: u8 },
}

impl SessionKind {
    const fn start_command(self) -> Command {
        match self {
            Self::Realtime => Command::StartRealtime,
            Self::Storage {
                user_index,
                segment,
            } => Command::StartStorage {
                user_index,
                segment,
            },
        }
    }

    const fn stop_command(self) -> Command {
        match self {
            Self::Realtime => Command::StopRealtime,
            Self::Storage { .. } => Command::StopStorage,
        }
    }
}

/// A running session borrowing the client exclusively.
struct Session<'a, T> {
    device: &'a mut Oximeter<T>,
    kind: SessionKind,
    state: SessionState,
}

impl<'a, T: Transport> Session<'a, T> {
    const fn new(device: &'a mut Oximeter<T>, kind: SessionKind) -> Self {
        Self {
            device,
            kind,
            state: SessionState::Idle,
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!("{:?} session: {:?} -> {:?}", self.kind, self.state, next);
        self.state = next;
    }

    async fn start(&mut self) -> Result<()> {
        self.device.clear_input()?;
        self.device.send_command(self.kind.start_command()).await?;
        tracing::info!("{:?} session started", self.kind);
        self.transition(SessionState::Started);
        Ok(())
    }

    async fn next_package(&mut self) -> Result<Option<Package>> {
        let package = self.device.next_package().await?;
        if package.is_some() && self.state == SessionState::Started {
            self.transition(SessionState::Streaming);
        }
        Ok(package)
    }

    /// Sends the stop command and settles the session result.
    ///
    /// An error from the session takes precedence over a failing stop command.
    async fn close(mut self, result: Result<SessionEnd>) -> Result<SessionEnd> {
        let terminal = match &result {
            Ok(SessionEnd::Completed) => SessionState::Completed,
            Ok(SessionEnd::Cancelled) => SessionState::Cancelled,
            Err(_) => SessionState::Errored,
        };
        self.transition(terminal);
        debug_assert!(self.state.is_terminal());

        let stopped = self.device.send_command(self.kind.stop_command()).await;
        match (result, stopped) {
            (Ok(end), Ok(())) => {
                tracing::info!("{:?} session ended: {:?}", self.kind, end);
                Ok(end)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), stopped) => {
                if let Err(stop_err) = stopped {
                    tracing::warn!("failed to send stop command: {}", stop_err);
                }
                tracing::warn!("{:?} session aborted: {}", self.kind, e);
                Err(e)
            }
        }
    }
}

/// Hands a record to the caller.
///
/// Returns false if the caller cancelled or dropped the receiver.
async fn deliver<R>(records: &mpsc::Sender<R>, cancel: &CancellationToken, record: R) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = records.send(record) => sent.is_ok(),
    }
}

impl<T: Transport> Oximeter<T> {
    /// Streams realtime measurements until the device stops sending, the
    /// caller cancels, or an error occurs.
    ///
    /// Buffered input is discarded before the start command. The stop
    /// command is sent on every exit path.
    pub async fn realtime_data(
        &mut self,
        records: mpsc::Sender<RealtimeRecord>,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd> {
        let mut session = Session::new(self, SessionKind::Realtime);
        let result = stream_realtime(&mut session, &records, cancel).await;
        session.close(result).await
    }

    /// Transfers a stored recording.
    ///
    /// Samples are timestamped from `request.start_time`, advancing by the
    /// storage interval per sample slot. Empty slots of multi-sample packages
    /// leave a gap, and the gap carries over to every later sample including
    /// those of following packages: `[10,60,0,0,0,0]` then `[20,70,0,0,0,0]`
    /// yields samples at T and T+3 intervals.
    ///
    /// Once the start command went out, the stop command is sent on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` before anything is sent if the storage
    /// interval does not fit a timestamp offset.
    pub async fn storage_data(
        &mut self,
        request: StorageRequest,
        records: mpsc::Sender<StorageRecord>,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd> {
        let interval = TimeDelta::from_std(self.storage_interval()).map_err(|_| {
            Error::InvalidConfig {
                reason: format!("storage interval {:?} out of range", self.storage_interval()),
            }
        })?;
        let kind = SessionKind::Storage {
            user_index: request.user_index,
            segment: request.segment,
        };
        let start = request
            .start_time
            .unwrap_or_else(|| Local::now().naive_local());

        let mut session = Session::new(self, kind);
        let result = stream_storage(&mut session, start, interval, &records, cancel).await;
        session.close(result).await
    }
}

impl<T: Transport + 'static> Oximeter<T> {
    /// Runs a realtime session on its own task.
    ///
    /// The client is handed back together with the session result when the
    /// task finishes. A `capacity` of zero is raised to one.
    pub fn spawn_realtime(
        mut self,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (
        mpsc::Receiver<RealtimeRecord>,
        JoinHandle<(Self, Result<SessionEnd>)>,
    ) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move {
            let result = self.realtime_data(tx, &cancel).await;
            (self, result)
        });
        (rx, handle)
    }

    /// Runs a storage transfer on its own task.
    ///
    /// A `capacity` of zero is raised to one.
    pub fn spawn_storage(
        mut self,
        request: StorageRequest,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (
        mpsc::Receiver<StorageRecord>,
        JoinHandle<(Self, Result<SessionEnd>)>,
    ) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move {
            let result = self.storage_data(request, tx, &cancel).await;
            (self, result)
        });
        (rx, handle)
    }
}

async fn stream_realtime<T: Transport>(
    session: &mut Session<'_, T>,
    records: &mpsc::Sender<RealtimeRecord>,
    cancel: &CancellationToken,
) -> Result<SessionEnd> {
    session.start().await?;

    while let Some(package) = session.next_package().await? {
        let record = parse_realtime(
            package.package_type,
            &package.payload,
            Local::now().naive_local(),
        )?;
        if !deliver(records, cancel, record).await {
            return Ok(SessionEnd::Cancelled);
        }
    }
    Ok(SessionEnd::Completed)
}

async fn stream_storage<T: Transport>(
    session: &mut Session<'_, T>,
    mut time: NaiveDateTime,
    interval: TimeDelta,
    records: &mpsc::Sender<StorageRecord>,
    cancel: &CancellationToken,
) -> Result<SessionEnd> {
    session.start().await?;

    while let Some(package) = session.next_package().await? {
        let slots = if package.package_type == u8::from(PackageType::StorageMulti) {
            split_storage_multi(&package.payload)?
        } else {
            vec![Some(package.payload.as_slice())]
        };

        // Every slot takes one interval, empty ones included
        for slot in slots {
            let sample_time = time;
            time = time
                .checked_add_signed(interval)
                .ok_or_else(|| Error::InvalidConfig {
                    reason: format!("storage timestamps overflow after {sample_time}"),
                })?;
            let Some(sample) = slot else {
                continue;
            };
            let record = parse_storage(package.package_type, sample, sample_time)?;
            if !deliver(records, cancel, record).await {
                return Ok(SessionEnd::Cancelled);
            }
        }
    }
    Ok(SessionEnd::Completed)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;
    use crate::error::{DecodeError, Error, FramingError, ProtocolError};
    use crate::protocol::encode_package;
    use crate::transport::mock::MockTransport;

    const START_REALTIME: u8 = 0xa1;
    const STOP_REALTIME: u8 = 0xa2;
    const START_STORAGE: u8 = 0xa6;
    const STOP_STORAGE: u8 = 0xa7;

    fn packet(package_type: u8, payload: &[u8]) -> Vec<u8> {
        encode_package(package_type, payload).unwrap().to_vec()
    }

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap()
    }

    fn realtime_payload(spo2: u8, pulse_rate: u8) -> [u8; 7] {
        [0x05, 0x20, 0x03, pulse_rate, spo2, 0x10, 0x00]
    }

    async fn collect<R>(mut rx: mpsc::Receiver<R>) -> Vec<R> {
        let mut out = Vec::new();
        while let Some(record) = rx.recv().await {
            out.push(record);
        }
        out
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[tokio::test]
    async fn test_realtime_session() {
        init_tracing();
        let bytes = [
            packet(0x01, &realtime_payload(97, 60)),
            packet(0x01, &realtime_payload(98, 61)),
            packet(0x01, &realtime_payload(0x7f, 0xff)),
        ]
        .concat();
        let mut transport = MockTransport::new(bytes);
        transport.stale.extend([0x01, 0x80, 0x80]);
        let mut oximeter = Oximeter::new(transport);

        let (tx, rx) = mpsc::channel(16);
        let end = oximeter
            .realtime_data(tx, &CancellationToken::new())
            .await
            .unwrap();
        let records = collect(rx).await;

        assert_eq!(end, SessionEnd::Completed);
        assert_eq!(records.len(), 3);
        assert_eq!((records[0].spo2, records[0].pulse_rate), (97, 60));
        assert_eq!((records[1].spo2, records[1].pulse_rate), (98, 61));
        assert!(records[2].spo2_invalid());
        assert!(records[2].pulse_rate_invalid());

        let transport = oximeter.transport();
        assert_eq!(transport.clears, 1);
        assert_eq!(transport.sent_opcodes(), vec![START_REALTIME, STOP_REALTIME]);
    }

    #[tokio::test]
    async fn test_realtime_decode_error_still_stops() {
        let bytes = [
            packet(0x01, &realtime_payload(97, 60)),
            packet(0x01, &[0x00; 3]),
        ]
        .concat();
        let mut oximeter = Oximeter::new(MockTransport::new(bytes));

        let (tx, rx) = mpsc::channel(16);
        let result = oximeter.realtime_data(tx, &CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(Error::Decode(DecodeError::InvalidLength {
                package_type: 0x01,
                expected: 7,
                got: 3
            }))
        ));
        assert_eq!(collect(rx).await.len(), 1);
        assert_eq!(
            oximeter.transport().sent_opcodes(),
            vec![START_REALTIME, STOP_REALTIME]
        );
    }

    #[tokio::test]
    async fn test_realtime_framing_error_still_stops() {
        let mut bytes = packet(0x01, &realtime_payload(97, 60));
        bytes.extend([0x01, 0x80]);
        bytes.extend(packet(0x01, &realtime_payload(97, 60)));
        let mut oximeter = Oximeter::new(MockTransport::new(bytes));

        let (tx, _rx) = mpsc::channel(16);
        let result = oximeter.realtime_data(tx, &CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(Error::Framing(FramingError::TooFewBytes(2)))
        ));
        assert_eq!(
            oximeter.transport().sent_opcodes(),
            vec![START_REALTIME, STOP_REALTIME]
        );
    }

    #[tokio::test]
    async fn test_transport_error_still_stops() {
        let mut transport = MockTransport::new(packet(0x01, &realtime_payload(97, 60)));
        transport.fail_at_end = true;
        let mut oximeter = Oximeter::new(transport);

        let (tx, _rx) = mpsc::channel(16);
        let result = oximeter.realtime_data(tx, &CancellationToken::new()).await;

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(
            oximeter.transport().sent_opcodes(),
            vec![START_REALTIME, STOP_REALTIME]
        );
    }

    #[tokio::test]
    async fn test_start_failure_reports_send_error() {
        let mut transport = MockTransport::idle();
        transport.fail_send = true;
        let mut oximeter = Oximeter::new(transport);

        let (tx, _rx) = mpsc::channel(16);
        let result = oximeter.realtime_data(tx, &CancellationToken::new()).await;

        assert!(matches!(result, Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::BrokenPipe));
        assert!(oximeter.transport().sent.is_empty());
    }

    #[tokio::test]
    async fn test_realtime_cancelled() {
        let bytes = [
            packet(0x01, &realtime_payload(97, 60)),
            packet(0x01, &realtime_payload(98, 61)),
            packet(0x01, &realtime_payload(99, 62)),
        ]
        .concat();
        let mut oximeter = Oximeter::new(MockTransport::new(bytes));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (tx, rx) = mpsc::channel(16);
        let end = oximeter.realtime_data(tx, &cancel).await.unwrap();

        assert_eq!(end, SessionEnd::Cancelled);
        assert!(collect(rx).await.is_empty());
        assert_eq!(
            oximeter.transport().sent_opcodes(),
            vec![START_REALTIME, STOP_REALTIME]
        );
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels() {
        let bytes = [
            packet(0x01, &realtime_payload(97, 60)),
            packet(0x01, &realtime_payload(98, 61)),
        ]
        .concat();
        let mut oximeter = Oximeter::new(MockTransport::new(bytes));

        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let end = oximeter
            .realtime_data(tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(end, SessionEnd::Cancelled);
        assert_eq!(
            oximeter.transport().sent_opcodes(),
            vec![START_REALTIME, STOP_REALTIME]
        );
    }

    #[tokio::test]
    async fn test_disconnect_notice_ends_session() {
        for reason in [0x00, 0x01] {
            let bytes = [
                packet(0x01, &realtime_payload(97, 60)),
                packet(0x0d, &[reason]),
                packet(0x01, &realtime_payload(98, 61)),
            ]
            .concat();
            let mut oximeter = Oximeter::new(MockTransport::new(bytes));

            let (tx, rx) = mpsc::channel(16);
            let end = oximeter
                .realtime_data(tx, &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(end, SessionEnd::Completed);
            assert_eq!(collect(rx).await.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_disconnect_notice_unknown_reason() {
        let bytes = [packet(0x0f, &[97, 60, 0, 0, 0, 0]), packet(0x0d, &[0x02])].concat();
        let mut oximeter = Oximeter::new(MockTransport::new(bytes));

        let (tx, rx) = mpsc::channel(16);
        let result = oximeter
            .storage_data(StorageRequest::default(), tx, &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::DisconnectReason(0x02)))
        ));
        assert_eq!(collect(rx).await.len(), 1);
        assert_eq!(
            oximeter.transport().sent_opcodes(),
            vec![START_STORAGE, STOP_STORAGE]
        );
    }

    #[tokio::test]
    async fn test_storage_multi_sample_timestamps() {
        let bytes = [
            packet(0x0f, &[10, 60, 0, 0, 20, 70]),
            packet(0x0f, &[30, 80, 40, 90, 50, 100]),
            packet(0x0d, &[0x00]),
        ]
        .concat();
        let mut oximeter = Oximeter::new(MockTransport::new(bytes));

        let (tx, rx) = mpsc::channel(16);
        let request = StorageRequest::new(0x01, 0x03).start_time(t0());
        let end = oximeter
            .storage_data(request, tx, &CancellationToken::new())
            .await
            .unwrap();
        let records = collect(rx).await;

        assert_eq!(end, SessionEnd::Completed);
        let summary: Vec<(u8, u8, NaiveDateTime)> = records
            .iter()
            .map(|r| (r.spo2, r.pulse_rate, r.time))
            .collect();
        let secs = |s| t0() + TimeDelta::seconds(s);
        assert_eq!(
            summary,
            vec![
                (10, 60, secs(0)),
                (20, 70, secs(2)),
                (30, 80, secs(3)),
                (40, 90, secs(4)),
                (50, 100, secs(5)),
            ]
        );
        assert!(records.iter().all(|r| r.pi.is_none()));

        let sent = oximeter.transport().sent_packages();
        assert_eq!(sent[0].payload, vec![START_STORAGE, 0x01, 0x03, 0, 0, 0, 0]);
        assert_eq!(sent[1].payload[0], STOP_STORAGE);
    }

    #[tokio::test]
    async fn test_storage_with_pi() {
        let bytes = [
            packet(0x09, &[96, 64, 0x2c, 0x01]),
            packet(0x09, &[95, 65, 0xff, 0xff]),
        ]
        .concat();
        let mut oximeter = Oximeter::new(MockTransport::new(bytes))
            .with_session_config(
                crate::client::SessionConfig::default().storage_interval(Duration::from_secs(4)),
            );

        let (tx, rx) = mpsc::channel(16);
        let request = StorageRequest::default().start_time(t0());
        oximeter
            .storage_data(request, tx, &CancellationToken::new())
            .await
            .unwrap();
        let records = collect(rx).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pi, Some(300));
        assert_eq!(records[0].time, t0());
        assert_eq!(records[1].pi_invalid(), Some(true));
        assert_eq!(records[1].time, t0() + TimeDelta::seconds(4));
    }

    #[tokio::test]
    async fn test_spawned_realtime_session() {
        let bytes = [
            packet(0x01, &realtime_payload(97, 60)),
            packet(0x01, &realtime_payload(98, 61)),
        ]
        .concat();
        let oximeter = Oximeter::new(MockTransport::new(bytes));

        let (rx, handle) =
            oximeter.spawn_realtime(DEFAULT_CHANNEL_CAPACITY, CancellationToken::new());
        let records = collect(rx).await;
        let (oximeter, result) = handle.await.unwrap();

        assert_eq!(result.unwrap(), SessionEnd::Completed);
        assert_eq!(records.len(), 2);
        assert_eq!(
            oximeter.into_transport().sent_opcodes(),
            vec![START_REALTIME, STOP_REALTIME]
        );
    }

    #[tokio::test]
    async fn test_spawned_storage_session_cancelled() {
        let bytes = [
            packet(0x0f, &[10, 60, 11, 61, 12, 62]),
            packet(0x0f, &[13, 63, 14, 64, 15, 65]),
        ]
        .concat();
        let oximeter = Oximeter::new(MockTransport::new(bytes));
        let cancel = CancellationToken::new();

        let (mut rx, handle) =
            oximeter.spawn_storage(StorageRequest::default(), 1, cancel.clone());
        let first = rx.recv().await.unwrap();
        assert_eq!(first.spo2, 10);
        cancel.cancel();
        let (oximeter, result) = handle.await.unwrap();

        assert_eq!(result.unwrap(), SessionEnd::Cancelled);
        assert_eq!(
            oximeter.into_transport().sent_opcodes(),
            vec![START_STORAGE, STOP_STORAGE]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_during_slow_stream() {
        let bytes = [
            packet(0x01, &realtime_payload(97, 60)),
            packet(0x01, &realtime_payload(98, 61)),
        ]
        .concat();
        let mut transport = MockTransport::new(bytes);
        transport.read_delay = Some(Duration::from_millis(400));
        let mut oximeter = Oximeter::new(transport);

        let (tx, rx) = mpsc::channel(16);
        oximeter
            .realtime_data(tx, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(collect(rx).await.len(), 2);

        let opcodes = oximeter.transport().sent_opcodes();
        assert_eq!(opcodes.first(), Some(&START_REALTIME));
        assert_eq!(opcodes.last(), Some(&STOP_REALTIME));
        assert!(opcodes.contains(&0xaf));
    }

    #[tokio::test]
    async fn test_spawned_session_zero_capacity() {
        let transport = MockTransport::new(packet(0x01, &realtime_payload(97, 60)));
        let oximeter = Oximeter::new(transport);

        let (rx, handle) = oximeter.spawn_realtime(0, CancellationToken::new());
        let records = collect(rx).await;
        let (_, result) = handle.await.unwrap();

        assert_eq!(result.unwrap(), SessionEnd::Completed);
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_interval_out_of_range() {
        let config = crate::client::SessionConfig::default().storage_interval(Duration::MAX);
        let transport = MockTransport::new(packet(0x0f, &[97, 60, 0, 0, 0, 0]));
        let mut oximeter = Oximeter::new(transport).with_session_config(config);

        let (tx, rx) = mpsc::channel(16);
        let result = oximeter
            .storage_data(StorageRequest::default(), tx, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
        assert!(collect(rx).await.is_empty());
        assert!(oximeter.transport().sent.is_empty());
    }

    #[tokio::test]
    async fn test_storage_gap_carries_to_next_package() {
        let bytes = [
            packet(0x0f, &[10, 60, 0, 0, 0, 0]),
            packet(0x0f, &[20, 70, 0, 0, 0, 0]),
        ]
        .concat();
        let mut oximeter = Oximeter::new(MockTransport::new(bytes));

        let (tx, rx) = mpsc::channel(16);
        let request = StorageRequest::default().start_time(t0());
        oximeter
            .storage_data(request, tx, &CancellationToken::new())
            .await
            .unwrap();
        let times: Vec<NaiveDateTime> = collect(rx).await.iter().map(|r| r.time).collect();

        assert_eq!(times, vec![t0(), t0() + TimeDelta::seconds(3)]);
    }

    #[tokio::test]
    async fn test_session_state_transitions() {
        let transport = MockTransport::new(packet(0x01, &realtime_payload(97, 60)));
        let mut oximeter = Oximeter::new(transport);
        let mut session = Session::new(&mut oximeter, SessionKind::Realtime);
        assert_eq!(session.state, SessionState::Idle);

        session.start().await.unwrap();
        assert_eq!(session.state, SessionState::Started);

        assert!(session.next_package().await.unwrap().is_some());
        assert_eq!(session.state, SessionState::Streaming);
        assert!(session.next_package().await.unwrap().is_none());

        let end = session.close(Ok(SessionEnd::Completed)).await.unwrap();
        assert_eq!(end, SessionEnd::Completed);
        assert_eq!(
            oximeter.transport().sent_opcodes(),
            vec![START_REALTIME, STOP_REALTIME]
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Errored.is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
    }
}
