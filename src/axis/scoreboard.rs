use std::collections::VecDeque;

use futures::stream::{self, StreamExt};
use futures_channel::mpsc::UnboundedReceiver;

use crate::axis::packet::Packet;
use crate::axis::report::{CompareConfig, LogPrinter, MismatchReport, ReportPrinter};
use crate::error::{TestResult, VerifyError};
use crate::tb_obj::TbObj;

struct ScoreboardInner {
    exp_q: VecDeque<Packet>,
    recv_q: VecDeque<Packet>,
    expected: usize,
    received: usize,
    matched: usize,
    errors: usize,
    // sticky
    failed: bool,
    config: CompareConfig,
    reports: Vec<MismatchReport>,
    printer: Box<dyn ReportPrinter>,
}

enum Side {
    Rx,
    Tx,
}

/// In-order comparison of the reference (rx) and observed (tx) packet
/// streams.
#[derive(Clone)]
pub struct Scoreboard(TbObj<ScoreboardInner>);

impl Scoreboard {
    pub fn new(config: CompareConfig) -> Self {
        Self(TbObj::new(ScoreboardInner {
            exp_q: VecDeque::new(),
            recv_q: VecDeque::new(),
            expected: 0,
            received: 0,
            matched: 0,
            errors: 0,
            failed: false,
            config,
            reports: Vec::new(),
            printer: Box::new(LogPrinter),
        }))
    }

    /// Replaces the default `LogPrinter`.
    pub fn with_printer(self, printer: impl ReportPrinter + 'static) -> Self {
        self.0.get_mut().printer = Box::new(printer);
        self
    }

    /// Adds a reference packet.
    pub fn add_exp(&self, packet: Packet) {
        self.0.with_mut(|s| {
            s.exp_q.push_back(packet);
            s.expected += 1;
        });
        self.compare();
    }

    /// Adds an observed packet.
    pub fn add_recv(&self, packet: Packet) {
        self.0.with_mut(|s| {
            s.recv_q.push_back(packet);
            s.received += 1;
        });
        self.compare();
    }

    fn compare(&self) {
        self.0.with_mut(|s| {
            while !s.exp_q.is_empty() && !s.recv_q.is_empty() {
                let (exp, recv) = match (s.exp_q.pop_front(), s.recv_q.pop_front()) {
                    (Some(exp), Some(recv)) => (exp, recv),
                    _ => break,
                };
                let pair = s.matched + s.errors;
                match MismatchReport::compare(pair, &exp, &recv, &s.config) {
                    None => s.matched += 1,
                    Some(report) => {
                        s.errors += 1;
                        s.failed = true;
                        s.printer.print(&report);
                        s.reports.push(report);
                    }
                }
            }
        });
    }

    /// Consumes both analysis ports until they close.
    pub async fn run(self, rx: UnboundedReceiver<Packet>, tx: UnboundedReceiver<Packet>) {
        log::info!("scoreboard: run phase");
        let mut packets = stream::select(rx.map(|p| (Side::Rx, p)), tx.map(|p| (Side::Tx, p)));
        while let Some((side, packet)) = packets.next().await {
            match side {
                Side::Rx => self.add_exp(packet),
                Side::Tx => self.add_recv(packet),
            }
        }
    }

    /// No mismatch seen so far.
    pub fn passed(&self) -> bool {
        !self.failed()
    }

    pub fn failed(&self) -> bool {
        self.0.get().failed
    }

    /// Pass requires no mismatch, at least one compared pair and nothing
    /// left unpaired.
    pub fn result(&self) -> TestResult {
        let inner = self.0.get();
        if inner.failed {
            return Err(VerifyError::EquivalenceMismatch {
                mismatches: inner.errors,
            });
        }
        if inner.expected == 0 || !inner.exp_q.is_empty() || !inner.recv_q.is_empty() {
            drop(inner);
            return Err(VerifyError::TestFailed(self.result_str()));
        }
        drop(inner);
        Ok(self.result_str())
    }

    pub fn result_str(&self) -> String {
        let inner = self.0.get();
        format!(
            "expected={}, received={}, matched={}, errors={}, expQ: {}, recvQ: {}",
            inner.expected,
            inner.received,
            inner.matched,
            inner.errors,
            inner.exp_q.len(),
            inner.recv_q.len()
        )
    }

    pub fn reports(&self) -> Vec<MismatchReport> {
        self.0.get().reports.clone()
    }

    pub fn mismatches(&self) -> usize {
        self.0.get().errors
    }

    pub fn matched(&self) -> usize {
        self.0.get().matched
    }
}
