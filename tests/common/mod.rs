#![allow(dead_code)]

use std::collections::VecDeque;

use axistb::prelude::*;

/// Device model: a FIFO of `depth` beats between an input and an output
/// bus, optionally flipping one payload byte of the first packet.
#[derive(Clone, Copy)]
pub struct StreamQueue {
    pub input: AxisBus,
    pub output: AxisBus,
    pub depth: usize,
    pub corrupt_byte: Option<usize>,
}

impl StreamQueue {
    pub fn new(input: AxisBus, output: AxisBus, depth: usize) -> Self {
        Self {
            input,
            output,
            depth: depth.max(1),
            corrupt_byte: None,
        }
    }

    pub fn corrupt_byte(mut self, index: usize) -> Self {
        self.corrupt_byte = Some(index);
        self
    }

    pub async fn run(self) {
        let mut fifo: VecDeque<Beat> = VecDeque::new();
        let mut presented = false;
        // position of the next input beat: (packet, first byte)
        let mut packet = 0usize;
        let mut offset = 0usize;
        loop {
            self.input.aclk_posedge().await;
            if !self.input.get_areset_n() {
                fifo.clear();
                presented = false;
                packet = 0;
                offset = 0;
                self.output.set_tvalid(false);
                self.input.set_tready(false);
                continue;
            }
            let input = self.input.sample();
            if presented && self.output.get_tvalid() && self.output.get_tready() {
                presented = false;
            }
            if input.handshake() {
                let mut beat = Beat {
                    lanes: input.lanes.clone(),
                    last: input.tlast,
                    tid: input.tid.clone(),
                    tdest: input.tdest.clone(),
                    tuser: input.tuser.clone(),
                };
                if let Some(k) = self.corrupt_byte {
                    if packet == 0 && (offset..offset + beat.lanes.len()).contains(&k) {
                        beat.lanes[k - offset].data ^= 0xff;
                    }
                }
                offset += beat.lanes.len();
                if beat.last {
                    packet += 1;
                    offset = 0;
                }
                fifo.push_back(beat);
            }
            if !presented {
                match fifo.pop_front() {
                    Some(beat) => {
                        self.output.drive(&beat);
                        presented = true;
                    }
                    None => self.output.set_tvalid(false),
                }
            }
            self.input.set_tready(fifo.len() < self.depth);
        }
    }
}

/// Clocked environment with a `StreamQueue` between the rx and tx buses.
pub struct Harness {
    pub aclk: SimObject,
    pub areset_n: SimObject,
    pub rx: AxisBus,
    pub tx: AxisBus,
}

impl Harness {
    pub fn new(config: &BusConfig) -> SimResult<Self> {
        let aclk = SimObject::new("aclk", 1)?;
        let areset_n = SimObject::new("areset_n", 1)?;
        let rx = AxisBus::new("rx", config, aclk, areset_n)?;
        let tx = AxisBus::new("tx", config, aclk, areset_n)?;
        Task::spawn(clock(aclk, 10, "ns"), "clock");
        Ok(Self {
            aclk,
            areset_n,
            rx,
            tx,
        })
    }

    pub fn reset_if(&self) -> ResetIf {
        ResetIf::new(self.aclk, self.areset_n)
    }

    pub fn start_dut(&self, dut: StreamQueue) {
        Task::spawn(dut.run(), "dut");
    }

    pub fn queue(&self, depth: usize) -> StreamQueue {
        StreamQueue::new(self.rx, self.tx, depth)
    }

    pub fn config(&self) -> TestbenchConfig {
        TestbenchConfig::new(self.rx, self.tx, self.reset_if())
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
