use crate::frame::{checked_word, parse_frame};
use crate::transport::Transport;
use crate::{Command, Config, FRAME_LEN, SCD40Error, SCD40Reading, STOP_DELAY_MS, State, SubField};

const DATA_READY_LEN: usize = 3;
const DATA_READY_MASK: u16 = 0x07ff;

/// SCD40 session over a [`Transport`].
///
/// Every call blocks until the bus traffic it triggers is complete. The driver
/// does no locking; it owns the transport for its whole lifetime.
pub struct SCD40Sensor<T: Transport> {
    transport: T,
    config: Config,
    state: State,
}

impl<T: Transport> SCD40Sensor<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, Config::default())
    }

    pub fn with_config(transport: T, config: Config) -> Self {
        Self {
            transport,
            config,
            state: State::Idle,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// True once [`start`](Self::start) succeeded and until [`stop`](Self::stop).
    pub fn is_measuring(&self) -> bool {
        self.state == State::Measuring
    }

    /// Starts periodic measurement and waits out the settling delay.
    ///
    /// On `TransmitFailure` the session stays idle; calling `start` again is
    /// the way to recover.
    pub fn start(&mut self) -> Result<(), SCD40Error> {
        self.command(Command::StartPeriodicMeasurement)?;
        self.transport
            .delay_ms(self.config.effective_settling_delay_ms());
        info!("SCD40 state: {:?} -> Measuring", self.state);
        self.state = State::Measuring;
        Ok(())
    }

    /// Stops periodic measurement. Takes 500 ms.
    pub fn stop(&mut self) -> Result<(), SCD40Error> {
        self.command(Command::StopPeriodicMeasurement)?;
        self.transport.delay_ms(STOP_DELAY_MS);
        info!("SCD40 state: {:?} -> Idle", self.state);
        self.state = State::Idle;
        Ok(())
    }

    /// Fetches, validates and converts one measurement frame.
    ///
    /// Requires a prior successful [`start`](Self::start); otherwise returns
    /// `NotStarted` without touching the bus. Words are checked CO2 first,
    /// then temperature, then humidity, and the first mismatch is reported.
    pub fn read_data(&mut self) -> Result<SCD40Reading, SCD40Error> {
        if self.state != State::Measuring {
            warn!("read_data called before start");
            return Err(SCD40Error::NotStarted);
        }

        self.command(Command::ReadMeasurement)?;
        let frame: [u8; FRAME_LEN] = self.receive()?;
        let reading = parse_frame(&frame)?;
        debug!(
            "CO2: {} ppm, temperature: {} C, humidity: {} %",
            reading.co2_ppm,
            reading.temperature_c,
            reading.humidity_percent
        );
        Ok(reading)
    }

    /// Whether a new measurement is waiting to be read.
    pub fn data_ready(&mut self) -> Result<bool, SCD40Error> {
        self.command(Command::GetDataReadyStatus)?;
        let reply: [u8; DATA_READY_LEN] = self.receive()?;
        let status = checked_word(&reply, 0, 2).ok_or_else(|| {
            warn!("CRC mismatch in data ready status");
            SCD40Error::Checksum(SubField::Status)
        })?;
        Ok(status & DATA_READY_MASK != 0)
    }

    /// Gives back the transport.
    pub fn release(self) -> T {
        self.transport
    }

    fn command(&mut self, command: Command) -> Result<(), SCD40Error> {
        self.transport
            .send_command(self.config.address, command)
            .map_err(|_e| {
                warn!("{:?} was not acknowledged", command);
                SCD40Error::TransmitFailure
            })
    }

    fn receive<const N: usize>(&mut self) -> Result<[u8; N], SCD40Error> {
        let available = self.transport.request_bytes(self.config.address, N);
        if available != N {
            warn!("expected {} bytes, {} available", N, available);
            return Err(SCD40Error::FrameLength { received: available });
        }

        let mut buf = [0u8; N];
        for byte in buf.iter_mut() {
            *byte = self.transport.receive_byte();
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::tests::build_frame;
    use float_cmp::approx_eq;
    use std::collections::VecDeque;
    use std::vec::Vec;

    /// Replays canned replies and records everything the driver sends.
    #[derive(Default)]
    struct ScriptedTransport {
        sent: Vec<Vec<u8>>,
        delays: Vec<u32>,
        nack_next: usize,
        replies: VecDeque<Vec<u8>>,
        requested: Vec<usize>,
        pending: VecDeque<u8>,
    }

    impl ScriptedTransport {
        fn reply(mut self, bytes: &[u8]) -> Self {
            self.replies.push_back(bytes.to_vec());
            self
        }

        fn nack(mut self, writes: usize) -> Self {
            self.nack_next = writes;
            self
        }
    }

    impl Transport for ScriptedTransport {
        type Error = ();

        fn transmit(&mut self, address: u8, bytes: &[u8]) -> Result<(), ()> {
            assert_eq!(address, 0x62);
            if self.nack_next > 0 {
                self.nack_next -= 1;
                return Err(());
            }
            self.sent.push(bytes.to_vec());
            Ok(())
        }

        fn request_bytes(&mut self, address: u8, count: usize) -> usize {
            assert_eq!(address, 0x62);
            self.requested.push(count);
            self.pending = self.replies.pop_front().unwrap_or_default().into();
            self.pending.len()
        }

        fn receive_byte(&mut self) -> u8 {
            self.pending.pop_front().expect("receive_byte past end of reply")
        }

        fn delay_ms(&mut self, ms: u32) {
            self.delays.push(ms);
        }
    }

    fn started(transport: ScriptedTransport) -> SCD40Sensor<ScriptedTransport> {
        let mut sensor = SCD40Sensor::new(transport);
        sensor.start().unwrap();
        sensor
    }

    #[test]
    fn start_sends_command_and_settles() {
        let mut sensor = SCD40Sensor::new(ScriptedTransport::default());
        assert!(!sensor.is_measuring());
        sensor.start().unwrap();
        assert!(sensor.is_measuring());

        let transport = sensor.release();
        assert_eq!(transport.sent, vec![vec![0x21, 0xb1]]);
        assert_eq!(transport.delays, vec![10]);
    }

    #[test]
    fn configured_settling_delay_is_clamped() {
        let config = Config {
            settling_delay_ms: 1,
            ..Default::default()
        };
        let mut sensor = SCD40Sensor::with_config(ScriptedTransport::default(), config);
        sensor.start().unwrap();
        assert_eq!(sensor.release().delays, vec![10]);
    }

    #[test]
    fn failed_start_stays_idle_and_can_be_retried() {
        let mut sensor = SCD40Sensor::new(ScriptedTransport::default().nack(1));
        assert_eq!(sensor.start(), Err(SCD40Error::TransmitFailure));
        assert!(!sensor.is_measuring());
        assert_eq!(sensor.read_data(), Err(SCD40Error::NotStarted));

        sensor.start().unwrap();
        assert!(sensor.is_measuring());
        let transport = sensor.release();
        assert_eq!(transport.sent, vec![vec![0x21, 0xb1]]);
        assert_eq!(transport.delays, vec![10]);
    }

    #[test]
    fn read_before_start_touches_nothing() {
        let mut sensor = SCD40Sensor::new(ScriptedTransport::default());
        assert_eq!(sensor.read_data(), Err(SCD40Error::NotStarted));
        let transport = sensor.release();
        assert!(transport.sent.is_empty());
        assert!(transport.requested.is_empty());
    }

    #[test]
    fn read_returns_converted_values() {
        let frame = build_frame(400, 26214, 32768);
        let mut sensor = started(ScriptedTransport::default().reply(&frame));

        let reading = sensor.read_data().unwrap();
        assert_eq!(reading.co2_ppm, 400);
        assert!(approx_eq!(f32, reading.temperature_c, 24.99893, epsilon = 1e-4));
        assert!(approx_eq!(f32, reading.humidity_percent, 50.0, epsilon = 1e-4));

        let transport = sensor.release();
        assert_eq!(transport.sent, vec![vec![0x21, 0xb1], vec![0xec, 0x05]]);
        assert_eq!(transport.requested, vec![9]);
    }

    #[test]
    fn wrong_length_is_reported_before_crc() {
        for len in [0usize, 8, 10] {
            let reply = vec![0xffu8; len];
            let mut sensor = started(ScriptedTransport::default().reply(&reply));
            assert_eq!(
                sensor.read_data(),
                Err(SCD40Error::FrameLength { received: len })
            );
            assert!(sensor.is_measuring());
        }
    }

    #[test]
    fn corrupted_word_fails_whole_read() {
        let mut frame = build_frame(600, 20000, 40000);
        frame[6] ^= 0x04;
        let mut sensor = started(ScriptedTransport::default().reply(&frame));
        assert_eq!(
            sensor.read_data(),
            Err(SCD40Error::Checksum(SubField::Humidity))
        );
    }

    #[test]
    fn read_nack_is_transmit_failure() {
        let mut sensor = started(ScriptedTransport::default());
        sensor.transport.nack_next = 1;
        assert_eq!(sensor.read_data(), Err(SCD40Error::TransmitFailure));
        assert!(sensor.release().requested.is_empty());
    }

    #[test]
    fn stop_returns_to_idle() {
        let mut sensor = started(ScriptedTransport::default());
        sensor.stop().unwrap();
        assert!(!sensor.is_measuring());
        assert_eq!(sensor.read_data(), Err(SCD40Error::NotStarted));

        let transport = sensor.release();
        assert_eq!(transport.sent, vec![vec![0x21, 0xb1], vec![0x3f, 0x86]]);
        assert_eq!(transport.delays, vec![10, 500]);
    }

    #[test]
    fn failed_stop_keeps_measuring() {
        let mut sensor = started(ScriptedTransport::default());
        sensor.transport.nack_next = 1;
        assert_eq!(sensor.stop(), Err(SCD40Error::TransmitFailure));
        assert!(sensor.is_measuring());
    }

    #[test]
    fn data_ready_status() {
        let ready = 0x8006u16.to_be_bytes();
        let not_ready = 0x8000u16.to_be_bytes();
        let transport = ScriptedTransport::default()
            .reply(&[ready[0], ready[1], crate::sensirion_crc8(&ready)])
            .reply(&[not_ready[0], not_ready[1], crate::sensirion_crc8(&not_ready)])
            .reply(&[ready[0], ready[1], 0x00]);
        let mut sensor = started(transport);

        assert_eq!(sensor.data_ready(), Ok(true));
        assert_eq!(sensor.data_ready(), Ok(false));
        assert_eq!(
            sensor.data_ready(),
            Err(SCD40Error::Checksum(SubField::Status))
        );
        assert_eq!(sensor.release().requested, vec![3, 3, 3]);
    }
}
