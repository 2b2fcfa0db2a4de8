use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::frame::{checked_word, parse_frame};
use crate::{Command, Config, FRAME_LEN, SCD40Error, SCD40Reading, STOP_DELAY_MS, State, SubField};

/// SCD40 session for `embedded-hal-async` buses, e.g. Embassy's I2C driver.
///
/// Same protocol and errors as [`SCD40Sensor`](crate::SCD40Sensor). Each bus
/// transfer is awaited before the next one starts. A failed read transfer is
/// reported as `FrameLength { received: 0 }`.
pub struct SCD40AsyncSensor<'a, T: I2c, D: DelayNs> {
    i2c: &'a mut T,
    delay: D,
    config: Config,
    state: State,
}

impl<'a, T: I2c, D: DelayNs> SCD40AsyncSensor<'a, T, D> {
    pub fn new(i2c: &'a mut T, delay: D) -> Self {
        Self::with_config(i2c, delay, Config::default())
    }

    pub fn with_config(i2c: &'a mut T, delay: D, config: Config) -> Self {
        Self {
            i2c,
            delay,
            config,
            state: State::Idle,
        }
    }

    pub fn is_measuring(&self) -> bool {
        self.state == State::Measuring
    }

    pub async fn start(&mut self) -> Result<(), SCD40Error> {
        self.i2c_write(Command::StartPeriodicMeasurement).await?;
        self.delay
            .delay_ms(self.config.effective_settling_delay_ms())
            .await;
        info!("SCD40 state: {:?} -> Measuring", self.state);
        self.state = State::Measuring;
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), SCD40Error> {
        self.i2c_write(Command::StopPeriodicMeasurement).await?;
        self.delay.delay_ms(STOP_DELAY_MS).await;
        info!("SCD40 state: {:?} -> Idle", self.state);
        self.state = State::Idle;
        Ok(())
    }

    pub async fn read_data(&mut self) -> Result<SCD40Reading, SCD40Error> {
        if self.state != State::Measuring {
            warn!("read_data called before start");
            return Err(SCD40Error::NotStarted);
        }

        self.i2c_write(Command::ReadMeasurement).await?;
        let mut buf = [0u8; FRAME_LEN];
        self.i2c_read(&mut buf).await?;
        let reading = parse_frame(&buf)?;
        debug!(
            "CO2: {} ppm, temperature: {} C, humidity: {} %",
            reading.co2_ppm,
            reading.temperature_c,
            reading.humidity_percent
        );
        Ok(reading)
    }

    pub async fn data_ready(&mut self) -> Result<bool, SCD40Error> {
        self.i2c_write(Command::GetDataReadyStatus).await?;
        let mut buf = [0u8; 3];
        self.i2c_read(&mut buf).await?;
        match checked_word(&buf, 0, 2) {
            Some(status) => Ok(status & 0x07ff != 0),
            None => Err(SCD40Error::Checksum(SubField::Status)),
        }
    }

    async fn i2c_write(&mut self, command: Command) -> Result<(), SCD40Error> {
        trace!("-> {:?}", command);
        match self.i2c.write(self.config.address, &command.to_be_bytes()).await {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!("{:?} was not acknowledged", command);
                Err(SCD40Error::TransmitFailure)
            }
        }
    }

    async fn i2c_read(&mut self, read: &mut [u8]) -> Result<(), SCD40Error> {
        match self.i2c.read(self.config.address, read).await {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!("read of {} bytes failed", read.len());
                Err(SCD40Error::FrameLength { received: 0 })
            }
        }
    }
}
