#![no_std]
#![no_main]

use defmt::{error, info};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::i2c;
use embassy_scd40_sensor::{I2cTransport, SCD40Error, SCD40Sensor};
use embassy_time::{Delay, Duration, Timer};
use panic_probe as _;

#[embassy_executor::main]
async fn main(_spawner: Spawner) -> ! {
    let p = embassy_rp::init(Default::default());

    let sda = p.PIN_0;
    let scl = p.PIN_1;

    // Configure I2C
    let i2c = i2c::I2c::new_blocking(p.I2C0, scl, sda, Default::default());

    // Create sensor instance
    let mut sensor = SCD40Sensor::new(I2cTransport::new(i2c, Delay));

    while let Err(e) = sensor.start() {
        error!("Start failed: {:?}", e);
        Timer::after(Duration::from_secs(1)).await;
    }

    // The sensor publishes a new measurement every 5 seconds
    loop {
        Timer::after(Duration::from_secs(5)).await;

        match sensor.read_data() {
            Ok(data) => {
                info!(
                    "Temperature: {}°C, Humidity: {}%, CO2: {} ppm",
                    data.temperature_c, data.humidity_percent, data.co2_ppm
                );
            }
            Err(e) => match e {
                SCD40Error::TransmitFailure => error!("I2C communication error"),
                SCD40Error::FrameLength { received } => error!("Short frame: {} bytes", received),
                SCD40Error::Checksum(field) => error!("CRC error in {:?}", field),
                SCD40Error::NotStarted => error!("Sensor not started"),
            },
        }
    }
}
