//! A [PressureSource] that replays recorded sensor readings.
//!
//! Each line holds one JSON object: `{"channel": 0, "pressure": 12, "time_ms": 40}`.
//! Blank lines and lines starting with `#` are skipped.

use std::io::BufRead;
use log::trace;
use serde::Deserialize;
use keysense_gpio::{GpioError, GpioResult};
use keysense_gpio::touch::{PressureSample, PressureSource};

#[derive(Deserialize)]
struct ReplayLine {
    channel: u8,
    pressure: u8,
    time_ms: u64,
}

pub struct ReplaySource<R> {
    reader: R,
    line_no: usize,
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        ReplaySource { reader, line_no: 0 }
    }
}

impl<R: BufRead> PressureSource for ReplaySource<R> {
    fn next_sample(&mut self) -> GpioResult<Option<PressureSample>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let parsed: ReplayLine = serde_json::from_str(trimmed)
                .map_err(|e| GpioError::Other(format!("replay line {}: {}", self.line_no, e)))?;
            let sample = PressureSample {
                channel: parsed.channel,
                pressure: parsed.pressure,
                time_ms: parsed.time_ms,
            };
            trace!("{:?}", sample);
            return Ok(Some(sample));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_samples_in_order() {
        let input = "# warm-up\n\n{\"channel\": 1, \"pressure\": 5, \"time_ms\": 10}\n{\"channel\": 0, \"pressure\": 255, \"time_ms\": 15}\n";
        let mut source = ReplaySource::new(input.as_bytes());

        assert_eq!(
            source.next_sample(),
            Ok(Some(PressureSample { channel: 1, pressure: 5, time_ms: 10 }))
        );
        assert_eq!(
            source.next_sample(),
            Ok(Some(PressureSample { channel: 0, pressure: 255, time_ms: 15 }))
        );
        assert_eq!(source.next_sample(), Ok(None));
    }

    #[test]
    fn reports_the_bad_line() {
        let input = "{\"channel\": 1, \"pressure\": 5, \"time_ms\": 10}\n{\"channel\": 1, \"pressure\": 300, \"time_ms\": 11}\n";
        let mut source = ReplaySource::new(input.as_bytes());
        source.next_sample().unwrap();

        match source.next_sample() {
            Err(GpioError::Other(message)) => assert!(message.starts_with("replay line 2")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
