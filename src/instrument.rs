use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{DEFAULT_TIMEOUT, Endpoint, ScpiTransport};

/// How strictly the reply to `OUTP?` is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputParsing {
    /// `1` is on, `0` is off, anything else is a protocol error. Surrounding
    /// whitespace is ignored.
    #[default]
    Strict,
    /// On only when the reply is exactly `1`; any other reply is off.
    Lenient,
}

impl OutputParsing {
    fn parse(self, query: &str, reply: &str) -> Result<bool> {
        match self {
            OutputParsing::Strict => match reply.trim() {
                "1" => Ok(true),
                "0" => Ok(false),
                other => Err(Error::protocol(query, other, "expected output state 0 or 1")),
            },
            OutputParsing::Lenient => Ok(reply == "1"),
        }
    }
}

/// Snapshot assembled from seven consecutive queries.
///
/// The instrument may change state between those queries; the fields are not
/// guaranteed to describe a single instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub output_on: bool,
    pub measured_voltage: f64,
    pub measured_current: f64,
    pub set_voltage: f64,
    pub set_current: f64,
    pub ovp: f64,
    pub ocp: f64,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "out {}", if self.output_on { "yes" } else { "no" })?;
        writeln!(
            f,
            "voltage {} V / {} V / {} V",
            self.measured_voltage, self.set_voltage, self.ovp
        )?;
        write!(
            f,
            "current {} A / {} A / {} A",
            self.measured_current, self.set_current, self.ocp
        )
    }
}

pub struct PowerSupply<S = TcpStream> {
    inner: ScpiTransport<S>,
    output_parsing: OutputParsing,
}

impl PowerSupply<TcpStream> {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        Self::connect_with_timeout(endpoint, DEFAULT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(endpoint: &Endpoint, timeout: Duration) -> Result<Self> {
        let inner = ScpiTransport::open(endpoint, timeout).await?;
        Ok(Self::from_transport(inner))
    }
}

impl<S> PowerSupply<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn from_transport(inner: ScpiTransport<S>) -> Self {
        Self {
            inner,
            output_parsing: OutputParsing::default(),
        }
    }

    pub fn with_output_parsing(mut self, parsing: OutputParsing) -> Self {
        self.output_parsing = parsing;
        self
    }

    pub async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }

    /// Raw `*IDN?` reply, only the line terminator removed.
    pub async fn identity(&mut self) -> Result<String> {
        self.inner.query("*IDN?").await
    }

    pub async fn get_voltage(&mut self) -> Result<f64> {
        self.query_f64("VOLT?").await
    }

    pub async fn set_voltage(&mut self, volts: f64) -> Result<()> {
        self.inner.send(&format!("VOLT {volts}")).await
    }

    /// Programmed current limit. There is no setter: the delivered current
    /// follows from the load and the voltage.
    pub async fn get_current(&mut self) -> Result<f64> {
        self.query_f64("CURR?").await
    }

    pub async fn get_output(&mut self) -> Result<bool> {
        self.query_output().await
    }

    pub async fn set_output(&mut self, enabled: bool) -> Result<()> {
        self.inner
            .send(&format!("OUTP {}", u8::from(enabled)))
            .await
    }

    pub async fn get_ovp(&mut self) -> Result<f64> {
        self.query_f64("VOLT:PROT?").await
    }

    pub async fn set_ovp(&mut self, volts: f64) -> Result<()> {
        self.inner.send(&format!("VOLT:PROT {volts}")).await
    }

    pub async fn get_ocp(&mut self) -> Result<f64> {
        self.query_f64("CURR:PROT?").await
    }

    pub async fn set_ocp(&mut self, amps: f64) -> Result<()> {
        self.inner.send(&format!("CURR:PROT {amps}")).await
    }

    /// Read output state, readings, setpoints and protection limits.
    ///
    /// Aborts on the first failing query; no partial report is returned.
    pub async fn measure(&mut self) -> Result<Measurement> {
        let output_on = self.query_output().await?;
        let measured_voltage = self.query_f64("MEAS:VOLT?").await?;
        let measured_current = self.query_f64("MEAS:CURR?").await?;
        let set_voltage = self.query_f64("VOLT?").await?;
        let set_current = self.query_f64("CURR?").await?;
        let ovp = self.query_f64("VOLT:PROT?").await?;
        let ocp = self.query_f64("CURR:PROT?").await?;
        debug!("measure: complete");

        Ok(Measurement {
            output_on,
            measured_voltage,
            measured_current,
            set_voltage,
            set_current,
            ovp,
            ocp,
        })
    }

    async fn query_output(&mut self) -> Result<bool> {
        let resp = self.inner.query("OUTP?").await?;
        self.output_parsing.parse("OUTP?", &resp)
    }

    async fn query_f64(&mut self, query: &str) -> Result<f64> {
        let resp = self.inner.query(query).await?;
        parse_f64(query, &resp)
    }
}

fn parse_f64(query: &str, input: &str) -> Result<f64> {
    input
        .trim()
        .parse::<f64>()
        .map_err(|e| Error::protocol(query, input, format!("not a number: {e}")))
}
