//! Keyboard teleoperation: map console tokens onto timed motor pulses.
//!
//! The mapping is stateless.  Each recognized token fires one pulse and the
//! loop goes back to waiting for input; anything unrecognized is logged and
//! dropped without touching the motors.
//!
//! Input arrives through the [`InputSource`] trait so the console reader can
//! be swapped for a scripted sequence in tests.

use std::time::Duration;

use async_trait::async_trait;
use nxtbot_hal::MotorGateway;
use nxtbot_types::{Motor, NxtError};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

/// Configuration bundle for [`Teleop`].
#[derive(Debug, Clone)]
pub struct TeleopConfig {
    /// Left wheel motor.
    pub left: Motor,
    /// Right wheel motor.
    pub right: Motor,
    /// Pulse effort; reverse pulses run at its negation.
    pub effort: f64,
    /// Pulse length for the `w` (forward) token.
    pub forward_pulse: Duration,
    /// Pulse length for the `s` (reverse) token.
    pub reverse_pulse: Duration,
    /// Pulse length for the `a`/`d` (single-wheel turn) tokens.
    pub turn_pulse: Duration,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            left: Motor::C,
            right: Motor::B,
            effort: 1.0,
            forward_pulse: Duration::from_millis(150),
            reverse_pulse: Duration::from_millis(200),
            turn_pulse: Duration::from_millis(100),
        }
    }
}

/// A source of teleoperation tokens.
///
/// # Contract
///
/// * `next_token` – yields the next token, or `None` once the source is
///   exhausted (stdin EOF, script drained).  The teleop loop ends on `None`.
#[async_trait]
pub trait InputSource: Send {
    /// Yield the next token, or `None` when there is no more input.
    async fn next_token(&mut self) -> Option<String>;
}

/// Line-buffered console input.
///
/// Each line is trimmed and treated as one token; blank lines are skipped.
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSource for StdinInput {
    async fn next_token(&mut self) -> Option<String> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    let token = line.trim().to_owned();
                    if !token.is_empty() {
                        return Some(token);
                    }
                }
                Ok(None) => return None,
                Err(err) => {
                    warn!(error = %err, "console read failed, ending teleop input");
                    return None;
                }
            }
        }
    }
}

/// The token-to-pulse mapping.
pub struct Teleop {
    gateway: MotorGateway,
    config: TeleopConfig,
}

impl Teleop {
    pub fn new(gateway: MotorGateway, config: TeleopConfig) -> Self {
        Self { gateway, config }
    }

    /// Consume tokens until the source is exhausted.
    pub async fn run<I: InputSource>(&self, mut input: I) -> Result<(), NxtError> {
        while let Some(token) = input.next_token().await {
            self.apply_token(&token).await?;
        }
        Ok(())
    }

    /// Fire the pulse a single token maps to.
    ///
    /// Returns `Ok(true)` when a pulse was issued, `Ok(false)` for tokens
    /// outside the mapping.
    pub async fn apply_token(&self, token: &str) -> Result<bool, NxtError> {
        match token.to_ascii_lowercase().as_str() {
            "w" => {
                self.gateway
                    .run_two_motors(
                        self.config.right,
                        self.config.left,
                        self.config.forward_pulse,
                        self.config.effort,
                    )
                    .await?;
                Ok(true)
            }
            "s" => {
                self.gateway
                    .run_two_motors(
                        self.config.right,
                        self.config.left,
                        self.config.reverse_pulse,
                        -self.config.effort,
                    )
                    .await?;
                Ok(true)
            }
            "a" => {
                self.gateway
                    .run_motor(self.config.right, self.config.turn_pulse, self.config.effort)
                    .await?;
                Ok(true)
            }
            "d" => {
                self.gateway
                    .run_motor(self.config.left, self.config.turn_pulse, self.config.effort)
                    .await?;
                Ok(true)
            }
            other => {
                info!(token = other, "ignoring unrecognized teleop token");
                Ok(false)
            }
        }
    }
}
