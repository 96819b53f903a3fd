use std::{error::Error, fmt};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use optics_lab_core::SimulationParams;
use serde::{Deserialize, Serialize};

const SNAPSHOT_DOMAIN: &str = "lab";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
pub(crate) const SNAPSHOT_HEADER: &str = "lab:v1";
/// Delimiter used to separate the prefix, run dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Everything needed to redraw a run exactly: its parameters and its seed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RunSnapshot {
    /// Parameters of the captured run.
    pub params: SimulationParams,
    /// Seed the ensemble was drawn from.
    pub seed: u64,
}

impl RunSnapshot {
    /// Encodes the snapshot into a single-line string suitable for clipboard transfer.
    pub(crate) fn encode(&self) -> Result<String, RunTransferError> {
        let payload = SerializableSnapshot {
            params: self.params,
            seed: self.seed,
        };
        let json = serde_json::to_vec(&payload).map_err(RunTransferError::InvalidPayload)?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!(
            "{SNAPSHOT_HEADER}:{}x{}:{encoded}",
            self.params.particle_count, self.params.max_turns
        ))
    }

    /// Decodes a snapshot from the provided string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, RunTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(RunTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(RunTransferError::MissingPrefix)?;
        let version = parts.next().ok_or(RunTransferError::MissingVersion)?;
        let dimensions = parts.next().ok_or(RunTransferError::MissingDimensions)?;
        let payload = parts.next().ok_or(RunTransferError::MissingPayload)?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(RunTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(RunTransferError::UnsupportedVersion(version.to_owned()));
        }

        let (particles, turns) = parse_dimensions(dimensions)?;
        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(RunTransferError::InvalidEncoding)?;
        let decoded: SerializableSnapshot =
            serde_json::from_slice(&bytes).map_err(RunTransferError::InvalidPayload)?;

        if decoded.params.particle_count != particles || decoded.params.max_turns != turns {
            return Err(RunTransferError::DimensionMismatch(dimensions.to_owned()));
        }

        Ok(Self {
            params: decoded.params,
            seed: decoded.seed,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct SerializableSnapshot {
    params: SimulationParams,
    seed: u64,
}

/// Errors that can occur while encoding or decoding run transfer strings.
#[derive(Debug)]
pub(crate) enum RunTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the encoded snapshot.
    MissingPrefix,
    /// The encoded snapshot did not contain a version segment.
    MissingVersion,
    /// The encoded snapshot did not include the run dimensions.
    MissingDimensions,
    /// The encoded snapshot did not include the payload segment.
    MissingPayload,
    /// The encoded snapshot used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The encoded snapshot used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The run dimensions could not be parsed from the encoded snapshot.
    InvalidDimensions(String),
    /// The run dimensions disagree with the parameters in the payload.
    DimensionMismatch(String),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The payload could not be serialised or deserialised.
    InvalidPayload(serde_json::Error),
}

impl fmt::Display for RunTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "snapshot string was empty"),
            Self::MissingPrefix => write!(f, "snapshot string is missing the prefix"),
            Self::MissingVersion => write!(f, "snapshot string is missing the version"),
            Self::MissingDimensions => write!(f, "snapshot string is missing the run dimensions"),
            Self::MissingPayload => write!(f, "snapshot string is missing the payload"),
            Self::InvalidPrefix(prefix) => {
                write!(f, "snapshot prefix '{prefix}' is not supported")
            }
            Self::UnsupportedVersion(version) => {
                write!(f, "snapshot version '{version}' is not supported")
            }
            Self::InvalidDimensions(dimensions) => {
                write!(f, "could not parse run dimensions '{dimensions}'")
            }
            Self::DimensionMismatch(dimensions) => {
                write!(f, "run dimensions '{dimensions}' do not match the payload")
            }
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode snapshot payload: {error}")
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not process snapshot payload: {error}")
            }
        }
    }
}

impl Error for RunTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) => Some(error),
            _ => None,
        }
    }
}

fn parse_dimensions(dimensions: &str) -> Result<(usize, u32), RunTransferError> {
    let invalid = || RunTransferError::InvalidDimensions(dimensions.to_owned());
    let (particles, turns) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;

    let particles = particles
        .trim()
        .parse::<usize>()
        .map_err(|_| invalid())?;
    let turns = turns.trim().parse::<u32>().map_err(|_| invalid())?;

    if particles == 0 || turns == 0 {
        return Err(invalid());
    }

    Ok((particles, turns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_run_survives_transfer() {
        let snapshot = RunSnapshot {
            params: SimulationParams::default(),
            seed: 42,
        };

        let encoded = snapshot.encode().expect("snapshot encodes");
        assert!(encoded.starts_with(&format!("{SNAPSHOT_HEADER}:5000x200:")));

        let decoded = RunSnapshot::decode(&encoded).expect("snapshot decodes");
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn edited_run_survives_transfer() {
        let snapshot = RunSnapshot {
            params: SimulationParams {
                tune: 0.287,
                tune_spread: 0.0045,
                kick: 0.0,
                alpha: -1.25,
                beta: 7.5,
                particle_count: 64,
                max_turns: 12,
                ..SimulationParams::default()
            },
            seed: u64::MAX,
        };

        let encoded = snapshot.encode().expect("snapshot encodes");
        let decoded = RunSnapshot::decode(&format!("  {encoded}\n")).expect("snapshot decodes");

        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn foreign_prefix_is_rejected() {
        let error = RunSnapshot::decode("beam:v1:4x4:e30").expect_err("foreign prefix");

        assert!(matches!(error, RunTransferError::InvalidPrefix(prefix) if prefix == "beam"));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let error = RunSnapshot::decode("lab:v1:0x10:e30").expect_err("empty ensemble");

        assert!(matches!(error, RunTransferError::InvalidDimensions(_)));
    }

    #[test]
    fn tampered_dimensions_are_detected() {
        let snapshot = RunSnapshot {
            params: SimulationParams::default(),
            seed: 7,
        };
        let encoded = snapshot.encode().expect("snapshot encodes");
        let tampered = encoded.replacen("5000x200", "5000x300", 1);

        let error = RunSnapshot::decode(&tampered).expect_err("dimensions disagree");

        assert!(matches!(error, RunTransferError::DimensionMismatch(_)));
    }
}
