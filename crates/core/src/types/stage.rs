//! Pressure-injury stages recorded by a classification.

use serde::{Deserialize, Serialize};

/// Error returned when a string is not a known [`Stage`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stage: {0} (expected one of estagio1, estagio2, estagio3, estagio4, nao_classificavel, dtpi)")]
pub struct StageError(pub String);

/// Pressure-injury staging category.
///
/// The wire values are the backend's identifiers and double as the
/// `stage` query parameter of the staged batch upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 1: intact skin with non-blanchable erythema.
    Estagio1,
    /// Stage 2: partial-thickness skin loss with exposed dermis.
    Estagio2,
    /// Stage 3: full-thickness skin loss.
    Estagio3,
    /// Stage 4: full-thickness skin and tissue loss.
    Estagio4,
    /// Unstageable: obscured full-thickness loss.
    NaoClassificavel,
    /// Deep tissue pressure injury.
    Dtpi,
}

impl Stage {
    /// Every stage, in clinical order.
    pub const ALL: [Self; 6] = [
        Self::Estagio1,
        Self::Estagio2,
        Self::Estagio3,
        Self::Estagio4,
        Self::NaoClassificavel,
        Self::Dtpi,
    ];

    /// Backend identifier for this stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Estagio1 => "estagio1",
            Self::Estagio2 => "estagio2",
            Self::Estagio3 => "estagio3",
            Self::Estagio4 => "estagio4",
            Self::NaoClassificavel => "nao_classificavel",
            Self::Dtpi => "dtpi",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| StageError(s.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde() {
        for stage in Stage::ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{stage}\""));
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!("estagio2".parse::<Stage>().unwrap(), Stage::Estagio2);
        assert_eq!(" DTPI ".parse::<Stage>().unwrap(), Stage::Dtpi);
        assert_eq!(
            "nao_classificavel".parse::<Stage>().unwrap(),
            Stage::NaoClassificavel
        );
    }

    #[test]
    fn test_from_str_invalid() {
        let err = "estagio5".parse::<Stage>().unwrap_err();
        assert_eq!(err, StageError("estagio5".to_string()));
        assert!(err.to_string().starts_with("invalid stage: estagio5"));
    }
}
