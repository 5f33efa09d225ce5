/// Runtime configuration for the network layer.

#[cfg(feature = "serialize")]
use crate::error::SimResult;
use crate::runtime::DEFAULT_TTL;

/// Knobs that change how [`NetworkRuntime`](crate::runtime::NetworkRuntime)
/// reacts to events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct NetworkConfig {
    /// Recompute global routes on every effective interface transition.
    /// When off, only connected routes follow interface state and the
    /// global section keeps whatever the last full populate produced.
    pub respond_to_interface_events: bool,

    /// TTL stamped on packets that enter the network.
    pub default_ttl: u8,
}

impl NetworkConfig {
    /// Global routes track interface state.
    pub fn reactive() -> Self {
        NetworkConfig {
            respond_to_interface_events: true,
            ..Self::default()
        }
    }

    /// Global routes are computed once at start and never again.
    pub fn static_routes() -> Self {
        NetworkConfig {
            respond_to_interface_events: false,
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    #[cfg(feature = "serialize")]
    pub fn from_json(json: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            respond_to_interface_events: true,
            default_ttl: DEFAULT_TTL,
        }
    }
}
