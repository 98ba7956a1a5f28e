use serde::{Deserialize, Serialize};

/// UartLink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UartLinkConfig {
    /// Frame boundary detection settings
    #[serde(default)]
    pub framing: FramingConfig,
    /// Dispatcher settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Frame boundary detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramingConfig {
    /// Separator byte terminating each frame
    #[serde(default = "default_separator")]
    pub separator: u8,
    /// Strip a carriage return immediately preceding the separator
    #[serde(default = "default_strip_carriage_return")]
    pub strip_carriage_return: bool,
}

/// Dispatcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Whether exchanged packets are retained for replay and backfill
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    /// Per-peer history cap; oldest packets are evicted first when set
    #[serde(default)]
    pub max_cached_packets: Option<usize>,
    /// Terminator appended to outbound text sends
    #[serde(default)]
    pub line_ending: LineEnding,
}

/// End-of-message terminator appended by `send_text`.
///
/// This is an outbound display convention, not part of the framing logic;
/// payloads reach the framer pre-terminated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    None,
    #[default]
    Lf,
    Cr,
    CrLf,
}

impl LineEnding {
    /// Append the terminator to an outbound payload.
    pub fn apply(&self, payload: &mut Vec<u8>) {
        payload.extend_from_slice(self.as_bytes());
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineEnding::None => b"",
            LineEnding::Lf => b"\n",
            LineEnding::Cr => b"\r",
            LineEnding::CrLf => b"\r\n",
        }
    }
}

// Default value functions
fn default_separator() -> u8 {
    b'\n'
}

fn default_strip_carriage_return() -> bool {
    true
}

fn default_cache_enabled() -> bool {
    true
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            strip_carriage_return: default_strip_carriage_return(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_cache_enabled(),
            max_cached_packets: None,
            line_ending: LineEnding::default(),
        }
    }
}
