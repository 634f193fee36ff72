/// Configuration for the memory interface and the memory-augmented cell.
///
/// Immutable after construction. Every component receives its config
/// explicitly; there is no shared application state. `validate()` is the
/// construction-time gate: shift size must be odd and positive, at least one
/// read head, all widths non-zero.

use std::path::Path;

use serde::{Serialize, Deserialize};
use crate::error::{NtmError, Result};
use crate::tensor::Tensor;

/// Interface (heads) configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Width of the controller hidden state the heads read from.
    pub hidden_size: usize,
    /// Values stored per memory address.
    pub content_bits: usize,
    /// Shift kernel width (odd, > 0).
    pub shift_size: usize,
    pub num_read_heads: usize,
}

impl InterfaceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shift_size == 0 {
            return Err(NtmError::Config("shift size must be > 0".into()));
        }
        if self.shift_size % 2 == 0 {
            return Err(NtmError::Config(format!(
                "shift size must be an odd number (got {})", self.shift_size
            )));
        }
        if self.num_read_heads < 1 {
            return Err(NtmError::Config(format!(
                "at least 1 read head is required (got {})", self.num_read_heads
            )));
        }
        if self.hidden_size == 0 || self.content_bits == 0 {
            return Err(NtmError::Config("hidden size and content bits must be > 0".into()));
        }
        Ok(())
    }

    /// Small configuration for tests.
    pub fn test_config() -> Self {
        InterfaceConfig {
            hidden_size: 8,
            content_bits: 4,
            shift_size: 3,
            num_read_heads: 1,
        }
    }
}

/// Controller non-linearity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonLinearity {
    Sigmoid,
    Tanh,
    Relu,
    None,
}

impl NonLinearity {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            NonLinearity::Sigmoid => crate::tensor::sigmoid_f32(x),
            NonLinearity::Tanh => x.tanh(),
            NonLinearity::Relu => x.max(0.0),
            NonLinearity::None => x,
        }
    }
}

/// Which controller implementation backs the cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    FeedForward,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub kind: ControllerKind,
    pub hidden_state_size: usize,
    pub non_linearity: NonLinearity,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub num_addresses: usize,
    pub num_content_bits: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadsConfig {
    pub shift_size: usize,
    pub num_read_heads: usize,
}

/// Full cell configuration, mirroring the nested layout of the JSON config file.
///
/// Input width = control bits + data bits. Output width defaults to the
/// data bits when `num_output_bits` is absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellConfig {
    pub num_control_bits: usize,
    pub num_data_bits: usize,
    #[serde(default)]
    pub num_output_bits: Option<usize>,
    pub controller: ControllerConfig,
    pub memory: MemoryConfig,
    pub interface: HeadsConfig,
}

impl CellConfig {
    pub fn input_size(&self) -> usize {
        self.num_control_bits + self.num_data_bits
    }

    pub fn output_size(&self) -> usize {
        self.num_output_bits.unwrap_or(self.num_data_bits)
    }

    pub fn hidden_size(&self) -> usize {
        self.controller.hidden_state_size
    }

    /// Derive the interface configuration.
    pub fn interface_config(&self) -> InterfaceConfig {
        InterfaceConfig {
            hidden_size: self.controller.hidden_state_size,
            content_bits: self.memory.num_content_bits,
            shift_size: self.interface.shift_size,
            num_read_heads: self.interface.num_read_heads,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size() == 0 {
            return Err(NtmError::Config("input size (control + data bits) must be > 0".into()));
        }
        if self.output_size() == 0 {
            return Err(NtmError::Config("output size must be > 0".into()));
        }
        if self.memory.num_addresses == 0 {
            return Err(NtmError::Config("memory must have at least 1 address".into()));
        }
        self.interface_config().validate()
    }

    /// Zero-initialized memory [batch, addresses, content] for this configuration.
    pub fn zero_memory(&self, batch: usize) -> Tensor {
        Tensor::zeros(&[batch, self.memory.num_addresses, self.memory.num_content_bits])
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: CellConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Tiny cell for tests: 1 control + 4 data bits, 10 addresses of 4 bits.
    pub fn test_config() -> Self {
        CellConfig {
            num_control_bits: 1,
            num_data_bits: 4,
            num_output_bits: None,
            controller: ControllerConfig {
                kind: ControllerKind::FeedForward,
                hidden_state_size: 8,
                non_linearity: NonLinearity::Sigmoid,
            },
            memory: MemoryConfig { num_addresses: 10, num_content_bits: 4 },
            interface: HeadsConfig { shift_size: 3, num_read_heads: 1 },
        }
    }
}
