/// Memory-augmented cell: controller + memory interface + output projection.
///
/// Per timestep:
///   (h, ctrl')              = controller(x, ctrl)
///   (reads, M', iface')     = interface(h, M, iface)
///   logits                  = h @ W_out + b_out
///
/// The output projection reads the controller hidden state only. Read vectors
/// are returned by the interface but not fed to the projection.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::config::CellConfig;
use crate::controller::Controller;
use crate::error::{check_len, NtmError, Result};
use crate::interface::{InterfaceParams, InterfaceState, MemoryInterface};
use crate::layer::RecurrentCell;
use crate::linear::Linear;
use crate::tensor::{SimpleRng, Tensor};

/// Full recurrent state: (controller state, interface attention, memory).
#[derive(Clone, Debug, PartialEq)]
pub struct CellState<S> {
    pub controller: S,
    pub interface: InterfaceState,
    /// [batch, addresses, content]
    pub memory: Tensor,
}

impl<S> CellState<S> {
    pub fn batch(&self) -> usize {
        self.memory.shape.first().copied().unwrap_or(0)
    }
}

/// All learnable weights of a cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellParams<P> {
    pub controller: P,
    pub interface: InterfaceParams,
    pub output: Linear,
}

pub struct MemoryCell<C: Controller> {
    cfg: CellConfig,
    controller: C,
    interface: MemoryInterface,
    output: Linear,
}

impl<C: Controller> MemoryCell<C> {
    /// Wrap `controller` with a freshly initialized interface and output layer.
    pub fn new(cfg: &CellConfig, controller: C, rng: &mut SimpleRng) -> Result<Self> {
        cfg.validate()?;
        check_controller(cfg, &controller)?;
        let interface = MemoryInterface::new(&cfg.interface_config(), rng)?;
        let output = Linear::init(cfg.hidden_size(), cfg.output_size(), rng);
        Ok(MemoryCell { cfg: cfg.clone(), controller, interface, output })
    }

    /// Rebuild from stored weights.
    pub fn from_params(cfg: &CellConfig, params: CellParams<C::Params>) -> Result<Self> {
        cfg.validate()?;
        let controller = C::from_params(params.controller)?;
        check_controller(cfg, &controller)?;
        let interface = MemoryInterface::from_params(&cfg.interface_config(), params.interface)?;
        params.output.validate()?;
        if params.output.in_features != cfg.hidden_size() || params.output.out_features != cfg.output_size() {
            return Err(NtmError::Config(format!(
                "output projection is {}x{}, expected {}x{}",
                params.output.in_features, params.output.out_features,
                cfg.hidden_size(), cfg.output_size()
            )));
        }
        Ok(MemoryCell { cfg: cfg.clone(), controller, interface, output: params.output })
    }

    pub fn params(&self) -> CellParams<C::Params> {
        CellParams {
            controller: self.controller.params(),
            interface: self.interface.params(),
            output: self.output.clone(),
        }
    }

    pub fn config(&self) -> &CellConfig {
        &self.cfg
    }

    pub fn interface(&self) -> &MemoryInterface {
        &self.interface
    }

    /// Initial state from an externally supplied memory [batch, addresses, content]:
    /// controller init state + uniform attention for every head.
    pub fn init(&self, init_memory: Tensor) -> Result<CellState<C::State>> {
        let (batch, addresses, content) = init_memory.dims3("initial memory")?;
        if content != self.cfg.memory.num_content_bits {
            return Err(NtmError::Shape {
                what: "initial memory content width",
                expected: vec![self.cfg.memory.num_content_bits],
                actual: vec![content],
            });
        }
        Ok(CellState {
            controller: self.controller.init(batch),
            interface: self.interface.init_state(batch, addresses)?,
            memory: init_memory,
        })
    }

    /// One timestep. `input`: [batch, input_size]. Returns (logits [batch, output_size], new state).
    pub fn step(&self, input: &[f32], prev: &CellState<C::State>) -> Result<(Vec<f32>, CellState<C::State>)> {
        let batch = prev.batch();
        check_len("cell input", input.len(), batch * self.cfg.input_size())?;

        let (hidden, controller) = self.controller.step(input, batch, &prev.controller)?;
        let out = self.interface.step(&hidden, &prev.memory, &prev.interface)?;
        let logits = self.output.forward(&hidden, batch)?;
        debug!(batch, read_heads = out.read_vectors.len(), "cell step");

        Ok((logits, CellState { controller, interface: out.state, memory: out.memory }))
    }
}

fn check_controller<C: Controller>(cfg: &CellConfig, controller: &C) -> Result<()> {
    if controller.input_size() != cfg.input_size() || controller.hidden_size() != cfg.hidden_size() {
        return Err(NtmError::Config(format!(
            "controller maps {} -> {}, config expects {} -> {}",
            controller.input_size(), controller.hidden_size(),
            cfg.input_size(), cfg.hidden_size()
        )));
    }
    Ok(())
}

impl<C: Controller> RecurrentCell for MemoryCell<C> {
    type State = CellState<C::State>;

    fn input_size(&self) -> usize {
        self.cfg.input_size()
    }

    fn output_size(&self) -> usize {
        self.cfg.output_size()
    }

    fn forward_step(&self, input: &[f32], _batch: usize, state: &Self::State) -> Result<(Option<Vec<f32>>, Self::State)> {
        let (logits, next) = self.step(input, state)?;
        Ok((Some(logits), next))
    }
}
