//! A deterministic model recording the requests it receives.
#![allow(dead_code)]
use anyhow::Result;
use ndarray::{Array, Array1, Array2};
use sac_policy::{
    InferenceRequest, ModelParams, OutputSlot, PolicyModel, Record, RecordValue, UpdateRequest,
};
use std::cell::Cell;

pub const INIT_TARGET: &str = "init_target";
pub const INFERENCE: &str = "inference";
pub const UPDATE: &str = "update";
pub const UPDATE_TARGET: &str = "update_target";

pub struct ToyModel {
    pub params: ModelParams,
    pub online: f32,
    pub target: f32,
    pub last_reward: f32,
    pub step: u64,
    pub events: Vec<&'static str>,
    pub value_calls: Cell<usize>,
    pub last_inference: Option<InferenceRequest>,
    pub last_update: Option<UpdateRequest>,
    pub last_fetches: Vec<OutputSlot>,
    /// Target observed right after each update, before any target sync.
    pub target_after_update: Vec<f32>,
    /// An output the model omits, to exercise output checks.
    pub omit: Option<OutputSlot>,
}

impl ToyModel {
    pub fn build(params: ModelParams) -> Result<Self> {
        Ok(Self {
            params,
            online: 1.0,
            target: 0.0,
            last_reward: 0.0,
            step: 0,
            events: vec![],
            value_calls: Cell::new(0),
            last_inference: None,
            last_update: None,
            last_fetches: vec![],
            target_after_update: vec![],
            omit: None,
        })
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.iter().filter(|e| **e == event).count()
    }

    fn n_streams(&self) -> usize {
        self.params.stream_names.len()
    }

    fn action_width(&self) -> usize {
        self.params.brain.action_width()
    }

    /// Value of stream `j` for an agent is `j + sum of its vector observation`.
    fn values(&self, request: &InferenceRequest) -> Array2<f32> {
        let n = request.batch_size;
        let sums = match &request.vector_obs {
            Some(obs) => obs.sum_axis(ndarray::Axis(1)),
            None => Array1::zeros(n),
        };
        Array2::from_shape_fn((n, self.n_streams()), |(i, j)| j as f32 + sums[i])
    }
}

impl PolicyModel for ToyModel {
    fn inference(&mut self, request: &InferenceRequest, fetches: &[OutputSlot]) -> Result<Record> {
        self.events.push(INFERENCE);
        self.last_inference = Some(request.clone());
        self.last_fetches = fetches.to_vec();

        let n = request.batch_size;
        let mut record = Record::empty();
        for slot in fetches.iter().filter(|slot| Some(**slot) != self.omit) {
            let value = match slot {
                OutputSlot::Action => {
                    RecordValue::Array(Array::from_elem((n, self.action_width()), 0.5).into_dyn())
                }
                OutputSlot::LogProbs => {
                    RecordValue::Array(Array::zeros((n, self.action_width())).into_dyn())
                }
                OutputSlot::Value => RecordValue::Array(self.values(request).into_dyn()),
                OutputSlot::Entropy => RecordValue::Array(Array::ones(n).into_dyn()),
                OutputSlot::LearningRate => RecordValue::Scalar(self.params.learning_rate as f32),
                OutputSlot::MemoryOut => match &request.memory {
                    Some(m) => RecordValue::Array((m + 1.0).into_dyn()),
                    None => RecordValue::Done,
                },
                _ => RecordValue::Done,
            };
            record.insert(slot.name(), value);
        }
        Ok(record)
    }

    fn value(&self, request: &InferenceRequest) -> Result<Array2<f32>> {
        self.value_calls.set(self.value_calls.get() + 1);
        Ok(self.values(request))
    }

    fn update(&mut self, request: &UpdateRequest, fetches: &[OutputSlot]) -> Result<Record> {
        self.events.push(UPDATE);
        self.last_update = Some(request.clone());
        self.last_fetches = fetches.to_vec();
        self.online += 1.0;
        self.target_after_update.push(self.target);

        let mut record = Record::empty();
        for slot in fetches.iter().filter(|slot| Some(**slot) != self.omit) {
            let value = match slot {
                OutputSlot::UpdatePolicy | OutputSlot::UpdateValue | OutputSlot::UpdateEntropy => {
                    RecordValue::Done
                }
                _ => RecordValue::Scalar(self.online),
            };
            record.insert(slot.name(), value);
        }
        Ok(record)
    }

    fn init_target(&mut self) -> Result<()> {
        self.events.push(INIT_TARGET);
        self.target = self.online;
        Ok(())
    }

    fn update_target(&mut self) -> Result<()> {
        self.events.push(UPDATE_TARGET);
        let tau = self.params.tau as f32;
        self.target = tau * self.online + (1.0 - tau) * self.target;
        Ok(())
    }

    fn last_reward(&self) -> f32 {
        self.last_reward
    }

    fn set_last_reward(&mut self, reward: f32) -> Result<()> {
        self.last_reward = reward;
        Ok(())
    }

    fn global_step(&self) -> u64 {
        self.step
    }

    fn increment_step(&mut self, n: u64) -> Result<()> {
        self.step += n;
        Ok(())
    }
}
