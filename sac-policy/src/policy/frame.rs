//! Conversion of caller batches into model requests.
use crate::{
    batch::columns,
    error::PolicyError,
    request::{
        FeatureSet, InferenceRequest, InferenceRequestBuilder, UpdateRequest, UpdateRequestBuilder,
    },
    Minibatch, ObservationBatch,
};
use anyhow::Result;
use ndarray::{s, Array1, Array2, ArrayD, Axis, Ix3, IxDyn};

/// Reshapes an array to `(-1, width)`.
pub(crate) fn reshape_rows(
    v: &ArrayD<f32>,
    width: usize,
    what: &str,
) -> Result<Array2<f32>, PolicyError> {
    if width == 0 || v.len() % width != 0 {
        return Err(PolicyError::shape(what, format!("(-1, {})", width), v.shape()));
    }
    let v = v
        .to_shape((v.len() / width, width))
        .map_err(|_| PolicyError::shape(what, format!("(-1, {})", width), v.shape()))?;
    Ok(v.to_owned())
}

/// Flattens an array in row-major order.
pub(crate) fn flatten(v: &ArrayD<f32>) -> Array1<f32> {
    v.iter().copied().collect()
}

/// Merges the two leading axes of a `(B, L, ...)` visual column into `B * L`.
///
/// Columns without a sequence axis are passed through.
pub(crate) fn collapse_sequences(
    v: &ArrayD<f32>,
    collapse: bool,
) -> Result<ArrayD<f32>, PolicyError> {
    if !collapse || v.ndim() != 5 {
        return Ok(v.clone());
    }
    let shape = v.shape();
    let mut new_shape = vec![shape[0] * shape[1]];
    new_shape.extend_from_slice(&shape[2..]);
    let v = v
        .to_shape(IxDyn(&new_shape))
        .map_err(|_| PolicyError::shape("visual observations", "(B, L, W, H, C)", v.shape()))?;
    Ok(v.to_owned())
}

/// Row `idx` of `v`, or a `(1, 0)` placeholder when `v` has no columns.
fn select_or_placeholder(v: &Array2<f32>, row: &[usize]) -> Array2<f32> {
    match v.ncols() {
        0 => Array2::zeros((1, 0)),
        _ => v.select(Axis(0), row),
    }
}

/// Returns a batch containing only the agent at `idx`.
///
/// Width-0 vector observations and memory placeholders stay placeholders.
pub(crate) fn select_row(
    batch: &ObservationBatch,
    idx: usize,
) -> Result<ObservationBatch, PolicyError> {
    if idx >= batch.len() {
        return Err(PolicyError::IndexOutOfRange {
            index: idx,
            len: batch.len(),
        });
    }
    batch.validate()?;

    let row = [idx];
    let prev = match batch.previous_vector_actions.len() {
        0 => Array2::<f32>::zeros((1, 0)).into_dyn(),
        len => reshape_rows(&batch.previous_vector_actions, len / batch.len(), "previous actions")?
            .select(Axis(0), &row)
            .into_dyn(),
    };
    Ok(ObservationBatch {
        agents: vec![batch.agents[idx]],
        vector_observations: select_or_placeholder(&batch.vector_observations, &row),
        visual_observations: batch
            .visual_observations
            .iter()
            .map(|v| v.select(Axis(0), &row))
            .collect(),
        previous_vector_actions: prev,
        memories: select_or_placeholder(&batch.memories, &row),
        action_masks: batch.action_masks.as_ref().map(|m| m.select(Axis(0), &row)),
    })
}

/// Binds an observation batch for a single-step forward pass.
///
/// An empty memory placeholder is replaced with zeros and missing discrete
/// action masks with ones.
pub(crate) fn inference_request(
    features: &FeatureSet,
    batch: &ObservationBatch,
) -> Result<InferenceRequest> {
    batch.validate()?;
    let n = batch.len();
    let mut builder = InferenceRequestBuilder::new(features, n);

    if features.binds_prev_action() {
        let prev = reshape_rows(
            &batch.previous_vector_actions,
            features.num_branches(),
            "previous actions",
        )?;
        builder = builder.prev_action(prev);
    }
    if features.use_recurrent {
        let memory = match batch.has_empty_memories() {
            true => Array2::zeros((n, features.memory_size)),
            false => batch.memories.clone(),
        };
        builder = builder.memory(memory);
    }
    if features.use_vec_obs() {
        builder = builder.vector_obs(batch.vector_observations.clone());
    }
    for v in batch.visual_observations.iter() {
        builder = builder.visual_obs(v.clone().into_dyn());
    }
    if !features.is_continuous() {
        let masks = batch
            .action_masks
            .clone()
            .unwrap_or_else(|| Array2::ones((n, features.total_discrete_width())));
        builder = builder.action_masks(masks);
    }

    Ok(builder.build()?)
}

/// Binds a minibatch of `num_sequences` sequences for an update pass.
///
/// Rewards are read from the columns of `reward_names`, in that order.
pub(crate) fn update_request(
    features: &FeatureSet,
    reward_names: &[String],
    mb: &Minibatch,
    num_sequences: usize,
    sequence_length: usize,
) -> Result<UpdateRequest> {
    let mut builder = UpdateRequestBuilder::new(features, num_sequences, sequence_length)
        .masks(flatten(mb.get(columns::MASKS)?))
        .dones(flatten(mb.get(columns::DONE)?));

    for name in reward_names.iter() {
        builder = builder.rewards(flatten(mb.rewards(name)?));
    }

    let actions = mb.get(columns::ACTIONS)?;
    builder = builder.actions(reshape_rows(actions, features.action_width(), "actions")?);
    if !features.is_continuous() {
        let masks = mb.get(columns::ACTION_MASK)?;
        let masks = reshape_rows(masks, features.total_discrete_width(), "action masks")?;
        builder = builder.action_masks(masks);
    }
    if features.binds_prev_action() {
        let prev = mb.get(columns::PREV_ACTION)?;
        let prev = reshape_rows(prev, features.num_branches(), "previous actions")?;
        builder = builder.prev_action(prev);
    }

    if features.use_vec_obs() {
        let obs = reshape_rows(
            mb.get(columns::VECTOR_OBS)?,
            features.vec_obs_size,
            "vector observations",
        )?;
        let next_obs = reshape_rows(
            mb.get(columns::NEXT_VECTOR_OBS)?,
            features.vec_obs_size,
            "next vector observations",
        )?;
        builder = builder.vector_obs(obs, next_obs);
    }

    let collapse = features.use_recurrent && sequence_length > 1;
    for i in 0..features.num_visual {
        let obs = collapse_sequences(mb.get(&columns::visual_obs(i))?, collapse)?;
        let next_obs = collapse_sequences(mb.get(&columns::next_visual_obs(i))?, collapse)?;
        builder = builder.visual_obs(obs, next_obs);
    }

    if features.use_recurrent {
        let memory = mb.get(columns::MEMORY)?;
        let memory = memory
            .view()
            .into_dimensionality::<Ix3>()
            .map_err(|_| PolicyError::shape("memory", "(B, L, m)", memory.shape()))?;
        let seed = memory.slice(s![.., 0, ..]).to_owned();
        builder = builder.memory(seed);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrainParameters, SacPolicyConfig};
    use ndarray::{arr2, Array};

    #[test]
    fn test_reshape_rows() {
        let v = Array::linspace(0f32, 5.0, 6).into_shape((1, 3, 2)).unwrap().into_dyn();
        assert_eq!(reshape_rows(&v, 2, "actions").unwrap().dim(), (3, 2));
        assert!(matches!(
            reshape_rows(&v, 4, "actions"),
            Err(PolicyError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_collapse_sequences() {
        let v = Array::<f32, _>::zeros((2, 3, 4, 4, 1)).into_dyn();
        assert_eq!(collapse_sequences(&v, true).unwrap().shape(), &[6, 4, 4, 1]);
        assert_eq!(collapse_sequences(&v, false).unwrap().shape(), &[2, 3, 4, 4, 1]);

        let v = Array::<f32, _>::zeros((6, 4, 4, 1)).into_dyn();
        assert_eq!(collapse_sequences(&v, true).unwrap().shape(), &[6, 4, 4, 1]);
    }

    #[test]
    fn test_select_row() {
        let batch = ObservationBatch::new(vec![7, 8])
            .vector_observations(arr2(&[[0f32, 1.0], [2.0, 3.0]]))
            .visual_observation(Array::zeros((2, 2, 2, 1)));

        let row = select_row(&batch, 1).unwrap();
        assert_eq!(row.agents, vec![8]);
        assert_eq!(row.vector_observations, arr2(&[[2f32, 3.0]]));
        assert_eq!(row.visual_observations[0].shape(), &[1, 2, 2, 1]);
        assert_eq!(
            select_row(&batch, 2).err(),
            Some(PolicyError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_select_row_keeps_placeholders() {
        let batch = ObservationBatch::new(vec![3, 4]).memories(Array2::zeros((0, 0)));

        let row = select_row(&batch, 1).unwrap();
        assert_eq!(row.agents, vec![4]);
        assert_eq!(row.vector_observations.dim(), (1, 0));
        assert_eq!(row.memories.dim(), (1, 0));
        assert!(row.has_empty_memories());
    }

    #[test]
    fn test_recurrent_memory_seed() -> Result<()> {
        let brain = BrainParameters::continuous("b", 1, 1);
        let config = SacPolicyConfig::default().recurrent(4, 2);
        let features = FeatureSet::new(&brain, &config, 1);
        let memory = Array::from_shape_fn((3, 2, 4), |(b, l, _)| (b * 10 + l) as f32);
        let mb = Minibatch::new()
            .column(columns::MASKS, Array::ones(6).into_dyn())
            .column(columns::DONE, Array::zeros(6).into_dyn())
            .column(columns::rewards("extrinsic"), Array::zeros(6).into_dyn())
            .column(columns::ACTIONS, Array::zeros((6, 1)).into_dyn())
            .column(columns::VECTOR_OBS, Array::zeros((6, 1)).into_dyn())
            .column(columns::NEXT_VECTOR_OBS, Array::zeros((6, 1)).into_dyn())
            .column(columns::MEMORY, memory.into_dyn());

        let request = update_request(&features, &["extrinsic".to_string()], &mb, 3, 2)?;
        let seed = request.memory.unwrap();
        assert_eq!(seed.dim(), (3, 4));
        assert_eq!(seed.column(0).to_vec(), vec![0f32, 10.0, 20.0]);
        Ok(())
    }
}
