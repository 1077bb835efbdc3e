use crate::{brain::ActionSpace, error::PolicyError, BrainParameters};
use anyhow::Result;
use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize)]
struct DemonstrationFile {
    observations: Vec<Vec<f32>>,
    actions: Vec<Vec<f32>>,
}

/// Observation-action pairs recorded from an expert.
#[derive(Debug, Clone, PartialEq)]
pub struct Demonstration {
    observations: Array2<f32>,
    actions: Array2<f32>,
}

fn to_array(rows: &[Vec<f32>], width: usize, what: &str) -> Result<Array2<f32>, PolicyError> {
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(PolicyError::Demonstration(format!(
            "{} row {} has {} values, expected {}",
            what,
            i,
            row.len(),
            width
        )));
    }
    let data = rows.iter().flatten().copied().collect::<Vec<_>>();
    Array2::from_shape_vec((rows.len(), width), data)
        .map_err(|e| PolicyError::Demonstration(e.to_string()))
}

impl Demonstration {
    /// Creates a demonstration from arrays.
    pub fn new(observations: Array2<f32>, actions: Array2<f32>) -> Self {
        Self {
            observations,
            actions,
        }
    }

    /// Loads a demonstration from a YAML file and checks it against `brain`.
    pub fn load(path: impl AsRef<Path>, brain: &BrainParameters) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(&path_).map_err(|e| {
            PolicyError::Demonstration(format!("cannot open {:?}: {}", path_, e))
        })?;
        let rdr = BufReader::new(file);
        let raw: DemonstrationFile = serde_yaml::from_reader(rdr).map_err(|e| {
            PolicyError::Demonstration(format!("cannot parse {:?}: {}", path_, e))
        })?;

        if raw.observations.is_empty() || raw.observations.len() != raw.actions.len() {
            return Err(PolicyError::Demonstration(format!(
                "{:?} has {} observations and {} actions",
                path_,
                raw.observations.len(),
                raw.actions.len()
            ))
            .into());
        }

        let observations = to_array(&raw.observations, brain.vec_obs_size(), "observation")?;
        let actions = to_array(&raw.actions, brain.action_width(), "action")?;

        if brain.vector_action_space_type == ActionSpace::Discrete {
            for row in actions.rows() {
                for (a, &size) in row.iter().zip(brain.vector_action_space_size.iter()) {
                    if *a < 0.0 || (*a as usize) >= size || a.fract() != 0.0 {
                        return Err(PolicyError::Demonstration(format!(
                            "discrete action {} is not a valid index of a branch of size {}",
                            a, size
                        ))
                        .into());
                    }
                }
            }
        }

        info!("Load {} demonstrated steps from {:?}", observations.nrows(), path_);
        Ok(Self {
            observations,
            actions,
        })
    }

    /// Saves the demonstration as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let raw = DemonstrationFile {
            observations: self.observations.rows().into_iter().map(|r| r.to_vec()).collect(),
            actions: self.actions.rows().into_iter().map(|r| r.to_vec()).collect(),
        };
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&raw)?.as_bytes())?;
        info!("Save demonstration into {:?}", path_);
        Ok(())
    }

    /// Demonstrated observations, `(n, vec_obs_size)`.
    pub fn observations(&self) -> &Array2<f32> {
        &self.observations
    }

    /// Demonstrated actions, `(n, action_width)`.
    pub fn actions(&self) -> &Array2<f32> {
        &self.actions
    }

    /// Number of demonstrated steps.
    pub fn len(&self) -> usize {
        self.observations.nrows()
    }

    /// Returns `true` if there is no demonstrated step.
    pub fn is_empty(&self) -> bool {
        self.observations.nrows() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use std::fs;
    use tempdir::TempDir;

    #[test]
    fn test_load_demonstration() -> Result<()> {
        let dir = TempDir::new("demonstration")?;
        let path = dir.path().join("expert.yaml");
        let brain = BrainParameters::continuous("b", 2, 1);

        let demo = Demonstration::new(arr2(&[[0f32, 1.0], [1.0, 0.0]]), arr2(&[[0.5f32], [-0.5]]));
        demo.save(&path)?;
        assert_eq!(Demonstration::load(&path, &brain)?, demo);

        let brain = BrainParameters::continuous("b", 3, 1);
        let err = Demonstration::load(&path, &brain).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::Demonstration(_))
        ));
        Ok(())
    }

    #[test]
    fn test_malformed_demonstration() -> Result<()> {
        let dir = TempDir::new("demonstration")?;
        let brain = BrainParameters::discrete("b", 1, vec![2]);

        let path = dir.path().join("missing.yaml");
        assert!(Demonstration::load(&path, &brain).is_err());

        let path = dir.path().join("unequal.yaml");
        fs::write(&path, "observations: [[0.0], [1.0]]\nactions: [[1.0]]\n")?;
        assert!(Demonstration::load(&path, &brain).is_err());

        let path = dir.path().join("index.yaml");
        fs::write(&path, "observations: [[0.0]]\nactions: [[2.0]]\n")?;
        assert!(Demonstration::load(&path, &brain).is_err());

        let path = dir.path().join("valid.yaml");
        fs::write(&path, "observations: [[0.0]]\nactions: [[1.0]]\n")?;
        assert_eq!(Demonstration::load(&path, &brain)?.len(), 1);
        Ok(())
    }
}
