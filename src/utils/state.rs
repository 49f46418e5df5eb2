use nalgebra::{DMatrix, DVector, DVectorView, RealField};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::mvn::{MultiVariateNormal, MvnError};

/// Inconsistent belief, as read from a snapshot or requested from a sampler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeliefError {
    #[error("a belief needs at least one component")]
    Empty,
    #[error("covariance {index} is {rows}x{cols} but the state has {dim} entries")]
    CovarianceShape {
        index: usize,
        dim: usize,
        rows: usize,
        cols: usize,
    },
    #[error("{columns} state columns, {covariances} covariances and {weights} weights")]
    ComponentCount {
        columns: usize,
        covariances: usize,
        weights: usize,
    },
    #[error("{particles} particles but {weights} weights")]
    WeightCount { particles: usize, weights: usize },
    #[error(transparent)]
    Mvn(#[from] MvnError),
}

fn check_covariance<T: RealField>(
    index: usize,
    dim: usize,
    covariance: &DMatrix<T>,
) -> Result<(), BeliefError> {
    if covariance.nrows() != dim || covariance.ncols() != dim {
        return Err(BeliefError::CovarianceShape {
            index,
            dim,
            rows: covariance.nrows(),
            cols: covariance.ncols(),
        });
    }
    Ok(())
}

#[derive(Deserialize)]
struct GaussianFields<T: RealField> {
    mean: DVector<T>,
    covariance: DMatrix<T>,
}

impl<T: RealField> TryFrom<GaussianFields<T>> for Gaussian<T> {
    type Error = BeliefError;

    fn try_from(fields: GaussianFields<T>) -> Result<Self, Self::Error> {
        check_covariance(0, fields.mean.nrows(), &fields.covariance)?;
        Ok(Gaussian {
            mean: fields.mean,
            covariance: fields.covariance,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GaussianFields<T>", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Gaussian<T: RealField> {
    /// State Vector
    pub mean: DVector<T>,
    /// Covariance Matrix
    pub covariance: DMatrix<T>,
}

impl<T: RealField + Copy> Gaussian<T> {
    pub fn new(mean: DVector<T>, covariance: DMatrix<T>) -> Gaussian<T> {
        assert!(covariance.is_square(), "covariance must be square");
        assert_eq!(
            mean.nrows(),
            covariance.nrows(),
            "covariance does not match the mean dimension"
        );
        Gaussian { mean, covariance }
    }

    pub fn dim(&self) -> usize {
        self.mean.nrows()
    }
}

/// Weighted Gaussian components sharing one state dimension.
///
/// Means are stored column-wise so a linear transition can be applied to all
/// of them with a single product. Weights are left as they are by prediction,
/// normalising them is the job of the correction stage.
///
/// Deserialisation enforces the same shape rules as `from_components`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MixtureFields<T>", bound(deserialize = "T: Deserialize<'de>"))]
pub struct GaussianMixture<T: RealField> {
    means: DMatrix<T>,
    covariances: Vec<DMatrix<T>>,
    weights: DVector<T>,
}

impl<T: RealField + Copy> GaussianMixture<T> {
    /// Zero means, identity covariances and uniform weights.
    pub fn new(components: usize, dim: usize) -> GaussianMixture<T> {
        assert!(components > 0, "a mixture needs at least one component");
        let weight = T::one() / nalgebra::convert::<f64, T>(components as f64);
        GaussianMixture {
            means: DMatrix::zeros(dim, components),
            covariances: vec![DMatrix::identity(dim, dim); components],
            weights: DVector::from_element(components, weight),
        }
    }

    pub fn from_components(components: Vec<Gaussian<T>>, weights: DVector<T>) -> GaussianMixture<T> {
        assert!(!components.is_empty(), "a mixture needs at least one component");
        assert_eq!(components.len(), weights.len(), "one weight per component");
        let dim = components[0].dim();
        let mut means = DMatrix::zeros(dim, components.len());
        let mut covariances = Vec::with_capacity(components.len());
        for (i, gaussian) in components.into_iter().enumerate() {
            assert_eq!(gaussian.dim(), dim, "components must share the state dimension");
            means.set_column(i, &gaussian.mean);
            covariances.push(gaussian.covariance);
        }
        GaussianMixture {
            means,
            covariances,
            weights,
        }
    }

    pub fn components(&self) -> usize {
        self.covariances.len()
    }

    pub fn dim(&self) -> usize {
        self.means.nrows()
    }

    pub fn mean(&self, i: usize) -> DVectorView<'_, T> {
        self.means.column(i)
    }

    /// All component means, one column each.
    pub fn means(&self) -> &DMatrix<T> {
        &self.means
    }

    pub fn means_mut(&mut self) -> &mut DMatrix<T> {
        &mut self.means
    }

    pub fn covariance(&self, i: usize) -> &DMatrix<T> {
        &self.covariances[i]
    }

    pub fn covariance_mut(&mut self, i: usize) -> &mut DMatrix<T> {
        &mut self.covariances[i]
    }

    pub fn covariances(&self) -> &[DMatrix<T>] {
        &self.covariances
    }

    pub fn weight(&self, i: usize) -> T {
        self.weights[i]
    }

    pub fn weights(&self) -> &DVector<T> {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut DVector<T> {
        &mut self.weights
    }

    pub fn component(&self, i: usize) -> Gaussian<T> {
        Gaussian {
            mean: self.means.column(i).into_owned(),
            covariance: self.covariances[i].clone(),
        }
    }
}

#[derive(Deserialize)]
struct MixtureFields<T: RealField> {
    means: DMatrix<T>,
    covariances: Vec<DMatrix<T>>,
    weights: DVector<T>,
}

impl<T: RealField> TryFrom<MixtureFields<T>> for GaussianMixture<T> {
    type Error = BeliefError;

    fn try_from(fields: MixtureFields<T>) -> Result<Self, Self::Error> {
        let columns = fields.means.ncols();
        if columns == 0 {
            return Err(BeliefError::Empty);
        }
        if fields.covariances.len() != columns || fields.weights.len() != columns {
            return Err(BeliefError::ComponentCount {
                columns,
                covariances: fields.covariances.len(),
                weights: fields.weights.len(),
            });
        }
        let dim = fields.means.nrows();
        for (i, covariance) in fields.covariances.iter().enumerate() {
            check_covariance(i, dim, covariance)?;
        }
        Ok(GaussianMixture {
            means: fields.means,
            covariances: fields.covariances,
            weights: fields.weights,
        })
    }
}

impl<T: RealField + Copy> From<Gaussian<T>> for GaussianMixture<T> {
    fn from(gaussian: Gaussian<T>) -> Self {
        GaussianMixture::from_components(vec![gaussian], DVector::from_element(1, T::one()))
    }
}

/// Weighted state samples, one column per particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParticleFields<T>", bound(deserialize = "T: Deserialize<'de>"))]
pub struct ParticleSet<T: RealField> {
    states: DMatrix<T>,
    weights: DVector<T>,
}

#[derive(Deserialize)]
struct ParticleFields<T: RealField> {
    states: DMatrix<T>,
    weights: DVector<T>,
}

impl<T: RealField> TryFrom<ParticleFields<T>> for ParticleSet<T> {
    type Error = BeliefError;

    fn try_from(fields: ParticleFields<T>) -> Result<Self, Self::Error> {
        let columns = fields.states.ncols();
        if fields.weights.len() != columns {
            return Err(BeliefError::WeightCount {
                particles: columns,
                weights: fields.weights.len(),
            });
        }
        Ok(ParticleSet {
            states: fields.states,
            weights: fields.weights,
        })
    }
}

impl<T: RealField + Copy> ParticleSet<T> {
    pub fn new(components: usize, dim: usize) -> ParticleSet<T> {
        assert!(components > 0, "a particle set needs at least one particle");
        let weight = T::one() / nalgebra::convert::<f64, T>(components as f64);
        ParticleSet {
            states: DMatrix::zeros(dim, components),
            weights: DVector::from_element(components, weight),
        }
    }

    pub fn from_states(states: DMatrix<T>, weights: DVector<T>) -> ParticleSet<T> {
        assert_eq!(states.ncols(), weights.len(), "one weight per particle");
        ParticleSet { states, weights }
    }

    /// Draws `count` particles from `gaussian`, all with the same weight.
    pub fn sample_from<R: Rng + ?Sized>(
        gaussian: &Gaussian<T>,
        count: usize,
        rng: &mut R,
    ) -> Result<ParticleSet<T>, BeliefError>
    where
        StandardNormal: Distribution<T>,
    {
        if count == 0 {
            return Err(BeliefError::Empty);
        }
        let mvn = MultiVariateNormal::new(&gaussian.mean, &gaussian.covariance)?;
        let mut particles = ParticleSet::new(count, gaussian.dim());
        for i in 0..count {
            particles.states.set_column(i, &mvn.sample(rng));
        }
        Ok(particles)
    }

    pub fn components(&self) -> usize {
        self.states.ncols()
    }

    pub fn dim(&self) -> usize {
        self.states.nrows()
    }

    pub fn state(&self, i: usize) -> DVectorView<'_, T> {
        self.states.column(i)
    }

    pub fn states(&self) -> &DMatrix<T> {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut DMatrix<T> {
        &mut self.states
    }

    pub fn weight(&self, i: usize) -> T {
        self.weights[i]
    }

    pub fn weights(&self) -> &DVector<T> {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut DVector<T> {
        &mut self.weights
    }

    /// Weighted sample mean and covariance of the set.
    pub fn gaussian_estimate(&self) -> Gaussian<T> {
        let total = self.weights.sum();
        let weights = &self.weights / total;
        let mean = &self.states * &weights;
        let cov = self
            .states
            .column_iter()
            .zip(weights.iter())
            .map(|(p, w)| {
                let dx = p - &mean;
                &dx * dx.transpose() * *w
            })
            .fold(DMatrix::zeros(self.dim(), self.dim()), |a, b| a + b);
        Gaussian {
            mean,
            covariance: cov,
        }
    }
}
