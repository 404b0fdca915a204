use super::error::SimulationError;
use super::types::CorrelationPair;

/// A zero pivot with a residual larger than this means the coefficients
/// cannot belong to any valid correlation matrix.
const PIVOT_RESIDUAL_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    rows: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn identity(size: usize) -> Self {
        let mut rows = vec![vec![0.0; size]; size];
        for (i, row) in rows.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self { rows }
    }

    /// Builds the matrix indexed by `names` order. Pairs naming an unknown
    /// asset, or the same asset twice, are ignored.
    pub fn from_pairs<S: AsRef<str>>(names: &[S], pairs: &[CorrelationPair]) -> Self {
        let mut matrix = Self::identity(names.len());
        let index_of = |name: &str| names.iter().position(|n| n.as_ref() == name);

        for pair in pairs {
            let (Some(a), Some(b)) = (index_of(&pair.first), index_of(&pair.second)) else {
                continue;
            };
            if a == b {
                continue;
            }
            matrix.rows[a][b] = pair.coefficient;
            matrix.rows[b][a] = pair.coefficient;
        }
        matrix
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    /// Lower-triangular `L` with `L * L^T == self`.
    pub fn cholesky(&self) -> Result<CholeskyFactor, SimulationError> {
        let n = self.size();
        let mut l = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..=i {
                let dot: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
                if i == j {
                    let diagonal = self.rows[i][i] - dot;
                    if diagonal < 0.0 {
                        return Err(SimulationError::NonPositiveDefiniteCorrelation { diagonal });
                    }
                    l[i][j] = diagonal.sqrt();
                } else {
                    let residual = self.rows[i][j] - dot;
                    if l[j][j] == 0.0 {
                        // Degenerate column: only a zero residual is consistent.
                        if residual.abs() > PIVOT_RESIDUAL_TOLERANCE {
                            return Err(SimulationError::NonPositiveDefiniteCorrelation {
                                diagonal: l[j][j],
                            });
                        }
                        l[i][j] = 0.0;
                    } else {
                        l[i][j] = residual / l[j][j];
                    }
                }
            }
        }

        Ok(CholeskyFactor { rows: l })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    rows: Vec<Vec<f64>>,
}

impl CholeskyFactor {
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    /// Maps independent standard normals onto correlated ones (`L * z`).
    pub fn correlate(&self, independent: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(independent)
                    .map(|(weight, z)| weight * z)
                    .sum()
            })
            .collect()
    }

    /// `L * L^T`.
    pub fn reconstruct(&self) -> CorrelationMatrix {
        let n = self.size();
        let mut rows = vec![vec![0.0; n]; n];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..n).map(|k| self.rows[i][k] * self.rows[j][k]).sum();
            }
        }
        CorrelationMatrix { rows }
    }
}
