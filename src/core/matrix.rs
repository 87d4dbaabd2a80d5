//! Matrix expansion
//!
//! A matrix is a set of named axes, each with an ordered list of values. Its
//! expansion is the cartesian product of the axes: one binding per
//! combination. Axes are visited in name order and values keep their
//! declared order, so the expansion is deterministic.

use std::collections::BTreeMap;

/// One combination of axis values, e.g. `{"python.version": "3.7"}`
pub type Binding = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matrix {
    axes: BTreeMap<String, Vec<String>>,
}

impl Matrix {
    pub fn new(axes: BTreeMap<String, Vec<String>>) -> Self {
        Self { axes }
    }

    /// Add an axis, replacing any axis with the same name
    pub fn with_axis(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.axes.insert(name.into(), values);
        self
    }

    pub fn axes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.axes
    }

    /// Number of combinations (product of axis value counts)
    pub fn cardinality(&self) -> usize {
        self.axes.values().map(Vec::len).product()
    }

    /// Enumerate every combination.
    ///
    /// A matrix with no axes has exactly one, empty, combination. An axis
    /// with no values yields no combinations at all.
    pub fn combinations(&self) -> Vec<Binding> {
        let mut combinations = vec![Binding::new()];

        for (axis, values) in &self.axes {
            let mut next = Vec::with_capacity(combinations.len() * values.len());
            for partial in &combinations {
                for value in values {
                    let mut binding = partial.clone();
                    binding.insert(axis.clone(), value.clone());
                    next.push(binding);
                }
            }
            combinations = next;
        }

        combinations
    }
}

/// Short label for a binding: its values joined by `/`, in axis order
pub fn binding_label(binding: &Binding) -> String {
    binding.values().cloned().collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_axis_single_value() {
        let matrix = Matrix::default().with_axis("python.version", values(&["3.7"]));
        let combinations = matrix.combinations();

        assert_eq!(combinations.len(), 1);
        assert_eq!(combinations[0].get("python.version"), Some(&"3.7".to_string()));
    }

    #[test]
    fn test_cartesian_product() {
        let matrix = Matrix::default()
            .with_axis("python.version", values(&["3.7", "3.8"]))
            .with_axis("numpy", values(&["1.17", "1.18", "1.19"]));

        let combinations = matrix.combinations();
        assert_eq!(matrix.cardinality(), 6);
        assert_eq!(combinations.len(), 6);

        // Every combination is distinct
        let labels: std::collections::HashSet<_> = combinations.iter().map(binding_label).collect();
        assert_eq!(labels.len(), 6);

        // Axes are visited in name order, values in declared order
        assert_eq!(binding_label(&combinations[0]), "1.17/3.7");
        assert_eq!(binding_label(&combinations[1]), "1.17/3.8");
    }

    #[test]
    fn test_empty_matrix_has_one_combination() {
        let matrix = Matrix::default();
        assert_eq!(matrix.cardinality(), 1);
        assert_eq!(matrix.combinations(), vec![Binding::new()]);
    }

    #[test]
    fn test_empty_axis_has_no_combinations() {
        let matrix = Matrix::default()
            .with_axis("python.version", values(&["3.7"]))
            .with_axis("os", Vec::new());
        assert_eq!(matrix.cardinality(), 0);
        assert!(matrix.combinations().is_empty());
    }
}
