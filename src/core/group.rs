use std::rc::Rc;

use indexmap::IndexSet;

use super::specification::Specification;
use crate::error::BindingError;

/// Several specifications sharing one parameter namespace.
///
/// The joint parameter list is the union of the members' lists, in member
/// order, deduplicated by name. A name that appears in two members is a single
/// search variable bound to the same value in both.
#[derive(Debug, Clone)]
pub struct SpecificationGroup {
    members: Vec<Rc<Specification>>,
    parameters: IndexSet<String>,
    /// Per member: joint-vector position of each member parameter, in member order.
    slice_maps: Vec<Vec<usize>>,
}

impl SpecificationGroup {
    pub fn new(members: Vec<Rc<Specification>>) -> Self {
        let mut parameters = IndexSet::new();
        let slice_maps = members
            .iter()
            .map(|member| {
                member
                    .parameters()
                    .iter()
                    .map(|name| parameters.insert_full(name.clone()).0)
                    .collect()
            })
            .collect();

        Self {
            members,
            parameters,
            slice_maps,
        }
    }

    pub fn members(&self) -> &[Rc<Specification>] {
        &self.members
    }

    pub fn parameters(&self) -> &IndexSet<String> {
        &self.parameters
    }

    pub fn slice_map(&self, member: usize) -> &[usize] {
        &self.slice_maps[member]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Split a joint vector into one vector per member.
    pub fn project(&self, values: &[f64]) -> Result<Vec<Vec<f64>>, BindingError> {
        if values.len() != self.parameters.len() {
            return Err(BindingError::CountMismatch {
                expected: self.parameters.len(),
                received: values.len(),
                names: self.parameters.iter().cloned().collect(),
            });
        }

        Ok(self
            .slice_maps
            .iter()
            .map(|map| map.iter().map(|&i| values[i]).collect())
            .collect())
    }

    /// Bind every member text from one joint vector.
    pub fn bind(&self, values: &[f64]) -> Result<Vec<String>, BindingError> {
        self.members
            .iter()
            .zip(self.project(values)?)
            .map(|(member, local)| member.bind(&local))
            .collect()
    }
}
