//! Defines a `BayesianNetwork`, a directed probabilistic graphical model
//! representing the factorization of a probability distribution P.

use dmap_types::{Assignment, ModelError, Variable, VariableId, VariableKind};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::cpd::Cpd;
use crate::init::Initialization;

/// Represents a Bayesian Network - a Directed Probabilistic Graphical Model.
///
/// # Representation
/// A traditional graph data structure is not used. The CPD of each variable
/// implicitly defines the edges of the graph (`P -> X` for every parent `P` of
/// `X`). Variables are stored in the order they were added, which the builder
/// guarantees is a topological order, so `VariableId(i)` is also the position of
/// the variable in that order.
#[derive(Debug, Clone)]
pub struct BayesianNetwork {
    variables: Vec<Variable>,
    cpds: Vec<Cpd>,
    names: HashMap<String, VariableId>,
}

impl BayesianNetwork {
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// All variables in topological order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    /// Lookup a `Variable` based on its name
    pub fn lookup_variable(&self, name: &str) -> Option<&Variable> {
        self.names.get(name).and_then(|id| self.variable(*id))
    }

    /// Like [`lookup_variable`](Self::lookup_variable) but failing with a
    /// `ModelError` for unknown names.
    pub fn variable_by_name(&self, name: &str) -> Result<&Variable, ModelError> {
        self.lookup_variable(name)
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))
    }

    pub fn cpd(&self, id: VariableId) -> Result<&Cpd, ModelError> {
        self.cpds.get(id.index()).ok_or(ModelError::UnknownVariableId(id))
    }

    pub fn parents(&self, id: VariableId) -> Result<&[VariableId], ModelError> {
        Ok(self.cpd(id)?.parents())
    }

    pub fn topological_order(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.variables.iter().map(|v| v.id())
    }

    /// The variables of `scope` together with all of their ancestors, in
    /// topological order.
    pub fn ancestral_closure(&self, scope: &[VariableId]) -> Result<Vec<VariableId>, ModelError> {
        let mut closure = BTreeSet::new();
        let mut stack: Vec<VariableId> = scope.to_vec();

        while let Some(var) = stack.pop() {
            if closure.insert(var) {
                stack.extend_from_slice(self.parents(var)?);
            }
        }

        // ids follow the topological order
        Ok(closure.into_iter().collect())
    }

    /// `ln P(x)` for a full assignment `x` to every variable of the network.
    pub fn log_joint(&self, assignment: &Assignment) -> Result<f64, ModelError> {
        // chain rule, one CPD per variable
        self.cpds
            .iter()
            .try_fold(0.0, |acc, cpd| -> Result<f64, ModelError> { Ok(acc + cpd.log_density(assignment)?) })
    }

    /// Build an assignment from variable names, checking every value against
    /// its variable's domain.
    pub fn assignment_from_names(&self, values: &[(&str, f64)]) -> Result<Assignment, ModelError> {
        let mut assignment = Assignment::new();
        for &(name, value) in values {
            let var = self.variable_by_name(name)?;
            if !var.admits(value) {
                return Err(ModelError::ValueOutOfDomain { variable: var.id(), value });
            }
            assignment.set(var.id(), value);
        }
        Ok(assignment)
    }

    /// Human-readable rendering of an assignment, e.g. `{ClassVar = 1, GaussianVar0 = 3.0}`.
    pub fn describe(&self, assignment: &Assignment) -> String {
        let parts: Vec<String> = assignment
            .iter()
            .map(|(id, value)| match self.variable(id) {
                Some(var) if var.is_discrete() => format!("{} = {}", var.name(), value as usize),
                Some(var) => format!("{} = {:?}", var.name(), value),
                None => format!("{id} = {value:?}"),
            })
            .collect();
        format!("{{{}}}", parts.join(", "))
    }
}

/// An implementation of the [builder pattern] for creating a `BayesianNetwork`.
///
/// Networks must be assembled in topological order: every parent has to be
/// added before its children. The first error puts the builder in an error
/// state; subsequent calls are ignored and `build` reports the error.
///
/// [builder pattern]: https://en.wikipedia.org/wiki/Builder_pattern
#[derive(Debug, Default)]
pub struct BayesianNetworkBuilder {
    variables: Vec<Variable>,
    cpds: Vec<Cpd>,
    names: HashMap<String, VariableId>,
    err: Option<ModelError>,
}

impl BayesianNetworkBuilder {
    /// Construct a new builder representing an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a discrete variable with `cardinality` states.
    pub fn with_discrete(self, name: &str, cardinality: usize, parents: &[&str], init: Initialization) -> Self {
        self.add_variable(name, VariableKind::Discrete { cardinality }, parents, init)
    }

    /// Add a binary variable.
    pub fn with_binary(self, name: &str, parents: &[&str], init: Initialization) -> Self {
        self.with_discrete(name, 2, parents, init)
    }

    /// Add a continuous (Gaussian) variable.
    pub fn with_continuous(self, name: &str, parents: &[&str], init: Initialization) -> Self {
        self.add_variable(name, VariableKind::Continuous, parents, init)
    }

    /// Complete building the network.
    ///
    /// # Postcondition
    /// This call consumes the `BayesianNetworkBuilder`
    pub fn build(self) -> Result<BayesianNetwork, ModelError> {
        if let Some(e) = self.err {
            return Err(e);
        }

        debug!("Built Bayesian network with {} variables", self.variables.len());
        Ok(BayesianNetwork {
            variables: self.variables,
            cpds: self.cpds,
            names: self.names,
        })
    }

    /// Internal function that actually does the variable addition
    fn add_variable(mut self, name: &str, kind: VariableKind, parents: &[&str], init: Initialization) -> Self {
        ///////////////////////////////////////////////////////////////////////
        // 1) if we are in an error state, do nothing
        if self.err.is_some() {
            return self;
        }

        ///////////////////////////////////////////////////////////////////////
        // 2) Check for error conditions
        if self.names.contains_key(name) {
            self.err = Some(ModelError::DuplicateVariable(name.to_string()));
            return self;
        }

        let mut parent_vars = Vec::with_capacity(parents.len());
        for parent in parents {
            match self.names.get(*parent) {
                Some(id) if !parent_vars.iter().any(|p: &&Variable| p.id() == *id) => {
                    parent_vars.push(&self.variables[id.index()]);
                }
                Some(_) => {
                    self.err = Some(ModelError::DuplicateVariable(parent.to_string()));
                    return self;
                }
                None => {
                    self.err = Some(ModelError::MissingParent {
                        variable: name.to_string(),
                        parent: parent.to_string(),
                    });
                    return self;
                }
            }
        }

        ///////////////////////////////////////////////////////////////////////
        // 3) Build the CPD based on the initialization
        let var = Variable::new(VariableId(self.variables.len()), name, kind);
        let cpd = match init.build_cpd(&var, &parent_vars) {
            Ok(cpd) => cpd,
            Err(e) => {
                self.err = Some(e);
                return self;
            }
        };

        ///////////////////////////////////////////////////////////////////////
        // 4) Add to current network
        self.names.insert(name.to_string(), var.id());
        self.variables.push(var);
        self.cpds.push(cpd);

        self
    }
}
