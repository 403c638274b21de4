use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use super::{CircuitInstance, NodeAliases, Simulator};
use crate::config::AnalysisDefaults;
use crate::core::{Specification, SpecificationGroup};
use crate::error::Result;

/// Anything a parameter vector can be bound to.
///
/// The optimizer is generic over this: a single template binds to one
/// instance, a template group binds to one instance per member.
pub trait Bindable {
    type Bound;

    /// Names of the vector entries, in binding order.
    fn parameters(&self) -> &IndexSet<String>;

    /// Bind `values`, replacing the analysis defaults of every bound instance
    /// when `defaults` is given.
    fn bind_with(
        &self,
        values: &[f64],
        defaults: Option<&AnalysisDefaults>,
    ) -> Result<Self::Bound>;

    fn bind(&self, values: &[f64]) -> Result<Self::Bound> {
        self.bind_with(values, None)
    }
}

/// A parsed circuit description plus everything needed to simulate it.
///
/// Parsing happens once; cloning a template and instantiating circuits from it
/// shares the parsed specification and the simulator handle.
#[derive(Clone)]
pub struct CircuitTemplate {
    specification: Rc<Specification>,
    simulator: Rc<dyn Simulator>,
    aliases: Rc<NodeAliases>,
    defaults: AnalysisDefaults,
    /// Appended verbatim after the bound netlist, never parsed for placeholders.
    raw_spice: Rc<str>,
}

impl fmt::Debug for CircuitTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitTemplate")
            .field("parameters", self.specification.parameters())
            .field("aliases", &self.aliases)
            .field("defaults", &self.defaults)
            .field("raw_spice", &self.raw_spice)
            .finish_non_exhaustive()
    }
}

impl CircuitTemplate {
    pub fn new(netlist: impl Into<String>, simulator: Rc<dyn Simulator>) -> Self {
        Self::from_specification(Rc::new(Specification::parse(netlist)), simulator)
    }

    pub fn from_specification(specification: Rc<Specification>, simulator: Rc<dyn Simulator>) -> Self {
        Self {
            specification,
            simulator,
            aliases: Rc::new(NodeAliases::default()),
            defaults: AnalysisDefaults::default(),
            raw_spice: Rc::from(""),
        }
    }

    pub fn with_raw_spice(mut self, raw_spice: &str) -> Self {
        self.raw_spice = Rc::from(raw_spice);
        self
    }

    pub fn with_aliases(mut self, aliases: NodeAliases) -> Self {
        self.aliases = Rc::new(aliases);
        self
    }

    pub fn with_defaults(mut self, defaults: AnalysisDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn specification(&self) -> &Rc<Specification> {
        &self.specification
    }

    pub fn simulator(&self) -> &dyn Simulator {
        self.simulator.as_ref()
    }

    pub fn aliases(&self) -> &NodeAliases {
        &self.aliases
    }

    pub fn defaults(&self) -> &AnalysisDefaults {
        &self.defaults
    }

    pub fn raw_spice(&self) -> &str {
        &self.raw_spice
    }

    /// Bind `values` and wrap the resulting netlist in a fresh instance.
    pub fn instantiate(&self, values: &[f64]) -> Result<CircuitInstance> {
        self.instantiate_with(values, self.defaults)
    }

    /// Like [`instantiate`](Self::instantiate), with the instance's metric
    /// accessors sweeping `defaults` instead of the template's.
    pub fn instantiate_with(
        &self,
        values: &[f64],
        defaults: AnalysisDefaults,
    ) -> Result<CircuitInstance> {
        let mut netlist = self.specification.bind(values)?;
        if !self.raw_spice.is_empty() {
            if !netlist.ends_with('\n') {
                netlist.push('\n');
            }
            netlist.push_str(&self.raw_spice);
        }
        Ok(CircuitInstance::new(self.clone(), values.to_vec(), netlist, defaults))
    }
}

impl Bindable for CircuitTemplate {
    type Bound = CircuitInstance;

    fn parameters(&self) -> &IndexSet<String> {
        self.specification.parameters()
    }

    fn bind_with(
        &self,
        values: &[f64],
        defaults: Option<&AnalysisDefaults>,
    ) -> Result<CircuitInstance> {
        self.instantiate_with(values, defaults.copied().unwrap_or(self.defaults))
    }
}

/// Templates searched together over one joint parameter vector, e.g. an AC
/// testbench and a transient testbench of the same amplifier.
#[derive(Debug, Clone)]
pub struct TemplateGroup {
    templates: Vec<CircuitTemplate>,
    group: SpecificationGroup,
}

impl TemplateGroup {
    pub fn new(templates: Vec<CircuitTemplate>) -> Self {
        let group = SpecificationGroup::new(
            templates
                .iter()
                .map(|t| Rc::clone(t.specification()))
                .collect(),
        );
        Self { templates, group }
    }

    pub fn templates(&self) -> &[CircuitTemplate] {
        &self.templates
    }

    pub fn group(&self) -> &SpecificationGroup {
        &self.group
    }
}

impl Bindable for TemplateGroup {
    type Bound = Vec<CircuitInstance>;

    fn parameters(&self) -> &IndexSet<String> {
        self.group.parameters()
    }

    /// One instance per member, in member order.
    fn bind_with(
        &self,
        values: &[f64],
        defaults: Option<&AnalysisDefaults>,
    ) -> Result<Vec<CircuitInstance>> {
        self.templates
            .iter()
            .zip(self.group.project(values)?)
            .map(|(template, local)| template.bind_with(&local, defaults))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, SimulationError};
    use crate::simulation::{Analysis, AnalysisResult};

    fn unused_simulator() -> Rc<dyn Simulator> {
        Rc::new(|_: &str, _: &Analysis| -> std::result::Result<AnalysisResult, SimulationError> {
            Err(SimulationError::Failed("not used".into()))
        })
    }

    #[test]
    fn raw_spice_is_appended_unparsed() {
        let template = CircuitTemplate::new("R1 a b {r}", unused_simulator())
            .with_raw_spice(".control\nlet x = {1}\n.endc");
        let circuit = template.instantiate(&[2e3]).unwrap();
        assert_eq!(circuit.netlist(), "R1 a b 2e3\n.control\nlet x = {1}\n.endc");
        assert_eq!(template.parameters().len(), 1);
    }

    #[test]
    fn instances_share_the_parsed_specification() {
        let template = CircuitTemplate::new("C1 a 0 {c}", unused_simulator());
        let circuit = template.instantiate(&[1e-12]).unwrap();
        assert!(Rc::ptr_eq(
            template.specification(),
            circuit.template().specification()
        ));
    }

    #[test]
    fn group_binding_returns_member_instances() {
        let sim = unused_simulator();
        let group = TemplateGroup::new(vec![
            CircuitTemplate::new("ac {w} {l}", Rc::clone(&sim)),
            CircuitTemplate::new("tran {l} {ibias}", sim),
        ]);
        let names: Vec<&str> = group.parameters().iter().map(String::as_str).collect();
        assert_eq!(names, ["w", "l", "ibias"]);

        let circuits = group.bind(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(circuits.len(), 2);
        assert_eq!(circuits[0].values(), [1.0, 2.0]);
        assert_eq!(circuits[1].values(), [2.0, 3.0]);
        assert_eq!(circuits[1].parameter("l"), Some(2.0));

        assert!(matches!(group.bind(&[1.0]), Err(Error::Binding(_))));
    }

    #[test]
    fn override_defaults_reach_every_member() {
        let sim = unused_simulator();
        let mut narrow = AnalysisDefaults::default();
        narrow.ac.stop = 1e6;
        narrow.transient.points = 10;

        let group = TemplateGroup::new(vec![
            CircuitTemplate::new("ac {w}", Rc::clone(&sim)),
            CircuitTemplate::new("tran {w}", sim),
        ]);
        for circuit in group.bind_with(&[1.0], Some(&narrow)).unwrap() {
            assert_eq!(circuit.defaults(), &narrow);
        }
        for circuit in group.bind(&[1.0]).unwrap() {
            assert_eq!(circuit.defaults(), &AnalysisDefaults::default());
        }
    }
}
