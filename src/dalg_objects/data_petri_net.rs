use anyhow::{Context, Result, anyhow};
use std::fmt::{self, Display};

use crate::{guards::guard::Guard, marking::Marking};

use super::{
    transition_configuration::TransitionConfiguration,
    variable::{Variable, VariableIndex, VariableTable, lookup_variable},
};

pub type TransitionIndex = usize;

#[derive(Debug, Clone)]
pub struct Transition {
    pub id: String,
    pub name: String,
    pub invisible: bool,
    pub(crate) guard_text: Option<String>,
    pub(crate) guard: Guard,
    pub(crate) reads_variables: Vec<VariableIndex>,
    pub(crate) writes_variables: Vec<VariableIndex>,
    pub configuration: TransitionConfiguration,
}

impl Transition {
    pub fn get_guard(&self) -> &Guard {
        &self.guard
    }

    pub fn get_guard_text(&self) -> Option<&str> {
        self.guard_text.as_deref()
    }

    pub fn get_reads_variables(&self) -> &[VariableIndex] {
        &self.reads_variables
    }

    pub fn get_writes_variables(&self) -> &[VariableIndex] {
        &self.writes_variables
    }
}

/// A Petri net whose transitions carry guards over typed variables and write variables when they fire.
#[derive(Debug, Clone)]
pub struct DataPetriNet {
    pub(crate) name: String,
    pub(crate) place_names: Vec<String>,
    pub(crate) initial_marking: Marking,
    pub(crate) final_markings: Vec<Marking>,
    pub(crate) place2output_transitions: Vec<Vec<TransitionIndex>>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) transition2input_places: Vec<Vec<usize>>,
    pub(crate) transition2output_places: Vec<Vec<usize>>,
    pub(crate) transition2input_places_cardinality: Vec<Vec<u64>>,
    pub(crate) transition2output_places_cardinality: Vec<Vec<u64>>,
    pub(crate) variables: VariableTable,
    pub(crate) finalized: bool,
}

impl DataPetriNet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            place_names: vec![],
            initial_marking: Marking::new(0),
            final_markings: vec![],
            place2output_transitions: vec![],
            transitions: vec![],
            transition2input_places: vec![],
            transition2output_places: vec![],
            transition2input_places_cardinality: vec![],
            transition2output_places_cardinality: vec![],
            variables: VariableTable::new(),
            finalized: false,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_number_of_transitions(&self) -> usize {
        self.transitions.len()
    }

    pub fn get_number_of_places(&self) -> usize {
        self.place2output_transitions.len()
    }

    pub fn get_number_of_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn get_initial_marking(&self) -> &Marking {
        &self.initial_marking
    }

    pub fn get_final_markings(&self) -> &[Marking] {
        &self.final_markings
    }

    pub fn get_transition(&self, transition: TransitionIndex) -> &Transition {
        &self.transitions[transition]
    }

    pub fn get_transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn get_transition_mut(&mut self, transition: TransitionIndex) -> Result<&mut Transition> {
        let number_of_transitions = self.get_number_of_transitions();
        self.transitions.get_mut(transition).ok_or_else(|| {
            anyhow!(
                "non-existing transition {} referenced, while there are {}",
                transition,
                number_of_transitions
            )
        })
    }

    pub fn get_transition_configuration_mut(
        &mut self,
        transition: TransitionIndex,
    ) -> Result<&mut TransitionConfiguration> {
        Ok(&mut self.get_transition_mut(transition)?.configuration)
    }

    pub fn get_transition_by_id(&self, id: &str) -> Option<TransitionIndex> {
        self.transitions
            .iter()
            .position(|transition| transition.id == id)
    }

    pub fn get_place_name(&self, place: usize) -> Option<&str> {
        self.place_names.get(place).map(|name| name.as_str())
    }

    pub fn get_variables(&self) -> &VariableTable {
        &self.variables
    }

    pub fn get_variable(&self, variable: VariableIndex) -> Option<&Variable> {
        self.variables.get_index(variable).map(|(_, variable)| variable)
    }

    pub fn get_variable_mut(&mut self, variable: VariableIndex) -> Option<&mut Variable> {
        self.variables
            .get_index_mut(variable)
            .map(|(_, variable)| variable)
    }

    pub fn get_variable_index(&self, name: &str) -> Option<VariableIndex> {
        lookup_variable(&self.variables, name).map(|(index, _)| index)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /**
     * The guard texts of all transitions that have one.
     */
    pub fn get_guard_texts(&self) -> impl Iterator<Item = &str> {
        self.transitions
            .iter()
            .filter_map(|transition| transition.guard_text.as_deref())
    }

    pub fn add_place(&mut self, name: &str) -> usize {
        let place = self.get_number_of_places();
        self.place_names.push(name.to_string());
        self.place2output_transitions.push(vec![]);
        self.initial_marking.add_place();
        for marking in self.final_markings.iter_mut() {
            marking.add_place();
        }
        self.finalized = false;
        place
    }

    /**
     * Adds a transition. A transition without label is invisible and does not show up in the log
     * unless configured otherwise.
     */
    pub fn add_transition(&mut self, id: &str, label: Option<&str>) -> TransitionIndex {
        let mut configuration = TransitionConfiguration::new(label.unwrap_or(id));
        configuration.included_variables = self
            .variables
            .values()
            .map(|variable| variable.original_name.clone())
            .collect();
        self.transitions.push(Transition {
            id: id.to_string(),
            name: label.unwrap_or(id).to_string(),
            invisible: label.is_none(),
            guard_text: None,
            guard: Guard::always(),
            reads_variables: vec![],
            writes_variables: vec![],
            configuration,
        });
        self.transition2input_places.push(vec![]);
        self.transition2input_places_cardinality.push(vec![]);
        self.transition2output_places.push(vec![]);
        self.transition2output_places_cardinality.push(vec![]);
        self.finalized = false;
        self.get_number_of_transitions() - 1
    }

    fn check_arc(&self, transition: TransitionIndex, place: usize) -> Result<()> {
        if transition >= self.get_number_of_transitions() {
            Err(anyhow!(
                "non-existing transition {} referenced, while there are {}",
                transition,
                self.get_number_of_transitions()
            ))
        } else if place >= self.get_number_of_places() {
            Err(anyhow!(
                "non-existing place {} referenced, while there are {}",
                place,
                self.get_number_of_places()
            ))
        } else {
            Ok(())
        }
    }

    pub fn add_transition_place_arc(
        &mut self,
        from_transition: TransitionIndex,
        to_place: usize,
        cardinality: u64,
    ) -> Result<()> {
        self.check_arc(from_transition, to_place)?;

        if let Some(pos) = self.transition2output_places[from_transition]
            .iter()
            .position(|p| *p == to_place)
        {
            self.transition2output_places_cardinality[from_transition][pos] += cardinality;
        } else {
            self.transition2output_places[from_transition].push(to_place);
            self.transition2output_places_cardinality[from_transition].push(cardinality);
        }
        self.finalized = false;
        Ok(())
    }

    pub fn add_place_transition_arc(
        &mut self,
        from_place: usize,
        to_transition: TransitionIndex,
        cardinality: u64,
    ) -> Result<()> {
        self.check_arc(to_transition, from_place)?;

        if !self.place2output_transitions[from_place].contains(&to_transition) {
            self.place2output_transitions[from_place].push(to_transition);
        }

        if let Some(pos) = self.transition2input_places[to_transition]
            .iter()
            .position(|p| *p == from_place)
        {
            self.transition2input_places_cardinality[to_transition][pos] += cardinality;
        } else {
            self.transition2input_places[to_transition].push(from_place);
            self.transition2input_places_cardinality[to_transition].push(cardinality);
        }
        self.finalized = false;
        Ok(())
    }

    /**
     * Adds a variable, which every transition records on its events by default.
     */
    pub fn add_variable(&mut self, variable: Variable) -> Result<VariableIndex> {
        if self.variables.contains_key(&variable.name) {
            return Err(anyhow!("variable `{}` is declared twice", variable.name));
        }
        for transition in self.transitions.iter_mut() {
            transition
                .configuration
                .included_variables
                .push(variable.original_name.clone());
        }
        let (index, _) = self.variables.insert_full(variable.name.clone(), variable);
        self.finalized = false;
        Ok(index)
    }

    pub fn set_guard(&mut self, transition: TransitionIndex, guard: &str) -> Result<()> {
        let transition = self.get_transition_mut(transition)?;
        transition.guard_text = if guard.trim().is_empty() {
            None
        } else {
            Some(guard.to_string())
        };
        transition.guard = Guard::always();
        self.finalized = false;
        Ok(())
    }

    fn variable_index(&self, name: &str) -> Result<VariableIndex> {
        self.get_variable_index(name)
            .ok_or_else(|| anyhow!("non-existing variable `{}` referenced", name))
    }

    pub fn add_reads_variable(&mut self, transition: TransitionIndex, variable: &str) -> Result<()> {
        let variable = self.variable_index(variable)?;
        let transition = self.get_transition_mut(transition)?;
        if !transition.reads_variables.contains(&variable) {
            transition.reads_variables.push(variable);
        }
        Ok(())
    }

    pub fn add_writes_variable(
        &mut self,
        transition: TransitionIndex,
        variable: &str,
    ) -> Result<()> {
        let variable = self.variable_index(variable)?;
        let transition = self.get_transition_mut(transition)?;
        if !transition.writes_variables.contains(&variable) {
            transition.writes_variables.push(variable);
        }
        Ok(())
    }

    pub fn set_initial_marking(&mut self, marking: Marking) -> Result<()> {
        self.check_marking(&marking)?;
        self.initial_marking = marking;
        self.finalized = false;
        Ok(())
    }

    pub fn add_final_marking(&mut self, marking: Marking) -> Result<()> {
        self.check_marking(&marking)?;
        if !self.final_markings.contains(&marking) {
            self.final_markings.push(marking);
        }
        self.finalized = false;
        Ok(())
    }

    fn check_marking(&self, marking: &Marking) -> Result<()> {
        if marking.get_number_of_places() != self.get_number_of_places() {
            return Err(anyhow!(
                "marking {} has {} places, while the net has {}",
                marking,
                marking.get_number_of_places(),
                self.get_number_of_places()
            ));
        }
        Ok(())
    }

    /**
     * Validates the structure of the net and compiles all guards and dependency conditions.
     * A guard that does not compile is returned as a `GuardError` inside the error.
     */
    pub fn finalize(&mut self) -> Result<()> {
        if self.get_number_of_places() == 0 {
            return Err(anyhow!("net `{}` has no places", self.name));
        }
        if self.get_number_of_transitions() == 0 {
            return Err(anyhow!("net `{}` has no transitions", self.name));
        }
        if self.initial_marking.number_of_tokens() == 0 {
            return Err(anyhow!("the initial marking of net `{}` is empty", self.name));
        }
        if self.final_markings.is_empty() {
            return Err(anyhow!("net `{}` has no final marking", self.name));
        }

        for transition in self.transitions.iter_mut() {
            transition.guard = match &transition.guard_text {
                Some(text) => Guard::compile(text, &self.variables)
                    .with_context(|| format!("compiling the guard of transition `{}`", transition.id))?,
                None => Guard::always(),
            };
            for variable in transition.guard.get_read_variables() {
                if !transition.reads_variables.contains(variable) {
                    transition.reads_variables.push(*variable);
                }
            }
        }

        let mut compiled = vec![];
        for (name, variable) in self.variables.iter() {
            let mut guards = vec![];
            for dependency in variable.semantic_information.dependencies.iter() {
                if dependency.is_self_reference() {
                    guards.push(None);
                } else {
                    guards.push(Some(
                        Guard::compile(&dependency.condition, &self.variables).with_context(
                            || format!("compiling a dependency of variable `{}`", name),
                        )?,
                    ));
                }
            }
            compiled.push(guards);
        }
        for (variable, guards) in self.variables.values_mut().zip(compiled) {
            for (dependency, guard) in variable
                .semantic_information
                .dependencies
                .iter_mut()
                .zip(guards)
            {
                dependency.guard = guard;
            }
        }

        self.finalized = true;
        Ok(())
    }
}

impl Display for DataPetriNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "data Petri net `{}`", self.name)?;
        writeln!(f, "# number of places\n{}", self.get_number_of_places())?;
        writeln!(f, "# initial marking\n{}", self.initial_marking)?;
        for marking in self.final_markings.iter() {
            writeln!(f, "# final marking\n{}", marking)?;
        }
        writeln!(f, "# number of variables\n{}", self.variables.len())?;
        for (name, variable) in self.variables.iter() {
            writeln!(f, "# variable\n{} {}", name, variable.variable_type)?;
        }
        writeln!(f, "# number of transitions\n{}", self.get_number_of_transitions())?;
        for (index, transition) in self.transitions.iter().enumerate() {
            writeln!(f, "# transition {}", index)?;
            if transition.invisible {
                writeln!(f, "silent {}", transition.id)?;
            } else {
                writeln!(f, "label {}", transition.name)?;
            }
            if let Some(guard) = &transition.guard_text {
                writeln!(f, "guard {}", guard)?;
            }
            writeln!(
                f,
                "input places {:?} with cardinalities {:?}",
                self.transition2input_places[index],
                self.transition2input_places_cardinality[index]
            )?;
            writeln!(
                f,
                "output places {:?} with cardinalities {:?}",
                self.transition2output_places[index],
                self.transition2output_places_cardinality[index]
            )?;
        }
        Ok(())
    }
}
