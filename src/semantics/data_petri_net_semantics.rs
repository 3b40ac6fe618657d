use anyhow::{Context, Result, anyhow};
use bitvec::{bitvec, vec::BitVec};
use std::fmt::{self, Display};

use crate::{
    dalg_objects::{
        data_petri_net::{DataPetriNet, TransitionIndex},
        variable::VariableState,
    },
    marking::Marking,
    math::probabilities::normalise,
};

use super::semantics::{FiringEffect, Semantics};

#[derive(Debug, Clone, PartialEq)]
pub struct DPNState {
    pub(crate) marking: Marking,
    /// enabledness by tokens only
    pub(crate) enabled_transitions: BitVec,
    pub(crate) number_of_enabled_transitions: usize,
    pub(crate) variables: VariableState,
}

impl DPNState {
    pub fn get_marking(&self) -> &Marking {
        &self.marking
    }

    pub fn get_variables(&self) -> &VariableState {
        &self.variables
    }

    pub fn get_variables_mut(&mut self) -> &mut VariableState {
        &mut self.variables
    }
}

impl Display for DPNState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "marking {}, {} enabled transitions",
            self.marking, self.number_of_enabled_transitions
        )
    }
}

impl DataPetriNet {
    fn compute_enabled_transition(&self, state: &mut DPNState, transition: TransitionIndex) -> bool {
        if !state.marking.covers(
            &self.transition2input_places[transition],
            &self.transition2input_places_cardinality[transition],
        ) {
            if state.enabled_transitions[transition] {
                state.enabled_transitions.set(transition, false);
                state.number_of_enabled_transitions -= 1;
            }
            return false;
        }

        if !state.enabled_transitions[transition] {
            state.enabled_transitions.set(transition, true);
            state.number_of_enabled_transitions += 1;
        }
        true
    }

    pub(crate) fn compute_enabled_transitions(&self, state: &mut DPNState) {
        state.number_of_enabled_transitions = 0;
        state.enabled_transitions.fill(false);
        for transition in 0..self.get_number_of_transitions() {
            self.compute_enabled_transition(state, transition);
        }
    }

    /**
     * Puts the state back to the initial marking, with all variables unset.
     */
    pub fn reset_state(&self, state: &mut DPNState) {
        state.marking = self.initial_marking.clone();
        state.variables.clear();
        self.compute_enabled_transitions(state);
    }

    /**
     * Returns the enabled transitions together with the probability of choosing each of them, by
     * the weights of their configurations. The probabilities sum to exactly 1.
     */
    pub fn get_enabled_transitions_with_probabilities(
        &self,
        state: &DPNState,
        with_data: bool,
    ) -> Result<(Vec<TransitionIndex>, Vec<f64>)> {
        let enabled = self.get_enabled_transitions(state, with_data)?;
        let weights: Vec<f64> = enabled
            .iter()
            .map(|transition| self.transitions[*transition].configuration.weight.max(0.0))
            .collect();
        Ok((enabled, normalise(&weights)))
    }

    /**
     * The part of the state that identifies it for loop bounds and memoisation.
     */
    pub fn marking_signature<'s>(&self, state: &'s DPNState) -> &'s Marking {
        &state.marking
    }
}

impl Semantics for DataPetriNet {
    type SemState = DPNState;

    fn get_initial_state(&self) -> Result<DPNState> {
        if !self.finalized {
            return Err(anyhow!("net `{}` has not been finalized", self.name));
        }
        let mut result = DPNState {
            marking: self.initial_marking.clone(),
            enabled_transitions: bitvec![0; self.get_number_of_transitions()],
            number_of_enabled_transitions: 0,
            variables: VariableState::new(self.get_number_of_variables()),
        };
        self.compute_enabled_transitions(&mut result);
        Ok(result)
    }

    fn is_enabled(
        &self,
        state: &DPNState,
        transition: TransitionIndex,
        with_data: bool,
    ) -> Result<bool> {
        if transition >= self.get_number_of_transitions() {
            return Err(anyhow!(
                "non-existing transition {} referenced, while there are {}",
                transition,
                self.get_number_of_transitions()
            ));
        }
        if !state.enabled_transitions[transition] {
            return Ok(false);
        }
        if with_data {
            let transition = &self.transitions[transition];
            return transition
                .guard
                .evaluate(&state.variables)
                .with_context(|| format!("evaluating the guard of transition `{}`", transition.id));
        }
        Ok(true)
    }

    fn execute_transition(
        &self,
        state: &mut DPNState,
        transition: TransitionIndex,
    ) -> Result<FiringEffect> {
        if !self.is_enabled(state, transition, false)? {
            return Err(anyhow!(
                "transition {} is not enabled in marking {}",
                transition,
                state.marking
            ));
        }

        let mut marking = state.marking.clone();
        for (place_pos, place) in self.transition2input_places[transition].iter().enumerate() {
            let arc_weight = self.transition2input_places_cardinality[transition][place_pos];
            marking
                .decrease(*place, arc_weight)
                .with_context(|| format!("transition {} is not enabled", transition))?;
        }
        for (place_pos, place) in self.transition2output_places[transition].iter().enumerate() {
            let arc_weight = self.transition2output_places_cardinality[transition][place_pos];
            marking
                .increase(*place, arc_weight)
                .with_context(|| format!("when firing transition {}", transition))?;
        }
        state.marking = marking;

        //update the enabled transitions of all places that were touched
        let inputs = &self.transition2input_places[transition];
        let outputs = &self.transition2output_places[transition];
        for place in inputs.iter().chain(outputs.iter()) {
            for transition_t in &self.place2output_transitions[*place] {
                self.compute_enabled_transition(state, *transition_t);
            }
        }

        Ok(FiringEffect {
            consumed: inputs
                .iter()
                .filter(|place| !outputs.contains(place))
                .copied()
                .collect(),
            produced: outputs
                .iter()
                .filter(|place| !inputs.contains(place))
                .copied()
                .collect(),
        })
    }

    fn is_final_state(&self, state: &DPNState) -> bool {
        self.final_markings.contains(&state.marking)
    }

    fn is_transition_silent(&self, transition: TransitionIndex) -> bool {
        self.transitions[transition].invisible
    }

    fn get_enabled_transitions(
        &self,
        state: &DPNState,
        with_data: bool,
    ) -> Result<Vec<TransitionIndex>> {
        let mut result = Vec::with_capacity(state.number_of_enabled_transitions);
        for transition in state.enabled_transitions.iter_ones() {
            if !with_data || self.is_enabled(state, transition, true)? {
                result.push(transition);
            }
        }
        Ok(result)
    }

    fn get_number_of_transitions(&self) -> usize {
        self.transitions.len()
    }
}
