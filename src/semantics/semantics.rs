use anyhow::Result;
use std::fmt::Debug;

use crate::dalg_objects::data_petri_net::TransitionIndex;

/// The places whose token count changed by firing a transition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FiringEffect {
    /// places that lost tokens, excluding places that are also an output of the transition
    pub consumed: Vec<usize>,
    /// places that gained tokens, excluding places that are also an input of the transition
    pub produced: Vec<usize>,
}

pub trait Semantics: Debug {
    type SemState: Debug + Clone;

    /// Returns the initial state.
    /// Fails if the model has not been prepared for simulation.
    fn get_initial_state(&self) -> Result<<Self as Semantics>::SemState>;

    /// Returns whether `transition` may fire in `state`.
    /// With `with_data`, the guard of the transition must hold as well; otherwise only tokens are considered.
    fn is_enabled(
        &self,
        state: &<Self as Semantics>::SemState,
        transition: TransitionIndex,
        with_data: bool,
    ) -> Result<bool>;

    /// Update the state to reflect execution of `transition`.
    /// Returns an error when `transition` is not enabled by tokens, or when the marking cannot be represented.
    /// In that case, the state is left untouched.
    fn execute_transition(
        &self,
        state: &mut <Self as Semantics>::SemState,
        transition: TransitionIndex,
    ) -> Result<FiringEffect>;

    /// Returns whether the marking of the state equals one of the final markings exactly.
    /// Transitions may still be enabled in a final state.
    fn is_final_state(&self, state: &<Self as Semantics>::SemState) -> bool;

    fn is_transition_silent(&self, transition: TransitionIndex) -> bool;

    /// Returns the enabled transitions in `state`, in increasing order.
    fn get_enabled_transitions(
        &self,
        state: &<Self as Semantics>::SemState,
        with_data: bool,
    ) -> Result<Vec<TransitionIndex>>;

    fn get_number_of_transitions(&self) -> usize;
}
