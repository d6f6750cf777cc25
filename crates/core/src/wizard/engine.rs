use thiserror::Error;

use crate::wizard::states::{
    TransitionOutcome, WizardAction, WizardContext, WizardEvent, WizardStep,
};

pub trait WizardDefinition {
    fn initial_step(&self) -> WizardStep;
    fn transition(
        &self,
        current: WizardStep,
        event: WizardEvent,
        context: &WizardContext,
    ) -> Result<TransitionOutcome, WizardTransitionError>;
}

/// The strictly linear requisition wizard: Header → Items → Review, no
/// skipping, with Review terminal and reset available from every step.
#[derive(Clone, Debug, Default)]
pub struct LinearWizard;

impl WizardDefinition for LinearWizard {
    fn initial_step(&self) -> WizardStep {
        WizardStep::Header
    }

    fn transition(
        &self,
        current: WizardStep,
        event: WizardEvent,
        context: &WizardContext,
    ) -> Result<TransitionOutcome, WizardTransitionError> {
        transition_linear(current, event, context)
    }
}

pub struct WizardEngine<W> {
    wizard: W,
}

impl<W> WizardEngine<W>
where
    W: WizardDefinition,
{
    pub fn new(wizard: W) -> Self {
        Self { wizard }
    }

    pub fn initial_step(&self) -> WizardStep {
        self.wizard.initial_step()
    }

    pub fn apply(
        &self,
        current: WizardStep,
        event: WizardEvent,
        context: &WizardContext,
    ) -> Result<TransitionOutcome, WizardTransitionError> {
        self.wizard.transition(current, event, context)
    }
}

impl Default for WizardEngine<LinearWizard> {
    fn default() -> Self {
        Self::new(LinearWizard)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WizardTransitionError {
    #[error("required header fields are incomplete: {missing_fields:?}")]
    MissingHeaderFields { missing_fields: Vec<String> },
    #[error("add at least one item before continuing")]
    EmptyLedger,
    #[error("a requisition number has not been reserved")]
    ReservationMissing,
    #[error("invalid transition from {step:?} using event {event:?}")]
    InvalidTransition { step: WizardStep, event: WizardEvent },
}

fn transition_linear(
    current: WizardStep,
    event: WizardEvent,
    context: &WizardContext,
) -> Result<TransitionOutcome, WizardTransitionError> {
    use WizardAction::{LoadItemCatalogs, PresentReview, ReseedHeader, ReserveNumber};
    use WizardEvent::{HeaderCompleted, ItemsCompleted, ResetRequested};
    use WizardStep::{Header, Items, Review};

    let (to, actions) = match (current, event) {
        (Header, HeaderCompleted) => {
            if !context.missing_header_fields.is_empty() {
                return Err(WizardTransitionError::MissingHeaderFields {
                    missing_fields: context.missing_header_fields.clone(),
                });
            }
            (Items, vec![LoadItemCatalogs, ReserveNumber])
        }
        (Items, ItemsCompleted) => {
            if !context.reservation_present {
                return Err(WizardTransitionError::ReservationMissing);
            }
            if context.item_count == 0 {
                return Err(WizardTransitionError::EmptyLedger);
            }
            (Review, vec![PresentReview])
        }
        (_, ResetRequested) => (Header, vec![ReseedHeader]),
        _ => {
            return Err(WizardTransitionError::InvalidTransition { step: current, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}
