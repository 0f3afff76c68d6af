//! An advisor pairs a pointcut (where) with an advice (what), plus optional ordering metadata.

use crate::advice::Advice;
use crate::pointcut::Pointcut;

#[derive(Clone)]
pub struct Advisor {
    pub pointcut: Pointcut,
    pub advice: Advice,
    /// Explicit ordering; lower runs more outward. Advisors without one keep registration
    /// order, after all explicitly ordered ones.
    pub order: Option<i32>,
}

impl Advisor {
    pub fn new(pointcut: Pointcut, advice: Advice) -> Self {
        Self {
            pointcut,
            advice,
            order: None,
        }
    }

    /// Advisor applying the advice unconditionally.
    pub fn always(advice: Advice) -> Self {
        Self::new(Pointcut::always(), advice)
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Whether both advisors carry the very same advice object.
    pub(crate) fn same_advice(&self, other: &Advisor) -> bool {
        self.advice.identity() == other.advice.identity() && self.order == other.order
    }
}
