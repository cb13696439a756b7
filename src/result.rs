//! Inputs, return values and effects collected during exploration.

use std::collections::HashSet;
use std::fmt;

use log::debug;

use crate::recorder::PathRecorder;
use crate::symbolic::SymValue;
use crate::types::Value;

/// One concrete input tuple, in parameter order.
pub type Inputs = Vec<(String, Value)>;

/// Formats an input tuple as `x=1, y=true`.
pub struct DisplayInputs<'a>(pub &'a Inputs);

impl fmt::Display for DisplayInputs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    generated_inputs: Vec<Inputs>,
    return_values: Vec<Option<Value>>,
    seen: HashSet<Inputs>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new input tuple. Returns `false` if it was generated before.
    pub fn record_inputs(&mut self, inputs: &Inputs) -> bool {
        if !self.seen.insert(inputs.clone()) {
            return false;
        }
        self.generated_inputs.push(inputs.clone());
        true
    }

    /// Stores the effect of an execution on the nodes where it ended.
    ///
    /// An execution following the new variant writes the new expression on the
    /// merged and mirror paths, and the old expression on the shadow path while
    /// the variants have not diverged, and counts as the execution's return value.
    /// An execution following the old variant only writes the shadow path.
    pub fn record_output(&mut self, recorder: &mut PathRecorder, ret: &SymValue, shadow_leading: bool) {
        let (current, shadow, mirror) = (recorder.current(), recorder.shadow_current(), recorder.mirror_current());
        let diverged = recorder.is_diverged();
        let tree = recorder.tree_mut();
        if shadow_leading {
            tree.set_effect(shadow, ret.old_expr().clone());
            return;
        }
        tree.set_effect(current, ret.expr().clone());
        tree.set_effect(mirror, ret.expr().clone());
        if !diverged {
            tree.set_effect(shadow, ret.old_expr().clone());
        }
        debug!("Effect of {}: {}", current, ret.expr());
        self.return_values.push(Some(ret.value()));
    }

    /// Records an execution that produced no value.
    pub fn record_absent(&mut self) {
        self.return_values.push(None);
    }

    pub fn generated_inputs(&self) -> &[Inputs] {
        &self.generated_inputs
    }

    pub fn return_values(&self) -> &[Option<Value>] {
        &self.return_values
    }

    pub fn len(&self) -> usize {
        self.generated_inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generated_inputs.is_empty()
    }
}
