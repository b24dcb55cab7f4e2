//! Per-request resolution state.

use crate::{DiError, Module};

/// Chain of types being resolved by one top-level request.
///
/// Passed explicitly through every nested resolution; re-entering a type
/// already on the chain is a cycle.
#[derive(Debug)]
pub(crate) struct ResolutionContext {
    chain: Vec<String>,
    max_depth: usize,
}

impl ResolutionContext {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            chain: Vec::new(),
            max_depth,
        }
    }

    pub(crate) fn enter(&mut self, type_name: &str) -> Result<(), DiError> {
        if self.chain.iter().any(|t| t == type_name) {
            let mut path = self.chain.clone();
            path.push(type_name.to_string());
            return Err(DiError::Circular(path));
        }
        if self.chain.len() >= self.max_depth {
            return Err(DiError::DepthExceeded(self.max_depth));
        }
        self.chain.push(type_name.to_string());
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.chain.pop();
    }

    /// Attaches the chain and module rendering to a not-bound failure, once,
    /// at the deepest point it surfaces.
    pub(crate) fn annotate(&self, error: DiError, module: &Module) -> DiError {
        match error {
            DiError::NotBound(mut detail) if detail.chain.is_empty() => {
                detail.chain = self.chain.clone();
                detail.module = Some(module.to_string());
                DiError::NotBound(detail)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentry_is_a_cycle() {
        let mut cx = ResolutionContext::new(8);
        cx.enter("A").unwrap();
        cx.enter("B").unwrap();
        let err = cx.enter("A").unwrap_err();
        assert!(matches!(err, DiError::Circular(path) if path == ["A", "B", "A"]));
        cx.leave();
        assert_eq!(cx.chain, ["A"]);
    }

    #[test]
    fn depth_is_bounded() {
        let mut cx = ResolutionContext::new(2);
        cx.enter("A").unwrap();
        cx.enter("B").unwrap();
        assert!(matches!(cx.enter("C"), Err(DiError::DepthExceeded(2))));
    }
}
