//! The interceptor chain of one method call.

use std::sync::Arc;

use super::MethodInterceptor;
use crate::reflect::Method;
use crate::{Annotation, Args, DiResult, Object, Value};

/// One in-flight call through an interceptor chain.
pub struct MethodInvocation<'a> {
    this: &'a Object,
    method: &'a Method,
    args: Args,
    chain: &'a [Arc<dyn MethodInterceptor>],
    index: usize,
    annotation: Option<&'a Annotation>,
}

impl<'a> MethodInvocation<'a> {
    pub(crate) fn new(
        this: &'a Object,
        method: &'a Method,
        args: Args,
        chain: &'a [Arc<dyn MethodInterceptor>],
        annotation: Option<&'a Annotation>,
    ) -> Self {
        Self {
            this,
            method,
            args,
            chain,
            index: 0,
            annotation,
        }
    }

    /// Runs the next interceptor, or the original method after the last one.
    pub fn proceed(&mut self) -> DiResult<Value> {
        let chain = self.chain;
        match chain.get(self.index) {
            Some(next) => {
                self.index += 1;
                next.invoke(self)
            }
            None => self
                .method
                .call_shared(self.this.class_name(), self.this.instance(), &self.args),
        }
    }

    /// The woven object receiving the call.
    pub fn this(&self) -> &Object {
        self.this
    }

    pub fn method(&self) -> &Method {
        self.method
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    pub fn arguments(&self) -> &Args {
        &self.args
    }

    pub fn arguments_mut(&mut self) -> &mut Args {
        &mut self.args
    }

    /// Annotation that selected this method, for annotation-driven pointcuts.
    pub fn annotation(&self) -> Option<&Annotation> {
        self.annotation
    }

    /// Position of the interceptor currently running, starting at 1.
    pub fn depth(&self) -> usize {
        self.index
    }
}
