//! Code capability
//!
//! [`Code`] is the executable part of a method or routine. The three variants
//! share one contract (`run` for method dispatch, `call` for routine-style
//! invocation) so dispatch and [`Method`](crate::Method) never look at which
//! one they hold:
//!
//! - `Interpreted`: a body produced by the language front end
//! - `Native`: a Rust function with an arity check
//! - `Registered`: a named external handler resolved through the runtime

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::handler::{HandlerContext, HandlerFn, HandlerResult};
use crate::scheduler::{Activity, Frame};
use crate::selector::Selector;
use crate::value::Value;
use crate::{RuntimeError, RuntimeResult};

/// How a piece of code was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallType {
    /// Dispatched as a method
    #[default]
    Method,
    /// Called as a function; a result is required
    Function,
    /// Called as a subroutine; a result is optional
    Subroutine,
    /// Run as a top-level program
    Program,
}

/// Caller-supplied context for routine-style calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    /// Name of the calling program, if known
    pub program: Option<Arc<str>>,
    /// Whether the call comes from outside any running program
    pub top_level: bool,
}

impl CallContext {
    /// Context for a call made by `program`
    pub fn from_program(program: &str) -> Self {
        Self {
            program: Some(Arc::from(program)),
            top_level: false,
        }
    }
}

/// Everything a code body gets to see of one invocation
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Receiver (absent for routine calls)
    pub receiver: Option<&'a Value>,
    /// Selector or routine name
    pub name: &'a Selector,
    /// Arguments
    pub args: &'a [Value],
    /// How the code was invoked
    pub call_type: CallType,
    /// Environment name supplied by the caller
    pub environment: Option<&'a str>,
    /// Caller context for routine calls
    pub context: Option<&'a CallContext>,
}

impl<'a> Invocation<'a> {
    /// Invocation produced by message dispatch
    pub fn method(receiver: &'a Value, name: &'a Selector, args: &'a [Value]) -> Self {
        Self {
            receiver: Some(receiver),
            name,
            args,
            call_type: CallType::Method,
            environment: None,
            context: None,
        }
    }

    /// Argument `index`, or an argument error naming the routine
    pub fn argument(&self, index: usize) -> RuntimeResult<&'a Value> {
        self.args.get(index).ok_or_else(|| {
            RuntimeError::Argument(format!("{}: missing argument {}", self.name, index + 1))
        })
    }
}

/// Accepted argument counts of a native function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    min: usize,
    max: Option<usize>,
}

impl Arity {
    /// Exactly `n` arguments
    pub const fn exact(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    /// At least `n` arguments
    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    /// Between `min` and `max` arguments, inclusive
    pub const fn range(min: usize, max: usize) -> Self {
        Self { min, max: Some(max) }
    }

    /// Any number of arguments
    pub const fn any() -> Self {
        Self { min: 0, max: None }
    }

    /// Check an argument count
    pub fn check(&self, name: &str, count: usize) -> RuntimeResult<()> {
        if count < self.min {
            return Err(RuntimeError::Argument(format!(
                "{}: expected at least {} arguments, got {}",
                name, self.min, count
            )));
        }
        match self.max {
            Some(max) if count > max => Err(RuntimeError::Argument(format!(
                "{}: expected at most {} arguments, got {}",
                name, max, count
            ))),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Interpreted bodies
// ============================================================================

/// A body produced by the language front end.
///
/// `execute` returns `None` when the body finished without a result.
pub trait InterpretedBody: Send + Sync {
    /// Name for diagnostics
    fn name(&self) -> &str;

    /// Run the body on the current activation of `activity`
    fn execute(
        &self,
        activity: &mut Activity,
        invocation: &Invocation<'_>,
    ) -> RuntimeResult<Option<Value>>;

    /// Whether the body reads or writes object variables
    fn uses_object_variables(&self) -> bool {
        true
    }

    /// Report values held by the body (literals, cached constants)
    fn trace(&self, _tracer: &mut dyn crate::gc::Tracer) {}
}

struct FnBody<F> {
    name: Arc<str>,
    uses_variables: bool,
    f: F,
}

impl<F> InterpretedBody for FnBody<F>
where
    F: Fn(&mut Activity, &Invocation<'_>) -> RuntimeResult<Option<Value>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(
        &self,
        activity: &mut Activity,
        invocation: &Invocation<'_>,
    ) -> RuntimeResult<Option<Value>> {
        (self.f)(activity, invocation)
    }

    fn uses_object_variables(&self) -> bool {
        self.uses_variables
    }
}

/// Interpreted code variant
pub struct InterpretedCode {
    body: Arc<dyn InterpretedBody>,
}

impl InterpretedCode {
    /// The wrapped body
    pub fn body(&self) -> &Arc<dyn InterpretedBody> {
        &self.body
    }
}

/// Native function signature
pub type NativeFn = Arc<dyn Fn(&mut Activity, &Invocation<'_>) -> RuntimeResult<Value> + Send + Sync>;

/// Native trampoline variant
pub struct NativeCode {
    name: Arc<str>,
    arity: Arity,
    func: NativeFn,
}

impl NativeCode {
    /// Accepted argument counts
    pub fn arity(&self) -> Arity {
        self.arity
    }
}

/// Registered external handler variant
pub struct RegisteredCode {
    name: Arc<str>,
    handler: OnceCell<HandlerFn>,
}

impl RegisteredCode {
    /// Whether the handler has been resolved already
    pub fn is_resolved(&self) -> bool {
        self.handler.get().is_some()
    }

    fn resolve(&self, activity: &Activity) -> RuntimeResult<&HandlerFn> {
        self.handler.get_or_try_init(|| {
            activity
                .runtime()
                .handler(&self.name)
                .ok_or_else(|| RuntimeError::UnknownHandler(self.name.to_string()))
        })
    }

    fn invoke(&self, activity: &Activity, invocation: &Invocation<'_>) -> RuntimeResult<Option<Value>> {
        let handler = self.resolve(activity)?;
        let context = HandlerContext {
            activity: activity.id(),
            receiver: invocation.receiver,
            name: invocation.name.as_str(),
            call_type: invocation.call_type,
            environment: invocation.environment,
        };
        match handler(&context, invocation.args) {
            HandlerResult::Value(value) => Ok(Some(value)),
            HandlerResult::NoValue => Ok(None),
            HandlerResult::Unhandled => Err(RuntimeError::UnknownHandler(self.name.to_string())),
            HandlerResult::Error(text) => Err(RuntimeError::condition("ERROR", text)),
        }
    }
}

// ============================================================================
// Code
// ============================================================================

/// Executable code
pub enum Code {
    /// Interpreted body
    Interpreted(InterpretedCode),
    /// Native function
    Native(NativeCode),
    /// Registered external handler
    Registered(RegisteredCode),
}

impl Code {
    /// Wrap an interpreted body
    pub fn interpreted<B: InterpretedBody + 'static>(body: B) -> Self {
        Code::Interpreted(InterpretedCode {
            body: Arc::new(body),
        })
    }

    /// Interpreted body backed by a closure; the body is assumed to use
    /// object variables
    pub fn interpreted_fn<F>(name: &str, f: F) -> Self
    where
        F: Fn(&mut Activity, &Invocation<'_>) -> RuntimeResult<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        Self::interpreted(FnBody {
            name: Arc::from(name),
            uses_variables: true,
            f,
        })
    }

    /// Closure-backed interpreted body that never touches object variables
    pub fn stateless_fn<F>(name: &str, f: F) -> Self
    where
        F: Fn(&mut Activity, &Invocation<'_>) -> RuntimeResult<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        Self::interpreted(FnBody {
            name: Arc::from(name),
            uses_variables: false,
            f,
        })
    }

    /// Native function with an arity check
    pub fn native<F>(name: &str, arity: Arity, f: F) -> Self
    where
        F: Fn(&mut Activity, &Invocation<'_>) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        Code::Native(NativeCode {
            name: Arc::from(name),
            arity,
            func: Arc::new(f),
        })
    }

    /// External handler resolved by name on first use
    pub fn registered(name: &str) -> Self {
        Code::Registered(RegisteredCode {
            name: Arc::from(name),
            handler: OnceCell::new(),
        })
    }

    /// Name for diagnostics
    pub fn name(&self) -> &str {
        match self {
            Code::Interpreted(code) => code.body.name(),
            Code::Native(code) => &code.name,
            Code::Registered(code) => &code.name,
        }
    }

    /// Whether running this code needs the receiver's variable pool.
    ///
    /// Native functions may touch object state in arbitrary ways and always
    /// report true; external handlers cannot reach object variables.
    pub fn uses_object_variables(&self) -> bool {
        match self {
            Code::Interpreted(code) => code.body.uses_object_variables(),
            Code::Native(_) => true,
            Code::Registered(_) => false,
        }
    }

    /// Run as a method on `receiver`. No result means `Nil`.
    pub fn run(
        &self,
        activity: &mut Activity,
        receiver: &Value,
        selector: &Selector,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let invocation = Invocation::method(receiver, selector, args);
        Ok(self.execute(activity, &invocation)?.unwrap_or(Value::Nil))
    }

    /// Run as a routine on a fresh activation.
    ///
    /// The activation carries the call type, environment and caller context
    /// and is popped again on return, leaving the caller's frame untouched.
    /// Registered code invoked as a function must produce a value.
    #[allow(clippy::too_many_arguments)]
    pub fn call(
        &self,
        activity: &mut Activity,
        receiver: Option<&Value>,
        name: &Selector,
        args: &[Value],
        call_type: CallType,
        environment: Option<&str>,
        context: &CallContext,
    ) -> RuntimeResult<Option<Value>> {
        activity.check_stack_depth()?;
        let frame = Frame::for_routine(
            name.clone(),
            call_type,
            environment,
            context,
            activity.security_manager().cloned(),
        );
        activity.push_frame(frame);

        let invocation = Invocation {
            receiver,
            name,
            args,
            call_type,
            environment,
            context: Some(context),
        };
        let outcome = match self {
            Code::Registered(code) => code.invoke(activity, &invocation).and_then(|result| {
                if call_type == CallType::Function && result.is_none() {
                    return Err(RuntimeError::NoResult(name.to_string()));
                }
                Ok(result)
            }),
            _ => self.execute(activity, &invocation),
        };

        activity.pop_frame();
        outcome
    }

    fn execute(
        &self,
        activity: &mut Activity,
        invocation: &Invocation<'_>,
    ) -> RuntimeResult<Option<Value>> {
        match self {
            Code::Interpreted(code) => code.body.execute(activity, invocation),
            Code::Native(code) => {
                code.arity.check(&code.name, invocation.args.len())?;
                (code.func)(activity, invocation).map(Some)
            }
            Code::Registered(code) => code.invoke(activity, invocation),
        }
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Code::Interpreted(_) => "Interpreted",
            Code::Native(_) => "Native",
            Code::Registered(_) => "Registered",
        };
        write!(f, "Code::{}({})", kind, self.name())
    }
}
