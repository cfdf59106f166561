//! Callbacks run by a port around data transfers and before look-ahead
//! computations.

use std::fmt;

use crate::source::DataSource;

/// A callback run right before or right after a data transfer.
pub type TransferHook = dyn FnMut() + Send + 'static;

/// A callback that adjusts upstream parameters between two served requests.
///
/// When look-ahead is enabled, the hook is applied to the bound source right
/// before the source is primed for the next request.
///
/// The port owns the hook while it is installed and drops it exactly once,
/// when it is replaced, cleared or when the port itself is dropped. Any
/// resource held by the hook should therefore be released in its `Drop`
/// implementation; [`ParameterMethod`] does this for a context paired with an
/// explicit release closure.
pub trait ParameterHook: Send + 'static {
    /// Adjusts the parameters of the source.
    fn apply(&mut self, source: &mut dyn DataSource);
}

impl<F> ParameterHook for F
where
    F: FnMut(&mut dyn DataSource) + Send + 'static,
{
    fn apply(&mut self, source: &mut dyn DataSource) {
        self(source)
    }
}

enum Method<C> {
    Contextual(Box<dyn FnMut(&mut C, &mut dyn DataSource) + Send + 'static>),
    Stateless(Box<dyn FnMut(&mut dyn DataSource) + Send + 'static>),
}

/// A parameter hook made of a method, the context it operates on and an
/// optional closure that releases the context.
///
/// The release closure is invoked exactly once with the context when the
/// `ParameterMethod` is dropped. A stateless method carries no context, so a
/// release closure attached to it is never invoked.
///
/// # Examples
///
/// ```
/// use pipeport::port::ParameterMethod;
/// use pipeport::source::{DataSource, UpdateExtent};
///
/// // Walk through the pieces of the data set, one per served request.
/// let hook = ParameterMethod::new(0u32, |next_piece: &mut u32, source: &mut dyn DataSource| {
///     source.set_update_extent(UpdateExtent::Piece {
///         piece: *next_piece,
///         number_of_pieces: 4,
///         ghost_level: 0,
///     });
///     *next_piece = (*next_piece + 1) % 4;
/// })
/// .with_release(|last_piece| println!("stopped before piece {last_piece}"));
/// # drop(hook);
/// ```
pub struct ParameterMethod<C: Send + 'static> {
    method: Method<C>,
    context: Option<C>,
    release: Option<Box<dyn FnOnce(C) + Send + 'static>>,
}

impl<C: Send + 'static> ParameterMethod<C> {
    /// Creates a parameter method operating on the provided context.
    pub fn new<F>(context: C, method: F) -> Self
    where
        F: FnMut(&mut C, &mut dyn DataSource) + Send + 'static,
    {
        Self {
            method: Method::Contextual(Box::new(method)),
            context: Some(context),
            release: None,
        }
    }

    /// Sets the closure that releases the context.
    ///
    /// A previously set release closure is replaced without being invoked.
    pub fn with_release<R>(mut self, release: R) -> Self
    where
        R: FnOnce(C) + Send + 'static,
    {
        self.release = Some(Box::new(release));

        self
    }

    /// Returns a reference to the context, if any.
    pub fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }
}

impl ParameterMethod<()> {
    /// Creates a parameter method without context.
    pub fn stateless<F>(method: F) -> Self
    where
        F: FnMut(&mut dyn DataSource) + Send + 'static,
    {
        Self {
            method: Method::Stateless(Box::new(method)),
            context: None,
            release: None,
        }
    }
}

impl<C: Send + 'static> ParameterHook for ParameterMethod<C> {
    fn apply(&mut self, source: &mut dyn DataSource) {
        match (&mut self.method, self.context.as_mut()) {
            (Method::Contextual(method), Some(context)) => method(context, source),
            (Method::Stateless(method), _) => method(source),
            (Method::Contextual(_), None) => {}
        }
    }
}

impl<C: Send + 'static> Drop for ParameterMethod<C> {
    fn drop(&mut self) {
        if let (Some(context), Some(release)) = (self.context.take(), self.release.take()) {
            release(context);
        }
    }
}

impl<C: Send + 'static> fmt::Debug for ParameterMethod<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ParameterMethod")
            .field("has_context", &self.context.is_some())
            .field("has_release", &self.release.is_some())
            .finish_non_exhaustive()
    }
}
