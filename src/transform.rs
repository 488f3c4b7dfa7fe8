//! Transform trait and the combinators used to assemble pipelines.
//!
//! A transform consumes its input and returns a new value. Transforms only
//! hold immutable configuration, so one graph can be shared across threads
//! and between the train and test pipelines.
use std::{collections::BTreeMap, marker::PhantomData, sync::Arc};
use crate::error::Result;
pub trait Transform<I, O>: Send + Sync {
    /// `is_test` forbids stochastic augmentation.
    fn apply(&self, data: I, is_test: bool) -> Result<O>;
    fn then<B, P>(self, next: B) -> Then<Self, B, O>
    where
        Self: Sized,
        B: Transform<O, P>,
    {
        Then { first: self, second: next, _mid: PhantomData }
    }
}
impl<I, O, T: Transform<I, O> + ?Sized> Transform<I, O> for Box<T> {
    fn apply(&self, data: I, is_test: bool) -> Result<O> {
        (**self).apply(data, is_test)
    }
}
impl<I, O, T: Transform<I, O> + ?Sized> Transform<I, O> for Arc<T> {
    fn apply(&self, data: I, is_test: bool) -> Result<O> {
        (**self).apply(data, is_test)
    }
}
/// Two transforms run back to back, `first`'s output feeding `second`.
pub struct Then<A, B, M> {
    first: A,
    second: B,
    _mid: PhantomData<fn() -> M>,
}
impl<I, M, O, A, B> Transform<I, O> for Then<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
{
    fn apply(&self, data: I, is_test: bool) -> Result<O> {
        self.second.apply(self.first.apply(data, is_test)?, is_test)
    }
}
/// Closure as a transform.
pub struct Lambda<F, I, O> {
    f: F,
    _io: PhantomData<fn(I) -> O>,
}
impl<F, I, O> Lambda<F, I, O>
where
    F: Fn(I, bool) -> Result<O> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f, _io: PhantomData }
    }
}
impl<F, I, O> Transform<I, O> for Lambda<F, I, O>
where
    F: Fn(I, bool) -> Result<O> + Send + Sync,
{
    fn apply(&self, data: I, is_test: bool) -> Result<O> {
        (self.f)(data, is_test)
    }
}
pub fn lambda<F, I, O>(f: F) -> Lambda<F, I, O>
where
    F: Fn(I, bool) -> Result<O> + Send + Sync,
{
    Lambda::new(f)
}
/// Infallible, mode independent projection.
pub fn project<G, I, O>(g: G) -> Lambda<impl Fn(I, bool) -> Result<O> + Send + Sync, I, O>
where
    G: Fn(I) -> O + Send + Sync,
{
    Lambda::new(move |data: I, _: bool| -> Result<O> { Ok(g(data)) })
}
/// Ordered list of same-typed stages, extendable after construction.
pub struct Chain<T> {
    stages: Vec<Box<dyn Transform<T, T>>>,
}
impl<T: 'static> Chain<T> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }
    pub fn push<S: Transform<T, T> + 'static>(&mut self, stage: S) {
        self.stages.push(Box::new(stage));
    }
    pub fn with<S: Transform<T, T> + 'static>(mut self, stage: S) -> Self {
        self.push(stage);
        self
    }
    pub fn len(&self) -> usize {
        self.stages.len()
    }
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
impl<T: 'static> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T> Transform<T, T> for Chain<T> {
    fn apply(&self, data: T, is_test: bool) -> Result<T> {
        self.stages
            .iter()
            .try_fold(data, |data, stage| stage.apply(data, is_test))
    }
}
enum Route<I, O> {
    Apply(Box<dyn Transform<I, O>>),
    Passthrough(fn(I) -> O),
}
/// Fans one value out to named branches. A passthrough branch returns the
/// input unchanged.
pub struct Split<K, I, O> {
    routes: BTreeMap<K, Route<I, O>>,
}
impl<K: Ord, I: 'static, O: 'static> Split<K, I, O> {
    pub fn new() -> Self {
        Self { routes: BTreeMap::new() }
    }
    pub fn branch<T: Transform<I, O> + 'static>(mut self, key: K, transform: T) -> Self {
        self.routes.insert(key, Route::Apply(Box::new(transform)));
        self
    }
    pub fn passthrough(mut self, key: K) -> Self
    where
        O: From<I>,
    {
        self.routes.insert(key, Route::Passthrough(O::from));
        self
    }
}
impl<K: Ord, I: 'static, O: 'static> Default for Split<K, I, O> {
    fn default() -> Self {
        Self::new()
    }
}
impl<K, I, O> Transform<I, BTreeMap<K, O>> for Split<K, I, O>
where
    K: Ord + Clone + Send + Sync,
    I: Clone,
{
    fn apply(&self, data: I, is_test: bool) -> Result<BTreeMap<K, O>> {
        self.routes
            .iter()
            .map(|(key, route)| {
                let value = match route {
                    Route::Apply(transform) => transform.apply(data.clone(), is_test)?,
                    Route::Passthrough(convert) => convert(data.clone()),
                };
                Ok((key.clone(), value))
            })
            .collect()
    }
}
