use crate::report::{
    Record,
    Report,
};
use eyre::Result;
use futures::{
    future::BoxFuture,
    FutureExt as _,
};

/// A metric source.
///
/// `open` is called once before the first sample and may fail, in which case the inlet is never
/// scheduled. `sample` is called once per tick; its errors are logged and the tick is skipped.
/// `close` releases whatever `open` acquired.
pub trait Inlet: Send {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        async { Ok(()) }.boxed()
    }

    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>>;

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        async { Ok(()) }.boxed()
    }
}

/// A report destination.
///
/// `write` receives every report in the order the pipeline received it. A failed write is logged
/// and does not stop delivery to other outlets or of later reports.
pub trait Outlet: Send {
    fn open(&mut self) -> BoxFuture<'_, Result<()>> {
        async { Ok(()) }.boxed()
    }

    fn write<'a>(&'a mut self, report: &'a Report) -> BoxFuture<'a, Result<()>>;

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        async { Ok(()) }.boxed()
    }
}

/// Adapts a synchronous sampling closure into an [`Inlet`] without open/close steps.
pub struct FnInlet<F> {
    func: F,
}

impl<F> FnInlet<F>
where
    F: FnMut() -> Result<Vec<Record>> + Send,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }

    pub fn boxed(func: F) -> Box<dyn Inlet>
    where
        F: 'static,
    {
        Box::new(Self::new(func))
    }
}

impl<F> Inlet for FnInlet<F>
where
    F: FnMut() -> Result<Vec<Record>> + Send,
{
    fn sample(&mut self) -> BoxFuture<'_, Result<Vec<Record>>> {
        let result = (self.func)();
        async move { result }.boxed()
    }
}
