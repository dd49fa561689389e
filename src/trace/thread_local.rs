//! The per-thread "current trace" that [`Active`](crate::Active) arithmetic
//! records onto.
//!
//! Each float width has its own slot holding a raw pointer to a [`Trace`].
//! A [`TraceGuard`] installs a trace for the span of one recording and puts
//! the previous occupant back when it goes out of scope.

use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr;
use std::thread::LocalKey;

use crate::float::Float;

use super::Trace;

type Slot<F> = Cell<*mut Trace<F>>;

/// Float types that have a current-trace slot.
pub trait TraceThreadLocal: Float {
    fn trace_cell() -> &'static LocalKey<Slot<Self>>;
}

macro_rules! trace_slot {
    ($f:ty, $name:ident) => {
        thread_local! {
            static $name: Slot<$f> = const { Cell::new(ptr::null_mut()) };
        }

        impl TraceThreadLocal for $f {
            #[inline]
            fn trace_cell() -> &'static LocalKey<Slot<Self>> {
                &$name
            }
        }
    };
}

trace_slot!(f32, CURRENT_F32);
trace_slot!(f64, CURRENT_F64);

/// Store `next` as the current trace and return what was there.
fn swap_current<F: TraceThreadLocal>(next: *mut Trace<F>) -> *mut Trace<F> {
    F::trace_cell().with(|slot| slot.replace(next))
}

/// Run `f` on the current trace.
///
/// Panics when called outside a recording, e.g. arithmetic on a non-constant
/// `Active` after its trace was finished.
#[inline]
pub fn with_active_trace<F: TraceThreadLocal, R>(f: impl FnOnce(&mut Trace<F>) -> R) -> R {
    let current = F::trace_cell().with(Cell::get);
    assert!(
        !current.is_null(),
        "No active trace. Use revtensor::record() to record a function."
    );
    // SAFETY: a non-null slot was set by a live TraceGuard, which holds the
    // unique borrow of that trace for its own lifetime. The slot is
    // thread-local and `f` cannot reach the guard, so no other reference to
    // the trace exists while `f` runs.
    f(unsafe { &mut *current })
}

/// Makes a trace current for as long as the guard lives.
///
/// The guard borrows the trace mutably, so the trace cannot be read, moved or
/// dropped by the caller until recording stops. Guards nest: an inner
/// recording started while another is active hands the slot back on drop.
pub struct TraceGuard<'t, F: TraceThreadLocal> {
    outer: *mut Trace<F>,
    _trace: PhantomData<&'t mut Trace<F>>,
}

impl<'t, F: TraceThreadLocal> TraceGuard<'t, F> {
    pub fn new(trace: &'t mut Trace<F>) -> Self {
        TraceGuard {
            outer: swap_current(trace as *mut Trace<F>),
            _trace: PhantomData,
        }
    }
}

impl<F: TraceThreadLocal> Drop for TraceGuard<'_, F> {
    fn drop(&mut self) {
        swap_current(self.outer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::OpCode;

    #[test]
    fn nested_guards_restore_the_outer_trace() {
        let mut outer = Trace::<f64>::new();
        let mut inner = Trace::<f64>::new();
        {
            let _g = TraceGuard::new(&mut outer);
            with_active_trace(|t: &mut Trace<f64>| t.push_input(1.0));
            {
                let _h = TraceGuard::new(&mut inner);
                with_active_trace(|t: &mut Trace<f64>| {
                    t.push_input(2.0);
                    t.push_input(3.0);
                });
            }
            with_active_trace(|t: &mut Trace<f64>| t.push_const(4.0));
        }
        let ops: Vec<OpCode> = outer.records().iter().map(|r| r.opcode).collect();
        assert_eq!(ops, vec![OpCode::Input, OpCode::Const]);
        assert_eq!(inner.num_inputs(), 2);
        assert!(f64::trace_cell().with(Cell::get).is_null());
    }

    #[test]
    fn widths_have_separate_slots() {
        let mut t32 = Trace::<f32>::new();
        let _g = TraceGuard::new(&mut t32);
        assert!(f64::trace_cell().with(Cell::get).is_null());
        assert!(!f32::trace_cell().with(Cell::get).is_null());
    }

    #[test]
    #[should_panic(expected = "No active trace")]
    fn recording_without_a_trace_panics() {
        with_active_trace(|t: &mut Trace<f64>| t.push_input(1.0));
    }
}
